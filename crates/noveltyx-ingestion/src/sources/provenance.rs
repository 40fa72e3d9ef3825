//! Knowledge-graph provenance lookup over the Neo4j HTTP transaction API.
//!
//! Endpoint: {base}/db/{database}/tx/commit
//! One Cypher statement returns, for every object linked to the subject,
//! the publication lists carried on the connecting edges.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use noveltyx_common::error::{NoveltyError, Result};
use noveltyx_common::sandbox::SandboxClient as Client;

use super::ProvenanceGraph;

const PUBLICATIONS_QUERY: &str = "\
MATCH (s {id: $subject})-[r]-(o) \
WHERE o.id IN $objects \
RETURN o.id AS object, r.publications AS publications";

pub struct Neo4jProvenanceClient {
    client: Client,
    commit_url: String,
    auth: Option<(String, String)>,
}

impl Neo4jProvenanceClient {
    pub fn new(base_url: &str, database: &str) -> Result<Self> {
        let mut client = Client::new()?;
        client.allow_url(base_url);
        let commit_url = format!("{}/db/{}/tx/commit", base_url.trim_end_matches('/'), database);
        Ok(Self { client, commit_url, auth: None })
    }

    pub fn with_auth(mut self, user: &str, password: &str) -> Self {
        self.auth = Some((user.to_string(), password.to_string()));
        self
    }
}

#[async_trait]
impl ProvenanceGraph for Neo4jProvenanceClient {
    #[instrument(skip(self, object_ids), fields(objects = object_ids.len()))]
    async fn query_provenance_publications(
        &self,
        subject_id: &str,
        object_ids: &[String],
    ) -> Result<HashMap<(String, String), BTreeSet<String>>> {
        if object_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let body = json!({
            "statements": [{
                "statement": PUBLICATIONS_QUERY,
                "parameters": { "subject": subject_id, "objects": object_ids }
            }]
        });

        let mut req = self.client.post(&self.commit_url)?.json(&body);
        if let Some((user, password)) = &self.auth {
            req = req.basic_auth(user, Some(password));
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(NoveltyError::service("provenance-graph", format!("status {}", resp.status())));
        }
        let raw: serde_json::Value = resp.json().await?;
        let links = parse_commit_response(subject_id, &raw)?;
        debug!(pairs = links.len(), "provenance publications fetched");
        Ok(links)
    }
}

/// Parse `{"results": [{"data": [{"row": [object, [pubs...]]}]}], "errors": [...]}`.
pub fn parse_commit_response(
    subject_id: &str,
    raw: &serde_json::Value,
) -> Result<HashMap<(String, String), BTreeSet<String>>> {
    if let Some(err) = raw["errors"].as_array().and_then(|errs| errs.first()) {
        let msg = err["message"].as_str().unwrap_or("unknown graph error");
        return Err(NoveltyError::service("provenance-graph", msg));
    }

    let mut links: HashMap<(String, String), BTreeSet<String>> = HashMap::new();
    let rows = raw["results"]
        .as_array()
        .into_iter()
        .flatten()
        .flat_map(|r| r["data"].as_array().into_iter().flatten());

    for row in rows {
        let Some(object) = row["row"][0].as_str() else { continue };
        let pubs = row["row"][1]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|p| p.as_str().map(String::from));
        links
            .entry((subject_id.to_string(), object.to_string()))
            .or_default()
            .extend(pubs);
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commit_response_merges_edges() {
        let raw = json!({
            "results": [{
                "columns": ["object", "publications"],
                "data": [
                    {"row": ["CHEBI:6801", ["PMID:1", "PMID:2"]]},
                    {"row": ["CHEBI:6801", ["PMID:2", "PMID:3"]]},
                    {"row": ["CHEBI:9999", null]}
                ]
            }],
            "errors": []
        });
        let links = parse_commit_response("MONDO:0005148", &raw).unwrap();
        let key = ("MONDO:0005148".to_string(), "CHEBI:6801".to_string());
        assert_eq!(links[&key].len(), 3);
        let empty = ("MONDO:0005148".to_string(), "CHEBI:9999".to_string());
        assert!(links[&empty].is_empty());
    }

    #[test]
    fn test_parse_commit_response_surfaces_errors() {
        let raw = json!({"results": [], "errors": [{"code": "Neo.ClientError", "message": "bad syntax"}]});
        let err = parse_commit_response("MONDO:1", &raw).unwrap_err();
        assert!(err.to_string().contains("bad syntax"));
    }
}
