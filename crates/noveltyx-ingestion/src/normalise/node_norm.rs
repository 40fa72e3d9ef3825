//! SRI node normalizer client.
//!
//! Endpoint: https://nodenormalization-sri.renci.org/1.3/get_normalized_nodes
//! Request:  `{"curies": [...], "conflate": true}`
//! Response: `{curie: null | {"id": {"identifier", "label"}, "equivalent_identifiers": [...]}}`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use noveltyx_common::error::{NoveltyError, Result};
use noveltyx_common::sandbox::SandboxClient as Client;

use super::{NormalizationService, NormalizedNode};

pub const NODE_NORM_URL: &str = "https://nodenormalization-sri.renci.org/1.3/get_normalized_nodes";

pub struct NodeNormClient {
    client: Client,
    url: String,
    conflate: bool,
}

#[derive(Deserialize)]
struct RawNode {
    id: RawIdentifier,
    #[serde(default)]
    equivalent_identifiers: Vec<RawIdentifier>,
}

#[derive(Deserialize)]
struct RawIdentifier {
    identifier: String,
    #[serde(default)]
    label: Option<String>,
}

impl NodeNormClient {
    pub fn new() -> Result<Self> {
        Self::with_url(NODE_NORM_URL)
    }

    pub fn with_url(url: &str) -> Result<Self> {
        let mut client = Client::new()?;
        client.allow_url(url);
        Ok(Self { client, url: url.to_string(), conflate: true })
    }

    pub fn conflate(mut self, conflate: bool) -> Self {
        self.conflate = conflate;
        self
    }
}

#[async_trait]
impl NormalizationService for NodeNormClient {
    #[instrument(skip_all, fields(ids = ids.len()))]
    async fn normalize_chunk(&self, ids: &[String]) -> Result<HashMap<String, NormalizedNode>> {
        let body = json!({ "curies": ids, "conflate": self.conflate });
        let resp = self.client.post(&self.url)?.json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(NoveltyError::service("node-normalizer", format!("status {}", resp.status())));
        }
        let raw: serde_json::Value = resp.json().await?;
        let nodes = parse_normalized(raw)?;
        debug!(resolved = nodes.len(), "node normalizer chunk done");
        Ok(nodes)
    }
}

/// Parse a node-normalizer response body. `null` entries are unresolved and dropped.
pub fn parse_normalized(raw: serde_json::Value) -> Result<HashMap<String, NormalizedNode>> {
    let entries: HashMap<String, Option<RawNode>> = serde_json::from_value(raw)?;
    Ok(entries
        .into_iter()
        .filter_map(|(curie, node)| {
            let node = node?;
            let normalized = NormalizedNode {
                identifier: node.id.identifier,
                label: node.id.label,
                equivalent_identifiers: node.equivalent_identifiers.into_iter().map(|e| e.identifier).collect(),
            };
            Some((curie, normalized))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalized_response() {
        let raw = json!({
            "CHEBI:15365": {
                "id": {"identifier": "PUBCHEM.COMPOUND:2244", "label": "Aspirin"},
                "equivalent_identifiers": [
                    {"identifier": "PUBCHEM.COMPOUND:2244", "label": "Aspirin"},
                    {"identifier": "CHEBI:15365"},
                    {"identifier": "INCHIKEY:BSYNRYMUTXBXSQ-UHFFFAOYSA-N"}
                ],
                "type": ["biolink:SmallMolecule"]
            },
            "NOT:REAL": null
        });
        let nodes = parse_normalized(raw).unwrap();
        assert_eq!(nodes.len(), 1);
        let aspirin = &nodes["CHEBI:15365"];
        assert_eq!(aspirin.identifier, "PUBCHEM.COMPOUND:2244");
        assert_eq!(aspirin.label.as_deref(), Some("Aspirin"));
        assert_eq!(aspirin.inchikey(), Some("INCHIKEY:BSYNRYMUTXBXSQ-UHFFFAOYSA-N"));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_normalized(json!([1, 2, 3])).is_err());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_normalize() {
        let client = NodeNormClient::new().unwrap();
        let out = client
            .normalize_chunk(&["MESH:D014867".to_string(), "NCIT:C34373".to_string()])
            .await
            .expect("node normalizer request failed");
        assert!(out.contains_key("MESH:D014867"));
    }
}
