//! ARS (Autonomous Relay System) client.
//!
//! Endpoints used:
//!   parent: {ars}/messages/{run_id}?trace=y   → children with status + agent
//!   child:  {ars}/messages/{child_message_id} → the agent's TRAPI response

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use noveltyx_common::error::{NoveltyError, Result};
use noveltyx_common::sandbox::SandboxClient as Client;
use noveltyx_common::trapi::CompletionStatus;
use noveltyx_common::ArsResponse;

use super::ResponseSource;

pub const ARS_URL: &str = "https://ars.ci.transltr.io/ars/api";

pub struct ArsClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TraceMessage {
    #[serde(default)]
    pub children: Vec<TraceChild>,
}

#[derive(Debug, Deserialize)]
pub struct TraceChild {
    pub status: CompletionStatus,
    pub message: String,
    pub actor: TraceActor,
}

#[derive(Debug, Deserialize)]
pub struct TraceActor {
    pub agent: String,
}

impl ArsClient {
    pub fn new() -> Result<Self> {
        Self::with_url(ARS_URL)
    }

    pub fn with_url(base_url: &str) -> Result<Self> {
        let mut client = Client::new()?;
        client.allow_url(base_url);
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.client.get(url)?.send().await?;
        if !resp.status().is_success() {
            return Err(NoveltyError::service("ars", format!("status {} for {}", resp.status(), url)));
        }
        Ok(resp.json().await?)
    }

    async fn fetch_child(&self, child: &TraceChild) -> Result<ArsResponse> {
        let url = format!("{}/messages/{}", self.base_url, child.message);
        let raw: serde_json::Value = self.get_json(&url).await?;
        ArsResponse::from_value(raw)
    }
}

/// Whether a child's payload is worth keeping: Done children need at least
/// one result, Error children are kept as long as they carry a message.
pub fn is_usable(status: &CompletionStatus, response: &ArsResponse) -> bool {
    match status {
        CompletionStatus::Done => response.message().is_some_and(|m| !m.results().is_empty()),
        CompletionStatus::Error => response.message().is_some(),
        CompletionStatus::Other(_) => false,
    }
}

#[async_trait]
impl ResponseSource for ArsClient {
    #[instrument(skip(self))]
    async fn fetch_responses(&self, run_id: &str) -> Result<BTreeMap<String, ArsResponse>> {
        let url = format!("{}/messages/{}?trace=y", self.base_url, run_id);
        let trace: TraceMessage = self.get_json(&url).await?;
        info!(children = trace.children.len(), "ARS trace fetched");

        let mut responses = BTreeMap::new();
        for child in &trace.children {
            if let CompletionStatus::Other(status) = &child.status {
                debug!(agent = %child.actor.agent, %status, "skipping unfinished agent");
                continue;
            }
            match self.fetch_child(child).await {
                Ok(response) if is_usable(&child.status, &response) => {
                    responses.insert(child.actor.agent.clone(), response);
                }
                Ok(_) => debug!(agent = %child.actor.agent, "agent returned no results"),
                Err(e) => warn!(agent = %child.actor.agent, error = %e, "ARS child fetch failed"),
            }
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noveltyx_common::trapi::{Message, TrapiResult};

    #[test]
    fn test_parse_trace() {
        let raw = r#"{"status": "Done", "children": [
            {"status": "Done", "message": "abc", "actor": {"agent": "ara-aragorn"}},
            {"status": "Running", "message": "def", "actor": {"agent": "ara-arax"}}
        ]}"#;
        let trace: TraceMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(trace.children.len(), 2);
        assert_eq!(trace.children[0].status, CompletionStatus::Done);
        assert_eq!(trace.children[1].actor.agent, "ara-arax");
    }

    #[test]
    fn test_usable_filters() {
        let empty = ArsResponse::new(CompletionStatus::Done, Message::default());
        assert!(!is_usable(&CompletionStatus::Done, &empty));
        assert!(is_usable(&CompletionStatus::Error, &empty));

        let with_results = ArsResponse::new(
            CompletionStatus::Done,
            Message { results: Some(vec![TrapiResult::default()]), ..Default::default() },
        );
        assert!(is_usable(&CompletionStatus::Done, &with_results));
        assert!(!is_usable(&CompletionStatus::Other("Running".into()), &with_results));
    }
}
