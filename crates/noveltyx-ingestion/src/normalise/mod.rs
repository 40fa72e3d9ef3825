//! Identifier normalisation.
//!
//! - `NormalizationService`: one request against a normalization backend
//! - `IdentifierNormalizer`: chunked batch normalization on top of a service
//! - `NodeNormClient`: the SRI node normalizer over HTTP

pub mod node_norm;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use noveltyx_common::error::Result;
use crate::batch::run_chunked;

pub use node_norm::NodeNormClient;

/// Canonical form of one identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedNode {
    /// Preferred CURIE, e.g. "PUBCHEM.COMPOUND:2244"
    pub identifier: String,
    pub label: Option<String>,
    /// All equivalent CURIEs known to the service (includes INCHIKEY ids for chemicals).
    #[serde(default)]
    pub equivalent_identifiers: Vec<String>,
}

impl NormalizedNode {
    pub fn inchikey(&self) -> Option<&str> {
        self.equivalent_identifiers
            .iter()
            .find(|id| id.contains("INCHIKEY"))
            .map(String::as_str)
    }
}

/// A single normalization request.
#[async_trait]
pub trait NormalizationService: Send + Sync {
    /// Normalize one chunk. Ids missing from the returned map are unresolved.
    async fn normalize_chunk(&self, ids: &[String]) -> Result<HashMap<String, NormalizedNode>>;
}

pub const DEFAULT_NORMALIZE_CHUNK: usize = 100;

/// Batch normalizer that respects the service payload limit by chunking.
pub struct IdentifierNormalizer {
    service: Arc<dyn NormalizationService>,
    chunk_size: usize,
    concurrency: usize,
}

impl IdentifierNormalizer {
    pub fn new(service: Arc<dyn NormalizationService>) -> Self {
        Self { service, chunk_size: DEFAULT_NORMALIZE_CHUNK, concurrency: 4 }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Normalize every id. Each input id is present in the output; `None`
    /// means unresolved (unknown to the service, or its chunk failed).
    #[instrument(skip_all, fields(ids = ids.len(), chunk_size = self.chunk_size))]
    pub async fn normalize_batch(&self, ids: &[String]) -> Result<HashMap<String, Option<NormalizedNode>>> {
        let resolved = run_chunked("node-normalizer", ids, self.chunk_size, self.concurrency, |chunk| {
            let service = Arc::clone(&self.service);
            async move { service.normalize_chunk(&chunk).await }
        })
        .await?;

        Ok(ids
            .iter()
            .map(|id| (id.clone(), resolved.get(id).cloned()))
            .collect())
    }

    /// Canonical identifier for each id, falling back to the id itself.
    pub async fn canonical_ids(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        let normalized = self.normalize_batch(ids).await?;
        Ok(normalized
            .into_iter()
            .map(|(id, node)| {
                let canonical = node.map(|n| n.identifier).unwrap_or_else(|| id.clone());
                (id, canonical)
            })
            .collect())
    }
}
