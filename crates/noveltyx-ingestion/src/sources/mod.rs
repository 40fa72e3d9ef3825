//! External data source clients.

pub mod ars;
pub mod pubmed;
pub mod provenance;
pub mod structure;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use noveltyx_common::error::Result;
use noveltyx_common::{ArsResponse, StructureOutcome};

pub use ars::ArsClient;
pub use provenance::Neo4jProvenanceClient;
pub use pubmed::{PubMedClient, PublicationDater, YearFetcher};
pub use structure::ChemStructureClient;

/// Per-agent responses for one federation run.
#[async_trait]
pub trait ResponseSource: Send + Sync {
    /// Agent name → response. Only usable (Done or Error with payload) responses are returned.
    async fn fetch_responses(&self, run_id: &str) -> Result<BTreeMap<String, ArsResponse>>;
}

/// Publication id → publication year.
#[async_trait]
pub trait PublicationYearSource: Send + Sync {
    /// Keys are the ids exactly as passed in; unresolvable ids are absent.
    async fn resolve_publication_years(&self, ids: &[String]) -> Result<HashMap<String, i32>>;
}

/// Publications linking a subject to objects in a curated knowledge graph.
#[async_trait]
pub trait ProvenanceGraph: Send + Sync {
    async fn query_provenance_publications(
        &self,
        subject_id: &str,
        object_ids: &[String],
    ) -> Result<HashMap<(String, String), BTreeSet<String>>>;
}

/// Chemical identifier → SMILES.
#[async_trait]
pub trait StructureLookup: Send + Sync {
    /// One outcome per input id.
    async fn lookup_structures(&self, ids: &[String]) -> Result<HashMap<String, StructureOutcome>>;
}
