//! noveltyx-ranker: Novelty scoring of federated query results.
//!
//! - `known`: known / unknown classification from edge provenance
//! - `evidence`: per-edge FDA status and publication evidence
//! - `recency`, `novelty`, `params`: the scoring model
//! - `aggregator`: joins everything into per-drug scores

pub mod known;
pub mod evidence;
pub mod recency;
pub mod novelty;
pub mod params;
pub mod aggregator;

pub use aggregator::{BindingScope, DrugScore, DuplicatePolicy, NoveltyAggregator, NoveltyRow, NoveltyTable};
pub use evidence::{EvidenceExtractor, EvidenceRecord, FdaStatus};
pub use known::{Classification, ProvenanceClassifier, ResultClass};
pub use params::{NoveltyParams, RecencyParams};
