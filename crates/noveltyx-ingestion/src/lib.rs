//! noveltyx-ingestion: Clients for the external services the scorer consumes:
//! - ARS response retrieval
//! - Node normalization (chunked batches)
//! - Publication dating (PubMed / PMC E-utilities)
//! - Knowledge-graph provenance lookup
//! - Chemical structure lookup (MolePro, PubChem)

pub mod batch;
pub mod normalise;
pub mod sources;

pub use normalise::{IdentifierNormalizer, NormalizationService, NormalizedNode};
pub use sources::{ProvenanceGraph, PublicationYearSource, ResponseSource, StructureLookup};
