//! Shared testing utilities for the noveltyx workspace.
//!
//! - [`trapi`]: builders for ARS / TRAPI response documents
//! - [`mocks`]: in-memory collaborators (years, structures, normalizer, graph, ARS)

pub mod mocks;
pub mod trapi;

pub use mocks::{MockNormalization, MockProvenanceGraph, MockResponseSource, MockStructureLookup, MockYearSource};
pub use trapi::{EdgeSpec, ResponseBuilder};

// Re-export for test convenience
pub use pretty_assertions::{assert_eq, assert_ne};
