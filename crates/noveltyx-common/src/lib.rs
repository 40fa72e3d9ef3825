//! noveltyx-common: Shared types, errors, and the HTTP sandbox used across all noveltyx crates.

pub mod error;
pub mod trapi;
pub mod sandbox;
pub mod curie;
pub mod structure;

// Re-export commonly used types
pub use error::{NoveltyError, Result};
pub use trapi::{ArsResponse, Message, QueryKind};
pub use structure::StructureOutcome;
