//! noveltyx-molecules - Structural similarity between chemical entities.
//!
//! 1. Parsing SMILES into a molecular graph
//! 2. Circular count fingerprints (radius 2)
//! 3. Nearest-neighbour ranking by Tanimoto similarity

pub mod smiles;
pub mod fingerprint;
pub mod similarity;

pub use fingerprint::Fingerprint;
pub use similarity::{Neighbor, SimilarityMapping, SimilarityRanker, SimilarityReport};
