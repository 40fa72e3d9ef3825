//! Nearest-neighbour ranking of query molecules against a reference set.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use noveltyx_common::{NoveltyError, StructureOutcome};

use crate::fingerprint::{Fingerprint, DEFAULT_RADIUS};
use crate::smiles;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub similarity: f64,
}

/// Query id → neighbours, most similar first.
pub type SimilarityMapping = BTreeMap<String, Vec<Neighbor>>;

#[derive(Debug, Default)]
pub struct SimilarityReport {
    pub mapping: SimilarityMapping,
    /// One `InvalidStructure` per entity whose SMILES did not parse.
    pub failures: Vec<NoveltyError>,
}

impl SimilarityReport {
    /// Similarity of the closest neighbour, if any passed the cutoff.
    pub fn top_similarity(&self, id: &str) -> Option<f64> {
        self.mapping.get(id)?.first().map(|n| n.similarity)
    }
}

/// `(id, smiles)` pairs for the ids that have a structure, in `ids` order.
pub fn with_structures(ids: &[String], outcomes: &HashMap<String, StructureOutcome>) -> Vec<(String, String)> {
    ids.iter()
        .filter_map(|id| {
            let smiles = outcomes.get(id)?.smiles()?;
            Some((id.clone(), smiles.to_string()))
        })
        .collect()
}

pub struct SimilarityRanker {
    radius: usize,
}

impl Default for SimilarityRanker {
    fn default() -> Self {
        Self { radius: DEFAULT_RADIUS }
    }
}

impl SimilarityRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_radius(radius: usize) -> Self {
        Self { radius }
    }

    fn fingerprint(&self, id: &str, smiles: &str) -> Result<Fingerprint, NoveltyError> {
        let mol = smiles::parse(smiles).map_err(|e| NoveltyError::InvalidStructure {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Fingerprint::morgan(&mol, self.radius))
    }

    /// For each query, at most `n` known entities with similarity ≥ `cutoff`,
    /// sorted descending. Ties keep the order of `known`.
    pub fn rank(
        &self,
        unknown: &[(String, String)],
        known: &[(String, String)],
        cutoff: f64,
        n: usize,
    ) -> SimilarityReport {
        let mut report = SimilarityReport::default();

        let mut references = Vec::with_capacity(known.len());
        for (id, smiles) in known {
            match self.fingerprint(id, smiles) {
                Ok(fp) => references.push((id.as_str(), fp)),
                Err(e) => {
                    warn!(%id, error = %e, "skipping reference structure");
                    report.failures.push(e);
                }
            }
        }

        for (id, smiles) in unknown {
            let query = match self.fingerprint(id, smiles) {
                Ok(fp) => fp,
                Err(e) => {
                    warn!(%id, error = %e, "skipping query structure");
                    report.failures.push(e);
                    continue;
                }
            };

            let mut scored: Vec<Neighbor> = references
                .iter()
                .map(|(ref_id, fp)| Neighbor { id: ref_id.to_string(), similarity: query.tanimoto(fp) })
                .collect();
            scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));

            let neighbours: Vec<Neighbor> = scored.into_iter().take(n).filter(|nb| nb.similarity >= cutoff).collect();
            debug!(%id, neighbours = neighbours.len(), "nearest neighbours ranked");
            report.mapping.insert(id.clone(), neighbours);
        }

        report
    }
}
