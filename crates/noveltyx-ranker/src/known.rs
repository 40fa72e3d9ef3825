//! Known / unknown classification of result records.
//!
//! A result is KNOWN when the first edge it cites that declares a primary
//! knowledge source was asserted by a non-inferring source, UNKNOWN when
//! that source is one of the reasoning agents. Results without analyses or
//! without any primary-source edge are left out of both sets.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use noveltyx_common::error::Result;
use noveltyx_common::trapi::{KnowledgeGraph, TrapiResult};
use noveltyx_common::Message;

/// Reasoning agents whose edges are computed rather than asserted.
pub const DEFAULT_INFERRING_SOURCES: &[&str] = &[
    "infores:aragorn",
    "infores:arax",
    "infores:biothings-explorer",
    "infores:improving-agent",
    "infores:robokop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultClass {
    Known,
    Unknown,
}

/// Result indices per class. The two sets never overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub known: BTreeSet<usize>,
    pub unknown: BTreeSet<usize>,
}

impl Classification {
    pub fn class_of(&self, index: usize) -> Option<ResultClass> {
        if self.known.contains(&index) {
            Some(ResultClass::Known)
        } else if self.unknown.contains(&index) {
            Some(ResultClass::Unknown)
        } else {
            None
        }
    }

    /// Classified indices in ascending order.
    pub fn classified(&self) -> impl Iterator<Item = (usize, ResultClass)> + '_ {
        let known = self.known.iter().map(|&i| (i, ResultClass::Known));
        let unknown = self.unknown.iter().map(|&i| (i, ResultClass::Unknown));
        let mut all: Vec<_> = known.chain(unknown).collect();
        all.sort_by_key(|(i, _)| *i);
        all.into_iter()
    }
}

#[derive(Debug, Clone)]
pub struct ProvenanceClassifier {
    inferring: HashSet<String>,
}

impl Default for ProvenanceClassifier {
    fn default() -> Self {
        Self::with_inferring_sources(DEFAULT_INFERRING_SOURCES.iter().copied())
    }
}

impl ProvenanceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inferring_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { inferring: sources.into_iter().map(Into::into).collect() }
    }

    pub fn is_inferring(&self, source: &str) -> bool {
        self.inferring.contains(source)
    }

    #[instrument(skip_all, fields(results = message.results().len()))]
    pub fn classify(&self, message: &Message) -> Result<Classification> {
        let empty = KnowledgeGraph::default();
        let kg = message.knowledge_graph.as_ref().unwrap_or(&empty);

        let mut classification = Classification::default();
        for (index, result) in message.results().iter().enumerate() {
            match self.classify_result(result, kg)? {
                Some(ResultClass::Known) => {
                    classification.known.insert(index);
                }
                Some(ResultClass::Unknown) => {
                    classification.unknown.insert(index);
                }
                None => debug!(index, "result has no provenance, left unclassified"),
            }
        }
        debug!(
            known = classification.known.len(),
            unknown = classification.unknown.len(),
            "results classified"
        );
        Ok(classification)
    }

    /// Decided by the first cited edge with a primary knowledge source, in
    /// analyses → edge-binding groups → bindings order.
    fn classify_result(&self, result: &TrapiResult, kg: &KnowledgeGraph) -> Result<Option<ResultClass>> {
        let Some(analyses) = &result.analyses else {
            return Ok(None);
        };
        for analysis in analyses {
            for bindings in analysis.edge_bindings.values() {
                for binding in bindings {
                    let edge = kg.edge(binding.require_id()?)?;
                    if let Some(source) = edge.primary_knowledge_source() {
                        let class = if self.is_inferring(source) {
                            ResultClass::Unknown
                        } else {
                            ResultClass::Known
                        };
                        return Ok(Some(class));
                    }
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noveltyx_common::NoveltyError;
    use serde_json::json;

    fn message(edges: serde_json::Value, results: serde_json::Value) -> Message {
        serde_json::from_value(json!({
            "query_graph": {"nodes": {}},
            "knowledge_graph": {"edges": edges},
            "results": results
        }))
        .unwrap()
    }

    fn edge(source: Option<&str>) -> serde_json::Value {
        let sources = match source {
            Some(s) => json!([
                {"resource_id": "infores:aggregator", "resource_role": "aggregator_knowledge_source"},
                {"resource_id": s, "resource_role": "primary_knowledge_source"}
            ]),
            None => json!([]),
        };
        json!({"subject": "PUBCHEM.COMPOUND:1", "object": "MONDO:1", "sources": sources})
    }

    fn cites(edge_ids: &[&str]) -> serde_json::Value {
        let bindings: Vec<_> = edge_ids.iter().map(|id| json!({"id": id})).collect();
        json!({"analyses": [{"edge_bindings": {"e0": bindings}}]})
    }

    #[test]
    fn test_inferring_source_is_unknown() {
        let msg = message(json!({"e1": edge(Some("infores:aragorn"))}), json!([cites(&["e1"])]));
        let c = ProvenanceClassifier::new().classify(&msg).unwrap();
        assert!(c.unknown.contains(&0));
        assert!(c.known.is_empty());
    }

    #[test]
    fn test_literature_source_is_known() {
        let msg = message(json!({"e1": edge(Some("infores:some-literature-kp"))}), json!([cites(&["e1"])]));
        let c = ProvenanceClassifier::new().classify(&msg).unwrap();
        assert_eq!(c.class_of(0), Some(ResultClass::Known));
    }

    #[test]
    fn test_first_primary_source_edge_decides() {
        let msg = message(
            json!({
                "e0": edge(None),
                "e1": edge(Some("infores:arax")),
                "e2": edge(Some("infores:semmeddb"))
            }),
            json!([cites(&["e0", "e1", "e2"]), cites(&["e0", "e2", "e1"])]),
        );
        let c = ProvenanceClassifier::new().classify(&msg).unwrap();
        assert_eq!(c.class_of(0), Some(ResultClass::Unknown));
        assert_eq!(c.class_of(1), Some(ResultClass::Known));
    }

    #[test]
    fn test_short_circuit_skips_later_bindings() {
        // the dangling "missing" edge is never looked at
        let msg = message(json!({"e1": edge(Some("infores:ctd"))}), json!([cites(&["e1", "missing"])]));
        let c = ProvenanceClassifier::new().classify(&msg).unwrap();
        assert_eq!(c.class_of(0), Some(ResultClass::Known));
    }

    #[test]
    fn test_results_without_provenance_are_unclassified() {
        let msg = message(
            json!({"e0": edge(None)}),
            json!([{"node_bindings": {}}, cites(&["e0"]), {"analyses": []}]),
        );
        let c = ProvenanceClassifier::new().classify(&msg).unwrap();
        assert!(c.known.is_empty() && c.unknown.is_empty());
        assert_eq!(c.classified().count(), 0);
    }

    #[test]
    fn test_sets_are_disjoint() {
        let msg = message(
            json!({"a": edge(Some("infores:robokop")), "b": edge(Some("infores:chembl"))}),
            json!([cites(&["a"]), cites(&["b"]), cites(&["b", "a"]), cites(&["a", "b"])]),
        );
        let c = ProvenanceClassifier::new().classify(&msg).unwrap();
        assert!(c.known.is_disjoint(&c.unknown));
        assert_eq!(c.known.len() + c.unknown.len(), 4);
        let order: Vec<usize> = c.classified().map(|(i, _)| i).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_configurable_inferring_sources() {
        let msg = message(json!({"e1": edge(Some("infores:aragorn"))}), json!([cites(&["e1"])]));
        let c = ProvenanceClassifier::with_inferring_sources(["infores:custom"]).classify(&msg).unwrap();
        assert_eq!(c.class_of(0), Some(ResultClass::Known));
    }

    #[test]
    fn test_binding_without_id_is_fatal() {
        let msg = message(
            json!({"e1": edge(Some("infores:aragorn"))}),
            json!([{"analyses": [{"edge_bindings": {"e0": [{"attributes": []}]}}]}]),
        );
        let err = ProvenanceClassifier::new().classify(&msg).unwrap_err();
        assert!(matches!(err, NoveltyError::InputValidation(_)));
    }

    #[test]
    fn test_unknown_edge_id_is_fatal() {
        let msg = message(json!({}), json!([cites(&["ghost"])]));
        let err = ProvenanceClassifier::new().classify(&msg).unwrap_err();
        assert!(matches!(err, NoveltyError::InputValidation(_)));
    }
}
