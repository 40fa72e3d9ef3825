//! TRAPI-shaped response types as returned by the ARS.
//!
//! Only the fields the scoring pipeline reads are modelled. Maps whose
//! iteration order matters (knowledge-graph edges, edge-binding groups)
//! deserialize into [`OrderedMap`], which keeps document order.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{NoveltyError, Result};

/// String-keyed map in document order. A repeated key keeps its first
/// position and takes the later value.
pub type OrderedMap<V> = IndexMap<String, V>;

// ---------------------------------------------------------------------------
// ARS envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    Done,
    Error,
    Other(String),
}

impl From<String> for CompletionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Done" => CompletionStatus::Done,
            "Error" => CompletionStatus::Error,
            _ => CompletionStatus::Other(s),
        }
    }
}

impl From<CompletionStatus> for String {
    fn from(s: CompletionStatus) -> Self {
        match s {
            CompletionStatus::Done => "Done".to_string(),
            CompletionStatus::Error => "Error".to_string(),
            CompletionStatus::Other(s) => s,
        }
    }
}

impl Serialize for CompletionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from(self.clone()))
    }
}

impl<'de> Deserialize<'de> for CompletionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(String::deserialize(deserializer)?.into())
    }
}

/// One agent's answer as stored by the ARS: `{"fields": {"status", "data": {"message"}}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArsResponse {
    pub fields: ArsFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArsFields {
    pub status: CompletionStatus,
    #[serde(default)]
    pub data: Option<ArsData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArsData {
    pub message: Message,
}

impl ArsResponse {
    pub fn new(status: CompletionStatus, message: Message) -> Self {
        Self { fields: ArsFields { status, data: Some(ArsData { message }) } }
    }

    /// Parse a raw response document. Structural problems are input-validation errors.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| NoveltyError::invalid(format!("malformed response: {}", e)))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| NoveltyError::invalid(format!("malformed response: {}", e)))
    }

    pub fn status(&self) -> &CompletionStatus {
        &self.fields.status
    }

    pub fn is_done(&self) -> bool {
        self.fields.status == CompletionStatus::Done
    }

    pub fn message(&self) -> Option<&Message> {
        self.fields.data.as_ref().map(|d| &d.message)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub query_graph: Option<QueryGraph>,
    #[serde(default)]
    pub knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default)]
    pub results: Option<Vec<TrapiResult>>,
}

impl Message {
    /// True when query graph, knowledge graph and results are all present.
    pub fn is_complete(&self) -> bool {
        self.query_graph.is_some() && self.knowledge_graph.is_some() && self.results.is_some()
    }

    pub fn results(&self) -> &[TrapiResult] {
        self.results.as_deref().unwrap_or(&[])
    }

    /// Category-derived kind of the node the query asks for.
    pub fn query_kind(&self) -> QueryKind {
        self.query_graph
            .as_ref()
            .and_then(|qg| qg.unpinned_category())
            .map(QueryKind::from_category)
            .unwrap_or(QueryKind::Other)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryGraph {
    #[serde(default)]
    pub nodes: OrderedMap<QNode>,
}

impl QueryGraph {
    /// Category of the last non-pinned node.
    pub fn unpinned_category(&self) -> Option<&str> {
        self.nodes
            .values()
            .filter(|n| !n.is_pinned())
            .last()
            .and_then(|n| n.categories.first())
            .map(String::as_str)
    }

    pub fn pinned_node_keys(&self) -> Vec<&str> {
        self.nodes.iter().filter(|(_, n)| n.is_pinned()).map(|(k, _)| k.as_str()).collect()
    }

    /// The identifiers supplied by the caller on pinned nodes.
    pub fn pinned_ids(&self) -> Vec<&str> {
        self.nodes
            .values()
            .filter(|n| n.is_pinned())
            .flat_map(|n| n.ids.iter().flatten().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QNode {
    #[serde(default)]
    pub ids: Option<Vec<String>>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl QNode {
    pub fn is_pinned(&self) -> bool {
        self.ids.as_ref().is_some_and(|ids| !ids.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    #[serde(default)]
    pub edges: OrderedMap<KgEdge>,
}

impl KnowledgeGraph {
    pub fn edge(&self, id: &str) -> Result<&KgEdge> {
        self.edges
            .get(id)
            .ok_or_else(|| NoveltyError::invalid(format!("edge {} is bound but missing from knowledge graph", id)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KgEdge {
    pub subject: String,
    pub object: String,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub sources: Vec<RetrievalSource>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

pub const PRIMARY_KNOWLEDGE_SOURCE: &str = "primary_knowledge_source";

impl KgEdge {
    /// Resource id of the primary knowledge source, if the edge declares one.
    pub fn primary_knowledge_source(&self) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.resource_role == PRIMARY_KNOWLEDGE_SOURCE)
            .map(|s| s.resource_id.as_str())
    }

    /// First attribute whose type id is one of `type_ids`.
    pub fn first_attribute(&self, type_ids: &[&str]) -> Option<&Attribute> {
        self.attributes.iter().find(|a| type_ids.contains(&a.attribute_type_id.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSource {
    pub resource_id: String,
    pub resource_role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub attribute_type_id: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrapiResult {
    #[serde(default)]
    pub node_bindings: OrderedMap<Vec<Binding>>,
    #[serde(default)]
    pub analyses: Option<Vec<Analysis>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub edge_bindings: OrderedMap<Vec<Binding>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Binding {
    #[serde(default)]
    pub id: Option<String>,
}

impl Binding {
    pub fn require_id(&self) -> Result<&str> {
        self.id.as_deref().ok_or_else(|| NoveltyError::invalid("binding without \"id\""))
    }
}

// ---------------------------------------------------------------------------
// Query kind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Chemical,
    Gene,
    Disease,
    Other,
}

impl QueryKind {
    pub fn from_category(category: &str) -> Self {
        match category {
            "biolink:ChemicalEntity" | "biolink:SmallMolecule" | "biolink:Drug" => QueryKind::Chemical,
            "biolink:Gene" | "biolink:Protein" => QueryKind::Gene,
            "biolink:Disease" | "biolink:Phenotype" | "biolink:PhenotypicFeature" => QueryKind::Disease,
            _ => QueryKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_map_keeps_document_order() {
        let raw = r#"{"zeta": 1, "alpha": 2, "mid": 3}"#;
        let map: OrderedMap<u32> = serde_json::from_str(raw).unwrap();
        assert_eq!(map.keys().map(String::as_str).collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(map.first(), Some((&"zeta".to_string(), &1)));
        assert_eq!(map.get("mid"), Some(&3));
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"zeta":1,"alpha":2,"mid":3}"#);
    }

    #[test]
    fn test_ordered_map_duplicate_key_replaces_in_place() {
        let map: OrderedMap<u32> = serde_json::from_str(r#"{"a": 1, "b": 2, "a": 3}"#).unwrap();
        assert_eq!(map.len(), 2);
        let entries: Vec<(&str, u32)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(entries, vec![("a", 3), ("b", 2)]);
    }

    #[test]
    fn test_status_parsing() {
        let raw = r#"{"fields": {"status": "Running"}}"#;
        let resp = ArsResponse::from_json(raw).unwrap();
        assert_eq!(resp.status(), &CompletionStatus::Other("Running".into()));
        assert!(resp.message().is_none());
    }

    #[test]
    fn test_query_kind_from_unpinned_node() {
        let raw = r#"{
            "query_graph": {"nodes": {
                "on": {"ids": ["MONDO:0005148"], "categories": ["biolink:Disease"]},
                "sn": {"categories": ["biolink:ChemicalEntity"]}
            }}
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.query_kind(), QueryKind::Chemical);
        let qg = msg.query_graph.unwrap();
        assert_eq!(qg.pinned_ids(), vec!["MONDO:0005148"]);
        assert_eq!(qg.pinned_node_keys(), vec!["on"]);
    }

    #[test]
    fn test_empty_ids_is_not_pinned() {
        let node = QNode { ids: Some(vec![]), categories: vec!["biolink:Gene".into()] };
        assert!(!node.is_pinned());
    }

    #[test]
    fn test_edge_missing_subject_is_validation_error() {
        let raw = r#"{"fields": {"status": "Done", "data": {"message": {
            "knowledge_graph": {"edges": {"e1": {"object": "MONDO:1"}}}
        }}}}"#;
        assert!(matches!(ArsResponse::from_json(raw), Err(NoveltyError::InputValidation(_))));
    }

    #[test]
    fn test_primary_knowledge_source_lookup() {
        let edge = KgEdge {
            subject: "CHEBI:1".into(),
            object: "MONDO:1".into(),
            predicate: None,
            sources: vec![
                RetrievalSource { resource_id: "infores:arax".into(), resource_role: "aggregator_knowledge_source".into() },
                RetrievalSource { resource_id: "infores:ctd".into(), resource_role: PRIMARY_KNOWLEDGE_SOURCE.into() },
            ],
            attributes: vec![],
        };
        assert_eq!(edge.primary_knowledge_source(), Some("infores:ctd"));
    }
}
