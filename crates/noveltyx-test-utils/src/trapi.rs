//! Builders for TRAPI-shaped ARS responses.

use serde_json::{json, Map, Value};

use noveltyx_common::ArsResponse;

/// One knowledge-graph edge.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    id: String,
    subject: String,
    object: String,
    primary_source: Option<String>,
    attributes: Vec<Value>,
}

impl EdgeSpec {
    pub fn new(id: &str, subject: &str, object: &str) -> Self {
        Self {
            id: id.to_string(),
            subject: subject.to_string(),
            object: object.to_string(),
            primary_source: None,
            attributes: Vec::new(),
        }
    }

    pub fn source(mut self, infores: &str) -> Self {
        self.primary_source = Some(infores.to_string());
        self
    }

    pub fn fda(self, value: &str) -> Self {
        self.attribute("biolink:FDA_approval_status", json!(value))
    }

    pub fn publications(self, ids: &[&str]) -> Self {
        self.attribute("biolink:publications", json!(ids))
    }

    pub fn attribute(mut self, type_id: &str, value: Value) -> Self {
        self.attributes.push(json!({"attribute_type_id": type_id, "value": value}));
        self
    }

    fn to_json(&self) -> Value {
        let mut sources = vec![json!({
            "resource_id": "infores:aragorn",
            "resource_role": "aggregator_knowledge_source"
        })];
        if let Some(primary) = &self.primary_source {
            sources.push(json!({"resource_id": primary, "resource_role": "primary_knowledge_source"}));
        }
        json!({
            "subject": self.subject,
            "object": self.object,
            "predicate": "biolink:treats",
            "sources": sources,
            "attributes": self.attributes,
        })
    }
}

/// Builds a one-hop "what treats <disease>" style response.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    status: String,
    pinned_id: String,
    pinned_category: String,
    open_category: String,
    edges: Vec<EdgeSpec>,
    results: Vec<Value>,
}

impl ResponseBuilder {
    /// Pinned disease node `n0`, open chemical node `n1`.
    pub fn treats(disease: &str) -> Self {
        Self {
            status: "Done".to_string(),
            pinned_id: disease.to_string(),
            pinned_category: "biolink:Disease".to_string(),
            open_category: "biolink:ChemicalEntity".to_string(),
            edges: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    /// Category of the open (answer) node.
    pub fn asking_for(mut self, category: &str) -> Self {
        self.open_category = category.to_string();
        self
    }

    pub fn edge(mut self, edge: EdgeSpec) -> Self {
        self.edges.push(edge);
        self
    }

    /// A result binding `n1` to `entity`, citing `edge_ids` in one analysis.
    pub fn result(self, entity: &str, edge_ids: &[&str]) -> Self {
        self.result_with_analyses(entity, &[edge_ids])
    }

    /// A result with one analysis per slice of edge ids.
    pub fn result_with_analyses(mut self, entity: &str, analyses: &[&[&str]]) -> Self {
        let analyses: Vec<Value> = analyses
            .iter()
            .map(|ids| {
                let bindings: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
                json!({"resource_id": "infores:aragorn", "edge_bindings": {"e0": bindings}})
            })
            .collect();
        self.results.push(json!({
            "node_bindings": {
                "n0": [{"id": self.pinned_id}],
                "n1": [{"id": entity}]
            },
            "analyses": analyses
        }));
        self
    }

    /// A result carrying no analyses.
    pub fn bare_result(mut self, entity: &str) -> Self {
        self.results.push(json!({
            "node_bindings": {"n0": [{"id": self.pinned_id}], "n1": [{"id": entity}]}
        }));
        self
    }

    pub fn to_json(&self) -> Value {
        let mut edges = Map::new();
        for edge in &self.edges {
            edges.insert(edge.id.clone(), edge.to_json());
        }
        json!({
            "fields": {
                "status": self.status,
                "data": {
                    "message": {
                        "query_graph": {
                            "nodes": {
                                "n0": {"ids": [self.pinned_id], "categories": [self.pinned_category]},
                                "n1": {"categories": [self.open_category]}
                            },
                            "edges": {"e0": {"subject": "n1", "object": "n0", "predicates": ["biolink:treats"]}}
                        },
                        "knowledge_graph": {"nodes": {}, "edges": edges},
                        "results": self.results
                    }
                }
            }
        })
    }

    pub fn build(&self) -> ArsResponse {
        ArsResponse::from_value(self.to_json()).expect("builder produced an invalid response")
    }
}
