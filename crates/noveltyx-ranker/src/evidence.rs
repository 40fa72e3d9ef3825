//! Per-edge evidence extraction.
//!
//! One record per knowledge-graph edge, in graph order. For chemical queries
//! the record carries the FDA status and the publication list of the edge;
//! the oldest-publication age is filled in by [`EvidenceExtractor::date`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use noveltyx_common::curie::{
    has_any_prefix, PublicationId, CHEMICAL_PREFIXES, DISEASE_PREFIXES, GENE_PREFIXES,
};
use noveltyx_common::error::Result;
use noveltyx_common::trapi::KgEdge;
use noveltyx_common::{Message, QueryKind};
use noveltyx_ingestion::PublicationYearSource;

pub const FDA_ATTRIBUTE_TYPES: &[&str] = &["biolink:FDA_approval_status", "biolink:FDA_APPROVAL_STATUS"];
pub const PUBLICATION_ATTRIBUTE_TYPES: &[&str] =
    &["biolink:publications", "biolink:Publication", "biolink:publication"];
pub const FDA_APPROVED_VALUE: &str = "FDA Approval";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdaStatus {
    Approved,
    NotApproved,
}

impl FdaStatus {
    /// 0.0 for approved, 1.0 otherwise.
    pub fn as_signal(self) -> f64 {
        match self {
            FdaStatus::Approved => 0.0,
            FdaStatus::NotApproved => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub edge_id: String,
    /// The drug for chemical queries, otherwise the entity of interest.
    pub entity_id: String,
    pub fda_status: Option<FdaStatus>,
    /// `None` when the edge has no publications attribute.
    pub publications: Option<Vec<String>>,
    pub oldest_publication_age: Option<i32>,
}

impl EvidenceRecord {
    /// Length of the publication list, 0 without a publications attribute.
    pub fn publication_count(&self) -> usize {
        self.publications.as_ref().map_or(0, Vec::len)
    }
}

/// Pick the entity of interest from an edge's endpoints.
pub fn resolve_entity<'a>(kind: QueryKind, subject: &'a str, object: &'a str) -> &'a str {
    let prefixes = match kind {
        QueryKind::Chemical => CHEMICAL_PREFIXES,
        QueryKind::Gene => GENE_PREFIXES,
        QueryKind::Disease => DISEASE_PREFIXES,
        QueryKind::Other => {
            // The subject unless it is the disease.
            return if has_any_prefix(subject, DISEASE_PREFIXES) { object } else { subject };
        }
    };
    if has_any_prefix(subject, prefixes) {
        subject
    } else {
        object
    }
}

fn fda_status(edge: &KgEdge) -> Option<FdaStatus> {
    let attr = edge.first_attribute(FDA_ATTRIBUTE_TYPES)?;
    if attr.value.as_str() == Some(FDA_APPROVED_VALUE) {
        Some(FdaStatus::Approved)
    } else {
        Some(FdaStatus::NotApproved)
    }
}

fn publications(edge: &KgEdge) -> Option<Vec<String>> {
    let attr = edge.first_attribute(PUBLICATION_ATTRIBUTE_TYPES)?;
    let ids = match &attr.value {
        serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_str()).map(String::from).collect(),
        serde_json::Value::String(single) => vec![single.clone()],
        _ => Vec::new(),
    };
    Some(ids)
}

pub struct EvidenceExtractor {
    years: Arc<dyn PublicationYearSource>,
    current_year: i32,
}

impl EvidenceExtractor {
    pub fn new(years: Arc<dyn PublicationYearSource>) -> Self {
        Self { years, current_year: chrono::Utc::now().year() }
    }

    /// Fix the reference year used for publication ages.
    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = year;
        self
    }

    /// Records for every edge, without publication ages.
    pub fn scan(message: &Message) -> Vec<EvidenceRecord> {
        let kind = message.query_kind();
        let Some(kg) = &message.knowledge_graph else {
            return Vec::new();
        };
        kg.edges
            .iter()
            .map(|(edge_id, edge)| {
                let entity_id = resolve_entity(kind, &edge.subject, &edge.object).to_string();
                let (fda_status, publications) = match kind {
                    QueryKind::Chemical => (fda_status(edge), publications(edge)),
                    _ => (None, None),
                };
                EvidenceRecord {
                    edge_id: edge_id.to_string(),
                    entity_id,
                    fda_status,
                    publications,
                    oldest_publication_age: None,
                }
            })
            .collect()
    }

    /// Fill in `oldest_publication_age` from the years of PMID / PMC ids.
    /// Other ids are counted but never dated.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn date(&self, records: &mut [EvidenceRecord]) -> Result<()> {
        let datable: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.publications.iter().flatten())
            .filter(|id| PublicationId::parse(id).is_datable())
            .cloned()
            .collect();
        if datable.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = datable.into_iter().collect();
        let years = self.years.resolve_publication_years(&ids).await?;
        debug!(requested = ids.len(), resolved = years.len(), "publication years resolved");

        for record in records.iter_mut() {
            let oldest = record
                .publications
                .iter()
                .flatten()
                .filter_map(|id| years.get(id))
                .min();
            record.oldest_publication_age = oldest.map(|year| self.current_year - year);
        }
        Ok(())
    }

    /// Scan and date every edge of the message.
    pub async fn extract(&self, message: &Message) -> Result<Vec<EvidenceRecord>> {
        let mut records = Self::scan(message);
        self.date(&mut records).await?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use noveltyx_common::NoveltyError;
    use serde_json::json;
    use std::collections::HashMap;

    struct Years(HashMap<&'static str, i32>);

    #[async_trait]
    impl PublicationYearSource for Years {
        async fn resolve_publication_years(&self, ids: &[String]) -> Result<HashMap<String, i32>> {
            Ok(ids
                .iter()
                .filter_map(|id| self.0.get(id.as_str()).map(|y| (id.clone(), *y)))
                .collect())
        }
    }

    struct Down;

    #[async_trait]
    impl PublicationYearSource for Down {
        async fn resolve_publication_years(&self, _ids: &[String]) -> Result<HashMap<String, i32>> {
            Err(NoveltyError::PropagatedServiceFailure { service: "pubmed", chunks: 1 })
        }
    }

    fn extractor() -> EvidenceExtractor {
        let years = Years(HashMap::from([("PMID:100", 2010), ("PMID:101", 2018), ("PMC:PMC9", 2001)]));
        EvidenceExtractor::new(Arc::new(years)).with_current_year(2024)
    }

    fn message(category: &str, edges: serde_json::Value) -> Message {
        serde_json::from_value(json!({
            "query_graph": {"nodes": {
                "n0": {"ids": ["MONDO:0005148"], "categories": ["biolink:Disease"]},
                "n1": {"categories": [category]}
            }},
            "knowledge_graph": {"edges": edges},
            "results": []
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_entity_prefix_rules() {
        assert_eq!(resolve_entity(QueryKind::Chemical, "MONDO:1", "CHEMBL.COMPOUND:CHEMBL25"), "CHEMBL.COMPOUND:CHEMBL25");
        assert_eq!(resolve_entity(QueryKind::Chemical, "UNII:R16CO5Y76E", "MONDO:1"), "UNII:R16CO5Y76E");
        assert_eq!(resolve_entity(QueryKind::Chemical, "CHEBI:1", "MONDO:1"), "MONDO:1");
        assert_eq!(resolve_entity(QueryKind::Gene, "NCBIGene:3845", "MONDO:1"), "NCBIGene:3845");
        assert_eq!(resolve_entity(QueryKind::Disease, "NCBIGene:3845", "MONDO:1"), "MONDO:1");
        assert_eq!(resolve_entity(QueryKind::Other, "MONDO:1", "HP:2"), "HP:2");
        assert_eq!(resolve_entity(QueryKind::Other, "HP:2", "MONDO:1"), "HP:2");
    }

    #[tokio::test]
    async fn test_extracts_fda_and_publications() {
        let msg = message(
            "biolink:ChemicalEntity",
            json!({
                "e1": {"subject": "PUBCHEM.COMPOUND:2244", "object": "MONDO:0005148", "attributes": [
                    {"attribute_type_id": "biolink:FDA_approval_status", "value": "FDA Approval"},
                    {"attribute_type_id": "biolink:publications", "value": ["PMID:100", "PMID:101", "doi:10.1/x", "PMC:PMC9"]},
                    {"attribute_type_id": "biolink:FDA_APPROVAL_STATUS", "value": "Not approved"}
                ]},
                "e2": {"subject": "MONDO:0005148", "object": "CHEBI:6801", "attributes": [
                    {"attribute_type_id": "biolink:FDA_APPROVAL_STATUS", "value": "Phase 3"},
                    {"attribute_type_id": "biolink:Publication", "value": ["doi:10.1/y"]}
                ]},
                "e3": {"subject": "RXNORM:1", "object": "MONDO:0005148"}
            }),
        );
        let records = extractor().extract(&msg).await.unwrap();
        assert_eq!(records.len(), 3);

        let e1 = &records[0];
        assert_eq!(e1.edge_id, "e1");
        assert_eq!(e1.entity_id, "PUBCHEM.COMPOUND:2244");
        assert_eq!(e1.fda_status, Some(FdaStatus::Approved));
        assert_eq!(e1.publication_count(), 4);
        assert_eq!(e1.oldest_publication_age, Some(23));

        let e2 = &records[1];
        assert_eq!(e2.entity_id, "CHEBI:6801");
        assert_eq!(e2.fda_status, Some(FdaStatus::NotApproved));
        assert_eq!(e2.publication_count(), 1);
        assert_eq!(e2.oldest_publication_age, None);

        let e3 = &records[2];
        assert_eq!(e3.fda_status, None);
        assert_eq!(e3.publications, None);
        assert_eq!(e3.publication_count(), 0);
        assert_eq!(e3.oldest_publication_age, None);
    }

    #[tokio::test]
    async fn test_non_chemical_query_carries_only_ids() {
        let msg = message(
            "biolink:Gene",
            json!({"e1": {"subject": "NCBIGene:3845", "object": "MONDO:1", "attributes": [
                {"attribute_type_id": "biolink:FDA_approval_status", "value": "FDA Approval"},
                {"attribute_type_id": "biolink:publications", "value": ["PMID:100"]}
            ]}}),
        );
        let records = EvidenceExtractor::new(Arc::new(Down)).extract(&msg).await.unwrap();
        assert_eq!(records[0].entity_id, "NCBIGene:3845");
        assert_eq!(records[0].fda_status, None);
        assert_eq!(records[0].publications, None);
    }

    #[tokio::test]
    async fn test_keeps_graph_order() {
        let msg = message(
            "biolink:Drug",
            json!({
                "z": {"subject": "PUBCHEM.COMPOUND:3", "object": "MONDO:1"},
                "a": {"subject": "PUBCHEM.COMPOUND:1", "object": "MONDO:1"},
                "m": {"subject": "PUBCHEM.COMPOUND:2", "object": "MONDO:1"}
            }),
        );
        let records = extractor().extract(&msg).await.unwrap();
        let order: Vec<&str> = records.iter().map(|r| r.edge_id.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn test_total_dating_failure_propagates() {
        let msg = message(
            "biolink:SmallMolecule",
            json!({"e1": {"subject": "PUBCHEM.COMPOUND:1", "object": "MONDO:1", "attributes": [
                {"attribute_type_id": "biolink:publications", "value": ["PMID:1"]}
            ]}}),
        );
        let err = EvidenceExtractor::new(Arc::new(Down)).extract(&msg).await.unwrap_err();
        assert!(matches!(err, NoveltyError::PropagatedServiceFailure { .. }));
    }
}
