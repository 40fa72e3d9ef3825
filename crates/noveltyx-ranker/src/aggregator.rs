//! Novelty aggregation: joins classified results to their edge evidence and
//! scores every (drug, edge) pair.
//!
//! Pipeline per response:
//! 1. classify results into KNOWN / UNKNOWN
//! 2. scan knowledge-graph edges into evidence records
//! 3. join each classified result's cited edges against the evidence
//! 4. canonicalise drug ids (optional normalizer)
//! 5. back-fill missing publication lists (optional provenance graph)
//! 6. date publications, compute recency
//! 7. similarity of unknown drugs to known drugs (optional structure lookup)
//! 8. combine into a novelty score per row

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use noveltyx_common::error::{NoveltyError, Result};
use noveltyx_common::trapi::TrapiResult;
use noveltyx_common::{ArsResponse, Message, QueryKind};
use noveltyx_ingestion::{IdentifierNormalizer, ProvenanceGraph, ResponseSource, StructureLookup};
use noveltyx_molecules::similarity::with_structures;
use noveltyx_molecules::SimilarityRanker;

use crate::evidence::{EvidenceExtractor, EvidenceRecord, FdaStatus};
use crate::known::{ProvenanceClassifier, ResultClass};
use crate::novelty::novelty_score;
use crate::params::NoveltyParams;
use crate::recency::recency;

pub const DEFAULT_SIMILARITY_CUTOFF: f64 = 0.5;
pub const DEFAULT_NEIGHBORS: usize = 1;

/// How several rows of the same drug collapse into one score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    Max,
    Mean,
    First,
}

/// Which edge-binding groups of a result are joined against the evidence.
/// Only the first group of an analysis is ever consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingScope {
    /// First group of the first analysis.
    #[default]
    FirstAnalysis,
    /// First group of every analysis.
    EveryAnalysis,
}

/// One scored (drug, edge) pair, or a result entity with no evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoveltyRow {
    pub drug_id: String,
    /// `None` for result entities that no cited edge resolves to.
    pub edge_id: Option<String>,
    pub result_index: usize,
    pub class: Option<ResultClass>,
    pub fda_status: Option<FdaStatus>,
    pub publication_count: Option<usize>,
    pub oldest_publication_age: Option<i32>,
    pub recency: Option<f64>,
    pub similarity: Option<f64>,
    pub score: f64,
}

impl NoveltyRow {
    fn unscored(drug_id: String, edge_id: Option<String>, result_index: usize, class: Option<ResultClass>) -> Self {
        Self {
            drug_id,
            edge_id,
            result_index,
            class,
            fda_status: None,
            publication_count: None,
            oldest_publication_age: None,
            recency: None,
            similarity: None,
            score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugScore {
    pub drug_id: String,
    pub score: f64,
}

/// Scores of one response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoveltyTable {
    /// `None` for responses that were not scorable.
    pub query_kind: Option<QueryKind>,
    pub rows: Vec<NoveltyRow>,
    /// Entities whose structure could not be parsed.
    pub structure_failures: Vec<String>,
}

impl NoveltyTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One score per drug, highest first. Equal scores keep first-seen order.
    pub fn ranked(&self, policy: DuplicatePolicy) -> Vec<DrugScore> {
        let mut order: Vec<&str> = Vec::new();
        let mut scores: HashMap<&str, Vec<f64>> = HashMap::new();
        for row in &self.rows {
            let entry = scores.entry(row.drug_id.as_str()).or_insert_with(|| {
                order.push(row.drug_id.as_str());
                Vec::new()
            });
            entry.push(row.score);
        }

        let mut ranked: Vec<DrugScore> = order
            .into_iter()
            .map(|drug| {
                let s = &scores[drug];
                let score = match policy {
                    DuplicatePolicy::Max => s.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    DuplicatePolicy::Mean => s.iter().sum::<f64>() / s.len() as f64,
                    DuplicatePolicy::First => s[0],
                };
                DrugScore { drug_id: drug.to_string(), score }
            })
            .collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// A classified result citing one evidence record.
struct Joined {
    result_index: usize,
    class: ResultClass,
    record: usize,
}

pub struct NoveltyAggregator {
    classifier: ProvenanceClassifier,
    extractor: EvidenceExtractor,
    params: NoveltyParams,
    scope: BindingScope,
    normalizer: Option<Arc<IdentifierNormalizer>>,
    structures: Option<Arc<dyn StructureLookup>>,
    provenance: Option<Arc<dyn ProvenanceGraph>>,
    ranker: SimilarityRanker,
    similarity_cutoff: f64,
    neighbors: usize,
}

impl NoveltyAggregator {
    pub fn new(extractor: EvidenceExtractor) -> Self {
        Self {
            classifier: ProvenanceClassifier::default(),
            extractor,
            params: NoveltyParams::default(),
            scope: BindingScope::default(),
            normalizer: None,
            structures: None,
            provenance: None,
            ranker: SimilarityRanker::default(),
            similarity_cutoff: DEFAULT_SIMILARITY_CUTOFF,
            neighbors: DEFAULT_NEIGHBORS,
        }
    }

    pub fn with_classifier(mut self, classifier: ProvenanceClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_params(mut self, params: NoveltyParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_binding_scope(mut self, scope: BindingScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<IdentifierNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn with_structures(mut self, structures: Arc<dyn StructureLookup>) -> Self {
        self.structures = Some(structures);
        self
    }

    pub fn with_provenance_graph(mut self, graph: Arc<dyn ProvenanceGraph>) -> Self {
        self.provenance = Some(graph);
        self
    }

    pub fn with_similarity(mut self, ranker: SimilarityRanker, cutoff: f64, neighbors: usize) -> Self {
        self.ranker = ranker;
        self.similarity_cutoff = cutoff;
        self.neighbors = neighbors;
        self
    }

    /// Score every agent response of a federation run. Malformed responses
    /// are logged and skipped; other errors abort the run.
    #[instrument(skip(self, source))]
    pub async fn score_run(&self, source: &dyn ResponseSource, run_id: &str) -> Result<BTreeMap<String, NoveltyTable>> {
        let responses = source.fetch_responses(run_id).await?;
        let mut tables = BTreeMap::new();
        for (agent, response) in &responses {
            match self.aggregate(response).await {
                Ok(table) => {
                    info!(%agent, rows = table.rows.len(), "agent response scored");
                    tables.insert(agent.clone(), table);
                }
                Err(e @ NoveltyError::InputValidation(_)) => {
                    warn!(%agent, error = %e, "skipping malformed response");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tables)
    }

    /// Score one response. Responses that are not Done, or have no results,
    /// give an empty table.
    #[instrument(skip_all)]
    pub async fn aggregate(&self, response: &ArsResponse) -> Result<NoveltyTable> {
        let message = match response.message() {
            Some(m) if response.is_done() && !m.results().is_empty() => m,
            _ => {
                debug!(status = ?response.status(), "response not scorable");
                return Ok(NoveltyTable::default());
            }
        };
        if !message.is_complete() {
            return Err(NoveltyError::invalid("message lacks query_graph or knowledge_graph"));
        }

        let kind = message.query_kind();
        let classification = self.classifier.classify(message)?;
        let scanned = EvidenceExtractor::scan(message);
        let by_edge: HashMap<&str, usize> =
            scanned.iter().enumerate().map(|(i, r)| (r.edge_id.as_str(), i)).collect();

        // Keep only the evidence cited by classified results.
        let mut joined = Vec::new();
        let mut positions: HashMap<usize, usize> = HashMap::new();
        let mut evidence: Vec<EvidenceRecord> = Vec::new();
        for (result_index, class) in classification.classified() {
            for edge_id in self.cited_edges(&message.results()[result_index])? {
                let scanned_index = *by_edge.get(edge_id).ok_or_else(|| {
                    NoveltyError::invalid(format!("edge {} is bound but missing from knowledge graph", edge_id))
                })?;
                let record = *positions.entry(scanned_index).or_insert_with(|| {
                    evidence.push(scanned[scanned_index].clone());
                    evidence.len() - 1
                });
                joined.push(Joined { result_index, class, record });
            }
        }

        let entities = result_entities(message);
        let canonical = self.canonical_ids(&evidence, &entities).await?;
        let canon = |id: &str| canonical.get(id).cloned().unwrap_or_else(|| id.to_string());

        let mut rows = Vec::with_capacity(joined.len());
        let mut structure_failures = Vec::new();

        if kind == QueryKind::Chemical {
            if let Some(graph) = &self.provenance {
                backfill_publications(graph.as_ref(), message, &mut evidence).await;
            }
            self.extractor.date(&mut evidence).await?;

            let (top_similarity, failures) = match &self.structures {
                Some(lookup) => self.similarities(lookup.as_ref(), &joined, &evidence, &canon).await?,
                None => (HashMap::new(), Vec::new()),
            };
            structure_failures = failures;

            for j in &joined {
                let record = &evidence[j.record];
                let drug_id = canon(&record.entity_id);
                let count = record.publication_count();
                let recency = recency(
                    Some(count as f64),
                    record.oldest_publication_age.map(f64::from),
                    &self.params.recency,
                );
                let similarity = match j.class {
                    ResultClass::Unknown => top_similarity.get(&drug_id).copied(),
                    ResultClass::Known => None,
                };
                let score = novelty_score(record.fda_status, recency, similarity, &self.params);
                rows.push(NoveltyRow {
                    drug_id,
                    edge_id: Some(record.edge_id.clone()),
                    result_index: j.result_index,
                    class: Some(j.class),
                    fda_status: record.fda_status,
                    publication_count: Some(count),
                    oldest_publication_age: record.oldest_publication_age,
                    recency,
                    similarity,
                    score,
                });
            }
        } else {
            for j in &joined {
                let record = &evidence[j.record];
                rows.push(NoveltyRow::unscored(
                    canon(&record.entity_id),
                    Some(record.edge_id.clone()),
                    j.result_index,
                    Some(j.class),
                ));
            }
        }

        // Result entities that no cited edge resolved to still get a row.
        let mut covered: HashSet<String> = rows.iter().map(|r| r.drug_id.clone()).collect();
        for (result_index, entity) in entities {
            let drug_id = canon(&entity);
            if covered.insert(drug_id.clone()) {
                rows.push(NoveltyRow::unscored(drug_id, None, result_index, classification.class_of(result_index)));
            }
        }

        info!(?kind, rows = rows.len(), failures = structure_failures.len(), "response aggregated");
        Ok(NoveltyTable { query_kind: Some(kind), rows, structure_failures })
    }

    fn cited_edges<'m>(&self, result: &'m TrapiResult) -> Result<Vec<&'m str>> {
        let analyses = result.analyses.as_deref().unwrap_or(&[]);
        let take = match self.scope {
            BindingScope::FirstAnalysis => 1,
            BindingScope::EveryAnalysis => analyses.len(),
        };
        let mut edges = Vec::new();
        for analysis in analyses.iter().take(take) {
            if let Some((_, bindings)) = analysis.edge_bindings.first() {
                for binding in bindings {
                    edges.push(binding.require_id()?);
                }
            }
        }
        Ok(edges)
    }

    async fn canonical_ids(
        &self,
        evidence: &[EvidenceRecord],
        entities: &[(usize, String)],
    ) -> Result<HashMap<String, String>> {
        let Some(normalizer) = &self.normalizer else {
            return Ok(HashMap::new());
        };
        let mut seen = HashSet::new();
        let ids: Vec<String> = evidence
            .iter()
            .map(|r| r.entity_id.clone())
            .chain(entities.iter().map(|(_, e)| e.clone()))
            .filter(|id| seen.insert(id.clone()))
            .collect();
        normalizer.canonical_ids(&ids).await
    }

    /// Top-neighbour similarity per unknown drug, plus parse failures.
    async fn similarities(
        &self,
        lookup: &dyn StructureLookup,
        joined: &[Joined],
        evidence: &[EvidenceRecord],
        canon: &impl Fn(&str) -> String,
    ) -> Result<(HashMap<String, f64>, Vec<String>)> {
        let mut known = Vec::new();
        let mut unknown = Vec::new();
        let mut seen: HashSet<(ResultClass, String)> = HashSet::new();
        for j in joined {
            let drug = canon(&evidence[j.record].entity_id);
            if seen.insert((j.class, drug.clone())) {
                match j.class {
                    ResultClass::Known => known.push(drug),
                    ResultClass::Unknown => unknown.push(drug),
                }
            }
        }
        if unknown.is_empty() || known.is_empty() {
            return Ok((HashMap::new(), Vec::new()));
        }

        let mut all: Vec<String> = known.iter().chain(unknown.iter()).cloned().collect();
        all.sort();
        all.dedup();
        let outcomes = lookup.lookup_structures(&all).await?;

        let report = self.ranker.rank(
            &with_structures(&unknown, &outcomes),
            &with_structures(&known, &outcomes),
            self.similarity_cutoff,
            self.neighbors,
        );
        let similarity = unknown
            .iter()
            .filter_map(|id| report.top_similarity(id).map(|s| (id.clone(), s)))
            .collect();
        let failures = report.failures.iter().map(ToString::to_string).collect();
        Ok((similarity, failures))
    }
}

/// Entity ids bound to non-pinned query nodes, with their result index.
fn result_entities(message: &Message) -> Vec<(usize, String)> {
    let Some(qg) = &message.query_graph else {
        return Vec::new();
    };
    let open_nodes: Vec<&str> = qg.nodes.iter().filter(|(_, n)| !n.is_pinned()).map(|(k, _)| k.as_str()).collect();
    message
        .results()
        .iter()
        .enumerate()
        .flat_map(|(index, result)| {
            open_nodes
                .iter()
                .filter_map(|key| result.node_bindings.get(*key))
                .flatten()
                .filter_map(|b| b.id.clone())
                .map(move |id| (index, id))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Give records without a publications attribute the publications the
/// provenance graph links to (pinned node, entity). Failures are logged.
async fn backfill_publications(graph: &dyn ProvenanceGraph, message: &Message, evidence: &mut [EvidenceRecord]) {
    let Some(subject) = message.query_graph.as_ref().and_then(|qg| qg.pinned_ids().first().map(|s| s.to_string()))
    else {
        return;
    };
    let mut seen = HashSet::new();
    let objects: Vec<String> = evidence
        .iter()
        .filter(|r| r.publications.is_none())
        .map(|r| r.entity_id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect();
    if objects.is_empty() {
        return;
    }

    match graph.query_provenance_publications(&subject, &objects).await {
        Ok(links) => {
            let mut filled = 0;
            for record in evidence.iter_mut().filter(|r| r.publications.is_none()) {
                if let Some(pubs) = links.get(&(subject.clone(), record.entity_id.clone())) {
                    record.publications = Some(pubs.iter().cloned().collect());
                    filled += 1;
                }
            }
            debug!(filled, "publications back-filled from provenance graph");
        }
        Err(e) => warn!(error = %e, "provenance back-fill failed, publications left empty"),
    }
}
