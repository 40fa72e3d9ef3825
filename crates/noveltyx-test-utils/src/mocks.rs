//! In-memory stand-ins for the external collaborators.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use noveltyx_common::error::{NoveltyError, Result};
use noveltyx_common::{ArsResponse, StructureOutcome};
use noveltyx_ingestion::{
    NormalizationService, NormalizedNode, ProvenanceGraph, PublicationYearSource, ResponseSource, StructureLookup,
};

// ── Publication years ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockYearSource {
    years: HashMap<String, i32>,
    down: bool,
    requests: Mutex<Vec<Vec<String>>>,
}

impl MockYearSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, year: i32) -> Self {
        self.years.insert(id.to_string(), year);
        self
    }

    /// Every call fails as if all chunks had failed.
    pub fn down() -> Self {
        Self { down: true, ..Self::default() }
    }

    /// Ids passed to each call, in call order.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PublicationYearSource for MockYearSource {
    async fn resolve_publication_years(&self, ids: &[String]) -> Result<HashMap<String, i32>> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(ids.to_vec());
        }
        if self.down {
            return Err(NoveltyError::PropagatedServiceFailure { service: "pubmed", chunks: 1 });
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.years.get(id).map(|y| (id.clone(), *y)))
            .collect())
    }
}

// ── Structures ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStructureLookup {
    outcomes: HashMap<String, StructureOutcome>,
    calls: AtomicUsize,
}

impl MockStructureLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, smiles: &str) -> Self {
        self.outcomes.insert(id.to_string(), StructureOutcome::Found(smiles.to_string()));
        self
    }

    pub fn with_outcome(mut self, id: &str, outcome: StructureOutcome) -> Self {
        self.outcomes.insert(id.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructureLookup for MockStructureLookup {
    /// Ids without a configured outcome are `NotFound`.
    async fn lookup_structures(&self, ids: &[String]) -> Result<HashMap<String, StructureOutcome>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .map(|id| {
                let outcome = self.outcomes.get(id).cloned().unwrap_or(StructureOutcome::NotFound);
                (id.clone(), outcome)
            })
            .collect())
    }
}

// ── Normalization ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNormalization {
    canonical: HashMap<String, String>,
    failing: BTreeSet<String>,
    requests: AtomicUsize,
}

impl MockNormalization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, canonical: &str) -> Self {
        self.canonical.insert(id.to_string(), canonical.to_string());
        self
    }

    /// Any chunk containing `id` fails.
    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NormalizationService for MockNormalization {
    async fn normalize_chunk(&self, ids: &[String]) -> Result<HashMap<String, NormalizedNode>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if ids.iter().any(|id| self.failing.contains(id)) {
            return Err(NoveltyError::service("node-normalizer", "status 503"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| {
                let canonical = self.canonical.get(id)?;
                let node = NormalizedNode {
                    identifier: canonical.clone(),
                    label: None,
                    equivalent_identifiers: vec![canonical.clone(), id.clone()],
                };
                Some((id.clone(), node))
            })
            .collect())
    }
}

// ── Provenance graph ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockProvenanceGraph {
    links: HashMap<(String, String), BTreeSet<String>>,
    down: bool,
}

impl MockProvenanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, subject: &str, object: &str, publications: &[&str]) -> Self {
        self.links
            .entry((subject.to_string(), object.to_string()))
            .or_default()
            .extend(publications.iter().map(|p| p.to_string()));
        self
    }

    pub fn down() -> Self {
        Self { down: true, ..Self::default() }
    }
}

#[async_trait]
impl ProvenanceGraph for MockProvenanceGraph {
    async fn query_provenance_publications(
        &self,
        subject_id: &str,
        object_ids: &[String],
    ) -> Result<HashMap<(String, String), BTreeSet<String>>> {
        if self.down {
            return Err(NoveltyError::service("provenance-graph", "connection refused"));
        }
        Ok(object_ids
            .iter()
            .filter_map(|object| {
                let key = (subject_id.to_string(), object.clone());
                self.links.get(&key).map(|pubs| (key, pubs.clone()))
            })
            .collect())
    }
}

// ── ARS ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockResponseSource {
    runs: HashMap<String, BTreeMap<String, ArsResponse>>,
}

impl MockResponseSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, run_id: &str, agent: &str, response: ArsResponse) -> Self {
        self.runs.entry(run_id.to_string()).or_default().insert(agent.to_string(), response);
        self
    }
}

#[async_trait]
impl ResponseSource for MockResponseSource {
    async fn fetch_responses(&self, run_id: &str) -> Result<BTreeMap<String, ArsResponse>> {
        self.runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| NoveltyError::service("ars", format!("unknown run {}", run_id)))
    }
}
