//! Configuration loading for noveltyx.
//! Reads noveltyx.toml from the current directory or path in NOVELTYX_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;

use noveltyx_ranker::{BindingScope, DuplicatePolicy, NoveltyParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Run ids scored when none are given on the command line.
    #[serde(default)]
    pub runs: Vec<String>,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_ars_url")]
    pub ars_url: String,
    #[serde(default = "default_node_norm_url")]
    pub node_norm_url: String,
    pub pubmed_api_key: Option<String>,
    #[serde(default = "default_molepro_url")]
    pub molepro_url: String,
    #[serde(default = "default_pubchem_url")]
    pub pubchem_url: String,
    pub provenance: Option<ProvenanceConfig>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            ars_url: default_ars_url(),
            node_norm_url: default_node_norm_url(),
            pubmed_api_key: None,
            molepro_url: default_molepro_url(),
            pubchem_url: default_pubchem_url(),
            provenance: None,
        }
    }
}

fn default_ars_url()       -> String { noveltyx_ingestion::sources::ars::ARS_URL.to_string() }
fn default_node_norm_url() -> String { noveltyx_ingestion::normalise::node_norm::NODE_NORM_URL.to_string() }
fn default_molepro_url()   -> String { noveltyx_ingestion::sources::structure::MOLEPRO_URL.to_string() }
fn default_pubchem_url()   -> String { noveltyx_ingestion::sources::structure::PUBCHEM_URL.to_string() }

/// Neo4j HTTP endpoint used to back-fill publications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceConfig {
    pub url: String,
    #[serde(default = "default_neo4j_database")]
    pub database: String,
    pub user: Option<String>,
    pub password_secret: Option<String>,
}

fn default_neo4j_database() -> String { "neo4j".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_inferring_sources")]
    pub inferring_sources: Vec<String>,
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    #[serde(default)]
    pub binding_scope: BindingScope,
    /// Reference year for publication ages; defaults to the current year.
    pub current_year: Option<i32>,
    #[serde(default)]
    pub params: NoveltyParams,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            inferring_sources: default_inferring_sources(),
            duplicate_policy: DuplicatePolicy::default(),
            binding_scope: BindingScope::default(),
            current_year: None,
            params: NoveltyParams::default(),
        }
    }
}

fn default_inferring_sources() -> Vec<String> {
    noveltyx_ranker::known::DEFAULT_INFERRING_SOURCES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
    #[serde(default = "default_neighbors")]
    pub neighbors: usize,
    #[serde(default = "default_radius")]
    pub radius: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self { enabled: true, cutoff: default_cutoff(), neighbors: default_neighbors(), radius: default_radius() }
    }
}

fn bool_true()         -> bool  { true }
fn default_cutoff()    -> f64   { noveltyx_ranker::aggregator::DEFAULT_SIMILARITY_CUTOFF }
fn default_neighbors() -> usize { noveltyx_ranker::aggregator::DEFAULT_NEIGHBORS }
fn default_radius()    -> usize { noveltyx_molecules::fingerprint::DEFAULT_RADIUS }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingConfig {
    #[serde(default = "default_normalize_chunk")]
    pub normalize_chunk: usize,
    #[serde(default = "default_publication_chunk")]
    pub publication_chunk: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            normalize_chunk: default_normalize_chunk(),
            publication_chunk: default_publication_chunk(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_normalize_chunk()   -> usize { noveltyx_ingestion::normalise::DEFAULT_NORMALIZE_CHUNK }
fn default_publication_chunk() -> usize { noveltyx_ingestion::sources::pubmed::DEFAULT_PUBLICATION_CHUNK }
fn default_concurrency()       -> usize { 4 }


impl Config {
    /// Load configuration from noveltyx.toml.
    /// Checks NOVELTYX_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("NOVELTYX_CONFIG")
            .unwrap_or_else(|_| "noveltyx.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy noveltyx.example.toml to noveltyx.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if !config.scoring.params.validate() {
            anyhow::bail!("scoring.params would let scores leave [0, 1]");
        }
        Ok(config)
    }

    /// Neo4j password, from the config or NOVELTYX_NEO4J_PASSWORD.
    pub fn neo4j_password(&self) -> Option<String> {
        let configured = self.services.provenance.as_ref()?.password_secret.clone();
        configured
            .filter(|p| !p.is_empty())
            .or_else(|| std::env::var("NOVELTYX_NEO4J_PASSWORD").ok())
    }
}
