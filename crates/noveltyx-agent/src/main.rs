//! noveltyx: novelty ranking of drug answers from a Translator ARS run.
//! Entry point for the scoring binary.
//!
//! Usage: noveltyx [RUN_ID...]
//! Without arguments the `runs` listed in noveltyx.toml are scored.

mod config;

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use noveltyx_ingestion::normalise::NodeNormClient;
use noveltyx_ingestion::sources::{
    ArsClient, ChemStructureClient, Neo4jProvenanceClient, PubMedClient, PublicationDater,
};
use noveltyx_ingestion::IdentifierNormalizer;
use noveltyx_molecules::SimilarityRanker;
use noveltyx_ranker::{EvidenceExtractor, NoveltyAggregator, NoveltyTable, ProvenanceClassifier};

fn build_aggregator(config: &config::Config) -> anyhow::Result<NoveltyAggregator> {
    let batching = &config.batching;

    let node_norm = NodeNormClient::with_url(&config.services.node_norm_url)?;
    let normalizer = Arc::new(
        IdentifierNormalizer::new(Arc::new(node_norm))
            .with_chunk_size(batching.normalize_chunk)
            .with_concurrency(batching.concurrency),
    );

    let pubmed = PubMedClient::new(config.services.pubmed_api_key.clone())?;
    let dater = PublicationDater::new(Arc::new(pubmed))
        .with_chunk_size(batching.publication_chunk)
        .with_concurrency(batching.concurrency);
    let mut extractor = EvidenceExtractor::new(Arc::new(dater));
    if let Some(year) = config.scoring.current_year {
        extractor = extractor.with_current_year(year);
    }

    let classifier = ProvenanceClassifier::with_inferring_sources(config.scoring.inferring_sources.iter().cloned());
    let mut aggregator = NoveltyAggregator::new(extractor)
        .with_classifier(classifier)
        .with_params(config.scoring.params.clone())
        .with_binding_scope(config.scoring.binding_scope)
        .with_normalizer(Arc::clone(&normalizer));

    let similarity = &config.similarity;
    if similarity.enabled {
        let structures = ChemStructureClient::with_urls(
            Arc::clone(&normalizer),
            &config.services.molepro_url,
            &config.services.pubchem_url,
        )?
        .with_concurrency(batching.concurrency);
        aggregator = aggregator
            .with_structures(Arc::new(structures))
            .with_similarity(SimilarityRanker::with_radius(similarity.radius), similarity.cutoff, similarity.neighbors);
    } else {
        info!("Structural similarity disabled");
    }

    if let Some(ref graph) = config.services.provenance {
        let mut client = Neo4jProvenanceClient::new(&graph.url, &graph.database)?;
        match (&graph.user, config.neo4j_password()) {
            (Some(user), Some(password)) => client = client.with_auth(user, &password),
            (Some(_), None) => warn!("Provenance graph user set but no password (set password_secret or NOVELTYX_NEO4J_PASSWORD)"),
            _ => {}
        }
        aggregator = aggregator.with_provenance_graph(Arc::new(client));
        info!("Publication back-fill enabled: {}", graph.url);
    }

    Ok(aggregator)
}

fn table_report(table: &NoveltyTable, config: &config::Config) -> serde_json::Value {
    json!({
        "query_kind": table.query_kind,
        "ranked": table.ranked(config.scoring.duplicate_policy),
        "rows": table.rows,
        "structure_failures": table.structure_failures,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("noveltyx=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("noveltyx {}", env!("CARGO_PKG_VERSION"));

    let config = match config::Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!("Could not load noveltyx.toml: {e}");
            warn!("Falling back to built-in defaults.");
            config::Config::parse("")?
        }
    };

    let mut runs: Vec<String> = std::env::args().skip(1).collect();
    if runs.is_empty() {
        runs = config.runs.clone();
    }
    if runs.is_empty() {
        warn!("No run ids given. Pass them as arguments or list them under `runs` in noveltyx.toml.");
        return Ok(());
    }

    let ars = ArsClient::with_url(&config.services.ars_url)?;
    let aggregator = build_aggregator(&config)?;
    info!(
        "Scoring {} run(s). Policy: {:?}, scope: {:?}",
        runs.len(),
        config.scoring.duplicate_policy,
        config.scoring.binding_scope
    );

    let mut report = serde_json::Map::new();
    for run_id in &runs {
        let tables = aggregator.score_run(&ars, run_id).await?;
        let agents: serde_json::Map<String, serde_json::Value> = tables
            .iter()
            .map(|(agent, table)| (agent.clone(), table_report(table, &config)))
            .collect();
        info!("Run {}: {} agent response(s) scored", run_id, agents.len());
        report.insert(run_id.clone(), serde_json::Value::Object(agents));
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
