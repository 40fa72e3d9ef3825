//! Live checks against the public services.
//!
//! Run with: cargo test --package noveltyx-ingestion --test test_live_sources -- --ignored --nocapture

use std::sync::Arc;

use noveltyx_ingestion::normalise::NodeNormClient;
use noveltyx_ingestion::sources::{PubMedClient, PublicationDater};
use noveltyx_ingestion::{IdentifierNormalizer, PublicationYearSource};

#[tokio::test]
#[ignore] // Requires network access
async fn test_publication_years_pmid_and_pmc() {
    let fetcher = PubMedClient::new(None).expect("client build failed");
    let dater = PublicationDater::new(Arc::new(fetcher));

    let ids = vec!["PMID:31391574".to_string(), "PMC:PMC6727150".to_string()];
    let years = dater
        .resolve_publication_years(&ids)
        .await
        .expect("E-utilities request failed");

    println!("Resolved years: {:?}", years);
    assert!(years.contains_key("PMID:31391574"), "PMID should resolve");
    assert!(years.values().all(|y| (1900..=2100).contains(y)));
}

#[tokio::test]
#[ignore] // Requires network access
async fn test_canonical_ids_small_chunks() {
    let service = NodeNormClient::new().expect("client build failed");
    let normalizer = IdentifierNormalizer::new(Arc::new(service)).with_chunk_size(1);

    let ids = vec!["CHEBI:27732".to_string(), "NOT:AREALID".to_string()];
    let canonical = normalizer.canonical_ids(&ids).await.expect("normalization failed");

    println!("Canonical ids: {:?}", canonical);
    assert_eq!(canonical["NOT:AREALID"], "NOT:AREALID");
    assert_ne!(canonical["CHEBI:27732"], "");
}
