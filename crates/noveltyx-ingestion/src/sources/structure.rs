//! Chemical structure lookup.
//!
//! Resolution order per identifier:
//!   1. node normalizer → INCHIKEY equivalent identifier
//!   2. MolePro: POST {molepro}/element/by_name [inchikey] → collection id,
//!      GET {molepro}/collection/{id}?cache=no → elements[].identifiers.smiles
//!   3. PubChem PUG REST for PUBCHEM.COMPOUND ids when MolePro has nothing

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use noveltyx_common::error::{NoveltyError, Result};
use noveltyx_common::sandbox::SandboxClient as Client;
use noveltyx_common::StructureOutcome;

use crate::normalise::{IdentifierNormalizer, NormalizedNode};

use super::StructureLookup;

pub const MOLEPRO_URL: &str = "https://molepro.broadinstitute.org/molecular_data_provider";
pub const PUBCHEM_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

const PUBCHEM_PREFIX: &str = "PUBCHEM.COMPOUND:";

pub struct ChemStructureClient {
    normalizer: Arc<IdentifierNormalizer>,
    client: Client,
    molepro_url: String,
    pubchem_url: String,
    concurrency: usize,
}

impl ChemStructureClient {
    pub fn new(normalizer: Arc<IdentifierNormalizer>) -> Result<Self> {
        Self::with_urls(normalizer, MOLEPRO_URL, PUBCHEM_URL)
    }

    pub fn with_urls(normalizer: Arc<IdentifierNormalizer>, molepro_url: &str, pubchem_url: &str) -> Result<Self> {
        let mut client = Client::new()?;
        client.allow_url(molepro_url);
        client.allow_url(pubchem_url);
        Ok(Self {
            normalizer,
            client,
            molepro_url: molepro_url.trim_end_matches('/').to_string(),
            pubchem_url: pubchem_url.trim_end_matches('/').to_string(),
            concurrency: 4,
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn molepro_smiles(&self, inchikey: &str) -> Result<Option<String>> {
        let key = inchikey.trim_start_matches("INCHIKEY:");
        let url = format!("{}/element/by_name", self.molepro_url);
        let resp = self.client.post(&url)?.json(&json!([key])).send().await?;
        if !resp.status().is_success() {
            return Err(NoveltyError::service("molepro", format!("status {}", resp.status())));
        }
        let Some(collection) = parse_collection_id(&resp.json().await?) else {
            return Ok(None);
        };

        let url = format!("{}/collection/{}?cache=no", self.molepro_url, collection);
        let resp = self.client.get(&url)?.send().await?;
        if !resp.status().is_success() {
            return Err(NoveltyError::service("molepro", format!("status {}", resp.status())));
        }
        Ok(parse_collection_smiles(&resp.json().await?))
    }

    async fn pubchem_smiles(&self, cid: &str) -> Result<Option<String>> {
        let url = format!("{}/compound/cid/{}/property/CanonicalSMILES/JSON", self.pubchem_url, cid);
        let resp = self.client.get(&url)?.send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(NoveltyError::service("pubchem", format!("status {}", resp.status())));
        }
        Ok(parse_pubchem_smiles(&resp.json().await?))
    }

    async fn lookup_one(&self, id: &str, node: Option<&NormalizedNode>) -> StructureOutcome {
        let molepro = match node.and_then(NormalizedNode::inchikey) {
            Some(inchikey) => Some(self.molepro_smiles(inchikey).await),
            None => None,
        };
        if let Some(Ok(Some(smiles))) = molepro {
            return StructureOutcome::Found(smiles);
        }

        let pubchem = match pubchem_cid(id, node) {
            Some(cid) => Some(self.pubchem_smiles(&cid).await),
            None => None,
        };
        combine_outcomes(molepro, pubchem)
    }
}

/// `{"id": "..."}` from MolePro's element/by_name.
pub fn parse_collection_id(raw: &Value) -> Option<String> {
    raw["id"].as_str().map(String::from)
}

/// First element carrying a SMILES identifier.
pub fn parse_collection_smiles(raw: &Value) -> Option<String> {
    raw["elements"]
        .as_array()?
        .iter()
        .find_map(|e| e["identifiers"]["smiles"].as_str())
        .map(String::from)
}

/// `{"PropertyTable": {"Properties": [{"CID": .., "CanonicalSMILES": ..}]}}`.
/// Newer PUG REST releases answer with `SMILES` / `ConnectivitySMILES` instead.
pub fn parse_pubchem_smiles(raw: &Value) -> Option<String> {
    let props = raw["PropertyTable"]["Properties"].as_array()?.first()?;
    ["CanonicalSMILES", "SMILES", "ConnectivitySMILES"]
        .iter()
        .find_map(|field| props[*field].as_str())
        .map(String::from)
}

/// Numeric PubChem CID from the id itself, else from the normalized node.
fn pubchem_cid(id: &str, node: Option<&NormalizedNode>) -> Option<String> {
    std::iter::once(id)
        .chain(node.into_iter().flat_map(|n| {
            std::iter::once(n.identifier.as_str()).chain(n.equivalent_identifiers.iter().map(String::as_str))
        }))
        .find_map(|curie| curie.strip_prefix(PUBCHEM_PREFIX))
        .map(String::from)
}

/// A structure wins outright; otherwise any error makes the outcome `Failed`,
/// and only clean misses from every consulted service mean `NotFound`.
pub fn combine_outcomes(
    molepro: Option<Result<Option<String>>>,
    pubchem: Option<Result<Option<String>>>,
) -> StructureOutcome {
    let attempts = [molepro, pubchem];
    let mut failure = None;
    for attempt in attempts.into_iter().flatten() {
        match attempt {
            Ok(Some(smiles)) => return StructureOutcome::Found(smiles),
            Ok(None) => {}
            Err(e) => failure = Some(e.to_string()),
        }
    }
    match failure {
        Some(reason) => StructureOutcome::Failed(reason),
        None => StructureOutcome::NotFound,
    }
}

#[async_trait]
impl StructureLookup for ChemStructureClient {
    #[instrument(skip_all, fields(ids = ids.len()))]
    async fn lookup_structures(&self, ids: &[String]) -> Result<HashMap<String, StructureOutcome>> {
        let normalized = self.normalizer.normalize_batch(ids).await?;

        let lookups: Vec<_> = ids
            .iter()
            .map(|id| {
                let node = normalized.get(id).and_then(Option::as_ref);
                async move { (id.clone(), self.lookup_one(id, node).await) }
            })
            .collect();
        let outcomes: Vec<(String, StructureOutcome)> = stream::iter(lookups)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (id, outcome) in &outcomes {
            match outcome {
                StructureOutcome::Failed(reason) => warn!(%id, %reason, "structure lookup failed"),
                StructureOutcome::NotFound => debug!(%id, "no structure found"),
                StructureOutcome::Found(_) => {}
            }
        }
        Ok(outcomes.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_molepro_collection() {
        assert_eq!(parse_collection_id(&json!({"id": "CID:7", "size": 1})).as_deref(), Some("CID:7"));
        assert_eq!(parse_collection_id(&json!({"id": null})), None);

        let raw = json!({"elements": [
            {"identifiers": {"inchikey": "RYYVLZVUVIJVGH-UHFFFAOYSA-N"}},
            {"identifiers": {"smiles": "CN1C=NC2=C1C(=O)N(C(=O)N2C)C"}}
        ]});
        assert_eq!(parse_collection_smiles(&raw).as_deref(), Some("CN1C=NC2=C1C(=O)N(C(=O)N2C)C"));
        assert_eq!(parse_collection_smiles(&json!({"elements": []})), None);
    }

    #[test]
    fn test_parse_pubchem_property_table() {
        let old = json!({"PropertyTable": {"Properties": [{"CID": 2244, "CanonicalSMILES": "CC(=O)OC1=CC=CC=C1C(=O)O"}]}});
        let new = json!({"PropertyTable": {"Properties": [{"CID": 2244, "ConnectivitySMILES": "CC(=O)OC1=CC=CC=C1C(=O)O"}]}});
        assert_eq!(parse_pubchem_smiles(&old), parse_pubchem_smiles(&new));
        assert!(parse_pubchem_smiles(&json!({"Fault": {"Code": "PUGREST.NotFound"}})).is_none());
    }

    #[test]
    fn test_pubchem_cid_from_equivalents() {
        let node = NormalizedNode {
            identifier: "CHEBI:27732".into(),
            label: Some("caffeine".into()),
            equivalent_identifiers: vec!["CHEBI:27732".into(), "PUBCHEM.COMPOUND:2519".into()],
        };
        assert_eq!(pubchem_cid("CHEBI:27732", Some(&node)).as_deref(), Some("2519"));
        assert_eq!(pubchem_cid("PUBCHEM.COMPOUND:5429", None).as_deref(), Some("5429"));
        assert_eq!(pubchem_cid("MESH:D002110", None), None);
    }

    #[test]
    fn test_combine_outcomes() {
        let found = combine_outcomes(Some(Ok(None)), Some(Ok(Some("C".into()))));
        assert_eq!(found, StructureOutcome::Found("C".into()));

        assert_eq!(combine_outcomes(Some(Ok(None)), None), StructureOutcome::NotFound);
        assert_eq!(combine_outcomes(None, None), StructureOutcome::NotFound);

        let failed = combine_outcomes(Some(Err(NoveltyError::service("molepro", "status 500"))), Some(Ok(None)));
        assert!(matches!(failed, StructureOutcome::Failed(reason) if reason.contains("molepro")));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_caffeine_structure() {
        let normalizer = Arc::new(IdentifierNormalizer::new(Arc::new(crate::normalise::NodeNormClient::new().unwrap())));
        let client = ChemStructureClient::new(normalizer).unwrap();
        let out = client
            .lookup_structures(&["PUBCHEM.COMPOUND:2519".to_string()])
            .await
            .expect("structure lookup failed");
        assert!(out["PUBCHEM.COMPOUND:2519"].smiles().is_some());
    }
}
