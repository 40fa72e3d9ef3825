//! Publication dating via NCBI E-utilities.
//! efetch: https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi
//!
//! PMIDs are dated from PubMed XML (`PubDate/Year`, falling back to a revised
//! `PubDate`, then `DateCompleted/Year`); PMC ids from PMC XML
//! (`pub-date/year`). The two namespaces are fetched separately and merged.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use noveltyx_common::curie::PublicationId;
use noveltyx_common::error::{NoveltyError, Result};
use noveltyx_common::sandbox::SandboxClient as Client;

use super::PublicationYearSource;
use crate::batch::run_chunked;

const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub const DEFAULT_PUBLICATION_CHUNK: usize = 200;

/// One efetch round-trip per namespace.
#[async_trait]
pub trait YearFetcher: Send + Sync {
    /// Keyed by bare PMID.
    async fn pmid_years(&self, pmids: &[String]) -> Result<HashMap<String, i32>>;
    /// Keyed by `PMC<digits>`.
    async fn pmc_years(&self, pmcids: &[String]) -> Result<HashMap<String, i32>>;
}

pub struct PubMedClient {
    client: Client,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self { client: Client::new()?, api_key })
    }

    async fn efetch(&self, db: &str, ids: &[String]) -> Result<String> {
        let mut params = vec![
            ("db", db.to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let resp = self.client.get(EFETCH_URL)?.query(&params).send().await?;
        if !resp.status().is_success() {
            return Err(NoveltyError::service("efetch", format!("{} returned status {}", db, resp.status())));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl YearFetcher for PubMedClient {
    #[instrument(skip_all, fields(n = pmids.len()))]
    async fn pmid_years(&self, pmids: &[String]) -> Result<HashMap<String, i32>> {
        if pmids.is_empty() {
            return Ok(HashMap::new());
        }
        let xml = self.efetch("pubmed", pmids).await?;
        parse_pubmed_years(&xml)
    }

    #[instrument(skip_all, fields(n = pmcids.len()))]
    async fn pmc_years(&self, pmcids: &[String]) -> Result<HashMap<String, i32>> {
        if pmcids.is_empty() {
            return Ok(HashMap::new());
        }
        let numeric: Vec<String> = pmcids.iter().map(|id| id.trim_start_matches("PMC").to_string()).collect();
        let xml = self.efetch("pmc", &numeric).await?;
        parse_pmc_years(&xml)
    }
}

fn parse_year(text: &str) -> Option<i32> {
    let text = text.trim();
    if text.len() == 4 && text.chars().all(|c| c.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

fn attr_equals(e: &BytesStart, key: &[u8], value: &[u8]) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.as_ref() == key && a.value.as_ref() == value)
}

/// Parse PubMed efetch XML into PMID → year.
pub fn parse_pubmed_years(xml: &str) -> Result<HashMap<String, i32>> {
    let mut years = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pmid: Option<String> = None;
    let mut pub_year: Option<i32> = None;
    let mut revised_year: Option<i32> = None;
    let mut completed_year: Option<i32> = None;

    let mut in_pmid = false;
    let mut in_pub_date = false;
    let mut pub_date_revised = false;
    let mut in_completed = false;
    let mut in_year = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"PubmedArticle" => {
                    pmid = None;
                    pub_year = None;
                    revised_year = None;
                    completed_year = None;
                }
                // The article's own PMID precedes any cited PMIDs
                b"PMID" => in_pmid = pmid.is_none(),
                b"PubDate" => {
                    in_pub_date = true;
                    pub_date_revised = attr_equals(e, b"pubstatus", b"revised");
                }
                b"DateCompleted" => in_completed = true,
                b"Year" => in_year = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_pmid {
                    pmid = Some(text.trim().to_string());
                } else if in_year {
                    let slot = if in_pub_date && pub_date_revised {
                        Some(&mut revised_year)
                    } else if in_pub_date {
                        Some(&mut pub_year)
                    } else if in_completed {
                        Some(&mut completed_year)
                    } else {
                        None
                    };
                    if let Some(slot) = slot.filter(|s| s.is_none()) {
                        *slot = parse_year(&text);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"PubDate" => in_pub_date = false,
                b"DateCompleted" => in_completed = false,
                b"Year" => in_year = false,
                b"PubmedArticle" => {
                    let year = pub_year.or(revised_year).or(completed_year);
                    match (pmid.take(), year) {
                        (Some(id), Some(y)) => {
                            years.insert(id, y);
                        }
                        (Some(id), None) => debug!(pmid = %id, "no publication year in record"),
                        _ => warn!("PubmedArticle without PMID"),
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(NoveltyError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(years)
}

/// Parse PMC efetch XML into `PMC<digits>` → year, from the first `pub-date`.
pub fn parse_pmc_years(xml: &str) -> Result<HashMap<String, i32>> {
    let mut years = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pmcid: Option<String> = None;
    let mut year: Option<i32> = None;
    let mut depth = 0usize;
    let mut in_pmc_id = false;
    let mut in_pub_date = false;
    let mut in_year = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"article" => {
                    depth += 1;
                    if depth == 1 {
                        pmcid = None;
                        year = None;
                    }
                }
                b"article-id" => {
                    in_pmc_id = pmcid.is_none()
                        && (attr_equals(e, b"pub-id-type", b"pmc") || attr_equals(e, b"pub-id-type", b"pmcid"));
                }
                b"pub-date" => in_pub_date = year.is_none(),
                b"year" | b"Year" => in_year = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_pmc_id {
                    let digits = text.trim().trim_start_matches("PMC");
                    pmcid = Some(format!("PMC{}", digits));
                } else if in_pub_date && in_year && year.is_none() {
                    year = parse_year(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"article-id" => in_pmc_id = false,
                b"pub-date" => in_pub_date = false,
                b"year" | b"Year" => in_year = false,
                b"article" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let (Some(id), Some(y)) = (pmcid.take(), year) {
                            years.insert(id, y);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(NoveltyError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(years)
}

/// Resolves mixed PMID / PMC publication ids to years, chunking each namespace.
pub struct PublicationDater {
    fetcher: Arc<dyn YearFetcher>,
    chunk_size: usize,
    concurrency: usize,
}

impl PublicationDater {
    pub fn new(fetcher: Arc<dyn YearFetcher>) -> Self {
        Self { fetcher, chunk_size: DEFAULT_PUBLICATION_CHUNK, concurrency: 2 }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

#[async_trait]
impl PublicationYearSource for PublicationDater {
    #[instrument(skip_all, fields(ids = ids.len()))]
    async fn resolve_publication_years(&self, ids: &[String]) -> Result<HashMap<String, i32>> {
        let parsed: Vec<(&String, PublicationId)> = ids
            .iter()
            .map(|raw| (raw, PublicationId::parse(raw)))
            .filter(|(_, id)| id.is_datable())
            .collect();

        let pmids: Vec<String> = parsed
            .iter()
            .filter_map(|(_, id)| match id { PublicationId::Pmid(p) => Some(p.clone()), _ => None })
            .collect();
        let pmcids: Vec<String> = parsed
            .iter()
            .filter_map(|(_, id)| match id { PublicationId::Pmc(p) => Some(p.clone()), _ => None })
            .collect();

        let pmid_years = run_chunked("pubmed-efetch", &pmids, self.chunk_size, self.concurrency, |chunk| {
            let fetcher = Arc::clone(&self.fetcher);
            async move { fetcher.pmid_years(&chunk).await }
        })
        .await;
        let pmc_years = run_chunked("pmc-efetch", &pmcids, self.chunk_size, self.concurrency, |chunk| {
            let fetcher = Arc::clone(&self.fetcher);
            async move { fetcher.pmc_years(&chunk).await }
        })
        .await;

        // Fails only when every chunk across both namespaces failed.
        let (pmid_years, pmc_years) = match (pmid_years, pmc_years) {
            (Err(e), Err(_)) => return Err(e),
            (Err(e), Ok(_)) if pmcids.is_empty() => return Err(e),
            (Ok(_), Err(e)) if pmids.is_empty() => return Err(e),
            (Err(e), Ok(pmc)) => {
                warn!(error = %e, "PMID dating unavailable; continuing with PMC years");
                (HashMap::new(), pmc)
            }
            (Ok(pm), Err(e)) => {
                warn!(error = %e, "PMC dating unavailable; continuing with PMID years");
                (pm, HashMap::new())
            }
            (Ok(pm), Ok(pmc)) => (pm, pmc),
        };

        let resolved: HashMap<String, i32> = parsed
            .into_iter()
            .filter_map(|(raw, id)| {
                let year = match &id {
                    PublicationId::Pmid(p) => pmid_years.get(p),
                    PublicationId::Pmc(p) => pmc_years.get(p),
                    PublicationId::Other(_) => None,
                }?;
                Some((raw.clone(), *year))
            })
            .collect();

        debug!(requested = ids.len(), resolved = resolved.len(), "publication years resolved");
        Ok(resolved)
    }
}
