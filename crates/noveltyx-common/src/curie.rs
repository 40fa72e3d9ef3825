//! CURIE prefix heuristics.

/// Namespaces that identify a chemical / drug entity.
pub const CHEMICAL_PREFIXES: &[&str] = &["PUBCHEM", "CHEMBL", "UNII", "RXNORM"];
/// Namespaces that identify a gene or gene-ontology entity.
pub const GENE_PREFIXES: &[&str] = &["NCBI", "GO"];
/// Namespaces that identify a disease.
pub const DISEASE_PREFIXES: &[&str] = &["MONDO"];

/// Substring match, as the upstream services mix `PUBCHEM.COMPOUND:` and `PUBCHEM:` forms.
pub fn has_any_prefix(curie: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| curie.contains(p))
}

/// A publication reference as it appears in a `biolink:publications` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublicationId {
    /// Bare PubMed id, `PMID:` stripped.
    Pmid(String),
    /// PubMed Central id, e.g. `PMC1234567`.
    Pmc(String),
    /// DOIs, URLs and anything else; counted but never dated.
    Other(String),
}

impl PublicationId {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.contains("PMID") {
            let id = raw.get(5..).unwrap_or("").trim().to_string();
            PublicationId::Pmid(id)
        } else if raw.contains("PMC") {
            let local = raw.strip_prefix("PMC:").unwrap_or(raw);
            if local.starts_with("PMC") {
                PublicationId::Pmc(local.to_string())
            } else {
                PublicationId::Pmc(format!("PMC{}", local))
            }
        } else {
            PublicationId::Other(raw.to_string())
        }
    }

    /// Whether a year can be looked up for this id.
    pub fn is_datable(&self) -> bool {
        match self {
            PublicationId::Pmid(id) | PublicationId::Pmc(id) => !id.is_empty(),
            PublicationId::Other(_) => false,
        }
    }
}
