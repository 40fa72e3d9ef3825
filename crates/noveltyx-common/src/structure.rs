use serde::{Deserialize, Serialize};

/// Result of resolving one chemical identifier to a SMILES string.
///
/// `NotFound` is the "no structure found" sentinel: every service answered
/// but none had a structure. `Failed` means a lookup errored, so absence of
/// a structure is not established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum StructureOutcome {
    Found(String),
    NotFound,
    Failed(String),
}

impl StructureOutcome {
    pub fn smiles(&self) -> Option<&str> {
        match self {
            StructureOutcome::Found(s) => Some(s.as_str()),
            _ => None,
        }
    }
}
