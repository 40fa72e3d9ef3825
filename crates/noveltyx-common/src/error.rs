use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoveltyError {
    /// Malformed response structure. Aborts processing of that response only.
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// A lookup returned no match. Callers normally record this as an
    /// undefined signal instead of raising it.
    #[error("Unresolved identifier: {0}")]
    UnresolvedIdentifier(String),

    /// A single call or chunk against an external service failed.
    #[error("{service} request failed: {message}")]
    ExternalService { service: &'static str, message: String },

    /// Every chunk of a batched call failed.
    #[error("{service} unavailable: all {chunks} chunk(s) failed")]
    PropagatedServiceFailure { service: &'static str, chunks: usize },

    #[error("Invalid structure for {id}: {reason}")]
    InvalidStructure { id: String, reason: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NoveltyError {
    pub fn service(service: &'static str, err: impl std::fmt::Display) -> Self {
        NoveltyError::ExternalService { service, message: err.to_string() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        NoveltyError::InputValidation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, NoveltyError>;
