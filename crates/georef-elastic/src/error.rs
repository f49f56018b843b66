use georef::SearchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElasticError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Elasticsearch answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed multi-search response: {0}")]
    MalformedResponse(String),
    #[error("Search {position} of the batch failed: {reason}")]
    ItemFailed { position: usize, reason: String },
    #[error("Blocking search called from a current-thread async runtime")]
    BlockingInAsyncContext,
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ElasticError>;

impl From<ElasticError> for SearchError {
    fn from(error: ElasticError) -> Self {
        match error {
            ElasticError::ItemFailed { position, reason } => Self::ItemFailed { position, reason },
            ElasticError::Json(error) => Self::Json(error),
            other => Self::Other(anyhow::Error::new(other)),
        }
    }
}
