//! Search backend abstraction.
//!
//! Planners never talk to a backend directly: they emit [`SearchRequest`]s built from the
//! backend-independent [`SearchQuery`] model, and the orchestrator executes every pending request
//! of a round through a single [`SearchBackend::multi_search`] call.

pub use error::SearchError;
mod backend;
mod document;
mod memory;
mod query;
mod request;

pub use backend::SearchBackend;
pub use document::{
    Document, EntityRef, Intersection, Locality, StreetBlock, StreetRef, Territory,
};
pub use error::Result;
pub use memory::{MemoryBackend, MemoryDataset};
pub use query::{
    DEFAULT_FUZZINESS, DEFAULT_SEARCH_SIZE, DocField, GeoShape, IdFilter, IndexKind,
    MIN_AUTOCOMPLETE_CHARS, SearchQuery, SourceFields,
};
pub use request::{SearchRequest, SearchResponse};

mod error {
    use thiserror::Error;

    use super::IndexKind;

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("Search result read before the request was fulfilled")]
        ResultNotSet,
        #[error("Search request fulfilled more than once")]
        AlreadyFulfilled,
        #[error("Backend returned {actual} responses for {expected} requests")]
        ResponseCount { expected: usize, actual: usize },
        #[error("Search {position} of the batch failed: {reason}")]
        ItemFailed { position: usize, reason: String },
        #[error("Query is not valid for the {index:?} index: {reason}")]
        InvalidQuery { index: IndexKind, reason: String },
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[cfg(feature = "serde")]
        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, SearchError>;
}
