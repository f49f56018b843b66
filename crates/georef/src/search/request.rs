use once_cell::sync::OnceCell;

use super::{Document, Result, SearchError, SearchQuery};

/// Hits returned by the backend for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub hits: Vec<Document>,
    /// Total number of matches, which may exceed `hits.len()` when paginated.
    pub total: usize,
    pub offset: usize,
}

impl SearchResponse {
    pub const fn new(hits: Vec<Document>, total: usize, offset: usize) -> Self {
        Self { hits, total, offset }
    }

    pub const fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            offset: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// A query paired with a write-once result slot.
///
/// Apart from the slot nothing can change after construction. Reading the result before the
/// backend fulfilled it, or fulfilling it twice, is reported as an error instead of a panic.
#[derive(Debug)]
pub struct SearchRequest {
    query: SearchQuery,
    result: OnceCell<SearchResponse>,
}

impl SearchRequest {
    pub const fn new(query: SearchQuery) -> Self {
        Self {
            query,
            result: OnceCell::new(),
        }
    }

    pub const fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn fulfill(&self, response: SearchResponse) -> Result<()> {
        self.result
            .set(response)
            .map_err(|_| SearchError::AlreadyFulfilled)
    }

    pub fn is_fulfilled(&self) -> bool {
        self.result.get().is_some()
    }

    pub fn result(&self) -> Result<&SearchResponse> {
        self.result.get().ok_or(SearchError::ResultNotSet)
    }

    pub fn into_result(self) -> Result<SearchResponse> {
        self.result.into_inner().ok_or(SearchError::ResultNotSet)
    }
}

impl From<SearchQuery> for SearchRequest {
    fn from(query: SearchQuery) -> Self {
        Self::new(query)
    }
}
