use super::{Result, SearchQuery, SearchResponse};

/// A search service able to run several queries in one round trip.
///
/// Implementations must return exactly one response per query, in query order. A failure of any
/// single query fails the whole call: there are no partial results.
pub trait SearchBackend: Send + Sync {
    fn multi_search(&self, queries: &[&SearchQuery]) -> Result<Vec<SearchResponse>>;

    /// Short description used in logs and `Resolver::info`.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<T: SearchBackend + ?Sized> SearchBackend for std::sync::Arc<T> {
    fn multi_search(&self, queries: &[&SearchQuery]) -> Result<Vec<SearchResponse>> {
        (**self).multi_search(queries)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
