//! The [`Resolver`] facade.
//!
//! A resolver owns a search backend, the engine configuration and the locality expansion cache.
//! Every call builds one planner per query and runs them together through the batched
//! orchestrator, so resolving a hundred addresses costs as many backend round trips as resolving
//! the most complex one of them.
//!
//! ```rust
//! use georef::{AddressData, AddressQuery, MemoryBackend, MemoryDataset, QueryParams, Resolver};
//!
//! let resolver = Resolver::new(MemoryBackend::new(MemoryDataset::default()));
//! let result = resolver.resolve_address(AddressQuery::new(
//!     AddressData::simple("Corrientes").with_door_number(1000, None),
//!     QueryParams::new(),
//! ))?;
//! assert!(result.is_empty());
//! # Ok::<(), georef::error::GeorefError>(())
//! ```

use std::{num::NonZeroUsize, sync::Arc};

use tracing::{info, instrument};

use crate::{
    address::{AddressQuery, LocationQuery},
    cache::{LocalityCache, SharedFrequencyCache},
    config::ResolverConfig,
    error::{GeorefError, Result},
    orchestrator::{QueryOutcome, resolve},
    planner::Planner,
    result::QueryResult,
    search::SearchBackend,
};

/// One query of a mixed batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Address(AddressQuery),
    Location(LocationQuery),
}

impl From<AddressQuery> for Query {
    fn from(query: AddressQuery) -> Self {
        Self::Address(query)
    }
}

impl From<LocationQuery> for Query {
    fn from(query: LocationQuery) -> Self {
        Self::Location(query)
    }
}

/// Summary of a resolver's setup.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverInfo {
    pub backend: String,
    pub config: ResolverConfig,
    pub cached_localities: usize,
    pub cache_capacity: usize,
}

/// Resolves addresses and coordinate pairs against a search backend.
///
/// Cloning is cheap: clones share the backend and the locality cache.
#[derive(Clone)]
pub struct Resolver {
    backend: Arc<dyn SearchBackend>,
    config: ResolverConfig,
    cache: Option<Arc<LocalityCache>>,
}

impl Resolver {
    /// Create a resolver with the default configuration.
    pub fn new(backend: impl SearchBackend + 'static) -> Self {
        ResolverBuilder::new(backend).build()
    }

    pub fn builder(backend: impl SearchBackend + 'static) -> ResolverBuilder {
        ResolverBuilder::new(backend)
    }

    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn info(&self) -> ResolverInfo {
        ResolverInfo {
            backend: self.backend.name().to_string(),
            config: self.config,
            cached_localities: self.cache.as_ref().map_or(0, |cache| cache.len()),
            cache_capacity: self.cache.as_ref().map_or(0, |cache| cache.capacity()),
        }
    }

    /// Resolve a single address.
    ///
    /// Unlike the batch methods, a failed query is returned as an error.
    pub fn resolve_address(&self, query: AddressQuery) -> Result<QueryResult> {
        single(self.resolve_addresses(vec![query])?)
    }

    /// Resolve a batch of addresses, one outcome per query in input order.
    #[instrument(name = "Resolve Addresses", level = "info", skip_all, fields(queries = queries.len()))]
    pub fn resolve_addresses(&self, queries: Vec<AddressQuery>) -> Result<Vec<QueryOutcome>> {
        let planners = queries
            .into_iter()
            .map(|query| self.address_planner(query))
            .collect();
        self.run(planners)
    }

    /// Resolve the administrative areas and nearest street of a coordinate pair.
    pub fn resolve_location(&self, query: LocationQuery) -> Result<QueryResult> {
        single(self.resolve_locations(vec![query])?)
    }

    #[instrument(name = "Resolve Locations", level = "info", skip_all, fields(queries = queries.len()))]
    pub fn resolve_locations(&self, queries: Vec<LocationQuery>) -> Result<Vec<QueryOutcome>> {
        let planners = queries
            .into_iter()
            .map(|query| Planner::for_location(query, &self.config))
            .collect();
        self.run(planners)
    }

    /// Resolve addresses and coordinate pairs together in one batch.
    #[instrument(name = "Resolve Mixed", level = "info", skip_all, fields(queries = queries.len()))]
    pub fn resolve(&self, queries: Vec<Query>) -> Result<Vec<QueryOutcome>> {
        let planners = queries
            .into_iter()
            .map(|query| match query {
                Query::Address(query) => self.address_planner(query),
                Query::Location(query) => Planner::for_location(query, &self.config),
            })
            .collect();
        self.run(planners)
    }

    fn address_planner(&self, query: AddressQuery) -> Planner {
        Planner::for_address(query, &self.config, self.cache.clone())
    }

    fn run(&self, planners: Vec<Planner>) -> Result<Vec<QueryOutcome>> {
        Ok(resolve(self.backend.as_ref(), planners)?)
    }
}

fn single(outcomes: Vec<QueryOutcome>) -> Result<QueryResult> {
    outcomes
        .into_iter()
        .next()
        .ok_or_else(|| GeorefError::Other(anyhow::anyhow!("Batch of one query returned no result")))?
        .map_err(GeorefError::from)
}

/// Builder for [`Resolver`].
pub struct ResolverBuilder {
    backend: Arc<dyn SearchBackend>,
    config: ResolverConfig,
}

impl ResolverBuilder {
    /// Create a builder with the default configuration
    pub fn new(backend: impl SearchBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            config: ResolverConfig::default(),
        }
    }

    /// Share an existing backend
    pub fn shared(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            config: ResolverConfig::default(),
        }
    }

    /// Set the engine configuration
    #[must_use]
    pub const fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the locality cache capacity (0 disables caching)
    #[must_use]
    pub const fn locality_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.locality_cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Resolver {
        let cache = NonZeroUsize::new(self.config.locality_cache_capacity)
            .map(|capacity| Arc::new(SharedFrequencyCache::new(capacity)));

        info!(
            backend = self.backend.name(),
            cache_capacity = self.config.locality_cache_capacity,
            "Resolver ready"
        );
        Resolver {
            backend: self.backend,
            config: self.config,
            cache,
        }
    }
}
