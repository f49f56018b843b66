//! Georef - Address and Location Resolution Engine
//!
//! Georef turns structured address queries into geolocated street addresses, and coordinate
//! pairs into the administrative areas that contain them, by searching indexed Argentine
//! geographic data (states, departments, local governments, localities, street blocks and street
//! intersections).
//!
//! # Quick Start
//!
//! ```rust
//! use georef::{
//!     AddressData, AddressQuery, LocationQuery, MemoryBackend, MemoryDataset, Point, QueryParams,
//!     Resolver,
//! };
//!
//! let resolver = Resolver::new(MemoryBackend::new(MemoryDataset::default()));
//!
//! // "Parana 1010 y Santa Fe"
//! let address = AddressData::intersection("Parana", "Santa Fe").with_door_number(1010, None);
//! let result = resolver.resolve_address(AddressQuery::new(address, QueryParams::new()))?;
//! for hit in result.addresses() {
//!     println!("{:?} at {:?}", hit.full_name, hit.location);
//! }
//!
//! // Reverse geocoding
//! let result = resolver.resolve_location(LocationQuery::new(Point::new(-34.6003, -58.3899)))?;
//! assert_eq!(result.total(), 1);
//! # Ok::<(), georef::error::GeorefError>(())
//! ```
//!
//! # Address types
//!
//! - **Simple**: `street [number]`, one street block search.
//! - **Intersection**: `street [number] and cross street`, both streets then their crossings.
//! - **Between**: `street [number] between street and street`, the three streets then the
//!   crossings of the first one with the other two.
//!
//! Any of them can be restricted by state, department, census locality and locality. Locality
//! names are expanded to census localities through an extra search whose result is cached.
//!
//! # Batching
//!
//! Queries resolved together share backend round trips: each round sends the pending searches of
//! every query in one multi-search call. Backends implement [`SearchBackend`]; an in-memory
//! [`MemoryBackend`] is provided, and the `georef-elastic` crate talks to Elasticsearch.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod address;
mod cache;
mod config;
mod core;
pub mod error;
pub mod geometry;
mod orchestrator;
mod planner;
mod result;
pub mod search;
#[cfg(any(test, feature = "test_data"))]
pub mod test_data;

pub use core::{Query, Resolver, ResolverBuilder, ResolverInfo};

pub use address::{
    AddressData, AddressError, AddressQuery, AddressType, AreaFilter, CENSUS_LOCALITY_ID_LEN,
    DEPARTMENT_ID_LEN, DoorNumber, EntitySelector, LOCAL_GOVERNMENT_ID_LEN, LOCALITY_ID_LEN,
    LocationQuery, Order, QueryParams, RequestedFields, STATE_ID_LEN, STREET_ID_LEN,
};
pub use cache::{FrequencyBoundedCache, LocalityCache, LocalityCacheKey, SharedFrequencyCache};
pub use config::{ResolverConfig, ResolverConfigBuilder};
pub use geometry::{Location, NearestBlock, Point, Side};
pub use orchestrator::{QueryOutcome, resolve};
pub use planner::{BetweenEntry, Planner, PlannerError};
pub use result::{
    AddressHit, LocationHit, QueryResult, ResolvedEntity, StreetEntity, TerritoryEntity,
};
pub use search::{MemoryBackend, MemoryDataset, SearchBackend, SearchError};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Georef library.
///
/// This sets up structured logging with configurable levels and filtering.
/// `RUST_LOG` takes precedence over `level` when set. Call this once at the
/// start of your application; later calls are no-ops.
///
/// # Arguments
///
/// * `level` - The minimum log level to display
///
/// # Examples
///
/// ```rust
/// use georef::init_logging;
/// use tracing::Level;
///
/// // Initialize with info-level logging
/// init_logging(Level::INFO)?;
/// # Ok::<(), georef::error::GeorefError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::GeorefError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{TestDataConfig, sample_dataset};

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    fn sample_resolver() -> Resolver {
        Resolver::new(MemoryBackend::new(sample_dataset(&TestDataConfig::sample())))
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        setup_test_env();
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }

    #[test]
    fn test_simple_address() {
        setup_test_env();

        let result = sample_resolver()
            .resolve_address(AddressQuery::new(
                AddressData::simple("corrientes").with_door_number(1000, None),
                QueryParams::new(),
            ))
            .unwrap();

        assert_eq!(result.total(), 1);
        let hit = result.addresses().next().unwrap();
        assert_eq!(hit.street.name.as_deref(), Some("AV CORRIENTES"));
        assert!(!hit.location.is_null());
    }

    #[test]
    fn test_batch_search() {
        setup_test_env();

        let queries = ["parana", "alvear", "nowhere street"]
            .into_iter()
            .map(|street| AddressQuery::new(AddressData::simple(street), QueryParams::new()))
            .collect();
        let outcomes = sample_resolver().resolve_addresses(queries).unwrap();

        assert_eq!(outcomes.len(), 3, "Should have results for all 3 queries");
        let totals = outcomes
            .iter()
            .map(|outcome| outcome.as_ref().unwrap().total())
            .collect::<Vec<_>>();
        assert_eq!(totals, vec![3, 1, 0]);
    }

    #[test]
    fn test_configuration() {
        setup_test_env();

        let config = ResolverConfigBuilder::strict()
            .max_result_len(100)
            .build();
        let resolver = Resolver::builder(MemoryBackend::new(MemoryDataset::default()))
            .config(config)
            .build();

        assert_eq!(resolver.config().max_result_len, 100);
        assert!(!resolver.config().approximate_locations);
    }
}
