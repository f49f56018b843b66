//! Elasticsearch backend for georef.
//!
//! [`ElasticBackend`] implements [`georef::SearchBackend`] on top of the `_msearch` endpoint:
//! every round of a batch becomes one NDJSON request (or several, when the round holds more
//! than [`ElasticConfig::multisearch_max_len`] searches).
//!
//! ```rust,no_run
//! use georef::{AddressData, AddressQuery, QueryParams, Resolver};
//! use georef_elastic::{ElasticBackend, ElasticConfig};
//!
//! let config = ElasticConfig::builder()
//!     .base_url("http://localhost:9200")
//!     .track_total_hits(10_000)
//!     .build()?;
//! let resolver = Resolver::new(ElasticBackend::new(config)?);
//!
//! let result = resolver.resolve_address(AddressQuery::new(
//!     AddressData::simple("Corrientes").with_door_number(1000, None),
//!     QueryParams::new(),
//! ))?;
//! println!("{} matches", result.total());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod backend;
mod config;
pub mod dsl;
mod error;
mod source;

pub use backend::{ElasticBackend, msearch_body};
pub use config::{ElasticConfig, ElasticConfigBuilder, IndexNames};
pub use error::{ElasticError, Result};
pub use source::parse_document;
