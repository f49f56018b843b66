use std::time::Duration;

use georef::search::IndexKind;

use crate::error::{ElasticError, Result};

/// Index names of the georef dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNames {
    pub states: String,
    pub departments: String,
    pub local_governments: String,
    pub localities: String,
    pub street_blocks: String,
    pub intersections: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            states: "provincias".to_string(),
            departments: "departamentos".to_string(),
            local_governments: "municipios".to_string(),
            localities: "localidades".to_string(),
            street_blocks: "cuadras".to_string(),
            intersections: "intersecciones".to_string(),
        }
    }
}

impl IndexNames {
    pub fn get(&self, index: IndexKind) -> &str {
        match index {
            IndexKind::States => &self.states,
            IndexKind::Departments => &self.departments,
            IndexKind::LocalGovernments => &self.local_governments,
            IndexKind::Localities => &self.localities,
            IndexKind::StreetBlocks => &self.street_blocks,
            IndexKind::Intersections => &self.intersections,
        }
    }

    /// Same names with `prefix` prepended, for clusters that host several datasets.
    #[must_use]
    pub fn with_prefix(self, prefix: &str) -> Self {
        let prefixed = |name: String| format!("{prefix}{name}");
        Self {
            states: prefixed(self.states),
            departments: prefixed(self.departments),
            local_governments: prefixed(self.local_governments),
            localities: prefixed(self.localities),
            street_blocks: prefixed(self.street_blocks),
            intersections: prefixed(self.intersections),
        }
    }
}

/// Connection and request settings for [`crate::ElasticBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElasticConfig {
    /// Cluster URL, e.g. `http://localhost:9200`.
    pub base_url: String,
    pub timeout: Duration,
    /// Maximum number of searches per `_msearch` request.
    pub multisearch_max_len: usize,
    /// Upper bound for exact hit counts, `None` keeps the cluster default.
    pub track_total_hits: Option<u64>,
    /// Analyzer that drops excluded terms from fuzzy name matches, if the indices define one.
    pub excluding_terms_analyzer: Option<String>,
    pub indices: IndexNames,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            timeout: Duration::from_secs(30),
            multisearch_max_len: 5000,
            track_total_hits: None,
            excluding_terms_analyzer: Some("name_analyzer_excluding_terms".to_string()),
            indices: IndexNames::default(),
        }
    }
}

impl ElasticConfig {
    pub fn builder() -> ElasticConfigBuilder {
        ElasticConfigBuilder::new()
    }

    pub(crate) fn msearch_url(&self) -> String {
        format!("{}/_msearch", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`ElasticConfig`]
#[derive(Debug, Clone, Default)]
pub struct ElasticConfigBuilder {
    config: ElasticConfig,
}

impl ElasticConfigBuilder {
    /// Create a new builder pointing at a local cluster
    pub fn new() -> Self {
        Self {
            config: ElasticConfig::default(),
        }
    }

    /// Set the cluster URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the HTTP request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of searches sent in one `_msearch` request
    pub const fn multisearch_max_len(mut self, len: usize) -> Self {
        self.config.multisearch_max_len = len;
        self
    }

    /// Ask the cluster for exact hit counts up to `limit`
    pub const fn track_total_hits(mut self, limit: u64) -> Self {
        self.config.track_total_hits = Some(limit);
        self
    }

    /// Set (or clear) the analyzer used to exclude terms from fuzzy name matches
    pub fn excluding_terms_analyzer(mut self, analyzer: Option<String>) -> Self {
        self.config.excluding_terms_analyzer = analyzer;
        self
    }

    /// Set the index names
    pub fn indices(mut self, indices: IndexNames) -> Self {
        self.config.indices = indices;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<ElasticConfig> {
        if self.config.multisearch_max_len == 0 {
            return Err(ElasticError::ConfigError(
                "multisearch_max_len must be at least 1".to_string(),
            ));
        }
        if !self.config.base_url.starts_with("http://")
            && !self.config.base_url.starts_with("https://")
        {
            return Err(ElasticError::ConfigError(format!(
                "Base URL must be an http(s) URL, got {:?}",
                self.config.base_url
            )));
        }
        Ok(self.config)
    }
}
