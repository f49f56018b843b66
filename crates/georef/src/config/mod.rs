use crate::error::GeorefError;

/// Tunables of the resolution engine.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// Page size used by steps that need every match.
    pub max_result_len: usize,
    /// Radius around a door number point within which an intersection is accepted.
    pub intersection_door_tolerance_m: f64,
    /// Radius around a door number point within which the between streets are searched.
    pub between_door_tolerance_m: f64,
    /// Maximum distance between both cross street points of a between address.
    pub between_distance_tolerance_m: f64,
    /// Radius of the street block search around a coordinate pair.
    pub location_street_radius_m: f64,
    /// Street blocks fetched for nearest block estimation.
    pub nearest_block_candidates: usize,
    /// Locality expansion cache capacity, 0 disables the cache.
    pub locality_cache_capacity: usize,
    /// Use the block centroid when a door number cannot be interpolated.
    pub approximate_locations: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_result_len: 5000,
            intersection_door_tolerance_m: 50.0,
            between_door_tolerance_m: 150.0,
            between_distance_tolerance_m: 200.0,
            location_street_radius_m: 100.0,
            nearest_block_candidates: 10,
            locality_cache_capacity: 1000,
            approximate_locations: true,
        }
    }
}

/// Builder for creating resolver configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    /// Create a new builder with the default tolerances
    pub fn new() -> Self {
        Self {
            config: ResolverConfig::default(),
        }
    }

    /// Tight tolerances and no approximate locations: fewer, more certain results
    pub fn strict() -> Self {
        let mut builder = Self::new();
        builder.config.intersection_door_tolerance_m = 25.0;
        builder.config.between_door_tolerance_m = 100.0;
        builder.config.between_distance_tolerance_m = 150.0;
        builder.config.location_street_radius_m = 50.0;
        builder.config.approximate_locations = false;
        builder
    }

    /// Wide tolerances for sparse or badly numbered street data
    pub fn lenient() -> Self {
        let mut builder = Self::new();
        builder.config.intersection_door_tolerance_m = 100.0;
        builder.config.between_door_tolerance_m = 300.0;
        builder.config.between_distance_tolerance_m = 400.0;
        builder.config.location_street_radius_m = 250.0;
        builder.config.nearest_block_candidates = 20;
        builder
    }

    /// Set the page size used by steps that need every match
    pub fn max_result_len(mut self, len: usize) -> Self {
        self.config.max_result_len = len.max(1);
        self
    }

    /// Set the intersection and between distance tolerances, in meters
    pub fn tolerances(
        mut self,
        intersection_door_m: f64,
        between_door_m: f64,
        between_distance_m: f64,
    ) -> Result<Self, GeorefError> {
        for (name, value) in [
            ("intersection door", intersection_door_m),
            ("between door", between_door_m),
            ("between distance", between_distance_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(GeorefError::ConfigError(format!(
                    "The {name} tolerance must be a positive distance, got {value}"
                )));
            }
        }

        self.config.intersection_door_tolerance_m = intersection_door_m;
        self.config.between_door_tolerance_m = between_door_m;
        self.config.between_distance_tolerance_m = between_distance_m;
        Ok(self)
    }

    /// Set the street block search radius used for coordinate queries
    pub fn location_street_radius(mut self, radius_m: f64) -> Result<Self, GeorefError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(GeorefError::ConfigError(format!(
                "The street block radius must be a positive distance, got {radius_m}"
            )));
        }
        self.config.location_street_radius_m = radius_m;
        Ok(self)
    }

    /// Set how many street blocks are considered for nearest block estimation
    pub fn nearest_block_candidates(mut self, candidates: usize) -> Self {
        self.config.nearest_block_candidates = candidates.max(1);
        self
    }

    /// Set the locality cache capacity (0 disables caching)
    pub fn locality_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.locality_cache_capacity = capacity;
        self
    }

    /// Enable or disable the block centroid fallback for simple addresses
    pub fn approximate_locations(mut self, enabled: bool) -> Self {
        self.config.approximate_locations = enabled;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ResolverConfig {
        self.config
    }
}
