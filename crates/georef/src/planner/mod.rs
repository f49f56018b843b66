//! Per query search planning.
//!
//! A [`Planner`] turns one address or coordinate query into rounds of backend searches. It is an
//! explicit state machine: [`Planner::next_step`] hands out the searches it needs next (or `None`
//! once done), [`Planner::resume`] feeds it their results, and [`Planner::final_result`] builds
//! the [`QueryResult`] once it is done.
//!
//! Planners never fail the batch they are part of. Inconsistent data (an unexpected geometry, an
//! intersection that matches neither street, ...) turns the planner into [`Planner::Failed`] and
//! only that query reports an error.

use std::sync::Arc;

pub use error::PlannerError;
use tracing::{debug, warn};

mod between;
mod common;
mod intersection;
mod location;
mod simple;

pub use between::BetweenEntry;
use between::BetweenPlanner;
use common::AddressContext;
use intersection::IntersectionPlanner;
use location::LocationPlanner;
use simple::SimplePlanner;

use crate::{
    address::{AddressQuery, AddressType, LocationQuery},
    cache::LocalityCache,
    config::ResolverConfig,
    result::QueryResult,
    search::{SearchError, SearchRequest},
};

/// Failure while advancing a planner.
#[derive(Debug)]
enum StepError {
    /// Breaks the request envelope contract, fatal for the whole batch.
    Search(SearchError),
    /// Only affects the query being planned.
    Planner(PlannerError),
}

impl From<SearchError> for StepError {
    fn from(err: SearchError) -> Self {
        Self::Search(err)
    }
}

impl From<PlannerError> for StepError {
    fn from(err: PlannerError) -> Self {
        Self::Planner(err)
    }
}

#[derive(Debug)]
pub enum Planner {
    /// Input that is not an address: no searches, empty result.
    None,
    Simple(SimplePlanner),
    Intersection(IntersectionPlanner),
    Between(BetweenPlanner),
    Location(LocationPlanner),
    Failed { query: String, error: PlannerError },
}

impl Planner {
    pub fn for_address(
        query: AddressQuery,
        config: &ResolverConfig,
        cache: Option<Arc<LocalityCache>>,
    ) -> Self {
        let kind = query.address.kind();
        if kind == AddressType::None {
            return Self::None;
        }

        let ctx = AddressContext::new(query, *config, cache);
        match kind {
            AddressType::None => Self::None,
            AddressType::Simple => Self::Simple(SimplePlanner::new(ctx)),
            AddressType::Intersection => Self::Intersection(IntersectionPlanner::new(ctx)),
            AddressType::Between => Self::Between(BetweenPlanner::new(ctx)),
        }
    }

    pub fn for_location(query: LocationQuery, config: &ResolverConfig) -> Self {
        Self::Location(LocationPlanner::new(query, *config))
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Simple(_) => "simple",
            Self::Intersection(_) => "intersection",
            Self::Between(_) => "between",
            Self::Location(_) => "location",
            Self::Failed { .. } => "failed",
        }
    }

    /// Short description of the query, for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::None => "not an address".to_string(),
            Self::Simple(planner) => planner.describe(),
            Self::Intersection(planner) => planner.describe(),
            Self::Between(planner) => planner.describe(),
            Self::Location(planner) => planner.describe(),
            Self::Failed { query, .. } => query.clone(),
        }
    }

    /// Searches needed before the planner can progress, `None` once it is done.
    ///
    /// After returning `None` the planner must not be stepped again.
    pub fn next_step(&mut self) -> Option<Vec<SearchRequest>> {
        let step = match self {
            Self::None | Self::Failed { .. } => None,
            Self::Simple(planner) => planner.next_step(),
            Self::Intersection(planner) => planner.next_step(),
            Self::Between(planner) => planner.next_step(),
            Self::Location(planner) => planner.next_step(),
        };
        if let Some(requests) = &step {
            debug!(planner = self.kind(), requests = requests.len(), "Planner step");
        }
        step
    }

    /// Hands back the requests of the last step, fulfilled and in the order they were issued.
    ///
    /// Errors that only concern this query turn the planner into [`Planner::Failed`]. The
    /// returned error is reserved for broken request envelopes.
    pub fn resume(&mut self, requests: Vec<SearchRequest>) -> Result<(), SearchError> {
        let outcome = match self {
            Self::None | Self::Failed { .. } => Ok(()),
            Self::Simple(planner) => planner.resume(requests),
            Self::Intersection(planner) => planner.resume(requests),
            Self::Between(planner) => planner.resume(requests),
            Self::Location(planner) => planner.resume(requests),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(StepError::Search(err)) => Err(err),
            Err(StepError::Planner(error)) => {
                self.fail(error);
                Ok(())
            }
        }
    }

    fn fail(&mut self, error: PlannerError) {
        let query = self.describe();
        warn!(
            planner = self.kind(),
            query = %query,
            document_id = error.document_id().unwrap_or("-"),
            error = %error,
            "Query failed"
        );
        *self = Self::Failed { query, error };
    }

    /// Builds the result of a planner that is done.
    pub fn final_result(self) -> Result<QueryResult, PlannerError> {
        let query = self.describe();
        let result = match self {
            Self::None => Ok(QueryResult::empty(true)),
            Self::Failed { error, .. } => return Err(error),
            Self::Simple(planner) => planner.final_result(),
            Self::Intersection(planner) => planner.final_result(),
            Self::Between(planner) => planner.final_result(),
            Self::Location(planner) => planner.final_result(),
        };

        if let Err(error) = &result {
            warn!(
                query = %query,
                document_id = error.document_id().unwrap_or("-"),
                error = %error,
                "Query failed"
            );
        }
        result
    }
}

mod error {
    use thiserror::Error;

    use crate::geometry::GeometryError;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum PlannerError {
        #[error("Expected a {expected} document, found a {found} ({document_id})")]
        UnexpectedDocument {
            expected: &'static str,
            found: &'static str,
            document_id: String,
        },
        #[error("Intersection {document_id} ({id_a} - {id_b}) matches none of the searched streets")]
        UnknownIntersection {
            document_id: String,
            id_a: String,
            id_b: String,
        },
        #[error("Invalid geometry in {document_id}: {source}")]
        Geometry {
            document_id: String,
            source: GeometryError,
        },
        #[error("Step expected {expected} search results, got {actual}")]
        ResponseCount { expected: usize, actual: usize },
    }

    impl PlannerError {
        /// ID of the document that broke the query, if any.
        pub fn document_id(&self) -> Option<&str> {
            match self {
                Self::UnexpectedDocument { document_id, .. }
                | Self::UnknownIntersection { document_id, .. }
                | Self::Geometry { document_id, .. } => Some(document_id),
                Self::ResponseCount { .. } => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::{AddressData, QueryParams},
        search::{IndexKind, SearchResponse},
    };

    fn fulfill_empty(requests: &[SearchRequest]) {
        for request in requests {
            request.fulfill(SearchResponse::empty()).unwrap();
        }
    }

    #[test]
    fn test_none_planner_has_no_steps() {
        let mut planner = Planner::for_address(
            AddressQuery::new(AddressData::none(), QueryParams::new()),
            &ResolverConfig::default(),
            None,
        );
        assert_eq!(planner.kind(), "none");
        assert!(planner.next_step().is_none());

        let result = planner.final_result().unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_simple_planner_single_step() {
        let mut planner = Planner::for_address(
            AddressQuery::new(
                AddressData::simple("CORRIENTES").with_door_number(1000, None),
                QueryParams::new(),
            ),
            &ResolverConfig::default(),
            None,
        );

        let requests = planner.next_step().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query().index, IndexKind::StreetBlocks);
        assert_eq!(requests[0].query().door_number, Some(1000));

        fulfill_empty(&requests);
        planner.resume(requests).unwrap();
        assert!(planner.next_step().is_none());
        assert!(planner.final_result().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_response_count_fails_only_the_planner() {
        let mut planner = Planner::for_address(
            AddressQuery::new(
                AddressData::intersection("PARANA", "SANTA FE"),
                QueryParams::new(),
            ),
            &ResolverConfig::default(),
            None,
        );
        let mut requests = planner.next_step().unwrap();
        requests.pop();
        fulfill_empty(&requests);

        planner.resume(requests).unwrap();
        assert_eq!(planner.kind(), "failed");
        assert!(planner.next_step().is_none());
        assert!(matches!(
            planner.final_result(),
            Err(PlannerError::ResponseCount { .. })
        ));
    }

    #[test]
    fn test_unfulfilled_request_is_fatal() {
        let mut planner = Planner::for_address(
            AddressQuery::new(AddressData::simple("CORRIENTES"), QueryParams::new()),
            &ResolverConfig::default(),
            None,
        );
        let requests = planner.next_step().unwrap();
        assert!(matches!(
            planner.resume(requests),
            Err(SearchError::ResultNotSet)
        ));
    }

    #[test]
    fn test_error_document_id() {
        let error = PlannerError::UnknownIntersection {
            document_id: "x1".into(),
            id_a: "a".into(),
            id_b: "b".into(),
        };
        assert_eq!(error.document_id(), Some("x1"));
        assert_eq!(
            PlannerError::ResponseCount {
                expected: 1,
                actual: 0
            }
            .document_id(),
            None
        );
    }
}
