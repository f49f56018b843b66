//! Batched execution of planners.
//!
//! Every round collects the next step of each pending planner and sends all of their requests to
//! the backend in one [`SearchBackend::multi_search`] call. A batch therefore needs as many
//! backend round trips as its longest planner has steps, however many queries it holds.

use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::{
    planner::{Planner, PlannerError},
    result::QueryResult,
    search::{SearchBackend, SearchError, SearchQuery, SearchRequest},
};

/// Outcome of one query of a batch.
pub type QueryOutcome = Result<QueryResult, PlannerError>;

/// Runs `planners` to completion and returns their results in input order.
///
/// Queries that hit inconsistent data fail individually. Backend failures and broken request
/// envelopes fail the whole batch.
#[instrument(name = "Resolve Batch", level = "info", skip_all, fields(queries = planners.len(), backend = backend.name()))]
pub fn resolve(
    backend: &dyn SearchBackend,
    mut planners: Vec<Planner>,
) -> Result<Vec<QueryOutcome>, SearchError> {
    let t_start = Instant::now();
    let mut pending: Vec<usize> = (0..planners.len()).collect();
    let mut rounds = 0_usize;
    let mut searches = 0_usize;

    while !pending.is_empty() {
        let mut steps: Vec<(usize, Vec<SearchRequest>)> = Vec::with_capacity(pending.len());
        pending.retain(|&index| match planners[index].next_step() {
            Some(requests) => {
                steps.push((index, requests));
                true
            }
            None => false,
        });
        if steps.is_empty() {
            break;
        }

        let round_start = Instant::now();
        rounds += 1;
        let responses = {
            let queries: Vec<&SearchQuery> = steps
                .iter()
                .flat_map(|(_, requests)| requests.iter().map(SearchRequest::query))
                .collect();
            searches += queries.len();

            let responses = backend.multi_search(&queries)?;
            if responses.len() != queries.len() {
                return Err(SearchError::ResponseCount {
                    expected: queries.len(),
                    actual: responses.len(),
                });
            }
            responses
        };

        let mut responses = responses.into_iter();
        for (index, requests) in steps {
            for (request, response) in requests.iter().zip(responses.by_ref()) {
                request.fulfill(response)?;
            }
            planners[index].resume(requests)?;
        }

        debug!(
            round = rounds,
            planners = pending.len(),
            elapsed_ms = round_start.elapsed().as_millis(),
            "Round complete"
        );
    }

    let outcomes: Vec<QueryOutcome> = planners.into_iter().map(Planner::final_result).collect();

    info!(
        rounds,
        searches,
        failed = outcomes.iter().filter(|outcome| outcome.is_err()).count(),
        elapsed_ms = t_start.elapsed().as_millis(),
        "Batch resolved"
    );
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        address::{AddressData, AddressQuery, LocationQuery, QueryParams},
        config::ResolverConfig,
        geometry::Point,
        search::{IndexKind, Result as SearchResult, SearchResponse},
    };

    /// Answers every query with an empty page and records the shape of each call.
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<Vec<IndexKind>>>,
        drop_last: bool,
    }

    impl SearchBackend for RecordingBackend {
        fn multi_search(&self, queries: &[&SearchQuery]) -> SearchResult<Vec<SearchResponse>> {
            self.calls
                .lock()
                .unwrap()
                .push(queries.iter().map(|query| query.index).collect());
            let mut responses = vec![SearchResponse::empty(); queries.len()];
            if self.drop_last {
                responses.pop();
            }
            Ok(responses)
        }
    }

    fn address(data: AddressData) -> Planner {
        Planner::for_address(
            AddressQuery::new(data, QueryParams::new()),
            &ResolverConfig::default(),
            None,
        )
    }

    #[test]
    fn test_rounds_follow_longest_planner() {
        let backend = RecordingBackend::default();
        let planners = vec![
            address(AddressData::simple("corrientes")),
            address(AddressData::none()),
            Planner::for_location(
                LocationQuery::new(Point::new(-34.6, -58.39)),
                &ResolverConfig::default(),
            ),
            address(AddressData::intersection("parana", "santa fe")),
        ];

        let outcomes = resolve(&backend, planners).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(Result::is_ok));

        // Every street search came back empty, so the intersection planner stops after its
        // street step: a single round holding all requests.
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![
                IndexKind::StreetBlocks,
                IndexKind::States,
                IndexKind::Departments,
                IndexKind::LocalGovernments,
                IndexKind::StreetBlocks,
                IndexKind::StreetBlocks,
                IndexKind::StreetBlocks,
            ]
        );
    }

    #[test]
    fn test_no_backend_call_without_steps() {
        let backend = RecordingBackend::default();
        let outcomes = resolve(&backend, vec![address(AddressData::none())]).unwrap();
        assert!(backend.calls.lock().unwrap().is_empty());

        let result = outcomes.into_iter().next().unwrap().unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_short_backend_response_fails_batch() {
        let backend = RecordingBackend {
            drop_last: true,
            ..RecordingBackend::default()
        };
        let err = resolve(&backend, vec![address(AddressData::simple("corrientes"))]).unwrap_err();
        assert!(matches!(
            err,
            SearchError::ResponseCount {
                expected: 1,
                actual: 0
            }
        ));
    }
}
