use super::{
    PlannerError, StepError,
    common::{expect_doc, street_blocks, take_responses},
};
use crate::{
    address::LocationQuery,
    config::ResolverConfig,
    geometry::nearest_block,
    result::{LocationHit, QueryResult, ResolvedEntity, TerritoryEntity},
    search::{
        DocField, Document, IndexKind, SearchQuery, SearchRequest, SearchResponse, SourceFields,
        Territory,
    },
};

const NEAREST_STREET_FIELD: &str = "nearest_street";

/// Administrative areas containing a coordinate pair, plus the closest street block.
///
/// Everything is searched in a single step.
#[derive(Debug)]
pub struct LocationPlanner {
    query: LocationQuery,
    config: ResolverConfig,
    stepped: bool,
    hit: Option<LocationHit>,
}

impl LocationPlanner {
    pub(super) const fn new(query: LocationQuery, config: ResolverConfig) -> Self {
        Self {
            query,
            config,
            stepped: false,
            hit: None,
        }
    }

    pub fn describe(&self) -> String {
        format!("location {:.6}, {:.6}", self.query.point.lat, self.query.point.lon)
    }

    fn wants_nearest_street(&self) -> bool {
        self.query.fields.contains(NEAREST_STREET_FIELD)
    }

    fn territory_query(&self, index: IndexKind) -> SearchQuery {
        SearchQuery::new(index)
            .intersects_point(self.query.point)
            .fields(SourceFields::Only(vec![
                DocField::Id,
                DocField::Name,
                DocField::Source,
            ]))
            .size(1)
    }

    pub(super) fn next_step(&mut self) -> Option<Vec<SearchRequest>> {
        if self.stepped {
            return None;
        }
        self.stepped = true;

        let mut requests: Vec<SearchRequest> = [
            IndexKind::States,
            IndexKind::Departments,
            IndexKind::LocalGovernments,
        ]
        .into_iter()
        .map(|index| SearchRequest::new(self.territory_query(index)))
        .collect();

        if self.wants_nearest_street() {
            let blocks = SearchQuery::new(IndexKind::StreetBlocks)
                .within_circles(&[self.query.point], self.config.location_street_radius_m)
                .size(self.config.nearest_block_candidates);
            requests.push(SearchRequest::new(blocks));
        }
        Some(requests)
    }

    pub(super) fn resume(&mut self, requests: Vec<SearchRequest>) -> Result<(), StepError> {
        let point = self.query.point;
        let (state, department, local_government, nearest_street) =
            if self.wants_nearest_street() {
                let [state, department, local_government, blocks] =
                    take_responses::<4>(requests)?;
                let nearest = nearest_block(point, &street_blocks(blocks)?);
                (state, department, local_government, nearest)
            } else {
                let [state, department, local_government] = take_responses::<3>(requests)?;
                (state, department, local_government, None)
            };

        let mut hit = LocationHit {
            state: TerritoryEntity::empty(),
            department: TerritoryEntity::empty(),
            local_government: TerritoryEntity::empty(),
            lat: point.lat,
            lon: point.lon,
            nearest_street,
        };

        // Areas outside every state are not reported, even if a department matched.
        if let Some(state) = first_territory(state)? {
            hit.state = TerritoryEntity::from(state);
            hit.department = first_territory(department)?
                .map(TerritoryEntity::from)
                .unwrap_or_default();
            hit.local_government = first_territory(local_government)?
                .map(TerritoryEntity::from)
                .unwrap_or_default();
        }

        self.hit = Some(hit);
        Ok(())
    }

    pub(super) fn final_result(self) -> Result<QueryResult, PlannerError> {
        Ok(self.hit.map_or(QueryResult::empty(false), |hit| {
            QueryResult::from_single_entity(ResolvedEntity::Location(hit))
        }))
    }
}

fn first_territory(response: SearchResponse) -> Result<Option<Territory>, PlannerError> {
    response
        .hits
        .into_iter()
        .next()
        .map(|doc| expect_doc(doc, "territory", Document::into_territory))
        .transpose()
}
