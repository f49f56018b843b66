//! State and helpers shared by the address planners.

use std::sync::Arc;

use ahash::AHashMap as HashMap;
use itertools::Itertools;
use tracing::debug;

use super::{PlannerError, StepError};
use crate::{
    address::{AddressData, AddressQuery, AddressType, AreaFilter, EntitySelector, Order, QueryParams},
    cache::{LocalityCache, LocalityCacheKey},
    config::ResolverConfig,
    geometry::{Point, street_block_number_location},
    result::{AddressHit, StreetEntity, TerritoryEntity},
    search::{
        DocField, Document, EntityRef, IndexKind, Intersection, Locality, SearchQuery,
        SearchRequest, SearchResponse, SourceFields, StreetBlock, StreetRef,
    },
};

/// Progress of the locality expansion of an address query.
#[derive(Debug)]
enum LocalityPhase {
    /// A locality was given and has not been expanded yet.
    Pending(EntitySelector),
    Waiting(LocalityCacheKey),
    Done,
    /// The locality matched nothing, so neither can the address.
    Empty,
}

/// One address query being planned.
#[derive(Debug)]
pub(super) struct AddressContext {
    pub address: AddressData,
    pub params: QueryParams,
    pub config: ResolverConfig,
    cache: Option<Arc<LocalityCache>>,
    locality: LocalityPhase,
}

impl AddressContext {
    pub fn new(query: AddressQuery, config: ResolverConfig, cache: Option<Arc<LocalityCache>>) -> Self {
        let AddressQuery {
            address,
            mut params,
        } = query;
        let locality = params
            .locality
            .take()
            .map_or(LocalityPhase::Done, LocalityPhase::Pending);

        Self {
            address,
            params,
            config,
            cache,
            locality,
        }
    }

    pub fn describe(&self) -> String {
        let door = self
            .door_number()
            .map(|n| format!(" {n}"))
            .unwrap_or_default();
        format!(
            "{:?} address {}{door}",
            self.address.kind(),
            self.address.street_names().iter().join(" / ")
        )
    }

    pub fn door_number(&self) -> Option<u32> {
        self.address.door_number().value()
    }

    /// The locality search to run before anything else, if one is still needed.
    ///
    /// Cached expansions are applied immediately and need no search.
    pub fn locality_request(&mut self) -> Option<SearchRequest> {
        let LocalityPhase::Pending(selector) = &self.locality else {
            return None;
        };

        let key = LocalityCacheKey {
            locality: selector.clone(),
            state: self.params.state.clone(),
            department: self.params.department.clone(),
            census_locality: self.params.census_locality.clone(),
            local_government: self.params.local_government.clone(),
            exact: self.params.exact,
        };

        if let Some(ids) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!(census_localities = ids.len(), "Locality expansion cache hit");
            self.apply_census_localities(ids);
            return None;
        }

        let mut query = SearchQuery::new(IndexKind::Localities)
            .state(self.params.state.clone())
            .department(self.params.department.clone())
            .census_locality(self.params.census_locality.clone())
            .local_government(self.params.local_government.clone())
            .fields(SourceFields::Only(vec![DocField::CensusLocalityId]))
            .all_matches(self.config.max_result_len);
        query = match &key.locality {
            EntitySelector::Ids(ids) => query.ids(ids.clone()),
            EntitySelector::Name(name) => query.name(name.clone(), self.params.exact),
        };

        self.locality = LocalityPhase::Waiting(key);
        Some(SearchRequest::new(query))
    }

    pub const fn is_waiting_locality(&self) -> bool {
        matches!(self.locality, LocalityPhase::Waiting(_))
    }

    pub const fn found_nothing(&self) -> bool {
        matches!(self.locality, LocalityPhase::Empty)
    }

    pub fn resume_locality(&mut self, requests: Vec<SearchRequest>) -> Result<(), StepError> {
        let [response] = take_responses::<1>(requests)?;
        let ids = response
            .hits
            .into_iter()
            .map(|doc| expect_doc(doc, "locality", Document::into_locality))
            .map_ok(|locality: Locality| locality.census_locality.id)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .unique()
            .collect_vec();

        if let LocalityPhase::Waiting(key) =
            std::mem::replace(&mut self.locality, LocalityPhase::Done)
            && let Some(cache) = &self.cache
        {
            cache.insert(key, ids.clone());
        }

        debug!(census_localities = ids.len(), "Locality expanded");
        self.apply_census_localities(ids);
        Ok(())
    }

    fn apply_census_localities(&mut self, ids: Vec<String>) {
        if ids.is_empty() {
            self.locality = LocalityPhase::Empty;
            return;
        }
        // The locality search already honoured the caller's census locality filter.
        self.params.census_locality = Some(AreaFilter::Ids(ids));
        self.locality = LocalityPhase::Done;
    }

    /// Street block search for the `n`th street of the address.
    ///
    /// Only the first street is filtered by door number. `all` ignores the caller's pagination.
    pub fn street_blocks_query(&self, n: usize, all: bool) -> SearchQuery {
        let name = self.address.cross_street(n).unwrap_or_default();
        let number = if n == 0 { self.door_number() } else { None };

        let query = SearchQuery::new(IndexKind::StreetBlocks)
            .name(name, self.params.exact)
            .door_number(number)
            .state(self.params.state.clone())
            .department(self.params.department.clone())
            .census_locality(self.params.census_locality.clone())
            .order(self.params.order);

        if all {
            query.all_matches(self.config.max_result_len)
        } else {
            query.size(self.params.size).offset(self.params.offset)
        }
    }

    /// Intersections between any street of `first` and any of `second`, optionally restricted to
    /// circles around `points`. Ordering is done locally, never by the backend.
    pub fn intersections_query(
        &self,
        first: &[String],
        second: &[String],
        points: &[Point],
        tolerance_m: f64,
        all: bool,
    ) -> SearchQuery {
        let query = SearchQuery::new(IndexKind::Intersections)
            .id_pair(first.to_vec(), second.to_vec())
            .state(self.params.state.clone())
            .department(self.params.department.clone())
            .census_locality(self.params.census_locality.clone())
            .within_circles(points, tolerance_m);

        if all {
            query.all_matches(self.config.max_result_len)
        } else {
            query.size(self.params.size).offset(self.params.offset)
        }
    }

    /// Address hit with the areas and source of `street`, ready for street specific fields.
    pub fn base_hit(&self, street: &StreetRef, locality: Option<&EntityRef>) -> AddressHit {
        AddressHit {
            state: TerritoryEntity::from(&street.state),
            department: TerritoryEntity::from(&street.department),
            census_locality: TerritoryEntity::from(&street.census_locality),
            locality: locality.map(TerritoryEntity::from).unwrap_or_default(),
            source: street.source.clone(),
            door_number: self.address.door_number().clone(),
            floor: self.address.floor().map(str::to_string),
            location: crate::geometry::Location::default(),
            street: StreetEntity::from(street),
            cross_street_1: StreetEntity::empty(),
            cross_street_2: StreetEntity::empty(),
            full_name: None,
        }
    }

    /// Canonical name of the address built from the normalized street names, e.g.
    /// `SANTA FE 1000 (ESQUINA PARANA), COMUNA 1, CIUDAD AUTÓNOMA DE BUENOS AIRES`.
    ///
    /// Department and state always come from the first street.
    pub fn full_name(&self, streets: &[&StreetRef]) -> Option<String> {
        if !self.params.fields.wants_full_name() {
            return None;
        }
        let [first, rest @ ..] = streets else {
            return None;
        };
        let door = self
            .door_number()
            .map(|n| format!(" {n}"))
            .unwrap_or_default();

        let head = match (self.address.kind(), rest) {
            (AddressType::Intersection, [second, ..]) => {
                format!("{}{door} (ESQUINA {})", first.name, second.name)
            }
            (AddressType::Between, [second, third, ..]) => {
                format!(
                    "{}{door} (ENTRE {} Y {})",
                    first.name, second.name, third.name
                )
            }
            _ => format!("{}{door}", first.name),
        };
        Some(format!(
            "{head}, {}, {}",
            first.department.name, first.state.name
        ))
    }

    /// Sorts hits by the requested order on their first street.
    pub fn sort_hits(&self, hits: &mut [AddressHit]) {
        match self.params.order {
            Some(Order::Id) => hits.sort_by(|a, b| a.street.id.cmp(&b.street.id)),
            Some(Order::Name) => hits.sort_by(|a, b| a.street.name.cmp(&b.street.name)),
            None => {}
        }
    }
}

/// First street of an intersection or between address: the matching street IDs and, with a door
/// number, the point of that number on each street.
///
/// With a door number only streets where the number could be located are kept.
#[derive(Debug, Default)]
pub(super) struct FirstStreet {
    pub ids: Vec<String>,
    pub points: HashMap<String, Point>,
}

impl FirstStreet {
    pub fn read(ctx: &AddressContext, blocks: Vec<StreetBlock>) -> Result<Self, PlannerError> {
        let Some(number) = ctx.door_number() else {
            return Ok(Self {
                ids: street_ids(&blocks),
                points: HashMap::new(),
            });
        };

        let mut first = Self::default();
        for block in blocks {
            let point =
                street_block_number_location(&block.geometry, &block.door_numbers, Some(number), false)
                    .map_err(|source| PlannerError::Geometry {
                        document_id: block.id.clone(),
                        source,
                    })?;
            if let Some(point) = point {
                if !first.points.contains_key(&block.street.id) {
                    first.ids.push(block.street.id.clone());
                }
                first.points.insert(block.street.id, point);
            }
        }
        Ok(first)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    pub fn door_points(&self) -> Vec<Point> {
        self.ids
            .iter()
            .filter_map(|id| self.points.get(id).copied())
            .collect()
    }
}

/// Distinct street IDs of a list of blocks, in first seen order.
pub(super) fn street_ids(blocks: &[StreetBlock]) -> Vec<String> {
    blocks
        .iter()
        .map(|block| block.street.id.clone())
        .unique()
        .collect()
}

/// Results of a step, checking the planner got back as many as it issued.
pub(super) fn take_responses<const N: usize>(
    requests: Vec<SearchRequest>,
) -> Result<[SearchResponse; N], StepError> {
    let responses = requests
        .into_iter()
        .map(SearchRequest::into_result)
        .collect::<Result<Vec<_>, _>>()?;

    responses.try_into().map_err(|responses: Vec<SearchResponse>| {
        StepError::Planner(PlannerError::ResponseCount {
            expected: N,
            actual: responses.len(),
        })
    })
}

pub(super) fn expect_doc<T>(
    doc: Document,
    expected: &'static str,
    convert: fn(Document) -> Option<T>,
) -> Result<T, PlannerError> {
    let found = doc.kind();
    let document_id = doc.id().to_string();
    convert(doc).ok_or(PlannerError::UnexpectedDocument {
        expected,
        found,
        document_id,
    })
}

pub(super) fn street_blocks(response: SearchResponse) -> Result<Vec<StreetBlock>, PlannerError> {
    response
        .hits
        .into_iter()
        .map(|doc| expect_doc(doc, "street block", Document::into_street_block))
        .collect()
}

pub(super) fn intersections(response: SearchResponse) -> Result<Vec<Intersection>, PlannerError> {
    response
        .hits
        .into_iter()
        .map(|doc| expect_doc(doc, "intersection", Document::into_intersection))
        .collect()
}

/// Point geometry of an intersection.
pub(super) fn intersection_point(intersection: &Intersection) -> Result<Point, PlannerError> {
    intersection
        .geometry
        .point()
        .map_err(|source| PlannerError::Geometry {
            document_id: intersection.id.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{
        address::RequestedFields,
        cache::SharedFrequencyCache,
        geometry::{DoorNumberBounds, Geometry},
        search::Locality,
    };

    fn street(name: &str) -> StreetRef {
        StreetRef {
            id: format!("{name}-id"),
            name: name.to_string(),
            category: "CALLE".to_string(),
            state: EntityRef::new("02", "CIUDAD AUTÓNOMA DE BUENOS AIRES"),
            department: EntityRef::new("02007", "COMUNA 1"),
            census_locality: EntityRef::new("02007010", "CIUDAD DE BUENOS AIRES"),
            source: "INDEC".to_string(),
        }
    }

    fn context(address: AddressData, params: QueryParams) -> AddressContext {
        AddressContext::new(
            AddressQuery::new(address, params),
            ResolverConfig::default(),
            None,
        )
    }

    fn locality_response(census_ids: &[&str]) -> SearchResponse {
        let hits = census_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                Document::Locality(Locality {
                    id: format!("{id}{i:03}"),
                    name: "PALERMO".into(),
                    state: EntityRef::new("02", "CABA"),
                    department: EntityRef::new("02007", "COMUNA 1"),
                    local_government: None,
                    census_locality: EntityRef::new(*id, "CABA"),
                })
            })
            .collect_vec();
        let total = hits.len();
        SearchResponse::new(hits, total, 0)
    }

    #[test]
    fn test_full_names() {
        let santa_fe = street("SANTA FE");
        let parana = street("PARANA");
        let alvear = street("ALVEAR");

        let simple = context(
            AddressData::simple("santa fe").with_door_number(1000, None),
            QueryParams::new(),
        );
        assert_eq!(
            simple.full_name(&[&santa_fe]).as_deref(),
            Some("SANTA FE 1000, COMUNA 1, CIUDAD AUTÓNOMA DE BUENOS AIRES")
        );

        let corner = context(
            AddressData::intersection("santa fe", "parana"),
            QueryParams::new(),
        );
        assert_eq!(
            corner.full_name(&[&santa_fe, &parana]).as_deref(),
            Some("SANTA FE (ESQUINA PARANA), COMUNA 1, CIUDAD AUTÓNOMA DE BUENOS AIRES")
        );

        let between = context(
            AddressData::between("parana", "santa fe", "alvear").with_door_number(1010, None),
            QueryParams::new(),
        );
        assert_eq!(
            between.full_name(&[&parana, &santa_fe, &alvear]).as_deref(),
            Some("PARANA 1010 (ENTRE SANTA FE Y ALVEAR), COMUNA 1, CIUDAD AUTÓNOMA DE BUENOS AIRES")
        );
    }

    #[test]
    fn test_full_name_only_when_requested() {
        let ctx = context(
            AddressData::simple("santa fe"),
            QueryParams::new().fields(RequestedFields::only(["street.name"])),
        );
        assert!(ctx.full_name(&[&street("SANTA FE")]).is_none());
    }

    #[test]
    fn test_base_hit() {
        let ctx = context(
            AddressData::simple("santa fe")
                .with_door_number(1000, Some("bis"))
                .with_floor("3"),
            QueryParams::new(),
        );
        let palermo = EntityRef::new("02007010001", "PALERMO");
        let hit = ctx.base_hit(&street("SANTA FE"), Some(&palermo));

        assert_eq!(hit.state.id.as_deref(), Some("02"));
        assert_eq!(hit.census_locality.id.as_deref(), Some("02007010"));
        assert_eq!(hit.locality.name.as_deref(), Some("PALERMO"));
        assert_eq!(hit.source, "INDEC");
        assert_eq!(hit.door_number.value, Some(1000));
        assert_eq!(hit.floor.as_deref(), Some("3"));
        assert!(hit.location.is_null());
        assert_eq!(hit.cross_street_1, StreetEntity::empty());
    }

    #[test]
    fn test_street_blocks_query_pagination() {
        let ctx = context(
            AddressData::intersection("parana", "santa fe").with_door_number(1010, None),
            QueryParams::new().size(3).offset(6).order(Order::Name),
        );

        let first = ctx.street_blocks_query(0, false);
        assert_eq!(first.door_number, Some(1010));
        assert_eq!((first.size, first.offset), (3, 6));
        assert_eq!(first.order, Some(Order::Name));

        let second = ctx.street_blocks_query(1, true);
        assert_eq!(second.door_number, None);
        assert_eq!(second.name.as_deref(), Some("santa fe"));
        assert_eq!((second.size, second.offset), (5000, 0));

        let intersections = ctx.intersections_query(&["a".into()], &["b".into()], &[], 50.0, false);
        assert_eq!(intersections.order, None);
        assert!(intersections.geo_shapes.is_empty());
    }

    #[test]
    fn test_locality_expansion_narrows_census_localities() {
        let mut ctx = context(
            AddressData::simple("santa fe"),
            QueryParams::new()
                .census_locality(AreaFilter::Name("CABA".into()))
                .locality(EntitySelector::Name("Palermo".into())),
        );

        let request = ctx.locality_request().expect("locality search");
        assert_eq!(request.query().index, IndexKind::Localities);
        assert_eq!(
            request.query().fields,
            SourceFields::Only(vec![DocField::CensusLocalityId])
        );
        assert!(ctx.is_waiting_locality());
        assert!(ctx.locality_request().is_none());

        request
            .fulfill(locality_response(&["02007010", "02007010", "02014010"]))
            .unwrap();
        ctx.resume_locality(vec![request]).unwrap();

        assert!(!ctx.found_nothing());
        assert_eq!(
            ctx.params.census_locality,
            Some(AreaFilter::Ids(vec!["02007010".into(), "02014010".into()]))
        );
    }

    #[test]
    fn test_locality_expansion_empty_and_cached() {
        let cache: Arc<LocalityCache> =
            Arc::new(SharedFrequencyCache::new(NonZeroUsize::new(8).unwrap()));
        let params = QueryParams::new().locality(EntitySelector::Name("Nowhere".into()));

        let mut first = AddressContext::new(
            AddressQuery::new(AddressData::simple("x"), params.clone()),
            ResolverConfig::default(),
            Some(Arc::clone(&cache)),
        );
        let request = first.locality_request().unwrap();
        request.fulfill(SearchResponse::empty()).unwrap();
        first.resume_locality(vec![request]).unwrap();
        assert!(first.found_nothing());
        assert_eq!(cache.len(), 1);

        // Same locality and filters: answered from the cache, including the empty result.
        let mut second = AddressContext::new(
            AddressQuery::new(AddressData::simple("y"), params),
            ResolverConfig::default(),
            Some(cache),
        );
        assert!(second.locality_request().is_none());
        assert!(second.found_nothing());
    }

    #[test]
    fn test_first_street_with_door_number() {
        let ctx = context(
            AddressData::intersection("parana", "santa fe").with_door_number(1050, None),
            QueryParams::new(),
        );
        let block = |id: &str, street_id: &str, bounds| StreetBlock {
            id: id.to_string(),
            street: StreetRef {
                id: street_id.to_string(),
                ..street("PARANA")
            },
            door_numbers: bounds,
            geometry: Geometry::LineString(vec![[-58.39, -34.6], [-58.39, -34.601]]),
            locality: None,
        };

        let blocks = vec![
            block("b1", "s1", DoorNumberBounds::new(1000, 1001, 1098, 1099)),
            // Equal bounds: the number cannot be located on this street.
            block("b2", "s2", DoorNumberBounds::new(1050, 1050, 1050, 1050)),
        ];
        let first = FirstStreet::read(&ctx, blocks).unwrap();
        assert_eq!(first.ids, vec!["s1".to_string()]);
        assert!(first.contains("s1"));
        assert!(!first.contains("s2"));
        assert_eq!(first.door_points().len(), 1);
    }

    #[test]
    fn test_take_responses_count() {
        let request = SearchRequest::new(SearchQuery::new(IndexKind::States));
        request.fulfill(SearchResponse::empty()).unwrap();
        let err = take_responses::<2>(vec![request]).unwrap_err();
        assert!(matches!(
            err,
            StepError::Planner(PlannerError::ResponseCount {
                expected: 2,
                actual: 1
            })
        ));
    }
}
