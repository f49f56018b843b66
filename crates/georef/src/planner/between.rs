use ahash::AHashMap as HashMap;
use itertools::Itertools;

use super::{
    PlannerError, StepError,
    common::{
        AddressContext, FirstStreet, intersection_point, intersections, street_blocks, street_ids,
        take_responses,
    },
};
use crate::{
    geometry::Point,
    result::{AddressHit, QueryResult, ResolvedEntity, StreetEntity},
    search::{Intersection, SearchRequest, StreetRef},
};

/// A candidate `street 1 between street 2 and street 3` match, built up from the intersections of
/// one street 1.
///
/// The points of streets 2 and 3 are where they cross street 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BetweenEntry {
    pub street_1: Option<StreetRef>,
    /// Door number point on street 1, when the address has a number.
    pub street_1_point: Option<Point>,
    pub street_2: Option<StreetRef>,
    pub street_2_point: Option<Point>,
    pub street_3: Option<StreetRef>,
    pub street_3_point: Option<Point>,
}

impl BetweenEntry {
    pub fn new(street_1: StreetRef, street_1_point: Option<Point>) -> Self {
        Self {
            street_1: Some(street_1),
            street_1_point,
            ..Self::default()
        }
    }

    /// `true` when all three streets are set and both crossings lie within `tolerance_m` of each
    /// other.
    pub fn valid(&self, tolerance_m: f64) -> bool {
        if self.street_1.is_none() || self.street_2.is_none() || self.street_3.is_none() {
            return false;
        }
        match (self.street_2_point, self.street_3_point) {
            (Some(a), Some(b)) => a.distance_meters(&b) < tolerance_m,
            _ => false,
        }
    }

    /// The door number point if known, otherwise halfway between both crossings.
    pub fn point(&self) -> Option<Point> {
        self.street_1_point.or_else(|| {
            let (a, b) = (self.street_2_point?, self.street_3_point?);
            Some(a.midpoint(&b))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Locality,
    Streets,
    Intersections,
    Done,
}

/// `street [number] between street and street`.
///
/// All three streets are searched together, then every intersection of street 1 with either
/// of the others. Results are not paginated: `total` is the number of valid entries.
#[derive(Debug)]
pub struct BetweenPlanner {
    ctx: AddressContext,
    stage: Stage,
    first: FirstStreet,
    second: Vec<String>,
    third: Vec<String>,
    result: Option<QueryResult>,
}

impl BetweenPlanner {
    pub(super) fn new(ctx: AddressContext) -> Self {
        Self {
            ctx,
            stage: Stage::Locality,
            first: FirstStreet::default(),
            second: Vec::new(),
            third: Vec::new(),
            result: None,
        }
    }

    pub fn describe(&self) -> String {
        self.ctx.describe()
    }

    pub(super) fn next_step(&mut self) -> Option<Vec<SearchRequest>> {
        match self.stage {
            Stage::Locality => {
                self.stage = Stage::Streets;
                match self.ctx.locality_request() {
                    Some(request) => Some(vec![request]),
                    None => self.next_step(),
                }
            }
            Stage::Streets => {
                if self.ctx.found_nothing() {
                    self.stage = Stage::Done;
                    return None;
                }
                self.stage = Stage::Intersections;
                Some(
                    (0..3)
                        .map(|n| SearchRequest::new(self.ctx.street_blocks_query(n, true)))
                        .collect(),
                )
            }
            Stage::Intersections => {
                self.stage = Stage::Done;
                let others = self.other_ids();
                if self.first.ids.is_empty() || others.is_empty() {
                    return None;
                }
                let query = self.ctx.intersections_query(
                    &self.first.ids,
                    &others,
                    &self.first.door_points(),
                    self.ctx.config.between_door_tolerance_m,
                    true,
                );
                Some(vec![SearchRequest::new(query)])
            }
            Stage::Done => None,
        }
    }

    pub(super) fn resume(&mut self, requests: Vec<SearchRequest>) -> Result<(), StepError> {
        if self.ctx.is_waiting_locality() {
            return self.ctx.resume_locality(requests);
        }

        // The stage already points at the step after the one being resumed.
        match self.stage {
            Stage::Intersections => {
                let [first, second, third] = take_responses::<3>(requests)?;
                self.first = FirstStreet::read(&self.ctx, street_blocks(first)?)?;
                self.second = street_ids(&street_blocks(second)?);
                self.third = street_ids(&street_blocks(third)?);
            }
            _ => {
                let [response] = take_responses::<1>(requests)?;
                let entries = self.entries(intersections(response)?)?;

                let tolerance = self.ctx.config.between_distance_tolerance_m;
                let mut hits = entries
                    .iter()
                    .filter(|entry| entry.valid(tolerance))
                    .filter_map(|entry| self.hit(entry))
                    .collect_vec();
                self.ctx.sort_hits(&mut hits);

                let total = hits.len();
                let entities = hits.into_iter().map(ResolvedEntity::Address).collect();
                self.result = Some(QueryResult::from_entity_list(entities, total, 0));
            }
        }
        Ok(())
    }

    pub(super) fn final_result(self) -> Result<QueryResult, PlannerError> {
        Ok(self.result.unwrap_or(QueryResult::empty(true)))
    }

    fn other_ids(&self) -> Vec<String> {
        self.second
            .iter()
            .chain(&self.third)
            .unique()
            .cloned()
            .collect()
    }

    /// Groups intersections by their street 1, in first seen order.
    fn entries(&self, intersections: Vec<Intersection>) -> Result<Vec<BetweenEntry>, PlannerError> {
        let others = self.other_ids();
        let mut entries: Vec<BetweenEntry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for intersection in intersections {
            let point = intersection_point(&intersection)?;
            let Intersection {
                id,
                street_a,
                street_b,
                ..
            } = intersection;

            let (street, other) = if self.first.contains(&street_a.id) && others.contains(&street_b.id)
            {
                (street_a, street_b)
            } else if others.contains(&street_a.id) && self.first.contains(&street_b.id) {
                (street_b, street_a)
            } else {
                return Err(PlannerError::UnknownIntersection {
                    document_id: id,
                    id_a: street_a.id,
                    id_b: street_b.id,
                });
            };

            let position = *positions.entry(street.id.clone()).or_insert_with(|| {
                let door_point = self.first.points.get(&street.id).copied();
                entries.push(BetweenEntry::new(street, door_point));
                entries.len() - 1
            });
            let entry = &mut entries[position];

            if self.second.contains(&other.id) {
                entry.street_2 = Some(other);
                entry.street_2_point = Some(point);
            } else {
                entry.street_3 = Some(other);
                entry.street_3_point = Some(point);
            }
        }
        Ok(entries)
    }

    fn hit(&self, entry: &BetweenEntry) -> Option<AddressHit> {
        let (street, from, to) = (
            entry.street_1.as_ref()?,
            entry.street_2.as_ref()?,
            entry.street_3.as_ref()?,
        );

        let mut hit = self.ctx.base_hit(street, None);
        hit.cross_street_1 = StreetEntity::from(from);
        hit.cross_street_2 = StreetEntity::from(to);
        if self.ctx.params.fields.wants_location() {
            hit.location = entry.point().map(Point::to_location).unwrap_or_default();
        }
        hit.full_name = self.ctx.full_name(&[street, from, to]);
        Some(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::{AddressData, AddressQuery, QueryParams},
        config::ResolverConfig,
        geometry::{DoorNumberBounds, Geometry},
        search::{Document, EntityRef, SearchResponse, StreetBlock},
    };

    fn street(id: &str, name: &str) -> StreetRef {
        StreetRef {
            id: id.into(),
            name: name.into(),
            category: "CALLE".into(),
            state: EntityRef::new("02", "CIUDAD AUTÓNOMA DE BUENOS AIRES"),
            department: EntityRef::new("02007", "COMUNA 1"),
            census_locality: EntityRef::new("02007010", "CIUDAD DE BUENOS AIRES"),
            source: "INDEC".into(),
        }
    }

    fn full_entry() -> BetweenEntry {
        BetweenEntry {
            street_1: Some(street("parana", "PARANA")),
            street_1_point: None,
            street_2: Some(street("santa-fe", "AV SANTA FE")),
            street_2_point: Some(Point::new(-34.6000, -58.3900)),
            street_3: Some(street("alvear", "ALVEAR")),
            street_3_point: Some(Point::new(-34.6009, -58.3900)),
        }
    }

    #[test]
    fn test_entry_validity() {
        let entry = full_entry();
        // About 100 m between both crossings.
        assert!(entry.valid(200.0));
        assert!(!entry.valid(50.0));

        let unset: [fn(&mut BetweenEntry); 5] = [
            |e| e.street_1 = None,
            |e| e.street_2 = None,
            |e| e.street_2_point = None,
            |e| e.street_3 = None,
            |e| e.street_3_point = None,
        ];
        for unset_field in unset {
            let mut entry = full_entry();
            unset_field(&mut entry);
            assert!(!entry.valid(200.0));
        }
    }

    #[test]
    fn test_entry_point() {
        let mut entry = full_entry();
        let midpoint = entry.point().unwrap();
        assert!((midpoint.lat - -34.60045).abs() < 1e-9);
        assert!((midpoint.lon - -58.3900).abs() < 1e-9);

        let door = Point::new(-34.6003, -58.3900);
        entry.street_1_point = Some(door);
        assert_eq!(entry.point(), Some(door));

        assert_eq!(BetweenEntry::default().point(), None);
    }

    fn block(id: &str, street: StreetRef, coords: Vec<[f64; 2]>) -> Document {
        Document::StreetBlock(StreetBlock {
            id: id.into(),
            street,
            door_numbers: DoorNumberBounds::new(1000, 1001, 1098, 1099),
            geometry: Geometry::LineString(coords),
            locality: None,
        })
    }

    fn crossing(id: &str, a: StreetRef, b: StreetRef, lon_lat: [f64; 2]) -> Document {
        Document::Intersection(Intersection {
            id: id.into(),
            street_a: a,
            street_b: b,
            geometry: Geometry::Point(lon_lat),
        })
    }

    fn planner(address: AddressData) -> BetweenPlanner {
        BetweenPlanner::new(AddressContext::new(
            AddressQuery::new(address, QueryParams::new()),
            ResolverConfig::default(),
            None,
        ))
    }

    fn fulfill(requests: &[SearchRequest], responses: Vec<Vec<Document>>) {
        for (request, hits) in requests.iter().zip(responses) {
            let total = hits.len();
            request
                .fulfill(SearchResponse::new(hits, total, 0))
                .unwrap();
        }
    }

    #[test]
    fn test_between_without_number() {
        let mut planner = planner(AddressData::between("parana", "santa fe", "alvear"));

        let requests = planner.next_step().unwrap();
        assert_eq!(requests.len(), 3);
        fulfill(
            &requests,
            vec![
                vec![block(
                    "pb1",
                    street("parana", "PARANA"),
                    vec![[-58.3900, -34.6000], [-58.3900, -34.6009]],
                )],
                vec![block(
                    "sf1",
                    street("santa-fe", "AV SANTA FE"),
                    vec![[-58.3910, -34.6000], [-58.3900, -34.6000]],
                )],
                vec![block(
                    "al1",
                    street("alvear", "ALVEAR"),
                    vec![[-58.3910, -34.6009], [-58.3900, -34.6009]],
                )],
            ],
        );
        planner.resume(requests).unwrap();

        let requests = planner.next_step().unwrap();
        assert_eq!(requests[0].query().size, 5000);
        fulfill(
            &requests,
            vec![vec![
                crossing(
                    "x1",
                    street("santa-fe", "AV SANTA FE"),
                    street("parana", "PARANA"),
                    [-58.3900, -34.6000],
                ),
                crossing(
                    "x2",
                    street("parana", "PARANA"),
                    street("alvear", "ALVEAR"),
                    [-58.3900, -34.6009],
                ),
            ]],
        );
        planner.resume(requests).unwrap();
        assert!(planner.next_step().is_none());

        let result = planner.final_result().unwrap();
        assert_eq!(result.total(), 1);
        assert_eq!(result.offset(), 0);

        let hit = result.addresses().next().unwrap();
        assert_eq!(hit.street.id.as_deref(), Some("parana"));
        assert_eq!(hit.cross_street_1.id.as_deref(), Some("santa-fe"));
        assert_eq!(hit.cross_street_2.id.as_deref(), Some("alvear"));
        assert!((hit.location.lat.unwrap() - -34.60045).abs() < 1e-9);
        assert_eq!(
            hit.full_name.as_deref(),
            Some("PARANA (ENTRE AV SANTA FE Y ALVEAR), COMUNA 1, CIUDAD AUTÓNOMA DE BUENOS AIRES")
        );
    }

    #[test]
    fn test_incomplete_entries_are_dropped() {
        let mut planner = planner(AddressData::between("parana", "santa fe", "alvear"));
        let requests = planner.next_step().unwrap();
        fulfill(
            &requests,
            vec![
                vec![block(
                    "pb1",
                    street("parana", "PARANA"),
                    vec![[-58.3900, -34.6000], [-58.3900, -34.6009]],
                )],
                vec![block(
                    "sf1",
                    street("santa-fe", "AV SANTA FE"),
                    vec![[-58.3910, -34.6000], [-58.3900, -34.6000]],
                )],
                Vec::new(),
            ],
        );
        planner.resume(requests).unwrap();

        let requests = planner.next_step().unwrap();
        fulfill(
            &requests,
            vec![vec![crossing(
                "x1",
                street("parana", "PARANA"),
                street("santa-fe", "AV SANTA FE"),
                [-58.3900, -34.6000],
            )]],
        );
        planner.resume(requests).unwrap();

        let result = planner.final_result().unwrap();
        assert!(result.is_empty());
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_no_cross_streets_finishes_empty() {
        let mut planner = planner(AddressData::between("parana", "nowhere", "nothing"));
        let requests = planner.next_step().unwrap();
        fulfill(
            &requests,
            vec![
                vec![block(
                    "pb1",
                    street("parana", "PARANA"),
                    vec![[-58.3900, -34.6000], [-58.3900, -34.6009]],
                )],
                Vec::new(),
                Vec::new(),
            ],
        );
        planner.resume(requests).unwrap();
        assert!(planner.next_step().is_none());
        assert!(planner.final_result().unwrap().is_empty());
    }
}
