use super::{
    PlannerError, StepError,
    common::{
        AddressContext, FirstStreet, intersection_point, intersections, street_blocks, street_ids,
        take_responses,
    },
};
use crate::{
    result::{AddressHit, QueryResult, ResolvedEntity, StreetEntity},
    search::{Intersection, SearchRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Locality,
    Streets,
    Intersections,
    Done,
}

/// `street [number] and cross street`.
///
/// Both streets are searched together, then the intersections between any of their matches.
/// With a door number the intersections must lie close to the number's point on the first
/// street.
#[derive(Debug)]
pub struct IntersectionPlanner {
    ctx: AddressContext,
    stage: Stage,
    first: FirstStreet,
    second: Vec<String>,
    result: Option<QueryResult>,
}

impl IntersectionPlanner {
    pub(super) fn new(ctx: AddressContext) -> Self {
        Self {
            ctx,
            stage: Stage::Locality,
            first: FirstStreet::default(),
            second: Vec::new(),
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
                Some(vec![
                    SearchRequest::new(self.ctx.street_blocks_query(0, true)),
                    SearchRequest::new(self.ctx.street_blocks_query(1, true)),
                ])
            }
            Stage::Intersections => {
                self.stage = Stage::Done;
                if self.first.ids.is_empty() || self.second.is_empty() {
                    return None;
                }
                let query = self.ctx.intersections_query(
                    &self.first.ids,
                    &self.second,
                    &self.first.door_points(),
                    self.ctx.config.intersection_door_tolerance_m,
                    false,
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
                let [first, second] = take_responses::<2>(requests)?;
                self.first = FirstStreet::read(&self.ctx, street_blocks(first)?)?;
                self.second = street_ids(&street_blocks(second)?);
            }
            _ => {
                let [response] = take_responses::<1>(requests)?;
                let (total, offset) = (response.total, response.offset);
                let mut hits = intersections(response)?
                    .into_iter()
                    .map(|intersection| self.hit(intersection))
                    .collect::<Result<Vec<_>, _>>()?;
                self.ctx.sort_hits(&mut hits);

                let entities = hits.into_iter().map(ResolvedEntity::Address).collect();
                self.result = Some(QueryResult::from_entity_list(entities, total, offset));
            }
        }
        Ok(())
    }

    pub(super) fn final_result(self) -> Result<QueryResult, PlannerError> {
        Ok(self.result.unwrap_or(QueryResult::empty(true)))
    }

    /// Puts the first street of the address on side A of the intersection.
    fn canonicalize(&self, intersection: Intersection) -> Result<Intersection, PlannerError> {
        let in_second = |id: &String| self.second.contains(id);
        let (a, b) = (&intersection.street_a.id, &intersection.street_b.id);

        if self.first.contains(a) && in_second(b) {
            Ok(intersection)
        } else if self.first.contains(b) && in_second(a) {
            Ok(intersection.swapped())
        } else {
            Err(PlannerError::UnknownIntersection {
                document_id: intersection.id.clone(),
                id_a: a.clone(),
                id_b: b.clone(),
            })
        }
    }

    fn hit(&self, intersection: Intersection) -> Result<AddressHit, PlannerError> {
        let intersection = self.canonicalize(intersection)?;
        let street = &intersection.street_a;
        let cross_street = &intersection.street_b;

        let point = match self.first.points.get(&street.id) {
            Some(point) => *point,
            None => intersection_point(&intersection)?,
        };

        let mut hit = self.ctx.base_hit(street, None);
        hit.cross_street_1 = StreetEntity::from(cross_street);
        hit.location = point.to_location();
        hit.full_name = self.ctx.full_name(&[street, cross_street]);
        Ok(hit)
    }
}
