use super::{
    PlannerError, StepError,
    common::{AddressContext, street_blocks, take_responses},
};
use crate::{
    geometry::{Point, street_block_number_location},
    result::{AddressHit, QueryResult, ResolvedEntity},
    search::{SearchRequest, SearchResponse, StreetBlock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Locality,
    Blocks,
    Done,
}

/// `street [number]`: a single paginated street block search.
#[derive(Debug)]
pub struct SimplePlanner {
    ctx: AddressContext,
    stage: Stage,
    blocks: Option<SearchResponse>,
}

impl SimplePlanner {
    pub(super) const fn new(ctx: AddressContext) -> Self {
        Self {
            ctx,
            stage: Stage::Locality,
            blocks: None,
        }
    }

    pub fn describe(&self) -> String {
        self.ctx.describe()
    }

    pub(super) fn next_step(&mut self) -> Option<Vec<SearchRequest>> {
        match self.stage {
            Stage::Locality => {
                self.stage = Stage::Blocks;
                match self.ctx.locality_request() {
                    Some(request) => Some(vec![request]),
                    None => self.next_step(),
                }
            }
            Stage::Blocks => {
                self.stage = Stage::Done;
                if self.ctx.found_nothing() {
                    return None;
                }
                let query = self.ctx.street_blocks_query(0, false);
                Some(vec![SearchRequest::new(query)])
            }
            Stage::Done => None,
        }
    }

    pub(super) fn resume(&mut self, requests: Vec<SearchRequest>) -> Result<(), StepError> {
        if self.ctx.is_waiting_locality() {
            return self.ctx.resume_locality(requests);
        }
        let [response] = take_responses::<1>(requests)?;
        self.blocks = Some(response);
        Ok(())
    }

    pub(super) fn final_result(mut self) -> Result<QueryResult, PlannerError> {
        let Some(response) = self.blocks.take() else {
            return Ok(QueryResult::empty(true));
        };
        let (total, offset) = (response.total, response.offset);

        let hits = street_blocks(response)?
            .into_iter()
            .map(|block| self.hit(block).map(ResolvedEntity::Address))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueryResult::from_entity_list(hits, total, offset))
    }

    fn hit(&self, block: StreetBlock) -> Result<AddressHit, PlannerError> {
        let mut hit = self.ctx.base_hit(&block.street, block.locality.as_ref());

        if self.ctx.params.fields.wants_location() {
            let point = street_block_number_location(
                &block.geometry,
                &block.door_numbers,
                self.ctx.door_number(),
                self.ctx.config.approximate_locations,
            )
            .map_err(|source| PlannerError::Geometry {
                document_id: block.id.clone(),
                source,
            })?;
            hit.location = point.map(Point::to_location).unwrap_or_default();
        }
        hit.full_name = self.ctx.full_name(&[&block.street]);
        Ok(hit)
    }
}
