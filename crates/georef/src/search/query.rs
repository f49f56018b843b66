//! Backend independent query model.

use super::{Result, SearchError};
use crate::{
    address::{AreaFilter, Order},
    geometry::Point,
};

/// Fuzziness used for non exact name matches: no edits under 4 characters, one edit under 8,
/// two edits otherwise.
pub const DEFAULT_FUZZINESS: &str = "AUTO:4,8";
/// Minimum length of a name for it to also match as a prefix.
pub const MIN_AUTOCOMPLETE_CHARS: usize = 4;
pub const DEFAULT_SEARCH_SIZE: usize = 10;

/// The indices a query can target.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    States,
    Departments,
    LocalGovernments,
    Localities,
    StreetBlocks,
    Intersections,
}

impl IndexKind {
    pub const fn is_territory(self) -> bool {
        matches!(
            self,
            Self::States | Self::Departments | Self::LocalGovernments
        )
    }
}

/// Restriction on document (or, for intersections, street) IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdFilter {
    Set(Vec<String>),
    /// Intersections whose streets are one from `a` and one from `b`, in either order.
    Pair { a: Vec<String>, b: Vec<String> },
}

/// Spatial restriction. Several shapes in one query are alternatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoShape {
    /// Documents whose geometry contains the point.
    Point(Point),
    /// Documents whose geometry intersects the circle.
    Circle { center: Point, radius_m: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocField {
    Id,
    Name,
    Source,
    CensusLocalityId,
}

/// Which parts of each document the backend has to return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceFields {
    #[default]
    All,
    Only(Vec<DocField>),
}

impl SourceFields {
    pub fn includes(&self, field: DocField) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.contains(&field),
        }
    }
}

/// A single search against one index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub index: IndexKind,
    pub ids: Option<IdFilter>,
    /// Street name for blocks, locality name for localities.
    pub name: Option<String>,
    pub exact: bool,
    pub state: Option<AreaFilter>,
    pub department: Option<AreaFilter>,
    pub local_government: Option<AreaFilter>,
    pub census_locality: Option<AreaFilter>,
    /// Keeps street blocks whose right or left numbering contains the value.
    pub door_number: Option<u32>,
    pub geo_shapes: Vec<GeoShape>,
    pub fields: SourceFields,
    pub order: Option<Order>,
    pub size: usize,
    pub offset: usize,
}

impl SearchQuery {
    pub const fn new(index: IndexKind) -> Self {
        Self {
            index,
            ids: None,
            name: None,
            exact: false,
            state: None,
            department: None,
            local_government: None,
            census_locality: None,
            door_number: None,
            geo_shapes: Vec::new(),
            fields: SourceFields::All,
            order: None,
            size: DEFAULT_SEARCH_SIZE,
            offset: 0,
        }
    }

    #[must_use]
    pub fn ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(IdFilter::Set(ids));
        self
    }

    #[must_use]
    pub fn id_pair(mut self, a: Vec<String>, b: Vec<String>) -> Self {
        self.ids = Some(IdFilter::Pair { a, b });
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>, exact: bool) -> Self {
        self.name = Some(name.into());
        self.exact = exact;
        self
    }

    #[must_use]
    pub fn state(mut self, filter: Option<AreaFilter>) -> Self {
        self.state = filter;
        self
    }

    #[must_use]
    pub fn department(mut self, filter: Option<AreaFilter>) -> Self {
        self.department = filter;
        self
    }

    #[must_use]
    pub fn local_government(mut self, filter: Option<AreaFilter>) -> Self {
        self.local_government = filter;
        self
    }

    #[must_use]
    pub fn census_locality(mut self, filter: Option<AreaFilter>) -> Self {
        self.census_locality = filter;
        self
    }

    #[must_use]
    pub const fn door_number(mut self, number: Option<u32>) -> Self {
        self.door_number = number;
        self
    }

    #[must_use]
    pub fn intersects_point(mut self, point: Point) -> Self {
        self.geo_shapes.push(GeoShape::Point(point));
        self
    }

    #[must_use]
    pub fn within_circles(mut self, centers: &[Point], radius_m: f64) -> Self {
        self.geo_shapes.extend(
            centers
                .iter()
                .map(|&center| GeoShape::Circle { center, radius_m }),
        );
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: SourceFields) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub const fn order(mut self, order: Option<Order>) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Every match up to `max_len`, from the first one.
    #[must_use]
    pub const fn all_matches(mut self, max_len: usize) -> Self {
        self.size = max_len;
        self.offset = 0;
        self
    }

    /// Checks that the query only uses filters the target index supports.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(SearchError::InvalidQuery {
                index: self.index,
                reason: reason.to_string(),
            })
        };

        if self.door_number.is_some() && self.index != IndexKind::StreetBlocks {
            return invalid("door number filters only apply to street blocks");
        }
        match (&self.ids, self.index) {
            (Some(IdFilter::Pair { .. }), index) if index != IndexKind::Intersections => {
                return invalid("ID pairs only apply to intersections");
            }
            (Some(IdFilter::Set(_)), IndexKind::Intersections) => {
                return invalid("intersections are filtered by street ID pairs");
            }
            _ => {}
        }
        if self.name.is_some() && self.index == IndexKind::Intersections {
            return invalid("intersections have no name");
        }
        if self.local_government.is_some()
            && matches!(self.index, IndexKind::StreetBlocks | IndexKind::Intersections)
        {
            return invalid("streets are not filtered by local government");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query = SearchQuery::new(IndexKind::StreetBlocks);
        assert_eq!(query.size, DEFAULT_SEARCH_SIZE);
        assert_eq!(query.offset, 0);
        assert_eq!(query.fields, SourceFields::All);
        assert!(!query.exact);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let query = SearchQuery::new(IndexKind::StreetBlocks)
            .name("CORRIENTES", true)
            .door_number(Some(1000))
            .state(Some(AreaFilter::Ids(vec!["02".to_string()])))
            .size(3)
            .offset(6)
            .all_matches(5000);

        assert_eq!(query.name.as_deref(), Some("CORRIENTES"));
        assert!(query.exact);
        assert_eq!(query.size, 5000);
        assert_eq!(query.offset, 0);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_circles() {
        let centers = [Point::new(-34.6, -58.4), Point::new(-34.7, -58.5)];
        let query = SearchQuery::new(IndexKind::Intersections)
            .id_pair(vec!["a".into()], vec!["b".into()])
            .within_circles(&centers, 50.0);
        assert_eq!(query.geo_shapes.len(), 2);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_filters() {
        let door_on_states = SearchQuery::new(IndexKind::States).door_number(Some(3));
        assert!(matches!(
            door_on_states.validate(),
            Err(SearchError::InvalidQuery {
                index: IndexKind::States,
                ..
            })
        ));

        let pair_on_blocks =
            SearchQuery::new(IndexKind::StreetBlocks).id_pair(Vec::new(), Vec::new());
        assert!(pair_on_blocks.validate().is_err());

        let set_on_intersections = SearchQuery::new(IndexKind::Intersections).ids(Vec::new());
        assert!(set_on_intersections.validate().is_err());

        let named_intersection = SearchQuery::new(IndexKind::Intersections).name("X", false);
        assert!(named_intersection.validate().is_err());
    }

    #[test]
    fn test_source_fields_includes() {
        assert!(SourceFields::All.includes(DocField::Name));
        let only = SourceFields::Only(vec![DocField::CensusLocalityId]);
        assert!(only.includes(DocField::CensusLocalityId));
        assert!(!only.includes(DocField::Id));
    }
}
