use crate::{
    address::DoorNumber,
    geometry::{Location, NearestBlock},
    search::{EntityRef, StreetRef, Territory},
};

/// `{id, name}` of an administrative area. Both are `None` when unknown.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerritoryEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Only reported for areas found by location.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub source: Option<String>,
}

impl TerritoryEntity {
    pub const fn empty() -> Self {
        Self {
            id: None,
            name: None,
            source: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

impl From<&EntityRef> for TerritoryEntity {
    fn from(entity: &EntityRef) -> Self {
        Self {
            id: Some(entity.id.clone()),
            name: Some(entity.name.clone()),
            source: None,
        }
    }
}

impl From<Territory> for TerritoryEntity {
    fn from(territory: Territory) -> Self {
        Self {
            id: Some(territory.id),
            name: Some(territory.name),
            source: (!territory.source.is_empty()).then_some(territory.source),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreetEntity {
    pub id: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
}

impl StreetEntity {
    pub const fn empty() -> Self {
        Self {
            id: None,
            name: None,
            category: None,
        }
    }
}

impl From<&StreetRef> for StreetEntity {
    fn from(street: &StreetRef) -> Self {
        Self {
            id: Some(street.id.clone()),
            name: Some(street.name.clone()),
            category: Some(street.category.clone()),
        }
    }
}

/// One resolved address.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressHit {
    pub state: TerritoryEntity,
    pub department: TerritoryEntity,
    pub census_locality: TerritoryEntity,
    pub locality: TerritoryEntity,
    pub source: String,
    pub door_number: DoorNumber,
    pub floor: Option<String>,
    pub location: Location,
    pub street: StreetEntity,
    pub cross_street_1: StreetEntity,
    pub cross_street_2: StreetEntity,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub full_name: Option<String>,
}

/// Administrative context of a coordinate pair.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LocationHit {
    pub state: TerritoryEntity,
    pub department: TerritoryEntity,
    pub local_government: TerritoryEntity,
    pub lat: f64,
    pub lon: f64,
    /// Closest street block and estimated door number, independent of the areas above.
    pub nearest_street: Option<NearestBlock>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEntity {
    Address(AddressHit),
    Location(LocationHit),
}

impl ResolvedEntity {
    pub const fn as_address(&self) -> Option<&AddressHit> {
        match self {
            Self::Address(hit) => Some(hit),
            Self::Location(_) => None,
        }
    }

    pub const fn as_location(&self) -> Option<&LocationHit> {
        match self {
            Self::Location(hit) => Some(hit),
            Self::Address(_) => None,
        }
    }
}

/// Result of one query.
///
/// A non iterable result holds at most one entity and always reports `total = 1, offset = 0`
/// when it has one and `total = 0` when empty.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    entities: Vec<ResolvedEntity>,
    iterable: bool,
    total: usize,
    offset: usize,
}

impl QueryResult {
    pub const fn from_entity_list(
        entities: Vec<ResolvedEntity>,
        total: usize,
        offset: usize,
    ) -> Self {
        Self {
            entities,
            iterable: true,
            total,
            offset,
        }
    }

    pub fn from_single_entity(entity: ResolvedEntity) -> Self {
        Self {
            entities: vec![entity],
            iterable: false,
            total: 1,
            offset: 0,
        }
    }

    pub const fn empty(iterable: bool) -> Self {
        Self {
            entities: Vec::new(),
            iterable,
            total: 0,
            offset: 0,
        }
    }

    pub fn entities(&self) -> &[ResolvedEntity] {
        &self.entities
    }

    pub fn into_entities(self) -> Vec<ResolvedEntity> {
        self.entities
    }

    pub fn first(&self) -> Option<&ResolvedEntity> {
        self.entities.first()
    }

    pub const fn iterable(&self) -> bool {
        self.iterable
    }

    pub const fn total(&self) -> usize {
        self.total
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Address hits of the result, skipping location entities.
    pub fn addresses(&self) -> impl Iterator<Item = &AddressHit> {
        self.entities.iter().filter_map(ResolvedEntity::as_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location_hit() -> ResolvedEntity {
        ResolvedEntity::Location(LocationHit {
            state: TerritoryEntity::empty(),
            department: TerritoryEntity::empty(),
            local_government: TerritoryEntity::empty(),
            lat: 0.0,
            lon: 0.0,
            nearest_street: None,
        })
    }

    #[test]
    fn test_single_entity_totals() {
        let result = QueryResult::from_single_entity(location_hit());
        assert!(!result.iterable());
        assert_eq!(result.total(), 1);
        assert_eq!(result.offset(), 0);
        assert_eq!(result.len(), 1);

        let empty = QueryResult::empty(false);
        assert_eq!(empty.total(), 0);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_entity_list_keeps_backend_totals() {
        let hits = vec![
            ResolvedEntity::Address(AddressHit::default()),
            ResolvedEntity::Address(AddressHit::default()),
        ];
        let result = QueryResult::from_entity_list(hits, 40, 20);
        assert!(result.iterable());
        assert_eq!(result.total(), 40);
        assert_eq!(result.offset(), 20);
        assert_eq!(result.addresses().count(), 2);
    }

    #[test]
    fn test_entity_conversions() {
        let state = EntityRef::new("02", "CABA");
        let entity = TerritoryEntity::from(&state);
        assert_eq!(entity.id.as_deref(), Some("02"));
        assert!(!entity.is_empty());
        assert!(TerritoryEntity::empty().is_empty());

        let street = StreetRef {
            id: "0200701007435".into(),
            name: "PARANA".into(),
            category: "CALLE".into(),
            ..StreetRef::default()
        };
        let street = StreetEntity::from(&street);
        assert_eq!(street.category.as_deref(), Some("CALLE"));
        assert_eq!(StreetEntity::empty().id, None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialized_shape() {
        let result = QueryResult::from_single_entity(location_hit());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["iterable"], false);
        assert!(value["entities"][0]["state"]["id"].is_null());
    }
}
