use super::{DocField, IndexKind, SourceFields};
use crate::geometry::{DoorNumberBounds, Geometry};

/// Reference to another entity, as embedded in documents.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub id: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A street as embedded in street block and intersection documents.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreetRef {
    pub id: String,
    pub name: String,
    /// Road category, e.g. `CALLE` or `AV`.
    pub category: String,
    pub state: EntityRef,
    pub department: EntityRef,
    pub census_locality: EntityRef,
    pub source: String,
}

/// One numbered segment of a street.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct StreetBlock {
    pub id: String,
    pub street: StreetRef,
    pub door_numbers: DoorNumberBounds,
    pub geometry: Geometry,
    #[cfg_attr(feature = "serde", serde(default))]
    pub locality: Option<EntityRef>,
}

/// Crossing of two streets. The order of the streets carries no meaning.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Intersection {
    pub id: String,
    pub street_a: StreetRef,
    pub street_b: StreetRef,
    pub geometry: Geometry,
}

impl Intersection {
    /// The same crossing with its streets swapped.
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            id: self.id,
            street_a: self.street_b,
            street_b: self.street_a,
            geometry: self.geometry,
        }
    }
}

/// State, department or local government.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Territory {
    pub id: String,
    pub name: String,
    pub source: String,
    /// Parent state, absent for states themselves.
    #[cfg_attr(feature = "serde", serde(default))]
    pub state: Option<EntityRef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub geometry: Option<Geometry>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Locality {
    pub id: String,
    pub name: String,
    pub state: EntityRef,
    pub department: EntityRef,
    #[cfg_attr(feature = "serde", serde(default))]
    pub local_government: Option<EntityRef>,
    pub census_locality: EntityRef,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    StreetBlock(StreetBlock),
    Intersection(Intersection),
    Territory(Territory),
    Locality(Locality),
}

impl Document {
    pub fn id(&self) -> &str {
        match self {
            Self::StreetBlock(doc) => &doc.id,
            Self::Intersection(doc) => &doc.id,
            Self::Territory(doc) => &doc.id,
            Self::Locality(doc) => &doc.id,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StreetBlock(_) => "street block",
            Self::Intersection(_) => "intersection",
            Self::Territory(_) => "territory",
            Self::Locality(_) => "locality",
        }
    }

    /// `true` if documents of this kind are stored in `index`.
    pub const fn belongs_to(&self, index: IndexKind) -> bool {
        matches!(
            (self, index),
            (Self::StreetBlock(_), IndexKind::StreetBlocks)
                | (Self::Intersection(_), IndexKind::Intersections)
                | (Self::Locality(_), IndexKind::Localities)
                | (
                    Self::Territory(_),
                    IndexKind::States | IndexKind::Departments | IndexKind::LocalGovernments
                )
        )
    }

    /// Drops the parts of the document that were not requested.
    ///
    /// Only territory geometries are large enough to be worth dropping.
    #[must_use]
    pub fn project(self, fields: &SourceFields) -> Self {
        match self {
            Self::Territory(mut territory) if matches!(fields, SourceFields::Only(_)) => {
                territory.geometry = None;
                if !fields.includes(DocField::Source) {
                    territory.source.clear();
                }
                Self::Territory(territory)
            }
            other => other,
        }
    }

    pub fn into_street_block(self) -> Option<StreetBlock> {
        match self {
            Self::StreetBlock(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_intersection(self) -> Option<Intersection> {
        match self {
            Self::Intersection(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_territory(self) -> Option<Territory> {
        match self {
            Self::Territory(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_locality(self) -> Option<Locality> {
        match self {
            Self::Locality(doc) => Some(doc),
            _ => None,
        }
    }
}
