//! Parsed address input and per query parameters.
//!
//! Free text parsing is done upstream. An [`AddressData`] can only be built with the right number
//! of street names for its [`AddressType`], so planners never see a malformed address.

pub use error::AddressError;

use crate::geometry::Point;
use crate::search::DEFAULT_SEARCH_SIZE;

pub const STATE_ID_LEN: usize = 2;
pub const DEPARTMENT_ID_LEN: usize = 5;
pub const LOCAL_GOVERNMENT_ID_LEN: usize = 6;
pub const CENSUS_LOCALITY_ID_LEN: usize = 8;
pub const LOCALITY_ID_LEN: usize = 11;
pub const STREET_ID_LEN: usize = 13;

/// Shape of an address.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressType {
    /// The input could not be recognised as an address.
    None,
    /// `street [number]`
    Simple,
    /// `street [number] and cross street`
    Intersection,
    /// `street [number] between street and street`
    Between,
}

impl AddressType {
    /// Number of street names an address of this type carries.
    pub const fn street_count(self) -> usize {
        match self {
            Self::None | Self::Simple => 1,
            Self::Intersection => 2,
            Self::Between => 3,
        }
    }
}

/// Door number of an address. A zero value counts as no number.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DoorNumber {
    pub value: Option<u32>,
    pub unit: Option<String>,
}

impl DoorNumber {
    pub fn new(value: Option<u32>, unit: Option<String>) -> Self {
        Self {
            value: value.filter(|&v| v > 0),
            unit,
        }
    }

    pub const fn value(&self) -> Option<u32> {
        match self.value {
            Some(0) => None,
            other => other,
        }
    }
}

/// Structured address, as produced by the address parser.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawAddressData"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressData {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    kind: AddressType,
    street_names: Vec<String>,
    door_number: DoorNumber,
    floor: Option<String>,
}

impl AddressData {
    /// Input that is not an address at all.
    pub fn none() -> Self {
        Self {
            kind: AddressType::None,
            street_names: vec![String::new()],
            door_number: DoorNumber::default(),
            floor: None,
        }
    }

    pub fn simple(street: impl Into<String>) -> Self {
        Self::from_parts(AddressType::Simple, vec![street.into()])
    }

    pub fn intersection(street: impl Into<String>, cross_street: impl Into<String>) -> Self {
        Self::from_parts(
            AddressType::Intersection,
            vec![street.into(), cross_street.into()],
        )
    }

    pub fn between(
        street: impl Into<String>,
        from_street: impl Into<String>,
        to_street: impl Into<String>,
    ) -> Self {
        Self::from_parts(
            AddressType::Between,
            vec![street.into(), from_street.into(), to_street.into()],
        )
    }

    /// Builds an address from loose parts, checking the street count.
    pub fn new(kind: AddressType, street_names: Vec<String>) -> Result<Self, AddressError> {
        if street_names.len() != kind.street_count() {
            return Err(AddressError::StreetCount {
                kind,
                expected: kind.street_count(),
                found: street_names.len(),
            });
        }
        Ok(Self::from_parts(kind, street_names))
    }

    const fn from_parts(kind: AddressType, street_names: Vec<String>) -> Self {
        Self {
            kind,
            street_names,
            door_number: DoorNumber {
                value: None,
                unit: None,
            },
            floor: None,
        }
    }

    #[must_use]
    pub fn with_door_number(mut self, value: u32, unit: Option<&str>) -> Self {
        self.door_number = DoorNumber::new(Some(value), unit.map(str::to_string));
        self
    }

    #[must_use]
    pub fn with_floor(mut self, floor: impl Into<String>) -> Self {
        self.floor = Some(floor.into());
        self
    }

    pub const fn kind(&self) -> AddressType {
        self.kind
    }

    pub fn street_names(&self) -> &[String] {
        &self.street_names
    }

    pub fn street(&self) -> &str {
        &self.street_names[0]
    }

    pub fn cross_street(&self, n: usize) -> Option<&str> {
        self.street_names.get(n).map(String::as_str)
    }

    pub const fn door_number(&self) -> &DoorNumber {
        &self.door_number
    }

    pub fn floor(&self) -> Option<&str> {
        self.floor.as_deref()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[derive(Debug)]
pub struct RawAddressData {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: AddressType,
    pub street_names: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub door_number: DoorNumber,
    #[cfg_attr(feature = "serde", serde(default))]
    pub floor: Option<String>,
}

impl TryFrom<RawAddressData> for AddressData {
    type Error = AddressError;

    fn try_from(raw: RawAddressData) -> Result<Self, Self::Error> {
        if raw.kind == AddressType::None {
            return Ok(Self::none());
        }
        let mut address = Self::new(raw.kind, raw.street_names)?;
        address.door_number = DoorNumber::new(raw.door_number.value, raw.door_number.unit);
        address.floor = raw.floor;
        Ok(address)
    }
}

/// Filter on an administrative area, by ID list, by name, or by either.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AreaFilter {
    Ids(Vec<String>),
    Name(String),
    IdsOrName { ids: Vec<String>, name: String },
}

impl AreaFilter {
    /// Classifies a raw parameter: a numeric value of the entity's ID length is an ID, anything
    /// else is a name.
    pub fn from_param(value: &str, id_len: usize) -> Self {
        let value = value.trim();
        if value.len() == id_len && value.bytes().all(|b| b.is_ascii_digit()) {
            Self::Ids(vec![value.to_string()])
        } else {
            Self::Name(value.to_string())
        }
    }
}

/// Locality restriction given by the caller.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntitySelector {
    Ids(Vec<String>),
    Name(String),
}

impl EntitySelector {
    pub fn from_param(value: &str) -> Self {
        match AreaFilter::from_param(value, LOCALITY_ID_LEN) {
            AreaFilter::Ids(ids) => Self::Ids(ids),
            AreaFilter::Name(name) | AreaFilter::IdsOrName { name, .. } => Self::Name(name),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Order {
    Id,
    Name,
}

/// Output fields the caller asked for, as dotted paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestedFields {
    #[default]
    All,
    Only(Vec<String>),
}

impl RequestedFields {
    pub const FULL_NAME: &'static str = "full_name";
    pub const LOCATION_LAT: &'static str = "location.lat";
    pub const LOCATION_LON: &'static str = "location.lon";

    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(fields.into_iter().map(Into::into).collect())
    }

    /// `true` if `path` or one of its parents was requested.
    pub fn contains(&self, path: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.iter().any(|field| {
                path == field
                    || path
                        .strip_prefix(field.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }),
        }
    }

    pub fn wants_location(&self) -> bool {
        self.contains(Self::LOCATION_LAT) || self.contains(Self::LOCATION_LON)
    }

    pub fn wants_full_name(&self) -> bool {
        self.contains(Self::FULL_NAME)
    }
}

/// Parameters shared by address and location queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub state: Option<AreaFilter>,
    pub department: Option<AreaFilter>,
    pub local_government: Option<AreaFilter>,
    pub census_locality: Option<AreaFilter>,
    pub locality: Option<EntitySelector>,
    pub exact: bool,
    pub fields: RequestedFields,
    pub order: Option<Order>,
    pub size: usize,
    pub offset: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParams {
    pub const fn new() -> Self {
        Self {
            state: None,
            department: None,
            local_government: None,
            census_locality: None,
            locality: None,
            exact: false,
            fields: RequestedFields::All,
            order: None,
            size: DEFAULT_SEARCH_SIZE,
            offset: 0,
        }
    }

    #[must_use]
    pub fn state(mut self, filter: AreaFilter) -> Self {
        self.state = Some(filter);
        self
    }

    #[must_use]
    pub fn department(mut self, filter: AreaFilter) -> Self {
        self.department = Some(filter);
        self
    }

    #[must_use]
    pub fn local_government(mut self, filter: AreaFilter) -> Self {
        self.local_government = Some(filter);
        self
    }

    #[must_use]
    pub fn census_locality(mut self, filter: AreaFilter) -> Self {
        self.census_locality = Some(filter);
        self
    }

    #[must_use]
    pub fn locality(mut self, selector: EntitySelector) -> Self {
        self.locality = Some(selector);
        self
    }

    #[must_use]
    pub const fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: RequestedFields) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub const fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
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
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery {
    pub address: AddressData,
    pub params: QueryParams,
}

impl AddressQuery {
    pub const fn new(address: AddressData, params: QueryParams) -> Self {
        Self { address, params }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationQuery {
    pub point: Point,
    pub fields: RequestedFields,
}

impl LocationQuery {
    pub const fn new(point: Point) -> Self {
        Self {
            point,
            fields: RequestedFields::All,
        }
    }

    #[must_use]
    pub fn fields(mut self, fields: RequestedFields) -> Self {
        self.fields = fields;
        self
    }
}

mod error {
    use thiserror::Error;

    use super::AddressType;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum AddressError {
        #[error("A {kind:?} address needs {expected} street names, got {found}")]
        StreetCount {
            kind: AddressType,
            expected: usize,
            found: usize,
        },
    }
}
