//! Geometry primitives used to turn search hits into geolocated results.
//!
//! Coordinates follow the `GeoJSON` convention internally (`x = lon`, `y = lat`) while the public
//! [`Point`] type exposes named `lat`/`lon` fields. All distances are in meters.

use std::f64::consts::PI;

use geo::{Coord, LineString, MultiPolygon, Polygon};

mod door_numbers;
mod line;
mod nearest;

pub use door_numbers::{DoorNumberBounds, segment_extents, street_block_number_location};
pub use error::GeometryError;
pub use line::{interpolate_along_segment, intersection_point, line_centroid, merge_lines};
pub use nearest::{NearestBlock, Side, nearest_block};

/// Mean Earth radius (WGS84), in kilometers.
pub const MEAN_EARTH_RADIUS_KM: f64 = 6371.0088;

const MEAN_EARTH_RADIUS_M: f64 = MEAN_EARTH_RADIUS_KM * 1000.0;

/// Vertices per quarter circle used for buffer polygons.
const CIRCLE_QUARTER_RESOLUTION: usize = 3;

/// A geographic point, in degrees.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Builds a point from a `GeoJSON` style `[lon, lat]` pair.
    pub const fn from_lon_lat([lon, lat]: [f64; 2]) -> Self {
        Self { lat, lon }
    }

    pub const fn to_lon_lat(self) -> [f64; 2] {
        [self.lon, self.lat]
    }

    /// Approximate distance in meters using an equirectangular projection around the mean
    /// latitude of both points.
    ///
    /// Accurate to a few meters for distances up to tens of kilometers. It is not a geodesic
    /// distance and should not be used at country scale.
    pub fn distance_meters(&self, other: &Self) -> f64 {
        let mean_lat = ((self.lat + other.lat) / 2.0).to_radians();
        let dx = (other.lon - self.lon).to_radians() * mean_lat.cos();
        let dy = (other.lat - self.lat).to_radians();
        dx.hypot(dy) * MEAN_EARTH_RADIUS_M
    }

    /// Centroid of this point and `other`.
    pub fn midpoint(&self, other: &Self) -> Self {
        Self {
            lat: (self.lat + other.lat) / 2.0,
            lon: (self.lon + other.lon) / 2.0,
        }
    }

    pub const fn to_location(self) -> Location {
        Location {
            lat: Some(self.lat),
            lon: Some(self.lon),
        }
    }

    /// Returns `None` if either coordinate of the location is missing.
    pub const fn from_location(location: &Location) -> Option<Self> {
        match (location.lat, location.lon) {
            (Some(lat), Some(lon)) => Some(Self { lat, lon }),
            _ => None,
        }
    }

    /// Quasi-circular polygon (13 vertices, closed) centred on this point.
    ///
    /// The radius is treated as an arc on the Earth's surface and converted into degrees, so
    /// the polygon is slightly elongated east-west away from the equator, matching what the
    /// search backend expects for `geo_shape` filters.
    pub fn circle_polygon(&self, radius_meters: f64) -> Polygon<f64> {
        let radius_deg = (radius_meters / MEAN_EARTH_RADIUS_M).to_degrees();
        let segments = CIRCLE_QUARTER_RESOLUTION * 4;

        let mut ring: Vec<Coord<f64>> = (0..segments)
            .map(|i| {
                let angle = 2.0 * PI * (i as f64) / (segments as f64);
                Coord {
                    x: radius_deg.mul_add(angle.cos(), self.lon),
                    y: radius_deg.mul_add(angle.sin(), self.lat),
                }
            })
            .collect();
        ring.push(ring[0]);

        Polygon::new(LineString::new(ring), Vec::new())
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(point: Point) -> Self {
        Self::new(point.lon, point.lat)
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(point: geo::Point<f64>) -> Self {
        Self {
            lat: point.y(),
            lon: point.x(),
        }
    }
}

impl From<Coord<f64>> for Point {
    fn from(coord: Coord<f64>) -> Self {
        Self {
            lat: coord.y,
            lon: coord.x,
        }
    }
}

impl From<Point> for Coord<f64> {
    fn from(point: Point) -> Self {
        Self {
            x: point.lon,
            y: point.lat,
        }
    }
}

/// A nullable `{lat, lon}` pair as reported in results.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Location {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Location {
    pub const fn is_null(&self) -> bool {
        self.lat.is_none() && self.lon.is_none()
    }
}

/// Document geometry as stored by the search backend (`GeoJSON` shaped, `[lon, lat]` pairs).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "coordinates"))]
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
    MultiLineString(Vec<Vec<[f64; 2]>>),
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl Geometry {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::LineString(_) => "LineString",
            Self::MultiLineString(_) => "MultiLineString",
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn from_point(point: Point) -> Self {
        Self::Point(point.to_lon_lat())
    }

    pub fn point(&self) -> Result<Point, GeometryError> {
        match self {
            Self::Point(coords) => Ok(Point::from_lon_lat(*coords)),
            other => Err(GeometryError::UnexpectedKind {
                expected: "Point",
                found: other.kind(),
            }),
        }
    }

    /// The parts of a linear geometry, as `geo` line strings.
    pub fn line_parts(&self) -> Result<Vec<LineString<f64>>, GeometryError> {
        match self {
            Self::LineString(coords) => Ok(vec![to_line_string(coords)]),
            Self::MultiLineString(parts) => Ok(parts.iter().map(|p| to_line_string(p)).collect()),
            other => Err(GeometryError::UnexpectedKind {
                expected: "MultiLineString",
                found: other.kind(),
            }),
        }
    }

    /// Areal geometries as a `geo` multi polygon, `None` for points and lines.
    pub fn to_multi_polygon(&self) -> Option<MultiPolygon<f64>> {
        match self {
            Self::Polygon(rings) => Some(MultiPolygon::new(vec![to_polygon(rings)])),
            Self::MultiPolygon(polygons) => Some(MultiPolygon::new(
                polygons.iter().map(|rings| to_polygon(rings)).collect(),
            )),
            _ => None,
        }
    }
}

fn to_line_string(coords: &[[f64; 2]]) -> LineString<f64> {
    coords.iter().map(|&[x, y]| Coord { x, y }).collect()
}

fn to_polygon(rings: &[Vec<[f64; 2]>]) -> Polygon<f64> {
    let mut rings = rings.iter().map(|ring| to_line_string(ring));
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum GeometryError {
        #[error("Expected {expected} geometry, found {found}")]
        UnexpectedKind {
            expected: &'static str,
            found: &'static str,
        },
        #[error("Door number {number} is outside every range of the street block")]
        DoorNumberOutOfRange { number: u32 },
    }
}
