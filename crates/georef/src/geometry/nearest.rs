//! Reverse geocoding of a point onto the closest street block.

use geo::Coord;

use super::{DoorNumberBounds, MEAN_EARTH_RADIUS_KM, Point};
use crate::{result::StreetEntity, search::StreetBlock};

/// Side of the street a point falls on, relative to the block's digitized direction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Right hand side, even door numbers.
    Right,
    /// Left hand side, odd door numbers.
    Left,
}

impl Side {
    const fn parity(self) -> u32 {
        match self {
            Self::Right => 0,
            Self::Left => 1,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NearestBlock {
    pub street: StreetEntity,
    /// Estimated door number, `None` when the block has unusable numbering.
    pub door_number: Option<u32>,
    pub distance_m: f64,
    pub side: Side,
}

/// Flat projection in meters centred on a reference point.
struct LocalPlane {
    origin: Point,
    cos_lat: f64,
}

impl LocalPlane {
    fn new(origin: Point) -> Self {
        Self {
            origin,
            cos_lat: origin.lat.to_radians().cos(),
        }
    }

    fn project(&self, coord: Coord<f64>) -> (f64, f64) {
        let r = MEAN_EARTH_RADIUS_KM * 1000.0;
        (
            (coord.x - self.origin.lon).to_radians() * self.cos_lat * r,
            (coord.y - self.origin.lat).to_radians() * r,
        )
    }
}

struct Candidate<'a> {
    block: &'a StreetBlock,
    distance: f64,
    fraction: f64,
    side: Side,
}

/// Finds the street block closest to `point` and estimates the door number there.
///
/// Only blocks made of a single two-point segment are considered. The projection of the point
/// on the segment is derived from the triangle height (Heron's formula) and clamped to the
/// segment, and the side is given by the sign of the cross product between the segment
/// direction and the vector to the point.
pub fn nearest_block(point: Point, blocks: &[StreetBlock]) -> Option<NearestBlock> {
    let plane = LocalPlane::new(point);

    let best = blocks
        .iter()
        .filter_map(|block| {
            let parts = block.geometry.line_parts().ok()?;
            let [part] = parts.as_slice() else {
                return None;
            };
            let [start, end] = part.0.as_slice() else {
                return None;
            };
            Some(measure(block, plane.project(*start), plane.project(*end)))
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))?;

    Some(NearestBlock {
        street: StreetEntity::from(&best.block.street),
        door_number: door_number_at(&best.block.door_numbers, best.side, best.fraction),
        distance_m: best.distance,
        side: best.side,
    })
}

fn measure<'a>(
    block: &'a StreetBlock,
    (x1, y1): (f64, f64),
    (x2, y2): (f64, f64),
) -> Candidate<'a> {
    // The query point is the origin of the plane.
    let a = x1.hypot(y1);
    let b = x2.hypot(y2);
    let c = (x2 - x1).hypot(y2 - y1);

    let cross = (x2 - x1).mul_add(-y1, (y2 - y1) * x1);
    let side = if cross < 0.0 { Side::Right } else { Side::Left };

    let (distance, fraction) = if c <= f64::EPSILON {
        (a, 0.0)
    } else if b * b > a * a + c * c {
        // Obtuse at the start vertex: the projection falls before the segment.
        (a, 0.0)
    } else if a * a > b * b + c * c {
        (b, 1.0)
    } else {
        let s = (a + b + c) / 2.0;
        let area = (s * (s - a) * (s - b) * (s - c)).max(0.0).sqrt();
        let height = 2.0 * area / c;
        let along = (a * a - height * height).max(0.0).sqrt();
        (height, (along / c).clamp(0.0, 1.0))
    };

    Candidate {
        block,
        distance,
        fraction,
        side,
    }
}

fn door_number_at(bounds: &DoorNumberBounds, side: Side, fraction: f64) -> Option<u32> {
    let (start, end) = match side {
        Side::Right => (bounds.start_right, bounds.end_right),
        Side::Left => (bounds.start_left, bounds.end_left),
    };
    if start == 0 || end == 0 || start >= end {
        return None;
    }

    let parity = side.parity();
    let raw = f64::from(end - start).mul_add(fraction, f64::from(start));
    let rounded = raw.round() as u32;
    let number = if rounded % 2 == parity {
        rounded
    } else if raw >= f64::from(rounded) {
        rounded + 1
    } else {
        rounded.saturating_sub(1)
    };

    let low = if start % 2 == parity { start } else { start + 1 };
    let high = if end % 2 == parity { end } else { end - 1 };
    if low > high {
        return None;
    }
    Some(number.clamp(low, high))
}
