use super::{Geometry, GeometryError, Point, interpolate_along_segment, line_centroid};

/// Door number ranges of a street block, per side and end.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorNumberBounds {
    pub start_right: u32,
    pub start_left: u32,
    pub end_right: u32,
    pub end_left: u32,
}

impl DoorNumberBounds {
    pub const fn new(start_right: u32, start_left: u32, end_right: u32, end_left: u32) -> Self {
        Self {
            start_right,
            start_left,
            end_right,
            end_left,
        }
    }

    /// `true` if `number` lies within the right or the left side range.
    pub fn contains(&self, number: u32) -> bool {
        within(self.start_right, self.end_right, number)
            || within(self.start_left, self.end_left, number)
    }
}

fn within(a: u32, b: u32, number: u32) -> bool {
    a.min(b) <= number && number <= a.max(b)
}

/// Numbering extents of the block used to interpolate `number`.
///
/// The candidate pairs are tried in a fixed order and the first one whose range (in either
/// direction) contains the number wins. The result is always `(low, high)`.
pub fn segment_extents(bounds: &DoorNumberBounds, number: u32) -> Result<(u32, u32), GeometryError> {
    let candidates = [
        (bounds.start_right, bounds.end_left),
        (bounds.start_left, bounds.end_right),
        (bounds.start_right, bounds.end_right),
        (bounds.start_left, bounds.end_left),
    ];

    candidates
        .into_iter()
        .map(|(a, b)| (a.min(b), a.max(b)))
        .find(|&(low, high)| low <= number && number <= high)
        .ok_or(GeometryError::DoorNumberOutOfRange { number })
}

/// Location of a door number on a street block.
///
/// With a door number the point is interpolated along the block. When that is not possible (no
/// number, parts that do not merge, a zero-length numbering range) and `approximate` is set, the
/// centroid of the block is used instead.
pub fn street_block_number_location(
    geometry: &Geometry,
    bounds: &DoorNumberBounds,
    number: Option<u32>,
    approximate: bool,
) -> Result<Option<Point>, GeometryError> {
    let parts = geometry.line_parts()?;

    if let Some(number) = number {
        let (start, end) = segment_extents(bounds, number)?;
        if let Some(point) = interpolate_along_segment(&parts, number, start, end) {
            return Ok(Some(point));
        }
    }

    Ok(if approximate {
        line_centroid(&parts)
    } else {
        None
    })
}
