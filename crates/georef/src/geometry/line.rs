use geo::{
    Centroid, Coord, Line, LineInterpolatePoint, LineString, MultiLineString,
    line_intersection::{LineIntersection, line_intersection},
};

use super::Point;

/// Chains the parts of a street block into a single connected line.
///
/// Parts are joined when their endpoints coincide exactly, reversing a part when needed. Returns
/// `None` when the parts do not form one connected line (gaps, branches, or no parts at all).
pub fn merge_lines(parts: &[LineString<f64>]) -> Option<LineString<f64>> {
    let mut remaining: Vec<&LineString<f64>> = parts.iter().filter(|p| p.0.len() >= 2).collect();
    if remaining.is_empty() {
        return None;
    }

    let mut merged: Vec<Coord<f64>> = remaining.remove(0).0.clone();

    while !remaining.is_empty() {
        let head = merged[0];
        let tail = merged[merged.len() - 1];

        let Some(position) = remaining.iter().position(|part| {
            let (first, last) = endpoints(part);
            first == tail || last == tail || first == head || last == head
        }) else {
            return None;
        };

        let part = remaining.remove(position);
        let (first, last) = endpoints(part);
        let coords = &part.0;

        if first == tail {
            merged.extend(coords.iter().skip(1));
        } else if last == tail {
            merged.extend(coords.iter().rev().skip(1));
        } else if last == head {
            let mut prefix = coords.clone();
            prefix.pop();
            prefix.append(&mut merged);
            merged = prefix;
        } else {
            let mut prefix: Vec<Coord<f64>> = coords.iter().rev().copied().collect();
            prefix.pop();
            prefix.append(&mut merged);
            merged = prefix;
        }
    }

    Some(LineString::new(merged))
}

fn endpoints(line: &LineString<f64>) -> (Coord<f64>, Coord<f64>) {
    (line.0[0], line.0[line.0.len() - 1])
}

/// Locates door `number` along a street block whose numbering runs from `start` to `end`.
///
/// The fraction `(number - start) / (end - start)` is clamped to `[0, 1]` and applied to the
/// normalized length of the merged line. Returns `None` when `start == end` or when the parts
/// cannot be merged into one line.
pub fn interpolate_along_segment(
    parts: &[LineString<f64>],
    number: u32,
    start: u32,
    end: u32,
) -> Option<Point> {
    if start == end {
        return None;
    }
    let line = merge_lines(parts)?;

    let fraction = numbering_fraction(number, start, end);
    line.line_interpolate_point(fraction).map(Point::from)
}

pub(super) fn numbering_fraction(number: u32, start: u32, end: u32) -> f64 {
    let offset = f64::from(number) - f64::from(start);
    let span = f64::from(end) - f64::from(start);
    (offset / span).clamp(0.0, 1.0)
}

/// Point where two streets cross.
///
/// A single crossing is returned as is. Streets with several parts may cross more than once, in
/// which case the centroid of every distinct crossing point is used. Returns `None` when the
/// streets do not meet.
pub fn intersection_point(a: &[LineString<f64>], b: &[LineString<f64>]) -> Option<Point> {
    let mut crossings: Vec<Coord<f64>> = Vec::new();
    let mut push = |coord: Coord<f64>| {
        if !crossings.iter().any(|c| same_coord(*c, coord)) {
            crossings.push(coord);
        }
    };

    for line_a in a.iter().flat_map(LineString::lines) {
        for line_b in b.iter().flat_map(LineString::lines) {
            match line_intersection(line_a, line_b) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => push(intersection),
                Some(LineIntersection::Collinear {
                    intersection: Line { start, end },
                }) => {
                    push(start);
                    push(end);
                }
                None => {}
            }
        }
    }

    match crossings.as_slice() {
        [] => None,
        [single] => Some(Point::from(*single)),
        many => {
            let n = many.len() as f64;
            let (sum_x, sum_y) = many
                .iter()
                .fold((0.0, 0.0), |(x, y), c| (x + c.x, y + c.y));
            Some(Point::from(Coord {
                x: sum_x / n,
                y: sum_y / n,
            }))
        }
    }
}

fn same_coord(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12
}

/// Length weighted centroid of a (possibly multi part) line.
pub fn line_centroid(parts: &[LineString<f64>]) -> Option<Point> {
    MultiLineString::new(parts.to_vec())
        .centroid()
        .map(Point::from)
}
