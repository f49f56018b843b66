//! In-process search backend over a fixed dataset.
//!
//! Evaluates the same query model as the Elasticsearch backend, close enough for tests, demos and
//! small deployments: token based fuzzy name matching following [`DEFAULT_FUZZINESS`], prefix
//! matching from [`MIN_AUTOCOMPLETE_CHARS`] characters, area and ID filters, door number ranges
//! and spatial filters.
//!
//! [`DEFAULT_FUZZINESS`]: super::DEFAULT_FUZZINESS

use std::sync::atomic::{AtomicUsize, Ordering};

use geo::Contains;
use itertools::Itertools;
use rapidfuzz::distance::levenshtein;
use rayon::prelude::*;
use tracing::{debug, trace};

use super::{
    Document, GeoShape, IdFilter, IndexKind, Intersection, Locality, MIN_AUTOCOMPLETE_CHARS,
    Result, SearchBackend, SearchQuery, SearchResponse, StreetBlock, StreetRef, Territory,
    document::EntityRef,
};
use crate::{
    address::{AreaFilter, Order},
    geometry::Point,
};

/// Documents served by a [`MemoryBackend`], one list per index.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    pub states: Vec<Territory>,
    pub departments: Vec<Territory>,
    pub local_governments: Vec<Territory>,
    pub localities: Vec<Locality>,
    pub street_blocks: Vec<StreetBlock>,
    pub intersections: Vec<Intersection>,
}

impl MemoryDataset {
    #[cfg(feature = "serde")]
    pub fn from_json_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    pub fn len(&self) -> usize {
        self.states.len()
            + self.departments.len()
            + self.local_governments.len()
            + self.localities.len()
            + self.street_blocks.len()
            + self.intersections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Search backend answering queries from a [`MemoryDataset`].
///
/// Queries of one batch are evaluated in parallel. The backend counts the batches it receives so
/// callers can check how many round trips a resolution took.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    dataset: MemoryDataset,
    round_trips: AtomicUsize,
    queries: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(dataset: MemoryDataset) -> Self {
        Self {
            dataset,
            round_trips: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }

    pub const fn dataset(&self) -> &MemoryDataset {
        &self.dataset
    }

    /// Number of `multi_search` calls served so far.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Number of individual queries served so far.
    pub fn queries_executed(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.round_trips.store(0, Ordering::Relaxed);
        self.queries.store(0, Ordering::Relaxed);
    }

    fn run(&self, query: &SearchQuery) -> Result<SearchResponse> {
        query.validate()?;

        let mut matches: Vec<(usize, Document)> = match query.index {
            IndexKind::StreetBlocks => self
                .dataset
                .street_blocks
                .iter()
                .filter_map(|block| {
                    street_block_score(query, block).map(|s| (s, Document::StreetBlock(block.clone())))
                })
                .collect(),
            IndexKind::Intersections => self
                .dataset
                .intersections
                .iter()
                .filter(|intersection| intersection_matches(query, intersection))
                .map(|intersection| (0, Document::Intersection(intersection.clone())))
                .collect(),
            IndexKind::Localities => self
                .dataset
                .localities
                .iter()
                .filter_map(|locality| {
                    locality_score(query, locality).map(|s| (s, Document::Locality(locality.clone())))
                })
                .collect(),
            IndexKind::States | IndexKind::Departments | IndexKind::LocalGovernments => {
                let territories = match query.index {
                    IndexKind::States => &self.dataset.states,
                    IndexKind::Departments => &self.dataset.departments,
                    _ => &self.dataset.local_governments,
                };
                territories
                    .iter()
                    .filter_map(|territory| {
                        territory_score(query, territory)
                            .map(|s| (s, Document::Territory(territory.clone())))
                    })
                    .collect()
            }
        };

        match query.order {
            Some(Order::Id) => matches.sort_by(|(_, a), (_, b)| a.id().cmp(b.id())),
            Some(Order::Name) => {
                matches.sort_by(|(_, a), (_, b)| sort_name(a).cmp(sort_name(b)));
            }
            None => matches.sort_by_key(|(score, _)| *score),
        }

        let total = matches.len();
        let hits = matches
            .into_iter()
            .skip(query.offset)
            .take(query.size)
            .map(|(_, doc)| doc.project(&query.fields))
            .collect_vec();

        trace!(index = ?query.index, total, returned = hits.len(), "Memory search");
        Ok(SearchResponse::new(hits, total, query.offset))
    }
}

impl SearchBackend for MemoryBackend {
    fn multi_search(&self, queries: &[&SearchQuery]) -> Result<Vec<SearchResponse>> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        self.queries.fetch_add(queries.len(), Ordering::Relaxed);
        debug!(queries = queries.len(), "Memory multi search");

        queries.par_iter().map(|query| self.run(query)).collect()
    }

    fn name(&self) -> &str {
        "memory"
    }
}

fn sort_name(doc: &Document) -> &str {
    match doc {
        Document::StreetBlock(block) => &block.street.name,
        Document::Intersection(intersection) => &intersection.street_a.name,
        Document::Territory(territory) => &territory.name,
        Document::Locality(locality) => &locality.name,
    }
}

fn street_block_score(query: &SearchQuery, block: &StreetBlock) -> Option<usize> {
    if let Some(IdFilter::Set(ids)) = &query.ids
        && !ids.contains(&block.id)
    {
        return None;
    }
    if let Some(number) = query.door_number
        && !block.door_numbers.contains(number)
    {
        return None;
    }
    if !street_in_areas(query, &block.street) {
        return None;
    }
    if !query.geo_shapes.is_empty() && !query.geo_shapes.iter().any(|s| block_touches(block, s)) {
        return None;
    }
    match &query.name {
        Some(name) => name_score(name, &block.street.name, query.exact),
        None => Some(0),
    }
}

fn street_in_areas(query: &SearchQuery, street: &StreetRef) -> bool {
    area_matches(query.state.as_ref(), &street.state, query.exact)
        && area_matches(query.department.as_ref(), &street.department, query.exact)
        && area_matches(
            query.census_locality.as_ref(),
            &street.census_locality,
            query.exact,
        )
}

fn intersection_matches(query: &SearchQuery, intersection: &Intersection) -> bool {
    if let Some(IdFilter::Pair { a, b }) = &query.ids {
        let ids = (&intersection.street_a.id, &intersection.street_b.id);
        let forward = a.contains(ids.0) && b.contains(ids.1);
        let backward = a.contains(ids.1) && b.contains(ids.0);
        if !forward && !backward {
            return false;
        }
    }
    if !street_in_areas(query, &intersection.street_a)
        || !street_in_areas(query, &intersection.street_b)
    {
        return false;
    }
    if query.geo_shapes.is_empty() {
        return true;
    }
    intersection.geometry.point().is_ok_and(|point| {
        query
            .geo_shapes
            .iter()
            .any(|shape| point_in_shape(point, shape))
    })
}

fn locality_score(query: &SearchQuery, locality: &Locality) -> Option<usize> {
    if let Some(IdFilter::Set(ids)) = &query.ids
        && !ids.contains(&locality.id)
    {
        return None;
    }
    let exact = query.exact;
    let areas = area_matches(query.state.as_ref(), &locality.state, exact)
        && area_matches(query.department.as_ref(), &locality.department, exact)
        && area_matches(
            query.census_locality.as_ref(),
            &locality.census_locality,
            exact,
        )
        && match (&query.local_government, &locality.local_government) {
            (None, _) => true,
            (Some(filter), Some(lg)) => area_matches(Some(filter), lg, exact),
            (Some(_), None) => false,
        };
    if !areas {
        return None;
    }
    match &query.name {
        Some(name) => name_score(name, &locality.name, exact),
        None => Some(0),
    }
}

fn territory_score(query: &SearchQuery, territory: &Territory) -> Option<usize> {
    if let Some(IdFilter::Set(ids)) = &query.ids
        && !ids.contains(&territory.id)
    {
        return None;
    }
    if let Some(filter) = &query.state {
        let state = territory.state.clone().unwrap_or_else(|| EntityRef {
            id: territory.id.clone(),
            name: territory.name.clone(),
        });
        if !area_matches(Some(filter), &state, query.exact) {
            return None;
        }
    }
    if !query.geo_shapes.is_empty() {
        let Some(area) = territory.geometry.as_ref().and_then(|g| g.to_multi_polygon()) else {
            return None;
        };
        let inside = query.geo_shapes.iter().any(|shape| match shape {
            GeoShape::Point(point) => area.contains(&geo::Point::from(*point)),
            GeoShape::Circle { center, .. } => area.contains(&geo::Point::from(*center)),
        });
        if !inside {
            return None;
        }
    }
    match &query.name {
        Some(name) => name_score(name, &territory.name, query.exact),
        None => Some(0),
    }
}

fn area_matches(filter: Option<&AreaFilter>, entity: &EntityRef, exact: bool) -> bool {
    match filter {
        None => true,
        Some(AreaFilter::Ids(ids)) => ids.contains(&entity.id),
        Some(AreaFilter::Name(name)) => name_score(name, &entity.name, exact).is_some(),
        Some(AreaFilter::IdsOrName { ids, name }) => {
            ids.contains(&entity.id) || name_score(name, &entity.name, exact).is_some()
        }
    }
}

fn point_in_shape(point: Point, shape: &GeoShape) -> bool {
    match shape {
        GeoShape::Point(target) => point.distance_meters(target) < 1e-6,
        GeoShape::Circle { center, radius_m } => point.distance_meters(center) <= *radius_m,
    }
}

/// Whether any vertex or edge of the block comes within the shape.
fn block_touches(block: &StreetBlock, shape: &GeoShape) -> bool {
    let (center, radius) = match shape {
        GeoShape::Point(point) => (*point, 1e-6),
        GeoShape::Circle { center, radius_m } => (*center, *radius_m),
    };
    let Ok(parts) = block.geometry.line_parts() else {
        return false;
    };
    parts
        .iter()
        .flat_map(geo::LineString::lines)
        .any(|line| segment_distance(center, line.start.into(), line.end.into()) <= radius)
}

/// Distance in meters from `p` to the segment `a`-`b`, on a plane tangent at `p`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let scale = p.lat.to_radians().cos();
    let to_plane = |q: Point| ((q.lon - p.lon) * scale, q.lat - p.lat);
    let (ax, ay) = to_plane(a);
    let (bx, by) = to_plane(b);
    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx.mul_add(dx, dy * dy);
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (-(ax.mul_add(dx, ay * dy)) / length_sq).clamp(0.0, 1.0)
    };
    let closest = Point::new(p.lat + t.mul_add(dy, ay), p.lon + t.mul_add(dx, ax) / scale);
    p.distance_meters(&closest)
}

/// Uppercases and strips accents and punctuation, collapsing whitespace.
pub(crate) fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_uppercase)
        .map(|c| match c {
            'Á' | 'À' | 'Â' | 'Ä' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ñ' => 'N',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect::<String>()
        .split_whitespace()
        .join(" ")
}

/// Edits allowed for a token of `len` characters under `AUTO:4,8`.
const fn allowed_edits(len: usize) -> usize {
    match len {
        0..4 => 0,
        4..8 => 1,
        _ => 2,
    }
}

/// Match score of `query` against `candidate`, lower is better. `None` when it does not match.
fn name_score(query: &str, candidate: &str, exact: bool) -> Option<usize> {
    let query = normalize(query);
    let candidate = normalize(candidate);

    if exact {
        return (query == candidate).then_some(0);
    }
    if query.is_empty() {
        return None;
    }
    if query == candidate {
        return Some(0);
    }

    let query_tokens = query.split(' ').collect_vec();
    let candidate_tokens = candidate.split(' ').collect_vec();

    let fuzzy: Option<usize> = query_tokens
        .iter()
        .map(|q| {
            candidate_tokens
                .iter()
                .map(|c| levenshtein::distance(q.chars(), c.chars()))
                .filter(|&d| d <= allowed_edits(q.chars().count()))
                .min()
        })
        .sum();
    if fuzzy.is_some() {
        return fuzzy.map(|edits| edits + 1);
    }

    (query.chars().count() >= MIN_AUTOCOMPLETE_CHARS
        && phrase_prefix(&query_tokens, &candidate_tokens))
    .then_some(candidate_tokens.len().saturating_sub(query_tokens.len()) + 1)
}

/// All query tokens appear in order in the candidate, the last one possibly as a prefix.
fn phrase_prefix(query: &[&str], candidate: &[&str]) -> bool {
    let Some((last, init)) = query.split_last() else {
        return false;
    };
    candidate.windows(query.len()).any(|window| {
        let (window_last, window_init) = (window[query.len() - 1], &window[..query.len() - 1]);
        window_init == init && window_last.starts_with(last)
    })
}
