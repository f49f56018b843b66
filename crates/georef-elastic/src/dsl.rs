//! Translation of [`SearchQuery`] values into Elasticsearch query DSL bodies.

use georef::{
    AreaFilter, Order, Point,
    search::{
        DEFAULT_FUZZINESS, DocField, GeoShape, IdFilter, IndexKind, MIN_AUTOCOMPLETE_CHARS,
        SearchQuery, SourceFields,
    },
};
use serde_json::{Value, json};

use crate::config::ElasticConfig;

const ID: &str = "id";
const NAME: &str = "nombre";
const SOURCE: &str = "fuente";
const GEOMETRY: &str = "geometria";
const EXACT_SUFFIX: &str = "exacto";

const STREET: &str = "calle";
const STREET_A: &str = "calle_a";
const STREET_B: &str = "calle_b";
const STATE: &str = "provincia";
const DEPARTMENT: &str = "departamento";
const LOCAL_GOVERNMENT: &str = "municipio";
const CENSUS_LOCALITY: &str = "localidad_censal";

const START_RIGHT: &str = "altura.inicio.derecha";
const START_LEFT: &str = "altura.inicio.izquierda";
const END_RIGHT: &str = "altura.fin.derecha";
const END_LEFT: &str = "altura.fin.izquierda";

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

/// Scored and unscored clauses of the top level `bool` query.
#[derive(Debug, Default)]
struct Clauses {
    must: Vec<Value>,
    filter: Vec<Value>,
}

impl Clauses {
    fn into_query(self) -> Value {
        json!({ "bool": { "must": self.must, "filter": self.filter } })
    }
}

/// Builds the search body of `query`, as sent after its header line in `_msearch`.
pub fn search_body(query: &SearchQuery, config: &ElasticConfig) -> Value {
    let analyzer = config.excluding_terms_analyzer.as_deref();
    let mut clauses = Clauses::default();

    match query.index {
        IndexKind::StreetBlocks => {
            street_clauses(&mut clauses, query, STREET, analyzer);
            if let Some(IdFilter::Set(ids)) = &query.ids {
                clauses.filter.push(terms(ID, ids));
            }
            if let Some(number) = query.door_number {
                clauses.filter.push(door_number_query(number));
            }
        }
        IndexKind::Intersections => {
            if let Some(IdFilter::Pair { a, b }) = &query.ids {
                clauses.filter.push(pair_query(a, b));
            }
            for side in [STREET_A, STREET_B] {
                street_clauses(&mut clauses, query, side, analyzer);
            }
        }
        IndexKind::Localities => {
            if let Some(IdFilter::Set(ids)) = &query.ids {
                clauses.filter.push(terms(ID, ids));
            }
            if let Some(name) = &query.name {
                clauses.must.push(name_query(NAME, name, query.exact, analyzer));
            }
            let areas = [
                (&query.state, STATE),
                (&query.department, DEPARTMENT),
                (&query.local_government, LOCAL_GOVERNMENT),
                (&query.census_locality, CENSUS_LOCALITY),
            ];
            for (filter, prefix) in areas {
                if let Some(filter) = filter {
                    clauses
                        .must
                        .push(area_query(prefix, filter, query.exact, analyzer));
                }
            }
        }
        IndexKind::States | IndexKind::Departments | IndexKind::LocalGovernments => {
            if let Some(IdFilter::Set(ids)) = &query.ids {
                clauses.filter.push(terms(ID, ids));
            }
            if let Some(name) = &query.name {
                clauses.must.push(name_query(NAME, name, query.exact, analyzer));
            }
            if let Some(filter) = &query.state {
                // States are filtered on themselves.
                let prefix = if query.index == IndexKind::States { "" } else { STATE };
                clauses
                    .must
                    .push(area_query(prefix, filter, query.exact, analyzer));
            }
        }
    }

    if !query.geo_shapes.is_empty() {
        clauses.filter.push(geo_query(&query.geo_shapes));
    }

    let mut body = json!({
        "query": clauses.into_query(),
        "from": query.offset,
        "size": query.size,
    });
    if let SourceFields::Only(fields) = &query.fields {
        body["_source"] = json!({ "includes": source_includes(query.index, fields) });
    }
    if let Some(sort) = sort_field(query) {
        body["sort"] = json!([sort]);
    }
    if let Some(limit) = config.track_total_hits {
        body["track_total_hits"] = json!(limit);
    }
    body
}

/// Name and area clauses of a street embedded under `prefix`.
fn street_clauses(
    clauses: &mut Clauses,
    query: &SearchQuery,
    prefix: &str,
    analyzer: Option<&str>,
) {
    if let Some(name) = &query.name {
        clauses
            .must
            .push(name_query(&join(prefix, NAME), name, query.exact, analyzer));
    }
    let areas = [
        (&query.state, STATE),
        (&query.department, DEPARTMENT),
        (&query.census_locality, CENSUS_LOCALITY),
    ];
    for (filter, area) in areas {
        if let Some(filter) = filter {
            clauses.must.push(area_query(
                &join(prefix, area),
                filter,
                query.exact,
                analyzer,
            ));
        }
    }
}

/// Fuzzy (or exact) match on a name field.
///
/// Fuzzy matches accept every term with `AUTO:4,8` edits, or the value as a phrase prefix when
/// it is long enough. Documents that still match once excluded terms are dropped from the value
/// are rejected, so generic words alone never produce a hit.
fn name_query(field: &str, value: &str, exact: bool, analyzer: Option<&str>) -> Value {
    if exact {
        let exact_field = join(field, EXACT_SUFFIX);
        return json!({ "match": { exact_field: { "query": value, "operator": "or" } } });
    }

    let mut should = vec![json!({
        "match": { field: { "query": value, "operator": "and", "fuzziness": DEFAULT_FUZZINESS } }
    })];
    if value.trim().chars().count() >= MIN_AUTOCOMPLETE_CHARS {
        should.push(json!({ "match_phrase_prefix": { field: { "query": value } } }));
    }

    let mut query = json!({ "bool": { "should": should, "minimum_should_match": 1 } });
    if let Some(analyzer) = analyzer {
        query["bool"]["must_not"] = json!([{
            "match": { field: { "query": value, "operator": "or", "analyzer": analyzer } }
        }]);
    }
    query
}

/// Filter on the ID and/or name of the entity stored under `prefix`.
fn area_query(prefix: &str, filter: &AreaFilter, exact: bool, analyzer: Option<&str>) -> Value {
    let id_field = join(prefix, ID);
    let name_field = join(prefix, NAME);
    match filter {
        AreaFilter::Ids(ids) => json!({ "bool": { "filter": [terms(&id_field, ids)] } }),
        AreaFilter::Name(name) => name_query(&name_field, name, exact, analyzer),
        AreaFilter::IdsOrName { ids, name } => json!({
            "bool": {
                "should": [
                    name_query(&name_field, name, exact, analyzer),
                    { "bool": { "filter": [terms(&id_field, ids)] } },
                ],
                "minimum_should_match": 1,
            }
        }),
    }
}

fn terms(field: &str, values: &[String]) -> Value {
    json!({ "terms": { field: values } })
}

fn range(field: &str, operator: &str, value: u32) -> Value {
    json!({ "range": { field: { operator: value } } })
}

/// Both orders of a numbering range containing `number`.
fn within(start: &str, end: &str, number: u32) -> [Value; 2] {
    [
        json!({ "bool": { "filter": [range(start, "lte", number), range(end, "gte", number)] } }),
        json!({ "bool": { "filter": [range(end, "lte", number), range(start, "gte", number)] } }),
    ]
}

/// The number lies within the right or the left side numbering, ascending or descending.
fn door_number_query(number: u32) -> Value {
    let should: Vec<Value> = within(START_RIGHT, END_RIGHT, number)
        .into_iter()
        .chain(within(START_LEFT, END_LEFT, number))
        .collect();
    json!({ "bool": { "should": should, "minimum_should_match": 1 } })
}

/// One street from `a` and the other from `b`, in either order.
fn pair_query(a: &[String], b: &[String]) -> Value {
    let id_a = join(STREET_A, ID);
    let id_b = join(STREET_B, ID);
    json!({
        "bool": {
            "should": [
                { "bool": { "filter": [terms(&id_a, a), terms(&id_b, b)] } },
                { "bool": { "filter": [terms(&id_a, b), terms(&id_b, a)] } },
            ],
            "minimum_should_match": 1,
        }
    })
}

fn geo_shape(shape: &GeoShape) -> Value {
    let geojson = match shape {
        GeoShape::Point(point) => json!({ "type": "point", "coordinates": point.to_lon_lat() }),
        GeoShape::Circle { center, radius_m } => circle_geojson(*center, *radius_m),
    };
    json!({ "geo_shape": { GEOMETRY: { "shape": geojson, "relation": "intersects" } } })
}

/// Circles are sent as buffer polygons.
fn circle_geojson(center: Point, radius_m: f64) -> Value {
    let ring: Vec<[f64; 2]> = center
        .circle_polygon(radius_m)
        .exterior()
        .coords()
        .map(|coord| [coord.x, coord.y])
        .collect();
    json!({ "type": "polygon", "coordinates": [ring] })
}

/// Several shapes are alternatives.
fn geo_query(shapes: &[GeoShape]) -> Value {
    match shapes {
        [shape] => geo_shape(shape),
        shapes => json!({
            "bool": {
                "should": shapes.iter().map(geo_shape).collect::<Vec<_>>(),
                "minimum_should_match": 1,
            }
        }),
    }
}

fn source_includes(index: IndexKind, fields: &[DocField]) -> Vec<String> {
    let prefix = if index == IndexKind::StreetBlocks { STREET } else { "" };
    fields
        .iter()
        .map(|field| match field {
            DocField::Id => ID.to_string(),
            DocField::Name => join(prefix, NAME),
            DocField::Source => join(prefix, SOURCE),
            DocField::CensusLocalityId => join(CENSUS_LOCALITY, ID),
        })
        .collect()
}

fn sort_field(query: &SearchQuery) -> Option<String> {
    let prefix = match query.index {
        IndexKind::StreetBlocks => STREET,
        IndexKind::Intersections => STREET_A,
        _ => "",
    };
    query.order.map(|order| match order {
        Order::Id => join(prefix, ID),
        Order::Name => join(&join(prefix, NAME), EXACT_SUFFIX),
    })
}
