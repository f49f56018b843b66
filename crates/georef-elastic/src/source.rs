//! Parsing of `_source` documents into georef [`Document`]s.

use georef::{
    geometry::{DoorNumberBounds, Geometry},
    search::{Document, EntityRef, IndexKind, Intersection, Locality, StreetBlock, StreetRef, Territory},
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
struct EntitySource {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "nombre")]
    name: String,
}

impl From<EntitySource> for EntityRef {
    fn from(source: EntitySource) -> Self {
        Self::new(source.id, source.name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StreetSource {
    id: String,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "categoria")]
    category: String,
    #[serde(rename = "provincia")]
    state: EntitySource,
    #[serde(rename = "departamento")]
    department: EntitySource,
    #[serde(rename = "localidad_censal")]
    census_locality: EntitySource,
    #[serde(rename = "fuente")]
    source: String,
}

impl From<StreetSource> for StreetRef {
    fn from(source: StreetSource) -> Self {
        Self {
            id: source.id,
            name: source.name,
            category: source.category,
            state: source.state.into(),
            department: source.department.into(),
            census_locality: source.census_locality.into(),
            source: source.source,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SidesSource {
    #[serde(rename = "derecha")]
    right: u32,
    #[serde(rename = "izquierda")]
    left: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DoorNumbersSource {
    #[serde(rename = "inicio")]
    start: SidesSource,
    #[serde(rename = "fin")]
    end: SidesSource,
}

#[derive(Debug, Deserialize)]
struct StreetBlockSource {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "calle")]
    street: StreetSource,
    #[serde(default, rename = "altura")]
    door_numbers: DoorNumbersSource,
    #[serde(rename = "geometria")]
    geometry: Geometry,
    #[serde(default, rename = "localidad")]
    locality: Option<EntitySource>,
}

#[derive(Debug, Deserialize)]
struct IntersectionSource {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "calle_a")]
    street_a: StreetSource,
    #[serde(default, rename = "calle_b")]
    street_b: StreetSource,
    #[serde(rename = "geometria")]
    geometry: Geometry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TerritorySource {
    id: String,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "fuente")]
    source: String,
    #[serde(rename = "provincia")]
    state: Option<EntitySource>,
    #[serde(rename = "geometria")]
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalitySource {
    id: String,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "provincia")]
    state: EntitySource,
    #[serde(rename = "departamento")]
    department: EntitySource,
    #[serde(rename = "municipio")]
    local_government: Option<EntitySource>,
    #[serde(rename = "localidad_censal")]
    census_locality: EntitySource,
}

/// Parses the `_source` of a hit from `index`.
///
/// Fields left out through `_source` includes come back empty.
pub fn parse_document(index: IndexKind, source: Value) -> serde_json::Result<Document> {
    let document = match index {
        IndexKind::StreetBlocks => {
            let block: StreetBlockSource = serde_json::from_value(source)?;
            let DoorNumbersSource { start, end } = block.door_numbers;
            Document::StreetBlock(StreetBlock {
                id: block.id,
                street: block.street.into(),
                door_numbers: DoorNumberBounds::new(start.right, start.left, end.right, end.left),
                geometry: block.geometry,
                locality: block.locality.map(EntityRef::from),
            })
        }
        IndexKind::Intersections => {
            let intersection: IntersectionSource = serde_json::from_value(source)?;
            Document::Intersection(Intersection {
                id: intersection.id,
                street_a: intersection.street_a.into(),
                street_b: intersection.street_b.into(),
                geometry: intersection.geometry,
            })
        }
        IndexKind::Localities => {
            let locality: LocalitySource = serde_json::from_value(source)?;
            Document::Locality(Locality {
                id: locality.id,
                name: locality.name,
                state: locality.state.into(),
                department: locality.department.into(),
                local_government: locality.local_government.map(EntityRef::from),
                census_locality: locality.census_locality.into(),
            })
        }
        IndexKind::States | IndexKind::Departments | IndexKind::LocalGovernments => {
            let territory: TerritorySource = serde_json::from_value(source)?;
            Document::Territory(Territory {
                id: territory.id,
                name: territory.name,
                source: territory.source,
                state: territory.state.map(EntityRef::from),
                geometry: territory.geometry,
            })
        }
    };
    Ok(document)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn street(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "nombre": name,
            "categoria": "CALLE",
            "provincia": { "id": "02", "nombre": "CIUDAD AUTÓNOMA DE BUENOS AIRES" },
            "departamento": { "id": "02007", "nombre": "COMUNA 1" },
            "localidad_censal": { "id": "02007010", "nombre": "CIUDAD DE BUENOS AIRES" },
            "fuente": "INDEC"
        })
    }

    #[test]
    fn test_parse_street_block() {
        let source = json!({
            "id": "020070100743501",
            "calle": street("0200701007435", "PARANA"),
            "altura": {
                "inicio": { "derecha": 1000, "izquierda": 1001 },
                "fin": { "derecha": 1098, "izquierda": 1099 }
            },
            "geometria": {
                "type": "MultiLineString",
                "coordinates": [[[-58.39, -34.6], [-58.39, -34.6009]]]
            }
        });

        let block = parse_document(IndexKind::StreetBlocks, source)
            .unwrap()
            .into_street_block()
            .unwrap();
        assert_eq!(block.street.name, "PARANA");
        assert_eq!(block.street.department.name, "COMUNA 1");
        assert_eq!(block.door_numbers, DoorNumberBounds::new(1000, 1001, 1098, 1099));
        assert!(block.locality.is_none());
        assert_eq!(block.geometry.line_parts().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_intersection() {
        let source = json!({
            "id": "0200701011125-0200701007435",
            "calle_a": street("0200701011125", "AV SANTA FE"),
            "calle_b": street("0200701007435", "PARANA"),
            "geometria": { "type": "Point", "coordinates": [-58.39, -34.6] }
        });

        let intersection = parse_document(IndexKind::Intersections, source)
            .unwrap()
            .into_intersection()
            .unwrap();
        assert_eq!(intersection.street_b.id, "0200701007435");
        assert_eq!(intersection.geometry.point().unwrap().lat, -34.6);
    }

    #[test]
    fn test_parse_projected_documents() {
        let territory = parse_document(
            IndexKind::Departments,
            json!({ "id": "02007", "nombre": "COMUNA 1", "fuente": "ARBA" }),
        )
        .unwrap()
        .into_territory()
        .unwrap();
        assert_eq!(territory.source, "ARBA");
        assert!(territory.state.is_none());
        assert!(territory.geometry.is_none());

        let locality = parse_document(
            IndexKind::Localities,
            json!({ "localidad_censal": { "id": "02007010" } }),
        )
        .unwrap()
        .into_locality()
        .unwrap();
        assert_eq!(locality.census_locality.id, "02007010");
        assert!(locality.id.is_empty());
    }

    #[test]
    fn test_block_without_geometry_is_error() {
        let source = json!({ "id": "x", "calle": street("1", "A") });
        assert!(parse_document(IndexKind::StreetBlocks, source).is_err());
    }
}
