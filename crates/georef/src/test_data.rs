//! Sample data for tests.
//!
//! A few blocks of downtown Buenos Aires (Comuna 1) laid out on a small grid:
//!
//! - `PARANA` runs north to south along longitude -58.3900, split in blocks numbered 900-999,
//!   1000-1099 and 1100-1199 from north to south.
//! - `AV SANTA FE` crosses it at latitude -34.6000 and `ALVEAR` at latitude -34.6009, so both
//!   crossings are about 100 m apart.
//! - `AV CORRIENTES` is a single block numbered 800-1200 made of two parts, a few blocks south.
//!
//! The sample configuration also adds another `SANTA FE` street in the city of Rosario, with its
//! province and local government, to check area filters.

use crate::{
    geometry::{DoorNumberBounds, Geometry},
    search::{EntityRef, Intersection, Locality, MemoryDataset, StreetBlock, StreetRef, Territory},
};

pub const CABA_ID: &str = "02";
pub const COMUNA_1_ID: &str = "02007";
pub const SAN_NICOLAS_ID: &str = "02007010001";
pub const CABA_CENSUS_LOCALITY_ID: &str = "02007010";

pub const PARANA_ID: &str = "0200701007435";
pub const SANTA_FE_ID: &str = "0200701011125";
pub const ALVEAR_ID: &str = "0200701000520";
pub const CORRIENTES_ID: &str = "0200701003255";
pub const ROSARIO_SANTA_FE_ID: &str = "8208427012345";

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of `PARANA` blocks, from 1 to 3. The 1000-1099 block is always included.
    pub parana_blocks: usize,
    /// Whether to add the Rosario street and areas
    pub include_rosario: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self::sample()
    }
}

impl TestDataConfig {
    /// Minimal data for unit tests
    pub const fn minimal() -> Self {
        Self {
            parana_blocks: 1,
            include_rosario: false,
        }
    }

    /// Sample data for integration tests
    pub const fn sample() -> Self {
        Self {
            parana_blocks: 3,
            include_rosario: true,
        }
    }
}

fn caba() -> EntityRef {
    EntityRef::new(CABA_ID, "CIUDAD AUTÓNOMA DE BUENOS AIRES")
}

fn comuna_1() -> EntityRef {
    EntityRef::new(COMUNA_1_ID, "COMUNA 1")
}

fn caba_street(id: &str, name: &str, category: &str) -> StreetRef {
    StreetRef {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        state: caba(),
        department: comuna_1(),
        census_locality: EntityRef::new(CABA_CENSUS_LOCALITY_ID, "CIUDAD DE BUENOS AIRES"),
        source: "INDEC".to_string(),
    }
}

fn block(id: &str, street: &StreetRef, bounds: DoorNumberBounds, geometry: Geometry) -> StreetBlock {
    let locality = (street.state.id == CABA_ID)
        .then(|| EntityRef::new(SAN_NICOLAS_ID, "SAN NICOLAS"));
    StreetBlock {
        id: id.to_string(),
        street: street.clone(),
        door_numbers: bounds,
        geometry,
        locality,
    }
}

fn segment(from: [f64; 2], to: [f64; 2]) -> Geometry {
    Geometry::LineString(vec![from, to])
}

/// Axis aligned box as a polygon, in `[lon, lat]` order.
fn bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Geometry {
    Geometry::Polygon(vec![vec![
        [min_lon, min_lat],
        [max_lon, min_lat],
        [max_lon, max_lat],
        [min_lon, max_lat],
        [min_lon, min_lat],
    ]])
}

fn territory(id: &str, name: &str, state: Option<EntityRef>, geometry: Geometry) -> Territory {
    Territory {
        id: id.to_string(),
        name: name.to_string(),
        source: "IGN".to_string(),
        state,
        geometry: Some(geometry),
    }
}

fn street_blocks(config: &TestDataConfig) -> Vec<StreetBlock> {
    let parana = caba_street(PARANA_ID, "PARANA", "CALLE");
    let santa_fe = caba_street(SANTA_FE_ID, "AV SANTA FE", "AV");
    let alvear = caba_street(ALVEAR_ID, "ALVEAR", "CALLE");
    let corrientes = caba_street(CORRIENTES_ID, "AV CORRIENTES", "AV");

    let parana_blocks = [
        block(
            "020070100743501",
            &parana,
            DoorNumberBounds::new(1000, 1001, 1098, 1099),
            segment([-58.3900, -34.6000], [-58.3900, -34.6009]),
        ),
        block(
            "020070100743500",
            &parana,
            DoorNumberBounds::new(900, 901, 998, 999),
            segment([-58.3900, -34.5991], [-58.3900, -34.6000]),
        ),
        block(
            "020070100743502",
            &parana,
            DoorNumberBounds::new(1100, 1101, 1198, 1199),
            segment([-58.3900, -34.6009], [-58.3900, -34.6018]),
        ),
    ];

    let mut blocks: Vec<StreetBlock> = parana_blocks
        .into_iter()
        .take(config.parana_blocks.clamp(1, 3))
        .collect();

    blocks.extend([
        block(
            "020070101112515",
            &santa_fe,
            DoorNumberBounds::new(1500, 1501, 1598, 1599),
            segment([-58.3909, -34.6000], [-58.3900, -34.6000]),
        ),
        block(
            "020070101112516",
            &santa_fe,
            DoorNumberBounds::new(1600, 1601, 1698, 1699),
            segment([-58.3900, -34.6000], [-58.3891, -34.6000]),
        ),
        block(
            "020070100052017",
            &alvear,
            DoorNumberBounds::new(1700, 1701, 1798, 1799),
            segment([-58.3909, -34.6009], [-58.3891, -34.6009]),
        ),
        block(
            "020070100325508",
            &corrientes,
            DoorNumberBounds::new(800, 801, 1198, 1200),
            Geometry::MultiLineString(vec![
                vec![[-58.3900, -34.6040], [-58.38945, -34.6040]],
                vec![[-58.38945, -34.6040], [-58.3889, -34.6040]],
            ]),
        ),
    ]);

    if config.include_rosario {
        let rosario_santa_fe = StreetRef {
            id: ROSARIO_SANTA_FE_ID.to_string(),
            name: "SANTA FE".to_string(),
            category: "CALLE".to_string(),
            state: EntityRef::new("82", "SANTA FE"),
            department: EntityRef::new("82084", "ROSARIO"),
            census_locality: EntityRef::new("82084270", "ROSARIO"),
            source: "INDEC".to_string(),
        };
        blocks.push(block(
            "820842701234510",
            &rosario_santa_fe,
            DoorNumberBounds::new(1000, 1001, 1098, 1099),
            segment([-60.6400, -32.9500], [-60.6390, -32.9500]),
        ));
    }

    blocks
}

fn intersections() -> Vec<Intersection> {
    let parana = caba_street(PARANA_ID, "PARANA", "CALLE");
    vec![
        // Stored with the cross street first.
        Intersection {
            id: "0200701011125-0200701007435".to_string(),
            street_a: caba_street(SANTA_FE_ID, "AV SANTA FE", "AV"),
            street_b: parana.clone(),
            geometry: Geometry::Point([-58.3900, -34.6000]),
        },
        Intersection {
            id: "0200701007435-0200701000520".to_string(),
            street_a: parana,
            street_b: caba_street(ALVEAR_ID, "ALVEAR", "CALLE"),
            geometry: Geometry::Point([-58.3900, -34.6009]),
        },
    ]
}

/// Builds the sample dataset described in the module documentation.
pub fn sample_dataset(config: &TestDataConfig) -> MemoryDataset {
    let mut dataset = MemoryDataset {
        states: vec![territory(
            CABA_ID,
            "CIUDAD AUTÓNOMA DE BUENOS AIRES",
            None,
            bbox(-58.54, -34.71, -58.33, -34.53),
        )],
        departments: vec![territory(
            COMUNA_1_ID,
            "COMUNA 1",
            Some(caba()),
            bbox(-58.40, -34.62, -58.36, -34.59),
        )],
        local_governments: Vec::new(),
        localities: vec![Locality {
            id: SAN_NICOLAS_ID.to_string(),
            name: "SAN NICOLAS".to_string(),
            state: caba(),
            department: comuna_1(),
            local_government: None,
            census_locality: EntityRef::new(CABA_CENSUS_LOCALITY_ID, "CIUDAD DE BUENOS AIRES"),
        }],
        street_blocks: street_blocks(config),
        intersections: intersections(),
    };

    if config.include_rosario {
        let santa_fe = EntityRef::new("82", "SANTA FE");
        dataset.states.push(territory(
            "82",
            "SANTA FE",
            None,
            bbox(-62.0, -34.4, -58.8, -28.0),
        ));
        dataset.departments.push(territory(
            "82084",
            "ROSARIO",
            Some(santa_fe.clone()),
            bbox(-60.9, -33.1, -60.6, -32.8),
        ));
        dataset.local_governments.push(territory(
            "820277",
            "ROSARIO",
            Some(santa_fe.clone()),
            bbox(-60.8, -33.05, -60.6, -32.85),
        ));
        dataset.localities.push(Locality {
            id: "82084270000".to_string(),
            name: "ROSARIO".to_string(),
            state: santa_fe,
            department: EntityRef::new("82084", "ROSARIO"),
            local_government: Some(EntityRef::new("820277", "ROSARIO")),
            census_locality: EntityRef::new("82084270", "ROSARIO"),
        });
    }

    dataset
}
