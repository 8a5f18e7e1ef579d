//! JSON game configuration.
//!
//! ```json
//! {
//!   "defaultDogSpeed": 3.0,
//!   "defaultBagCapacity": 3,
//!   "dogRetirementTime": 15.0,
//!   "lootGeneratorConfig": { "period": 5.0, "probability": 0.5 },
//!   "maps": [{
//!     "id": "map1", "name": "Map 1", "dogSpeed": 4.0, "bagCapacity": 5,
//!     "lootTypes": [{ "name": "key", "value": 10 }],
//!     "roads": [{ "x0": 0, "y0": 0, "x1": 40 }, { "x0": 40, "y0": 0, "y1": 30 }],
//!     "buildings": [{ "x": 5, "y": 5, "w": 30, "h": 20 }],
//!     "offices": [{ "id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0 }]
//!   }]
//! }
//! ```
//!
//! Durations are in seconds. Fields of a loot type other than `value` are only of
//! interest to clients and are ignored.

use model::geom::{Coord, Point, Rectangle, Size};
use model::loot_gen::LootGenConfig;
use model::map::{MapError, Offset};
use model::{
    Building, Game, GameError, Map, MapId, Office, OfficeId, Road, SessionConfig,
    DEFAULT_BAG_CAPACITY, DEFAULT_DOG_SPEED, DEFAULT_RETIREMENT_TIME_SECS,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("road {index} on map {map} must have exactly one of x1 or y1")]
    InvalidRoad { map: String, index: usize },
    #[error("invalid loot generator config: {0}")]
    InvalidLootGenerator(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f64 },
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameConfig {
    default_dog_speed: Option<f64>,
    default_bag_capacity: Option<usize>,
    dog_retirement_time: Option<f64>,
    loot_generator_config: LootGeneratorConfig,
    maps: Vec<MapConfig>,
}

#[derive(Debug, Deserialize)]
struct LootGeneratorConfig {
    period: f64,
    probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapConfig {
    id: String,
    name: String,
    dog_speed: Option<f64>,
    bag_capacity: Option<usize>,
    #[serde(default)]
    loot_types: Vec<LootTypeConfig>,
    roads: Vec<RoadConfig>,
    #[serde(default)]
    buildings: Vec<BuildingConfig>,
    #[serde(default)]
    offices: Vec<OfficeConfig>,
}

#[derive(Debug, Deserialize)]
struct LootTypeConfig {
    #[serde(default)]
    value: u32,
}

#[derive(Debug, Deserialize)]
struct RoadConfig {
    x0: Coord,
    y0: Coord,
    x1: Option<Coord>,
    y1: Option<Coord>,
}

#[derive(Debug, Deserialize)]
struct BuildingConfig {
    x: Coord,
    y: Coord,
    w: Coord,
    h: Coord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficeConfig {
    id: String,
    x: Coord,
    y: Coord,
    offset_x: Coord,
    offset_y: Coord,
}

pub fn load_game(path: &Path, randomize_spawn: bool) -> Result<Game, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    parse_game(&json, randomize_spawn)
}

pub fn parse_game(json: &str, randomize_spawn: bool) -> Result<Game, ConfigError> {
    let config: GameConfig = serde_json::from_str(json)?;

    let loot_gen = &config.loot_generator_config;
    if !(loot_gen.period.is_finite() && loot_gen.period > 0.0) {
        return Err(ConfigError::InvalidLootGenerator(format!(
            "period must be positive, got {}",
            loot_gen.period
        )));
    }
    if !(0.0..=1.0).contains(&loot_gen.probability) {
        return Err(ConfigError::InvalidLootGenerator(format!(
            "probability must lie in [0, 1], got {}",
            loot_gen.probability
        )));
    }

    let retirement_secs = config
        .dog_retirement_time
        .unwrap_or(DEFAULT_RETIREMENT_TIME_SECS);
    let session_config = SessionConfig {
        loot_gen: LootGenConfig {
            period: Duration::from_secs_f64(loot_gen.period),
            probability: loot_gen.probability,
        },
        retirement_after: positive_secs("dogRetirementTime", retirement_secs)?,
        randomize_spawn,
    };

    let default_speed = config.default_dog_speed.unwrap_or(DEFAULT_DOG_SPEED);
    let default_capacity = config.default_bag_capacity.unwrap_or(DEFAULT_BAG_CAPACITY);

    let mut game = Game::new(session_config);
    for map_config in config.maps {
        let map = build_map(map_config, default_speed, default_capacity)?;
        game.add_map(map)?;
    }
    Ok(game)
}

fn positive_secs(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(ConfigError::InvalidValue { field, value })
    }
}

fn build_map(
    config: MapConfig,
    default_speed: f64,
    default_capacity: usize,
) -> Result<Map, ConfigError> {
    let mut map = Map::new(MapId::new(config.id.clone()), config.name);
    let speed = config.dog_speed.unwrap_or(default_speed);
    if !(speed.is_finite() && speed >= 0.0) {
        return Err(ConfigError::InvalidValue {
            field: "dogSpeed",
            value: speed,
        });
    }
    map.set_dog_speed(speed);
    map.set_bag_capacity(config.bag_capacity.unwrap_or(default_capacity));

    for loot_type in config.loot_types {
        map.add_loot_value(loot_type.value);
    }

    for (index, road) in config.roads.into_iter().enumerate() {
        let start = Point::new(road.x0, road.y0);
        let road = match (road.x1, road.y1) {
            (Some(x1), None) => Road::horizontal(start, x1),
            (None, Some(y1)) => Road::vertical(start, y1),
            _ => {
                return Err(ConfigError::InvalidRoad {
                    map: config.id,
                    index,
                })
            }
        };
        map.add_road(road);
    }

    for building in config.buildings {
        map.add_building(Building {
            bounds: Rectangle {
                position: Point::new(building.x, building.y),
                size: Size {
                    width: building.w,
                    height: building.h,
                },
            },
        });
    }

    for office in config.offices {
        map.add_office(Office {
            id: OfficeId(office.id),
            position: Point::new(office.x, office.y),
            offset: Offset {
                dx: office.offset_x,
                dy: office.offset_y,
            },
        })?;
    }

    Ok(map)
}
