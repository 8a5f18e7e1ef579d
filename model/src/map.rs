use crate::geom::{Bounds, Coord, Point, Rectangle};
use crate::{DEFAULT_BAG_CAPACITY, DEFAULT_DOG_SPEED, ROAD_HALF_WIDTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfficeId(pub String);

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("duplicate office {0} on map")]
    DuplicateOffice(String),
}

/// A strictly horizontal or vertical road segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    start: Point,
    end: Point,
}

impl Road {
    pub fn horizontal(start: Point, end_x: Coord) -> Self {
        Self {
            start,
            end: Point::new(end_x, start.y),
        }
    }

    pub fn vertical(start: Point, end_y: Coord) -> Self {
        Self {
            start,
            end: Point::new(start.x, end_y),
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }

    pub fn is_vertical(&self) -> bool {
        self.start.x == self.end.x
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    /// The area a dog may occupy while on this road.
    pub fn corridor(&self) -> Bounds {
        Bounds::around_segment(self.start, self.end, ROAD_HALF_WIDTH)
    }
}

/// Purely cosmetic; buildings take no part in movement or collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub bounds: Rectangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: Coord,
    pub dy: Coord,
}

/// Zone where a dog's bag is converted into score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Office {
    pub id: OfficeId,
    pub position: Point,
    /// Sprite offset, only meaningful to clients.
    pub offset: Offset,
}

/// Immutable description of one playable map.
#[derive(Debug, Clone)]
pub struct Map {
    id: MapId,
    name: String,
    roads: Vec<Road>,
    buildings: Vec<Building>,
    offices: Vec<Office>,
    loot_values: Vec<u32>,
    dog_speed: f64,
    bag_capacity: usize,
}

impl Map {
    pub fn new(id: MapId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            roads: Vec::new(),
            buildings: Vec::new(),
            offices: Vec::new(),
            loot_values: Vec::new(),
            dog_speed: DEFAULT_DOG_SPEED,
            bag_capacity: DEFAULT_BAG_CAPACITY,
        }
    }

    pub fn add_road(&mut self, road: Road) {
        self.roads.push(road);
    }

    pub fn add_building(&mut self, building: Building) {
        self.buildings.push(building);
    }

    pub fn add_office(&mut self, office: Office) -> Result<(), MapError> {
        if self.offices.iter().any(|o| o.id == office.id) {
            return Err(MapError::DuplicateOffice(office.id.0));
        }
        self.offices.push(office);
        Ok(())
    }

    /// Appends the score value of the next loot type; types are numbered in order.
    pub fn add_loot_value(&mut self, value: u32) {
        self.loot_values.push(value);
    }

    pub fn set_dog_speed(&mut self, speed: f64) {
        self.dog_speed = speed;
    }

    pub fn set_bag_capacity(&mut self, capacity: usize) {
        self.bag_capacity = capacity;
    }

    pub fn id(&self) -> &MapId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    pub fn loot_values(&self) -> &[u32] {
        &self.loot_values
    }

    pub fn item_type_count(&self) -> usize {
        self.loot_values.len()
    }

    /// Score for one item of `item_type`; unknown types are worth nothing.
    pub fn loot_value(&self, item_type: usize) -> u32 {
        self.loot_values.get(item_type).copied().unwrap_or(0)
    }

    pub fn dog_speed(&self) -> f64 {
        self.dog_speed
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }
}
