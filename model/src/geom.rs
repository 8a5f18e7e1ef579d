use crate::EPSILON;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type Coord = i32;

/// Integer grid point used for road endpoints and office locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }
}

/// Continuous location of an actor on the map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns where an actor ends up after moving with `velocity` for `dt`.
    pub fn advanced(&self, velocity: Velocity, dt: Duration) -> Position {
        let secs = dt.as_secs_f64();
        Position {
            x: self.x + velocity.x * secs,
            y: self.y + velocity.y * secs,
        }
    }

    pub fn sq_distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<Point> for Position {
    fn from(point: Point) -> Self {
        Position {
            x: f64::from(point.x),
            y: f64::from(point.y),
        }
    }
}

/// Velocity in map units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

impl Velocity {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: Coord,
    pub height: Coord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rectangle {
    pub position: Point,
    pub size: Size,
}

/// Axis-aligned bounds with inclusive edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Bounding box of the segment `a`-`b`, widened by `margin` on every side.
    pub fn around_segment(a: Point, b: Point, margin: f64) -> Self {
        Self {
            min_x: f64::from(a.x.min(b.x)) - margin,
            min_y: f64::from(a.y.min(b.y)) - margin,
            max_x: f64::from(a.x.max(b.x)) + margin,
            max_y: f64::from(a.y.max(b.y)) + margin,
        }
    }

    pub fn contains_x(&self, x: f64) -> bool {
        x > self.min_x - EPSILON && x < self.max_x + EPSILON
    }

    pub fn contains_y(&self, y: f64) -> bool {
        y > self.min_y - EPSILON && y < self.max_y + EPSILON
    }

    pub fn contains(&self, pos: &Position) -> bool {
        self.contains_x(pos.x) && self.contains_y(pos.y)
    }
}
