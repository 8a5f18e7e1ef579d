use crate::geom::{Position, Velocity};
use crate::session::LootId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub type DogId = u32;

/// Heading of a dog. North is up, i.e. towards decreasing `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "U",
            Direction::South => "D",
            Direction::West => "L",
            Direction::East => "R",
        }
    }

    fn velocity(&self, speed: f64) -> Velocity {
        match self {
            Direction::North => Velocity::new(0.0, -speed),
            Direction::South => Velocity::new(0.0, speed),
            Direction::West => Velocity::new(-speed, 0.0),
            Direction::East => Velocity::new(speed, 0.0),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDirectionError(pub String);

impl fmt::Display for ParseDirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown direction {:?}", self.0)
    }
}

impl std::error::Error for ParseDirectionError {}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U" => Ok(Direction::North),
            "D" => Ok(Direction::South),
            "L" => Ok(Direction::West),
            "R" => Ok(Direction::East),
            other => Err(ParseDirectionError(other.to_string())),
        }
    }
}

/// A picked up loot item riding in a dog's bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagItem {
    pub id: LootId,
    pub item_type: usize,
}

/// Tracks how long a dog has been standing still.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InactivityTimer {
    retirement_after: Duration,
    total: Duration,
    idle: Duration,
}

impl InactivityTimer {
    pub fn new(retirement_after: Duration) -> Self {
        Self {
            retirement_after,
            total: Duration::ZERO,
            idle: Duration::ZERO,
        }
    }

    /// Advances the timer, returning the dog's total play time once it has been
    /// idle for the whole retirement duration.
    pub fn advance(&mut self, delta: Duration, idle: bool) -> Option<Duration> {
        self.total += delta;
        if !idle {
            self.idle = Duration::ZERO;
            return None;
        }
        self.idle += delta;
        (self.idle >= self.retirement_after).then_some(self.total)
    }

    pub fn reset_idle(&mut self) {
        self.idle = Duration::ZERO;
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }
}

/// A player controlled actor inside one session.
#[derive(Debug, Clone)]
pub struct Dog {
    id: DogId,
    name: String,
    position: Position,
    velocity: Velocity,
    direction: Direction,
    speed: f64,
    bag_capacity: usize,
    bag: Vec<BagItem>,
    score: u32,
    timer: InactivityTimer,
}

impl Dog {
    pub fn new(
        id: DogId,
        name: impl Into<String>,
        position: Position,
        speed: f64,
        bag_capacity: usize,
        retirement_after: Duration,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            velocity: Velocity::default(),
            direction: Direction::North,
            speed,
            bag_capacity,
            bag: Vec::new(),
            score: 0,
            timer: InactivityTimer::new(retirement_after),
        }
    }

    pub fn id(&self) -> DogId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn bag(&self) -> &[BagItem] {
        &self.bag
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn inactivity(&self) -> &InactivityTimer {
        &self.timer
    }

    /// Applies a move command. `None` stops the dog but keeps its heading.
    ///
    /// Every command counts as activity and clears the idle accumulator.
    pub fn steer(&mut self, direction: Option<Direction>) {
        self.timer.reset_idle();
        match direction {
            Some(direction) => {
                self.direction = direction;
                self.velocity = direction.velocity(self.speed);
            }
            None => self.velocity = Velocity::default(),
        }
    }

    pub(crate) fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn stop(&mut self) {
        self.velocity = Velocity::default();
    }

    pub fn is_stopped(&self) -> bool {
        self.velocity.is_zero()
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// Adds `item` to the bag unless it is full.
    pub fn put_in_bag(&mut self, item: BagItem) -> bool {
        if self.bag.len() >= self.bag_capacity {
            return false;
        }
        self.bag.push(item);
        true
    }

    pub fn take_bag(&mut self) -> Vec<BagItem> {
        std::mem::take(&mut self.bag)
    }

    pub fn add_score(&mut self, score: u32) {
        self.score = self.score.saturating_add(score);
    }

    /// Advances the inactivity timer; see [`InactivityTimer::advance`].
    pub fn advance_inactivity(&mut self, delta: Duration) -> Option<Duration> {
        let idle = self.is_stopped();
        self.timer.advance(delta, idle)
    }
}
