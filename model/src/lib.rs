//! # Game Model
//!
//! Authoritative simulation for the dog gathering game. Everything in this crate is
//! plain data plus the per-tick engine; it performs no I/O and holds no locks. The
//! server crate owns a [`Game`] on a single task and drives it through [`tick::tick`].
//!
//! ## Module Organization
//!
//! - `geom`: points, positions, velocities and inclusive rectangle containment
//! - `collision`: swept circle contacts between moving gatherers and static items
//! - `map`: immutable road network, offices and loot value table
//! - `loot_gen`: leaky-bucket loot spawn counter
//! - `dog`: the player actor with its bag, score and inactivity timer
//! - `session`: live state of one map
//! - `game`: registry of maps and lazily created sessions
//! - `movement`: road-constrained motion inside corridors
//! - `tick`: one simulation step over every session
//! - `protocol`: datagram packets exchanged with clients

pub mod collision;
pub mod dog;
pub mod game;
pub mod geom;
pub mod loot_gen;
pub mod map;
pub mod movement;
pub mod protocol;
pub mod session;
pub mod tick;

pub use dog::{BagItem, Direction, Dog, DogId};
pub use game::{Game, GameError};
pub use geom::{Point, Position, Velocity};
pub use map::{Building, Map, MapId, Office, OfficeId, Road};
pub use session::{GameSession, LootId, LootItem, RestoredDog, Retirement, SessionConfig, SessionError};

/// Half-width added around a road segment on both axes to form its corridor.
pub const ROAD_HALF_WIDTH: f64 = 0.4;
/// Collision radius of a dog sweeping along its path.
pub const DOG_RADIUS: f64 = 0.3;
/// Collision radius of an office zone.
pub const OFFICE_RADIUS: f64 = 0.25;
/// Collision radius of a loot item.
pub const LOOT_RADIUS: f64 = 0.0;

pub const DEFAULT_DOG_SPEED: f64 = 1.0;
pub const DEFAULT_BAG_CAPACITY: usize = 3;
pub const DEFAULT_RETIREMENT_TIME_SECS: f64 = 60.0;

/// Tolerance used for inclusive geometric comparisons.
pub const EPSILON: f64 = 1e-10;
