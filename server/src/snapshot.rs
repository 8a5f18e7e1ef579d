//! Crash-recovery snapshots of the running game.
//!
//! A snapshot is a bincode encoded [`GameSnapshot`] whose first field is the format
//! version. Decoding checks the version before anything else, and restoring
//! validates the whole snapshot before touching the application, so a bad file
//! leaves the game exactly as it was.

use crate::app::Application;
use crate::players::Token;
use log::{debug, info, warn};
use model::session::RestoredDog;
use model::{BagItem, Direction, DogId, LootItem, MapId, Position, SessionError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Codec(#[from] bincode::Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot refers to unknown map {0}")]
    UnknownMap(String),
    #[error("map {0} appears twice in snapshot")]
    DuplicateSession(String),
    #[error("dog {dog_id} on map {map_id} has an invalid token")]
    InvalidToken { map_id: String, dog_id: DogId },
    #[error("token of dog {dog_id} on map {map_id} is already in use")]
    DuplicateToken { map_id: String, dog_id: DogId },
    #[error("dog {dog_id} appears twice on map {map_id}")]
    DuplicateDog { map_id: String, dog_id: DogId },
    #[error("loot {loot_id} appears twice on map {map_id}")]
    DuplicateLoot { map_id: String, loot_id: u32 },
    #[error("dog {dog_id} on map {map_id} carries {carried} items but the bag holds {capacity}")]
    BagOverflow {
        map_id: String,
        dog_id: DogId,
        carried: usize,
        capacity: usize,
    },
    #[error("dog {dog_id} on map {map_id} is off the roads")]
    OffRoad { map_id: String, dog_id: DogId },
    #[error("id {id} on map {map_id} leaves no room for further ids")]
    IdExhausted { map_id: String, id: u32 },
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub version: u32,
    pub sessions: Vec<SessionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub map_id: String,
    pub dogs: Vec<DogSnapshot>,
    pub loot: Vec<LootItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DogSnapshot {
    pub id: DogId,
    pub name: String,
    pub position: Position,
    pub bag_capacity: usize,
    pub speed: f64,
    pub direction: Direction,
    pub score: u32,
    pub bag: Vec<BagItem>,
    pub token: String,
}

impl GameSnapshot {
    /// Captures every session together with the tokens of its dogs.
    pub fn capture(app: &Application) -> Self {
        let sessions = app
            .game()
            .sessions()
            .iter()
            .map(|session| {
                let map_id = session.map_id();
                let dogs = session
                    .dogs()
                    .values()
                    .filter_map(|dog| {
                        let Some(token) = app.tokens().token_of(map_id, dog.id()) else {
                            warn!("Dog {} on map {} has no token, not saved", dog.id(), map_id);
                            return None;
                        };
                        Some(DogSnapshot {
                            id: dog.id(),
                            name: dog.name().to_string(),
                            position: dog.position(),
                            bag_capacity: dog.bag_capacity(),
                            speed: dog.speed(),
                            direction: dog.direction(),
                            score: dog.score(),
                            bag: dog.bag().to_vec(),
                            token: token.to_string(),
                        })
                    })
                    .collect();
                SessionSnapshot {
                    map_id: map_id.to_string(),
                    dogs,
                    loot: session.loot().to_vec(),
                }
            })
            .collect();

        Self {
            version: SNAPSHOT_VERSION,
            sessions,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let version: u32 = bincode::deserialize(bytes)?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        Ok(bincode::deserialize(bytes)?)
    }

    /// Checks the snapshot against the application without changing anything.
    pub fn validate(&self, app: &Application) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }

        let mut seen_maps = HashSet::new();
        let mut seen_tokens = HashSet::new();
        for session in &self.sessions {
            let map = app
                .game()
                .find_map(&MapId::new(session.map_id.clone()))
                .ok_or_else(|| SnapshotError::UnknownMap(session.map_id.clone()))?;
            if !seen_maps.insert(session.map_id.as_str()) {
                return Err(SnapshotError::DuplicateSession(session.map_id.clone()));
            }

            let mut seen_dogs = HashSet::new();
            for dog in &session.dogs {
                let map_id = session.map_id.clone();
                if !seen_dogs.insert(dog.id) {
                    return Err(SnapshotError::DuplicateDog {
                        map_id,
                        dog_id: dog.id,
                    });
                }
                if dog.id == DogId::MAX {
                    return Err(SnapshotError::IdExhausted { map_id, id: dog.id });
                }
                let on_road = map
                    .roads()
                    .iter()
                    .any(|road| road.corridor().contains(&dog.position));
                if !on_road {
                    return Err(SnapshotError::OffRoad {
                        map_id,
                        dog_id: dog.id,
                    });
                }
                let token = Token::parse(&dog.token).ok_or_else(|| SnapshotError::InvalidToken {
                    map_id: map_id.clone(),
                    dog_id: dog.id,
                })?;
                if app.tokens().find(&token).is_some() || !seen_tokens.insert(token) {
                    return Err(SnapshotError::DuplicateToken {
                        map_id,
                        dog_id: dog.id,
                    });
                }
                if dog.bag.len() > map.bag_capacity() {
                    return Err(SnapshotError::BagOverflow {
                        map_id,
                        dog_id: dog.id,
                        carried: dog.bag.len(),
                        capacity: map.bag_capacity(),
                    });
                }
            }

            let mut seen_loot = HashSet::new();
            for loot in &session.loot {
                if !seen_loot.insert(loot.id) {
                    return Err(SnapshotError::DuplicateLoot {
                        map_id: session.map_id.clone(),
                        loot_id: loot.id,
                    });
                }
                if loot.id == u32::MAX {
                    return Err(SnapshotError::IdExhausted {
                        map_id: session.map_id.clone(),
                        id: loot.id,
                    });
                }
            }
        }
        Ok(())
    }

    /// Puts the snapshot's dogs, loot and tokens back into `app`.
    ///
    /// Restored dogs are stopped but keep their heading. Bag capacity and the
    /// inactivity timer come from the current configuration.
    pub fn restore(self, app: &mut Application) -> Result<(), SnapshotError> {
        self.validate(app)?;

        let mut dog_count = 0;
        for session_snapshot in self.sessions {
            let map_id = MapId::new(session_snapshot.map_id);
            let Some(session) = app.game_mut().find_or_create_session(&map_id) else {
                return Err(SnapshotError::UnknownMap(map_id.to_string()));
            };

            let mut tokens = Vec::with_capacity(session_snapshot.dogs.len());
            for dog in session_snapshot.dogs {
                tokens.push((dog.token, dog.id));
                session.restore_dog(RestoredDog {
                    id: dog.id,
                    name: dog.name,
                    position: dog.position,
                    speed: dog.speed,
                    direction: dog.direction,
                    score: dog.score,
                    bag: dog.bag,
                })?;
            }
            for loot in session_snapshot.loot {
                session.restore_loot(loot)?;
            }

            for (raw, dog_id) in tokens {
                if let Some(token) = Token::parse(&raw) {
                    app.tokens_mut().restore(token, dog_id, map_id.clone());
                    dog_count += 1;
                }
            }
        }

        info!("Restored {} dogs from snapshot", dog_count);
        Ok(())
    }
}

/// Writes `snapshot` next to `path` and renames it into place, so a crash mid-write
/// never leaves a truncated file behind.
pub fn save_to_file(path: &Path, snapshot: &GameSnapshot) -> Result<(), SnapshotError> {
    let bytes = snapshot.encode()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(&bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| SnapshotError::Io(e.error))?;
    debug!("Saved snapshot to {}", path.display());
    Ok(())
}

/// Reads a snapshot, or `None` when no file exists yet.
pub fn load_from_file(path: &Path) -> Result<Option<GameSnapshot>, SnapshotError> {
    match std::fs::read(path) {
        Ok(bytes) => GameSnapshot::decode(&bytes).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Saves the application every `period` of game time.
#[derive(Debug)]
pub struct SnapshotSaver {
    path: PathBuf,
    period: Option<Duration>,
    since_last_save: Duration,
}

impl SnapshotSaver {
    pub fn new(path: PathBuf, period: Option<Duration>) -> Self {
        Self {
            path,
            period,
            since_last_save: Duration::ZERO,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accounts for `delta` of game time, saving when a period has elapsed.
    /// Returns whether a snapshot was written.
    pub fn on_tick(&mut self, delta: Duration, app: &Application) -> Result<bool, SnapshotError> {
        let Some(period) = self.period else {
            return Ok(false);
        };
        self.since_last_save += delta;
        if self.since_last_save < period {
            return Ok(false);
        }
        self.since_last_save = Duration::ZERO;
        self.save(app)?;
        Ok(true)
    }

    pub fn save(&self, app: &Application) -> Result<(), SnapshotError> {
        save_to_file(&self.path, &GameSnapshot::capture(app))
    }
}
