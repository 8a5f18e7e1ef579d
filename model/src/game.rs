use crate::map::{Map, MapId};
use crate::session::{GameSession, SessionConfig};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("map {0} is already registered")]
    DuplicateMap(MapId),
    #[error("map {0} has no roads")]
    NoRoads(MapId),
}

/// Registry of maps and the sessions running on them.
///
/// Sessions live in an arena and are created the first time someone joins their
/// map. They are never destroyed, so a session index stays valid for the lifetime
/// of the game.
#[derive(Debug)]
pub struct Game {
    maps: Vec<Arc<Map>>,
    map_index: HashMap<MapId, usize>,
    sessions: Vec<GameSession>,
    session_index: HashMap<MapId, usize>,
    config: SessionConfig,
    session_seed: Option<u64>,
}

impl Game {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            maps: Vec::new(),
            map_index: HashMap::new(),
            sessions: Vec::new(),
            session_index: HashMap::new(),
            config,
            session_seed: None,
        }
    }

    /// Seeds the RNG of every session created from now on.
    pub fn with_session_seed(mut self, seed: u64) -> Self {
        self.session_seed = Some(seed);
        self
    }

    pub fn add_map(&mut self, map: Map) -> Result<(), GameError> {
        if self.map_index.contains_key(map.id()) {
            return Err(GameError::DuplicateMap(map.id().clone()));
        }
        if map.roads().is_empty() {
            return Err(GameError::NoRoads(map.id().clone()));
        }
        self.map_index.insert(map.id().clone(), self.maps.len());
        self.maps.push(Arc::new(map));
        Ok(())
    }

    pub fn maps(&self) -> &[Arc<Map>] {
        &self.maps
    }

    pub fn find_map(&self, id: &MapId) -> Option<&Arc<Map>> {
        self.map_index.get(id).map(|&index| &self.maps[index])
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the session for `map_id`, starting it on first use.
    pub fn find_or_create_session(&mut self, map_id: &MapId) -> Option<&mut GameSession> {
        if let Some(&index) = self.session_index.get(map_id) {
            return Some(&mut self.sessions[index]);
        }

        let map = Arc::clone(self.find_map(map_id)?);
        let mut session = GameSession::new(map, &self.config);
        if let Some(seed) = self.session_seed {
            session = session.with_seed(seed);
        }
        info!("Started session on map {}", map_id);

        let index = self.sessions.len();
        self.session_index.insert(map_id.clone(), index);
        self.sessions.push(session);
        Some(&mut self.sessions[index])
    }

    pub fn session(&self, map_id: &MapId) -> Option<&GameSession> {
        self.session_index
            .get(map_id)
            .map(|&index| &self.sessions[index])
    }

    pub fn session_mut(&mut self, map_id: &MapId) -> Option<&mut GameSession> {
        self.session_index
            .get(map_id)
            .map(|&index| &mut self.sessions[index])
    }

    pub fn sessions(&self) -> &[GameSession] {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut [GameSession] {
        &mut self.sessions
    }
}
