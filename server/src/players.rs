//! Authorization tokens handed to players on join.
//!
//! A token maps to a dog by id only; the dog itself lives in its session.

use model::{DogId, MapId};
use rand::Rng;
use std::collections::HashMap;
use std::fmt;

/// Number of hex characters in a token.
pub const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Token(format!("{:016x}{:016x}", rng.gen::<u64>(), rng.gen::<u64>()))
    }

    /// Accepts only well-formed tokens: exactly 32 hex digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed =
            raw.len() == TOKEN_LENGTH && raw.chars().all(|c| c.is_ascii_hexdigit());
        well_formed.then(|| Token(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRef {
    pub dog_id: DogId,
    pub map_id: MapId,
}

/// Token table kept in both directions so lookups by dog never scan.
#[derive(Debug, Default)]
pub struct PlayerTokens {
    players: HashMap<Token, PlayerRef>,
    tokens_by_dog: HashMap<(MapId, DogId), Token>,
}

impl PlayerTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh token for the dog, retrying on the unlikely collision.
    pub fn issue(&mut self, dog_id: DogId, map_id: MapId) -> Token {
        let mut token = Token::generate();
        while self.players.contains_key(&token) {
            token = Token::generate();
        }
        self.insert(token.clone(), dog_id, map_id);
        token
    }

    /// Re-registers a token loaded from a snapshot. Returns `false` if the token or
    /// the dog is already registered.
    pub fn restore(&mut self, token: Token, dog_id: DogId, map_id: MapId) -> bool {
        if self.players.contains_key(&token)
            || self.tokens_by_dog.contains_key(&(map_id.clone(), dog_id))
        {
            return false;
        }
        self.insert(token, dog_id, map_id);
        true
    }

    fn insert(&mut self, token: Token, dog_id: DogId, map_id: MapId) {
        self.tokens_by_dog
            .insert((map_id.clone(), dog_id), token.clone());
        self.players.insert(token, PlayerRef { dog_id, map_id });
    }

    pub fn find(&self, token: &Token) -> Option<&PlayerRef> {
        self.players.get(token)
    }

    /// Drops the token of a dog that left the game.
    pub fn remove_dog(&mut self, map_id: &MapId, dog_id: DogId) -> Option<Token> {
        let token = self.tokens_by_dog.remove(&(map_id.clone(), dog_id))?;
        self.players.remove(&token);
        Some(token)
    }

    pub fn token_of(&self, map_id: &MapId, dog_id: DogId) -> Option<&Token> {
        self.tokens_by_dog.get(&(map_id.clone(), dog_id))
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
