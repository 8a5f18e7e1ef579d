//! Use cases exposed to players.
//!
//! [`Application`] owns the game, the token table and a handle to the leaderboard
//! repository. It is driven from a single task, so none of its state is locked.

use crate::persistence::{PersistenceError, RetiredDog, RetiredDogRepository};
use crate::players::{PlayerRef, PlayerTokens, Token};
use log::{error, info};
use model::protocol::ErrorCode;
use model::{Direction, DogId, Game, GameSession, Map, MapId, Retirement};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Longest accepted player name, matching the leaderboard column width.
pub const MAX_NAME_LENGTH: usize = 100;
pub const DEFAULT_RECORDS_LIMIT: usize = 100;
pub const MAX_RECORDS_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid name")]
    InvalidName,
    #[error("Map not found")]
    MapNotFound,
    #[error("Player token has not been found")]
    UnknownToken,
    #[error("Authorization header is missing or malformed")]
    InvalidToken,
    #[error("{0}")]
    BadRequest(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::InvalidName => ErrorCode::InvalidArgument,
            ApiError::MapNotFound => ErrorCode::MapNotFound,
            ApiError::UnknownToken => ErrorCode::UnknownToken,
            ApiError::InvalidToken => ErrorCode::InvalidToken,
            ApiError::BadRequest(_) => ErrorCode::BadRequest,
            ApiError::Persistence(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinResult {
    pub token: Token,
    pub player_id: DogId,
}

pub struct Application {
    game: Game,
    tokens: PlayerTokens,
    repository: Arc<dyn RetiredDogRepository>,
}

impl Application {
    pub fn new(game: Game, repository: Arc<dyn RetiredDogRepository>) -> Self {
        Self {
            game,
            tokens: PlayerTokens::new(),
            repository,
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    pub fn tokens(&self) -> &PlayerTokens {
        &self.tokens
    }

    pub fn tokens_mut(&mut self) -> &mut PlayerTokens {
        &mut self.tokens
    }

    pub fn repository(&self) -> Arc<dyn RetiredDogRepository> {
        Arc::clone(&self.repository)
    }

    pub fn list_maps(&self) -> &[Arc<Map>] {
        self.game.maps()
    }

    pub fn find_map(&self, map_id: &str) -> Result<&Arc<Map>, ApiError> {
        self.game
            .find_map(&MapId::new(map_id))
            .ok_or(ApiError::MapNotFound)
    }

    pub fn join_game(&mut self, map_id: &str, user_name: &str) -> Result<JoinResult, ApiError> {
        if user_name.is_empty() || user_name.chars().count() > MAX_NAME_LENGTH {
            return Err(ApiError::InvalidName);
        }
        let map_id = MapId::new(map_id);
        let session = self
            .game
            .find_or_create_session(&map_id)
            .ok_or(ApiError::MapNotFound)?;

        let player_id = session.add_dog(user_name);
        let token = self.tokens.issue(player_id, map_id);
        Ok(JoinResult { token, player_id })
    }

    /// Resolves a raw token string to the player it was issued for.
    pub fn authorize(&self, raw_token: &str) -> Result<&PlayerRef, ApiError> {
        let token = Token::parse(raw_token).ok_or(ApiError::InvalidToken)?;
        self.tokens.find(&token).ok_or(ApiError::UnknownToken)
    }

    /// The session the token's dog plays in. Both players listing and state
    /// requests read from it.
    pub fn game_state(&self, raw_token: &str) -> Result<&GameSession, ApiError> {
        let player = self.authorize(raw_token)?;
        self.game
            .session(&player.map_id)
            .ok_or(ApiError::UnknownToken)
    }

    pub fn list_players(&self, raw_token: &str) -> Result<&GameSession, ApiError> {
        self.game_state(raw_token)
    }

    pub fn action_move(
        &mut self,
        raw_token: &str,
        direction: Option<Direction>,
    ) -> Result<(), ApiError> {
        let player = self.authorize(raw_token)?.clone();
        let dog = self
            .game
            .session_mut(&player.map_id)
            .and_then(|session| session.dog_mut(player.dog_id))
            .ok_or(ApiError::UnknownToken)?;
        dog.steer(direction);
        Ok(())
    }

    /// Advances the game and stores every retired dog before returning.
    ///
    /// Tokens of retired dogs are revoked even when storing fails; the first
    /// storage error is returned after all records were attempted.
    pub async fn tick(&mut self, delta: Duration) -> Result<Vec<Retirement>, ApiError> {
        let retirements = model::tick::tick(&mut self.game, delta);

        let mut first_error = None;
        for retirement in &retirements {
            self.tokens
                .remove_dog(&retirement.map_id, retirement.dog_id);

            let record = RetiredDog::new(
                retirement.name.clone(),
                retirement.score,
                retirement.play_time,
            );
            if let Err(e) = self.repository.save(&record).await {
                error!("Failed to store retired dog {}: {}", retirement.name, e);
                first_error.get_or_insert(e);
            }
        }

        if !retirements.is_empty() {
            info!("{} dogs retired", retirements.len());
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(retirements),
        }
    }

    pub async fn records(
        &self,
        start: Option<usize>,
        max_items: Option<usize>,
    ) -> Result<Vec<RetiredDog>, ApiError> {
        load_records(self.repository(), start, max_items).await
    }
}

/// Validates paging parameters, returning `(offset, limit)`.
pub fn records_range(
    start: Option<usize>,
    max_items: Option<usize>,
) -> Result<(usize, usize), ApiError> {
    let limit = max_items.unwrap_or(DEFAULT_RECORDS_LIMIT);
    if limit > MAX_RECORDS_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "maxItems must not exceed {}",
            MAX_RECORDS_LIMIT
        )));
    }
    Ok((start.unwrap_or(0), limit))
}

/// Reads a leaderboard page. Needs only the repository, so it can run off the
/// game task.
pub async fn load_records(
    repository: Arc<dyn RetiredDogRepository>,
    start: Option<usize>,
    max_items: Option<usize>,
) -> Result<Vec<RetiredDog>, ApiError> {
    let (offset, limit) = records_range(start, max_items)?;
    repository.load(offset, limit).await.map_err(|e| {
        error!("Failed to load records: {}", e);
        ApiError::from(e)
    })
}
