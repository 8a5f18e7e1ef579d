//! Storage of retired dogs for the leaderboard.

use async_trait::async_trait;
use deadpool_postgres::{Config, CreatePoolError, Pool, PoolConfig, PoolError, Runtime};
use log::info;
use std::cmp::Ordering;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_postgres::NoTls;
use uuid::Uuid;

/// Environment variable holding the PostgreSQL connection URL.
pub const DB_URL_ENV_NAME: &str = "GAME_DB_URL";

#[derive(Debug, Clone, PartialEq)]
pub struct RetiredDog {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
    pub play_time: Duration,
}

impl RetiredDog {
    pub fn new(name: impl Into<String>, score: u32, play_time: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            score,
            play_time,
        }
    }

    /// Leaderboard order: higher score first, then shorter play time, then name.
    pub fn leaderboard_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then(self.play_time.cmp(&other.play_time))
            .then_with(|| self.name.cmp(&other.name))
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create connection pool: {0}")]
    CreatePool(#[from] CreatePoolError),
    #[error("failed to get database connection: {0}")]
    Pool(#[from] PoolError),
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
}

#[async_trait]
pub trait RetiredDogRepository: Send + Sync {
    async fn save(&self, dog: &RetiredDog) -> Result<(), PersistenceError>;

    /// Returns up to `limit` records in leaderboard order, skipping the first `offset`.
    async fn load(&self, offset: usize, limit: usize) -> Result<Vec<RetiredDog>, PersistenceError>;
}

/// Repository backed by PostgreSQL through a bounded connection pool.
///
/// A checkout waits until a connection is free and the connection goes back to the
/// pool when the checked out object is dropped.
pub struct PostgresRepository {
    pool: Pool,
}

impl PostgresRepository {
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self, PersistenceError> {
        let mut pg_config = Config::new();
        pg_config.url = Some(url.to_string());
        pg_config.pool = Some(PoolConfig::new(pool_size));

        let pool = pg_config.create_pool(Some(Runtime::Tokio1), NoTls)?;
        let repository = Self { pool };

        repository.initialize_schema().await?;
        repository.warm_up(pool_size).await?;
        info!("Connected to database with {} pooled connections", pool_size);

        Ok(repository)
    }

    async fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let client = self.pool.get().await?;

        let schema = r#"
            CREATE TABLE IF NOT EXISTS retired_players (
                id UUID PRIMARY KEY,
                name VARCHAR(100) NOT NULL,
                score BIGINT NOT NULL,
                play_time_ms BIGINT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_retired_players_leaderboard
            ON retired_players(score DESC, play_time_ms, name);
        "#;

        client.batch_execute(schema).await?;
        Ok(())
    }

    /// Opens every pooled connection up front so the first ticks don't pay for it.
    async fn warm_up(&self, pool_size: usize) -> Result<(), PersistenceError> {
        let mut clients = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            clients.push(self.pool.get().await?);
        }
        Ok(())
    }
}

#[async_trait]
impl RetiredDogRepository for PostgresRepository {
    async fn save(&self, dog: &RetiredDog) -> Result<(), PersistenceError> {
        let client = self.pool.get().await?;
        let play_time_ms = i64::try_from(dog.play_time.as_millis()).unwrap_or(i64::MAX);

        client
            .execute(
                "INSERT INTO retired_players (id, name, score, play_time_ms) VALUES ($1, $2, $3, $4)",
                &[&dog.id, &dog.name, &i64::from(dog.score), &play_time_ms],
            )
            .await?;
        Ok(())
    }

    async fn load(&self, offset: usize, limit: usize) -> Result<Vec<RetiredDog>, PersistenceError> {
        let client = self.pool.get().await?;
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = client
            .query(
                "SELECT id, name, score, play_time_ms FROM retired_players \
                 ORDER BY score DESC, play_time_ms, name \
                 LIMIT $1 OFFSET $2",
                &[&limit, &offset],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| RetiredDog {
                id: row.get(0),
                name: row.get(1),
                score: u32::try_from(row.get::<_, i64>(2)).unwrap_or(u32::MAX),
                play_time: Duration::from_millis(
                    u64::try_from(row.get::<_, i64>(3)).unwrap_or_default(),
                ),
            })
            .collect())
    }
}

/// Repository used when no database is configured. Records live for the process.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: RwLock<Vec<RetiredDog>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetiredDogRepository for InMemoryRepository {
    async fn save(&self, dog: &RetiredDog) -> Result<(), PersistenceError> {
        let mut records = self.records.write().await;
        let index = records
            .binary_search_by(|probe| probe.leaderboard_cmp(dog))
            .unwrap_or_else(|index| index);
        records.insert(index, dog.clone());
        Ok(())
    }

    async fn load(&self, offset: usize, limit: usize) -> Result<Vec<RetiredDog>, PersistenceError> {
        let records = self.records.read().await;
        Ok(records.iter().skip(offset).take(limit).cloned().collect())
    }
}
