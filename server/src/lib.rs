//! # Game Server Library
//!
//! Authoritative server for the dog gathering game. It loads the maps, owns the
//! live game, answers player requests over UDP and stores the results of retired
//! players for the leaderboard.
//!
//! ## Architecture Design
//!
//! ### Single Serialized Loop
//! All game state lives in one [`app::Application`] owned by the task running
//! [`network::Server::run`]. Requests and ticks are handled one after another in
//! that loop, so the simulation needs no locks and every request sees a
//! consistent world.
//!
//! ### UDP-Based Communication
//! Each datagram carries one bincode encoded `model::protocol::Packet`. Receiving
//! and sending happen on their own tasks connected to the loop by channels.
//!
//! ### Time
//! The game advances either on a fixed period (`--tick-period`) or when clients
//! send explicit `Tick` requests, which is handy for tests and debugging.
//!
//! ## Module Organization
//!
//! - `app`: use cases (join, move, state, tick, records) and their errors
//! - `players`: authorization tokens and the token to dog table
//! - `persistence`: leaderboard repositories, PostgreSQL and in-memory
//! - `snapshot`: versioned crash-recovery state file
//! - `config`: JSON game configuration
//! - `network`: UDP server and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::app::Application;
//! use server::network::Server;
//! use server::persistence::InMemoryRepository;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let game = server::config::load_game(Path::new("data/config.json"), false)?;
//!     let app = Application::new(game, Arc::new(InMemoryRepository::new()));
//!
//!     // Tick every 50ms, no snapshots
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         app,
//!         Some(Duration::from_millis(50)),
//!         None,
//!     ).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod network;
pub mod persistence;
pub mod players;
pub mod snapshot;
