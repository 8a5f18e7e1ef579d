use clap::Parser;
use log::{info, warn};
use server::app::Application;
use server::config::load_game;
use server::network::{Server, ServerMessage};
use server::persistence::{
    InMemoryRepository, PostgresRepository, RetiredDogRepository, DB_URL_ENV_NAME,
};
use server::snapshot::{load_from_file, SnapshotSaver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Game configuration file
    #[clap(short, long)]
    config_file: PathBuf,
    /// Tick period in milliseconds; without it clients drive time with Tick requests
    #[clap(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    tick_period: Option<u64>,
    /// File to restore the game from and save it to
    #[clap(short, long)]
    state_file: Option<PathBuf>,
    /// Game time in milliseconds between snapshot saves
    #[clap(long, value_parser = clap::value_parser!(u64).range(1..))]
    save_state_period: Option<u64>,
    /// Spawn dogs at random road positions
    #[clap(long)]
    randomize_spawn_points: bool,
    /// Number of pooled database connections
    #[clap(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..))]
    db_pool_size: u32,
}

/// Main-method of the application.
/// Loads the game, restores saved state and runs the server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let game = load_game(&args.config_file, args.randomize_spawn_points)?;
    info!(
        "Loaded {} maps from {}",
        game.maps().len(),
        args.config_file.display()
    );

    let repository: Arc<dyn RetiredDogRepository> = match std::env::var(DB_URL_ENV_NAME) {
        Ok(url) => Arc::new(PostgresRepository::connect(&url, args.db_pool_size as usize).await?),
        Err(_) => {
            warn!(
                "{} is not set, retired players are kept in memory only",
                DB_URL_ENV_NAME
            );
            Arc::new(InMemoryRepository::new())
        }
    };

    let mut app = Application::new(game, repository);

    let saver = match args.state_file {
        Some(path) => {
            if let Some(snapshot) = load_from_file(&path)? {
                snapshot.restore(&mut app)?;
                info!("Restored game state from {}", path.display());
            }
            Some(SnapshotSaver::new(
                path,
                args.save_state_period.map(Duration::from_millis),
            ))
        }
        None => None,
    };

    let address = format!("{}:{}", args.host, args.port);
    let tick_period = args.tick_period.map(Duration::from_millis);
    let mut server = Server::new(&address, app, tick_period, saver).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = shutdown.send(ServerMessage::Shutdown);
        }
    });

    server.run().await
}
