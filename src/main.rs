use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tambayan::config::{Cli, Config};
use tambayan::state::AppState;
use tambayan::{app, db, spawn_session_sweeper};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let db_path = config.db_path();
    let pool = db::create_pool(&db_path, &config.database)?;
    db::run_migrations(&pool)?;
    tracing::info!("Database ready at {}", db_path.display());

    spawn_session_sweeper(pool.clone(), SESSION_SWEEP_INTERVAL);

    let state = AppState {
        db: pool,
        config: config.clone(),
    };

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
