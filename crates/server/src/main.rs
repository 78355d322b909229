// crates/server/src/main.rs
//! Poolstats server binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use poolstats_db::{ClickHouse, Database, Settings};
use poolstats_server::{create_app, AppState};

/// Default port for the server.
const DEFAULT_PORT: u16 = 8030;

#[derive(Parser)]
#[command(name = "poolstats", version, about = "DNS pool usage reporting API")]
struct Cli {
    /// Path to the settings file (default: $POOLSTATS_CONFIG or ./poolstats.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server
    Serve,
}

/// Get the server port from environment or use default.
fn get_port() -> u16 {
    std::env::var("POOLSTATS_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "poolstats=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve(cli.config).await,
    }
}

async fn serve(config: Option<PathBuf>) -> Result<()> {
    let settings = match config {
        Some(path) => Settings::load(&path)?,
        None => Settings::from_env()?,
    };

    let db = Database::connect_lazy(&settings.mysql.dsn)?;
    let ch = ClickHouse::new(&settings.clickhouse)?;

    // fail fast when a backend is unreachable rather than serving errors
    db.ping().await.context("mysql ping")?;
    ch.logs.ping().await.context("clickhouse logs ping")?;
    ch.scores.ping().await.context("clickhouse scores ping")?;

    let state = Arc::new(AppState::new(db, ch, &settings));
    let app = create_app(state);

    let port = get_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server")?;

    tracing::info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
