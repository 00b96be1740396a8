//! Drop Game Server - authoritative round engine for the parachute drop overlay
//!
//! This is the main entry point. It handles:
//! - The round task (physics, landings, queue, round timeout)
//! - WebSocket connections for chat bridges and overlays
//! - The persisted 24h scoreboard

mod app;
mod assets;
mod chat;
mod config;
mod game;
mod http;
mod store;
mod util;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::assets::FileCatalog;
use crate::config::Config;
use crate::game::{Round, RoundRunner};
use crate::http::build_router;
use crate::store::{JsonFileBackend, ScoreStore};
use crate::util::time::{init_server_time, SystemClock};

/// How often expired command cooldowns are forgotten
const COOLDOWN_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Drop Game Server");
    info!("Server address: {}", config.server_addr);
    info!(channel = %config.channel, theme = %config.theme, "Round settings");

    // Scoreboard and sprites
    let store = ScoreStore::new(
        Box::new(JsonFileBackend::new(&config.scores_path)),
        Arc::new(SystemClock),
    );
    let catalog = FileCatalog::load(&config.asset_root, &config.catalog_path).await;

    // Spawn the round task
    let seed: u64 = rand::thread_rng().gen();
    let round = Round::new(config.tuning, &config.theme, store, seed);
    let (runner, round_handle) = RoundRunner::new(round, config.channel.clone(), Arc::new(catalog));
    tokio::spawn(runner.run());

    // Create application state
    let state = AppState::new(config.clone(), round_handle);

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let mut sweep = tokio::time::interval(COOLDOWN_SWEEP_INTERVAL);
        loop {
            sweep.tick().await;
            dispatcher.sweep();
        }
    });

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
