//! Snowfight Server - authoritative multiplayer snowball arena
//!
//! This is the main entry point for the game server. It handles:
//! - WebSocket connections for real-time gameplay
//! - The fixed-rate world simulation with learning bots
//! - Periodic persistence of bot skill profiles

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snowfight_server::app::AppState;
use snowfight_server::config::Config;
use snowfight_server::game::map::MapGrid;
use snowfight_server::game::{TickScheduler, World};
use snowfight_server::http::build_router;
use snowfight_server::store::SkillStore;
use snowfight_server::util::time::{clock_seed, init_server_time};
use snowfight_server::ws::protocol::map_message;

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

    info!("Starting Snowfight Server");
    info!("Server address: {}", config.server_addr);

    let tuning = config.tuning;
    let map = MapGrid::load_or_open(&config.map_path, tuning.map_size, tuning.tile_size);
    let map_message = map_message(&map)?;
    let skills = SkillStore::load(&config.skill_store_path);

    let seed = config.world_seed.unwrap_or_else(clock_seed);
    let mut world = World::new(map, tuning, skills, config.bot_strategy, seed);
    world.spawn_bots(config.bot_count);

    // Spawn the tick scheduler
    let (scheduler, world_handle) = TickScheduler::new(
        world,
        config.skill_store_path.clone(),
        config.skill_flush_interval,
    );
    let scheduler_task = tokio::spawn(scheduler.run());

    // Build router
    let state = AppState::new(config.clone(), world_handle.clone(), map_message);
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

    // Stop ticking and persist the final skill snapshot
    world_handle.shutdown();
    scheduler_task.await?;

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
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
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
