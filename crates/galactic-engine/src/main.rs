//! Engine binary for the galactic simulation.
//!
//! Wires the simulation engine to the observer API and runs until
//! `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `galactic-config.yaml`
//! 3. Create and initialize the engine (regions, AI budgets, monitor)
//! 4. Start the clock timers and the processing loop
//! 5. Start the Observer API server
//! 6. Wait for `Ctrl-C`, then stop the engine and save

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use galactic_core::{EngineConfig, ScalableSimulationEngine};
use galactic_observer::{AppState, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "galactic-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("galactic-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        day_tick_rate_ms = config.day_tick_rate_ms,
        quarter_tick_rate_ms = config.quarter_tick_rate_ms,
        target_max_players = config.target_max_players,
        max_concurrency = config.max_concurrency,
        "Configuration loaded"
    );

    // 3. Create and initialize the engine.
    let observer_config = config.observer.clone();
    let engine = ScalableSimulationEngine::with_defaults(config).context("failed to create engine")?;
    engine.initialize().await.context("failed to initialize engine")?;

    // 4. Start timers and processing.
    engine.start().await.context("failed to start engine")?;

    // 5. Start the Observer API server.
    let observer = if observer_config.enabled {
        let server_config = ServerConfig::from(&observer_config);
        let state = Arc::new(AppState::new(engine.clone()));
        Some(tokio::spawn(async move {
            if let Err(e) = galactic_observer::start_server(&server_config, state).await {
                error!(error = %e, "Observer server failed");
            }
        }))
    } else {
        info!("Observer disabled");
        None
    };

    // 6. Run until Ctrl-C.
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    if let Some(observer) = observer {
        observer.abort();
    }
    engine.stop().await;

    let state = engine.game_state().await;
    info!(
        game_day = state.current_game_day,
        quarter = state.current_quarter,
        total_players = state.total_players,
        processed_actions = state.performance.processed_actions_total,
        "galactic-engine stopped"
    );
    Ok(())
}

/// Load `galactic-config.yaml` from the working directory, falling back
/// to defaults. Environment overrides apply either way.
fn load_config() -> anyhow::Result<EngineConfig> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        return EngineConfig::from_file(path).with_context(|| format!("failed to load {CONFIG_PATH}"));
    }
    info!("Config file not found, using defaults");
    let mut config = EngineConfig::default();
    config.apply_env_overrides();
    config.validate().context("invalid configuration")?;
    Ok(config)
}
