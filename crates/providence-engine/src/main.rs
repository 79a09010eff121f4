//! Engine binary for the Providence simulation.
//!
//! Wires configuration, the generation backend, the simulation, and the
//! observer server together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`PROVIDENCE_CONFIG`, else `providence-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Configure the generation backend from `PROVIDENCE_LLM_*`
//! 4. Build the simulation and request the first day's schedule
//! 5. Start the observer API server
//! 6. Start the clock and the event monitor
//! 7. Wait for `Ctrl-C`, then stop the clock and the server

mod error;
mod monitor;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use providence_core::config::{GameConfig, LogFormat, LoggingConfig};
use providence_core::simulation::Simulation;
use providence_llm::{LlmClient, LlmConfig};
use providence_observer::AppState;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file read when `PROVIDENCE_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "providence-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any startup step fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_source) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("providence-engine starting");
    let source = config_source
        .as_ref()
        .map_or_else(|| "defaults".to_owned(), |path| path.display().to_string());
    info!(
        source = %source,
        ms_per_game_hour = config.time.ms_per_game_hour,
        start_hour = config.time.start_hour,
        initial_power = config.power.initial,
        "Configuration loaded"
    );

    // 3. Generation backend.
    let llm_config = LlmConfig::from_env().map_err(EngineError::from)?;
    let generator = LlmClient::from_config(&llm_config).map_err(EngineError::from)?;

    // 4. Simulation and first day.
    let simulation =
        Arc::new(Simulation::new(config.clone(), generator).map_err(EngineError::from)?);
    let first_day = simulation.initialize_day_schedule().await;
    info!(outcome = ?first_day, "First day schedule ready");

    // 5. Observer API server.
    let shutdown = Arc::new(Notify::new());
    let server_shutdown = {
        let shutdown = Arc::clone(&shutdown);
        async move { shutdown.notified().await }
    };
    let app_state = Arc::new(AppState::new(Arc::clone(&simulation)));
    let observer =
        providence_observer::spawn_observer(&config.observer, app_state, server_shutdown)
            .await
            .map_err(EngineError::from)?;

    // 6. Clock and monitor.
    let monitor_task = monitor::spawn_monitor(simulation.subscribe_events());
    simulation.start_clock();

    // 7. Run until Ctrl-C.
    tokio::signal::ctrl_c().await.map_err(|e| EngineError::Signal {
        message: e.to_string(),
    })?;
    info!("Shutdown requested");

    simulation.pause();
    shutdown.notify_one();
    if let Err(e) = observer.await {
        warn!(error = %e, "Observer task ended abnormally");
    }
    monitor_task.abort();

    let final_state = simulation.snapshot();
    info!(
        day = final_state.time.day,
        hour = final_state.time.hour,
        global_faith = final_state.faith.global,
        over = final_state.terminal.over,
        "providence-engine shutdown complete"
    );

    Ok(())
}

/// Initialize `tracing-subscriber`. `RUST_LOG` wins over the configured
/// level; an unparseable level falls back to `info`.
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Load the game configuration.
///
/// An explicit `PROVIDENCE_CONFIG` path must exist. Otherwise
/// `providence-config.yaml` in the working directory is used if present,
/// and the defaults if not. Returns the path that was read, if any.
fn load_config() -> Result<(GameConfig, Option<PathBuf>), EngineError> {
    if let Some(path) = std::env::var_os("PROVIDENCE_CONFIG").map(PathBuf::from) {
        let config = GameConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }

    let path = Path::new(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = GameConfig::from_file(path)?;
        Ok((config, Some(path.to_path_buf())))
    } else {
        let mut config = GameConfig::default();
        config.observer.apply_env_overrides();
        Ok((config, None))
    }
}
