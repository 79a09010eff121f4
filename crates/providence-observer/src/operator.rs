//! Operator REST API handlers for runtime simulation control.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/operator/pause` | Stop the clock |
//! | `POST` | `/api/operator/resume` | Start the clock |
//! | `POST` | `/api/operator/speed` | Set the speed multiplier (1, 2 or 4) |
//! | `POST` | `/api/operator/reset` | Restore the starting state |
//! | `GET` | `/api/operator/status` | Current simulation status |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use providence_core::generation::ContentGenerator;
use providence_types::{ClockState, LoadingState, Speed, TerminalState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/operator/speed`.
#[derive(Debug, Deserialize)]
pub struct SetSpeedRequest {
    /// Multiplier: 1, 2 or 4.
    pub speed: u8,
}

/// Generic success response.
#[derive(Debug, Serialize)]
pub struct OperatorResponse {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Human-readable message.
    pub message: String,
}

/// Response body for `GET /api/operator/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether the clock driver is running.
    pub clock: ClockState,
    /// Whether time is paused.
    pub paused: bool,
    /// Speed multiplier.
    pub speed: Speed,
    /// Current day.
    pub day: u32,
    /// Current hour.
    pub hour: u8,
    /// Divine power on hand.
    pub power: u32,
    /// Power cap.
    pub max_power: u32,
    /// Global faith.
    pub global_faith: i32,
    /// Loading indicator.
    pub loading: LoadingState,
    /// Game-over status.
    pub terminal: TerminalState,
    /// Whether the generation service can be reached at all.
    pub generation_available: bool,
}

fn ok(message: &str) -> Json<OperatorResponse> {
    Json(OperatorResponse {
        ok: true,
        message: message.to_owned(),
    })
}

// ---------------------------------------------------------------------------
// POST /api/operator/pause
// ---------------------------------------------------------------------------

/// Stop the clock. Already-stopped clocks stay stopped.
pub async fn pause<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<OperatorResponse> {
    state.simulation.pause();
    ok("Simulation paused")
}

// ---------------------------------------------------------------------------
// POST /api/operator/resume
// ---------------------------------------------------------------------------

/// Start the clock. Refused once the game is over.
pub async fn resume<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Result<Json<OperatorResponse>, ObserverError> {
    match state.simulation.resume() {
        ClockState::Running => Ok(ok("Simulation resumed")),
        ClockState::Stopped => Err(ObserverError::Oracle(
            providence_core::error::OracleError::SimulationOver,
        )),
    }
}

// ---------------------------------------------------------------------------
// POST /api/operator/speed
// ---------------------------------------------------------------------------

/// Change the clock speed. A running clock keeps running at the new rate.
pub async fn set_speed<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
    Json(body): Json<SetSpeedRequest>,
) -> Result<Json<OperatorResponse>, ObserverError> {
    let speed =
        Speed::try_from(body.speed).map_err(|e| ObserverError::BadRequest(e.to_string()))?;
    state.simulation.set_speed(speed);
    Ok(Json(OperatorResponse {
        ok: true,
        message: format!("Speed set to {}x", u8::from(speed)),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/operator/reset
// ---------------------------------------------------------------------------

/// Restore the starting state and clear the reaction log. A fresh day
/// schedule is requested in the background; the skeleton serves until it
/// arrives.
pub async fn reset<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<OperatorResponse> {
    state.simulation.reset();
    state.clear_messages();

    if state.simulation.generator().available() {
        let simulation = Arc::clone(&state.simulation);
        tokio::spawn(async move {
            let outcome = simulation.regenerate_day_schedule().await;
            info!(?outcome, "Day schedule after reset");
        });
    }

    ok("Simulation reset")
}

// ---------------------------------------------------------------------------
// GET /api/operator/status
// ---------------------------------------------------------------------------

/// Clock, resources, and game status at a glance.
pub async fn status<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<StatusResponse> {
    let clock = state.simulation.clock_status();
    let generation_available = state.simulation.generator().available();
    Json(state.simulation.read(|store| {
        let time = store.time();
        let power = store.power();
        StatusResponse {
            clock,
            paused: time.paused,
            speed: time.speed,
            day: time.day,
            hour: time.hour,
            power: power.current,
            max_power: power.max,
            global_faith: store.faith().global,
            loading: store.loading(),
            terminal: store.terminal(),
            generation_available,
        }
    }))
}
