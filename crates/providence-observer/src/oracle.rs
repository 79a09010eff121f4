//! Oracle command handlers.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/oracle/message` | Speak to one agent or everyone |
//! | `POST` | `/api/oracle/holy-light` | Flood the town with light |
//!
//! Both wait for the reactions (generated or fallback) and answer with the
//! [`OracleOutcome`]. Successful outcomes are added to the reaction log.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use providence_core::generation::ContentGenerator;
use providence_core::simulation::OracleOutcome;
use providence_types::OracleTarget;
use serde::Deserialize;
use tracing::info;

use crate::error::ObserverError;
use crate::state::AppState;

/// Request body for `POST /api/oracle/message`.
#[derive(Debug, Deserialize)]
pub struct OracleMessageRequest {
    /// The words to deliver.
    pub message: String,
    /// `"all"` or an agent id. Defaults to everyone.
    #[serde(default = "default_target")]
    pub target: String,
}

fn default_target() -> String {
    String::from("all")
}

/// Deliver a divine message.
pub async fn send_message<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
    Json(body): Json<OracleMessageRequest>,
) -> Result<Json<OracleOutcome>, ObserverError> {
    let target = OracleTarget::from(body.target.as_str());
    let outcome = state.simulation.send_message(&body.message, target).await?;
    info!(
        oracle_id = %outcome.oracle.id,
        reactions = outcome.reactions.len(),
        used_generation = outcome.used_generation,
        "Divine message delivered"
    );
    state.record_outcome(&outcome);
    Ok(Json(outcome))
}

/// Cast holy light on the whole town.
pub async fn cast_holy_light<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Result<Json<OracleOutcome>, ObserverError> {
    let outcome = state.simulation.cast_holy_light().await?;
    info!(
        oracle_id = %outcome.oracle.id,
        reactions = outcome.reactions.len(),
        used_generation = outcome.used_generation,
        "Holy light cast"
    );
    state.record_outcome(&outcome);
    Ok(Json(outcome))
}
