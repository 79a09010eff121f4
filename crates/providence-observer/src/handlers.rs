//! Read-only REST handlers and player selection.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/state` | Full simulation state |
//! | `GET` | `/api/agents` | List agents |
//! | `GET` | `/api/agents/{id}` | Single agent |
//! | `GET` | `/api/locations` | Locations with current occupants |
//! | `GET` | `/api/schedule` | Installed day schedule |
//! | `GET` | `/api/messages` | Recent oracle reactions |
//! | `POST` | `/api/selection` | Highlight or clear an agent |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use providence_core::generation::ContentGenerator;
use providence_types::{Agent, AgentId, Location, ScheduleState, SimulationState};
use serde::{Deserialize, Serialize};

use crate::error::ObserverError;
use crate::state::{AppState, MessageLog};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// A location plus the agents standing in it.
#[derive(Debug, Clone, Serialize)]
pub struct LocationView {
    /// The location.
    #[serde(flatten)]
    pub location: Location,
    /// Agents there now, in id order.
    pub occupants: Vec<AgentId>,
}

/// Request body for `POST /api/selection`.
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    /// Agent to highlight, or `null` to clear.
    pub agent_id: Option<AgentId>,
}

/// Response body for `POST /api/selection`.
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    /// The highlight now in effect.
    pub selection: Option<AgentId>,
}

// ---------------------------------------------------------------------------
// GET /api/state
// ---------------------------------------------------------------------------

/// The whole simulation state.
pub async fn get_state<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<SimulationState> {
    Json(state.simulation.snapshot())
}

// ---------------------------------------------------------------------------
// GET /api/agents
// ---------------------------------------------------------------------------

/// Every agent, in id order.
pub async fn list_agents<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<Vec<Agent>> {
    Json(
        state
            .simulation
            .read(|store| store.agents().cloned().collect()),
    )
}

// ---------------------------------------------------------------------------
// GET /api/agents/{id}
// ---------------------------------------------------------------------------

/// One agent by id.
pub async fn get_agent<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ObserverError> {
    state
        .simulation
        .read(|store| store.agent(&id).cloned())
        .map(Json)
        .ok_or_else(|| ObserverError::NotFound(format!("agent {id}")))
}

// ---------------------------------------------------------------------------
// GET /api/locations
// ---------------------------------------------------------------------------

/// Every location with its occupants computed from agent positions.
pub async fn list_locations<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<Vec<LocationView>> {
    let views = state.simulation.read(|store| {
        let snapshot = store.state();
        snapshot
            .locations
            .values()
            .map(|location| LocationView {
                occupants: snapshot
                    .occupants(&location.id)
                    .into_iter()
                    .map(|agent| agent.id.clone())
                    .collect(),
                location: location.clone(),
            })
            .collect()
    });
    Json(views)
}

// ---------------------------------------------------------------------------
// GET /api/schedule
// ---------------------------------------------------------------------------

/// The installed day schedule.
pub async fn get_schedule<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<ScheduleState> {
    Json(state.simulation.read(|store| store.schedule().clone()))
}

// ---------------------------------------------------------------------------
// GET /api/messages
// ---------------------------------------------------------------------------

/// Recent reactions, newest first.
pub async fn list_messages<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
) -> Json<MessageLog> {
    Json(state.messages())
}

// ---------------------------------------------------------------------------
// POST /api/selection
// ---------------------------------------------------------------------------

/// Highlight an agent, or clear the highlight with `null`.
pub async fn set_selection<G: ContentGenerator>(
    State(state): State<Arc<AppState<G>>>,
    Json(body): Json<SelectionRequest>,
) -> Result<Json<SelectionResponse>, ObserverError> {
    let requested = body.agent_id.clone();
    if !state.simulation.select_agent(body.agent_id) {
        let id = requested.map(|id| id.to_string()).unwrap_or_default();
        return Err(ObserverError::NotFound(format!("agent {id}")));
    }
    Ok(Json(SelectionResponse {
        selection: requested,
    }))
}
