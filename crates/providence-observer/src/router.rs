//! Axum router construction for the Observer API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use providence_core::generation::ContentGenerator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, operator, oracle, ws};

/// Build the complete router: REST reads, oracle and operator commands,
/// and the `/ws/events` stream. CORS allows any origin so an external
/// renderer can be served from elsewhere.
pub fn build_router<G: ContentGenerator>(state: Arc<AppState<G>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws/events", get(ws::ws_events::<G>))
        // State
        .route("/api/state", get(handlers::get_state::<G>))
        .route("/api/agents", get(handlers::list_agents::<G>))
        .route("/api/agents/{id}", get(handlers::get_agent::<G>))
        .route("/api/locations", get(handlers::list_locations::<G>))
        .route("/api/schedule", get(handlers::get_schedule::<G>))
        .route("/api/messages", get(handlers::list_messages::<G>))
        .route("/api/selection", post(handlers::set_selection::<G>))
        // Oracles
        .route("/api/oracle/message", post(oracle::send_message::<G>))
        .route("/api/oracle/holy-light", post(oracle::cast_holy_light::<G>))
        // Operator
        .route("/api/operator/pause", post(operator::pause::<G>))
        .route("/api/operator/resume", post(operator::resume::<G>))
        .route("/api/operator/speed", post(operator::set_speed::<G>))
        .route("/api/operator/reset", post(operator::reset::<G>))
        .route("/api/operator/status", get(operator::status::<G>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
