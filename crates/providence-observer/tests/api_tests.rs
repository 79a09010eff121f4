//! Integration tests for the Observer API endpoints.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. The simulation runs with generation disabled, so
//! every oracle resolves through fallback reactions.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use providence_core::cast::CAST;
use providence_core::config::GameConfig;
use providence_core::generation::DisabledGenerator;
use providence_core::simulation::Simulation;
use providence_observer::build_router;
use providence_observer::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_app() -> Router {
    let simulation = Simulation::new(GameConfig::default(), DisabledGenerator).unwrap();
    build_router(Arc::new(AppState::new(Arc::new(simulation))))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri, None).await
}

async fn post(app: &Router, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    call(app, Method::POST, uri, body).await
}

async fn power(app: &Router) -> u64 {
    let (_, status) = get(app, "/api/operator/status").await;
    status["power"].as_u64().unwrap()
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn state_starts_at_day_one_morning() {
    let app = make_app();
    let (status, state) = get(&app, "/api/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["time"]["day"], 1);
    assert_eq!(state["time"]["hour"], 6);
    assert_eq!(state["power"]["current"], 50);
    assert_eq!(state["terminal"]["over"], false);
}

#[tokio::test]
async fn agents_list_and_lookup() {
    let app = make_app();
    let (status, agents) = get(&app, "/api/agents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agents.as_array().unwrap().len(), CAST.len());

    let (status, elara) = get(&app, "/api/agents/elara").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(elara["id"], "elara");

    let (status, error) = get(&app, "/api/agents/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "not_found");
}

#[tokio::test]
async fn locations_carry_every_agent_once() {
    let app = make_app();
    let (status, locations) = get(&app, "/api/locations").await;
    assert_eq!(status, StatusCode::OK);
    let occupants: usize = locations
        .as_array()
        .unwrap()
        .iter()
        .map(|location| location["occupants"].as_array().unwrap().len())
        .sum();
    assert_eq!(occupants, CAST.len());
}

#[tokio::test]
async fn schedule_is_the_skeleton_for_day_one() {
    let app = make_app();
    let (status, schedule) = get(&app, "/api/schedule").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(schedule["day"], 1);
    assert_eq!(schedule["origin"], "skeleton");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = make_app();
    let (status, _) = get(&app, "/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn message_oracle_uses_fallback_and_is_logged() {
    let app = make_app();
    let (status, outcome) = post(
        &app,
        "/api/oracle/message",
        Some(json!({"message": "Fear not", "target": "elara"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["used_generation"], false);
    assert!(outcome["reactions"]["elara"].is_object());
    assert_eq!(outcome["reactions"].as_object().unwrap().len(), 1);
    assert_eq!(power(&app).await, 40);

    let (status, log) = get(&app, "/api/messages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["source"], "fallback");
    let entries = log["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["agent_id"], "elara");
    assert_eq!(entries[0]["oracle_message"], "Fear not");
}

#[tokio::test]
async fn holy_light_reaches_everyone_until_power_runs_out() {
    let app = make_app();
    let (status, outcome) = post(&app, "/api/oracle/holy-light", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["reactions"].as_object().unwrap().len(), CAST.len());

    let (status, _) = post(&app, "/api/oracle/holy-light", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(power(&app).await, 10);

    let (status, error) = post(&app, "/api/oracle/holy-light", None).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(error["code"], "insufficient_power");
    assert_eq!(power(&app).await, 10);
}

#[tokio::test]
async fn invalid_oracles_are_rejected_without_cost() {
    let app = make_app();
    let (status, error) = post(
        &app,
        "/api/oracle/message",
        Some(json!({"message": "   ", "target": "all"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "empty_message");

    let (status, error) = post(
        &app,
        "/api/oracle/message",
        Some(json!({"message": "Hello", "target": "ghost"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "unknown_target");

    assert_eq!(power(&app).await, 50);
    let (_, log) = get(&app, "/api/messages").await;
    assert!(log["entries"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn selection_accepts_known_agents_and_null() {
    let app = make_app();
    let (status, body) = post(&app, "/api/selection", Some(json!({"agent_id": "sly"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selection"], "sly");
    let (_, state) = get(&app, "/api/state").await;
    assert_eq!(state["selection"], "sly");

    let (status, _) = post(&app, "/api/selection", Some(json!({"agent_id": "ghost"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(&app, "/api/selection", Some(json!({"agent_id": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["selection"].is_null());
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn speed_accepts_only_known_multipliers() {
    let app = make_app();
    let (status, error) = post(&app, "/api/operator/speed", Some(json!({"speed": 3}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "bad_request");

    let (status, body) = post(&app, "/api/operator/speed", Some(json!({"speed": 4}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (_, status_body) = get(&app, "/api/operator/status").await;
    assert_eq!(status_body["speed"], 4);
    assert_eq!(status_body["clock"], "stopped");
    assert_eq!(status_body["generation_available"], false);
}

#[tokio::test]
async fn resume_and_pause_toggle_the_clock() {
    let app = make_app();
    let (status, _) = post(&app, "/api/operator/resume", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(&app, "/api/operator/status").await;
    assert_eq!(body["clock"], "running");
    assert_eq!(body["paused"], false);

    let (status, _) = post(&app, "/api/operator/pause", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(&app, "/api/operator/status").await;
    assert_eq!(body["clock"], "stopped");
    assert_eq!(body["paused"], true);
}

#[tokio::test]
async fn reset_restores_power_and_clears_log() {
    let app = make_app();
    let (status, _) = post(&app, "/api/oracle/holy-light", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(power(&app).await, 30);

    let (status, _) = post(&app, "/api/operator/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(power(&app).await, 50);
    let (_, log) = get(&app, "/api/messages").await;
    assert!(log["entries"].as_array().unwrap().is_empty());
    assert!(log["source"].is_null());
}
