//! Observer API server for the Providence simulation.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST reads** of the simulation state, agents, locations (with
//!   computed occupants), the installed schedule, and recent reactions
//! - **Oracle commands** that wait for the town's reactions
//! - **Operator commands** for pause, resume, speed, reset, and status
//! - **`WebSocket` endpoint** (`/ws/events`) streaming every
//!   [`SimulationEvent`] as JSON
//!
//! Rendering is left to an external client; this crate only serves data.
//!
//! [`SimulationEvent`]: providence_core::simulation::SimulationEvent

pub mod error;
pub mod handlers;
pub mod operator;
pub mod oracle;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerError, spawn_observer, start_server};
pub use state::{AppState, MessageLog};
