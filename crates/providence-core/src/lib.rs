//! State store, clock, schedules, and the oracle pipeline for the
//! Providence simulation.
//!
//! This crate owns everything between the player's interventions and the
//! agents' hour-by-hour behavior. The generation service is reached only
//! through the [`ContentGenerator`] trait, and every answer it gives is
//! validated before it touches state.
//!
//! # Modules
//!
//! - [`cast`] -- Static town data: locations, actions, cast, routines.
//! - [`clock`] -- Hourly step and tick cadence.
//! - [`config`] -- Configuration loading from `providence-config.yaml`.
//! - [`error`] -- Oracle and prompt errors.
//! - [`generation`] -- [`ContentGenerator`] trait and lenient JSON decoding.
//! - [`prompt`] -- `minijinja` prompt templates and their context.
//! - [`routine`] -- Nearest-hour routine lookup and routine thoughts.
//! - [`schedule`] -- [`ScheduleSystem`]: skeletons, overlays, merges.
//! - [`simulation`] -- [`Simulation`]: clock driver, day generation, oracles.
//! - [`store`] -- [`StateStore`]: typed slices with change notification.
//! - [`validator`] -- Sanitizing generated output and fallback reactions.
//!
//! [`ContentGenerator`]: generation::ContentGenerator
//! [`ScheduleSystem`]: schedule::ScheduleSystem
//! [`Simulation`]: simulation::Simulation
//! [`StateStore`]: store::StateStore

pub mod cast;
pub mod clock;
pub mod config;
pub mod error;
pub mod generation;
pub mod prompt;
pub mod routine;
pub mod schedule;
pub mod simulation;
pub mod store;
pub mod validator;
