//! Shared application state for the Observer API server.
//!
//! [`AppState`] holds the running [`Simulation`] and the bounded reaction
//! log. REST reads go straight to the simulation, which only locks for
//! short synchronous sections, so the observer never stalls the clock.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use providence_core::generation::ContentGenerator;
use providence_core::simulation::{OracleOutcome, Simulation, SimulationEvent};
use providence_types::{AgentId, FaithChange, OracleId, OracleType, Timestamp};
use serde::Serialize;
use tokio::sync::broadcast;

/// Entries kept in the reaction log. Older entries are dropped first.
pub const MESSAGE_LOG_CAPACITY: usize = 20;

/// Where the reactions of the latest oracle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionSource {
    /// The generation service answered.
    Generation,
    /// Deterministic fallback reactions were used.
    Fallback,
}

/// One agent's reaction to one oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageEntry {
    /// Wall-clock time the reaction was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Game time the oracle was issued.
    pub issued_at: Timestamp,
    /// Oracle the reaction belongs to.
    pub oracle_id: OracleId,
    /// Message or holy light.
    pub oracle_type: OracleType,
    /// Spoken words, for messages.
    pub oracle_message: Option<String>,
    /// Reacting agent.
    pub agent_id: AgentId,
    /// Reacting agent's display name.
    pub agent_name: String,
    /// How the agent read the oracle.
    pub interpretation: String,
    /// Inner struggle, empty for fallback reactions.
    pub inner_conflict: String,
    /// Thought the agent was left with.
    pub thought: String,
    /// Qualitative change.
    pub faith_change: FaithChange,
    /// Faith delta actually applied.
    pub faith_delta: i32,
}

/// Newest-first log of recent reactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageLog {
    /// Source of the latest oracle's reactions, if any oracle completed.
    pub source: Option<ReactionSource>,
    /// Entries, newest first.
    pub entries: VecDeque<MessageEntry>,
}

impl MessageLog {
    /// Record every reaction of `outcome`. `name_of` resolves display names;
    /// reactions of agents it cannot name are skipped.
    pub fn record<F>(&mut self, outcome: &OracleOutcome, name_of: F)
    where
        F: Fn(&AgentId) -> Option<String>,
    {
        self.source = Some(if outcome.used_generation {
            ReactionSource::Generation
        } else {
            ReactionSource::Fallback
        });

        let recorded_at = Utc::now();
        for (agent_id, reaction) in &outcome.reactions {
            let Some(agent_name) = name_of(agent_id) else {
                continue;
            };
            self.entries.push_front(MessageEntry {
                recorded_at,
                issued_at: outcome.oracle.timestamp,
                oracle_id: outcome.oracle.id,
                oracle_type: outcome.oracle.oracle_type,
                oracle_message: outcome.oracle.message.clone(),
                agent_id: agent_id.clone(),
                agent_name,
                interpretation: reaction.interpretation.clone(),
                inner_conflict: reaction.inner_conflict.clone(),
                thought: reaction.new_thought.clone(),
                faith_change: reaction.faith_change,
                faith_delta: outcome.faith_deltas.get(agent_id).copied().unwrap_or(0),
            });
        }
        self.entries.truncate(MESSAGE_LOG_CAPACITY);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.source = None;
        self.entries.clear();
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState<G> {
    /// The running simulation.
    pub simulation: Arc<Simulation<G>>,
    messages: Mutex<MessageLog>,
}

impl<G: ContentGenerator> AppState<G> {
    /// State serving `simulation` with an empty log.
    pub fn new(simulation: Arc<Simulation<G>>) -> Self {
        Self {
            simulation,
            messages: Mutex::new(MessageLog::default()),
        }
    }

    /// Subscribe to the simulation's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.simulation.subscribe_events()
    }

    /// Copy of the reaction log.
    pub fn messages(&self) -> MessageLog {
        self.log().clone()
    }

    /// Add an oracle's reactions to the log.
    pub fn record_outcome(&self, outcome: &OracleOutcome) {
        let names = self.simulation.read(|store| {
            outcome
                .reactions
                .keys()
                .filter_map(|id| {
                    store
                        .agent(id.as_str())
                        .map(|agent| (id.clone(), agent.display_name.clone()))
                })
                .collect::<Vec<_>>()
        });
        self.log().record(outcome, |id| {
            names
                .iter()
                .find(|(known, _)| known == id)
                .map(|(_, name)| name.clone())
        });
    }

    /// Empty the reaction log.
    pub fn clear_messages(&self) {
        self.log().clear();
    }

    fn log(&self) -> MutexGuard<'_, MessageLog> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<G> std::fmt::Debug for AppState<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("simulation", &self.simulation)
            .finish_non_exhaustive()
    }
}
