//! The state store: sole owner of [`SimulationState`].
//!
//! Every mutation goes through a typed setter that writes the slice and then
//! synchronously notifies subscribers, in subscription order, with the
//! slice's new JSON value and a view of the whole state. Writes never fail;
//! callers validate first.

use std::collections::BTreeMap;

use providence_types::{
    ActionId, Agent, AgentId, FaithState, LoadingState, LoadingTask, LocationId, MemoryEntry,
    PowerState, ScheduleState, SimulationState, Speed, TerminalState, TimeState,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cast;
use crate::config::GameConfig;

/// An observable slice of the simulation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "slice", content = "id", rename_all = "snake_case")]
pub enum StateSlice {
    /// The whole state (after a reset).
    All,
    /// `time`.
    Time,
    /// A single agent.
    Agent(AgentId),
    /// `faith`.
    Faith,
    /// `power`.
    Power,
    /// `schedule`.
    Schedule,
    /// `selection`.
    Selection,
    /// `loading`.
    Loading,
    /// `terminal`.
    Terminal,
}

/// A change notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    /// Which slice changed.
    #[serde(flatten)]
    pub slice: StateSlice,
    /// The slice's new value.
    pub value: serde_json::Value,
}

/// Handle returned by [`StateStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked on every state change.
pub type Subscriber = Box<dyn Fn(&StateChange, &SimulationState) + Send>;

/// Shallow merge applied by [`StateStore::update_agent`].
///
/// Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentUpdate {
    /// New location.
    pub location: Option<LocationId>,
    /// New action.
    pub action: Option<ActionId>,
    /// New thought (`Some(None)` clears it).
    pub thought: Option<Option<String>>,
    /// New interpretation (`Some(None)` clears it).
    pub interpretation: Option<Option<String>>,
    /// Memory to append, evicting the oldest beyond capacity.
    pub remember: Option<MemoryEntry>,
}

/// Result of [`StateStore::apply_faith_deltas`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaithApplied {
    /// Delta that took effect per agent, after clamping.
    pub applied: BTreeMap<AgentId, i32>,
    /// Set if this change ended the game.
    pub terminal: Option<TerminalOutcome>,
}

/// Outcome of a termination check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalOutcome {
    /// Global faith reached the target.
    Victory,
    /// Global faith fell to the floor.
    Defeat,
}

/// Owner of the simulation state and its subscribers.
pub struct StateStore {
    state: SimulationState,
    initial: SimulationState,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    session: u64,
    faith_floor: i32,
}

impl core::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StateStore")
            .field("time", &self.state.time)
            .field("faith", &self.state.faith)
            .field("power", &self.state.power)
            .field("subscribers", &self.subscribers.len())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Build the day-1 state from the stock cast and the given config.
    pub fn new(config: &GameConfig) -> Self {
        let agents = cast::starting_agents();
        let mut state = SimulationState {
            time: TimeState {
                day: 1,
                hour: config.time.start_hour,
                paused: true,
                speed: Speed::X1,
            },
            agents,
            locations: cast::starting_locations(),
            faith: FaithState {
                global: 0,
                target: config.faith.target,
            },
            power: PowerState {
                current: config.power.initial.min(config.power.max),
                max: config.power.max,
            },
            schedule: ScheduleState::default(),
            history: Vec::new(),
            selection: None,
            loading: LoadingState::default(),
            terminal: TerminalState::default(),
        };
        state.faith.global = rounded_mean_faith(&state);
        Self::with_state(state, config.faith.floor)
    }

    /// Build a store around an arbitrary starting state.
    pub fn with_state(state: SimulationState, faith_floor: i32) -> Self {
        Self {
            initial: state.clone(),
            state,
            subscribers: Vec::new(),
            next_subscription: 0,
            session: 0,
            faith_floor,
        }
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Register a change callback.
    pub fn subscribe(&mut self, callback: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription = self.next_subscription.saturating_add(1);
        self.subscribers.push((id, callback));
        id
    }

    /// Remove a change callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    fn notify(&self, slice: StateSlice) {
        if self.subscribers.is_empty() {
            return;
        }
        let change = StateChange {
            value: self.slice_value(&slice),
            slice,
        };
        for (_, callback) in &self.subscribers {
            callback(&change, &self.state);
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The whole state.
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Clock slice.
    pub const fn time(&self) -> TimeState {
        self.state.time
    }

    /// One agent.
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.state.agents.get(id)
    }

    /// Every agent, in id order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.state.agents.values()
    }

    /// Faith slice.
    pub const fn faith(&self) -> FaithState {
        self.state.faith
    }

    /// Power slice.
    pub const fn power(&self) -> PowerState {
        self.state.power
    }

    /// Schedule slice.
    pub const fn schedule(&self) -> &ScheduleState {
        &self.state.schedule
    }

    /// Selected agent.
    pub const fn selection(&self) -> Option<&AgentId> {
        self.state.selection.as_ref()
    }

    /// Loading slice.
    pub const fn loading(&self) -> LoadingState {
        self.state.loading
    }

    /// Terminal slice.
    pub const fn terminal(&self) -> TerminalState {
        self.state.terminal
    }

    /// Whether the game is over. Every mutating entry point consults this.
    pub const fn is_terminal(&self) -> bool {
        self.state.terminal.over
    }

    /// Counter bumped by every [`reset`](Self::reset). Async work compares it
    /// before applying results.
    pub const fn session(&self) -> u64 {
        self.session
    }

    /// JSON value of a slice.
    pub fn slice_value(&self, slice: &StateSlice) -> serde_json::Value {
        let value = match slice {
            StateSlice::All => serde_json::to_value(&self.state),
            StateSlice::Time => serde_json::to_value(self.state.time),
            StateSlice::Agent(id) => serde_json::to_value(self.state.agents.get(id)),
            StateSlice::Faith => serde_json::to_value(self.state.faith),
            StateSlice::Power => serde_json::to_value(self.state.power),
            StateSlice::Schedule => serde_json::to_value(&self.state.schedule),
            StateSlice::Selection => serde_json::to_value(&self.state.selection),
            StateSlice::Loading => serde_json::to_value(self.state.loading),
            StateSlice::Terminal => serde_json::to_value(self.state.terminal),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Set the hour. Callers keep it below 24.
    pub fn set_hour(&mut self, hour: u8) {
        self.state.time.hour = hour;
        self.notify(StateSlice::Time);
    }

    /// Advance to `hour` of `day` with a single notification.
    pub fn set_clock(&mut self, day: u32, hour: u8) {
        self.state.time.day = day;
        self.state.time.hour = hour;
        self.notify(StateSlice::Time);
    }

    /// Pause or unpause time.
    pub fn set_paused(&mut self, paused: bool) {
        self.state.time.paused = paused;
        self.notify(StateSlice::Time);
    }

    /// Set the speed multiplier.
    pub fn set_speed(&mut self, speed: Speed) {
        self.state.time.speed = speed;
        self.notify(StateSlice::Time);
    }

    /// Set current power, capped at the maximum.
    pub fn set_power(&mut self, current: u32) {
        self.state.power.current = current.min(self.state.power.max);
        self.notify(StateSlice::Power);
    }

    /// Debit `cost` if affordable. The check and the debit are one step, so
    /// a failed check leaves power untouched.
    pub fn consume_power(&mut self, cost: u32) -> bool {
        match self.state.power.current.checked_sub(cost) {
            Some(remaining) => {
                self.set_power(remaining);
                true
            }
            None => false,
        }
    }

    /// Regain `amount` power, capped at the maximum.
    pub fn regen_power(&mut self, amount: u32) {
        let current = self.state.power.current.saturating_add(amount);
        if current.min(self.state.power.max) != self.state.power.current {
            self.set_power(current);
        }
    }

    /// Select an agent for inspection, or clear the selection.
    pub fn set_selection(&mut self, selection: Option<AgentId>) {
        self.state.selection = selection;
        self.notify(StateSlice::Selection);
    }

    /// Show the loading indicator for `task`.
    pub fn start_loading(&mut self, task: LoadingTask) {
        self.state.loading = LoadingState {
            active: true,
            label: Some(task),
        };
        self.notify(StateSlice::Loading);
    }

    /// Clear the loading indicator if it is showing `task`.
    pub fn finish_loading(&mut self, task: LoadingTask) {
        if self.state.loading.label == Some(task) {
            self.state.loading = LoadingState::default();
            self.notify(StateSlice::Loading);
        }
    }

    /// Replace the schedule slice. Only the schedule system writes here.
    pub(crate) fn set_schedule(&mut self, schedule: ScheduleState) {
        self.state.schedule = schedule;
        self.notify(StateSlice::Schedule);
    }

    /// Shallow-merge fields into an agent with one notification. Returns
    /// `false` for an unknown agent.
    pub fn update_agent(&mut self, id: &AgentId, update: AgentUpdate) -> bool {
        let Some(agent) = self.state.agents.get_mut(id) else {
            return false;
        };
        if let Some(location) = update.location {
            agent.location = location;
        }
        if let Some(action) = update.action {
            agent.action = action;
        }
        if let Some(thought) = update.thought {
            agent.thought = thought;
        }
        if let Some(interpretation) = update.interpretation {
            agent.interpretation = interpretation;
        }
        if let Some(entry) = update.remember {
            agent.remember(entry);
        }
        self.notify(StateSlice::Agent(id.clone()));
        true
    }

    /// Apply signed faith deltas, each clamped to `0..=100`, then recompute
    /// global faith and run the termination check once. Unknown agents are
    /// skipped.
    pub fn apply_faith_deltas(&mut self, deltas: &[(AgentId, i32)]) -> FaithApplied {
        let mut applied = BTreeMap::new();
        for (id, delta) in deltas {
            let Some(agent) = self.state.agents.get_mut(id) else {
                continue;
            };
            applied.insert(id.clone(), agent.apply_faith_delta(*delta));
            self.notify(StateSlice::Agent(id.clone()));
        }
        let terminal = self.recompute_global_faith();
        FaithApplied { applied, terminal }
    }

    /// Recompute `faith.global` as the rounded mean of agent faith, then run
    /// the termination check. Returns the outcome if this call ended the game.
    pub fn recompute_global_faith(&mut self) -> Option<TerminalOutcome> {
        self.state.faith.global = rounded_mean_faith(&self.state);
        self.notify(StateSlice::Faith);
        self.check_terminal()
    }

    fn check_terminal(&mut self) -> Option<TerminalOutcome> {
        if self.state.terminal.over {
            return None;
        }
        let faith = self.state.faith;
        let outcome = if faith.global >= faith.target {
            TerminalOutcome::Victory
        } else if faith.global <= self.faith_floor {
            TerminalOutcome::Defeat
        } else {
            return None;
        };
        self.state.terminal = TerminalState {
            over: true,
            victory: outcome == TerminalOutcome::Victory,
        };
        self.state.time.paused = true;
        info!(
            global_faith = faith.global,
            target = faith.target,
            outcome = ?outcome,
            "Simulation reached a terminal state"
        );
        self.notify(StateSlice::Terminal);
        self.notify(StateSlice::Time);
        Some(outcome)
    }

    /// Restore the starting state and start a new session.
    pub fn reset(&mut self) {
        self.state = self.initial.clone();
        self.session = self.session.saturating_add(1);
        debug!(session = self.session, "State store reset");
        self.notify(StateSlice::All);
    }
}

/// `round(mean(agent.faith))`, rounding halves up. Zero for an empty cast.
fn rounded_mean_faith(state: &SimulationState) -> i32 {
    let count = u64::try_from(state.agents.len()).unwrap_or(u64::MAX);
    let sum: u64 = state.agents.values().map(|agent| u64::from(agent.faith)).sum();
    // floor((2 * sum + n) / (2 * n))
    let rounded = sum
        .checked_mul(2)
        .and_then(|twice| twice.checked_add(count))
        .zip(count.checked_mul(2))
        .and_then(|(numerator, denominator)| numerator.checked_div(denominator))
        .unwrap_or(0);
    i32::try_from(rounded).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use providence_types::{OracleType, Timestamp};

    use super::*;

    fn store() -> StateStore {
        StateStore::new(&GameConfig::default())
    }

    fn recorder(store: &mut StateStore) -> Arc<Mutex<Vec<StateChange>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(Box::new(move |change, _| {
            sink.lock().unwrap().push(change.clone());
        }));
        seen
    }

    fn shift(id: &str, delta: i32) -> (AgentId, i32) {
        (AgentId::from(id), delta)
    }

    #[test]
    fn initial_state_matches_stock_config() {
        let store = store();
        assert_eq!(store.time().day, 1);
        assert_eq!(store.time().hour, 6);
        assert!(store.time().paused);
        assert_eq!(store.power().current, 50);
        assert_eq!(store.faith().global, 50);
        assert_eq!(store.faith().target, 100);
        assert!(!store.is_terminal());
    }

    #[test]
    fn subscribers_are_notified_in_order() {
        let mut store = store();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let sink = Arc::clone(&order);
            store.subscribe(Box::new(move |_, _| sink.lock().unwrap().push(tag)));
        }
        store.set_hour(7);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let mut store = store();
        let seen = Arc::new(Mutex::new(0_u32));
        let sink = Arc::clone(&seen);
        let id = store.subscribe(Box::new(move |_, _| {
            let mut count = sink.lock().unwrap();
            *count = count.saturating_add(1);
        }));
        store.set_hour(7);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set_hour(8);
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn update_agent_emits_single_notification() {
        let mut store = store();
        let seen = recorder(&mut store);
        let updated = store.update_agent(
            &AgentId::from("sly"),
            AgentUpdate {
                location: Some(LocationId::from("plaza")),
                action: Some(ActionId::from("haggling")),
                thought: Some(Some("Thirty percent off!".to_owned())),
                ..AgentUpdate::default()
            },
        );
        assert!(updated);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].slice, StateSlice::Agent(AgentId::from("sly")));
        assert_eq!(seen[0].value["location"], "plaza");
        let sly = store.agent("sly").unwrap();
        assert_eq!(sly.action, ActionId::from("haggling"));
        assert_eq!(sly.faith, 20);
    }

    #[test]
    fn update_unknown_agent_is_rejected() {
        let mut store = store();
        assert!(!store.update_agent(&AgentId::from("nobody"), AgentUpdate::default()));
    }

    #[test]
    fn remember_through_update_is_bounded() {
        let mut store = store();
        for day in 1..=15 {
            store.update_agent(
                &AgentId::from("elara"),
                AgentUpdate {
                    remember: Some(MemoryEntry::Oracle {
                        oracle_type: OracleType::Message,
                        message: Some(format!("day {day}")),
                        interpretation: String::new(),
                        faith_delta: 0,
                        timestamp: Timestamp { day, hour: 6 },
                    }),
                    ..AgentUpdate::default()
                },
            );
        }
        assert_eq!(store.agent("elara").unwrap().memory.len(), 10);
    }

    #[test]
    fn consume_power_is_all_or_nothing() {
        let mut store = store();
        store.set_power(19);
        assert!(!store.consume_power(20));
        assert_eq!(store.power().current, 19);
        assert!(store.consume_power(19));
        assert_eq!(store.power().current, 0);
    }

    #[test]
    fn regen_power_is_capped() {
        let mut store = store();
        store.set_power(99);
        store.regen_power(2);
        assert_eq!(store.power().current, 100);
        store.regen_power(2);
        assert_eq!(store.power().current, 100);
    }

    #[test]
    fn faith_change_updates_global_immediately() {
        let mut store = store();
        let result = store.apply_faith_deltas(&[shift("sly", -20)]);
        assert_eq!(store.agent("sly").unwrap().faith, 0);
        // (80 + 0) / 2
        assert_eq!(store.faith().global, 40);
        assert_eq!(result.applied.get("sly"), Some(&-20));
        assert_eq!(result.terminal, None);
    }

    #[test]
    fn faith_deltas_clamp_and_skip_unknown_agents() {
        let mut store = store();
        let seen = recorder(&mut store);
        let result =
            store.apply_faith_deltas(&[shift("elara", 15), shift("sly", -30), shift("nobody", 5)]);
        assert_eq!(result.applied.get("elara"), Some(&15));
        assert_eq!(result.applied.get("sly"), Some(&-20));
        assert!(!result.applied.contains_key("nobody"));
        assert_eq!(store.agent("elara").unwrap().faith, 95);

        let slices: Vec<StateSlice> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|change| change.slice.clone())
            .collect();
        assert_eq!(
            slices,
            vec![
                StateSlice::Agent(AgentId::from("elara")),
                StateSlice::Agent(AgentId::from("sly")),
                StateSlice::Faith,
            ]
        );
    }

    #[test]
    fn global_faith_rounds_half_up() {
        let mut store = store();
        let result = store.apply_faith_deltas(&[shift("elara", 1)]);
        assert_eq!(result.terminal, None);
        // (81 + 20) / 2 = 50.5
        assert_eq!(store.faith().global, 51);
    }

    #[test]
    fn reaching_target_is_victory_and_pauses() {
        let mut store = store();
        store.set_paused(false);
        let result = store.apply_faith_deltas(&[shift("elara", 20), shift("sly", 80)]);
        assert_eq!(result.terminal, Some(TerminalOutcome::Victory));
        assert!(store.is_terminal());
        assert!(store.terminal().victory);
        assert!(store.time().paused);
        // Already over: no second outcome.
        assert_eq!(store.recompute_global_faith(), None);
    }

    #[test]
    fn falling_to_floor_is_defeat() {
        let mut store = store();
        let result = store.apply_faith_deltas(&[shift("elara", -80), shift("sly", -20)]);
        assert_eq!(result.terminal, Some(TerminalOutcome::Defeat));
        assert!(!store.terminal().victory);
    }

    #[test]
    fn reset_restores_state_and_bumps_session() {
        let mut store = store();
        let seen = recorder(&mut store);
        store.set_power(3);
        store.set_hour(20);
        store.reset();
        assert_eq!(store.power().current, 50);
        assert_eq!(store.time().hour, 6);
        assert_eq!(store.session(), 1);
        let last = seen.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.slice, StateSlice::All);
    }

    #[test]
    fn loading_is_cleared_only_by_its_task() {
        let mut store = store();
        store.start_loading(LoadingTask::ProcessingOracle);
        store.finish_loading(LoadingTask::GeneratingScript);
        assert!(store.loading().active);
        store.finish_loading(LoadingTask::ProcessingOracle);
        assert!(!store.loading().active);
    }
}
