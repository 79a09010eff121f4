//! Core entity structs for the Providence simulation.
//!
//! [`SimulationState`] is the root aggregate. Everything observers see
//! (the renderer, the panels, the HTTP API) is a projection of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    FaithChange, LoadingTask, OracleTarget, OracleType, ScheduleOrigin, Speed,
};
use crate::ids::{ActionId, AgentId, LocationId, OracleId};

/// Number of hours in a simulated day.
pub const HOURS_PER_DAY: u8 = 24;

/// Maximum memory entries an agent retains. Oldest entries are evicted first.
pub const MEMORY_CAPACITY: usize = 10;

/// Upper bound of an agent's faith.
pub const MAX_AGENT_FAITH: u8 = 100;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A point in simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Timestamp {
    /// Day number, starting at 1.
    pub day: u32,
    /// Hour of the day (0--23).
    pub hour: u8,
}

/// Clock slice of the simulation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TimeState {
    /// Current day, starting at 1.
    pub day: u32,
    /// Current hour (0--23).
    pub hour: u8,
    /// Whether time is paused.
    pub paused: bool,
    /// Tick rate multiplier.
    #[ts(type = "number")]
    pub speed: Speed,
}

impl TimeState {
    /// The current time as a [`Timestamp`].
    pub const fn timestamp(&self) -> Timestamp {
        Timestamp {
            day: self.day,
            hour: self.hour,
        }
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Free-form descriptive personality of a cast member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Personality {
    /// Character traits (e.g. "devout", "cynical").
    pub traits: Vec<String>,
    /// What the agent cares about.
    pub values: Vec<String>,
    /// What the agent is afraid of.
    pub fears: Vec<String>,
    /// Small recurring behaviors.
    pub quirks: Vec<String>,
}

/// Something an agent remembers.
///
/// Tagged by `kind`; only oracle memories exist today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MemoryEntry {
    /// The agent witnessed an oracle.
    Oracle {
        /// Which kind of oracle it was.
        oracle_type: OracleType,
        /// Spoken words, for message oracles.
        message: Option<String>,
        /// How the agent understood it.
        interpretation: String,
        /// Faith delta that was actually applied.
        faith_delta: i32,
        /// When it happened.
        timestamp: Timestamp,
    },
}

/// A cast member and their live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Agent {
    /// Stable identifier.
    pub id: AgentId,
    /// Name shown to the player.
    pub display_name: String,
    /// Social role in town (e.g. "Nun").
    pub role: String,
    /// Renderer color.
    pub color: String,
    /// Descriptive personality.
    pub personality: Personality,
    /// Where the agent currently is.
    pub location: LocationId,
    /// What the agent is currently doing.
    pub action: ActionId,
    /// Personal faith (0--100).
    pub faith: u8,
    /// Current inner thought, if any.
    pub thought: Option<String>,
    /// Interpretation of the most recent oracle, if any.
    pub interpretation: Option<String>,
    /// Bounded memory, oldest first.
    pub memory: Vec<MemoryEntry>,
}

impl Agent {
    /// Append a memory, evicting the oldest entries beyond [`MEMORY_CAPACITY`].
    pub fn remember(&mut self, entry: MemoryEntry) {
        self.memory.push(entry);
        let excess = self.memory.len().saturating_sub(MEMORY_CAPACITY);
        if excess > 0 {
            self.memory.drain(..excess);
        }
    }

    /// The `count` most recent memories, oldest first.
    pub fn recent_memories(&self, count: usize) -> &[MemoryEntry] {
        let start = self.memory.len().saturating_sub(count);
        self.memory.get(start..).unwrap_or(&[])
    }

    /// Apply a signed faith delta, clamped to `0..=100`. Returns the delta
    /// that actually took effect.
    pub fn apply_faith_delta(&mut self, delta: i32) -> i32 {
        let (faith, applied) = faith_after_delta(self.faith, delta);
        self.faith = faith;
        applied
    }
}

/// Faith after applying `delta` to `faith`, clamped to `0..=100`, and the
/// delta that actually took effect.
fn faith_after_delta(faith: u8, delta: i32) -> (u8, i32) {
    let before = i32::from(faith);
    let after = before
        .saturating_add(delta)
        .clamp(0, i32::from(MAX_AGENT_FAITH));
    (
        u8::try_from(after).unwrap_or(MAX_AGENT_FAITH),
        after.saturating_sub(before),
    )
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in renderer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A place in town. Occupancy is derived from agent locations, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Location {
    /// Stable identifier.
    pub id: LocationId,
    /// Name shown to the player.
    pub display_name: String,
    /// Renderer geometry.
    pub bounds: Rect,
    /// Renderer fill color.
    pub color: String,
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// One hour of an agent's plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScheduleEntry {
    /// Hour of the day (0--23).
    pub hour: u8,
    /// Where the agent will be.
    pub location: LocationId,
    /// What the agent will be doing.
    pub action: ActionId,
    /// Inner monologue for the hour.
    pub thought: String,
}

/// A schedule that is not exactly one entry per hour in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncompleteSchedule {
    /// Number of entries supplied.
    pub len: usize,
}

impl core::fmt::Display for IncompleteSchedule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "day schedule must hold one entry per hour in order, got {} entries",
            self.len
        )
    }
}

impl std::error::Error for IncompleteSchedule {}

/// A complete 24-entry plan for one agent, indexed by hour.
///
/// The only constructors are [`DaySchedule::from_fn`] and the checked
/// `TryFrom<Vec<ScheduleEntry>>`, so a value always covers every hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ScheduleEntry>", into = "Vec<ScheduleEntry>")]
pub struct DaySchedule {
    entries: Vec<ScheduleEntry>,
}

impl DaySchedule {
    /// Build a schedule by producing the entry for every hour.
    ///
    /// The closure's entry hour is overwritten with the hour it was asked for.
    pub fn from_fn(mut entry_for: impl FnMut(u8) -> ScheduleEntry) -> Self {
        let entries = (0..HOURS_PER_DAY)
            .map(|hour| ScheduleEntry {
                hour,
                ..entry_for(hour)
            })
            .collect();
        Self { entries }
    }

    /// Entry for an hour, if the hour is in range.
    pub fn entry(&self, hour: u8) -> Option<&ScheduleEntry> {
        self.entries.get(usize::from(hour))
    }

    /// Replace the entry at `entry.hour`. Returns `false` for an
    /// out-of-range hour, leaving the schedule unchanged.
    pub fn replace(&mut self, entry: ScheduleEntry) -> bool {
        match self.entries.get_mut(usize::from(entry.hour)) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    /// All entries, hour 0 first.
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }
}

impl TryFrom<Vec<ScheduleEntry>> for DaySchedule {
    type Error = IncompleteSchedule;

    fn try_from(entries: Vec<ScheduleEntry>) -> Result<Self, Self::Error> {
        let in_order = entries
            .iter()
            .zip(0..HOURS_PER_DAY)
            .all(|(entry, hour)| entry.hour == hour);
        if entries.len() == usize::from(HOURS_PER_DAY) && in_order {
            Ok(Self { entries })
        } else {
            Err(IncompleteSchedule { len: entries.len() })
        }
    }
}

impl From<DaySchedule> for Vec<ScheduleEntry> {
    fn from(schedule: DaySchedule) -> Self {
        schedule.entries
    }
}

/// Validated, possibly sparse schedule entries keyed by agent.
pub type PartialSchedule = BTreeMap<AgentId, Vec<ScheduleEntry>>;

/// Schedule slice of the simulation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScheduleState {
    /// Day this schedule was installed for.
    pub day: u32,
    /// Where the schedule came from.
    pub origin: ScheduleOrigin,
    /// Per-agent 24-hour plans.
    #[ts(type = "Record<string, Array<ScheduleEntry>>")]
    pub agents: BTreeMap<AgentId, DaySchedule>,
}

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

/// A player-issued intervention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Oracle {
    /// Correlation id.
    pub id: OracleId,
    /// Message or holy light.
    pub oracle_type: OracleType,
    /// Spoken words, for message oracles.
    pub message: Option<String>,
    /// Addressee (`"all"` or an agent id).
    #[ts(type = "string")]
    pub target: OracleTarget,
    /// When it was issued.
    pub timestamp: Timestamp,
}

/// How one agent reacted to an oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Reaction {
    /// Immediate reading of the oracle.
    pub interpretation: String,
    /// Inner struggle it provoked. Empty for fallback reactions.
    pub inner_conflict: String,
    /// Qualitative faith change.
    pub faith_change: FaithChange,
    /// Thought the agent is left with.
    pub new_thought: String,
}

// ---------------------------------------------------------------------------
// Resources and status
// ---------------------------------------------------------------------------

/// Faith slice: the global rounded mean and the victory target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FaithState {
    /// Rounded mean of all agents' faith.
    pub global: i32,
    /// Global faith that wins the game.
    pub target: i32,
}

/// Divine power slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PowerState {
    /// Spendable power (never above `max`).
    pub current: u32,
    /// Regeneration cap.
    pub max: u32,
}

/// Loading indicator slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LoadingState {
    /// Whether work is in flight.
    pub active: bool,
    /// What is in flight.
    pub label: Option<LoadingTask>,
}

/// Game-over slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TerminalState {
    /// The game has ended.
    pub over: bool,
    /// The game ended in victory.
    pub victory: bool,
}

/// Root aggregate of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationState {
    /// Clock.
    pub time: TimeState,
    /// Cast members by id.
    pub agents: BTreeMap<AgentId, Agent>,
    /// Town locations by id.
    pub locations: BTreeMap<LocationId, Location>,
    /// Faith totals.
    pub faith: FaithState,
    /// Divine power.
    pub power: PowerState,
    /// Installed day schedule.
    pub schedule: ScheduleState,
    /// Reserved for replay. Always empty.
    pub history: Vec<serde_json::Value>,
    /// Agent highlighted by the player.
    pub selection: Option<AgentId>,
    /// Loading indicator.
    pub loading: LoadingState,
    /// Game-over status.
    pub terminal: TerminalState,
}

impl SimulationState {
    /// Agents currently at a location, in id order.
    pub fn occupants(&self, location: &LocationId) -> Vec<&Agent> {
        self.agents
            .values()
            .filter(|agent| &agent.location == location)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn agent(faith: u8) -> Agent {
        Agent {
            id: AgentId::from("elara"),
            display_name: "Elara".to_owned(),
            role: "Nun".to_owned(),
            color: "#f5f5dc".to_owned(),
            personality: Personality::default(),
            location: LocationId::from("altar"),
            action: ActionId::from("praying"),
            faith,
            thought: None,
            interpretation: None,
            memory: Vec::new(),
        }
    }

    fn memory(day: u32) -> MemoryEntry {
        MemoryEntry::Oracle {
            oracle_type: OracleType::HolyLight,
            message: None,
            interpretation: format!("day {day}"),
            faith_delta: 3,
            timestamp: Timestamp { day, hour: 6 },
        }
    }

    fn entry(hour: u8) -> ScheduleEntry {
        ScheduleEntry {
            hour,
            location: LocationId::from("altar"),
            action: ActionId::from("praying"),
            thought: "...".to_owned(),
        }
    }

    #[test]
    fn memory_evicts_oldest_first() {
        let mut elara = agent(80);
        for day in 1..=12 {
            elara.remember(memory(day));
        }
        assert_eq!(elara.memory.len(), MEMORY_CAPACITY);
        assert_eq!(elara.memory.first(), Some(&memory(3)));
        assert_eq!(elara.memory.last(), Some(&memory(12)));
        assert_eq!(elara.recent_memories(3).len(), 3);
        assert_eq!(elara.recent_memories(3).first(), Some(&memory(10)));
    }

    #[test]
    fn faith_delta_clamps_to_bounds() {
        let mut elara = agent(95);
        assert_eq!(elara.apply_faith_delta(15), 5);
        assert_eq!(elara.faith, 100);

        let mut sly = agent(2);
        assert_eq!(sly.apply_faith_delta(-8), -2);
        assert_eq!(sly.faith, 0);
    }

    #[test]
    fn memory_entries_are_tagged_by_kind() {
        let json = serde_json::to_value(memory(1)).unwrap();
        assert_eq!(json["kind"], "oracle");
        assert_eq!(json["oracle_type"], "holy_light");
    }

    #[test]
    fn day_schedule_covers_every_hour() {
        let schedule = DaySchedule::from_fn(|_| entry(99));
        assert_eq!(schedule.entries().len(), 24);
        assert!(schedule
            .entries()
            .iter()
            .enumerate()
            .all(|(index, e)| usize::from(e.hour) == index));
        assert!(schedule.entry(24).is_none());
    }

    #[test]
    fn day_schedule_replace_matches_by_hour() {
        let mut schedule = DaySchedule::from_fn(entry);
        let mut replacement = entry(7);
        replacement.thought = "new".to_owned();
        assert!(schedule.replace(replacement));
        assert_eq!(schedule.entry(7).unwrap().thought, "new");
        assert_eq!(schedule.entry(6).unwrap().thought, "...");
        assert!(!schedule.replace(entry(30)));
    }

    #[test]
    fn day_schedule_rejects_partial_vectors() {
        let short: Vec<ScheduleEntry> = (0..12).map(entry).collect();
        assert_eq!(
            DaySchedule::try_from(short),
            Err(IncompleteSchedule { len: 12 })
        );
        let full: Vec<ScheduleEntry> = (0..24).map(entry).collect();
        assert!(DaySchedule::try_from(full).is_ok());
    }
}
