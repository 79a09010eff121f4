//! Sanitizing untrusted generated structures.
//!
//! Generated JSON is speculative: any field may be missing, mistyped, or
//! out of contract. Nothing here fails. Entries with an unusable hour are
//! dropped; every other defect is corrected in place.
//!
//! Also home to the deterministic fallback reaction used whenever the
//! generation service is unavailable or its answer cannot be decoded.

use std::collections::BTreeMap;

use providence_types::{
    ActionId, AgentId, FaithChange, HOURS_PER_DAY, LocationId, OracleType, PartialSchedule,
    Reaction, ScheduleEntry,
};
use serde_json::{Map, Value};

use crate::cast;
use crate::config::GenerationConfig;

/// Thought used when a generated entry has none.
pub const DEFAULT_THOUGHT: &str = "...";

/// Correction rules for generated content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRules {
    /// Substitute for unknown locations.
    pub default_location: String,
    /// Thoughts are cut to this many characters.
    pub thought_max_chars: usize,
}

impl ValidationRules {
    /// Rules from the generation config.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            default_location: config.default_location.clone(),
            thought_max_chars: config.thought_max_chars,
        }
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Validated answer to an oracle prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleResponse {
    /// Reactions keyed by agent. May include agents that were not targeted.
    pub reactions: BTreeMap<AgentId, Reaction>,
    /// Replacement entries for the rest of the day. Often empty.
    pub schedule: PartialSchedule,
}

/// Validate a daily-schedule answer: an object mapping agent ids to lists
/// of `{hour, location, action, thought}`.
///
/// Non-object input yields an empty schedule. Agent values that are not
/// arrays are skipped.
pub fn validate_schedule(raw: &Value, rules: &ValidationRules) -> PartialSchedule {
    let Some(agents) = raw.as_object() else {
        return PartialSchedule::new();
    };
    agents
        .iter()
        .filter_map(|(agent, entries)| {
            let entries = entries.as_array()?;
            let validated = entries
                .iter()
                .filter_map(|entry| validate_entry(entry, rules))
                .collect();
            Some((AgentId::from(agent.as_str()), validated))
        })
        .collect()
}

/// Validate a single schedule entry. Returns `None` if its hour is missing,
/// fractional, or outside `0..24`.
pub fn validate_entry(raw: &Value, rules: &ValidationRules) -> Option<ScheduleEntry> {
    let entry = raw.as_object()?;
    let hour = parse_hour(entry.get("hour")?)?;

    let location = entry
        .get("location")
        .and_then(Value::as_str)
        .filter(|id| cast::is_location(id))
        .unwrap_or(rules.default_location.as_str());

    let valid_here = cast::actions_for(location);
    let action = match entry.get("action").and_then(Value::as_str) {
        Some(action) if valid_here.contains(&action) || cast::is_known_action(action) => action,
        _ => valid_here.first().copied().unwrap_or("wandering"),
    };

    let thought = entry
        .get("thought")
        .and_then(Value::as_str)
        .filter(|thought| !thought.is_empty())
        .map_or_else(
            || DEFAULT_THOUGHT.to_owned(),
            |thought| truncate_chars(thought, rules.thought_max_chars),
        );

    Some(ScheduleEntry {
        hour,
        location: LocationId::from(location),
        action: ActionId::from(action),
        thought,
    })
}

/// Accepts integral numbers and numeric strings in `0..24`.
fn parse_hour(raw: &Value) -> Option<u8> {
    let hour = match raw {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.fract().abs() < f64::EPSILON && value.is_sign_positive())
                .and_then(|value| format!("{value:.0}").parse().ok())
        })?,
        Value::String(text) => text.trim().parse().ok()?,
        _ => return None,
    };
    u8::try_from(hour).ok().filter(|hour| *hour < HOURS_PER_DAY)
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Validate an oracle answer:
/// `{reactions: {id: {interpretation, innerConflict, faithChange, newThought}}, schedule?}`.
pub fn parse_oracle_response(raw: &Value, rules: &ValidationRules) -> OracleResponse {
    let reactions = raw
        .get("reactions")
        .and_then(Value::as_object)
        .map(|reactions| {
            reactions
                .iter()
                .filter_map(|(agent, reaction)| {
                    let reaction = reaction.as_object()?;
                    Some((AgentId::from(agent.as_str()), parse_reaction(reaction)))
                })
                .collect()
        })
        .unwrap_or_default();

    let schedule = raw
        .get("schedule")
        .map(|schedule| validate_schedule(schedule, rules))
        .unwrap_or_default();

    OracleResponse {
        reactions,
        schedule,
    }
}

fn parse_reaction(reaction: &Map<String, Value>) -> Reaction {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| reaction.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned()
    };
    let faith_change = ["faithChange", "faith_change"]
        .iter()
        .find_map(|key| reaction.get(*key).and_then(Value::as_str))
        .map_or(FaithChange::Neutral, FaithChange::from_label);

    Reaction {
        interpretation: text(&["interpretation"]),
        inner_conflict: text(&["innerConflict", "inner_conflict"]),
        faith_change,
        new_thought: text(&["newThought", "new_thought"]),
    }
}

/// Deterministic reaction used when generation is unavailable or failed.
///
/// Agents with faith strictly above `devout_threshold` react as believers.
pub fn fallback_reaction(faith: u8, oracle_type: OracleType, devout_threshold: u8) -> Reaction {
    let devout = faith > devout_threshold;
    let (interpretation, faith_change, new_thought) = match (oracle_type, devout) {
        (OracleType::HolyLight, true) => (
            "Holy light! A gift from the gods!",
            FaithChange::Increase,
            "I can feel the divine presence...",
        ),
        (OracleType::HolyLight, false) => (
            "What was that light... probably just the weather.",
            FaithChange::SlightIncrease,
            "Strange phenomenon...",
        ),
        (OracleType::Message, true) => (
            "The words of the gods reach my heart...",
            FaithChange::SlightIncrease,
            "I will keep this revelation close...",
        ),
        (OracleType::Message, false) => (
            "More of that mystical nonsense...",
            FaithChange::Neutral,
            "Just a coincidence...",
        ),
    };
    Reaction {
        interpretation: interpretation.to_owned(),
        inner_conflict: String::new(),
        faith_change,
        new_thought: new_thought.to_owned(),
    }
}
