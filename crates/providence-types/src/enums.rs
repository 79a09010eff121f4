//! Enumeration types for the Providence simulation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::AgentId;

// ---------------------------------------------------------------------------
// Oracles
// ---------------------------------------------------------------------------

/// Kind of intervention the player can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum OracleType {
    /// A spoken message delivered to one agent or the whole town.
    Message,
    /// A burst of holy light seen by everyone.
    HolyLight,
}

impl OracleType {
    /// Wire label of this oracle type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::HolyLight => "holy_light",
        }
    }
}

impl fmt::Display for OracleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who an oracle is addressed to.
///
/// Serialized as the string `"all"` or the target agent's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OracleTarget {
    /// Every agent in the town.
    All,
    /// A single named agent.
    Agent(AgentId),
}

impl OracleTarget {
    /// Whether the given agent is addressed by this target.
    pub fn includes(&self, agent: &AgentId) -> bool {
        match self {
            Self::All => true,
            Self::Agent(id) => id == agent,
        }
    }
}

impl From<&str> for OracleTarget {
    fn from(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Agent(AgentId::from(trimmed))
        }
    }
}

impl From<String> for OracleTarget {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl From<OracleTarget> for String {
    fn from(target: OracleTarget) -> Self {
        match target {
            OracleTarget::All => "all".to_owned(),
            OracleTarget::Agent(id) => id.0,
        }
    }
}

impl FromStr for OracleTarget {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for OracleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Agent(id) => write!(f, "{id}"),
        }
    }
}

/// Qualitative faith reaction label produced by the generation service.
///
/// Each label maps to a fixed signed delta. Raw strings are decoded into
/// this enum at the validation boundary and never travel further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum FaithChange {
    /// +15
    StrongIncrease,
    /// +8
    Increase,
    /// +3
    SlightIncrease,
    /// 0
    Neutral,
    /// -3
    SlightDecrease,
    /// -8
    Decrease,
    /// -15
    StrongDecrease,
}

impl FaithChange {
    /// Every label, strongest increase first.
    pub const ALL: [Self; 7] = [
        Self::StrongIncrease,
        Self::Increase,
        Self::SlightIncrease,
        Self::Neutral,
        Self::SlightDecrease,
        Self::Decrease,
        Self::StrongDecrease,
    ];

    /// Signed faith delta for this label.
    pub const fn delta(self) -> i32 {
        match self {
            Self::StrongIncrease => 15,
            Self::Increase => 8,
            Self::SlightIncrease => 3,
            Self::Neutral => 0,
            Self::SlightDecrease => -3,
            Self::Decrease => -8,
            Self::StrongDecrease => -15,
        }
    }

    /// Wire label, e.g. `"SLIGHT_INCREASE"`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::StrongIncrease => "STRONG_INCREASE",
            Self::Increase => "INCREASE",
            Self::SlightIncrease => "SLIGHT_INCREASE",
            Self::Neutral => "NEUTRAL",
            Self::SlightDecrease => "SLIGHT_DECREASE",
            Self::Decrease => "DECREASE",
            Self::StrongDecrease => "STRONG_DECREASE",
        }
    }

    /// Decode a label leniently. Unknown labels are [`FaithChange::Neutral`].
    pub fn from_label(raw: &str) -> Self {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|change| change.label().eq_ignore_ascii_case(wanted))
            .unwrap_or(Self::Neutral)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Clock speed multiplier.
///
/// Serialized as the bare multiplier (`1`, `2` or `4`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Speed {
    /// Real-time cadence.
    #[default]
    X1,
    /// Twice as fast.
    X2,
    /// Four times as fast.
    X4,
}

impl Speed {
    /// Numeric multiplier applied to the tick rate.
    pub const fn multiplier(self) -> u32 {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }

    /// Next speed in the 1, 2, 4 cycle.
    pub const fn cycle(self) -> Self {
        match self {
            Self::X1 => Self::X2,
            Self::X2 => Self::X4,
            Self::X4 => Self::X1,
        }
    }
}

/// A speed multiplier outside the supported set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSpeed(pub u8);

impl fmt::Display for InvalidSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported speed multiplier {} (expected 1, 2 or 4)", self.0)
    }
}

impl std::error::Error for InvalidSpeed {}

impl TryFrom<u8> for Speed {
    type Error = InvalidSpeed;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::X1),
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            other => Err(InvalidSpeed(other)),
        }
    }
}

impl From<Speed> for u8 {
    fn from(speed: Speed) -> Self {
        match speed {
            Speed::X1 => 1,
            Speed::X2 => 2,
            Speed::X4 => 4,
        }
    }
}

/// Coarse time-of-day bucket used to pick routine thoughts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DayPhase {
    /// 22:00 through 05:59.
    Night,
    /// 06:00 through 09:59.
    Morning,
    /// 18:00 through 21:59.
    Evening,
    /// Any other daytime hour.
    Other,
}

impl DayPhase {
    /// Bucket for an hour of the day.
    pub const fn from_hour(hour: u8) -> Self {
        match hour {
            6..=9 => Self::Morning,
            18..=21 => Self::Evening,
            10..=17 => Self::Other,
            _ => Self::Night,
        }
    }
}

/// Whether the clock driver is currently ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ClockState {
    /// No tick task is running.
    Stopped,
    /// A tick task is advancing the hour.
    Running,
}

// ---------------------------------------------------------------------------
// Schedule and loading
// ---------------------------------------------------------------------------

/// Where the currently installed day schedule came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ScheduleOrigin {
    /// Built from the static routine tables.
    #[default]
    Skeleton,
    /// Skeleton overlaid with a generated day script.
    Generated,
}

/// Long-running work shown in the loading indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LoadingTask {
    /// A day schedule is being generated.
    GeneratingScript,
    /// An oracle is waiting on the generation service.
    ProcessingOracle,
}
