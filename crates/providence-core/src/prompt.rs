//! Prompt rendering via `minijinja`.
//!
//! Two templates ship inside the crate: `daily_schedule` asks for the rest
//! of a day's plan, `oracle` asks how the town reacts to an intervention.
//! Operators can point `generation.templates_dir` at a directory holding
//! replacements with the same file names; files that are missing there fall
//! back to the built-in text.

use std::path::Path;

use minijinja::Environment;
use providence_types::{
    FaithChange, HOURS_PER_DAY, MemoryEntry, Oracle, OracleTarget, OracleType, SimulationState,
};
use serde::Serialize;

use crate::cast::{self, CastMember, LOCATIONS};
use crate::error::PromptError;

const DAILY_SCHEDULE: &str = "daily_schedule";
const ORACLE: &str = "oracle";

const TEMPLATES: [(&str, &str, &str); 2] = [
    (
        DAILY_SCHEDULE,
        "daily_schedule.j2",
        include_str!("../templates/daily_schedule.j2"),
    ),
    (ORACLE, "oracle.j2", include_str!("../templates/oracle.j2")),
];

/// Memories shown per agent.
pub const PROMPT_MEMORY_DEPTH: usize = 3;

/// Renders generation prompts.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Engine over the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if a built-in template fails to
    /// compile.
    pub fn embedded() -> Result<Self, PromptError> {
        let mut env = Environment::new();
        for (name, _, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Engine preferring templates found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Io`] if an existing file cannot be read, or
    /// [`PromptError::Template`] if a template fails to compile.
    pub fn with_overrides(dir: &Path) -> Result<Self, PromptError> {
        let mut env = Environment::new();
        for (name, file, source) in TEMPLATES {
            let path = dir.join(file);
            if path.is_file() {
                let text = std::fs::read_to_string(&path).map_err(|source| PromptError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                env.add_template_owned(name, text)?;
            } else {
                env.add_template(name, source)?;
            }
        }
        Ok(Self { env })
    }

    /// Engine for an optional override directory.
    ///
    /// # Errors
    ///
    /// See [`with_overrides`](Self::with_overrides).
    pub fn from_templates_dir(dir: Option<&str>) -> Result<Self, PromptError> {
        dir.map_or_else(Self::embedded, |dir| Self::with_overrides(Path::new(dir)))
    }

    /// Prompt for the remainder of the current day.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] on a render failure.
    pub fn render_daily_schedule(&self, context: &PromptContext) -> Result<String, PromptError> {
        Ok(self.env.get_template(DAILY_SCHEDULE)?.render(context)?)
    }

    /// Prompt for the town's reaction to an oracle. `context.oracle` must be
    /// set for the oracle section to render.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] on a render failure.
    pub fn render_oracle(&self, context: &PromptContext) -> Result<String, PromptError> {
        Ok(self.env.get_template(ORACLE)?.render(context)?)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a template can see.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// Current day.
    pub day: u32,
    /// Current hour.
    pub current_hour: u8,
    /// Hours left including the current one.
    pub remaining_hours: u8,
    /// Live agent states.
    pub agents: Vec<AgentBrief>,
    /// Static cast profiles.
    pub profiles: Vec<&'static CastMember>,
    /// Locations and their actions.
    pub locations: Vec<LocationBrief>,
    /// Reaction labels the service may answer with.
    pub faith_labels: Vec<&'static str>,
    /// The oracle being reacted to, if any.
    pub oracle: Option<OracleBrief>,
}

/// One agent as the generation service sees it.
#[derive(Debug, Clone, Serialize)]
pub struct AgentBrief {
    /// Agent id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Current location id.
    pub location: String,
    /// Current action id.
    pub action: String,
    /// Current faith.
    pub faith: u8,
    /// Most recent memories, already formatted.
    pub memories: Vec<String>,
}

/// One location as the generation service sees it.
#[derive(Debug, Clone, Serialize)]
pub struct LocationBrief {
    /// Location id.
    pub id: &'static str,
    /// Display name.
    pub display_name: &'static str,
    /// What the place is for.
    pub description: &'static str,
    /// Valid actions.
    pub actions: &'static [&'static str],
}

/// The oracle as the generation service sees it.
#[derive(Debug, Clone, Serialize)]
pub struct OracleBrief {
    /// "divine message" or "holy light".
    pub kind: &'static str,
    /// Addressee, in words.
    pub target: String,
    /// Spoken words, for messages.
    pub message: Option<String>,
}

impl PromptContext {
    /// Context for the current moment of `state`.
    pub fn from_state(state: &SimulationState) -> Self {
        let current_hour = state.time.hour;
        Self {
            day: state.time.day,
            current_hour,
            remaining_hours: HOURS_PER_DAY.saturating_sub(current_hour),
            agents: state
                .agents
                .values()
                .map(|agent| AgentBrief {
                    id: agent.id.to_string(),
                    display_name: agent.display_name.clone(),
                    location: agent.location.to_string(),
                    action: agent.action.to_string(),
                    faith: agent.faith,
                    memories: agent
                        .recent_memories(PROMPT_MEMORY_DEPTH)
                        .iter()
                        .map(describe_memory)
                        .collect(),
                })
                .collect(),
            profiles: cast::CAST.iter().collect(),
            locations: LOCATIONS
                .iter()
                .map(|spec| LocationBrief {
                    id: spec.id,
                    display_name: spec.display_name,
                    description: spec.description,
                    actions: spec.actions,
                })
                .collect(),
            faith_labels: FaithChange::ALL.iter().map(|change| change.label()).collect(),
            oracle: None,
        }
    }

    /// Attach the oracle being reacted to.
    #[must_use]
    pub fn with_oracle(mut self, oracle: &Oracle) -> Self {
        let target = match &oracle.target {
            OracleTarget::All => "everyone in town".to_owned(),
            OracleTarget::Agent(id) => self
                .agents
                .iter()
                .find(|agent| agent.id == id.as_str())
                .map_or_else(|| id.to_string(), |agent| agent.display_name.clone()),
        };
        self.oracle = Some(OracleBrief {
            kind: match oracle.oracle_type {
                OracleType::Message => "divine message",
                OracleType::HolyLight => "holy light",
            },
            target,
            message: oracle.message.clone(),
        });
        self
    }
}

fn describe_memory(memory: &MemoryEntry) -> String {
    match memory {
        MemoryEntry::Oracle {
            message,
            interpretation,
            faith_delta,
            timestamp,
            ..
        } => format!(
            "[Day {}] received oracle \"{}\", understood as \"{interpretation}\" (faith {faith_delta:+})",
            timestamp.day,
            message.as_deref().unwrap_or("holy light"),
        ),
    }
}
