//! Error types for the simulation core.

/// Reasons an oracle intervention was refused or abandoned.
///
/// Every variant except [`Stale`](OracleError::Stale) is raised before any
/// state is touched, so a refused oracle costs nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Not enough power for the oracle's cost.
    #[error("insufficient power: {required} required, {available} available")]
    InsufficientPower {
        /// Cost of the oracle.
        required: u32,
        /// Power on hand.
        available: u32,
    },

    /// Another oracle is still being processed.
    #[error("another oracle is already being processed")]
    Busy,

    /// The game has ended.
    #[error("the simulation is over")]
    SimulationOver,

    /// The target names no agent in town.
    #[error("unknown target agent: {0}")]
    UnknownTarget(String),

    /// A message oracle with nothing to say.
    #[error("oracle message is empty")]
    EmptyMessage,

    /// The simulation was reset while reactions were being generated; the
    /// results were discarded.
    #[error("the simulation was reset while the oracle was processed")]
    Stale,
}

/// Errors loading or rendering prompt templates.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// An override template could not be read.
    #[error("failed to read template {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A template failed to compile or render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}
