//! Shared type definitions for the Providence simulation.
//!
//! This crate is the single source of truth for the data model shared by
//! the core engine, the generation backends, and the observer API. Types
//! flow downstream to `TypeScript` via `ts-rs` for the external renderer.
//!
//! # Modules
//!
//! - [`ids`] -- Slug identifiers for agents, locations, and actions
//! - [`enums`] -- Oracle, faith, clock, and loading enumerations
//! - [`structs`] -- Agents, schedules, oracles, and the root state aggregate

pub mod enums;
pub mod ids;
pub mod structs;

pub use enums::{
    ClockState, DayPhase, FaithChange, InvalidSpeed, LoadingTask, OracleTarget, OracleType,
    ScheduleOrigin, Speed,
};
pub use ids::{ActionId, AgentId, LocationId, OracleId};
pub use structs::{
    Agent, DaySchedule, FaithState, HOURS_PER_DAY, IncompleteSchedule, LoadingState, Location,
    MAX_AGENT_FAITH, MEMORY_CAPACITY, MemoryEntry, Oracle, PartialSchedule, Personality,
    PowerState, Reaction, Rect, ScheduleEntry, ScheduleState, SimulationState, TerminalState,
    TimeState, Timestamp,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the renderer.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::AgentId::export_all();
        let _ = crate::ids::LocationId::export_all();
        let _ = crate::ids::ActionId::export_all();
        let _ = crate::ids::OracleId::export_all();

        // Enums
        let _ = crate::enums::OracleType::export_all();
        let _ = crate::enums::FaithChange::export_all();
        let _ = crate::enums::DayPhase::export_all();
        let _ = crate::enums::ClockState::export_all();
        let _ = crate::enums::ScheduleOrigin::export_all();
        let _ = crate::enums::LoadingTask::export_all();

        // Structs
        let _ = crate::structs::Timestamp::export_all();
        let _ = crate::structs::TimeState::export_all();
        let _ = crate::structs::Personality::export_all();
        let _ = crate::structs::MemoryEntry::export_all();
        let _ = crate::structs::Agent::export_all();
        let _ = crate::structs::Rect::export_all();
        let _ = crate::structs::Location::export_all();
        let _ = crate::structs::ScheduleEntry::export_all();
        let _ = crate::structs::ScheduleState::export_all();
        let _ = crate::structs::Oracle::export_all();
        let _ = crate::structs::Reaction::export_all();
        let _ = crate::structs::FaithState::export_all();
        let _ = crate::structs::PowerState::export_all();
        let _ = crate::structs::LoadingState::export_all();
        let _ = crate::structs::TerminalState::export_all();
        let _ = crate::structs::SimulationState::export_all();
    }
}
