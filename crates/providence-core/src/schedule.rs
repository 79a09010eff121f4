//! Day schedules: the skeleton built from routines, generated overlays, and
//! partial merges.
//!
//! [`ScheduleSystem`] keeps the authoritative copy of the installed day and
//! is the only writer of the store's `schedule` slice. Every agent it knows
//! always has a full 24-entry plan.

use std::collections::BTreeMap;

use providence_types::{
    AgentId, DaySchedule, PartialSchedule, ScheduleEntry, ScheduleOrigin, ScheduleState,
};
use tracing::debug;

use crate::cast::{CAST, CastMember, RoutineSlot};
use crate::routine;
use crate::store::{AgentUpdate, StateStore};

/// Owner of the installed day schedule.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSystem {
    current: ScheduleState,
}

impl ScheduleSystem {
    /// Empty system. Nothing is installed until the first `install_*` call.
    pub fn new() -> Self {
        Self::default()
    }

    /// The installed schedule.
    pub const fn current(&self) -> &ScheduleState {
        &self.current
    }

    /// Routine-derived plans for the whole cast.
    pub fn generate_skeleton() -> BTreeMap<AgentId, DaySchedule> {
        CAST.iter()
            .map(|member| (AgentId::from(member.id), skeleton_for(member)))
            .collect()
    }

    /// Install the skeleton for `day`.
    pub fn install_skeleton(&mut self, day: u32, store: &mut StateStore) {
        self.install(
            ScheduleState {
                day,
                origin: ScheduleOrigin::Skeleton,
                agents: Self::generate_skeleton(),
            },
            store,
        );
    }

    /// Install a generated day: the skeleton with every generated entry laid
    /// over it. Agents missing from the skeleton are ignored.
    pub fn install_generated(
        &mut self,
        day: u32,
        generated: &PartialSchedule,
        store: &mut StateStore,
    ) {
        let mut agents = Self::generate_skeleton();
        let replaced = overlay(&mut agents, generated, 0);
        debug!(day, replaced, "Generated day schedule laid over skeleton");
        self.install(
            ScheduleState {
                day,
                origin: ScheduleOrigin::Generated,
                agents,
            },
            store,
        );
    }

    fn install(&mut self, schedule: ScheduleState, store: &mut StateStore) {
        self.current = schedule;
        store.set_schedule(self.current.clone());
    }

    /// Replace entries at `from_hour` and later with the supplied ones,
    /// matched by hour. Earlier hours and absent agents are untouched.
    /// Returns the number of entries replaced.
    pub fn merge_partial(
        &mut self,
        partial: &PartialSchedule,
        from_hour: u8,
        store: &mut StateStore,
    ) -> usize {
        let replaced = overlay(&mut self.current.agents, partial, from_hour);
        store.set_schedule(self.current.clone());
        replaced
    }

    /// Move every scheduled agent to its entry for `hour`.
    pub fn apply_for_hour(&self, hour: u8, store: &mut StateStore) {
        for (agent, schedule) in &self.current.agents {
            let Some(entry) = schedule.entry(hour) else {
                continue;
            };
            store.update_agent(
                agent,
                AgentUpdate {
                    location: Some(entry.location.clone()),
                    action: Some(entry.action.clone()),
                    thought: Some(Some(entry.thought.clone())),
                    ..AgentUpdate::default()
                },
            );
        }
    }
}

fn skeleton_for(member: &CastMember) -> DaySchedule {
    DaySchedule::from_fn(|hour| {
        let slot = routine::resolve(member.routine, hour).unwrap_or(RoutineSlot {
            hour,
            location: member.initial_location,
            action: member.initial_action,
        });
        ScheduleEntry {
            hour,
            location: slot.location.into(),
            action: slot.action.into(),
            thought: routine::routine_thought(member.id, slot.action, slot.location, hour)
                .to_owned(),
        }
    })
}

fn overlay(
    agents: &mut BTreeMap<AgentId, DaySchedule>,
    partial: &PartialSchedule,
    from_hour: u8,
) -> usize {
    let mut replaced = 0_usize;
    for (agent, entries) in partial {
        let Some(schedule) = agents.get_mut(agent) else {
            continue;
        };
        for entry in entries.iter().filter(|entry| entry.hour >= from_hour) {
            if schedule.replace(entry.clone()) {
                replaced = replaced.saturating_add(1);
            }
        }
    }
    replaced
}
