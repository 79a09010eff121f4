//! The simulation context: store, schedule, clock driver, and the oracle
//! pipeline behind one shareable value.
//!
//! # Architecture
//!
//! A [`Simulation`] is built once and shared as `Arc<Simulation<G>>`. The
//! [`StateStore`] and [`ScheduleSystem`] sit behind a single mutex that is
//! only ever held inside synchronous sections; every `.await` on the
//! generation service happens with the lock released, so the clock and the
//! observer keep running on the prior state while a request is pending.
//!
//! Work that suspends re-validates when it resumes: a day schedule is
//! discarded if the day, session, or terminal status moved underneath it,
//! and an oracle is discarded if the simulation was reset.
//!
//! Everything observable is also published on a `broadcast` channel of
//! [`SimulationEvent`]s, including every store notification.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use providence_types::{
    AgentId, ClockState, LoadingTask, MemoryEntry, Oracle, OracleId, OracleTarget, OracleType,
    Reaction, ScheduleOrigin, SimulationState, Speed,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::{self, HourAdvance};
use crate::config::GameConfig;
use crate::error::{OracleError, PromptError};
use crate::generation::{ContentGenerator, GenerationOptions};
use crate::prompt::{PromptContext, PromptEngine};
use crate::schedule::ScheduleSystem;
use crate::store::{AgentUpdate, FaithApplied, StateChange, StateStore, TerminalOutcome};
use crate::validator::{self, OracleResponse, ValidationRules};

/// Capacity of the event channel. Slow receivers skip ahead.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something observers may want to know about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimulationEvent {
    /// A store slice changed.
    StateChanged {
        /// The change.
        change: StateChange,
    },
    /// The clock advanced.
    HourChanged {
        /// Current day.
        day: u32,
        /// New hour.
        hour: u8,
    },
    /// The clock crossed midnight.
    DayChanged {
        /// The new day.
        day: u32,
    },
    /// A day schedule was installed.
    DayScheduleInstalled {
        /// Day it covers.
        day: u32,
        /// Skeleton or generated.
        origin: ScheduleOrigin,
    },
    /// An oracle finished processing.
    OracleCompleted {
        /// What happened.
        outcome: OracleOutcome,
    },
    /// The game ended.
    Terminal {
        /// Victory or defeat.
        outcome: TerminalOutcome,
        /// Global faith at the end.
        global_faith: i32,
    },
    /// The clock driver started or stopped.
    ClockStatusChanged {
        /// New driver state.
        status: ClockState,
        /// Speed in effect.
        speed: Speed,
    },
}

/// Result of a processed oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleOutcome {
    /// The oracle as issued.
    pub oracle: Oracle,
    /// Reaction of every targeted agent.
    pub reactions: BTreeMap<AgentId, Reaction>,
    /// Faith delta that actually took effect, after clamping.
    pub faith_deltas: BTreeMap<AgentId, i32>,
    /// Whether reactions came from the generation service.
    pub used_generation: bool,
    /// Set if this oracle ended the game.
    pub terminal: Option<TerminalOutcome>,
}

/// Result of a day-schedule generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayScheduleOutcome {
    /// A generated schedule was installed over the skeleton.
    Generated {
        /// Day it covers.
        day: u32,
        /// Validated entries laid over the skeleton.
        entries: usize,
    },
    /// The skeleton serves: no service, a failed request, or nothing usable.
    Skeleton {
        /// Day it covers.
        day: u32,
    },
    /// Another request was already in flight.
    AlreadyPending,
    /// The day, session, or terminal status changed while waiting.
    Discarded,
}

struct World {
    store: StateStore,
    schedule: ScheduleSystem,
}

#[derive(Default)]
struct ClockDriver {
    run: u64,
    task: Option<JoinHandle<()>>,
}

/// Clears an in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Holds a slot for one store session; a later session may take it over.
/// The slot stores `session + 1`, zero when free.
struct SessionSlot<'a> {
    slot: &'a AtomicU64,
    owner: u64,
}

impl<'a> SessionSlot<'a> {
    fn acquire(slot: &'a AtomicU64, session: u64) -> Option<Self> {
        let owner = session.checked_add(1)?;
        slot.fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
            (held < owner).then_some(owner)
        })
        .ok()
        .map(|_| Self { slot, owner })
    }
}

impl Drop for SessionSlot<'_> {
    fn drop(&mut self) {
        let _ = self
            .slot
            .compare_exchange(self.owner, 0, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// An oracle that passed the gate and paid its cost.
struct GatedOracle {
    oracle: Oracle,
    session: u64,
    targets: Vec<AgentId>,
    prompt: Option<String>,
}

/// A running simulation.
pub struct Simulation<G> {
    config: GameConfig,
    rules: ValidationRules,
    options: GenerationOptions,
    generator: G,
    prompts: PromptEngine,
    world: Mutex<World>,
    driver: Mutex<ClockDriver>,
    events: broadcast::Sender<SimulationEvent>,
    oracle_in_flight: AtomicBool,
    day_generation_in_flight: AtomicU64,
}

impl<G> core::fmt::Debug for Simulation<G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("oracle_in_flight", &self.oracle_in_flight)
            .field("day_generation_in_flight", &self.day_generation_in_flight)
            .finish_non_exhaustive()
    }
}

impl<G: ContentGenerator> Simulation<G> {
    /// Build a simulation at the start of day 1 with the skeleton installed.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] if override templates cannot be loaded.
    pub fn new(config: GameConfig, generator: G) -> Result<Self, PromptError> {
        let prompts = PromptEngine::from_templates_dir(config.generation.templates_dir.as_deref())?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut store = StateStore::new(&config);
        let forward = events.clone();
        store.subscribe(Box::new(move |change, _| {
            // No receivers is not an error.
            let _ = forward.send(SimulationEvent::StateChanged {
                change: change.clone(),
            });
        }));
        let mut schedule = ScheduleSystem::new();
        schedule.install_skeleton(store.time().day, &mut store);

        Ok(Self {
            rules: ValidationRules::from_config(&config.generation),
            options: GenerationOptions::from_config(&config.generation),
            config,
            generator,
            prompts,
            world: Mutex::new(World { store, schedule }),
            driver: Mutex::new(ClockDriver::default()),
            events,
            oracle_in_flight: AtomicBool::new(false),
            day_generation_in_flight: AtomicU64::new(0),
        })
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn driver(&self) -> MutexGuard<'_, ClockDriver> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SimulationEvent) {
        let _ = self.events.send(event);
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    /// The configuration this simulation was built from.
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The generation service.
    pub const fn generator(&self) -> &G {
        &self.generator
    }

    /// A new receiver for simulation events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SimulationEvent> {
        self.events.subscribe()
    }

    /// A copy of the whole state.
    pub fn snapshot(&self) -> SimulationState {
        self.world().store.state().clone()
    }

    /// Read the store under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&StateStore) -> R) -> R {
        f(&self.world().store)
    }

    /// Mutate the store directly, bypassing the clock and oracle guards.
    /// Meant for operators and tests.
    pub fn update_store<R>(&self, f: impl FnOnce(&mut StateStore) -> R) -> R {
        f(&mut self.world().store)
    }

    /// Highlight an agent, or clear the highlight. Returns `false` for an
    /// unknown agent.
    pub fn select_agent(&self, agent: Option<AgentId>) -> bool {
        let mut world = self.world();
        if let Some(id) = &agent
            && world.store.agent(id.as_str()).is_none()
        {
            return false;
        }
        world.store.set_selection(agent);
        true
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// One clock step: advance the hour, install a fresh skeleton on a new
    /// day, and move every agent to its planned entry.
    ///
    /// Does not request a generated schedule; see [`advance`](Self::advance).
    pub fn tick(&self) -> HourAdvance {
        let advance = {
            let mut world = self.world();
            let World { store, schedule } = &mut *world;
            let advance = clock::advance_hour(store, self.config.power.regen_per_hour);
            if let HourAdvance::Advanced {
                day,
                hour,
                day_changed,
            } = advance
            {
                if day_changed {
                    schedule.install_skeleton(day, store);
                }
                schedule.apply_for_hour(hour, store);
            }
            advance
        };

        if let HourAdvance::Advanced {
            day,
            hour,
            day_changed,
        } = advance
        {
            self.publish(SimulationEvent::HourChanged { day, hour });
            if day_changed {
                info!(day, "New day began");
                self.publish(SimulationEvent::DayChanged { day });
                self.publish(SimulationEvent::DayScheduleInstalled {
                    day,
                    origin: ScheduleOrigin::Skeleton,
                });
            }
        }
        advance
    }

    /// [`tick`](Self::tick), then on a new day wait for the generated
    /// schedule.
    pub async fn advance(&self) -> HourAdvance {
        let advance = self.tick();
        if matches!(advance, HourAdvance::Advanced { day_changed: true, .. }) {
            self.regenerate_day_schedule().await;
        }
        advance
    }

    /// Whether the clock driver is running.
    pub fn clock_status(&self) -> ClockState {
        if self.driver().task.is_some() {
            ClockState::Running
        } else {
            ClockState::Stopped
        }
    }

    /// Unpause time and start the driver. No-op while running or once the
    /// game is over.
    pub fn start_clock(self: &Arc<Self>) -> ClockState {
        let mut driver = self.driver();
        if driver.task.is_some() {
            return ClockState::Running;
        }
        let speed = {
            let mut world = self.world();
            if world.store.is_terminal() {
                return ClockState::Stopped;
            }
            world.store.set_paused(false);
            world.store.time().speed
        };
        self.spawn_driver(&mut driver, speed);
        drop(driver);
        info!(speed = u8::from(speed), "Clock started");
        self.publish(SimulationEvent::ClockStatusChanged {
            status: ClockState::Running,
            speed,
        });
        ClockState::Running
    }

    /// Alias for [`start_clock`](Self::start_clock).
    pub fn resume(self: &Arc<Self>) -> ClockState {
        self.start_clock()
    }

    /// Pause time and stop the driver. No-op while stopped.
    pub fn pause(&self) -> ClockState {
        let mut driver = self.driver();
        let Some(task) = driver.task.take() else {
            return ClockState::Stopped;
        };
        task.abort();
        let speed = {
            let mut world = self.world();
            world.store.set_paused(true);
            world.store.time().speed
        };
        drop(driver);
        info!("Clock paused");
        self.publish(SimulationEvent::ClockStatusChanged {
            status: ClockState::Stopped,
            speed,
        });
        ClockState::Stopped
    }

    /// Pause if running, otherwise start.
    pub fn toggle_pause(self: &Arc<Self>) -> ClockState {
        match self.clock_status() {
            ClockState::Running => self.pause(),
            ClockState::Stopped => self.start_clock(),
        }
    }

    /// Change speed. A running driver restarts at the new cadence without
    /// losing the current hour.
    pub fn set_speed(self: &Arc<Self>, speed: Speed) {
        let mut driver = self.driver();
        self.world().store.set_speed(speed);
        let status = if let Some(task) = driver.task.take() {
            task.abort();
            self.spawn_driver(&mut driver, speed);
            ClockState::Running
        } else {
            ClockState::Stopped
        };
        drop(driver);
        debug!(speed = u8::from(speed), "Clock speed changed");
        self.publish(SimulationEvent::ClockStatusChanged { status, speed });
    }

    /// Step to the next speed (1, 2, 4, back to 1). Returns the new speed.
    pub fn cycle_speed(self: &Arc<Self>) -> Speed {
        let next = self.read(|store| store.time().speed).cycle();
        self.set_speed(next);
        next
    }

    fn spawn_driver(self: &Arc<Self>, driver: &mut ClockDriver, speed: Speed) {
        driver.run = driver.run.wrapping_add(1);
        let run = driver.run;
        let period = clock::tick_interval(self.config.time.ms_per_game_hour, speed);
        let simulation = Arc::clone(self);
        driver.task = Some(tokio::spawn(simulation.drive(run, period)));
    }

    async fn drive(self: Arc<Self>, run: u64, period: Duration) {
        let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.tick() {
                HourAdvance::Advanced {
                    day_changed: true, ..
                } => {
                    let simulation = Arc::clone(&self);
                    tokio::spawn(async move {
                        simulation.regenerate_day_schedule().await;
                    });
                }
                HourAdvance::Advanced { .. } => {}
                HourAdvance::Skipped | HourAdvance::Halted => break,
            }
        }
        self.driver_finished(run);
    }

    fn driver_finished(&self, run: u64) {
        let mut driver = self.driver();
        if driver.run != run || driver.task.is_none() {
            return;
        }
        driver.task = None;
        drop(driver);
        let speed = self.read(|store| store.time().speed);
        debug!(run, "Clock driver stopped");
        self.publish(SimulationEvent::ClockStatusChanged {
            status: ClockState::Stopped,
            speed,
        });
    }

    fn halt_clock(&self) {
        let mut driver = self.driver();
        if let Some(task) = driver.task.take() {
            task.abort();
            drop(driver);
            let speed = self.read(|store| store.time().speed);
            self.publish(SimulationEvent::ClockStatusChanged {
                status: ClockState::Stopped,
                speed,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Day schedules
    // -----------------------------------------------------------------------

    /// Install today's skeleton, move agents to the current hour, then try
    /// for a generated schedule.
    pub async fn initialize_day_schedule(&self) -> DayScheduleOutcome {
        let day = {
            let mut world = self.world();
            let World { store, schedule } = &mut *world;
            let time = store.time();
            schedule.install_skeleton(time.day, store);
            schedule.apply_for_hour(time.hour, store);
            time.day
        };
        self.publish(SimulationEvent::DayScheduleInstalled {
            day,
            origin: ScheduleOrigin::Skeleton,
        });
        self.regenerate_day_schedule().await
    }

    /// Ask the generation service for the rest of today and lay the answer
    /// over the skeleton. At most one request per session is in flight; the
    /// skeleton serves until the answer arrives, and keeps serving if it
    /// fails.
    pub async fn regenerate_day_schedule(&self) -> DayScheduleOutcome {
        let (day, session) = self.read(|store| (store.time().day, store.session()));
        if !self.generator.available() {
            debug!(day, "Generation unavailable, skeleton schedule serves");
            return DayScheduleOutcome::Skeleton { day };
        }
        let in_flight = SessionSlot::acquire(&self.day_generation_in_flight, session);
        let Some(_in_flight) = in_flight else {
            debug!(day, "Day schedule generation already pending");
            return DayScheduleOutcome::AlreadyPending;
        };

        let prompt = {
            let mut world = self.world();
            if world.store.is_terminal() {
                return DayScheduleOutcome::Discarded;
            }
            world.store.start_loading(LoadingTask::GeneratingScript);
            self.prompts
                .render_daily_schedule(&PromptContext::from_state(world.store.state()))
        };
        let generated = match prompt {
            Ok(prompt) => self
                .generator
                .generate_structured(&prompt, self.options)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        let mut world = self.world();
        let World { store, schedule } = &mut *world;
        if store.session() == session {
            store.finish_loading(LoadingTask::GeneratingScript);
        }
        if store.session() != session || store.time().day != day || store.is_terminal() {
            debug!(day, "Discarding day schedule generated for a stale day");
            return DayScheduleOutcome::Discarded;
        }
        let partial = match generated {
            Ok(raw) => validator::validate_schedule(&raw, &self.rules),
            Err(e) => {
                warn!(day, error = %e, "Day schedule generation failed, skeleton serves");
                return DayScheduleOutcome::Skeleton { day };
            }
        };
        let entries = partial.values().map(Vec::len).sum::<usize>();
        if entries == 0 {
            warn!(day, "Generated day schedule had no usable entries, skeleton serves");
            return DayScheduleOutcome::Skeleton { day };
        }
        schedule.install_generated(day, &partial, store);
        schedule.apply_for_hour(store.time().hour, store);
        drop(world);

        info!(day, entries, "Generated day schedule installed");
        self.publish(SimulationEvent::DayScheduleInstalled {
            day,
            origin: ScheduleOrigin::Generated,
        });
        DayScheduleOutcome::Generated { day, entries }
    }

    // -----------------------------------------------------------------------
    // Oracles
    // -----------------------------------------------------------------------

    /// Power cost of an oracle type.
    pub const fn oracle_cost(&self, oracle_type: OracleType) -> u32 {
        match oracle_type {
            OracleType::Message => self.config.oracle.message_cost,
            OracleType::HolyLight => self.config.oracle.holy_light_cost,
        }
    }

    /// Whether current power covers an oracle type.
    pub fn can_afford(&self, oracle_type: OracleType) -> bool {
        self.read(|store| store.power().current >= self.oracle_cost(oracle_type))
    }

    /// Speak to one agent or the whole town.
    ///
    /// # Errors
    ///
    /// See [`OracleError`]. Every error but `Stale` leaves the state
    /// untouched.
    pub async fn send_message(
        &self,
        message: &str,
        target: OracleTarget,
    ) -> Result<OracleOutcome, OracleError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(OracleError::EmptyMessage);
        }
        self.deliver(OracleType::Message, Some(message.to_owned()), target)
            .await
    }

    /// Flood the town with holy light.
    ///
    /// # Errors
    ///
    /// See [`OracleError`].
    pub async fn cast_holy_light(&self) -> Result<OracleOutcome, OracleError> {
        self.deliver(OracleType::HolyLight, None, OracleTarget::All)
            .await
    }

    async fn deliver(
        &self,
        oracle_type: OracleType,
        message: Option<String>,
        target: OracleTarget,
    ) -> Result<OracleOutcome, OracleError> {
        let (_in_flight, gated) = self.gate(oracle_type, message, target)?;

        let response = match &gated.prompt {
            Some(prompt) => match self.generator.generate_structured(prompt, self.options).await {
                Ok(raw) => Some(validator::parse_oracle_response(&raw, &self.rules)),
                Err(e) => {
                    warn!(oracle_id = %gated.oracle.id, error = %e, "Oracle generation failed, using fallback reactions");
                    None
                }
            },
            None => None,
        };

        let outcome = self.apply_oracle(gated, response)?;
        if let Some(terminal) = outcome.terminal {
            self.halt_clock();
            let global_faith = self.read(|store| store.faith().global);
            self.publish(SimulationEvent::Terminal {
                outcome: terminal,
                global_faith,
            });
        }
        self.publish(SimulationEvent::OracleCompleted {
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    /// Validate, charge, and snapshot everything the request needs.
    fn gate(
        &self,
        oracle_type: OracleType,
        message: Option<String>,
        target: OracleTarget,
    ) -> Result<(InFlight<'_>, GatedOracle), OracleError> {
        let mut world = self.world();
        let store = &mut world.store;
        if store.is_terminal() {
            return Err(OracleError::SimulationOver);
        }
        let in_flight = InFlight::acquire(&self.oracle_in_flight).ok_or(OracleError::Busy)?;
        if let OracleTarget::Agent(id) = &target
            && store.agent(id.as_str()).is_none()
        {
            return Err(OracleError::UnknownTarget(id.to_string()));
        }

        let cost = self.oracle_cost(oracle_type);
        let available = store.power().current;
        if !store.consume_power(cost) {
            debug!(cost, available, "Oracle refused for lack of power");
            return Err(OracleError::InsufficientPower {
                required: cost,
                available,
            });
        }

        let targets = store
            .agents()
            .filter(|agent| target.includes(&agent.id))
            .map(|agent| agent.id.clone())
            .collect();
        let oracle = Oracle {
            id: OracleId::new(),
            oracle_type,
            message,
            target,
            timestamp: store.time().timestamp(),
        };
        store.start_loading(LoadingTask::ProcessingOracle);

        let prompt = if self.generator.available() {
            let context = PromptContext::from_state(store.state()).with_oracle(&oracle);
            match self.prompts.render_oracle(&context) {
                Ok(prompt) => Some(prompt),
                Err(e) => {
                    warn!(error = %e, "Oracle prompt failed to render, using fallback reactions");
                    None
                }
            }
        } else {
            None
        };

        info!(
            oracle_id = %oracle.id,
            oracle_type = %oracle.oracle_type,
            target = %oracle.target,
            cost,
            "Oracle issued"
        );
        Ok((
            in_flight,
            GatedOracle {
                oracle,
                session: store.session(),
                targets,
                prompt,
            },
        ))
    }

    /// Fold reactions into agents, merge any replacement schedule, and run
    /// the faith check.
    fn apply_oracle(
        &self,
        gated: GatedOracle,
        response: Option<OracleResponse>,
    ) -> Result<OracleOutcome, OracleError> {
        let mut world = self.world();
        let World { store, schedule } = &mut *world;
        store.finish_loading(LoadingTask::ProcessingOracle);
        if store.session() != gated.session {
            warn!(oracle_id = %gated.oracle.id, "Simulation reset during oracle, discarding reactions");
            return Err(OracleError::Stale);
        }

        let used_generation = response.is_some();
        let OracleResponse {
            reactions: mut generated,
            schedule: partial,
        } = response.unwrap_or_default();
        let oracle = gated.oracle;

        let mut reactions = BTreeMap::new();
        let mut requested = Vec::new();
        for id in gated.targets {
            let Some(faith) = store.agent(id.as_str()).map(|agent| agent.faith) else {
                continue;
            };
            let reaction = generated.remove(&id).unwrap_or_else(|| {
                if used_generation {
                    debug!(agent = %id, "No generated reaction for target, using fallback");
                }
                validator::fallback_reaction(
                    faith,
                    oracle.oracle_type,
                    self.config.faith.devout_threshold,
                )
            });
            let delta = reaction.faith_change.delta();
            store.update_agent(
                &id,
                AgentUpdate {
                    interpretation: Some(Some(reaction.interpretation.clone())),
                    thought: (!reaction.new_thought.is_empty())
                        .then(|| Some(reaction.new_thought.clone())),
                    remember: Some(MemoryEntry::Oracle {
                        oracle_type: oracle.oracle_type,
                        message: oracle.message.clone(),
                        interpretation: reaction.interpretation.clone(),
                        faith_delta: delta,
                        timestamp: oracle.timestamp,
                    }),
                    ..AgentUpdate::default()
                },
            );
            requested.push((id.clone(), delta));
            reactions.insert(id, reaction);
        }

        if !partial.is_empty() {
            if store.time().day == oracle.timestamp.day {
                let replaced = schedule.merge_partial(&partial, oracle.timestamp.hour, store);
                debug!(oracle_id = %oracle.id, replaced, "Oracle schedule merged");
            } else {
                debug!(oracle_id = %oracle.id, "Day ended during oracle, schedule merge skipped");
            }
        }

        let FaithApplied {
            applied: faith_deltas,
            terminal,
        } = store.apply_faith_deltas(&requested);
        info!(
            oracle_id = %oracle.id,
            used_generation,
            global_faith = store.faith().global,
            power = store.power().current,
            "Oracle processed"
        );
        Ok(OracleOutcome {
            oracle,
            reactions,
            faith_deltas,
            used_generation,
            terminal,
        })
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Stop the clock, restore the starting state, and reinstall the
    /// skeleton. In-flight generation results are discarded when they
    /// arrive. Callers wanting a generated day follow up with
    /// [`regenerate_day_schedule`](Self::regenerate_day_schedule).
    pub fn reset(&self) {
        let mut driver = self.driver();
        let was_running = match driver.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        };
        let (day, speed) = {
            let mut world = self.world();
            let World { store, schedule } = &mut *world;
            store.reset();
            let time = store.time();
            schedule.install_skeleton(time.day, store);
            schedule.apply_for_hour(time.hour, store);
            (time.day, time.speed)
        };
        drop(driver);
        info!("Simulation reset");
        if was_running {
            self.publish(SimulationEvent::ClockStatusChanged {
                status: ClockState::Stopped,
                speed,
            });
        }
        self.publish(SimulationEvent::DayScheduleInstalled {
            day,
            origin: ScheduleOrigin::Skeleton,
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use providence_types::{ActionId, LocationId};
    use tokio::sync::Notify;

    use super::*;
    use crate::generation::{DisabledGenerator, GenerationError};

    /// Answers from a queue, then reports itself unavailable.
    #[derive(Default)]
    struct Scripted {
        answers: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn answering(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| Ok((*a).to_owned())).collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ContentGenerator for Scripted {
        fn available(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: GenerationOptions,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationError::Unavailable))
        }
    }

    /// Holds every request until released.
    struct Gated {
        release: Notify,
        answer: String,
        calls: AtomicUsize,
    }

    impl Gated {
        fn new(answer: &str) -> Self {
            Self {
                release: Notify::new(),
                answer: answer.to_owned(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ContentGenerator for Gated {
        fn available(&self) -> bool {
            true
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _options: GenerationOptions,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(self.answer.clone())
        }
    }

    fn simulation<G: ContentGenerator>(generator: G) -> Arc<Simulation<G>> {
        Arc::new(Simulation::new(GameConfig::default(), generator).unwrap())
    }

    fn faith(sim: &Simulation<impl ContentGenerator>, id: &str) -> u8 {
        sim.read(|store| store.agent(id).unwrap().faith)
    }

    const ELARA_STRONG: &str = r#"{"reactions": {"elara": {
        "interpretation": "The gods answered me.",
        "innerConflict": "Am I worthy?",
        "faithChange": "STRONG_INCREASE",
        "newThought": "I must tell the others."
    }}}"#;

    #[tokio::test]
    async fn generated_reaction_updates_faith_power_and_memory() {
        let sim = simulation(Scripted::answering(&[ELARA_STRONG]));

        let outcome = sim
            .send_message("Be not afraid", OracleTarget::from("elara"))
            .await
            .unwrap();

        assert!(outcome.used_generation);
        assert_eq!(outcome.faith_deltas.get("elara"), Some(&15));
        assert!(!outcome.reactions.contains_key("sly"));
        assert_eq!(faith(&sim, "elara"), 95);
        assert_eq!(faith(&sim, "sly"), 20);
        sim.read(|store| {
            assert_eq!(store.power().current, 40);
            let elara = store.agent("elara").unwrap();
            assert_eq!(elara.memory.len(), 1);
            assert_eq!(elara.thought.as_deref(), Some("I must tell the others."));
            assert_eq!(elara.interpretation.as_deref(), Some("The gods answered me."));
            // round((95 + 20) / 2) = 58
            assert_eq!(store.faith().global, 58);
            assert!(!store.loading().active);
        });
    }

    #[tokio::test]
    async fn insufficient_power_leaves_state_untouched() {
        let sim = simulation(DisabledGenerator);
        sim.update_store(|store| store.set_power(19));
        let before = sim.snapshot();

        let err = sim.cast_holy_light().await.unwrap_err();

        assert_eq!(
            err,
            OracleError::InsufficientPower {
                required: 20,
                available: 19
            }
        );
        assert_eq!(sim.snapshot(), before);
        assert!(!sim.can_afford(OracleType::HolyLight));
        assert!(sim.can_afford(OracleType::Message));
    }

    #[tokio::test]
    async fn unavailable_generator_falls_back_for_every_target() {
        let sim = simulation(DisabledGenerator);

        let outcome = sim.cast_holy_light().await.unwrap();

        assert!(!outcome.used_generation);
        assert_eq!(outcome.reactions.len(), 2);
        assert_eq!(faith(&sim, "elara"), 88);
        assert_eq!(faith(&sim, "sly"), 23);
        assert_eq!(sim.read(|store| store.power().current), 30);
        assert!(outcome.oracle.message.is_none());
    }

    #[tokio::test]
    async fn targets_missing_from_the_answer_fall_back() {
        let sim = simulation(Scripted::answering(&[ELARA_STRONG]));

        let outcome = sim.send_message("Hear me", OracleTarget::All).await.unwrap();

        assert!(outcome.used_generation);
        assert_eq!(outcome.faith_deltas.get("elara"), Some(&15));
        // Sly is a skeptic: the fallback message reaction is neutral.
        assert_eq!(outcome.faith_deltas.get("sly"), Some(&0));
        assert_eq!(
            outcome.reactions.get("sly").unwrap().new_thought,
            "Just a coincidence..."
        );
    }

    #[tokio::test]
    async fn malformed_answer_falls_back() {
        let sim = simulation(Scripted::answering(&["The gods are silent today."]));
        let outcome = sim.cast_holy_light().await.unwrap();
        assert!(!outcome.used_generation);
        assert_eq!(sim.generator().calls(), 1);
        assert_eq!(faith(&sim, "elara"), 88);
    }

    #[tokio::test]
    async fn faith_is_clamped_and_applied_delta_reported() {
        let sim = simulation(Scripted::answering(&[r#"{"reactions": {
            "elara": {"faithChange": "STRONG_INCREASE"},
            "sly": {"faithChange": "STRONG_DECREASE"}
        }}"#]));
        sim.update_store(|store| store.apply_faith_deltas(&[(AgentId::from("sly"), -10)]));

        let outcome = sim.send_message("Repent", OracleTarget::All).await.unwrap();

        assert_eq!(outcome.faith_deltas.get("elara"), Some(&15));
        assert_eq!(outcome.faith_deltas.get("sly"), Some(&-10));
        assert_eq!(faith(&sim, "sly"), 0);
        sim.read(|store| {
            let sly = store.agent("sly").unwrap();
            // Memory keeps the requested change, not the clamped one.
            assert!(matches!(
                sly.memory.last(),
                Some(MemoryEntry::Oracle { faith_delta: -15, .. })
            ));
            // Empty thoughts leave the current thought alone.
            assert!(sly.thought.is_none());
            // round((95 + 0) / 2) = 48
            assert_eq!(store.faith().global, 48);
        });
    }

    #[tokio::test]
    async fn invalid_requests_are_refused_before_payment() {
        let sim = simulation(DisabledGenerator);
        assert_eq!(
            sim.send_message("   ", OracleTarget::All).await.unwrap_err(),
            OracleError::EmptyMessage
        );
        assert_eq!(
            sim.send_message("Hello", OracleTarget::from("nobody"))
                .await
                .unwrap_err(),
            OracleError::UnknownTarget("nobody".to_owned())
        );
        assert_eq!(sim.read(|store| store.power().current), 50);
    }

    #[tokio::test]
    async fn oracle_can_win_the_game() {
        let sim = simulation(DisabledGenerator);
        sim.update_store(|store| {
            store.apply_faith_deltas(&[(AgentId::from("elara"), 15), (AgentId::from("sly"), 75)])
        });
        let mut events = sim.subscribe_events();

        let outcome = sim.cast_holy_light().await.unwrap();

        assert_eq!(outcome.terminal, Some(TerminalOutcome::Victory));
        assert!(sim.read(|store| store.is_terminal() && store.time().paused));
        assert_eq!(
            sim.cast_holy_light().await.unwrap_err(),
            OracleError::SimulationOver
        );
        assert_eq!(sim.tick(), HourAdvance::Halted);

        let mut saw_terminal = false;
        while let Ok(event) = events.try_recv() {
            if let SimulationEvent::Terminal { outcome, .. } = event {
                assert_eq!(outcome, TerminalOutcome::Victory);
                saw_terminal = true;
            }
        }
        assert!(saw_terminal);
    }

    #[tokio::test]
    async fn second_oracle_while_pending_is_busy() {
        let sim = simulation(Gated::new(ELARA_STRONG));
        let first = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move { sim.cast_holy_light().await })
        };
        while sim.generator().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(sim.read(|store| store.loading().label == Some(LoadingTask::ProcessingOracle)));

        assert_eq!(sim.cast_holy_light().await.unwrap_err(), OracleError::Busy);
        assert_eq!(sim.read(|store| store.power().current), 30);

        sim.generator().release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.used_generation);
        sim.generator().release.notify_one();
        assert!(sim.cast_holy_light().await.is_ok());
    }

    #[tokio::test]
    async fn reset_during_oracle_discards_it() {
        let sim = simulation(Gated::new(ELARA_STRONG));
        let pending = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move { sim.send_message("Wait", OracleTarget::All).await })
        };
        while sim.generator().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        sim.reset();
        sim.generator().release.notify_one();

        assert_eq!(pending.await.unwrap().unwrap_err(), OracleError::Stale);
        assert_eq!(faith(&sim, "elara"), 80);
        assert_eq!(sim.read(|store| store.power().current), 50);
    }

    #[tokio::test]
    async fn oracle_schedule_merges_from_its_hour() {
        let sim = simulation(Scripted::answering(&[r#"{
            "reactions": {},
            "schedule": {"sly": [
                {"hour": 5, "location": "altar", "action": "praying", "thought": "too early"},
                {"hour": 6, "location": "altar", "action": "thinking", "thought": "Why me?"},
                {"hour": 7, "location": "altar", "action": "hiding", "thought": "Quiet."}
            ]}
        }"#]));

        sim.send_message("Come to the altar", OracleTarget::from("sly"))
            .await
            .unwrap();

        sim.read(|store| {
            let sly = store.schedule().agents.get("sly").unwrap();
            assert_eq!(sly.entry(5).unwrap().action, ActionId::from("sleeping"));
            assert_eq!(sly.entry(6).unwrap().action, ActionId::from("thinking"));
            assert_eq!(sly.entry(7).unwrap().location, LocationId::from("altar"));
        });
    }

    #[tokio::test]
    async fn midnight_starts_a_day_and_requests_one_schedule() {
        let sim = simulation(Scripted::answering(&[
            r#"{"elara": [{"hour": 0, "location": "altar", "action": "praying", "thought": "Midnight vigil."}]}"#,
        ]));
        sim.update_store(|store| {
            store.set_hour(23);
            store.set_paused(false);
        });
        let mut events = sim.subscribe_events();

        let advance = sim.advance().await;

        assert_eq!(
            advance,
            HourAdvance::Advanced {
                day: 2,
                hour: 0,
                day_changed: true
            }
        );
        assert_eq!(sim.generator().calls(), 1);
        let day_changes = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|event| matches!(event, SimulationEvent::DayChanged { day: 2 }))
            .count();
        assert_eq!(day_changes, 1);
        sim.read(|store| {
            assert_eq!(store.schedule().day, 2);
            assert_eq!(store.schedule().origin, ScheduleOrigin::Generated);
            let elara = store.agent("elara").unwrap();
            assert_eq!(elara.action, ActionId::from("praying"));
            assert_eq!(elara.thought.as_deref(), Some("Midnight vigil."));
        });
    }

    #[tokio::test]
    async fn failed_day_generation_keeps_skeleton() {
        let sim = simulation(Scripted::default());
        let outcome = sim.initialize_day_schedule().await;
        assert_eq!(outcome, DayScheduleOutcome::Skeleton { day: 1 });
        sim.read(|store| {
            assert_eq!(store.schedule().origin, ScheduleOrigin::Skeleton);
            assert!(!store.loading().active);
            let elara = store.agent("elara").unwrap();
            assert_eq!(elara.action, ActionId::from("lighting_candles"));
            assert!(elara.thought.is_some());
        });
    }

    #[tokio::test]
    async fn stale_day_schedule_is_discarded() {
        let sim = simulation(Gated::new(
            r#"{"sly": [{"hour": 3, "location": "forest", "action": "hunting"}]}"#,
        ));
        let pending = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move { sim.regenerate_day_schedule().await })
        };
        while sim.generator().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(sim.read(|store| store.loading().label == Some(LoadingTask::GeneratingScript)));
        assert_eq!(
            sim.regenerate_day_schedule().await,
            DayScheduleOutcome::AlreadyPending
        );

        sim.update_store(|store| store.set_clock(2, 0));
        sim.generator().release.notify_one();

        assert_eq!(pending.await.unwrap(), DayScheduleOutcome::Discarded);
        sim.read(|store| {
            assert_eq!(store.schedule().origin, ScheduleOrigin::Skeleton);
            assert!(!store.loading().active);
        });
    }

    #[tokio::test]
    async fn reset_frees_day_generation_for_new_session() {
        let sim = simulation(Gated::new(
            r#"{"sly": [{"hour": 3, "location": "forest", "action": "hunting"}]}"#,
        ));
        let before_reset = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move { sim.regenerate_day_schedule().await })
        };
        while sim.generator().calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        sim.reset();
        let after_reset = {
            let sim = Arc::clone(&sim);
            tokio::spawn(async move { sim.regenerate_day_schedule().await })
        };
        while sim.generator().calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        assert!(sim.read(|store| store.loading().label == Some(LoadingTask::GeneratingScript)));
        sim.generator().release.notify_waiters();

        assert_eq!(before_reset.await.unwrap(), DayScheduleOutcome::Discarded);
        assert_eq!(
            after_reset.await.unwrap(),
            DayScheduleOutcome::Generated { day: 1, entries: 1 }
        );
        sim.read(|store| {
            assert_eq!(store.schedule().origin, ScheduleOrigin::Generated);
            assert!(!store.loading().active);
        });
    }

    #[tokio::test]
    async fn store_changes_are_published() {
        let sim = simulation(DisabledGenerator);
        let mut events = sim.subscribe_events();
        assert!(sim.select_agent(Some(AgentId::from("sly"))));
        assert!(!sim.select_agent(Some(AgentId::from("ghost"))));

        let event = events.try_recv().unwrap();
        assert!(matches!(
            event,
            SimulationEvent::StateChanged { ref change } if change.value == serde_json::json!("sly")
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn clock_driver_ticks_at_speed_and_stops() {
        let sim = simulation(DisabledGenerator);
        assert_eq!(sim.clock_status(), ClockState::Stopped);

        assert_eq!(sim.start_clock(), ClockState::Running);
        assert_eq!(sim.start_clock(), ClockState::Running);
        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(sim.read(|store| store.time().hour), 7);

        assert_eq!(sim.cycle_speed(), Speed::X2);
        tokio::time::sleep(Duration::from_millis(2_600)).await;
        assert_eq!(sim.read(|store| store.time().hour), 8);

        assert_eq!(sim.pause(), ClockState::Stopped);
        assert_eq!(sim.pause(), ClockState::Stopped);
        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(sim.read(|store| store.time().hour), 8);
        assert!(sim.read(|store| store.time().paused));

        assert_eq!(sim.toggle_pause(), ClockState::Running);
        sim.reset();
        assert_eq!(sim.clock_status(), ClockState::Stopped);
        assert_eq!(sim.read(|store| store.time().hour), 6);
    }
}
