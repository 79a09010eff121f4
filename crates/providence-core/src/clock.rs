//! Hourly clock step and cadence.
//!
//! [`advance_hour`] is the synchronous body of one tick; the tokio driver
//! that calls it on a cadence lives in [`crate::simulation`].

use std::time::Duration;

use providence_types::{HOURS_PER_DAY, Speed};
use tracing::debug;

use crate::store::StateStore;

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourAdvance {
    /// Time is paused; nothing changed.
    Skipped,
    /// The game is over; the driver should stop.
    Halted,
    /// The hour moved forward.
    Advanced {
        /// Day after the tick.
        day: u32,
        /// Hour after the tick.
        hour: u8,
        /// Whether the tick crossed midnight.
        day_changed: bool,
    },
}

/// Advance the clock by one hour and regenerate power.
///
/// Crossing hour 23 wraps to hour 0 of the next day.
pub fn advance_hour(store: &mut StateStore, regen_per_hour: u32) -> HourAdvance {
    if store.is_terminal() {
        return HourAdvance::Halted;
    }
    let time = store.time();
    if time.paused {
        return HourAdvance::Skipped;
    }

    let next_hour = time.hour.saturating_add(1);
    let (day, hour, day_changed) = if next_hour >= HOURS_PER_DAY {
        (time.day.saturating_add(1), 0, true)
    } else {
        (time.day, next_hour, false)
    };
    store.set_clock(day, hour);
    store.regen_power(regen_per_hour);

    debug!(day, hour, day_changed, power = store.power().current, "Hour advanced");
    HourAdvance::Advanced {
        day,
        hour,
        day_changed,
    }
}

/// Real time between ticks at a given speed.
pub fn tick_interval(ms_per_game_hour: u64, speed: Speed) -> Duration {
    let ms = ms_per_game_hour
        .checked_div(u64::from(speed.multiplier()))
        .unwrap_or(ms_per_game_hour)
        .max(1);
    Duration::from_millis(ms)
}
