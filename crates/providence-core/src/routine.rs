//! Static routine lookup and routine thoughts.
//!
//! Pure functions over the cast tables: which slot covers an hour, and what
//! an agent is thinking while following it.

use providence_types::{DayPhase, HOURS_PER_DAY};

use crate::cast::RoutineSlot;

/// The routine slot that governs `hour`.
///
/// An exact slot wins. Otherwise the nearest earlier slot of the same day
/// is used, and failing that the search wraps to the end of the day and
/// walks back down to `hour + 1`. Returns `None` only for an empty routine.
pub fn resolve(routine: &[RoutineSlot], hour: u8) -> Option<RoutineSlot> {
    let at = |h: u8| routine.iter().find(|slot| slot.hour == h).copied();

    at(hour)
        .or_else(|| (0..hour).rev().find_map(at))
        .or_else(|| {
            (hour.saturating_add(1)..HOURS_PER_DAY)
                .rev()
                .find_map(at)
        })
}

/// Deterministic thought for an agent following its routine.
pub fn routine_thought(agent: &str, action: &str, location: &str, hour: u8) -> &'static str {
    let phase = DayPhase::from_hour(hour);
    cast_thought(agent, action, location, phase).unwrap_or_else(|| generic_thought(action))
}

fn cast_thought(agent: &str, action: &str, location: &str, phase: DayPhase) -> Option<&'static str> {
    let thought = match (agent, action) {
        ("elara", "praying") if phase == DayPhase::Morning => {
            "A new day. Thank you for watching over us..."
        }
        ("elara", "praying") => "May the gods protect every soul in this land...",
        ("elara", "meditating") => "Let the heart grow still and listen...",
        ("elara", "cleaning_altar") => "The altar must be kept spotless...",
        ("elara", "lighting_candles") => "May this light guide whoever has lost their way...",
        ("elara", "reading_scriptures") => "There is wisdom hidden in these verses...",
        ("elara", "blessing_visitors") => "Go with the gods' blessing, traveler...",
        ("elara", "arranging_offerings") => "Every offering carries someone's hope...",
        ("elara", "polishing_statues") => "The statues should shine like new...",
        ("elara", "sweeping_temple") => "Sweeping the temple is my sacred duty...",
        ("elara", "tending_incense") => "Let the smoke carry our prayers upward...",
        ("elara", "sleeping") if phase == DayPhase::Night => "...",
        ("elara", "sleeping") => "Just a short rest to regain my strength...",
        ("elara", "eating") => "Thank you for this food...",
        ("elara", "talking") if location == "tavern" => {
            "Even here, a kind word may reach someone..."
        }
        ("elara", "preaching") => "If only more would hear the word...",
        ("elara", "buying_supplies") => "The altar needs candles and oil...",
        ("elara", "drawing_water") => "Fresh water to wash the altar...",
        ("elara", "feeding_pigeons") => "These little ones are creatures of the gods too...",
        ("elara", "chatting_merchants") => "What news do the merchants bring today?",
        ("elara", "gathering_herbs") => "These herbs will help the sick...",
        ("elara", "meditating_nature") => "Out here the gods feel closer...",
        ("elara", "bird_watching") => "Birdsong is nature's own hymn...",

        ("sly", "drinking") if phase == DayPhase::Evening => {
            "Not a bad haul today. Worth a drink..."
        }
        ("sly", "drinking") => "Best cure for a hangover is another drink...",
        ("sly", "drinking_with_others") => "Loud bunch, but better than drinking alone...",
        ("sly", "gambling") => "Lucky hand... or maybe just skill...",
        ("sly", "listening_gossip") => "Information is currency. The more the better...",
        ("sly", "telling_stories") => "Let me tell you about my younger days...",
        ("sly", "arm_wrestling") => "Nobody beats me at this table...",
        ("sly", "counting_coins") => "How much did I make today... not enough...",
        ("sly", "sleeping") if phase == DayPhase::Night => "...",
        ("sly", "sleeping") => "Just resting my eyes...",
        ("sly", "eating") => "A full belly comes first...",
        ("sly", "mopping_floor") => "A bit of work for a free meal...",
        ("sly", "people_watching") => "Let's see who's careless today...",
        ("sly", "haggling") => "That price is robbery. Thirty percent off!",
        ("sly", "pickpocketing") => "Too alert... maybe next time...",
        ("sly", "spreading_rumors") => "Heard the caravan out east ran into trouble...",
        ("sly", "selling_goods") => "Take a look at this, finest quality...",
        ("sly", "setting_traps") => "Hope there's something in these tomorrow...",
        ("sly", "hunting") => "There it is. Quiet now...",
        ("sly", "foraging") => "These berries still look edible...",
        ("sly", "hiding") if location == "altar" => "Nobody comes looking for me here...",
        ("sly", "hiding") => "Someone's coming, better lay low...",
        ("sly", "napping_under_tree") => "Finally some peace and quiet...",
        ("sly", "fishing") => "Fishing takes patience... not my strong suit...",
        ("sly", "carving_wood") => "Carving a trinket to pass the time...",
        ("sly", "exploring_trails") => "Wonder where this path leads?",
        _ => return None,
    };
    Some(thought)
}

fn generic_thought(action: &str) -> &'static str {
    if action.contains("sleeping") {
        "..."
    } else if action.contains("drinking") {
        "A drink to loosen up..."
    } else if action.contains("pray") || action.contains("meditat") {
        "Stillness..."
    } else {
        "..."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::CAST;

    const fn slot(hour: u8, action: &'static str) -> RoutineSlot {
        RoutineSlot {
            hour,
            location: "altar",
            action,
        }
    }

    #[test]
    fn exact_slot_wins() {
        let routine = [slot(6, "praying"), slot(7, "cleaning_altar")];
        assert_eq!(resolve(&routine, 7).map(|s| s.action), Some("cleaning_altar"));
    }

    #[test]
    fn gap_takes_nearest_earlier_slot() {
        let routine = [slot(6, "praying"), slot(12, "meditating")];
        assert_eq!(resolve(&routine, 9).map(|s| s.action), Some("praying"));
        assert_eq!(resolve(&routine, 20).map(|s| s.action), Some("meditating"));
    }

    #[test]
    fn gap_before_first_slot_wraps_from_end_of_day() {
        let routine = [slot(6, "praying"), slot(12, "meditating"), slot(22, "sleeping")];
        assert_eq!(resolve(&routine, 3).map(|s| s.action), Some("sleeping"));
    }

    #[test]
    fn wrap_search_prefers_latest_hour() {
        // Hours 5 and 10 are both after 3; the backward walk from 23 meets 10 first.
        let routine = [slot(5, "praying"), slot(10, "meditating")];
        assert_eq!(resolve(&routine, 3).map(|s| s.action), Some("meditating"));
    }

    #[test]
    fn empty_routine_resolves_nothing() {
        assert!(resolve(&[], 12).is_none());
    }

    #[test]
    fn stock_routines_cover_every_hour() {
        for member in &CAST {
            for hour in 0..HOURS_PER_DAY {
                assert!(resolve(member.routine, hour).is_some());
            }
        }
    }

    #[test]
    fn thoughts_depend_on_time_of_day() {
        assert_eq!(routine_thought("elara", "sleeping", "altar", 23), "...");
        assert_ne!(routine_thought("elara", "sleeping", "altar", 14), "...");
        assert_ne!(
            routine_thought("elara", "praying", "altar", 7),
            routine_thought("elara", "praying", "altar", 20)
        );
        assert_ne!(
            routine_thought("sly", "drinking", "tavern", 19),
            routine_thought("sly", "drinking", "tavern", 10)
        );
    }

    #[test]
    fn unmapped_actions_use_generic_thoughts() {
        assert_eq!(routine_thought("sly", "praying", "altar", 12), "Stillness...");
        assert_eq!(routine_thought("nobody", "drinking_tea", "tavern", 12), "A drink to loosen up...");
        assert_eq!(routine_thought("elara", "busking", "plaza", 12), "...");
    }
}
