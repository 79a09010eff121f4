//! The town and its residents.
//!
//! Four locations, the actions each one affords, and the two cast members
//! with their personalities, preferences, and 24-hour routines. Everything
//! here is static; [`starting_agents`] and [`starting_locations`] turn it
//! into the owned state the store starts from.

use std::collections::BTreeMap;

use providence_types::{
    ActionId, Agent, AgentId, Location, LocationId, Personality, Rect,
};
use serde::Serialize;

/// A location and the actions it affords.
#[derive(Debug, Clone, Copy)]
pub struct LocationSpec {
    /// Stable identifier.
    pub id: &'static str,
    /// Name shown to the player.
    pub display_name: &'static str,
    /// What the place is for, as told to the generation service.
    pub description: &'static str,
    /// Renderer geometry.
    pub bounds: Rect,
    /// Renderer fill color.
    pub color: &'static str,
    /// Valid actions, in preference order. The first is the substitute for
    /// unknown generated actions.
    pub actions: &'static [&'static str],
}

/// One slot of a static daily routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineSlot {
    /// Hour of the day.
    pub hour: u8,
    /// Where the agent goes.
    pub location: &'static str,
    /// What the agent does there.
    pub action: &'static str,
}

/// Static description of a cast member.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CastMember {
    /// Stable identifier.
    pub id: &'static str,
    /// Name shown to the player.
    pub display_name: &'static str,
    /// Social role in town.
    pub role: &'static str,
    /// Renderer color.
    pub color: &'static str,
    /// Faith at game start.
    pub initial_faith: u8,
    /// Location at game start.
    pub initial_location: &'static str,
    /// Action at game start.
    pub initial_action: &'static str,
    /// Character traits.
    pub traits: &'static [&'static str],
    /// What the agent cares about.
    pub values: &'static [&'static str],
    /// What the agent is afraid of.
    pub fears: &'static [&'static str],
    /// Small recurring behaviors.
    pub quirks: &'static [&'static str],
    /// Actions the agent favors at each location.
    pub preferred_actions: &'static [(&'static str, &'static [&'static str])],
    /// Life story.
    pub background: &'static str,
    /// How the agent sees the others, keyed by agent id.
    pub relationships: &'static [(&'static str, &'static str)],
    /// Hour-by-hour routine. Hours may be missing.
    #[serde(skip)]
    pub routine: &'static [RoutineSlot],
}

const fn rect(x: u32, y: u32) -> Rect {
    Rect {
        x,
        y,
        width: 320,
        height: 180,
    }
}

const fn slot(hour: u8, location: &'static str, action: &'static str) -> RoutineSlot {
    RoutineSlot {
        hour,
        location,
        action,
    }
}

/// Actions offered by any location not in [`LOCATIONS`].
pub const UNKNOWN_LOCATION_ACTIONS: &[&str] = &["wandering", "thinking"];

/// Every location in town.
pub static LOCATIONS: [LocationSpec; 4] = [
    LocationSpec {
        id: "altar",
        display_name: "Altar",
        description: "A sacred place for prayer and worship, tended by the devout",
        bounds: rect(50, 50),
        color: "#8b4513",
        actions: &[
            "praying",
            "meditating",
            "cleaning_altar",
            "lighting_candles",
            "reading_scriptures",
            "blessing_visitors",
            "arranging_offerings",
            "polishing_statues",
            "sweeping_temple",
            "tending_incense",
            "sleeping",
            "thinking",
            "talking",
        ],
    },
    LocationSpec {
        id: "tavern",
        display_name: "Tavern",
        description: "A place for drinking, socializing, gambling, and gossip",
        bounds: rect(430, 50),
        color: "#4a3728",
        actions: &[
            "drinking",
            "drinking_with_others",
            "bartending",
            "brewing_ale",
            "serving_customers",
            "cleaning_mugs",
            "listening_gossip",
            "gambling",
            "arm_wrestling",
            "telling_stories",
            "counting_coins",
            "mopping_floor",
            "sleeping",
            "eating",
            "talking",
            "resting",
        ],
    },
    LocationSpec {
        id: "plaza",
        display_name: "Plaza",
        description: "The town center where people meet, trade, and preach",
        bounds: rect(50, 270),
        color: "#3d5c5c",
        actions: &[
            "trading",
            "haggling",
            "people_watching",
            "busking",
            "preaching",
            "begging",
            "pickpocketing",
            "spreading_rumors",
            "buying_supplies",
            "selling_goods",
            "chatting_merchants",
            "drawing_water",
            "feeding_pigeons",
            "wandering",
            "talking",
            "thinking",
        ],
    },
    LocationSpec {
        id: "forest",
        display_name: "Forest",
        description: "A quiet place for hunting, foraging, gathering herbs, and solitude",
        bounds: rect(430, 270),
        color: "#2d4a2d",
        actions: &[
            "gathering_herbs",
            "chopping_wood",
            "hunting",
            "foraging",
            "setting_traps",
            "collecting_firewood",
            "exploring_trails",
            "hiding",
            "napping_under_tree",
            "bird_watching",
            "fishing",
            "meditating_nature",
            "carving_wood",
            "wandering",
            "resting",
        ],
    },
];

/// The cast, in id order.
pub static CAST: [CastMember; 2] = [
    CastMember {
        id: "elara",
        display_name: "Elara",
        role: "Nun",
        color: "#f5f5dc",
        initial_faith: 80,
        initial_location: "altar",
        initial_action: "lighting_candles",
        traits: &["devout", "pious", "clean-freak", "kind-hearted", "traditional"],
        values: &["faith", "cleanliness", "order", "helping others"],
        fears: &["losing faith", "chaos", "uncleanliness"],
        quirks: &["always tidying things", "mutters prayers when nervous"],
        preferred_actions: &[
            (
                "altar",
                &[
                    "praying",
                    "meditating",
                    "cleaning_altar",
                    "lighting_candles",
                    "reading_scriptures",
                    "tending_incense",
                    "polishing_statues",
                    "blessing_visitors",
                ],
            ),
            ("tavern", &["talking", "eating"]),
            (
                "plaza",
                &[
                    "preaching",
                    "buying_supplies",
                    "drawing_water",
                    "feeding_pigeons",
                    "chatting_merchants",
                ],
            ),
            ("forest", &["gathering_herbs", "meditating_nature", "bird_watching"]),
        ],
        background: "Elara has served at the altar since she was young. She finds peace in \
            routine and prayer. Though deeply devoted, she sometimes questions if her prayers \
            are heard. She keeps the altar and surrounding areas spotlessly clean. She is kind \
            to travelers and the poor, often sharing food with those in need. She gathers herbs \
            from the forest to make remedies for the sick.",
        relationships: &[(
            "sly",
            "Sees him as a lost soul who needs guidance. Wishes he would visit the altar more.",
        )],
        routine: &[
            slot(0, "altar", "sleeping"),
            slot(1, "altar", "sleeping"),
            slot(2, "altar", "sleeping"),
            slot(3, "altar", "sleeping"),
            slot(4, "altar", "sleeping"),
            slot(5, "altar", "praying"),
            slot(6, "altar", "lighting_candles"),
            slot(7, "altar", "praying"),
            slot(8, "altar", "cleaning_altar"),
            slot(9, "altar", "sweeping_temple"),
            slot(10, "plaza", "buying_supplies"),
            slot(11, "plaza", "preaching"),
            slot(12, "tavern", "eating"),
            slot(13, "altar", "reading_scriptures"),
            slot(14, "forest", "gathering_herbs"),
            slot(15, "altar", "blessing_visitors"),
            slot(16, "altar", "arranging_offerings"),
            slot(17, "altar", "tending_incense"),
            slot(18, "altar", "polishing_statues"),
            slot(19, "altar", "meditating"),
            slot(20, "altar", "praying"),
            slot(21, "altar", "reading_scriptures"),
            slot(22, "altar", "sleeping"),
            slot(23, "altar", "sleeping"),
        ],
    },
    CastMember {
        id: "sly",
        display_name: "Sly",
        role: "Vagabond",
        color: "#696969",
        initial_faith: 20,
        initial_location: "tavern",
        initial_action: "sleeping",
        traits: &["cynical", "streetwise", "opportunistic", "secretly lonely", "witty"],
        values: &["freedom", "survival", "self-reliance"],
        fears: &["commitment", "being vulnerable", "trusting others"],
        quirks: &[
            "always has a sarcastic comment",
            "picks up shiny objects",
            "knows everyone's secrets",
        ],
        preferred_actions: &[
            ("altar", &["thinking", "hiding"]),
            (
                "tavern",
                &[
                    "drinking",
                    "drinking_with_others",
                    "gambling",
                    "listening_gossip",
                    "telling_stories",
                    "arm_wrestling",
                    "counting_coins",
                ],
            ),
            (
                "plaza",
                &[
                    "people_watching",
                    "pickpocketing",
                    "spreading_rumors",
                    "haggling",
                    "selling_goods",
                ],
            ),
            (
                "forest",
                &[
                    "setting_traps",
                    "hunting",
                    "foraging",
                    "hiding",
                    "napping_under_tree",
                    "fishing",
                    "carving_wood",
                ],
            ),
        ],
        background: "Sly arrived in town years ago and never left. He survives by doing odd \
            jobs, occasionally gambling, and knowing everyone's business. He acts tough but deep \
            down craves connection. He doesn't trust easily but respects those who prove \
            themselves. He's seen enough hardship to be skeptical of divine promises. He hunts \
            and forages in the forest to survive, and trades goods in the plaza when he has \
            something valuable.",
        relationships: &[(
            "elara",
            "Secretly respects her conviction but thinks religion is a crutch for the weak.",
        )],
        routine: &[
            slot(0, "tavern", "sleeping"),
            slot(1, "tavern", "sleeping"),
            slot(2, "tavern", "sleeping"),
            slot(3, "tavern", "sleeping"),
            slot(4, "tavern", "sleeping"),
            slot(5, "tavern", "sleeping"),
            slot(6, "tavern", "sleeping"),
            slot(7, "tavern", "sleeping"),
            slot(8, "tavern", "sleeping"),
            slot(9, "tavern", "eating"),
            slot(10, "tavern", "drinking"),
            slot(11, "plaza", "people_watching"),
            slot(12, "plaza", "haggling"),
            slot(13, "forest", "setting_traps"),
            slot(14, "forest", "hunting"),
            slot(15, "forest", "foraging"),
            slot(16, "plaza", "selling_goods"),
            slot(17, "tavern", "drinking"),
            slot(18, "tavern", "listening_gossip"),
            slot(19, "tavern", "gambling"),
            slot(20, "tavern", "drinking_with_others"),
            slot(21, "tavern", "telling_stories"),
            slot(22, "tavern", "drinking"),
            slot(23, "tavern", "counting_coins"),
        ],
    },
];

/// Look up a location by id.
pub fn location(id: &str) -> Option<&'static LocationSpec> {
    LOCATIONS.iter().find(|spec| spec.id == id)
}

/// Whether `id` names a location in town.
pub fn is_location(id: &str) -> bool {
    location(id).is_some()
}

/// Actions valid at a location. Unknown locations offer
/// [`UNKNOWN_LOCATION_ACTIONS`].
pub fn actions_for(location_id: &str) -> &'static [&'static str] {
    location(location_id).map_or(UNKNOWN_LOCATION_ACTIONS, |spec| spec.actions)
}

/// Whether an action is valid at some location.
pub fn is_known_action(action: &str) -> bool {
    LOCATIONS
        .iter()
        .any(|spec| spec.actions.contains(&action))
}

/// Look up a cast member by id.
pub fn cast_member(id: &str) -> Option<&'static CastMember> {
    CAST.iter().find(|member| member.id == id)
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}

/// Agents as they stand at the start of day 1.
pub fn starting_agents() -> BTreeMap<AgentId, Agent> {
    CAST.iter()
        .map(|member| {
            let agent = Agent {
                id: AgentId::from(member.id),
                display_name: member.display_name.to_owned(),
                role: member.role.to_owned(),
                color: member.color.to_owned(),
                personality: Personality {
                    traits: owned(member.traits),
                    values: owned(member.values),
                    fears: owned(member.fears),
                    quirks: owned(member.quirks),
                },
                location: LocationId::from(member.initial_location),
                action: ActionId::from(member.initial_action),
                faith: member.initial_faith,
                thought: None,
                interpretation: None,
                memory: Vec::new(),
            };
            (agent.id.clone(), agent)
        })
        .collect()
}

/// Every location as renderer-facing state.
pub fn starting_locations() -> BTreeMap<LocationId, Location> {
    LOCATIONS
        .iter()
        .map(|spec| {
            let location = Location {
                id: LocationId::from(spec.id),
                display_name: spec.display_name.to_owned(),
                bounds: spec.bounds,
                color: spec.color.to_owned(),
            };
            (location.id.clone(), location)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routines_only_use_valid_actions() {
        for member in &CAST {
            for slot in member.routine {
                assert!(is_location(slot.location), "{}: {}", member.id, slot.location);
                assert!(
                    actions_for(slot.location).contains(&slot.action),
                    "{} at hour {}: {} is not valid at {}",
                    member.id,
                    slot.hour,
                    slot.action,
                    slot.location
                );
            }
        }
    }

    #[test]
    fn starting_positions_are_valid() {
        for member in &CAST {
            assert!(actions_for(member.initial_location).contains(&member.initial_action));
            assert!(member.initial_faith <= 100);
        }
    }

    #[test]
    fn unknown_location_offers_wandering() {
        assert_eq!(actions_for("moon"), UNKNOWN_LOCATION_ACTIONS);
        assert!(is_known_action("gambling"));
        assert!(!is_known_action("flying"));
    }

    #[test]
    fn starting_state_is_keyed_by_id() {
        let agents = starting_agents();
        assert_eq!(agents.len(), 2);
        assert!(agents.contains_key("elara"));
        assert!(agents.contains_key("sly"));
        assert_eq!(starting_locations().len(), 4);
    }
}
