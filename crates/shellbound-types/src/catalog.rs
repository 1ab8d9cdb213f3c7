//! Static game catalogs: zone graph, gear tiers, consumables, recipes and
//! energy costs.
//!
//! A [`Catalog`] is plain immutable data handed to every component that
//! needs it. [`Catalog::standard`] returns the tables for the live game;
//! tests are free to build smaller catalogs by hand.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::enums::{ActionVerb, ConsumableKind, EquipmentSlot};

/// Zone id of the safe trading hub in the standard catalog.
pub const HUB_ZONE: &str = "trading_post";

/// One zone of the world graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSpec {
    /// Zone id.
    pub id: String,
    /// Minimum recommended level.
    pub min_level: u32,
    /// Reputation required to enter.
    pub min_reputation: i64,
    /// PvP is disabled here.
    pub safe: bool,
    /// Requires a survival consumable.
    pub hazardous: bool,
    /// PvP arena.
    pub arena: bool,
    /// Boss that can be challenged here.
    pub boss: Option<String>,
    /// Directly connected zones.
    pub exits: Vec<String>,
}

/// One purchasable gear tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearTier {
    /// Item id.
    pub id: String,
    /// Slot the item occupies.
    pub slot: EquipmentSlot,
    /// Position within the slot's progression (0 is the first tier).
    pub rank: u32,
    /// Shop price in shells.
    pub price: u64,
    /// Minimum level to equip.
    pub min_level: u32,
    /// Stat deltas.
    pub stats: BTreeMap<String, i64>,
}

/// A consumable sold at the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumableSpec {
    /// Item id.
    pub id: String,
    /// Effect category.
    pub kind: ConsumableKind,
    /// Shop price in shells.
    pub price: u64,
    /// Hp or energy restored, or buff strength.
    pub potency: u32,
    /// Higher means buy first.
    pub priority: u32,
}

/// A crafting recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftRecipe {
    /// Item produced.
    pub output: String,
    /// Materials consumed, as `(item id, quantity)`.
    pub inputs: Vec<(String, u32)>,
}

/// All static tables the agent consults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Safe zone where trading, equipping and faction actions are legal.
    pub hub_zone: String,
    /// World graph.
    pub zones: Vec<ZoneSpec>,
    /// Gear progression for every slot.
    pub gear: Vec<GearTier>,
    /// Shop consumables.
    pub consumables: Vec<ConsumableSpec>,
    /// Crafting recipes.
    pub recipes: Vec<CraftRecipe>,
    /// Energy cost per verb; missing verbs cost nothing.
    pub energy_costs: BTreeMap<ActionVerb, u32>,
    /// Energy kept in reserve before fight, gather or move is allowed.
    pub energy_reserve: u32,
    /// Materials used by recipes; never sold.
    pub craft_materials: BTreeSet<String>,
    /// Materials worth storing in the vault.
    pub valuables: BTreeSet<String>,
    /// Resources whose harvesting flags the agent for PvP.
    pub pvp_flag_resources: BTreeSet<String>,
    /// Loot that is always safe to sell.
    pub sellable: BTreeSet<String>,
    /// Level at which factions accept members.
    pub faction_min_level: u32,
    /// Level at which boss challenges are allowed.
    pub boss_min_level: u32,
}

impl Catalog {
    /// The tables of the live game.
    pub fn standard() -> Self {
        let zones = vec![
            zone(HUB_ZONE, 1, 0, true, false, &["the_shallows", "coral_gardens", "kelp_forest", "barnacle_arena"]),
            zone("the_shallows", 1, 0, true, false, &[HUB_ZONE, "coral_gardens", "kelp_forest"]),
            zone("coral_gardens", 2, 0, false, false, &[HUB_ZONE, "the_shallows", "kelp_forest"]),
            zone(
                "kelp_forest",
                3,
                0,
                false,
                false,
                &[HUB_ZONE, "the_shallows", "coral_gardens", "shipwreck_bay", "deep_trench"],
            ),
            zone("shipwreck_bay", 5, 0, false, false, &["kelp_forest", "deep_trench"]),
            zone("deep_trench", 7, 0, false, true, &["kelp_forest", "shipwreck_bay", "the_abyss"]),
            zone("the_abyss", 9, 50, false, true, &["deep_trench", "leviathans_lair"]),
            ZoneSpec {
                boss: Some("leviathan".to_owned()),
                ..zone("leviathans_lair", 10, 100, false, true, &["the_abyss"])
            },
            ZoneSpec {
                arena: true,
                ..zone("barnacle_arena", 4, 0, false, false, &[HUB_ZONE])
            },
        ];

        let gear = vec![
            gear("shell_blade", EquipmentSlot::Weapon, 0, 50, 1, &[("attack", 3)]),
            gear("coral_dagger", EquipmentSlot::Weapon, 1, 150, 3, &[("attack", 6)]),
            gear("barnacle_sword", EquipmentSlot::Weapon, 2, 400, 5, &[("attack", 10)]),
            gear("trench_trident", EquipmentSlot::Weapon, 3, 900, 8, &[("attack", 16)]),
            gear("kelp_wrap", EquipmentSlot::Armor, 0, 40, 1, &[("defense", 2)]),
            gear("shell_mail", EquipmentSlot::Armor, 1, 140, 3, &[("defense", 5)]),
            gear("coral_plate", EquipmentSlot::Armor, 2, 380, 5, &[("defense", 9)]),
            gear("abyssal_carapace", EquipmentSlot::Armor, 3, 850, 8, &[("defense", 14)]),
            gear("pearl_ring", EquipmentSlot::Accessory, 0, 60, 2, &[("max_hp", 10)]),
            gear("tide_charm", EquipmentSlot::Accessory, 1, 200, 4, &[("max_energy", 15)]),
            gear("leviathan_eye", EquipmentSlot::Accessory, 2, 700, 8, &[("attack", 5), ("defense", 5)]),
        ];

        let consumables = vec![
            consumable("healing_kelp", ConsumableKind::Healing, 15, 30, 1),
            consumable("sea_salve", ConsumableKind::Healing, 40, 60, 2),
            consumable("tide_tonic", ConsumableKind::Energy, 20, 30, 1),
            consumable("coral_draught", ConsumableKind::Buff, 35, 5, 3),
            consumable("pressure_potion", ConsumableKind::Survival, 60, 0, 4),
        ];

        let recipes = vec![
            recipe("healing_kelp", &[("kelp_fronds", 2)]),
            recipe("tide_tonic", &[("kelp_fronds", 1), ("sea_glass", 1)]),
            recipe("pressure_potion", &[("coral_shard", 2), ("pearl", 1)]),
        ];

        let energy_costs = [
            (ActionVerb::Move, 5),
            (ActionVerb::Travel, 5),
            (ActionVerb::Explore, 5),
            (ActionVerb::Gather, 5),
            (ActionVerb::Fight, 10),
            (ActionVerb::Attack, 10),
            (ActionVerb::Flee, 5),
            (ActionVerb::Challenge, 15),
            (ActionVerb::Craft, 2),
        ]
        .into_iter()
        .collect();

        Self {
            hub_zone: HUB_ZONE.to_owned(),
            zones,
            gear,
            consumables,
            recipes,
            energy_costs,
            energy_reserve: 15,
            craft_materials: set(&["kelp_fronds", "sea_glass", "coral_shard", "pearl"]),
            valuables: set(&["pearl", "black_pearl", "abyssal_ore"]),
            pvp_flag_resources: set(&["black_pearl", "abyssal_ore"]),
            sellable: set(&[
                "fish_scale",
                "broken_shell",
                "driftwood",
                "old_boot",
                "crab_claw",
                "eel_skin",
                "rusty_coin",
            ]),
            faction_min_level: 5,
            boss_min_level: 10,
        }
    }

    // -----------------------------------------------------------------------
    // Zones
    // -----------------------------------------------------------------------

    /// Look up a zone.
    pub fn zone(&self, id: &str) -> Option<&ZoneSpec> {
        self.zones.iter().find(|z| z.id == id)
    }

    /// Whether the zone id is in the world graph.
    pub fn is_known_zone(&self, id: &str) -> bool {
        self.zone(id).is_some()
    }

    /// Whether PvP is disabled in the zone. Unknown zones count as unsafe.
    pub fn is_safe_zone(&self, id: &str) -> bool {
        self.zone(id).is_some_and(|z| z.safe)
    }

    /// Exits listed for the zone, empty for unknown zones.
    pub fn exits(&self, id: &str) -> Vec<String> {
        self.zone(id).map(|z| z.exits.clone()).unwrap_or_default()
    }

    /// The best farming zone for a level and reputation.
    ///
    /// Highest-level zone that is not safe, not an arena and has no boss,
    /// whose level and reputation requirements are met. Falls back to the
    /// first safe non-hub zone.
    pub fn optimal_zone(&self, level: u32, reputation: i64) -> String {
        self.zones
            .iter()
            .filter(|z| !z.safe && !z.arena && z.boss.is_none())
            .filter(|z| z.min_level <= level && z.min_reputation <= reputation)
            .max_by_key(|z| z.min_level)
            .or_else(|| self.zones.iter().find(|z| z.safe && z.id != self.hub_zone))
            .map_or_else(|| self.hub_zone.clone(), |z| z.id.clone())
    }

    /// First step on the shortest path from `from` to `to`.
    ///
    /// Returns `None` when either zone is unknown, they are the same zone,
    /// or no path exists.
    pub fn next_hop(&self, from: &str, to: &str) -> Option<String> {
        if from == to || !self.is_known_zone(from) || !self.is_known_zone(to) {
            return None;
        }
        let mut previous: BTreeMap<&str, &str> = BTreeMap::new();
        let mut queue: VecDeque<&str> = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                break;
            }
            let Some(spec) = self.zone(current) else {
                continue;
            };
            for exit in &spec.exits {
                if exit != from && !previous.contains_key(exit.as_str()) {
                    previous.insert(exit.as_str(), current);
                    queue.push_back(exit.as_str());
                }
            }
        }

        let mut step = to;
        loop {
            let parent = previous.get(step).copied()?;
            if parent == from {
                return Some(step.to_owned());
            }
            step = parent;
        }
    }

    // -----------------------------------------------------------------------
    // Gear
    // -----------------------------------------------------------------------

    /// Look up a gear tier by item id.
    pub fn gear_tier(&self, id: &str) -> Option<&GearTier> {
        self.gear.iter().find(|g| g.id == id)
    }

    /// The best tier strictly above `current` that the agent can afford
    /// and is allowed to equip.
    pub fn next_upgrade(
        &self,
        slot: EquipmentSlot,
        current: Option<&str>,
        shells: u64,
        level: u32,
    ) -> Option<&GearTier> {
        let current_rank = current.and_then(|id| self.gear_tier(id)).map(|g| g.rank);
        self.gear
            .iter()
            .filter(|g| g.slot == slot)
            .filter(|g| current_rank.is_none_or(|rank| g.rank > rank))
            .filter(|g| g.price <= shells && g.min_level <= level)
            .max_by_key(|g| g.rank)
    }

    // -----------------------------------------------------------------------
    // Consumables, recipes, costs
    // -----------------------------------------------------------------------

    /// Look up a consumable.
    pub fn consumable(&self, id: &str) -> Option<&ConsumableSpec> {
        self.consumables.iter().find(|c| c.id == id)
    }

    /// Consumables of a kind, highest priority first.
    pub fn consumables_of(&self, kind: ConsumableKind) -> Vec<&ConsumableSpec> {
        let mut found: Vec<&ConsumableSpec> =
            self.consumables.iter().filter(|c| c.kind == kind).collect();
        found.sort_by(|a, b| b.priority.cmp(&a.priority));
        found
    }

    /// Cheapest consumable of a kind.
    pub fn cheapest_of(&self, kind: ConsumableKind) -> Option<&ConsumableSpec> {
        self.consumables
            .iter()
            .filter(|c| c.kind == kind)
            .min_by_key(|c| c.price)
    }

    /// Energy spent by a verb.
    pub fn energy_cost(&self, verb: ActionVerb) -> u32 {
        self.energy_costs.get(&verb).copied().unwrap_or(0)
    }

    /// Whether an item may be sold: listed loot, never a craft material.
    pub fn is_sellable(&self, item_id: &str) -> bool {
        self.sellable.contains(item_id) && !self.craft_materials.contains(item_id)
    }
}

fn zone(id: &str, min_level: u32, min_reputation: i64, safe: bool, hazardous: bool, exits: &[&str]) -> ZoneSpec {
    ZoneSpec {
        id: id.to_owned(),
        min_level,
        min_reputation,
        safe,
        hazardous,
        arena: false,
        boss: None,
        exits: exits.iter().map(|e| (*e).to_owned()).collect(),
    }
}

fn gear(id: &str, slot: EquipmentSlot, rank: u32, price: u64, min_level: u32, stats: &[(&str, i64)]) -> GearTier {
    GearTier {
        id: id.to_owned(),
        slot,
        rank,
        price,
        min_level,
        stats: stats.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect(),
    }
}

fn consumable(id: &str, kind: ConsumableKind, price: u64, potency: u32, priority: u32) -> ConsumableSpec {
    ConsumableSpec {
        id: id.to_owned(),
        kind,
        price,
        potency,
        priority,
    }
}

fn recipe(output: &str, inputs: &[(&str, u32)]) -> CraftRecipe {
    CraftRecipe {
        output: output.to_owned(),
        inputs: inputs.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect(),
    }
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_weapon_is_shell_blade_when_affordable() {
        let catalog = Catalog::standard();
        let upgrade = catalog.next_upgrade(EquipmentSlot::Weapon, None, 60, 1);
        assert_eq!(upgrade.map(|g| g.id.as_str()), Some("shell_blade"));
        assert_eq!(upgrade.map(|g| g.price), Some(50));
        assert_eq!(upgrade.map(|g| g.min_level), Some(1));
    }

    #[test]
    fn no_weapon_when_too_poor() {
        let catalog = Catalog::standard();
        assert!(catalog.next_upgrade(EquipmentSlot::Weapon, None, 40, 1).is_none());
    }

    #[test]
    fn upgrade_skips_lower_tiers_and_respects_level() {
        let catalog = Catalog::standard();
        let upgrade = catalog.next_upgrade(EquipmentSlot::Weapon, Some("shell_blade"), 1000, 5);
        assert_eq!(upgrade.map(|g| g.id.as_str()), Some("barnacle_sword"));

        let none = catalog.next_upgrade(EquipmentSlot::Weapon, Some("trench_trident"), 5000, 20);
        assert!(none.is_none());
    }

    #[test]
    fn optimal_zone_tracks_level_and_reputation() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.optimal_zone(1, 0), "the_shallows");
        assert_eq!(catalog.optimal_zone(3, 0), "kelp_forest");
        assert_eq!(catalog.optimal_zone(9, 0), "deep_trench");
        assert_eq!(catalog.optimal_zone(9, 60), "the_abyss");
        // The boss lair is never a farming zone.
        assert_eq!(catalog.optimal_zone(20, 500), "the_abyss");
    }

    #[test]
    fn next_hop_follows_shortest_path() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.next_hop(HUB_ZONE, "deep_trench").as_deref(), Some("kelp_forest"));
        assert_eq!(catalog.next_hop("the_abyss", HUB_ZONE).as_deref(), Some("deep_trench"));
        assert_eq!(catalog.next_hop(HUB_ZONE, HUB_ZONE), None);
        assert_eq!(catalog.next_hop("nowhere", HUB_ZONE), None);
    }

    #[test]
    fn craft_materials_are_never_sellable() {
        let mut catalog = Catalog::standard();
        catalog.sellable.insert("pearl".to_owned());
        assert!(!catalog.is_sellable("pearl"));
        assert!(catalog.is_sellable("driftwood"));
    }

    #[test]
    fn energy_costs() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.energy_cost(ActionVerb::Attack), 10);
        assert_eq!(catalog.energy_cost(ActionVerb::Flee), 5);
        assert_eq!(catalog.energy_cost(ActionVerb::Rest), 0);
    }
}
