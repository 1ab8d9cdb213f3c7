//! Canonical world state reconstructed from the game service.
//!
//! A [`GameState`] is rebuilt on every refresh from the raw `look` and
//! `status` responses and is never persisted. Everything the decision
//! engine knows about the world lives here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enums::{ConsumableKind, EquipmentSlot};

// ---------------------------------------------------------------------------
// Combat sub-state
// ---------------------------------------------------------------------------

/// Whether the agent is locked in a fight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CombatState {
    /// Free to take any action.
    #[default]
    OutOfCombat,
    /// Only fight, attack, flee, use and rest are legal.
    InCombat {
        /// The opponent, when the narrative names one.
        enemy: Option<String>,
    },
}

impl CombatState {
    /// True while locked in a fight.
    pub const fn is_in_combat(&self) -> bool {
        matches!(self, Self::InCombat { .. })
    }

    /// The named opponent, if any.
    pub fn enemy(&self) -> Option<&str> {
        match self {
            Self::InCombat { enemy } => enemy.as_deref(),
            Self::OutOfCombat => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Things visible in the zone
// ---------------------------------------------------------------------------

/// A hostile creature seen in the current zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creature {
    /// Display name as it appears in the narrative.
    pub name: String,
    /// Creature level when the narrative states it.
    pub level: Option<u32>,
}

/// A gatherable resource node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Resource id, normalized to `snake_case`.
    pub id: String,
    /// Units still available.
    pub quantity: u32,
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// One stack in the agent's inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item id (`shell_blade`, `kelp_fronds`, ...).
    pub id: String,
    /// Stack size.
    pub quantity: u32,
    /// Item type as reported by the service (`weapon`, `material`, `loot`, ...).
    pub item_type: String,
    /// Whether the item is currently worn.
    pub equipped: bool,
    /// Slot the item fits, for gear.
    pub slot: Option<EquipmentSlot>,
    /// Stat bonuses (`attack`, `defense`, `max_hp`, ...).
    pub stats: BTreeMap<String, i64>,
}

/// Quest as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    /// Quest id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// `available`, `active`, `complete`, ...
    pub status: String,
}

impl Quest {
    /// Whether the quest is ready to turn in.
    pub fn is_ready_to_complete(&self) -> bool {
        matches!(
            self.status.to_lowercase().as_str(),
            "complete" | "completed" | "ready"
        )
    }
}

/// Tutorial guidance attached to new agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialHint {
    /// Tutorial step number.
    pub step: u32,
    /// Free-text hint for the step.
    pub hint: String,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

/// Everything the agent currently knows about itself and its zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Current zone id (empty when unknown).
    pub zone: String,
    /// Character level.
    pub level: u32,
    /// Current hp.
    pub hp: u32,
    /// Maximum hp.
    pub max_hp: u32,
    /// Current energy.
    pub energy: u32,
    /// Maximum energy.
    pub max_energy: u32,
    /// Currency held.
    pub shells: u64,
    /// Experience points.
    pub xp: u64,
    /// Reputation score.
    pub reputation: i64,
    /// Joined faction, if any.
    pub faction: Option<String>,
    /// Creatures visible in the zone.
    pub creatures: Vec<Creature>,
    /// Gatherable resources in the zone.
    pub resources: Vec<ResourceNode>,
    /// Other agents in the zone.
    pub other_agents: Vec<String>,
    /// Zones reachable from here.
    pub connected_zones: Vec<String>,
    /// Inventory stacks.
    pub inventory: Vec<InventoryItem>,
    /// Worn item per slot.
    pub equipment: BTreeMap<EquipmentSlot, String>,
    /// Maximum number of inventory stacks.
    pub inventory_capacity: u32,
    /// Combat sub-state.
    pub combat: CombatState,
    /// Whether the agent is flagged for PvP.
    pub pvp_flagged: bool,
    /// Current tutorial step, for new agents.
    pub tutorial: Option<TutorialHint>,
    /// Quests the agent knows about.
    pub quests: Vec<Quest>,
    /// Quest currently in progress.
    pub active_quest: Option<String>,
    /// Raw narrative from the last response, kept for re-parsing.
    pub narrative: String,
    /// Zone is unrecognized and has no known exits.
    pub needs_escape: bool,
}

impl GameState {
    /// Hp as a fraction of max hp (1.0 when max hp is unknown).
    pub fn hp_ratio(&self) -> f64 {
        ratio(self.hp, self.max_hp)
    }

    /// Energy as a fraction of max energy (1.0 when max energy is unknown).
    pub fn energy_ratio(&self) -> f64 {
        ratio(self.energy, self.max_energy)
    }

    /// True while in combat.
    pub const fn in_combat(&self) -> bool {
        self.combat.is_in_combat()
    }

    /// Total quantity held of an item id.
    pub fn item_quantity(&self, id: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|item| item.id == id)
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Whether at least one of the item is held.
    pub fn has_item(&self, id: &str) -> bool {
        self.item_quantity(id) > 0
    }

    /// Inventory stacks as a fraction of capacity.
    pub fn inventory_fill(&self) -> f64 {
        let used = u32::try_from(self.inventory.len()).unwrap_or(u32::MAX);
        ratio(used, self.inventory_capacity).min(1.0)
    }

    /// Whether any held item is of the given consumable kind according to
    /// its reported item type.
    pub fn has_consumable_type(&self, kind: ConsumableKind) -> bool {
        let wanted = kind.as_str();
        self.inventory
            .iter()
            .any(|item| item.quantity > 0 && item.item_type.eq_ignore_ascii_case(wanted))
    }
}

fn ratio(value: u32, max: u32) -> f64 {
    if max == 0 {
        1.0
    } else {
        f64::from(value) / f64::from(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_handle_unknown_maximums() {
        let state = GameState {
            hp: 30,
            max_hp: 0,
            ..GameState::default()
        };
        assert!((state.hp_ratio() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn item_quantity_sums_stacks() {
        let state = GameState {
            inventory: vec![
                InventoryItem {
                    id: "kelp_fronds".to_owned(),
                    quantity: 2,
                    ..InventoryItem::default()
                },
                InventoryItem {
                    id: "kelp_fronds".to_owned(),
                    quantity: 3,
                    ..InventoryItem::default()
                },
            ],
            ..GameState::default()
        };
        assert_eq!(state.item_quantity("kelp_fronds"), 5);
        assert!(!state.has_item("pearl"));
    }

    #[test]
    fn combat_enemy_accessor() {
        let combat = CombatState::InCombat {
            enemy: Some("reef shark".to_owned()),
        };
        assert!(combat.is_in_combat());
        assert_eq!(combat.enemy(), Some("reef shark"));
        assert_eq!(CombatState::OutOfCombat.enemy(), None);
    }
}
