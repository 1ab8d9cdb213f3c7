//! Enumeration types shared by the agent and the reporting layer.
//!
//! Wire names match the game service exactly (`snake_case`), so every enum
//! here round-trips through `serde` without custom code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Action verbs
// ---------------------------------------------------------------------------

/// An action the agent can submit to `POST /action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVerb {
    /// Recover hp and energy in place.
    Rest,
    /// Use a consumable from the inventory.
    Use,
    /// Engage a creature in the current zone.
    Fight,
    /// Continue an ongoing fight, or strike another agent.
    Attack,
    /// Leave the current fight.
    Flee,
    /// Harvest a resource in the current zone.
    Gather,
    /// Walk to a connected zone.
    Move,
    /// Alternate movement verb accepted by some game builds.
    Travel,
    /// Wander without a destination.
    Explore,
    /// Accept a quest.
    AcceptQuest,
    /// Turn in a finished quest.
    CompleteQuest,
    /// List quests available in the zone.
    Quests,
    /// Sell an item at the hub.
    Sell,
    /// Buy an item at the hub.
    Buy,
    /// Combine materials into an item.
    Craft,
    /// Equip an item from the inventory.
    Equip,
    /// Join a faction.
    JoinFaction,
    /// Store valuables in the vault.
    Deposit,
    /// Challenge a zone boss.
    Challenge,
    /// Browse the hub shop.
    Browse,
    /// Send a message to everyone in the zone.
    Broadcast,
    /// Read the inbox.
    Inbox,
    /// Check open trade offers.
    Trades,
    /// Describe the surroundings.
    Look,
    /// Report the agent's own status.
    Status,
    /// Report the true inventory.
    Inventory,
}

impl ActionVerb {
    /// Wire name sent in the `action` field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Use => "use",
            Self::Fight => "fight",
            Self::Attack => "attack",
            Self::Flee => "flee",
            Self::Gather => "gather",
            Self::Move => "move",
            Self::Travel => "travel",
            Self::Explore => "explore",
            Self::AcceptQuest => "accept_quest",
            Self::CompleteQuest => "complete_quest",
            Self::Quests => "quests",
            Self::Sell => "sell",
            Self::Buy => "buy",
            Self::Craft => "craft",
            Self::Equip => "equip",
            Self::JoinFaction => "join_faction",
            Self::Deposit => "deposit",
            Self::Challenge => "challenge",
            Self::Browse => "browse",
            Self::Broadcast => "broadcast",
            Self::Inbox => "inbox",
            Self::Trades => "trades",
            Self::Look => "look",
            Self::Status => "status",
            Self::Inventory => "inventory",
        }
    }

    /// Verbs that are legal while the agent is in combat.
    pub const fn is_combat_legal(self) -> bool {
        matches!(
            self,
            Self::Fight | Self::Attack | Self::Flee | Self::Use | Self::Rest
        )
    }

    /// Verbs whose success changes enough world state that the agent
    /// re-surveys afterwards.
    pub const fn mutates_state(self) -> bool {
        matches!(
            self,
            Self::Move
                | Self::Travel
                | Self::Explore
                | Self::Fight
                | Self::Attack
                | Self::Flee
                | Self::Buy
                | Self::Sell
                | Self::Use
                | Self::JoinFaction
                | Self::Challenge
        )
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session mode
// ---------------------------------------------------------------------------

/// Caller-selected play style that biases scoring constants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Balanced play with a bias toward travel.
    #[default]
    Adventure,
    /// Fight and gather in the best farming zone.
    Grind,
    /// Prioritize quest actions.
    Quest,
    /// Prioritize broadcasts, inbox and trades.
    Social,
    /// Hunt other agents outside safe zones.
    Pvp,
}

impl SessionMode {
    /// Lowercase name as accepted by the configuration loader.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Adventure => "adventure",
            Self::Grind => "grind",
            Self::Quest => "quest",
            Self::Social => "social",
            Self::Pvp => "pvp",
        }
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "adventure" => Ok(Self::Adventure),
            "grind" => Ok(Self::Grind),
            "quest" => Ok(Self::Quest),
            "social" => Ok(Self::Social),
            "pvp" => Ok(Self::Pvp),
            other => Err(format!("unknown session mode: {other}")),
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

/// One of the three equipment slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    /// Main-hand weapon.
    Weapon,
    /// Body armor.
    Armor,
    /// Ring, charm or trinket.
    Accessory,
}

impl EquipmentSlot {
    /// All slots in planner order.
    pub const ALL: [Self; 3] = [Self::Weapon, Self::Armor, Self::Accessory];

    /// Wire name of the slot.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Armor => "armor",
            Self::Accessory => "accessory",
        }
    }

    /// Parse a slot name as reported by the service.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "weapon" | "mainhand" | "main_hand" => Some(Self::Weapon),
            "armor" | "armour" | "body" => Some(Self::Armor),
            "accessory" | "trinket" | "ring" => Some(Self::Accessory),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Consumables and factions
// ---------------------------------------------------------------------------

/// What a consumable does when used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumableKind {
    /// Restores hp.
    Healing,
    /// Restores energy.
    Energy,
    /// Temporary combat bonus.
    Buff,
    /// Required to survive hazardous zones.
    Survival,
}

impl ConsumableKind {
    /// Item type string the service reports for this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healing => "healing",
            Self::Energy => "energy",
            Self::Buff => "buff",
            Self::Survival => "survival",
        }
    }
}

/// A faction the agent can join once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    /// Aggressive raiders.
    Cult,
    /// Traders and hoarders.
    Salvagers,
    /// Defenders of the reef.
    Wardens,
}

impl Faction {
    /// Wire name of the faction.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cult => "cult",
            Self::Salvagers => "salvagers",
            Self::Wardens => "wardens",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_wire_names_match_serde() {
        for verb in [ActionVerb::AcceptQuest, ActionVerb::JoinFaction, ActionVerb::Rest] {
            let json = serde_json::to_string(&verb).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", verb.as_str()));
        }
    }

    #[test]
    fn combat_legal_verbs() {
        assert!(ActionVerb::Flee.is_combat_legal());
        assert!(ActionVerb::Use.is_combat_legal());
        assert!(!ActionVerb::Move.is_combat_legal());
        assert!(!ActionVerb::Gather.is_combat_legal());
    }

    #[test]
    fn session_mode_parses_case_insensitively() {
        assert_eq!("GRIND".parse::<SessionMode>(), Ok(SessionMode::Grind));
        assert_eq!(" pvp ".parse::<SessionMode>(), Ok(SessionMode::Pvp));
        assert!("raid".parse::<SessionMode>().is_err());
    }

    #[test]
    fn slot_aliases() {
        assert_eq!(EquipmentSlot::parse("Armour"), Some(EquipmentSlot::Armor));
        assert_eq!(EquipmentSlot::parse("hat"), None);
    }
}
