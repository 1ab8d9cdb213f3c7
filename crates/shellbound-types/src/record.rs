//! The persisted agent record that survives across sessions.
//!
//! Serialized as a single camelCase JSON object. Created on the first
//! successful registration, overwritten at the end of every session, and
//! never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::EquipmentSlot;
use crate::state::GameState;

/// Lifetime progress and credentials for one agent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAgentRecord {
    /// Bearer key for `POST /action`. Empty after an auth failure.
    pub api_key: String,
    /// Display name used at registration.
    pub agent_name: String,
    /// Wallet that paid the entry fee.
    pub wallet_address: String,
    /// When the key was issued.
    pub registered_at: DateTime<Utc>,
    /// Status snapshot from the end of the last session.
    #[serde(default)]
    pub last_status: LastStatus,
    /// Gear worn at the end of the last session.
    #[serde(default)]
    pub known_gear: KnownGear,
    /// Whether a faction has been joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction_joined: Option<bool>,
    /// Goals chosen for the last session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_goals: Option<Vec<String>>,
    /// Counters accumulated over every session.
    #[serde(default)]
    pub lifetime: LifetimeStats,
}

impl PersistedAgentRecord {
    /// A fresh record for a newly issued key.
    pub fn new(api_key: String, agent_name: String, wallet_address: String) -> Self {
        Self {
            api_key,
            agent_name,
            wallet_address,
            registered_at: Utc::now(),
            last_status: LastStatus::default(),
            known_gear: KnownGear::default(),
            faction_joined: None,
            session_goals: None,
            lifetime: LifetimeStats::default(),
        }
    }

    /// Whether the record still carries a usable key.
    pub fn has_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Snapshot of the agent's status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LastStatus {
    /// Level.
    pub level: u32,
    /// Hp.
    pub hp: u32,
    /// Max hp.
    pub max_hp: u32,
    /// Energy.
    pub energy: u32,
    /// Max energy.
    pub max_energy: u32,
    /// Zone id.
    pub zone: String,
    /// Currency.
    pub shells: u64,
    /// Experience.
    pub xp: u64,
    /// Faction, if joined.
    pub faction: Option<String>,
    /// Reputation.
    pub reputation: i64,
}

impl From<&GameState> for LastStatus {
    fn from(state: &GameState) -> Self {
        Self {
            level: state.level,
            hp: state.hp,
            max_hp: state.max_hp,
            energy: state.energy,
            max_energy: state.max_energy,
            zone: state.zone.clone(),
            shells: state.shells,
            xp: state.xp,
            faction: state.faction.clone(),
            reputation: state.reputation,
        }
    }
}

/// Last known equipment per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownGear {
    /// Weapon id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,
    /// Armor id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub armor: Option<String>,
    /// Accessory id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessory: Option<String>,
}

impl KnownGear {
    /// Item worn in a slot.
    pub fn get(&self, slot: EquipmentSlot) -> Option<&str> {
        match slot {
            EquipmentSlot::Weapon => self.weapon.as_deref(),
            EquipmentSlot::Armor => self.armor.as_deref(),
            EquipmentSlot::Accessory => self.accessory.as_deref(),
        }
    }
}

impl From<&GameState> for KnownGear {
    fn from(state: &GameState) -> Self {
        Self {
            weapon: state.equipment.get(&EquipmentSlot::Weapon).cloned(),
            armor: state.equipment.get(&EquipmentSlot::Armor).cloned(),
            accessory: state.equipment.get(&EquipmentSlot::Accessory).cloned(),
        }
    }
}

/// Counters accumulated across sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifetimeStats {
    /// Sessions run.
    pub sessions: u64,
    /// Successful actions.
    pub total_actions: u64,
    /// Experience gained.
    pub total_xp: u64,
    /// Currency gained.
    pub total_shells: u64,
    /// Creatures and agents defeated.
    pub kills: u64,
    /// Times the agent died.
    pub deaths: u64,
}
