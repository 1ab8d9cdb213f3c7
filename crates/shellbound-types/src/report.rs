//! Session result returned to the caller and logged for the dashboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{EquipmentSlot, SessionMode};
use crate::record::LifetimeStats;

/// Outcome bucket used to pick the reflection line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionBucket {
    /// Died without defeating anything.
    DeathWithoutKills,
    /// Three or more kills.
    MultiKill,
    /// At least 100 xp gained.
    LargeXpGain,
    /// At least 100 shells gained.
    LargeCurrencyGain,
    /// Cancelled before five actions.
    KilledEarly,
    /// Fewer than three actions.
    BarelyStarted,
    /// Nothing remarkable.
    Neutral,
}

/// One executed action in the session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Verb wire name.
    pub action: String,
    /// Target, if any.
    pub target: Option<String>,
    /// Whether the service accepted it.
    pub success: bool,
    /// Score at the time of the pick.
    pub score: f64,
    /// Scorer's reason.
    pub reason: String,
}

/// Statistics bundle attached to every report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Zone at the end of the session.
    pub final_zone: String,
    /// Level at the end.
    pub level: u32,
    /// Hp at the end.
    pub hp: u32,
    /// Energy at the end.
    pub energy: u32,
    /// Shells at the end.
    pub shells: u64,
    /// Xp at the end.
    pub xp: u64,
    /// Successful actions.
    pub actions_performed: u32,
    /// Kills this session.
    pub kills: u32,
    /// Deaths this session.
    pub deaths: u32,
    /// Xp gained (negative after a death penalty).
    pub xp_delta: i64,
    /// Shells gained or spent.
    pub shells_delta: i64,
    /// Worn gear at the end.
    pub equipment: BTreeMap<EquipmentSlot, String>,
    /// Faction at the end.
    pub faction: Option<String>,
    /// Best farming zone for the final level.
    pub optimal_zone: String,
    /// Every executed action, in order.
    pub history: Vec<HistoryEntry>,
    /// Lifetime counters after this session.
    pub lifetime: LifetimeStats,
}

/// The structured result of one session. Always produced, even when
/// registration fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session id (UUID v7).
    pub session_id: Uuid,
    /// Mode the session ran in.
    pub mode: SessionMode,
    /// Whether the session ran to a normal end.
    pub success: bool,
    /// One-line summary.
    pub summary: String,
    /// Outcome bucket.
    pub bucket: ReflectionBucket,
    /// Mood line for the bucket.
    pub reflection: String,
    /// Statistics.
    pub stats: SessionStats,
}
