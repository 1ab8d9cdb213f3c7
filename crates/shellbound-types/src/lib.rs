//! Shared type definitions for the Shellbound agent.
//!
//! This crate is the single source of truth for the data the decision
//! engine works with and the records it leaves behind for the reporting
//! layer. It performs no I/O.
//!
//! # Modules
//!
//! - [`enums`] -- Action verbs, session modes, slots, factions
//! - [`state`] -- The canonical [`GameState`] and its parts
//! - [`profile`] -- Emotion input and behavior profile
//! - [`actions`] -- Action candidates and the `POST /action` wire types
//! - [`catalog`] -- Static zone, gear, consumable and recipe tables
//! - [`record`] -- The persisted agent record
//! - [`report`] -- The session report

pub mod actions;
pub mod catalog;
pub mod enums;
pub mod profile;
pub mod record;
pub mod report;
pub mod state;

// Re-export all public types at crate root for convenience.
pub use actions::{ActionCandidate, ActionKey, ActionRequest, ActionResponse};
pub use catalog::{Catalog, ConsumableSpec, CraftRecipe, GearTier, HUB_ZONE, ZoneSpec};
pub use enums::{ActionVerb, ConsumableKind, EquipmentSlot, Faction, SessionMode};
pub use profile::{BehaviorProfile, EmotionVector};
pub use record::{KnownGear, LastStatus, LifetimeStats, PersistedAgentRecord};
pub use report::{HistoryEntry, ReflectionBucket, SessionReport, SessionStats};
pub use state::{CombatState, Creature, GameState, InventoryItem, Quest, ResourceNode, TutorialHint};
