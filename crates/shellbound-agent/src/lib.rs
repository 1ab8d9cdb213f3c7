//! Autonomous agent for the Shellbound text RPG.
//!
//! One run is one bounded session:
//!
//! ```text
//! register --> survey --> (escape) --> (prepare at hub) --> decide/act loop --> report
//! ```
//!
//! Observations come back as loosely shaped JSON plus free-text narrative;
//! [`extract`] and [`narrative`] turn them into a [`shellbound_types::GameState`].
//! [`scoring`] proposes and ranks actions, and [`session`] drives the loop,
//! persists the agent record and always produces a
//! [`shellbound_types::SessionReport`].

pub mod behavior;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod narrative;
pub mod payment;
pub mod planner;
pub mod registration;
pub mod report;
pub mod scoring;
pub mod session;
pub mod store;

pub use behavior::{EmotionSource, JsonEmotionSource, map_profile};
pub use cancel::CancelFlag;
pub use client::{EntryStatus, GameApi, GameClient};
pub use config::{AgentConfig, SessionParams, SessionTuning};
pub use error::AgentError;
pub use payment::{PaymentRail, PaymentRequest, ReceiptStatus, RelayPaymentRail};
pub use registration::ensure_registered;
pub use session::{EndReason, SessionController, SessionPhase};
pub use store::{JsonRecordStore, RecordStore};
