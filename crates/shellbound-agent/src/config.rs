//! Configuration types for the agent.
//!
//! All configuration is loaded from environment variables. The agent needs
//! to know how to reach the game service, which wallet it plays for, where
//! its persisted record lives, and how the caller wants this session played.

use std::path::PathBuf;
use std::time::Duration;

use shellbound_types::SessionMode;

use crate::error::AgentError;

/// Default number of successful actions per session.
pub const DEFAULT_MAX_ACTIONS: u32 = 40;

/// Smallest accepted action budget.
pub const MIN_MAX_ACTIONS: u32 = 5;

/// Contract that collects the one-time entry fee.
pub const DEFAULT_ENTRY_CONTRACT: &str = "0x5e11b0a7d0000000000000000000000000c0ffee";

/// Complete agent configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the game service (e.g. `https://api.example-game.xyz`).
    pub api_url: String,
    /// Wallet the agent plays for.
    pub wallet_address: String,
    /// Display name used at registration.
    pub agent_name: String,
    /// Where the persisted agent record is stored.
    pub record_path: PathBuf,
    /// JSON file holding the current emotion vector, if any.
    pub emotion_state_path: Option<PathBuf>,
    /// Fixed pause after every outbound call.
    pub call_delay: Duration,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// Signer relay used to pay the entry fee.
    pub payment_relay_url: Option<String>,
    /// Contract that receives the entry fee.
    pub entry_contract: String,
    /// Session parameters supplied by the caller.
    pub session: SessionParams,
    /// Loop tuning knobs.
    pub tuning: SessionTuning,
}

/// Caller-supplied parameters for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Scoring bias.
    pub mode: SessionMode,
    /// Ceiling on successful actions (at least [`MIN_MAX_ACTIONS`]).
    pub max_actions: u32,
    /// Destination that overrides the computed farming zone.
    pub target_zone: Option<String>,
}

impl SessionParams {
    /// Build parameters, clamping the action budget to the minimum.
    pub fn new(mode: SessionMode, max_actions: u32, target_zone: Option<String>) -> Self {
        Self {
            mode,
            max_actions: max_actions.max(MIN_MAX_ACTIONS),
            target_zone: target_zone.filter(|z| !z.trim().is_empty()),
        }
    }
}

impl Default for SessionParams {
    fn default() -> Self {
        Self::new(SessionMode::Adventure, DEFAULT_MAX_ACTIONS, None)
    }
}

/// Timing and guard constants for the main loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTuning {
    /// Minimum time between two rests.
    pub rest_cooldown: Duration,
    /// Minimum time between two broadcasts.
    pub broadcast_cooldown: Duration,
    /// Minimum time between two inbox or trade checks.
    pub social_cooldown: Duration,
    /// Number of identical consecutive actions that trips the loop guard.
    pub loop_guard_window: usize,
    /// Score removed from a repeated action.
    pub loop_guard_penalty: f64,
    /// Successful actions between forced context refreshes.
    pub refresh_every: u32,
    /// Backoff unit for rate limits; multiplied by the consecutive count.
    pub rate_limit_backoff: Duration,
    /// Transport errors in a row that end the session.
    pub max_consecutive_errors: u32,
    /// Iterations a rejected action stays excluded.
    pub rejection_memory: u32,
    /// Score removed per earlier refusal of the same action in this zone.
    pub rejection_penalty: f64,
    /// Candidates surfaced in the log before each pick.
    pub top_n: usize,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            rest_cooldown: Duration::from_secs(20),
            broadcast_cooldown: Duration::from_secs(120),
            social_cooldown: Duration::from_secs(60),
            loop_guard_window: 3,
            loop_guard_penalty: 25.0,
            refresh_every: 5,
            rate_limit_backoff: Duration::from_secs(5),
            max_consecutive_errors: 3,
            rejection_memory: 2,
            rejection_penalty: 20.0,
            top_n: 5,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// Required variables:
    /// - `GAME_API_URL` -- base URL of the game service
    /// - `WALLET_ADDRESS` -- wallet the agent plays for
    ///
    /// Optional variables:
    /// - `AGENT_NAME` -- display name (default `Shellbound`)
    /// - `RECORD_PATH` -- persisted record file (default `agent-record.json`)
    /// - `EMOTION_STATE_PATH` -- JSON emotion vector file
    /// - `SESSION_MODE` -- adventure, grind, quest, social or pvp (default adventure)
    /// - `MAX_ACTIONS` -- action budget (default 40, minimum 5)
    /// - `TARGET_ZONE` -- destination override
    /// - `CALL_DELAY_MS` -- pause after every call (default 1500)
    /// - `REQUEST_TIMEOUT_MS` -- HTTP timeout (default 15000)
    /// - `RATE_LIMIT_BACKOFF_MS` -- backoff unit (default 5000)
    /// - `PAYMENT_RELAY_URL` -- signer relay for the entry fee
    /// - `ENTRY_CONTRACT_ADDRESS` -- fee contract (default [`DEFAULT_ENTRY_CONTRACT`])
    pub fn from_env() -> Result<Self, AgentError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AgentError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AgentError::Config(format!("missing required env var {name}")))
        };

        let api_url = required("GAME_API_URL")?.trim_end_matches('/').to_owned();
        let wallet_address = required("WALLET_ADDRESS")?;

        let mode: SessionMode = lookup("SESSION_MODE")
            .unwrap_or_else(|| "adventure".to_owned())
            .parse()
            .map_err(|e| AgentError::Config(format!("invalid SESSION_MODE: {e}")))?;

        let max_actions: u32 = parse_or(&lookup, "MAX_ACTIONS", DEFAULT_MAX_ACTIONS)?;
        let call_delay_ms: u64 = parse_or(&lookup, "CALL_DELAY_MS", 1500)?;
        let request_timeout_ms: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_MS", 15_000)?;
        let backoff_ms: u64 = parse_or(&lookup, "RATE_LIMIT_BACKOFF_MS", 5000)?;

        let tuning = SessionTuning {
            rate_limit_backoff: Duration::from_millis(backoff_ms),
            ..SessionTuning::default()
        };

        Ok(Self {
            api_url,
            wallet_address,
            agent_name: lookup("AGENT_NAME").unwrap_or_else(|| "Shellbound".to_owned()),
            record_path: lookup("RECORD_PATH")
                .map_or_else(|| PathBuf::from("agent-record.json"), PathBuf::from),
            emotion_state_path: lookup("EMOTION_STATE_PATH").map(PathBuf::from),
            call_delay: Duration::from_millis(call_delay_ms),
            request_timeout: Duration::from_millis(request_timeout_ms),
            payment_relay_url: lookup("PAYMENT_RELAY_URL"),
            entry_contract: lookup("ENTRY_CONTRACT_ADDRESS")
                .unwrap_or_else(|| DEFAULT_ENTRY_CONTRACT.to_owned()),
            session: SessionParams::new(mode, max_actions, lookup("TARGET_ZONE")),
            tuning,
        })
    }
}

/// Parse an optional variable, falling back to a default when unset.
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T, AgentError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AgentError::Config(format!("invalid {name}: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("GAME_API_URL", "https://game.test/"),
            ("WALLET_ADDRESS", "0xabc"),
        ]));
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.api_url, "https://game.test");
            assert_eq!(config.session.mode, SessionMode::Adventure);
            assert_eq!(config.session.max_actions, DEFAULT_MAX_ACTIONS);
            assert_eq!(config.call_delay, Duration::from_millis(1500));
            assert_eq!(config.entry_contract, DEFAULT_ENTRY_CONTRACT);
        }
    }

    #[test]
    fn missing_wallet_is_a_config_error() {
        let config = AgentConfig::from_lookup(lookup_from(&[("GAME_API_URL", "https://game.test")]));
        assert!(matches!(config, Err(AgentError::Config(_))));
    }

    #[test]
    fn max_actions_is_clamped_to_minimum() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("GAME_API_URL", "https://game.test"),
            ("WALLET_ADDRESS", "0xabc"),
            ("MAX_ACTIONS", "2"),
            ("SESSION_MODE", "grind"),
            ("TARGET_ZONE", "kelp_forest"),
        ]));
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.session.max_actions, MIN_MAX_ACTIONS);
            assert_eq!(config.session.mode, SessionMode::Grind);
            assert_eq!(config.session.target_zone.as_deref(), Some("kelp_forest"));
        }
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let config = AgentConfig::from_lookup(lookup_from(&[
            ("GAME_API_URL", "https://game.test"),
            ("WALLET_ADDRESS", "0xabc"),
            ("CALL_DELAY_MS", "soon"),
        ]));
        assert!(matches!(config, Err(AgentError::Config(_))));
    }
}
