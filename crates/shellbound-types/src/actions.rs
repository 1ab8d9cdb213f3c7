//! Action request/response types for `POST /action`, and the scored
//! candidates the decision engine produces before picking one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::enums::ActionVerb;

/// A possible next action with its desirability score.
///
/// Generated and discarded on every loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    /// What to do.
    pub verb: ActionVerb,
    /// Who or what to do it to.
    pub target: Option<String>,
    /// Extra parameters sent as `params`.
    pub params: Option<Map<String, Value>>,
    /// Higher is better.
    pub score: f64,
    /// Why the scorer proposed it.
    pub reason: String,
}

impl ActionCandidate {
    /// Build a candidate without parameters.
    pub fn new(verb: ActionVerb, target: Option<&str>, score: f64, reason: impl Into<String>) -> Self {
        Self {
            verb,
            target: target.map(ToOwned::to_owned),
            params: None,
            score,
            reason: reason.into(),
        }
    }

    /// Attach a single parameter.
    #[must_use]
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.to_owned(), value.into());
        self
    }

    /// Identity used by the loop guard, cooldowns and rejection tracking.
    pub fn key(&self) -> ActionKey {
        ActionKey {
            verb: self.verb,
            target: self.target.clone(),
        }
    }

    /// The wire request for this candidate.
    pub fn to_request(&self) -> ActionRequest {
        ActionRequest {
            action: self.verb,
            target: self.target.clone(),
            params: self.params.clone(),
        }
    }
}

/// Action and target pair, ignoring parameters and score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    /// The verb.
    pub verb: ActionVerb,
    /// The target, if any.
    pub target: Option<String>,
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "{}:{target}", self.verb),
            None => write!(f, "{}", self.verb),
        }
    }
}

/// Body of `POST /action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The verb.
    pub action: ActionVerb,
    /// Optional target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl ActionRequest {
    /// A bare request with no target or parameters.
    pub const fn bare(action: ActionVerb) -> Self {
        Self {
            action,
            target: None,
            params: None,
        }
    }

    /// A request with a target.
    pub fn targeted(action: ActionVerb, target: &str) -> Self {
        Self {
            action,
            target: Some(target.to_owned()),
            params: None,
        }
    }
}

/// Response of `POST /action`.
///
/// Only `success` is guaranteed. `agent` and `inventory` are kept as raw
/// JSON because their shape varies between game builds; the extractor
/// reads them leniently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionResponse {
    /// Whether the action was accepted.
    pub success: bool,
    /// Updated agent fields.
    pub agent: Option<Value>,
    /// Updated inventory.
    pub inventory: Option<Value>,
    /// Free-text narrative of what happened.
    pub narrative: Option<String>,
    /// Short message, usually the rejection reason.
    pub message: Option<String>,
    /// Reward payload.
    pub reward: Option<Value>,
    /// Loot payload.
    pub loot: Option<Value>,
    /// Experience gained.
    pub xp: Option<Value>,
    /// Any other top-level fields (`quests`, `tutorial`, `exits`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionResponse {
    /// Narrative and message joined for text mining.
    pub fn text(&self) -> String {
        match (&self.narrative, &self.message) {
            (Some(n), Some(m)) => format!("{n}\n{m}"),
            (Some(n), None) => n.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_empty_fields() {
        let json = serde_json::to_value(ActionRequest::bare(ActionVerb::Look)).unwrap_or_default();
        assert_eq!(json, serde_json::json!({"action": "look"}));
    }

    #[test]
    fn candidate_params_serialize_as_object() {
        let candidate = ActionCandidate::new(ActionVerb::Sell, Some("driftwood"), 10.0, "junk")
            .with_param("quantity", 3);
        let json = serde_json::to_value(candidate.to_request()).unwrap_or_default();
        assert_eq!(json["params"]["quantity"], 3);
        assert_eq!(json["target"], "driftwood");
    }

    #[test]
    fn rejection_response_parses_with_defaults() {
        let response: ActionResponse =
            serde_json::from_str(r#"{"success": false, "message": "You are in combat!"}"#)
                .unwrap_or_default();
        assert!(!response.success);
        assert_eq!(response.text(), "You are in combat!");
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let raw = serde_json::json!({"success": true, "quests": [{"id": "crab_cull"}]});
        let response: ActionResponse = serde_json::from_value(raw).unwrap_or_default();
        assert!(response.extra.contains_key("quests"));
        let back = serde_json::to_value(&response).unwrap_or_default();
        assert_eq!(back["quests"][0]["id"], "crab_cull");
    }

    #[test]
    fn action_key_display() {
        let key = ActionCandidate::new(ActionVerb::Move, Some("kelp_forest"), 1.0, "").key();
        assert_eq!(key.to_string(), "move:kelp_forest");
    }
}
