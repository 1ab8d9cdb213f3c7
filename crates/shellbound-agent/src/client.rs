//! Game service HTTP client.
//!
//! [`GameApi`] is the seam between the session logic and the network; the
//! controller, registration flow and planner are generic over it so tests
//! can drive them with scripted responses. [`GameClient`] is the `reqwest`
//! implementation used in production.
//!
//! Every call is followed by a fixed pause (`call_delay`) because the
//! service enforces a strict per-key rate limit. Calls are never issued
//! concurrently.

use std::time::Duration;

use serde_json::Value;
use shellbound_types::{ActionRequest, ActionResponse};
use tracing::{debug, warn};

use crate::error::AgentError;

/// Whether the wallet has already paid the one-time entry fee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryStatus {
    /// Fee has been paid.
    pub paid: bool,
    /// An agent is already registered for the wallet.
    pub registered: bool,
}

/// Operations the agent needs from the game service.
#[allow(async_fn_in_trait)]
pub trait GameApi {
    /// `GET /enter/status/{wallet}`.
    async fn entry_status(&self, wallet: &str) -> Result<EntryStatus, AgentError>;

    /// `GET /world/season`; the raw body, fee parsing happens in registration.
    async fn season(&self) -> Result<Value, AgentError>;

    /// `POST /enter`; returns the issued API key.
    async fn enter(&self, wallet: &str, name: &str) -> Result<String, AgentError>;

    /// `POST /action`.
    ///
    /// A rejected action is an `Ok` response with `success == false`, not
    /// an error.
    async fn act(&self, api_key: &str, request: &ActionRequest) -> Result<ActionResponse, AgentError>;
}

/// `reqwest` implementation of [`GameApi`].
pub struct GameClient {
    client: reqwest::Client,
    base_url: String,
    call_delay: Duration,
}

impl GameClient {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration, call_delay: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            call_delay,
        })
    }

    /// Send a request, read the body as JSON, then wait out the call delay.
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<(u16, Value), AgentError> {
        let result = request.send().await;
        let outcome = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
                debug!(call = what, status = status, "game service responded");
                Ok((status, body))
            }
            Err(e) => {
                warn!(call = what, error = %e, "game service request failed");
                Err(AgentError::from(e))
            }
        };
        tokio::time::sleep(self.call_delay).await;
        outcome
    }
}

impl GameApi for GameClient {
    async fn entry_status(&self, wallet: &str) -> Result<EntryStatus, AgentError> {
        let url = format!("{}/enter/status/{wallet}", self.base_url);
        let (status, body) = self.send(self.client.get(&url), "entry_status").await?;
        ensure_success(status, &body)?;
        Ok(parse_entry_status(&body))
    }

    async fn season(&self) -> Result<Value, AgentError> {
        let url = format!("{}/world/season", self.base_url);
        let (status, body) = self.send(self.client.get(&url), "season").await?;
        ensure_success(status, &body)?;
        Ok(body)
    }

    async fn enter(&self, wallet: &str, name: &str) -> Result<String, AgentError> {
        let url = format!("{}/enter", self.base_url);
        let payload = serde_json::json!({ "wallet": wallet, "name": name });
        let (status, body) = self
            .send(self.client.post(&url).json(&payload), "enter")
            .await?;
        ensure_success(status, &body)?;
        extract_api_key(&body).ok_or_else(|| {
            AgentError::Registration(format!("enter response carried no api key: {body}"))
        })
    }

    async fn act(&self, api_key: &str, request: &ActionRequest) -> Result<ActionResponse, AgentError> {
        let url = format!("{}/action", self.base_url);
        let builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(request);
        let (status, body) = self.send(builder, request.action.as_str()).await?;
        interpret_action_response(status, body)
    }
}

/// Map a non-success status to the matching error.
fn ensure_success(status: u16, body: &Value) -> Result<(), AgentError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(classify_status(status, body))
}

/// Classify an HTTP failure: 401/403 auth, 429 rate limit, the rest generic.
pub fn classify_status(status: u16, body: &Value) -> AgentError {
    let message = body_message(body);
    match status {
        401 | 403 => AgentError::Unauthorized(message),
        429 => AgentError::RateLimited(message),
        503 => AgentError::ServiceUnavailable(message),
        _ if mentions_rate_limit(&message) => AgentError::RateLimited(message),
        _ => AgentError::Http { status, message },
    }
}

/// Turn an `/action` reply into a response or an error.
///
/// Game-level rejections arrive either as 200 with `success: false` or as a
/// 4xx carrying the same JSON shape; both become `Ok` rejections. Rejections
/// whose message is really a rate-limit notice become [`AgentError::RateLimited`].
fn interpret_action_response(status: u16, body: Value) -> Result<ActionResponse, AgentError> {
    if matches!(status, 401 | 403 | 429) || status >= 500 {
        return Err(classify_status(status, &body));
    }
    let has_success_flag = body.get("success").is_some_and(Value::is_boolean);
    let ok_status = (200..300).contains(&status);
    if !ok_status && !has_success_flag {
        return Err(classify_status(status, &body));
    }
    let response = match body {
        Value::Object(mut map) => {
            if !has_success_flag {
                map.insert("success".to_owned(), Value::Bool(true));
            }
            serde_json::from_value::<ActionResponse>(Value::Object(map))?
        }
        Value::String(text) => ActionResponse {
            success: true,
            narrative: Some(text),
            ..ActionResponse::default()
        },
        other => {
            return Err(AgentError::Http {
                status,
                message: format!("unexpected action body: {other}"),
            });
        }
    };
    if !response.success && mentions_rate_limit(&response.text()) {
        return Err(AgentError::RateLimited(response.text()));
    }
    Ok(response)
}

fn body_message(body: &Value) -> String {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .map_or_else(|| body.to_string(), ToOwned::to_owned)
}

fn mentions_rate_limit(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("rate limit") || lower.contains("too many requests") || lower.contains("slow down")
}

/// Read the entry status leniently: `paid`, `hasPaid`, `entered` or a
/// `status` string.
fn parse_entry_status(body: &Value) -> EntryStatus {
    let flag = |keys: &[&str]| keys.iter().any(|k| body.get(k).and_then(Value::as_bool) == Some(true));
    let status_text = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    EntryStatus {
        paid: flag(&["paid", "hasPaid", "has_paid", "entered"]) || matches!(status_text.as_str(), "paid" | "registered"),
        registered: flag(&["registered", "isRegistered", "is_registered"]) || status_text == "registered",
    }
}

/// Find the API key in an `/enter` response.
fn extract_api_key(body: &Value) -> Option<String> {
    let direct = ["apiKey", "api_key", "key"]
        .iter()
        .find_map(|k| body.get(k).and_then(Value::as_str));
    let nested = || {
        body.get("agent")
            .and_then(|a| a.get("apiKey").or_else(|| a.get("api_key")))
            .and_then(Value::as_str)
    };
    direct
        .or_else(nested)
        .filter(|k| !k.is_empty())
        .map(ToOwned::to_owned)
}
