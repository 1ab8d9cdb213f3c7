//! Error types for the agent.
//!
//! Uses `thiserror` for typed errors that surface through the whole
//! session pipeline: HTTP calls, registration, payment, persistence and
//! configuration. The session controller classifies them into fatal,
//! recoverable and best-effort failures.

/// Errors that can occur while running a session.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The service rejected the credentials (HTTP 401/403).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The service asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The service returned a non-success status other than auth or rate limit.
    #[error("HTTP {status}: {message}")]
    Http {
        /// Status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The request never produced a response (connect, timeout, decode).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service is unreachable or unhealthy; the session cannot start.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Registration did not produce a usable key.
    #[error("registration failed: {0}")]
    Registration(String),

    /// The entry fee could not be paid.
    #[error("payment failed: {0}")]
    Payment(String),

    /// The payment transaction was mined but reverted.
    #[error("payment transaction {0} reverted")]
    PaymentReverted(String),

    /// The persisted record could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether the error means the stored key is no longer valid.
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Whether the error is a rate-limit signal.
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        Self::Transport(err.to_string())
    }
}
