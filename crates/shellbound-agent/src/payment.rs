//! Entry-fee payment.
//!
//! The agent never holds keys itself. A [`PaymentRail`] submits the
//! `enter()` call with the fee attached and reports the mined receipt;
//! [`RelayPaymentRail`] does this through an HTTP signer relay.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::AgentError;

/// Function selector of the entry contract's `enter()`.
pub const ENTER_SELECTOR: &str = "0xe97dcb62";

/// A fee payment to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    /// Paying wallet.
    pub from: String,
    /// Entry contract.
    pub to: String,
    /// Call data (the `enter()` selector).
    pub data: String,
    /// Fee in wei, as a base-10 integer string.
    pub value: String,
}

impl PaymentRequest {
    /// The `enter()` call for a fee already expressed in wei.
    pub fn enter(from: &str, contract: &str, fee_wei: Decimal) -> Self {
        Self {
            from: from.to_owned(),
            to: contract.to_owned(),
            data: ENTER_SELECTOR.to_owned(),
            value: fee_wei.trunc().normalize().to_string(),
        }
    }
}

/// Final state of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    /// Executed successfully.
    Success,
    /// Mined but reverted.
    Reverted,
}

/// Submits payments and waits for them to be mined.
#[allow(async_fn_in_trait)]
pub trait PaymentRail {
    /// Submit the payment; returns the transaction hash.
    async fn send_payment(&self, request: &PaymentRequest) -> Result<String, AgentError>;

    /// Wait until the transaction is mined.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<ReceiptStatus, AgentError>;
}

/// Pays through an HTTP signer relay.
///
/// `POST {relay}/transactions` with a [`PaymentRequest`] returns
/// `{"txHash": ...}`; `GET {relay}/transactions/{hash}` returns
/// `{"status": "pending" | "success" | "reverted"}`.
pub struct RelayPaymentRail {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl RelayPaymentRail {
    /// Rail for the relay at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build relay client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            poll_interval: Duration::from_secs(3),
            max_polls: 40,
        })
    }
}

impl PaymentRail for RelayPaymentRail {
    async fn send_payment(&self, request: &PaymentRequest) -> Result<String, AgentError> {
        let url = format!("{}/transactions", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(AgentError::Payment(format!("relay returned {status}: {body}")));
        }
        let hash = body
            .get("txHash")
            .or_else(|| body.get("tx_hash"))
            .or_else(|| body.get("hash"))
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Payment(format!("relay response carried no hash: {body}")))?;
        info!(tx_hash = hash, value_wei = %request.value, "entry fee submitted");
        Ok(hash.to_owned())
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<ReceiptStatus, AgentError> {
        let url = format!("{}/transactions/{tx_hash}", self.base_url);
        for attempt in 1..=self.max_polls {
            match self.client.get(&url).send().await {
                Ok(response) => {
                    let body: Value = response.json().await.unwrap_or(Value::Null);
                    let status = body.get("status").and_then(Value::as_str).unwrap_or("pending");
                    debug!(tx_hash = tx_hash, attempt = attempt, status = status, "polled receipt");
                    match status {
                        "success" | "confirmed" => return Ok(ReceiptStatus::Success),
                        "reverted" | "failed" => return Ok(ReceiptStatus::Reverted),
                        _ => {}
                    }
                }
                Err(e) => warn!(tx_hash = tx_hash, attempt = attempt, error = %e, "receipt poll failed"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(AgentError::Payment(format!("no receipt for {tx_hash} after {} polls", self.max_polls)))
    }
}
