//! Registration and entry-fee flow.
//!
//! A session needs a valid API key. A persisted key is validated with the
//! cheap `status` action; a rejected key (401/403) falls through to a fresh
//! registration, any other failure means the service is unusable. Fresh
//! registration pays the one-time entry fee when the wallet has not paid
//! yet, then exchanges the wallet for a key and persists it immediately.

use rust_decimal::Decimal;
use serde_json::Value;
use shellbound_types::{ActionRequest, ActionVerb, PersistedAgentRecord};
use tracing::{info, warn};

use crate::client::GameApi;
use crate::error::AgentError;
use crate::payment::{PaymentRail, PaymentRequest, ReceiptStatus};
use crate::store::RecordStore;

/// Raw fee values at or above this are already in wei.
const WEI_THRESHOLD: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Wei per whole unit of the fee currency.
const WEI_PER_UNIT: Decimal = Decimal::from_parts(2_808_348_672, 232_830_643, 0, false, 0);

/// Keys that may carry the fee in a season response.
const FEE_KEYS: &[&str] = &["entryFee", "entry_fee", "entryFeeWei", "entry_fee_wei", "fee", "amount", "wei"];

/// How deep to search nested season objects for a fee.
const MAX_FEE_DEPTH: usize = 4;

/// Where the wallet stands in the registration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// No usable key.
    Unregistered,
    /// Fee owed before a key can be issued.
    PendingPayment,
    /// A valid key is on record.
    Registered,
}

impl RegistrationState {
    /// Label for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::PendingPayment => "pending_payment",
            Self::Registered => "registered",
        }
    }
}

/// Who is registering.
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
    /// Paying wallet.
    pub wallet: &'a str,
    /// Display name for a new agent.
    pub agent_name: &'a str,
    /// Contract that collects the fee.
    pub entry_contract: &'a str,
}

/// Entry fee in both units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFee {
    /// Fee in wei.
    pub wei: Decimal,
    /// Fee in whole currency units.
    pub amount: Decimal,
}

impl EntryFee {
    /// Interpret a raw fee: values of at least 1e12 are wei, smaller
    /// values are whole units.
    pub fn from_raw(raw: Decimal) -> Option<Self> {
        if raw.is_sign_negative() {
            return None;
        }
        if raw >= WEI_THRESHOLD {
            Some(Self {
                wei: raw,
                amount: raw.checked_div(WEI_PER_UNIT)?,
            })
        } else {
            Some(Self {
                wei: raw.checked_mul(WEI_PER_UNIT)?,
                amount: raw,
            })
        }
    }
}

/// Find the entry fee in a season response.
///
/// Accepts a bare number, a numeric string, or an object carrying the fee
/// under any of the usual keys at any nesting depth.
pub fn parse_fee(body: &Value) -> Option<EntryFee> {
    find_fee(body, 0).and_then(EntryFee::from_raw)
}

fn find_fee(value: &Value, depth: usize) -> Option<Decimal> {
    if depth > MAX_FEE_DEPTH {
        return None;
    }
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s.trim()),
        Value::Object(map) => {
            let next = depth.saturating_add(1);
            FEE_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(|v| find_fee(v, next))
                .or_else(|| {
                    map.values()
                        .filter(|v| v.is_object())
                        .find_map(|v| find_fee(v, next))
                })
        }
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}

fn log_state(state: RegistrationState, wallet: &str) {
    info!(state = state.as_str(), wallet = wallet, "registration state");
}

/// Make sure a valid key is on record and return the record.
///
/// # Errors
///
/// - [`AgentError::ServiceUnavailable`] when a stored key cannot be validated
///   for reasons other than authorization
/// - [`AgentError::Payment`] / [`AgentError::PaymentReverted`] when the fee
///   cannot be paid
/// - [`AgentError::Registration`] when the service issues no key
pub async fn ensure_registered<G, P, S>(
    api: &G,
    rail: Option<&P>,
    store: &S,
    identity: Identity<'_>,
) -> Result<PersistedAgentRecord, AgentError>
where
    G: GameApi,
    P: PaymentRail,
    S: RecordStore,
{
    let existing = match store.load() {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "persisted record unreadable, registering afresh");
            None
        }
    };

    if let Some(record) = existing.as_ref().filter(|r| r.has_key()) {
        match api.act(&record.api_key, &ActionRequest::bare(ActionVerb::Status)).await {
            Ok(_) => {
                log_state(RegistrationState::Registered, identity.wallet);
                return Ok(record.clone());
            }
            Err(e) if e.is_auth_failure() => {
                warn!(agent = %record.agent_name, error = %e, "stored key rejected, re-registering");
                if let Err(e) = store.clear_key() {
                    warn!(error = %e, "failed to clear rejected key");
                }
            }
            Err(e) => return Err(AgentError::ServiceUnavailable(format!("key validation failed: {e}"))),
        }
    }

    log_state(RegistrationState::Unregistered, identity.wallet);
    let status = api.entry_status(identity.wallet).await?;
    if !status.paid {
        log_state(RegistrationState::PendingPayment, identity.wallet);
        pay_entry_fee(api, rail, identity).await?;
    }

    let api_key = api.enter(identity.wallet, identity.agent_name).await?;
    let record = match existing {
        Some(previous) => PersistedAgentRecord {
            api_key,
            registered_at: chrono::Utc::now(),
            ..previous
        },
        None => PersistedAgentRecord::new(api_key, identity.agent_name.to_owned(), identity.wallet.to_owned()),
    };
    store.save(&record)?;
    log_state(RegistrationState::Registered, identity.wallet);
    Ok(record)
}

async fn pay_entry_fee<G, P>(api: &G, rail: Option<&P>, identity: Identity<'_>) -> Result<(), AgentError>
where
    G: GameApi,
    P: PaymentRail,
{
    let season = api.season().await?;
    let fee = parse_fee(&season)
        .ok_or_else(|| AgentError::Registration(format!("season response carried no entry fee: {season}")))?;
    if fee.wei.is_zero() {
        info!("entry fee is zero, skipping payment");
        return Ok(());
    }
    let rail = rail.ok_or_else(|| AgentError::Payment("entry fee owed but no payment rail configured".to_owned()))?;

    info!(fee = %fee.amount, fee_wei = %fee.wei, contract = identity.entry_contract, "paying entry fee");
    let request = PaymentRequest::enter(identity.wallet, identity.entry_contract, fee.wei);
    let tx_hash = rail.send_payment(&request).await?;
    match rail.wait_for_receipt(&tx_hash).await? {
        ReceiptStatus::Success => {
            info!(tx_hash = %tx_hash, "entry fee confirmed");
            Ok(())
        }
        ReceiptStatus::Reverted => Err(AgentError::PaymentReverted(tx_hash)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn dec(text: &str) -> Decimal {
        text.parse().unwrap_or_default()
    }

    #[test]
    fn constants_have_expected_values() {
        assert_eq!(WEI_THRESHOLD, dec("1000000000000"));
        assert_eq!(WEI_PER_UNIT, dec("1000000000000000000"));
    }

    #[test]
    fn wei_values_convert_down() {
        let fee = parse_fee(&json!({"entryFee": 5_000_000_000_000_000_u64}));
        assert_eq!(fee.map(|f| f.amount), Some(dec("0.005")));
    }

    #[test]
    fn decimal_values_convert_up() {
        let fee = parse_fee(&json!({"season": {"pricing": {"entry_fee": "0.01"}}}));
        assert_eq!(fee.map(|f| f.wei), Some(dec("10000000000000000")));
    }

    #[test]
    fn bare_number_and_string() {
        assert_eq!(parse_fee(&json!(2)).map(|f| f.amount), Some(dec("2")));
        assert_eq!(parse_fee(&json!("1000000000000")).map(|f| f.wei), Some(dec("1000000000000")));
    }

    #[test]
    fn missing_fee_is_none() {
        assert_eq!(parse_fee(&json!({"season": 3, "name": "Tides"})), None);
        assert_eq!(parse_fee(&json!({"fee": -1})), None);
    }
}
