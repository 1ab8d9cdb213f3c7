//! Shellbound agent entry point.
//!
//! Runs exactly one session against the game service and prints the
//! session report as JSON on stdout. Logs go to stderr.

use anyhow::Context;
use shellbound_agent::{
    AgentConfig, CancelFlag, GameClient, JsonEmotionSource, JsonRecordStore, RelayPaymentRail, SessionController,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// Initializes logging, loads configuration from environment variables,
/// wires the game client, payment relay and record store, then runs one
/// session. Ctrl-C cancels the session cooperatively; the report is still
/// printed.
///
/// # Errors
///
/// Returns an error if configuration or client setup fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    info!("shellbound-agent starting");

    let config = AgentConfig::from_env().context("loading configuration")?;
    info!(
        api_url = config.api_url,
        agent = config.agent_name,
        mode = %config.session.mode,
        max_actions = config.session.max_actions,
        record_path = %config.record_path.display(),
        "configuration loaded"
    );

    let api = GameClient::new(&config.api_url, config.request_timeout, config.call_delay)
        .context("building game client")?;
    let rail = match config.payment_relay_url.as_deref() {
        Some(url) => Some(RelayPaymentRail::new(url, config.request_timeout).context("building payment relay client")?),
        None => {
            warn!("no payment relay configured, unpaid wallets cannot register");
            None
        }
    };
    let store = JsonRecordStore::new(config.record_path.clone());
    let emotions = JsonEmotionSource::new(config.emotion_state_path.clone());

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing the current action");
            on_signal.cancel();
        }
    });

    let mut controller = SessionController::new(api, rail, store, config, cancel);
    let report = controller.run(&emotions).await;

    let rendered = serde_json::to_string_pretty(&report).context("rendering session report")?;
    println!("{rendered}");
    Ok(())
}
