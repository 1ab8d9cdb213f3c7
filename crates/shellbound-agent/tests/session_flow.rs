//! End-to-end session tests against a scripted game service.
//!
//! The service, the payment rail and the emotion source are in-memory
//! fakes; the record store is the real JSON store in a temp directory.
//! Time is paused so cooldowns and backoff sleeps cost nothing.

#![allow(clippy::unwrap_used)]

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use serde_json::{Value, json};
use shellbound_agent::{
    AgentConfig, AgentError, CancelFlag, EmotionSource, EntryStatus, GameApi, JsonRecordStore, PaymentRail,
    PaymentRequest, ReceiptStatus, RecordStore, SessionController,
};
use shellbound_types::{ActionRequest, ActionResponse, ActionVerb, EmotionVector, HUB_ZONE, PersistedAgentRecord};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedGame {
    /// Shared with the rail: a confirmed payment marks the wallet paid.
    paid: Rc<Cell<bool>>,
    valid_keys: RefCell<Vec<String>>,
    issued: Cell<u32>,
    xp: Cell<u64>,
    /// After this many successful actions every key is revoked.
    revoke_after: Option<u32>,
    /// Non-observation actions fail with a transport error.
    broken_actions: bool,
    /// Non-observation actions answered with a rate limit before any succeeds.
    rate_limited: Cell<u32>,
    /// Refusal text for the first non-observation action.
    refuse_first: RefCell<Option<String>>,
    /// Verbs the server always refuses.
    refused: Vec<ActionVerb>,
    /// Location reported by look and status instead of the shallows.
    zone: Option<&'static str>,
    performed: Cell<u32>,
    calls: RefCell<Vec<String>>,
    /// Every non-observation request, in order.
    actions: RefCell<Vec<ActionRequest>>,
}

impl ScriptedGame {
    fn observation(&self) -> ActionResponse {
        let narrative = match self.zone {
            Some(_) => "Darkness presses in from every side.",
            None => "Location: The Shallows\nWarm water laps at the sand.",
        };
        serde_json::from_value(json!({
            "success": true,
            "agent": {
                "location": self.zone.unwrap_or("the_shallows"),
                "level": 2,
                "hp": 50,
                "maxHp": 50,
                "energy": 50,
                "maxEnergy": 50,
                "shells": 20,
                "xp": self.xp.get(),
            },
            "narrative": narrative,
        }))
        .unwrap()
    }

    fn called(&self, name: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == name).count()
    }

    fn sent(&self) -> Vec<String> {
        self.actions
            .borrow()
            .iter()
            .map(|r| format!("{}:{}", r.action, r.target.as_deref().unwrap_or_default()))
            .collect()
    }
}

fn refusal(text: &str) -> ActionResponse {
    ActionResponse {
        success: false,
        message: Some(text.to_owned()),
        ..ActionResponse::default()
    }
}

impl GameApi for ScriptedGame {
    async fn entry_status(&self, _wallet: &str) -> Result<EntryStatus, AgentError> {
        self.calls.borrow_mut().push("entry_status".to_owned());
        Ok(EntryStatus {
            paid: self.paid.get(),
            registered: false,
        })
    }

    async fn season(&self) -> Result<Value, AgentError> {
        self.calls.borrow_mut().push("season".to_owned());
        Ok(json!({"season": {"entryFee": "0.01"}}))
    }

    async fn enter(&self, _wallet: &str, _name: &str) -> Result<String, AgentError> {
        self.calls.borrow_mut().push("enter".to_owned());
        if !self.paid.get() {
            return Err(AgentError::Registration("entry fee not paid".to_owned()));
        }
        let n = self.issued.get().saturating_add(1);
        self.issued.set(n);
        let key = format!("key-{n}");
        self.valid_keys.borrow_mut().push(key.clone());
        Ok(key)
    }

    async fn act(&self, api_key: &str, request: &ActionRequest) -> Result<ActionResponse, AgentError> {
        self.calls.borrow_mut().push(request.action.as_str().to_owned());
        if !self.valid_keys.borrow().iter().any(|k| k == api_key) {
            return Err(AgentError::Unauthorized("invalid api key".to_owned()));
        }
        if matches!(request.action, ActionVerb::Look | ActionVerb::Status) {
            return Ok(self.observation());
        }
        self.actions.borrow_mut().push(request.clone());
        if self.broken_actions {
            return Err(AgentError::Transport("connection reset".to_owned()));
        }
        let limited = self.rate_limited.get();
        if limited > 0 {
            self.rate_limited.set(limited.saturating_sub(1));
            return Err(AgentError::RateLimited("slow down".to_owned()));
        }
        if let Some(text) = self.refuse_first.borrow_mut().take() {
            return Ok(refusal(&text));
        }
        if self.refused.contains(&request.action) {
            return Ok(refusal("The current is too strong to go that way."));
        }

        let performed = self.performed.get().saturating_add(1);
        self.performed.set(performed);
        if self.revoke_after.is_some_and(|limit| performed >= limit) {
            self.valid_keys.borrow_mut().clear();
        }
        self.xp.set(self.xp.get().saturating_add(5));
        Ok(ActionResponse {
            success: true,
            narrative: Some(format!("You {} and feel a little wiser.", request.action)),
            ..ActionResponse::default()
        })
    }
}

struct ScriptedRail {
    outcome: ReceiptStatus,
    paid: Rc<Cell<bool>>,
}

impl ScriptedRail {
    fn for_game(game: &ScriptedGame, outcome: ReceiptStatus) -> Self {
        Self {
            outcome,
            paid: Rc::clone(&game.paid),
        }
    }
}

impl PaymentRail for ScriptedRail {
    async fn send_payment(&self, request: &PaymentRequest) -> Result<String, AgentError> {
        assert_eq!(request.value, "10000000000000000");
        Ok("0xfeed".to_owned())
    }

    async fn wait_for_receipt(&self, _tx_hash: &str) -> Result<ReceiptStatus, AgentError> {
        if self.outcome == ReceiptStatus::Success {
            self.paid.set(true);
        }
        Ok(self.outcome)
    }
}

struct Calm;

impl EmotionSource for Calm {
    fn current(&self) -> EmotionVector {
        EmotionVector::default()
    }
}

fn config(record_path: &Path, max_actions: u32) -> AgentConfig {
    let record = record_path.display().to_string();
    let actions = max_actions.to_string();
    AgentConfig::from_lookup(|name| match name {
        "GAME_API_URL" => Some("http://game.test".to_owned()),
        "WALLET_ADDRESS" => Some("0x00000000000000000000000000000000000000aa".to_owned()),
        "AGENT_NAME" => Some("Tester".to_owned()),
        "RECORD_PATH" => Some(record.clone()),
        "MAX_ACTIONS" => Some(actions.clone()),
        "SESSION_MODE" => Some("grind".to_owned()),
        _ => None,
    })
    .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn fresh_wallet_pays_registers_and_plays() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame::default();
    let rail = ScriptedRail::for_game(&game, ReceiptStatus::Success);

    let mut controller =
        SessionController::new(game, Some(rail), JsonRecordStore::new(&path), config(&path, 5), CancelFlag::new())
            .with_seed(7);
    let report = controller.run(&Calm).await;

    assert!(report.success, "{}", report.summary);
    assert_eq!(report.stats.actions_performed, 5);
    assert_eq!(report.stats.history.len(), 5);
    assert!(report.stats.xp_delta > 0);
    assert_eq!(controller.api().called("season"), 1);
    assert_eq!(controller.api().called("enter"), 1);

    let stored = JsonRecordStore::new(&path).load().unwrap().unwrap();
    assert_eq!(stored.api_key, "key-1");
    assert_eq!(stored.lifetime.sessions, 1);
    assert_eq!(stored.lifetime.total_actions, 5);
    assert_eq!(stored.lifetime.total_xp, u64::try_from(report.stats.xp_delta).unwrap());
    assert_eq!(stored.last_status.zone, "the_shallows");
    assert!(stored.session_goals.is_some());
}

#[tokio::test(start_paused = true)]
async fn second_session_reuses_the_persisted_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame::default();
    let rail = ScriptedRail::for_game(&game, ReceiptStatus::Success);
    let mut controller =
        SessionController::new(game, Some(rail), JsonRecordStore::new(&path), config(&path, 5), CancelFlag::new());
    let report = controller.run(&Calm).await;
    assert!(report.success, "{}", report.summary);

    // A second session with the persisted key neither pays nor registers.
    let path_again = path.clone();
    let game_again = ScriptedGame::default();
    game_again.valid_keys.borrow_mut().push("key-1".to_owned());
    let rail_again = ScriptedRail::for_game(&game_again, ReceiptStatus::Success);
    let mut again = SessionController::new(
        game_again,
        Some(rail_again),
        JsonRecordStore::new(&path_again),
        config(&path_again, 5),
        CancelFlag::new(),
    );
    let second = again.run(&Calm).await;

    assert!(second.success, "{}", second.summary);
    assert_eq!(again.api().called("season"), 0);
    assert_eq!(again.api().called("enter"), 0);
    assert_eq!(second.stats.lifetime.sessions, 2);
}

#[tokio::test(start_paused = true)]
async fn reverted_payment_stops_before_enter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame::default();
    let rail = ScriptedRail::for_game(&game, ReceiptStatus::Reverted);

    let mut controller = SessionController::new(
        game,
        Some(rail),
        JsonRecordStore::new(&path),
        config(&path, 5),
        CancelFlag::new(),
    );
    let report = controller.run(&Calm).await;

    assert!(!report.success);
    assert_eq!(controller.api().called("enter"), 0);
    assert!(JsonRecordStore::new(&path).load().unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn unpaid_wallet_without_rail_cannot_register() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");

    let mut controller = SessionController::new(
        ScriptedGame::default(),
        None::<ScriptedRail>,
        JsonRecordStore::new(&path),
        config(&path, 5),
        CancelFlag::new(),
    );
    let report = controller.run(&Calm).await;

    assert!(!report.success);
    assert_eq!(report.stats.actions_performed, 0);
    assert_eq!(controller.api().called("enter"), 0);
}

#[tokio::test(start_paused = true)]
async fn stored_key_skips_registration_and_accumulates_lifetime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let store = JsonRecordStore::new(&path);
    let mut previous = PersistedAgentRecord::new("key-9".to_owned(), "Tester".to_owned(), "0xaa".to_owned());
    previous.lifetime.sessions = 3;
    previous.lifetime.total_actions = 40;
    store.save(&previous).unwrap();

    let game = ScriptedGame::default();
    game.valid_keys.borrow_mut().push("key-9".to_owned());
    let mut controller = SessionController::new(game, None::<ScriptedRail>, store, config(&path, 5), CancelFlag::new());
    let report = controller.run(&Calm).await;

    assert!(report.success, "{}", report.summary);
    assert_eq!(controller.api().called("entry_status"), 0);
    assert_eq!(controller.api().called("enter"), 0);
    assert_eq!(report.stats.lifetime.sessions, 4);
    assert_eq!(report.stats.lifetime.total_actions, 45);

    let stored = controller.store().load().unwrap().unwrap();
    assert_eq!(stored.api_key, "key-9");
    assert_eq!(stored.lifetime.sessions, 4);
}

#[tokio::test(start_paused = true)]
async fn rejected_stored_key_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let store = JsonRecordStore::new(&path);
    let mut previous = PersistedAgentRecord::new("stale".to_owned(), "Tester".to_owned(), "0xaa".to_owned());
    previous.lifetime.kills = 7;
    store.save(&previous).unwrap();

    let game = ScriptedGame::default();
    game.paid.set(true);
    let mut controller = SessionController::new(game, None::<ScriptedRail>, store, config(&path, 5), CancelFlag::new());
    let report = controller.run(&Calm).await;

    assert!(report.success, "{}", report.summary);
    let stored = controller.store().load().unwrap().unwrap();
    assert_eq!(stored.api_key, "key-1");
    assert_eq!(stored.lifetime.kills, 7);
}

#[tokio::test(start_paused = true)]
async fn losing_the_key_mid_session_clears_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame {
        revoke_after: Some(2),
        ..ScriptedGame::default()
    };
    game.paid.set(true);

    let mut controller =
        SessionController::new(game, None::<ScriptedRail>, JsonRecordStore::new(&path), config(&path, 10), CancelFlag::new());
    let report = controller.run(&Calm).await;

    assert!(!report.success);
    assert!(report.stats.actions_performed <= 2);
    let stored = JsonRecordStore::new(&path).load().unwrap().unwrap();
    assert!(stored.api_key.is_empty());
    assert_eq!(stored.lifetime.sessions, 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_transport_errors_end_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame {
        broken_actions: true,
        ..ScriptedGame::default()
    };
    game.paid.set(true);

    let mut controller =
        SessionController::new(game, None::<ScriptedRail>, JsonRecordStore::new(&path), config(&path, 10), CancelFlag::new());
    let report = controller.run(&Calm).await;

    assert!(!report.success);
    assert_eq!(report.stats.actions_performed, 0);
    assert!(report.summary.contains("too many transport errors"));
    let stored = JsonRecordStore::new(&path).load().unwrap().unwrap();
    assert_eq!(stored.api_key, "key-1");
}

#[tokio::test(start_paused = true)]
async fn cancelled_session_still_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame::default();
    game.paid.set(true);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let mut controller =
        SessionController::new(game, None::<ScriptedRail>, JsonRecordStore::new(&path), config(&path, 10), cancel);
    let report = controller.run(&Calm).await;

    assert!(report.success);
    assert_eq!(report.stats.actions_performed, 0);
    assert_eq!(report.bucket, shellbound_types::ReflectionBucket::KilledEarly);
    assert_eq!(report.stats.final_zone, "the_shallows");
}

#[tokio::test(start_paused = true)]
async fn rate_limits_back_off_linearly_without_spending_actions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame::default();
    game.paid.set(true);
    game.rate_limited.set(2);

    let mut controller =
        SessionController::new(game, None::<ScriptedRail>, JsonRecordStore::new(&path), config(&path, 3), CancelFlag::new());
    let started = tokio::time::Instant::now();
    let report = controller.run(&Calm).await;
    let elapsed = started.elapsed();

    assert!(report.success, "{}", report.summary);
    // 5s after the first limit, 10s after the second.
    assert!(elapsed >= Duration::from_secs(15), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(16), "{elapsed:?}");
    assert_eq!(report.stats.actions_performed, 3);
    assert_eq!(report.stats.history.len(), 3);
    assert_eq!(controller.api().performed.get(), 3);
    assert_eq!(controller.api().actions.borrow().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn combat_refusal_switches_to_combat_actions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame::default();
    game.paid.set(true);
    *game.refuse_first.borrow_mut() = Some("You can't do that, you are in combat with the Reef Crab!".to_owned());

    let mut controller =
        SessionController::new(game, None::<ScriptedRail>, JsonRecordStore::new(&path), config(&path, 3), CancelFlag::new())
            .with_seed(11);
    let report = controller.run(&Calm).await;

    assert!(report.success, "{}", report.summary);
    assert_eq!(report.stats.actions_performed, 3);
    assert_eq!(report.stats.history.len(), 4);

    let history = &report.stats.history;
    let refused = history.first().unwrap();
    assert!(!refused.success);
    assert!(history.iter().skip(1).all(|h| h.success));

    let sent = controller.api().actions.borrow().clone();
    let first = sent.first().unwrap();
    let reply = sent.get(1).unwrap();
    assert!(reply.action.is_combat_legal(), "{} after a combat refusal", reply.action);

    // The refused key sits out the next two iterations.
    for later in sent.iter().skip(1).take(2) {
        assert!(
            later.action != first.action || later.target != first.target,
            "{} retried too soon",
            later.action
        );
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_zone_escapes_by_move_then_travel_then_explore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame {
        zone: Some("sunken_vault"),
        refused: vec![ActionVerb::Move, ActionVerb::Travel],
        ..ScriptedGame::default()
    };
    game.paid.set(true);

    let mut controller =
        SessionController::new(game, None::<ScriptedRail>, JsonRecordStore::new(&path), config(&path, 3), CancelFlag::new());
    let report = controller.run(&Calm).await;

    assert!(report.success, "{}", report.summary);
    let sent = controller.api().sent();
    let moved = format!("move:{HUB_ZONE}");
    let traveled = format!("travel:{HUB_ZONE}");
    let escape: Vec<&str> = sent.iter().take(3).map(String::as_str).collect();
    assert_eq!(escape, vec![moved.as_str(), traveled.as_str(), "explore:"]);
    assert_eq!(report.stats.final_zone, "sunken_vault");
}

#[tokio::test(start_paused = true)]
async fn failed_escape_still_plays_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");
    let game = ScriptedGame {
        zone: Some("sunken_vault"),
        refused: vec![ActionVerb::Move, ActionVerb::Travel, ActionVerb::Explore],
        ..ScriptedGame::default()
    };
    game.paid.set(true);

    let mut controller =
        SessionController::new(game, None::<ScriptedRail>, JsonRecordStore::new(&path), config(&path, 3), CancelFlag::new());
    let report = controller.run(&Calm).await;

    assert!(report.success, "{}", report.summary);
    let sent = controller.api().sent();
    let moved = format!("move:{HUB_ZONE}");
    let traveled = format!("travel:{HUB_ZONE}");
    let escape: Vec<&str> = sent.iter().take(3).map(String::as_str).collect();
    assert_eq!(escape, vec![moved.as_str(), traveled.as_str(), "explore:"]);
    assert!(sent.len() > 3, "play continued after the failed escape");
    assert!(!report.summary.is_empty());
    let stored = JsonRecordStore::new(&path).load().unwrap().unwrap();
    assert_eq!(stored.lifetime.sessions, 1);
}
