//! Session controller: one bounded play session from registration to report.
//!
//! ```text
//! Registering --> Surveying --> (Escaping) --> (Preparing) --> Looping --> Finished
//! ```
//!
//! The controller owns the game client, the payment rail and the record
//! store, and is generic over all three so tests can script them. It never
//! returns an error: whatever happens becomes a [`SessionReport`], and the
//! persisted record is written on the way out.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::Value;
use shellbound_types::{
    ActionCandidate, ActionKey, ActionRequest, ActionResponse, ActionVerb, BehaviorProfile, Catalog, GameState,
    HistoryEntry, KnownGear, LastStatus, PersistedAgentRecord, SessionReport, SessionStats,
};
use tokio::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::behavior::{EmotionSource, map_profile};
use crate::cancel::CancelFlag;
use crate::client::GameApi;
use crate::config::{AgentConfig, SessionTuning};
use crate::error::AgentError;
use crate::extract;
use crate::narrative;
use crate::payment::PaymentRail;
use crate::planner::{Planner, needs_preparation};
use crate::registration::{Identity, ensure_registered};
use crate::report::{OutcomeFacts, bucket, reflection};
use crate::scoring::{apply_loop_guard, apply_rejection_penalty, generate_candidates, log_top};
use crate::store::RecordStore;

/// Iterations allowed per unit of action budget, bounding rejection loops.
const ITERATION_CEILING_FACTOR: u32 = 3;

// ---------------------------------------------------------------------------
// Phases and outcomes
// ---------------------------------------------------------------------------

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Making sure a valid key exists.
    Registering,
    /// Reading `look` and `status`.
    Surveying,
    /// Leaving an unrecognized zone.
    Escaping,
    /// Shopping at the hub.
    Preparing,
    /// The main decision loop.
    Looping,
    /// Writing the record and the report.
    Finished,
}

impl SessionPhase {
    /// Label for logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registering => "registering",
            Self::Surveying => "surveying",
            Self::Escaping => "escaping",
            Self::Preparing => "preparing",
            Self::Looping => "looping",
            Self::Finished => "finished",
        }
    }
}

/// Why the session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Cancellation was requested.
    Cancelled,
    /// The action budget was used up.
    BudgetExhausted,
    /// No candidate survived filtering.
    NoCandidates,
    /// Too little energy to act and rest still cooling down.
    Exhausted,
    /// Rejections or rate limits used up the iteration ceiling.
    IterationCeiling,
    /// The key stopped working.
    AuthLost,
    /// Transport errors kept coming.
    TooManyErrors,
    /// No key could be obtained.
    RegistrationFailed,
}

impl EndReason {
    /// Label for logging and the summary.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::BudgetExhausted => "action budget exhausted",
            Self::NoCandidates => "no useful actions left",
            Self::Exhausted => "out of energy",
            Self::IterationCeiling => "iteration ceiling reached",
            Self::AuthLost => "authorization lost",
            Self::TooManyErrors => "too many transport errors",
            Self::RegistrationFailed => "registration failed",
        }
    }

    /// Whether the session ended normally.
    pub const fn is_success(self) -> bool {
        !matches!(self, Self::AuthLost | Self::TooManyErrors | Self::RegistrationFailed)
    }
}

/// Mutable bookkeeping for one session.
#[derive(Debug, Default)]
struct Progress {
    actions: u32,
    iterations: u32,
    kills: u32,
    deaths: u32,
    start_xp: u64,
    start_shells: u64,
    history: Vec<HistoryEntry>,
    recent: VecDeque<ActionKey>,
    rejected: Vec<(ActionKey, u32)>,
    strikes: Vec<(ActionKey, u32)>,
    last_rest: Option<Instant>,
    last_broadcast: Option<Instant>,
    last_social: Option<Instant>,
    rate_limits: u32,
    errors: u32,
    since_refresh: u32,
}

impl Progress {
    fn record(&mut self, candidate: &ActionCandidate, success: bool) {
        self.history.push(HistoryEntry {
            action: candidate.verb.as_str().to_owned(),
            target: candidate.target.clone(),
            success,
            score: candidate.score,
            reason: candidate.reason.clone(),
        });
    }

    fn is_available(&self, candidate: &ActionCandidate, tuning: &SessionTuning, now: Instant) -> bool {
        let cooled = match candidate.verb {
            ActionVerb::Rest => cooled(self.last_rest, tuning.rest_cooldown, now),
            ActionVerb::Broadcast => cooled(self.last_broadcast, tuning.broadcast_cooldown, now),
            ActionVerb::Inbox | ActionVerb::Trades => cooled(self.last_social, tuning.social_cooldown, now),
            _ => true,
        };
        let key = candidate.key();
        cooled && !self.rejected.iter().any(|(rejected, _)| *rejected == key)
    }

    /// Append to the rolling loop-guard window, dropping what falls out of it.
    fn remember(&mut self, key: ActionKey, window: usize) {
        self.recent.push_back(key);
        while self.recent.len() > window {
            self.recent.pop_front();
        }
    }

    fn reject(&mut self, key: ActionKey, memory: u32) {
        match self.strikes.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = entry.1.saturating_add(1),
            None => self.strikes.push((key.clone(), 1)),
        }
        self.rejected.push((key, memory));
    }

    fn age_rejections(&mut self) {
        for entry in &mut self.rejected {
            entry.1 = entry.1.saturating_sub(1);
        }
        self.rejected.retain(|(_, remaining)| *remaining > 0);
    }
}

fn cooled(last: Option<Instant>, window: Duration, now: Instant) -> bool {
    last.is_none_or(|at| now.saturating_duration_since(at) >= window)
}

fn signed_delta(now: u64, start: u64) -> i64 {
    let now = i64::try_from(now).unwrap_or(i64::MAX);
    let start = i64::try_from(start).unwrap_or(i64::MAX);
    now.saturating_sub(start)
}

fn gain(delta: i64) -> u64 {
    u64::try_from(delta.max(0)).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives one session end to end.
pub struct SessionController<G, P, S> {
    api: G,
    rail: Option<P>,
    store: S,
    catalog: Catalog,
    config: AgentConfig,
    cancel: CancelFlag,
    rng: StdRng,
    phase: SessionPhase,
}

impl<G, P, S> SessionController<G, P, S>
where
    G: GameApi,
    P: PaymentRail,
    S: RecordStore,
{
    /// Controller with the standard catalog and an OS-seeded RNG.
    pub fn new(api: G, rail: Option<P>, store: S, config: AgentConfig, cancel: CancelFlag) -> Self {
        Self {
            api,
            rail,
            store,
            catalog: Catalog::standard(),
            config,
            cancel,
            rng: StdRng::from_os_rng(),
            phase: SessionPhase::Registering,
        }
    }

    /// Replace the catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Seed the score noise for reproducible runs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The game client.
    pub const fn api(&self) -> &G {
        &self.api
    }

    /// The record store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Current phase.
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn transition(&mut self, next: SessionPhase) {
        info!(from = self.phase.as_str(), to = next.as_str(), "session phase");
        self.phase = next;
    }

    /// Run a full session and report on it.
    pub async fn run<E: EmotionSource>(&mut self, emotions: &E) -> SessionReport {
        let session_id = Uuid::now_v7();
        info!(
            session_id = %session_id,
            mode = %self.config.session.mode,
            max_actions = self.config.session.max_actions,
            target_zone = ?self.config.session.target_zone,
            "session starting"
        );

        self.phase = SessionPhase::Registering;
        let identity = Identity {
            wallet: &self.config.wallet_address,
            agent_name: &self.config.agent_name,
            entry_contract: &self.config.entry_contract,
        };
        let registered = ensure_registered(&self.api, self.rail.as_ref(), &self.store, identity).await;
        let mut record = match registered {
            Ok(record) => record,
            Err(e) => return self.registration_failure(session_id, &e),
        };

        let profile = map_profile(&emotions.current());
        let mut state = GameState::default();
        let mut progress = Progress::default();
        let end = self.play(&mut record, &profile, &mut state, &mut progress).await;
        self.finish(session_id, record, &state, progress, end)
    }

    /// Survey, escape, prepare and loop. Returns why play stopped.
    async fn play(
        &mut self,
        record: &mut PersistedAgentRecord,
        profile: &BehaviorProfile,
        state: &mut GameState,
        progress: &mut Progress,
    ) -> EndReason {
        let key = record.api_key.clone();

        self.transition(SessionPhase::Surveying);
        match self.survey(&key).await {
            Ok(Some(surveyed)) => *state = surveyed,
            Ok(None) => {
                warn!("initial survey failed, starting from the last known status");
                state.zone.clone_from(&record.last_status.zone);
                state.level = record.last_status.level.max(1);
                state.shells = record.last_status.shells;
                state.xp = record.last_status.xp;
            }
            Err(e) => {
                error!(error = %e, "key rejected during survey");
                return EndReason::AuthLost;
            }
        }
        progress.start_xp = state.xp;
        progress.start_shells = state.shells;
        record.session_goals = Some(self.session_goals(state));

        if state.needs_escape {
            self.transition(SessionPhase::Escaping);
            if let Err(e) = self.escape(&key, state).await {
                error!(error = %e, "key rejected during escape");
                return EndReason::AuthLost;
            }
        }

        if !state.in_combat() && state.zone == self.catalog.hub_zone && needs_preparation(state, &self.catalog) {
            self.transition(SessionPhase::Preparing);
            let last_zone = Some(record.last_status.zone.as_str()).filter(|z| !z.is_empty());
            let planner = Planner::new(&self.api, &key, &self.catalog, &self.cancel);
            planner.prepare(state, profile, last_zone).await;
            if let Err(e) = self.refresh(&key, state).await {
                error!(error = %e, "key rejected after preparation");
                return EndReason::AuthLost;
            }
        }

        self.transition(SessionPhase::Looping);
        self.main_loop(&key, state, profile, progress).await
    }

    #[allow(clippy::too_many_lines)]
    async fn main_loop(
        &mut self,
        key: &str,
        state: &mut GameState,
        profile: &BehaviorProfile,
        p: &mut Progress,
    ) -> EndReason {
        let tuning = self.config.tuning.clone();
        let max_actions = self.config.session.max_actions;
        let ceiling = max_actions.saturating_mul(ITERATION_CEILING_FACTOR);
        let flee_cost = self.catalog.energy_cost(ActionVerb::Flee);

        loop {
            if self.cancel.is_cancelled() {
                return EndReason::Cancelled;
            }
            if p.actions >= max_actions {
                return EndReason::BudgetExhausted;
            }
            if p.iterations >= ceiling {
                return EndReason::IterationCeiling;
            }
            p.iterations = p.iterations.saturating_add(1);

            let now = Instant::now();
            if state.max_energy > 0
                && state.energy < flee_cost
                && !cooled(p.last_rest, tuning.rest_cooldown, now)
            {
                warn!(energy = state.energy, "energy critically low and rest cooling down");
                return EndReason::Exhausted;
            }

            let mut candidates = generate_candidates(
                state,
                profile,
                self.config.session.mode,
                self.config.session.target_zone.as_deref(),
                &self.catalog,
                &mut self.rng,
            );
            candidates.retain(|c| p.is_available(c, &tuning, now));
            p.age_rejections();
            apply_rejection_penalty(&mut candidates, &p.strikes, tuning.rejection_penalty);
            if let Some(repeated) = apply_loop_guard(
                &mut candidates,
                p.recent.make_contiguous(),
                tuning.loop_guard_window,
                tuning.loop_guard_penalty,
            ) {
                info!(action = %repeated, penalty = tuning.loop_guard_penalty, "loop guard engaged");
            }
            log_top(&candidates, tuning.top_n);

            let Some(choice) = candidates.into_iter().next() else {
                info!(iteration = p.iterations, "no candidates left");
                return EndReason::NoCandidates;
            };
            info!(
                iteration = p.iterations,
                action = %choice.key(),
                score = choice.score,
                reason = %choice.reason,
                "executing action"
            );

            match self.api.act(key, &choice.to_request()).await {
                Ok(response) if response.success => {
                    p.errors = 0;
                    p.rate_limits = 0;
                    if let Err(e) = self.on_success(key, state, &choice, &response, p, &tuning).await {
                        error!(error = %e, "key rejected during refresh");
                        return EndReason::AuthLost;
                    }
                }
                Ok(response) => {
                    p.errors = 0;
                    let combat_changed = extract::apply_rejection(state, &response);
                    warn!(
                        action = %choice.key(),
                        reason = %response.text(),
                        in_combat = state.in_combat(),
                        combat_changed = combat_changed,
                        "action rejected"
                    );
                    p.record(&choice, false);
                    p.reject(choice.key(), tuning.rejection_memory);
                }
                Err(e) if e.is_auth_failure() => {
                    error!(error = %e, "key rejected mid-session");
                    return EndReason::AuthLost;
                }
                Err(e) if e.is_rate_limited() => {
                    p.rate_limits = p.rate_limits.saturating_add(1);
                    let wait = tuning.rate_limit_backoff.saturating_mul(p.rate_limits);
                    warn!(consecutive = p.rate_limits, wait = ?wait, "rate limited, backing off");
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    p.errors = p.errors.saturating_add(1);
                    warn!(consecutive = p.errors, error = %e, "action failed");
                    if p.errors >= tuning.max_consecutive_errors {
                        return EndReason::TooManyErrors;
                    }
                }
            }
        }
    }

    /// Fold a successful action into the state and the bookkeeping.
    ///
    /// Only an authorization failure during the follow-up refresh is
    /// returned as an error.
    async fn on_success(
        &self,
        key: &str,
        state: &mut GameState,
        choice: &ActionCandidate,
        response: &ActionResponse,
        p: &mut Progress,
        tuning: &SessionTuning,
    ) -> Result<(), AgentError> {
        p.actions = p.actions.saturating_add(1);
        p.since_refresh = p.since_refresh.saturating_add(1);
        let text = response.text();

        if narrative::died(&text) {
            p.deaths = p.deaths.saturating_add(1);
            warn!(action = %choice.key(), "agent died");
        } else if matches!(choice.verb, ActionVerb::Fight | ActionVerb::Attack | ActionVerb::Challenge)
            && narrative::killed(&text)
        {
            p.kills = p.kills.saturating_add(1);
            info!(opponent = ?choice.target, kills = p.kills, "opponent defeated");
        }

        let zone_before = state.zone.clone();
        extract::merge_action_response(state, response, &self.catalog);
        let now = Instant::now();
        match choice.verb {
            ActionVerb::Rest => p.last_rest = Some(now),
            ActionVerb::Broadcast => p.last_broadcast = Some(now),
            ActionVerb::Inbox => {
                p.last_social = Some(now);
                if let Some(unread) = narrative::unread_count(&text) {
                    info!(unread = unread, "inbox checked");
                }
            }
            ActionVerb::Trades => {
                p.last_social = Some(now);
                if let Some(offers) = narrative::trade_offer_count(&text) {
                    info!(offers = offers, "trade offers checked");
                }
            }
            ActionVerb::AcceptQuest => {
                for quest in state.quests.iter_mut().filter(|q| Some(&q.id) == choice.target.as_ref()) {
                    quest.status = "active".to_owned();
                }
                state.active_quest.clone_from(&choice.target);
            }
            ActionVerb::CompleteQuest => {
                state.quests.retain(|q| Some(&q.id) != choice.target.as_ref());
                if state.active_quest == choice.target {
                    state.active_quest = None;
                }
            }
            ActionVerb::Quests => {
                if let Some(quests) = narrative::quests(&text) {
                    state.quests = quests;
                }
            }
            _ => {}
        }

        p.record(choice, true);
        let done = choice.key();
        p.strikes.retain(|(k, _)| *k != done);
        p.remember(done, tuning.loop_guard_window);

        if choice.verb.mutates_state() || p.since_refresh >= tuning.refresh_every {
            self.refresh(key, state).await?;
            p.since_refresh = 0;
        }
        if state.zone != zone_before {
            p.strikes.clear();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Survey, refresh, escape
    // -----------------------------------------------------------------------

    async fn observe(&self, key: &str, verb: ActionVerb) -> Result<Option<Value>, AgentError> {
        match self.api.act(key, &ActionRequest::bare(verb)).await {
            Ok(response) => Ok(serde_json::to_value(&response).ok()),
            Err(e) if e.is_auth_failure() => Err(e),
            Err(e) => {
                warn!(action = %verb, error = %e, "survey call failed");
                Ok(None)
            }
        }
    }

    /// `look` + `status` into a fresh state; `None` when both calls failed.
    async fn survey(&self, key: &str) -> Result<Option<GameState>, AgentError> {
        let look = self.observe(key, ActionVerb::Look).await?;
        let status = self.observe(key, ActionVerb::Status).await?;
        if look.is_none() && status.is_none() {
            return Ok(None);
        }
        Ok(Some(extract::extract_state(look.as_ref(), status.as_ref(), &self.catalog)))
    }

    /// Re-survey, keeping quest knowledge the service did not repeat.
    async fn refresh(&self, key: &str, state: &mut GameState) -> Result<(), AgentError> {
        match self.survey(key).await? {
            Some(mut fresh) => {
                if fresh.quests.is_empty() {
                    fresh.quests = std::mem::take(&mut state.quests);
                }
                if fresh.active_quest.is_none() {
                    fresh.active_quest = state.active_quest.take();
                }
                *state = fresh;
            }
            None => warn!(zone = %state.zone, "refresh failed, keeping stale state"),
        }
        Ok(())
    }

    /// Try move, travel, then explore toward the hub.
    async fn escape(&self, key: &str, state: &mut GameState) -> Result<(), AgentError> {
        let hub = self.catalog.hub_zone.as_str();
        let attempts = [
            ActionRequest::targeted(ActionVerb::Move, hub),
            ActionRequest::targeted(ActionVerb::Travel, hub),
            ActionRequest::bare(ActionVerb::Explore),
        ];
        for request in attempts {
            match self.api.act(key, &request).await {
                Ok(response) if response.success => {
                    extract::merge_action_response(state, &response, &self.catalog);
                    info!(action = %request.action, zone = %state.zone, "escaped unrecognized zone");
                    return self.refresh(key, state).await;
                }
                Ok(response) => {
                    warn!(action = %request.action, reason = %response.text(), "escape attempt rejected");
                }
                Err(e) if e.is_auth_failure() => return Err(e),
                Err(e) => warn!(action = %request.action, error = %e, "escape attempt failed"),
            }
        }
        warn!(state = ?state, "every escape attempt failed, continuing with stale state");
        Ok(())
    }

    fn session_goals(&self, state: &GameState) -> Vec<String> {
        let mode = self.config.session.mode;
        let mut goals = vec![format!("play a {mode} session")];
        let destination = self
            .config
            .session
            .target_zone
            .clone()
            .unwrap_or_else(|| self.catalog.optimal_zone(state.level, state.reputation));
        if destination != state.zone {
            goals.push(format!("reach {destination}"));
        }
        if state.faction.is_none() && state.level >= self.catalog.faction_min_level {
            goals.push("join a faction".to_owned());
        }
        if state.level >= self.catalog.boss_min_level {
            goals.push("challenge a boss".to_owned());
        }
        if let Some(tutorial) = &state.tutorial {
            goals.push(format!("finish tutorial step {}", tutorial.step));
        }
        goals
    }

    // -----------------------------------------------------------------------
    // Wrap-up
    // -----------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn finish(
        &mut self,
        session_id: Uuid,
        mut record: PersistedAgentRecord,
        state: &GameState,
        p: Progress,
        end: EndReason,
    ) -> SessionReport {
        self.transition(SessionPhase::Finished);
        let xp_delta = signed_delta(state.xp, p.start_xp);
        let shells_delta = signed_delta(state.shells, p.start_shells);

        if !state.zone.is_empty() {
            record.last_status = LastStatus::from(state);
            record.known_gear = KnownGear::from(state);
            record.faction_joined = Some(state.faction.is_some());
        }
        let lifetime = &mut record.lifetime;
        lifetime.sessions = lifetime.sessions.saturating_add(1);
        lifetime.total_actions = lifetime.total_actions.saturating_add(u64::from(p.actions));
        lifetime.total_xp = lifetime.total_xp.saturating_add(gain(xp_delta));
        lifetime.total_shells = lifetime.total_shells.saturating_add(gain(shells_delta));
        lifetime.kills = lifetime.kills.saturating_add(u64::from(p.kills));
        lifetime.deaths = lifetime.deaths.saturating_add(u64::from(p.deaths));
        if end == EndReason::AuthLost {
            record.api_key.clear();
        }
        if let Err(e) = self.store.save(&record) {
            error!(error = %e, "failed to persist agent record");
        }

        let facts = OutcomeFacts {
            actions: p.actions,
            kills: p.kills,
            deaths: p.deaths,
            xp_delta,
            shells_delta,
            cancelled: end == EndReason::Cancelled,
        };
        let bucket = bucket(&facts);
        let summary = format!(
            "{} actions ending in {}: {} kills, {} deaths, {xp_delta:+} xp, {shells_delta:+} shells ({})",
            p.actions,
            if state.zone.is_empty() { "an unknown zone" } else { state.zone.as_str() },
            p.kills,
            p.deaths,
            end.as_str()
        );
        info!(
            session_id = %session_id,
            end = end.as_str(),
            actions = p.actions,
            iterations = p.iterations,
            kills = p.kills,
            deaths = p.deaths,
            xp_delta = xp_delta,
            shells_delta = shells_delta,
            "session finished"
        );

        SessionReport {
            session_id,
            mode: self.config.session.mode,
            success: end.is_success(),
            summary,
            bucket,
            reflection: reflection(bucket).to_owned(),
            stats: SessionStats {
                final_zone: state.zone.clone(),
                level: state.level,
                hp: state.hp,
                energy: state.energy,
                shells: state.shells,
                xp: state.xp,
                actions_performed: p.actions,
                kills: p.kills,
                deaths: p.deaths,
                xp_delta,
                shells_delta,
                equipment: state.equipment.clone(),
                faction: state.faction.clone(),
                optimal_zone: self.catalog.optimal_zone(state.level, state.reputation),
                history: p.history,
                lifetime: record.lifetime,
            },
        }
    }

    fn registration_failure(&mut self, session_id: Uuid, cause: &AgentError) -> SessionReport {
        error!(session_id = %session_id, error = %cause, "registration failed");
        let cleared = if matches!(cause, AgentError::Registration(_) | AgentError::PaymentReverted(_)) {
            self.store.clear_key()
        } else {
            Ok(())
        };
        if let Err(e) = cleared {
            warn!(error = %e, "failed to clear key after registration failure");
        }
        self.transition(SessionPhase::Finished);
        let lifetime = self
            .store
            .load()
            .ok()
            .flatten()
            .map(|r| r.lifetime)
            .unwrap_or_default();
        let bucket = bucket(&OutcomeFacts::default());
        SessionReport {
            session_id,
            mode: self.config.session.mode,
            success: false,
            summary: format!("{}: {cause}", EndReason::RegistrationFailed.as_str()),
            bucket,
            reflection: reflection(bucket).to_owned(),
            stats: SessionStats {
                lifetime,
                ..SessionStats::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(verb: ActionVerb) -> ActionCandidate {
        ActionCandidate::new(verb, None, 1.0, "test")
    }

    #[tokio::test(start_paused = true)]
    async fn cooldowns_are_independent() {
        let tuning = SessionTuning::default();
        let mut p = Progress::default();
        let start = Instant::now();
        p.last_rest = Some(start);

        assert!(!p.is_available(&candidate(ActionVerb::Rest), &tuning, start));
        assert!(p.is_available(&candidate(ActionVerb::Broadcast), &tuning, start));
        assert!(p.is_available(&candidate(ActionVerb::Inbox), &tuning, start));

        tokio::time::advance(tuning.rest_cooldown).await;
        assert!(p.is_available(&candidate(ActionVerb::Rest), &tuning, Instant::now()));
    }

    #[test]
    fn inbox_and_trades_share_a_window() {
        let tuning = SessionTuning::default();
        let now = Instant::now();
        let p = Progress {
            last_social: Some(now),
            ..Progress::default()
        };
        assert!(!p.is_available(&candidate(ActionVerb::Inbox), &tuning, now));
        assert!(!p.is_available(&candidate(ActionVerb::Trades), &tuning, now));
    }

    #[test]
    fn rejected_keys_are_skipped_for_two_iterations() {
        let tuning = SessionTuning::default();
        let now = Instant::now();
        let flee = candidate(ActionVerb::Flee);
        let mut p = Progress::default();
        p.rejected.push((flee.key(), tuning.rejection_memory));

        assert!(!p.is_available(&flee, &tuning, now));
        p.age_rejections();
        assert!(!p.is_available(&flee, &tuning, now));
        p.age_rejections();
        assert!(p.is_available(&flee, &tuning, now));
    }

    #[test]
    fn loop_window_stays_bounded() {
        let tuning = SessionTuning::default();
        let mut p = Progress::default();
        for verb in [ActionVerb::Gather, ActionVerb::Rest, ActionVerb::Fight, ActionVerb::Fight, ActionVerb::Explore] {
            p.remember(candidate(verb).key(), tuning.loop_guard_window);
        }
        assert_eq!(p.recent.len(), tuning.loop_guard_window);
        let verbs: Vec<ActionVerb> = p.recent.iter().map(|k| k.verb).collect();
        assert_eq!(verbs, vec![ActionVerb::Fight, ActionVerb::Fight, ActionVerb::Explore]);
    }

    #[test]
    fn refusals_accumulate_strikes() {
        let tuning = SessionTuning::default();
        let gather = candidate(ActionVerb::Gather).key();
        let mut p = Progress::default();
        p.reject(gather.clone(), tuning.rejection_memory);
        p.age_rejections();
        p.age_rejections();
        p.reject(gather.clone(), tuning.rejection_memory);
        assert_eq!(p.strikes, vec![(gather, 2)]);
        assert_eq!(p.rejected.len(), 1);
    }

    #[test]
    fn deltas_saturate() {
        assert_eq!(signed_delta(50, 80), -30);
        assert_eq!(signed_delta(u64::MAX, 0), i64::MAX);
        assert_eq!(gain(-5), 0);
        assert_eq!(gain(12), 12);
    }

    #[test]
    fn end_reasons_classify_success() {
        assert!(EndReason::BudgetExhausted.is_success());
        assert!(EndReason::Cancelled.is_success());
        assert!(!EndReason::AuthLost.is_success());
        assert!(!EndReason::TooManyErrors.is_success());
    }
}
