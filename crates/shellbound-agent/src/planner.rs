//! Pre-session preparation at the hub.
//!
//! When the agent starts a session at the hub with junk to sell, shells to
//! spend or an empty slot, it runs one bounded shopping trip before the
//! main loop: sell, upgrade gear, stock consumables, maybe join a faction.
//! Every step is best-effort; a failed step is logged and the trip goes on.

use shellbound_types::{
    ActionRequest, ActionVerb, BehaviorProfile, Catalog, ConsumableKind, EquipmentSlot, Faction, GameState,
    InventoryItem,
};
use tracing::{info, warn};

use crate::cancel::CancelFlag;
use crate::client::GameApi;
use crate::extract;
use crate::scoring::choose_faction;

/// Inventory fill that makes a selling trip worthwhile.
const SELL_FILL: f64 = 0.7;

/// Shells at which a missing healing item triggers a restock.
const RESTOCK_SHELLS: u64 = 100;

/// Level from which survival potions are always carried.
const SURVIVAL_LEVEL: u32 = 7;

/// Consumables topped up when none are held, with quantities.
const STAPLES: &[(&str, u32)] = &[("healing_kelp", 3), ("tide_tonic", 2)];

/// Survival consumable for hazardous zones.
const SURVIVAL_ITEM: &str = "pressure_potion";

/// What one preparation trip did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparationOutcome {
    /// Steps sent to the service.
    pub attempted: u32,
    /// Steps that were rejected or errored.
    pub failed: u32,
    /// Shells spent on purchases.
    pub shells_spent: u64,
    /// Shells earned from sales.
    pub shells_earned: u64,
    /// Faction joined during the trip.
    pub joined_faction: Option<Faction>,
    /// The trip stopped early on cancellation.
    pub cancelled: bool,
}

/// Whether a preparation trip is worth making.
pub fn needs_preparation(state: &GameState, catalog: &Catalog) -> bool {
    let sellable = state
        .inventory
        .iter()
        .filter(|item| !item.equipped && catalog.is_sellable(&item.id))
        .count();
    let sellable = u32::try_from(sellable).unwrap_or(u32::MAX);
    let crowded = f64::from(sellable) / f64::from(state.inventory_capacity.max(1)) > SELL_FILL;

    let upgrade = EquipmentSlot::ALL.iter().any(|slot| {
        let current = state.equipment.get(slot).map(String::as_str);
        catalog.next_upgrade(*slot, current, state.shells, state.level).is_some()
    });

    let no_healing = !state.has_consumable_type(ConsumableKind::Healing) && state.shells >= RESTOCK_SHELLS;

    crowded || upgrade || no_healing
}

/// Runs the preparation sequence against the service.
pub struct Planner<'a, G> {
    api: &'a G,
    api_key: &'a str,
    catalog: &'a Catalog,
    cancel: &'a CancelFlag,
}

impl<'a, G: GameApi> Planner<'a, G> {
    /// Planner acting with `api_key`.
    pub const fn new(api: &'a G, api_key: &'a str, catalog: &'a Catalog, cancel: &'a CancelFlag) -> Self {
        Self {
            api,
            api_key,
            catalog,
            cancel,
        }
    }

    /// Run the trip, updating `state` as responses arrive.
    ///
    /// `last_zone` is where the agent spent the previous session; a
    /// hazardous zone there means a survival potion is bought.
    pub async fn prepare(
        &self,
        state: &mut GameState,
        profile: &BehaviorProfile,
        last_zone: Option<&str>,
    ) -> PreparationOutcome {
        let mut outcome = PreparationOutcome::default();
        if state.zone != self.catalog.hub_zone {
            info!(zone = %state.zone, "not at hub, skipping preparation");
            return outcome;
        }
        info!(shells = state.shells, level = state.level, "preparation started");

        let stages: [Stage; 6] = [
            Stage::Inventory,
            Stage::Sell,
            Stage::Gear,
            Stage::Staples,
            Stage::Survival,
            Stage::Faction,
        ];
        for stage in stages {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            match stage {
                Stage::Inventory => {
                    self.step(state, &mut outcome, ActionRequest::bare(ActionVerb::Inventory), 0)
                        .await;
                }
                Stage::Sell => self.sell_junk(state, &mut outcome).await,
                Stage::Gear => self.upgrade_gear(state, &mut outcome).await,
                Stage::Staples => self.stock_staples(state, &mut outcome).await,
                Stage::Survival => self.stock_survival(state, &mut outcome, last_zone).await,
                Stage::Faction => self.join_faction(state, &mut outcome, profile).await,
            }
        }

        info!(
            attempted = outcome.attempted,
            failed = outcome.failed,
            shells_spent = outcome.shells_spent,
            shells_earned = outcome.shells_earned,
            cancelled = outcome.cancelled,
            "preparation finished"
        );
        outcome
    }

    async fn sell_junk(&self, state: &mut GameState, outcome: &mut PreparationOutcome) {
        let junk: Vec<(String, u32)> = state
            .inventory
            .iter()
            .filter(|item| !item.equipped && item.quantity > 0 && self.catalog.is_sellable(&item.id))
            .map(|item| (item.id.clone(), item.quantity))
            .collect();
        for (id, quantity) in junk {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return;
            }
            let request = quantity_request(ActionVerb::Sell, &id, quantity);
            self.step(state, outcome, request, 0).await;
        }
    }

    async fn upgrade_gear(&self, state: &mut GameState, outcome: &mut PreparationOutcome) {
        for slot in EquipmentSlot::ALL {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return;
            }
            let current = state.equipment.get(&slot).cloned();
            let Some(tier) = self
                .catalog
                .next_upgrade(slot, current.as_deref(), state.shells, state.level)
                .cloned()
            else {
                continue;
            };
            if !state.has_item(&tier.id) {
                let bought = self
                    .step(state, outcome, ActionRequest::targeted(ActionVerb::Buy, &tier.id), tier.price)
                    .await;
                if !bought {
                    continue;
                }
                add_local(state, &tier.id, 1);
            }
            if self
                .step(state, outcome, ActionRequest::targeted(ActionVerb::Equip, &tier.id), 0)
                .await
            {
                for item in state.inventory.iter_mut().filter(|i| i.id == tier.id) {
                    item.equipped = true;
                    item.slot = Some(slot);
                }
                state.equipment.insert(slot, tier.id.clone());
                info!(slot = slot.as_str(), item = %tier.id, "equipped upgrade");
            }
        }
    }

    async fn stock_staples(&self, state: &mut GameState, outcome: &mut PreparationOutcome) {
        for (id, quantity) in STAPLES {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                return;
            }
            self.buy_if_absent(state, outcome, id, *quantity).await;
        }
    }

    async fn stock_survival(&self, state: &mut GameState, outcome: &mut PreparationOutcome, last_zone: Option<&str>) {
        let hazardous = last_zone
            .and_then(|z| self.catalog.zone(z))
            .is_some_and(|z| z.hazardous);
        if state.level >= SURVIVAL_LEVEL || hazardous {
            self.buy_if_absent(state, outcome, SURVIVAL_ITEM, 1).await;
        }
    }

    async fn buy_if_absent(&self, state: &mut GameState, outcome: &mut PreparationOutcome, id: &str, quantity: u32) {
        let Some(spec) = self.catalog.consumable(id) else {
            return;
        };
        let total = spec.price.saturating_mul(u64::from(quantity));
        if state.has_item(id) || state.shells < total {
            return;
        }
        let request = quantity_request(ActionVerb::Buy, id, quantity);
        if self.step(state, outcome, request, total).await {
            add_local(state, id, quantity);
        }
    }

    async fn join_faction(&self, state: &mut GameState, outcome: &mut PreparationOutcome, profile: &BehaviorProfile) {
        if state.faction.is_some() || state.level < self.catalog.faction_min_level {
            return;
        }
        let faction = choose_faction(profile);
        let request = ActionRequest::targeted(ActionVerb::JoinFaction, faction.as_str());
        if self.step(state, outcome, request, 0).await {
            state.faction = Some(faction.as_str().to_owned());
            outcome.joined_faction = Some(faction);
            info!(faction = faction.as_str(), "joined faction");
        }
    }

    /// Send one request and fold the response into `state`.
    ///
    /// `expected_cost` is deducted locally when the response does not
    /// report the new balance. Returns whether the step succeeded.
    async fn step(
        &self,
        state: &mut GameState,
        outcome: &mut PreparationOutcome,
        request: ActionRequest,
        expected_cost: u64,
    ) -> bool {
        outcome.attempted = outcome.attempted.saturating_add(1);
        let before = state.shells;
        match self.api.act(self.api_key, &request).await {
            Ok(response) if response.success => {
                extract::merge_action_response(state, &response, self.catalog);
                if state.shells == before && expected_cost > 0 {
                    state.shells = state.shells.saturating_sub(expected_cost);
                }
                if state.shells < before {
                    outcome.shells_spent = outcome.shells_spent.saturating_add(before.saturating_sub(state.shells));
                } else {
                    outcome.shells_earned = outcome.shells_earned.saturating_add(state.shells.saturating_sub(before));
                }
                true
            }
            Ok(response) => {
                outcome.failed = outcome.failed.saturating_add(1);
                warn!(action = %request.action, item = ?request.target, reason = %response.text(), "preparation step rejected");
                false
            }
            Err(e) => {
                outcome.failed = outcome.failed.saturating_add(1);
                warn!(action = %request.action, item = ?request.target, error = %e, "preparation step failed");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Inventory,
    Sell,
    Gear,
    Staples,
    Survival,
    Faction,
}

fn quantity_request(verb: ActionVerb, target: &str, quantity: u32) -> ActionRequest {
    let mut params = serde_json::Map::new();
    params.insert("quantity".to_owned(), quantity.into());
    ActionRequest {
        action: verb,
        target: Some(target.to_owned()),
        params: Some(params),
    }
}

/// Record a purchase locally until the next inventory refresh.
fn add_local(state: &mut GameState, id: &str, quantity: u32) {
    if let Some(item) = state.inventory.iter_mut().find(|item| item.id == id) {
        item.quantity = item.quantity.saturating_add(quantity);
        return;
    }
    state.inventory.push(InventoryItem {
        id: id.to_owned(),
        quantity,
        ..InventoryItem::default()
    });
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::Value;
    use shellbound_types::{ActionResponse, HUB_ZONE};

    use super::*;
    use crate::client::EntryStatus;
    use crate::error::AgentError;

    /// Accepts everything and records what was asked.
    #[derive(Default)]
    struct RecordingApi {
        calls: RefCell<Vec<ActionRequest>>,
        reject: Option<ActionVerb>,
    }

    impl GameApi for RecordingApi {
        async fn entry_status(&self, _wallet: &str) -> Result<EntryStatus, AgentError> {
            Ok(EntryStatus::default())
        }

        async fn season(&self) -> Result<Value, AgentError> {
            Ok(Value::Null)
        }

        async fn enter(&self, _wallet: &str, _name: &str) -> Result<String, AgentError> {
            Ok(String::new())
        }

        async fn act(&self, _api_key: &str, request: &ActionRequest) -> Result<ActionResponse, AgentError> {
            self.calls.borrow_mut().push(request.clone());
            let success = self.reject != Some(request.action);
            Ok(ActionResponse {
                success,
                message: (!success).then(|| "You can't do that here.".to_owned()),
                ..ActionResponse::default()
            })
        }
    }

    fn item(id: &str, quantity: u32) -> InventoryItem {
        InventoryItem {
            id: id.to_owned(),
            quantity,
            ..InventoryItem::default()
        }
    }

    fn hub_state() -> GameState {
        GameState {
            zone: HUB_ZONE.to_owned(),
            level: 5,
            hp: 100,
            max_hp: 100,
            energy: 100,
            max_energy: 100,
            shells: 300,
            inventory_capacity: 20,
            inventory: vec![item("driftwood", 4), item("kelp_fronds", 6)],
            ..GameState::default()
        }
    }

    fn verbs(api: &RecordingApi) -> Vec<(ActionVerb, Option<String>)> {
        api.calls
            .borrow()
            .iter()
            .map(|r| (r.action, r.target.clone()))
            .collect()
    }

    #[test]
    fn trigger_conditions() {
        let catalog = Catalog::standard();
        let mut state = hub_state();
        assert!(needs_preparation(&state, &catalog));

        state.shells = 0;
        state.inventory = vec![item("healing_kelp", 1)];
        assert!(!needs_preparation(&state, &catalog));

        state.inventory = (0..15).map(|n| item(if n % 2 == 0 { "driftwood" } else { "old_boot" }, 1)).collect();
        assert!(needs_preparation(&state, &catalog));
    }

    #[tokio::test]
    async fn full_trip_sells_buys_equips_and_joins() {
        let api = RecordingApi::default();
        let catalog = Catalog::standard();
        let cancel = CancelFlag::new();
        let planner = Planner::new(&api, "key", &catalog, &cancel);
        let mut state = hub_state();
        let profile = BehaviorProfile {
            caution: 0.9,
            ..BehaviorProfile::uniform(0.1)
        };

        let outcome = planner.prepare(&mut state, &profile, Some("deep_trench")).await;
        let calls = verbs(&api);

        assert_eq!(calls.first().map(|c| c.0), Some(ActionVerb::Inventory));
        assert!(calls.contains(&(ActionVerb::Sell, Some("driftwood".to_owned()))));
        assert!(!calls.iter().any(|c| c.0 == ActionVerb::Sell && c.1.as_deref() == Some("kelp_fronds")));
        assert!(calls.contains(&(ActionVerb::Buy, Some("coral_dagger".to_owned()))));
        assert!(calls.contains(&(ActionVerb::Equip, Some("coral_dagger".to_owned()))));
        assert!(calls.contains(&(ActionVerb::JoinFaction, Some("wardens".to_owned()))));
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.joined_faction, Some(Faction::Wardens));
        assert_eq!(state.equipment.get(&EquipmentSlot::Weapon).map(String::as_str), Some("coral_dagger"));
        assert!(outcome.shells_spent > 0);
    }

    #[tokio::test]
    async fn rejected_buy_skips_equip() {
        let api = RecordingApi {
            reject: Some(ActionVerb::Buy),
            ..RecordingApi::default()
        };
        let catalog = Catalog::standard();
        let cancel = CancelFlag::new();
        let planner = Planner::new(&api, "key", &catalog, &cancel);
        let mut state = hub_state();

        let outcome = planner.prepare(&mut state, &BehaviorProfile::default(), None).await;
        assert!(outcome.failed > 0);
        assert!(verbs(&api).iter().all(|c| c.0 != ActionVerb::Equip));
        assert!(state.equipment.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_before_any_step() {
        let api = RecordingApi::default();
        let catalog = Catalog::standard();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let planner = Planner::new(&api, "key", &catalog, &cancel);
        let mut state = hub_state();

        let outcome = planner.prepare(&mut state, &BehaviorProfile::default(), None).await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.attempted, 0);
        assert!(api.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn away_from_hub_does_nothing() {
        let api = RecordingApi::default();
        let catalog = Catalog::standard();
        let cancel = CancelFlag::new();
        let planner = Planner::new(&api, "key", &catalog, &cancel);
        let mut state = GameState {
            zone: "kelp_forest".to_owned(),
            ..hub_state()
        };
        let outcome = planner.prepare(&mut state, &BehaviorProfile::default(), None).await;
        assert_eq!(outcome, PreparationOutcome::default());
        assert!(api.calls.borrow().is_empty());
    }
}
