//! Candidate generation and scoring.
//!
//! Every loop iteration asks [`generate_candidates`] for the full list of
//! sensible next actions. Rules run in a fixed order and each pushes zero
//! or more scored candidates; the list is then perturbed by the profile's
//! exploration noise and stably sorted, so on equal scores the earlier rule
//! wins. Apart from the noise step the function is pure.
//!
//! While the agent is in combat only the combat rules run.

use rand::Rng;
use shellbound_types::{
    ActionCandidate, ActionKey, ActionVerb, BehaviorProfile, Catalog, ConsumableKind, EquipmentSlot,
    Faction, GameState, SessionMode,
};
use tracing::info;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Hp fraction below which rest is considered.
const REST_HP: f64 = 0.8;

/// Energy fraction below which rest is considered.
const REST_ENERGY: f64 = 0.5;

/// Hp fraction that counts as critical.
const CRITICAL_HP: f64 = 0.3;

/// Hp fraction below which healing items are used.
const HEAL_HP: f64 = 0.5;

/// Energy fraction below which energy items are used outside combat.
const LOW_ENERGY: f64 = 0.3;

/// Inventory fill above which selling and returning to the hub get a bonus.
const CROWDED_INVENTORY: f64 = 0.7;

/// Inventory fill above which gathering is discouraged.
const FULL_INVENTORY: f64 = 0.9;

/// Creatures or zones more than this many levels above the agent are penalized.
const LEVEL_MARGIN: u32 = 2;

/// Shells that make restocking healing items worthwhile.
const RESTOCK_SHELLS: u64 = 100;

/// Bonus that makes fleeing the top pick when an attack is unaffordable.
pub const CANNOT_ATTACK_BONUS: f64 = 100.0;

/// Bonus for resting at critical hp.
pub const CRITICAL_HP_BONUS: f64 = 40.0;

/// Score of the way out of an unrecognized zone.
pub const ESCAPE_SCORE: f64 = 500.0;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Everything a scoring rule reads.
struct Inputs<'a> {
    state: &'a GameState,
    profile: &'a BehaviorProfile,
    mode: SessionMode,
    target_zone: Option<&'a str>,
    catalog: &'a Catalog,
}

impl Inputs<'_> {
    fn cost(&self, verb: ActionVerb) -> u32 {
        self.catalog.energy_cost(verb)
    }

    /// Whether the verb leaves enough energy for one flee afterwards.
    fn affordable_with_reserve(&self, verb: ActionVerb) -> bool {
        self.state.energy >= self.cost(verb).saturating_add(self.catalog.energy_reserve)
    }

    fn at_hub(&self) -> bool {
        self.state.zone == self.catalog.hub_zone
    }

    fn mode_bonus(&self, mode: SessionMode, bonus: f64) -> f64 {
        if self.mode == mode { bonus } else { 0.0 }
    }
}

/// Produce every candidate for the current state, best first.
pub fn generate_candidates<R: Rng + ?Sized>(
    state: &GameState,
    profile: &BehaviorProfile,
    mode: SessionMode,
    target_zone: Option<&str>,
    catalog: &Catalog,
    rng: &mut R,
) -> Vec<ActionCandidate> {
    let inputs = Inputs {
        state,
        profile,
        mode,
        target_zone,
        catalog,
    };
    let mut out = Vec::new();

    if state.in_combat() {
        combat_rules(&inputs, &mut out);
    } else {
        rest_rule(&inputs, &mut out);
        consumable_rules(&inputs, &mut out);
        buff_rule(&inputs, &mut out);
        fight_rules(&inputs, &mut out);
        pvp_rules(&inputs, &mut out);
        gather_rules(&inputs, &mut out);
        move_rules(&inputs, &mut out);
        explore_rule(&inputs, &mut out);
        quest_rules(&inputs, &mut out);
        hub_trade_rules(&inputs, &mut out);
        faction_rule(&inputs, &mut out);
        deposit_rules(&inputs, &mut out);
        boss_rule(&inputs, &mut out);
        social_rules(&inputs, &mut out);
        escape_rule(&inputs, &mut out);
    }

    add_noise(&mut out, profile.exploration, rng);
    sort_candidates(&mut out);
    out
}

fn add_noise<R: Rng + ?Sized>(candidates: &mut [ActionCandidate], amplitude: f64, rng: &mut R) {
    if amplitude <= 0.0 || amplitude.is_nan() {
        return;
    }
    for candidate in candidates {
        candidate.score += rng.random_range(-amplitude..=amplitude);
    }
}

/// Stable descending sort by score.
pub fn sort_candidates(candidates: &mut [ActionCandidate]) {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

fn combat_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    let s = i.state;
    let hp = s.hp_ratio();
    let attack_cost = i.cost(ActionVerb::Attack);
    let can_attack = s.energy >= attack_cost;

    out.push(ActionCandidate::new(ActionVerb::Rest, None, 2.0, "catch breath mid-fight"));

    if hp < HEAL_HP {
        if let Some(item) = best_held(i, ConsumableKind::Healing) {
            let score = (1.0 - hp).mul_add(30.0, 50.0);
            out.push(ActionCandidate::new(ActionVerb::Use, Some(item.as_str()), score, "heal mid-fight"));
        }
    }
    if !can_attack {
        if let Some(item) = best_held(i, ConsumableKind::Energy) {
            out.push(ActionCandidate::new(ActionVerb::Use, Some(item.as_str()), 45.0, "restore energy to keep fighting"));
        }
    }

    if s.energy >= i.cost(ActionVerb::Flee) {
        let mut score = i.profile.caution.mul_add(20.0, 10.0);
        let mut reason = String::from("retreat");
        if hp < CRITICAL_HP {
            score += 40.0;
            reason.push_str(", hp critical");
        }
        if !can_attack {
            score += CANNOT_ATTACK_BONUS;
            reason.push_str(", cannot attack");
        }
        out.push(ActionCandidate::new(ActionVerb::Flee, None, score, reason));
    }

    if can_attack {
        let mut score = i.profile.aggression.mul_add(20.0, 40.0);
        if hp > HEAL_HP {
            score += 10.0;
        }
        if hp < CRITICAL_HP {
            score -= i.profile.caution * 30.0;
        }
        let enemy = s.combat.enemy();
        out.push(ActionCandidate::new(ActionVerb::Attack, enemy, score, "press the attack"));
    }
}

// ---------------------------------------------------------------------------
// Recovery and consumables
// ---------------------------------------------------------------------------

fn rest_rule(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    let hp = i.state.hp_ratio();
    let energy = i.state.energy_ratio();
    if hp >= REST_HP && energy >= REST_ENERGY {
        return;
    }
    let mut score = (1.0 - energy).mul_add(20.0, (1.0 - hp).mul_add(30.0, 15.0)) + i.profile.caution * 10.0;
    let mut reason = String::from("recover");
    if hp < CRITICAL_HP {
        score += CRITICAL_HP_BONUS;
        reason.push_str(", critical hp");
    }
    out.push(ActionCandidate::new(ActionVerb::Rest, None, score, reason));
}

fn consumable_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    let hp = i.state.hp_ratio();
    if hp < HEAL_HP {
        if let Some(item) = best_held(i, ConsumableKind::Healing) {
            let score = (1.0 - hp).mul_add(40.0, 35.0);
            out.push(ActionCandidate::new(ActionVerb::Use, Some(item.as_str()), score, "heal up"));
        }
    }
    if i.state.energy_ratio() < LOW_ENERGY {
        if let Some(item) = best_held(i, ConsumableKind::Energy) {
            out.push(ActionCandidate::new(ActionVerb::Use, Some(item.as_str()), 30.0, "restore energy"));
        }
    }
}

fn buff_rule(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if i.state.creatures.is_empty() || i.state.hp_ratio() <= 0.6 {
        return;
    }
    if let Some(item) = best_held(i, ConsumableKind::Buff) {
        let score = i.profile.aggression.mul_add(10.0, 12.0);
        out.push(ActionCandidate::new(ActionVerb::Use, Some(item.as_str()), score, "buff before a fight"));
    }
}

/// Best held consumable of a kind: catalog priority first, then any item
/// whose reported type matches.
fn best_held(i: &Inputs<'_>, kind: ConsumableKind) -> Option<String> {
    i.catalog
        .consumables_of(kind)
        .into_iter()
        .find(|spec| i.state.has_item(&spec.id))
        .map(|spec| spec.id.clone())
        .or_else(|| {
            i.state
                .inventory
                .iter()
                .find(|item| item.quantity > 0 && item.item_type.eq_ignore_ascii_case(kind.as_str()))
                .map(|item| item.id.clone())
        })
}

// ---------------------------------------------------------------------------
// Combat starters, gathering, travel
// ---------------------------------------------------------------------------

fn fight_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if !i.affordable_with_reserve(ActionVerb::Fight) {
        return;
    }
    let hp = i.state.hp_ratio();
    for creature in &i.state.creatures {
        let mut score = i.profile.aggression.mul_add(25.0, 25.0) + i.mode_bonus(SessionMode::Grind, 20.0);
        if let Some(level) = creature.level {
            let gap = level.saturating_sub(i.state.level.saturating_add(LEVEL_MARGIN));
            score -= f64::from(gap) * 15.0;
        }
        if hp < HEAL_HP {
            score -= 25.0;
        }
        out.push(ActionCandidate::new(
            ActionVerb::Fight,
            Some(creature.name.as_str()),
            score,
            format!("hunt {}", creature.name),
        ));
    }
}

fn pvp_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if i.mode != SessionMode::Pvp
        || i.catalog.is_safe_zone(&i.state.zone)
        || !i.affordable_with_reserve(ActionVerb::Attack)
    {
        return;
    }
    for agent in &i.state.other_agents {
        let score = i.profile.aggression.mul_add(20.0, 30.0);
        out.push(ActionCandidate::new(ActionVerb::Attack, Some(agent.as_str()), score, format!("duel {agent}")));
    }
}

fn gather_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if !i.affordable_with_reserve(ActionVerb::Gather) {
        return;
    }
    let tutorial_wants_gather = i
        .state
        .tutorial
        .as_ref()
        .is_some_and(|t| t.hint.to_lowercase().contains("gather"));
    for node in i.state.resources.iter().filter(|n| n.quantity > 0) {
        let mut score = i.profile.greed.mul_add(15.0, 20.0) + i.mode_bonus(SessionMode::Grind, 15.0);
        let mut reason = format!("gather {}", node.id);
        if tutorial_wants_gather {
            score += 30.0;
            reason.push_str(", tutorial asks for it");
        }
        if i.catalog.pvp_flag_resources.contains(&node.id) {
            score -= i.profile.caution * 30.0;
            reason.push_str(", flags for pvp");
        }
        if i.state.inventory_fill() >= FULL_INVENTORY {
            score -= 20.0;
        }
        out.push(ActionCandidate::new(ActionVerb::Gather, Some(node.id.as_str()), score, reason));
    }
}

/// Where travel should be heading: the caller's target, else the farm zone.
fn destination(i: &Inputs<'_>) -> String {
    i.target_zone.map_or_else(
        || i.catalog.optimal_zone(i.state.level, i.state.reputation),
        ToOwned::to_owned,
    )
}

fn move_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if !i.affordable_with_reserve(ActionVerb::Move) {
        return;
    }
    let s = i.state;
    let destination = destination(i);
    let next_hop = i.catalog.next_hop(&s.zone, &destination);
    let wants_hub = s.inventory_fill() > CROWDED_INVENTORY
        || (s.shells >= RESTOCK_SHELLS && !s.has_consumable_type(ConsumableKind::Healing));

    for zone_id in s.connected_zones.iter().filter(|z| **z != s.zone) {
        let spec = i.catalog.zone(zone_id);
        if spec.is_some_and(|z| z.min_reputation > s.reputation) {
            continue;
        }
        let mut score = i.profile.exploration.mul_add(15.0, 8.0) + i.mode_bonus(SessionMode::Adventure, 10.0);
        let mut reason = format!("travel to {zone_id}");

        if *zone_id == destination || next_hop.as_deref() == Some(zone_id.as_str()) {
            score += 25.0;
            reason.push_str(", toward ");
            reason.push_str(&destination);
        }
        if let Some(spec) = spec {
            let gap = spec.min_level.saturating_sub(s.level.saturating_add(LEVEL_MARGIN));
            score -= f64::from(gap) * 10.0;
            if spec.hazardous {
                score -= i.profile.caution * 15.0;
            }
            if s.pvp_flagged && spec.safe {
                score += i.profile.caution * 20.0;
                reason.push_str(", safety while flagged");
            }
            if spec.arena && i.mode != SessionMode::Pvp {
                score -= 30.0;
            }
        }
        if *zone_id == i.catalog.hub_zone && wants_hub {
            score += 20.0;
            reason.push_str(", resupply at hub");
        }
        out.push(ActionCandidate::new(ActionVerb::Move, Some(zone_id.as_str()), score, reason));
    }
}

fn explore_rule(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if !i.affordable_with_reserve(ActionVerb::Explore) {
        return;
    }
    let score = i.profile.exploration.mul_add(10.0, 5.0) + i.mode_bonus(SessionMode::Adventure, 10.0);
    out.push(ActionCandidate::new(ActionVerb::Explore, None, score, "look for something new"));
}

// ---------------------------------------------------------------------------
// Quests, hub economy, factions
// ---------------------------------------------------------------------------

fn quest_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    let s = i.state;
    let bonus = i.mode_bonus(SessionMode::Quest, 20.0);
    for quest in s.quests.iter().filter(|q| q.is_ready_to_complete()) {
        out.push(ActionCandidate::new(
            ActionVerb::CompleteQuest,
            Some(quest.id.as_str()),
            60.0 + bonus,
            format!("turn in {}", quest.name),
        ));
    }
    if s.active_quest.is_none() {
        for quest in s.quests.iter().filter(|q| q.status == "available") {
            out.push(ActionCandidate::new(
                ActionVerb::AcceptQuest,
                Some(quest.id.as_str()),
                i.profile.persistence.mul_add(10.0, 25.0) + bonus,
                format!("take on {}", quest.name),
            ));
        }
    }
    if s.quests.is_empty() {
        out.push(ActionCandidate::new(
            ActionVerb::Quests,
            None,
            6.0 + i.mode_bonus(SessionMode::Quest, 15.0),
            "check the quest board",
        ));
    }
}

fn hub_trade_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if !i.at_hub() {
        return;
    }
    let s = i.state;
    let crowded = s.inventory_fill() > CROWDED_INVENTORY;

    for item in s
        .inventory
        .iter()
        .filter(|item| !item.equipped && item.quantity > 0 && i.catalog.is_sellable(&item.id))
    {
        let score = i.profile.greed.mul_add(10.0, 15.0) + if crowded { 15.0 } else { 0.0 };
        out.push(
            ActionCandidate::new(ActionVerb::Sell, Some(item.id.as_str()), score, format!("sell {}", item.id))
                .with_param("quantity", item.quantity),
        );
    }

    for slot in EquipmentSlot::ALL {
        let current = s.equipment.get(&slot).map(String::as_str);
        if let Some(tier) = i.catalog.next_upgrade(slot, current, s.shells, s.level) {
            if !s.has_item(&tier.id) {
                let score = i.profile.greed.mul_add(5.0, 22.0);
                out.push(ActionCandidate::new(
                    ActionVerb::Buy,
                    Some(tier.id.as_str()),
                    score,
                    format!("upgrade {} to {}", slot.as_str(), tier.id),
                ));
            }
        }
    }

    if !s.has_consumable_type(ConsumableKind::Healing) {
        if let Some(spec) = i.catalog.cheapest_of(ConsumableKind::Healing) {
            if s.shells >= spec.price.saturating_mul(2) {
                out.push(ActionCandidate::new(ActionVerb::Buy, Some(spec.id.as_str()), 18.0, "stock healing"));
            }
        }
    }

    for recipe in &i.catalog.recipes {
        let craftable = recipe
            .inputs
            .iter()
            .all(|(material, qty)| s.item_quantity(material) >= *qty);
        if craftable {
            let missing_kind = i
                .catalog
                .consumable(&recipe.output)
                .is_some_and(|spec| !s.has_consumable_type(spec.kind));
            let score = 14.0 + if missing_kind { 10.0 } else { 0.0 };
            out.push(ActionCandidate::new(
                ActionVerb::Craft,
                Some(recipe.output.as_str()),
                score,
                format!("craft {}", recipe.output),
            ));
        }
    }

    for item in s.inventory.iter().filter(|item| !item.equipped) {
        let Some(tier) = i.catalog.gear_tier(&item.id) else {
            continue;
        };
        if tier.min_level > s.level {
            continue;
        }
        let current_rank = s
            .equipment
            .get(&tier.slot)
            .and_then(|id| i.catalog.gear_tier(id))
            .map(|g| g.rank);
        if current_rank.is_none_or(|rank| tier.rank > rank) {
            out.push(ActionCandidate::new(
                ActionVerb::Equip,
                Some(item.id.as_str()),
                35.0,
                format!("wear {}", item.id),
            ));
        }
    }

    out.push(ActionCandidate::new(ActionVerb::Browse, None, 4.0, "see what the shop has"));
}

/// Faction that best fits the profile. Ties go to cult, then salvagers.
pub fn choose_faction(profile: &BehaviorProfile) -> Faction {
    let options = [
        (Faction::Cult, profile.aggression),
        (Faction::Salvagers, profile.greed + profile.persistence),
        (Faction::Wardens, profile.caution),
    ];
    options
        .into_iter()
        .fold((Faction::Cult, f64::MIN), |best, (faction, affinity)| {
            if affinity > best.1 { (faction, affinity) } else { best }
        })
        .0
}

fn faction_rule(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    let s = i.state;
    if !i.at_hub() || s.faction.is_some() || s.level < i.catalog.faction_min_level {
        return;
    }
    let faction = choose_faction(i.profile);
    out.push(ActionCandidate::new(
        ActionVerb::JoinFaction,
        Some(faction.as_str()),
        30.0,
        format!("join the {}", faction.as_str()),
    ));
}

fn deposit_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if !i.at_hub() {
        return;
    }
    for item in i
        .state
        .inventory
        .iter()
        .filter(|item| item.quantity > 0 && i.catalog.valuables.contains(&item.id))
    {
        let score = i.profile.greed.mul_add(10.0, 16.0);
        out.push(
            ActionCandidate::new(ActionVerb::Deposit, Some(item.id.as_str()), score, format!("vault {}", item.id))
                .with_param("quantity", item.quantity),
        );
    }
}

fn boss_rule(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    let s = i.state;
    let Some(boss) = i.catalog.zone(&s.zone).and_then(|z| z.boss.as_deref()) else {
        return;
    };
    if s.level < i.catalog.boss_min_level || s.hp_ratio() < REST_HP || !i.affordable_with_reserve(ActionVerb::Challenge) {
        return;
    }
    let score = i.profile.aggression.mul_add(20.0, 40.0);
    out.push(ActionCandidate::new(ActionVerb::Challenge, Some(boss), score, format!("challenge the {boss}")));
}

// ---------------------------------------------------------------------------
// Social
// ---------------------------------------------------------------------------

fn social_rules(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    let s = i.state;
    let social = i.mode == SessionMode::Social;
    if social || !s.other_agents.is_empty() {
        let score = i.profile.sociability.mul_add(10.0, 5.0) + i.mode_bonus(SessionMode::Social, 25.0);
        let message = format!("Greetings from {}!", s.zone.replace('_', " "));
        out.push(
            ActionCandidate::new(ActionVerb::Broadcast, None, score, "say hello").with_param("message", message),
        );
    }
    let inbox = i.profile.sociability.mul_add(8.0, 4.0) + i.mode_bonus(SessionMode::Social, 20.0);
    out.push(ActionCandidate::new(ActionVerb::Inbox, None, inbox, "check messages"));
    if social || i.at_hub() {
        let trades = i.profile.greed.mul_add(5.0, 3.0) + i.mode_bonus(SessionMode::Social, 15.0);
        out.push(ActionCandidate::new(ActionVerb::Trades, None, trades, "check trade offers"));
    }
}

// ---------------------------------------------------------------------------
// Escape
// ---------------------------------------------------------------------------

fn escape_rule(i: &Inputs<'_>, out: &mut Vec<ActionCandidate>) {
    if i.catalog.is_known_zone(&i.state.zone) || !i.affordable_with_reserve(ActionVerb::Move) {
        return;
    }
    out.push(ActionCandidate::new(
        ActionVerb::Move,
        Some(i.catalog.hub_zone.as_str()),
        ESCAPE_SCORE,
        "escape unrecognized zone",
    ));
}

// ---------------------------------------------------------------------------
// Loop guard and logging
// ---------------------------------------------------------------------------

/// Penalize a key repeated for the whole `window` at the end of `history`.
///
/// Every candidate with that key loses exactly `penalty` and the list is
/// re-sorted. Returns the penalized key, if any.
pub fn apply_loop_guard(
    candidates: &mut [ActionCandidate],
    history: &[ActionKey],
    window: usize,
    penalty: f64,
) -> Option<ActionKey> {
    if window == 0 || history.len() < window {
        return None;
    }
    let mut recent = history.iter().rev().take(window);
    let last = recent.next()?;
    if !recent.all(|key| key == last) {
        return None;
    }
    for candidate in candidates.iter_mut().filter(|c| c.key() == *last) {
        candidate.score -= penalty;
    }
    sort_candidates(candidates);
    Some(last.clone())
}

/// Lower every candidate the server has refused before.
///
/// `strikes` counts refusals per key. Each refusal costs `penalty` points, so
/// a key that keeps getting rejected eventually drops below alternatives the
/// rules score lower, such as exploring instead of retrying blocked exits.
/// Re-sorts when anything changed.
pub fn apply_rejection_penalty(candidates: &mut [ActionCandidate], strikes: &[(ActionKey, u32)], penalty: f64) {
    if strikes.is_empty() {
        return;
    }
    let mut changed = false;
    for candidate in candidates.iter_mut() {
        let key = candidate.key();
        if let Some((_, count)) = strikes.iter().find(|(k, _)| *k == key) {
            candidate.score -= penalty * f64::from(*count);
            changed = true;
        }
    }
    if changed {
        sort_candidates(candidates);
    }
}

/// Log the best `n` candidates before the pick.
pub fn log_top(candidates: &[ActionCandidate], n: usize) {
    for (rank, candidate) in candidates.iter().take(n).enumerate() {
        info!(
            rank = rank.saturating_add(1),
            action = %candidate.key(),
            score = candidate.score,
            reason = %candidate.reason,
            "candidate"
        );
    }
}
