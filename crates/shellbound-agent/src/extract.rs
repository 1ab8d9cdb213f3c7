//! Game-state extraction.
//!
//! Turns the loosely structured `look` and `status` responses into a
//! canonical [`GameState`]. Structured `agent` fields are trusted first;
//! anything missing is mined from the narrative by the independent rules
//! in [`crate::narrative`], and zone topology falls back to the catalog.
//! A parse miss never fails: the field keeps its default.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use shellbound_types::{
    ActionResponse, Catalog, CombatState, EquipmentSlot, GameState, InventoryItem, Quest, TutorialHint,
};
use tracing::debug;

use crate::narrative;

/// Inventory stack limit assumed when the service does not report one.
pub const DEFAULT_INVENTORY_CAPACITY: u32 = 20;

// ---------------------------------------------------------------------------
// Layered field lookup
// ---------------------------------------------------------------------------

/// JSON objects consulted in priority order.
struct Fields<'a> {
    layers: Vec<&'a Map<String, Value>>,
}

impl<'a> Fields<'a> {
    const fn new(layers: Vec<&'a Map<String, Value>>) -> Self {
        Self { layers }
    }

    /// First non-null value under any of `keys`, scanning layers in order.
    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        self.layers.iter().find_map(|layer| {
            keys.iter()
                .find_map(|key| layer.get(*key).filter(|v| !v.is_null()))
        })
    }

    fn u32(&self, keys: &[&str]) -> Option<u32> {
        self.get(keys).and_then(as_u64).and_then(|v| u32::try_from(v).ok())
    }

    fn u64(&self, keys: &[&str]) -> Option<u64> {
        self.get(keys).and_then(as_u64)
    }

    fn i64(&self, keys: &[&str]) -> Option<i64> {
        self.get(keys).and_then(as_i64)
    }

    fn bool(&self, keys: &[&str]) -> Option<bool> {
        self.get(keys).and_then(Value::as_bool)
    }

    fn string(&self, keys: &[&str]) -> Option<String> {
        self.get(keys).and_then(id_of)
    }
}

/// Numbers may arrive as integers, floats or numeric strings.
fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(Decimal::from)
            .or_else(|| n.as_u64().map(Decimal::from))
            .or_else(|| n.as_f64().and_then(Decimal::from_f64_retain)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    let d = as_decimal(value)?.round();
    if d.is_sign_negative() {
        return Some(0);
    }
    d.to_u64()
}

fn as_i64(value: &Value) -> Option<i64> {
    as_decimal(value)?.round().to_i64()
}

/// A name given as a string or as an object with `id` / `name`.
fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Object(map) => ["id", "itemId", "item_id", "name"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(|s| s.trim().to_owned()),
        _ => None,
    }
    .filter(|s| !s.is_empty())
}

fn object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

fn narrative_of(body: Option<&Value>) -> Option<&str> {
    body.and_then(|b| b.get("narrative"))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Full survey
// ---------------------------------------------------------------------------

/// Build a fresh state from the `look` and `status` responses.
///
/// `status` overrides `look` field by field. Either may be missing.
pub fn extract_state(look: Option<&Value>, status: Option<&Value>, catalog: &Catalog) -> GameState {
    let status_agent = object(status.and_then(|s| s.get("agent")));
    let look_agent = object(look.and_then(|l| l.get("agent")));
    let agent_layers: Vec<&Map<String, Value>> = [status_agent, look_agent].into_iter().flatten().collect();
    let top_layers: Vec<&Map<String, Value>> =
        [object(status), object(look)].into_iter().flatten().collect();
    let agent = Fields::new(agent_layers.clone());
    let everything = Fields::new(agent_layers.into_iter().chain(top_layers).collect());

    let text = [narrative_of(look), narrative_of(status)]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");

    let mut state = GameState {
        level: 1,
        inventory_capacity: DEFAULT_INVENTORY_CAPACITY,
        narrative: text.clone(),
        ..GameState::default()
    };
    let structured_combat = apply_agent_fields(&mut state, &agent);

    if state.zone.is_empty() {
        state.zone = everything
            .string(&["location", "zone"])
            .map(|z| narrative::normalize_id(&z))
            .or_else(|| narrative::zone(&text))
            .unwrap_or_default();
    }

    state.resources = narrative::resources(&text).unwrap_or_default();
    state.creatures = narrative::creatures(&text).unwrap_or_default();
    state.other_agents = string_list(everything.get(&["otherAgents", "other_agents", "agents"]))
        .or_else(|| narrative::other_agents(&text))
        .unwrap_or_default();
    state.connected_zones = string_list(everything.get(&["exits", "connectedZones", "connected_zones"]))
        .map(|zones| zones.iter().map(|z| narrative::normalize_id(z)).collect())
        .or_else(|| narrative::exits(&text))
        .unwrap_or_else(|| catalog.exits(&state.zone));

    if !structured_combat {
        state.combat = narrative::combat(&text).unwrap_or_default();
    } else if let CombatState::InCombat { enemy: None } = state.combat {
        state.combat = CombatState::InCombat {
            enemy: narrative::combat(&text).and_then(|c| c.enemy().map(ToOwned::to_owned)),
        };
    }
    if everything.bool(&["pvpFlagged", "pvp_flagged"]).is_none() {
        state.pvp_flagged = narrative::pvp_flag(&text).unwrap_or(false);
    }
    state.tutorial = everything
        .get(&["tutorial"])
        .and_then(parse_tutorial)
        .or_else(|| narrative::tutorial(&text));

    if let Some(inventory) = everything.get(&["inventory"]) {
        state.inventory = parse_inventory(inventory, catalog);
    }
    state.equipment = parse_equipment(everything.get(&["equipment", "equipped"]));
    reconcile_equipment(&mut state.equipment, &state.inventory);

    state.quests = everything
        .get(&["quests"])
        .map(parse_quests)
        .filter(|q| !q.is_empty())
        .or_else(|| narrative::quests(&text))
        .unwrap_or_default();
    state.active_quest = everything.string(&["activeQuest", "active_quest", "currentQuest"]);

    state.needs_escape = needs_escape(&state, catalog);
    debug!(
        zone = %state.zone,
        level = state.level,
        hp = state.hp,
        energy = state.energy,
        creatures = state.creatures.len(),
        resources = state.resources.len(),
        exits = state.connected_zones.len(),
        in_combat = state.in_combat(),
        needs_escape = state.needs_escape,
        "state extracted"
    );
    state
}

/// Copy every agent field that is present onto `state`.
///
/// Returns whether the combat flag was among them.
fn apply_agent_fields(state: &mut GameState, agent: &Fields<'_>) -> bool {
    if let Some(zone) = agent.string(&["location", "zone"]) {
        state.zone = narrative::normalize_id(&zone);
    }
    if let Some(level) = agent.u32(&["level", "lvl"]) {
        state.level = level;
    }
    if let Some(hp) = agent.u32(&["hp", "health"]) {
        state.hp = hp;
    }
    if let Some(max_hp) = agent.u32(&["maxHp", "max_hp", "maxHealth", "max_health"]) {
        state.max_hp = max_hp;
    }
    if let Some(energy) = agent.u32(&["energy"]) {
        state.energy = energy;
    }
    if let Some(max_energy) = agent.u32(&["maxEnergy", "max_energy"]) {
        state.max_energy = max_energy;
    }
    if let Some(shells) = agent.u64(&["shells", "currency", "gold"]) {
        state.shells = shells;
    }
    if let Some(xp) = agent.u64(&["xp", "experience"]) {
        state.xp = xp;
    }
    if let Some(reputation) = agent.i64(&["reputation", "rep"]) {
        state.reputation = reputation;
    }
    if let Some(faction) = agent.get(&["faction"]) {
        state.faction = id_of(faction).filter(|f| !f.eq_ignore_ascii_case("none"));
    }
    if let Some(capacity) = agent.u32(&["inventoryCapacity", "inventory_capacity", "inventorySlots"]) {
        state.inventory_capacity = capacity;
    }
    if let Some(flagged) = agent.bool(&["pvpFlagged", "pvp_flagged"]) {
        state.pvp_flagged = flagged;
    }
    match agent.bool(&["inCombat", "in_combat"]) {
        Some(true) => {
            if !state.in_combat() {
                state.combat = CombatState::InCombat { enemy: None };
            }
            true
        }
        Some(false) => {
            state.combat = CombatState::OutOfCombat;
            true
        }
        None => false,
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items: Vec<String> = value?.as_array()?.iter().filter_map(id_of).collect();
    if items.is_empty() { None } else { Some(items) }
}

fn parse_tutorial(value: &Value) -> Option<TutorialHint> {
    let step = value.get("step").and_then(as_u64).and_then(|s| u32::try_from(s).ok())?;
    let hint = value
        .get("hint")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    Some(TutorialHint { step, hint })
}

fn parse_quests(value: &Value) -> Vec<Quest> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|q| {
                    let id = id_of(q)?;
                    let name = q
                        .get("name")
                        .or_else(|| q.get("title"))
                        .and_then(Value::as_str)
                        .map_or_else(|| id.clone(), ToOwned::to_owned);
                    let status = q
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("available")
                        .to_lowercase();
                    Some(Quest { id, name, status })
                })
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Inventory and equipment
// ---------------------------------------------------------------------------

/// Parse an inventory given as an array of items, an `{items: [...]}`
/// wrapper, or an `{item_id: quantity}` map.
pub fn parse_inventory(value: &Value, catalog: &Catalog) -> Vec<InventoryItem> {
    match value {
        Value::Array(items) => items.iter().filter_map(|item| parse_item(item, catalog)).collect(),
        Value::Object(map) => {
            if let Some(items) = map.get("items") {
                return parse_inventory(items, catalog);
            }
            map.iter()
                .filter_map(|(id, qty)| {
                    let quantity = u32::try_from(as_u64(qty)?).ok()?;
                    Some(classify_item(
                        InventoryItem {
                            id: narrative::normalize_id(id),
                            quantity,
                            ..InventoryItem::default()
                        },
                        catalog,
                    ))
                })
                .filter(|item| item.quantity > 0)
                .collect()
        }
        _ => Vec::new(),
    }
}

fn parse_item(value: &Value, catalog: &Catalog) -> Option<InventoryItem> {
    let id = narrative::normalize_id(&id_of(value)?);
    if id.is_empty() {
        return None;
    }
    let Some(map) = value.as_object() else {
        return Some(classify_item(
            InventoryItem {
                id,
                quantity: 1,
                ..InventoryItem::default()
            },
            catalog,
        ));
    };
    let fields = Fields::new(vec![map]);
    let stats: BTreeMap<String, i64> = fields
        .get(&["stats", "bonuses"])
        .and_then(Value::as_object)
        .map(|stats| {
            stats
                .iter()
                .filter_map(|(k, v)| as_i64(v).map(|n| (k.clone(), n)))
                .collect()
        })
        .unwrap_or_default();
    let item = InventoryItem {
        id,
        quantity: fields.u32(&["quantity", "qty", "count", "amount"]).unwrap_or(1),
        item_type: fields
            .get(&["type", "itemType", "item_type", "category"])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase(),
        equipped: fields.bool(&["equipped", "isEquipped", "is_equipped"]).unwrap_or(false),
        slot: fields
            .get(&["slot"])
            .and_then(Value::as_str)
            .and_then(EquipmentSlot::parse),
        stats,
    };
    Some(classify_item(item, catalog))
}

/// Fill slot and type from the catalog when the service left them out.
fn classify_item(mut item: InventoryItem, catalog: &Catalog) -> InventoryItem {
    if let Some(tier) = catalog.gear_tier(&item.id) {
        item.slot.get_or_insert(tier.slot);
        if item.item_type.is_empty() {
            item.item_type = tier.slot.as_str().to_owned();
        }
    } else if let Some(consumable) = catalog.consumable(&item.id) {
        if item.item_type.is_empty() || item.item_type == "consumable" {
            item.item_type = consumable.kind.as_str().to_owned();
        }
    }
    item
}

fn parse_equipment(value: Option<&Value>) -> BTreeMap<EquipmentSlot, String> {
    object(value)
        .map(|map| {
            map.iter()
                .filter_map(|(slot, item)| Some((EquipmentSlot::parse(slot)?, id_of(item)?)))
                .collect()
        })
        .unwrap_or_default()
}

/// Make the equipment map agree with the inventory's `equipped` flags.
///
/// An equipped, slotted inventory item fills its slot. A map entry whose
/// item appears in the inventory only unequipped is dropped.
pub fn reconcile_equipment(equipment: &mut BTreeMap<EquipmentSlot, String>, inventory: &[InventoryItem]) {
    equipment.retain(|_, id| {
        let held = inventory.iter().any(|item| item.id == *id);
        !held || inventory.iter().any(|item| item.id == *id && item.equipped)
    });
    for item in inventory.iter().filter(|item| item.equipped) {
        if let Some(slot) = item.slot {
            equipment.insert(slot, item.id.clone());
        }
    }
}

fn needs_escape(state: &GameState, catalog: &Catalog) -> bool {
    !catalog.is_known_zone(&state.zone) && state.connected_zones.is_empty()
}

// ---------------------------------------------------------------------------
// Incremental updates
// ---------------------------------------------------------------------------

/// Fold a successful action response into the current state.
///
/// Agent fields and inventory replace what is known. Narrative lists
/// replace the zone contents only when a rule finds something, except
/// after a zone change where stale contents are dropped outright.
pub fn merge_action_response(state: &mut GameState, response: &ActionResponse, catalog: &Catalog) {
    let previous_zone = state.zone.clone();
    let structured_combat = object(response.agent.as_ref())
        .is_some_and(|agent| apply_agent_fields(state, &Fields::new(vec![agent])));

    if let Some(inventory) = &response.inventory {
        state.inventory = parse_inventory(inventory, catalog);
        reconcile_equipment(&mut state.equipment, &state.inventory);
    }

    if let Some(quests) = response.extra.get("quests").map(parse_quests).filter(|q| !q.is_empty()) {
        state.quests = quests;
    }

    let text = response.text();
    if state.zone == previous_zone {
        if let Some(zone) = narrative::zone(&text) {
            state.zone = zone;
        }
    }
    let zone_changed = state.zone != previous_zone;
    if zone_changed {
        state.creatures.clear();
        state.resources.clear();
        state.other_agents.clear();
        state.connected_zones = catalog.exits(&state.zone);
    }

    if !text.is_empty() {
        if let Some(resources) = narrative::resources(&text) {
            state.resources = resources;
        }
        if let Some(creatures) = narrative::creatures(&text) {
            state.creatures = creatures;
        }
        if let Some(agents) = narrative::other_agents(&text) {
            state.other_agents = agents;
        }
        if let Some(exits) = narrative::exits(&text) {
            state.connected_zones = exits;
        }
        if !structured_combat {
            if narrative::died(&text) || narrative::killed(&text) {
                state.combat = CombatState::OutOfCombat;
            } else if let Some(combat) = narrative::combat(&text) {
                state.combat = combat;
            }
        }
        if let Some(flagged) = narrative::pvp_flag(&text) {
            state.pvp_flagged = flagged;
        }
        if let Some(tutorial) = narrative::tutorial(&text) {
            state.tutorial = Some(tutorial);
        }
        state.narrative = text;
    }
    state.needs_escape = needs_escape(state, catalog);
}

/// Fold a rejection into the current state.
///
/// Agent fields in the payload are applied. Combat changes only when the
/// payload is conclusive: a structured flag, a combat phrase, or an
/// explicit negation. Returns whether the combat state changed.
pub fn apply_rejection(state: &mut GameState, response: &ActionResponse) -> bool {
    let before = state.combat.clone();
    let structured_combat = object(response.agent.as_ref())
        .is_some_and(|agent| apply_agent_fields(state, &Fields::new(vec![agent])));
    if !structured_combat {
        if let Some(combat) = narrative::combat(&response.text()) {
            state.combat = combat;
        }
    }
    state.combat != before
}
