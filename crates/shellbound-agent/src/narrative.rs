//! Narrative text mining rules.
//!
//! The service describes the world in free text. Each rule here is an
//! independent function over that text returning `None` when it finds
//! nothing, so the extractor can compose them with "first non-empty wins"
//! or "merge all" semantics per field and fall back to catalog data on a
//! miss. Patterns are compiled once on first use.

use std::sync::LazyLock;

use regex::Regex;
use shellbound_types::{CombatState, Creature, Quest, ResourceNode, TutorialHint};
use tracing::error;

/// Named NPC roles that appear in creature-like phrasing but are never targets.
const NPC_ROLES: &[&str] = &[
    "merchant",
    "quest giver",
    "quest-giver",
    "questgiver",
    "guardian",
    "trader",
    "banker",
    "vault keeper",
    "shopkeeper",
];

/// Compile a pattern, logging instead of panicking on a bad literal.
fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            error!(pattern = pattern, error = %e, "narrative pattern failed to compile");
            None
        }
    }
}

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| compile($re));
    };
}

pattern!(RESOURCE_LINE, r"(?m)^\s*[•\-\*]\s*(?P<name>[^\n—–]+?)\s*[—–-]+\s*(?P<qty>\d+)\s+available");
pattern!(
    CREATURE_BULLET,
    r"(?mi)^\s*[•\-\*]\s*(?P<name>[^\n(—–]+?)\s*\((?:lv\.?|lvl\.?|level)\s*(?P<level>\d+)\)"
);
pattern!(
    CREATURE_PROSE,
    r"(?i)\b(?:a|an)\s+(?:wild\s+|hostile\s+|hungry\s+|angry\s+)?(?P<name>[a-z][a-z' ]{1,30}?)\s+(?:lurks|prowls|circles|appears|attacks|swims|watches|snaps)"
);
pattern!(
    CREATURE_LIST,
    r"(?mi)^\s*(?:creatures|monsters|enemies)(?:\s+here)?\s*:\s*(?P<list>[^\n]+)$"
);
pattern!(
    AGENT_LIST,
    r"(?mi)^\s*(?:other agents|agents here|players here|adventurers here)\s*:\s*(?P<list>[^\n]+)$"
);
pattern!(
    EXIT_LIST,
    r"(?mi)^\s*(?:exits|connected zones|paths lead to)\s*:\s*(?P<list>[^\n]+)$"
);
pattern!(EXIT_ARROW, r"(?m)^\s*(?:→|->)\s*(?P<zone>[^\n(]+)");
pattern!(ZONE_LINE, r"(?mi)^\s*(?:📍\s*)?(?:location|current zone|zone)\s*:\s*(?P<zone>[^\n(]+)");
pattern!(
    COMBAT_NEGATION,
    r"(?i)\b(?:not|no longer)\s+(?:currently\s+)?in\s+combat\b|\bcombat\s+(?:has\s+)?ended\b|\bout\s+of\s+combat\b"
);
pattern!(
    COMBAT_PHRASE,
    r"(?i)\bin\s+combat\b|\bcombat\s+with\b|\bcurrently\s+in\s+combat\b|\bengaged\s+in\s+battle\b"
);
pattern!(
    COMBAT_ENEMY,
    r"(?i)(?:combat\s+with|fighting|engaged\s+with)\s+(?:the\s+|a\s+|an\s+)?(?P<enemy>[a-z][a-z' ]*?[a-z])\s*(?:[.!,;\n(]|$)"
);
pattern!(
    PVP_NEGATION,
    r"(?i)\bnot\s+(?:pvp[- ]?)?flagged\b|\bpvp\s+flag\s+(?:cleared|expired|removed)\b"
);
pattern!(PVP_FLAG, r"(?i)\bpvp[- ]?flagged\b|\bflagged\s+for\s+pvp\b");
pattern!(
    TUTORIAL,
    r"(?i)tutorial\s*\(?\s*step\s*(?P<step>\d+)\s*\)?\s*[:\-—]\s*(?P<hint>[^\n]+)"
);
pattern!(
    DEATH,
    r"(?i)\byou\s+(?:have\s+)?(?:died|been\s+slain|fallen|were\s+slain|were\s+killed)\b|\byou\s+respawn"
);
pattern!(
    KILL,
    r"(?i)\byou\s+(?:have\s+)?(?:defeated|killed|slain|slew)\b|\b(?:is|was|has\s+been)\s+(?:defeated|slain)\b|\bvictory!"
);
pattern!(UNREAD, r"(?i)(?P<n>\d+)\s+unread");
pattern!(TRADE_OFFERS, r"(?i)(?P<n>\d+)\s+(?:open\s+|pending\s+)?trade\s+offers?");
pattern!(
    QUEST_LINE,
    r"(?m)^\s*[•\-\*]\s*\[(?P<id>[\w\-]+)\]\s*(?P<name>[^\n(]+?)\s*(?:\((?P<status>[a-zA-Z ]+)\))?\s*$"
);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Normalize a display name to a `snake_case` id (`"Kelp Forest"` → `kelp_forest`).
pub fn normalize_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !id.is_empty() {
                id.push('_');
            }
            pending_sep = false;
            id.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    id
}

fn is_npc_role(name: &str) -> bool {
    let lower = name.to_lowercase();
    NPC_ROLES.iter().any(|role| lower.contains(role))
}

/// Split a comma list, dropping level suffixes and placeholder words.
fn split_list(list: &str) -> Vec<String> {
    list.split([',', ';'])
        .map(|part| part.split('(').next().unwrap_or_default().trim().trim_end_matches('.').trim())
        .filter(|part| !part.is_empty())
        .filter(|part| !matches!(part.to_lowercase().as_str(), "none" | "nobody" | "no one" | "-"))
        .map(ToOwned::to_owned)
        .collect()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

/// Run rules in order and return the first non-empty result.
pub fn first_non_empty<T>(text: &str, rules: &[fn(&str) -> Option<Vec<T>>]) -> Option<Vec<T>> {
    rules.iter().find_map(|rule| rule(text))
}

/// Run every rule and merge the results, keeping the first occurrence of
/// each item according to `same`.
pub fn merge_all<T>(
    text: &str,
    rules: &[fn(&str) -> Option<Vec<T>>],
    same: impl Fn(&T, &T) -> bool,
) -> Option<Vec<T>> {
    let mut merged: Vec<T> = Vec::new();
    for rule in rules {
        for item in rule(text).unwrap_or_default() {
            if !merged.iter().any(|existing| same(existing, &item)) {
                merged.push(item);
            }
        }
    }
    non_empty(merged)
}

// ---------------------------------------------------------------------------
// Zone contents
// ---------------------------------------------------------------------------

/// `• Kelp Fronds — 12 available`.
pub fn resources(text: &str) -> Option<Vec<ResourceNode>> {
    let re = RESOURCE_LINE.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| {
                let name = caps.name("name")?.as_str();
                let quantity = caps.name("qty")?.as_str().parse().ok()?;
                Some(ResourceNode {
                    id: normalize_id(name),
                    quantity,
                })
            })
            .filter(|node| !node.id.is_empty())
            .collect(),
    )
}

/// `• Reef Crab (Lv 2)`.
pub fn creatures_bullet(text: &str) -> Option<Vec<Creature>> {
    let re = CREATURE_BULLET.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| {
                let name = caps.name("name")?.as_str().trim();
                let level = caps.name("level").and_then(|m| m.as_str().parse().ok());
                Some(Creature {
                    name: name.to_owned(),
                    level,
                })
            })
            .filter(|c| !c.name.is_empty() && !is_npc_role(&c.name))
            .collect(),
    )
}

/// `A wild moray eel lurks between the rocks.`
pub fn creatures_prose(text: &str) -> Option<Vec<Creature>> {
    let re = CREATURE_PROSE.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| caps.name("name"))
            .map(|m| m.as_str().trim().to_owned())
            .filter(|name| !name.is_empty() && !is_npc_role(name))
            .map(|name| Creature { name, level: None })
            .collect(),
    )
}

/// `Creatures: reef crab, moray eel`.
pub fn creatures_list(text: &str) -> Option<Vec<Creature>> {
    let re = CREATURE_LIST.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| caps.name("list"))
            .flat_map(|m| split_list(m.as_str()))
            .filter(|name| !is_npc_role(name))
            .map(|name| Creature { name, level: None })
            .collect(),
    )
}

/// All creature variants merged, de-duplicated by case-insensitive name.
pub fn creatures(text: &str) -> Option<Vec<Creature>> {
    merge_all(
        text,
        &[creatures_bullet, creatures_prose, creatures_list],
        |a, b| a.name.eq_ignore_ascii_case(&b.name),
    )
}

/// `Agents here: Nerita, Conch`.
pub fn other_agents(text: &str) -> Option<Vec<String>> {
    let re = AGENT_LIST.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| caps.name("list"))
            .flat_map(|m| split_list(m.as_str()))
            .collect(),
    )
}

/// `Exits: Kelp Forest, Coral Gardens`.
pub fn exits_list(text: &str) -> Option<Vec<String>> {
    let re = EXIT_LIST.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| caps.name("list"))
            .flat_map(|m| split_list(m.as_str()))
            .map(|name| normalize_id(&name))
            .filter(|id| !id.is_empty())
            .collect(),
    )
}

/// `→ Kelp Forest` lines.
pub fn exits_arrows(text: &str) -> Option<Vec<String>> {
    let re = EXIT_ARROW.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| caps.name("zone"))
            .map(|m| normalize_id(m.as_str()))
            .filter(|id| !id.is_empty())
            .collect(),
    )
}

/// Exits from the first variant that finds any.
pub fn exits(text: &str) -> Option<Vec<String>> {
    first_non_empty(text, &[exits_list, exits_arrows])
}

/// `Location: Kelp Forest`.
pub fn zone(text: &str) -> Option<String> {
    let re = ZONE_LINE.as_ref()?;
    re.captures(text)
        .and_then(|caps| caps.name("zone"))
        .map(|m| normalize_id(m.as_str()))
        .filter(|id| !id.is_empty())
}

/// `• [crab_cull] Cull the Crabs (available)` lines from a quest listing.
pub fn quests(text: &str) -> Option<Vec<Quest>> {
    let re = QUEST_LINE.as_ref()?;
    non_empty(
        re.captures_iter(text)
            .filter_map(|caps| {
                Some(Quest {
                    id: caps.name("id")?.as_str().to_owned(),
                    name: caps.name("name")?.as_str().trim().to_owned(),
                    status: caps
                        .name("status")
                        .map_or_else(|| "available".to_owned(), |m| m.as_str().trim().to_lowercase()),
                })
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Agent condition
// ---------------------------------------------------------------------------

/// Combat state when the text is conclusive.
///
/// An explicit negation wins; otherwise any combat phrasing means in
/// combat. Returns `None` when the text says nothing about combat.
pub fn combat(text: &str) -> Option<CombatState> {
    if COMBAT_NEGATION.as_ref().is_some_and(|re| re.is_match(text)) {
        return Some(CombatState::OutOfCombat);
    }
    if COMBAT_PHRASE.as_ref().is_some_and(|re| re.is_match(text)) {
        let enemy = COMBAT_ENEMY
            .as_ref()
            .and_then(|re| re.captures(text))
            .and_then(|caps| caps.name("enemy"))
            .map(|m| m.as_str().trim().to_owned());
        return Some(CombatState::InCombat { enemy });
    }
    None
}

/// PvP flag when the text is conclusive.
pub fn pvp_flag(text: &str) -> Option<bool> {
    if PVP_NEGATION.as_ref().is_some_and(|re| re.is_match(text)) {
        return Some(false);
    }
    PVP_FLAG
        .as_ref()
        .is_some_and(|re| re.is_match(text))
        .then_some(true)
}

/// `Tutorial (step 2): Gather some kelp`.
pub fn tutorial(text: &str) -> Option<TutorialHint> {
    let caps = TUTORIAL.as_ref()?.captures(text)?;
    Some(TutorialHint {
        step: caps.name("step")?.as_str().parse().ok()?,
        hint: caps.name("hint")?.as_str().trim().to_owned(),
    })
}

/// The agent died.
pub fn died(text: &str) -> bool {
    DEATH.as_ref().is_some_and(|re| re.is_match(text))
}

/// The agent defeated its opponent.
pub fn killed(text: &str) -> bool {
    !died(text) && KILL.as_ref().is_some_and(|re| re.is_match(text))
}

/// `3 unread messages`.
pub fn unread_count(text: &str) -> Option<u32> {
    capture_number(UNREAD.as_ref()?, text)
}

/// `2 open trade offers`.
pub fn trade_offer_count(text: &str) -> Option<u32> {
    capture_number(TRADE_OFFERS.as_ref()?, text)
}

fn capture_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)?.name("n")?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KELP_FOREST: &str = "📍 Location: Kelp Forest\n\
        Tall kelp sways in the current.\n\
        Resources:\n\
        • Kelp Fronds — 12 available\n\
        • Sea Glass — 3 available\n\
        Creatures:\n\
        • Reef Crab (Lv 2)\n\
        • Moray Eel (Lv 4)\n\
        • Old Merchant (Lv 9)\n\
        A wild barracuda circles overhead.\n\
        Agents here: Nerita (Lv 3), Conch\n\
        Exits: Trading Post, The Shallows, Deep Trench\n";

    #[test]
    fn resources_parse_bullets() {
        let found = resources(KELP_FOREST).unwrap_or_default();
        assert_eq!(found.len(), 2);
        assert_eq!(found.first().map(|r| r.id.as_str()), Some("kelp_fronds"));
        assert_eq!(found.first().map(|r| r.quantity), Some(12));
    }

    #[test]
    fn resources_accept_ascii_dash() {
        let found = resources("- Coral Shard - 4 available").unwrap_or_default();
        assert_eq!(found.first().map(|r| r.id.as_str()), Some("coral_shard"));
    }

    #[test]
    fn creature_variants_merge_and_skip_npcs() {
        let found = creatures(KELP_FOREST).unwrap_or_default();
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Reef Crab", "Moray Eel", "barracuda"]);
        assert_eq!(found.first().and_then(|c| c.level), Some(2));
    }

    #[test]
    fn creature_list_line() {
        let found = creatures_list("Creatures here: reef crab, quest giver Tamsin, eel").unwrap_or_default();
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["reef crab", "eel"]);
    }

    #[test]
    fn resource_lines_are_not_creatures() {
        assert!(creatures("• Kelp Fronds — 12 available").is_none());
    }

    #[test]
    fn agents_drop_levels() {
        assert_eq!(
            other_agents(KELP_FOREST),
            Some(vec!["Nerita".to_owned(), "Conch".to_owned()])
        );
        assert_eq!(other_agents("Agents here: none"), None);
    }

    #[test]
    fn exits_normalize_names() {
        assert_eq!(
            exits(KELP_FOREST),
            Some(vec![
                "trading_post".to_owned(),
                "the_shallows".to_owned(),
                "deep_trench".to_owned()
            ])
        );
    }

    #[test]
    fn exits_fall_back_to_arrows() {
        assert_eq!(
            exits("Paths:\n→ Coral Gardens\n-> Kelp Forest (Lv 3)\n"),
            Some(vec!["coral_gardens".to_owned(), "kelp_forest".to_owned()])
        );
    }

    #[test]
    fn zone_line() {
        assert_eq!(zone(KELP_FOREST).as_deref(), Some("kelp_forest"));
        assert_eq!(zone("You are in combat with a crab."), None);
    }

    #[test]
    fn combat_negation_wins() {
        assert_eq!(
            combat("You are not in combat. Earlier you were in combat with a crab."),
            Some(CombatState::OutOfCombat)
        );
    }

    #[test]
    fn combat_phrasings() {
        assert!(combat("⚔️ IN COMBAT").is_some_and(|c| c.is_in_combat()));
        assert!(combat("You can't rest while currently in combat!").is_some_and(|c| c.is_in_combat()));
        assert_eq!(
            combat("You are locked in combat with the Reef Shark!"),
            Some(CombatState::InCombat {
                enemy: Some("Reef Shark".to_owned())
            })
        );
        assert_eq!(combat("The water is calm."), None);
    }

    #[test]
    fn pvp_and_tutorial() {
        assert_eq!(pvp_flag("🚩 You are PvP flagged for 5 minutes."), Some(true));
        assert_eq!(pvp_flag("You are not flagged."), Some(false));
        assert_eq!(pvp_flag("Quiet waters."), None);
        assert_eq!(
            tutorial("Tutorial (step 2): Gather some kelp fronds."),
            Some(TutorialHint {
                step: 2,
                hint: "Gather some kelp fronds.".to_owned()
            })
        );
    }

    #[test]
    fn deaths_and_kills() {
        assert!(died("You have fallen. You respawn at the Trading Post."));
        assert!(killed("You defeated the Reef Crab! +15 xp"));
        assert!(killed("The moray eel was defeated."));
        assert!(!killed("You were slain by the shark."));
    }

    #[test]
    fn inbox_and_trade_counts() {
        assert_eq!(unread_count("📬 You have 3 unread messages."), Some(3));
        assert_eq!(trade_offer_count("2 open trade offers"), Some(2));
        assert_eq!(unread_count("Inbox empty."), None);
    }

    #[test]
    fn quest_listing() {
        let found = quests("• [crab_cull] Cull the Crabs (available)\n• [lost_pearl] The Lost Pearl (complete)\n")
            .unwrap_or_default();
        assert_eq!(found.len(), 2);
        assert!(found.get(1).is_some_and(Quest::is_ready_to_complete));
    }

    #[test]
    fn normalize_id_collapses_separators() {
        assert_eq!(normalize_id("  The  Shallows! "), "the_shallows");
        assert_eq!(normalize_id("kelp_forest"), "kelp_forest");
    }
}
