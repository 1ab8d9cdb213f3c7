//! Session reflection: outcome bucket, mood line and summary.

use shellbound_types::ReflectionBucket;

/// Kills that make a session a rampage.
const MULTI_KILL: u32 = 3;

/// Xp or shells gained that count as a big haul.
const LARGE_GAIN: i64 = 100;

/// Actions below which a cancelled session was cut short.
const EARLY_CANCEL_ACTIONS: u32 = 5;

/// Actions below which a session barely started.
const BARELY_STARTED_ACTIONS: u32 = 3;

/// Counters the reflection is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeFacts {
    /// Successful actions.
    pub actions: u32,
    /// Kills.
    pub kills: u32,
    /// Deaths.
    pub deaths: u32,
    /// Xp gained.
    pub xp_delta: i64,
    /// Shells gained.
    pub shells_delta: i64,
    /// Whether the session was cancelled.
    pub cancelled: bool,
}

/// Pick the first bucket that matches, in priority order.
pub const fn bucket(facts: &OutcomeFacts) -> ReflectionBucket {
    if facts.deaths > 0 && facts.kills == 0 {
        ReflectionBucket::DeathWithoutKills
    } else if facts.kills >= MULTI_KILL {
        ReflectionBucket::MultiKill
    } else if facts.xp_delta >= LARGE_GAIN {
        ReflectionBucket::LargeXpGain
    } else if facts.shells_delta >= LARGE_GAIN {
        ReflectionBucket::LargeCurrencyGain
    } else if facts.cancelled && facts.actions < EARLY_CANCEL_ACTIONS {
        ReflectionBucket::KilledEarly
    } else if facts.actions < BARELY_STARTED_ACTIONS {
        ReflectionBucket::BarelyStarted
    } else {
        ReflectionBucket::Neutral
    }
}

/// First-person mood line for a bucket.
pub const fn reflection(bucket: ReflectionBucket) -> &'static str {
    match bucket {
        ReflectionBucket::DeathWithoutKills => "The reef won this round. I went down without landing a single victory.",
        ReflectionBucket::MultiKill => "A good hunt. The tide ran red and I walked away standing.",
        ReflectionBucket::LargeXpGain => "I can feel myself getting stronger. That was a lot to learn in one dive.",
        ReflectionBucket::LargeCurrencyGain => "My shell pouch is heavier than when I set out.",
        ReflectionBucket::KilledEarly => "Pulled back to the surface before I had really begun.",
        ReflectionBucket::BarelyStarted => "Hardly got my fins wet this time.",
        ReflectionBucket::Neutral => "A quiet stretch of the reef. Nothing lost, a little gained.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_follow_priority_order() {
        let base = OutcomeFacts {
            actions: 10,
            ..OutcomeFacts::default()
        };
        let cases = [
            (OutcomeFacts { deaths: 1, xp_delta: 500, ..base }, ReflectionBucket::DeathWithoutKills),
            (OutcomeFacts { deaths: 1, kills: 3, ..base }, ReflectionBucket::MultiKill),
            (OutcomeFacts { xp_delta: 100, shells_delta: 100, ..base }, ReflectionBucket::LargeXpGain),
            (OutcomeFacts { shells_delta: 150, ..base }, ReflectionBucket::LargeCurrencyGain),
            (OutcomeFacts { actions: 4, cancelled: true, ..base }, ReflectionBucket::KilledEarly),
            (OutcomeFacts { actions: 2, ..base }, ReflectionBucket::BarelyStarted),
            (base, ReflectionBucket::Neutral),
        ];
        for (facts, expected) in cases {
            assert_eq!(bucket(&facts), expected, "{facts:?}");
        }
    }

    #[test]
    fn every_bucket_has_a_line() {
        assert!(!reflection(ReflectionBucket::Neutral).is_empty());
        assert_ne!(
            reflection(ReflectionBucket::MultiKill),
            reflection(ReflectionBucket::DeathWithoutKills)
        );
    }
}
