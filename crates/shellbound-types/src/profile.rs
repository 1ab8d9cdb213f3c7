//! Emotion input and behavior profile output.

use serde::{Deserialize, Serialize};

/// The agent's current feelings as supplied by the external emotion store.
///
/// Eight Plutchik components, each expected in `0.0..=1.0`. Missing
/// components deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionVector {
    /// Joy.
    pub joy: f64,
    /// Trust.
    pub trust: f64,
    /// Fear.
    pub fear: f64,
    /// Surprise.
    pub surprise: f64,
    /// Sadness.
    pub sadness: f64,
    /// Disgust.
    pub disgust: f64,
    /// Anger.
    pub anger: f64,
    /// Anticipation.
    pub anticipation: f64,
}

/// Six-axis personality derived from the emotion vector.
///
/// Computed once per session and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Willingness to start fights.
    pub aggression: f64,
    /// Appetite for travel and score volatility.
    pub exploration: f64,
    /// Risk aversion.
    pub caution: f64,
    /// Interest in other agents.
    pub sociability: f64,
    /// Interest in loot and currency.
    pub greed: f64,
    /// Tendency to keep going.
    pub persistence: f64,
}

impl BehaviorProfile {
    /// A flat profile with every axis at `value`.
    pub const fn uniform(value: f64) -> Self {
        Self {
            aggression: value,
            exploration: value,
            caution: value,
            sociability: value,
            greed: value,
            persistence: value,
        }
    }

    /// Axes as `(name, value)` pairs in declaration order.
    pub const fn axes(&self) -> [(&'static str, f64); 6] {
        [
            ("aggression", self.aggression),
            ("exploration", self.exploration),
            ("caution", self.caution),
            ("sociability", self.sociability),
            ("greed", self.greed),
            ("persistence", self.persistence),
        ]
    }
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}
