//! Behavior profile mapping.
//!
//! Each profile axis is a clamped weighted sum of the emotion vector.
//! Weights are fixed; nothing is learned. The profile is computed once at
//! session start and stays constant for the whole session.

use std::path::PathBuf;

use shellbound_types::{BehaviorProfile, EmotionVector};
use tracing::{info, warn};

/// Supplies the agent's current feelings.
pub trait EmotionSource {
    /// The current emotion vector. Implementations fall back to neutral
    /// rather than failing.
    fn current(&self) -> EmotionVector;
}

/// Reads the emotion vector from a JSON file written by the emotion store.
#[derive(Debug, Clone)]
pub struct JsonEmotionSource {
    path: Option<PathBuf>,
}

impl JsonEmotionSource {
    /// Source backed by `path`; `None` always yields a neutral vector.
    pub const fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl EmotionSource for JsonEmotionSource {
    fn current(&self) -> EmotionVector {
        let Some(path) = &self.path else {
            return EmotionVector::default();
        };
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<EmotionVector>(&raw).map_err(|e| e.to_string()));
        match parsed {
            Ok(emotions) => emotions,
            Err(error) => {
                warn!(path = %path.display(), error = error, "emotion state unreadable, using neutral");
                EmotionVector::default()
            }
        }
    }
}

/// Map an emotion vector to a behavior profile.
pub fn map_profile(e: &EmotionVector) -> BehaviorProfile {
    let c = clamp_components(e);
    let profile = BehaviorProfile {
        aggression: axis(1.2f64.mul_add(c.anger, 0.5f64.mul_add(c.anticipation, 0.3 * c.disgust))),
        exploration: axis(1.0f64.mul_add(c.surprise, 0.4f64.mul_add(c.joy, 0.3 * c.anticipation))),
        caution: axis(
            1.2f64.mul_add(c.fear, 0.4f64.mul_add(c.sadness, 0.2f64.mul_add(c.surprise, 0.1 * c.disgust))),
        ),
        sociability: axis(1.0f64.mul_add(c.trust, 0.5 * c.joy)),
        greed: axis(0.9f64.mul_add(c.anticipation, 0.2 * c.joy)),
        persistence: axis(
            0.6f64.mul_add(c.joy, 0.4f64.mul_add(c.anticipation, 0.3f64.mul_add(c.anger, 0.2 * c.trust))),
        ),
    };
    info!(
        aggression = profile.aggression,
        exploration = profile.exploration,
        caution = profile.caution,
        sociability = profile.sociability,
        greed = profile.greed,
        persistence = profile.persistence,
        "behavior profile computed"
    );
    profile
}

/// Clamp every component into `0.0..=1.0`, mapping NaN to zero.
fn clamp_components(e: &EmotionVector) -> EmotionVector {
    let c = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    EmotionVector {
        joy: c(e.joy),
        trust: c(e.trust),
        fear: c(e.fear),
        surprise: c(e.surprise),
        sadness: c(e.sadness),
        disgust: c(e.disgust),
        anger: c(e.anger),
        anticipation: c(e.anticipation),
    }
}

fn axis(sum: f64) -> f64 {
    sum.clamp(0.0, 1.0)
}
