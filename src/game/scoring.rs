//! Score & Speed Model
//!
//! Points per food and the difficulty curve (tick interval).

use crate::game::relic::RunEffects;
use crate::game::state::GameState;

/// Configuration for the tick interval.
#[derive(Debug, Clone)]
pub struct SpeedConfig {
    /// Interval below the first tier (ms)
    pub base_interval_ms: u64,
    /// `(min_score, interval_ms)` tiers, ascending by score
    pub tiers: Vec<(u32, u64)>,
    /// Added by the time-dilation relic (ms)
    pub dilation_ms: u64,
    /// Boost multiplier as a percentage
    pub boost_percent: u64,
    /// Boosted interval never drops below this (ms)
    pub min_interval_ms: u64,
    /// Points per food before bonuses
    pub food_base_points: u32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 120,
            tiers: vec![(100, 100), (200, 80)],
            dilation_ms: 15,
            boost_percent: 70,
            min_interval_ms: 50,
            food_base_points: 10,
        }
    }
}

/// Points awarded for one food right now.
pub fn food_points(state: &GameState, config: &SpeedConfig) -> u32 {
    let base = config
        .food_base_points
        .saturating_add(state.permanent_food_bonus)
        .saturating_add(state.effects.food_bonus);
    let multiplier = if state.double_score_active() { 2 } else { 1 };
    base.saturating_mul(multiplier)
}

/// Desired tick interval for the given score and modifiers.
pub fn desired_interval(score: u32, effects: &RunEffects, boosted: bool, config: &SpeedConfig) -> u64 {
    let mut interval = config
        .tiers
        .iter()
        .rev()
        .find(|(min_score, _)| score >= *min_score)
        .map(|(_, ms)| *ms)
        .unwrap_or(config.base_interval_ms);

    if effects.time_dilation {
        interval += config.dilation_ms;
    }
    if boosted {
        interval = (interval * config.boost_percent / 100).max(config.min_interval_ms);
    }
    interval
}

// =============================================================================
// TESTS
// =============================================================================
