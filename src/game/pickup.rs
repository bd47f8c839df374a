//! Pickup Effects
//!
//! What happens when the head lands on a pickup.

use crate::core::grid::Position;
use crate::game::events::GameEventData;
use crate::game::state::{GameState, PickupKind};

/// Configuration for pickup effects.
#[derive(Debug, Clone)]
pub struct PickupConfig {
    /// BOOST duration (ms)
    pub boost_duration_ms: u64,
    /// MULTI duration (ms)
    pub multi_duration_ms: u64,
    /// Extra MULTI duration with the Chrono Battery (ms)
    pub chrono_bonus_ms: u64,
    /// Tail segments removed by SHRINK
    pub shrink_segments: usize,
}

impl Default for PickupConfig {
    fn default() -> Self {
        Self {
            boost_duration_ms: 15_000,
            multi_duration_ms: 15_000,
            chrono_bonus_ms: 7_000,
            shrink_segments: 4,
        }
    }
}

/// Result of consuming a pickup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupOutcome {
    /// Nothing on the head cell
    None,
    /// Timed or one-shot effect applied
    Applied(PickupKind),
    /// Relic altar consumed; the caller opens an offer
    RelicAltar,
}

/// Consume the pickup on `head`, if there is one.
pub fn consume_pickup_at(
    state: &mut GameState,
    head: Position,
    config: &PickupConfig,
    status_ms: u64,
) -> PickupOutcome {
    let Some(index) = state.pickups.iter().position(|p| p.position == head) else {
        return PickupOutcome::None;
    };
    let pickup = state.pickups.remove(index);
    state.push_event(GameEventData::PickupCollected {
        kind: pickup.kind,
        position: pickup.position,
    });

    match pickup.kind {
        PickupKind::Boost => {
            state.boost_until_ms = state.now_ms + config.boost_duration_ms;
            state.flash("Speed surge!", status_ms);
        }
        PickupKind::Multi => {
            let mut duration = config.multi_duration_ms;
            if state.effects.chrono_battery {
                duration += config.chrono_bonus_ms;
            }
            state.double_score_until_ms = state.now_ms + duration;
            state.flash("Double score active!", status_ms);
        }
        PickupKind::Shrink => {
            state.snake.shed_tail(config.shrink_segments);
            state.flash("Shed your husk", status_ms);
        }
        PickupKind::Relic => return PickupOutcome::RelicAltar,
    }

    PickupOutcome::Applied(pickup.kind)
}

// =============================================================================
// TESTS
// =============================================================================
