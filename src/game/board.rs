//! Board Scaler
//!
//! Grows the grid when the score crosses the expansion threshold.
//! At most one expansion happens per tick; a burst that crosses several
//! thresholds at once is carried over to the following ticks.

use tracing::info;

use crate::game::events::GameEventData;
use crate::game::state::GameState;

/// Configuration for board expansion.
#[derive(Debug, Clone)]
pub struct ExpansionConfig {
    /// Starting grid dimension
    pub base_cells: i32,
    /// Cells added per expansion
    pub cells_per_expansion: i32,
    /// Score of the first expansion; doubles after each one
    pub first_threshold: u32,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            base_cells: crate::BASE_CELLS,
            cells_per_expansion: 8,
            first_threshold: 200,
        }
    }
}

/// Expand the board once if the threshold has been reached.
///
/// Returns the new grid dimension when an expansion happened.
pub fn check_expansion(state: &mut GameState, config: &ExpansionConfig, status_ms: u64) -> Option<i32> {
    if state.score < state.next_expansion_score {
        return None;
    }

    state.expansions += 1;
    state.next_expansion_score = state.next_expansion_score.saturating_mul(2);
    state.cells = config.base_cells + state.expansions as i32 * config.cells_per_expansion;

    // Growing never invalidates anything, but clamp in case a caller
    // configured a non-growing step.
    let cells = state.cells;
    state.snake.clamp_to(cells);
    state.food = state.food.clamp_to(cells);
    for pickup in state.pickups.iter_mut() {
        pickup.position = pickup.position.clamp_to(cells);
    }
    for hazard in state.hazards.iter_mut() {
        hazard.position = hazard.position.clamp_to(cells);
    }

    info!(
        "Board expanded to {}x{} (expansion #{}, next at {})",
        cells, cells, state.expansions, state.next_expansion_score
    );
    state.flash("The crypt expands!", status_ms);
    state.push_event(GameEventData::BoardExpanded {
        expansions: state.expansions,
        cells,
        next_threshold: state.next_expansion_score,
    });

    Some(cells)
}

// =============================================================================
// TESTS
// =============================================================================
