//! Render Snapshot
//!
//! Immutable view of the board produced once per tick for external
//! drawing. Holds no pixel or color information.

use serde::{Serialize, Deserialize};

use crate::core::grid::Position;
use crate::game::relic::RelicKind;
use crate::game::state::{GameState, Hazard, Pickup, RunPhase};

/// Claimed relic with its count, for the inventory display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelicCount {
    pub relic: RelicKind,
    pub count: u32,
}

/// Board snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSnapshot {
    pub tick: u32,
    pub now_ms: u64,
    pub phase: String,
    pub cells: i32,
    pub snake: Vec<Position>,
    pub food: Position,
    pub pickups: Vec<Pickup>,
    pub hazards: Vec<Hazard>,
    pub score: u32,
    pub lives: u32,
    pub invulnerable: bool,
    pub status_message: Option<String>,
    pub relics: Vec<RelicCount>,
    /// Present while a relic offer is open
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relic_choices: Option<Vec<RelicKind>>,
    pub tick_interval_ms: u64,
}

impl RenderSnapshot {
    /// Capture the current state.
    pub fn capture(state: &GameState) -> Self {
        let relic_choices = match &state.phase {
            RunPhase::RelicOffer { choices } => Some(choices.clone()),
            _ => None,
        };

        Self {
            tick: state.tick,
            now_ms: state.now_ms,
            phase: state.phase.tag().to_string(),
            cells: state.cells,
            snake: state.snake.body.iter().copied().collect(),
            food: state.food,
            pickups: state.pickups.clone(),
            hazards: state
                .hazards
                .iter()
                .filter(|h| !h.expired(state.now_ms))
                .copied()
                .collect(),
            score: state.score,
            lives: state.lives,
            invulnerable: state.is_invulnerable(),
            status_message: state.status_text().map(str::to_owned),
            relics: state
                .relics
                .entries()
                .map(|(relic, count)| RelicCount { relic, count })
                .collect(),
            relic_choices,
            tick_interval_ms: state.tick_interval_ms,
        }
    }

    /// Head cell, if the snake has one.
    pub fn head(&self) -> Option<Position> {
        self.snake.first().copied()
    }
}
