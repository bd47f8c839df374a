//! Game Events
//!
//! Notable things that happened during a tick. Collected on the state and
//! handed back in `TickResult` for logging, UI cues and replay checks.

use serde::{Serialize, Deserialize};

use crate::core::grid::Position;
use crate::game::relic::RelicKind;
use crate::game::state::{HazardKind, PickupKind};

/// How a fatal contact was survived.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescueKind {
    /// Invulnerability window absorbed the contact
    Invulnerable,
    /// A void cloak charge was spent
    VoidCloak,
    /// An extra life was spent and the snake relocated
    ExtraLife,
}

/// What caused a fatal contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// Head ran into the body
    SelfCollision,
    /// Head landed on a hazard
    Hazard,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventData {
    /// Food eaten and the snake grew
    FoodEaten {
        position: Position,
        points: u32,
        new_score: u32,
    },

    /// Pickup consumed
    PickupCollected {
        kind: PickupKind,
        position: Position,
    },

    /// Pickup placed on the board
    PickupSpawned {
        kind: PickupKind,
        position: Position,
    },

    /// Hazard placed on the board
    HazardSpawned {
        kind: HazardKind,
        position: Position,
        expires_at_ms: u64,
    },

    /// Hazards timed out
    HazardsExpired {
        count: u32,
    },

    /// Relic altar consumed, run paused on an offer
    RelicOffered {
        choices: Vec<RelicKind>,
    },

    /// Relic claimed (silent for the start relic)
    RelicClaimed {
        relic: RelicKind,
        silent: bool,
    },

    /// Offer declined
    RelicDeclined,

    /// Fatal contact survived
    Rescued {
        contact: ContactKind,
        rescue: RescueKind,
    },

    /// Board grew
    BoardExpanded {
        expansions: u32,
        cells: i32,
        next_threshold: u32,
    },

    /// Tick interval changed
    IntervalChanged {
        from_ms: u64,
        to_ms: u64,
    },

    /// Run ended
    GameOver {
        contact: ContactKind,
        final_score: u32,
    },
}

/// A game event with timing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Is this the terminal event of a run?
    pub fn is_game_over(&self) -> bool {
        matches!(self.data, GameEventData::GameOver { .. })
    }
}
