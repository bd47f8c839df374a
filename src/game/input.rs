//! Input Handling
//!
//! Direction intents and the run recording used for replay.
//!
//! Intents are queued between ticks and applied at the start of the next
//! one. A recording stores every intent with the tick it precedes, plus
//! each relic decision, which is enough to reproduce a run exactly from
//! its seed.

use serde::{Serialize, Deserialize};

use crate::core::grid::Direction;
use crate::game::upgrade::MetaProgress;

// =============================================================================
// DIRECTION INTENTS
// =============================================================================

/// Map a key name to a direction intent.
///
/// Accepts browser-style arrow keys (`ArrowUp`), WASD, and the plain names
/// (`up`, `UP`). Anything else is not an intent.
pub fn parse_intent(key: &str) -> Option<Direction> {
    match key {
        "ArrowUp" | "w" | "W" => Some(Direction::Up),
        "ArrowDown" | "s" | "S" => Some(Direction::Down),
        "ArrowLeft" | "a" | "A" => Some(Direction::Left),
        "ArrowRight" | "d" | "D" => Some(Direction::Right),
        other => match other.to_ascii_lowercase().as_str() {
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "left" => Some(Direction::Left),
            "right" => Some(Direction::Right),
            _ => None,
        },
    }
}

/// An intent captured before a given tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedIntent {
    /// Tick the intent was queued for
    pub tick: u32,
    /// Requested direction
    pub direction: Direction,
}

/// What the player did with a relic offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelicDecision {
    /// Claimed the choice at this index
    Claim(u8),
    /// Walked away
    Decline,
}

/// A relic decision made after a given tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedDecision {
    /// Tick that opened the offer
    pub tick: u32,
    /// Decision
    pub decision: RelicDecision,
}

// =============================================================================
// RUN RECORDING
// =============================================================================

/// Complete recording of one run.
///
/// Used for:
/// - Replay playback
/// - Verifying a reported score against its state hash
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecording {
    /// Run identifier
    pub run_id: [u8; 16],

    /// RNG seed used for this run
    pub rng_seed: u64,

    /// Meta progression the run started with
    pub meta: MetaProgress,

    /// Last tick executed
    pub end_tick: u32,

    /// Every queued intent, in arrival order
    intents: Vec<RecordedIntent>,

    /// Every relic decision, in order
    decisions: Vec<RecordedDecision>,
}

impl RunRecording {
    /// Start an empty recording.
    pub fn new(run_id: [u8; 16], rng_seed: u64, meta: MetaProgress) -> Self {
        Self {
            run_id,
            rng_seed,
            meta,
            end_tick: 0,
            intents: Vec::with_capacity(256),
            decisions: Vec::new(),
        }
    }

    /// Record an intent queued before `tick`.
    ///
    /// Rejected intents are recorded too; replay feeds them through the
    /// same queue so the outcome matches.
    pub fn record_intent(&mut self, tick: u32, direction: Direction) {
        self.intents.push(RecordedIntent { tick, direction });
    }

    /// Record a relic decision for the offer opened on `tick`.
    pub fn record_decision(&mut self, tick: u32, decision: RelicDecision) {
        self.decisions.push(RecordedDecision { tick, decision });
    }

    /// Note that `tick` has been executed.
    pub fn record_tick(&mut self, tick: u32) {
        self.end_tick = self.end_tick.max(tick);
    }

    /// Intents queued for `tick`, in arrival order.
    pub fn intents_for(&self, tick: u32) -> impl Iterator<Item = Direction> + '_ {
        let start = self.intents.partition_point(|i| i.tick < tick);
        self.intents[start..]
            .iter()
            .take_while(move |i| i.tick == tick)
            .map(|i| i.direction)
    }

    /// Decision for the offer opened on `tick`, if one was made.
    pub fn decision_for(&self, tick: u32) -> Option<RelicDecision> {
        self.decisions.iter().find(|d| d.tick == tick).map(|d| d.decision)
    }

    /// All recorded intents.
    pub fn intents(&self) -> &[RecordedIntent] {
        &self.intents
    }

    /// All recorded decisions.
    pub fn decisions(&self) -> &[RecordedDecision] {
        &self.decisions
    }

    /// Encode for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decode from storage.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// TESTS
// =============================================================================
