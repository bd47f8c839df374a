//! Run Session
//!
//! Synchronous lifecycle over one `GameState`:
//! `Idle -> Running -> {RelicOffer} -> Running -> GameOver`.
//! Owns the recording of the current run so it can be replayed.

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::grid::Direction;
use crate::core::rng::derive_run_seed;
use crate::game::events::GameEvent;
use crate::game::input::{RelicDecision, RunRecording};
use crate::game::relic::{self, OfferError, RelicKind};
use crate::game::snapshot::RenderSnapshot;
use crate::game::state::{GameState, RunPhase};
use crate::game::tick::{start_run, tick, RunRules, TickResult};
use crate::game::upgrade::MetaProgress;

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Operation not valid in the current phase
    #[error("Invalid session state: {0}")]
    InvalidState(&'static str),

    /// Claim or decline without an open offer
    #[error("No relic offer is open")]
    NoRelicOffer,

    /// Claim index out of range
    #[error("Relic choice {index} out of range ({available} offered)")]
    InvalidChoice { index: usize, available: usize },

    /// Session task has stopped
    #[error("Session closed")]
    Closed,
}

impl From<OfferError> for SessionError {
    fn from(err: OfferError) -> Self {
        match err {
            OfferError::NoOffer => SessionError::NoRelicOffer,
            OfferError::InvalidChoice { index, available } => SessionError::InvalidChoice { index, available },
        }
    }
}

/// One player's run lifecycle.
pub struct RunSession {
    rules: RunRules,
    profile_key: [u8; 16],
    base_seed: u64,
    runs_started: u64,
    state: GameState,
    recording: Option<RunRecording>,
}

impl RunSession {
    /// Create an idle session.
    pub fn new(rules: RunRules, profile_key: [u8; 16], base_seed: u64) -> Self {
        let state = GameState::new([0; 16], base_seed, &rules);
        Self {
            rules,
            profile_key,
            base_seed,
            runs_started: 0,
            state,
            recording: None,
        }
    }

    /// Start (or restart) a run from `meta`.
    ///
    /// Discards any previous state. The start relic, if any, is granted
    /// here, before the first tick.
    pub fn start(&mut self, meta: &MetaProgress) -> RenderSnapshot {
        self.runs_started += 1;
        let seed = derive_run_seed(&self.profile_key, self.base_seed, self.runs_started);
        let run_id = *Uuid::new_v4().as_bytes();

        self.state = start_run(run_id, seed, meta, &self.rules);
        self.recording = Some(RunRecording::new(run_id, seed, meta.clone()));
        info!("Session run #{} seeded with {}", self.runs_started, seed);

        RenderSnapshot::capture(&self.state)
    }

    /// Queue a direction intent for the next tick.
    ///
    /// Returns `false` if it was discarded as a reversal.
    pub fn queue_direction(&mut self, direction: Direction) -> Result<bool, SessionError> {
        match self.state.phase {
            RunPhase::Idle | RunPhase::GameOver => return Err(SessionError::InvalidState(self.state.phase.tag())),
            RunPhase::Running | RunPhase::RelicOffer { .. } => {}
        }

        let next_tick = self.state.tick + 1;
        if let Some(recording) = self.recording.as_mut() {
            recording.record_intent(next_tick, direction);
        }
        Ok(self.state.snake.queue_turn(direction))
    }

    /// Run one tick.
    pub fn step(&mut self) -> TickResult {
        let result = tick(&mut self.state, &self.rules);
        if let Some(recording) = self.recording.as_mut() {
            recording.record_tick(self.state.tick);
        }
        result
    }

    /// Claim choice `index` from the open relic offer.
    pub fn claim_relic(&mut self, index: usize) -> Result<RelicKind, SessionError> {
        let offered_at = self.state.tick;
        let kind = relic::claim_offer(&mut self.state, index, self.rules.status_ms)?;
        if let Some(recording) = self.recording.as_mut() {
            recording.record_decision(offered_at, RelicDecision::Claim(index as u8));
        }
        debug!("Claimed {} at tick {}", kind.name(), offered_at);
        Ok(kind)
    }

    /// Decline the open relic offer.
    pub fn decline_relic(&mut self) -> Result<(), SessionError> {
        let offered_at = self.state.tick;
        relic::decline_offer(&mut self.state)?;
        if let Some(recording) = self.recording.as_mut() {
            recording.record_decision(offered_at, RelicDecision::Decline);
        }
        Ok(())
    }

    /// Show a transient message over the board.
    pub fn flash(&mut self, text: impl Into<String>) {
        self.state.flash(text, self.rules.status_ms);
    }

    /// Events produced outside a tick (claims, declines).
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.take_events()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot::capture(&self.state)
    }

    /// Current phase.
    pub fn phase(&self) -> &RunPhase {
        &self.state.phase
    }

    /// Interval the next tick should fire at.
    pub fn interval_ms(&self) -> u64 {
        self.state.tick_interval_ms
    }

    /// Read-only state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Recording of the current run, if one was started.
    pub fn recording(&self) -> Option<&RunRecording> {
        self.recording.as_ref()
    }

    /// Rules in force.
    pub fn rules(&self) -> &RunRules {
        &self.rules
    }
}

// =============================================================================
// TESTS
// =============================================================================
