//! Game Logic Module
//!
//! All run simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `state`: Run state, snake, pickups, hazards
//! - `input`: Direction intents and run recordings
//! - `tick`: The per-step transform and replay
//! - `collision`: Contact detection and the rescue chain
//! - `spawn`: Food, pickup, hazard and altar placement
//! - `pickup`: Pickup effects
//! - `relic`: Relic catalog, offers and effects
//! - `upgrade`: Shop catalog and per-run configuration
//! - `scoring`: Food points and the tick interval curve
//! - `board`: Threshold-triggered board expansion
//! - `snapshot`: Render snapshot
//! - `events`: Game events for logging and replay checks

pub mod state;
pub mod input;
pub mod tick;
pub mod collision;
pub mod spawn;
pub mod pickup;
pub mod relic;
pub mod upgrade;
pub mod scoring;
pub mod board;
pub mod snapshot;
pub mod events;

// Re-export key types
pub use state::{GameState, SnakeState, Pickup, PickupKind, Hazard, HazardKind, RunPhase};
pub use input::{parse_intent, RelicDecision, RunRecording};
pub use tick::{tick, replay_run, start_run, GameOverReport, RunRules, TickResult};
pub use relic::{RelicKind, RunEffects, OfferError};
pub use upgrade::{MetaProgress, RunConfig, UpgradeKey, SHOP_ITEMS};
pub use snapshot::RenderSnapshot;
pub use events::{GameEvent, GameEventData};
