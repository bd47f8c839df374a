//! # Crypt Snake
//!
//! Deterministic tick engine for a roguelite Snake: wrapping board,
//! timed hazards, relics, a rescue chain and persistent meta-progression.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CRYPT SNAKE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── grid.rs     - Wrapping grid positions and directions    │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Run simulation (deterministic)            │
//! │  ├── state.rs    - Run, snake, pickup and hazard state       │
//! │  ├── tick.rs     - The per-step transform and replay         │
//! │  ├── collision.rs- Contact detection and rescue chain        │
//! │  ├── spawn.rs    - Food, pickup and hazard placement         │
//! │  ├── relic.rs    - Relic catalog and offers                  │
//! │  ├── upgrade.rs  - Shop catalog, per-run config              │
//! │  └── board.rs    - Board expansion                           │
//! │                                                              │
//! │  meta/           - Persistence (async)                       │
//! │  ├── store.rs    - MetaStore port, in-memory store           │
//! │  ├── protocol.rs - JSON shapes, lenient parsing              │
//! │  └── client.rs   - Profile mirror, update broadcast          │
//! │                                                              │
//! │  session/        - Real-time shell (non-deterministic)       │
//! │  ├── run.rs      - Run lifecycle and recording               │
//! │  ├── scheduler.rs- Tick timer and session task               │
//! │  └── report.rs   - Game-over score and essence reporting     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies; the run clock advances per tick
//! - All randomness from seeded Xorshift128+
//!
//! A run's seed, starting meta and recorded intents reproduce it
//! exactly, down to the state hash.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod meta;
pub mod session;

// Re-export commonly used types
pub use core::grid::{Direction, Position};
pub use core::rng::DeterministicRng;
pub use game::state::{GameState, RunPhase};
pub use game::tick::{tick, GameOverReport, RunRules, TickResult};
pub use game::upgrade::MetaProgress;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Game name scores are filed under
pub const GAME_NAME: &str = "Snake";

/// Starting board size (cells per side)
pub const BASE_CELLS: i32 = 24;
