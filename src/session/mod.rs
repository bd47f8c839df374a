//! Session Module
//!
//! Non-deterministic shell around the simulation: lifecycle, real-time
//! scheduling and game-over reporting.
//!
//! ## Module Structure
//!
//! - `run`: Synchronous run lifecycle and recording
//! - `scheduler`: Tokio task driving ticks, commands and reports
//! - `report`: Score and essence submission after a run

pub mod run;
pub mod scheduler;
pub mod report;

pub use run::{RunSession, SessionError};
pub use scheduler::{spawn_session, SessionCommand, SessionConfig, SessionHandle, SessionUpdate, TickTimer};
pub use report::report_game_over;
