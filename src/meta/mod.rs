//! Meta-Progression Module
//!
//! Persistence of essence, upgrades and scores, kept outside the tick
//! loop. Everything here is async; nothing here is deterministic.
//!
//! ## Module Structure
//!
//! - `store`: `MetaStore` port and an in-memory implementation
//! - `protocol`: JSON request/response shapes and lenient parsing
//! - `client`: Session-side mirror with update broadcast

pub mod store;
pub mod protocol;
pub mod client;

pub use store::{InMemoryMetaStore, MetaError, MetaStore, ProfileId, ScoreRecord};
pub use protocol::{dispatch, parse_meta_response, MetaRequest};
pub use client::{MetaClient, MetaUpdated};
