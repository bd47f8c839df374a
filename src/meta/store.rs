//! Meta Store
//!
//! The persistence collaborator: essence, upgrade levels and scores per
//! profile. The engine only ever talks to it through `MetaStore`, never
//! from inside a tick.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::upgrade::{MetaProgress, UpgradeKey};

/// Profile identifier.
pub type ProfileId = Uuid;

/// Leaderboard page size for a single game.
pub const LEADERBOARD_LIMIT: usize = 25;

/// Persistence errors.
///
/// None of these are fatal to a run; callers surface them as status
/// messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetaError {
    #[error("Unknown upgrade")]
    UnknownUpgrade,

    #[error("Upgrade already maxed")]
    AlreadyMaxed,

    #[error("Not enough essence")]
    InsufficientEssence { have: u32, need: u32 },

    #[error("earned must be a number")]
    InvalidAmount,

    #[error("game and numeric score required")]
    InvalidScore,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// A submitted score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub profile: ProfileId,
    pub game: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// Async persistence port.
pub trait MetaStore: Send + Sync + 'static {
    /// Current meta for a profile, created empty on first access.
    fn fetch_meta(&self, profile: ProfileId) -> impl Future<Output = Result<MetaProgress, MetaError>> + Send;

    /// Add essence. Negative amounts are floored to zero.
    fn earn_essence(&self, profile: ProfileId, amount: i64) -> impl Future<Output = Result<MetaProgress, MetaError>> + Send;

    /// Buy one level of an upgrade.
    ///
    /// Validates the key, then the level cap, then the cost. A failed
    /// purchase leaves the profile untouched.
    fn purchase_upgrade(&self, profile: ProfileId, key: &str) -> impl Future<Output = Result<MetaProgress, MetaError>> + Send;

    /// Record a score for a game.
    fn submit_score(&self, profile: ProfileId, game: &str, score: i64) -> impl Future<Output = Result<ScoreRecord, MetaError>> + Send;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    metas: RwLock<BTreeMap<ProfileId, MetaProgress>>,
    scores: RwLock<Vec<ScoreRecord>>,
    offline: AtomicBool,
}

impl InMemoryMetaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails with `Unavailable` until
    /// switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), MetaError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(MetaError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    /// Best scores for `game`: highest first, earliest first on ties.
    pub async fn top_scores(&self, game: &str) -> Vec<ScoreRecord> {
        let scores = self.scores.read().await;
        let mut rows: Vec<ScoreRecord> = scores.iter().filter(|s| s.game == game).cloned().collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.created_at.cmp(&b.created_at)));
        rows.truncate(LEADERBOARD_LIMIT);
        rows
    }

    /// Number of profiles with meta rows.
    pub async fn profile_count(&self) -> usize {
        self.metas.read().await.len()
    }
}

impl MetaStore for InMemoryMetaStore {
    async fn fetch_meta(&self, profile: ProfileId) -> Result<MetaProgress, MetaError> {
        self.check_online()?;
        let mut metas = self.metas.write().await;
        Ok(metas.entry(profile).or_default().clone())
    }

    async fn earn_essence(&self, profile: ProfileId, amount: i64) -> Result<MetaProgress, MetaError> {
        self.check_online()?;
        let value = amount.clamp(0, u32::MAX as i64) as u32;

        let mut metas = self.metas.write().await;
        let meta = metas.entry(profile).or_default();
        meta.essence = meta.essence.saturating_add(value);
        debug!("Profile {} earned {} essence (now {})", profile, value, meta.essence);
        Ok(meta.clone())
    }

    async fn purchase_upgrade(&self, profile: ProfileId, key: &str) -> Result<MetaProgress, MetaError> {
        self.check_online()?;
        let key: UpgradeKey = key.parse().map_err(|_| MetaError::UnknownUpgrade)?;
        let item = key.item();

        let mut metas = self.metas.write().await;
        let meta = metas.entry(profile).or_default();
        let level = meta.level(key);
        if level >= item.max_level {
            return Err(MetaError::AlreadyMaxed);
        }
        let cost = item.cost_for_level(level);
        if meta.essence < cost {
            return Err(MetaError::InsufficientEssence {
                have: meta.essence,
                need: cost,
            });
        }

        meta.essence -= cost;
        meta.upgrades.insert(key.as_str().to_string(), level + 1);
        info!("Profile {} bought {} level {} for {}", profile, key, level + 1, cost);
        Ok(meta.clone())
    }

    async fn submit_score(&self, profile: ProfileId, game: &str, score: i64) -> Result<ScoreRecord, MetaError> {
        self.check_online()?;
        if game.is_empty() {
            return Err(MetaError::InvalidScore);
        }

        let record = ScoreRecord {
            profile,
            game: game.to_string(),
            score,
            created_at: Utc::now(),
        };
        self.scores.write().await.push(record.clone());
        Ok(record)
    }
}

// =============================================================================
// TESTS
// =============================================================================
