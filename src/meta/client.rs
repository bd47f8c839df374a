//! Meta Client
//!
//! Session-side mirror of a profile's meta-progression. Every change is
//! broadcast as `MetaUpdated` so unrelated listeners (the jukebox unlock)
//! can react without polling.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

use crate::game::upgrade::{MetaProgress, UpgradeKey};
use crate::meta::store::{MetaError, MetaStore, ProfileId};

/// Broadcast whenever the mirrored meta changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaUpdated {
    pub essence: u32,
    pub upgrades: BTreeMap<String, u32>,
}

impl MetaUpdated {
    /// Has the second jukebox track been bought?
    pub fn jukebox_unlocked(&self) -> bool {
        self.upgrades.get(UpgradeKey::JukeboxTrack2.as_str()).copied().unwrap_or(0) >= 1
    }
}

impl From<&MetaProgress> for MetaUpdated {
    fn from(meta: &MetaProgress) -> Self {
        Self {
            essence: meta.essence,
            upgrades: meta.upgrades.clone(),
        }
    }
}

/// Profile mirror over a `MetaStore`.
///
/// A client without a profile is a guest: it always sees an empty meta
/// and never persists anything.
pub struct MetaClient<S: MetaStore> {
    store: Arc<S>,
    profile: Option<ProfileId>,
    current: RwLock<MetaProgress>,
    updates: broadcast::Sender<MetaUpdated>,
}

impl<S: MetaStore> MetaClient<S> {
    /// Create a client for `profile` (or a guest).
    pub fn new(store: Arc<S>, profile: Option<ProfileId>) -> Self {
        let (updates, _) = broadcast::channel(16);
        Self {
            store,
            profile,
            current: RwLock::new(MetaProgress::default()),
            updates,
        }
    }

    /// Profile this client persists to.
    pub fn profile(&self) -> Option<ProfileId> {
        self.profile
    }

    /// Is this a guest client?
    pub fn is_guest(&self) -> bool {
        self.profile.is_none()
    }

    /// Subscribe to meta updates.
    pub fn subscribe(&self) -> broadcast::Receiver<MetaUpdated> {
        self.updates.subscribe()
    }

    /// Last known meta.
    pub async fn current(&self) -> MetaProgress {
        self.current.read().await.clone()
    }

    /// Fetch the profile's meta.
    ///
    /// Never fails: guests and fetch errors both resolve to an empty meta.
    pub async fn load(&self) -> MetaProgress {
        let mut current = self.current.write().await;
        let meta = match self.profile {
            None => MetaProgress::default(),
            Some(profile) => match self.store.fetch_meta(profile).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("Meta fetch failed for {}: {}", profile, e);
                    MetaProgress::default()
                }
            },
        };
        self.apply(&mut current, meta.clone());
        meta
    }

    /// Bank essence.
    pub async fn earn(&self, amount: u32) -> Result<MetaProgress, MetaError> {
        let profile = self.require_profile()?;
        let mut current = self.current.write().await;
        let meta = self.store.earn_essence(profile, amount as i64).await?;
        self.apply(&mut current, meta.clone());
        Ok(meta)
    }

    /// Record a score.
    pub async fn submit_score(&self, game: &str, score: u32) -> Result<(), MetaError> {
        let profile = self.require_profile()?;
        self.store.submit_score(profile, game, score as i64).await?;
        Ok(())
    }

    /// Buy an upgrade, returning the message to show the player.
    ///
    /// Purchase failures are never errors to the caller; they become the
    /// message.
    pub async fn purchase(&self, key: &str) -> String {
        let Some(profile) = self.profile else {
            return "Log in to visit the shop".to_string();
        };

        let mut current = self.current.write().await;
        match self.store.purchase_upgrade(profile, key).await {
            Ok(meta) => {
                self.apply(&mut current, meta);
                purchase_message(key)
            }
            Err(MetaError::Unavailable(reason)) => {
                warn!("Shop purchase of {} failed: {}", key, reason);
                "Shopkeeper is unavailable".to_string()
            }
            Err(e) => e.to_string(),
        }
    }

    fn require_profile(&self) -> Result<ProfileId, MetaError> {
        self.profile
            .ok_or_else(|| MetaError::Unavailable("not logged in".to_string()))
    }

    /// Store round trips hold the `current` write lock until applied, so a
    /// slow fetch can never overwrite a newer purchase or earn.
    fn apply(&self, current: &mut MetaProgress, meta: MetaProgress) {
        let update = MetaUpdated::from(&meta);
        *current = meta;
        // No listeners is fine
        if self.updates.send(update).is_err() {
            debug!("Meta updated with no listeners");
        }
    }
}

fn purchase_message(key: &str) -> String {
    match key.parse::<UpgradeKey>() {
        Ok(UpgradeKey::JukeboxTrack2) => "Unlocked Chiptune II in the jukebox!".to_string(),
        Ok(k) => format!("Upgraded {}", k.item().name),
        Err(_) => "Upgraded".to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
