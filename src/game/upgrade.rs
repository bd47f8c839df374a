//! Upgrade Configurator
//!
//! Persistent, purchasable upgrades and the per-run configuration they
//! produce. The engine only reads `MetaProgress`; writes go through the
//! persistence collaborator (`meta::store`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

/// Persistent meta-progression, mirrored read-only into the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaProgress {
    /// Spendable currency
    #[serde(default)]
    pub essence: u32,

    /// Upgrade levels by key. Unknown keys are kept so nothing is lost.
    #[serde(default)]
    pub upgrades: BTreeMap<String, u32>,
}

impl MetaProgress {
    /// Current level of an upgrade (0 if never bought).
    ///
    /// Clamped to the item's max level, so out-of-range persisted values
    /// behave as a fully bought upgrade.
    pub fn level(&self, key: UpgradeKey) -> u32 {
        self.upgrades
            .get(key.as_str())
            .copied()
            .unwrap_or(0)
            .min(key.item().max_level)
    }
}

/// Shop upgrade keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKey {
    /// Forager Satchel
    FoodBonus,
    /// Second Heart
    ExtraLife,
    /// Diviner's Compass
    StartRelic,
    /// Oracle Sigil
    HazardInsight,
    /// Jukebox track unlock
    #[serde(rename = "jukebox_track2")]
    JukeboxTrack2,
}

impl UpgradeKey {
    /// Every purchasable key.
    pub const ALL: [UpgradeKey; 5] = [
        UpgradeKey::FoodBonus,
        UpgradeKey::ExtraLife,
        UpgradeKey::StartRelic,
        UpgradeKey::HazardInsight,
        UpgradeKey::JukeboxTrack2,
    ];

    /// Wire key.
    pub fn as_str(self) -> &'static str {
        match self {
            UpgradeKey::FoodBonus => "food_bonus",
            UpgradeKey::ExtraLife => "extra_life",
            UpgradeKey::StartRelic => "start_relic",
            UpgradeKey::HazardInsight => "hazard_insight",
            UpgradeKey::JukeboxTrack2 => "jukebox_track2",
        }
    }

    /// Catalog entry for this key.
    pub fn item(self) -> &'static ShopItem {
        match self {
            UpgradeKey::FoodBonus => &SHOP_ITEMS[0],
            UpgradeKey::ExtraLife => &SHOP_ITEMS[1],
            UpgradeKey::StartRelic => &SHOP_ITEMS[2],
            UpgradeKey::HazardInsight => &SHOP_ITEMS[3],
            UpgradeKey::JukeboxTrack2 => &SHOP_ITEMS[4],
        }
    }
}

impl fmt::Display for UpgradeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized upgrade key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown upgrade: {0}")]
pub struct UnknownUpgrade(pub String);

impl FromStr for UpgradeKey {
    type Err = UnknownUpgrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpgradeKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownUpgrade(s.to_string()))
    }
}

/// A shop catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopItem {
    /// Key
    pub key: UpgradeKey,
    /// Display name
    pub name: &'static str,
    /// Description
    pub description: &'static str,
    /// Price of level 1; level n+1 costs `base_cost * (n + 1)`
    pub base_cost: u32,
    /// Highest purchasable level
    pub max_level: u32,
}

impl ShopItem {
    /// Price of the next level when currently at `current_level`.
    #[inline]
    pub fn cost_for_level(&self, current_level: u32) -> u32 {
        self.base_cost.saturating_mul(current_level.saturating_add(1))
    }
}

/// Shop catalog.
pub const SHOP_ITEMS: [ShopItem; 5] = [
    ShopItem {
        key: UpgradeKey::FoodBonus,
        name: "Forager Satchel",
        description: "+5 score per food permanently (stacks to 3).",
        base_cost: 150,
        max_level: 3,
    },
    ShopItem {
        key: UpgradeKey::ExtraLife,
        name: "Second Heart",
        description: "Gain an extra life each run.",
        base_cost: 600,
        max_level: 1,
    },
    ShopItem {
        key: UpgradeKey::StartRelic,
        name: "Diviner's Compass",
        description: "Begin every run with a random relic.",
        base_cost: 450,
        max_level: 1,
    },
    ShopItem {
        key: UpgradeKey::HazardInsight,
        name: "Oracle Sigil",
        description: "Hazards spawn more slowly.",
        base_cost: 300,
        max_level: 2,
    },
    ShopItem {
        key: UpgradeKey::JukeboxTrack2,
        name: "Jukebox Track: Chiptune II",
        description: "Unlocks a second background song for the site jukebox.",
        base_cost: 50,
        max_level: 1,
    },
];

/// Per-run configuration derived from meta-progression at `start()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Starting lives
    pub lives: u32,
    /// Added to every food's base score
    pub permanent_food_bonus: u32,
    /// Base hazard cadence in ticks
    pub hazard_base_interval: u32,
    /// Grant one random relic before the first tick
    pub start_relic_granted: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from_meta(&MetaProgress::default())
    }
}

impl RunConfig {
    /// Derive the run configuration from upgrade levels.
    pub fn from_meta(meta: &MetaProgress) -> Self {
        Self {
            lives: meta.level(UpgradeKey::ExtraLife).saturating_add(1),
            permanent_food_bonus: meta.level(UpgradeKey::FoodBonus).saturating_mul(5),
            hazard_base_interval: meta.level(UpgradeKey::HazardInsight).saturating_mul(8).saturating_add(16),
            start_relic_granted: meta.level(UpgradeKey::StartRelic) >= 1,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
