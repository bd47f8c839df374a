//! Relic System
//!
//! Run-scoped power-ups offered at relic altars. Each catalog entry maps to
//! a pure effect descriptor; `RunEffects::apply` is the only place effects
//! touch run state.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::game::events::GameEventData;
use crate::game::state::{GameState, RunPhase};

/// Number of relics shown at an altar.
pub const OFFER_SIZE: usize = 3;

/// Relic catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RelicKind {
    /// +5 score per food, stacks
    SoulGlutton = 0,
    /// Slows the base tick
    TimeDilation = 1,
    /// +2 hazard-negating charges, stacks
    VoidCloak = 2,
    /// Longer double-score pickups
    ChronoBattery = 3,
    /// Rescues purge nearby hazards
    SoulAnchor = 4,
}

/// What claiming a relic does, as data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelicEffect {
    /// Add to the per-food score bonus
    FoodBonus(u32),
    /// Enable time dilation
    TimeDilation,
    /// Add void cloak charges
    VoidCloakCharges(u32),
    /// Enable the chrono battery
    ChronoBattery,
    /// Enable the soul anchor
    SoulAnchor,
}

impl RelicKind {
    /// Full catalog, in display order.
    pub const ALL: [RelicKind; 5] = [
        RelicKind::SoulGlutton,
        RelicKind::TimeDilation,
        RelicKind::VoidCloak,
        RelicKind::ChronoBattery,
        RelicKind::SoulAnchor,
    ];

    /// Stable key used on the wire and in saved inventories.
    pub fn key(self) -> &'static str {
        match self {
            RelicKind::SoulGlutton => "soul_glutton",
            RelicKind::TimeDilation => "time_dilation",
            RelicKind::VoidCloak => "void_cloak",
            RelicKind::ChronoBattery => "chrono_battery",
            RelicKind::SoulAnchor => "soul_anchor",
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            RelicKind::SoulGlutton => "Soul Glutton",
            RelicKind::TimeDilation => "Hourglass of Dilation",
            RelicKind::VoidCloak => "Voidcloak",
            RelicKind::ChronoBattery => "Chrono Battery",
            RelicKind::SoulAnchor => "Soul Anchor",
        }
    }

    /// One-line description.
    pub fn description(self) -> &'static str {
        match self {
            RelicKind::SoulGlutton => "+5 score per food for this run.",
            RelicKind::TimeDilation => "Base speed slows slightly.",
            RelicKind::VoidCloak => "Gain 2 charges that negate hazard damage.",
            RelicKind::ChronoBattery => "Double-score pickups last longer.",
            RelicKind::SoulAnchor => "Cheating death purges nearby hazards.",
        }
    }

    /// Can this relic be claimed more than once per run?
    pub fn repeatable(self) -> bool {
        matches!(self, RelicKind::SoulGlutton | RelicKind::VoidCloak)
    }

    /// Effect descriptor applied on claim.
    pub fn effect(self) -> RelicEffect {
        match self {
            RelicKind::SoulGlutton => RelicEffect::FoodBonus(5),
            RelicKind::TimeDilation => RelicEffect::TimeDilation,
            RelicKind::VoidCloak => RelicEffect::VoidCloakCharges(2),
            RelicKind::ChronoBattery => RelicEffect::ChronoBattery,
            RelicKind::SoulAnchor => RelicEffect::SoulAnchor,
        }
    }

    /// Look up by wire key.
    pub fn from_key(key: &str) -> Option<RelicKind> {
        Self::ALL.into_iter().find(|r| r.key() == key)
    }
}

/// Accumulated relic outcomes for the current run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEffects {
    /// Added to every food's base score
    pub food_bonus: u32,
    /// Adds to the base tick interval
    pub time_dilation: bool,
    /// Hazard contacts that can still be negated
    pub void_cloak_charges: u32,
    /// Extends double-score duration
    pub chrono_battery: bool,
    /// Extra-life rescues clear hazards around the respawn point
    pub soul_anchor: bool,
}

impl RunEffects {
    /// Apply one effect. Repeatable effects stack.
    pub fn apply(&mut self, effect: RelicEffect) {
        match effect {
            RelicEffect::FoodBonus(amount) => {
                self.food_bonus = self.food_bonus.saturating_add(amount);
            }
            RelicEffect::TimeDilation => self.time_dilation = true,
            RelicEffect::VoidCloakCharges(charges) => {
                self.void_cloak_charges = self.void_cloak_charges.saturating_add(charges);
            }
            RelicEffect::ChronoBattery => self.chrono_battery = true,
            RelicEffect::SoulAnchor => self.soul_anchor = true,
        }
    }
}

/// Claimed relics with per-kind counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelicInventory {
    counts: BTreeMap<RelicKind, u32>,
}

impl RelicInventory {
    /// Record one claim.
    pub fn record(&mut self, kind: RelicKind) {
        *self.counts.entry(kind).or_insert(0) += 1;
    }

    /// How many times `kind` was claimed this run.
    pub fn count(&self, kind: RelicKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Total claims across all kinds.
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Entries in catalog order.
    pub fn entries(&self) -> impl Iterator<Item = (RelicKind, u32)> + '_ {
        self.counts.iter().map(|(k, c)| (*k, *c))
    }
}

/// Draw `count` relics for an offer.
///
/// Draws without replacement from the catalog minus non-repeatable relics
/// already owned. If that pool runs dry, the remainder is drawn with
/// replacement from the full catalog, so duplicates can appear only then.
pub fn offer_choices(
    rng: &mut DeterministicRng,
    inventory: &RelicInventory,
    count: usize,
) -> Vec<RelicKind> {
    let mut pool: Vec<RelicKind> = RelicKind::ALL
        .into_iter()
        .filter(|r| r.repeatable() || inventory.count(*r) == 0)
        .collect();

    let mut picks = Vec::with_capacity(count);
    while !pool.is_empty() && picks.len() < count {
        let idx = rng.next_index(pool.len());
        picks.push(pool.remove(idx));
    }

    while picks.len() < count {
        let idx = rng.next_index(RelicKind::ALL.len());
        picks.push(RelicKind::ALL[idx]);
    }

    picks
}

/// Claim a relic: apply its effect once and record it.
pub fn grant_relic(state: &mut GameState, kind: RelicKind, silent: bool) {
    state.effects.apply(kind.effect());
    state.relics.record(kind);
    state.push_event(GameEventData::RelicClaimed { relic: kind, silent });
}

/// Why an offer could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OfferError {
    #[error("no relic offer is open")]
    NoOffer,

    #[error("choice {index} out of range ({available} offered)")]
    InvalidChoice { index: usize, available: usize },
}

/// Claim choice `index` from the open offer and resume the run.
pub fn claim_offer(state: &mut GameState, index: usize, status_ms: u64) -> Result<RelicKind, OfferError> {
    let RunPhase::RelicOffer { choices } = &state.phase else {
        return Err(OfferError::NoOffer);
    };
    let kind = *choices.get(index).ok_or(OfferError::InvalidChoice {
        index,
        available: choices.len(),
    })?;

    state.phase = RunPhase::Running;
    grant_relic(state, kind, false);
    state.flash(kind.name(), status_ms);
    Ok(kind)
}

/// Walk away from the open offer and resume the run.
pub fn decline_offer(state: &mut GameState) -> Result<(), OfferError> {
    if !matches!(state.phase, RunPhase::RelicOffer { .. }) {
        return Err(OfferError::NoOffer);
    }
    state.phase = RunPhase::Running;
    state.push_event(GameEventData::RelicDeclined);
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_effects_stack_for_repeatables() {
        let mut effects = RunEffects::default();
        effects.apply(RelicKind::SoulGlutton.effect());
        effects.apply(RelicKind::SoulGlutton.effect());
        effects.apply(RelicKind::VoidCloak.effect());

        assert_eq!(effects.food_bonus, 10);
        assert_eq!(effects.void_cloak_charges, 2);
        assert!(!effects.time_dilation);
    }

    #[test]
    fn test_fresh_offer_has_no_duplicates() {
        let inventory = RelicInventory::default();

        for seed in 0..200 {
            let mut rng = DeterministicRng::new(seed);
            let picks = offer_choices(&mut rng, &inventory, OFFER_SIZE);
            assert_eq!(picks.len(), OFFER_SIZE);

            let unique: BTreeSet<_> = picks.iter().collect();
            assert_eq!(unique.len(), OFFER_SIZE);
        }
    }

    #[test]
    fn test_owned_non_repeatables_excluded() {
        let mut inventory = RelicInventory::default();
        inventory.record(RelicKind::TimeDilation);
        inventory.record(RelicKind::SoulAnchor);

        for seed in 0..200 {
            let mut rng = DeterministicRng::new(seed);
            let picks = offer_choices(&mut rng, &inventory, OFFER_SIZE);

            assert!(!picks.contains(&RelicKind::TimeDilation));
            assert!(!picks.contains(&RelicKind::SoulAnchor));
            let unique: BTreeSet<_> = picks.iter().collect();
            assert_eq!(unique.len(), OFFER_SIZE);
        }
    }

    #[test]
    fn test_exhausted_pool_falls_back_to_full_catalog() {
        // Only the two repeatables remain eligible, so the third pick
        // comes from the full catalog with replacement.
        let mut inventory = RelicInventory::default();
        inventory.record(RelicKind::TimeDilation);
        inventory.record(RelicKind::ChronoBattery);
        inventory.record(RelicKind::SoulAnchor);

        for seed in 0..200 {
            let mut rng = DeterministicRng::new(seed);
            let picks = offer_choices(&mut rng, &inventory, OFFER_SIZE);

            assert_eq!(picks.len(), OFFER_SIZE);
            assert!(picks[..2].contains(&RelicKind::SoulGlutton));
            assert!(picks[..2].contains(&RelicKind::VoidCloak));
        }
    }

    #[test]
    fn test_key_lookup() {
        for kind in RelicKind::ALL {
            assert_eq!(RelicKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(RelicKind::from_key("cursed_idol"), None);
    }

    #[test]
    fn test_inventory_counts() {
        let mut inventory = RelicInventory::default();
        inventory.record(RelicKind::VoidCloak);
        inventory.record(RelicKind::VoidCloak);
        inventory.record(RelicKind::SoulGlutton);

        assert_eq!(inventory.count(RelicKind::VoidCloak), 2);
        assert_eq!(inventory.count(RelicKind::SoulAnchor), 0);
        assert_eq!(inventory.total(), 3);

        let entries: Vec<_> = inventory.entries().collect();
        assert_eq!(entries, vec![(RelicKind::SoulGlutton, 1), (RelicKind::VoidCloak, 2)]);
    }

    #[test]
    fn test_claim_and_decline_offer() {
        use crate::game::tick::RunRules;

        let mut state = GameState::new([0; 16], 3, &RunRules::default());
        state.begin_run(&Default::default());
        assert_eq!(claim_offer(&mut state, 0, 2500), Err(OfferError::NoOffer));
        assert_eq!(decline_offer(&mut state), Err(OfferError::NoOffer));

        state.phase = RunPhase::RelicOffer {
            choices: vec![RelicKind::VoidCloak, RelicKind::SoulAnchor, RelicKind::SoulGlutton],
        };
        assert_eq!(
            claim_offer(&mut state, 3, 2500),
            Err(OfferError::InvalidChoice { index: 3, available: 3 })
        );

        assert_eq!(claim_offer(&mut state, 0, 2500), Ok(RelicKind::VoidCloak));
        assert_eq!(state.phase, RunPhase::Running);
        assert_eq!(state.effects.void_cloak_charges, 2);
        assert_eq!(state.status_text(), Some("Voidcloak"));

        state.phase = RunPhase::RelicOffer { choices: vec![RelicKind::SoulAnchor] };
        assert_eq!(decline_offer(&mut state), Ok(()));
        assert_eq!(state.phase, RunPhase::Running);
        assert!(!state.effects.soul_anchor);
    }
}
