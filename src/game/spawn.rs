//! Spawn Director
//!
//! Procedural placement of food, pickups, hazards and relic altars.
//! All placement goes through `find_free_cell`.

use std::collections::BTreeSet;

use crate::core::grid::Position;
use crate::core::rng::DeterministicRng;
use crate::game::events::GameEventData;
use crate::game::state::{GameState, Hazard, HazardKind, Pickup, PickupKind};

/// Configuration for spawning.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Random probes before falling back to a row-major scan
    pub free_cell_attempts: u32,
    /// Maximum non-relic pickups on the board
    pub max_pickups: usize,
    /// Per-tick chance (percent) of a pickup spawning
    pub pickup_chance_percent: u32,
    /// Default hazard cadence (ticks) before upgrades
    pub hazard_base_interval: u32,
    /// Floor of the hazard cadence
    pub hazard_min_interval: u32,
    /// Every this many points shaves one tick off the cadence
    pub hazard_score_divisor: u32,
    /// Hazard lifetime floor (ms)
    pub hazard_ttl_base_ms: u64,
    /// Extra hazard lifetime per point of score (ms)
    pub hazard_ttl_per_point_ms: u64,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            free_cell_attempts: 200,
            max_pickups: 3,
            pickup_chance_percent: 3,
            hazard_base_interval: 16,
            hazard_min_interval: 6,
            hazard_score_divisor: 140,
            hazard_ttl_base_ms: 20_000,
            hazard_ttl_per_point_ms: 5,
        }
    }
}

/// Find a cell accepted by `is_free`.
///
/// Probes up to `attempts` uniform cells, then scans row-major. A board with
/// no acceptable cell yields `(0,0)`.
pub fn find_free_cell<F>(
    rng: &mut DeterministicRng,
    cells: i32,
    attempts: u32,
    is_free: F,
) -> Position
where
    F: Fn(Position) -> bool,
{
    for _ in 0..attempts {
        let candidate = rng.random_cell(cells);
        if is_free(candidate) {
            return candidate;
        }
    }

    for y in 0..cells {
        for x in 0..cells {
            let candidate = Position::new(x, y);
            if is_free(candidate) {
                return candidate;
            }
        }
    }

    Position::ORIGIN
}

/// Free cell avoiding everything in `occupied`.
pub fn free_cell_avoiding(
    rng: &mut DeterministicRng,
    cells: i32,
    attempts: u32,
    occupied: &BTreeSet<Position>,
) -> Position {
    find_free_cell(rng, cells, attempts, |p| !occupied.contains(&p))
}

/// Place fresh food on a free cell.
pub fn place_food(state: &mut GameState, config: &SpawnConfig) {
    let mut occupied = state.occupied_cells();
    // The old food cell is being replaced
    if !state.snake.occupies(state.food) {
        occupied.remove(&state.food);
    }
    state.food = free_cell_avoiding(&mut state.rng, state.cells, config.free_cell_attempts, &occupied);
}

/// Current hazard cadence in ticks: `floor(base - score / divisor)`,
/// never below the configured floor.
#[inline]
pub fn hazard_interval(base_interval: u32, score: u32, config: &SpawnConfig) -> u32 {
    let divisor = config.hazard_score_divisor.max(1);
    let cadence = base_interval.saturating_mul(divisor).saturating_sub(score) / divisor;
    cadence.max(config.hazard_min_interval)
}

/// Advance the hazard counter and spawn one hazard when it comes due.
pub fn maybe_spawn_hazard(state: &mut GameState, config: &SpawnConfig) {
    state.hazard_tick_counter += 1;
    let due = hazard_interval(state.hazard_base_interval, state.score, config);
    if state.hazard_tick_counter < due {
        return;
    }
    state.hazard_tick_counter = 0;

    let occupied = state.occupied_cells();
    let position = free_cell_avoiding(&mut state.rng, state.cells, config.free_cell_attempts, &occupied);
    let kind = if state.rng.coin() { HazardKind::Spike } else { HazardKind::Rift };
    let ttl = config.hazard_ttl_base_ms + config.hazard_ttl_per_point_ms * state.score as u64;
    let expires_at_ms = state.now_ms + ttl;

    state.hazards.push(Hazard {
        position,
        kind,
        spawned_at_ms: state.now_ms,
        expires_at_ms,
    });
    state.push_event(GameEventData::HazardSpawned { kind, position, expires_at_ms });
}

/// Place a relic altar if one is pending, else roll for a regular pickup.
pub fn maybe_spawn_pickup(state: &mut GameState, config: &SpawnConfig) {
    if state.relic_pending && !state.has_relic_altar() {
        spawn_pickup(state, PickupKind::Relic, config);
        state.relic_pending = false;
        return;
    }

    if state.regular_pickup_count() >= config.max_pickups {
        return;
    }

    if state.rng.chance_percent(config.pickup_chance_percent) {
        let idx = state.rng.next_index(PickupKind::ROLLABLE.len());
        spawn_pickup(state, PickupKind::ROLLABLE[idx], config);
    }
}

fn spawn_pickup(state: &mut GameState, kind: PickupKind, config: &SpawnConfig) {
    let occupied = state.occupied_cells();
    let position = free_cell_avoiding(&mut state.rng, state.cells, config.free_cell_attempts, &occupied);
    state.pickups.push(Pickup { position, kind });
    state.push_event(GameEventData::PickupSpawned { kind, position });
}

// =============================================================================
// TESTS
// =============================================================================
