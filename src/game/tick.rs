//! Simulation Tick
//!
//! One discrete step of a run. The tick is a single synchronous transform
//! over `GameState`: it never sleeps, never reads the wall clock and draws
//! randomness only from `state.rng`, so a seed plus the recorded intents
//! reproduce a run exactly.
//!
//! Order within a tick:
//! 1. advance the simulation clock, drop expired hazards
//! 2. apply the queued turn, compute the new head
//! 3. detect contact and walk the rescue chain
//! 4. commit movement, food and pickups
//! 5. spawn pickups and hazards
//! 6. recompute the interval, reschedule if it changed
//! 7. expand the board if a threshold was crossed
//! 8. capture the render snapshot

use tracing::{debug, info};

use crate::core::grid::Position;
use crate::game::board::{check_expansion, ExpansionConfig};
use crate::game::collision::{detect_contact, resolve_contact, RescueConfig, Resolution};
use crate::game::events::{ContactKind, GameEvent, GameEventData};
use crate::game::input::{RelicDecision, RunRecording};
use crate::game::pickup::{consume_pickup_at, PickupConfig, PickupOutcome};
use crate::game::relic::{self, OfferError, RelicKind, OFFER_SIZE};
use crate::game::scoring::{desired_interval, food_points, SpeedConfig};
use crate::game::snapshot::RenderSnapshot;
use crate::game::spawn::{maybe_spawn_hazard, maybe_spawn_pickup, place_food, SpawnConfig};
use crate::game::state::{GameState, RunPhase};
use crate::game::upgrade::{MetaProgress, RunConfig};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Every rule a run is simulated under.
#[derive(Debug, Clone)]
pub struct RunRules {
    /// Spawn director
    pub spawn: SpawnConfig,
    /// Pickup effects
    pub pickup: PickupConfig,
    /// Rescue chain
    pub rescue: RescueConfig,
    /// Score and interval model
    pub speed: SpeedConfig,
    /// Board expansion
    pub expansion: ExpansionConfig,
    /// Head cell at run start
    pub start_head: Position,
    /// Food cell at run start
    pub start_food: Position,
    /// Status message lifetime (ms)
    pub status_ms: u64,
    /// Every Nth food queues a relic altar
    pub relic_every_foods: u32,
}

impl Default for RunRules {
    fn default() -> Self {
        Self {
            spawn: SpawnConfig::default(),
            pickup: PickupConfig::default(),
            rescue: RescueConfig::default(),
            speed: SpeedConfig::default(),
            expansion: ExpansionConfig::default(),
            start_head: Position::new(10, 10),
            start_food: Position::new(15, 10),
            status_ms: 2_500,
            relic_every_foods: 5,
        }
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// What the persistence collaborator is told when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameOverReport {
    /// Score at the moment of death
    pub final_score: u32,
    /// Essence to bank; `None` for a scoreless run
    pub essence_earned: Option<u32>,
    /// What killed the snake
    pub contact: ContactKind,
}

impl GameOverReport {
    /// Essence earned for a final score: a fifth of it, at least one.
    pub fn essence_for(final_score: u32) -> Option<u32> {
        (final_score > 0).then(|| (final_score / 5).max(1))
    }
}

/// Result of a tick.
#[derive(Debug, Clone)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Board after the tick
    pub snapshot: RenderSnapshot,
    /// New interval, if the scheduler must swap its timer
    pub reschedule: Option<u64>,
    /// Set on the tick the run ended
    pub game_over: Option<GameOverReport>,
    /// Set on the tick a relic altar was consumed
    pub relic_offer: Option<Vec<RelicKind>>,
}

impl TickResult {
    fn empty(state: &GameState) -> Self {
        Self {
            events: Vec::new(),
            snapshot: RenderSnapshot::capture(state),
            reschedule: None,
            game_over: None,
            relic_offer: None,
        }
    }
}

// =============================================================================
// RUN START
// =============================================================================

/// Build a fresh running state from persisted meta-progression.
pub fn start_run(run_id: [u8; 16], rng_seed: u64, meta: &MetaProgress, rules: &RunRules) -> GameState {
    let run_config = RunConfig::from_meta(meta);
    let mut state = GameState::new(run_id, rng_seed, rules);
    state.begin_run(&run_config);

    info!(
        "Run {} started: lives={}, food_bonus={}, hazard_interval={}, relics={}",
        hex::encode(&run_id[..4]),
        state.lives,
        state.permanent_food_bonus,
        state.hazard_base_interval,
        state.relics.total()
    );
    state
}

// =============================================================================
// TICK
// =============================================================================

/// Run one simulation tick.
///
/// Only a `Running` state advances. Any other phase returns an empty
/// result with a fresh snapshot and leaves the clock untouched.
pub fn tick(state: &mut GameState, rules: &RunRules) -> TickResult {
    if state.phase != RunPhase::Running {
        return TickResult::empty(state);
    }

    let mut reschedule = None;
    let mut game_over = None;
    let mut relic_offer = None;

    // 1. Clock
    state.now_ms += state.tick_interval_ms;
    state.tick += 1;
    let expired = state.prune_expired_hazards();
    if expired > 0 {
        state.push_event(GameEventData::HazardsExpired { count: expired as u32 });
    }

    // 2. Movement
    state.snake.apply_pending();
    let head = state.snake.next_head(state.cells);
    let will_grow = head == state.food;

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(tick = state.tick, now_ms = state.now_ms, ?head, will_grow, "tick");

    // 3. Contact
    let mut commit = true;
    if let Some(contact) = detect_contact(state, head, will_grow) {
        let resolution = resolve_contact(
            state,
            contact,
            head,
            &rules.rescue,
            rules.spawn.free_cell_attempts,
            rules.status_ms,
        );
        debug!("Tick {}: {:?} contact at {:?} -> {:?}", state.tick, contact, head, resolution);

        match resolution {
            // Passing over a hazard is harmless; passing through the body
            // would overlap it, so the snake holds position instead.
            Resolution::Ignored => commit = contact == ContactKind::Hazard,
            Resolution::VoidCloak => {}
            Resolution::ExtraLife { .. } => commit = false,
            Resolution::Fatal => {
                game_over = Some(end_run(state, contact));
            }
        }
    }

    if game_over.is_none() {
        // 4. Commit
        if commit {
            state.snake.advance(head, will_grow);
            if will_grow {
                eat_food(state, head, rules);
            }
            if consume_pickup_at(state, head, &rules.pickup, rules.status_ms) == PickupOutcome::RelicAltar {
                relic_offer = Some(open_relic_offer(state));
            }
        }

        if relic_offer.is_none() {
            // 5. Spawns
            maybe_spawn_pickup(state, &rules.spawn);
            maybe_spawn_hazard(state, &rules.spawn);

            // 6. Interval
            let desired = desired_interval(state.score, &state.effects, state.boost_active(), &rules.speed);
            if desired != state.tick_interval_ms {
                debug!("Tick {}: interval {}ms -> {}ms", state.tick, state.tick_interval_ms, desired);
                state.push_event(GameEventData::IntervalChanged {
                    from_ms: state.tick_interval_ms,
                    to_ms: desired,
                });
                state.tick_interval_ms = desired;
                reschedule = Some(desired);
            }

            // 7. Expansion
            check_expansion(state, &rules.expansion, rules.status_ms);
        }
    }

    // 8. Snapshot
    TickResult {
        events: state.take_events(),
        snapshot: RenderSnapshot::capture(state),
        reschedule,
        game_over,
        relic_offer,
    }
}

fn eat_food(state: &mut GameState, at: Position, rules: &RunRules) {
    let points = food_points(state, &rules.speed);
    state.score = state.score.saturating_add(points);
    state.foods_eaten += 1;
    if rules.relic_every_foods > 0 && state.foods_eaten % rules.relic_every_foods == 0 {
        state.relic_pending = true;
    }
    state.push_event(GameEventData::FoodEaten {
        position: at,
        points,
        new_score: state.score,
    });
    place_food(state, &rules.spawn);
}

fn open_relic_offer(state: &mut GameState) -> Vec<RelicKind> {
    let choices = relic::offer_choices(&mut state.rng, &state.relics, OFFER_SIZE);
    debug!("Tick {}: relic offer {:?}", state.tick, choices);
    state.phase = RunPhase::RelicOffer { choices: choices.clone() };
    state.push_event(GameEventData::RelicOffered { choices: choices.clone() });
    choices
}

fn end_run(state: &mut GameState, contact: ContactKind) -> GameOverReport {
    state.phase = RunPhase::GameOver;
    state.push_event(GameEventData::GameOver {
        contact,
        final_score: state.score,
    });
    info!(
        "Run {} over at tick {}: {:?}, score {}",
        hex::encode(&state.run_id[..4]),
        state.tick,
        contact,
        state.score
    );

    GameOverReport {
        final_score: state.score,
        essence_earned: GameOverReport::essence_for(state.score),
        contact,
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// Replay a run from its recording.
///
/// Returns the final state and every event, start-relic claim included.
/// Replay stops early if the run ended or an offer was left open.
pub fn replay_run(recording: &RunRecording, rules: &RunRules) -> Result<(GameState, Vec<GameEvent>), OfferError> {
    let mut state = start_run(recording.run_id, recording.rng_seed, &recording.meta, rules);
    let mut all_events = state.take_events();

    for t in 1..=recording.end_tick {
        for direction in recording.intents_for(t) {
            state.snake.queue_turn(direction);
        }

        let result = tick(&mut state, rules);
        all_events.extend(result.events);

        if result.game_over.is_some() {
            break;
        }
        if result.relic_offer.is_some() {
            match recording.decision_for(t) {
                Some(RelicDecision::Claim(index)) => {
                    relic::claim_offer(&mut state, index as usize, rules.status_ms)?;
                }
                Some(RelicDecision::Decline) => relic::decline_offer(&mut state)?,
                None => break,
            }
            all_events.extend(state.take_events());
        }
    }

    Ok((state, all_events))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Direction;
    use crate::game::state::{Hazard, HazardKind, Pickup, PickupKind};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn quiet_rules() -> RunRules {
        RunRules {
            spawn: SpawnConfig {
                pickup_chance_percent: 0,
                ..SpawnConfig::default()
            },
            ..RunRules::default()
        }
    }

    fn running(seed: u64, rules: &RunRules) -> GameState {
        start_run([7; 16], seed, &MetaProgress::default(), rules)
    }

    fn meta_with(key: &str, level: u32) -> MetaProgress {
        let mut meta = MetaProgress::default();
        meta.upgrades.insert(key.to_string(), level);
        meta
    }

    fn hazard(at: Position) -> Hazard {
        Hazard {
            position: at,
            kind: HazardKind::Spike,
            spawned_at_ms: 0,
            expires_at_ms: 1_000_000,
        }
    }

    #[test]
    fn test_opening_run_reaches_food() {
        let rules = quiet_rules();
        let mut state = running(12345, &rules);
        assert_eq!(state.cells, 24);
        assert_eq!(state.snake.len(), 1);
        assert_eq!(state.snake.head(), Position::new(10, 10));
        assert_eq!(state.snake.direction, Direction::Right);
        assert_eq!(state.food, Position::new(15, 10));

        let mut growths = 0;
        for _ in 0..5 {
            let result = tick(&mut state, &rules);
            growths += result
                .events
                .iter()
                .filter(|e| matches!(e.data, GameEventData::FoodEaten { .. }))
                .count();
        }

        assert_eq!(state.snake.head(), Position::new(15, 10));
        assert_eq!(growths, 1);
        assert_eq!(state.snake.len(), 2);
        assert_eq!(state.score, 10);
        assert_eq!(state.now_ms, 600);
        assert_ne!(state.food, Position::new(15, 10));
    }

    #[test]
    fn test_wraps_instead_of_dying() {
        let rules = quiet_rules();
        let mut state = running(1, &rules);
        state.food = Position::new(0, 0);
        state.snake.body[0] = Position::new(23, 5);

        let result = tick(&mut state, &rules);
        assert!(result.game_over.is_none());
        assert_eq!(state.snake.head(), Position::new(0, 5));
    }

    #[test]
    fn test_unrescued_hazard_ends_run() {
        let rules = quiet_rules();
        let mut state = running(2, &rules);
        state.hazards.push(hazard(Position::new(11, 10)));

        let result = tick(&mut state, &rules);
        let report = result.game_over.unwrap();
        assert_eq!(report.contact, ContactKind::Hazard);
        assert_eq!(report.final_score, 0);
        assert_eq!(report.essence_earned, None);
        assert!(state.is_over());
        assert_eq!(state.snake.head(), Position::new(10, 10));
        assert!(result.events.iter().any(|e| e.is_game_over()));

        // Terminal: further ticks do nothing
        let tick_before = state.tick;
        let result = tick(&mut state, &rules);
        assert!(result.events.is_empty());
        assert_eq!(state.tick, tick_before);
    }

    #[test]
    fn test_extra_life_keeps_run_alive() {
        let rules = quiet_rules();
        let mut state = start_run([7; 16], 3, &meta_with("extra_life", 1), &rules);
        assert_eq!(state.lives, 2);
        state.hazards.push(hazard(Position::new(11, 10)));

        let result = tick(&mut state, &rules);
        assert!(result.game_over.is_none());
        assert_eq!(state.lives, 1);
        assert_eq!(state.snake.len(), 3);
        assert!(state.is_invulnerable());
        assert_eq!(result.snapshot.status_message.as_deref(), Some("Second Heart saved you!"));

        let unique: BTreeSet<_> = state.snake.body.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_invulnerable_snake_passes_over_hazard() {
        let rules = quiet_rules();
        let mut state = running(4, &rules);
        state.invulnerable_until_ms = 10_000;
        state.hazards.push(hazard(Position::new(11, 10)));

        let result = tick(&mut state, &rules);
        assert!(result.game_over.is_none());
        assert_eq!(state.snake.head(), Position::new(11, 10));
        assert_eq!(state.hazards.len(), 1);
    }

    #[test]
    fn test_void_cloak_clears_path() {
        let rules = quiet_rules();
        let mut state = running(5, &rules);
        state.effects.void_cloak_charges = 1;
        state.hazards.push(hazard(Position::new(11, 10)));

        tick(&mut state, &rules);
        assert!(!state.is_over());
        assert_eq!(state.snake.head(), Position::new(11, 10));
        assert_eq!(state.effects.void_cloak_charges, 0);
        assert!(state.hazard_at(Position::new(11, 10)).is_none());
    }

    #[test]
    fn test_start_relic_granted_silently() {
        let rules = RunRules::default();
        let state = start_run([7; 16], 77, &meta_with("start_relic", 1), &rules);

        assert_eq!(state.relics.total(), 1);
        assert_eq!(state.phase, RunPhase::Running);
        assert!(!state.relic_pending);
        assert_eq!(state.status_text(), None);
        assert!(state
            .pending_events
            .iter()
            .any(|e| matches!(e.data, GameEventData::RelicClaimed { silent: true, .. })));
    }

    #[test]
    fn test_fifth_food_queues_altar() {
        let rules = quiet_rules();
        let mut state = running(6, &rules);
        state.foods_eaten = 4;

        for _ in 0..5 {
            tick(&mut state, &rules);
        }
        assert_eq!(state.foods_eaten, 5);
        // Altar is placed by the spawn step on the same tick
        assert!(!state.relic_pending);
        assert!(state.has_relic_altar());
    }

    #[test]
    fn test_altar_pauses_run_with_offer() {
        let rules = quiet_rules();
        let mut state = running(8, &rules);
        state.pickups.push(Pickup {
            position: Position::new(11, 10),
            kind: PickupKind::Relic,
        });

        let result = tick(&mut state, &rules);
        let choices = result.relic_offer.unwrap();
        assert_eq!(choices.len(), OFFER_SIZE);
        assert_eq!(result.snapshot.relic_choices, Some(choices.clone()));
        assert_eq!(state.phase, RunPhase::RelicOffer { choices });

        // Paused: the clock does not move
        let now = state.now_ms;
        tick(&mut state, &rules);
        assert_eq!(state.now_ms, now);

        relic::decline_offer(&mut state).unwrap();
        tick(&mut state, &rules);
        assert_eq!(state.now_ms, now + state.tick_interval_ms);
    }

    #[test]
    fn test_boost_reschedules() {
        let rules = quiet_rules();
        let mut state = running(9, &rules);
        state.pickups.push(Pickup {
            position: Position::new(11, 10),
            kind: PickupKind::Boost,
        });

        let result = tick(&mut state, &rules);
        assert_eq!(result.reschedule, Some(84));
        assert_eq!(state.tick_interval_ms, 84);

        // Unchanged interval: no reschedule
        let result = tick(&mut state, &rules);
        assert_eq!(result.reschedule, None);
    }

    #[test]
    fn test_board_expands_at_200() {
        let rules = quiet_rules();
        let mut state = running(10, &rules);
        state.score = 195;
        state.food = Position::new(11, 10);

        let result = tick(&mut state, &rules);
        assert_eq!(state.score, 205);
        assert_eq!(state.cells, 32);
        assert_eq!(result.snapshot.cells, 32);
        assert!(result.snapshot.snake.iter().all(|p| p.in_bounds(32)));
        assert!(result.snapshot.food.in_bounds(32));

        for _ in 0..10 {
            tick(&mut state, &rules);
        }
        assert_eq!(state.expansions, 1);
    }

    #[test]
    fn test_essence_formula() {
        assert_eq!(GameOverReport::essence_for(0), None);
        assert_eq!(GameOverReport::essence_for(3), Some(1));
        assert_eq!(GameOverReport::essence_for(10), Some(2));
        assert_eq!(GameOverReport::essence_for(212), Some(42));
    }

    #[test]
    fn test_tick_determinism() {
        let rules = RunRules::default();
        let seed: u64 = rand::random();
        let mut state1 = running(seed, &rules);
        let mut state2 = running(seed, &rules);

        for t in 0..300u32 {
            if t % 7 == 0 {
                let dir = Direction::ALL[(t as usize / 7) % 4];
                state1.snake.queue_turn(dir);
                state2.snake.queue_turn(dir);
            }
            tick(&mut state1, &rules);
            tick(&mut state2, &rules);
        }

        assert_eq!(state1.tick, state2.tick);
        assert_eq!(state1.compute_hash(), state2.compute_hash());
    }

    #[test]
    fn test_replay_matches_live_run() {
        let rules = RunRules::default();
        let meta = meta_with("food_bonus", 2);
        let mut recording = RunRecording::new([9; 16], 4242, meta.clone());
        let mut state = start_run([9; 16], 4242, &meta, &rules);

        for t in 1..=400u32 {
            if t % 5 == 0 {
                let dir = Direction::ALL[(t as usize * 3) % 4];
                recording.record_intent(t, dir);
                state.snake.queue_turn(dir);
            }
            let result = tick(&mut state, &rules);
            recording.record_tick(t);
            if result.relic_offer.is_some() {
                recording.record_decision(t, RelicDecision::Claim(1));
                relic::claim_offer(&mut state, 1, rules.status_ms).unwrap();
            }
            if result.game_over.is_some() {
                break;
            }
        }

        let (replayed, _) = replay_run(&recording, &rules).unwrap();
        assert_eq!(replayed.compute_hash(), state.compute_hash());
        assert_eq!(replayed.score, state.score);
    }

    proptest! {
        #[test]
        fn prop_length_changes_only_by_growth(
            seed in any::<u64>(),
            turns in proptest::collection::vec(proptest::option::of(0u8..4), 1..250),
        ) {
            let rules = quiet_rules();
            let mut state = running(seed, &rules);

            for turn in turns {
                if let Some(dir) = turn.and_then(Direction::from_index) {
                    state.snake.queue_turn(dir);
                }
                let before_len = state.snake.len();
                let before_food = state.food;

                let result = tick(&mut state, &rules);
                if result.game_over.is_some() {
                    prop_assert_eq!(state.snake.len(), before_len);
                    break;
                }

                let grew = result.events.iter().any(|e| matches!(e.data, GameEventData::FoodEaten { .. }));
                if grew {
                    prop_assert_eq!(state.snake.len(), before_len + 1);
                    prop_assert_eq!(state.snake.head(), before_food);
                } else {
                    prop_assert_eq!(state.snake.len(), before_len);
                }

                let unique: BTreeSet<_> = state.snake.body.iter().collect();
                prop_assert_eq!(unique.len(), state.snake.len());

                for h in &result.snapshot.hazards {
                    prop_assert!(h.expires_at_ms > h.spawned_at_ms);
                    prop_assert!(h.expires_at_ms > result.snapshot.now_ms);
                }
            }
        }

        #[test]
        fn prop_reversal_is_discarded(
            seed in any::<u64>(),
            turns in proptest::collection::vec(0u8..4, 1..100),
        ) {
            let rules = quiet_rules();
            let mut state = running(seed, &rules);

            for turn in turns {
                let Some(dir) = Direction::from_index(turn) else { continue };
                state.snake.queue_turn(dir);
                tick(&mut state, &rules);
                if state.phase != RunPhase::Running {
                    break;
                }

                let heading = state.snake.direction;
                prop_assert!(!state.snake.queue_turn(heading.opposite()));
                prop_assert_eq!(state.snake.pending, None);
                tick(&mut state, &rules);
                if state.is_over() {
                    break;
                }
                prop_assert_eq!(state.snake.direction, heading);
            }
        }
    }
}
