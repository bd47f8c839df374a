//! Run State Definitions
//!
//! The complete mutable world of one run: snake, food, pickups, hazards,
//! timers and counters. Owned by a single `RunSession` and mutated only by
//! `tick()` and by relic claims.

use std::collections::{BTreeSet, VecDeque};
use serde::{Serialize, Deserialize};

use crate::core::grid::{Direction, Position};
use crate::core::rng::DeterministicRng;
use crate::core::hash::{StateHash, compute_state_hash};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::relic::{self, RelicInventory, RelicKind, RunEffects};
use crate::game::tick::RunRules;
use crate::game::upgrade::RunConfig;

// =============================================================================
// SNAKE
// =============================================================================

/// The snake: an ordered body (head first), a heading and a one-slot
/// turn queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnakeState {
    /// Segments, head at index 0
    pub body: VecDeque<Position>,

    /// Current heading
    pub direction: Direction,

    /// Turn to apply at the start of the next tick
    pub pending: Option<Direction>,
}

impl SnakeState {
    /// Single-segment snake at `head`.
    pub fn new(head: Position, direction: Direction) -> Self {
        let mut body = VecDeque::with_capacity(16);
        body.push_back(head);
        Self {
            body,
            direction,
            pending: None,
        }
    }

    /// Head cell.
    #[inline]
    pub fn head(&self) -> Position {
        self.body.front().copied().unwrap_or(Position::ORIGIN)
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty (never true for a live run).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Does any segment sit on `pos`?
    pub fn occupies(&self, pos: Position) -> bool {
        self.body.iter().any(|s| *s == pos)
    }

    /// Queue a turn for the next tick.
    ///
    /// Overwrites any earlier queued turn. A direct reversal of the current
    /// heading is discarded and `false` is returned.
    pub fn queue_turn(&mut self, dir: Direction) -> bool {
        if dir.reverses(self.direction) {
            return false;
        }
        self.pending = Some(dir);
        true
    }

    /// Consume the queued turn, if any.
    pub fn apply_pending(&mut self) {
        if let Some(dir) = self.pending.take() {
            self.direction = dir;
        }
    }

    /// Where the head lands this tick.
    #[inline]
    pub fn next_head(&self, cells: i32) -> Position {
        self.head().step(self.direction, cells)
    }

    /// Would the body block `pos` this tick?
    ///
    /// Without growth the tail vacates its cell during the move, so it is
    /// excluded. With growth the tail stays and still blocks.
    pub fn blocks(&self, pos: Position, will_grow: bool) -> bool {
        let len = self.body.len();
        let checked = if will_grow { len } else { len.saturating_sub(1) };
        self.body.iter().take(checked).any(|s| *s == pos)
    }

    /// Commit a move to `head`.
    pub fn advance(&mut self, head: Position, grow: bool) {
        self.body.push_front(head);
        if !grow {
            self.body.pop_back();
        }
    }

    /// Drop up to `max` tail segments, always keeping the head.
    /// Returns how many were removed.
    pub fn shed_tail(&mut self, max: usize) -> usize {
        let remove = max.min(self.body.len().saturating_sub(1));
        for _ in 0..remove {
            self.body.pop_back();
        }
        remove
    }

    /// Rebuild the snake as a straight line trailing left of `head`.
    pub fn respawn(&mut self, head: Position, length: usize, cells: i32) {
        self.body.clear();
        for i in 0..length.max(1) {
            self.body.push_back(head.offset(-(i as i32), 0, cells));
        }
        self.direction = Direction::Right;
        self.pending = None;
    }

    /// Clamp every segment into a `cells`-sized board.
    pub fn clamp_to(&mut self, cells: i32) {
        for segment in self.body.iter_mut() {
            *segment = segment.clamp_to(cells);
        }
    }
}

// =============================================================================
// PICKUPS
// =============================================================================

/// Kind of board pickup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PickupKind {
    /// Speed surge
    Boost = 0,
    /// Double score
    Multi = 1,
    /// Shed tail segments
    Shrink = 2,
    /// Relic altar, opens a relic offer
    Relic = 3,
}

impl PickupKind {
    /// Kinds the random pickup roll chooses from.
    pub const ROLLABLE: [PickupKind; 3] = [PickupKind::Boost, PickupKind::Multi, PickupKind::Shrink];

    /// Is this the relic altar?
    #[inline]
    pub fn is_relic(self) -> bool {
        self == PickupKind::Relic
    }
}

/// A pickup lying on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pickup {
    /// Cell
    pub position: Position,
    /// Kind
    pub kind: PickupKind,
}

// =============================================================================
// HAZARDS
// =============================================================================

/// Kind of hazard. Both are lethal on contact; they only differ in looks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum HazardKind {
    Spike = 0,
    Rift = 1,
}

/// A time-limited obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hazard {
    /// Cell
    pub position: Position,
    /// Kind
    pub kind: HazardKind,
    /// Simulation time it appeared (ms)
    pub spawned_at_ms: u64,
    /// Removed once `now_ms >= expires_at_ms`
    pub expires_at_ms: u64,
}

impl Hazard {
    /// Has this hazard run out at `now_ms`?
    #[inline]
    pub fn expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

// =============================================================================
// RUN PHASE
// =============================================================================

/// Lifecycle phase of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Default)]
pub enum RunPhase {
    /// No run started yet
    #[default]
    Idle,
    /// Ticking
    Running,
    /// Paused on a relic altar with these choices
    RelicOffer {
        /// Offered relics, in display order
        choices: Vec<RelicKind>,
    },
    /// Terminal until the next start
    GameOver,
}

impl RunPhase {
    /// Short tag for logs and snapshots.
    pub fn tag(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::RelicOffer { .. } => "relic_offer",
            RunPhase::GameOver => "game_over",
        }
    }
}

/// Transient text shown over the board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Text
    pub text: String,
    /// Hidden once `now_ms >= expires_at_ms`
    pub expires_at_ms: u64,
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Complete state of one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    /// Run identifier
    pub run_id: [u8; 16],

    /// Ticks executed this run
    pub tick: u32,

    /// Simulation clock (ms). Advances by the scheduled interval each tick.
    pub now_ms: u64,

    /// Lifecycle phase
    pub phase: RunPhase,

    /// RNG seed (for verification)
    pub rng_seed: u64,

    /// Deterministic RNG state
    pub rng: DeterministicRng,

    /// Active grid dimension (board is `cells` x `cells`)
    pub cells: i32,

    /// Expansions so far
    pub expansions: u32,

    /// Score that triggers the next expansion
    pub next_expansion_score: u32,

    /// The snake
    pub snake: SnakeState,

    /// Food cell
    pub food: Position,

    /// Pickups on the board (at most one relic altar)
    pub pickups: Vec<Pickup>,

    /// Live hazards
    pub hazards: Vec<Hazard>,

    /// Score
    pub score: u32,

    /// Remaining lives (the last one is not spendable)
    pub lives: u32,

    /// Fatal contacts are ignored while `now_ms < invulnerable_until_ms`
    pub invulnerable_until_ms: u64,

    /// MULTI pickup expiry
    pub double_score_until_ms: u64,

    /// BOOST pickup expiry
    pub boost_until_ms: u64,

    /// Interval the scheduler is currently ticking at (ms)
    pub tick_interval_ms: u64,

    /// Base hazard cadence from upgrades (ticks)
    pub hazard_base_interval: u32,

    /// Ticks since the last hazard spawn
    pub hazard_tick_counter: u32,

    /// Per-food bonus from upgrades
    pub permanent_food_bonus: u32,

    /// Accumulated relic effects
    pub effects: RunEffects,

    /// Claimed relics with counts
    pub relics: RelicInventory,

    /// Set every Nth food; cleared once the altar is placed
    pub relic_pending: bool,

    /// Foods eaten this run
    pub foods_eaten: u32,

    /// Current status message, if any
    pub status: Option<StatusMessage>,

    /// Events generated this tick (cleared each tick)
    #[serde(skip)]
    pub pending_events: Vec<GameEvent>,
}

impl GameState {
    /// Create an idle state with the default board.
    pub fn new(run_id: [u8; 16], rng_seed: u64, rules: &RunRules) -> Self {
        Self {
            run_id,
            tick: 0,
            now_ms: 0,
            phase: RunPhase::Idle,
            rng_seed,
            rng: DeterministicRng::new(rng_seed),
            cells: rules.expansion.base_cells,
            expansions: 0,
            next_expansion_score: rules.expansion.first_threshold,
            snake: SnakeState::new(rules.start_head, Direction::Right),
            food: rules.start_food,
            pickups: Vec::new(),
            hazards: Vec::new(),
            score: 0,
            lives: 1,
            invulnerable_until_ms: 0,
            double_score_until_ms: 0,
            boost_until_ms: 0,
            tick_interval_ms: rules.speed.base_interval_ms,
            hazard_base_interval: rules.spawn.hazard_base_interval,
            hazard_tick_counter: 0,
            permanent_food_bonus: 0,
            effects: RunEffects::default(),
            relics: RelicInventory::default(),
            relic_pending: false,
            foods_eaten: 0,
            status: None,
            pending_events: Vec::new(),
        }
    }

    /// Apply the per-run configuration and start ticking.
    ///
    /// A start relic is granted silently before the first tick; it does not
    /// touch the relic-pending flag or pause the run.
    pub fn begin_run(&mut self, run: &RunConfig) {
        self.lives = run.lives.max(1);
        self.permanent_food_bonus = run.permanent_food_bonus;
        self.hazard_base_interval = run.hazard_base_interval;
        self.phase = RunPhase::Running;

        if run.start_relic_granted {
            let picks = relic::offer_choices(&mut self.rng, &self.relics, 1);
            if let Some(kind) = picks.first().copied() {
                relic::grant_relic(self, kind, true);
            }
        }
    }

    /// Is the invulnerability window open?
    #[inline]
    pub fn is_invulnerable(&self) -> bool {
        self.now_ms < self.invulnerable_until_ms
    }

    /// Is double score active?
    #[inline]
    pub fn double_score_active(&self) -> bool {
        self.now_ms < self.double_score_until_ms
    }

    /// Is the speed boost active?
    #[inline]
    pub fn boost_active(&self) -> bool {
        self.now_ms < self.boost_until_ms
    }

    /// Every occupied cell: snake, food, pickups and hazards.
    pub fn occupied_cells(&self) -> BTreeSet<Position> {
        let mut cells: BTreeSet<Position> = self.snake.body.iter().copied().collect();
        cells.insert(self.food);
        cells.extend(self.pickups.iter().map(|p| p.position));
        cells.extend(self.hazards.iter().map(|h| h.position));
        cells
    }

    /// Occupied cells ignoring the snake (used when relocating it).
    pub fn occupied_cells_except_snake(&self) -> BTreeSet<Position> {
        let mut cells: BTreeSet<Position> = BTreeSet::new();
        cells.insert(self.food);
        cells.extend(self.pickups.iter().map(|p| p.position));
        cells.extend(self.hazards.iter().map(|h| h.position));
        cells
    }

    /// Index of the hazard on `pos`, if any.
    pub fn hazard_at(&self, pos: Position) -> Option<usize> {
        self.hazards.iter().position(|h| h.position == pos)
    }

    /// Is a relic altar on the board?
    pub fn has_relic_altar(&self) -> bool {
        self.pickups.iter().any(|p| p.kind.is_relic())
    }

    /// Count of non-relic pickups on the board.
    pub fn regular_pickup_count(&self) -> usize {
        self.pickups.iter().filter(|p| !p.kind.is_relic()).count()
    }

    /// Drop hazards whose time is up. Returns how many were removed.
    pub fn prune_expired_hazards(&mut self) -> usize {
        let now = self.now_ms;
        let before = self.hazards.len();
        self.hazards.retain(|h| !h.expired(now));
        before - self.hazards.len()
    }

    /// Show a status message for `lifetime_ms` of simulation time.
    pub fn flash(&mut self, text: impl Into<String>, lifetime_ms: u64) {
        self.status = Some(StatusMessage {
            text: text.into(),
            expires_at_ms: self.now_ms.saturating_add(lifetime_ms),
        });
    }

    /// Current status text, if it has not expired.
    pub fn status_text(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|s| self.now_ms < s.expires_at_ms)
            .map(|s| s.text.as_str())
    }

    /// Check if the run has ended.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, RunPhase::GameOver)
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng_seed, |hasher| {
            hasher
                .feed(&self.run_id)
                .feed(&phase_code(&self.phase))
                .feed(&self.now_ms)
                .feed(&self.cells)
                .feed(&self.expansions)
                .feed(&self.next_expansion_score);

            hasher
                .feed_all(self.snake.body.iter())
                .feed(&(self.snake.direction as u8))
                .feed(&self.food);

            hasher.feed(&(self.pickups.len() as u32));
            for pickup in &self.pickups {
                hasher.feed(&pickup.position).feed(&(pickup.kind as u8));
            }
            hasher.feed(&(self.hazards.len() as u32));
            for hazard in &self.hazards {
                hasher
                    .feed(&hazard.position)
                    .feed(&(hazard.kind as u8))
                    .feed(&hazard.expires_at_ms);
            }

            hasher
                .feed(&self.score)
                .feed(&self.lives)
                .feed(&self.foods_eaten)
                .feed(&self.invulnerable_until_ms)
                .feed(&self.double_score_until_ms)
                .feed(&self.boost_until_ms)
                .feed(&self.tick_interval_ms)
                .feed(&self.hazard_tick_counter)
                .feed(&self.effects.void_cloak_charges)
                .feed(&self.effects.food_bonus)
                .feed(&self.relic_pending);
            for (kind, count) in self.relics.entries() {
                hasher.feed(&(kind as u8)).feed(&count);
            }

            let [s0, s1] = self.rng.state();
            hasher.feed(&s0).feed(&s1);
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event stamped with the current tick.
    pub fn push_event(&mut self, data: GameEventData) {
        self.pending_events.push(GameEvent::new(self.tick, data));
    }
}

fn phase_code(phase: &RunPhase) -> u8 {
    match phase {
        RunPhase::Idle => 0,
        RunPhase::Running => 1,
        RunPhase::RelicOffer { .. } => 2,
        RunPhase::GameOver => 3,
    }
}

// =============================================================================
// TESTS
// =============================================================================
