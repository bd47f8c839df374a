//! Collision & Rescue
//!
//! Detects fatal contact for the next head cell and walks the rescue chain:
//! invulnerability, then void cloak (hazards only), then an extra life.
//! The first remedy that applies wins; remedies never combine.

use crate::core::grid::Position;
use crate::game::events::{ContactKind, GameEventData, RescueKind};
use crate::game::spawn::find_free_cell;
use crate::game::state::GameState;

/// Configuration for rescues.
#[derive(Debug, Clone)]
pub struct RescueConfig {
    /// Invulnerability after a void cloak save (ms)
    pub void_cloak_invuln_ms: u64,
    /// Invulnerability after an extra-life save (ms)
    pub extra_life_invuln_ms: u64,
    /// Segments in the respawned snake
    pub respawn_length: usize,
    /// Soul Anchor clears hazards within this many cells of the respawn
    pub anchor_radius: i32,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            void_cloak_invuln_ms: 2_000,
            extra_life_invuln_ms: 2_500,
            respawn_length: 3,
            anchor_radius: 1,
        }
    }
}

/// How a contact was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Invulnerable; contact ignored
    Ignored,
    /// Void cloak charge spent, hazard removed
    VoidCloak,
    /// Life spent, snake relocated with its head at `at`
    ExtraLife {
        /// New head cell
        at: Position,
    },
    /// No remedy left
    Fatal,
}

/// Fatal contact for a head moving onto `head`, if any.
///
/// Self-collision is checked against the body as it will be after the
/// move: the tail is ignored unless the snake grows this tick.
pub fn detect_contact(state: &GameState, head: Position, will_grow: bool) -> Option<ContactKind> {
    if state.snake.blocks(head, will_grow) {
        Some(ContactKind::SelfCollision)
    } else if state.hazard_at(head).is_some() {
        Some(ContactKind::Hazard)
    } else {
        None
    }
}

/// Apply the rescue chain to one contact.
pub fn resolve_contact(
    state: &mut GameState,
    contact: ContactKind,
    head: Position,
    config: &RescueConfig,
    free_cell_attempts: u32,
    status_ms: u64,
) -> Resolution {
    if state.is_invulnerable() {
        state.push_event(GameEventData::Rescued {
            contact,
            rescue: RescueKind::Invulnerable,
        });
        return Resolution::Ignored;
    }

    if contact == ContactKind::Hazard && state.effects.void_cloak_charges > 0 {
        state.effects.void_cloak_charges -= 1;
        state.invulnerable_until_ms = state.now_ms + config.void_cloak_invuln_ms;
        state.hazards.retain(|h| h.position != head);
        state.flash("Voidcloak absorbed the hit!", status_ms);
        state.push_event(GameEventData::Rescued {
            contact,
            rescue: RescueKind::VoidCloak,
        });
        return Resolution::VoidCloak;
    }

    if state.lives > 1 {
        state.lives -= 1;
        state.invulnerable_until_ms = state.now_ms + config.extra_life_invuln_ms;

        let at = relocation_cell(state, config.respawn_length, free_cell_attempts);
        let cells = state.cells;
        state.snake.respawn(at, config.respawn_length, cells);

        if state.effects.soul_anchor {
            let radius = config.anchor_radius;
            state.hazards.retain(|h| h.position.chebyshev(at) > radius);
        }

        state.flash("Second Heart saved you!", status_ms);
        state.push_event(GameEventData::Rescued {
            contact,
            rescue: RescueKind::ExtraLife,
        });
        return Resolution::ExtraLife { at };
    }

    Resolution::Fatal
}

/// Head cell for a respawned snake whose whole formation lands on free cells.
///
/// The old body is discarded, so only food, pickups and hazards block.
fn relocation_cell(state: &mut GameState, length: usize, attempts: u32) -> Position {
    let occupied = state.occupied_cells_except_snake();
    let cells = state.cells;
    let formation_free = |p: Position| {
        (0..length.max(1) as i32).all(|i| !occupied.contains(&p.offset(-i, 0, cells)))
    };
    find_free_cell(&mut state.rng, cells, attempts, formation_free)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Hazard, HazardKind};
    use crate::game::tick::RunRules;
    use crate::game::upgrade::RunConfig;

    fn state_with_lives(lives: u32) -> GameState {
        let mut state = GameState::new([0; 16], 21, &RunRules::default());
        state.begin_run(&RunConfig {
            lives,
            ..RunConfig::default()
        });
        state.now_ms = 10_000;
        state
    }

    fn hazard_at(pos: Position) -> Hazard {
        Hazard {
            position: pos,
            kind: HazardKind::Rift,
            spawned_at_ms: 0,
            expires_at_ms: 60_000,
        }
    }

    #[test]
    fn test_detects_hazard_and_self() {
        let mut state = state_with_lives(1);
        let target = Position::new(11, 10);
        assert_eq!(detect_contact(&state, target, false), None);

        state.hazards.push(hazard_at(target));
        assert_eq!(detect_contact(&state, target, false), Some(ContactKind::Hazard));

        state.snake.body.push_back(Position::new(11, 10));
        state.snake.body.push_back(Position::new(11, 11));
        assert_eq!(detect_contact(&state, target, false), Some(ContactKind::SelfCollision));
    }

    #[test]
    fn test_invulnerability_first() {
        let mut state = state_with_lives(2);
        state.effects.void_cloak_charges = 1;
        state.invulnerable_until_ms = 10_001;

        let head = Position::new(11, 10);
        state.hazards.push(hazard_at(head));

        let resolution = resolve_contact(&mut state, ContactKind::Hazard, head, &RescueConfig::default(), 200, 2500);
        assert_eq!(resolution, Resolution::Ignored);
        assert_eq!(state.effects.void_cloak_charges, 1);
        assert_eq!(state.lives, 2);
        assert_eq!(state.hazards.len(), 1);
    }

    #[test]
    fn test_void_cloak_only_for_hazards() {
        let mut state = state_with_lives(1);
        state.effects.void_cloak_charges = 2;
        let head = Position::new(11, 10);
        state.hazards.push(hazard_at(head));

        let resolution = resolve_contact(&mut state, ContactKind::Hazard, head, &RescueConfig::default(), 200, 2500);
        assert_eq!(resolution, Resolution::VoidCloak);
        assert_eq!(state.effects.void_cloak_charges, 1);
        assert!(state.hazards.is_empty());
        assert_eq!(state.invulnerable_until_ms, 12_000);

        let mut state = state_with_lives(1);
        state.effects.void_cloak_charges = 2;
        let resolution = resolve_contact(&mut state, ContactKind::SelfCollision, head, &RescueConfig::default(), 200, 2500);
        assert_eq!(resolution, Resolution::Fatal);
        assert_eq!(state.effects.void_cloak_charges, 2);
    }

    #[test]
    fn test_extra_life_relocates() {
        let mut state = state_with_lives(2);
        for x in (4..10).rev() {
            state.snake.body.push_back(Position::new(x, 10));
        }

        let head = Position::new(9, 10);
        let resolution = resolve_contact(&mut state, ContactKind::SelfCollision, head, &RescueConfig::default(), 200, 2500);

        let Resolution::ExtraLife { at } = resolution else {
            panic!("expected extra life, got {resolution:?}");
        };
        assert_eq!(state.lives, 1);
        assert_eq!(state.snake.len(), 3);
        assert_eq!(state.snake.head(), at);
        assert_eq!(state.invulnerable_until_ms, 12_500);
        assert!(state.snake.body.iter().all(|s| *s != state.food));
    }

    #[test]
    fn test_soul_anchor_purges_neighbourhood() {
        let mut state = state_with_lives(2);
        state.effects.soul_anchor = true;

        // Fill the board with hazards except a 3x3 pocket, forcing the respawn there
        let pocket = Position::new(12, 12);
        state.food = Position::new(0, 0);
        for y in 0..state.cells {
            for x in 0..state.cells {
                let p = Position::new(x, y);
                let in_row = y == 12 && (10..=12).contains(&x);
                if !in_row && p != state.food {
                    state.hazards.push(hazard_at(p));
                }
            }
        }

        let resolution = resolve_contact(&mut state, ContactKind::Hazard, Position::new(5, 5), &RescueConfig::default(), 200, 2500);
        assert_eq!(resolution, Resolution::ExtraLife { at: pocket });
        assert!(state.hazards.iter().all(|h| h.position.chebyshev(pocket) > 1));
    }

    #[test]
    fn test_last_life_is_fatal() {
        let mut state = state_with_lives(1);
        let resolution = resolve_contact(&mut state, ContactKind::SelfCollision, Position::new(1, 1), &RescueConfig::default(), 200, 2500);
        assert_eq!(resolution, Resolution::Fatal);
        assert_eq!(state.lives, 1);
    }
}
