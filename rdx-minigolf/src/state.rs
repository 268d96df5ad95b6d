//! The authoritative game/hole state.
//!
//! Every state change is published as `GameStateChanged`. The hole counter only
//! moves through `reset_for_next_hole`, which refuses to step past the last hole.

use crate::bus::EventBus;
use crate::common::lock;
use crate::events::GameEvent;
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const SOURCE: &str = "game_state";

/// Exactly one of these is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameState {
    Initializing,
    Aiming,
    BallInMotion,
    HoleCompleted,
    GameCompleted,
}

impl GameState {
    /// Only these two states count as live play.
    pub fn is_live_play(&self) -> bool {
        matches!(self, GameState::Aiming | GameState::BallInMotion)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress through the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoleProgress {
    pub current_hole: u32,
    pub total_holes: u32,
    pub hole_completed: bool,
    pub ball_in_motion: bool,
}

impl HoleProgress {
    pub fn is_last_hole(&self) -> bool {
        self.current_hole >= self.total_holes
    }
}

struct StateInner {
    state: GameState,
    progress: HoleProgress,
}

/// Holds the game state. Cloning yields another handle to the same machine.
#[derive(Clone)]
pub struct GameStateMachine {
    inner: Arc<Mutex<StateInner>>,
    bus: EventBus,
}

impl GameStateMachine {
    /// Starts on hole 1 in `Initializing`. `total_holes` is clamped to at least 1.
    pub fn new(bus: EventBus, total_holes: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StateInner {
                state: GameState::Initializing,
                progress: HoleProgress {
                    current_hole: 1,
                    total_holes: total_holes.max(1),
                    hole_completed: false,
                    ball_in_motion: false,
                },
            })),
            bus,
        }
    }

    pub fn state(&self) -> GameState {
        lock(&self.inner).state
    }

    pub fn is_in_state(&self, state: GameState) -> bool {
        self.state() == state
    }

    pub fn progress(&self) -> HoleProgress {
        lock(&self.inner).progress
    }

    pub fn current_hole(&self) -> u32 {
        lock(&self.inner).progress.current_hole
    }

    pub fn total_holes(&self) -> u32 {
        lock(&self.inner).progress.total_holes
    }

    pub fn is_hole_completed(&self) -> bool {
        lock(&self.inner).progress.hole_completed
    }

    /// Overwrites the state and publishes the change.
    ///
    /// Entering `GameCompleted` also publishes `GameCompleted`, every time.
    pub fn set_state(&self, new: GameState) {
        let old = {
            let mut inner = lock(&self.inner);
            let old = inner.state;
            inner.state = new;
            if new == GameState::BallInMotion {
                inner.progress.ball_in_motion = true;
            } else if new == GameState::Aiming {
                inner.progress.ball_in_motion = false;
            }
            old
        };
        debug!(%old, %new, "game state changed");
        self.bus
            .publish(GameEvent::GameStateChanged { old, new }, SOURCE);
        if new == GameState::GameCompleted {
            info!("course complete");
            self.bus.publish(
                GameEvent::GameCompleted {
                    completed_at: Utc::now(),
                },
                SOURCE,
            );
        }
    }

    /// Marks the current hole as (not) completed. Completing enters `HoleCompleted`.
    pub fn set_hole_completed(&self, completed: bool) {
        {
            let mut inner = lock(&self.inner);
            inner.progress.hole_completed = completed;
            if completed {
                inner.progress.ball_in_motion = false;
            }
        }
        if completed {
            self.set_state(GameState::HoleCompleted);
        }
    }

    pub fn set_ball_in_motion(&self, moving: bool) {
        lock(&self.inner).progress.ball_in_motion = moving;
    }

    /// Advances to the next hole and enters `Aiming`.
    ///
    /// If the next hole would lie past the end of the course, the counter is left
    /// alone and the game completes instead. Returns the resulting hole number.
    pub fn reset_for_next_hole(&self) -> u32 {
        let advanced = {
            let mut inner = lock(&self.inner);
            let next = inner.progress.current_hole + 1;
            if next > inner.progress.total_holes {
                None
            } else {
                inner.progress.current_hole = next;
                inner.progress.hole_completed = false;
                inner.progress.ball_in_motion = false;
                Some(next)
            }
        };
        match advanced {
            Some(hole) => {
                info!(hole, "advanced to next hole");
                self.set_state(GameState::Aiming);
                hole
            }
            None => {
                let progress = self.progress();
                warn!(
                    current = progress.current_hole,
                    total = progress.total_holes,
                    "refusing to advance past the last hole"
                );
                self.set_state(GameState::GameCompleted);
                progress.current_hole
            }
        }
    }

    /// Puts the machine back on hole 1 for a new round.
    pub fn restart(&self) {
        {
            let mut inner = lock(&self.inner);
            inner.progress.current_hole = 1;
            inner.progress.hole_completed = false;
            inner.progress.ball_in_motion = false;
        }
        self.set_state(GameState::Initializing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventKind};
    use proptest::prelude::*;

    fn kinds(bus: &EventBus) -> Vec<EventKind> {
        bus.history().iter().map(Event::kind).collect()
    }

    #[test]
    fn test_set_state_publishes_change() {
        let bus = EventBus::new(10);
        let sm = GameStateMachine::new(bus.clone(), 9);
        sm.set_state(GameState::Aiming);

        assert!(sm.is_in_state(GameState::Aiming));
        let history = bus.history();
        assert_eq!(
            history[0].payload,
            GameEvent::GameStateChanged {
                old: GameState::Initializing,
                new: GameState::Aiming
            }
        );
    }

    #[test]
    fn test_game_completed_publishes_completion_each_time() {
        let bus = EventBus::new(10);
        let sm = GameStateMachine::new(bus.clone(), 9);
        sm.set_state(GameState::GameCompleted);
        sm.set_state(GameState::GameCompleted);
        assert_eq!(
            kinds(&bus),
            vec![
                EventKind::GameStateChanged,
                EventKind::GameCompleted,
                EventKind::GameStateChanged,
                EventKind::GameCompleted
            ]
        );
    }

    #[test]
    fn test_hole_completed_enters_state() {
        let bus = EventBus::new(10);
        let sm = GameStateMachine::new(bus, 9);
        sm.set_state(GameState::BallInMotion);
        sm.set_hole_completed(true);
        assert!(sm.is_in_state(GameState::HoleCompleted));
        let progress = sm.progress();
        assert!(progress.hole_completed);
        assert!(!progress.ball_in_motion);
    }

    #[test]
    fn test_reset_for_next_hole_advances() {
        let bus = EventBus::new(10);
        let sm = GameStateMachine::new(bus, 9);
        sm.set_hole_completed(true);
        assert_eq!(sm.reset_for_next_hole(), 2);
        assert_eq!(sm.current_hole(), 2);
        assert!(!sm.is_hole_completed());
        assert!(sm.is_in_state(GameState::Aiming));
    }

    #[test]
    fn test_reset_on_last_hole_completes_game() {
        let bus = EventBus::new(10);
        let sm = GameStateMachine::new(bus.clone(), 1);
        assert_eq!(sm.reset_for_next_hole(), 1);
        assert_eq!(sm.current_hole(), 1);
        assert!(sm.is_in_state(GameState::GameCompleted));
        assert!(kinds(&bus).contains(&EventKind::GameCompleted));
    }

    #[test]
    fn test_live_play_states() {
        assert!(GameState::Aiming.is_live_play());
        assert!(GameState::BallInMotion.is_live_play());
        assert!(!GameState::HoleCompleted.is_live_play());
    }

    proptest! {
        #[test]
        fn prop_hole_never_exceeds_total(total in 1u32..20, advances in 0usize..40) {
            let sm = GameStateMachine::new(EventBus::new(0), total);
            for _ in 0..advances {
                sm.reset_for_next_hole();
                prop_assert!(sm.current_hole() <= total);
            }
            if advances as u32 >= total {
                prop_assert!(sm.is_in_state(GameState::GameCompleted));
                prop_assert_eq!(sm.current_hole(), total);
            }
        }
    }
}
