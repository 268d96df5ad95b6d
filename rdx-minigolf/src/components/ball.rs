//! Owns the active ball: creation, resets, shots and per-tick motion tracking.
//!
//! No other component mutates ball state. Readers go through `BallQuery`. Every
//! public operation is a silent no-op when no ball exists.

use crate::bus::EventBus;
use crate::common::{lock, BodyId, Vec3};
use crate::config::BallConfig;
use crate::events::GameEvent;
use crate::interfaces::{BodyDesc, CourseQuery, HazardKind, PhysicsWorld};
use crate::scoring::Scorer;
use crate::state::{GameState, GameStateMachine};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const SOURCE: &str = "ball_lifecycle";
const BALL_MASS: f32 = 1.0;

#[derive(Debug, Error)]
pub enum BallError {
    #[error("no ball exists")]
    NotInitialized,

    #[error("physics world rejected the ball body")]
    Physics(#[source] anyhow::Error),
}

/// The ball's observable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub is_moving: bool,
    /// `None` until the ball has rested somewhere safe on this hole.
    pub last_safe_position: Option<Vec3>,
}

/// Handle to a created ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallHandle {
    pub body: BodyId,
}

/// Read-only access to the ball for other components.
pub trait BallQuery: Send + Sync {
    fn has_ball(&self) -> bool;
    fn ball_state(&self) -> Option<BallState>;

    fn position(&self) -> Option<Vec3> {
        self.ball_state().map(|s| s.position)
    }

    fn is_moving(&self) -> bool {
        self.ball_state().is_some_and(|s| s.is_moving)
    }
}

struct ActiveBall {
    handle: BallHandle,
    state: BallState,
}

/// Manages the lifecycle of the single active ball.
#[derive(Clone)]
pub struct BallLifecycle {
    ball: Arc<Mutex<Option<ActiveBall>>>,
    bus: EventBus,
    game_state: GameStateMachine,
    physics: Arc<dyn PhysicsWorld>,
    course: Arc<dyn CourseQuery>,
    scorer: Arc<dyn Scorer>,
    config: BallConfig,
    stroke_penalty: u32,
}

impl BallLifecycle {
    pub fn new(
        bus: EventBus,
        game_state: GameStateMachine,
        physics: Arc<dyn PhysicsWorld>,
        course: Arc<dyn CourseQuery>,
        scorer: Arc<dyn Scorer>,
        config: BallConfig,
        stroke_penalty: u32,
    ) -> Self {
        Self {
            ball: Arc::new(Mutex::new(None)),
            bus,
            game_state,
            physics,
            course,
            scorer,
            config,
            stroke_penalty,
        }
    }

    /// Creates the ball slightly above `start` and registers it with physics.
    ///
    /// Any previous ball is removed first. Returns `None` (and logs) if the
    /// physics world refuses the body; the component stays usable.
    pub fn create(&self, start: Vec3) -> Option<BallHandle> {
        match self.try_create(start) {
            Ok(handle) => Some(handle),
            Err(e) => {
                error!(error = %e, "ball creation failed");
                None
            }
        }
    }

    fn try_create(&self, start: Vec3) -> Result<BallHandle, BallError> {
        self.remove();
        let spawn = start + Vec3::Y * self.config.spawn_lift;
        let body = self
            .physics
            .add_body(BodyDesc {
                position: spawn,
                radius: self.config.radius,
                mass: BALL_MASS,
            })
            .map_err(BallError::Physics)?;
        let handle = BallHandle { body };
        *lock(&self.ball) = Some(ActiveBall {
            handle,
            state: BallState {
                position: spawn,
                velocity: Vec3::ZERO,
                is_moving: false,
                last_safe_position: None,
            },
        });
        info!(position = ?spawn, "ball created");
        self.bus
            .publish(GameEvent::BallCreated { position: spawn }, SOURCE);
        Ok(handle)
    }

    /// Per-tick update. Run after the physics step.
    pub fn update(&self, _dt: f32) {
        let Some(handle) = self.handle() else {
            return;
        };
        let Some(body) = self.physics.body(handle.body) else {
            warn!("ball body missing from physics world");
            return;
        };

        if body.position.y < self.config.out_of_bounds_height {
            self.recover_out_of_bounds(handle, body.position);
            return;
        }

        let speed = body.velocity.length();
        let moving = !body.sleeping && speed > self.config.motion_threshold;
        let resting_near_ground = !moving
            && body.position.y >= self.config.ground_height
            && body.position.y < self.config.near_ground_height;

        let was_moving = {
            let mut guard = lock(&self.ball);
            let Some(active) = guard.as_mut() else {
                return;
            };
            let was_moving = active.state.is_moving;
            active.state.position = body.position;
            active.state.velocity = body.velocity;
            active.state.is_moving = moving;
            if resting_near_ground {
                active.state.last_safe_position = Some(body.position);
            }
            was_moving
        };

        if moving {
            self.bus.publish(
                GameEvent::BallMoved {
                    position: body.position,
                    velocity: body.velocity,
                },
                SOURCE,
            );
        } else if was_moving {
            debug!(position = ?body.position, "ball stopped");
            self.bus.publish(
                GameEvent::BallStopped {
                    position: body.position,
                },
                SOURCE,
            );
            self.settle_state();
        }
    }

    fn recover_out_of_bounds(&self, handle: BallHandle, position: Vec3) {
        let last_safe = self.last_safe_position();
        let reset_to = last_safe
            .or_else(|| self.course.hole_start_position())
            .unwrap_or(Vec3::Y * self.config.spawn_lift);
        self.physics
            .set_body_state(handle.body, reset_to, Vec3::ZERO);
        if let Some(active) = lock(&self.ball).as_mut() {
            active.state.position = reset_to;
            active.state.velocity = Vec3::ZERO;
            active.state.is_moving = false;
        }
        warn!(?position, ?reset_to, "ball out of bounds");
        self.bus
            .publish(GameEvent::BallOutOfBounds { position, reset_to }, SOURCE);
        self.bus.publish(
            GameEvent::HazardDetected {
                hazard: HazardKind::OutOfBounds,
                penalty: self.stroke_penalty,
                position,
                last_safe_position: last_safe,
            },
            SOURCE,
        );
        self.settle_state();
    }

    /// Applies a shot. Returns `false` without side effects if there is no ball.
    pub fn hit(&self, direction: Vec3, power: f32) -> bool {
        let Some(handle) = self.handle() else {
            return false;
        };
        let aim = direction.normalize_or_zero();
        if aim == Vec3::ZERO {
            warn!(?direction, "ignoring shot with no direction");
            return false;
        }
        let impulse = aim * power.clamp(0.0, 1.0) * self.config.max_hit_impulse;
        if !self.physics.apply_impulse(handle.body, impulse) {
            warn!("physics world rejected the shot impulse");
            return false;
        }
        let stroke = self.scorer.add_stroke();
        let position = {
            let mut guard = lock(&self.ball);
            match guard.as_mut() {
                Some(active) => {
                    active.state.is_moving = true;
                    active.state.position
                }
                None => return false,
            }
        };
        self.game_state.set_state(GameState::BallInMotion);
        info!(stroke, power, "ball hit");
        self.bus.publish(
            GameEvent::BallHit {
                direction,
                power,
                position,
                stroke,
            },
            SOURCE,
        );
        true
    }

    /// Moves the ball to `position`, else the last safe spot, else the hole start.
    pub fn reset(&self, position: Option<Vec3>) -> Option<Vec3> {
        let handle = self.handle()?;
        let target = position
            .or_else(|| self.last_safe_position())
            .or_else(|| self.course.hole_start_position());
        let Some(target) = target else {
            warn!("no reset position available");
            return None;
        };
        self.physics.set_body_state(handle.body, target, Vec3::ZERO);
        if let Some(active) = lock(&self.ball).as_mut() {
            active.state.position = target;
            active.state.velocity = Vec3::ZERO;
            active.state.is_moving = false;
        }
        debug!(position = ?target, "ball reset");
        self.bus
            .publish(GameEvent::BallReset { position: target }, SOURCE);
        self.settle_state();
        Some(target)
    }

    /// Detaches the ball from physics and forgets it.
    pub fn remove(&self) {
        let removed = lock(&self.ball).take();
        if let Some(active) = removed {
            self.physics.remove_body(active.handle.body);
            debug!("ball removed");
        }
    }

    pub fn handle(&self) -> Option<BallHandle> {
        lock(&self.ball).as_ref().map(|a| a.handle)
    }

    pub fn last_safe_position(&self) -> Option<Vec3> {
        lock(&self.ball)
            .as_ref()
            .and_then(|a| a.state.last_safe_position)
    }

    // A ball that came to rest ends the shot.
    fn settle_state(&self) {
        if self.game_state.is_in_state(GameState::BallInMotion) {
            self.game_state.set_state(GameState::Aiming);
        }
    }
}

impl BallQuery for BallLifecycle {
    fn has_ball(&self) -> bool {
        lock(&self.ball).is_some()
    }

    fn ball_state(&self) -> Option<BallState> {
        lock(&self.ball).as_ref().map(|a| a.state)
    }
}
