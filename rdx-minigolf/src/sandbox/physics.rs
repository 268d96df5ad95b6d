//! A tiny point-mass physics world with a flat fairway and a cup.

use crate::common::{horizontal_distance, lock, Aabb, BodyId, Vec3};
use crate::interfaces::{
    BodyDesc, BodyState, PhysicsWorld, WorldCapabilities, WorldHandle, REQUIRED_OPERATIONS,
};
use anyhow::{anyhow, ensure};
use async_trait::async_trait;
use slotmap::SlotMap;
use std::sync::Mutex;
use tracing::{debug, trace, warn};

pub const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);
/// Horizontal deceleration of a rolling ball, in units per second squared.
pub const ROLLING_FRICTION: f32 = 2.0;
pub const CUP_OPENING: f32 = 0.2;
pub const CUP_DEPTH: f32 = 0.3;
const RESTITUTION: f32 = 0.3;
const MIN_BOUNCE_SPEED: f32 = 1.0;
// A body further than this under the floor has fallen past it.
const FLOOR_SNAP: f32 = 0.5;

/// The walkable surface of the loaded hole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundPlan {
    pub height: f32,
    pub footprint: Aabb,
    pub cup: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct SimBody {
    state: BodyState,
    radius: f32,
    mass: f32,
    in_cup: bool,
}

impl SimBody {
    fn integrate(&mut self, ground: Option<&GroundPlan>, dt: f32) {
        let s = &mut self.state;
        s.velocity += GRAVITY * dt;
        s.position += s.velocity * dt;

        let Some(ground) = ground else {
            return;
        };
        let over_cup = horizontal_distance(s.position, ground.cup) < CUP_OPENING;
        let floor = if self.in_cup || (over_cup && s.position.y < ground.height + self.radius) {
            self.in_cup = true;
            let reach = (CUP_OPENING - self.radius).max(0.0);
            let offset = Vec3::new(s.position.x - ground.cup.x, 0.0, s.position.z - ground.cup.z);
            if offset.length() > reach {
                let clamped = offset.normalize_or_zero() * reach;
                s.position.x = ground.cup.x + clamped.x;
                s.position.z = ground.cup.z + clamped.z;
                s.velocity.x = 0.0;
                s.velocity.z = 0.0;
            }
            ground.cup.y - CUP_DEPTH + self.radius
        } else if ground.footprint.contains_horizontal(s.position) {
            ground.height + self.radius
        } else {
            return;
        };

        if s.position.y >= floor || s.position.y < floor - FLOOR_SNAP {
            return;
        }
        s.position.y = floor;
        s.velocity.y = if s.velocity.y.abs() < MIN_BOUNCE_SPEED {
            0.0
        } else {
            -s.velocity.y * RESTITUTION
        };

        let rolling = Vec3::new(s.velocity.x, 0.0, s.velocity.z);
        let speed = rolling.length();
        let slowed = (speed - ROLLING_FRICTION * dt).max(0.0);
        let rolling = rolling.normalize_or_zero() * slowed;
        s.velocity.x = rolling.x;
        s.velocity.z = rolling.z;
        if slowed == 0.0 && s.velocity.y == 0.0 {
            s.velocity = Vec3::ZERO;
            s.sleeping = true;
        }
    }
}

struct WorldInner {
    generation: u64,
    bodies: SlotMap<BodyId, SimBody>,
    ground: Option<GroundPlan>,
    disabled: Vec<&'static str>,
    fail_next_reset: bool,
    refuse_bodies: bool,
    debug_draw: bool,
}

/// In-memory `PhysicsWorld`.
pub struct SandboxPhysics {
    inner: Mutex<WorldInner>,
}

impl SandboxPhysics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(WorldInner {
                generation: 1,
                bodies: SlotMap::with_key(),
                ground: None,
                disabled: Vec::new(),
                fail_next_reset: false,
                refuse_bodies: false,
                debug_draw: false,
            }),
        }
    }

    /// Installs (or with `None`, removes) the surface bodies collide with.
    pub fn set_ground(&self, ground: Option<GroundPlan>) {
        lock(&self.inner).ground = ground;
    }

    pub fn ground(&self) -> Option<GroundPlan> {
        lock(&self.inner).ground
    }

    pub fn generation(&self) -> u64 {
        lock(&self.inner).generation
    }

    pub fn debug_draw(&self) -> bool {
        lock(&self.inner).debug_draw
    }

    /// Makes the next `reset_world` report failure.
    pub fn fail_next_reset(&self) {
        lock(&self.inner).fail_next_reset = true;
    }

    /// Stops reporting one capability: an operation name, `body_list`,
    /// `solver` or `gravity`.
    pub fn disable_capability(&self, capability: &'static str) {
        let mut inner = lock(&self.inner);
        if !inner.disabled.contains(&capability) {
            inner.disabled.push(capability);
        }
    }

    pub fn restore_capabilities(&self) {
        lock(&self.inner).disabled.clear();
    }

    pub fn set_refuse_bodies(&self, refuse: bool) {
        lock(&self.inner).refuse_bodies = refuse;
    }
}

impl Default for SandboxPhysics {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhysicsWorld for SandboxPhysics {
    fn step_simulation(&self, dt: f32) {
        let mut inner = lock(&self.inner);
        let ground = inner.ground;
        for (id, body) in inner.bodies.iter_mut() {
            if body.state.sleeping {
                continue;
            }
            body.integrate(ground.as_ref(), dt);
            trace!(?id, position = ?body.state.position, "body stepped");
        }
    }

    async fn reset_world(&self) -> Option<WorldHandle> {
        let mut inner = lock(&self.inner);
        if inner.fail_next_reset {
            inner.fail_next_reset = false;
            warn!("physics world reset refused");
            return None;
        }
        inner.bodies.clear();
        inner.ground = None;
        inner.debug_draw = false;
        inner.generation += 1;
        debug!(generation = inner.generation, "physics world reset");
        Some(WorldHandle(inner.generation))
    }

    fn add_body(&self, desc: BodyDesc) -> anyhow::Result<BodyId> {
        let mut inner = lock(&self.inner);
        ensure!(!inner.refuse_bodies, "world is not accepting bodies");
        if !desc.position.is_finite() || desc.radius <= 0.0 || desc.mass <= 0.0 {
            return Err(anyhow!("invalid body description: {desc:?}"));
        }
        Ok(inner.bodies.insert(SimBody {
            state: BodyState {
                position: desc.position,
                velocity: Vec3::ZERO,
                sleeping: true,
            },
            radius: desc.radius,
            mass: desc.mass,
            in_cup: false,
        }))
    }

    fn remove_body(&self, id: BodyId) -> bool {
        lock(&self.inner).bodies.remove(id).is_some()
    }

    fn body(&self, id: BodyId) -> Option<BodyState> {
        lock(&self.inner).bodies.get(id).map(|b| b.state)
    }

    fn bodies(&self) -> Vec<(BodyId, BodyState)> {
        lock(&self.inner)
            .bodies
            .iter()
            .map(|(id, b)| (id, b.state))
            .collect()
    }

    fn set_body_state(&self, id: BodyId, position: Vec3, velocity: Vec3) -> bool {
        let mut inner = lock(&self.inner);
        let Some(body) = inner.bodies.get_mut(id) else {
            return false;
        };
        body.state = BodyState {
            position,
            velocity,
            sleeping: velocity == Vec3::ZERO,
        };
        body.in_cup = false;
        true
    }

    fn apply_impulse(&self, id: BodyId, impulse: Vec3) -> bool {
        let mut inner = lock(&self.inner);
        let Some(body) = inner.bodies.get_mut(id) else {
            return false;
        };
        body.state.velocity += impulse / body.mass;
        body.state.sleeping = false;
        true
    }

    fn capabilities(&self) -> WorldCapabilities {
        let inner = lock(&self.inner);
        let has = |name: &str| !inner.disabled.iter().any(|d| *d == name);
        WorldCapabilities {
            operations: REQUIRED_OPERATIONS
                .into_iter()
                .filter(|op| has(op))
                .collect(),
            body_list: has("body_list"),
            solver: has("solver"),
            gravity: has("gravity").then_some(GRAVITY),
        }
    }

    fn set_debug_draw(&self, enabled: bool) {
        lock(&self.inner).debug_draw = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fairway() -> GroundPlan {
        GroundPlan {
            height: 0.0,
            footprint: Aabb::new(Vec3::new(-2.0, -50.0, -1.0), Vec3::new(2.0, 50.0, 10.0)),
            cup: Vec3::new(0.0, 0.0, 8.0),
        }
    }

    fn ball(world: &SandboxPhysics, at: Vec3) -> BodyId {
        world
            .add_body(BodyDesc {
                position: at,
                radius: 0.1,
                mass: 1.0,
            })
            .unwrap()
    }

    fn settle(world: &SandboxPhysics, steps: usize) {
        for _ in 0..steps {
            world.step_simulation(1.0 / 60.0);
        }
    }

    #[test]
    fn test_rolling_ball_comes_to_rest() {
        let world = SandboxPhysics::new();
        world.set_ground(Some(fairway()));
        let id = ball(&world, Vec3::new(0.0, 0.1, 0.0));
        world.apply_impulse(id, Vec3::new(0.0, 0.0, 2.0));

        settle(&world, 120);
        let state = world.body(id).unwrap();
        assert!(state.sleeping);
        assert!((state.position.y - 0.1).abs() < 1e-4);
        assert!(state.position.z > 0.9 && state.position.z < 1.1);
    }

    #[test]
    fn test_ball_drops_into_cup() {
        let world = SandboxPhysics::new();
        world.set_ground(Some(fairway()));
        let id = ball(&world, Vec3::new(0.0, 0.1, 7.0));
        world.apply_impulse(id, Vec3::new(0.0, 0.0, 2.0));

        settle(&world, 240);
        let state = world.body(id).unwrap();
        assert!(state.position.y < 0.0);
        assert!(horizontal_distance(state.position, fairway().cup) < CUP_OPENING);
    }

    #[test]
    fn test_ball_off_the_fairway_falls() {
        let world = SandboxPhysics::new();
        world.set_ground(Some(fairway()));
        let id = ball(&world, Vec3::new(1.9, 0.1, 0.0));
        world.apply_impulse(id, Vec3::new(4.0, 0.0, 0.0));

        settle(&world, 120);
        assert!(world.body(id).unwrap().position.y < -5.0);
    }

    #[tokio::test]
    async fn test_reset_clears_world() {
        let world = SandboxPhysics::new();
        world.set_ground(Some(fairway()));
        world.set_debug_draw(true);
        let id = ball(&world, Vec3::ZERO);

        let handle = world.reset_world().await.unwrap();
        assert_eq!(handle, WorldHandle(2));
        assert!(world.body(id).is_none());
        assert!(world.ground().is_none());
        assert!(!world.debug_draw());

        world.fail_next_reset();
        assert!(world.reset_world().await.is_none());
        assert!(world.reset_world().await.is_some());
    }

    #[test]
    fn test_disabled_capability_reported() {
        let world = SandboxPhysics::new();
        assert_eq!(world.capabilities().missing_capability(), None);
        world.disable_capability("add_body");
        assert_eq!(world.capabilities().missing_capability(), Some("add_body"));
        world.restore_capabilities();
        world.disable_capability("gravity");
        assert_eq!(world.capabilities().missing_capability(), Some("gravity"));
    }
}
