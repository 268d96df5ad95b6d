//! Contains common, primitive types shared by every gameplay component.
//!
//! This module defines the key types used to identify subscriptions and physics
//! bodies, plus the two small pieces of shared session state (the input gate and
//! the debug flags) that several components read but none of them own.

use slotmap::new_key_type;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub use glam::Vec3;

new_key_type! {
    /// Uniquely and safely identifies a registration on the `EventBus`.
    ///
    /// Keys are never reused, so a stale id held by a listener that already
    /// unsubscribed can never remove somebody else's registration.
    pub struct SubscriptionId;

    /// Identifies a rigid body inside a physics world.
    pub struct BodyId;
}

/// Gates whether the player may take the next shot.
///
/// Cheap to clone; every clone observes the same flag.
#[derive(Debug, Clone)]
pub struct InputGate {
    enabled: Arc<AtomicBool>,
}

impl InputGate {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Default for InputGate {
    fn default() -> Self {
        Self::new(false)
    }
}

/// A snapshot of the inspection toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugSettings {
    pub physics_debug_draw: bool,
    pub show_hazards: bool,
    pub verbose_events: bool,
}

/// Inspection toggles that live outside gameplay state.
///
/// A hole transition must never reset these; the coordinator snapshots them
/// before tearing a hole down and restores them on every exit path.
#[derive(Debug, Clone, Default)]
pub struct DebugFlags {
    inner: Arc<Mutex<DebugSettings>>,
}

impl DebugFlags {
    pub fn new(settings: DebugSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn snapshot(&self) -> DebugSettings {
        *lock(&self.inner)
    }

    pub fn update(&self, f: impl FnOnce(&mut DebugSettings)) {
        f(&mut lock(&self.inner));
    }
}

/// Locks a mutex, recovering the data if a panicking listener poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Distance between two points ignoring the vertical axis.
pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// True when `p` lies inside the box footprint on the ground plane.
    pub fn contains_horizontal(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_gate_shared_between_clones() {
        let gate = InputGate::new(false);
        let other = gate.clone();
        other.enable();
        assert!(gate.is_enabled());
        gate.disable();
        assert!(!other.is_enabled());
    }

    #[test]
    fn test_aabb_normalizes_corners() {
        let b = Aabb::new(Vec3::new(5.0, 1.0, 5.0), Vec3::new(-5.0, -1.0, -5.0));
        assert!(b.contains(Vec3::ZERO));
        assert!(!b.contains(Vec3::new(0.0, 2.0, 0.0)));
        assert!(b.contains_horizontal(Vec3::new(0.0, 50.0, 0.0)));
    }

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let d = horizontal_distance(Vec3::new(3.0, 10.0, 4.0), Vec3::ZERO);
        assert!((d - 5.0).abs() < 1e-6);
    }
}
