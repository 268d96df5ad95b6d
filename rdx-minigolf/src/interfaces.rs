//! Narrow interfaces to the collaborators the core calls into.
//!
//! The core never sees a monolithic game context. Each component receives only
//! the capability sets it needs: physics, course queries, course loading, the
//! render scene, UI and audio. Implementations live outside the core; the
//! `sandbox` module provides in-memory ones.

use crate::common::{Aabb, BodyId, Vec3};
use async_trait::async_trait;
use serde::Deserialize;

/// Opaque token for a physics world instance returned by a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldHandle(pub u64);

/// A body description handed to `PhysicsWorld::add_body`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    pub position: Vec3,
    pub radius: f32,
    pub mass: f32,
}

/// Per-body state exposed by the physics world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub sleeping: bool,
}

/// Operations a physics world must expose before a hole can be built in it.
pub const REQUIRED_OPERATIONS: [&str; 4] = ["step", "add_body", "remove_body", "query_body"];

/// What a physics world reports it can do.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldCapabilities {
    pub operations: Vec<&'static str>,
    pub body_list: bool,
    pub solver: bool,
    pub gravity: Option<Vec3>,
}

impl WorldCapabilities {
    /// Names the first requirement this world fails, if any.
    pub fn missing_capability(&self) -> Option<&'static str> {
        for op in REQUIRED_OPERATIONS {
            if !self.operations.contains(&op) {
                return Some(op);
            }
        }
        if !self.body_list {
            return Some("body_list");
        }
        if !self.solver {
            return Some("solver");
        }
        match self.gravity {
            Some(g) if g.is_finite() => None,
            _ => Some("gravity"),
        }
    }
}

/// The physics simulation collaborator.
#[async_trait]
pub trait PhysicsWorld: Send + Sync {
    fn step_simulation(&self, dt: f32);

    /// Replaces the simulation with a fresh, empty world.
    ///
    /// `None` means the world could not be rebuilt and must not be used.
    async fn reset_world(&self) -> Option<WorldHandle>;

    fn add_body(&self, desc: BodyDesc) -> anyhow::Result<BodyId>;

    fn remove_body(&self, id: BodyId) -> bool;

    fn body(&self, id: BodyId) -> Option<BodyState>;

    fn bodies(&self) -> Vec<(BodyId, BodyState)>;

    fn set_body_state(&self, id: BodyId, position: Vec3, velocity: Vec3) -> bool;

    fn apply_impulse(&self, id: BodyId, impulse: Vec3) -> bool;

    fn capabilities(&self) -> WorldCapabilities;

    fn set_debug_draw(&self, _enabled: bool) {}
}

/// Kinds of hazard a ball can end up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    OutOfBounds,
    Water,
    Lava,
}

/// A hazard volume on the current hole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardZone {
    pub kind: HazardKind,
    pub volume: Aabb,
}

/// Read-only view of the course.
pub trait CourseQuery: Send + Sync {
    fn total_holes(&self) -> u32;

    /// The hole currently built, if any.
    fn current_hole(&self) -> Option<u32>;

    /// Cup center of the current hole.
    fn hole_position(&self) -> Option<Vec3>;

    fn hole_start_position(&self) -> Option<Vec3>;

    fn hole_par(&self, hole: u32) -> u32;

    fn hole_bounds(&self) -> Option<Aabb>;

    fn hazard_zones(&self) -> Vec<HazardZone>;
}

/// Builds and tears down hole geometry.
#[async_trait]
pub trait CourseLoader: Send + Sync {
    /// Builds colliders and geometry for `hole`. `Ok(false)` is a refusal.
    async fn create_course(&self, hole: u32) -> anyhow::Result<bool>;

    fn clear_current_hole(&self);
}

/// Kinds of object the render scene holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneObjectKind {
    Camera,
    Light,
    Starfield,
    Decoration { permanent: bool },
    HoleGeometry,
    Ball,
    Effect,
}

impl SceneObjectKind {
    /// Objects that survive a scene purge between holes.
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            SceneObjectKind::Camera
                | SceneObjectKind::Light
                | SceneObjectKind::Starfield
                | SceneObjectKind::Decoration { permanent: true }
        )
    }
}

/// Persistent objects that must exist after every purge.
pub const REQUIRED_PERSISTENT: [SceneObjectKind; 2] =
    [SceneObjectKind::Camera, SceneObjectKind::Starfield];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneObject {
    pub id: u64,
    pub name: String,
    pub kind: SceneObjectKind,
}

/// The render scene, seen only as a list of objects.
pub trait SceneGraph: Send + Sync {
    fn objects(&self) -> Vec<SceneObject>;

    fn remove_object(&self, id: u64) -> bool;

    fn spawn_persistent(&self, kind: SceneObjectKind) -> u64;
}

/// Fire-and-forget UI notifications.
pub trait UiNotifier: Send + Sync {
    fn update_hole_info(&self, hole: u32, total_holes: u32, par: u32);

    fn update_score(&self, strokes: u32, total_strokes: u32);

    fn show_message(&self, text: &str);

    fn show_final_scorecard(&self, card: &[crate::scoring::HoleScore]);
}

/// Named audio cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    Hit,
    Success,
    OutOfBounds,
}

pub trait AudioCues: Send + Sync {
    fn play(&self, cue: AudioCue);
}

/// UI sink for sessions that run without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUi;

impl UiNotifier for NoUi {
    fn update_hole_info(&self, _hole: u32, _total_holes: u32, _par: u32) {}
    fn update_score(&self, _strokes: u32, _total_strokes: u32) {}
    fn show_message(&self, _text: &str) {}
    fn show_final_scorecard(&self, _card: &[crate::scoring::HoleScore]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoAudio;

impl AudioCues for NoAudio {
    fn play(&self, _cue: AudioCue) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_caps() -> WorldCapabilities {
        WorldCapabilities {
            operations: REQUIRED_OPERATIONS.to_vec(),
            body_list: true,
            solver: true,
            gravity: Some(Vec3::new(0.0, -9.81, 0.0)),
        }
    }

    #[test]
    fn test_full_capabilities_pass() {
        assert_eq!(full_caps().missing_capability(), None);
    }

    #[test]
    fn test_missing_operation_named() {
        let mut caps = full_caps();
        caps.operations.retain(|op| *op != "remove_body");
        assert_eq!(caps.missing_capability(), Some("remove_body"));
    }

    #[test]
    fn test_non_finite_gravity_rejected() {
        let mut caps = full_caps();
        caps.gravity = Some(Vec3::new(0.0, f32::NAN, 0.0));
        assert_eq!(caps.missing_capability(), Some("gravity"));
        caps.gravity = None;
        assert_eq!(caps.missing_capability(), Some("gravity"));
    }

    #[test]
    fn test_persistent_allow_list() {
        assert!(SceneObjectKind::Starfield.is_persistent());
        assert!(SceneObjectKind::Decoration { permanent: true }.is_persistent());
        assert!(!SceneObjectKind::Decoration { permanent: false }.is_persistent());
        assert!(!SceneObjectKind::HoleGeometry.is_persistent());
    }
}
