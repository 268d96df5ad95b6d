//! Course layout served from a `CourseConfig`.

use crate::common::{lock, Aabb, Vec3};
use crate::config::{CourseConfig, HoleConfig};
use crate::interfaces::{CourseLoader, CourseQuery, HazardZone, SceneObjectKind};
use crate::sandbox::physics::{GroundPlan, SandboxPhysics};
use crate::sandbox::scene::SandboxScene;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A deliberate failure for one hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseFault {
    /// `create_course` answers `Ok(false)`.
    Refuse,
    /// `create_course` answers with an error.
    Error,
}

/// Builds holes from a layout into a `SandboxPhysics` world.
pub struct SandboxCourse {
    layout: CourseConfig,
    physics: Arc<SandboxPhysics>,
    scene: Option<Arc<SandboxScene>>,
    current: Mutex<Option<u32>>,
    faults: Mutex<HashMap<u32, CourseFault>>,
}

impl SandboxCourse {
    pub fn new(layout: CourseConfig, physics: Arc<SandboxPhysics>) -> Self {
        Self {
            layout,
            physics,
            scene: None,
            current: Mutex::new(None),
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Also spawns hole geometry into `scene` whenever a hole is built.
    pub fn with_scene(mut self, scene: Arc<SandboxScene>) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn inject_fault(&self, hole: u32, fault: CourseFault) {
        lock(&self.faults).insert(hole, fault);
    }

    pub fn clear_faults(&self) {
        lock(&self.faults).clear();
    }

    fn hole(&self, hole: u32) -> Option<&HoleConfig> {
        let index = usize::try_from(hole).ok()?.checked_sub(1)?;
        self.layout.holes.get(index)
    }

    fn current_layout(&self) -> Option<&HoleConfig> {
        let hole = (*lock(&self.current))?;
        self.hole(hole)
    }
}

impl CourseQuery for SandboxCourse {
    fn total_holes(&self) -> u32 {
        u32::try_from(self.layout.holes.len()).unwrap_or(u32::MAX)
    }

    fn current_hole(&self) -> Option<u32> {
        *lock(&self.current)
    }

    fn hole_position(&self) -> Option<Vec3> {
        self.current_layout().map(|h| h.cup)
    }

    fn hole_start_position(&self) -> Option<Vec3> {
        self.current_layout().map(|h| h.start)
    }

    fn hole_par(&self, hole: u32) -> u32 {
        self.hole(hole).map_or(0, |h| h.par)
    }

    fn hole_bounds(&self) -> Option<Aabb> {
        self.current_layout().map(HoleConfig::bounds)
    }

    fn hazard_zones(&self) -> Vec<HazardZone> {
        self.current_layout()
            .map(|h| {
                h.hazards
                    .iter()
                    .map(|z| HazardZone {
                        kind: z.kind,
                        volume: Aabb::new(z.min, z.max),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl CourseLoader for SandboxCourse {
    async fn create_course(&self, hole: u32) -> anyhow::Result<bool> {
        let fault = lock(&self.faults).get(&hole).copied();
        match fault {
            Some(CourseFault::Refuse) => return Ok(false),
            Some(CourseFault::Error) => {
                return Err(anyhow!("geometry for hole {hole} failed to build"))
            }
            None => {}
        }
        let layout = self
            .hole(hole)
            .ok_or_else(|| anyhow!("course '{}' has no hole {hole}", self.layout.name))?;

        self.physics.set_ground(Some(GroundPlan {
            height: layout.start.y,
            footprint: layout.bounds(),
            cup: layout.cup,
        }));
        if let Some(scene) = &self.scene {
            scene.spawn(SceneObjectKind::HoleGeometry, format!("hole-{hole}-fairway"));
            scene.spawn(SceneObjectKind::Effect, format!("hole-{hole}-flag"));
            for (i, _) in layout.hazards.iter().enumerate() {
                scene.spawn(SceneObjectKind::HoleGeometry, format!("hole-{hole}-hazard-{i}"));
            }
        }
        *lock(&self.current) = Some(hole);
        info!(hole, par = layout.par, course = %self.layout.name, "hole built");
        Ok(true)
    }

    fn clear_current_hole(&self) {
        if let Some(hole) = lock(&self.current).take() {
            debug!(hole, "hole geometry cleared");
        }
        self.physics.set_ground(None);
    }
}
