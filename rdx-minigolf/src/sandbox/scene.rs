use crate::common::lock;
use crate::interfaces::{SceneGraph, SceneObject, SceneObjectKind};
use std::sync::Mutex;
use tracing::trace;

#[derive(Default)]
struct SceneInner {
    next_id: u64,
    objects: Vec<SceneObject>,
}

/// A flat list standing in for a render scene.
pub struct SandboxScene {
    inner: Mutex<SceneInner>,
}

impl SandboxScene {
    /// A scene with a camera, a key light and the starfield backdrop.
    pub fn new() -> Self {
        let scene = Self::empty();
        scene.spawn(SceneObjectKind::Camera, "camera");
        scene.spawn(SceneObjectKind::Light, "key-light");
        scene.spawn(SceneObjectKind::Starfield, "starfield");
        scene
    }

    pub fn empty() -> Self {
        Self {
            inner: Mutex::new(SceneInner::default()),
        }
    }

    pub fn spawn(&self, kind: SceneObjectKind, name: impl Into<String>) -> u64 {
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = inner.next_id;
        let name = name.into();
        trace!(id, %name, ?kind, "scene object added");
        inner.objects.push(SceneObject { id, name, kind });
        id
    }
}

impl Default for SandboxScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph for SandboxScene {
    fn objects(&self) -> Vec<SceneObject> {
        lock(&self.inner).objects.clone()
    }

    fn remove_object(&self, id: u64) -> bool {
        let mut inner = lock(&self.inner);
        let before = inner.objects.len();
        inner.objects.retain(|o| o.id != id);
        inner.objects.len() != before
    }

    fn spawn_persistent(&self, kind: SceneObjectKind) -> u64 {
        let name = format!("{kind:?}").to_lowercase();
        self.spawn(kind, name)
    }
}
