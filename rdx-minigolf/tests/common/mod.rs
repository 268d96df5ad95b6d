#![allow(dead_code)]

use async_trait::async_trait;
use minigolf::common::{Aabb, BodyId, Vec3};
use minigolf::config::{CourseConfig, GameConfig};
use minigolf::engine::{Collaborators, Game};
use minigolf::interfaces::{
    BodyDesc, BodyState, CourseLoader, CourseQuery, HazardZone, NoAudio, PhysicsWorld,
    UiNotifier, WorldCapabilities, WorldHandle,
};
use minigolf::sandbox::{SandboxCourse, SandboxPhysics, SandboxScene};
use minigolf::scoring::HoleScore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Sandbox physics that counts the calls the transition protocol makes.
pub struct RecordingPhysics {
    pub inner: Arc<SandboxPhysics>,
    pub resets: AtomicUsize,
    pub bodies_added: AtomicUsize,
}

impl RecordingPhysics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SandboxPhysics::new()),
            resets: AtomicUsize::new(0),
            bodies_added: AtomicUsize::new(0),
        }
    }

    pub fn bodies_added(&self) -> usize {
        self.bodies_added.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PhysicsWorld for RecordingPhysics {
    fn step_simulation(&self, dt: f32) {
        self.inner.step_simulation(dt)
    }

    async fn reset_world(&self) -> Option<WorldHandle> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.inner.reset_world().await
    }

    fn add_body(&self, desc: BodyDesc) -> anyhow::Result<BodyId> {
        self.bodies_added.fetch_add(1, Ordering::SeqCst);
        self.inner.add_body(desc)
    }

    fn remove_body(&self, id: BodyId) -> bool {
        self.inner.remove_body(id)
    }

    fn body(&self, id: BodyId) -> Option<BodyState> {
        self.inner.body(id)
    }

    fn bodies(&self) -> Vec<(BodyId, BodyState)> {
        self.inner.bodies()
    }

    fn set_body_state(&self, id: BodyId, position: Vec3, velocity: Vec3) -> bool {
        self.inner.set_body_state(id, position, velocity)
    }

    fn apply_impulse(&self, id: BodyId, impulse: Vec3) -> bool {
        self.inner.apply_impulse(id, impulse)
    }

    fn capabilities(&self) -> WorldCapabilities {
        self.inner.capabilities()
    }

    fn set_debug_draw(&self, enabled: bool) {
        self.inner.set_debug_draw(enabled)
    }
}

/// Sandbox course that records every hole it was asked to build.
pub struct RecordingCourse {
    pub inner: SandboxCourse,
    pub loads: Mutex<Vec<u32>>,
}

impl RecordingCourse {
    pub fn loads(&self) -> Vec<u32> {
        self.loads.lock().unwrap().clone()
    }
}

impl CourseQuery for RecordingCourse {
    fn total_holes(&self) -> u32 {
        self.inner.total_holes()
    }

    fn current_hole(&self) -> Option<u32> {
        self.inner.current_hole()
    }

    fn hole_position(&self) -> Option<Vec3> {
        self.inner.hole_position()
    }

    fn hole_start_position(&self) -> Option<Vec3> {
        self.inner.hole_start_position()
    }

    fn hole_par(&self, hole: u32) -> u32 {
        self.inner.hole_par(hole)
    }

    fn hole_bounds(&self) -> Option<Aabb> {
        self.inner.hole_bounds()
    }

    fn hazard_zones(&self) -> Vec<HazardZone> {
        self.inner.hazard_zones()
    }
}

#[async_trait]
impl CourseLoader for RecordingCourse {
    async fn create_course(&self, hole: u32) -> anyhow::Result<bool> {
        self.loads.lock().unwrap().push(hole);
        self.inner.create_course(hole).await
    }

    fn clear_current_hole(&self) {
        self.inner.clear_current_hole()
    }
}

#[derive(Default)]
pub struct RecordingUi {
    pub holes: Mutex<Vec<u32>>,
    pub messages: Mutex<Vec<String>>,
    pub final_card: Mutex<Option<Vec<HoleScore>>>,
}

impl UiNotifier for RecordingUi {
    fn update_hole_info(&self, hole: u32, _total_holes: u32, _par: u32) {
        self.holes.lock().unwrap().push(hole);
    }

    fn update_score(&self, _strokes: u32, _total_strokes: u32) {}

    fn show_message(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }

    fn show_final_scorecard(&self, card: &[HoleScore]) {
        *self.final_card.lock().unwrap() = Some(card.to_vec());
    }
}

pub struct Harness {
    pub game: Game,
    pub physics: Arc<RecordingPhysics>,
    pub course: Arc<RecordingCourse>,
    pub ui: Arc<RecordingUi>,
}

impl Harness {
    pub fn new(total_holes: usize) -> Self {
        let mut layout = CourseConfig::builtin();
        layout.holes.truncate(total_holes);

        let physics = Arc::new(RecordingPhysics::new());
        let course = Arc::new(RecordingCourse {
            inner: SandboxCourse::new(layout, physics.inner.clone()),
            loads: Mutex::new(Vec::new()),
        });
        let ui = Arc::new(RecordingUi::default());
        let game = Game::new(
            GameConfig::default(),
            Collaborators {
                physics: physics.clone(),
                course: course.clone(),
                loader: course.clone(),
                scene: Arc::new(SandboxScene::new()),
                ui: ui.clone(),
                audio: Arc::new(NoAudio),
            },
        );
        Self {
            game,
            physics,
            course,
            ui,
        }
    }

    /// Builds and starts a game, then walks it forward to `hole`.
    pub async fn on_hole(total_holes: usize, hole: u32) -> Self {
        let harness = Self::new(total_holes);
        harness.game.start().await.unwrap();
        while harness.game.state().current_hole() < hole {
            assert!(harness.game.coordinator().transition_to_next_hole().await);
        }
        harness
    }

    /// Drops the ball into the cup, lets the grace period lapse and ticks once.
    pub async fn sink_ball(&self) -> minigolf::components::completion::CompletionOutcome {
        let handle = self.game.ball().handle().expect("ball on the course");
        let cup = self.course.hole_position().expect("hole loaded");
        self.physics
            .set_body_state(handle.body, cup - Vec3::Y * 0.2, Vec3::ZERO);
        tokio::time::advance(self.game.config().completion.grace_period()).await;
        self.game.tick(1.0 / 60.0)
    }
}
