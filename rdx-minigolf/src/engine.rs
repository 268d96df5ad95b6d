//! The assembled game: every component wired to one bus and driven by one tick.

use crate::bus::{EventBus, Subscription};
use crate::common::{lock, DebugFlags, DebugSettings, InputGate, Vec3};
use crate::components::ball::BallLifecycle;
use crate::components::completion::{CompletionOutcome, GracePeriod, HoleCompletionTracker};
use crate::components::hazard::HazardDetector;
use crate::components::transition::{
    CancelHandle, HoleTransitionCoordinator, TransitionDeps, TransitionError,
};
use crate::config::GameConfig;
use crate::events::EventKind;
use crate::feedback::{wire_audio, wire_ui};
use crate::interfaces::{
    AudioCues, CourseLoader, CourseQuery, HazardZone, PhysicsWorld, SceneGraph, UiNotifier,
};
use crate::sandbox::{SandboxCourse, SandboxPhysics, SandboxScene, TracingAudio, TracingUi};
use crate::scoring::{wire_penalties, ScoreCard, Scorer};
use crate::state::{GameState, GameStateMachine};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// The outside world as the core sees it.
#[derive(Clone)]
pub struct Collaborators {
    pub physics: Arc<dyn PhysicsWorld>,
    pub course: Arc<dyn CourseQuery>,
    pub loader: Arc<dyn CourseLoader>,
    pub scene: Arc<dyn SceneGraph>,
    pub ui: Arc<dyn UiNotifier>,
    pub audio: Arc<dyn AudioCues>,
}

impl Collaborators {
    /// Sandbox physics, course and scene with log-only UI and audio.
    pub fn sandbox(config: &GameConfig) -> Self {
        let physics = Arc::new(SandboxPhysics::new());
        let scene = Arc::new(SandboxScene::new());
        let course = Arc::new(
            SandboxCourse::new(config.course_or_default(), physics.clone()).with_scene(scene.clone()),
        );
        Self {
            physics,
            course: course.clone(),
            loader: course,
            scene,
            ui: Arc::new(TracingUi),
            audio: Arc::new(TracingAudio),
        }
    }
}

/// A running round. Cloning yields another handle to the same game.
#[derive(Clone)]
pub struct Game {
    config: Arc<GameConfig>,
    bus: EventBus,
    state: GameStateMachine,
    scorer: ScoreCard,
    ball: BallLifecycle,
    hazards: HazardDetector,
    completion: HoleCompletionTracker,
    coordinator: HoleTransitionCoordinator,
    physics: Arc<dyn PhysicsWorld>,
    course: Arc<dyn CourseQuery>,
    input: InputGate,
    debug: DebugFlags,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl Game {
    pub fn new(config: GameConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            physics,
            course,
            loader,
            scene,
            ui,
            audio,
        } = collaborators;

        let bus = EventBus::new(config.bus.history_capacity);
        let state = GameStateMachine::new(bus.clone(), course.total_holes());
        let scorer = ScoreCard::new();
        let shared_scorer: Arc<dyn Scorer> = Arc::new(scorer.clone());
        let input = InputGate::new(false);
        let debug = DebugFlags::default();
        let grace = GracePeriod::new(config.completion.grace_period());

        let ball = BallLifecycle::new(
            bus.clone(),
            state.clone(),
            physics.clone(),
            course.clone(),
            shared_scorer.clone(),
            config.ball.clone(),
            config.hazards.stroke_penalty,
        );
        let hazards =
            HazardDetector::new(bus.clone(), ball.clone(), course.clone(), config.hazards.clone());
        let coordinator = HoleTransitionCoordinator::new(
            TransitionDeps {
                bus: bus.clone(),
                game_state: state.clone(),
                physics: physics.clone(),
                course: course.clone(),
                loader,
                scene,
                ball: ball.clone(),
                ui: ui.clone(),
                input: input.clone(),
                grace: grace.clone(),
                debug: debug.clone(),
            },
            config.transition.clone(),
        );
        let completion = HoleCompletionTracker::new(
            bus.clone(),
            state.clone(),
            shared_scorer.clone(),
            course.clone(),
            Arc::new(ball.clone()),
            ui.clone(),
            Arc::new(coordinator.clone()),
            input.clone(),
            grace,
            config.completion.clone(),
        );

        // Penalties are counted before the UI reads the stroke total.
        let mut subscriptions = vec![wire_penalties(&bus, shared_scorer.clone())];
        subscriptions.extend(wire_ui(&bus, ui, shared_scorer));
        subscriptions.extend(wire_audio(&bus, audio));
        subscriptions.extend(wire_event_log(&bus, &debug));

        Self {
            config: Arc::new(config),
            bus,
            state,
            scorer,
            ball,
            hazards,
            completion,
            coordinator,
            physics,
            course,
            input,
            debug,
            subscriptions: Arc::new(Mutex::new(subscriptions)),
        }
    }

    /// A game over the sandbox collaborators.
    pub fn sandbox(config: GameConfig) -> Self {
        let collaborators = Collaborators::sandbox(&config);
        Self::new(config, collaborators)
    }

    /// Loads the current hole and hands the player the first shot.
    pub async fn start(&self) -> Result<(), TransitionError> {
        self.scorer.start_hole();
        self.coordinator.run_start().await?;
        info!(
            hole = self.state.current_hole(),
            total = self.state.total_holes(),
            "round started"
        );
        Ok(())
    }

    /// One simulation tick: physics, then ball, then hazards, then the cup.
    pub fn tick(&self, dt: f32) -> CompletionOutcome {
        self.physics.step_simulation(dt);
        self.ball.update(dt);
        self.hazards.update();
        self.completion.check_completion()
    }

    /// Takes a shot if the player currently may.
    pub fn hit(&self, direction: Vec3, power: f32) -> bool {
        if !self.input.is_enabled() {
            debug!("shot ignored: input disabled");
            return false;
        }
        if !self.state.is_in_state(GameState::Aiming) {
            debug!(state = %self.state.state(), "shot ignored: not aiming");
            return false;
        }
        self.ball.hit(direction, power)
    }

    /// Puts the ball back on its last safe spot (or the tee).
    pub fn reset_ball(&self) -> Option<Vec3> {
        if !self.state.state().is_live_play() {
            return None;
        }
        self.ball.reset(None)
    }

    /// Re-runs the transition after a failure left the game on a completed hole.
    pub async fn retry_transition(&self) -> bool {
        if !self.state.is_in_state(GameState::HoleCompleted) {
            warn!(state = %self.state.state(), "nothing to retry");
            return false;
        }
        if !self.completion.try_begin_transition() {
            warn!("a transition is already in flight");
            return false;
        }
        let ok = self.coordinator.transition_to_next_hole().await;
        self.completion.end_transition();
        ok
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.coordinator.cancel_handle()
    }

    pub fn set_debug(&self, update: impl FnOnce(&mut DebugSettings)) {
        self.debug.update(update);
        self.physics
            .set_debug_draw(self.debug.snapshot().physics_debug_draw);
    }

    /// Ticks at `engine.tick_rate_hz` until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let rate = self.config.engine.tick_rate_hz.max(1);
        let period = Duration::from_secs_f64(1.0 / f64::from(rate));
        let dt = period.as_secs_f32();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(rate, "game loop running");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    if let CompletionOutcome::NextHoleScheduled { next_hole } = self.tick(dt) {
                        debug!(next_hole, "transition scheduled");
                    }
                }
            }
        }
        info!("game loop stopped");
        Ok(())
    }

    /// Removes every listener this game registered.
    pub fn shutdown(&self) {
        for sub in lock(&self.subscriptions).drain(..) {
            sub.unsubscribe();
        }
        self.hazards.dispose();
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn state(&self) -> &GameStateMachine {
        &self.state
    }

    pub fn scorer(&self) -> &ScoreCard {
        &self.scorer
    }

    pub fn ball(&self) -> &BallLifecycle {
        &self.ball
    }

    pub fn hazards(&self) -> &HazardDetector {
        &self.hazards
    }

    pub fn completion(&self) -> &HoleCompletionTracker {
        &self.completion
    }

    pub fn coordinator(&self) -> &HoleTransitionCoordinator {
        &self.coordinator
    }

    pub fn course(&self) -> &Arc<dyn CourseQuery> {
        &self.course
    }

    pub fn input(&self) -> &InputGate {
        &self.input
    }

    pub fn debug_flags(&self) -> DebugSettings {
        self.debug.snapshot()
    }

    /// Hazard volumes to draw over the current hole. Empty unless `show_hazards` is on.
    pub fn hazard_overlay(&self) -> Vec<HazardZone> {
        if self.debug.snapshot().show_hazards {
            self.course.hazard_zones()
        } else {
            Vec::new()
        }
    }

    /// Waits for the transition scheduled by the last hole-in, if any.
    pub async fn wait_for_transition(&self) -> Option<bool> {
        self.completion.wait_for_transition().await
    }
}

// Logs every event while `verbose_events` is on.
fn wire_event_log(bus: &EventBus, debug: &DebugFlags) -> Vec<Subscription> {
    EventKind::ALL
        .into_iter()
        .filter(|kind| *kind != EventKind::BallMoved)
        .map(|kind| {
            let debug = debug.clone();
            bus.subscribe(kind, "debug.event_log", move |event| {
                if debug.snapshot().verbose_events {
                    info!(kind = %event.kind(), source = event.source, "{}", event.summary());
                }
                Ok(())
            })
        })
        .collect()
}
