//! The hole transition protocol.
//!
//! A transition is an ordered list of fallible steps: precondition, unload,
//! physics reset, hole load, state advance, ball creation, input. Any failure
//! before the state advance aborts the whole transition and leaves the game on
//! its last good hole. After the advance the transition is committed and later
//! problems are only logged.

use crate::bus::EventBus;
use crate::common::{lock, DebugFlags, InputGate};
use crate::components::ball::BallLifecycle;
use crate::components::completion::{GracePeriod, HoleTransitioner};
use crate::config::TransitionConfig;
use crate::events::GameEvent;
use crate::interfaces::{
    CourseLoader, CourseQuery, PhysicsWorld, SceneGraph, UiNotifier, WorldHandle,
    REQUIRED_PERSISTENT,
};
use crate::state::{GameState, GameStateMachine};
use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const SOURCE: &str = "hole_transition";

/// The steps of a transition, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStep {
    Precondition,
    Unload,
    ResetPhysics,
    LoadHole,
    AdvanceState,
    CreateBall,
    EnableInput,
}

impl fmt::Display for TransitionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransitionStep::Precondition => "precondition check",
            TransitionStep::Unload => "unload",
            TransitionStep::ResetPhysics => "physics reset",
            TransitionStep::LoadHole => "hole load",
            TransitionStep::AdvanceState => "state advance",
            TransitionStep::CreateBall => "ball creation",
            TransitionStep::EnableInput => "input enable",
        };
        f.write_str(name)
    }
}

/// Why a transition did not happen.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("a hole transition is already in progress")]
    AlreadyInProgress,

    #[error("transition cancelled before {step}")]
    Cancelled { step: TransitionStep },

    #[error("physics world reset returned no world")]
    PhysicsResetFailed,

    #[error("physics world is missing '{capability}' {stage} geometry creation")]
    MissingCapability {
        capability: &'static str,
        stage: &'static str,
    },

    #[error("course refused to build hole {hole}")]
    CourseRejected { hole: u32 },

    #[error("building hole {hole} failed")]
    CourseLoad {
        hole: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl TransitionError {
    /// The step that failed.
    pub fn step(&self) -> TransitionStep {
        match self {
            TransitionError::AlreadyInProgress => TransitionStep::Precondition,
            TransitionError::Cancelled { step } => *step,
            TransitionError::PhysicsResetFailed => TransitionStep::ResetPhysics,
            TransitionError::MissingCapability { .. }
            | TransitionError::CourseRejected { .. }
            | TransitionError::CourseLoad { .. } => TransitionStep::LoadHole,
        }
    }
}

/// What a successful run of the protocol produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The game now plays `hole`.
    Advanced { hole: u32 },
    /// There was no next hole; the game is complete.
    CourseComplete,
}

/// The in-flight transition, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionSession {
    pub from_hole: u32,
    pub to_hole: u32,
    pub started_at: Option<Instant>,
    pub is_active: bool,
}

impl TransitionSession {
    fn inactive() -> Self {
        Self {
            from_hole: 0,
            to_hole: 0,
            started_at: None,
            is_active: false,
        }
    }
}

/// Requests cancellation of a scheduled or in-flight transition.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl CancelHandle {

    /// Takes effect during the delay before a scheduled transition, or at the
    /// next step boundary or pacing delay of a running one. Once the state
    /// advance has committed, the transition runs to the end regardless.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clears an earlier request so the next transition can run.
    pub fn rearm(&self) {
        self.tx.send_replace(false);
    }

    /// Resolves with `true` once cancellation is requested.
    pub async fn cancelled(&self) -> bool {
        let mut rx = self.tx.subscribe();
        let ok = rx.wait_for(|cancelled| *cancelled).await.is_ok();
        ok
    }
}

/// How many scene objects a purge touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: usize,
    pub recreated: usize,
}

/// Everything the coordinator drives.
#[derive(Clone)]
pub struct TransitionDeps {
    pub bus: EventBus,
    pub game_state: GameStateMachine,
    pub physics: Arc<dyn PhysicsWorld>,
    pub course: Arc<dyn CourseQuery>,
    pub loader: Arc<dyn CourseLoader>,
    pub scene: Arc<dyn SceneGraph>,
    pub ball: BallLifecycle,
    pub ui: Arc<dyn UiNotifier>,
    pub input: InputGate,
    pub grace: GracePeriod,
    pub debug: DebugFlags,
}

/// Runs hole transitions one at a time.
#[derive(Clone)]
pub struct HoleTransitionCoordinator {
    deps: TransitionDeps,
    config: TransitionConfig,
    session: Arc<Mutex<TransitionSession>>,
    last_failure: Arc<Mutex<Option<String>>>,
    cancel: CancelHandle,
}

impl HoleTransitionCoordinator {
    pub fn new(deps: TransitionDeps, config: TransitionConfig) -> Self {
        Self {
            deps,
            config,
            session: Arc::new(Mutex::new(TransitionSession::inactive())),
            last_failure: Arc::new(Mutex::new(None)),
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn session(&self) -> TransitionSession {
        *lock(&self.session)
    }

    pub fn is_active(&self) -> bool {
        lock(&self.session).is_active
    }

    /// The reason the most recent transition failed, cleared on success.
    pub fn last_failure(&self) -> Option<String> {
        lock(&self.last_failure).clone()
    }

    /// Moves to the next hole. `false` means the transition did not happen.
    pub async fn transition_to_next_hole(&self) -> bool {
        match self.run_transition().await {
            Ok(TransitionOutcome::Advanced { hole }) => {
                info!(hole, "hole transition complete");
                true
            }
            Ok(TransitionOutcome::CourseComplete) => false,
            Err(e) => {
                let step = e.step();
                error!(%step, "hole transition failed: {:#}", anyhow::Error::from(e));
                false
            }
        }
    }

    /// Loads the current hole from scratch at the start of a round.
    pub async fn start_course(&self) -> bool {
        match self.run_start().await {
            Ok(_) => true,
            Err(e) => {
                let step = e.step();
                error!(%step, "course start failed: {:#}", anyhow::Error::from(e));
                false
            }
        }
    }

    /// The transition protocol with its typed result.
    pub async fn run_transition(&self) -> Result<TransitionOutcome, TransitionError> {
        let progress = self.deps.game_state.progress();
        if progress.is_last_hole() {
            info!(
                hole = progress.current_hole,
                total = progress.total_holes,
                "no hole after this one"
            );
            self.deps.game_state.set_state(GameState::GameCompleted);
            return Ok(TransitionOutcome::CourseComplete);
        }
        let from = progress.current_hole;
        self.with_session(from, from + 1, |this| async move {
            this.run_steps(from + 1, true).await
        })
        .await
    }

    /// The start-of-round load with its typed result.
    pub async fn run_start(&self) -> Result<TransitionOutcome, TransitionError> {
        let hole = self.deps.game_state.current_hole();
        self.with_session(hole, hole, |this| async move {
            this.run_steps(hole, false).await
        })
        .await
    }

    async fn with_session<F, Fut>(
        &self,
        from: u32,
        to: u32,
        body: F,
    ) -> Result<TransitionOutcome, TransitionError>
    where
        F: FnOnce(Self) -> Fut,
        Fut: std::future::Future<Output = Result<TransitionOutcome, TransitionError>>,
    {
        {
            let mut session = lock(&self.session);
            if session.is_active {
                return Err(TransitionError::AlreadyInProgress);
            }
            *session = TransitionSession {
                from_hole: from,
                to_hole: to,
                started_at: Some(Instant::now()),
                is_active: true,
            };
        }
        self.cancel.rearm();
        info!(from, to, "hole transition started");

        let result = body(self.clone()).await;

        *lock(&self.session) = TransitionSession::inactive();
        *lock(&self.last_failure) = result.as_ref().err().map(|e| format!("{e:#}"));
        result
    }

    async fn run_steps(
        &self,
        hole: u32,
        advance: bool,
    ) -> Result<TransitionOutcome, TransitionError> {
        self.checkpoint(TransitionStep::Unload)?;
        let purge = self.unload_current_hole();
        debug!(removed = purge.removed, recreated = purge.recreated, "hole unloaded");

        self.pause(TransitionStep::ResetPhysics).await?;
        let world = self.reset_physics().await?;
        debug!(?world, "physics world reset");

        self.pause(TransitionStep::LoadHole).await?;
        self.load_hole(hole).await?;

        // Committed from here on.
        let hole = if advance {
            let hole = self.deps.game_state.reset_for_next_hole();
            if self.deps.game_state.is_in_state(GameState::GameCompleted) {
                return Ok(TransitionOutcome::CourseComplete);
            }
            hole
        } else {
            self.deps.game_state.set_state(GameState::Aiming);
            hole
        };

        self.spawn_ball();
        self.deps.input.enable();
        self.deps.bus.publish(
            GameEvent::HoleStarted {
                hole,
                par: self.deps.course.hole_par(hole),
            },
            SOURCE,
        );
        Ok(TransitionOutcome::Advanced { hole })
    }

    fn checkpoint(&self, step: TransitionStep) -> Result<(), TransitionError> {
        if self.cancel.is_cancelled() {
            warn!(%step, "transition cancelled");
            return Err(TransitionError::Cancelled { step });
        }
        Ok(())
    }

    // Pacing delay before `step`, raced against cancellation.
    async fn pause(&self, step: TransitionStep) -> Result<(), TransitionError> {
        self.checkpoint(step)?;
        let cancel = self.cancel.clone();
        let cancelled = async move { cancel.cancelled().await };
        tokio::select! {
            _ = tokio::time::sleep(self.config.step_delay()) => Ok(()),
            true = cancelled => {
                warn!(%step, "transition cancelled");
                Err(TransitionError::Cancelled { step })
            }
        }
    }

    /// Step 2: geometry, ball and scene back down to the persistent set.
    pub fn unload_current_hole(&self) -> PurgeReport {
        self.deps.loader.clear_current_hole();
        self.deps.ball.remove();
        self.purge_scene()
    }

    fn purge_scene(&self) -> PurgeReport {
        let scene = &self.deps.scene;
        let mut report = PurgeReport::default();
        for object in scene.objects() {
            if !object.kind.is_persistent() && scene.remove_object(object.id) {
                report.removed += 1;
            }
        }
        let survivors = scene.objects();
        for required in REQUIRED_PERSISTENT {
            if !survivors.iter().any(|o| o.kind == required) {
                warn!(kind = ?required, "persistent scene object missing, recreating");
                scene.spawn_persistent(required);
                report.recreated += 1;
            }
        }
        report
    }

    // Debug flags are not part of the world; the fresh one gets whatever is set now.
    async fn reset_physics(&self) -> Result<WorldHandle, TransitionError> {
        let world = self
            .deps
            .physics
            .reset_world()
            .await
            .ok_or(TransitionError::PhysicsResetFailed)?;
        self.deps
            .physics
            .set_debug_draw(self.deps.debug.snapshot().physics_debug_draw);
        Ok(world)
    }

    fn verify_world(&self, stage: &'static str) -> Result<(), TransitionError> {
        match self.deps.physics.capabilities().missing_capability() {
            Some(capability) => Err(TransitionError::MissingCapability { capability, stage }),
            None => Ok(()),
        }
    }

    /// Step 4: build `hole` into the current physics world.
    pub async fn load_hole(&self, hole: u32) -> Result<(), TransitionError> {
        self.verify_world("before")?;
        match self.deps.loader.create_course(hole).await {
            Ok(true) => {}
            Ok(false) => return Err(TransitionError::CourseRejected { hole }),
            Err(source) => return Err(TransitionError::CourseLoad { hole, source }),
        }
        self.verify_world("after")?;
        self.deps.grace.rearm();
        self.deps.ui.update_hole_info(
            hole,
            self.deps.course.total_holes(),
            self.deps.course.hole_par(hole),
        );
        if self.deps.debug.snapshot().show_hazards {
            for zone in self.deps.course.hazard_zones() {
                info!(hole, kind = ?zone.kind, min = ?zone.volume.min, max = ?zone.volume.max, "hazard zone");
            }
        }
        info!(hole, "hole loaded");
        Ok(())
    }

    fn spawn_ball(&self) {
        let Some(start) = self.deps.course.hole_start_position() else {
            error!("new hole has no start position; continuing without a ball");
            return;
        };
        if self.deps.ball.create(start).is_none() {
            error!("could not create ball on new hole; continuing without a ball");
        }
    }
}

#[async_trait]
impl HoleTransitioner for HoleTransitionCoordinator {
    async fn transition_to_next_hole(&self) -> bool {
        HoleTransitionCoordinator::transition_to_next_hole(self).await
    }

    fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}
