//! Decides when the ball is in the cup and what happens next.
//!
//! Two guards keep completion single-shot: the state machine's `hole_completed`
//! flag and this tracker's own `is_transitioning` flag, which is checked and set
//! under one lock and only cleared once the scheduled transition has resolved.

use crate::bus::EventBus;
use crate::common::{horizontal_distance, lock, InputGate};
use crate::components::ball::BallQuery;
use crate::components::transition::CancelHandle;
use crate::config::CompletionConfig;
use crate::events::GameEvent;
use crate::interfaces::{CourseQuery, UiNotifier};
use crate::scoring::Scorer;
use crate::state::{GameState, GameStateMachine};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const SOURCE: &str = "hole_completion";

/// Anything that can move the game to the next hole.
#[async_trait]
pub trait HoleTransitioner: Send + Sync {
    async fn transition_to_next_hole(&self) -> bool;

    /// Token that also aborts a transition still waiting to start.
    fn cancel_handle(&self) -> CancelHandle;
}

/// Suppresses completion checks for a while after a hole is (re)created.
///
/// Shared between the tracker, which reads it, and the coordinator, which
/// re-arms it whenever a hole finishes loading.
#[derive(Debug, Clone)]
pub struct GracePeriod {
    hole_created_at: Arc<Mutex<Instant>>,
    duration: Duration,
}

impl GracePeriod {
    /// Starts armed, as if a hole had just been created.
    pub fn new(duration: Duration) -> Self {
        Self {
            hole_created_at: Arc::new(Mutex::new(Instant::now())),
            duration,
        }
    }

    pub fn rearm(&self) {
        *lock(&self.hole_created_at) = Instant::now();
    }

    pub fn is_active(&self) -> bool {
        self.elapsed() < self.duration
    }

    pub fn elapsed(&self) -> Duration {
        lock(&self.hole_created_at).elapsed()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Result of a completion check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The ball is not (or may not yet be) in the cup.
    NotInHole,
    /// Hole-in confirmed; a transition to `next_hole` is scheduled.
    NextHoleScheduled { next_hole: u32 },
    /// Hole-in confirmed on the last hole.
    CourseComplete,
    /// Hole-in confirmed but no runtime was available to run the transition.
    TransitionUnavailable,
}

#[derive(Default)]
struct TrackerInner {
    is_transitioning: bool,
    pending: Option<JoinHandle<bool>>,
}

/// Confirms hole-ins and hands off to the transition protocol.
#[derive(Clone)]
pub struct HoleCompletionTracker {
    inner: Arc<Mutex<TrackerInner>>,
    bus: EventBus,
    game_state: GameStateMachine,
    scorer: Arc<dyn Scorer>,
    course: Arc<dyn CourseQuery>,
    ball: Arc<dyn BallQuery>,
    ui: Arc<dyn UiNotifier>,
    transitioner: Arc<dyn HoleTransitioner>,
    input: InputGate,
    grace: GracePeriod,
    config: CompletionConfig,
}

impl HoleCompletionTracker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: EventBus,
        game_state: GameStateMachine,
        scorer: Arc<dyn Scorer>,
        course: Arc<dyn CourseQuery>,
        ball: Arc<dyn BallQuery>,
        ui: Arc<dyn UiNotifier>,
        transitioner: Arc<dyn HoleTransitioner>,
        input: InputGate,
        grace: GracePeriod,
        config: CompletionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner::default())),
            bus,
            game_state,
            scorer,
            course,
            ball,
            ui,
            transitioner,
            input,
            grace,
            config,
        }
    }

    /// Per-tick check. `true` when this call confirmed a hole-in.
    pub fn check_ball_in_hole(&self) -> bool {
        self.check_completion() != CompletionOutcome::NotInHole
    }

    /// Like `check_ball_in_hole`, but says what the confirmation led to.
    pub fn check_completion(&self) -> CompletionOutcome {
        if !self.ball_in_cup() {
            return CompletionOutcome::NotInHole;
        }
        {
            let mut inner = lock(&self.inner);
            if inner.is_transitioning {
                return CompletionOutcome::NotInHole;
            }
            inner.is_transitioning = true;
        }
        self.complete_hole()
    }

    fn ball_in_cup(&self) -> bool {
        let Some(ball) = self.ball.ball_state() else {
            return false;
        };
        let Some(cup) = self.course.hole_position() else {
            return false;
        };
        if self.game_state.is_hole_completed()
            || self.is_transitioning()
            || !self.game_state.state().is_live_play()
        {
            return false;
        }
        if self.grace.is_active() {
            return false;
        }

        let near = horizontal_distance(ball.position, cup) < self.config.cup_radius;
        let fallen = ball.position.y < cup.y - self.config.fall_epsilon;
        near && (!ball.is_moving || fallen)
    }

    fn complete_hole(&self) -> CompletionOutcome {
        let progress = self.game_state.progress();
        let hole = progress.current_hole;
        let par = self.course.hole_par(hole);
        info!(hole, "ball in hole");

        self.input.disable();
        self.game_state.set_hole_completed(true);
        let score = self.scorer.complete_hole(hole, par);
        self.bus.publish(
            GameEvent::HoleCompleted {
                hole,
                strokes: score.strokes,
                par,
            },
            SOURCE,
        );
        self.ui
            .update_score(score.strokes, self.scorer.total_strokes());
        let strokes = match score.strokes {
            1 => "1 stroke".to_string(),
            n => format!("{n} strokes"),
        };
        self.schedule_message(format!("{} ({strokes})", score.label()));

        if progress.is_last_hole() {
            self.game_state.set_state(GameState::GameCompleted);
            self.ui.show_final_scorecard(&self.scorer.card());
            self.clear_transitioning();
            return CompletionOutcome::CourseComplete;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available; hole transition not scheduled");
            self.clear_transitioning();
            return CompletionOutcome::TransitionUnavailable;
        };
        let tracker = self.clone();
        let delay = self.config.transition_delay();
        let cancel = self.transitioner.cancel_handle();
        // A request made before this hole-in does not carry over.
        cancel.rearm();
        let handle = runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                true = cancel.cancelled() => {
                    info!("scheduled hole transition cancelled");
                    tracker.clear_transitioning();
                    return false;
                }
            }
            let ok = tracker.transitioner.transition_to_next_hole().await;
            if !ok {
                warn!("hole transition failed; staying on completed hole");
            }
            tracker.clear_transitioning();
            ok
        });
        lock(&self.inner).pending = Some(handle);
        CompletionOutcome::NextHoleScheduled {
            next_hole: hole + 1,
        }
    }

    fn schedule_message(&self, text: String) {
        let ui = self.ui.clone();
        let delay = self.config.message_delay();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    ui.show_message(&text);
                });
            }
            Err(_) => ui.show_message(&text),
        }
    }

    fn clear_transitioning(&self) {
        lock(&self.inner).is_transitioning = false;
        debug!("transition guard cleared");
    }

    pub fn is_transitioning(&self) -> bool {
        lock(&self.inner).is_transitioning
    }

    /// Re-arms the anti-false-positive window for a freshly loaded hole.
    pub fn reset_grace_period(&self) {
        self.grace.rearm();
    }

    pub fn grace_period(&self) -> &GracePeriod {
        &self.grace
    }

    /// Waits for the scheduled transition, if any. `None` when nothing was pending.
    pub async fn wait_for_transition(&self) -> Option<bool> {
        let pending = lock(&self.inner).pending.take()?;
        match pending.await {
            Ok(ok) => Some(ok),
            Err(e) => {
                warn!(error = %e, "transition task did not finish");
                self.clear_transitioning();
                Some(false)
            }
        }
    }

    /// Claims the guard for an externally started transition (e.g. a retry).
    pub(crate) fn try_begin_transition(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.is_transitioning {
            return false;
        }
        inner.is_transitioning = true;
        true
    }

    pub(crate) fn end_transition(&self) {
        self.clear_transitioning();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ball::BallState;
    use crate::common::{Aabb, Vec3};
    use crate::events::{Event, EventKind};
    use crate::interfaces::{HazardZone, NoUi};
    use crate::scoring::{HoleScore, ScoreCard};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCourse {
        cup: Vec3,
    }

    impl CourseQuery for FixedCourse {
        fn total_holes(&self) -> u32 {
            9
        }
        fn current_hole(&self) -> Option<u32> {
            Some(1)
        }
        fn hole_position(&self) -> Option<Vec3> {
            Some(self.cup)
        }
        fn hole_start_position(&self) -> Option<Vec3> {
            Some(Vec3::ZERO)
        }
        fn hole_par(&self, _hole: u32) -> u32 {
            3
        }
        fn hole_bounds(&self) -> Option<Aabb> {
            None
        }
        fn hazard_zones(&self) -> Vec<HazardZone> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct FakeBall {
        state: Mutex<Option<BallState>>,
    }

    impl FakeBall {
        fn place(&self, position: Vec3, is_moving: bool) {
            *self.state.lock().unwrap() = Some(BallState {
                position,
                velocity: Vec3::ZERO,
                is_moving,
                last_safe_position: None,
            });
        }
    }

    impl BallQuery for FakeBall {
        fn has_ball(&self) -> bool {
            self.state.lock().unwrap().is_some()
        }
        fn ball_state(&self) -> Option<BallState> {
            *self.state.lock().unwrap()
        }
    }

    #[derive(Default)]
    struct CountingTransitioner {
        calls: AtomicUsize,
        cancel: CancelHandle,
    }

    #[async_trait]
    impl HoleTransitioner for CountingTransitioner {
        async fn transition_to_next_hole(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn cancel_handle(&self) -> CancelHandle {
            self.cancel.clone()
        }
    }

    #[derive(Default)]
    struct MessageUi {
        messages: Mutex<Vec<String>>,
    }

    impl UiNotifier for MessageUi {
        fn update_hole_info(&self, _hole: u32, _total_holes: u32, _par: u32) {}
        fn update_score(&self, _strokes: u32, _total_strokes: u32) {}
        fn show_message(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }
        fn show_final_scorecard(&self, _card: &[HoleScore]) {}
    }

    struct Rig {
        bus: EventBus,
        state: GameStateMachine,
        scorer: ScoreCard,
        ball: Arc<FakeBall>,
        transitioner: Arc<CountingTransitioner>,
        tracker: HoleCompletionTracker,
    }

    fn rig(total_holes: u32) -> Rig {
        rig_with_ui(total_holes, Arc::new(NoUi))
    }

    fn rig_with_ui(total_holes: u32, ui: Arc<dyn UiNotifier>) -> Rig {
        let bus = EventBus::new(64);
        let state = GameStateMachine::new(bus.clone(), total_holes);
        state.set_state(GameState::Aiming);
        let ball = Arc::new(FakeBall::default());
        let transitioner = Arc::new(CountingTransitioner::default());
        let config = CompletionConfig::default();
        let scorer = ScoreCard::new();
        let tracker = HoleCompletionTracker::new(
            bus.clone(),
            state.clone(),
            Arc::new(scorer.clone()),
            Arc::new(FixedCourse {
                cup: Vec3::new(0.0, 0.0, 5.0),
            }),
            ball.clone(),
            ui,
            transitioner.clone(),
            InputGate::new(true),
            GracePeriod::new(config.grace_period()),
            config,
        );
        Rig {
            bus,
            state,
            scorer,
            ball,
            transitioner,
            tracker,
        }
    }

    fn completions(bus: &EventBus) -> usize {
        bus.history()
            .iter()
            .filter(|e: &&Event| e.kind() == EventKind::HoleCompleted)
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_blocks_detection() {
        let r = rig(9);
        r.ball.place(Vec3::new(0.0, 0.1, 5.0), false);
        assert!(!r.tracker.check_ball_in_hole());

        tokio::time::advance(Duration::from_millis(1400)).await;
        assert!(!r.tracker.check_ball_in_hole());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(r.tracker.check_ball_in_hole());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_grace_period_rearms_window() {
        let r = rig(9);
        tokio::time::advance(Duration::from_secs(5)).await;
        r.tracker.reset_grace_period();
        r.ball.place(Vec3::new(0.0, 0.1, 5.0), false);
        assert!(!r.tracker.check_ball_in_hole());
    }

    #[tokio::test(start_paused = true)]
    async fn test_moving_ball_needs_to_fall_below_surface() {
        let r = rig(9);
        tokio::time::advance(Duration::from_secs(2)).await;

        r.ball.place(Vec3::new(0.1, 0.1, 5.0), true);
        assert!(!r.tracker.check_ball_in_hole(), "rolling over the cup");

        r.ball.place(Vec3::new(0.1, -0.1, 5.0), true);
        assert!(r.tracker.check_ball_in_hole(), "dropping into the cup");
    }

    #[tokio::test(start_paused = true)]
    async fn test_far_ball_never_counts() {
        let r = rig(9);
        tokio::time::advance(Duration::from_secs(2)).await;
        r.ball.place(Vec3::new(1.0, -1.0, 5.0), false);
        assert!(!r.tracker.check_ball_in_hole());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_confirmation_is_a_noop() {
        let r = rig(9);
        tokio::time::advance(Duration::from_secs(2)).await;
        r.ball.place(Vec3::new(0.0, 0.1, 5.0), false);

        assert!(r.tracker.check_ball_in_hole());
        assert!(r.tracker.is_transitioning());
        assert!(!r.tracker.check_ball_in_hole());
        assert_eq!(completions(&r.bus), 1);

        assert_eq!(r.tracker.wait_for_transition().await, Some(true));
        assert_eq!(r.transitioner.calls.load(Ordering::SeqCst), 1);
        assert!(!r.tracker.is_transitioning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_transition_delay() {
        let r = rig(9);
        tokio::time::advance(Duration::from_secs(2)).await;
        r.ball.place(Vec3::new(0.0, 0.1, 5.0), false);

        assert!(r.tracker.check_ball_in_hole());
        tokio::time::advance(Duration::from_millis(500)).await;
        r.transitioner.cancel.cancel();

        assert_eq!(r.tracker.wait_for_transition().await, Some(false));
        assert_eq!(r.transitioner.calls.load(Ordering::SeqCst), 0);
        assert!(!r.tracker.is_transitioning());
        assert!(r.state.is_in_state(GameState::HoleCompleted));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_cancel_does_not_block_next_hole() {
        let r = rig(9);
        r.transitioner.cancel.cancel();
        tokio::time::advance(Duration::from_secs(2)).await;
        r.ball.place(Vec3::new(0.0, 0.1, 5.0), false);

        assert!(r.tracker.check_ball_in_hole());
        assert_eq!(r.tracker.wait_for_transition().await, Some(true));
        assert_eq!(r.transitioner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_message_counts_strokes() {
        let ui = Arc::new(MessageUi::default());
        let r = rig_with_ui(9, ui.clone());
        tokio::time::advance(Duration::from_secs(2)).await;
        r.scorer.add_stroke();
        r.scorer.add_stroke();
        r.ball.place(Vec3::new(0.0, 0.1, 5.0), false);

        assert!(r.tracker.check_ball_in_hole());
        r.tracker.wait_for_transition().await;
        assert_eq!(*ui.messages.lock().unwrap(), vec!["Birdie (2 strokes)".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_hole_completes_game_without_transition() {
        let r = rig(1);
        tokio::time::advance(Duration::from_secs(2)).await;
        r.ball.place(Vec3::new(0.0, 0.1, 5.0), false);

        assert!(r.tracker.check_ball_in_hole());
        assert!(r.state.is_in_state(GameState::GameCompleted));
        assert!(!r.tracker.is_transitioning());
        assert_eq!(r.tracker.wait_for_transition().await, None);
        assert_eq!(r.transitioner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ball_returns_false() {
        let r = rig(9);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!r.tracker.check_ball_in_hole());
    }
}
