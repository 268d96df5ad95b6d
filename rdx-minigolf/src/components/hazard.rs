//! Throttled polling of the ball against course bounds and hazard volumes.

use crate::bus::{EventBus, Subscription};
use crate::common::{lock, Vec3};
use crate::components::ball::{BallLifecycle, BallQuery};
use crate::config::HazardConfig;
use crate::events::{EventKind, GameEvent};
use crate::interfaces::{CourseQuery, HazardKind};
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

const SOURCE: &str = "hazard_detector";

#[derive(Default)]
struct HazardInner {
    tick: u64,
    last_safe: Option<Vec3>,
}

/// Raises penalties when the ball ends up somewhere it must not be.
#[derive(Clone)]
pub struct HazardDetector {
    inner: Arc<Mutex<HazardInner>>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    bus: EventBus,
    ball: BallLifecycle,
    course: Arc<dyn CourseQuery>,
    config: HazardConfig,
}

impl HazardDetector {
    /// Creates the detector and starts tracking safe positions from the bus.
    pub fn new(
        bus: EventBus,
        ball: BallLifecycle,
        course: Arc<dyn CourseQuery>,
        config: HazardConfig,
    ) -> Self {
        let detector = Self {
            inner: Arc::new(Mutex::new(HazardInner::default())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            bus,
            ball,
            course,
            config,
        };
        detector.track_safe_positions();
        detector
    }

    fn track_safe_positions(&self) {
        let mut subs = lock(&self.subscriptions);
        for kind in [EventKind::BallStopped, EventKind::BallCreated] {
            let inner = self.inner.clone();
            let course = self.course.clone();
            let min_height = self.config.min_height;
            subs.push(self.bus.subscribe(kind, "hazard.safe_position", move |event| {
                let position = match event.payload {
                    GameEvent::BallStopped { position } | GameEvent::BallCreated { position } => {
                        position
                    }
                    _ => return Ok(()),
                };
                // A resting spot inside a hazard would loop the ball into penalties.
                if classify(course.as_ref(), min_height, position).is_none() {
                    lock(&inner).last_safe = Some(position);
                    trace!(?position, "safe position recorded");
                }
                Ok(())
            }));
        }
    }

    /// Called every tick; only every Nth call does any work.
    ///
    /// Returns the hazard found, if any.
    pub fn update(&self) -> Option<HazardKind> {
        let last_safe = {
            let mut inner = lock(&self.inner);
            inner.tick += 1;
            if inner.tick % u64::from(self.config.check_interval_ticks.max(1)) != 0 {
                return None;
            }
            inner.last_safe
        };
        let position = self.ball.position()?;
        let hazard = classify(self.course.as_ref(), self.config.min_height, position)?;

        warn!(?hazard, ?position, "hazard detected");
        self.bus.publish(
            GameEvent::HazardDetected {
                hazard,
                penalty: self.config.stroke_penalty,
                position,
                last_safe_position: last_safe,
            },
            SOURCE,
        );
        self.ball.reset(last_safe);
        Some(hazard)
    }

    pub fn last_safe_position(&self) -> Option<Vec3> {
        lock(&self.inner).last_safe
    }

    /// Stops listening to the bus.
    pub fn dispose(&self) {
        for sub in lock(&self.subscriptions).drain(..) {
            sub.unsubscribe();
        }
    }
}

/// Which hazard, if any, `position` lies in on the current hole.
pub fn classify(course: &dyn CourseQuery, min_height: f32, position: Vec3) -> Option<HazardKind> {
    if let Some(zone) = course
        .hazard_zones()
        .into_iter()
        .find(|zone| zone.volume.contains(position))
    {
        return Some(zone.kind);
    }
    if let Some(bounds) = course.hole_bounds() {
        if !bounds.contains_horizontal(position) {
            return Some(HazardKind::OutOfBounds);
        }
    }
    if position.y < min_height {
        return Some(HazardKind::OutOfBounds);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BallConfig, CourseConfig};
    use crate::events::Event;
    use crate::interfaces::{CourseLoader, PhysicsWorld};
    use crate::sandbox::{SandboxCourse, SandboxPhysics};
    use crate::scoring::ScoreCard;
    use crate::state::GameStateMachine;

    struct Rig {
        bus: EventBus,
        physics: Arc<SandboxPhysics>,
        ball: BallLifecycle,
        detector: HazardDetector,
    }

    async fn rig(hole: u32) -> Rig {
        let bus = EventBus::new(64);
        let physics = Arc::new(SandboxPhysics::new());
        let course = Arc::new(SandboxCourse::new(CourseConfig::builtin(), physics.clone()));
        course.create_course(hole).await.unwrap();
        let state = GameStateMachine::new(bus.clone(), 9);
        let ball = BallLifecycle::new(
            bus.clone(),
            state,
            physics.clone(),
            course.clone(),
            Arc::new(ScoreCard::new()),
            BallConfig::default(),
            1,
        );
        let detector = HazardDetector::new(
            bus.clone(),
            ball.clone(),
            course,
            HazardConfig {
                check_interval_ticks: 3,
                ..Default::default()
            },
        );
        Rig {
            bus,
            physics,
            ball,
            detector,
        }
    }

    fn hazards(bus: &EventBus) -> Vec<Event> {
        bus.history()
            .into_iter()
            .filter(|e| e.kind() == EventKind::HazardDetected)
            .collect()
    }

    #[tokio::test]
    async fn test_checks_are_throttled() {
        let r = rig(1).await;
        let handle = r.ball.create(Vec3::ZERO).unwrap();
        r.physics
            .set_body_state(handle.body, Vec3::new(5.0, 0.1, 2.0), Vec3::ZERO);

        assert_eq!(r.detector.update(), None);
        assert_eq!(r.detector.update(), None);
        assert_eq!(r.detector.update(), None, "ball position is only synced on ball update");

        r.ball.update(0.016);
        r.detector.update();
        r.detector.update();
        assert_eq!(r.detector.update(), Some(HazardKind::OutOfBounds));
        assert_eq!(hazards(&r.bus).len(), 1);
    }

    #[tokio::test]
    async fn test_hazard_resets_to_last_safe_position() {
        let r = rig(1).await;
        let handle = r.ball.create(Vec3::ZERO).unwrap();
        let spawn = r.ball.position().unwrap();
        assert_eq!(r.detector.last_safe_position(), Some(spawn));

        r.physics
            .set_body_state(handle.body, Vec3::new(-6.0, 0.1, 2.0), Vec3::ZERO);
        r.ball.update(0.016);
        for _ in 0..3 {
            r.detector.update();
        }
        assert_eq!(r.ball.position(), Some(spawn));
        match hazards(&r.bus)[0].payload {
            GameEvent::HazardDetected {
                penalty,
                last_safe_position,
                ..
            } => {
                assert_eq!(penalty, 1);
                assert_eq!(last_safe_position, Some(spawn));
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_stop_inside_hazard_is_not_a_safe_position() {
        let r = rig(4).await;
        r.ball.create(Vec3::ZERO).unwrap();
        let spawn = r.ball.position().unwrap();
        let water = Vec3::new(1.5, 0.1, 10.5 * 0.5);

        r.bus
            .publish(GameEvent::BallStopped { position: water }, "test");
        assert_eq!(r.detector.last_safe_position(), Some(spawn));

        let dry = Vec3::new(-1.0, 0.1, 3.0);
        r.bus.publish(GameEvent::BallStopped { position: dry }, "test");
        assert_eq!(r.detector.last_safe_position(), Some(dry));
    }

    #[tokio::test]
    async fn test_dispose_stops_tracking() {
        let r = rig(1).await;
        r.detector.dispose();
        r.ball.create(Vec3::ZERO).unwrap();
        assert_eq!(r.detector.last_safe_position(), None);
        assert_eq!(r.bus.subscriber_count(EventKind::BallCreated), 0);
    }
}
