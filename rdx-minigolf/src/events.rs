//! Defines all event types published on the `EventBus`.
//!
//! This module acts as the public API for cross-component communication.
//! Listeners subscribe to an `EventKind` and receive the matching `Event`, whose
//! payload is the strongly-typed `GameEvent` variant for that kind.

use crate::common::Vec3;
use crate::interfaces::HazardKind;
use crate::state::GameState;
use chrono::{DateTime, Utc};
use std::fmt;

/// Longest payload summary written to logs.
pub const SUMMARY_LIMIT: usize = 120;

/// The closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    BallCreated,
    BallHit,
    BallMoved,
    BallStopped,
    BallReset,
    BallOutOfBounds,
    HazardDetected,
    HoleStarted,
    HoleCompleted,
    GameStateChanged,
    GameCompleted,
    ErrorOccurred,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::BallCreated,
        EventKind::BallHit,
        EventKind::BallMoved,
        EventKind::BallStopped,
        EventKind::BallReset,
        EventKind::BallOutOfBounds,
        EventKind::HazardDetected,
        EventKind::HoleStarted,
        EventKind::HoleCompleted,
        EventKind::GameStateChanged,
        EventKind::GameCompleted,
        EventKind::ErrorOccurred,
    ];

    /// Kinds whose subscriber failures are re-published as `ErrorOccurred`.
    pub fn reports_listener_errors(&self) -> bool {
        matches!(
            self,
            EventKind::BallHit
                | EventKind::HoleStarted
                | EventKind::HoleCompleted
                | EventKind::GameStateChanged
                | EventKind::GameCompleted
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Event payloads, one variant per `EventKind`.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    BallCreated {
        position: Vec3,
    },
    BallHit {
        direction: Vec3,
        power: f32,
        position: Vec3,
        stroke: u32,
    },
    BallMoved {
        position: Vec3,
        velocity: Vec3,
    },
    BallStopped {
        position: Vec3,
    },
    BallReset {
        position: Vec3,
    },
    BallOutOfBounds {
        position: Vec3,
        reset_to: Vec3,
    },
    HazardDetected {
        hazard: HazardKind,
        penalty: u32,
        position: Vec3,
        last_safe_position: Option<Vec3>,
    },
    HoleStarted {
        hole: u32,
        par: u32,
    },
    HoleCompleted {
        hole: u32,
        strokes: u32,
        par: u32,
    },
    GameStateChanged {
        old: GameState,
        new: GameState,
    },
    GameCompleted {
        completed_at: DateTime<Utc>,
    },
    ErrorOccurred {
        original: EventKind,
        subscriber: String,
        message: String,
    },
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::BallCreated { .. } => EventKind::BallCreated,
            GameEvent::BallHit { .. } => EventKind::BallHit,
            GameEvent::BallMoved { .. } => EventKind::BallMoved,
            GameEvent::BallStopped { .. } => EventKind::BallStopped,
            GameEvent::BallReset { .. } => EventKind::BallReset,
            GameEvent::BallOutOfBounds { .. } => EventKind::BallOutOfBounds,
            GameEvent::HazardDetected { .. } => EventKind::HazardDetected,
            GameEvent::HoleStarted { .. } => EventKind::HoleStarted,
            GameEvent::HoleCompleted { .. } => EventKind::HoleCompleted,
            GameEvent::GameStateChanged { .. } => EventKind::GameStateChanged,
            GameEvent::GameCompleted { .. } => EventKind::GameCompleted,
            GameEvent::ErrorOccurred { .. } => EventKind::ErrorOccurred,
        }
    }
}

/// A published event. Immutable once handed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub payload: GameEvent,
    /// Name of the component that published the event.
    pub source: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(payload: GameEvent, source: &'static str) -> Self {
        Self {
            payload,
            source,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// A bounded, single-line rendering of the payload for logs.
    pub fn summary(&self) -> String {
        let full = format!("{:?}", self.payload);
        if full.len() <= SUMMARY_LIMIT {
            return full;
        }
        let mut end = SUMMARY_LIMIT;
        while !full.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &full[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_payload() {
        let ev = Event::new(GameEvent::BallStopped { position: Vec3::ZERO }, "test");
        assert_eq!(ev.kind(), EventKind::BallStopped);
    }

    #[test]
    fn test_summary_is_bounded() {
        let ev = Event::new(
            GameEvent::ErrorOccurred {
                original: EventKind::BallHit,
                subscriber: "x".repeat(500),
                message: "boom".into(),
            },
            "test",
        );
        let summary = ev.summary();
        assert!(summary.len() <= SUMMARY_LIMIT + '…'.len_utf8());
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn test_error_kind_never_reports_itself() {
        assert!(!EventKind::ErrorOccurred.reports_listener_errors());
        assert!(EventKind::HoleCompleted.reports_listener_errors());
    }
}
