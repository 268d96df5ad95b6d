//! Stroke counting and the per-hole scorecard.

use crate::bus::{EventBus, Subscription};
use crate::common::lock;
use crate::events::{EventKind, GameEvent};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// The final tally for one hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoleScore {
    pub hole: u32,
    pub strokes: u32,
    pub par: u32,
}

impl HoleScore {
    pub fn relative_to_par(&self) -> i64 {
        i64::from(self.strokes) - i64::from(self.par)
    }

    pub fn label(&self) -> &'static str {
        if self.strokes == 1 {
            return "Hole in one!";
        }
        match self.relative_to_par() {
            i64::MIN..=-3 => "Albatross",
            -2 => "Eagle",
            -1 => "Birdie",
            0 => "Par",
            1 => "Bogey",
            2 => "Double bogey",
            _ => "Keep practicing",
        }
    }
}

/// Stroke bookkeeping as seen by the gameplay components.
pub trait Scorer: Send + Sync {
    /// Counts a shot and returns the stroke count for the current hole.
    fn add_stroke(&self) -> u32;

    fn add_penalty(&self, strokes: u32) -> u32;

    fn current_strokes(&self) -> u32;

    /// Total over completed holes plus the hole in progress.
    fn total_strokes(&self) -> u32;

    /// Closes the current hole and records its score.
    fn complete_hole(&self, hole: u32, par: u32) -> HoleScore;

    fn start_hole(&self);

    fn card(&self) -> Vec<HoleScore>;
}

#[derive(Default)]
struct CardInner {
    current: u32,
    holes: Vec<HoleScore>,
}

/// In-memory scorecard.
#[derive(Clone, Default)]
pub struct ScoreCard {
    inner: Arc<Mutex<CardInner>>,
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scorer for ScoreCard {
    fn add_stroke(&self) -> u32 {
        let mut inner = lock(&self.inner);
        inner.current += 1;
        inner.current
    }

    fn add_penalty(&self, strokes: u32) -> u32 {
        let mut inner = lock(&self.inner);
        inner.current += strokes;
        inner.current
    }

    fn current_strokes(&self) -> u32 {
        lock(&self.inner).current
    }

    fn total_strokes(&self) -> u32 {
        let inner = lock(&self.inner);
        inner.holes.iter().map(|h| h.strokes).sum::<u32>() + inner.current
    }

    fn complete_hole(&self, hole: u32, par: u32) -> HoleScore {
        let mut inner = lock(&self.inner);
        let score = HoleScore {
            hole,
            strokes: inner.current,
            par,
        };
        inner.holes.push(score);
        inner.current = 0;
        score
    }

    fn start_hole(&self) {
        lock(&self.inner).current = 0;
    }

    fn card(&self) -> Vec<HoleScore> {
        lock(&self.inner).holes.clone()
    }
}

/// Adds the stroke penalty carried by every `HazardDetected` event.
pub fn wire_penalties(bus: &EventBus, scorer: Arc<dyn Scorer>) -> Subscription {
    bus.subscribe(EventKind::HazardDetected, "scoring.penalties", move |event| {
        if let GameEvent::HazardDetected {
            penalty, hazard, ..
        } = event.payload
        {
            let strokes = scorer.add_penalty(penalty);
            debug!(?hazard, penalty, strokes, "penalty applied");
        }
        Ok(())
    })
}
