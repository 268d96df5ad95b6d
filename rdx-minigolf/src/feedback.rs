//! Bus listeners that turn gameplay events into sounds and UI updates.

use crate::bus::{EventBus, Subscription};
use crate::events::{EventKind, GameEvent};
use crate::interfaces::{AudioCue, AudioCues, HazardKind, UiNotifier};
use crate::scoring::Scorer;
use std::sync::Arc;

fn cue_for(kind: EventKind) -> Option<AudioCue> {
    match kind {
        EventKind::BallHit => Some(AudioCue::Hit),
        EventKind::HoleCompleted => Some(AudioCue::Success),
        EventKind::BallOutOfBounds | EventKind::HazardDetected => Some(AudioCue::OutOfBounds),
        _ => None,
    }
}

/// Plays the cue for each shot, hole-in and penalty.
pub fn wire_audio(bus: &EventBus, audio: Arc<dyn AudioCues>) -> Vec<Subscription> {
    [
        EventKind::BallHit,
        EventKind::HoleCompleted,
        EventKind::BallOutOfBounds,
        EventKind::HazardDetected,
    ]
    .into_iter()
    .filter_map(|kind| {
        let cue = cue_for(kind)?;
        let audio = audio.clone();
        Some(bus.subscribe(kind, "feedback.audio", move |_| {
            audio.play(cue);
            Ok(())
        }))
    })
    .collect()
}

fn penalty_message(hazard: HazardKind, penalty: u32) -> String {
    let what = match hazard {
        HazardKind::OutOfBounds => "Out of bounds!",
        HazardKind::Water => "Splash! Into the water.",
        HazardKind::Lava => "Lava! That ball is toast.",
    };
    match penalty {
        0 => what.to_string(),
        1 => format!("{what} +1 stroke"),
        n => format!("{what} +{n} strokes"),
    }
}

/// Keeps the stroke counter current and announces penalties.
///
/// Register after `scoring::wire_penalties` so the displayed count already
/// includes the penalty.
pub fn wire_ui(bus: &EventBus, ui: Arc<dyn UiNotifier>, scorer: Arc<dyn Scorer>) -> Vec<Subscription> {
    let mut subs = Vec::with_capacity(2);

    let (hit_ui, hit_scorer) = (ui.clone(), scorer.clone());
    subs.push(bus.subscribe(EventKind::BallHit, "feedback.ui", move |_| {
        hit_ui.update_score(hit_scorer.current_strokes(), hit_scorer.total_strokes());
        Ok(())
    }));

    subs.push(bus.subscribe(EventKind::HazardDetected, "feedback.ui", move |event| {
        if let GameEvent::HazardDetected {
            hazard, penalty, ..
        } = event.payload
        {
            ui.show_message(&penalty_message(hazard, penalty));
            ui.update_score(scorer.current_strokes(), scorer.total_strokes());
        }
        Ok(())
    }));

    subs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Vec3;
    use crate::scoring::{wire_penalties, HoleScore, ScoreCard};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        cues: Mutex<Vec<AudioCue>>,
        lines: Mutex<Vec<String>>,
    }

    impl AudioCues for Recorder {
        fn play(&self, cue: AudioCue) {
            self.cues.lock().unwrap().push(cue);
        }
    }

    impl UiNotifier for Recorder {
        fn update_hole_info(&self, _hole: u32, _total: u32, _par: u32) {}
        fn update_score(&self, strokes: u32, total: u32) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("score {strokes}/{total}"));
        }
        fn show_message(&self, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
        fn show_final_scorecard(&self, _card: &[HoleScore]) {}
    }

    fn water() -> GameEvent {
        GameEvent::HazardDetected {
            hazard: HazardKind::Water,
            penalty: 1,
            position: Vec3::ZERO,
            last_safe_position: None,
        }
    }

    #[test]
    fn test_audio_cues_follow_events() {
        let bus = EventBus::new(8);
        let rec = Arc::new(Recorder::default());
        let _subs = wire_audio(&bus, rec.clone());
        bus.publish(
            GameEvent::HoleCompleted {
                hole: 1,
                strokes: 2,
                par: 3,
            },
            "test",
        );
        bus.publish(water(), "test");
        bus.publish(GameEvent::BallStopped { position: Vec3::ZERO }, "test");
        assert_eq!(
            *rec.cues.lock().unwrap(),
            vec![AudioCue::Success, AudioCue::OutOfBounds]
        );
    }

    #[test]
    fn test_penalty_shown_after_it_is_counted() {
        let bus = EventBus::new(8);
        let card = ScoreCard::new();
        let rec = Arc::new(Recorder::default());
        let _penalties = wire_penalties(&bus, Arc::new(card.clone()));
        let _ui = wire_ui(&bus, rec.clone(), Arc::new(card.clone()));
        card.add_stroke();

        bus.publish(water(), "test");
        assert_eq!(
            *rec.lines.lock().unwrap(),
            vec!["Splash! Into the water. +1 stroke".to_string(), "score 2/2".to_string()]
        );
    }
}
