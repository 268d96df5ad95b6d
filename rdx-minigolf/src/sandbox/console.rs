//! UI and audio collaborators that only write log lines.

use crate::interfaces::{AudioCue, AudioCues, UiNotifier};
use crate::scoring::HoleScore;
use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUi;

impl UiNotifier for TracingUi {
    fn update_hole_info(&self, hole: u32, total_holes: u32, par: u32) {
        info!(target: "minigolf::ui", "Hole {hole}/{total_holes} (par {par})");
    }

    fn update_score(&self, strokes: u32, total_strokes: u32) {
        info!(target: "minigolf::ui", "Strokes: {strokes} (total {total_strokes})");
    }

    fn show_message(&self, text: &str) {
        info!(target: "minigolf::ui", "{text}");
    }

    fn show_final_scorecard(&self, card: &[HoleScore]) {
        for score in card {
            info!(
                target: "minigolf::ui",
                "Hole {}: {} strokes, par {} ({})",
                score.hole,
                score.strokes,
                score.par,
                score.label()
            );
        }
        let total: u32 = card.iter().map(|s| s.strokes).sum();
        let par: u32 = card.iter().map(|s| s.par).sum();
        info!(target: "minigolf::ui", "Final: {total} strokes against par {par}");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAudio;

impl AudioCues for TracingAudio {
    fn play(&self, cue: AudioCue) {
        info!(target: "minigolf::audio", ?cue, "cue");
    }
}
