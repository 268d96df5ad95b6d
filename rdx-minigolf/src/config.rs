//! Defines all configuration structures for the minigolf core.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g., a TOML file) using `serde`, with environment overrides layered on top
//! through the `config` crate. Every tunable constant the gameplay components
//! rely on (thresholds, cadences, delays) lives here rather than in code.

use crate::common::{Aabb, Vec3};
use crate::interfaces::HazardKind;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix for overrides, e.g. `MINIGOLF_ENGINE__TICK_RATE_HZ`.
pub const ENV_PREFIX: &str = "MINIGOLF";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The top-level configuration for a game session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub engine: EngineConfig,
    pub bus: BusConfig,
    pub ball: BallConfig,
    pub hazards: HazardConfig,
    pub completion: CompletionConfig,
    pub transition: TransitionConfig,
    /// Course layout for the sandbox collaborators. `None` uses the built-in nine.
    pub course: Option<CourseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulation ticks per second for `Game::run`.
    pub tick_rate_hz: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of the diagnostic history ring buffer.
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    /// Height added to a spawn point so the ball never starts embedded in geometry.
    pub spawn_lift: f32,
    /// Below this height the ball is considered lost and snapped back.
    pub out_of_bounds_height: f32,
    pub ground_height: f32,
    /// A resting ball under this height is recorded as a safe position.
    pub near_ground_height: f32,
    /// Speed under which the ball counts as stopped.
    pub motion_threshold: f32,
    /// Impulse applied for a full-power (1.0) shot.
    pub max_hit_impulse: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    /// Hazard checks run once every this many ticks.
    pub check_interval_ticks: u32,
    pub stroke_penalty: u32,
    /// Minimum height before the detector raises a hazard.
    pub min_height: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub grace_period_ms: u64,
    pub cup_radius: f32,
    /// How far under the cup surface a ball must drop to count as falling in.
    pub fall_epsilon: f32,
    /// Pause between a confirmed hole-in and the start of the transition.
    pub transition_delay_ms: u64,
    /// Pause before the success message reaches the UI.
    pub message_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Pacing delay between transition steps.
    pub step_delay_ms: u64,
}

/// A full course description.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseConfig {
    pub name: String,
    pub holes: Vec<HoleConfig>,
}

/// One hole of a course.
#[derive(Debug, Clone, Deserialize)]
pub struct HoleConfig {
    pub par: u32,
    pub start: Vec3,
    pub cup: Vec3,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    #[serde(default)]
    pub hazards: Vec<HazardZoneConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HazardZoneConfig {
    pub kind: HazardKind,
    pub min: Vec3,
    pub max: Vec3,
}

// --- Default values ---

impl Default for EngineConfig {
    fn default() -> Self {
        Self { tick_rate_hz: 60 }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
        }
    }
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            spawn_lift: 0.1,
            out_of_bounds_height: -10.0,
            ground_height: 0.0,
            near_ground_height: 0.5,
            motion_threshold: 0.05,
            max_hit_impulse: 10.0,
            radius: 0.1,
        }
    }
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            check_interval_ticks: 10,
            stroke_penalty: 1,
            min_height: -2.0,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 1500,
            cup_radius: 0.3,
            fall_epsilon: 0.05,
            transition_delay_ms: 1500,
            message_delay_ms: 500,
        }
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self { step_delay_ms: 50 }
    }
}

impl CompletionConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn transition_delay(&self) -> Duration {
        Duration::from_millis(self.transition_delay_ms)
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }
}

impl TransitionConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl HoleConfig {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.bounds_min, self.bounds_max)
    }
}

impl GameConfig {
    /// Loads configuration from an optional TOML file plus `MINIGOLF_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );
        let loaded: GameConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("engine.tick_rate_hz must be > 0".into()));
        }
        if self.hazards.check_interval_ticks == 0 {
            return Err(ConfigError::Invalid(
                "hazards.check_interval_ticks must be > 0".into(),
            ));
        }
        if self.completion.cup_radius <= 0.0 || self.ball.radius <= 0.0 {
            return Err(ConfigError::Invalid("radii must be positive".into()));
        }
        if self.ball.out_of_bounds_height >= self.ball.ground_height {
            return Err(ConfigError::Invalid(
                "ball.out_of_bounds_height must lie below ball.ground_height".into(),
            ));
        }
        if let Some(course) = &self.course {
            if course.holes.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "course '{}' has no holes",
                    course.name
                )));
            }
        }
        Ok(())
    }

    /// The configured course, or the built-in nine holes.
    pub fn course_or_default(&self) -> CourseConfig {
        self.course.clone().unwrap_or_else(CourseConfig::builtin)
    }
}

impl CourseConfig {
    /// Nine straight-ish fairways of growing length, with water on the back six.
    pub fn builtin() -> Self {
        let holes = (0..9)
            .map(|i| {
                let length = 6.0 + i as f32 * 1.5;
                let hazards = if i >= 3 {
                    vec![HazardZoneConfig {
                        kind: HazardKind::Water,
                        min: Vec3::new(1.0, -1.0, length * 0.4),
                        max: Vec3::new(2.0, 0.2, length * 0.6),
                    }]
                } else {
                    Vec::new()
                };
                HoleConfig {
                    par: if i < 3 { 2 } else if i < 7 { 3 } else { 4 },
                    start: Vec3::new(0.0, 0.0, 0.0),
                    cup: Vec3::new(0.0, 0.0, length),
                    bounds_min: Vec3::new(-2.0, -50.0, -1.0),
                    bounds_max: Vec3::new(2.0, 50.0, length + 1.0),
                    hazards,
                }
            })
            .collect();
        Self {
            name: "Starlight Nine".to_string(),
            holes,
        }
    }
}
