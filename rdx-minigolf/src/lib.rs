//! # Minigolf
//!
//! The gameplay orchestration core of a physics-driven mini-golf game.
//!
//! The core sits between a physics engine, a course/level provider and the
//! presentation layer. It tracks the ball, detects hazards and hole-ins, and
//! runs the multi-step transition from one hole to the next.
//!
//! ## Core Concepts
//!
//! - **EventBus**: A synchronous publish/subscribe hub. Every component talks
//!   through it; a failing listener never stops delivery to the others.
//! - **GameStateMachine**: The single source of truth for the phase of play
//!   (`Aiming`, `BallInMotion`, `HoleCompleted`, ...) and hole progress.
//! - **Components**: `BallLifecycle`, `HazardDetector`, `HoleCompletionTracker`
//!   and `HoleTransitionCoordinator`, each receiving only the narrow
//!   collaborator interfaces it needs.
//! - **Tick ordering**: physics step, then ball update, then hazard check, then
//!   completion check. `Game::tick` enforces it.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use minigolf::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let game = Game::sandbox(GameConfig::load(None)?);
//!     game.start().await?;
//!
//!     game.hit(Vec3::Z, 0.6);
//!     for _ in 0..240 {
//!         game.tick(1.0 / 60.0);
//!     }
//!     println!("strokes: {}", game.scorer().current_strokes());
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Minigolf Core";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bus;
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod events;
pub mod feedback;
pub mod interfaces;
pub mod sandbox;
pub mod scoring;
pub mod state;

/// A prelude module for easy importing of the most common Minigolf types.
pub mod prelude {
    pub use crate::bus::{EventBus, Subscription};
    pub use crate::common::{DebugSettings, InputGate, Vec3};
    pub use crate::components::ball::{BallLifecycle, BallQuery};
    pub use crate::components::completion::{CompletionOutcome, HoleCompletionTracker};
    pub use crate::components::hazard::HazardDetector;
    pub use crate::components::transition::{
        HoleTransitionCoordinator, TransitionError, TransitionOutcome,
    };
    pub use crate::config::GameConfig;
    pub use crate::engine::{Collaborators, Game};
    pub use crate::events::{Event, EventKind, GameEvent};
    pub use crate::scoring::{HoleScore, Scorer};
    pub use crate::state::{GameState, GameStateMachine};
}
