//! Contains the gameplay components that sit between physics and presentation.
//!
//! Each component owns one slice of the round: the ball, hazard polling, hole
//! completion and the hole-to-hole transition. The `Game` assembly in
//! `crate::engine` wires them to one `EventBus` and drives them once per tick.

pub mod ball;
pub mod completion;
pub mod hazard;
pub mod transition;
