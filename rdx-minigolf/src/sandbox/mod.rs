//! In-memory collaborators for running the core without an engine.
//!
//! `SandboxPhysics` integrates point masses over a flat fairway with a cup,
//! `SandboxCourse` serves hole layouts from a `CourseConfig`, and
//! `SandboxScene` keeps a plain object list. The dev binary, the shell and the
//! tests all run against these.

pub mod console;
pub mod course;
pub mod physics;
pub mod scene;

pub use console::{TracingAudio, TracingUi};
pub use course::{CourseFault, SandboxCourse};
pub use physics::{GroundPlan, SandboxPhysics};
pub use scene::SandboxScene;
