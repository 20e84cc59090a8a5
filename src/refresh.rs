//! Dataset refresh submission, polling, and terminal-state evaluation.

pub mod model;

mod orchestrator;

pub use model::*;
pub use orchestrator::*;
