//! SkyFix application layer: the resolution pipeline and its display seam.

pub mod orchestrator;
pub mod render;

pub use orchestrator::{FailureReason, Mode, ResolutionOrchestrator, ResolutionOutcome, Resolved, RunState};
pub use render::{ConsoleRenderer, Renderer, StatusLine, WeatherView};
