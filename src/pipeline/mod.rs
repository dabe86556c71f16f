pub mod source;
pub mod tracking;

// Re-exports for convenience
pub use source::{DEFAULT_MIN_SCORE, JsonLinesSource, LandmarkSource};
pub use tracking::{DEFAULT_TICK, FrameReport, start_tracking};
