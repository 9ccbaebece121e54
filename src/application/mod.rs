//! Application layer - polling orchestration and the notification boundary

pub mod notifier;
pub mod orchestrator;

pub use notifier::{ChangeSink, LogSink, DELIVERY_CHUNK};
pub use orchestrator::{Orchestrator, TrackOutcome};
