//! Structured event sinks.
//!
//! Sinks are injected into the pipeline and into every agent at construction.
//! There is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use std::sync::Arc;

/// Shared handle to an event sink.
pub type SharedEventSink = Arc<dyn EventSink>;

/// Returns a sink that logs through `tracing` at info level.
#[must_use]
pub fn default_sink() -> SharedEventSink {
    Arc::new(LoggingEventSink::default())
}
