//! Structured telemetry events.
//!
//! The pipeline reports state transitions and advisories through an
//! [`EventSink`]. Sinks are strictly observational and never affect control
//! flow: a panicking sink is contained by the session and reported back as a
//! `CallbackError` warning. The default [`TracingSink`] forwards everything
//! to `tracing` at debug level.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::SignalWarning;
use crate::physio::hrv::{ArrhythmiaKind, Severity};

/// Events emitted by the pipeline, one stream per session.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Calibration window completed; thresholds are now frozen.
    CalibrationComplete {
        baseline_mean: f32,
        min_threshold: f32,
        max_threshold: f32,
    },
    /// Hysteresis machine entered the detected state.
    FingerDetected { quality: u8 },
    /// Hysteresis machine left the detected state.
    FingerLost,
    /// A confirmed arrhythmia state change (post-debounce).
    ArrhythmiaChanged {
        kind: ArrhythmiaKind,
        severity: Severity,
    },
    /// Non-fatal advisory for the caller.
    Warning(SignalWarning),
}

/// Consumer of pipeline events.
pub trait EventSink {
    fn emit(&mut self, event: &PipelineEvent);
}

/// Default sink: forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &PipelineEvent) {
        tracing::debug!(?event, "pipeline event");
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &PipelineEvent) {}
}

/// Sink that records events into a shared buffer, for tests and demo UIs.
///
/// The session is single-threaded by design, so a plain `Rc<RefCell<_>>`
/// handle is sufficient.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Rc<RefCell<Vec<PipelineEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the recorded events.
    pub fn handle(&self) -> Rc<RefCell<Vec<PipelineEvent>>> {
        Rc::clone(&self.events)
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, event: &PipelineEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records() {
        let sink = MemorySink::new();
        let handle = sink.handle();

        let mut boxed: Box<dyn EventSink> = Box::new(sink);
        boxed.emit(&PipelineEvent::FingerLost);
        boxed.emit(&PipelineEvent::Warning(SignalWarning::LowLight));

        let events = handle.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], PipelineEvent::FingerLost);
    }
}
