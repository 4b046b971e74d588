//! Error and advisory-warning taxonomy.
//!
//! Degenerate frames are *not* errors: the sampler returns a zero sample and
//! the pipeline keeps running. Errors here are reserved for per-frame
//! invariant violations (bad buffer geometry, non-finite values reaching the
//! filter chain) and session misuse; the session itself always survives them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal-for-this-frame errors. The session stays alive and the next frame
/// is processed normally.
#[derive(Debug, Error)]
pub enum PpgError {
    /// Frame buffer length does not match `width * height * 4` (RGBA8888).
    #[error("frame buffer of {actual} bytes does not fit {width}x{height} RGBA ({expected} bytes)")]
    FrameGeometry {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Frame dimensions are zero or the ROI would be empty.
    #[error("degenerate frame dimensions {width}x{height}")]
    DegenerateFrame { width: u32, height: u32 },

    /// A non-finite value reached the filter chain.
    #[error("non-finite sample value entered the filter chain")]
    NonFiniteSample,

    /// `submit_frame` was called while the session is not running.
    #[error("session is not running (call start() first)")]
    NotRunning,
}

/// Non-fatal advisory warnings surfaced to the caller so the UI can prompt
/// the user. Processing continues unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalWarning {
    /// Mean ROI brightness below the configured floor.
    LowLight,
    /// Mean ROI brightness above the configured ceiling.
    Overexposed,
    /// The pulsatile component is present but too weak to trust.
    WeakSignal,
    /// An internal per-frame error occurred; the frame was discarded.
    ProcessingError,
    /// An event sink raised while consuming a pipeline event.
    CallbackError,
}
