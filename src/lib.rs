//! # fingerppg
//!
//! Fingertip PPG vital-signs pipeline for camera-over-torch capture.
//!
//! This crate provides:
//! - **Frame sampling**: ROI reduction of RGBA frames to photometric samples
//! - **Finger detection**: multi-detector score fusion with hysteresis
//! - **Vitals**: heart rate, HRV/arrhythmia, SpO2 and blood-pressure estimates
//!
//! ## Example
//!
//! ```ignore
//! use fingerppg::{PipelineConfig, Session};
//!
//! let mut session = Session::new(PipelineConfig::default());
//! session.start();
//!
//! // Feed interleaved RGBA frames from the camera
//! for frame in camera_frames {
//!     let snapshot = session.submit_frame(&frame.bytes, frame.width, frame.height, frame.timestamp_ms)?;
//!     if snapshot.finger_detected {
//!         println!("HR: {} BPM (quality {})", snapshot.heart_rate, snapshot.signal_quality);
//!     }
//! }
//! ```

pub mod config;
pub mod detect;
pub mod dsp;
pub mod error;
pub mod event;
pub mod frame;
pub mod physio;
pub mod session;

pub use config::{ExposureConfig, HeartRateConfig, PipelineConfig};
pub use detect::{Detection, DetectorScores, SignalAnalyzer, TrendClass};
pub use error::{PpgError, SignalWarning};
pub use event::{EventSink, MemorySink, NullSink, PipelineEvent, TracingSink};
pub use frame::{FrameSampler, RawFrameSample, RoiRect};
pub use physio::{
    ArrhythmiaKind, ArrhythmiaStatus, BloodPressure, BloodPressureReading, HrvMetrics, Severity,
};
pub use session::{Session, SessionPhase, VitalSignsSnapshot};
