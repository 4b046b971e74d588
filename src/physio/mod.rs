//! Physiological estimation: beats and RR intervals, HRV/arrhythmia,
//! blood pressure and SpO2.

mod beats;
mod blood_pressure;
pub mod hrv;
mod spo2;

pub use beats::{BeatConfig, BeatEvent, BeatExtractor};
pub use blood_pressure::{
    BloodPressure, BloodPressureConfig, BloodPressureEstimator, BloodPressureReading,
};
pub use hrv::{
    ArrhythmiaAnalysis, ArrhythmiaDetector, ArrhythmiaKind, ArrhythmiaStatus, HrvConfig,
    HrvMetrics, Severity,
};
pub use spo2::{Spo2Config, Spo2Estimator};
