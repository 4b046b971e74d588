//! Warm-up calibration: derives a subject/device baseline from the first
//! accepted raw samples, then freezes it until reset.
//!
//! If the window never fills (no finger ever presented) the pipeline keeps
//! running on the static default thresholds. That is degraded precision,
//! not an error.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Number of non-trivial raw samples collected before calibrating.
    pub window_size: usize,
    /// Fraction trimmed from each tail before computing statistics.
    pub trim_fraction: f32,
    /// Static lower bound; also the pre-calibration min threshold.
    pub threshold_floor: f32,
    /// Static upper bound; also the pre-calibration max threshold.
    pub threshold_ceiling: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            trim_fraction: 0.1,
            threshold_floor: 30.0,
            threshold_ceiling: 250.0,
        }
    }
}

/// Frozen baseline statistics and detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationState {
    pub baseline_mean: f32,
    pub baseline_variance: f32,
    pub min_threshold: f32,
    pub max_threshold: f32,
    pub is_calibrated: bool,
}

impl CalibrationState {
    fn uncalibrated(config: &CalibrationConfig) -> Self {
        Self {
            baseline_mean: 0.0,
            baseline_variance: 0.0,
            min_threshold: config.threshold_floor,
            max_threshold: config.threshold_ceiling,
            is_calibrated: false,
        }
    }

    /// Score a red-channel value against the threshold window: 1.0 well
    /// inside, linear ramps just outside, 0 far outside.
    pub fn red_channel_score(&self, red: f32) -> f32 {
        if red <= 0.0 {
            return 0.0;
        }
        let lo = self.min_threshold;
        let hi = self.max_threshold;
        if red >= lo && red <= hi {
            1.0
        } else if red < lo {
            let ramp_lo = lo * 0.6;
            if red <= ramp_lo {
                0.0
            } else {
                (red - ramp_lo) / (lo - ramp_lo)
            }
        } else {
            let ramp_hi = hi * 1.2;
            if red >= ramp_hi {
                0.0
            } else {
                (ramp_hi - red) / (ramp_hi - hi)
            }
        }
    }
}

/// Collects the warm-up window and freezes the baseline exactly once.
#[derive(Debug, Clone)]
pub struct CalibrationHandler {
    config: CalibrationConfig,
    samples: Vec<f32>,
    state: CalibrationState,
}

impl CalibrationHandler {
    pub fn new() -> Self {
        Self::with_config(CalibrationConfig::default())
    }

    pub fn with_config(config: CalibrationConfig) -> Self {
        Self {
            samples: Vec::with_capacity(config.window_size),
            state: CalibrationState::uncalibrated(&config),
            config,
        }
    }

    /// Observe one raw sample. Trivial (non-positive) samples are ignored.
    /// Returns `true` exactly once, on the call that completes calibration;
    /// all later calls are no-ops until [`reset`](Self::reset).
    pub fn observe(&mut self, raw: f32) -> bool {
        if self.state.is_calibrated || raw <= 0.0 || !raw.is_finite() {
            return false;
        }
        self.samples.push(raw);
        if self.samples.len() < self.config.window_size {
            return false;
        }
        self.finalize();
        true
    }

    fn finalize(&mut self) {
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let trim = (sorted.len() as f32 * self.config.trim_fraction).floor() as usize;
        let kept = &sorted[trim..sorted.len() - trim];

        let n = kept.len() as f32;
        let mean = kept.iter().sum::<f32>() / n;
        let variance = kept.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
        let std = variance.sqrt();

        self.state = CalibrationState {
            baseline_mean: mean,
            baseline_variance: variance,
            min_threshold: (mean - 2.0 * std).max(self.config.threshold_floor),
            max_threshold: (mean + 5.0 * std).min(self.config.threshold_ceiling),
            is_calibrated: true,
        };
        self.samples.clear();

        debug!(
            mean = self.state.baseline_mean,
            min = self.state.min_threshold,
            max = self.state.max_threshold,
            "calibration complete"
        );
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.is_calibrated
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.state = CalibrationState::uncalibrated(&self.config);
    }
}

impl Default for CalibrationHandler {
    fn default() -> Self {
        Self::new()
    }
}
