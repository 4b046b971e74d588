//! Detector-score fusion and the finger-presence hysteresis machine.
//!
//! A frame qualifies when the weighted combination of the five detector
//! scores clears an adaptive threshold AND stability, pulsatility and
//! periodicity individually clear minimum floors, so one strong detector
//! can never mask total disagreement among the others. The hysteresis is
//! the central defense against flicker: state flips only after enough
//! consecutive frames agree.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    pub weight_red_channel: f32,
    pub weight_stability: f32,
    pub weight_pulsatility: f32,
    pub weight_biophysical: f32,
    pub weight_periodicity: f32,
    /// Starting point for the adaptive qualification threshold.
    pub base_threshold: f32,
    /// Bounds on the adaptive threshold.
    pub threshold_min: f32,
    pub threshold_max: f32,
    /// Early red-channel-score window used to calibrate the threshold.
    pub threshold_window: usize,
    /// Coefficient-of-variation pivot: below it the threshold rises (stable
    /// environment, fewer false positives), above it the threshold drops.
    pub cv_pivot: f32,
    pub cv_gain: f32,
    /// Per-score minimum floors a qualifying frame must clear.
    pub stability_floor: f32,
    pub pulsatility_floor: f32,
    pub periodicity_floor: f32,
    /// Texture penalty factor on the composite score.
    pub texture_penalty: f32,
    /// Consecutive qualifying frames to enter DETECTED.
    pub n_on: u32,
    /// Consecutive disqualifying frames to leave DETECTED.
    pub n_off: u32,
    /// Milliseconds without a qualifying frame that also force an exit.
    pub detection_timeout_ms: u64,
    /// Rolling window behind the 0-100 quality output.
    pub quality_window: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weight_red_channel: 0.25,
            weight_stability: 0.20,
            weight_pulsatility: 0.20,
            weight_biophysical: 0.15,
            weight_periodicity: 0.20,
            base_threshold: 0.5,
            threshold_min: 0.35,
            threshold_max: 0.65,
            threshold_window: 30,
            cv_pivot: 0.25,
            cv_gain: 0.4,
            stability_floor: 0.2,
            pulsatility_floor: 0.15,
            periodicity_floor: 0.1,
            texture_penalty: 0.5,
            n_on: 3,
            n_off: 5,
            detection_timeout_ms: 2000,
            quality_window: 10,
        }
    }
}

/// Fixed-size bundle of per-frame detector scores, each in [0, 1].
/// Recomputed every frame; never persisted beyond the current decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorScores {
    pub red_channel: f32,
    pub stability: f32,
    pub pulsatility: f32,
    pub biophysical: f32,
    pub periodicity: f32,
}

impl DetectorScores {
    pub fn zero() -> Self {
        Self {
            red_channel: 0.0,
            stability: 0.0,
            pulsatility: 0.0,
            biophysical: 0.0,
            periodicity: 0.0,
        }
    }
}

/// Hysteresis machine state.
#[derive(Debug, Clone)]
pub struct DetectionState {
    pub is_finger_detected: bool,
    pub consecutive_detections: u32,
    pub consecutive_no_detections: u32,
    pub last_detection_ms: Option<u64>,
    pub quality_history: VecDeque<f32>,
}

impl DetectionState {
    fn new(quality_window: usize) -> Self {
        Self {
            is_finger_detected: false,
            consecutive_detections: 0,
            consecutive_no_detections: 0,
            last_detection_ms: None,
            quality_history: VecDeque::with_capacity(quality_window),
        }
    }
}

/// Per-frame fusion outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub finger_detected: bool,
    /// 0-100; forced to 0 while not detected.
    pub quality: u8,
    /// Texture-penalized weighted score this frame.
    pub composite: f32,
    /// Whether this frame qualified.
    pub qualifies: bool,
    /// True on the exact frame a state transition happened.
    pub just_changed: bool,
}

pub struct SignalAnalyzer {
    config: FusionConfig,
    state: DetectionState,
    threshold: f32,
    threshold_samples: Vec<f32>,
    threshold_locked: bool,
}

impl SignalAnalyzer {
    pub fn new() -> Self {
        Self::with_config(FusionConfig::default())
    }

    pub fn with_config(config: FusionConfig) -> Self {
        Self {
            state: DetectionState::new(config.quality_window),
            threshold: config.base_threshold,
            threshold_samples: Vec::with_capacity(config.threshold_window),
            threshold_locked: false,
            config,
        }
    }

    /// Fuse one frame's scores and advance the hysteresis machine.
    pub fn evaluate(
        &mut self,
        scores: &DetectorScores,
        texture_score: f32,
        timestamp_ms: u64,
    ) -> Detection {
        self.calibrate_threshold(scores.red_channel);

        let weighted = self.config.weight_red_channel * scores.red_channel
            + self.config.weight_stability * scores.stability
            + self.config.weight_pulsatility * scores.pulsatility
            + self.config.weight_biophysical * scores.biophysical
            + self.config.weight_periodicity * scores.periodicity;
        let composite = (weighted
            * (1.0 - self.config.texture_penalty * texture_score.clamp(0.0, 1.0)))
        .clamp(0.0, 1.0);

        let qualifies = composite >= self.threshold
            && scores.stability >= self.config.stability_floor
            && scores.pulsatility >= self.config.pulsatility_floor
            && scores.periodicity >= self.config.periodicity_floor;

        let was_detected = self.state.is_finger_detected;

        if was_detected {
            if qualifies {
                self.state.consecutive_no_detections = 0;
                self.state.last_detection_ms = Some(timestamp_ms);
            } else {
                self.state.consecutive_no_detections += 1;
                let timed_out = self
                    .state
                    .last_detection_ms
                    .map(|t| timestamp_ms.saturating_sub(t) >= self.config.detection_timeout_ms)
                    .unwrap_or(false);
                if self.state.consecutive_no_detections >= self.config.n_off || timed_out {
                    self.state.is_finger_detected = false;
                    self.state.consecutive_detections = 0;
                    self.state.consecutive_no_detections = 0;
                    debug!(timestamp_ms, timed_out, "finger lost");
                }
            }
        } else if qualifies {
            self.state.consecutive_detections += 1;
            if self.state.consecutive_detections >= self.config.n_on {
                self.state.is_finger_detected = true;
                self.state.consecutive_no_detections = 0;
                self.state.last_detection_ms = Some(timestamp_ms);
                debug!(timestamp_ms, composite, "finger detected");
            }
        } else {
            self.state.consecutive_detections = 0;
        }

        self.state.quality_history.push_back(composite);
        if self.state.quality_history.len() > self.config.quality_window {
            self.state.quality_history.pop_front();
        }

        let quality = if self.state.is_finger_detected {
            let avg = self.state.quality_history.iter().sum::<f32>()
                / self.state.quality_history.len() as f32;
            (avg * 100.0).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        Detection {
            finger_detected: self.state.is_finger_detected,
            quality,
            composite,
            qualifies,
            just_changed: self.state.is_finger_detected != was_detected,
        }
    }

    /// One-shot threshold calibration from the coefficient of variation of
    /// the early red-channel scores.
    fn calibrate_threshold(&mut self, red_score: f32) {
        if self.threshold_locked || red_score <= 0.0 {
            return;
        }
        self.threshold_samples.push(red_score);
        if self.threshold_samples.len() < self.config.threshold_window {
            return;
        }

        let n = self.threshold_samples.len() as f32;
        let mean = self.threshold_samples.iter().sum::<f32>() / n;
        let var = self
            .threshold_samples
            .iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f32>()
            / n;
        let cv = if mean > 1e-6 { var.sqrt() / mean } else { 0.0 };

        self.threshold = (self.config.base_threshold
            + self.config.cv_gain * (self.config.cv_pivot - cv))
            .clamp(self.config.threshold_min, self.config.threshold_max);
        self.threshold_locked = true;
        self.threshold_samples.clear();

        debug!(threshold = self.threshold, cv, "adaptive threshold calibrated");
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.state = DetectionState::new(self.config.quality_window);
        self.threshold = self.config.base_threshold;
        self.threshold_samples.clear();
        self.threshold_locked = false;
    }
}

impl Default for SignalAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn good_scores() -> DetectorScores {
        DetectorScores {
            red_channel: 0.9,
            stability: 0.8,
            pulsatility: 0.8,
            biophysical: 0.9,
            periodicity: 0.8,
        }
    }

    fn feed(analyzer: &mut SignalAnalyzer, scores: DetectorScores, n: u32, t0: u64) -> Detection {
        let mut last = analyzer.evaluate(&scores, 0.0, t0);
        for i in 1..n {
            last = analyzer.evaluate(&scores, 0.0, t0 + i as u64 * 33);
        }
        last
    }

    #[test]
    fn test_detection_after_n_on_frames() {
        let mut analyzer = SignalAnalyzer::new();
        let d = feed(&mut analyzer, good_scores(), 2, 0);
        assert!(!d.finger_detected);
        let d = feed(&mut analyzer, good_scores(), 1, 100);
        assert!(d.finger_detected);
        assert!(d.just_changed);
        assert!(d.quality > 50);
    }

    #[test]
    fn test_single_anomalous_frame_does_not_flip() {
        let mut analyzer = SignalAnalyzer::new();
        feed(&mut analyzer, good_scores(), 10, 0);
        assert!(analyzer.state().is_finger_detected);

        let d = analyzer.evaluate(&DetectorScores::zero(), 0.0, 400);
        assert!(d.finger_detected, "one bad frame must not flip detection");

        let d = feed(&mut analyzer, good_scores(), 5, 500);
        assert!(d.finger_detected);
    }

    #[test]
    fn test_exactly_n_off_frames_to_drop() {
        let mut analyzer = SignalAnalyzer::new();
        feed(&mut analyzer, good_scores(), 10, 0);

        let n_off = FusionConfig::default().n_off;
        let mut t = 1000;
        for i in 1..=n_off {
            let d = analyzer.evaluate(&DetectorScores::zero(), 0.0, t);
            t += 33;
            if i < n_off {
                assert!(d.finger_detected, "must stay detected through frame {i}");
            } else {
                assert!(!d.finger_detected, "must drop on frame {n_off}");
                assert!(d.just_changed);
            }
        }
    }

    #[test]
    fn test_timeout_forces_drop() {
        let cfg = FusionConfig {
            n_off: 1000, // effectively disable the counter path
            ..FusionConfig::default()
        };
        let mut analyzer = SignalAnalyzer::with_config(cfg);
        feed(&mut analyzer, good_scores(), 10, 0);
        assert!(analyzer.state().is_finger_detected);

        // Two disqualifying frames far apart in wall-clock time.
        analyzer.evaluate(&DetectorScores::zero(), 0.0, 1000);
        let d = analyzer.evaluate(&DetectorScores::zero(), 0.0, 4000);
        assert!(!d.finger_detected);
    }

    #[test]
    fn test_quality_zero_when_not_detected() {
        let mut analyzer = SignalAnalyzer::new();
        let d = analyzer.evaluate(&good_scores(), 0.0, 0);
        assert!(!d.finger_detected);
        assert_eq!(d.quality, 0);
    }

    #[test]
    fn test_floor_prevents_single_strong_detector() {
        let mut analyzer = SignalAnalyzer::new();
        // Strong red channel, dead everything else: must never qualify.
        let scores = DetectorScores {
            red_channel: 1.0,
            stability: 1.0,
            pulsatility: 0.0,
            biophysical: 1.0,
            periodicity: 1.0,
        };
        let d = feed(&mut analyzer, scores, 20, 0);
        assert!(!d.qualifies);
        assert!(!d.finger_detected);
    }

    #[test]
    fn test_texture_penalty_suppresses_textured_objects() {
        let mut analyzer = SignalAnalyzer::new();
        let mut last = analyzer.evaluate(&good_scores(), 0.9, 0);
        for i in 1..20 {
            last = analyzer.evaluate(&good_scores(), 0.9, i * 33);
        }
        assert!(!last.finger_detected);
    }

    #[test]
    fn test_adaptive_threshold_rises_in_stable_environment() {
        let mut analyzer = SignalAnalyzer::new();
        let base = analyzer.threshold();
        // Identical red scores: CV = 0, threshold should rise.
        for i in 0..40 {
            analyzer.evaluate(&good_scores(), 0.0, i * 33);
        }
        assert!(analyzer.threshold() > base);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut analyzer = SignalAnalyzer::new();
        feed(&mut analyzer, good_scores(), 40, 0);
        analyzer.reset();
        assert!(!analyzer.state().is_finger_detected);
        assert_eq!(analyzer.threshold(), FusionConfig::default().base_threshold);
    }
}
