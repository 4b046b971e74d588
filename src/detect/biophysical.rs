//! Biophysical validation: pulsatility amplitude and channel-ratio
//! plausibility against hemoglobin-absorption expectations.
//!
//! Both scores use smooth linear falloff outside the optimal band so that
//! marginal frames degrade gracefully instead of flipping binary.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::band_score;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiophysicalConfig {
    /// Rolling history of filtered values feeding the pulsatility span.
    pub history_size: usize,
    /// Samples required before scoring.
    pub min_samples: usize,
    /// Pulsatility span band (span / mean): zero-lo, opt-lo, opt-hi, zero-hi.
    /// Below it there is no pulsatile component (no finger or a static light
    /// source); above it the span is motion artifact.
    pub pulsatility_band: [f32; 4],
    /// Red:green ratio band for transilluminated skin.
    pub red_green_band: [f32; 4],
    /// Red:blue ratio band for transilluminated skin.
    pub red_blue_band: [f32; 4],
}

impl Default for BiophysicalConfig {
    fn default() -> Self {
        Self {
            history_size: 30,
            min_samples: 10,
            pulsatility_band: [0.001, 0.01, 0.25, 0.5],
            red_green_band: [1.1, 1.5, 5.0, 8.0],
            red_blue_band: [1.1, 1.5, 6.0, 10.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiophysicalScores {
    /// 1.0 = pulsatile span inside the physiological band.
    pub pulsatility: f32,
    /// 1.0 = both channel ratios inside the hemoglobin-absorption bands.
    pub ratio_plausibility: f32,
}

#[derive(Debug, Clone)]
pub struct BiophysicalValidator {
    config: BiophysicalConfig,
    history: VecDeque<f32>,
}

impl BiophysicalValidator {
    pub fn new() -> Self {
        Self::with_config(BiophysicalConfig::default())
    }

    pub fn with_config(config: BiophysicalConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.history_size),
            config,
        }
    }

    /// Fold one filtered sample plus the frame's channel ratios.
    pub fn assess(
        &mut self,
        filtered: f32,
        red_green_ratio: f32,
        red_blue_ratio: f32,
    ) -> BiophysicalScores {
        self.history.push_back(filtered);
        if self.history.len() > self.config.history_size {
            self.history.pop_front();
        }

        let pulsatility = if self.history.len() < self.config.min_samples {
            0.0
        } else {
            let mut min = f32::MAX;
            let mut max = f32::MIN;
            let mut sum = 0.0f32;
            for &v in &self.history {
                min = min.min(v);
                max = max.max(v);
                sum += v;
            }
            let mean = sum / self.history.len() as f32;
            if mean.abs() < 1e-3 {
                0.0
            } else {
                let span = (max - min) / mean.abs();
                let [z_lo, o_lo, o_hi, z_hi] = self.config.pulsatility_band;
                band_score(span, z_lo, o_lo, o_hi, z_hi)
            }
        };

        let [gz_lo, go_lo, go_hi, gz_hi] = self.config.red_green_band;
        let rg = band_score(red_green_ratio, gz_lo, go_lo, go_hi, gz_hi);
        let [bz_lo, bo_lo, bo_hi, bz_hi] = self.config.red_blue_band;
        let rb = band_score(red_blue_ratio, bz_lo, bo_lo, bo_hi, bz_hi);

        BiophysicalScores {
            pulsatility,
            ratio_plausibility: (rg + rb) * 0.5,
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl Default for BiophysicalValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_pulse_like_signal_scores_high() {
        let mut validator = BiophysicalValidator::new();
        let mut scores = BiophysicalScores {
            pulsatility: 0.0,
            ratio_plausibility: 0.0,
        };
        for i in 0..60 {
            let t = i as f32 / 30.0;
            let v = 120.0 + 8.0 * (2.0 * PI * 1.25 * t).sin();
            scores = validator.assess(v, 3.0, 4.0);
        }
        assert!(scores.pulsatility > 0.9, "pulsatility {}", scores.pulsatility);
        assert_eq!(scores.ratio_plausibility, 1.0);
    }

    #[test]
    fn test_static_source_has_no_pulsatility() {
        let mut validator = BiophysicalValidator::new();
        let mut scores = BiophysicalScores {
            pulsatility: 1.0,
            ratio_plausibility: 1.0,
        };
        for _ in 0..60 {
            scores = validator.assess(180.0, 3.0, 4.0);
        }
        assert_eq!(scores.pulsatility, 0.0);
    }

    #[test]
    fn test_motion_artifact_span_penalized() {
        let mut validator = BiophysicalValidator::new();
        let mut scores = BiophysicalScores {
            pulsatility: 1.0,
            ratio_plausibility: 1.0,
        };
        for i in 0..60 {
            // Huge swings: span/mean well above the band.
            let v = if i % 10 < 5 { 40.0 } else { 200.0 };
            scores = validator.assess(v, 3.0, 4.0);
        }
        assert!(scores.pulsatility < 0.2, "pulsatility {}", scores.pulsatility);
    }

    #[test]
    fn test_gray_ratios_implausible() {
        let mut validator = BiophysicalValidator::new();
        let scores = validator.assess(128.0, 1.0, 1.0);
        assert_eq!(scores.ratio_plausibility, 0.0);
    }

    #[test]
    fn test_marginal_ratio_degrades_gracefully() {
        let mut validator = BiophysicalValidator::new();
        let scores = validator.assess(128.0, 1.3, 7.0);
        assert!(scores.ratio_plausibility > 0.0);
        assert!(scores.ratio_plausibility < 1.0);
    }
}
