//! Pipeline-wide configuration.
//!
//! One struct carries every tunable threshold; processing variants are
//! configuration presets, not types.

use serde::{Deserialize, Serialize};

use crate::detect::{BiophysicalConfig, CalibrationConfig, FusionConfig, TrendConfig};
use crate::dsp::KalmanConfig;
use crate::frame::SamplerConfig;
use crate::physio::{BeatConfig, BloodPressureConfig, HrvConfig, Spo2Config};

/// Exposure advisory thresholds on mean ROI luminance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureConfig {
    pub low_light_below: f32,
    pub overexposed_above: f32,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            low_light_below: 40.0,
            overexposed_above: 235.0,
        }
    }
}

/// Heart-rate reporting parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartRateConfig {
    /// Recent RR intervals averaged into the reported rate.
    pub rr_window: usize,
    /// Beats required before a rate is reported at all.
    pub min_beats: usize,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            rr_window: 8,
            min_beats: 2,
        }
    }
}

/// Everything the pipeline can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub sampler: SamplerConfig,
    pub calibration: CalibrationConfig,
    pub kalman: KalmanConfig,
    pub trend: TrendConfig,
    pub biophysical: BiophysicalConfig,
    pub fusion: FusionConfig,
    pub beats: BeatConfig,
    pub hrv: HrvConfig,
    pub blood_pressure: BloodPressureConfig,
    pub spo2: Spo2Config,
    pub exposure: ExposureConfig,
    pub heart_rate: HeartRateConfig,
}

impl PipelineConfig {
    /// Detect fingers faster and on weaker signals, at the cost of more
    /// false positives.
    pub fn high_sensitivity() -> Self {
        let mut cfg = Self::default();
        cfg.sampler.red_dominance_ratio = 1.2;
        cfg.sampler.min_valid_pixels = 30;
        cfg.fusion.base_threshold = 0.4;
        cfg.fusion.threshold_min = 0.3;
        cfg.fusion.n_on = 2;
        cfg.fusion.n_off = 8;
        cfg
    }

    /// Require stronger agreement before detecting, for noisy environments.
    pub fn high_specificity() -> Self {
        let mut cfg = Self::default();
        cfg.sampler.red_dominance_ratio = 1.5;
        cfg.sampler.min_valid_pixels = 80;
        cfg.fusion.base_threshold = 0.6;
        cfg.fusion.threshold_max = 0.75;
        cfg.fusion.n_on = 5;
        cfg.fusion.n_off = 3;
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_differ_in_expected_direction() {
        let sensitive = PipelineConfig::high_sensitivity();
        let specific = PipelineConfig::high_specificity();
        assert!(sensitive.fusion.base_threshold < specific.fusion.base_threshold);
        assert!(sensitive.fusion.n_on < specific.fusion.n_on);
        assert!(sensitive.sampler.red_dominance_ratio < specific.sampler.red_dominance_ratio);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let f = PipelineConfig::default().fusion;
        let sum = f.weight_red_channel
            + f.weight_stability
            + f.weight_pulsatility
            + f.weight_biophysical
            + f.weight_periodicity;
        assert!((sum - 1.0).abs() < 1e-6);
    }
}
