//! SpO2 estimation via ratio-of-ratios over the red and blue channels.
//!
//! Over a rolling window of per-frame ROI means, AC is the standard
//! deviation and DC the mean of each channel; R = (AC_r/DC_r)/(AC_b/DC_b)
//! maps linearly to a clamped saturation percentage. Camera-contact PPG is
//! not a calibrated oximeter, hence the conservative clamp band.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spo2Config {
    /// Rolling window length; no estimate until it fills.
    pub window_size: usize,
    /// Linear calibration: spo2 = offset - slope * R.
    pub offset: f32,
    pub slope: f32,
    /// Output clamp (percent).
    pub min_percent: f32,
    pub max_percent: f32,
}

impl Default for Spo2Config {
    fn default() -> Self {
        Self {
            window_size: 60,
            offset: 110.0,
            slope: 25.0,
            min_percent: 70.0,
            max_percent: 100.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spo2Estimator {
    config: Spo2Config,
    red: VecDeque<f32>,
    blue: VecDeque<f32>,
}

impl Spo2Estimator {
    pub fn new() -> Self {
        Self::with_config(Spo2Config::default())
    }

    pub fn with_config(config: Spo2Config) -> Self {
        Self {
            red: VecDeque::with_capacity(config.window_size),
            blue: VecDeque::with_capacity(config.window_size),
            config,
        }
    }

    /// Fold one frame's channel means into the window.
    pub fn push(&mut self, red_mean: f32, blue_mean: f32) {
        if red_mean <= 0.0 || blue_mean <= 0.0 {
            return;
        }
        self.red.push_back(red_mean);
        self.blue.push_back(blue_mean);
        if self.red.len() > self.config.window_size {
            self.red.pop_front();
            self.blue.pop_front();
        }
    }

    /// Current estimate, or `None` until the window fills.
    pub fn estimate(&self) -> Option<u32> {
        if self.red.len() < self.config.window_size {
            return None;
        }

        let (dc_red, ac_red) = Self::mean_std(&self.red);
        let (dc_blue, ac_blue) = Self::mean_std(&self.blue);
        if dc_red < 1.0 || dc_blue < 1.0 || ac_blue < 1e-3 {
            return None;
        }

        let r = (ac_red / dc_red) / (ac_blue / dc_blue);
        let spo2 = (self.config.offset - self.config.slope * r)
            .clamp(self.config.min_percent, self.config.max_percent);
        Some(spo2.round() as u32)
    }

    fn mean_std(values: &VecDeque<f32>) -> (f32, f32) {
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        (mean, var.sqrt())
    }

    pub fn reset(&mut self) {
        self.red.clear();
        self.blue.clear();
    }
}

impl Default for Spo2Estimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_no_estimate_until_window_fills() {
        let mut estimator = Spo2Estimator::new();
        for _ in 0..59 {
            estimator.push(120.0, 35.0);
        }
        assert!(estimator.estimate().is_none());
    }

    #[test]
    fn test_equal_modulation_depth_maps_midband() {
        // Same coefficient of variation on both channels -> R = 1 -> 85%.
        let mut estimator = Spo2Estimator::new();
        for i in 0..60 {
            let m = (2.0 * PI * i as f32 / 24.0).sin();
            estimator.push(120.0 * (1.0 + 0.02 * m), 35.0 * (1.0 + 0.02 * m));
        }
        let spo2 = estimator.estimate().unwrap();
        assert!((84..=86).contains(&spo2), "spo2 {spo2}");
    }

    #[test]
    fn test_weak_red_modulation_maps_high() {
        // Much shallower red modulation than blue -> small R -> high SpO2.
        let mut estimator = Spo2Estimator::new();
        for i in 0..60 {
            let m = (2.0 * PI * i as f32 / 24.0).sin();
            estimator.push(120.0 * (1.0 + 0.005 * m), 35.0 * (1.0 + 0.03 * m));
        }
        let spo2 = estimator.estimate().unwrap();
        assert!(spo2 >= 95, "spo2 {spo2}");
    }

    #[test]
    fn test_output_clamped() {
        let mut estimator = Spo2Estimator::new();
        // Red modulation far deeper than blue -> large R -> clamp floor.
        for i in 0..60 {
            let m = (2.0 * PI * i as f32 / 24.0).sin();
            estimator.push(120.0 * (1.0 + 0.2 * m), 35.0 * (1.0 + 0.02 * m));
        }
        let spo2 = estimator.estimate().unwrap();
        assert_eq!(spo2, 70);
    }

    #[test]
    fn test_trivial_frames_ignored() {
        let mut estimator = Spo2Estimator::new();
        for _ in 0..200 {
            estimator.push(0.0, 0.0);
        }
        assert!(estimator.estimate().is_none());
    }
}
