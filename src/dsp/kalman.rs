//! Scalar Kalman filter for per-frame sample smoothing.

use serde::{Deserialize, Serialize};

/// Fixed tuning constants for the scalar filter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KalmanConfig {
    /// Process variance Q.
    pub process_variance: f32,
    /// Measurement variance R.
    pub measurement_variance: f32,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_variance: 0.5,
            measurement_variance: 2.0,
        }
    }
}

/// Single-state scalar Kalman filter. O(1) per sample, no branching on the
/// input value; callers gate non-finite input before it gets here.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    config: KalmanConfig,
    /// State estimate X.
    x: f32,
    /// Error covariance P.
    p: f32,
}

impl KalmanFilter {
    pub fn new() -> Self {
        Self::with_config(KalmanConfig::default())
    }

    pub fn with_config(config: KalmanConfig) -> Self {
        Self {
            config,
            x: 0.0,
            p: 1.0,
        }
    }

    /// Fold one measurement into the state estimate and return it.
    pub fn update(&mut self, measurement: f32) -> f32 {
        self.p += self.config.process_variance;
        let k = self.p / (self.p + self.config.measurement_variance);
        self.x += k * (measurement - self.x);
        self.p *= 1.0 - k;
        self.x
    }

    /// Current state estimate without folding a new measurement.
    pub fn estimate(&self) -> f32 {
        self.x
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.p = 1.0;
    }
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_to_constant() {
        let mut filter = KalmanFilter::new();
        let mut out = 0.0;
        for _ in 0..100 {
            out = filter.update(120.0);
        }
        assert!((out - 120.0).abs() < 1.0);
    }

    #[test]
    fn test_smooths_noise() {
        let mut filter = KalmanFilter::new();
        // Deterministic +/- wobble around 100.
        let mut spread = (f32::MIN, f32::MAX);
        for i in 0..200 {
            let noise = if i % 2 == 0 { 10.0 } else { -10.0 };
            let out = filter.update(100.0 + noise);
            if i > 50 {
                spread.0 = spread.0.max(out);
                spread.1 = spread.1.min(out);
            }
        }
        // Output wobble must be well under the input wobble.
        assert!(spread.0 - spread.1 < 12.0);
    }

    #[test]
    fn test_reset() {
        let mut filter = KalmanFilter::new();
        filter.update(50.0);
        filter.reset();
        assert_eq!(filter.estimate(), 0.0);
    }
}
