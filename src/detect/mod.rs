//! Detection layer: calibration, trend scoring, biophysical validation and
//! the fused finger-presence decision with hysteresis.

mod biophysical;
mod calibration;
mod fusion;
mod trend;

pub use biophysical::{BiophysicalConfig, BiophysicalScores, BiophysicalValidator};
pub use calibration::{CalibrationConfig, CalibrationHandler, CalibrationState};
pub use fusion::{
    Detection, DetectionState, DetectorScores, FusionConfig, SignalAnalyzer,
};
pub use trend::{TrendAnalyzer, TrendClass, TrendConfig, TrendScores};

/// Trapezoid band score: 0 at or outside `(zero_lo, zero_hi)`, 1 inside
/// `[opt_lo, opt_hi]`, linear ramps between. Marginal values degrade
/// gracefully instead of flipping binary.
pub(crate) fn band_score(x: f32, zero_lo: f32, opt_lo: f32, opt_hi: f32, zero_hi: f32) -> f32 {
    if !x.is_finite() || x <= zero_lo || x >= zero_hi {
        0.0
    } else if x < opt_lo {
        (x - zero_lo) / (opt_lo - zero_lo)
    } else if x <= opt_hi {
        1.0
    } else {
        (zero_hi - x) / (zero_hi - opt_hi)
    }
}

#[cfg(test)]
mod tests {
    use super::band_score;

    #[test]
    fn test_band_score_shape() {
        assert_eq!(band_score(0.5, 1.0, 2.0, 4.0, 6.0), 0.0);
        assert_eq!(band_score(3.0, 1.0, 2.0, 4.0, 6.0), 1.0);
        assert_eq!(band_score(7.0, 1.0, 2.0, 4.0, 6.0), 0.0);
        let rising = band_score(1.5, 1.0, 2.0, 4.0, 6.0);
        assert!((rising - 0.5).abs() < 1e-6);
        let falling = band_score(5.0, 1.0, 2.0, 4.0, 6.0);
        assert!((falling - 0.5).abs() < 1e-6);
    }
}
