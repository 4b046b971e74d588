//! Savitzky-Golay FIR smoother.
//!
//! 9-tap quadratic/cubic least-squares coefficients, normalized to unit
//! gain. Suppresses noise while preserving pulse-peak shape better than a
//! moving average. Until the window fills the input passes through
//! unsmoothed; that startup transient is intentional.

use std::collections::VecDeque;

/// 9-point quadratic/cubic Savitzky-Golay smoothing coefficients.
/// Divisor 231 gives unit DC gain.
const COEFFS: [f32; 9] = [-21.0, 14.0, 39.0, 54.0, 59.0, 54.0, 39.0, 14.0, -21.0];
const NORM: f32 = 231.0;

#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: VecDeque<f32>,
}

impl SavitzkyGolay {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(COEFFS.len()),
        }
    }

    /// Number of taps.
    pub fn window_len() -> usize {
        COEFFS.len()
    }

    /// Push one sample, returning the smoothed value (or the raw input while
    /// the window is still filling).
    pub fn push(&mut self, value: f32) -> f32 {
        self.window.push_back(value);
        if self.window.len() > COEFFS.len() {
            self.window.pop_front();
        }
        if self.window.len() < COEFFS.len() {
            return value;
        }

        let mut acc = 0.0f32;
        for (w, &c) in self.window.iter().zip(COEFFS.iter()) {
            acc += w * c;
        }
        acc / NORM
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for SavitzkyGolay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_during_warmup() {
        let mut sg = SavitzkyGolay::new();
        for i in 0..(SavitzkyGolay::window_len() - 1) {
            let v = i as f32 * 3.0;
            assert_eq!(sg.push(v), v);
        }
    }

    #[test]
    fn test_unit_gain_on_constant() {
        let mut sg = SavitzkyGolay::new();
        let mut out = 0.0;
        for _ in 0..20 {
            out = sg.push(42.0);
        }
        assert!((out - 42.0).abs() < 1e-3);
    }

    #[test]
    fn test_attenuates_alternating_noise() {
        let mut sg = SavitzkyGolay::new();
        let mut last = 0.0;
        for i in 0..40 {
            let v = 100.0 + if i % 2 == 0 { 8.0 } else { -8.0 };
            last = sg.push(v);
        }
        // Alternating (Nyquist) noise is strongly suppressed.
        assert!((last - 100.0).abs() < 3.0);
    }

    #[test]
    fn test_reset_restores_passthrough() {
        let mut sg = SavitzkyGolay::new();
        for _ in 0..20 {
            sg.push(10.0);
        }
        sg.reset();
        assert_eq!(sg.push(77.0), 77.0);
    }
}
