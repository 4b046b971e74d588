//! Trend analysis over the filtered waveform.
//!
//! Keeps a short rolling window and scores three aspects of it: stability
//! (normalized standard deviation), periodicity (direction-change rate) and
//! physiological plausibility (direction changes converted to an equivalent
//! heart rate). A non-physiological classification down-weights detection
//! downstream; it never hard-rejects.

use std::collections::VecDeque;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::band_score;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Rolling window length in samples.
    pub window_size: usize,
    /// Samples required before any scoring.
    pub min_samples: usize,
    /// Assumed frame rate, used to convert change counts to BPM.
    pub sample_rate: f32,
    /// Coefficient of variation at which stability reaches zero.
    pub cv_norm: f32,
    /// Direction-change deadband; differences smaller than this are flat.
    pub change_deadband: f32,
    /// Direction-change-rate band (changes/s): zero-lo, opt-lo, opt-hi, zero-hi.
    pub periodicity_band: [f32; 4],
    /// Equivalent-BPM band with penalty margins: zero-lo, opt-lo, opt-hi, zero-hi.
    pub plausibility_band: [f32; 4],
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            min_samples: 10,
            sample_rate: 30.0,
            cv_norm: 0.35,
            change_deadband: 0.01,
            periodicity_band: [0.6, 1.5, 5.5, 8.0],
            plausibility_band: [40.0, 55.0, 150.0, 180.0],
        }
    }
}

/// Composite classification gating downstream acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendClass {
    /// Window not yet filled to `min_samples`.
    Unknown,
    /// Low-variance, plausibly periodic waveform.
    Stable,
    /// Plausible band but noisy.
    Unstable,
    /// Equivalent heart rate outside the physiological band.
    NonPhysiological,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendScores {
    /// 1.0 = very low normalized variance.
    pub stability: f32,
    /// 1.0 = direction-change rate inside the target band.
    pub periodicity: f32,
    /// 1.0 = equivalent heart rate well inside 40-180 BPM.
    pub plausibility: f32,
    /// Equivalent heart rate implied by the direction-change rate.
    pub equivalent_bpm: f32,
    pub class: TrendClass,
}

impl TrendScores {
    fn unknown() -> Self {
        Self {
            stability: 0.0,
            periodicity: 0.0,
            plausibility: 0.0,
            equivalent_bpm: 0.0,
            class: TrendClass::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    config: TrendConfig,
    window: VecDeque<f32>,
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self::with_config(TrendConfig::default())
    }

    pub fn with_config(config: TrendConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window_size),
            config,
        }
    }

    /// Fold one filtered sample into the window and score it.
    pub fn push(&mut self, filtered: f32) -> TrendScores {
        self.window.push_back(filtered);
        if self.window.len() > self.config.window_size {
            self.window.pop_front();
        }
        if self.window.len() < self.config.min_samples {
            return TrendScores::unknown();
        }

        let values: Array1<f32> = self.window.iter().copied().collect();
        let mean = values.mean().unwrap_or(0.0);
        let std = values.std(0.0);

        let stability = if mean.abs() < 1e-3 {
            0.0
        } else {
            (1.0 - (std / mean.abs()) / self.config.cv_norm).clamp(0.0, 1.0)
        };

        let changes = self.direction_changes();
        let changes_per_sec =
            changes as f32 * self.config.sample_rate / (self.window.len() - 1) as f32;

        let [pz_lo, po_lo, po_hi, pz_hi] = self.config.periodicity_band;
        let periodicity = band_score(changes_per_sec, pz_lo, po_lo, po_hi, pz_hi);

        // Two direction changes per cardiac cycle (one peak, one trough).
        let equivalent_bpm = changes_per_sec * 30.0;
        let [bz_lo, bo_lo, bo_hi, bz_hi] = self.config.plausibility_band;
        let plausibility = band_score(equivalent_bpm, bz_lo, bo_lo, bo_hi, bz_hi);

        let class = if self.window.len() == self.config.window_size && plausibility == 0.0 {
            TrendClass::NonPhysiological
        } else if stability >= 0.5 && periodicity > 0.2 {
            TrendClass::Stable
        } else {
            TrendClass::Unstable
        };

        TrendScores {
            stability,
            periodicity,
            plausibility,
            equivalent_bpm,
            class,
        }
    }

    fn direction_changes(&self) -> usize {
        let deadband = self.config.change_deadband;
        let mut changes = 0usize;
        let mut last_sign = 0i8;
        let mut prev = None;

        for &v in &self.window {
            if let Some(p) = prev {
                let diff: f32 = v - p;
                if diff.abs() > deadband {
                    let sign = if diff > 0.0 { 1 } else { -1 };
                    if last_sign != 0 && sign != last_sign {
                        changes += 1;
                    }
                    last_sign = sign;
                }
            }
            prev = Some(v);
        }
        changes
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
