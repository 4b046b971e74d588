//! Blood-pressure estimation from pulse-transit-time proxies.
//!
//! Inter-peak spacing (clamped to a physiological band, later intervals
//! weighted more) and mean peak-minus-valley amplitude feed a fixed linear
//! model producing instantaneous systolic/diastolic values; the reported
//! value is an exponentially-weighted average over a short buffer of those.
//! A "not ready" sentinel and an untrusted mid-range default are explicitly
//! distinguished from real estimates.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodPressureConfig {
    /// Minimum filtered samples observed before any estimate.
    pub min_samples: usize,
    /// Pulse-transit-time proxy clamp (ms).
    pub ptt_min_ms: f32,
    pub ptt_max_ms: f32,
    /// Peak-minus-valley amplitude clamp.
    pub amplitude_min: f32,
    pub amplitude_max: f32,
    /// Linear model: systolic = base + ptt_coeff * ptt + amp_coeff * amp_norm.
    pub systolic_base: f32,
    pub systolic_ptt_coeff: f32,
    pub systolic_amp_coeff: f32,
    /// Pulse pressure = pp_base + pp_amp_coeff * amp_norm, clamped to the band.
    pub pp_base: f32,
    pub pp_amp_coeff: f32,
    /// Hard output clamps (mmHg).
    pub systolic_range: [f32; 2],
    pub diastolic_range: [f32; 2],
    pub pulse_pressure_range: [f32; 2],
    /// EWMA decay toward the newest instantaneous estimate.
    pub ewma_alpha: f32,
    /// Instantaneous-estimate buffer capacity.
    pub history: usize,
}

impl Default for BloodPressureConfig {
    fn default() -> Self {
        Self {
            min_samples: 30,
            ptt_min_ms: 300.0,
            ptt_max_ms: 1200.0,
            amplitude_min: 1.0,
            amplitude_max: 50.0,
            systolic_base: 184.0,
            systolic_ptt_coeff: -0.107,
            systolic_amp_coeff: 8.0,
            pp_base: 32.0,
            pp_amp_coeff: 20.0,
            systolic_range: [90.0, 180.0],
            diastolic_range: [60.0, 110.0],
            pulse_pressure_range: [20.0, 80.0],
            ewma_alpha: 0.7,
            history: 10,
        }
    }
}

/// Systolic/diastolic pair in mmHg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: u32,
    pub diastolic: u32,
}

/// A reading explicitly distinguishing trust levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodPressureReading {
    /// Not enough data yet.
    NotReady,
    /// Enough samples but too few beats; untrusted mid-range placeholder.
    Default(BloodPressure),
    /// Derived from observed beats.
    Measured(BloodPressure),
}

impl BloodPressureReading {
    pub fn value(&self) -> Option<BloodPressure> {
        match self {
            Self::NotReady => None,
            Self::Default(bp) | Self::Measured(bp) => Some(*bp),
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Self::Measured(_))
    }
}

#[derive(Debug, Clone)]
pub struct BloodPressureEstimator {
    config: BloodPressureConfig,
    /// Recent instantaneous (systolic, diastolic) estimates.
    instants: VecDeque<(f32, f32)>,
}

impl BloodPressureEstimator {
    pub fn new() -> Self {
        Self::with_config(BloodPressureConfig::default())
    }

    pub fn with_config(config: BloodPressureConfig) -> Self {
        Self {
            instants: VecDeque::with_capacity(config.history),
            config,
        }
    }

    /// Estimate from the current beat geometry.
    ///
    /// `samples_seen` is the number of filtered samples observed this
    /// session; `peaks`/`valleys` are recent accepted extrema, oldest first.
    pub fn estimate(
        &mut self,
        samples_seen: usize,
        peaks: &VecDeque<(u64, f32)>,
        valleys: &VecDeque<(u64, f32)>,
    ) -> BloodPressureReading {
        if samples_seen < self.config.min_samples {
            return BloodPressureReading::NotReady;
        }
        if peaks.len() < 2 {
            return BloodPressureReading::Default(BloodPressure {
                systolic: 120,
                diastolic: 80,
            });
        }

        let ptt = self.weighted_ptt(peaks);
        let amp_norm = self.amplitude_norm(peaks, valleys);

        let (sys, dia) = self.instantaneous(ptt, amp_norm);
        self.instants.push_back((sys, dia));
        if self.instants.len() > self.config.history {
            self.instants.pop_front();
        }

        // Chronological EWMA: newest estimate dominates but sustained
        // change still takes a few beats to settle.
        let alpha = self.config.ewma_alpha;
        let mut iter = self.instants.iter();
        let &(mut ewma_sys, mut ewma_dia) = iter.next().unwrap_or(&(sys, dia));
        for &(s, d) in iter {
            ewma_sys = alpha * s + (1.0 - alpha) * ewma_sys;
            ewma_dia = alpha * d + (1.0 - alpha) * ewma_dia;
        }

        BloodPressureReading::Measured(Self::rounded(ewma_sys, ewma_dia))
    }

    /// Later intervals weighted more heavily (linear ramp).
    fn weighted_ptt(&self, peaks: &VecDeque<(u64, f32)>) -> f32 {
        let mut weighted = 0.0f32;
        let mut weight_sum = 0.0f32;
        let mut prev: Option<u64> = None;
        let mut index = 0usize;

        for &(ts, _) in peaks {
            if let Some(p) = prev {
                let interval =
                    (ts.saturating_sub(p) as f32).clamp(self.config.ptt_min_ms, self.config.ptt_max_ms);
                let w = (index + 1) as f32;
                weighted += interval * w;
                weight_sum += w;
                index += 1;
            }
            prev = Some(ts);
        }

        if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            (self.config.ptt_min_ms + self.config.ptt_max_ms) * 0.5
        }
    }

    /// Mean peak-minus-valley amplitude, clamped and scaled to [0, 1].
    fn amplitude_norm(&self, peaks: &VecDeque<(u64, f32)>, valleys: &VecDeque<(u64, f32)>) -> f32 {
        let amp = if valleys.is_empty() {
            self.config.amplitude_min
        } else {
            let peak_mean = peaks.iter().map(|&(_, v)| v).sum::<f32>() / peaks.len() as f32;
            let valley_mean =
                valleys.iter().map(|&(_, v)| v).sum::<f32>() / valleys.len() as f32;
            peak_mean - valley_mean
        };
        let amp = amp.clamp(self.config.amplitude_min, self.config.amplitude_max);
        (amp - self.config.amplitude_min) / (self.config.amplitude_max - self.config.amplitude_min)
    }

    /// Fixed linear model with pulse-pressure and range clamps.
    fn instantaneous(&self, ptt_ms: f32, amp_norm: f32) -> (f32, f32) {
        let cfg = &self.config;
        let ptt = ptt_ms.clamp(cfg.ptt_min_ms, cfg.ptt_max_ms);
        let amp = amp_norm.clamp(0.0, 1.0);

        let sys = (cfg.systolic_base + cfg.systolic_ptt_coeff * ptt + cfg.systolic_amp_coeff * amp)
            .clamp(cfg.systolic_range[0], cfg.systolic_range[1]);

        let pp = (cfg.pp_base + cfg.pp_amp_coeff * amp)
            .clamp(cfg.pulse_pressure_range[0], cfg.pulse_pressure_range[1]);

        let dia = (sys - pp)
            .min(sys - cfg.pulse_pressure_range[0])
            .max(sys - cfg.pulse_pressure_range[1])
            .clamp(cfg.diastolic_range[0], cfg.diastolic_range[1]);

        (sys, dia)
    }

    fn rounded(sys: f32, dia: f32) -> BloodPressure {
        let sys_i = sys.round() as i32;
        // Re-enforce the pulse-pressure band after rounding.
        let dia_i = (dia.round() as i32)
            .min(sys_i - 20)
            .max(sys_i - 80)
            .clamp(60, 110);
        BloodPressure {
            systolic: sys_i as u32,
            diastolic: dia_i as u32,
        }
    }

    pub fn reset(&mut self) {
        self.instants.clear();
    }
}

impl Default for BloodPressureEstimator {
    fn default() -> Self {
        Self::new()
    }
}
