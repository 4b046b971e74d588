//! HRV metrics and arrhythmia classification over RR intervals.
//!
//! Holds a capacity-bounded RR ring buffer. Arrhythmia is asserted only
//! when multiple independent conditions co-occur (conjunctive gate), and a
//! reported state *change* additionally requires several consecutive
//! analyses to agree, mirroring the finger-detection hysteresis.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrvConfig {
    /// RR ring-buffer capacity (FIFO eviction).
    pub capacity: usize,
    /// Minimum intervals before any analysis runs.
    pub min_intervals: usize,
    /// RMSSD above this is "elevated" (ms).
    pub rmssd_threshold_ms: f32,
    /// SDNN above this is "elevated" (ms).
    pub sdnn_threshold_ms: f32,
    /// pNN50 above this is "elevated" (fraction).
    pub pnn50_threshold: f32,
    /// Normalized Shannon entropy above this is "elevated".
    pub shannon_threshold: f32,
    /// Sample entropy above this is "elevated".
    pub sample_entropy_threshold: f32,
    /// Last-RR deviation from the series mean flagging a premature beat.
    pub premature_deviation: f32,
    /// Mean-HR bounds for the rate-based classifications.
    pub bradycardia_bpm: f32,
    pub tachycardia_bpm: f32,
    /// Consecutive agreeing analyses before a state change is reported.
    pub confirm_cycles: u32,
    /// Bin width for the discrete RR distribution (Shannon entropy).
    pub entropy_bin_ms: f32,
    /// Sample-entropy tolerance r = factor * SDNN.
    pub sample_entropy_tolerance: f32,
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            min_intervals: 20,
            rmssd_threshold_ms: 50.0,
            sdnn_threshold_ms: 70.0,
            pnn50_threshold: 0.30,
            shannon_threshold: 0.70,
            sample_entropy_threshold: 1.2,
            premature_deviation: 0.25,
            bradycardia_bpm: 50.0,
            tachycardia_bpm: 110.0,
            confirm_cycles: 3,
            entropy_bin_ms: 50.0,
            sample_entropy_tolerance: 0.2,
        }
    }
}

/// Time-domain and entropy HRV metrics for the current RR series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvMetrics {
    pub mean_rr_ms: f32,
    pub mean_hr_bpm: f32,
    pub rmssd_ms: f32,
    pub sdnn_ms: f32,
    pub pnn50: f32,
    /// Shannon entropy of the binned RR distribution, normalized to [0, 1].
    pub shannon_entropy: f32,
    /// Sample entropy (m = 2, r = tolerance * SDNN).
    pub sample_entropy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrhythmiaKind {
    None,
    Bradycardia,
    Tachycardia,
    FibrillationPattern,
    SinusArrhythmia,
    EctopicPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    None,
    Minor,
    Moderate,
    Severe,
}

/// Debounced, externally reported arrhythmia state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrhythmiaStatus {
    pub kind: ArrhythmiaKind,
    pub severity: Severity,
    /// Consecutive analyses agreeing with this state.
    pub confirmed_cycles: u32,
}

impl ArrhythmiaStatus {
    pub fn none() -> Self {
        Self {
            kind: ArrhythmiaKind::None,
            severity: Severity::None,
            confirmed_cycles: 0,
        }
    }

    pub fn has_arrhythmia(&self) -> bool {
        self.kind != ArrhythmiaKind::None
    }
}

/// One analysis cycle's full output. Superseded each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrhythmiaAnalysis {
    /// Instantaneous (pre-debounce) assertion from the conjunctive gate.
    pub has_arrhythmia: bool,
    pub kind: ArrhythmiaKind,
    pub severity: Severity,
    pub confidence: f32,
    pub risk_score: f32,
    pub premature_beat: bool,
    pub metrics: HrvMetrics,
    /// Debounced reported state after this cycle.
    pub status: ArrhythmiaStatus,
    /// True on the cycle a debounced state change took effect.
    pub just_confirmed: bool,
}

/// The conjunctive multi-signal gate: every sub-condition must hold.
/// Chosen specifically to suppress single-metric false positives.
fn conjunctive_gate(
    rmssd_high: bool,
    premature: bool,
    variability_high: bool,
    entropy_high: bool,
) -> bool {
    rmssd_high && premature && variability_high && entropy_high
}

#[derive(Debug, Clone)]
pub struct ArrhythmiaDetector {
    config: HrvConfig,
    rr: VecDeque<f32>,
    pending_kind: ArrhythmiaKind,
    pending_severity: Severity,
    agree: u32,
    status: ArrhythmiaStatus,
}

impl ArrhythmiaDetector {
    pub fn new() -> Self {
        Self::with_config(HrvConfig::default())
    }

    pub fn with_config(config: HrvConfig) -> Self {
        Self {
            rr: VecDeque::with_capacity(config.capacity),
            pending_kind: ArrhythmiaKind::None,
            pending_severity: Severity::None,
            agree: 0,
            status: ArrhythmiaStatus::none(),
            config,
        }
    }

    /// Append one RR interval (oldest-eviction) and, once the series is
    /// large enough, run a full analysis cycle.
    pub fn push_rr(&mut self, rr_ms: f32) -> Option<ArrhythmiaAnalysis> {
        if !rr_ms.is_finite() || rr_ms <= 0.0 {
            return None;
        }
        self.rr.push_back(rr_ms);
        if self.rr.len() > self.config.capacity {
            self.rr.pop_front();
        }
        if self.rr.len() < self.config.min_intervals {
            return None;
        }
        Some(self.analyze())
    }

    fn analyze(&mut self) -> ArrhythmiaAnalysis {
        let metrics = self.metrics();
        let cfg = &self.config;

        let last = *self.rr.back().unwrap_or(&metrics.mean_rr_ms);
        let deviation = if metrics.mean_rr_ms > 0.0 {
            (last - metrics.mean_rr_ms).abs() / metrics.mean_rr_ms
        } else {
            0.0
        };
        let premature_beat = deviation > cfg.premature_deviation;

        let rmssd_high = metrics.rmssd_ms > cfg.rmssd_threshold_ms;
        let variability_high =
            metrics.sdnn_ms > cfg.sdnn_threshold_ms || metrics.pnn50 > cfg.pnn50_threshold;
        let entropy_high = metrics.shannon_entropy > cfg.shannon_threshold
            || metrics.sample_entropy > cfg.sample_entropy_threshold;

        let has_arrhythmia =
            conjunctive_gate(rmssd_high, premature_beat, variability_high, entropy_high);

        // Strength of each sub-condition as a clamped excess over its
        // threshold; averaged into a 0-1 risk score.
        let excess = |value: f32, threshold: f32| -> f32 {
            if threshold <= 0.0 {
                0.0
            } else {
                (value / threshold - 1.0).clamp(0.0, 1.0)
            }
        };
        let risk_score = (excess(metrics.rmssd_ms, cfg.rmssd_threshold_ms)
            + excess(deviation, cfg.premature_deviation)
            + excess(metrics.sdnn_ms, cfg.sdnn_threshold_ms)
                .max(excess(metrics.pnn50, cfg.pnn50_threshold))
            + excess(metrics.shannon_entropy, cfg.shannon_threshold)
                .max(excess(metrics.sample_entropy, cfg.sample_entropy_threshold)))
            / 4.0;

        let (kind, severity) = if has_arrhythmia {
            let kind = self.classify(&metrics, premature_beat);
            let severity = if risk_score < 0.35 {
                Severity::Minor
            } else if risk_score < 0.7 {
                Severity::Moderate
            } else {
                Severity::Severe
            };
            (kind, severity)
        } else {
            (ArrhythmiaKind::None, Severity::None)
        };

        let confidence = if has_arrhythmia {
            0.5 + 0.5 * risk_score
        } else {
            0.5 * risk_score
        };

        // Debounce: a reported state change requires consecutive agreement.
        if kind == self.pending_kind && severity == self.pending_severity {
            self.agree = self.agree.saturating_add(1);
        } else {
            self.pending_kind = kind;
            self.pending_severity = severity;
            self.agree = 1;
        }

        let mut just_confirmed = false;
        if self.agree >= cfg.confirm_cycles {
            if self.status.kind != kind || self.status.severity != severity {
                self.status = ArrhythmiaStatus {
                    kind,
                    severity,
                    confirmed_cycles: self.agree,
                };
                just_confirmed = true;
                debug!(?kind, ?severity, "arrhythmia state confirmed");
            } else {
                self.status.confirmed_cycles = self.agree;
            }
        }

        ArrhythmiaAnalysis {
            has_arrhythmia,
            kind,
            severity,
            confidence,
            risk_score,
            premature_beat,
            metrics,
            status: self.status,
            just_confirmed,
        }
    }

    /// Fixed-priority decision list over mean heart rate and HRV metrics.
    fn classify(&self, metrics: &HrvMetrics, premature: bool) -> ArrhythmiaKind {
        let cfg = &self.config;
        if metrics.mean_hr_bpm < cfg.bradycardia_bpm {
            ArrhythmiaKind::Bradycardia
        } else if metrics.mean_hr_bpm > cfg.tachycardia_bpm {
            ArrhythmiaKind::Tachycardia
        } else if metrics.rmssd_ms > 1.5 * cfg.rmssd_threshold_ms
            && metrics.sample_entropy > cfg.sample_entropy_threshold
        {
            ArrhythmiaKind::FibrillationPattern
        } else if premature && metrics.pnn50 > cfg.pnn50_threshold {
            ArrhythmiaKind::EctopicPattern
        } else {
            ArrhythmiaKind::SinusArrhythmia
        }
    }

    fn metrics(&self) -> HrvMetrics {
        let n = self.rr.len() as f32;
        let mean_rr = self.rr.iter().sum::<f32>() / n;
        let variance = self.rr.iter().map(|x| (x - mean_rr).powi(2)).sum::<f32>() / n;
        let sdnn = variance.sqrt();

        let mut diff_sq = 0.0f32;
        let mut over_50 = 0usize;
        let mut pairs = 0usize;
        let mut prev: Option<f32> = None;
        for &rr in &self.rr {
            if let Some(p) = prev {
                let d = rr - p;
                diff_sq += d * d;
                if d.abs() > 50.0 {
                    over_50 += 1;
                }
                pairs += 1;
            }
            prev = Some(rr);
        }
        let rmssd = if pairs > 0 {
            (diff_sq / pairs as f32).sqrt()
        } else {
            0.0
        };
        let pnn50 = if pairs > 0 {
            over_50 as f32 / pairs as f32
        } else {
            0.0
        };

        HrvMetrics {
            mean_rr_ms: mean_rr,
            mean_hr_bpm: 60_000.0 / mean_rr.max(1e-3),
            rmssd_ms: rmssd,
            sdnn_ms: sdnn,
            pnn50,
            shannon_entropy: self.shannon_entropy(),
            sample_entropy: self.sample_entropy(sdnn),
        }
    }

    /// Shannon entropy over the binned RR distribution, normalized by the
    /// log of the occupied-bin count so 1.0 means a uniform spread.
    fn shannon_entropy(&self) -> f32 {
        let bin = self.config.entropy_bin_ms.max(1.0);
        // Ordered bins: the float summation order, and therefore the exact
        // result, must not vary between runs.
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for &rr in &self.rr {
            *counts.entry((rr / bin).floor() as i64).or_insert(0) += 1;
        }
        if counts.len() < 2 {
            return 0.0;
        }

        let n = self.rr.len() as f32;
        let mut h = 0.0f32;
        for &count in counts.values() {
            let p = count as f32 / n;
            h -= p * p.ln();
        }
        (h / (counts.len() as f32).ln()).clamp(0.0, 1.0)
    }

    /// Sample entropy with embedding dimension m = 2 and tolerance
    /// r = factor * SDNN (Chebyshev distance, self-matches excluded).
    fn sample_entropy(&self, sdnn: f32) -> f32 {
        const M: usize = 2;
        let n = self.rr.len();
        if n < M + 2 {
            return 0.0;
        }
        let r = (self.config.sample_entropy_tolerance * sdnn).max(1e-3);
        let rr: Vec<f32> = self.rr.iter().copied().collect();

        let matches = |m: usize| -> usize {
            let mut count = 0usize;
            let last = n - m;
            for i in 0..last {
                for j in (i + 1)..last {
                    let mut within = true;
                    for k in 0..m {
                        if (rr[i + k] - rr[j + k]).abs() > r {
                            within = false;
                            break;
                        }
                    }
                    if within {
                        count += 1;
                    }
                }
            }
            count
        };

        let b = matches(M);
        if b == 0 {
            return 0.0;
        }
        let a = matches(M + 1);
        if a == 0 {
            // No template matches at m+1: maximal irregularity, cap it.
            return 3.0;
        }
        -((a as f32) / (b as f32)).ln()
    }

    /// Debounced reported state.
    pub fn status(&self) -> ArrhythmiaStatus {
        self.status
    }

    pub fn interval_count(&self) -> usize {
        self.rr.len()
    }

    pub fn reset(&mut self) {
        self.rr.clear();
        self.pending_kind = ArrhythmiaKind::None;
        self.pending_severity = Severity::None;
        self.agree = 0;
        self.status = ArrhythmiaStatus::none();
    }
}

impl Default for ArrhythmiaDetector {
    fn default() -> Self {
        Self::new()
    }
}
