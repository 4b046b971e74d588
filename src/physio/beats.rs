//! Beat detection and RR-interval extraction.
//!
//! A sample is a peak when strictly greater than every sample within +/-W
//! around it and above an amplitude threshold; valleys are symmetric with
//! strictly-less. RR intervals use wall-clock timestamps, not frame index,
//! so variable frame rate does not skew them. Peaks inside the refractory
//! distance of an accepted peak are discarded (dicrotic-notch guard).

use std::collections::VecDeque;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatConfig {
    /// Half-window W: a peak must dominate W samples on each side.
    pub window_half: usize,
    /// Rolling window feeding the amplitude threshold.
    pub stats_window: usize,
    /// Amplitude threshold = mean + k * std over the stats window.
    pub amplitude_k: f32,
    /// Minimum spacing between accepted peaks (physiological refractory).
    pub refractory_ms: u64,
    /// RR intervals above this are treated as a gap, not an interval.
    pub max_rr_ms: u64,
    /// Recent peaks/valleys retained for downstream consumers.
    pub event_history: usize,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            window_half: 7,
            stats_window: 45,
            amplitude_k: 0.3,
            refractory_ms: 250,
            max_rr_ms: 3000,
            event_history: 12,
        }
    }
}

/// One accepted heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// Timestamp of the peak sample itself.
    pub timestamp_ms: u64,
    /// Filtered value at the peak.
    pub amplitude: f32,
    /// Interval to the previous accepted peak, when plausible.
    pub rr_ms: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct BeatExtractor {
    config: BeatConfig,
    /// Centered candidate window of (timestamp, value), length 2W+1.
    window: VecDeque<(u64, f32)>,
    /// Longer window feeding the amplitude threshold.
    stats: VecDeque<f32>,
    last_peak_ms: Option<u64>,
    last_valley_ms: Option<u64>,
    peaks: VecDeque<(u64, f32)>,
    valleys: VecDeque<(u64, f32)>,
    samples_seen: usize,
}

impl BeatExtractor {
    pub fn new() -> Self {
        Self::with_config(BeatConfig::default())
    }

    pub fn with_config(config: BeatConfig) -> Self {
        Self {
            window: VecDeque::with_capacity(config.window_half * 2 + 2),
            stats: VecDeque::with_capacity(config.stats_window),
            last_peak_ms: None,
            last_valley_ms: None,
            peaks: VecDeque::with_capacity(config.event_history),
            valleys: VecDeque::with_capacity(config.event_history),
            samples_seen: 0,
            config,
        }
    }

    /// Push one filtered sample; returns a beat when the sample W frames ago
    /// is confirmed as a peak.
    pub fn push(&mut self, timestamp_ms: u64, value: f32) -> Option<BeatEvent> {
        self.samples_seen += 1;

        self.window.push_back((timestamp_ms, value));
        let full = self.config.window_half * 2 + 1;
        if self.window.len() > full {
            self.window.pop_front();
        }

        self.stats.push_back(value);
        if self.stats.len() > self.config.stats_window {
            self.stats.pop_front();
        }

        if self.window.len() < full {
            return None;
        }

        let center = self.config.window_half;
        let (ts, v) = self.window[center];

        let values: Array1<f32> = self.stats.iter().copied().collect();
        let mean = values.mean().unwrap_or(0.0);
        let std = values.std(0.0);

        let is_peak = v > mean + self.config.amplitude_k * std
            && self
                .window
                .iter()
                .enumerate()
                .all(|(i, &(_, w))| i == center || v > w);

        let is_valley = v < mean - self.config.amplitude_k * std
            && self
                .window
                .iter()
                .enumerate()
                .all(|(i, &(_, w))| i == center || v < w);

        if is_valley {
            let spaced = self
                .last_valley_ms
                .map(|t| ts.saturating_sub(t) >= self.config.refractory_ms)
                .unwrap_or(true);
            if spaced {
                self.last_valley_ms = Some(ts);
                self.valleys.push_back((ts, v));
                if self.valleys.len() > self.config.event_history {
                    self.valleys.pop_front();
                }
            }
            return None;
        }

        if !is_peak {
            return None;
        }

        if let Some(last) = self.last_peak_ms {
            if ts.saturating_sub(last) < self.config.refractory_ms {
                // Dicrotic notch or noise riding the same beat.
                return None;
            }
        }

        let rr_ms = self.last_peak_ms.and_then(|last| {
            let delta = ts.saturating_sub(last);
            (delta >= self.config.refractory_ms && delta <= self.config.max_rr_ms)
                .then_some(delta as f32)
        });

        self.last_peak_ms = Some(ts);
        self.peaks.push_back((ts, v));
        if self.peaks.len() > self.config.event_history {
            self.peaks.pop_front();
        }

        Some(BeatEvent {
            timestamp_ms: ts,
            amplitude: v,
            rr_ms,
        })
    }

    /// Recent accepted peaks, oldest first.
    pub fn peaks(&self) -> &VecDeque<(u64, f32)> {
        &self.peaks
    }

    /// Recent accepted valleys, oldest first.
    pub fn valleys(&self) -> &VecDeque<(u64, f32)> {
        &self.valleys
    }

    /// Samples pushed since creation or reset.
    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.stats.clear();
        self.last_peak_ms = None;
        self.last_valley_ms = None;
        self.peaks.clear();
        self.valleys.clear();
        self.samples_seen = 0;
    }
}

impl Default for BeatExtractor {
    fn default() -> Self {
        Self::new()
    }
}
