//! Frame sampler: reduces a raw RGBA frame to one photometric sample.
//!
//! Scans a centered ROI, keeps only red-dominant pixels (fingertip over a
//! torch is strongly red), and accumulates channel statistics plus a 3x3
//! edge-kernel texture score used downstream to reject textured non-finger
//! objects. Degenerate frames come back as a rejected zero sample, never as
//! an error.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::PpgError;
use crate::frame::roi::RoiRect;

/// Sampler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// ROI side as a fraction of the smaller frame dimension (0.25-0.6 useful).
    pub roi_fraction: f32,
    /// A pixel is retained when red exceeds both green and blue by this ratio.
    /// Higher = more specific, lower = more sensitive.
    pub red_dominance_ratio: f32,
    /// Minimum retained-pixel count for a frame to be accepted.
    pub min_valid_pixels: usize,
    /// Minimum retained coverage as a fraction of ROI area.
    pub min_coverage: f32,
    /// Minimum red-channel contrast (max - min over retained pixels).
    pub min_contrast: f32,
    /// Rolling history length feeding the adaptive gain.
    pub gain_history: usize,
    /// Red level the gain pulls weak signals toward.
    pub gain_target: f32,
    /// Gain is never applied below this mean level (do not amplify noise).
    pub gain_noise_floor: f32,
    /// Upper bound on the adaptive gain.
    pub max_gain: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            roi_fraction: 0.4,
            red_dominance_ratio: 1.3,
            min_valid_pixels: 50,
            min_coverage: 0.05,
            min_contrast: 8.0,
            gain_history: 10,
            gain_target: 120.0,
            gain_noise_floor: 15.0,
            max_gain: 3.0,
        }
    }
}

/// One frame reduced to a photometric sample plus auxiliary descriptors.
/// Produced once per frame and consumed immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrameSample {
    /// Mean red over retained pixels, after adaptive gain. Zero when rejected.
    pub red_value: f32,
    /// Mean red before adaptive gain; ratio-based consumers must use this so
    /// the gain does not skew one channel against the others.
    pub red_raw: f32,
    /// Mean green over retained pixels (ungained).
    pub green_value: f32,
    /// Mean blue over retained pixels (ungained).
    pub blue_value: f32,
    /// Normalized 3x3 edge-kernel response over the ROI, 0 (flat) to 1.
    pub texture_score: f32,
    pub red_green_ratio: f32,
    pub red_blue_ratio: f32,
    /// Retained pixels as a fraction of ROI area.
    pub coverage: f32,
    /// Mean luminance over the whole ROI (exposure advisories).
    pub brightness: f32,
    pub roi: RoiRect,
    /// False when the frame failed the rejection gates.
    pub accepted: bool,
}

impl RawFrameSample {
    fn rejected(roi: RoiRect, brightness: f32, texture_score: f32) -> Self {
        Self {
            red_value: 0.0,
            red_raw: 0.0,
            green_value: 0.0,
            blue_value: 0.0,
            texture_score,
            red_green_ratio: 0.0,
            red_blue_ratio: 0.0,
            coverage: 0.0,
            brightness,
            roi,
            accepted: false,
        }
    }
}

/// Per-frame sampler with a short adaptive-gain history.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    config: SamplerConfig,
    /// Pre-gain red means of recently accepted frames.
    history: VecDeque<f32>,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::with_config(SamplerConfig::default())
    }

    pub fn with_config(config: SamplerConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.gain_history),
            config,
        }
    }

    /// Reduce one interleaved RGBA8888 frame to a sample.
    ///
    /// Deterministic given the same frame bytes and the same gain history.
    pub fn sample(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<RawFrameSample, PpgError> {
        if width == 0 || height == 0 {
            return Err(PpgError::DegenerateFrame { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if frame.len() < expected {
            return Err(PpgError::FrameGeometry {
                width,
                height,
                expected,
                actual: frame.len(),
            });
        }

        let roi = RoiRect::centered(width, height, self.config.roi_fraction);
        if roi.is_empty() {
            return Err(PpgError::DegenerateFrame { width, height });
        }

        let stride = width as usize * 4;
        let ratio = self.config.red_dominance_ratio;

        let mut red_sum = 0.0f64;
        let mut green_sum = 0.0f64;
        let mut blue_sum = 0.0f64;
        let mut retained = 0usize;
        let mut red_min = f32::MAX;
        let mut red_max = f32::MIN;
        let mut luma_sum = 0.0f64;

        for dy in 0..roi.height {
            let row = (roi.y + dy) as usize * stride;
            for dx in 0..roi.width {
                let idx = row + (roi.x + dx) as usize * 4;
                let r = frame[idx] as f32;
                let g = frame[idx + 1] as f32;
                let b = frame[idx + 2] as f32;

                luma_sum += (0.299 * r + 0.587 * g + 0.114 * b) as f64;

                if r > ratio * g && r > ratio * b {
                    red_sum += r as f64;
                    green_sum += g as f64;
                    blue_sum += b as f64;
                    retained += 1;
                    red_min = red_min.min(r);
                    red_max = red_max.max(r);
                }
            }
        }

        let area = roi.area() as f32;
        let brightness = (luma_sum / area as f64) as f32;
        let texture = self.texture_score(frame, stride, &roi);
        let coverage = retained as f32 / area;

        let contrast_ok = retained > 0 && (red_max - red_min) >= self.config.min_contrast;
        if retained < self.config.min_valid_pixels
            || coverage < self.config.min_coverage
            || !contrast_ok
        {
            return Ok(RawFrameSample::rejected(roi, brightness, texture));
        }

        let inv = 1.0 / retained as f32;
        let red_mean = (red_sum as f32) * inv;
        let green_mean = (green_sum as f32) * inv;
        let blue_mean = (blue_sum as f32) * inv;

        // Gain uses only the history of *prior* accepted frames, so the
        // output is deterministic for (frame, history).
        let gain = self.adaptive_gain();
        self.history.push_back(red_mean);
        if self.history.len() > self.config.gain_history {
            self.history.pop_front();
        }

        Ok(RawFrameSample {
            red_value: red_mean * gain,
            red_raw: red_mean,
            green_value: green_mean,
            blue_value: blue_mean,
            texture_score: texture,
            red_green_ratio: red_mean / green_mean.max(1e-3),
            red_blue_ratio: red_mean / blue_mean.max(1e-3),
            coverage,
            brightness,
            roi,
            accepted: true,
        })
    }

    /// Boost weak-but-present signals toward the target level; never amplify
    /// near-zero noise, never attenuate.
    fn adaptive_gain(&self) -> f32 {
        if self.history.is_empty() {
            return 1.0;
        }
        let mean = self.history.iter().sum::<f32>() / self.history.len() as f32;
        if mean < self.config.gain_noise_floor {
            return 1.0;
        }
        (self.config.gain_target / mean).clamp(1.0, self.config.max_gain)
    }

    /// Mean absolute 3x3 Laplacian response over the red channel, subsampled
    /// for cost, normalized to 0..1. Flat surfaces score near zero; cloth,
    /// print and other textured non-finger objects score high.
    fn texture_score(&self, frame: &[u8], stride: usize, roi: &RoiRect) -> f32 {
        if roi.width < 3 || roi.height < 3 {
            return 0.0;
        }

        let mut acc = 0.0f64;
        let mut count = 0usize;

        let mut dy = 1;
        while dy + 1 < roi.height {
            let y = (roi.y + dy) as usize;
            let mut dx = 1;
            while dx + 1 < roi.width {
                let x = (roi.x + dx) as usize;
                let center = frame[y * stride + x * 4] as f32;

                let mut neighbors = 0.0f32;
                for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        if ny == y && nx == x {
                            continue;
                        }
                        neighbors += frame[ny * stride + nx * 4] as f32;
                    }
                }

                acc += (8.0 * center - neighbors).abs() as f64;
                count += 1;
                dx += 2;
            }
            dy += 2;
        }

        if count == 0 {
            return 0.0;
        }
        ((acc / count as f64) / (8.0 * 255.0) as f64) as f32
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}
