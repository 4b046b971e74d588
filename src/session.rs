//! Processing session: owns every pipeline stage and runs a full frame
//! through them synchronously.
//!
//! One frame in, one [`VitalSignsSnapshot`] out. All state is exclusively
//! owned by the session; concurrent sessions are fully independent. The
//! caller is expected to drop frames rather than queue them when the camera
//! outpaces processing; stale biometric samples have no value.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::detect::{
    BiophysicalValidator, CalibrationHandler, DetectorScores, SignalAnalyzer, TrendAnalyzer,
};
use crate::dsp::{KalmanFilter, SavitzkyGolay};
use crate::error::{PpgError, SignalWarning};
use crate::event::{EventSink, PipelineEvent, TracingSink};
use crate::frame::{FrameSampler, RawFrameSample, RoiRect};
use crate::physio::{
    ArrhythmiaDetector, ArrhythmiaStatus, BeatExtractor, BloodPressureEstimator,
    BloodPressureReading, Spo2Estimator,
};

/// Externally visible per-frame aggregate. Rebuilt fresh every frame,
/// never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSignsSnapshot {
    /// Beats per minute; 0 until enough beats are observed.
    pub heart_rate: u32,
    /// Percent 0-100; 0 until the SpO2 window fills.
    pub spo2: u32,
    pub blood_pressure: BloodPressureReading,
    pub arrhythmia: ArrhythmiaStatus,
    /// 0-100; 0 whenever no finger is detected.
    pub signal_quality: u8,
    pub finger_detected: bool,
    pub roi: RoiRect,
    pub frames_processed: u64,
    pub is_calibrated: bool,
}

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Running,
    Stopped,
}

/// Single-subject, single-session processing pipeline.
pub struct Session {
    config: PipelineConfig,
    phase: SessionPhase,
    sampler: FrameSampler,
    calibration: CalibrationHandler,
    kalman: KalmanFilter,
    savgol: SavitzkyGolay,
    trend: TrendAnalyzer,
    biophysical: BiophysicalValidator,
    analyzer: SignalAnalyzer,
    beats: BeatExtractor,
    arrhythmia: ArrhythmiaDetector,
    blood_pressure: BloodPressureEstimator,
    spo2: Spo2Estimator,
    sink: Box<dyn EventSink>,
    frames_processed: u64,
    /// Recent RR intervals backing the reported heart rate.
    rr_window: VecDeque<f32>,
    last_bp: BloodPressureReading,
    low_light_active: bool,
    overexposed_active: bool,
    weak_signal_active: bool,
}

impl Session {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_sink(config, Box::new(TracingSink))
    }

    pub fn with_sink(config: PipelineConfig, sink: Box<dyn EventSink>) -> Self {
        Self {
            sampler: FrameSampler::with_config(config.sampler.clone()),
            calibration: CalibrationHandler::with_config(config.calibration.clone()),
            kalman: KalmanFilter::with_config(config.kalman),
            savgol: SavitzkyGolay::new(),
            trend: TrendAnalyzer::with_config(config.trend.clone()),
            biophysical: BiophysicalValidator::with_config(config.biophysical.clone()),
            analyzer: SignalAnalyzer::with_config(config.fusion.clone()),
            beats: BeatExtractor::with_config(config.beats.clone()),
            arrhythmia: ArrhythmiaDetector::with_config(config.hrv.clone()),
            blood_pressure: BloodPressureEstimator::with_config(config.blood_pressure.clone()),
            spo2: Spo2Estimator::with_config(config.spo2.clone()),
            sink,
            phase: SessionPhase::Idle,
            frames_processed: 0,
            rr_window: VecDeque::with_capacity(config.heart_rate.rr_window),
            last_bp: BloodPressureReading::NotReady,
            low_light_active: false,
            overexposed_active: false,
            weak_signal_active: false,
            config,
        }
    }

    /// Re-initialize: identical to [`reset`](Self::reset) plus returning to
    /// the idle phase. Re-entrant.
    pub fn initialize(&mut self) {
        self.reset();
    }

    pub fn start(&mut self) {
        self.phase = SessionPhase::Running;
        debug!("session started");
    }

    pub fn stop(&mut self) {
        self.phase = SessionPhase::Stopped;
        debug!("session stopped");
    }

    /// Restart only the calibration window; filters and buffers keep going.
    pub fn calibrate(&mut self) {
        self.calibration.reset();
    }

    /// Return every stage to its initial zero/empty form. Any frame result
    /// produced concurrently with a reset is meaningless and discarded by
    /// contract; nothing survives into the next session.
    pub fn reset(&mut self) {
        self.sampler.reset();
        self.calibration.reset();
        self.kalman.reset();
        self.savgol.reset();
        self.trend.reset();
        self.biophysical.reset();
        self.analyzer.reset();
        self.beats.reset();
        self.arrhythmia.reset();
        self.blood_pressure.reset();
        self.spo2.reset();
        self.frames_processed = 0;
        self.rr_window.clear();
        self.last_bp = BloodPressureReading::NotReady;
        self.low_light_active = false;
        self.overexposed_active = false;
        self.weak_signal_active = false;
        self.phase = SessionPhase::Idle;
        debug!("session reset");
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.is_calibrated()
    }

    /// Run one interleaved RGBA8888 frame through the whole pipeline.
    ///
    /// Deterministic: the same frame/timestamp sequence on a freshly reset
    /// session yields an identical snapshot sequence.
    pub fn submit_frame(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        timestamp_ms: u64,
    ) -> Result<VitalSignsSnapshot, PpgError> {
        if self.phase != SessionPhase::Running {
            return Err(PpgError::NotRunning);
        }

        let sample = match self.sampler.sample(frame, width, height) {
            Ok(sample) => sample,
            Err(err) => {
                self.emit_event(PipelineEvent::Warning(SignalWarning::ProcessingError));
                return Err(err);
            }
        };
        self.frames_processed += 1;
        self.exposure_advisories(&sample);

        if !sample.red_value.is_finite() {
            self.emit_event(PipelineEvent::Warning(SignalWarning::ProcessingError));
            return Err(PpgError::NonFiniteSample);
        }

        if self.calibration.observe(sample.red_value) {
            let event = {
                let state = self.calibration.state();
                PipelineEvent::CalibrationComplete {
                    baseline_mean: state.baseline_mean,
                    min_threshold: state.min_threshold,
                    max_threshold: state.max_threshold,
                }
            };
            self.emit_event(event);
        }

        // Rejected frames run through the chain as zero samples so the
        // detectors see the signal disappear instead of freezing.
        let filtered = self.savgol.push(self.kalman.update(sample.red_value));
        let trend = self.trend.push(filtered);
        let bio = self.biophysical.assess(
            filtered,
            sample.red_green_ratio,
            sample.red_blue_ratio,
        );

        // Non-physiological trends down-weight periodicity; they never
        // hard-reject, so the hysteresis machine stays in charge.
        let scores = DetectorScores {
            red_channel: self.calibration.state().red_channel_score(sample.red_value),
            stability: trend.stability,
            pulsatility: bio.pulsatility,
            biophysical: bio.ratio_plausibility,
            periodicity: trend.periodicity * (0.3 + 0.7 * trend.plausibility),
        };

        let detection = self
            .analyzer
            .evaluate(&scores, sample.texture_score, timestamp_ms);
        if detection.just_changed {
            let event = if detection.finger_detected {
                PipelineEvent::FingerDetected {
                    quality: detection.quality,
                }
            } else {
                // Stale intervals must not seed the next contact.
                self.rr_window.clear();
                PipelineEvent::FingerLost
            };
            self.emit_event(event);
        }

        if detection.finger_detected {
            if let Some(beat) = self.beats.push(timestamp_ms, filtered) {
                if let Some(rr) = beat.rr_ms {
                    self.rr_window.push_back(rr);
                    if self.rr_window.len() > self.config.heart_rate.rr_window {
                        self.rr_window.pop_front();
                    }
                    if let Some(analysis) = self.arrhythmia.push_rr(rr) {
                        if analysis.just_confirmed {
                            self.emit_event(PipelineEvent::ArrhythmiaChanged {
                                kind: analysis.status.kind,
                                severity: analysis.status.severity,
                            });
                        }
                    }
                }
                self.last_bp = self.blood_pressure.estimate(
                    self.beats.samples_seen(),
                    self.beats.peaks(),
                    self.beats.valleys(),
                );
            }
            self.spo2.push(sample.red_raw, sample.blue_value);
            self.weak_signal_advisory(detection.quality);
        }

        let heart_rate = if detection.finger_detected
            && self.rr_window.len() >= self.config.heart_rate.min_beats
        {
            let mean_rr =
                self.rr_window.iter().sum::<f32>() / self.rr_window.len() as f32;
            (60_000.0 / mean_rr.max(1.0)).round() as u32
        } else {
            0
        };

        Ok(VitalSignsSnapshot {
            heart_rate,
            spo2: if detection.finger_detected {
                self.spo2.estimate().unwrap_or(0)
            } else {
                0
            },
            blood_pressure: if detection.finger_detected {
                self.last_bp
            } else {
                BloodPressureReading::NotReady
            },
            arrhythmia: self.arrhythmia.status(),
            signal_quality: detection.quality,
            finger_detected: detection.finger_detected,
            roi: sample.roi,
            frames_processed: self.frames_processed,
            is_calibrated: self.calibration.is_calibrated(),
        })
    }

    /// Debounced LOW_LIGHT / OVEREXPOSED advisories: one event per onset,
    /// cleared with a small margin so flicker does not spam the sink.
    fn exposure_advisories(&mut self, sample: &RawFrameSample) {
        let low = self.config.exposure.low_light_below;
        let high = self.config.exposure.overexposed_above;

        if sample.brightness < low {
            if !self.low_light_active {
                self.low_light_active = true;
                self.emit_event(PipelineEvent::Warning(SignalWarning::LowLight));
            }
        } else if sample.brightness > low + 10.0 {
            self.low_light_active = false;
        }

        if sample.brightness > high {
            if !self.overexposed_active {
                self.overexposed_active = true;
                self.emit_event(PipelineEvent::Warning(SignalWarning::Overexposed));
            }
        } else if sample.brightness < high - 10.0 {
            self.overexposed_active = false;
        }
    }

    fn weak_signal_advisory(&mut self, quality: u8) {
        if quality < 30 {
            if !self.weak_signal_active {
                self.weak_signal_active = true;
                self.emit_event(PipelineEvent::Warning(SignalWarning::WeakSignal));
            }
        } else if quality >= 40 {
            self.weak_signal_active = false;
        }
    }

    /// Deliver one event to the sink, containing any panic it raises. A sink
    /// failure is reported back through the same channel as a
    /// [`SignalWarning::CallbackError`] so callers can observe it; processing
    /// is never affected.
    fn emit_event(&mut self, event: PipelineEvent) {
        if Self::guarded_emit(self.sink.as_mut(), &event) {
            return;
        }
        warn!(?event, "event sink panicked while consuming event");
        let fallback = PipelineEvent::Warning(SignalWarning::CallbackError);
        if !Self::guarded_emit(self.sink.as_mut(), &fallback) {
            warn!("event sink panicked again; callback-error warning dropped");
        }
    }

    fn guarded_emit(sink: &mut dyn EventSink, event: &PipelineEvent) -> bool {
        catch_unwind(AssertUnwindSafe(|| sink.emit(event))).is_ok()
    }
}
