//! Temporal Correlation Engine
//!
//! ## Overview
//!
//! Fourth pipeline stage: analyzes each fused parameter's time series
//! for outliers, trends, and cumulative effects, and owns the
//! [`HistoricalBaseline`] store the earlier stages read.
//!
//! Per fused parameter:
//! 1. **Outlier test** — z-score of the fused value against the
//!    parameter's rolling window. A flagged value is replaced by a
//!    trend-based prediction at reduced confidence, *unless* the
//!    outlier confidence itself is below the configured threshold, in
//!    which case the raw value stands: a weakly supported outlier call
//!    must not overwrite possibly real data.
//! 2. **Trend descriptor** — direction, magnitude, acceleration, and
//!    periodicity from the updated history, consumed by the alert
//!    classifier for escalation (a sustained worsening trend escalates
//!    severity even below an absolute threshold).
//! 3. **Anomaly penalty** — confidence reduced proportionally to the
//!    anomaly score.
//!
//! ## Mutation Point
//!
//! Baselines mutate only at the end of this stage, in the single
//! execution context. Detectors running earlier in the *next* cycle
//! therefore see a consistent snapshot that includes this cycle.

use heapless::Vec;

use crate::baseline::HistoricalBaseline;
use crate::config::TemporalParams;
use crate::events::{FusedParameter, ParameterId};
use crate::fusion::confidence::Confidence;
use crate::fusion::MAX_FUSED;
use crate::time::Timestamp;

/// Trend direction with deadband around flat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

/// Trend descriptor for one parameter
#[derive(Debug, Clone, Copy)]
pub struct TrendDescriptor {
    pub direction: TrendDirection,
    /// Slope magnitude, units per second
    pub magnitude: f32,
    /// Change in slope between the older and newer half of the window,
    /// units per second per window-half
    pub acceleration: f32,
    /// Oscillation strength of the window (0.0-1.0)
    pub periodicity: f32,
    /// Composite anomaly score (0.0-1.0)
    pub anomaly_score: f32,
}

impl TrendDescriptor {
    const FLAT: Self = Self {
        direction: TrendDirection::Flat,
        magnitude: 0.0,
        acceleration: 0.0,
        periodicity: 0.0,
        anomaly_score: 0.0,
    };

    /// True when the parameter is getting worse fast enough to matter
    /// for escalation: rising with meaningful magnitude or positive
    /// acceleration
    pub fn is_worsening(&self) -> bool {
        self.direction == TrendDirection::Rising
            && (self.anomaly_score > 0.3 || self.acceleration > 0.0)
    }
}

/// Temporally adjusted value for one parameter
#[derive(Debug, Clone, Copy)]
pub struct TemporalAssessment {
    pub parameter: ParameterId,
    /// Fused value, possibly replaced by the trend prediction
    pub value: f32,
    /// Fusion confidence after temporal penalties
    pub confidence: Confidence,
    pub trend: TrendDescriptor,
    /// Set when the outlier substitution replaced the raw value
    pub substituted: bool,
    /// Carried through from fusion for baseline bookkeeping
    pub fallback: bool,
}

/// Temporal correlation engine; owns the baseline store
pub struct TemporalEngine {
    params: TemporalParams,
    baselines: HistoricalBaseline,
}

impl TemporalEngine {
    pub fn new(params: TemporalParams) -> Self {
        Self {
            params,
            baselines: HistoricalBaseline::new(),
        }
    }

    /// Swap in reloaded parameters between cycles
    pub fn set_params(&mut self, params: TemporalParams) {
        self.params = params;
    }

    /// Read access for detectors and fusion, valid for one cycle
    pub fn baselines(&self) -> &HistoricalBaseline {
        &self.baselines
    }

    /// Assess one cycle's fused parameters and update the baselines
    pub fn correlate(
        &mut self,
        fused: &[FusedParameter],
        now: Timestamp,
    ) -> Vec<TemporalAssessment, MAX_FUSED> {
        let mut assessments = Vec::new();

        for f in fused {
            let assessment = self.assess(f, now);
            let _ = assessments.push(assessment);
        }

        // Baselines mutate only here, after all assessments are made
        // from the pre-cycle snapshot
        // TODO: freeze baseline adaptation for a parameter while an
        // alert backed by it is active, so a slow-building release is
        // not normalized away
        for a in assessments.iter() {
            self.baselines
                .record(a.parameter, a.value, now, !a.substituted && !a.fallback);
        }

        assessments
    }

    fn assess(&self, fused: &FusedParameter, now: Timestamp) -> TemporalAssessment {
        let Some(stats) = self.baselines.stats(fused.parameter) else {
            return TemporalAssessment {
                parameter: fused.parameter,
                value: fused.value,
                confidence: fused.confidence,
                trend: TrendDescriptor::FLAT,
                substituted: false,
                fallback: fused.fallback,
            };
        };

        if stats.len() < self.params.min_history {
            return TemporalAssessment {
                parameter: fused.parameter,
                value: fused.value,
                confidence: fused.confidence,
                trend: TrendDescriptor::FLAT,
                substituted: false,
                fallback: fused.fallback,
            };
        }

        // Outlier test against the rolling window
        let z = stats.z_score(fused.value);
        let mut value = fused.value;
        let mut confidence = fused.confidence;
        let mut substituted = false;

        if z.abs() > self.params.outlier_z {
            // How sure are we this is an outlier, not a step change:
            // barely past the threshold is weak support, far past is
            // strong
            let outlier_confidence =
                (0.5 + 0.5 * ((z.abs() - self.params.outlier_z) / self.params.outlier_z))
                    .clamp(0.0, 1.0);

            if outlier_confidence >= self.params.outlier_confidence_threshold {
                let dt_s = now
                    .saturating_sub(stats.window().last().map(|s| s.timestamp).unwrap_or(now))
                    as f32
                    / 1000.0;
                value = stats.mean() + stats.slope_per_second() * dt_s;
                confidence = confidence.penalized(self.params.outlier_confidence_factor);
                substituted = true;
            }
        }

        // Trend descriptor from the window
        let slope = stats.slope_per_second();
        let direction = if slope > self.params.trend_deadband {
            TrendDirection::Rising
        } else if slope < -self.params.trend_deadband {
            TrendDirection::Falling
        } else {
            TrendDirection::Flat
        };

        let acceleration = stats
            .window()
            .split_slopes()
            .map(|(older, newer)| newer - older)
            .unwrap_or(0.0);
        let periodicity = stats.window().oscillation_strength();

        // Anomaly score: statistical excursion dominates, accelerating
        // trends contribute
        let z_term = (z.abs() / self.params.outlier_z).clamp(0.0, 1.0);
        let accel_term = if slope.abs() > f32::EPSILON {
            (acceleration.abs() / (slope.abs() + f32::EPSILON)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let anomaly_score = (0.7 * z_term + 0.3 * accel_term).clamp(0.0, 1.0);

        // Confidence penalty proportional to the anomaly score
        confidence = confidence.penalized(1.0 - self.params.anomaly_penalty * anomaly_score);

        TemporalAssessment {
            parameter: fused.parameter,
            value,
            confidence,
            trend: TrendDescriptor {
                direction,
                magnitude: slope.abs(),
                acceleration,
                periodicity,
                anomaly_score,
            },
            substituted,
            fallback: fused.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SensorId;

    const PARAM: ParameterId = ParameterId::AirTemperature;

    fn fused(value: f32, confidence: f32) -> FusedParameter {
        let mut contributors = Vec::new();
        let _ = contributors.push(SensorId::new("t1").unwrap());
        FusedParameter {
            parameter: PARAM,
            value,
            confidence: Confidence::from_float(confidence),
            contributors,
            fallback: false,
        }
    }

    /// Feed a steady series so the window has history
    fn warmed_engine(values: &[f32]) -> TemporalEngine {
        let mut engine = TemporalEngine::new(TemporalParams::default());
        for (i, &v) in values.iter().enumerate() {
            engine.correlate(&[fused(v, 0.9)], i as u64 * 1000);
        }
        engine
    }

    #[test]
    fn cold_start_passes_values_through() {
        let mut engine = TemporalEngine::new(TemporalParams::default());
        let out = engine.correlate(&[fused(20.0, 0.9)], 1000);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, 20.0);
        assert!(!out[0].substituted);
        assert_eq!(out[0].trend.direction, TrendDirection::Flat);
    }

    #[test]
    fn strong_outlier_replaced_by_trend_prediction() {
        let mut engine = warmed_engine(&[20.0, 20.1, 19.9, 20.0, 20.1, 19.9, 20.0, 20.1]);

        // 35 °C out of a 20 °C window is far beyond outlier_z with
        // high outlier confidence: substitute
        let out = engine.correlate(&[fused(35.0, 0.9)], 8000);
        let a = &out[0];

        assert!(a.substituted);
        assert!((a.value - 20.0).abs() < 0.5, "predicted {}", a.value);
        // Confidence reduced at least by the configured factor
        assert!(a.confidence.as_float() <= 0.9 * 0.5 + 0.01);
    }

    #[test]
    fn weak_outlier_keeps_raw_value() {
        let mut params = TemporalParams::default();
        // Demand near-certainty before substituting
        params.outlier_confidence_threshold = 0.99;
        let mut engine = TemporalEngine::new(params);
        for (i, &v) in [20.0, 20.1, 19.9, 20.0, 20.1, 19.9]
            .iter()
            .enumerate()
        {
            engine.correlate(&[fused(v, 0.9)], i as u64 * 1000);
        }

        // Just past the z threshold: flagged, but weakly
        let out = engine.correlate(&[fused(20.4, 0.9)], 7000);
        let a = &out[0];

        assert!(!a.substituted);
        assert_eq!(a.value, 20.4);
    }

    #[test]
    fn rising_ramp_reads_as_rising() {
        let mut engine =
            warmed_engine(&[20.0, 21.0, 22.0, 23.0, 24.0, 25.0, 26.0, 27.0]);

        let out = engine.correlate(&[fused(28.0, 0.9)], 8000);
        let a = &out[0];

        assert_eq!(a.trend.direction, TrendDirection::Rising);
        assert!(a.trend.magnitude > 0.5);
        assert!(!a.substituted, "a ramp is a trend, not an outlier");
    }

    #[test]
    fn anomaly_score_penalizes_confidence() {
        let mut engine = warmed_engine(&[20.0, 20.1, 19.9, 20.0, 20.1, 19.9, 20.0, 20.1]);

        // Mild excursion: not an outlier, but anomalous enough to
        // shave confidence
        let out = engine.correlate(&[fused(20.18, 0.9)], 8000);
        let a = &out[0];

        assert!(!a.substituted);
        assert!(a.trend.anomaly_score > 0.0);
        assert!(a.confidence.as_float() < 0.9);
    }

    #[test]
    fn worsening_trend_flagged_for_escalation() {
        // Accelerating upward series
        let mut engine =
            warmed_engine(&[10.0, 10.2, 10.5, 11.0, 12.0, 14.0, 17.0, 21.0]);

        let out = engine.correlate(&[fused(26.0, 0.9)], 8000);
        let a = &out[0];

        assert_eq!(a.trend.direction, TrendDirection::Rising);
        assert!(a.trend.acceleration > 0.0);
        assert!(a.trend.is_worsening());
    }

    #[test]
    fn substituted_values_never_become_last_good() {
        let mut engine = warmed_engine(&[20.0, 20.1, 19.9, 20.0, 20.1, 19.9, 20.0, 20.1]);
        let before = engine.baselines().last_good(PARAM).unwrap();

        let out = engine.correlate(&[fused(35.0, 0.9)], 8000);
        assert!(out[0].substituted);

        // last_good unchanged by the substituted cycle
        assert_eq!(engine.baselines().last_good(PARAM), Some(before));
    }
}
