//! Multi-Sensor Fusion Engine
//!
//! ## Overview
//!
//! Combines same-parameter readings from multiple sensors into one
//! fused value with a combined confidence. Runs once per cycle after
//! the domain detectors, before temporal correlation.
//!
//! Per parameter:
//! 1. group this cycle's readings by [`ParameterId`]
//! 2. exclude statistical outliers relative to the group
//! 3. confidence-weighted average of the retained readings
//! 4. fused confidence = combined individual confidences scaled by an
//!    inter-sensor agreement factor (inverse of spread)
//!
//! If *every* reading for a parameter is excluded, the engine falls
//! back to the last known-good historical value at a fixed low
//! confidence rather than failing the cycle.
//!
//! ## Consistency Pass
//!
//! After fusion, a cross-parameter pass flags physically implausible
//! combinations — dew point above air temperature is the canonical
//! case — as [`DetectionEvidence`] annotations. Implausibility never
//! blocks output; it degrades trust downstream.
//!
//! ## Invariant
//!
//! The fused value always lies within the [min, max] of the retained
//! readings: a weighted average with non-negative weights cannot leave
//! the hull of its inputs, and the fallback path is marked as such.

pub mod confidence;

pub use confidence::Confidence;

use heapless::{FnvIndexMap, Vec};
use libm::{logf, sqrtf};

use crate::baseline::HistoricalBaseline;
use crate::config::FusionParams;
use crate::context::EnvironmentalContext;
use crate::events::{
    DetectionEvidence, EvidenceList, FusedParameter, ParameterId, SensorReading, MAX_CONTRIBUTORS,
};

/// Maximum distinct parameters fused per cycle (power of 2 for the map)
pub const MAX_FUSED: usize = 16;

/// Group buffer per parameter
type Group = Vec<usize, MAX_CONTRIBUTORS>;

/// Output of the fusion stage for one cycle
pub struct FusionOutput {
    /// One fused parameter per distinct parameter observed
    pub fused: Vec<FusedParameter, MAX_FUSED>,
    /// Cross-parameter consistency annotations
    pub consistency: EvidenceList,
    /// Readings excluded as outliers this cycle
    pub outliers_excluded: u32,
}

/// Multi-sensor fusion engine
pub struct FusionEngine {
    params: FusionParams,
}

impl FusionEngine {
    pub fn new(params: FusionParams) -> Self {
        Self { params }
    }

    /// Swap in reloaded parameters between cycles
    pub fn set_params(&mut self, params: FusionParams) {
        self.params = params;
    }

    /// Fuse one cycle's readings
    pub fn fuse(
        &self,
        readings: &[SensorReading],
        baselines: &HistoricalBaseline,
        ctx: &EnvironmentalContext,
    ) -> FusionOutput {
        let mut groups: FnvIndexMap<ParameterId, Group, MAX_FUSED> = FnvIndexMap::new();
        for (idx, reading) in readings.iter().enumerate() {
            if let Some(group) = groups.get_mut(&reading.parameter) {
                let _ = group.push(idx);
            } else {
                let mut group = Group::new();
                let _ = group.push(idx);
                let _ = groups.insert(reading.parameter, group);
            }
        }

        let mut fused = Vec::new();
        let mut outliers_excluded = 0u32;

        for (&parameter, group) in groups.iter() {
            let result = self.fuse_group(parameter, group, readings, baselines);
            outliers_excluded += result.1;
            if let Some(f) = result.0 {
                let _ = fused.push(f);
            }
        }

        let consistency = self.consistency_pass(&fused, ctx);

        FusionOutput {
            fused,
            consistency,
            outliers_excluded,
        }
    }

    fn fuse_group(
        &self,
        parameter: ParameterId,
        group: &Group,
        readings: &[SensorReading],
        baselines: &HistoricalBaseline,
    ) -> (Option<FusedParameter>, u32) {
        // Single-sensor parameters pass through with their own
        // confidence; there is nothing to agree or disagree with
        if group.len() == 1 {
            let reading = &readings[group[0]];
            let mut contributors = Vec::new();
            let _ = contributors.push(reading.sensor_id);
            return (
                Some(FusedParameter {
                    parameter,
                    value: reading.value,
                    confidence: Confidence::from_float(reading.confidence),
                    contributors,
                    fallback: false,
                }),
                0,
            );
        }

        // Outlier exclusion relative to the group, median/MAD based:
        // a mean/σ test lets one wild reading inflate σ enough to mask
        // itself in the small groups seen here
        let mut values: Vec<f32, MAX_CONTRIBUTORS> = Vec::new();
        for &i in group.iter() {
            let _ = values.push(readings[i].value);
        }
        values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
        let median = median_of_sorted(&values);

        let mut deviations: Vec<f32, MAX_CONTRIBUTORS> = Vec::new();
        for &v in values.iter() {
            let _ = deviations.push((v - median).abs());
        }
        deviations
            .sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
        let mad = median_of_sorted(&deviations);

        // 1.4826 scales MAD to σ-equivalent for normal noise; the
        // floor keeps near-identical groups from excluding everything
        let spread = (1.4826 * mad).max(0.01 * median.abs().max(1.0));

        let mut retained: Vec<usize, MAX_CONTRIBUTORS> = Vec::new();
        for &i in group.iter() {
            if (readings[i].value - median).abs() <= self.params.outlier_sigma * spread {
                let _ = retained.push(i);
            }
        }
        let excluded = (group.len() - retained.len()) as u32;

        if retained.is_empty() {
            // Whole group implausible: last known-good at low
            // confidence instead of failing the cycle
            let Some(last_good) = baselines.last_good(parameter) else {
                return (None, excluded);
            };
            crate::ew_warn!(
                "all {} readings for {} excluded, using historical fallback",
                group.len(),
                parameter.name()
            );
            let mut contributors = Vec::new();
            let _ = contributors.push(readings[group[0]].sensor_id);
            return (
                Some(FusedParameter {
                    parameter,
                    value: last_good,
                    confidence: Confidence::from_float(self.params.fallback_confidence),
                    contributors,
                    fallback: true,
                }),
                excluded,
            );
        }

        // Confidence-weighted average of the retained readings
        let weight_sum: f32 = retained.iter().map(|&i| readings[i].confidence).sum();
        let value = if weight_sum > f32::EPSILON {
            retained
                .iter()
                .map(|&i| readings[i].value * readings[i].confidence)
                .sum::<f32>()
                / weight_sum
        } else {
            retained.iter().map(|&i| readings[i].value).sum::<f32>() / retained.len() as f32
        };

        // Agreement from spread among the retained readings
        let retained_mean: f32 =
            retained.iter().map(|&i| readings[i].value).sum::<f32>() / retained.len() as f32;
        let retained_std = sqrtf(
            retained
                .iter()
                .map(|&i| {
                    let d = readings[i].value - retained_mean;
                    d * d
                })
                .sum::<f32>()
                / retained.len() as f32,
        );
        let agreement_scale = (retained_mean.abs() * self.params.agreement_rel_scale)
            .max(self.params.agreement_min_scale);
        let agreement = Confidence::from_agreement(retained_std, agreement_scale);

        let individual: Vec<Confidence, MAX_CONTRIBUTORS> = retained
            .iter()
            .map(|&i| Confidence::from_float(readings[i].confidence))
            .collect();
        let confidence = Confidence::combine(&individual).scaled_by(agreement);

        let mut contributors = Vec::new();
        for &i in retained.iter() {
            let _ = contributors.push(readings[i].sensor_id);
        }

        (
            Some(FusedParameter {
                parameter,
                value,
                confidence,
                contributors,
                fallback: false,
            }),
            excluded,
        )
    }

    /// Cross-parameter consistency pass
    ///
    /// Flags combinations no real atmosphere produces. Annotation
    /// only — output is never blocked.
    fn consistency_pass(
        &self,
        fused: &[FusedParameter],
        ctx: &EnvironmentalContext,
    ) -> EvidenceList {
        let mut evidence = EvidenceList::new();

        let humidity = value_of(fused, ParameterId::Humidity).unwrap_or(ctx.humidity_pct);

        // The hygrometer-implied dew point (at the met station's own
        // temperature) can never sit above the true air temperature;
        // when it lands above the fused reading, the thermometer and
        // hygrometer disagree about the same air
        if let Some(fused_temp) = value_of(fused, ParameterId::AirTemperature) {
            let dew_point = dew_point_c(ctx.temperature_c, humidity);
            if dew_point > fused_temp + self.params.dew_point_margin_c {
                let _ = evidence.push(DetectionEvidence::with_measurement(
                    "dew_point_exceeds_air_temperature",
                    1.0,
                    dew_point,
                ));
            }
        }

        // Humidity above saturation reads as a humidity channel fault
        if humidity > 100.0 {
            let _ = evidence.push(DetectionEvidence::with_measurement(
                "humidity_above_saturation",
                1.0,
                humidity,
            ));
        }

        evidence
    }
}

/// Median of an already-sorted, non-empty slice
fn median_of_sorted(sorted: &[f32]) -> f32 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn value_of(fused: &[FusedParameter], parameter: ParameterId) -> Option<f32> {
    fused
        .iter()
        .find(|f| f.parameter == parameter)
        .map(|f| f.value)
}

/// Dew point via the Magnus approximation, °C
///
/// Accurate to ~0.4 °C over -40..50 °C, which is ample for a
/// plausibility check.
pub fn dew_point_c(temp_c: f32, humidity_pct: f32) -> f32 {
    const A: f32 = 17.62;
    const B: f32 = 243.12;

    let rh = (humidity_pct / 100.0).clamp(0.001, 1.5);
    let gamma = logf(rh) + A * temp_c / (B + temp_c);
    B * gamma / (A - gamma)
}
