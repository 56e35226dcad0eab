//! Environmental Risk Analyzer
//!
//! ## Overview
//!
//! Computes a fire-weather composite index in [0, 100] from the
//! meteorological side of the context: independent additive factor
//! scores, seasonal and diurnal multiplicative adjustments, and a
//! combination bonus when temperature, humidity, and wind are extreme
//! *simultaneously* — the red-flag condition where fire behavior is
//! qualitatively different from any single factor's contribution.
//!
//! ## Factor Structure
//!
//! | factor        | range | shape |
//! |---------------|-------|-------|
//! | temperature   | 0-25  | linear above 10 °C |
//! | humidity      | 0-25  | disproportionate below 25% RH |
//! | wind          | 0-20  | linear with speed |
//! | drought       | 0-15  | days since rain |
//! | fuel moisture | 0-15  | dryness persistence |
//!
//! Low humidity dominates deliberately: fine fuels equilibrate with
//! air moisture within the hour, so a drop from 20% to 10% RH changes
//! ignition behavior far more than the same-sized drop at 50%.
//!
//! The factor scores above come from the meteorological readings when
//! present this cycle, falling back to the context snapshot, so a
//! monitor without its own wind sensor still produces an index.

use crate::baseline::HistoricalBaseline;
use crate::config::EnvironmentalParams;
use crate::context::{EnvironmentalContext, Season};
use crate::detectors::{push_evidence, Detector, DetectorOutput};
use crate::events::{DetectionEvidence, EvidenceList, ParameterId, SensorReading};
use crate::fusion::confidence::Confidence;

/// Fire-weather composite analyzer
pub struct EnvironmentalRiskAnalyzer {
    params: EnvironmentalParams,
}

impl EnvironmentalRiskAnalyzer {
    pub fn new(params: EnvironmentalParams) -> Self {
        Self { params }
    }

    /// Swap in reloaded parameters between cycles
    pub fn set_params(&mut self, params: EnvironmentalParams) {
        self.params = params;
    }

    fn temperature_factor(temp_c: f32) -> f32 {
        if temp_c <= 10.0 {
            0.0
        } else if temp_c >= 38.0 {
            25.0
        } else {
            (temp_c - 10.0) / 28.0 * 25.0
        }
    }

    fn humidity_factor(humidity_pct: f32) -> f32 {
        // Non-linear: dryness below 25% RH is weighted
        // disproportionately
        if humidity_pct >= 60.0 {
            0.0
        } else if humidity_pct >= 40.0 {
            (60.0 - humidity_pct) / 20.0 * 5.0
        } else if humidity_pct >= 25.0 {
            5.0 + (40.0 - humidity_pct) / 15.0 * 7.0
        } else if humidity_pct >= 15.0 {
            12.0 + (25.0 - humidity_pct) / 10.0 * 8.0
        } else {
            20.0 + (15.0 - humidity_pct.max(0.0)) / 15.0 * 5.0
        }
    }

    fn wind_factor(wind_ms: f32) -> f32 {
        (wind_ms / 15.0 * 20.0).clamp(0.0, 20.0)
    }

    fn drought_factor(days_since_rain: u16) -> f32 {
        (days_since_rain as f32 / 21.0 * 15.0).clamp(0.0, 15.0)
    }

    fn fuel_moisture_factor(humidity_pct: f32, precip_24h_mm: f32) -> f32 {
        if precip_24h_mm > 2.0 {
            // Recent rain rewets fine fuels regardless of current RH
            return 0.0;
        }
        ((60.0 - humidity_pct) / 60.0 * 15.0).clamp(0.0, 15.0)
    }

    fn seasonal_multiplier(&self, season: Season) -> f32 {
        let idx = match season {
            Season::Winter => 0,
            Season::Spring => 1,
            Season::Summer => 2,
            Season::Autumn => 3,
        };
        self.params.seasonal_multipliers[idx]
    }

    fn diurnal_multiplier(&self, ctx: &EnvironmentalContext) -> f32 {
        if ctx.is_afternoon() {
            self.params.afternoon_multiplier
        } else if ctx.is_night() {
            self.params.night_multiplier
        } else {
            1.0
        }
    }

    /// Composite index in [0, 100] plus contributing factor evidence
    pub fn risk_index(
        &self,
        ctx: &EnvironmentalContext,
        readings: &[SensorReading],
    ) -> (f32, EvidenceList) {
        // Prefer this cycle's readings over the context snapshot
        let temp_c = reading_value(readings, ParameterId::AirTemperature)
            .unwrap_or(ctx.temperature_c);
        let humidity_pct =
            reading_value(readings, ParameterId::Humidity).unwrap_or(ctx.humidity_pct);
        let wind_ms =
            reading_value(readings, ParameterId::WindSpeed).unwrap_or(ctx.wind_speed_ms);
        let precip_mm =
            reading_value(readings, ParameterId::Precipitation).unwrap_or(ctx.precip_24h_mm);

        let temp_factor = Self::temperature_factor(temp_c);
        let humidity_factor = Self::humidity_factor(humidity_pct);
        let wind_factor = Self::wind_factor(wind_ms);
        let drought_factor = Self::drought_factor(ctx.days_since_rain);
        let fuel_factor = Self::fuel_moisture_factor(humidity_pct, precip_mm);

        let base =
            temp_factor + humidity_factor + wind_factor + drought_factor + fuel_factor;

        let mut score =
            base * self.seasonal_multiplier(ctx.season) * self.diurnal_multiplier(ctx);

        let mut evidence = EvidenceList::new();
        if temp_factor > 0.0 {
            push_evidence(
                &mut evidence,
                DetectionEvidence::with_measurement("high_temperature", temp_factor, temp_c),
            );
        }
        if humidity_factor > 0.0 {
            push_evidence(
                &mut evidence,
                DetectionEvidence::with_measurement("low_humidity", humidity_factor, humidity_pct),
            );
        }
        if wind_factor > 0.0 {
            push_evidence(
                &mut evidence,
                DetectionEvidence::with_measurement("high_wind", wind_factor, wind_ms),
            );
        }
        if drought_factor > 0.0 {
            push_evidence(
                &mut evidence,
                DetectionEvidence::with_measurement(
                    "drought_stress",
                    drought_factor,
                    ctx.days_since_rain as f32,
                ),
            );
        }
        if fuel_factor > 0.0 {
            push_evidence(
                &mut evidence,
                DetectionEvidence::new("dry_fuels", fuel_factor),
            );
        }

        // Red-flag conditions: all three primary factors extreme at once
        let red_flag = temp_factor > self.params.red_flag_temp_factor
            && humidity_factor > self.params.red_flag_humidity_factor
            && wind_factor > self.params.red_flag_wind_factor;
        if red_flag {
            score *= self.params.red_flag_multiplier;
            push_evidence(
                &mut evidence,
                DetectionEvidence::new("red_flag_conditions", self.params.red_flag_multiplier),
            );
        }

        (score.clamp(0.0, 100.0), evidence)
    }
}

impl Detector for EnvironmentalRiskAnalyzer {
    fn evaluate(
        &mut self,
        ctx: &EnvironmentalContext,
        readings: &[SensorReading],
        _baselines: &HistoricalBaseline,
    ) -> DetectorOutput {
        let (index, evidence) = self.risk_index(ctx, readings);

        if evidence.is_empty() {
            return DetectorOutput::quiet();
        }

        // Meteorological inputs are slow-moving and well calibrated;
        // confidence reflects how much of the index rests on context
        // fallbacks rather than live readings
        let live = [
            ParameterId::AirTemperature,
            ParameterId::Humidity,
            ParameterId::WindSpeed,
        ]
        .iter()
        .filter(|&&p| reading_value(readings, p).is_some())
        .count();
        let confidence = Confidence::from_float(0.5 + 0.15 * live as f32);

        DetectorOutput {
            probability: (index / 100.0).clamp(0.0, 1.0),
            confidence,
            evidence,
        }
    }

    fn name(&self) -> &'static str {
        "environmental"
    }
}

fn reading_value(readings: &[SensorReading], parameter: ParameterId) -> Option<f32> {
    readings
        .iter()
        .filter(|r| r.parameter == parameter)
        .max_by_key(|r| r.timestamp)
        .map(|r| r.value)
}
