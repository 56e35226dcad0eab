//! Chemical Signature Analyzer
//!
//! ## Overview
//!
//! Detects pre-combustion chemistry from the VOC channel set. Thermal
//! decomposition of common structural materials releases marker
//! compounds well before open flame:
//!
//! - **cellulose** (wood, paper): formaldehyde, acetaldehyde, acrolein
//! - **lignin** (wood): phenol, cresol, guaiacol
//! - **early combustion**: CO and NO2 jointly elevated
//!
//! ## Method
//!
//! Each channel is normalized for temperature/humidity, then its
//! deviation from the historical baseline is compared against the
//! configured channel threshold. Compound rules require *simultaneous*
//! deviation on every channel they name — single-channel excursions are
//! sensor noise or unrelated sources, not pyrolysis.
//!
//! Two compound-ratio checks add weight when the mixture proportions
//! match decomposition chemistry (formaldehyde:acetaldehyde near
//! unity, CO:NO2 in the combustion band): concentration alone can come
//! from a solvent spill; the ratios are what tie the channels to a
//! single thermal source.
//!
//! Probability is the satisfied weight over the maximum possible
//! weight. Confidence grows with the number of independently satisfied
//! rules and the magnitude of the deviations behind them.

use crate::baseline::HistoricalBaseline;
use crate::config::ChemicalParams;
use crate::context::EnvironmentalContext;
use crate::detectors::{push_evidence, Detector, DetectorOutput};
use crate::events::{DetectionEvidence, EvidenceList, ParameterId, SensorReading, VocChannel};
use crate::fusion::confidence::Confidence;

/// Compound decomposition rule: all named channels must deviate past
/// their thresholds simultaneously
struct CompoundRule {
    tag: &'static str,
    channels: &'static [VocChannel],
}

/// The closed rule table; weights live in [`ChemicalParams`] so they
/// stay tunable per deployment
const COMPOUND_RULES: [CompoundRule; 3] = [
    CompoundRule {
        tag: "cellulose_decomposition",
        channels: &[
            VocChannel::Formaldehyde,
            VocChannel::Acetaldehyde,
            VocChannel::Acrolein,
        ],
    },
    CompoundRule {
        tag: "lignin_decomposition",
        channels: &[VocChannel::Phenol, VocChannel::Cresol, VocChannel::Guaiacol],
    },
    CompoundRule {
        tag: "early_combustion",
        channels: &[VocChannel::CarbonMonoxide, VocChannel::NitrogenDioxide],
    },
];

/// Samples a channel baseline needs before its mean is trusted
///
/// Below this the detector compares against the clean-air zero
/// reference instead; a two-sample "baseline" that already contains
/// the excursion would mask it.
const MIN_BASELINE_SAMPLES: usize = 8;

/// Chemical signature analyzer over the VOC channel set
pub struct ChemicalAnalyzer {
    params: ChemicalParams,
}

impl ChemicalAnalyzer {
    pub fn new(params: ChemicalParams) -> Self {
        Self { params }
    }

    /// Swap in reloaded parameters between cycles
    pub fn set_params(&mut self, params: ChemicalParams) {
        self.params = params;
    }

    fn rule_weight(&self, tag: &str) -> f32 {
        match tag {
            "cellulose_decomposition" => self.params.weight_cellulose,
            "lignin_decomposition" => self.params.weight_lignin,
            "early_combustion" => self.params.weight_combustion,
            _ => 0.0,
        }
    }

    /// Normalize a channel value for ambient conditions
    ///
    /// The acquisition layer compensates at the sensor level; this
    /// normalization removes the residual channel-specific sensitivity
    /// characterized against the baseline conditions.
    fn normalize(&self, value: f32, ctx: &EnvironmentalContext) -> f32 {
        let temp_term = 1.0 + self.params.temp_coeff * (ctx.temperature_c - 25.0);
        let humidity_term = 1.0 + self.params.humidity_coeff * (ctx.humidity_pct - 50.0);
        let divisor = (temp_term * humidity_term).max(0.1);
        value / divisor
    }

    /// Latest value per channel this cycle, normalized
    fn channel_values(
        &self,
        ctx: &EnvironmentalContext,
        readings: &[SensorReading],
    ) -> [Option<f32>; 8] {
        let mut values: [Option<f32>; 8] = [None; 8];
        for reading in readings {
            if let ParameterId::Voc(channel) = reading.parameter {
                values[channel as usize] = Some(self.normalize(reading.value, ctx));
            }
        }
        values
    }
}

impl Detector for ChemicalAnalyzer {
    fn evaluate(
        &mut self,
        ctx: &EnvironmentalContext,
        readings: &[SensorReading],
        baselines: &HistoricalBaseline,
    ) -> DetectorOutput {
        let values = self.channel_values(ctx, readings);

        // Per-channel deviation from baseline, in ppb
        let mut deviations: [Option<f32>; 8] = [None; 8];
        for channel in VocChannel::ALL {
            if let Some(value) = values[channel as usize] {
                let base = match baselines.stats(ParameterId::Voc(channel)) {
                    Some(stats) if stats.len() >= MIN_BASELINE_SAMPLES => stats.mean(),
                    _ => 0.0,
                };
                deviations[channel as usize] = Some(value - base);
            }
        }

        let mut score = 0.0f32;
        let mut rules_satisfied = 0u8;
        let mut excess_sum = 0.0f32;
        let mut excess_count = 0u8;
        let mut evidence = EvidenceList::new();

        for rule in COMPOUND_RULES.iter() {
            let mut satisfied = true;
            let mut rule_excess = 0.0f32;
            for &channel in rule.channels {
                match deviations[channel as usize] {
                    Some(dev) if dev > self.params.threshold(channel) => {
                        rule_excess += dev / self.params.threshold(channel) - 1.0;
                    }
                    _ => {
                        satisfied = false;
                        break;
                    }
                }
            }

            if satisfied {
                let weight = self.rule_weight(rule.tag);
                score += weight;
                rules_satisfied += 1;
                excess_sum += rule_excess / rule.channels.len() as f32;
                excess_count += 1;
                push_evidence(&mut evidence, DetectionEvidence::new(rule.tag, weight));
            }
        }

        // Ratio checks run on the raw normalized concentrations
        let formaldehyde = values[VocChannel::Formaldehyde as usize];
        let acetaldehyde = values[VocChannel::Acetaldehyde as usize];
        if let (Some(f), Some(a)) = (formaldehyde, acetaldehyde) {
            if a > f32::EPSILON {
                let ratio = f / a;
                let (low, high) = self.params.ratio_formaldehyde;
                // The ratio only means something once the channels are
                // actually elevated
                let elevated = f > self.params.threshold(VocChannel::Formaldehyde)
                    && a > self.params.threshold(VocChannel::Acetaldehyde);
                if elevated && ratio >= low && ratio <= high {
                    let weight = self.params.weight_ratio_formaldehyde;
                    score += weight;
                    rules_satisfied += 1;
                    push_evidence(
                        &mut evidence,
                        DetectionEvidence::with_measurement("aldehyde_ratio", weight, ratio),
                    );
                }
            }
        }

        let co = values[VocChannel::CarbonMonoxide as usize];
        let no2 = values[VocChannel::NitrogenDioxide as usize];
        if let (Some(co), Some(no2)) = (co, no2) {
            if no2 > f32::EPSILON {
                let ratio = co / no2;
                let (low, high) = self.params.ratio_co_no2;
                let elevated = co > self.params.threshold(VocChannel::CarbonMonoxide)
                    && no2 > self.params.threshold(VocChannel::NitrogenDioxide);
                if elevated && ratio >= low && ratio <= high {
                    let weight = self.params.weight_ratio_co_no2;
                    score += weight;
                    rules_satisfied += 1;
                    push_evidence(
                        &mut evidence,
                        DetectionEvidence::with_measurement("co_no2_ratio", weight, ratio),
                    );
                }
            }
        }

        if evidence.is_empty() {
            return DetectorOutput::quiet();
        }

        let probability = (score / self.params.max_score()).clamp(0.0, 1.0);

        // Confidence: rule count dominates, deviation magnitude refines
        let rule_factor = rules_satisfied as f32 / 5.0;
        let excess_factor = if excess_count > 0 {
            (excess_sum / excess_count as f32).clamp(0.0, 2.0) / 2.0
        } else {
            0.0
        };
        let confidence = Confidence::from_float(0.25 + 0.5 * rule_factor + 0.25 * excess_factor);

        DetectorOutput {
            probability,
            confidence,
            evidence,
        }
    }

    fn name(&self) -> &'static str {
        "chemical"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SensorId;

    fn voc_reading(channel: VocChannel, value: f32) -> SensorReading {
        SensorReading {
            sensor_id: SensorId::new("voc_a").unwrap(),
            parameter: ParameterId::Voc(channel),
            value,
            timestamp: 1000,
            confidence: 0.9,
        }
    }

    /// Reference conditions so normalization is the identity
    fn reference_ctx() -> EnvironmentalContext {
        EnvironmentalContext {
            temperature_c: 25.0,
            humidity_pct: 50.0,
            ..Default::default()
        }
    }

    #[test]
    fn cellulose_signature_scores_weight_plus_ratio() {
        let mut analyzer = ChemicalAnalyzer::new(ChemicalParams::default());
        let readings = [
            voc_reading(VocChannel::Formaldehyde, 40.0),
            voc_reading(VocChannel::Acetaldehyde, 45.0),
            voc_reading(VocChannel::Acrolein, 8.0),
        ];

        let out = analyzer.evaluate(
            &reference_ctx(),
            &readings,
            &HistoricalBaseline::new(),
        );

        // WEIGHT_CELLULOSE (30) + WEIGHT_RATIO_1 (15) = 45 of 105
        let expected = 45.0 / ChemicalParams::default().max_score();
        assert!((out.probability - expected).abs() < 1e-4);
        assert!(out
            .evidence
            .iter()
            .any(|e| e.tag == "cellulose_decomposition"));
        assert!(out.evidence.iter().any(|e| e.tag == "aldehyde_ratio"));
        assert!(out.confidence.as_float() > 0.0 && out.confidence.as_float() <= 1.0);
    }

    #[test]
    fn single_channel_excursion_is_not_pyrolysis() {
        let mut analyzer = ChemicalAnalyzer::new(ChemicalParams::default());
        let readings = [voc_reading(VocChannel::Formaldehyde, 200.0)];

        let out = analyzer.evaluate(
            &reference_ctx(),
            &readings,
            &HistoricalBaseline::new(),
        );

        assert!(out.is_quiet());
        assert_eq!(out.probability, 0.0);
    }

    #[test]
    fn ratio_outside_range_withholds_ratio_weight() {
        let mut analyzer = ChemicalAnalyzer::new(ChemicalParams::default());
        // Formaldehyde far out of proportion: compound rule fires,
        // ratio check does not
        let readings = [
            voc_reading(VocChannel::Formaldehyde, 90.0),
            voc_reading(VocChannel::Acetaldehyde, 45.0),
            voc_reading(VocChannel::Acrolein, 8.0),
        ];

        let out = analyzer.evaluate(
            &reference_ctx(),
            &readings,
            &HistoricalBaseline::new(),
        );

        let expected = 30.0 / ChemicalParams::default().max_score();
        assert!((out.probability - expected).abs() < 1e-4);
        assert!(!out.evidence.iter().any(|e| e.tag == "aldehyde_ratio"));
    }

    #[test]
    fn baseline_drift_suppresses_absolute_levels() {
        let mut analyzer = ChemicalAnalyzer::new(ChemicalParams::default());
        let mut baselines = HistoricalBaseline::new();
        // Long-standing ambient formaldehyde of 35 ppb (urban site)
        for i in 0..10 {
            baselines.record(
                ParameterId::Voc(VocChannel::Formaldehyde),
                35.0,
                i * 1000,
                true,
            );
        }

        // 40 ppb reads as a 5 ppb deviation here, below the 25 ppb
        // threshold, so the cellulose rule must not fire
        let readings = [
            voc_reading(VocChannel::Formaldehyde, 40.0),
            voc_reading(VocChannel::Acetaldehyde, 45.0),
            voc_reading(VocChannel::Acrolein, 8.0),
        ];

        let out = analyzer.evaluate(&reference_ctx(), &readings, &baselines);
        assert!(!out
            .evidence
            .iter()
            .any(|e| e.tag == "cellulose_decomposition"));
    }

    #[test]
    fn combustion_pair_requires_both_gases() {
        let mut analyzer = ChemicalAnalyzer::new(ChemicalParams::default());
        let baselines = HistoricalBaseline::new();

        let co_only = [voc_reading(VocChannel::CarbonMonoxide, 15_000.0)];
        let out = analyzer.evaluate(&reference_ctx(), &co_only, &baselines);
        assert!(!out.evidence.iter().any(|e| e.tag == "early_combustion"));

        let both = [
            voc_reading(VocChannel::CarbonMonoxide, 15_000.0),
            voc_reading(VocChannel::NitrogenDioxide, 160.0),
        ];
        let out = analyzer.evaluate(&reference_ctx(), &both, &baselines);
        assert!(out.evidence.iter().any(|e| e.tag == "early_combustion"));
        // 15000/160 ≈ 94, inside the default (40, 140) band
        assert!(out.evidence.iter().any(|e| e.tag == "co_no2_ratio"));
    }

    #[test]
    fn probability_stays_in_unit_range_under_extremes() {
        let mut analyzer = ChemicalAnalyzer::new(ChemicalParams::default());
        let readings: heapless::Vec<SensorReading, 8> = VocChannel::ALL
            .iter()
            .map(|&ch| voc_reading(ch, 40_000.0))
            .collect();

        let out = analyzer.evaluate(
            &reference_ctx(),
            &readings,
            &HistoricalBaseline::new(),
        );

        assert!(out.probability <= 1.0);
        assert!(out.confidence.as_float() <= 1.0);
    }
}
