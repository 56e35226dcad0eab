//! Property tests for the pipeline's numeric contracts
//!
//! Randomized inputs against the §3 invariant set: probabilities and
//! confidences stay in [0, 1], fused values stay inside the hull of
//! their contributing readings, and the weighted-average contract
//! holds for arbitrary confidence pairs.

mod common;

use common::reading;

use proptest::prelude::*;

use emberwatch_core::baseline::HistoricalBaseline;
use emberwatch_core::config::{
    ChemicalParams, ElectricalParams, EnvironmentalParams, FusionParams,
};
use emberwatch_core::context::{EnvironmentalContext, Season};
use emberwatch_core::detectors::{
    ChemicalAnalyzer, Detector, ElectricalAnalyzer, EnvironmentalRiskAnalyzer,
};
use emberwatch_core::events::{ParameterId, SensorReading, VocChannel};
use emberwatch_core::fusion::FusionEngine;

fn arb_context() -> impl Strategy<Value = EnvironmentalContext> {
    (
        -40.0f32..60.0,
        0.0f32..100.0,
        0.0f32..40.0,
        0.0f32..50.0,
        0u16..60,
        0u8..24,
        prop_oneof![
            Just(Season::Winter),
            Just(Season::Spring),
            Just(Season::Summer),
            Just(Season::Autumn),
        ],
    )
        .prop_map(
            |(temperature_c, humidity_pct, wind_speed_ms, precip_24h_mm, days, hour, season)| {
                EnvironmentalContext {
                    temperature_c,
                    humidity_pct,
                    wind_speed_ms,
                    precip_24h_mm,
                    days_since_rain: days,
                    hour_of_day: hour,
                    season,
                }
            },
        )
}

fn temperature_group(
    values: Vec<f32>,
    confidences: Vec<f32>,
) -> Vec<SensorReading> {
    values
        .into_iter()
        .zip(confidences)
        .enumerate()
        .map(|(i, (value, confidence))| {
            let id = match i {
                0 => "t0",
                1 => "t1",
                2 => "t2",
                3 => "t3",
                4 => "t4",
                _ => "t5",
            };
            reading(id, ParameterId::AirTemperature, value, confidence)
        })
        .collect()
}

proptest! {
    #[test]
    fn fused_value_stays_inside_reading_hull(
        values in prop::collection::vec(-40.0f32..60.0, 2..6),
        confidences in prop::collection::vec(0.05f32..1.0, 6),
    ) {
        let readings = temperature_group(values.clone(), confidences);
        let out = FusionEngine::new(FusionParams::default()).fuse(
            &readings,
            &HistoricalBaseline::new(),
            &EnvironmentalContext::default(),
        );

        let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        for fused in out.fused.iter() {
            // The retained set is a subset of the inputs, so its hull
            // is inside the input hull
            prop_assert!(!fused.fallback);
            prop_assert!(fused.value >= min - 1e-3 && fused.value <= max + 1e-3);
            prop_assert!(!fused.contributors.is_empty());
            let c = fused.confidence.as_float();
            prop_assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn pair_fusion_leans_toward_higher_confidence(
        low in -40.0f32..59.0,
        spread in 0.1f32..1.0,
        c_strong in 0.5f32..1.0,
        c_weak in 0.05f32..0.45,
    ) {
        let high = low + spread;
        let readings = [
            reading("a", ParameterId::AirTemperature, low, c_strong),
            reading("b", ParameterId::AirTemperature, high, c_weak),
        ];

        let out = FusionEngine::new(FusionParams::default()).fuse(
            &readings,
            &HistoricalBaseline::new(),
            &EnvironmentalContext::default(),
        );

        prop_assert_eq!(out.fused.len(), 1);
        let fused = &out.fused[0];
        prop_assert!(
            (fused.value - low).abs() <= (fused.value - high).abs(),
            "fused {} low {} high {}",
            fused.value, low, high
        );
    }

    #[test]
    fn chemical_outputs_stay_in_unit_range(
        levels in prop::collection::vec(0.0f32..50_000.0, 8),
        ctx in arb_context(),
    ) {
        let readings: Vec<SensorReading> = VocChannel::ALL
            .iter()
            .zip(levels)
            .map(|(&ch, level)| reading("voc", ParameterId::Voc(ch), level, 0.9))
            .collect();

        let mut analyzer = ChemicalAnalyzer::new(ChemicalParams::default());
        let out = analyzer.evaluate(&ctx, &readings, &HistoricalBaseline::new());

        prop_assert!((0.0..=1.0).contains(&out.probability));
        let c = out.confidence.as_float();
        prop_assert!((0.0..=1.0).contains(&c));
    }

    #[test]
    fn electrical_outputs_stay_in_unit_range(
        emf in 0.0f32..5_000.0,
        surface in -60.0f32..400.0,
        vibration in 0.0f32..200.0,
        ctx in arb_context(),
    ) {
        let readings = [
            reading("emf", ParameterId::EmField, emf, 0.9),
            reading("ir", ParameterId::SurfaceTemperature, surface, 0.9),
            reading("vib", ParameterId::VibrationRms, vibration, 0.9),
        ];

        let mut analyzer = ElectricalAnalyzer::new(ElectricalParams::default());
        let out = analyzer.evaluate(&ctx, &readings, &HistoricalBaseline::new());

        prop_assert!((0.0..=1.0).contains(&out.probability));
        let c = out.confidence.as_float();
        prop_assert!((0.0..=1.0).contains(&c));

        let health = analyzer.health(&ctx, &readings, &HistoricalBaseline::new());
        prop_assert!((0.0..=100.0).contains(&health.score));
    }

    #[test]
    fn environmental_index_stays_in_range(ctx in arb_context()) {
        let analyzer = EnvironmentalRiskAnalyzer::new(EnvironmentalParams::default());
        let (index, _) = analyzer.risk_index(&ctx, &[]);
        prop_assert!((0.0..=100.0).contains(&index));

        let mut analyzer = analyzer;
        let out = analyzer.evaluate(&ctx, &[], &HistoricalBaseline::new());
        prop_assert!((0.0..=1.0).contains(&out.probability));
    }
}
