//! Electrical Anomaly Detector
//!
//! ## Overview
//!
//! Two analyses share the evidence-accumulation pattern:
//!
//! - **Arcing detection** — three independent channels, each producing
//!   its own probability estimate, combined by a fixed weighted
//!   average: an acoustic spectral match in the 1–20 kHz band, an EMF
//!   rapid-fluctuation check, and a thermal hotspot check. Confidence
//!   derives from how many of the three channels agree.
//! - **Equipment health** — a score starting at 100 with configured
//!   penalties subtracted per degradation signature, mapped onto a
//!   maintenance-urgency recommendation list.
//!
//! ## Acoustic Path
//!
//! Arcing produces broadband crackle with sustained energy across the
//! high-frequency band. Raw PCM frames from the acquisition layer are
//! probed at a fixed set of Goertzel bins spanning 1–20 kHz; the bin
//! energy distribution is matched against the arcing signature by
//! normalized correlation. The Goertzel recurrence evaluates a single
//! DFT bin in O(n) with two state variables, which is why it is the
//! standard choice here over a full FFT.

use heapless::Vec;
use libm::{cosf, sqrtf};

use crate::baseline::HistoricalBaseline;
use crate::config::ElectricalParams;
use crate::context::EnvironmentalContext;
use crate::detectors::{push_evidence, Detector, DetectorOutput};
use crate::events::{DetectionEvidence, EvidenceList, ParameterId, SensorReading};
use crate::fusion::confidence::Confidence;

/// Goertzel probe frequencies spanning the arcing band, Hz
const PROBE_FREQS_HZ: [f32; 5] = [2_000.0, 5_000.0, 8_000.0, 12_000.0, 18_000.0];

/// Arcing signature: relative bin energies of reference arc recordings
///
/// Broadband with a mild low-bin emphasis; normalized to unit length.
const ARCING_SIGNATURE: [f32; 5] = [0.52, 0.49, 0.45, 0.40, 0.36];

/// Probability above which a channel counts as "agreeing"
const CHANNEL_AGREEMENT_FLOOR: f32 = 0.3;

/// Maximum maintenance recommendations per report
const MAX_RECOMMENDATIONS: usize = 6;

/// Result of analyzing one acoustic frame
#[derive(Debug, Clone, Copy)]
pub struct ArcingAnalysis {
    /// Normalized correlation with the arcing signature (0.0-1.0)
    pub match_score: f32,
    /// Fraction of frame energy inside the probed band
    pub band_fraction: f32,
}

/// Maintenance urgency derived from the health score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MaintenanceUrgency {
    None,
    Advisory,
    Warning,
    Critical,
}

/// Equipment health assessment for one cycle
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Health score, clamped to [0, 100]
    pub score: f32,
    /// Urgency bucket for the maintenance scheduler
    pub urgency: MaintenanceUrgency,
    /// Concrete maintenance actions, one per penalty applied
    pub recommendations: Vec<&'static str, MAX_RECOMMENDATIONS>,
}

/// Electrical anomaly detector
pub struct ElectricalAnalyzer {
    params: ElectricalParams,
    /// Analysis of the newest acoustic frame, consumed by `evaluate`
    pending_acoustic: Option<ArcingAnalysis>,
}

impl ElectricalAnalyzer {
    pub fn new(params: ElectricalParams) -> Self {
        Self {
            params,
            pending_acoustic: None,
        }
    }

    /// Swap in reloaded parameters between cycles
    pub fn set_params(&mut self, params: ElectricalParams) {
        self.params = params;
    }

    /// Analyze a raw PCM frame from the acoustic front end
    ///
    /// Called by the cycle runner before `evaluate`; the analysis is
    /// consumed by the next evaluation and discarded with the cycle.
    pub fn ingest_acoustic_frame(&mut self, samples: &[f32], sample_rate_hz: u32) {
        if samples.len() < 32 || sample_rate_hz == 0 {
            return;
        }

        let total_energy: f32 = samples.iter().map(|s| s * s).sum();
        if total_energy <= f32::EPSILON {
            self.pending_acoustic = None;
            return;
        }

        let nyquist = sample_rate_hz as f32 / 2.0;
        let mut bins = [0.0f32; PROBE_FREQS_HZ.len()];
        for (bin, &freq) in bins.iter_mut().zip(PROBE_FREQS_HZ.iter()) {
            if freq < nyquist {
                // Rescale bin power into the same energy units as the
                // frame energy so the two are directly comparable
                *bin = goertzel_power(samples, freq, sample_rate_hz as f32) * 2.0
                    / samples.len() as f32;
            }
        }

        let band_energy: f32 = bins.iter().sum();
        let band_fraction = (band_energy / total_energy).clamp(0.0, 1.0);

        // Normalized correlation against the signature
        let norm: f32 = sqrtf(bins.iter().map(|b| b * b).sum::<f32>());
        let match_score = if norm > f32::EPSILON {
            let dot: f32 = bins
                .iter()
                .zip(ARCING_SIGNATURE.iter())
                .map(|(b, s)| (b / norm) * s)
                .sum();
            dot.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.pending_acoustic = Some(ArcingAnalysis {
            match_score,
            band_fraction,
        });
    }

    fn acoustic_probability(&self, analysis: Option<ArcingAnalysis>) -> f32 {
        let Some(analysis) = analysis else {
            return 0.0;
        };

        if analysis.match_score < self.params.acoustic_match_threshold {
            return 0.0;
        }

        // Match quality gated by how much of the frame actually sits
        // in the band: a strong match on a whisper is not an arc
        let presence = (analysis.band_fraction / 0.2).clamp(0.0, 1.0);
        analysis.match_score * presence
    }

    fn emf_probability(&self, readings: &[SensorReading], baselines: &HistoricalBaseline) -> (f32, f32) {
        let Some(reading) = latest(readings, ParameterId::EmField) else {
            return (0.0, 0.0);
        };

        let z = baselines.z_score(ParameterId::EmField, reading.value).abs();
        let onset = self.params.emf_fluctuation_sigma;
        let saturation = self.params.emf_saturation_sigma;
        let probability = ((z - onset) / (saturation - onset)).clamp(0.0, 1.0);
        (probability, z)
    }

    fn thermal_probability(&self, readings: &[SensorReading]) -> (f32, f32) {
        let Some(reading) = latest(readings, ParameterId::SurfaceTemperature) else {
            return (0.0, 0.0);
        };

        let onset = self.params.hotspot_temp_c;
        let saturation = self.params.hotspot_saturation_c;
        let probability = ((reading.value - onset) / (saturation - onset)).clamp(0.0, 1.0);
        (probability, reading.value)
    }

    /// Equipment health score with maintenance recommendations
    ///
    /// Separate from `evaluate` because its consumer is the maintenance
    /// path, not the arcing alert path; the cycle runner calls both.
    pub fn health(
        &self,
        ctx: &EnvironmentalContext,
        readings: &[SensorReading],
        baselines: &HistoricalBaseline,
    ) -> HealthReport {
        let mut score = 100.0f32;
        let mut recommendations: Vec<&'static str, MAX_RECOMMENDATIONS> = Vec::new();

        // Sustained thermal uptrend
        if let Some(stats) = baselines.stats(ParameterId::SurfaceTemperature) {
            let slope_per_min = stats.slope_per_second() * 60.0;
            if slope_per_min > self.params.thermal_trend_c_per_min {
                score -= self.params.penalty_thermal_trend;
                let _ = recommendations.push("inspect load on heating circuit");
            }

            // Cyclical thermal pattern: the loose-connection signature
            let cycling = stats.window().oscillation_strength();
            if cycling > 0.5 && stats.std_dev() > 0.5 {
                score -= self.params.penalty_thermal_cycling;
                let _ = recommendations.push("check terminal torque for loose connection");
            }
        }

        // EMF drifted beyond baseline
        if let Some(reading) = latest(readings, ParameterId::EmField) {
            let z = baselines.z_score(ParameterId::EmField, reading.value).abs();
            if z > self.params.emf_fluctuation_sigma {
                score -= self.params.penalty_emf_deviation;
                let _ = recommendations.push("verify shielding and grounding");
            }
        }

        // High-frequency vibration energy
        let vibration = latest(readings, ParameterId::VibrationRms);
        if let Some(reading) = vibration {
            if reading.value > self.params.vibration_rms_threshold {
                score -= self.params.penalty_vibration;
                let _ = recommendations.push("inspect rotating assembly and mounts");
            }
        }

        // Harmonic resonance: strongly periodic vibration at
        // appreciable amplitude
        if let Some(stats) = baselines.stats(ParameterId::VibrationRms) {
            let periodic = stats.window().oscillation_strength();
            let amplitude = vibration.map(|r| r.value).unwrap_or_else(|| stats.mean());
            if periodic > 0.7 && amplitude > self.params.vibration_rms_threshold * 0.5 {
                score -= self.params.penalty_resonance;
                let _ = recommendations.push("detune resonant coupling or add damping");
            }
        }

        // Environmental adjustment: heat stress ages insulation,
        // temperate conditions earn back margin
        if ctx.temperature_c > 40.0 {
            score -= 5.0;
        } else if (10.0..=30.0).contains(&ctx.temperature_c) {
            score += 5.0;
        }

        let score = score.clamp(0.0, 100.0);
        let urgency = if score < self.params.health_critical {
            MaintenanceUrgency::Critical
        } else if score < self.params.health_warning {
            MaintenanceUrgency::Warning
        } else if score < self.params.health_advisory {
            MaintenanceUrgency::Advisory
        } else {
            MaintenanceUrgency::None
        };

        HealthReport {
            score,
            urgency,
            recommendations,
        }
    }
}

impl Detector for ElectricalAnalyzer {
    fn evaluate(
        &mut self,
        _ctx: &EnvironmentalContext,
        readings: &[SensorReading],
        baselines: &HistoricalBaseline,
    ) -> DetectorOutput {
        let acoustic = self.pending_acoustic.take();

        let p_acoustic = self.acoustic_probability(acoustic);
        let (p_emf, emf_z) = self.emf_probability(readings, baselines);
        let (p_thermal, surface_temp) = self.thermal_probability(readings);

        let weight_sum =
            self.params.weight_acoustic + self.params.weight_emf + self.params.weight_thermal;
        let probability = (self.params.weight_acoustic * p_acoustic
            + self.params.weight_emf * p_emf
            + self.params.weight_thermal * p_thermal)
            / weight_sum;

        let mut evidence = EvidenceList::new();
        if let Some(analysis) = acoustic {
            if p_acoustic > 0.0 {
                push_evidence(
                    &mut evidence,
                    DetectionEvidence::with_measurement(
                        "arcing_acoustic_signature",
                        p_acoustic,
                        analysis.match_score,
                    ),
                );
            }
        }
        if p_emf > 0.0 {
            push_evidence(
                &mut evidence,
                DetectionEvidence::with_measurement("emf_fluctuation", p_emf, emf_z),
            );
        }
        if p_thermal > 0.0 {
            push_evidence(
                &mut evidence,
                DetectionEvidence::with_measurement("thermal_hotspot", p_thermal, surface_temp),
            );
        }

        if evidence.is_empty() {
            return DetectorOutput::quiet();
        }

        // Confidence from independent channel agreement
        let agreeing = [p_acoustic, p_emf, p_thermal]
            .iter()
            .filter(|&&p| p > CHANNEL_AGREEMENT_FLOOR)
            .count();
        let confidence = Confidence::from_float(match agreeing {
            0 => 0.3,
            1 => 0.45,
            2 => 0.7,
            _ => 0.9,
        });

        DetectorOutput {
            probability: probability.clamp(0.0, 1.0),
            confidence,
            evidence,
        }
    }

    fn name(&self) -> &'static str {
        "electrical"
    }
}

/// Newest reading for a parameter within the cycle's reading set
fn latest(readings: &[SensorReading], parameter: ParameterId) -> Option<&SensorReading> {
    readings
        .iter()
        .filter(|r| r.parameter == parameter)
        .max_by_key(|r| r.timestamp)
}

/// Goertzel single-bin DFT power
///
/// Returns |X(f)|²; for a full-scale tone at the bin this is
/// (A·N/2)². Callers rescale into energy units as needed.
fn goertzel_power(samples: &[f32], freq_hz: f32, sample_rate_hz: f32) -> f32 {
    let omega = 2.0 * core::f32::consts::PI * freq_hz / sample_rate_hz;
    let coeff = 2.0 * cosf(omega);

    let mut s_prev = 0.0f32;
    let mut s_prev2 = 0.0f32;
    for &x in samples {
        let s = x + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    (s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2).max(0.0)
}
