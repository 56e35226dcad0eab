//! Domain Detectors
//!
//! ## Overview
//!
//! Each detector is an independent analyzer specialized to one evidence
//! domain. All run after acquisition and before fusion, against the
//! same read-only inputs: the cycle's validated readings, the
//! environmental context, and last cycle's historical baselines. Each
//! writes only to its own output, so a future implementation may run
//! them in parallel and merge deterministically.
//!
//! ## The Detector Seam
//!
//! The closed set of detectors sits behind one trait so the alert
//! classifier treats them uniformly, and so a separately-specified
//! adaptive detector could plug in later without touching the pipeline.
//!
//! ## Evidence Accumulation
//!
//! Detectors share one scoring pattern: a table of named conditions,
//! each contributing a fixed weight to a running score and appending a
//! tagged [`DetectionEvidence`] entry when satisfied. New rules are a
//! data change, not new branching.

pub mod chemical;
pub mod electrical;
pub mod environmental;

pub use chemical::ChemicalAnalyzer;
pub use electrical::{ArcingAnalysis, ElectricalAnalyzer, HealthReport, MaintenanceUrgency};
pub use environmental::EnvironmentalRiskAnalyzer;

use crate::baseline::HistoricalBaseline;
use crate::context::EnvironmentalContext;
use crate::events::{DetectionEvidence, EvidenceList, SensorReading};
use crate::fusion::confidence::Confidence;

/// Output of one detector for one cycle
#[derive(Debug, Clone, Default)]
pub struct DetectorOutput {
    /// Detection probability (0.0-1.0)
    pub probability: f32,
    /// Confidence in the probability
    pub confidence: Confidence,
    /// Named observations backing the probability
    pub evidence: EvidenceList,
}

impl DetectorOutput {
    /// Output for a cycle with nothing to report
    pub fn quiet() -> Self {
        Self {
            probability: 0.0,
            confidence: Confidence::MODERATE,
            evidence: EvidenceList::new(),
        }
    }

    /// True when the detector found nothing
    pub fn is_quiet(&self) -> bool {
        self.evidence.is_empty()
    }
}

/// Common interface over the closed set of domain detectors
pub trait Detector {
    /// Analyze one cycle's readings
    ///
    /// Must not mutate shared state; all outputs in [0, 1].
    fn evaluate(
        &mut self,
        ctx: &EnvironmentalContext,
        readings: &[SensorReading],
        baselines: &HistoricalBaseline,
    ) -> DetectorOutput;

    /// Detector name for telemetry
    fn name(&self) -> &'static str;
}

/// Push evidence, ignoring overflow past the bounded list
///
/// Evidence lists are sized for the worst case per detector; silently
/// keeping the earliest entries is preferable to failing the cycle.
pub(crate) fn push_evidence(list: &mut EvidenceList, evidence: DetectionEvidence) {
    let _ = list.push(evidence);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_output() {
        let out = DetectorOutput::quiet();
        assert!(out.is_quiet());
        assert_eq!(out.probability, 0.0);
    }
}
