//! Alert Classifier & Generator
//!
//! ## Overview
//!
//! Final pipeline stage: turns detector outputs, temporally-adjusted
//! parameters, and their evidence into taxonomy-tagged, severity-
//! leveled [`AlertEvent`]s.
//!
//! ## Candidate State Machine
//!
//! ```text
//! Candidate → Verified → Emitted
//!      ↓          ↓
//!   (dropped)  Suppressed(duplicate)
//! ```
//!
//! A candidate becomes Verified only if its probability exceeds the
//! severity-specific threshold *and* at least one corroborating
//! evidence item exists. Severity comes from mapping the probability
//! onto the ordered taxonomy, demoted one level when confidence is
//! low, escalated one level when the backing parameter shows a
//! sustained worsening trend — the trend path is what catches a fire
//! building below absolute thresholds.
//!
//! ## Duplicate Suppression
//!
//! New candidates are compared against recently emitted alerts of the
//! same type and location inside a sliding window. Near-duplicates
//! merge their evidence into the classifier's record of the existing
//! alert instead of emitting anew, so operators see one alert
//! accumulating corroboration rather than a stream of repeats. The
//! already-handed-off event itself is never mutated.

use heapless::Vec;

use crate::config::AlertParams;
use crate::events::{
    AlertEvent, AlertType, DetectionEvidence, SensorId, Severity, MAX_ALERT_EVIDENCE,
};
use crate::fusion::confidence::Confidence;
use crate::time::Timestamp;

/// Maximum alerts emitted per cycle
pub const MAX_ALERTS_PER_CYCLE: usize = 4;

/// Recently emitted alerts tracked for suppression
const RECENT_WINDOW: usize = 8;

/// Candidate lifecycle, tracked per classification decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    /// Below the verification bar; dropped silently
    Candidate,
    /// Verified but matched a recent alert; evidence merged
    Suppressed,
    /// Verified and emitted
    Emitted,
}

/// One alert candidate assembled by the cycle runner
#[derive(Debug, Clone)]
pub struct AlertCandidate {
    pub alert_type: AlertType,
    pub probability: f32,
    pub confidence: Confidence,
    pub evidence: Vec<DetectionEvidence, MAX_ALERT_EVIDENCE>,
    /// Monitoring zone the candidate originates from
    pub location: SensorId,
    /// Sustained worsening trend behind this candidate
    pub worsening: bool,
}

impl AlertCandidate {
    pub fn new(
        alert_type: AlertType,
        probability: f32,
        confidence: Confidence,
        evidence: &[DetectionEvidence],
        location: SensorId,
    ) -> Self {
        let mut list = Vec::new();
        for ev in evidence {
            if list.push(*ev).is_err() {
                break;
            }
        }
        Self {
            alert_type,
            probability: probability.clamp(0.0, 1.0),
            confidence,
            evidence: list,
            location,
            worsening: false,
        }
    }

    pub fn with_worsening(mut self, worsening: bool) -> Self {
        self.worsening = worsening;
        self
    }
}

/// Record of a recently emitted alert, owned by the classifier
#[derive(Debug, Clone)]
struct RecentAlert {
    alert_type: AlertType,
    location: SensorId,
    emitted_at: Timestamp,
    /// First-emission timestamp, kept for related-alert references
    first_emitted_at: Timestamp,
    /// Accumulated evidence, original plus merged near-duplicates
    evidence: Vec<DetectionEvidence, MAX_ALERT_EVIDENCE>,
    /// Candidates merged into this record
    merged: u16,
}

/// Alert classifier with duplicate suppression state
pub struct AlertClassifier {
    params: AlertParams,
    recent: Vec<RecentAlert, RECENT_WINDOW>,
}

impl AlertClassifier {
    pub fn new(params: AlertParams) -> Self {
        Self {
            params,
            recent: Vec::new(),
        }
    }

    /// Swap in reloaded parameters between cycles
    pub fn set_params(&mut self, params: AlertParams) {
        self.params = params;
    }

    /// Classify one cycle's candidates
    ///
    /// Returns the alerts to emit this cycle, each in `New` state.
    /// Recent-alert state mutates only here, at the end of the cycle.
    pub fn classify(
        &mut self,
        candidates: &[AlertCandidate],
        now: Timestamp,
    ) -> Vec<AlertEvent, MAX_ALERTS_PER_CYCLE> {
        // Expire suppression entries that fell out of the window
        self.recent
            .retain(|r| now.saturating_sub(r.emitted_at) <= self.params.suppression_window_ms);

        let mut emitted = Vec::new();

        for candidate in candidates {
            match self.classify_one(candidate, now) {
                (CandidateState::Emitted, Some(alert)) => {
                    let _ = emitted.push(alert);
                }
                _ => {}
            }
        }

        emitted
    }

    /// Number of merges absorbed by the matching recent alert
    pub fn merged_count(&self, alert_type: AlertType, location: SensorId) -> u16 {
        self.recent
            .iter()
            .find(|r| r.alert_type == alert_type && r.location == location)
            .map(|r| r.merged)
            .unwrap_or(0)
    }

    /// Evidence accumulated on the matching recent alert
    pub fn merged_evidence(
        &self,
        alert_type: AlertType,
        location: SensorId,
    ) -> Option<&[DetectionEvidence]> {
        self.recent
            .iter()
            .find(|r| r.alert_type == alert_type && r.location == location)
            .map(|r| r.evidence.as_slice())
    }

    fn classify_one(
        &mut self,
        candidate: &AlertCandidate,
        now: Timestamp,
    ) -> (CandidateState, Option<AlertEvent>) {
        // Verification: evidence first, then the severity-specific bar
        if candidate.evidence.is_empty() {
            return (CandidateState::Candidate, None);
        }

        let Some(mut severity) = self.map_severity(candidate.probability) else {
            return (CandidateState::Candidate, None);
        };

        // Low confidence tempers the call one level
        if candidate.confidence.as_float() < self.params.demote_confidence_below {
            severity = severity.demoted();
        }

        // A sustained worsening trend escalates even below the next
        // absolute threshold
        if candidate.worsening {
            severity = severity.escalated();
        }

        // Duplicate suppression against the recent window
        if let Some(recent) = self
            .recent
            .iter_mut()
            .find(|r| r.alert_type == candidate.alert_type && r.location == candidate.location)
        {
            for ev in candidate.evidence.iter() {
                if !recent.evidence.iter().any(|e| e.tag == ev.tag) {
                    let _ = recent.evidence.push(*ev);
                }
            }
            recent.merged = recent.merged.saturating_add(1);
            recent.emitted_at = now;
            return (CandidateState::Suppressed, None);
        }

        let Some(mut alert) = AlertEvent::new(
            candidate.alert_type,
            severity,
            candidate.probability,
            candidate.confidence,
            &candidate.evidence,
            now,
            candidate.location,
        ) else {
            return (CandidateState::Candidate, None);
        };

        // No same-location record exists past the suppression check,
        // so a surviving same-type record is the same threat seen at
        // another location; reference it
        alert.related = self
            .recent
            .iter()
            .find(|r| r.alert_type == candidate.alert_type)
            .map(|r| r.first_emitted_at);

        let record = RecentAlert {
            alert_type: candidate.alert_type,
            location: candidate.location,
            emitted_at: now,
            first_emitted_at: now,
            evidence: candidate.evidence.clone(),
            merged: 0,
        };
        if self.recent.push(record).is_err() {
            // Window full: drop the oldest record to keep suppressing
            // the newest alerts
            self.recent.remove(0);
            let record = RecentAlert {
                alert_type: candidate.alert_type,
                location: candidate.location,
                emitted_at: now,
                first_emitted_at: now,
                evidence: candidate.evidence.clone(),
                merged: 0,
            };
            let _ = self.recent.push(record);
        }

        (CandidateState::Emitted, Some(alert))
    }

    /// Highest severity whose threshold the probability clears
    fn map_severity(&self, probability: f32) -> Option<Severity> {
        const LEVELS: [Severity; 6] = [
            Severity::Information,
            Severity::Advisory,
            Severity::Watch,
            Severity::Warning,
            Severity::Critical,
            Severity::Emergency,
        ];

        let mut selected = None;
        for (level, &threshold) in LEVELS.iter().zip(self.params.severity_thresholds.iter()) {
            if probability >= threshold {
                selected = Some(*level);
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> SensorId {
        SensorId::new("zone_a").unwrap()
    }

    fn evidence(tag: &'static str) -> DetectionEvidence {
        DetectionEvidence::new(tag, 1.0)
    }

    fn candidate(probability: f32, confidence: f32) -> AlertCandidate {
        AlertCandidate::new(
            AlertType::Pyrolysis,
            probability,
            Confidence::from_float(confidence),
            &[evidence("cellulose_decomposition")],
            zone(),
        )
    }

    #[test]
    fn below_threshold_is_dropped() {
        let mut classifier = AlertClassifier::new(AlertParams::default());
        let out = classifier.classify(&[candidate(0.01, 0.9)], 1000);
        assert!(out.is_empty());
    }

    #[test]
    fn severity_maps_by_probability() {
        let mut classifier = AlertClassifier::new(AlertParams::default());

        let out = classifier.classify(&[candidate(0.25, 0.9)], 1000);
        assert_eq!(out[0].severity, Severity::Advisory);

        // New location so suppression does not interfere
        let mut high = candidate(0.9, 0.9);
        high.location = SensorId::new("zone_b").unwrap();
        let out = classifier.classify(&[high], 2000);
        assert_eq!(out[0].severity, Severity::Emergency);
    }

    #[test]
    fn no_evidence_never_verifies() {
        let mut classifier = AlertClassifier::new(AlertParams::default());
        let bare = AlertCandidate::new(
            AlertType::Pyrolysis,
            0.9,
            Confidence::from_float(0.9),
            &[],
            zone(),
        );
        let out = classifier.classify(&[bare], 1000);
        assert!(out.is_empty());
    }

    #[test]
    fn low_confidence_demotes_one_level() {
        let mut classifier = AlertClassifier::new(AlertParams::default());
        let out = classifier.classify(&[candidate(0.55, 0.2)], 1000);
        // 0.55 maps to Warning; low confidence tempers it to Watch
        assert_eq!(out[0].severity, Severity::Watch);
    }

    #[test]
    fn worsening_trend_escalates_one_level() {
        let mut classifier = AlertClassifier::new(AlertParams::default());
        let c = candidate(0.55, 0.9).with_worsening(true);
        let out = classifier.classify(&[c], 1000);
        assert_eq!(out[0].severity, Severity::Critical);
    }

    #[test]
    fn duplicates_merge_within_window() {
        let mut classifier = AlertClassifier::new(AlertParams::default());

        let out = classifier.classify(&[candidate(0.6, 0.9)], 1000);
        assert_eq!(out.len(), 1);

        // Same type/location 10 s later: suppressed, evidence merged
        let mut again = candidate(0.6, 0.9);
        again.evidence.clear();
        let _ = again.evidence.push(evidence("aldehyde_ratio"));
        let out = classifier.classify(&[again], 11_000);
        assert!(out.is_empty());

        assert_eq!(classifier.merged_count(AlertType::Pyrolysis, zone()), 1);
        let merged = classifier
            .merged_evidence(AlertType::Pyrolysis, zone())
            .unwrap();
        assert!(merged.iter().any(|e| e.tag == "cellulose_decomposition"));
        assert!(merged.iter().any(|e| e.tag == "aldehyde_ratio"));
    }

    #[test]
    fn window_expiry_allows_reemission() {
        let params = AlertParams::default();
        let window = params.suppression_window_ms;
        let mut classifier = AlertClassifier::new(params);

        let out = classifier.classify(&[candidate(0.6, 0.9)], 1000);
        assert_eq!(out.len(), 1);

        // Past the window: a fresh alert, referencing nothing (the
        // expired record is gone)
        let out = classifier.classify(&[candidate(0.6, 0.9)], 1000 + window + 1);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn different_locations_do_not_suppress_each_other() {
        let mut classifier = AlertClassifier::new(AlertParams::default());

        let out = classifier.classify(&[candidate(0.6, 0.9)], 1000);
        assert_eq!(out.len(), 1);

        let mut other = candidate(0.6, 0.9);
        other.location = SensorId::new("zone_b").unwrap();
        let out = classifier.classify(&[other], 2000);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn emitted_alert_is_new_state_with_clamped_probability() {
        let mut classifier = AlertClassifier::new(AlertParams::default());
        let out = classifier.classify(&[candidate(0.6, 0.9)], 1000);
        let alert = &out[0];
        assert_eq!(alert.state, crate::events::AlertState::New);
        assert!(alert.probability >= 0.0 && alert.probability <= 1.0);
        assert!(!alert.evidence.is_empty());
    }
}
