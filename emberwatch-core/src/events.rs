//! Data Model for the Detection Pipeline
//!
//! ## Overview
//!
//! This module defines the types that flow between pipeline stages:
//! raw readings out of acquisition, evidence out of the domain
//! detectors, fused parameters out of the fusion engine, and alert
//! events out of the classifier.
//!
//! ## Memory Model
//!
//! All types here are designed for embedded constraints:
//! - **Size**: readings and evidence fit well inside a cache line
//! - **Lifetime**: stack-allocated, no heap required
//! - **Identifiers**: sensor ids are inline strings, evidence tags are
//!   `&'static str` drawn from a closed set
//!
//! ## Invariants
//!
//! - every confidence and probability value lies in [0, 1]
//! - every `FusedParameter` has at least one contributing sensor
//! - every `AlertEvent` carries at least one `DetectionEvidence` entry
//!
//! The constructors in this module enforce these; downstream stages may
//! rely on them.

use heapless::Vec;

use crate::fusion::confidence::Confidence;
use crate::time::Timestamp;
use core::fmt;

/// Maximum length for inline sensor IDs
pub const MAX_INLINE_ID: usize = 15;

/// Maximum contributing sensors recorded per fused parameter
pub const MAX_CONTRIBUTORS: usize = 8;

/// Maximum evidence entries a single detector output may carry
pub const MAX_EVIDENCE: usize = 8;

/// Maximum evidence entries an alert accumulates (merging included)
pub const MAX_ALERT_EVIDENCE: usize = 16;

/// VOC channel enumeration
///
/// Each channel maps to one electrochemical/MOS cell on the chemical
/// sensing front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum VocChannel {
    Formaldehyde = 0,
    Acetaldehyde = 1,
    Acrolein = 2,
    Phenol = 3,
    Cresol = 4,
    Guaiacol = 5,
    CarbonMonoxide = 6,
    NitrogenDioxide = 7,
}

impl VocChannel {
    /// All channels, in cell order
    pub const ALL: [VocChannel; 8] = [
        VocChannel::Formaldehyde,
        VocChannel::Acetaldehyde,
        VocChannel::Acrolein,
        VocChannel::Phenol,
        VocChannel::Cresol,
        VocChannel::Guaiacol,
        VocChannel::CarbonMonoxide,
        VocChannel::NitrogenDioxide,
    ];

    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            VocChannel::Formaldehyde => "formaldehyde",
            VocChannel::Acetaldehyde => "acetaldehyde",
            VocChannel::Acrolein => "acrolein",
            VocChannel::Phenol => "phenol",
            VocChannel::Cresol => "cresol",
            VocChannel::Guaiacol => "guaiacol",
            VocChannel::CarbonMonoxide => "co",
            VocChannel::NitrogenDioxide => "no2",
        }
    }
}

/// Physical parameter enumeration
///
/// Maps to specific detectors and plausibility limits. Closed set:
/// adding a parameter means adding its detector routing, so `Custom`
/// variants are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParameterId {
    /// One VOC concentration channel, in ppb
    Voc(VocChannel),
    /// Ambient air temperature, °C
    AirTemperature,
    /// Equipment surface temperature (thermal imager spot max), °C
    SurfaceTemperature,
    /// Relative humidity, %
    Humidity,
    /// Wind speed, m/s
    WindSpeed,
    /// Accumulated precipitation, mm
    Precipitation,
    /// Electromagnetic field strength, V/m
    EmField,
    /// Broadband acoustic level, dB
    AcousticLevel,
    /// Vibration RMS acceleration, m/s²
    VibrationRms,
}

impl ParameterId {
    /// Get human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            ParameterId::Voc(ch) => ch.name(),
            ParameterId::AirTemperature => "air_temperature",
            ParameterId::SurfaceTemperature => "surface_temperature",
            ParameterId::Humidity => "humidity",
            ParameterId::WindSpeed => "wind_speed",
            ParameterId::Precipitation => "precipitation",
            ParameterId::EmField => "em_field",
            ParameterId::AcousticLevel => "acoustic_level",
            ParameterId::VibrationRms => "vibration_rms",
        }
    }

    /// Get expected unit of measurement
    pub const fn unit(&self) -> &'static str {
        match self {
            ParameterId::Voc(_) => "ppb",
            ParameterId::AirTemperature => "°C",
            ParameterId::SurfaceTemperature => "°C",
            ParameterId::Humidity => "%",
            ParameterId::WindSpeed => "m/s",
            ParameterId::Precipitation => "mm",
            ParameterId::EmField => "V/m",
            ParameterId::AcousticLevel => "dB",
            ParameterId::VibrationRms => "m/s²",
        }
    }

    /// Plausible physical range for the parameter
    ///
    /// Readings outside this range are sensor faults, not data.
    pub const fn plausible_range(&self) -> (f32, f32) {
        match self {
            ParameterId::Voc(_) => (0.0, 50_000.0),
            ParameterId::AirTemperature => (-60.0, 85.0),
            ParameterId::SurfaceTemperature => (-60.0, 400.0),
            ParameterId::Humidity => (0.0, 100.0),
            ParameterId::WindSpeed => (0.0, 80.0),
            ParameterId::Precipitation => (0.0, 500.0),
            ParameterId::EmField => (0.0, 5_000.0),
            ParameterId::AcousticLevel => (0.0, 140.0),
            ParameterId::VibrationRms => (0.0, 200.0),
        }
    }
}

/// Inline string for sensor IDs
///
/// Avoids heap allocation for the short ids used on the sensing bus.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorId {
    len: u8,
    data: [u8; MAX_INLINE_ID],
}

impl SensorId {
    /// Create from string slice; `None` if longer than [`MAX_INLINE_ID`]
    pub fn new(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() > MAX_INLINE_ID {
            return None;
        }

        let mut data = [0u8; MAX_INLINE_ID];
        data[..bytes.len()].copy_from_slice(bytes);

        Some(Self {
            len: bytes.len() as u8,
            data,
        })
    }

    /// Get as string slice
    pub fn as_str(&self) -> &str {
        // Only valid UTF-8 is stored by new()
        core::str::from_utf8(&self.data[..self.len as usize])
            .expect("SensorId contains invalid UTF-8")
    }
}

impl fmt::Debug for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Validated reading from one sensor
///
/// Immutable once produced by the acquisition layer.
#[derive(Debug, Clone, Copy)]
pub struct SensorReading {
    /// Sensor identifier (e.g. "voc_a_ch1")
    pub sensor_id: SensorId,
    /// Physical parameter measured
    pub parameter: ParameterId,
    /// Compensated, filtered value in the parameter's unit
    pub value: f32,
    /// Acquisition timestamp in milliseconds
    pub timestamp: Timestamp,
    /// Per-reading confidence (0.0-1.0)
    pub confidence: f32,
}

/// A named, weighted observation supporting a detection decision
///
/// Immutable; produced by a domain detector or the fusion consistency
/// pass, consumed by the alert classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionEvidence {
    /// Tag from the closed evidence vocabulary
    /// (e.g. "cellulose_decomposition")
    pub tag: &'static str,
    /// Numeric contribution to the owning score
    pub contribution: f32,
    /// Optional measurement snippet backing the observation
    pub measurement: Option<f32>,
}

impl DetectionEvidence {
    pub const fn new(tag: &'static str, contribution: f32) -> Self {
        Self {
            tag,
            contribution,
            measurement: None,
        }
    }

    pub const fn with_measurement(tag: &'static str, contribution: f32, measurement: f32) -> Self {
        Self {
            tag,
            contribution,
            measurement: Some(measurement),
        }
    }
}

/// Bounded evidence list used by detector outputs
pub type EvidenceList = Vec<DetectionEvidence, MAX_EVIDENCE>;

/// One parameter fused across sensors, produced once per cycle
#[derive(Debug, Clone)]
pub struct FusedParameter {
    /// Parameter that was fused
    pub parameter: ParameterId,
    /// Confidence-weighted fused value
    pub value: f32,
    /// Combined confidence of the fusion
    pub confidence: Confidence,
    /// Sensors whose readings survived outlier exclusion
    pub contributors: Vec<SensorId, MAX_CONTRIBUTORS>,
    /// Set when the value is the historical fallback because every
    /// reading was excluded as an outlier
    pub fallback: bool,
}

/// Alert taxonomy
///
/// Closed set: the classifier routes each detector to exactly one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AlertType {
    /// Chemical pyrolysis signature (pre-combustion)
    Pyrolysis = 0,
    /// Electrical arcing
    Arcing = 1,
    /// Equipment health degradation
    EquipmentDegradation = 2,
    /// Fire-weather composite risk
    FireWeatherRisk = 3,
    /// Temporal anomaly on a fused parameter
    ParameterAnomaly = 4,
}

impl AlertType {
    pub const fn name(&self) -> &'static str {
        match self {
            AlertType::Pyrolysis => "pyrolysis",
            AlertType::Arcing => "arcing",
            AlertType::EquipmentDegradation => "equipment_degradation",
            AlertType::FireWeatherRisk => "fire_weather_risk",
            AlertType::ParameterAnomaly => "parameter_anomaly",
        }
    }
}

/// Ordered severity taxonomy
///
/// Ordering is part of the contract: escalation moves strictly upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Severity {
    Information = 0,
    Advisory = 1,
    Watch = 2,
    Warning = 3,
    Critical = 4,
    Emergency = 5,
}

impl Severity {
    /// Next level up, saturating at Emergency
    pub const fn escalated(self) -> Self {
        match self {
            Severity::Information => Severity::Advisory,
            Severity::Advisory => Severity::Watch,
            Severity::Watch => Severity::Warning,
            Severity::Warning => Severity::Critical,
            Severity::Critical => Severity::Emergency,
            Severity::Emergency => Severity::Emergency,
        }
    }

    /// Next level down, saturating at Information
    pub const fn demoted(self) -> Self {
        match self {
            Severity::Information => Severity::Information,
            Severity::Advisory => Severity::Information,
            Severity::Watch => Severity::Advisory,
            Severity::Warning => Severity::Watch,
            Severity::Critical => Severity::Warning,
            Severity::Emergency => Severity::Critical,
        }
    }
}

/// Alert lifecycle state
///
/// Transitions past `New` are owned by the downstream alert-management
/// collaborator; this core only ever emits `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlertState {
    New,
    Acknowledged,
    Dismissed,
    InProgress,
    Escalated,
    Resolved,
    Closed,
}

/// Classified, confidence-scored alert
///
/// Created by the alert classifier, handed to the transport
/// collaborator, never mutated afterward by this core.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    /// Alert taxonomy entry
    pub alert_type: AlertType,
    /// Severity level
    pub severity: Severity,
    /// Detection probability (0.0-1.0)
    pub probability: f32,
    /// Detection confidence
    pub confidence: Confidence,
    /// Supporting evidence, never empty
    pub evidence: Vec<DetectionEvidence, MAX_ALERT_EVIDENCE>,
    /// When the alert was classified
    pub timestamp: Timestamp,
    /// Monitoring zone the alert originates from
    pub location: SensorId,
    /// Timestamp of a related earlier alert, if this one corroborates it
    pub related: Option<Timestamp>,
    /// Lifecycle state; always `New` on emission
    pub state: AlertState,
}

impl AlertEvent {
    /// Build a new alert; returns `None` when the evidence list is
    /// empty, which the classifier treats as "not verifiable".
    pub fn new(
        alert_type: AlertType,
        severity: Severity,
        probability: f32,
        confidence: Confidence,
        evidence: &[DetectionEvidence],
        timestamp: Timestamp,
        location: SensorId,
    ) -> Option<Self> {
        if evidence.is_empty() {
            return None;
        }

        let mut list = Vec::new();
        for ev in evidence {
            if list.push(*ev).is_err() {
                break;
            }
        }

        Some(Self {
            alert_type,
            severity,
            probability: probability.clamp(0.0, 1.0),
            confidence,
            evidence: list,
            timestamp,
            location,
            related: None,
            state: AlertState::New,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_id_roundtrip() {
        let id = SensorId::new("voc_a_ch1").unwrap();
        assert_eq!(id.as_str(), "voc_a_ch1");

        // Too long
        assert!(SensorId::new("this_is_a_very_long_sensor_id").is_none());
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::Information < Severity::Emergency);
        assert!(Severity::Warning < Severity::Critical);
        assert_eq!(Severity::Emergency.escalated(), Severity::Emergency);
        assert_eq!(Severity::Watch.escalated(), Severity::Warning);
        assert_eq!(Severity::Information.demoted(), Severity::Information);
    }

    #[test]
    fn alert_requires_evidence() {
        let location = SensorId::new("zone_a").unwrap();
        let none = AlertEvent::new(
            AlertType::Pyrolysis,
            Severity::Warning,
            0.8,
            Confidence::from_float(0.7),
            &[],
            1000,
            location,
        );
        assert!(none.is_none());

        let some = AlertEvent::new(
            AlertType::Pyrolysis,
            Severity::Warning,
            0.8,
            Confidence::from_float(0.7),
            &[DetectionEvidence::new("cellulose_decomposition", 30.0)],
            1000,
            location,
        )
        .unwrap();
        assert_eq!(some.state, AlertState::New);
        assert_eq!(some.evidence.len(), 1);
    }

    #[test]
    fn probability_is_clamped() {
        let location = SensorId::new("zone_a").unwrap();
        let alert = AlertEvent::new(
            AlertType::Arcing,
            Severity::Critical,
            1.7,
            Confidence::from_float(0.9),
            &[DetectionEvidence::new("arcing_acoustic_signature", 0.9)],
            1000,
            location,
        )
        .unwrap();
        assert_eq!(alert.probability, 1.0);
    }

    #[test]
    fn parameter_metadata() {
        assert_eq!(ParameterId::Voc(VocChannel::Formaldehyde).name(), "formaldehyde");
        assert_eq!(ParameterId::Voc(VocChannel::Formaldehyde).unit(), "ppb");
        assert_eq!(ParameterId::Humidity.plausible_range(), (0.0, 100.0));
    }
}
