//! Fault Taxonomy for the Detection Engine
//!
//! ## Design Philosophy
//!
//! Emberwatch's fault types follow the graceful-degradation contract of
//! the detection pipeline:
//!
//! 1. **Small Size**: Fault variants stay minimal (inline `&'static str`
//!    and scalars only) since they are returned in the per-cycle hot
//!    path and may be counted per sensor.
//!
//! 2. **No Heap Allocation**: No `String` anywhere — deterministic
//!    memory usage on the target.
//!
//! 3. **Copy Semantics**: Faults implement `Copy` so they can be stored
//!    in per-sensor state without move complications.
//!
//! ## Fault Categories
//!
//! - `SensorFault` — recovered locally: the sensor is excluded for the
//!   cycle and any fusion depending on it runs at reduced confidence.
//!   Nothing here halts the pipeline.
//! - `ConfigError` — fatal at boot, recoverable at runtime reload (the
//!   engine keeps the last valid configuration and logs a warning).
//!
//! A cycle that produces no alert is a normal outcome, not an error,
//! so there is no "insufficient evidence" variant. Cross-parameter
//! implausibility surfaces as evidence annotation, never as a fault.

use thiserror_no_std::Error;

/// Result type for sensor acquisition operations
pub type SensorResult<T> = Result<T, SensorFault>;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-sensor faults - kept small for embedded use
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SensorFault {
    /// Reading not ready by the cycle deadline
    #[error("Sensor read timed out")]
    Timeout,

    /// Driver reported the sensor is still warming up or converting
    #[error("Sensor not ready")]
    NotReady,

    /// Bus or wiring failure, sensor unreachable
    #[error("Sensor disconnected")]
    Disconnected,

    /// Value outside the plausible range for its parameter
    #[error("Value {value} outside range [{min}, {max}]")]
    OutOfRange {
        /// The raw reading that failed the plausibility check
        value: f32,
        /// Minimum plausible value for the parameter
        min: f32,
        /// Maximum plausible value for the parameter
        max: f32,
    },

    /// Value makes no numeric sense (NaN, infinity)
    #[error("Invalid value: not a valid number")]
    InvalidValue,
}

/// Configuration faults
///
/// Fatal when raised from `DetectionParameters::validate` at boot;
/// recoverable at runtime reload, where the engine falls back to the
/// last valid configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A required threshold is missing or non-finite
    #[error("Invalid threshold: {name}")]
    InvalidThreshold {
        name: &'static str,
    },

    /// A weight is negative or non-finite
    #[error("Invalid weight: {name}")]
    InvalidWeight {
        name: &'static str,
    },

    /// A configured (low, high) range is inverted
    #[error("Inverted range: {name}")]
    InvertedRange {
        name: &'static str,
    },

    /// Reload offered a version not newer than the active one
    #[error("Stale config version {offered} (active {active})")]
    StaleVersion {
        /// Version currently active
        active: u32,
        /// Version offered by the reload
        offered: u32,
    },

    /// Payload could not be parsed at all
    #[error("Malformed configuration payload")]
    Malformed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorFault {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Timeout => defmt::write!(fmt, "sensor timeout"),
            Self::NotReady => defmt::write!(fmt, "sensor not ready"),
            Self::Disconnected => defmt::write!(fmt, "sensor disconnected"),
            Self::OutOfRange { value, min, max } =>
                defmt::write!(fmt, "value {} outside [{}, {}]", value, min, max),
            Self::InvalidValue => defmt::write!(fmt, "invalid value"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InvalidThreshold { name } =>
                defmt::write!(fmt, "invalid threshold: {}", name),
            Self::InvalidWeight { name } =>
                defmt::write!(fmt, "invalid weight: {}", name),
            Self::InvertedRange { name } =>
                defmt::write!(fmt, "inverted range: {}", name),
            Self::StaleVersion { active, offered } =>
                defmt::write!(fmt, "stale config version {} (active {})", offered, active),
            Self::Malformed =>
                defmt::write!(fmt, "malformed configuration"),
        }
    }
}
