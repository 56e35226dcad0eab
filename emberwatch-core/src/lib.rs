//! Detection engine for Emberwatch field monitors
//!
//! Turns raw, noisy, multi-modal sensor streams into confidence-scored
//! threat alerts on a power- and bandwidth-constrained embedded
//! platform.
//!
//! Key constraints:
//! - Single-threaded, cooperative, cycle-based execution
//! - No heap allocation in the hot path
//! - Every stage bounded by the per-cycle time budget
//!
//! ```no_run
//! use emberwatch_core::{
//!     config::DetectionParameters,
//!     context::EnvironmentalContext,
//!     cycle::DetectionEngine,
//!     events::SensorId,
//!     time::MonotonicClock,
//! };
//!
//! let mut engine = DetectionEngine::boot(
//!     MonotonicClock::new(),
//!     SensorId::new("zone_a").unwrap(),
//!     DetectionParameters::default(),
//! ).expect("boot configuration must be valid");
//!
//! // register drivers, then once per scheduler slot:
//! let ctx = EnvironmentalContext::default();
//! let outcome = engine.run_cycle(&ctx, None, None);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod acquisition;
pub mod alerts;
pub mod baseline;
pub mod buffer;
pub mod config;
pub mod context;
pub mod cycle;
pub mod detectors;
pub mod errors;
pub mod events;
pub mod fusion;
pub mod temporal;
pub mod time;

// Public API
pub use acquisition::{AcquisitionEngine, OperatingMode, RawSample, SensorDriver};
pub use alerts::{AlertCandidate, AlertClassifier};
pub use config::{ConfigStore, DetectionParameters};
pub use context::EnvironmentalContext;
pub use cycle::{AlertSink, CycleOutcome, DetectionEngine, TelemetrySink};
pub use detectors::{
    ChemicalAnalyzer, Detector, DetectorOutput, ElectricalAnalyzer, EnvironmentalRiskAnalyzer,
};
pub use errors::{ConfigError, SensorFault};
pub use events::{
    AlertEvent, AlertType, DetectionEvidence, FusedParameter, ParameterId, SensorId,
    SensorReading, Severity, VocChannel,
};
pub use fusion::{Confidence, FusionEngine};
pub use temporal::TemporalEngine;

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Warning-level logging shim
///
/// Dispatches to `log` on std targets and `defmt` on embedded ones so
/// call sites stay identical across builds.
#[macro_export]
macro_rules! ew_warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        ::log::warn!($($arg)*);
        #[cfg(all(feature = "defmt", not(feature = "log")))]
        ::defmt::warn!($($arg)*);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        { let _ = ::core::format_args!($($arg)*); }
    }};
}

/// Debug-level logging shim; see [`ew_warn`]
#[macro_export]
macro_rules! ew_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        ::log::debug!($($arg)*);
        #[cfg(all(feature = "defmt", not(feature = "log")))]
        ::defmt::debug!($($arg)*);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        { let _ = ::core::format_args!($($arg)*); }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
