//! Confidence Scoring for Fusion and Detection Outputs
//!
//! ## Overview
//!
//! Every stage of the pipeline annotates its output with a confidence
//! in [0, 1]. This module provides the shared representation and the
//! combination rules: individual sensor confidences feed fusion,
//! fusion confidence feeds temporal correlation, and the classifier
//! maps (probability, confidence) pairs onto severities.
//!
//! ## Representation
//!
//! Confidence is stored as fixed-point `u16` (0-65535 maps to 0.0-1.0)
//! for determinism and cheap comparison on targets without an FPU.
//! Conversions to `f32` exist at the arithmetic boundaries only.
//!
//! ## Combination Rules
//!
//! - `combine` — arithmetic mean with a conservative 61/64 adjustment
//!   (≈0.95). The geometric mean would be the principled choice for
//!   combining independent confidences, but it needs an nth root; the
//!   adjusted arithmetic mean stays within a few percent for the low
//!   variance typical of sensor groups and errs low, which is the safe
//!   direction for alerting.
//! - `from_agreement` — maps inter-sensor spread to confidence with a
//!   piecewise-linear approximation of exponential decay.
//! - `penalized` — multiplicative penalty for anomaly scores and
//!   outlier substitution.

/// Confidence score in range [0, 1]
///
/// 0.0 = no confidence, 1.0 = full confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Confidence {
    /// Fixed-point representation (0-65535 maps to 0.0-1.0)
    value: u16,
}

impl Confidence {
    /// No confidence (0%)
    pub const ZERO: Self = Self { value: 0 };

    /// Minimum meaningful confidence (1%)
    pub const FLOOR: Self = Self { value: 655 };

    /// Moderate confidence (50%)
    pub const MODERATE: Self = Self { value: 32768 };

    /// Full confidence (100%)
    pub const FULL: Self = Self { value: 65535 };

    /// Create from floating point value, clamped to [0, 1]
    pub fn from_float(confidence: f32) -> Self {
        let clamped = confidence.clamp(0.0, 1.0);
        Self {
            value: (clamped * 65535.0) as u16,
        }
    }

    /// Convert to floating point [0, 1]
    pub fn as_float(&self) -> f32 {
        self.value as f32 / 65535.0
    }

    /// Raw fixed-point value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Check if confidence is critically low
    pub fn is_critical(&self) -> bool {
        *self < Self::FLOOR
    }

    /// Combine multiple confidence scores
    ///
    /// Arithmetic mean with a 61/64 (≈0.95) adjustment; see module docs
    /// for why this stands in for the geometric mean.
    pub fn combine(scores: &[Self]) -> Self {
        if scores.is_empty() {
            return Self::ZERO;
        }

        let sum: u32 = scores.iter().map(|s| s.value as u32).sum();
        let mean = (sum / scores.len() as u32) as u16;
        let adjusted = ((mean as u32 * 61) / 64) as u16;

        Self { value: adjusted }
    }

    /// Confidence from inter-sensor agreement
    ///
    /// `spread` is the standard deviation among retained readings,
    /// `scale` the deviation considered "normal disagreement" for the
    /// parameter. Piecewise-linear approximation of exp(-x) keeps this
    /// off the float-heavy path.
    pub fn from_agreement(spread: f32, scale: f32) -> Self {
        if scale <= 0.0 || !spread.is_finite() {
            return Self::MODERATE;
        }

        let ratio = spread / scale;
        let confidence = if ratio < 0.5 {
            1.0 - 0.4 * ratio
        } else if ratio < 1.0 {
            0.8 - 0.4 * (ratio - 0.5)
        } else if ratio < 2.0 {
            0.6 - 0.3 * (ratio - 1.0)
        } else {
            0.3 - 0.1 * (ratio - 2.0)
        };

        Self::from_float(confidence.max(0.0))
    }

    /// Apply a multiplicative penalty factor in [0, 1]
    pub fn penalized(&self, factor: f32) -> Self {
        Self::from_float(self.as_float() * factor.clamp(0.0, 1.0))
    }

    /// Scale by another confidence
    pub fn scaled_by(&self, other: Self) -> Self {
        let product = (self.value as u32 * other.value as u32) / 65535;
        Self {
            value: product as u16,
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::MODERATE
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Confidence {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "confidence {}/65535", self.value);
    }
}
