//! Historical Baselines for Drift Comparison
//!
//! ## Overview
//!
//! Per-parameter rolling statistics: a short window of recent fused
//! values, the rolling mean/variance derived from it, and the last
//! known-good value the fusion engine falls back to when every reading
//! for a parameter is excluded as an outlier.
//!
//! ## Ownership
//!
//! One `HistoricalBaseline` instance is owned by the temporal
//! correlation engine and mutated only at the end of the temporal
//! stage. Detectors and the fusion engine receive it by shared
//! reference for the duration of a cycle, so within a cycle the
//! baselines are a stable snapshot of the previous cycles.

use heapless::FnvIndexMap;

use crate::buffer::SampleWindow;
use crate::events::ParameterId;
use crate::time::Timestamp;

/// Samples retained per parameter
pub const BASELINE_WINDOW: usize = 32;

/// Maximum distinct parameters tracked (power of 2 for the index map)
pub const MAX_TRACKED_PARAMETERS: usize = 32;

/// Rolling statistics for one parameter
#[derive(Debug, Clone, Default)]
pub struct BaselineStats {
    window: SampleWindow<BASELINE_WINDOW>,
    last_good: Option<f32>,
}

impl BaselineStats {
    /// Rolling mean; 0.0 before any sample exists so deviation math
    /// degrades to "deviation from zero" on a cold start
    pub fn mean(&self) -> f32 {
        self.window.mean().unwrap_or(0.0)
    }

    /// Rolling standard deviation
    pub fn std_dev(&self) -> f32 {
        self.window.std_dev().unwrap_or(0.0)
    }

    /// Z-score of a value against the window
    ///
    /// Returns 0.0 when the window lacks the spread to judge.
    pub fn z_score(&self, value: f32) -> f32 {
        let std = self.std_dev();
        if std <= f32::EPSILON {
            return 0.0;
        }
        (value - self.mean()) / std
    }

    /// Trend slope of the window in units per second
    pub fn slope_per_second(&self) -> f32 {
        self.window.slope_per_second().unwrap_or(0.0)
    }

    /// Last value accepted as good
    pub fn last_good(&self) -> Option<f32> {
        self.last_good
    }

    /// Number of samples in the window
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Read access to the underlying window
    pub fn window(&self) -> &SampleWindow<BASELINE_WINDOW> {
        &self.window
    }

    fn record(&mut self, value: f32, timestamp: Timestamp, good: bool) {
        self.window.push(value, timestamp);
        if good {
            self.last_good = Some(value);
        }
    }
}

/// Per-parameter baseline store
#[derive(Default)]
pub struct HistoricalBaseline {
    stats: FnvIndexMap<ParameterId, BaselineStats, MAX_TRACKED_PARAMETERS>,
}

impl HistoricalBaseline {
    pub fn new() -> Self {
        Self {
            stats: FnvIndexMap::new(),
        }
    }

    /// Statistics for one parameter, if any history exists
    pub fn stats(&self, parameter: ParameterId) -> Option<&BaselineStats> {
        self.stats.get(&parameter)
    }

    /// Rolling mean, defaulting to 0.0 for unseen parameters
    pub fn mean(&self, parameter: ParameterId) -> f32 {
        self.stats(parameter).map(|s| s.mean()).unwrap_or(0.0)
    }

    /// Z-score against the parameter's window, 0.0 when unseen
    pub fn z_score(&self, parameter: ParameterId, value: f32) -> f32 {
        self.stats(parameter).map(|s| s.z_score(value)).unwrap_or(0.0)
    }

    /// Last known-good value for fusion fallback
    pub fn last_good(&self, parameter: ParameterId) -> Option<f32> {
        self.stats(parameter).and_then(|s| s.last_good())
    }

    /// Record a fused value into the parameter's window
    ///
    /// `good` marks values that survived fusion normally (fallbacks and
    /// substituted outliers are recorded but never become last-good).
    ///
    /// Called once per cycle per parameter, at the end of the temporal
    /// stage. A full map silently drops new parameters rather than
    /// disturbing tracked ones; the closed `ParameterId` set is sized
    /// to fit.
    pub fn record(&mut self, parameter: ParameterId, value: f32, timestamp: Timestamp, good: bool) {
        if let Some(stats) = self.stats.get_mut(&parameter) {
            stats.record(value, timestamp, good);
            return;
        }

        let mut stats = BaselineStats::default();
        stats.record(value, timestamp, good);
        let _ = self.stats.insert(parameter, stats);
    }
}
