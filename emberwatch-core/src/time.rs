//! Time management for field monitors
//!
//! Provides clock abstraction to handle different time sources:
//! - System clock (when available)
//! - Monotonic counter (for cycle scheduling and rate calculations)
//! - Fixed clock (for deterministic tests)

/// Timestamp in milliseconds since epoch (or device boot for monotonic)
pub type Timestamp = u64;

/// Source of time for the detection engine
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool;
}

/// Monotonic time source using a hardware counter
///
/// Starts at 0 on boot, always increases. The cycle runner only needs
/// deltas, so monotonic time is sufficient for deadline enforcement.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start_ms: Timestamp,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { start_ms: 0 }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        // In a real firmware build this reads the hardware tick counter
        self.start_ms
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// System time source (requires std)
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl TimeSource for SystemClock {
    fn now(&self) -> Timestamp {
        use std::time::{SystemTime, UNIX_EPOCH};

        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }

    fn is_wall_clock(&self) -> bool {
        true
    }
}

/// Fixed time source for deterministic tests
#[derive(Debug, Clone)]
pub struct FixedClock {
    timestamp: Timestamp,
}

impl FixedClock {
    pub fn new(timestamp: Timestamp) -> Self {
        Self { timestamp }
    }

    pub fn set(&mut self, timestamp: Timestamp) {
        self.timestamp = timestamp;
    }

    pub fn advance(&mut self, ms: u64) {
        self.timestamp += ms;
    }
}

impl TimeSource for FixedClock {
    fn now(&self) -> Timestamp {
        self.timestamp
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Convert a value delta over a time delta into a per-second rate
pub fn rate_per_second(value_delta: f32, time_delta_ms: u64) -> f32 {
    if time_delta_ms == 0 {
        return 0.0;
    }

    value_delta * 1000.0 / time_delta_ms as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = FixedClock::new(1000);
        assert_eq!(clock.now(), 1000);

        clock.advance(500);
        assert_eq!(clock.now(), 1500);
    }

    #[test]
    fn rate_calculation() {
        // 10 units in 500ms = 20 units/second
        assert_eq!(rate_per_second(10.0, 500), 20.0);

        // Zero time delta
        assert_eq!(rate_per_second(10.0, 0), 0.0);
    }
}
