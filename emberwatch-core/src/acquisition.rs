//! Sensor Acquisition and Preprocessing
//!
//! ## Overview
//!
//! First stage of every detection cycle: poll each registered sensor
//! driver, validate and filter the raw sample, apply environmental
//! compensation, and hand validated [`SensorReading`]s downstream.
//!
//! ## Non-Blocking Contract
//!
//! Drivers expose `nb::Result` reads. A driver that answers
//! `WouldBlock` is not waited on — the cycle must never stall on
//! hardware latency — and the sensor simply contributes nothing this
//! cycle (counted as a timeout fault). Warm-up and conversion delays
//! therefore cost at most one cycle of data, never cycle budget.
//!
//! ## Fail-Partial
//!
//! Faults are per-sensor. A sensor that faults repeatedly is marked
//! degraded and excluded from fusion inputs until a successful read
//! clears it; the pipeline keeps running on the remaining sensors.
//!
//! ## Preprocessing Order
//!
//! 1. numeric sanity (NaN/inf) and plausibility range for the parameter
//! 2. spike rejection against the sensor's immediate history
//! 3. single-pole low-pass filter
//! 4. environmental compensation (temperature/humidity correction)
//!
//! Compensation runs last so the correction applies to the filtered
//! signal, matching how the channels are characterized.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

use heapless::Vec;

use crate::buffer::SampleWindow;
use crate::config::AcquisitionParams;
use crate::context::EnvironmentalContext;
use crate::errors::SensorFault;
use crate::events::{ParameterId, SensorId, SensorReading};
use crate::time::Timestamp;

/// Maximum sensors one monitor carries
pub const MAX_SENSORS: usize = 16;

/// Immediate history depth used for spike rejection
const SPIKE_HISTORY: usize = 8;

/// Operating mode, set by the power/alert management collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Regular sampling cadence
    Normal,
    /// Elevated cadence while a threat is suspected
    Alert,
    /// Reduced cadence to conserve the battery
    PowerSave,
}

/// One raw sample as produced by a driver
#[derive(Debug, Clone, Copy)]
pub struct RawSample {
    /// Uncompensated value in the parameter's unit
    pub value: f32,
    /// Driver's own quality estimate (0.0-1.0)
    pub quality: f32,
}

/// Capability-polymorphic interface over heterogeneous sensor hardware
///
/// Implemented by the sensor driver collaborator per sensor; this core
/// never touches a bus directly.
pub trait SensorDriver {
    /// Physical parameter this sensor measures
    fn parameter(&self) -> ParameterId;

    /// Poll for a sample; `WouldBlock` while warming up or converting
    fn read(&mut self) -> nb::Result<RawSample, SensorFault>;

    /// Trigger recalibration; default no-op for sensors without one
    fn calibrate(&mut self) -> Result<(), SensorFault> {
        Ok(())
    }
}

/// Per-sensor acquisition state
struct SensorChannel {
    id: SensorId,
    driver: Box<dyn SensorDriver>,
    history: SampleWindow<SPIKE_HISTORY>,
    filtered: Option<f32>,
    consecutive_faults: u8,
    degraded: bool,
}

/// Outcome of one acquisition pass
pub struct AcquisitionOutput {
    /// Validated readings, at most one per sensor
    pub readings: Vec<SensorReading, MAX_SENSORS>,
    /// Faults recorded this pass
    pub faults: u32,
    /// Readings rejected as spikes this pass
    pub rejected_spikes: u32,
}

/// Acquisition engine: owns driver registrations and per-sensor state
pub struct AcquisitionEngine {
    channels: Vec<SensorChannel, MAX_SENSORS>,
}

impl AcquisitionEngine {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
        }
    }

    /// Register a driver under a sensor id
    ///
    /// Returns the driver on a full registry so the caller can report
    /// the misconfiguration.
    pub fn register(
        &mut self,
        id: SensorId,
        driver: Box<dyn SensorDriver>,
    ) -> Result<(), Box<dyn SensorDriver>> {
        self.channels
            .push(SensorChannel {
                id,
                driver,
                history: SampleWindow::new(),
                filtered: None,
                consecutive_faults: 0,
                degraded: false,
            })
            .map_err(|ch| ch.driver)
    }

    /// Sampling interval for the given mode
    pub fn sampling_interval_ms(params: &AcquisitionParams, mode: OperatingMode) -> u32 {
        match mode {
            OperatingMode::Normal => params.normal_interval_ms,
            OperatingMode::Alert => params.alert_interval_ms,
            OperatingMode::PowerSave => params.power_save_interval_ms,
        }
    }

    /// Whether a sensor is currently marked degraded
    pub fn is_degraded(&self, id: SensorId) -> bool {
        self.channels
            .iter()
            .find(|ch| ch.id == id)
            .map(|ch| ch.degraded)
            .unwrap_or(false)
    }

    /// Poll every sensor once and preprocess the results
    pub fn sample_all(
        &mut self,
        now: Timestamp,
        ctx: &EnvironmentalContext,
        params: &AcquisitionParams,
    ) -> AcquisitionOutput {
        let mut readings = Vec::new();
        let mut faults = 0u32;
        let mut rejected_spikes = 0u32;

        for channel in self.channels.iter_mut() {
            match Self::sample_channel(channel, now, ctx, params) {
                Ok(Some(reading)) => {
                    let _ = readings.push(reading);
                }
                Ok(None) => {
                    rejected_spikes += 1;
                }
                Err(_fault) => {
                    faults += 1;
                    channel.consecutive_faults = channel.consecutive_faults.saturating_add(1);
                    if channel.consecutive_faults >= params.degrade_after_faults {
                        if !channel.degraded {
                            crate::ew_warn!(
                                "sensor {} degraded after repeated faults",
                                channel.id.as_str()
                            );
                        }
                        channel.degraded = true;
                    }
                }
            }
        }

        AcquisitionOutput {
            readings,
            faults,
            rejected_spikes,
        }
    }

    fn sample_channel(
        channel: &mut SensorChannel,
        now: Timestamp,
        ctx: &EnvironmentalContext,
        params: &AcquisitionParams,
    ) -> Result<Option<SensorReading>, SensorFault> {
        let raw = match channel.driver.read() {
            Ok(sample) => sample,
            // Not ready by the cycle deadline: fault for this cycle
            Err(nb::Error::WouldBlock) => return Err(SensorFault::Timeout),
            Err(nb::Error::Other(fault)) => return Err(fault),
        };

        if !raw.value.is_finite() {
            return Err(SensorFault::InvalidValue);
        }

        let parameter = channel.driver.parameter();
        let (min, max) = parameter.plausible_range();
        if raw.value < min || raw.value > max {
            return Err(SensorFault::OutOfRange {
                value: raw.value,
                min,
                max,
            });
        }

        // A good read clears the degradation bookkeeping
        channel.consecutive_faults = 0;
        if channel.degraded {
            crate::ew_warn!("sensor {} recovered", channel.id.as_str());
        }
        channel.degraded = false;

        // Spike rejection against immediate history
        if channel.history.len() >= 3 {
            let mean = channel.history.mean().unwrap_or(raw.value);
            let std = channel.history.std_dev().unwrap_or(0.0);
            if std > f32::EPSILON && (raw.value - mean).abs() > params.spike_sigma * std {
                // Record the spike so a genuine step change passes on
                // the next sample instead of being rejected forever
                channel.history.push(raw.value, now);
                return Ok(None);
            }
        }
        channel.history.push(raw.value, now);

        // Single-pole low-pass
        let filtered = match channel.filtered {
            Some(prev) => params.lowpass_alpha * raw.value + (1.0 - params.lowpass_alpha) * prev,
            None => raw.value,
        };
        channel.filtered = Some(filtered);

        let value = compensate(parameter, filtered, ctx);

        Ok(Some(SensorReading {
            sensor_id: channel.id,
            parameter,
            value,
            timestamp: now,
            confidence: raw.quality.clamp(0.0, 1.0),
        }))
    }
}

impl Default for AcquisitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Environmental compensation per parameter class
///
/// VOC cells read high in heat and humidity; EMF probes drift slightly
/// with temperature. Coefficients come from the channel
/// characterization curves; meteorological parameters are measured
/// directly and pass through.
pub fn compensate(parameter: ParameterId, value: f32, ctx: &EnvironmentalContext) -> f32 {
    match parameter {
        ParameterId::Voc(_) => {
            let temp_correction = 1.0 - 0.008 * (ctx.temperature_c - 25.0);
            let humidity_correction = 1.0 - 0.002 * (ctx.humidity_pct - 50.0);
            (value * temp_correction * humidity_correction).max(0.0)
        }
        ParameterId::EmField => {
            let temp_correction = 1.0 - 0.003 * (ctx.temperature_c - 25.0);
            (value * temp_correction).max(0.0)
        }
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VocChannel;

    /// Scripted driver for acquisition tests
    struct ScriptedDriver {
        parameter: ParameterId,
        script: std::vec::Vec<nb::Result<RawSample, SensorFault>>,
        pos: usize,
    }

    impl ScriptedDriver {
        fn new(parameter: ParameterId, script: std::vec::Vec<nb::Result<RawSample, SensorFault>>) -> Self {
            Self {
                parameter,
                script,
                pos: 0,
            }
        }

        fn ok(value: f32) -> nb::Result<RawSample, SensorFault> {
            Ok(RawSample {
                value,
                quality: 0.9,
            })
        }
    }

    impl SensorDriver for ScriptedDriver {
        fn parameter(&self) -> ParameterId {
            self.parameter
        }

        fn read(&mut self) -> nb::Result<RawSample, SensorFault> {
            let result = self.script[self.pos.min(self.script.len() - 1)];
            self.pos += 1;
            result
        }
    }

    fn engine_with(driver: ScriptedDriver) -> AcquisitionEngine {
        let mut engine = AcquisitionEngine::new();
        assert!(engine
            .register(SensorId::new("s1").unwrap(), Box::new(driver))
            .is_ok());
        engine
    }

    #[test]
    fn successful_sample_produces_reading() {
        let driver = ScriptedDriver::new(
            ParameterId::AirTemperature,
            vec![ScriptedDriver::ok(21.5)],
        );
        let mut engine = engine_with(driver);

        let out = engine.sample_all(
            1000,
            &EnvironmentalContext::default(),
            &AcquisitionParams::default(),
        );

        assert_eq!(out.readings.len(), 1);
        assert_eq!(out.faults, 0);
        let reading = &out.readings[0];
        assert_eq!(reading.parameter, ParameterId::AirTemperature);
        assert_eq!(reading.value, 21.5);
        assert_eq!(reading.confidence, 0.9);
    }

    #[test]
    fn would_block_is_a_timeout_not_a_stall() {
        let driver = ScriptedDriver::new(
            ParameterId::AirTemperature,
            vec![Err(nb::Error::WouldBlock)],
        );
        let mut engine = engine_with(driver);

        let out = engine.sample_all(
            1000,
            &EnvironmentalContext::default(),
            &AcquisitionParams::default(),
        );

        assert!(out.readings.is_empty());
        assert_eq!(out.faults, 1);
    }

    #[test]
    fn repeated_faults_degrade_then_recovery_clears() {
        let driver = ScriptedDriver::new(
            ParameterId::EmField,
            vec![
                Err(nb::Error::Other(SensorFault::Disconnected)),
                Err(nb::Error::Other(SensorFault::Disconnected)),
                Err(nb::Error::Other(SensorFault::Disconnected)),
                ScriptedDriver::ok(120.0),
                ScriptedDriver::ok(121.0),
            ],
        );
        let mut engine = engine_with(driver);
        let ctx = EnvironmentalContext::default();
        let params = AcquisitionParams::default();
        let id = SensorId::new("s1").unwrap();

        for t in 0..3 {
            let out = engine.sample_all(t * 1000, &ctx, &params);
            assert!(out.readings.is_empty());
        }
        assert!(engine.is_degraded(id));

        // First good read clears degradation and flows again
        let out = engine.sample_all(4000, &ctx, &params);
        assert_eq!(out.readings.len(), 1);
        assert!(!engine.is_degraded(id));
    }

    #[test]
    fn spike_is_rejected_against_immediate_history() {
        let script = vec![
            ScriptedDriver::ok(10.0),
            ScriptedDriver::ok(10.1),
            ScriptedDriver::ok(9.9),
            ScriptedDriver::ok(10.0),
            // Electrical interference spike
            ScriptedDriver::ok(500.0),
        ];
        let driver = ScriptedDriver::new(ParameterId::EmField, script);
        let mut engine = engine_with(driver);
        let ctx = EnvironmentalContext::default();
        let params = AcquisitionParams::default();

        for t in 0..4u64 {
            let out = engine.sample_all(t * 1000, &ctx, &params);
            assert_eq!(out.readings.len(), 1, "cycle {t}");
        }

        let out = engine.sample_all(5000, &ctx, &params);
        assert!(out.readings.is_empty());
        assert_eq!(out.rejected_spikes, 1);
    }

    #[test]
    fn out_of_range_is_a_fault() {
        let driver = ScriptedDriver::new(
            ParameterId::Humidity,
            vec![ScriptedDriver::ok(140.0)],
        );
        let mut engine = engine_with(driver);

        let out = engine.sample_all(
            1000,
            &EnvironmentalContext::default(),
            &AcquisitionParams::default(),
        );
        assert!(out.readings.is_empty());
        assert_eq!(out.faults, 1);
    }

    #[test]
    fn voc_compensation_scales_with_heat() {
        let ctx_hot = EnvironmentalContext {
            temperature_c: 35.0,
            ..Default::default()
        };
        let hot = compensate(ParameterId::Voc(VocChannel::Formaldehyde), 100.0, &ctx_hot);
        assert!(hot < 100.0);

        let ctx_ref = EnvironmentalContext {
            temperature_c: 25.0,
            humidity_pct: 50.0,
            ..Default::default()
        };
        let reference = compensate(ParameterId::Voc(VocChannel::Formaldehyde), 100.0, &ctx_ref);
        assert_eq!(reference, 100.0);

        // Meteorological parameters pass through untouched
        assert_eq!(compensate(ParameterId::WindSpeed, 7.0, &ctx_hot), 7.0);
    }

    #[test]
    fn mode_intervals() {
        let params = AcquisitionParams::default();
        assert_eq!(
            AcquisitionEngine::sampling_interval_ms(&params, OperatingMode::Normal),
            1_000
        );
        assert_eq!(
            AcquisitionEngine::sampling_interval_ms(&params, OperatingMode::Alert),
            250
        );
        assert_eq!(
            AcquisitionEngine::sampling_interval_ms(&params, OperatingMode::PowerSave),
            10_000
        );
    }
}
