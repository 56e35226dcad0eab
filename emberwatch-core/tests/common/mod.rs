//! Shared builders for integration scenarios

// Not every suite uses every helper
#![allow(dead_code)]

use core::cell::Cell;
use std::rc::Rc;

use emberwatch_core::acquisition::{RawSample, SensorDriver};
use emberwatch_core::config::DetectionParameters;
use emberwatch_core::context::EnvironmentalContext;
use emberwatch_core::cycle::{AlertSink, DetectionEngine};
use emberwatch_core::errors::SensorFault;
use emberwatch_core::events::{AlertEvent, ParameterId, SensorId, SensorReading};
use emberwatch_core::time::{TimeSource, Timestamp};

/// Clock shared between the test body and the engine under test
#[derive(Clone)]
pub struct SharedClock(Rc<Cell<Timestamp>>);

impl SharedClock {
    pub fn new(start: Timestamp) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn set(&self, t: Timestamp) {
        self.0.set(t);
    }
}

impl TimeSource for SharedClock {
    fn now(&self) -> Timestamp {
        self.0.get()
    }

    fn is_wall_clock(&self) -> bool {
        false
    }
}

/// Driver reporting a value the test can change between cycles
pub struct AdjustableDriver {
    parameter: ParameterId,
    value: Rc<Cell<f32>>,
}

impl SensorDriver for AdjustableDriver {
    fn parameter(&self) -> ParameterId {
        self.parameter
    }

    fn read(&mut self) -> nb::Result<RawSample, SensorFault> {
        Ok(RawSample {
            value: self.value.get(),
            quality: 0.9,
        })
    }
}

/// Collects everything the engine hands to transport
#[derive(Default)]
pub struct CollectingSink {
    pub alerts: Vec<AlertEvent>,
}

impl AlertSink for CollectingSink {
    fn accept(&mut self, alert: &AlertEvent) {
        self.alerts.push(alert.clone());
    }
}

/// Engine with a controllable clock
pub fn engine_with_clock(
    clock: SharedClock,
) -> DetectionEngine<SharedClock> {
    DetectionEngine::boot(
        clock,
        SensorId::new("zone_a").unwrap(),
        DetectionParameters::default(),
    )
    .expect("default parameters validate")
}

/// Register an adjustable sensor; returns the knob
pub fn add_sensor(
    engine: &mut DetectionEngine<SharedClock>,
    id: &str,
    parameter: ParameterId,
    value: f32,
) -> Rc<Cell<f32>> {
    let cell = Rc::new(Cell::new(value));
    engine
        .register_sensor(
            SensorId::new(id).unwrap(),
            Box::new(AdjustableDriver {
                parameter,
                value: cell.clone(),
            }),
        )
        .map_err(|_| "registry full")
        .unwrap();
    cell
}

/// Conditions under which channel normalization is the identity
pub fn reference_ctx() -> EnvironmentalContext {
    EnvironmentalContext {
        temperature_c: 25.0,
        humidity_pct: 50.0,
        ..Default::default()
    }
}

/// Standalone reading for stage-level tests
pub fn reading(id: &str, parameter: ParameterId, value: f32, confidence: f32) -> SensorReading {
    SensorReading {
        sensor_id: SensorId::new(id).unwrap(),
        parameter,
        value,
        timestamp: 1000,
        confidence,
    }
}
