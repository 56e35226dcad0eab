//! Detection Cycle Orchestration
//!
//! ## Overview
//!
//! Single-threaded, cooperative, cycle-based execution of the full
//! pipeline:
//!
//! ```text
//! Acquisition → Domain Detectors → Fusion → Temporal → Classifier → AlertSink
//! ```
//!
//! Ordering within a cycle is strict: every stage completes before the
//! next starts, with no feedback. Shared state (baselines, the
//! recent-alert window, the alert queue) mutates only at stage
//! boundaries, by the single execution context — no locks.
//!
//! ## Budget and Cancellation
//!
//! One cycle must complete within `cycle_budget_ms`. The runner checks
//! the deadline between stages; a blown deadline discards everything
//! the cycle computed so far — partial evidence is never emitted — and
//! counts a miss. Mode transitions apply at cycle boundaries; entering
//! power-save cancels the cycle it lands on, and power-save cadence
//! skips cycles that come due too early.
//!
//! ## Collaborators
//!
//! - [`AlertSink`] receives fully formed [`AlertEvent`]s; delivery
//!   reliability is its problem. When no sink is available the bounded
//!   queue holds alerts, dropping oldest on overflow.
//! - [`TelemetrySink`] is best-effort; its failure never blocks
//!   detection.

use heapless::{Deque, Vec};

use crate::acquisition::{AcquisitionEngine, OperatingMode, SensorDriver};
use crate::alerts::{AlertCandidate, AlertClassifier};
use crate::config::{ConfigStore, DetectionParameters};
use crate::context::EnvironmentalContext;
use crate::detectors::{
    ChemicalAnalyzer, Detector, ElectricalAnalyzer, EnvironmentalRiskAnalyzer, HealthReport,
    MaintenanceUrgency,
};
use crate::errors::ConfigResult;
use crate::events::{
    AlertEvent, AlertType, DetectionEvidence, FusedParameter, ParameterId, SensorId,
};
use crate::fusion::confidence::Confidence;
use crate::fusion::FusionEngine;
use crate::temporal::{TemporalAssessment, TemporalEngine};
use crate::time::{TimeSource, Timestamp};

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

/// Alert queue depth between classifier and transport
pub const ALERT_QUEUE_DEPTH: usize = 16;

/// Receives emitted alerts; owned by the transport collaborator
pub trait AlertSink {
    fn accept(&mut self, alert: &AlertEvent);
}

/// Telemetry rejection marker; the engine ignores it by contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryRejected;

/// Optional best-effort telemetry receiver
pub trait TelemetrySink {
    fn record(&mut self, snapshot: &TelemetrySnapshot<'_>) -> Result<(), TelemetryRejected>;
}

/// Per-cycle values offered to the telemetry sink
pub struct TelemetrySnapshot<'a> {
    pub fused: &'a [FusedParameter],
    pub health: &'a HealthReport,
    pub metrics: &'a CycleMetrics,
    pub timestamp: Timestamp,
}

/// Counters for monitoring, reset only by reboot
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleMetrics {
    pub cycles_completed: u32,
    pub cycles_skipped: u32,
    pub cycles_cancelled: u32,
    pub deadline_misses: u32,
    pub readings_accepted: u32,
    pub readings_rejected: u32,
    pub sensor_faults: u32,
    pub outliers_excluded: u32,
    pub alerts_emitted: u32,
    pub alerts_dropped: u32,
}

/// Outcome of one `run_cycle` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Full pipeline ran
    Completed {
        alerts_emitted: u8,
    },
    /// Not due yet at the current cadence
    Skipped,
    /// Mode transition cancelled the cycle
    Cancelled,
    /// Budget exceeded; partial work discarded
    DeadlineMissed,
}

/// The detection engine: owns every stage and runs the cycle
pub struct DetectionEngine<C: TimeSource> {
    clock: C,
    zone: SensorId,
    config: ConfigStore,
    acquisition: AcquisitionEngine,
    chemical: ChemicalAnalyzer,
    electrical: ElectricalAnalyzer,
    environmental: EnvironmentalRiskAnalyzer,
    fusion: FusionEngine,
    temporal: TemporalEngine,
    classifier: AlertClassifier,
    mode: OperatingMode,
    pending_mode: Option<OperatingMode>,
    queue: Deque<AlertEvent, ALERT_QUEUE_DEPTH>,
    metrics: CycleMetrics,
    last_cycle_at: Option<Timestamp>,
}

impl<C: TimeSource> DetectionEngine<C> {
    /// Boot the engine; configuration validation failure here is fatal
    pub fn boot(clock: C, zone: SensorId, params: DetectionParameters) -> ConfigResult<Self> {
        let config = ConfigStore::boot(params)?;
        let p = *config.active();

        Ok(Self {
            clock,
            zone,
            acquisition: AcquisitionEngine::new(),
            chemical: ChemicalAnalyzer::new(p.chemical),
            electrical: ElectricalAnalyzer::new(p.electrical),
            environmental: EnvironmentalRiskAnalyzer::new(p.environmental),
            fusion: FusionEngine::new(p.fusion),
            temporal: TemporalEngine::new(p.temporal),
            classifier: AlertClassifier::new(p.alerts),
            config,
            mode: OperatingMode::Normal,
            pending_mode: None,
            queue: Deque::new(),
            metrics: CycleMetrics::default(),
            last_cycle_at: None,
        })
    }

    /// Register a sensor driver
    pub fn register_sensor(
        &mut self,
        id: SensorId,
        driver: Box<dyn SensorDriver>,
    ) -> Result<(), Box<dyn SensorDriver>> {
        self.acquisition.register(id, driver)
    }

    /// Request an operating mode; applies at the next cycle boundary
    pub fn set_mode(&mut self, mode: OperatingMode) {
        if mode != self.mode {
            self.pending_mode = Some(mode);
        }
    }

    /// Current operating mode
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Offer reloaded parameters between cycles
    ///
    /// On failure the previous configuration stays active.
    pub fn reload_config(&mut self, params: DetectionParameters) -> ConfigResult<()> {
        match self.config.reload(params) {
            Ok(()) => {
                let p = *self.config.active();
                self.chemical.set_params(p.chemical);
                self.electrical.set_params(p.electrical);
                self.environmental.set_params(p.environmental);
                self.fusion.set_params(p.fusion);
                self.temporal.set_params(p.temporal);
                self.classifier.set_params(p.alerts);
                Ok(())
            }
            Err(e) => {
                crate::ew_warn!("config reload rejected, keeping last valid");
                Err(e)
            }
        }
    }

    /// Feed an acoustic frame for the next cycle's arcing analysis
    pub fn ingest_acoustic_frame(&mut self, samples: &[f32], sample_rate_hz: u32) {
        self.electrical.ingest_acoustic_frame(samples, sample_rate_hz);
    }

    /// Engine metrics
    pub fn metrics(&self) -> &CycleMetrics {
        &self.metrics
    }

    /// Run one detection cycle
    pub fn run_cycle(
        &mut self,
        ctx: &EnvironmentalContext,
        mut sink: Option<&mut dyn AlertSink>,
        mut telemetry: Option<&mut dyn TelemetrySink>,
    ) -> CycleOutcome {
        let now = self.clock.now();
        let params = *self.config.active();

        // Mode transitions apply at cycle boundaries; dropping into
        // power-save cancels the cycle it lands on
        if let Some(mode) = self.pending_mode.take() {
            let cancelling = mode == OperatingMode::PowerSave;
            self.mode = mode;
            if cancelling {
                self.metrics.cycles_cancelled += 1;
                return CycleOutcome::Cancelled;
            }
        }

        // Adaptive cadence per mode
        let interval =
            AcquisitionEngine::sampling_interval_ms(&params.acquisition, self.mode) as u64;
        if let Some(last) = self.last_cycle_at {
            if now.saturating_sub(last) < interval {
                self.metrics.cycles_skipped += 1;
                return CycleOutcome::Skipped;
            }
        }

        let deadline = now + params.cycle_budget_ms as u64;

        // Stage 1: acquisition
        let acquired = self.acquisition.sample_all(now, ctx, &params.acquisition);
        self.metrics.readings_accepted += acquired.readings.len() as u32;
        self.metrics.readings_rejected += acquired.rejected_spikes;
        self.metrics.sensor_faults += acquired.faults;
        if self.clock.now() > deadline {
            return self.miss_deadline();
        }

        // Stage 2: domain detectors, each against the same snapshot
        let readings = acquired.readings.as_slice();
        let baselines = self.temporal.baselines();
        let chemical_out = self.chemical.evaluate(ctx, readings, baselines);
        let electrical_out = self.electrical.evaluate(ctx, readings, baselines);
        let environmental_out = self.environmental.evaluate(ctx, readings, baselines);
        let health = self.electrical.health(ctx, readings, baselines);
        if self.clock.now() > deadline {
            return self.miss_deadline();
        }

        // Stage 3: fusion
        let fusion_out = self.fusion.fuse(readings, self.temporal.baselines(), ctx);
        self.metrics.outliers_excluded += fusion_out.outliers_excluded;
        if self.clock.now() > deadline {
            return self.miss_deadline();
        }

        // Stage 4: temporal correlation (baselines mutate here)
        let assessments = self.temporal.correlate(&fusion_out.fused, now);
        if self.clock.now() > deadline {
            return self.miss_deadline();
        }

        // Stage 5: classification
        let mut candidates: Vec<AlertCandidate, 8> = Vec::new();

        if !chemical_out.is_quiet() {
            let worsening = any_worsening(&assessments, is_voc);
            let _ = candidates.push(
                AlertCandidate::new(
                    AlertType::Pyrolysis,
                    chemical_out.probability,
                    chemical_out.confidence,
                    &chemical_out.evidence,
                    self.zone,
                )
                .with_worsening(worsening),
            );
        }

        if !electrical_out.is_quiet() {
            let worsening = any_worsening(&assessments, |p| {
                matches!(p, ParameterId::EmField | ParameterId::SurfaceTemperature)
            });
            let _ = candidates.push(
                AlertCandidate::new(
                    AlertType::Arcing,
                    electrical_out.probability,
                    electrical_out.confidence,
                    &electrical_out.evidence,
                    self.zone,
                )
                .with_worsening(worsening),
            );
        }

        if !environmental_out.is_quiet() {
            let worsening = any_worsening(&assessments, |p| {
                matches!(p, ParameterId::AirTemperature | ParameterId::WindSpeed)
            });
            let _ = candidates.push(
                AlertCandidate::new(
                    AlertType::FireWeatherRisk,
                    environmental_out.probability,
                    environmental_out.confidence,
                    &environmental_out.evidence,
                    self.zone,
                )
                .with_worsening(worsening),
            );
        }

        if health.urgency >= MaintenanceUrgency::Warning {
            let evidence = [DetectionEvidence::with_measurement(
                "equipment_health_degraded",
                (100.0 - health.score) / 100.0,
                health.score,
            )];
            let _ = candidates.push(AlertCandidate::new(
                AlertType::EquipmentDegradation,
                (100.0 - health.score) / 100.0,
                Confidence::from_float(0.7),
                &evidence,
                self.zone,
            ));
        }

        for a in assessments.iter() {
            if a.trend.anomaly_score > params.alerts.parameter_anomaly_threshold {
                let evidence = [DetectionEvidence::with_measurement(
                    "temporal_anomaly",
                    a.trend.anomaly_score,
                    a.value,
                )];
                let _ = candidates.push(
                    AlertCandidate::new(
                        AlertType::ParameterAnomaly,
                        a.trend.anomaly_score,
                        a.confidence,
                        &evidence,
                        self.zone,
                    )
                    .with_worsening(a.trend.is_worsening()),
                );
            }
        }

        // Consistency annotations ride along as data-quality context
        // on every candidate from this cycle
        if !fusion_out.consistency.is_empty() {
            for candidate in candidates.iter_mut() {
                for ev in fusion_out.consistency.iter() {
                    if candidate.evidence.push(*ev).is_err() {
                        break;
                    }
                }
            }
        }

        let alerts = self.classifier.classify(&candidates, now);
        let emitted = alerts.len() as u8;
        self.metrics.alerts_emitted += emitted as u32;

        for alert in alerts {
            if self.queue.push_back(alert.clone()).is_err() {
                // Bounded queue: drop the oldest alert to keep the
                // freshest threat picture
                let _ = self.queue.pop_front();
                self.metrics.alerts_dropped += 1;
                let _ = self.queue.push_back(alert);
            }
        }

        if let Some(sink) = sink.as_deref_mut() {
            self.flush_alerts(sink);
        }

        // Telemetry last, best-effort
        if let Some(telemetry) = telemetry.as_deref_mut() {
            let snapshot = TelemetrySnapshot {
                fused: &fusion_out.fused,
                health: &health,
                metrics: &self.metrics,
                timestamp: now,
            };
            if telemetry.record(&snapshot).is_err() {
                crate::ew_debug!("telemetry sink rejected cycle snapshot");
            }
        }

        self.metrics.cycles_completed += 1;
        self.last_cycle_at = Some(now);

        CycleOutcome::Completed {
            alerts_emitted: emitted,
        }
    }

    /// Drain queued alerts into the transport sink
    pub fn flush_alerts(&mut self, sink: &mut dyn AlertSink) {
        while let Some(alert) = self.queue.pop_front() {
            sink.accept(&alert);
        }
    }

    /// Alerts currently queued for transport
    pub fn queued_alerts(&self) -> usize {
        self.queue.len()
    }

    fn miss_deadline(&mut self) -> CycleOutcome {
        // Partial evidence is discarded with the stage outputs going
        // out of scope; nothing reaches the classifier or the queue
        self.metrics.deadline_misses += 1;
        crate::ew_warn!("cycle deadline missed, partial work discarded");
        CycleOutcome::DeadlineMissed
    }
}

fn is_voc(parameter: ParameterId) -> bool {
    matches!(parameter, ParameterId::Voc(_))
}

fn any_worsening(
    assessments: &[TemporalAssessment],
    mut select: impl FnMut(ParameterId) -> bool,
) -> bool {
    assessments
        .iter()
        .any(|a| select(a.parameter) && a.trend.is_worsening())
}
