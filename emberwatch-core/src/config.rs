//! Detection Parameters and Hot Reload
//!
//! ## Overview
//!
//! Every threshold, weight, and range the pipeline consults lives here,
//! loaded once at startup and hot-reloadable between cycles. Nothing in
//! the detectors hardcodes a tunable: the numeric defaults below are
//! starting configuration for a deployment, not constants.
//!
//! ## Reload Contract
//!
//! - At boot, `DetectionParameters::validate` failure is fatal.
//! - At runtime, `ConfigStore::reload` validates the offered parameters
//!   and keeps the last valid configuration on any failure, returning
//!   the error so the caller can log a warning. A reload whose version
//!   is not newer than the active one is ignored the same way.
//! - The store is only consulted at cycle boundaries, so a reload never
//!   changes parameters mid-cycle.

use crate::errors::{ConfigError, ConfigResult};
use crate::events::VocChannel;

/// Sampling cadence and preprocessing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AcquisitionParams {
    /// Sampling interval in normal mode, ms
    pub normal_interval_ms: u32,
    /// Sampling interval while an alert is active, ms
    pub alert_interval_ms: u32,
    /// Sampling interval in power-save mode, ms
    pub power_save_interval_ms: u32,
    /// Single-pole low-pass filter coefficient (0 = frozen, 1 = raw)
    pub lowpass_alpha: f32,
    /// Spike rejection threshold in standard deviations of the
    /// immediate history
    pub spike_sigma: f32,
    /// Consecutive faults before a sensor is marked degraded
    pub degrade_after_faults: u8,
}

impl Default for AcquisitionParams {
    fn default() -> Self {
        Self {
            normal_interval_ms: 1_000,
            alert_interval_ms: 250,
            power_save_interval_ms: 10_000,
            lowpass_alpha: 0.3,
            spike_sigma: 4.0,
            degrade_after_faults: 3,
        }
    }
}

/// Chemical signature analyzer parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChemicalParams {
    /// Per-channel deviation thresholds in ppb, indexed by
    /// [`VocChannel`] discriminant
    pub channel_thresholds_ppb: [f32; 8],
    /// Weight of the cellulose decomposition rule
    pub weight_cellulose: f32,
    /// Weight of the lignin decomposition rule
    pub weight_lignin: f32,
    /// Weight of the early combustion rule
    pub weight_combustion: f32,
    /// Weight of the formaldehyde:acetaldehyde ratio check
    pub weight_ratio_formaldehyde: f32,
    /// Weight of the CO:NO2 ratio check
    pub weight_ratio_co_no2: f32,
    /// Expected formaldehyde:acetaldehyde ratio range
    pub ratio_formaldehyde: (f32, f32),
    /// Expected CO:NO2 ratio range
    pub ratio_co_no2: (f32, f32),
    /// Linear temperature normalization coefficient, per °C from 25
    pub temp_coeff: f32,
    /// Linear humidity normalization coefficient, per % RH from 50
    pub humidity_coeff: f32,
}

impl Default for ChemicalParams {
    fn default() -> Self {
        Self {
            // Indexed by VocChannel: formaldehyde, acetaldehyde,
            // acrolein, phenol, cresol, guaiacol, co, no2
            channel_thresholds_ppb: [25.0, 30.0, 5.0, 8.0, 6.0, 4.0, 9_000.0, 100.0],
            weight_cellulose: 30.0,
            weight_lignin: 25.0,
            weight_combustion: 25.0,
            weight_ratio_formaldehyde: 15.0,
            weight_ratio_co_no2: 10.0,
            ratio_formaldehyde: (0.8, 1.2),
            ratio_co_no2: (40.0, 140.0),
            temp_coeff: 0.02,
            humidity_coeff: 0.005,
        }
    }
}

impl ChemicalParams {
    /// Threshold for one channel
    pub fn threshold(&self, channel: VocChannel) -> f32 {
        self.channel_thresholds_ppb[channel as usize]
    }

    /// Maximum achievable rule score
    pub fn max_score(&self) -> f32 {
        self.weight_cellulose
            + self.weight_lignin
            + self.weight_combustion
            + self.weight_ratio_formaldehyde
            + self.weight_ratio_co_no2
    }
}

/// Electrical anomaly detector parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ElectricalParams {
    /// Acoustic channel weight in the arcing combination
    pub weight_acoustic: f32,
    /// EMF channel weight in the arcing combination
    pub weight_emf: f32,
    /// Thermal channel weight in the arcing combination
    pub weight_thermal: f32,
    /// Minimum spectral match treated as an acoustic arcing hit
    pub acoustic_match_threshold: f32,
    /// EMF fluctuation onset, in baseline standard deviations
    pub emf_fluctuation_sigma: f32,
    /// EMF fluctuation treated as certain, in standard deviations
    pub emf_saturation_sigma: f32,
    /// Surface temperature treated as a hotspot onset, °C
    pub hotspot_temp_c: f32,
    /// Surface temperature treated as a certain hotspot, °C
    pub hotspot_saturation_c: f32,
    /// Health penalty: sustained thermal uptrend
    pub penalty_thermal_trend: f32,
    /// Health penalty: cyclical thermal pattern (loose connection)
    pub penalty_thermal_cycling: f32,
    /// Health penalty: EMF deviation beyond baseline
    pub penalty_emf_deviation: f32,
    /// Health penalty: excessive high-frequency vibration energy
    pub penalty_vibration: f32,
    /// Health penalty: harmonic resonance
    pub penalty_resonance: f32,
    /// Thermal uptrend considered sustained, °C per minute
    pub thermal_trend_c_per_min: f32,
    /// Vibration RMS considered excessive, m/s²
    pub vibration_rms_threshold: f32,
    /// Health score below which maintenance is critical
    pub health_critical: f32,
    /// Health score below which maintenance is a warning
    pub health_warning: f32,
    /// Health score below which maintenance is advisory
    pub health_advisory: f32,
}

impl Default for ElectricalParams {
    fn default() -> Self {
        Self {
            weight_acoustic: 0.4,
            weight_emf: 0.35,
            weight_thermal: 0.25,
            acoustic_match_threshold: 0.6,
            emf_fluctuation_sigma: 2.5,
            emf_saturation_sigma: 6.0,
            hotspot_temp_c: 70.0,
            hotspot_saturation_c: 120.0,
            penalty_thermal_trend: 15.0,
            penalty_thermal_cycling: 10.0,
            penalty_emf_deviation: 20.0,
            penalty_vibration: 15.0,
            penalty_resonance: 10.0,
            thermal_trend_c_per_min: 0.5,
            vibration_rms_threshold: 12.0,
            health_critical: 40.0,
            health_warning: 60.0,
            health_advisory: 80.0,
        }
    }
}

/// Environmental risk analyzer parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EnvironmentalParams {
    /// Temperature factor score above which red-flag logic considers
    /// temperature extreme
    pub red_flag_temp_factor: f32,
    /// Humidity factor score above which red-flag logic considers
    /// dryness extreme
    pub red_flag_humidity_factor: f32,
    /// Wind factor score above which red-flag logic considers wind
    /// extreme
    pub red_flag_wind_factor: f32,
    /// Multiplier applied when all three red-flag factors are extreme
    pub red_flag_multiplier: f32,
    /// Seasonal multipliers: winter, spring, summer, autumn
    pub seasonal_multipliers: [f32; 4],
    /// Multiplier during the afternoon window
    pub afternoon_multiplier: f32,
    /// Multiplier during the overnight window
    pub night_multiplier: f32,
}

impl Default for EnvironmentalParams {
    fn default() -> Self {
        Self {
            red_flag_temp_factor: 15.0,
            red_flag_humidity_factor: 12.0,
            red_flag_wind_factor: 10.0,
            red_flag_multiplier: 1.25,
            seasonal_multipliers: [0.8, 1.0, 1.2, 1.05],
            afternoon_multiplier: 1.15,
            night_multiplier: 0.85,
        }
    }
}

/// Multi-sensor fusion parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FusionParams {
    /// Outlier exclusion threshold relative to the group, in standard
    /// deviations
    pub outlier_sigma: f32,
    /// Confidence assigned to last-known-good fallback values
    pub fallback_confidence: f32,
    /// Agreement scale as a fraction of the group mean magnitude
    pub agreement_rel_scale: f32,
    /// Lower bound on the agreement scale, in parameter units
    pub agreement_min_scale: f32,
    /// Dew point may exceed air temperature by this much before the
    /// consistency pass flags it, °C
    pub dew_point_margin_c: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            outlier_sigma: 2.5,
            fallback_confidence: 0.2,
            agreement_rel_scale: 0.05,
            agreement_min_scale: 0.5,
            dew_point_margin_c: 0.5,
        }
    }
}

/// Temporal correlation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TemporalParams {
    /// Z-score beyond which a value is a time-series outlier
    pub outlier_z: f32,
    /// Outlier confidence above which the trend prediction replaces
    /// the raw value
    pub outlier_confidence_threshold: f32,
    /// Confidence multiplier applied to substituted values
    pub outlier_confidence_factor: f32,
    /// Maximum fraction of confidence removed by a full anomaly score
    pub anomaly_penalty: f32,
    /// Slope magnitude below which trend direction reads as flat,
    /// units per second
    pub trend_deadband: f32,
    /// Minimum history length before outlier/trend tests run
    pub min_history: usize,
}

impl Default for TemporalParams {
    fn default() -> Self {
        Self {
            outlier_z: 3.0,
            outlier_confidence_threshold: 0.6,
            outlier_confidence_factor: 0.5,
            anomaly_penalty: 0.5,
            trend_deadband: 0.01,
            min_history: 4,
        }
    }
}

/// Alert classification parameters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlertParams {
    /// Verification thresholds per severity, indexed by
    /// [`Severity`](crate::events::Severity) discriminant, strictly
    /// increasing
    pub severity_thresholds: [f32; 6],
    /// Confidence below which a verified alert is demoted one level
    pub demote_confidence_below: f32,
    /// Duplicate suppression window, ms
    pub suppression_window_ms: u64,
    /// Temporal anomaly score above which a parameter anomaly becomes
    /// an alert candidate
    pub parameter_anomaly_threshold: f32,
}

impl Default for AlertParams {
    fn default() -> Self {
        Self {
            severity_thresholds: [0.05, 0.20, 0.35, 0.50, 0.70, 0.85],
            demote_confidence_below: 0.4,
            suppression_window_ms: 300_000,
            parameter_anomaly_threshold: 0.6,
        }
    }
}

/// Complete, versioned parameter set
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectionParameters {
    /// Monotonically increasing configuration version
    pub version: u32,
    /// Wall time budget for one detection cycle, ms
    pub cycle_budget_ms: u32,
    pub acquisition: AcquisitionParams,
    pub chemical: ChemicalParams,
    pub electrical: ElectricalParams,
    pub environmental: EnvironmentalParams,
    pub fusion: FusionParams,
    pub temporal: TemporalParams,
    pub alerts: AlertParams,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            version: 1,
            cycle_budget_ms: 200,
            acquisition: AcquisitionParams::default(),
            chemical: ChemicalParams::default(),
            electrical: ElectricalParams::default(),
            environmental: EnvironmentalParams::default(),
            fusion: FusionParams::default(),
            temporal: TemporalParams::default(),
            alerts: AlertParams::default(),
        }
    }
}

fn check_threshold(value: f32, name: &'static str) -> ConfigResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidThreshold { name });
    }
    Ok(())
}

fn check_weight(value: f32, name: &'static str) -> ConfigResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidWeight { name });
    }
    Ok(())
}

fn check_range(range: (f32, f32), name: &'static str) -> ConfigResult<()> {
    if !range.0.is_finite() || !range.1.is_finite() || range.0 >= range.1 {
        return Err(ConfigError::InvertedRange { name });
    }
    Ok(())
}

fn check_unit_fraction(value: f32, name: &'static str) -> ConfigResult<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidThreshold { name });
    }
    Ok(())
}

impl DetectionParameters {
    /// Validate the full parameter set
    ///
    /// Fatal when this fails at boot; at reload the caller falls back
    /// to the last valid configuration instead.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cycle_budget_ms == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "cycle_budget_ms",
            });
        }

        let a = &self.acquisition;
        if a.normal_interval_ms == 0 || a.alert_interval_ms == 0 || a.power_save_interval_ms == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "acquisition.interval_ms",
            });
        }
        check_unit_fraction(a.lowpass_alpha, "acquisition.lowpass_alpha")?;
        check_threshold(a.spike_sigma, "acquisition.spike_sigma")?;
        if a.degrade_after_faults == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "acquisition.degrade_after_faults",
            });
        }

        let c = &self.chemical;
        for &t in c.channel_thresholds_ppb.iter() {
            if !t.is_finite() || t <= 0.0 {
                return Err(ConfigError::InvalidThreshold {
                    name: "chemical.channel_thresholds_ppb",
                });
            }
        }
        check_weight(c.weight_cellulose, "chemical.weight_cellulose")?;
        check_weight(c.weight_lignin, "chemical.weight_lignin")?;
        check_weight(c.weight_combustion, "chemical.weight_combustion")?;
        check_weight(c.weight_ratio_formaldehyde, "chemical.weight_ratio_formaldehyde")?;
        check_weight(c.weight_ratio_co_no2, "chemical.weight_ratio_co_no2")?;
        if c.max_score() <= 0.0 {
            return Err(ConfigError::InvalidWeight {
                name: "chemical.max_score",
            });
        }
        check_range(c.ratio_formaldehyde, "chemical.ratio_formaldehyde")?;
        check_range(c.ratio_co_no2, "chemical.ratio_co_no2")?;

        let e = &self.electrical;
        check_weight(e.weight_acoustic, "electrical.weight_acoustic")?;
        check_weight(e.weight_emf, "electrical.weight_emf")?;
        check_weight(e.weight_thermal, "electrical.weight_thermal")?;
        if e.weight_acoustic + e.weight_emf + e.weight_thermal <= 0.0 {
            return Err(ConfigError::InvalidWeight {
                name: "electrical.weights",
            });
        }
        check_unit_fraction(e.acoustic_match_threshold, "electrical.acoustic_match_threshold")?;
        check_range(
            (e.emf_fluctuation_sigma, e.emf_saturation_sigma),
            "electrical.emf_sigma",
        )?;
        check_range(
            (e.hotspot_temp_c, e.hotspot_saturation_c),
            "electrical.hotspot_temp_c",
        )?;
        check_range(
            (e.health_critical, e.health_warning),
            "electrical.health_critical",
        )?;
        check_range(
            (e.health_warning, e.health_advisory),
            "electrical.health_warning",
        )?;

        let env = &self.environmental;
        if env.red_flag_multiplier < 1.0 || !env.red_flag_multiplier.is_finite() {
            return Err(ConfigError::InvalidWeight {
                name: "environmental.red_flag_multiplier",
            });
        }
        for &m in env
            .seasonal_multipliers
            .iter()
            .chain([env.afternoon_multiplier, env.night_multiplier].iter())
        {
            if !m.is_finite() || m <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: "environmental.multipliers",
                });
            }
        }

        let f = &self.fusion;
        check_threshold(f.outlier_sigma, "fusion.outlier_sigma")?;
        check_unit_fraction(f.fallback_confidence, "fusion.fallback_confidence")?;
        check_threshold(f.agreement_min_scale, "fusion.agreement_min_scale")?;

        let t = &self.temporal;
        check_threshold(t.outlier_z, "temporal.outlier_z")?;
        check_unit_fraction(
            t.outlier_confidence_threshold,
            "temporal.outlier_confidence_threshold",
        )?;
        check_unit_fraction(t.outlier_confidence_factor, "temporal.outlier_confidence_factor")?;
        check_unit_fraction(t.anomaly_penalty, "temporal.anomaly_penalty")?;
        if t.min_history < 2 {
            return Err(ConfigError::InvalidThreshold {
                name: "temporal.min_history",
            });
        }

        let al = &self.alerts;
        let mut prev = 0.0f32;
        for &th in al.severity_thresholds.iter() {
            if !th.is_finite() || th <= prev || th > 1.0 {
                return Err(ConfigError::InvalidThreshold {
                    name: "alerts.severity_thresholds",
                });
            }
            prev = th;
        }
        check_unit_fraction(al.demote_confidence_below, "alerts.demote_confidence_below")?;
        check_unit_fraction(
            al.parameter_anomaly_threshold,
            "alerts.parameter_anomaly_threshold",
        )?;
        if al.suppression_window_ms == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "alerts.suppression_window_ms",
            });
        }

        Ok(())
    }

    /// Parse a configuration payload from the configuration collaborator
    #[cfg(feature = "std")]
    pub fn from_json_slice(bytes: &[u8]) -> ConfigResult<Self> {
        serde_json::from_slice(bytes).map_err(|_| ConfigError::Malformed)
    }
}

/// Active configuration with reload fallback
///
/// Owned by the cycle runner; consulted once per cycle.
pub struct ConfigStore {
    active: DetectionParameters,
}

impl ConfigStore {
    /// Boot with an initial parameter set; validation failure here is
    /// fatal by contract.
    pub fn boot(params: DetectionParameters) -> ConfigResult<Self> {
        params.validate()?;
        Ok(Self { active: params })
    }

    /// Currently active parameters
    pub fn active(&self) -> &DetectionParameters {
        &self.active
    }

    /// Offer a new parameter set between cycles
    ///
    /// On any failure the previous configuration stays active and the
    /// error is returned for the caller to log.
    pub fn reload(&mut self, params: DetectionParameters) -> ConfigResult<()> {
        if params.version <= self.active.version {
            return Err(ConfigError::StaleVersion {
                active: self.active.version,
                offered: params.version,
            });
        }
        params.validate()?;
        self.active = params;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(DetectionParameters::default().validate().is_ok());
    }

    #[test]
    fn default_chemical_weights_match_deployment_baseline() {
        let c = ChemicalParams::default();
        assert_eq!(c.weight_cellulose, 30.0);
        assert_eq!(c.weight_ratio_formaldehyde, 15.0);
        assert_eq!(c.threshold(VocChannel::Formaldehyde), 25.0);
        assert_eq!(c.threshold(VocChannel::Acetaldehyde), 30.0);
        assert_eq!(c.threshold(VocChannel::Acrolein), 5.0);
        assert_eq!(c.max_score(), 105.0);
    }

    #[test]
    fn inverted_range_rejected() {
        let mut params = DetectionParameters::default();
        params.chemical.ratio_formaldehyde = (1.2, 0.8);
        assert_eq!(
            params.validate(),
            Err(ConfigError::InvertedRange {
                name: "chemical.ratio_formaldehyde"
            })
        );
    }

    #[test]
    fn non_monotonic_severity_thresholds_rejected() {
        let mut params = DetectionParameters::default();
        params.alerts.severity_thresholds = [0.05, 0.20, 0.20, 0.50, 0.70, 0.85];
        assert!(params.validate().is_err());
    }

    #[test]
    fn reload_keeps_last_valid() {
        let mut store = ConfigStore::boot(DetectionParameters::default()).unwrap();

        // Invalid reload: active config unchanged
        let mut bad = DetectionParameters::default();
        bad.version = 2;
        bad.fusion.outlier_sigma = -1.0;
        assert!(store.reload(bad).is_err());
        assert_eq!(store.active().version, 1);

        // Stale version: rejected
        let stale = DetectionParameters::default();
        assert_eq!(
            store.reload(stale),
            Err(ConfigError::StaleVersion {
                active: 1,
                offered: 1
            })
        );

        // Valid newer version: accepted
        let mut good = DetectionParameters::default();
        good.version = 2;
        good.chemical.weight_cellulose = 35.0;
        assert!(store.reload(good).is_ok());
        assert_eq!(store.active().version, 2);
        assert_eq!(store.active().chemical.weight_cellulose, 35.0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn partial_json_fills_defaults() {
        let json = br#"{"version": 3, "chemical": {"weight_cellulose": 40.0}}"#;
        let params = DetectionParameters::from_json_slice(json).unwrap();
        assert_eq!(params.version, 3);
        assert_eq!(params.chemical.weight_cellulose, 40.0);
        // Untouched sections keep their defaults
        assert_eq!(params.fusion.outlier_sigma, 2.5);
        assert!(params.validate().is_ok());
    }
}
