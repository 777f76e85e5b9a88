//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::bank::BankFitOptions;
use crate::charging::{ChargingParams, OccupancySite, ScheduleMode};
use crate::dist::{Family, FitOptions};
use crate::synth::{ExhaustionPolicy, Population, SynthesisOptions};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Population size, seed, and rejection sampling.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    /// Distribution fitting.
    #[serde(default)]
    pub fitting: FittingConfig,
    /// Vehicle and charger parameters.
    #[serde(default)]
    pub charging: ChargingConfig,
    /// Input and model locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Population size, seed, and rejection sampling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisConfig {
    /// Master random seed.
    pub seed: u64,
    /// Vehicles to synthesize when `households` is unset.
    pub vehicles: usize,
    /// Households to synthesize; overrides `vehicles` when set.
    pub households: Option<usize>,
    /// Attempts per rejection-sampled quantity (must be > 0).
    pub max_rejection_iters: usize,
    /// Exclusive upper bound on trip mean speed (mph).
    pub upper_avg_speed: f64,
    /// `"skip"` or `"abort"`.
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            vehicles: 10,
            households: None,
            max_rejection_iters: 50,
            upper_avg_speed: 60.0,
            on_exhausted: ExhaustionPolicy::Skip,
        }
    }
}

/// Distribution fitting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FittingConfig {
    /// Family forced on the start-time distribution.
    pub start_time_family: Family,
    /// Families searched for duration and mileage.
    pub candidates: Vec<Family>,
    /// Histogram bins used to score fits; derived from sample size if unset.
    pub histogram_bins: Option<usize>,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            start_time_family: Family::LogNormal,
            candidates: Family::ALL.to_vec(),
            histogram_bins: None,
        }
    }
}

/// Vehicle and charger parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChargingConfig {
    pub init_soc_min: f64,
    pub init_soc_max: f64,
    pub soc_threshold_min: f64,
    pub soc_threshold_max: f64,
    pub soc_upper_min: f64,
    pub soc_upper_max: f64,
    /// Charger power (kW).
    pub charging_rate_kw: f64,
    /// Charging efficiency (0.0–1.0].
    pub charging_efficiency: f64,
    /// Public charging speed cut-off (mph).
    pub public_speed_limit: f64,
    /// Mean speed placing the public charging hour (mph).
    pub avg_round_trip_speed: f64,
    /// Public charging minimum trip duration (h).
    pub duration_limit: f64,
    /// Use weekday occupancy curves; weekend otherwise.
    pub weekday: bool,
    /// `"power"` or `"occupancy"`.
    pub schedule_mode: ScheduleMode,
    /// `"residence"` or `"residence_work"`.
    pub occupancy_site: OccupancySite,
    /// Range per car type (miles), car type 1 first.
    pub range_miles: Vec<f64>,
    /// Battery capacity per car type (kWh), car type 1 first.
    pub battery_kwh: Vec<f64>,
}

impl Default for ChargingConfig {
    fn default() -> Self {
        let p = ChargingParams::default();
        Self {
            init_soc_min: p.init_soc_min,
            init_soc_max: p.init_soc_max,
            soc_threshold_min: p.soc_threshold_min,
            soc_threshold_max: p.soc_threshold_max,
            soc_upper_min: p.soc_upper_min,
            soc_upper_max: p.soc_upper_max,
            charging_rate_kw: p.charging_rate_kw,
            charging_efficiency: p.charging_efficiency,
            public_speed_limit: p.public_speed_limit,
            avg_round_trip_speed: p.avg_round_trip_speed,
            duration_limit: p.duration_limit,
            weekday: true,
            schedule_mode: p.schedule_mode,
            occupancy_site: p.occupancy_site,
            range_miles: p.range_miles,
            battery_kwh: p.battery_kwh,
        }
    }
}

/// Input and model locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Historical trip CSV.
    pub trips_csv: PathBuf,
    /// Occupancy profile CSV.
    pub profiles_csv: PathBuf,
    /// Directory holding persisted distributions.
    pub model_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            trips_csv: PathBuf::from("data/trips.csv"),
            profiles_csv: PathBuf::from("data/ChargingProfiles.csv"),
            model_dir: PathBuf::from("saved_dist"),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"synthesis.max_rejection_iters"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn check_range(errors: &mut Vec<ConfigError>, prefix: &str, min: f64, max: f64) {
    for (name, v) in [("min", min), ("max", max)] {
        if !(0.0..=1.0).contains(&v) {
            errors.push(ConfigError {
                field: format!("charging.{prefix}_{name}"),
                message: "must be in [0.0, 1.0]".into(),
            });
        }
    }
    if min > max {
        errors.push(ConfigError {
            field: format!("charging.{prefix}_min"),
            message: format!("must be <= charging.{prefix}_max"),
        });
    }
}

fn check_positive(errors: &mut Vec<ConfigError>, field: &str, v: f64) {
    if !(v > 0.0 && v.is_finite()) {
        errors.push(ConfigError {
            field: field.into(),
            message: "must be > 0".into(),
        });
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the weekend preset: weekend occupancy curves.
    pub fn weekend() -> Self {
        Self {
            charging: ChargingConfig {
                weekday: false,
                ..ChargingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the households preset: 20 sampled households instead of a
    /// fixed vehicle count.
    pub fn households() -> Self {
        Self {
            synthesis: SynthesisConfig {
                households: Some(20),
                ..SynthesisConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "weekend", "households"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "weekend" => Ok(Self::weekend()),
            "households" => Ok(Self::households()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Who gets synthesized.
    pub fn population(&self) -> Population {
        match self.synthesis.households {
            Some(n) => Population::Households(n),
            None => Population::Vehicles(self.synthesis.vehicles),
        }
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            max_rejection_iters: self.synthesis.max_rejection_iters,
            upper_avg_speed: self.synthesis.upper_avg_speed,
            on_exhausted: self.synthesis.on_exhausted,
        }
    }

    pub fn fit_options(&self) -> BankFitOptions {
        BankFitOptions {
            start_time_family: self.fitting.start_time_family,
            fit: FitOptions {
                candidates: self.fitting.candidates.clone(),
                histogram_bins: self.fitting.histogram_bins,
            },
        }
    }

    pub fn charging_params(&self) -> ChargingParams {
        let c = &self.charging;
        ChargingParams {
            init_soc_min: c.init_soc_min,
            init_soc_max: c.init_soc_max,
            soc_threshold_min: c.soc_threshold_min,
            soc_threshold_max: c.soc_threshold_max,
            soc_upper_min: c.soc_upper_min,
            soc_upper_max: c.soc_upper_max,
            charging_rate_kw: c.charging_rate_kw,
            charging_efficiency: c.charging_efficiency,
            public_speed_limit: c.public_speed_limit,
            avg_round_trip_speed: c.avg_round_trip_speed,
            duration_limit: c.duration_limit,
            schedule_mode: c.schedule_mode,
            occupancy_site: c.occupancy_site,
            range_miles: c.range_miles.clone(),
            battery_kwh: c.battery_kwh.clone(),
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.synthesis;
        if s.households.is_none() && s.vehicles == 0 {
            errors.push(ConfigError {
                field: "synthesis.vehicles".into(),
                message: "must be > 0 when synthesis.households is unset".into(),
            });
        }
        if s.households == Some(0) {
            errors.push(ConfigError {
                field: "synthesis.households".into(),
                message: "must be > 0".into(),
            });
        }
        if s.max_rejection_iters == 0 {
            errors.push(ConfigError {
                field: "synthesis.max_rejection_iters".into(),
                message: "must be > 0".into(),
            });
        }
        check_positive(&mut errors, "synthesis.upper_avg_speed", s.upper_avg_speed);

        let f = &self.fitting;
        if f.candidates.is_empty() {
            errors.push(ConfigError {
                field: "fitting.candidates".into(),
                message: "must name at least one family".into(),
            });
        }
        if f.histogram_bins == Some(0) {
            errors.push(ConfigError {
                field: "fitting.histogram_bins".into(),
                message: "must be > 0".into(),
            });
        }

        let c = &self.charging;
        check_range(&mut errors, "init_soc", c.init_soc_min, c.init_soc_max);
        check_range(&mut errors, "soc_threshold", c.soc_threshold_min, c.soc_threshold_max);
        check_range(&mut errors, "soc_upper", c.soc_upper_min, c.soc_upper_max);
        check_positive(&mut errors, "charging.charging_rate_kw", c.charging_rate_kw);
        check_positive(&mut errors, "charging.public_speed_limit", c.public_speed_limit);
        check_positive(
            &mut errors,
            "charging.avg_round_trip_speed",
            c.avg_round_trip_speed,
        );
        if !(c.charging_efficiency > 0.0 && c.charging_efficiency <= 1.0) {
            errors.push(ConfigError {
                field: "charging.charging_efficiency".into(),
                message: "must be in (0.0, 1.0]".into(),
            });
        }
        if c.duration_limit < 0.0 {
            errors.push(ConfigError {
                field: "charging.duration_limit".into(),
                message: "must be >= 0".into(),
            });
        }
        if c.range_miles.is_empty() {
            errors.push(ConfigError {
                field: "charging.range_miles".into(),
                message: "must list one range per car type".into(),
            });
        }
        if c.range_miles.len() != c.battery_kwh.len() {
            errors.push(ConfigError {
                field: "charging.battery_kwh".into(),
                message: "must have the same length as charging.range_miles".into(),
            });
        }
        for (i, &r) in c.range_miles.iter().enumerate() {
            check_positive(&mut errors, &format!("charging.range_miles[{i}]"), r);
        }
        for (i, &b) in c.battery_kwh.iter().enumerate() {
            check_positive(&mut errors, &format!("charging.battery_kwh[{i}]"), b);
        }

        errors
    }
}
