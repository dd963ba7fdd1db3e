//! TOML-based scenario configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ScheduleError;
use crate::io::series::InputPaths;
use crate::sim::band::BandOptions;
use crate::sim::engine::PipelineConfig;
use crate::sim::segment::SegmentRules;
use crate::sim::types::BatteryParams;
use crate::strategy::{StrategyKind, StrategyProfile};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Battery nameplate data.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Flexibility band options.
    #[serde(default)]
    pub band: BandConfig,
    /// Constant-SoC segment detection.
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    /// Enabled strategy kinds and balance tolerance.
    #[serde(default)]
    pub strategies: StrategiesConfig,
    /// Selection options.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Execution options.
    #[serde(default)]
    pub run: RunConfig,
    /// Synthetic input generation, used when no CSV inputs are given.
    #[serde(default)]
    pub synthetic: SyntheticConfig,
    /// Optional CSV input series.
    #[serde(default)]
    pub inputs: InputsConfig,
}

/// Battery nameplate data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Usable capacity (kWh).
    pub capacity_kwh: f64,
    /// Power rating for charge and discharge (kW).
    pub power_kw: f64,
    /// Permitted full cycles per day.
    pub daily_cycles: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 1000.0,
            power_kw: 1000.0,
            daily_cycles: 1.0,
        }
    }
}

/// Flexibility band options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandConfig {
    /// Cap discharge at the site's net load.
    pub load_safeguard: bool,
    /// Cap charge so the horizon's load peak is not raised.
    pub peak_guard: bool,
}

impl Default for BandConfig {
    fn default() -> Self {
        let opts = BandOptions::default();
        Self {
            load_safeguard: opts.load_safeguard,
            peak_guard: opts.peak_guard,
        }
    }
}

/// Constant-SoC segment detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentationConfig {
    /// Largest SoC change between neighbouring intervals still counted as flat (kWh).
    pub soc_tolerance_kwh: f64,
    /// Shortest segment (intervals).
    pub min_steps: usize,
    /// Longest segment (intervals).
    pub max_steps: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        let rules = SegmentRules::default();
        Self {
            soc_tolerance_kwh: rules.soc_tolerance_kwh,
            min_steps: rules.min_steps,
            max_steps: rules.max_steps,
        }
    }
}

/// Strategy generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StrategiesConfig {
    /// Strategy kinds to generate: `"balanced"`, `"aggressive"`, `"discharge_charge"`.
    pub enabled: Vec<String>,
    /// Allowed charge/discharge mismatch for equal-balance strategies (kWh).
    pub balance_tolerance_kwh: f64,
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            enabled: StrategyKind::ALL.iter().map(|k| k.name().to_string()).collect(),
            balance_tolerance_kwh: 1.0,
        }
    }
}

/// Selection options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// Count the baseline's own charging against the annual cycle budget.
    pub count_baseline_charging: bool,
}

/// Execution options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Worker threads for segment evaluation (0 = available parallelism).
    pub workers: usize,
}

/// Synthetic input generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// First day of the horizon.
    pub start_date: NaiveDate,
    /// Number of days to generate (must be > 0).
    pub days: usize,
    /// Master random seed.
    pub seed: u64,
    /// Mean site load (kW).
    pub load_base_kw: f64,
    /// Daily load swing amplitude (kW).
    pub load_amp_kw: f64,
    /// Load noise standard deviation (kW).
    pub load_noise_kw: f64,
    /// PV peak output (kW).
    pub pv_peak_kw: f64,
    /// Hour of day PV generation starts.
    pub sunrise_hour: f64,
    /// Hour of day PV generation ends.
    pub sunset_hour: f64,
    /// Relative PV noise.
    pub pv_noise: f64,
    /// Off-peak price (ct/kWh).
    pub price_base_ct: f64,
    /// Morning peak height (ct/kWh).
    pub price_morning_peak_ct: f64,
    /// Evening peak height (ct/kWh).
    pub price_evening_peak_ct: f64,
    /// Price noise standard deviation (ct/kWh).
    pub price_noise_ct: f64,
    /// SoC fraction the baseline charges to from PV surplus.
    pub baseline_target_soc: f64,
    /// SoC fraction the baseline discharges to in the evening.
    pub baseline_floor_soc: f64,
    /// Hour of day the baseline's evening discharge starts.
    pub evening_start_hour: f64,
    /// Hour of day the baseline's evening discharge ends.
    pub evening_end_hour: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            days: 7,
            seed: 42,
            load_base_kw: 400.0,
            load_amp_kw: 150.0,
            load_noise_kw: 20.0,
            pv_peak_kw: 600.0,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
            pv_noise: 0.05,
            price_base_ct: 8.0,
            price_morning_peak_ct: 6.0,
            price_evening_peak_ct: 12.0,
            price_noise_ct: 1.5,
            baseline_target_soc: 0.8,
            baseline_floor_soc: 0.4,
            evening_start_hour: 17.0,
            evening_end_hour: 21.0,
        }
    }
}

/// Paths to the four CSV input series. Either all or none must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputsConfig {
    pub load: Option<PathBuf>,
    pub pv: Option<PathBuf>,
    pub baseline: Option<PathBuf>,
    pub price: Option<PathBuf>,
}

impl InputsConfig {
    /// Returns the paths when all four are set.
    pub fn paths(&self) -> Option<InputPaths> {
        Some(InputPaths {
            load: self.load.clone()?,
            pv: self.pv.clone()?,
            baseline: self.baseline.clone()?,
            price: self.price.clone()?,
        })
    }

    fn set_count(&self) -> usize {
        [&self.load, &self.pv, &self.baseline, &self.price]
            .iter()
            .filter(|p| p.is_some())
            .count()
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"segmentation.min_steps"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {} — {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ScenarioConfig {
    /// Returns the baseline scenario: one week, moderate PV, mild price spread.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the high-solar preset: large PV array and long daylight, so the
    /// baseline fills the battery early and leaves long flat afternoons.
    pub fn high_solar() -> Self {
        Self {
            synthetic: SyntheticConfig {
                load_base_kw: 350.0,
                load_amp_kw: 120.0,
                pv_peak_kw: 1400.0,
                sunrise_hour: 5.0,
                sunset_hour: 21.0,
                baseline_target_soc: 0.9,
                ..SyntheticConfig::default()
            },
            ..Self::default()
        }
    }

    /// Returns the volatile-prices preset: strong peaks, heavy noise and a
    /// higher cycle allowance.
    pub fn volatile_prices() -> Self {
        Self {
            battery: BatteryConfig {
                daily_cycles: 1.5,
                ..BatteryConfig::default()
            },
            synthetic: SyntheticConfig {
                price_morning_peak_ct: 14.0,
                price_evening_peak_ct: 25.0,
                price_noise_ct: 4.0,
                ..SyntheticConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "high_solar", "volatile_prices"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "high_solar" => Ok(Self::high_solar()),
            "volatile_prices" => Ok(Self::volatile_prices()),
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
    /// Relative input paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "scenario".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        let mut cfg = Self::from_toml_str(&content)?;
        if let Some(dir) = path.parent() {
            for p in [
                &mut cfg.inputs.load,
                &mut cfg.inputs.pv,
                &mut cfg.inputs.baseline,
                &mut cfg.inputs.price,
            ]
            .into_iter()
            .flatten()
            {
                if p.is_relative() {
                    *p = dir.join(&*p);
                }
            }
        }
        Ok(cfg)
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

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: String| {
            if !ok {
                errors.push(ConfigError {
                    field: field.to_string(),
                    message,
                });
            }
        };

        let bat = &self.battery;
        for (field, value) in [
            ("battery.capacity_kwh", bat.capacity_kwh),
            ("battery.power_kw", bat.power_kw),
            ("battery.daily_cycles", bat.daily_cycles),
        ] {
            check(value.is_finite() && value > 0.0, field, "must be > 0".into());
        }

        let seg = &self.segmentation;
        check(
            seg.soc_tolerance_kwh > 0.0,
            "segmentation.soc_tolerance_kwh",
            "must be > 0".into(),
        );
        check(seg.min_steps >= 1, "segmentation.min_steps", "must be >= 1".into());
        check(
            seg.min_steps <= seg.max_steps,
            "segmentation.min_steps",
            "must be <= segmentation.max_steps".into(),
        );

        let st = &self.strategies;
        check(
            !st.enabled.is_empty(),
            "strategies.enabled",
            "at least one strategy must be enabled".into(),
        );
        for name in &st.enabled {
            if let Err(message) = name.parse::<StrategyKind>() {
                check(false, "strategies.enabled", message);
            }
        }
        check(
            st.balance_tolerance_kwh >= 0.0,
            "strategies.balance_tolerance_kwh",
            "must be >= 0".into(),
        );

        let syn = &self.synthetic;
        check(syn.days > 0, "synthetic.days", "must be > 0".into());
        check(
            syn.sunrise_hour < syn.sunset_hour,
            "synthetic.sunrise_hour",
            "must be < synthetic.sunset_hour".into(),
        );
        check(
            (0.0..=24.0).contains(&syn.sunrise_hour) && (0.0..=24.0).contains(&syn.sunset_hour),
            "synthetic.sunset_hour",
            "sunrise and sunset must lie in [0, 24]".into(),
        );
        check(
            syn.evening_start_hour < syn.evening_end_hour && syn.evening_end_hour <= 24.0,
            "synthetic.evening_start_hour",
            "must be < synthetic.evening_end_hour <= 24".into(),
        );
        check(
            (0.0..=1.0).contains(&syn.baseline_floor_soc)
                && (0.0..=1.0).contains(&syn.baseline_target_soc)
                && syn.baseline_floor_soc <= syn.baseline_target_soc,
            "synthetic.baseline_floor_soc",
            "must satisfy 0 <= floor <= target <= 1".into(),
        );

        let set = self.inputs.set_count();
        check(
            set == 0 || set == 4,
            "inputs",
            format!("either all four series or none must be given, got {set}"),
        );

        errors
    }

    /// Battery parameters for the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidBattery`] for non-positive values.
    pub fn battery_params(&self) -> Result<BatteryParams, ScheduleError> {
        BatteryParams::new(
            self.battery.capacity_kwh,
            self.battery.power_kw,
            self.battery.daily_cycles,
        )
    }

    /// Pipeline settings for the engine. Duplicate strategy names are
    /// generated once.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an unknown strategy name.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let mut kinds = Vec::new();
        for name in &self.strategies.enabled {
            let kind = name.parse::<StrategyKind>().map_err(|message| ConfigError {
                field: "strategies.enabled".to_string(),
                message,
            })?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        Ok(PipelineConfig {
            band: BandOptions {
                load_safeguard: self.band.load_safeguard,
                peak_guard: self.band.peak_guard,
            },
            segments: SegmentRules {
                soc_tolerance_kwh: self.segmentation.soc_tolerance_kwh,
                min_steps: self.segmentation.min_steps,
                max_steps: self.segmentation.max_steps,
            },
            strategies: kinds
                .into_iter()
                .map(|k| StrategyProfile::for_kind(k, self.strategies.balance_tolerance_kwh))
                .collect(),
            count_baseline_charging: self.selection.count_baseline_charging,
            workers: self.run.workers,
        })
    }
}
