//! Configuration management

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "EVCC_CHARGE_CONFIG";

const APP_DIR: &str = "evcc-charge-controller";

/// Longest horizon accepted for tariff and forecast windows (one year)
pub const MAX_HORIZON_HOURS: f64 = 8760.0;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evcc: EvccConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join(APP_DIR).join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`.
    ///
    /// A missing file is created from defaults and reported as an error,
    /// so nothing talks to evcc before an operator has reviewed it.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            Self::default().save_to(path)?;
            return Err(Error::Config(format!(
                "Created default configuration at {}; review it and run again",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check every section and produce the typed thresholds for the engine
    pub fn validate(&self) -> Result<Thresholds> {
        self.evcc.validate()?;
        self.thresholds.validate()
    }
}

/// Connection settings for the evcc instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvccConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Empty or absent means evcc runs without authentication
    #[serde(default)]
    pub password: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String { "192.168.0.2".to_string() }
fn default_port() -> u16 { 7070 }
fn default_timeout_secs() -> u64 { 10 }

impl Default for EvccConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: Some(String::new()),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EvccConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/api", self.host, self.port)
    }

    /// The configured password, treating an empty string as unset
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("evcc.host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("evcc.port must not be 0".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("evcc.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Decision thresholds as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Enable grid charging only below this SoC (%)
    #[serde(default = "default_low_soc")]
    pub battery_low_soc: f64,
    /// Disable grid charging above this SoC (%)
    #[serde(default = "default_high_soc")]
    pub battery_high_soc: f64,
    /// Solar forecast (kWh) at or above which grid charging is pointless
    #[serde(default = "default_min_solar_forecast")]
    pub min_solar_forecast: f64,
    /// Forecast horizon in hours; 0 disables the forecast check
    #[serde(default = "default_solar_forecast_hours")]
    pub solar_forecast_hours: f64,
    /// Minimum max-min tariff spread in price units (EUR/kWh)
    #[serde(default = "default_min_price_spread")]
    pub min_price_spread: f64,
    /// Tariff horizon in hours
    #[serde(default = "default_price_analysis_hours")]
    pub price_analysis_hours: f64,
    /// Only enable while the running slot is cheaper than the window max
    #[serde(default)]
    pub require_price_below_max: bool,
}

fn default_low_soc() -> f64 { 30.0 }
fn default_high_soc() -> f64 { 85.0 }
fn default_min_solar_forecast() -> f64 { 10.0 }
fn default_solar_forecast_hours() -> f64 { 24.0 }
fn default_min_price_spread() -> f64 { 0.10 }
fn default_price_analysis_hours() -> f64 { 12.0 }

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            battery_low_soc: default_low_soc(),
            battery_high_soc: default_high_soc(),
            min_solar_forecast: default_min_solar_forecast(),
            solar_forecast_hours: default_solar_forecast_hours(),
            min_price_spread: default_min_price_spread(),
            price_analysis_hours: default_price_analysis_hours(),
            require_price_below_max: false,
        }
    }
}

impl ThresholdConfig {
    fn validate(&self) -> Result<Thresholds> {
        let finite = [
            ("battery_low_soc", self.battery_low_soc),
            ("battery_high_soc", self.battery_high_soc),
            ("min_solar_forecast", self.min_solar_forecast),
            ("solar_forecast_hours", self.solar_forecast_hours),
            ("min_price_spread", self.min_price_spread),
            ("price_analysis_hours", self.price_analysis_hours),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(Error::Config(format!("thresholds.{} must be a finite number", name)));
            }
        }

        for (name, value) in [("battery_low_soc", self.battery_low_soc), ("battery_high_soc", self.battery_high_soc)] {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::Config(format!("thresholds.{} must be within 0-100, got {}", name, value)));
            }
        }
        if self.battery_low_soc >= self.battery_high_soc {
            return Err(Error::Config(format!(
                "thresholds.battery_low_soc ({}) must be below battery_high_soc ({})",
                self.battery_low_soc, self.battery_high_soc
            )));
        }

        for (name, value) in [
            ("min_solar_forecast", self.min_solar_forecast),
            ("solar_forecast_hours", self.solar_forecast_hours),
            ("min_price_spread", self.min_price_spread),
        ] {
            if value < 0.0 {
                return Err(Error::Config(format!("thresholds.{} must not be negative, got {}", name, value)));
            }
        }
        if self.price_analysis_hours <= 0.0 {
            return Err(Error::Config(format!(
                "thresholds.price_analysis_hours must be positive, got {}",
                self.price_analysis_hours
            )));
        }
        for (name, value) in [
            ("solar_forecast_hours", self.solar_forecast_hours),
            ("price_analysis_hours", self.price_analysis_hours),
        ] {
            if value > MAX_HORIZON_HOURS {
                return Err(Error::Config(format!(
                    "thresholds.{} must be at most {} hours, got {}",
                    name, MAX_HORIZON_HOURS, value
                )));
            }
        }

        Ok(Thresholds {
            low_soc: self.battery_low_soc,
            high_soc: self.battery_high_soc,
            min_solar_forecast: self.min_solar_forecast,
            forecast_hours: self.solar_forecast_hours,
            min_price_spread: self.min_price_spread,
            price_hours: self.price_analysis_hours,
            require_price_below_max: self.require_price_below_max,
        })
    }
}

/// Validated, immutable thresholds for one pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub low_soc: f64,
    pub high_soc: f64,
    pub min_solar_forecast: f64,
    pub forecast_hours: f64,
    pub min_price_spread: f64,
    pub price_hours: f64,
    pub require_price_below_max: bool,
}

impl Thresholds {
    pub fn forecast_enabled(&self) -> bool {
        self.forecast_hours > 0.0
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low_soc: default_low_soc(),
            high_soc: default_high_soc(),
            min_solar_forecast: default_min_solar_forecast(),
            forecast_hours: default_solar_forecast_hours(),
            min_price_spread: default_min_price_spread(),
            price_hours: default_price_analysis_hours(),
            require_price_below_max: false,
        }
    }
}

/// Logging and decision journal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter for stderr output ("error", "warn", "info", "debug", "trace")
    #[serde(default = "default_level")]
    pub level: String,
    /// Decision journal file; defaults to the user data directory
    #[serde(default)]
    pub journal: Option<PathBuf>,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            journal: None,
        }
    }
}

impl LoggingConfig {
    /// Resolve the journal location
    pub fn journal_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.journal {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;

        Ok(data_dir.join(APP_DIR).join("decisions.jsonl"))
    }
}
