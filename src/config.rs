//! Configuration management
//!
//! Manages the learning-core configuration: storage root, server binding,
//! remote model endpoint, retraining trigger thresholds and the drift
//! monitoring loop.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Filesystem layout for samples, models, results and logs
    #[serde(default)]
    pub storage: StorageConfig,
    /// Inference API server binding
    #[serde(default)]
    pub server: ServerConfig,
    /// Remote model endpoint settings
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Retraining trigger thresholds
    #[serde(default)]
    pub retraining: RetrainingConfig,
    /// Drift monitoring loop
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Training pipeline settings
    #[serde(default)]
    pub training: TrainingConfig,
    /// Evaluation thresholds
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Root for the sample store, model artifacts and reports.
    /// Defaults to the platform data directory when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3030
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of a remote model endpoint. When unset (or unreachable)
    /// analysis falls back to mock results.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Liveness probe timeout (seconds)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Maximum accepted image payload (bytes)
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            probe_timeout_secs: default_probe_timeout(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrainingConfig {
    /// Volume floor: no retrain below this many stored samples
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Cooldown between retrains (hours). Forced checks waive the cooldown,
    /// never the volume floor.
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: i64,
}

fn default_min_samples() -> usize {
    50
}

fn default_cooldown_hours() -> i64 {
    24
}

impl Default for RetrainingConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            cooldown_hours: default_cooldown_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Interval between drift evaluations (hours)
    #[serde(default = "default_monitoring_interval")]
    pub interval_hours: u64,
    /// Accuracy drop that re-triggers the training cycle (fraction, 0.02 = 2%)
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,
}

fn default_monitoring_interval() -> u64 {
    24
}

fn default_drift_threshold() -> f64 {
    0.02
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_monitoring_interval(),
            drift_threshold: default_drift_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fixed number of epochs per training run
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// Generate synthetic image/label pairs when real samples are insufficient
    #[serde(default = "default_true")]
    pub synthetic_enabled: bool,
    /// Synthetic pairs generated per run when the fallback kicks in
    #[serde(default = "default_synthetic_samples")]
    pub synthetic_samples: usize,
    /// Minimum labeled real samples before a run counts as real-data training
    #[serde(default = "default_min_real_samples")]
    pub min_real_samples: usize,
}

fn default_epochs() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_synthetic_samples() -> usize {
    100
}

fn default_min_real_samples() -> usize {
    10
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            synthetic_enabled: default_true(),
            synthetic_samples: default_synthetic_samples(),
            min_real_samples: default_min_real_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// A classifier is "good" above this accuracy
    #[serde(default = "default_accuracy_threshold")]
    pub accuracy_threshold: f64,
    /// The tread-depth regressor is "good" below this MSE
    #[serde(default = "default_mse_threshold")]
    pub mse_threshold: f64,
    /// Fraction of samples held out for evaluation
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
}

fn default_accuracy_threshold() -> f64 {
    0.8
}

fn default_mse_threshold() -> f64 {
    1.0
}

fn default_holdout_fraction() -> f64 {
    0.2
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold: default_accuracy_threshold(),
            mse_threshold: default_mse_threshold(),
            holdout_fraction: default_holdout_fraction(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating a default one if absent
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Resolve the storage root: configured value or the platform data dir
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        default_data_dir()
    }

    /// Retraining cooldown as a chrono duration
    pub fn retrain_cooldown(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retraining.cooldown_hours)
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "tirelearn", "tirelearn")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the default data directory path
pub fn default_data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "tirelearn", "tirelearn")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Apply a `section.field` assignment to an in-memory configuration
pub fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
    where
        T::Err: std::fmt::Display,
    {
        value
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}"))
    }

    match key {
        "storage.data_dir" => config.storage.data_dir = Some(PathBuf::from(value)),
        "server.host" => config.server.host = value.to_string(),
        "server.port" => config.server.port = parse(key, value)?,
        "inference.endpoint" => config.inference.endpoint = Some(value.to_string()),
        "inference.probe_timeout_secs" => config.inference.probe_timeout_secs = parse(key, value)?,
        "inference.max_image_bytes" => config.inference.max_image_bytes = parse(key, value)?,
        "retraining.min_samples" => config.retraining.min_samples = parse(key, value)?,
        "retraining.cooldown_hours" => config.retraining.cooldown_hours = parse(key, value)?,
        "monitoring.interval_hours" => config.monitoring.interval_hours = parse(key, value)?,
        "monitoring.drift_threshold" => config.monitoring.drift_threshold = parse(key, value)?,
        "training.epochs" => config.training.epochs = parse(key, value)?,
        "training.synthetic_enabled" => config.training.synthetic_enabled = parse(key, value)?,
        "training.synthetic_samples" => config.training.synthetic_samples = parse(key, value)?,
        "training.min_real_samples" => config.training.min_real_samples = parse(key, value)?,
        "evaluation.accuracy_threshold" => config.evaluation.accuracy_threshold = parse(key, value)?,
        "evaluation.mse_threshold" => config.evaluation.mse_threshold = parse(key, value)?,
        "evaluation.holdout_fraction" => config.evaluation.holdout_fraction = parse(key, value)?,
        other => anyhow::bail!("Unknown configuration key: {other}"),
    }
    Ok(())
}

/// Set a configuration value and persist the file
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;
    apply_setting(&mut config, key, value)?;
    config.save()?;
    println!("Set {key} = {value}");
    Ok(())
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Tirelearn configuration");
    println!("  data dir:            {}", config.data_dir()?.display());
    println!("  server:              {}:{}", config.server.host, config.server.port);
    println!(
        "  model endpoint:      {}",
        config.inference.endpoint.as_deref().unwrap_or("(none, mock fallback)")
    );
    println!("  min samples:         {}", config.retraining.min_samples);
    println!("  retrain cooldown:    {}h", config.retraining.cooldown_hours);
    println!("  drift threshold:     {:.1}%", config.monitoring.drift_threshold * 100.0);
    println!("  monitoring interval: {}h", config.monitoring.interval_hours);
    println!("  training epochs:     {}", config.training.epochs);
    println!(
        "  synthetic fallback:  {}",
        if config.training.synthetic_enabled { "enabled" } else { "disabled" }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retraining.min_samples, 50);
        assert_eq!(config.retraining.cooldown_hours, 24);
        assert!((config.monitoring.drift_threshold - 0.02).abs() < f64::EPSILON);
        assert_eq!(config.monitoring.interval_hours, 24);
        assert_eq!(config.inference.max_image_bytes, 10 * 1024 * 1024);
        assert!(config.training.synthetic_enabled);
    }

    #[test]
    fn test_apply_setting_updates_known_keys() {
        let mut config = Config::default();
        apply_setting(&mut config, "retraining.min_samples", "25").unwrap();
        apply_setting(&mut config, "server.port", "8080").unwrap();
        apply_setting(&mut config, "training.synthetic_enabled", "false").unwrap();
        assert_eq!(config.retraining.min_samples, 25);
        assert_eq!(config.server.port, 8080);
        assert!(!config.training.synthetic_enabled);
    }

    #[test]
    fn test_apply_setting_rejects_unknown_key_and_bad_value() {
        let mut config = Config::default();
        assert!(apply_setting(&mut config, "retraining.nope", "1").is_err());
        assert!(apply_setting(&mut config, "server.port", "not-a-port").is_err());
        // Failed assignments leave the value untouched
        assert_eq!(config.server.port, 3030);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let restored: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.retraining.min_samples, config.retraining.min_samples);
        assert_eq!(restored.server.port, config.server.port);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let restored: Config = toml::from_str("[retraining]\nmin_samples = 5\n").unwrap();
        assert_eq!(restored.retraining.min_samples, 5);
        // Untouched fields come from serde defaults
        assert_eq!(restored.retraining.cooldown_hours, 24);
        assert_eq!(restored.server.port, 3030);
    }
}
