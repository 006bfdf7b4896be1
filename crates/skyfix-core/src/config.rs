use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::i18n::Language;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub const DEFAULT_CITY: &str = "New York";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// City shown when the position cannot be determined at start-up
    #[serde(default = "default_city")]
    pub default_city: String,

    /// UI language; detected from the locale when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,

    /// Position sampler tuning
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// HTTP client settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Provider endpoints
    #[serde(default)]
    pub providers: ProviderUrls,
}

fn default_city() -> String {
    DEFAULT_CITY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Seconds to wait for a good fix before settling for the best one
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Per-update wait passed to the sensor
    #[serde(default = "default_update_timeout_secs")]
    pub update_timeout_secs: u64,

    /// Accuracy radius at or below which a fix is accepted immediately
    #[serde(default = "default_accuracy_threshold")]
    pub accuracy_threshold_meters: f64,
}

fn default_deadline_secs() -> u64 {
    9
}

fn default_update_timeout_secs() -> u64 {
    15
}

fn default_accuracy_threshold() -> f64 {
    1200.0
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            update_timeout_secs: default_update_timeout_secs(),
            accuracy_threshold_meters: default_accuracy_threshold(),
        }
    }
}

impl SamplerConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Transport timeout for every provider request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Sent with every request; Nominatim rejects anonymous clients
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("SkyFix/{} (https://github.com/skyfix)", env!("CARGO_PKG_VERSION"))
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl NetworkConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Base URLs, overridable so the clients can be pointed at mirrors or test servers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderUrls {
    #[serde(default = "default_forecast_url")]
    pub forecast: String,
    #[serde(default = "default_geocoding_url")]
    pub geocoding: String,
    #[serde(default = "default_nominatim_url")]
    pub nominatim: String,
    #[serde(default = "default_bigdatacloud_url")]
    pub bigdatacloud: String,
    /// IP geolocation service backing the coarse network sensor
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup: String,
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com".to_string()
}

fn default_nominatim_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_bigdatacloud_url() -> String {
    "https://api.bigdatacloud.net".to_string()
}

fn default_ip_lookup_url() -> String {
    "https://ipinfo.io".to_string()
}

impl Default for ProviderUrls {
    fn default() -> Self {
        Self {
            forecast: default_forecast_url(),
            geocoding: default_geocoding_url(),
            nominatim: default_nominatim_url(),
            bigdatacloud: default_bigdatacloud_url(),
            ip_lookup: default_ip_lookup_url(),
        }
    }
}

impl ProviderUrls {
    /// Point every provider at the same host (used by tests).
    pub fn all(base: &str) -> Self {
        Self {
            forecast: base.to_string(),
            geocoding: base.to_string(),
            nominatim: base.to_string(),
            bigdatacloud: base.to_string(),
            ip_lookup: base.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_city: default_city(),
            language: None,
            sampler: SamplerConfig::default(),
            network: NetworkConfig::default(),
            providers: ProviderUrls::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, creating it with defaults if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors; warnings are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load()?)
    }

    pub fn load_validated_from(config_path: &Path) -> Result<(Self, ValidationResult)> {
        Self::validated(Self::load_from(config_path)?)
    }

    fn validated(config: Self) -> Result<(Self, ValidationResult)> {
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Effective UI language
    pub fn language(&self) -> Language {
        self.language.unwrap_or_else(Language::from_env)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.default_city.trim().is_empty() {
            result.add_error("default_city", "Default city must not be empty");
        }

        if self.sampler.deadline_secs == 0 {
            result.add_error("sampler.deadline_secs", "Deadline must be greater than 0");
        } else if self.sampler.deadline_secs >= self.sampler.update_timeout_secs {
            result.add_warning(
                "sampler.deadline_secs",
                "Deadline is not shorter than the per-update timeout",
            );
        }

        let threshold = self.sampler.accuracy_threshold_meters;
        if threshold.is_nan() || threshold <= 0.0 {
            result.add_error(
                "sampler.accuracy_threshold_meters",
                "Accuracy threshold must be a positive number of meters",
            );
        }

        if self.network.request_timeout_secs == 0 {
            result.add_error("network.request_timeout_secs", "Request timeout must be greater than 0");
        }

        if self.network.user_agent.trim().is_empty() {
            result.add_warning("network.user_agent", "Empty user agent; Nominatim may reject requests");
        }

        self.validate_url(&self.providers.forecast, "providers.forecast", &mut result);
        self.validate_url(&self.providers.geocoding, "providers.geocoding", &mut result);
        self.validate_url(&self.providers.nominatim, "providers.nominatim", &mut result);
        self.validate_url(&self.providers.bigdatacloud, "providers.bigdatacloud", &mut result);
        self.validate_url(&self.providers.ip_lookup, "providers.ip_lookup", &mut result);

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skyfix");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_sampler_defaults() {
        let sampler = SamplerConfig::default();
        assert_eq!(sampler.deadline(), Duration::from_secs(9));
        assert_eq!(sampler.update_timeout(), Duration::from_secs(15));
        assert_eq!(sampler.accuracy_threshold_meters, 1200.0);
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.providers.nominatim = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "providers.nominatim"));
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.providers.forecast = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "providers.forecast"));
    }

    #[test]
    fn test_empty_default_city() {
        let mut config = Config::default();
        config.default_city = "  ".to_string();
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_zero_deadline_is_error() {
        let mut config = Config::default();
        config.sampler.deadline_secs = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "sampler.deadline_secs"));
    }

    #[test]
    fn test_long_deadline_is_warning() {
        let mut config = Config::default();
        config.sampler.deadline_secs = 20;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "sampler.deadline_secs"));
    }

    #[test]
    fn test_non_positive_threshold() {
        let mut config = Config::default();
        config.sampler.accuracy_threshold_meters = f64::NAN;
        assert!(!config.validate().is_valid());
        config.sampler.accuracy_threshold_meters = -1.0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.default_city, DEFAULT_CITY);
        assert_eq!(config.providers, ProviderUrls::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "default_city = \"Berlin\"\nlanguage = \"de\"\n\n[sampler]\ndeadline_secs = 5\n",
        )
        .unwrap();

        let (config, _) = Config::load_validated_from(&path).unwrap();
        assert_eq!(config.default_city, "Berlin");
        assert_eq!(config.language(), Language::De);
        assert_eq!(config.sampler.deadline_secs, 5);
        assert_eq!(config.sampler.update_timeout_secs, 15);
        assert_eq!(config.network.request_timeout_secs, 10);
    }

    #[test]
    fn test_load_validated_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_city = \"\"\n").unwrap();

        let err = Config::load_validated_from(&path).unwrap_err();
        assert!(err.to_string().contains("default_city"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
