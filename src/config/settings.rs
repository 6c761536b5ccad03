//! Settings structures for ZAI-Search-RS configuration

use crate::error::Error;
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Expected shape of a Z.AI API key: fixed prefix plus a 32-character
/// alphanumeric token.
pub static API_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^zai_[a-zA-Z0-9]{32}$").expect("valid api key regex"));

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
    pub batch: BatchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            retry: RetrySettings::default(),
            rate_limit: RateLimitSettings::default(),
            batch: BatchSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the first discovered file, then apply environment
    /// overrides. Falls back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let mut settings = match discover_settings_path() {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.merge_env();
        Ok(settings)
    }

    /// Merge with environment variables (ZAI_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("ZAI_API_KEY") {
            self.api.api_key = val;
        }
        if let Ok(val) = std::env::var("ZAI_BASE_URL") {
            self.api.base_url = val;
        }
        if let Ok(val) = std::env::var("ZAI_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                self.api.timeout_seconds = timeout;
            }
        }
        if let Ok(val) = std::env::var("ZAI_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.api.max_retries = retries;
            }
        }
        if let Ok(val) = std::env::var("ZAI_RATE_LIMIT_REQUESTS") {
            if let Ok(requests) = val.parse() {
                self.rate_limit.max_requests = requests;
            }
        }
        if let Ok(val) = std::env::var("ZAI_RATE_LIMIT_WINDOW") {
            if let Ok(window) = val.parse() {
                self.rate_limit.window_seconds = window;
            }
        }
        if let Ok(val) = std::env::var("ZAI_MAX_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.batch.max_workers = workers;
            }
        }
    }

    /// Validate every section; violations fail fast with a configuration
    /// error instead of being coerced.
    pub fn validate(&self) -> Result<(), Error> {
        if self.api.api_key.is_empty() {
            return Err(Error::configuration("api key is required"));
        }
        if !API_KEY_PATTERN.is_match(&self.api.api_key) {
            return Err(Error::configuration(
                "invalid api key format, expected zai_ prefix followed by 32 alphanumeric characters",
            ));
        }
        if Url::parse(&self.api.base_url).is_err() {
            return Err(Error::configuration(format!(
                "invalid base url: {}",
                self.api.base_url
            )));
        }
        if self.api.timeout_seconds == 0 {
            return Err(Error::configuration("timeout must be a positive integer"));
        }
        if self.retry.initial_backoff_seconds <= 0.0 {
            return Err(Error::configuration("initial backoff must be positive"));
        }
        if self.retry.max_backoff_seconds < self.retry.initial_backoff_seconds {
            return Err(Error::configuration(
                "max backoff must not be smaller than initial backoff",
            ));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(Error::configuration(
                "rate limit max_requests must be positive",
            ));
        }
        if self.rate_limit.window_seconds == 0 {
            return Err(Error::configuration(
                "rate limit window must be a positive integer",
            ));
        }
        if self.batch.max_workers == 0 {
            return Err(Error::configuration("max_workers must be positive"));
        }
        Ok(())
    }
}

/// API endpoint and credential settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Z.AI API key (zai_ prefix plus 32 alphanumeric characters)
    pub api_key: String,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.z.ai/v1".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
        }
    }
}

/// Retry backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// First backoff delay in seconds
    pub initial_backoff_seconds: f64,
    /// Backoff ceiling in seconds
    pub max_backoff_seconds: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_backoff_seconds: 1.0,
            max_backoff_seconds: 60.0,
        }
    }
}

/// Client-side admission control settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Requests permitted per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 60,
        }
    }
}

/// Batch processing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Worker pool size for concurrent batches
    pub max_workers: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { max_workers: 5 }
    }
}

/// Find a settings file in the conventional locations
fn discover_settings_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ZAI_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let candidates = [
        PathBuf::from("settings.yml"),
        PathBuf::from("config/settings.yml"),
        dirs::config_dir()
            .map(|p| p.join("zai-search-rs/settings.yml"))
            .unwrap_or_default(),
    ];

    candidates.into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.api.api_key = format!("zai_{}", "a".repeat(32));
        settings
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "https://api.z.ai/v1");
        assert_eq!(settings.api.timeout_seconds, 30);
        assert_eq!(settings.api.max_retries, 3);
        assert_eq!(settings.rate_limit.max_requests, 100);
        assert_eq!(settings.rate_limit.window_seconds, 60);
        assert_eq!(settings.batch.max_workers, 5);
    }

    #[test]
    fn test_valid_api_key_passes() {
        let settings = valid_settings();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_malformed_api_key_fails() {
        let mut settings = Settings::default();
        settings.api.api_key = "bad_key".to_string();
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_empty_api_key_fails() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_fails() {
        let mut settings = valid_settings();
        settings.api.timeout_seconds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_backoff_ordering_enforced() {
        let mut settings = valid_settings();
        settings.retry.initial_backoff_seconds = 10.0;
        settings.retry.max_backoff_seconds = 5.0;
        assert!(settings.validate().is_err());
    }

    // The only test that touches ZAI_* environment variables; keeping it
    // that way avoids races between parallel tests.
    #[test]
    fn test_merge_env_overrides() {
        let key = format!("zai_{}", "e".repeat(32));
        std::env::set_var("ZAI_API_KEY", &key);
        std::env::set_var("ZAI_BASE_URL", "https://api.example.test/v2");
        std::env::set_var("ZAI_MAX_RETRIES", "7");
        std::env::set_var("ZAI_MAX_WORKERS", "9");
        std::env::set_var("ZAI_RATE_LIMIT_REQUESTS", "not-a-number");

        let mut settings = Settings::default();
        settings.merge_env();

        assert_eq!(settings.api.api_key, key);
        assert_eq!(settings.api.base_url, "https://api.example.test/v2");
        assert_eq!(settings.api.max_retries, 7);
        assert_eq!(settings.batch.max_workers, 9);
        // Unparseable numeric overrides are skipped, not coerced
        assert_eq!(settings.rate_limit.max_requests, 100);
        // Untouched vars keep their defaults
        assert_eq!(settings.api.timeout_seconds, 30);
        assert!(settings.validate().is_ok());

        for var in [
            "ZAI_API_KEY",
            "ZAI_BASE_URL",
            "ZAI_MAX_RETRIES",
            "ZAI_MAX_WORKERS",
            "ZAI_RATE_LIMIT_REQUESTS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_yaml_parse() {
        let yaml = r#"
api:
  api_key: zai_abcdefghijklmnopqrstuvwxyz123456
  timeout_seconds: 10
rate_limit:
  max_requests: 5
  window_seconds: 60
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.api.timeout_seconds, 10);
        assert_eq!(settings.rate_limit.max_requests, 5);
        // Unspecified sections fall back to defaults
        assert_eq!(settings.batch.max_workers, 5);
        assert!(settings.validate().is_ok());
    }
}
