//! Settings management for tesla-recorder
//!
//! Handles the optional TOML configuration file:
//! - OAuth and Fleet API endpoints
//! - InfluxDB location
//! - Timeouts and retry bounds
//! - Credential and log file locations

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::fleet::auth::USER_SCOPES;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// User OAuth2 endpoint base (authorize, authorization code and refresh grants)
    pub auth_url: String,

    /// Client-credentials endpoint base for the partner token
    pub partner_auth_url: String,

    /// Regional Fleet API base, also used as the token audience
    pub fleet_api_url: String,

    /// Redirect URI registered for the application
    pub redirect_uri: String,

    /// Scopes requested during user authorization
    pub scopes: String,

    /// InfluxDB HTTP endpoint
    pub influx_url: String,

    /// InfluxDB database name
    pub influx_database: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for each network call
    pub max_retries: u32,

    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,

    /// Override for the credentials file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,

    /// Override for the log file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth_url: "https://auth.tesla.com/oauth2/v3".to_string(),
            partner_auth_url: "https://fleet-auth.prd.vn.cloud.tesla.com/oauth2/v3".to_string(),
            fleet_api_url: "https://fleet-api.prd.na.vn.cloud.tesla.com".to_string(),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            scopes: USER_SCOPES.to_string(),
            influx_url: "http://localhost:8086".to_string(),
            influx_database: "tesla".to_string(),
            request_timeout_secs: 30,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 1000,
            credentials_path: None,
            log_file: None,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tesla-recorder").join("settings.toml"))
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid settings file {}: {}", path.display(), e))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries).with_delay(Duration::from_millis(self.retry_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// `~/.log/tesla.log` unless overridden
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".log").join("tesla.log")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.influx_database, "tesla");
        assert_eq!(settings.max_retries, 5);
        assert_eq!(settings.retry_policy().max_retries, 5);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "influx_url = \"http://metrics:8086\"\nmax_retries = 2\nretry_delay_ms = 0\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.influx_url, "http://metrics:8086");
        assert_eq!(settings.retry_policy(), RetryPolicy::new(2));
        assert_eq!(settings.fleet_api_url, Settings::default().fleet_api_url);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "max_retries = \"many\"").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let settings = Settings {
            log_file: Some(PathBuf::from("/tmp/tesla.log")),
            ..Settings::default()
        };
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_log_file_override() {
        let settings = Settings {
            log_file: Some(PathBuf::from("/var/log/tesla.log")),
            ..Settings::default()
        };
        assert_eq!(settings.log_file_path(), Some(PathBuf::from("/var/log/tesla.log")));
    }
}
