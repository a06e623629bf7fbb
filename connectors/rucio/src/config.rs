//! Rucio client configuration.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RucioError, RucioResult};

/// Connection settings for a Rucio server.
///
/// Authentication uses `auth_token` when set; otherwise `account`,
/// `username` and `password` are exchanged for a token on first use.
#[derive(Clone, Serialize, Deserialize)]
pub struct RucioConfig {
    /// Base URL of the Rucio REST server
    pub host: String,

    /// Base URL of the authentication server (default: `host`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_host: Option<String>,

    /// Rucio account to act as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    /// Pre-issued token, sent as `X-Rucio-Auth-Token`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Username for userpass authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for userpass authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Retry configuration for transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay between retries in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.initial_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

impl RucioConfig {
    /// Create a configuration for the given server with no credentials.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth_host: None,
            account: None,
            auth_token: None,
            username: None,
            password: None,
            timeout: default_timeout(),
            retry: RetryConfig::default(),
        }
    }

    /// Parse a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RucioError::Config`] if the text is not a valid configuration.
    pub fn from_toml_str(raw: &str) -> RucioResult<Self> {
        toml::from_str(raw).map_err(|e| RucioError::Config(e.to_string()))
    }

    /// Read a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`RucioError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> RucioResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RucioError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Base URL of the authentication server.
    #[must_use]
    pub fn auth_host(&self) -> &str {
        self.auth_host.as_deref().unwrap_or(&self.host)
    }

    /// Whether userpass credentials are complete.
    #[must_use]
    pub const fn has_userpass(&self) -> bool {
        self.account.is_some() && self.username.is_some() && self.password.is_some()
    }

    /// Check that the configuration can be used to connect.
    ///
    /// # Errors
    ///
    /// Returns [`RucioError::Config`] for a missing host or missing credentials.
    pub fn validate(&self) -> RucioResult<()> {
        if self.host.trim().is_empty() {
            return Err(RucioError::Config("host must not be empty".into()));
        }
        if self.auth_token.is_none() && !self.has_userpass() {
            return Err(RucioError::Config(
                "either an auth token or account, username and password are required".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RucioError::Config("retry.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for RucioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("RucioConfig")
            .field("host", &self.host)
            .field("auth_host", &self.auth_host)
            .field("account", &self.account)
            .field("auth_token", &redacted(&self.auth_token))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_with_defaults() {
        let config = RucioConfig::from_toml_str(
            r#"
            host = "https://rucio.example.org"
            account = "root"
            username = "ddmadmin"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.auth_host(), "https://rucio.example.org");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retry, RetryConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_nested_retry_table() {
        let config = RucioConfig::from_toml_str(
            r#"
            host = "https://rucio.example.org"
            auth_host = "https://auth.example.org"
            auth_token = "tok"
            timeout = 5

            [retry]
            max_attempts = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.auth_host(), "https://auth.example.org");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.initial_delay_ms, 500);
    }

    #[test]
    fn validation_requires_credentials() {
        let config = RucioConfig::new("https://rucio.example.org");
        assert!(matches!(config.validate(), Err(RucioError::Config(_))));

        let mut partial = config;
        partial.account = Some("root".into());
        partial.username = Some("u".into());
        assert!(partial.validate().is_err());

        assert!(RucioConfig::from_toml_str("account = 'x'").is_err());
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let retry = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 350,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(350));
        assert_eq!(retry.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn debug_hides_secrets() {
        let mut config = RucioConfig::new("https://rucio.example.org");
        config.password = Some("hunter2".into());
        config.auth_token = Some("tok-123".into());
        let shown = format!("{config:?}");
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("tok-123"));
        assert!(shown.contains("[REDACTED]"));
    }

    #[test]
    fn reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rucio.toml");
        std::fs::write(&path, "host = 'http://localhost'\nauth_token = 't'\n").unwrap();

        let config = RucioConfig::from_file(&path).unwrap();
        assert_eq!(config.host, "http://localhost");

        let missing = RucioConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.to_string().contains("nope.toml"));
    }
}
