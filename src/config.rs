//! Configuration management for webwx-client.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (`WEBWX_*`)
//! 2. Configuration file (JSON)
//! 3. Default values
//!
//! Every remote endpoint is configurable so tests (and deployments behind a
//! relay) can point the client at a different host.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote protocol endpoints.
    pub endpoints: EndpointSection,
    /// HTTP transport settings.
    pub http: HttpSection,
    /// Login polling settings.
    pub login: LoginSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Remote protocol endpoints and identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSection {
    /// Base URL of the login host (QR issuance and scan polling).
    pub login_base: String,
    /// Base URL for QR code display; the correlation UUID is appended.
    pub qr_base: String,
    /// Base URL of the main web API host.
    pub web_base: String,
    /// Base URL of the push host (sync check).
    pub push_base: String,
    /// Application id sent with QR issuance.
    pub app_id: String,
    /// User-Agent header for every request.
    pub user_agent: String,
    /// Language tag sent with QR issuance.
    pub lang: String,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            login_base: "https://login.weixin.qq.com".to_string(),
            qr_base: "https://login.weixin.qq.com/qrcode/".to_string(),
            web_base: "https://wx.qq.com/cgi-bin/mmwebwx-bin".to_string(),
            push_base: "https://webpush.wx.qq.com/cgi-bin/mmwebwx-bin".to_string(),
            app_id: "wx782c26e4c19acffb".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_11_3) \
                         AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/48.0.2564.109 Safari/537.36"
                .to_string(),
            lang: "zh-CN".to_string(),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Total request timeout in seconds.
    pub timeout_secs: u64,
    /// Accept invalid TLS certificates. The target service serves
    /// certificates that fail strict verification; this is a deliberate,
    /// documented trust relaxation, not a general recommendation.
    pub accept_invalid_certs: bool,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            accept_invalid_certs: true,
        }
    }
}

/// Login polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginSection {
    /// Interval between login-status polls, in seconds.
    pub poll_interval_secs: u64,
    /// Per-session login deadline, in seconds.
    pub deadline_secs: u64,
    /// Number of background login poller workers.
    pub workers: usize,
    /// Capacity of the login admission queue.
    pub queue_capacity: usize,
}

impl Default for LoginSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            deadline_secs: 120,
            workers: 4,
            queue_capacity: 500,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(base) = std::env::var("WEBWX_LOGIN_BASE") {
            self.endpoints.login_base = base;
        }
        if let Ok(base) = std::env::var("WEBWX_WEB_BASE") {
            self.endpoints.web_base = base;
        }
        if let Ok(base) = std::env::var("WEBWX_PUSH_BASE") {
            self.endpoints.push_base = base;
        }
        if let Ok(secs) = std::env::var("WEBWX_HTTP_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.http.timeout_secs = secs;
            }
        }
        if let Ok(secs) = std::env::var("WEBWX_LOGIN_DEADLINE") {
            if let Ok(secs) = secs.parse() {
                self.login.deadline_secs = secs;
            }
        }
        if let Ok(level) = std::env::var("WEBWX_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Interval between login-status polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.login.poll_interval_secs)
    }

    /// Per-session login deadline.
    pub fn login_deadline(&self) -> Duration {
        Duration::from_secs(self.login.deadline_secs)
    }

    /// Total HTTP request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),
    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Json(#[source] serde_json::Error),
}
