//! Configuration module for Warden.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, WardenError};

/// Upstream control API configuration.
///
/// Covers the wire endpoint plus the retry and rate-limit policy knobs that
/// directly shape moderation UX. The defaults match the upstream's documented
/// behavior; tune them only when the API operator says so.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the control API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-attempt request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Total physical attempts per logical call when the upstream answers 429.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Cooldown applied when a 429 body carries no `retry_after`, in seconds.
    #[serde(default = "default_retry_after")]
    pub default_retry_after_secs: u64,
    /// Request budget assumed after an optimistic reset, before headers
    /// correct it.
    #[serde(default = "default_rate_budget")]
    pub default_rate_budget: i64,
    /// Safety margin added when sleeping until the rate window resets, in
    /// milliseconds.
    #[serde(default = "default_reset_buffer")]
    pub reset_buffer_ms: i64,
    /// Proactive waits longer than this raise an operational alert, in seconds.
    #[serde(default = "default_long_wait_alert")]
    pub long_wait_alert_secs: u64,
    /// Minimum spacing between proactive long-wait alerts, in seconds.
    #[serde(default = "default_proactive_alert_interval")]
    pub proactive_alert_interval_secs: u64,
    /// Minimum spacing between 429 cooldown alerts, in seconds.
    #[serde(default = "default_cooldown_alert_interval")]
    pub cooldown_alert_interval_secs: u64,
}

fn default_base_url() -> String {
    "https://api.policeroleplay.community/v1".to_string()
}

fn default_request_timeout() -> u64 {
    8
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_after() -> u64 {
    5
}

fn default_rate_budget() -> i64 {
    35
}

fn default_reset_buffer() -> i64 {
    500
}

fn default_long_wait_alert() -> u64 {
    60
}

fn default_proactive_alert_interval() -> u64 {
    300
}

fn default_cooldown_alert_interval() -> u64 {
    120
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            default_retry_after_secs: default_retry_after(),
            default_rate_budget: default_rate_budget(),
            reset_buffer_ms: default_reset_buffer(),
            long_wait_alert_secs: default_long_wait_alert(),
            proactive_alert_interval_secs: default_proactive_alert_interval(),
            cooldown_alert_interval_secs: default_cooldown_alert_interval(),
        }
    }
}

/// Polling configuration for the background runner.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Seconds between poll cycles per server.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    30
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

/// Moderation behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// How far back leave logs are searched when a punishment target is no
    /// longer online, in minutes.
    #[serde(default = "default_leave_window")]
    pub recent_leave_window_mins: i64,
}

fn default_leave_window() -> i64 {
    30
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            recent_leave_window_mins: default_leave_window(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/warden.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/warden.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Operational alert delivery configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsConfig {
    /// Webhook URL receiving rate-limit incident payloads. Empty disables
    /// alert delivery.
    #[serde(default)]
    pub webhook_url: String,
}

/// One game server to moderate.
///
/// The server key is the upstream credential; only a truncated hash of it is
/// ever logged or kept in rate-limit state.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    /// Stable identifier for this server in the moderation record.
    pub server_id: String,
    /// Upstream API server key.
    pub server_key: String,
    /// Delivery target for raid alerts (e.g. a channel id). None disables
    /// raid alerting for this server.
    #[serde(default)]
    pub raid_alert_target: Option<String>,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Upstream control API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Poll cadence settings.
    #[serde(default)]
    pub polling: PollingConfig,
    /// Moderation behavior settings.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Operational alert settings.
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// Servers to poll and moderate.
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(WardenError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable
    /// overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| WardenError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `WARDEN_ALERT_WEBHOOK`: Override the alert webhook URL
    pub fn apply_env_overrides(&mut self) {
        if let Ok(webhook) = std::env::var("WARDEN_ALERT_WEBHOOK") {
            if !webhook.is_empty() {
                self.alerts.webhook_url = webhook;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - A server entry has an empty id or key
    /// - The same server id appears twice
    /// - The retry budget is zero
    pub fn validate(&self) -> Result<()> {
        if self.upstream.retry_attempts == 0 {
            return Err(WardenError::Validation(
                "upstream.retry_attempts must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if server.server_id.is_empty() {
                return Err(WardenError::Validation(
                    "server entry with empty server_id".to_string(),
                ));
            }
            if server.server_key.is_empty() {
                return Err(WardenError::Validation(format!(
                    "server {} has an empty server_key",
                    server.server_id
                )));
            }
            if !seen.insert(server.server_id.as_str()) {
                return Err(WardenError::Validation(format!(
                    "duplicate server_id: {}",
                    server.server_id
                )));
            }
        }

        Ok(())
    }
}
