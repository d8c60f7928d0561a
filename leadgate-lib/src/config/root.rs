use serde::Deserialize;
use std::net::SocketAddr;

use super::endpoints::EndpointsConfig;
use super::sanitize::SanitizeConfig;
use super::security::SecurityPolicyConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:8080" or "127.0.0.1:8080"
    pub listen: SocketAddr,
    /// Security response policy: allowed origins, CSP, fixed header table
    #[serde(default)]
    pub security: SecurityPolicyConfig,
    /// Input sanitizer settings
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    /// Per-endpoint admission settings (rate rule, body cap, dedup rule)
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Rate-window maintenance settings
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Admin API settings
    #[serde(default)]
    pub admin: AdminConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Shutdown configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Rate-window store maintenance settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitSettings {
    /// Interval between background sweeps of empty client buckets, seconds
    /// Default: 300 (5 minutes)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self { sweep_interval_secs: default_sweep_interval_secs() }
    }
}

fn default_sweep_interval_secs() -> u64 {
    300
}

/// Admin API settings
///
/// The admin surface is disabled entirely unless a bearer token is
/// configured; there is no referer-based or other advisory fallback.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    /// Bearer token required on /api/admin/* requests
    /// Default: None (admin endpoints answer 404)
    #[serde(default)]
    pub token: Option<String>,
}

/// Shutdown configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimeoutConfig {
    /// How long to wait for in-flight connections to drain on shutdown, seconds
    /// Default: 30
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { shutdown_secs: default_shutdown_secs() }
    }
}

fn default_shutdown_secs() -> u64 {
    30
}
