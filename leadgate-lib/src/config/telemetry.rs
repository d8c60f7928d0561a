use serde::Deserialize;

/// Telemetry configuration
/// Controls the Prometheus metrics endpoint and OpenTelemetry SDK logging
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Metrics server port (optional)
    /// If provided, a separate HTTP server on this port exposes Prometheus
    /// metrics plus the health and readiness probes
    /// Default: None (metrics disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
    /// OpenTelemetry internal log level
    /// Verbosity of the OpenTelemetry SDK's own logs, not application logs
    /// Options: "trace", "debug", "info", "warn", "error"
    /// Default: "warn"
    #[serde(default = "default_otel_log_level")]
    pub otel_log_level: String,
}

// A derived Default would leave the level strings empty when the whole
// section is absent; the manual impls reuse the per-field defaults.
impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { metrics_port: None, otel_log_level: default_otel_log_level() }
    }
}

fn default_otel_log_level() -> String {
    "warn".to_string()
}

/// Logging configuration
/// Controls application-level structured logging (stdout/stderr)
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Default: "info"
    /// Can be overridden at runtime via RUST_LOG environment variable
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default = "default_false")]
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}
