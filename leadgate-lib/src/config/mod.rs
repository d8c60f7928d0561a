mod endpoints;
mod loader;
mod root;
mod sanitize;
mod security;
mod telemetry;

pub use endpoints::{DedupRule, EndpointConfig, EndpointsConfig, FailurePolicy, RateRule};
pub use loader::load_from_path;
pub use root::{AdminConfig, Config, RateLimitSettings, TimeoutConfig};
pub use sanitize::SanitizeConfig;
pub use security::{HstsConfig, SecurityPolicyConfig};
pub use telemetry::{LoggingConfig, TelemetryConfig};
