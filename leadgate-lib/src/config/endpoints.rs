use serde::Deserialize;
use std::time::Duration;

/// Rate-limit rule for one endpoint class
///
/// Every endpoint carries its own `(window, ceiling)` pair; destructive or
/// expensive operations get stricter ceilings than read paths.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateRule {
    /// Maximum requests admitted per client within the window
    pub max_requests: u32,
    /// Window length, seconds
    pub window_secs: u64,
}

impl RateRule {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// What the duplicate guard does when its store query fails
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Proceed as if the check passed; log a warning (low-stakes flows)
    Open,
    /// Reject the request as unverifiable (correctness-sensitive flows)
    Closed,
}

/// Duplicate-submission rule for one endpoint
///
/// The failure policy is a required field: how a flow degrades when the
/// store is unreachable is a per-endpoint decision the config has to state.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum DedupRule {
    /// A record with the same key, at any age, is a duplicate.
    /// The hit is answered with an idempotent success, not an error.
    Permanent { fail: FailurePolicy },
    /// A record with the same key inside the trailing window is a duplicate.
    /// The hit is answered with a 409 conflict.
    Windowed { window_hours: u64, fail: FailurePolicy },
}

impl DedupRule {
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            DedupRule::Permanent { fail } | DedupRule::Windowed { fail, .. } => *fail,
        }
    }
}

/// Admission settings for one endpoint
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EndpointConfig {
    /// Sliding-window rate rule applied per client identity
    pub rate: RateRule,
    /// Largest accepted request body, bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Duplicate-submission rule; absent means the endpoint is not deduped
    #[serde(default)]
    pub dedup: Option<DedupRule>,
}

fn default_max_body_bytes() -> usize {
    10 * 1024
}

/// Per-endpoint admission settings
///
/// Defaults reflect the production posture: write paths share a 15 minute
/// window, the consultation flow was the origin of the double-booking
/// incidents so it keeps the strictest ceiling and a fail-closed dedup rule.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EndpointsConfig {
    #[serde(default = "default_newsletter")]
    pub newsletter: EndpointConfig,
    #[serde(default = "default_contact")]
    pub contact: EndpointConfig,
    #[serde(default = "default_roi_report")]
    pub roi_report: EndpointConfig,
    #[serde(default = "default_consultation")]
    pub consultation: EndpointConfig,
    #[serde(default = "default_admin_endpoint")]
    pub admin: EndpointConfig,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            newsletter: default_newsletter(),
            contact: default_contact(),
            roi_report: default_roi_report(),
            consultation: default_consultation(),
            admin: default_admin_endpoint(),
        }
    }
}

fn default_newsletter() -> EndpointConfig {
    EndpointConfig {
        rate: RateRule { max_requests: 50, window_secs: 900 },
        max_body_bytes: default_max_body_bytes(),
        dedup: Some(DedupRule::Permanent { fail: FailurePolicy::Open }),
    }
}

fn default_contact() -> EndpointConfig {
    EndpointConfig {
        rate: RateRule { max_requests: 50, window_secs: 900 },
        max_body_bytes: default_max_body_bytes(),
        dedup: None,
    }
}

fn default_roi_report() -> EndpointConfig {
    EndpointConfig {
        rate: RateRule { max_requests: 20, window_secs: 900 },
        max_body_bytes: 16 * 1024,
        dedup: None,
    }
}

fn default_consultation() -> EndpointConfig {
    EndpointConfig {
        rate: RateRule { max_requests: 10, window_secs: 900 },
        max_body_bytes: default_max_body_bytes(),
        dedup: Some(DedupRule::Windowed { window_hours: 24, fail: FailurePolicy::Closed }),
    }
}

fn default_admin_endpoint() -> EndpointConfig {
    EndpointConfig {
        rate: RateRule { max_requests: 30, window_secs: 900 },
        max_body_bytes: default_max_body_bytes(),
        dedup: None,
    }
}
