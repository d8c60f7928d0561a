use serde::Deserialize;

/// Security response policy
///
/// Everything here is immutable after load; the policy engine computes
/// response headers from this table and the request's Origin header alone.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SecurityPolicyConfig {
    /// Origins echoed back in Access-Control-Allow-Origin
    ///
    /// A request without an Origin header gets the wildcard `*`. A request
    /// whose Origin is not in this list gets no CORS allow-origin header at
    /// all (the browser blocks the response client side; the server still
    /// processes the request).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Content-Security-Policy directive string
    #[serde(default = "default_csp")]
    pub csp: String,
    /// Referrer-Policy value
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
    /// HSTS (HTTP Strict Transport Security) configuration
    ///
    /// Reference: RFC 6797 - https://tools.ietf.org/html/rfc6797
    #[serde(default)]
    pub hsts: HstsConfig,
    /// Access-Control-Allow-Methods value
    #[serde(default = "default_allow_methods")]
    pub allow_methods: String,
    /// Access-Control-Allow-Headers value
    #[serde(default = "default_allow_headers")]
    pub allow_headers: String,
}

impl Default for SecurityPolicyConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            csp: default_csp(),
            referrer_policy: default_referrer_policy(),
            hsts: HstsConfig::default(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
        }
    }
}

fn default_csp() -> String {
    "default-src 'self'".to_string()
}

fn default_referrer_policy() -> String {
    "strict-origin-when-cross-origin".to_string()
}

fn default_allow_methods() -> String {
    "GET, POST, OPTIONS, DELETE".to_string()
}

fn default_allow_headers() -> String {
    "Content-Type, Authorization".to_string()
}

/// HSTS configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HstsConfig {
    /// Emit Strict-Transport-Security
    ///
    /// TLS terminates at the platform edge in front of this service, so the
    /// header is emitted unconditionally when enabled rather than gated on a
    /// local HTTPS check.
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Max age in seconds (RFC 6797 requirement)
    ///
    /// Common values:
    /// - 31536000 (1 year) - Recommended for production
    /// - 63072000 (2 years) - Very secure
    /// - 300 (5 minutes) - Testing only
    ///
    /// Default: 31536000 (1 year)
    #[serde(default = "default_hsts_max_age")]
    pub max_age: u64,
    /// Include subdomains in HSTS policy (includeSubDomains directive)
    #[serde(default)]
    pub include_subdomains: bool,
    /// Add preload directive for HSTS preload list submission
    ///
    /// Warning: Only enable if you plan to submit to https://hstspreload.org/
    /// This is a permanent commitment and cannot be easily undone.
    #[serde(default)]
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age: default_hsts_max_age(),
            include_subdomains: false,
            preload: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_hsts_max_age() -> u64 {
    31536000 // 1 year
}
