use http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_SECURITY_POLICY, REFERRER_POLICY,
    STRICT_TRANSPORT_SECURITY, VARY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use http::Response;

use crate::config::{HstsConfig, SecurityPolicyConfig};
use crate::error::{GateError, Result};

/// Security response policy
///
/// Compiled once from configuration at startup; afterwards
/// [`response_headers`](SecurityPolicy::response_headers) is a pure function
/// of the request's Origin header. The server layer applies the returned map
/// to whatever response the pipeline settles on, so every response (success,
/// rejection, preflight) carries the same policy surface.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    allowed_origins: Vec<String>,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    csp: HeaderValue,
    referrer_policy: HeaderValue,
    hsts: Option<HeaderValue>,
}

impl SecurityPolicy {
    /// Validate the configured header values and compile the policy.
    ///
    /// Bad directive strings are a startup error, not a per-request one.
    pub fn from_config(cfg: &SecurityPolicyConfig) -> Result<Self> {
        let hsts = if cfg.hsts.enabled { Some(build_hsts_header(&cfg.hsts)?) } else { None };

        Ok(Self {
            allowed_origins: cfg.allowed_origins.clone(),
            allow_methods: parse_header_value("allow_methods", &cfg.allow_methods)?,
            allow_headers: parse_header_value("allow_headers", &cfg.allow_headers)?,
            csp: parse_header_value("csp", &cfg.csp)?,
            referrer_policy: parse_header_value("referrer_policy", &cfg.referrer_policy)?,
            hsts,
        })
    }

    /// Compute the response header set for a request with the given Origin.
    ///
    /// CORS allow-origin resolution:
    /// - Origin on the allow-list: echoed back, plus `Vary: Origin`
    /// - No Origin header: wildcard `*`
    /// - Origin not on the allow-list: no allow-origin header at all; the
    ///   browser blocks the response client side, the request itself is
    ///   still processed
    pub fn response_headers(&self, origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        match origin {
            Some(o) if self.origin_allowed(o) => {
                if let Ok(value) = HeaderValue::from_str(o) {
                    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
                    headers.insert(VARY, HeaderValue::from_static("Origin"));
                }
            }
            Some(_) => {}
            None => {
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            }
        }

        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(CONTENT_SECURITY_POLICY, self.csp.clone());
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        headers.insert(REFERRER_POLICY, self.referrer_policy.clone());
        if let Some(hsts) = &self.hsts {
            headers.insert(STRICT_TRANSPORT_SECURITY, hsts.clone());
        }

        headers
    }

    /// Apply the policy's header set to a response
    pub fn apply<T>(&self, response: &mut Response<T>, origin: Option<&str>) {
        for (name, value) in self.response_headers(origin) {
            if let Some(name) = name {
                response.headers_mut().insert(name, value);
            }
        }
    }

    fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

fn parse_header_value(field: &str, raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|e| GateError::Config(format!("Invalid security.{field} value: {e}")))
}

/// Build HSTS header value from configuration
fn build_hsts_header(hsts: &HstsConfig) -> Result<HeaderValue> {
    let mut parts = vec![format!("max-age={}", hsts.max_age)];

    if hsts.include_subdomains {
        parts.push("includeSubDomains".to_string());
    }

    if hsts.preload {
        parts.push("preload".to_string());
    }

    parse_header_value("hsts", &parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityPolicyConfig;

    fn policy_with_origins(origins: &[&str]) -> SecurityPolicy {
        let cfg = SecurityPolicyConfig {
            allowed_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..SecurityPolicyConfig::default()
        };
        SecurityPolicy::from_config(&cfg).expect("default config must compile")
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn allowed_origin_is_echoed_with_vary() {
        let policy = policy_with_origins(&["https://example.com"]);
        let headers = policy.response_headers(Some("https://example.com"));

        assert_eq!(header(&headers, "access-control-allow-origin"), Some("https://example.com"));
        assert_eq!(header(&headers, "vary"), Some("Origin"));
    }

    #[test]
    fn absent_origin_gets_wildcard() {
        let policy = policy_with_origins(&["https://example.com"]);
        let headers = policy.response_headers(None);

        assert_eq!(header(&headers, "access-control-allow-origin"), Some("*"));
        assert!(headers.get("vary").is_none());
    }

    #[test]
    fn unknown_origin_gets_no_allow_origin() {
        let policy = policy_with_origins(&["https://example.com"]);
        let headers = policy.response_headers(Some("https://evil.test"));

        assert!(headers.get("access-control-allow-origin").is_none());
        // the rest of the policy still applies
        assert_eq!(header(&headers, "x-frame-options"), Some("DENY"));
    }

    #[test]
    fn fixed_headers_always_present() {
        let policy = policy_with_origins(&[]);
        let headers = policy.response_headers(None);

        assert_eq!(header(&headers, "x-content-type-options"), Some("nosniff"));
        assert_eq!(header(&headers, "x-frame-options"), Some("DENY"));
        assert_eq!(header(&headers, "content-security-policy"), Some("default-src 'self'"));
        assert_eq!(header(&headers, "referrer-policy"), Some("strict-origin-when-cross-origin"));
        assert!(header(&headers, "strict-transport-security")
            .is_some_and(|v| v.contains("max-age=31536000")));
    }

    #[test]
    fn hsts_disabled_omits_header() {
        let mut cfg = SecurityPolicyConfig::default();
        cfg.hsts.enabled = false;
        let policy = SecurityPolicy::from_config(&cfg).expect("config must compile");

        let headers = policy.response_headers(None);
        assert!(headers.get("strict-transport-security").is_none());
    }

    #[test]
    fn hsts_directives_follow_config() {
        let mut cfg = SecurityPolicyConfig::default();
        cfg.hsts.max_age = 63072000;
        cfg.hsts.include_subdomains = true;
        cfg.hsts.preload = true;
        let policy = SecurityPolicy::from_config(&cfg).expect("config must compile");

        let headers = policy.response_headers(None);
        let hsts = header(&headers, "strict-transport-security").expect("hsts enabled");
        assert!(hsts.contains("max-age=63072000"));
        assert!(hsts.contains("includeSubDomains"));
        assert!(hsts.contains("preload"));
    }

    #[test]
    fn invalid_csp_is_a_config_error() {
        let cfg = SecurityPolicyConfig {
            csp: "default-src 'self'\nno-newlines-allowed".to_string(),
            ..SecurityPolicyConfig::default()
        };
        assert!(SecurityPolicy::from_config(&cfg).is_err());
    }

    #[test]
    fn apply_sets_headers_on_response() {
        let policy = policy_with_origins(&["https://example.com"]);
        let mut response = Response::new("body");
        policy.apply(&mut response, Some("https://example.com"));

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("https://example.com")
        );
    }
}
