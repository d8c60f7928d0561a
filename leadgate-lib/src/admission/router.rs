use http::Method;

use crate::config::{EndpointConfig, EndpointsConfig};

/// The fixed HTTP surface, one variant per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Newsletter,
    Contact,
    RoiReport,
    Consultation,
    AdminList,
    AdminDelete,
    Health,
}

/// Outcome of matching a request line against the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(Endpoint),
    /// OPTIONS to a known path: answered 204 before any other check.
    Preflight,
    /// Known path, method not in its table.
    MethodNotAllowed,
    NotFound,
}

/// Match `(method, path)` against the surface.
///
/// Paths are exact; anything with a trailing segment is a 404, not a fuzzy
/// match.
pub fn resolve(method: &Method, path: &str) -> Resolution {
    if !is_known_path(path) {
        return Resolution::NotFound;
    }
    if method == Method::OPTIONS {
        return Resolution::Preflight;
    }

    let endpoint = match path {
        "/api/newsletter" if method == Method::POST => Some(Endpoint::Newsletter),
        "/api/contact" if method == Method::POST => Some(Endpoint::Contact),
        "/api/roi-report" if method == Method::POST => Some(Endpoint::RoiReport),
        "/api/consultation" if method == Method::POST => Some(Endpoint::Consultation),
        "/api/admin/submissions" if method == Method::GET => Some(Endpoint::AdminList),
        "/api/admin/submissions" if method == Method::DELETE => Some(Endpoint::AdminDelete),
        "/api/health" if method == Method::GET => Some(Endpoint::Health),
        _ => None,
    };

    match endpoint {
        Some(endpoint) => Resolution::Found(endpoint),
        None => Resolution::MethodNotAllowed,
    }
}

fn is_known_path(path: &str) -> bool {
    matches!(
        path,
        "/api/newsletter"
            | "/api/contact"
            | "/api/roi-report"
            | "/api/consultation"
            | "/api/admin/submissions"
            | "/api/health"
    )
}

impl Endpoint {
    /// Rate-bucket scope and log/metrics label.
    pub fn scope(&self) -> &'static str {
        match self {
            Endpoint::Newsletter => "newsletter",
            Endpoint::Contact => "contact",
            Endpoint::RoiReport => "roi_report",
            Endpoint::Consultation => "consultation",
            Endpoint::AdminList | Endpoint::AdminDelete => "admin",
            Endpoint::Health => "health",
        }
    }

    /// Admission settings for this endpoint; `None` skips rate and size
    /// checks entirely (health probes must answer under load).
    pub fn config<'a>(&self, endpoints: &'a EndpointsConfig) -> Option<&'a EndpointConfig> {
        match self {
            Endpoint::Newsletter => Some(&endpoints.newsletter),
            Endpoint::Contact => Some(&endpoints.contact),
            Endpoint::RoiReport => Some(&endpoints.roi_report),
            Endpoint::Consultation => Some(&endpoints.consultation),
            Endpoint::AdminList | Endpoint::AdminDelete => Some(&endpoints.admin),
            Endpoint::Health => None,
        }
    }

    /// Target collection for write endpoints.
    pub fn collection(&self) -> Option<&'static str> {
        match self {
            Endpoint::Newsletter => Some("newsletter_subscribers"),
            Endpoint::Contact => Some("contact_messages"),
            Endpoint::RoiReport => Some("roi_reports"),
            Endpoint::Consultation => Some("consultation_requests"),
            _ => None,
        }
    }

    /// Fields a submission must carry to be dispatched.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Endpoint::Newsletter => &["email"],
            Endpoint::Contact => &["name", "email", "message"],
            Endpoint::RoiReport => &["email", "company"],
            Endpoint::Consultation => &["name", "email", "preferredDate"],
            _ => &[],
        }
    }

    pub fn expects_body(&self) -> bool {
        matches!(
            self,
            Endpoint::Newsletter | Endpoint::Contact | Endpoint::RoiReport | Endpoint::Consultation
        )
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Endpoint::AdminList | Endpoint::AdminDelete)
    }
}
