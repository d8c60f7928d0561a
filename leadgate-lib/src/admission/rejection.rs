use bytes::Bytes;
use http::header::{HeaderValue, RETRY_AFTER};
use http::{Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Response body type every pipeline stage settles into.
pub type RespBody = BoxBody<Bytes, hyper::Error>;

/// Terminal outcomes of the admission pipeline.
///
/// Every variant settles into a client response with a generic JSON body;
/// nothing here carries internals worth hiding. A permanent-dedup hit is
/// deliberately NOT a rejection: it settles as a success-shaped response in
/// the gatekeeper.
#[derive(Debug, Error, Clone)]
pub enum Rejection {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Rate limit exceeded, retry in {}s", retry_after.as_secs())]
    RateLimited { limit: u32, retry_after: Duration, reset_after: Duration },

    #[error("Payload exceeds {max_bytes} bytes")]
    PayloadTooLarge { max_bytes: usize },

    #[error("Request body is not valid JSON")]
    InvalidBody,

    #[error("Missing required fields")]
    ValidationFailed { required: &'static [&'static str] },

    #[error("Duplicate submission inside the dedup window")]
    DuplicateSubmission,

    #[error("Missing or invalid admin credentials")]
    Unauthorized,

    #[error("Unknown collection")]
    UnknownCollection,

    #[error("Submission store unavailable")]
    StoreUnavailable,

    #[error("Internal error")]
    Internal,
}

impl From<&Rejection> for StatusCode {
    fn from(r: &Rejection) -> StatusCode {
        match r {
            Rejection::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Rejection::InvalidBody => StatusCode::BAD_REQUEST,
            Rejection::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            Rejection::DuplicateSubmission => StatusCode::CONFLICT,
            Rejection::Unauthorized => StatusCode::UNAUTHORIZED,
            Rejection::UnknownCollection => StatusCode::BAD_REQUEST,
            Rejection::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Rejection::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Rejection {
    /// Stable label for logs and the rejection counter.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::MethodNotAllowed => "method_not_allowed",
            Rejection::RateLimited { .. } => "rate_limited",
            Rejection::PayloadTooLarge { .. } => "payload_too_large",
            Rejection::InvalidBody => "invalid_body",
            Rejection::ValidationFailed { .. } => "validation_failed",
            Rejection::DuplicateSubmission => "duplicate_submission",
            Rejection::Unauthorized => "unauthorized",
            Rejection::UnknownCollection => "unknown_collection",
            Rejection::StoreUnavailable => "store_unavailable",
            Rejection::Internal => "internal",
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Rejection::MethodNotAllowed => json!({ "error": "Method not allowed" }),
            Rejection::RateLimited { retry_after, .. } => json!({
                "error": "Too many requests, please try again later",
                "retryAfter": retry_after.as_secs(),
            }),
            Rejection::PayloadTooLarge { max_bytes } => json!({
                "error": "Request payload too large",
                "maxSize": max_bytes,
            }),
            Rejection::InvalidBody => json!({ "error": "Request body must be valid JSON" }),
            Rejection::ValidationFailed { required } => json!({
                "error": "Missing required fields",
                "required": required,
            }),
            Rejection::DuplicateSubmission => json!({
                "error": "Duplicate submission",
                "message": "A recent submission already exists for this email",
            }),
            Rejection::Unauthorized => json!({ "error": "Unauthorized" }),
            Rejection::UnknownCollection => json!({
                "error": "Invalid collection",
                "validCollections": crate::store::COLLECTIONS,
            }),
            Rejection::StoreUnavailable => json!({
                "error": "Service temporarily unavailable, please try again",
            }),
            Rejection::Internal => json!({ "error": "Internal server error" }),
        }
    }

    /// Settle the rejection into a response.
    ///
    /// Rate-limit refusals carry their `Retry-After` and `X-RateLimit-*`
    /// headers here; the policy header set is applied by the gatekeeper on
    /// the way out like for every other response.
    pub fn into_response(self) -> Response<RespBody> {
        let status = StatusCode::from(&self);
        let mut resp = json_response(status, &self.body());

        if let Rejection::RateLimited { limit, retry_after, reset_after } = &self {
            let headers = resp.headers_mut();
            headers.insert(RETRY_AFTER, int_header(retry_after.as_secs()));
            apply_rate_headers(headers, *limit, 0, *reset_after);
        }

        resp
    }
}

/// Build a JSON response with the given status.
pub(crate) fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<RespBody> {
    let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut resp = Response::new(full_body(Bytes::from(bytes)));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

/// Response with status only, no body. Preflight answers look like this.
pub(crate) fn empty_response(status: StatusCode) -> Response<RespBody> {
    let mut resp = Response::new(full_body(Bytes::new()));
    *resp.status_mut() = status;
    resp
}

pub(crate) fn full_body(bytes: Bytes) -> RespBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

/// X-RateLimit-Limit / -Remaining / -Reset. Reset is whole seconds until
/// the oldest counted admission leaves the window, rounded up.
pub(crate) fn apply_rate_headers(
    headers: &mut http::HeaderMap,
    limit: u32,
    remaining: u32,
    reset_after: Duration,
) {
    let reset_secs = if reset_after.subsec_nanos() > 0 {
        reset_after.as_secs() + 1
    } else {
        reset_after.as_secs()
    };
    headers.insert(
        http::header::HeaderName::from_static("x-ratelimit-limit"),
        int_header(limit as u64),
    );
    headers.insert(
        http::header::HeaderName::from_static("x-ratelimit-remaining"),
        int_header(remaining as u64),
    );
    headers.insert(
        http::header::HeaderName::from_static("x-ratelimit-reset"),
        int_header(reset_secs),
    );
}

fn int_header(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_contract() {
        assert_eq!(StatusCode::from(&Rejection::MethodNotAllowed), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            StatusCode::from(&Rejection::PayloadTooLarge { max_bytes: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(StatusCode::from(&Rejection::DuplicateSubmission), StatusCode::CONFLICT);
        assert_eq!(StatusCode::from(&Rejection::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(StatusCode::from(&Rejection::UnknownCollection), StatusCode::BAD_REQUEST);
        assert_eq!(
            StatusCode::from(&Rejection::StoreUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn rate_limited_response_carries_retry_headers() {
        let rejection = Rejection::RateLimited {
            limit: 50,
            retry_after: Duration::from_secs(900),
            reset_after: Duration::from_millis(899_500),
        };
        let resp = rejection.into_response();

        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            resp.headers().get("retry-after").and_then(|v| v.to_str().ok()),
            Some("900")
        );
        assert_eq!(
            resp.headers().get("x-ratelimit-limit").and_then(|v| v.to_str().ok()),
            Some("50")
        );
        assert_eq!(
            resp.headers().get("x-ratelimit-remaining").and_then(|v| v.to_str().ok()),
            Some("0")
        );
        // 899.5s rounds up to 900
        assert_eq!(
            resp.headers().get("x-ratelimit-reset").and_then(|v| v.to_str().ok()),
            Some("900")
        );
    }

    #[test]
    fn validation_body_lists_fields() {
        let rejection = Rejection::ValidationFailed { required: &["name", "email"] };
        let body = rejection.body();
        assert_eq!(body["required"], serde_json::json!(["name", "email"]));
    }

    #[test]
    fn unknown_collection_lists_valid_names() {
        let body = Rejection::UnknownCollection.body();
        let valid = body["validCollections"].as_array().expect("array of names");
        assert_eq!(valid.len(), crate::store::COLLECTIONS.len());
    }
}
