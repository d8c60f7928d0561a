use http::header::AUTHORIZATION;
use http::HeaderMap;
use subtle::ConstantTimeEq;

/// Verify the bearer token on an admin request.
///
/// The request must carry `Authorization: Bearer <token>` matching the
/// configured token exactly. Comparison is constant time over the token
/// bytes; only the length is observable.
pub fn bearer_token_valid(headers: &HeaderMap, expected: &str) -> bool {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    match presented {
        Some(token) => constant_time_eq(token, expected),
        None => false,
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
