use http::HeaderMap;
use std::net::SocketAddr;

/// Resolve the client identity a rate window is keyed on.
///
/// Platform routing puts the original caller in `X-Forwarded-For`; the
/// leftmost entry is the client. Without the header the peer address is the
/// client (direct connection). `"unknown"` only appears when neither exists,
/// which keeps anonymous traffic in one shared bucket instead of bypassing
/// the limiter.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first) = xff_str.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}
