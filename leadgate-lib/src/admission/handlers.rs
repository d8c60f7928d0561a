//! Business handlers behind the gate.
//!
//! Deliberately thin: the pipeline already settled method, rate, size,
//! sanitization and dedup by the time these run. A submit handler checks
//! required fields, normalizes the email, inserts, acks.

use http::StatusCode;
use serde_json::{json, Value};
use tracing::warn;

use super::rejection::{json_response, Rejection, RespBody};
use super::router::Endpoint;
use crate::dedup::normalize_key;
use crate::store::{StoreError, SubmissionStore, StoredSubmission};

pub(crate) fn health() -> http::Response<RespBody> {
    json_response(StatusCode::OK, &json!({ "status": "ok" }))
}

pub(crate) fn not_found() -> http::Response<RespBody> {
    json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not found" }))
}

/// Persist a cleared submission and ack.
pub(crate) async fn submit(
    endpoint: Endpoint,
    store: &dyn SubmissionStore,
    now_ms: u64,
    payload: Value,
) -> Result<http::Response<RespBody>, Rejection> {
    let required = endpoint.required_fields();
    if required.iter().any(|f| !field_present(&payload, f)) {
        return Err(Rejection::ValidationFailed { required });
    }

    let collection = endpoint.collection().ok_or(Rejection::Internal)?;
    let email = normalize_key(payload.get("email").and_then(Value::as_str).unwrap_or(""));

    let submission = StoredSubmission { email, created_at_ms: now_ms, fields: payload };
    store.insert(collection, submission).await.map_err(|err| {
        warn!(collection, error = %err, "submission insert failed");
        Rejection::Internal
    })?;

    Ok(json_response(StatusCode::OK, &ack_body(endpoint)))
}

/// A required field is present when it exists, is not null, and is not an
/// empty string. The sanitizer already trimmed, so whitespace-only input
/// arrives here as the empty string.
fn field_present(payload: &Value, field: &str) -> bool {
    match payload.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn ack_body(endpoint: Endpoint) -> Value {
    match endpoint {
        Endpoint::Newsletter => json!({
            "message": "Successfully subscribed to the newsletter",
            "status": "subscribed",
        }),
        Endpoint::Contact => json!({
            "message": "Message received, we will get back to you shortly",
        }),
        Endpoint::RoiReport => json!({
            "message": "ROI report request received",
        }),
        Endpoint::Consultation => json!({
            "message": "Consultation request received",
            "status": "booked",
        }),
        _ => json!({ "message": "OK" }),
    }
}

/// `GET /api/admin/submissions?collection=…`
pub(crate) async fn admin_list(
    store: &dyn SubmissionStore,
    query: &str,
) -> Result<http::Response<RespBody>, Rejection> {
    let collection = query_param(query, "collection").ok_or(Rejection::UnknownCollection)?;

    match store.list(&collection).await {
        Ok(submissions) => Ok(json_response(
            StatusCode::OK,
            &json!({
                "collection": collection,
                "count": submissions.len(),
                "submissions": submissions,
            }),
        )),
        Err(StoreError::UnknownCollection(_)) => Err(Rejection::UnknownCollection),
        Err(StoreError::Unavailable(err)) => {
            warn!(collection = %collection, error = %err, "admin list failed");
            Err(Rejection::StoreUnavailable)
        }
    }
}

/// `DELETE /api/admin/submissions?collection=…&email=…`
pub(crate) async fn admin_delete(
    store: &dyn SubmissionStore,
    query: &str,
) -> Result<http::Response<RespBody>, Rejection> {
    let collection = query_param(query, "collection").ok_or(Rejection::UnknownCollection)?;
    let email = query_param(query, "email")
        .ok_or(Rejection::ValidationFailed { required: &["email"] })?;

    match store.delete_where(&collection, &normalize_key(&email)).await {
        Ok(deleted) => Ok(json_response(
            StatusCode::OK,
            &json!({ "collection": collection, "deleted": deleted }),
        )),
        Err(StoreError::UnknownCollection(_)) => Err(Rejection::UnknownCollection),
        Err(StoreError::Unavailable(err)) => {
            warn!(collection = %collection, error = %err, "admin delete failed");
            Err(Rejection::StoreUnavailable)
        }
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}
