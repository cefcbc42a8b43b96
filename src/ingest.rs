//! Public lead intake, called cross-origin by the marketing site's form.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::handlers::AppState;
use crate::models::NewLead;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";

/// Stamps the cross-origin headers onto every response from `router`,
/// including rejections produced by its inner middleware.
pub fn with_cors_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
}

/// OPTIONS /api/leads
///
/// Answers the browser's preflight check; headers come from [`with_cors_headers`].
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// POST /api/leads
///
/// Accepts an untrusted JSON object, coerces it into a new lead with status
/// `new`, and inserts it.
///
/// * `400 {"error": "Invalid request"}` when the body is not a JSON object.
/// * `500 {"error": <store message>}` when the insert fails.
/// * `200 {"status": "ok"}` otherwise, including for a suppressed duplicate.
pub async fn submit_lead(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let fields = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            tracing::warn!("Rejected lead submission: JSON body is {}", json_kind(&other));
            return invalid_request();
        }
        Err(e) => {
            tracing::warn!("Rejected lead submission: {}", e);
            return invalid_request();
        }
    };

    let lead = NewLead::from_submission(&fields, Utc::now());
    let fingerprint = fingerprint(&lead);

    // Only a stored submission suppresses later ones, so a duplicate that
    // races an insert still in flight is inserted on its own.
    if let Some(ref recent) = state.recent_submissions {
        if recent.contains_key(&fingerprint) {
            tracing::info!(
                "Duplicate lead submission suppressed (fingerprint {})",
                &fingerprint[..12]
            );
            return ok();
        }
    }

    match state.store.insert(lead).await {
        Ok(stored) => {
            tracing::info!("New lead {} from '{}'", stored.id, stored.company);
            if let Some(ref recent) = state.recent_submissions {
                recent.insert(fingerprint, ()).await;
            }
            ok()
        }
        Err(e) => {
            tracing::error!("Failed to store lead submission: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

fn ok() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

fn invalid_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "Invalid request" })),
    )
        .into_response()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// SHA-256 over the submission's content fields, hex encoded.
///
/// `submitted` is left out: a form retried by the browser carries a new
/// client timestamp but is still the same inquiry.
pub fn fingerprint(lead: &NewLead) -> String {
    let mut hasher = Sha256::new();
    for field in lead.content_fields() {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
