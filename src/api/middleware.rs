// Admin gate middleware

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{Json, Response},
};

use crate::api::responses::ErrorResponse;
use crate::api::AppState;

/// Gate middleware for the /api/admin/* routes.
///
/// Accepts the credential as the `k` query parameter or the
/// `x-admin-key` header. A failed gate answers exactly like a missing
/// resource (404 "Not found") so the response never reveals whether the
/// admin surface exists.
pub async fn admin_gate_middleware(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let supplied = extract_admin_key(&request);

    if !app_state.admin_gate.validate(supplied.as_deref()) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Not found".to_string(),
                request_id: None,
            }),
        ));
    }

    Ok(next.run(request).await)
}

/// Extract the admin credential from a request.
///
/// A non-empty `k` query parameter takes precedence, then `x-admin-key`.
pub fn extract_admin_key(request: &Request) -> Option<String> {
    if let Some(query) = request.uri().query() {
        if let Some((_, value)) = url::form_urlencoded::parse(query.as_bytes()).find(|(k, _)| k == "k")
        {
            if !value.is_empty() {
                return Some(value.into_owned());
            }
        }
    }

    header_admin_key(request.headers())
}

/// Variant for handlers that already parsed their query parameters:
/// combine an optional `k` value with the header fallback.
pub fn extract_admin_key_parts(query_key: Option<&str>, headers: &HeaderMap) -> Option<String> {
    match query_key.filter(|k| !k.is_empty()) {
        Some(k) => Some(k.to_string()),
        None => header_admin_key(headers),
    }
}

fn header_admin_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
