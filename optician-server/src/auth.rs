//! Request guards: the proxy identity allow-list and the wholesale gate.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

/// Header carrying the wholesale password on mutating requests
pub const WHOLESALE_PASSWORD_HEADER: &str = "X-Wholesale-Password";

/// The email the login proxy authenticated, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub String);

pub fn wholesale_password(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(WHOLESALE_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
}

pub fn identity(headers: &HeaderMap, header_name: &str) -> Option<Identity> {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(|email| Identity(email.to_string()))
}

/// Wholesale gate: checks `X-Wholesale-Password` against the configured
/// password and hands the resulting `WholesaleAccess` to the handler.
pub async fn wholesale_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = wholesale_password(request.headers()).map(str::to_string);
    let access = state
        .blocking(move |store| store.authorize_wholesale(presented.as_deref()))
        .await?;

    request.extensions_mut().insert(access);
    Ok(next.run(request).await)
}

/// Allow-list check on the proxy-supplied email; a no-op when the list is
/// empty.
pub async fn require_identity(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.allow_list_enabled() {
        return Ok(next.run(request).await);
    }

    let identity = identity(request.headers(), &state.auth.email_header)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
    if !state.auth.is_allowed(&identity.0) {
        tracing::warn!(email = %identity.0, "Email not on the allow-list");
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    Ok(next.run(request).await)
}
