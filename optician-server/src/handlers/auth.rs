//! Who the login proxy says the caller is.

use crate::auth::identity;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub email: String,
    pub is_whitelisted: bool,
}

pub async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CurrentUser>, ApiError> {
    let identity = identity(&headers, &state.auth.email_header)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let is_whitelisted = !state.auth.allow_list_enabled() || state.auth.is_allowed(&identity.0);
    Ok(Json(CurrentUser {
        email: identity.0,
        is_whitelisted,
    }))
}
