//! Wholesale password and master password handlers.

use crate::auth::wholesale_password;
use crate::error::{ApiError, JsonBody};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use optician_core::{SettingsStatus, WholesaleAccess};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub master_password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterPasswordRequest {
    pub password: String,
    pub current_password: Option<String>,
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<SettingsStatus>, ApiError> {
    Ok(Json(state.store.settings_status()?))
}

pub async fn setup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .blocking(move |store| store.setup_password(&req.password))
        .await?;
    Ok(success())
}

pub async fn verify(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<PasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let valid = state
        .blocking(move |store| store.verify_wholesale_password(&req.password))
        .await?;
    Ok(Json(json!({ "valid": valid })))
}

pub async fn change_password(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .blocking(move |store| store.change_password(&req.old_password, &req.new_password))
        .await?;
    Ok(success())
}

/// The body is optional: without a master password there is nothing to send.
pub async fn reset(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let req: ResetRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResetRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    state
        .blocking(move |store| store.reset_password(req.master_password.as_deref()))
        .await?;
    Ok(success())
}

/// Set or replace the master password; setting the first one needs the
/// wholesale password header.
pub async fn master_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(req): JsonBody<MasterPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let presented = wholesale_password(&headers).map(str::to_string);
    state
        .blocking(move |store| {
            store.set_master_password(
                &req.password,
                req.current_password.as_deref(),
                presented.as_deref(),
            )
        })
        .await?;
    Ok(success())
}

pub async fn reset_master_once(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
) -> Result<Json<Value>, ApiError> {
    state.store.reset_master_once()?;
    Ok(success())
}
