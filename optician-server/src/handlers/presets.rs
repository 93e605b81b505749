//! Form preset handlers.

use crate::error::{ApiError, JsonBody};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use optician_core::{FieldUpdate, PresetWithFields, WholesaleAccess};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct CreatePresetRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateFieldsRequest {
    pub fields: Vec<FieldUpdate>,
}

pub async fn list(
    State(state): State<AppState>,
) -> Result<Json<Vec<PresetWithFields>>, ApiError> {
    Ok(Json(state.store.list_presets()?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PresetWithFields>, ApiError> {
    state
        .store
        .get_preset(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Preset not found".to_string()))
}

pub async fn active(
    State(state): State<AppState>,
) -> Result<Json<PresetWithFields>, ApiError> {
    state
        .store
        .active_preset()?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No active preset".to_string()))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    JsonBody(req): JsonBody<CreatePresetRequest>,
) -> Result<(StatusCode, Json<PresetWithFields>), ApiError> {
    let preset = state.store.create_preset(&req.name)?;
    Ok((StatusCode::CREATED, Json(preset)))
}

pub async fn update_fields(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    Path(id): Path<i64>,
    JsonBody(req): JsonBody<UpdateFieldsRequest>,
) -> Result<Json<Value>, ApiError> {
    state.store.update_preset_fields(id, &req.fields)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn activate(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.store.activate_preset(id)?;
    Ok(Json(json!({ "success": true })))
}
