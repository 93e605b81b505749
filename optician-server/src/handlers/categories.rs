//! Lens catalog handlers.

use crate::error::{ApiError, JsonBody};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use optician_core::{Category, CategoryInput, CategoryNode, WholesaleAccess};
use serde_json::Value;

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.store.list_categories()?))
}

pub async fn tree(State(state): State<AppState>) -> Result<Json<Vec<CategoryNode>>, ApiError> {
    Ok(Json(state.store.category_tree()?.nested()))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    state
        .store
        .get_category(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    JsonBody(input): JsonBody<CategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.store.create_category(input)?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<Value>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.store.update_category(id, patch)?))
}

/// Removes the category and its whole subtree; 204 even when nothing existed
pub async fn delete(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_category(id)?;
    Ok(StatusCode::NO_CONTENT)
}
