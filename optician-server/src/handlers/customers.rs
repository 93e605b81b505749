//! Customer record handlers, including prescription photo upload.

use crate::error::{ApiError, JsonBody};
use crate::state::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use optician_core::{Customer, CustomerDetails, CustomerFilter, WholesaleAccess};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.store.list_customers(&filter)?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    state
        .store
        .get_customer(id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    JsonBody(details): JsonBody<CustomerDetails>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let customer = state.store.create_customer(details)?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<Value>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.store.update_customer(id, patch)?))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_customer(id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    JsonBody(req): JsonBody<BulkDeleteRequest>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_customers(&req.ids)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Store the first file part of a multipart upload; images only
pub async fn upload(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;

        let url = state
            .uploads
            .save_image(content_type.as_deref(), file_name.as_deref(), &bytes)
            .await?;
        return Ok(Json(json!({ "url": url })));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}
