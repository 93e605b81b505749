//! Backup download and restore upload.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use optician_core::{BackupDocument, WholesaleAccess};
use serde_json::{json, Value};

/// Multipart field the client sends the backup file in
const BACKUP_FIELD: &str = "backup";

pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let document = state.store.export_backup()?;
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            "attachment; filename=optician_backup.json",
        )],
        Json(document),
    ))
}

/// Replace all data with an uploaded backup
///
/// Reads the `backup` field, or the first file part when that is absent.
pub async fn restore(
    State(state): State<AppState>,
    Extension(_access): Extension<WholesaleAccess>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut contents = None;
    while let Some(field) = multipart.next_field().await? {
        let is_backup = field.name() == Some(BACKUP_FIELD) || field.file_name().is_some();
        if is_backup {
            contents = Some(field.bytes().await?);
            break;
        }
    }

    let contents =
        contents.ok_or_else(|| ApiError::BadRequest("No backup file uploaded".to_string()))?;
    let document = BackupDocument::from_slice(&contents)?;
    state.store.restore_backup(&document)?;

    Ok(Json(json!({ "success": true })))
}
