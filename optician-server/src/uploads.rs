//! Prescription photo storage on local disk.

use crate::error::ApiError;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// URL prefix the uploads directory is served under
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Raster image types accepted for upload, as (content type, extension)
const IMAGE_TYPES: [(&str, &str); 7] = [
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/pjpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
];

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store an image under a generated name and return its public URL
    ///
    /// The stored extension always follows the declared content type; the
    /// client's file name is only logged.
    pub async fn save_image(
        &self,
        content_type: Option<&str>,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, ApiError> {
        let extension = content_type
            .and_then(extension_for_content_type)
            .ok_or_else(|| ApiError::BadRequest("Only image uploads are allowed".to_string()))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;
        info!(
            file = %file_name,
            original = original_name.unwrap_or_default(),
            size = bytes.len(),
            "Stored upload"
        );

        Ok(format!("{}/{}", UPLOADS_URL_PREFIX, file_name))
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}
