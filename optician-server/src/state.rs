//! Shared handler state.

use crate::config::{AuthConfig, ServerConfig};
use crate::error::ApiError;
use crate::uploads::UploadStore;
use optician_core::ShopStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: ShopStore,
    pub uploads: UploadStore,
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(store: ShopStore, config: &ServerConfig) -> Self {
        Self {
            store,
            uploads: UploadStore::new(&config.uploads_dir),
            auth: Arc::new(config.auth.clone()),
        }
    }

    /// Run a store call on the blocking pool; password hashing and
    /// verification go through here
    pub async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&ShopStore) -> optician_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))?;
        Ok(result?)
    }
}
