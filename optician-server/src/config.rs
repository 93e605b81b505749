//! Server configuration.

use optician_core::HashParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    /// Largest accepted prescription photo request, in bytes
    pub max_upload_size: usize,
    /// Largest accepted restore request, in bytes
    pub max_backup_size: usize,
    pub seed_demo_data: bool,
    pub password_hash: HashParams,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5000".to_string(),
            database_path: PathBuf::from("optician.db"),
            uploads_dir: PathBuf::from("uploads"),
            max_upload_size: 5 * 1024 * 1024,
            max_backup_size: 32 * 1024 * 1024,
            seed_demo_data: true,
            password_hash: HashParams::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Identity check for requests arriving through the login proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header carrying the authenticated email
    pub email_header: String,
    /// Emails allowed to use the API; empty disables the check
    pub allowed_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            email_header: "X-Forwarded-Email".to_string(),
            allowed_emails: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn allow_list_enabled(&self) -> bool {
        !self.allowed_emails.is_empty()
    }

    /// Case-insensitive allow-list lookup
    pub fn is_allowed(&self, email: &str) -> bool {
        let email = email.trim();
        self.allowed_emails
            .iter()
            .any(|allowed| allowed.trim().eq_ignore_ascii_case(email))
    }
}
