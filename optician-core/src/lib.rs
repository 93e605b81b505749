//! Optician Shop Core Library
//!
//! Storage and domain logic for the optician shop server: the lens catalog
//! tree, customer records with prescriptions, form presets, the wholesale
//! password settings, and whole-dataset backup/restore.

pub mod backup;
pub mod crypto;
pub mod database;
pub mod dates;
pub mod models;
pub mod store;
pub mod tree;

pub use backup::{BackupDocument, BACKUP_FORMAT_VERSION};
pub use crypto::{hash_password, verify_password, CryptoError, HashParams};
pub use database::{Database, DatabaseError};
pub use models::{
    Category, CategoryInput, CategoryKind, Customer, CustomerDetails, CustomerFilter,
    FieldUpdate, FormPreset, FormPresetField, LensPowers, PresetWithFields, Settings,
    SettingsStatus,
};
pub use store::{ShopStore, WholesaleAccess, DEFAULT_PRESET_FIELDS, DEFAULT_PRESET_NAME};
pub use tree::{CategoryNode, CategoryTree};

use thiserror::Error;

/// Result type for shop operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// General error type for shop operations
#[derive(Error, Debug)]
pub enum ShopError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Setup required")]
    SetupRequired,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for ShopError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}
