//! Shop store - the data-access layer shared by every HTTP handler
//!
//! `ShopStore` owns the single SQLite connection behind a mutex. Operations
//! are grouped by concern in the `*_ops` files; multi-row writes run inside
//! one transaction.

mod category_ops;
mod customer_ops;
mod preset_ops;
mod seed;
mod settings_ops;

pub(crate) use category_ops::{insert_category_row, load_categories};
pub(crate) use customer_ops::{insert_customer_row, load_customers};
pub(crate) use preset_ops::{insert_field_row, insert_preset_row, load_presets};
pub use preset_ops::DEFAULT_PRESET_FIELDS;
pub use seed::DEFAULT_PRESET_NAME;
pub(crate) use settings_ops::{load_settings, write_settings};
pub use settings_ops::WholesaleAccess;

use crate::{crypto::HashParams, database::Database, DatabaseError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Handle to the shop database
///
/// Cloning is cheap; all clones share one connection.
#[derive(Clone)]
pub struct ShopStore {
    pub(crate) db: Arc<Mutex<Database>>,
    pub(crate) hash_params: HashParams,
}

impl ShopStore {
    /// Open (or create) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P, hash_params: HashParams) -> Result<Self> {
        let db = Database::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened shop database");
        Self::with_database(db, hash_params)
    }

    /// Fresh in-memory database, used by tests
    pub fn in_memory(hash_params: HashParams) -> Result<Self> {
        Self::with_database(Database::in_memory()?, hash_params)
    }

    fn with_database(db: Database, hash_params: HashParams) -> Result<Self> {
        hash_params.validate()?;
        db.initialize_schema()?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            hash_params,
        })
    }

    /// Argon2 parameters used for newly hashed passwords
    pub fn hash_params(&self) -> &HashParams {
        &self.hash_params
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| {
            DatabaseError::LockPoisoned("Failed to lock database".to_string()).into()
        })
    }
}
