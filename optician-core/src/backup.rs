//! Whole-dataset JSON backup and restore
//!
//! A backup holds every category, customer, preset (with fields) and the
//! settings row. Restore replaces all tables in one transaction and keeps
//! the original primary keys.

use crate::crypto::is_phc_hash;
use crate::models::{Category, Customer, PresetWithFields, Settings};
use crate::store::{
    insert_category_row, insert_customer_row, insert_field_row, insert_preset_row,
    load_categories, load_customers, load_presets, load_settings, write_settings, ShopStore,
};
use crate::{Result, ShopError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Format version written into new backups
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// The backup file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub categories: Vec<Category>,
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub presets: Vec<PresetWithFields>,
    /// `None` leaves the current settings in place on restore
    #[serde(default)]
    pub settings: Option<Settings>,
}

fn default_version() -> String {
    BACKUP_FORMAT_VERSION.to_string()
}

impl BackupDocument {
    /// Parse and validate an uploaded backup file
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let document: Self = serde_json::from_slice(bytes)
            .map_err(|e| ShopError::InvalidInput(format!("Invalid backup file: {}", e)))?;
        document.validate()?;
        Ok(document)
    }

    /// Reject documents that would fail halfway through a restore
    pub fn validate(&self) -> Result<()> {
        if self.version.split('.').next() != Some("1") {
            return Err(ShopError::InvalidInput(format!(
                "Unsupported backup version: {}",
                self.version
            )));
        }

        unique_ids("category", self.categories.iter().map(|c| c.id))?;
        unique_ids("customer", self.customers.iter().map(|c| c.id))?;
        unique_ids("preset", self.presets.iter().map(|p| p.preset.id))?;
        unique_ids(
            "preset field",
            self.presets.iter().flat_map(|p| p.fields.iter().map(|f| f.id)),
        )?;

        let mut names = HashSet::new();
        for preset in &self.presets {
            if !names.insert(preset.preset.name.as_str()) {
                return Err(ShopError::InvalidInput(format!(
                    "Duplicate preset name in backup: {}",
                    preset.preset.name
                )));
            }
        }

        let active = self.presets.iter().filter(|p| p.preset.is_active).count();
        if active > 1 {
            return Err(ShopError::InvalidInput(
                "Backup has more than one active preset".to_string(),
            ));
        }

        Ok(())
    }
}

/// Drop password hashes this build cannot verify
///
/// A restored hash in a foreign format would lock every gated route with no
/// way to reset it, so it is cleared instead.
fn usable_settings(settings: &Settings) -> Settings {
    let mut usable = settings.clone();

    if usable.has_password() && !is_phc_hash(&usable.wholesale_password_hash) {
        warn!("Backup wholesale password hash is not a supported format, dropping it");
        usable.wholesale_password_hash.clear();
    }
    if usable.has_master_password()
        && !usable.master_password_hash.as_deref().is_some_and(is_phc_hash)
    {
        warn!("Backup master password hash is not a supported format, dropping it");
        usable.master_password_hash = None;
    }

    usable
}

fn unique_ids(what: &str, ids: impl Iterator<Item = i64>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ShopError::InvalidInput(format!(
                "Duplicate {} id in backup: {}",
                what, id
            )));
        }
    }
    Ok(())
}

impl ShopStore {
    /// Snapshot every table into a backup document
    pub fn export_backup(&self) -> Result<BackupDocument> {
        let db = self.lock()?;
        let conn = db.conn();

        let document = BackupDocument {
            version: BACKUP_FORMAT_VERSION.to_string(),
            timestamp: Utc::now(),
            categories: load_categories(conn)?,
            customers: load_customers(conn)?,
            presets: load_presets(conn)?,
            settings: load_settings(conn)?,
        };

        info!(
            categories = document.categories.len(),
            customers = document.customers.len(),
            presets = document.presets.len(),
            "Exported backup"
        );
        Ok(document)
    }

    /// Replace all data with the contents of `document`
    ///
    /// Nothing is written unless the document validates, and a failure
    /// part way rolls everything back.
    pub fn restore_backup(&self, document: &BackupDocument) -> Result<()> {
        document.validate()?;

        let mut db = self.lock()?;
        let tx = db.conn_mut().transaction()?;

        tx.execute_batch(
            "DELETE FROM form_preset_fields;
             DELETE FROM form_presets;
             DELETE FROM customers;
             DELETE FROM categories;",
        )?;

        for category in &document.categories {
            insert_category_row(&tx, Some(category.id), &category.input(), category.updated_at)?;
        }

        for customer in &document.customers {
            insert_customer_row(
                &tx,
                Some(customer.id),
                &customer.details,
                customer.created_at,
            )?;
        }

        for preset in &document.presets {
            let preset_id = insert_preset_row(
                &tx,
                Some(preset.preset.id),
                &preset.preset.name,
                preset.preset.is_active,
            )?;
            for field in &preset.fields {
                insert_field_row(
                    &tx,
                    Some(field.id),
                    preset_id,
                    &field.field_key,
                    &field.label,
                    field.is_enabled,
                    field.order_index,
                )?;
            }
        }

        if let Some(settings) = &document.settings {
            write_settings(&tx, &usable_settings(settings))?;
        }

        tx.commit()?;

        info!(
            categories = document.categories.len(),
            customers = document.customers.len(),
            presets = document.presets.len(),
            settings = document.settings.is_some(),
            "Restored backup"
        );
        Ok(())
    }
}
