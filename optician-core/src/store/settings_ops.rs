//! Wholesale and master password operations for ShopStore
//!
//! Hashes are read under the database lock; hashing and verification run
//! after it is released.

use super::ShopStore;
use crate::crypto::{hash_password, verify_password};
use crate::models::{millis_to_datetime, now_millis, Settings, SettingsStatus};
use crate::{Result, ShopError};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

/// Proof that a request may perform wholesale-only writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WholesaleAccess {
    /// The presented wholesale password matched
    Verified,
    /// No wholesale password is configured, so writes are open
    Unguarded,
}

impl ShopStore {
    /// The settings row, if one was ever written
    pub fn settings(&self) -> Result<Option<Settings>> {
        let db = self.lock()?;
        load_settings(db.conn())
    }

    pub fn settings_status(&self) -> Result<SettingsStatus> {
        Ok(self
            .settings()?
            .map(|settings| settings.status())
            .unwrap_or_default())
    }

    /// Check a presented wholesale password
    ///
    /// With no password configured every caller gets `Unguarded`.
    pub fn authorize_wholesale(&self, presented: Option<&str>) -> Result<WholesaleAccess> {
        let settings = self.settings()?.filter(Settings::has_password);
        let Some(settings) = settings else {
            return Ok(WholesaleAccess::Unguarded);
        };

        match presented {
            Some(password) if password_matches(password, &settings.wholesale_password_hash) => {
                Ok(WholesaleAccess::Verified)
            }
            _ => {
                warn!(presented = presented.is_some(), "Wholesale access denied");
                Err(ShopError::Forbidden("Wholesale access required".to_string()))
            }
        }
    }

    /// Set the first wholesale password
    pub fn setup_password(&self, password: &str) -> Result<()> {
        require_password(password, "Password is required")?;
        if self.settings()?.is_some_and(|s| s.has_password()) {
            return Err(ShopError::InvalidInput("Password already set".to_string()));
        }

        let hash = hash_password(password.as_bytes(), &self.hash_params)?;
        let db = self.lock()?;
        if !store_first_wholesale_hash(db.conn(), &hash)? {
            return Err(ShopError::InvalidInput("Password already set".to_string()));
        }

        info!("Wholesale password configured");
        Ok(())
    }

    /// Whether `password` is the wholesale password
    pub fn verify_wholesale_password(&self, password: &str) -> Result<bool> {
        let settings = self
            .settings()?
            .filter(Settings::has_password)
            .ok_or(ShopError::SetupRequired)?;

        Ok(password_matches(password, &settings.wholesale_password_hash))
    }

    pub fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let settings = self
            .settings()?
            .filter(Settings::has_password)
            .ok_or(ShopError::SetupRequired)?;
        require_password(new_password, "New password is required")?;

        if !password_matches(old_password, &settings.wholesale_password_hash) {
            warn!("Wholesale password change rejected");
            return Err(ShopError::Unauthorized(
                "Invalid current password".to_string(),
            ));
        }

        let hash = hash_password(new_password.as_bytes(), &self.hash_params)?;
        let db = self.lock()?;
        store_wholesale_hash(db.conn(), &hash)?;

        info!("Wholesale password changed");
        Ok(())
    }

    /// Clear the wholesale password
    ///
    /// When a master password exists it must be supplied and correct.
    pub fn reset_password(&self, master_password: Option<&str>) -> Result<()> {
        let settings = self
            .settings()?
            .ok_or_else(|| ShopError::InvalidInput("Nothing to reset".to_string()))?;

        let master_hash = settings
            .master_password_hash
            .as_deref()
            .filter(|h| !h.is_empty());
        if let Some(master_hash) = master_hash {
            let valid = master_password.is_some_and(|m| password_matches(m, master_hash));
            if !valid {
                warn!("Wholesale password reset rejected");
                return Err(ShopError::Unauthorized("Invalid master password".to_string()));
            }
        }

        let db = self.lock()?;
        db.conn().execute(
            "UPDATE settings SET wholesale_password_hash = '', updated_at = ?1 WHERE id = 1",
            [now_millis().timestamp_millis()],
        )?;

        info!("Wholesale password reset");
        Ok(())
    }

    /// Set or replace the master password
    ///
    /// Replacing requires `current_password`. Setting the first one requires
    /// wholesale access instead, checked against `wholesale_password`.
    pub fn set_master_password(
        &self,
        password: &str,
        current_password: Option<&str>,
        wholesale_password: Option<&str>,
    ) -> Result<()> {
        require_password(password, "Master password is required")?;

        let existing = self
            .settings()?
            .and_then(|s| s.master_password_hash)
            .filter(|h| !h.is_empty());
        match existing {
            Some(master_hash) => {
                let valid = current_password.is_some_and(|c| password_matches(c, &master_hash));
                if !valid {
                    warn!("Master password change rejected");
                    return Err(ShopError::Unauthorized(
                        "Invalid current master password".to_string(),
                    ));
                }
            }
            None => {
                self.authorize_wholesale(wholesale_password)?;
            }
        }

        let hash = hash_password(password.as_bytes(), &self.hash_params)?;
        let db = self.lock()?;
        db.conn().execute(
            "INSERT INTO settings (id, master_password_hash, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                master_password_hash = excluded.master_password_hash,
                updated_at = excluded.updated_at",
            (&hash, now_millis().timestamp_millis()),
        )?;

        info!("Master password set");
        Ok(())
    }

    /// Clear the master password; allowed once per installation
    pub fn reset_master_once(&self) -> Result<()> {
        let settings = self
            .settings()?
            .filter(Settings::has_master_password)
            .ok_or_else(|| {
                ShopError::InvalidInput("No master password configured".to_string())
            })?;
        if settings.master_reset_used {
            return Err(ShopError::Conflict(
                "Master password reset has already been used".to_string(),
            ));
        }

        let db = self.lock()?;
        db.conn().execute(
            "UPDATE settings SET master_password_hash = NULL, master_reset_used = 1, updated_at = ?1
             WHERE id = 1",
            [now_millis().timestamp_millis()],
        )?;

        info!("Master password cleared by one-time reset");
        Ok(())
    }
}

pub(crate) fn load_settings(conn: &Connection) -> Result<Option<Settings>> {
    let settings = conn
        .query_row(
            "SELECT wholesale_password_hash, master_password_hash, master_reset_used, updated_at
             FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(Settings {
                    wholesale_password_hash: row.get(0)?,
                    master_password_hash: row.get(1)?,
                    master_reset_used: row.get(2)?,
                    updated_at: millis_to_datetime(row.get(3)?),
                })
            },
        )
        .optional()?;
    Ok(settings)
}

/// Replace the settings row
pub(crate) fn write_settings(conn: &Connection, settings: &Settings) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (
            id, wholesale_password_hash, master_password_hash, master_reset_used, updated_at
        ) VALUES (1, ?1, ?2, ?3, ?4)",
        (
            &settings.wholesale_password_hash,
            &settings.master_password_hash,
            settings.master_reset_used,
            settings.updated_at.timestamp_millis(),
        ),
    )?;
    Ok(())
}

fn store_wholesale_hash(conn: &Connection, hash: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (id, wholesale_password_hash, updated_at) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET
            wholesale_password_hash = excluded.wholesale_password_hash,
            updated_at = excluded.updated_at",
        (hash, now_millis().timestamp_millis()),
    )?;
    Ok(())
}

/// Write `hash` only while no wholesale password is stored
///
/// Returns `false` when another writer configured one first.
fn store_first_wholesale_hash(conn: &Connection, hash: &str) -> Result<bool> {
    let changed = conn.execute(
        "INSERT INTO settings (id, wholesale_password_hash, updated_at) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET
            wholesale_password_hash = excluded.wholesale_password_hash,
            updated_at = excluded.updated_at
         WHERE settings.wholesale_password_hash IS NULL
            OR settings.wholesale_password_hash = ''",
        (hash, now_millis().timestamp_millis()),
    )?;
    Ok(changed > 0)
}

fn require_password(password: &str, message: &str) -> Result<()> {
    if password.is_empty() {
        return Err(ShopError::InvalidInput(message.to_string()));
    }
    Ok(())
}

/// Verify against a stored hash; an unreadable hash never matches
fn password_matches(password: &str, stored_hash: &str) -> bool {
    match verify_password(password.as_bytes(), stored_hash) {
        Ok(valid) => valid,
        Err(e) => {
            warn!(error = %e, "Stored password hash could not be verified");
            false
        }
    }
}
