//! Form preset operations for ShopStore

use super::ShopStore;
use crate::models::{FieldUpdate, FormPreset, FormPresetField, PresetWithFields};
use crate::{Result, ShopError};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::info;

/// Fields every new preset starts with, as (field key, label)
pub const DEFAULT_PRESET_FIELDS: [(&str, &str); 8] = [
    ("name", "Full Name"),
    ("age", "Age"),
    ("address", "Address"),
    ("mobile", "Mobile Number"),
    ("lensPowerCurrent", "Current Lens Power"),
    ("lensPowerPrevious", "Previous Lens Power"),
    ("notes", "Notes"),
    ("photo", "Prescription Photo"),
];

impl ShopStore {
    pub fn list_presets(&self) -> Result<Vec<PresetWithFields>> {
        let db = self.lock()?;
        load_presets(db.conn())
    }

    pub fn get_preset(&self, id: i64) -> Result<Option<PresetWithFields>> {
        let db = self.lock()?;
        get_preset(db.conn(), id)
    }

    /// The preset currently driving the customer form, if any
    pub fn active_preset(&self) -> Result<Option<PresetWithFields>> {
        let db = self.lock()?;
        let id: Option<i64> = db
            .conn()
            .query_row(
                "SELECT id FROM form_presets WHERE is_active = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match id {
            Some(id) => get_preset(db.conn(), id),
            None => Ok(None),
        }
    }

    /// Create an inactive preset populated with the default fields
    pub fn create_preset(&self, name: &str) -> Result<PresetWithFields> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShopError::InvalidInput("Preset name is required".to_string()));
        }

        let mut db = self.lock()?;
        let tx = db.conn_mut().transaction()?;

        let taken: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM form_presets WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        if taken {
            return Err(ShopError::Conflict(format!(
                "A preset named '{}' already exists",
                name
            )));
        }

        let preset_id = insert_preset_row(&tx, None, name, false)?;
        for (index, (field_key, label)) in DEFAULT_PRESET_FIELDS.iter().enumerate() {
            insert_field_row(&tx, None, preset_id, field_key, label, true, index as i64)?;
        }
        tx.commit()?;

        info!(preset_id, name, "Created form preset");
        get_preset(db.conn(), preset_id)?
            .ok_or_else(|| ShopError::NotFound(format!("Preset {}", preset_id)))
    }

    /// Apply visibility and ordering changes to a preset's fields
    ///
    /// All updates commit together. A field id that does not belong to the
    /// preset aborts the whole batch.
    pub fn update_preset_fields(
        &self,
        preset_id: i64,
        updates: &[FieldUpdate],
    ) -> Result<PresetWithFields> {
        let mut db = self.lock()?;
        let tx = db.conn_mut().transaction()?;

        if !preset_exists(&tx, preset_id)? {
            return Err(ShopError::NotFound(format!("Preset {}", preset_id)));
        }

        {
            let mut stmt = tx.prepare(
                "UPDATE form_preset_fields SET is_enabled = ?1, order_index = ?2
                 WHERE id = ?3 AND preset_id = ?4",
            )?;
            for update in updates {
                let changed = stmt.execute((
                    update.is_enabled,
                    update.order_index,
                    update.id,
                    preset_id,
                ))?;
                if changed == 0 {
                    return Err(ShopError::NotFound(format!(
                        "Field {} in preset {}",
                        update.id, preset_id
                    )));
                }
            }
        }
        tx.commit()?;

        info!(preset_id, fields = updates.len(), "Updated preset fields");
        get_preset(db.conn(), preset_id)?
            .ok_or_else(|| ShopError::NotFound(format!("Preset {}", preset_id)))
    }

    /// Make `id` the only active preset
    pub fn activate_preset(&self, id: i64) -> Result<PresetWithFields> {
        let mut db = self.lock()?;
        let tx = db.conn_mut().transaction()?;

        if !preset_exists(&tx, id)? {
            return Err(ShopError::NotFound(format!("Preset {}", id)));
        }
        tx.execute(
            "UPDATE form_presets SET is_active = 0 WHERE is_active = 1 AND id != ?1",
            [id],
        )?;
        tx.execute("UPDATE form_presets SET is_active = 1 WHERE id = ?1", [id])?;
        tx.commit()?;

        info!(preset_id = id, "Activated form preset");
        get_preset(db.conn(), id)?.ok_or_else(|| ShopError::NotFound(format!("Preset {}", id)))
    }
}

fn preset_exists(conn: &Connection, id: i64) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM form_presets WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Every preset with its fields, presets by id and fields by order_index
pub(crate) fn load_presets(conn: &Connection) -> Result<Vec<PresetWithFields>> {
    let mut stmt = conn.prepare("SELECT id, name, is_active FROM form_presets ORDER BY id")?;
    let presets = stmt
        .query_map([], preset_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, preset_id, field_key, label, is_enabled, order_index
         FROM form_preset_fields ORDER BY preset_id, order_index, id",
    )?;
    let mut fields_by_preset: HashMap<i64, Vec<FormPresetField>> = HashMap::new();
    for field in stmt.query_map([], field_from_row)? {
        let field = field?;
        fields_by_preset.entry(field.preset_id).or_default().push(field);
    }

    Ok(presets
        .into_iter()
        .map(|preset| PresetWithFields {
            fields: fields_by_preset.remove(&preset.id).unwrap_or_default(),
            preset,
        })
        .collect())
}

fn get_preset(conn: &Connection, id: i64) -> Result<Option<PresetWithFields>> {
    let preset = conn
        .query_row(
            "SELECT id, name, is_active FROM form_presets WHERE id = ?1",
            [id],
            preset_from_row,
        )
        .optional()?;
    let Some(preset) = preset else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, preset_id, field_key, label, is_enabled, order_index
         FROM form_preset_fields WHERE preset_id = ?1 ORDER BY order_index, id",
    )?;
    let fields = stmt
        .query_map([id], field_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Some(PresetWithFields { preset, fields }))
}

/// Insert a preset row, keeping `id` when given
pub(crate) fn insert_preset_row(
    conn: &Connection,
    id: Option<i64>,
    name: &str,
    is_active: bool,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO form_presets (id, name, is_active) VALUES (?1, ?2, ?3)",
        (id, name, is_active),
    )?;
    Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
}

/// Insert a preset field row, keeping `id` when given
pub(crate) fn insert_field_row(
    conn: &Connection,
    id: Option<i64>,
    preset_id: i64,
    field_key: &str,
    label: &str,
    is_enabled: bool,
    order_index: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO form_preset_fields (id, preset_id, field_key, label, is_enabled, order_index)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (id, preset_id, field_key, label, is_enabled, order_index),
    )?;
    Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
}

fn preset_from_row(row: &Row<'_>) -> rusqlite::Result<FormPreset> {
    Ok(FormPreset {
        id: row.get(0)?,
        name: row.get(1)?,
        is_active: row.get(2)?,
    })
}

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<FormPresetField> {
    Ok(FormPresetField {
        id: row.get(0)?,
        preset_id: row.get(1)?,
        field_key: row.get(2)?,
        label: row.get(3)?,
        is_enabled: row.get(4)?,
        order_index: row.get(5)?,
    })
}
