//! Domain models shared by the store, the backup format and the HTTP API.
//!
//! Field names are serialized in camelCase, which is what the browser
//! client and existing backup files use.

use crate::{Result, ShopError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Node kind in the category tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategoryKind {
    Folder,
    Item,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "FOLDER",
            Self::Item => "ITEM",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKind {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FOLDER" => Ok(Self::Folder),
            "ITEM" => Ok(Self::Item),
            other => Err(ShopError::InvalidInput(format!(
                "Unknown category type: {}",
                other
            ))),
        }
    }
}

/// A folder or priced item in the lens catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub customer_price: Option<f64>,
    pub wholesale_price: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_order: i64,
    #[serde(default = "now_millis", deserialize_with = "timestamp_or_now")]
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub(crate) const COLUMNS: &'static str =
        "id, parent_id, name, kind, customer_price, wholesale_price, sort_order, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind: String = row.get(3)?;
        let kind = kind.parse().map_err(|e: ShopError| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            name: row.get(2)?,
            kind,
            customer_price: row.get(4)?,
            wholesale_price: row.get(5)?,
            sort_order: row.get(6)?,
            updated_at: millis_to_datetime(row.get(7)?),
        })
    }

    /// The editable part of this category
    pub fn input(&self) -> CategoryInput {
        CategoryInput {
            parent_id: self.parent_id,
            name: self.name.clone(),
            kind: self.kind,
            customer_price: self.customer_price,
            wholesale_price: self.wholesale_price,
            sort_order: self.sort_order,
        }
    }
}

/// Body of a category create request, and the merge target for updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    #[serde(default)]
    pub customer_price: Option<f64>,
    #[serde(default)]
    pub wholesale_price: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sort_order: i64,
}

impl CategoryInput {
    pub fn folder(name: &str, parent_id: Option<i64>) -> Self {
        Self {
            parent_id,
            name: name.to_string(),
            kind: CategoryKind::Folder,
            customer_price: None,
            wholesale_price: None,
            sort_order: 0,
        }
    }

    pub fn item(name: &str, parent_id: i64, customer_price: f64, wholesale_price: f64) -> Self {
        Self {
            parent_id: Some(parent_id),
            name: name.to_string(),
            kind: CategoryKind::Item,
            customer_price: Some(customer_price),
            wholesale_price: Some(wholesale_price),
            sort_order: 0,
        }
    }
}

/// Spectacle powers for both eyes, current ("new") and previous ("old")
///
/// Values are kept as free text because opticians write them in many
/// notations ("-1.25", "+0.50 DS", "PL").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LensPowers {
    pub new_power_right_sph: Option<String>,
    pub new_power_right_cyl: Option<String>,
    pub new_power_right_axis: Option<String>,
    pub new_power_right_add: Option<String>,
    pub new_power_left_sph: Option<String>,
    pub new_power_left_cyl: Option<String>,
    pub new_power_left_axis: Option<String>,
    pub new_power_left_add: Option<String>,
    pub old_power_right_sph: Option<String>,
    pub old_power_right_cyl: Option<String>,
    pub old_power_right_axis: Option<String>,
    pub old_power_right_add: Option<String>,
    pub old_power_left_sph: Option<String>,
    pub old_power_left_cyl: Option<String>,
    pub old_power_left_axis: Option<String>,
    pub old_power_left_add: Option<String>,
}

impl LensPowers {
    pub(crate) const COLUMNS: [&'static str; 16] = [
        "new_power_right_sph",
        "new_power_right_cyl",
        "new_power_right_axis",
        "new_power_right_add",
        "new_power_left_sph",
        "new_power_left_cyl",
        "new_power_left_axis",
        "new_power_left_add",
        "old_power_right_sph",
        "old_power_right_cyl",
        "old_power_right_axis",
        "old_power_right_add",
        "old_power_left_sph",
        "old_power_left_cyl",
        "old_power_left_axis",
        "old_power_left_add",
    ];

    /// Values in `COLUMNS` order
    pub(crate) fn values(&self) -> [&Option<String>; 16] {
        [
            &self.new_power_right_sph,
            &self.new_power_right_cyl,
            &self.new_power_right_axis,
            &self.new_power_right_add,
            &self.new_power_left_sph,
            &self.new_power_left_cyl,
            &self.new_power_left_axis,
            &self.new_power_left_add,
            &self.old_power_right_sph,
            &self.old_power_right_cyl,
            &self.old_power_right_axis,
            &self.old_power_right_add,
            &self.old_power_left_sph,
            &self.old_power_left_cyl,
            &self.old_power_left_axis,
            &self.old_power_left_add,
        ]
    }

    /// Read the 16 power columns starting at `offset`
    pub(crate) fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            new_power_right_sph: row.get(offset)?,
            new_power_right_cyl: row.get(offset + 1)?,
            new_power_right_axis: row.get(offset + 2)?,
            new_power_right_add: row.get(offset + 3)?,
            new_power_left_sph: row.get(offset + 4)?,
            new_power_left_cyl: row.get(offset + 5)?,
            new_power_left_axis: row.get(offset + 6)?,
            new_power_left_add: row.get(offset + 7)?,
            old_power_right_sph: row.get(offset + 8)?,
            old_power_right_cyl: row.get(offset + 9)?,
            old_power_right_axis: row.get(offset + 10)?,
            old_power_right_add: row.get(offset + 11)?,
            old_power_left_sph: row.get(offset + 12)?,
            old_power_left_cyl: row.get(offset + 13)?,
            old_power_left_axis: row.get(offset + 14)?,
            old_power_left_add: row.get(offset + 15)?,
        })
    }
}

/// Everything about a customer that the shop enters by hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    #[serde(deserialize_with = "crate::dates::deserialize")]
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(flatten)]
    pub powers: LensPowers,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub prescription_photo_path: Option<String>,
}

impl CustomerDetails {
    pub fn new(date: NaiveDate, name: &str) -> Self {
        Self {
            date,
            name: name.to_string(),
            age: None,
            address: None,
            mobile: None,
            powers: LensPowers::default(),
            notes: None,
            prescription_photo_path: None,
        }
    }
}

/// A stored customer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    #[serde(flatten)]
    pub details: CustomerDetails,
    #[serde(default = "now_millis", deserialize_with = "timestamp_or_now")]
    pub created_at: DateTime<Utc>,
}

/// Query parameters for the customer list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    pub search: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// A named set of customer-form fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPreset {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
}

/// One toggleable field within a preset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormPresetField {
    pub id: i64,
    pub preset_id: i64,
    pub field_key: String,
    pub label: String,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_enabled: bool,
    pub order_index: i64,
}

/// A preset with its fields ordered by `order_index`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetWithFields {
    #[serde(flatten)]
    pub preset: FormPreset,
    #[serde(default)]
    pub fields: Vec<FormPresetField>,
}

/// One entry of a bulk field update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdate {
    pub id: i64,
    pub is_enabled: bool,
    pub order_index: i64,
}

/// The singleton settings row
///
/// An empty `wholesale_password_hash` means no password is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub wholesale_password_hash: String,
    #[serde(default)]
    pub master_password_hash: Option<String>,
    #[serde(default)]
    pub master_reset_used: bool,
    #[serde(default = "now_millis", deserialize_with = "timestamp_or_now")]
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    pub fn has_password(&self) -> bool {
        !self.wholesale_password_hash.is_empty()
    }

    pub fn has_master_password(&self) -> bool {
        self.master_password_hash
            .as_deref()
            .is_some_and(|h| !h.is_empty())
    }

    pub fn status(&self) -> SettingsStatus {
        SettingsStatus {
            has_password: self.has_password(),
            has_master_password: self.has_master_password(),
        }
    }
}

/// What the client is allowed to know about the settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsStatus {
    pub has_password: bool,
    pub has_master_password: bool,
}

/// Apply a JSON merge patch to a model
///
/// Keys present in `patch` replace the current values (an explicit `null`
/// clears an optional field); absent keys are left untouched. The merged
/// value is deserialized again, so type errors surface as `InvalidInput`.
pub fn merge_patch<T>(current: &T, patch: serde_json::Value) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let serde_json::Value::Object(patch) = patch else {
        return Err(ShopError::InvalidInput(
            "Expected a JSON object".to_string(),
        ));
    };

    let mut merged = serde_json::to_value(current)
        .map_err(|e| ShopError::InvalidInput(format!("Failed to encode record: {}", e)))?;
    if let serde_json::Value::Object(target) = &mut merged {
        for (key, value) in patch {
            target.insert(key, value);
        }
    }

    serde_json::from_value(merged).map_err(|e| ShopError::InvalidInput(e.to_string()))
}

pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Current time truncated to the millisecond precision used in storage
pub(crate) fn now_millis() -> DateTime<Utc> {
    millis_to_datetime(Utc::now().timestamp_millis())
}

fn default_true() -> bool {
    true
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_true<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn timestamp_or_now<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.unwrap_or_else(now_millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_wire_format() {
        let category: Category = serde_json::from_value(json!({
            "id": 2,
            "parentId": 1,
            "name": "Item 1",
            "type": "ITEM",
            "customerPrice": 650,
            "wholesalePrice": 520,
            "sortOrder": null,
            "updatedAt": "2024-05-01T10:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(category.kind, CategoryKind::Item);
        assert_eq!(category.parent_id, Some(1));
        assert_eq!(category.customer_price, Some(650.0));
        assert_eq!(category.sort_order, 0);

        let value = serde_json::to_value(&category).unwrap();
        assert_eq!(value["type"], "ITEM");
        assert_eq!(value["wholesalePrice"], 520.0);
    }

    #[test]
    fn test_category_kind_parse() {
        assert_eq!("FOLDER".parse::<CategoryKind>().unwrap(), CategoryKind::Folder);
        assert!("folder".parse::<CategoryKind>().is_err());
    }

    #[test]
    fn test_customer_flattened_powers() {
        let customer: Customer = serde_json::from_value(json!({
            "id": 7,
            "date": "05/02/2024",
            "name": "Asha",
            "age": 41,
            "mobile": "9876543210",
            "newPowerRightSph": "-1.25",
            "oldPowerLeftAdd": "+2.00",
            "createdAt": "2024-02-05T08:30:00Z"
        }))
        .unwrap();

        assert_eq!(customer.details.date, NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
        assert_eq!(customer.details.powers.new_power_right_sph.as_deref(), Some("-1.25"));
        assert_eq!(customer.details.powers.old_power_left_add.as_deref(), Some("+2.00"));
        assert_eq!(customer.details.address, None);

        let value = serde_json::to_value(&customer).unwrap();
        assert_eq!(value["date"], "2024-02-05");
        assert_eq!(value["newPowerRightSph"], "-1.25");
        assert!(value.get("powers").is_none());
    }

    #[test]
    fn test_merge_patch() {
        let mut current =
            CustomerDetails::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), "Ravi");
        current.address = Some("Main Road".to_string());

        let merged = merge_patch(
            &current,
            json!({ "age": 30, "address": null, "newPowerLeftSph": "-0.75" }),
        )
        .unwrap();

        assert_eq!(merged.name, "Ravi");
        assert_eq!(merged.age, Some(30));
        assert_eq!(merged.address, None);
        assert_eq!(merged.powers.new_power_left_sph.as_deref(), Some("-0.75"));
    }

    #[test]
    fn test_merge_patch_rejects_bad_types() {
        let current = CategoryInput::folder("Lenses", None);
        assert!(merge_patch(&current, json!({ "name": null })).is_err());
        assert!(merge_patch(&current, json!({ "type": "BOX" })).is_err());
        assert!(merge_patch(&current, json!([1, 2])).is_err());
    }

    #[test]
    fn test_preset_with_fields_wire_format() {
        let preset: PresetWithFields = serde_json::from_value(json!({
            "id": 1,
            "name": "Default Preset",
            "isActive": true,
            "fields": [
                { "id": 3, "presetId": 1, "fieldKey": "age", "label": "Age", "isEnabled": null, "orderIndex": 1 }
            ]
        }))
        .unwrap();

        assert!(preset.preset.is_active);
        assert!(preset.fields[0].is_enabled);

        let value = serde_json::to_value(&preset).unwrap();
        assert_eq!(value["name"], "Default Preset");
        assert_eq!(value["fields"][0]["fieldKey"], "age");
    }

    #[test]
    fn test_settings_status() {
        let settings = Settings {
            wholesale_password_hash: String::new(),
            master_password_hash: Some(String::new()),
            master_reset_used: false,
            updated_at: Utc::now(),
        };
        assert_eq!(settings.status(), SettingsStatus::default());
    }
}
