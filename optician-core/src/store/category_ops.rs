//! Lens catalog operations for ShopStore

use super::ShopStore;
use crate::models::{merge_patch, now_millis, Category, CategoryInput, CategoryKind};
use crate::tree::CategoryTree;
use crate::{Result, ShopError};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

impl ShopStore {
    /// All categories ordered by (sort_order, name)
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let db = self.lock()?;
        let categories = load_categories(db.conn())?;
        debug!(count = categories.len(), "Listed categories");
        Ok(categories)
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let db = self.lock()?;
        get_category(db.conn(), id)
    }

    /// The catalog as an id-indexed arena, from one table scan
    pub fn category_tree(&self) -> Result<CategoryTree> {
        let db = self.lock()?;
        Ok(CategoryTree::build(load_categories(db.conn())?))
    }

    pub fn create_category(&self, mut input: CategoryInput) -> Result<Category> {
        let db = self.lock()?;
        validate_category(db.conn(), None, &mut input)?;

        let updated_at = now_millis();
        let id = insert_category_row(db.conn(), None, &input, updated_at)?;
        info!(category_id = id, kind = %input.kind, "Created category");

        Ok(category_from_input(id, input, updated_at))
    }

    /// Apply a partial update
    ///
    /// Keys absent from `patch` keep their current value; an explicit
    /// `null` clears an optional field.
    pub fn update_category(&self, id: i64, patch: serde_json::Value) -> Result<Category> {
        let db = self.lock()?;
        let current = get_category(db.conn(), id)?
            .ok_or_else(|| ShopError::NotFound(format!("Category {}", id)))?;

        let mut input = merge_patch(&current.input(), patch)?;
        validate_category(db.conn(), Some(id), &mut input)?;

        let updated_at = now_millis();
        db.conn().execute(
            "UPDATE categories SET
                parent_id = ?1, name = ?2, kind = ?3, customer_price = ?4,
                wholesale_price = ?5, sort_order = ?6, updated_at = ?7
             WHERE id = ?8",
            (
                input.parent_id,
                &input.name,
                input.kind.as_str(),
                input.customer_price,
                input.wholesale_price,
                input.sort_order,
                updated_at.timestamp_millis(),
                id,
            ),
        )?;
        info!(category_id = id, "Updated category");

        Ok(category_from_input(id, input, updated_at))
    }

    /// Delete a category and everything below it
    ///
    /// Returns the number of rows removed; zero when `id` does not exist
    /// and nothing points at it.
    pub fn delete_category(&self, id: i64) -> Result<usize> {
        let mut db = self.lock()?;
        let tree = CategoryTree::build(load_categories(db.conn())?);
        let doomed = tree.subtree_ids(id);

        let tx = db.conn_mut().transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM categories WHERE id = ?1")?;
            for category_id in &doomed {
                removed += stmt.execute([category_id])?;
            }
        }
        tx.commit()?;

        info!(category_id = id, removed, "Deleted category subtree");
        Ok(removed)
    }
}

pub(crate) fn load_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories ORDER BY sort_order, name, id",
        Category::COLUMNS
    ))?;
    let categories = stmt
        .query_map([], Category::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(categories)
}

fn get_category(conn: &Connection, id: i64) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!("SELECT {} FROM categories WHERE id = ?1", Category::COLUMNS),
            [id],
            Category::from_row,
        )
        .optional()?;
    Ok(category)
}

/// Insert a category row, keeping `id` when given
pub(crate) fn insert_category_row(
    conn: &Connection,
    id: Option<i64>,
    input: &CategoryInput,
    updated_at: DateTime<Utc>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO categories (
            id, parent_id, name, kind, customer_price, wholesale_price, sort_order, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        (
            id,
            input.parent_id,
            &input.name,
            input.kind.as_str(),
            input.customer_price,
            input.wholesale_price,
            input.sort_order,
            updated_at.timestamp_millis(),
        ),
    )?;
    Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
}

fn category_from_input(id: i64, input: CategoryInput, updated_at: DateTime<Utc>) -> Category {
    Category {
        id,
        parent_id: input.parent_id,
        name: input.name,
        kind: input.kind,
        customer_price: input.customer_price,
        wholesale_price: input.wholesale_price,
        sort_order: input.sort_order,
        updated_at,
    }
}

/// Normalise and check a category before it is written
///
/// `id` is the row being updated, or `None` on create.
fn validate_category(conn: &Connection, id: Option<i64>, input: &mut CategoryInput) -> Result<()> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(ShopError::InvalidInput("Name is required".to_string()));
    }

    match input.kind {
        // Only items are priced
        CategoryKind::Folder => {
            input.customer_price = None;
            input.wholesale_price = None;
        }
        CategoryKind::Item => {
            check_price("customerPrice", input.customer_price)?;
            check_price("wholesalePrice", input.wholesale_price)?;
        }
    }

    if let Some(parent_id) = input.parent_id {
        if Some(parent_id) == id {
            return Err(ShopError::InvalidInput(
                "A category cannot be its own parent".to_string(),
            ));
        }

        let parent_kind: Option<String> = conn
            .query_row(
                "SELECT kind FROM categories WHERE id = ?1",
                [parent_id],
                |row| row.get(0),
            )
            .optional()?;
        match parent_kind.as_deref() {
            None => {
                return Err(ShopError::InvalidInput(format!(
                    "Parent category {} does not exist",
                    parent_id
                )))
            }
            Some("FOLDER") => {}
            Some(_) => {
                return Err(ShopError::InvalidInput(
                    "Parent must be a folder".to_string(),
                ))
            }
        }
    }

    if let Some(id) = id {
        let has_moving_parent = input.parent_id.is_some();
        let is_item = input.kind == CategoryKind::Item;
        if has_moving_parent || is_item {
            let tree = CategoryTree::build(load_categories(conn)?);
            if let Some(parent_id) = input.parent_id {
                if tree.contains_in_subtree(id, parent_id) {
                    return Err(ShopError::InvalidInput(
                        "A category cannot be moved below one of its descendants".to_string(),
                    ));
                }
            }
            if is_item && !tree.children_of(id).is_empty() {
                return Err(ShopError::InvalidInput(
                    "A category with children must stay a folder".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn check_price(field: &str, price: Option<f64>) -> Result<()> {
    match price {
        Some(value) if !value.is_finite() || value < 0.0 => Err(ShopError::InvalidInput(
            format!("{} must be a non-negative number", field),
        )),
        _ => Ok(()),
    }
}
