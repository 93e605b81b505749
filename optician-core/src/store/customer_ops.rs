//! Customer record operations for ShopStore

use super::ShopStore;
use crate::dates;
use crate::models::{
    merge_patch, millis_to_datetime, now_millis, Customer, CustomerDetails, CustomerFilter,
    LensPowers,
};
use crate::{Result, ShopError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};

/// Highest age accepted on a customer record
const MAX_AGE: i64 = 150;

/// Columns holding `CustomerDetails`, in bind order
fn detail_columns() -> Vec<&'static str> {
    let mut columns = vec!["date", "name", "age", "address", "mobile"];
    columns.extend(LensPowers::COLUMNS);
    columns.extend(["notes", "prescription_photo_path"]);
    columns
}

fn select_sql() -> String {
    format!(
        "SELECT id, {}, created_at FROM customers",
        detail_columns().join(", ")
    )
}

impl ShopStore {
    /// Customers matching `filter`, newest visit first
    pub fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let from = parse_bound("from", filter.from.as_deref())?;
        let to = parse_bound("to", filter.to.as_deref())?;
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut sql = select_sql();
        let mut conditions = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(search) = search {
            values.push(format!("%{}%", escape_like(&search.to_ascii_lowercase())));
            let n = values.len();
            conditions.push(format!(
                "(lower(name) LIKE ?{n} ESCAPE '\\'
                  OR lower(ifnull(mobile, '')) LIKE ?{n} ESCAPE '\\'
                  OR lower(ifnull(address, '')) LIKE ?{n} ESCAPE '\\')"
            ));
        }
        if let Some(from) = from {
            values.push(dates::format_date(from));
            conditions.push(format!("date >= ?{}", values.len()));
        }
        if let Some(to) = to {
            values.push(dates::format_date(to));
            conditions.push(format!("date <= ?{}", values.len()));
        }

        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY date DESC, created_at DESC, id DESC");

        let db = self.lock()?;
        let mut stmt = db.conn().prepare(&sql)?;
        let customers = stmt
            .query_map(params_from_iter(values.iter()), customer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(count = customers.len(), "Listed customers");
        Ok(customers)
    }

    pub fn get_customer(&self, id: i64) -> Result<Option<Customer>> {
        let db = self.lock()?;
        get_customer(db.conn(), id)
    }

    pub fn create_customer(&self, mut details: CustomerDetails) -> Result<Customer> {
        validate_customer(&mut details)?;

        let db = self.lock()?;
        let created_at = now_millis();
        let id = insert_customer_row(db.conn(), None, &details, created_at)?;
        info!(customer_id = id, "Created customer");

        Ok(Customer {
            id,
            details,
            created_at,
        })
    }

    /// Merge `patch` into the stored record and re-validate the result
    pub fn update_customer(&self, id: i64, patch: serde_json::Value) -> Result<Customer> {
        let db = self.lock()?;
        let current = get_customer(db.conn(), id)?
            .ok_or_else(|| ShopError::NotFound(format!("Customer {}", id)))?;

        let mut details = merge_patch(&current.details, patch)?;
        validate_customer(&mut details)?;

        let columns = detail_columns();
        let assignments: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!(
            "UPDATE customers SET {} WHERE id = ?{}",
            assignments.join(", "),
            columns.len() + 1
        );

        let date = dates::format_date(details.date);
        let mut values = detail_values(&details, &date);
        values.push(&id);
        db.conn().execute(&sql, params_from_iter(values))?;
        info!(customer_id = id, "Updated customer");

        Ok(Customer {
            id,
            details,
            created_at: current.created_at,
        })
    }

    /// Returns whether a row was removed
    pub fn delete_customer(&self, id: i64) -> Result<bool> {
        let db = self.lock()?;
        let removed = db
            .conn()
            .execute("DELETE FROM customers WHERE id = ?1", [id])?;
        info!(customer_id = id, removed, "Deleted customer");
        Ok(removed > 0)
    }

    /// Delete every listed customer in one transaction
    pub fn delete_customers(&self, ids: &[i64]) -> Result<usize> {
        let mut db = self.lock()?;
        let tx = db.conn_mut().transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM customers WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;

        info!(requested = ids.len(), removed, "Bulk deleted customers");
        Ok(removed)
    }
}

pub(crate) fn load_customers(conn: &Connection) -> Result<Vec<Customer>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", select_sql()))?;
    let customers = stmt
        .query_map([], customer_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(customers)
}

fn get_customer(conn: &Connection, id: i64) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            &format!("{} WHERE id = ?1", select_sql()),
            [id],
            customer_from_row,
        )
        .optional()?;
    Ok(customer)
}

/// Insert a customer row, keeping `id` when given
pub(crate) fn insert_customer_row(
    conn: &Connection,
    id: Option<i64>,
    details: &CustomerDetails,
    created_at: DateTime<Utc>,
) -> rusqlite::Result<i64> {
    let columns = detail_columns();
    let placeholders: Vec<String> = (1..=columns.len() + 2).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO customers (id, {}, created_at) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    let date = dates::format_date(details.date);
    let created_at = created_at.timestamp_millis();
    let mut values: Vec<&dyn ToSql> = vec![&id];
    values.extend(detail_values(details, &date));
    values.push(&created_at);

    conn.execute(&sql, params_from_iter(values))?;
    Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
}

/// Bind values matching `detail_columns()`
fn detail_values<'a>(details: &'a CustomerDetails, date: &'a String) -> Vec<&'a dyn ToSql> {
    let mut values: Vec<&dyn ToSql> = vec![
        date,
        &details.name,
        &details.age,
        &details.address,
        &details.mobile,
    ];
    values.extend(details.powers.values().into_iter().map(|v| v as &dyn ToSql));
    values.push(&details.notes);
    values.push(&details.prescription_photo_path);
    values
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    let raw_date: String = row.get(1)?;
    let date = dates::parse_date(&raw_date).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("invalid customer date '{}'", raw_date).into(),
        )
    })?;

    let powers_offset = 6;
    let after_powers = powers_offset + LensPowers::COLUMNS.len();

    Ok(Customer {
        id: row.get(0)?,
        details: CustomerDetails {
            date,
            name: row.get(2)?,
            age: row.get(3)?,
            address: row.get(4)?,
            mobile: row.get(5)?,
            powers: LensPowers::from_row(row, powers_offset)?,
            notes: row.get(after_powers)?,
            prescription_photo_path: row.get(after_powers + 1)?,
        },
        created_at: millis_to_datetime(row.get(after_powers + 2)?),
    })
}

/// Check a customer record before it is written, trimming the name and
/// mobile number
pub(crate) fn validate_customer(details: &mut CustomerDetails) -> Result<()> {
    details.name = details.name.trim().to_string();
    if details.name.is_empty() {
        return Err(ShopError::InvalidInput("Name is required".to_string()));
    }

    details.mobile = details
        .mobile
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    if let Some(mobile) = details.mobile.as_deref() {
        if mobile.len() != 10 || !mobile.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ShopError::InvalidInput(
                "Mobile number must be exactly 10 digits".to_string(),
            ));
        }
    }

    if let Some(age) = details.age {
        if !(0..=MAX_AGE).contains(&age) {
            return Err(ShopError::InvalidInput(format!(
                "Age must be between 0 and {}",
                MAX_AGE
            )));
        }
    }

    Ok(())
}

fn parse_bound(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => dates::parse_date(raw)
            .map(Some)
            .ok_or_else(|| ShopError::InvalidInput(format!("Invalid '{}' date: {}", name, raw))),
    }
}

/// Escape LIKE wildcards so user input only matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(name: &str) -> CustomerDetails {
        CustomerDetails::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), name)
    }

    #[test]
    fn test_validate_trims_name() {
        let mut customer = details("  Meena  ");
        validate_customer(&mut customer).unwrap();
        assert_eq!(customer.name, "Meena");

        let mut blank = details("   ");
        assert!(validate_customer(&mut blank).is_err());
    }

    #[test]
    fn test_validate_mobile() {
        let mut customer = details("Meena");
        customer.mobile = Some("9876543210".to_string());
        assert!(validate_customer(&mut customer).is_ok());

        customer.mobile = Some(String::new());
        assert!(validate_customer(&mut customer).is_ok());

        customer.mobile = Some("98765".to_string());
        assert!(validate_customer(&mut customer).is_err());

        customer.mobile = Some("98765abcde".to_string());
        assert!(validate_customer(&mut customer).is_err());
    }

    #[test]
    fn test_validate_normalizes_mobile() {
        let mut customer = details("Meena");
        customer.mobile = Some(" 9876543210 ".to_string());
        validate_customer(&mut customer).unwrap();
        assert_eq!(customer.mobile.as_deref(), Some("9876543210"));

        customer.mobile = Some("   ".to_string());
        validate_customer(&mut customer).unwrap();
        assert_eq!(customer.mobile, None);
    }

    #[test]
    fn test_validate_age() {
        let mut customer = details("Meena");
        customer.age = Some(151);
        assert!(validate_customer(&mut customer).is_err());
        customer.age = Some(-1);
        assert!(validate_customer(&mut customer).is_err());
        customer.age = Some(0);
        assert!(validate_customer(&mut customer).is_ok());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound("from", None).unwrap(), None);
        assert_eq!(parse_bound("from", Some("  ")).unwrap(), None);
        assert_eq!(
            parse_bound("from", Some("01/03/2024")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert!(parse_bound("to", Some("soon")).is_err());
    }
}
