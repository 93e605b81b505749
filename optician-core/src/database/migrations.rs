//! Database migrations for schema versioning.

use crate::database::{DatabaseError, CURRENT_SCHEMA_VERSION};
use crate::dates::{format_date, parse_date};
use crate::models::millis_to_datetime;
use crate::Result;
use rusqlite::Connection;
use tracing::{info, warn};

/// Run every migration between `from_version` and the current version
pub fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut version = from_version;

    while version < CURRENT_SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            other => {
                return Err(DatabaseError::SchemaMismatch {
                    expected: CURRENT_SCHEMA_VERSION,
                    found: other,
                }
                .into())
            }
        }
        version += 1;

        conn.execute(
            "UPDATE db_metadata SET version = ?1 WHERE id = 1",
            [version],
        )
        .map_err(DatabaseError::Sqlite)?;
        info!("Migrated database schema to version {}", version);
    }

    Ok(())
}

/// v1 stored customer dates as typed by the client, often `dd/mm/yyyy`.
/// Rewrite every date to ISO-8601; unreadable ones take the record's
/// creation day.
fn migrate_v1_to_v2(conn: &Connection) -> Result<()> {
    let rows: Vec<(i64, String, i64)> = conn
        .prepare("SELECT id, date, created_at FROM customers")
        .map_err(DatabaseError::Sqlite)?
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .map_err(DatabaseError::Sqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(DatabaseError::Sqlite)?;

    let tx = conn.unchecked_transaction().map_err(DatabaseError::Sqlite)?;
    let mut rewritten = 0usize;

    for (id, raw, created_at) in rows {
        let date = match parse_date(&raw) {
            Some(date) => date,
            None => {
                let fallback = millis_to_datetime(created_at).date_naive();
                warn!(
                    "Customer {} has an unreadable date '{}', using creation day {}",
                    id, raw, fallback
                );
                fallback
            }
        };

        let iso = format_date(date);
        if iso != raw {
            tx.execute("UPDATE customers SET date = ?1 WHERE id = ?2", (&iso, id))
                .map_err(DatabaseError::Sqlite)?;
            rewritten += 1;
        }
    }

    tx.commit().map_err(DatabaseError::Sqlite)?;
    info!("Normalized {} customer dates to ISO-8601", rewritten);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::database::{Database, CURRENT_SCHEMA_VERSION};
    use crate::models::CustomerFilter;
    use crate::{HashParams, ShopStore};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn test_v1_dates_are_normalized() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();

        let conn = db.conn();
        conn.execute("UPDATE db_metadata SET version = 1 WHERE id = 1", [])
            .unwrap();
        for (date, name) in [("05/02/2024", "Asha"), ("2024-03-01", "Ravi"), ("soon", "Kiran")] {
            conn.execute(
                "INSERT INTO customers (date, name, created_at) VALUES (?1, ?2, 0)",
                (date, name),
            )
            .unwrap();
        }

        db.validate_schema_version().unwrap();
        assert_eq!(db.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);

        let dates: Vec<String> = conn
            .prepare("SELECT date FROM customers ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(dates, vec!["2024-02-05", "2024-03-01", "1970-01-01"]);
    }

    #[test]
    fn test_unreadable_v1_date_stays_listable() {
        let store = ShopStore::in_memory(HashParams::new(1024, 1, 1)).unwrap();
        let created = Utc.with_ymd_and_hms(2023, 11, 20, 10, 30, 0).unwrap();
        {
            let db = store.lock().unwrap();
            let conn = db.conn();
            conn.execute("UPDATE db_metadata SET version = 1 WHERE id = 1", [])
                .unwrap();
            conn.execute(
                "INSERT INTO customers (date, name, created_at) VALUES ('soon', 'Kiran', ?1)",
                [created.timestamp_millis()],
            )
            .unwrap();
            db.validate_schema_version().unwrap();
        }

        let customers = store.list_customers(&CustomerFilter::default()).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(
            customers[0].details.date,
            NaiveDate::from_ymd_opt(2023, 11, 20).unwrap()
        );
        assert_eq!(store.export_backup().unwrap().customers.len(), 1);
    }
}
