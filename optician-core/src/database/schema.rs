//! Database schema and connection management.

use crate::database::{migrations, DatabaseError};
use crate::models::LensPowers;
use crate::{Result, ShopError};
use chrono::Utc;
use rusqlite::Connection;
use std::path::Path;

/// Current schema version. Incremented when the schema changes.
///
/// Version 2 stores customer dates as ISO-8601 only.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Main database connection and schema manager
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(DatabaseError::Sqlite)?;

        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(DatabaseError::Sqlite)?;
        // journal_mode answers with the resulting mode, so it has to be queried
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(DatabaseError::Sqlite)?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database for testing
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Sqlite)?;

        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(DatabaseError::Sqlite)?;

        Ok(Self { conn })
    }

    /// Create missing tables and bring an existing database up to date
    pub fn initialize_schema(&self) -> Result<()> {
        self.create_db_metadata_table()?;
        self.create_settings_table()?;
        self.create_categories_table()?;
        self.create_customers_table()?;
        self.create_preset_tables()?;
        self.create_indexes()?;
        self.validate_schema_version()?;
        Ok(())
    }

    fn create_db_metadata_table(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS db_metadata (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
                [],
            )
            .map_err(DatabaseError::Sqlite)?;

        self.conn
            .execute(
                "INSERT OR IGNORE INTO db_metadata (id, version, created_at) VALUES (1, ?1, ?2)",
                (CURRENT_SCHEMA_VERSION, Utc::now().timestamp()),
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_settings_table(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                wholesale_password_hash TEXT NOT NULL DEFAULT '',
                master_password_hash TEXT,
                master_reset_used INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            )",
                [],
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_categories_table(&self) -> Result<()> {
        // No foreign key on parent_id: subtrees are removed by the store.
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                parent_id INTEGER,
                name TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'FOLDER' CHECK (kind IN ('FOLDER', 'ITEM')),
                customer_price REAL,
                wholesale_price REAL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL
            )",
                [],
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_customers_table(&self) -> Result<()> {
        let power_columns: String = LensPowers::COLUMNS
            .iter()
            .map(|column| format!("{} TEXT,\n", column))
            .collect();

        self.conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS customers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                name TEXT NOT NULL,
                age INTEGER,
                address TEXT,
                mobile TEXT,
                {}
                notes TEXT,
                prescription_photo_path TEXT,
                created_at INTEGER NOT NULL
            )",
                    power_columns
                ),
                [],
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_preset_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS form_presets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS form_preset_fields (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                preset_id INTEGER NOT NULL,
                field_key TEXT NOT NULL,
                label TEXT NOT NULL,
                is_enabled INTEGER NOT NULL DEFAULT 1,
                order_index INTEGER NOT NULL,
                FOREIGN KEY (preset_id) REFERENCES form_presets(id) ON DELETE CASCADE
            );",
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_indexes(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_categories_parent_id
                    ON categories(parent_id);
                CREATE INDEX IF NOT EXISTS idx_customers_date
                    ON customers(date, created_at);
                CREATE INDEX IF NOT EXISTS idx_form_preset_fields_preset_id
                    ON form_preset_fields(preset_id, order_index);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_form_presets_single_active
                    ON form_presets(is_active) WHERE is_active = 1;",
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    /// Validate the database schema version, running migrations if needed.
    ///
    /// Older databases are migrated in place. A database written by a newer
    /// build is rejected.
    pub fn validate_schema_version(&self) -> Result<()> {
        let version = self.schema_version()?;

        if version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if version < CURRENT_SCHEMA_VERSION {
            migrations::run_migrations(&self.conn, version)?;
            return Ok(());
        }

        Err(ShopError::from(DatabaseError::SchemaMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: version,
        }))
    }

    /// Version recorded in `db_metadata`
    pub fn schema_version(&self) -> Result<i32> {
        let version = self
            .conn
            .query_row("SELECT version FROM db_metadata WHERE id = 1", [], |row| {
                row.get(0)
            })
            .map_err(DatabaseError::Sqlite)?;
        Ok(version)
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Get a mutable reference, needed to open transactions
    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(db: &Database, kind: &str) -> Vec<String> {
        db.conn
            .prepare("SELECT name FROM sqlite_master WHERE type = ?1")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_in_memory_database() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();

        let tables = names(&db, "table");
        for table in [
            "db_metadata",
            "settings",
            "categories",
            "customers",
            "form_presets",
            "form_preset_fields",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }

        let indexes = names(&db, "index");
        assert!(indexes.contains(&"idx_categories_parent_id".to_string()));
        assert!(indexes.contains(&"idx_form_presets_single_active".to_string()));

        assert_eq!(db.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.initialize_schema().unwrap();
        assert_eq!(db.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_customers_table_has_power_columns() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();

        let columns: Vec<String> = db
            .conn
            .prepare("SELECT name FROM pragma_table_info('customers')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for column in LensPowers::COLUMNS {
            assert!(columns.contains(&column.to_string()), "missing {}", column);
        }
    }

    #[test]
    fn test_newer_schema_rejected() {
        let db = Database::in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.conn
            .execute("UPDATE db_metadata SET version = 99 WHERE id = 1", [])
            .unwrap();

        let err = db.validate_schema_version().unwrap_err();
        assert!(matches!(
            err,
            ShopError::Database(DatabaseError::SchemaMismatch { found: 99, .. })
        ));
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");

        let db = Database::open(&path).unwrap();
        db.initialize_schema().unwrap();
        drop(db);

        let reopened = Database::open(&path).unwrap();
        reopened.initialize_schema().unwrap();
        assert_eq!(reopened.schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
