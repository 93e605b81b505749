//! Database layer for the shop.
//!
//! This module handles schema creation, versioned migrations and the error
//! type for persistence failures.

pub mod migrations;
pub mod schema;

pub use schema::{Database, CURRENT_SCHEMA_VERSION};

use thiserror::Error;

/// Errors raised by the persistence layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: i32, found: i32 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}
