//! Schema initialization.
//!
//! Creates an empty SQLite database from a fixed schema definition. An
//! existing database is only replaced when the caller forces it.

use crate::error::{BiblioError, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Embedded schema used when no external definition is given
pub const DEFAULT_SCHEMA: &str = include_str!("../sql/schema.sql");

/// Tables every schema must define
pub const REQUIRED_TABLES: &[&str] = &[
    "publications",
    "articles",
    "authors",
    "affiliations",
    "author_affiliations",
    "author_articles",
    "keywords",
    "article_keywords",
    "labels",
    "article_labels",
];

/// Load the schema SQL, from `path` if given, otherwise the embedded one.
pub fn load_schema(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => {
            let sql = std::fs::read_to_string(p).map_err(|e| {
                BiblioError::Schema(format!("cannot read {}: {}", p.display(), e))
            })?;
            debug!(path = %p.display(), bytes = sql.len(), "Loaded external schema");
            Ok(sql)
        }
        None => Ok(DEFAULT_SCHEMA.to_string()),
    }
}

/// Create an empty database at `path` from `schema_sql`.
///
/// Fails with [`BiblioError::AlreadyExists`] when a file is present at
/// `path` and `force` is false; nothing is touched in that case. With
/// `force`, the existing file is removed first.
pub fn create_database(path: &Path, force: bool, schema_sql: &str) -> Result<()> {
    if path.exists() {
        if !force {
            return Err(BiblioError::AlreadyExists(path.to_path_buf()));
        }
        std::fs::remove_file(path)?;
        info!(path = %path.display(), "Removed existing database");
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    apply_schema(&conn, schema_sql)?;
    conn.close().map_err(|(_, e)| BiblioError::Sqlite(e))?;

    info!(path = %path.display(), "Created database");
    Ok(())
}

/// Execute the schema script and check that it produced the expected tables.
pub fn apply_schema(conn: &Connection, schema_sql: &str) -> Result<()> {
    conn.execute_batch(schema_sql)
        .map_err(|e| BiblioError::Schema(e.to_string()))?;

    for table in REQUIRED_TABLES {
        let found: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [table],
            |row| row.get(0),
        )?;
        if found == 0 {
            return Err(BiblioError::Schema(format!("schema does not define table '{}'", table)));
        }
    }
    Ok(())
}
