// src/db/schema.rs

//! Schema version tracking and migration driver
//!
//! Migrations themselves live in [`super::migrations`]; this module records
//! which ones have been applied and runs the rest in order.

use super::migrations;
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

type Migration = fn(&Connection) -> Result<()>;

/// Migrations in order; entry N brings the schema to version N + 1
const MIGRATIONS: &[Migration] = &[migrations::migrate_v1, migrations::migrate_v2];

/// Current schema version
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Highest applied schema version, 0 for a fresh database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;
    let version: Option<i32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
///
/// A database written by a newer schema is refused rather than touched.
pub fn migrate(conn: &Connection) -> Result<()> {
    let current = get_schema_version(conn)?;
    debug!("Current schema version: {}", current);

    if current > SCHEMA_VERSION {
        return Err(Error::InitError(format!(
            "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    for (index, step) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = index as i32 + 1;
        info!("Applying migration to version {}", version);
        step(conn)?;
        set_schema_version(conn, version)?;
    }

    if current < SCHEMA_VERSION {
        info!("Schema migrated from version {} to {}", current, SCHEMA_VERSION);
    }
    Ok(())
}
