// src/commands/system.rs
//! Database setup

use anyhow::{Context, Result};
use tracing::info;

/// Create the database and bring its schema up to date
pub fn cmd_init(db_path: &str) -> Result<()> {
    info!("Initializing depot database at: {}", db_path);
    depot::db::init(db_path).with_context(|| format!("Failed to initialize {}", db_path))?;
    println!("Database initialized successfully at: {}", db_path);
    Ok(())
}
