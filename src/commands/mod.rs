// src/commands/mod.rs
//! Command handlers for the depot CLI

mod copy;
mod publication;
mod system;

pub use copy::{cmd_copy, cmd_release_delayed, CopyArgs};
pub use publication::{cmd_build_status, cmd_delete, cmd_dominate, cmd_list, cmd_override, cmd_publish};
pub use system::cmd_init;

use anyhow::{Context, Result};
use depot::db::models::{Archive, Distribution, DistroSeries, Person, Pocket};
use depot::librarian::CasContentStore;
use depot::{EngineConfig, Services};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Look up an archive by distribution and name
pub(crate) fn find_archive(conn: &Connection, distribution: &str, name: &str) -> Result<Archive> {
    let distro = Distribution::find_by_name(conn, distribution)?
        .ok_or_else(|| anyhow::anyhow!("Distribution '{}' not found", distribution))?;
    Archive::find_by_name(conn, distro.id.unwrap_or_default(), name)?
        .ok_or_else(|| anyhow::anyhow!("Archive '{}' not found in {}", name, distribution))
}

/// Look up a series of the archive's distribution
pub(crate) fn find_series(conn: &Connection, archive: &Archive, name: &str) -> Result<DistroSeries> {
    DistroSeries::find_by_name(conn, archive.distribution_id, name)?
        .ok_or_else(|| anyhow::anyhow!("Series '{}' not found", name))
}

pub(crate) fn find_person(conn: &Connection, name: Option<&str>) -> Result<Option<Person>> {
    let Some(name) = name else {
        return Ok(None);
    };
    let person = Person::find_by_name(conn, name)?
        .ok_or_else(|| anyhow::anyhow!("Person '{}' not found", name))?;
    Ok(Some(person))
}

pub(crate) fn parse_pocket(pocket: &str) -> Result<Pocket> {
    pocket.parse::<Pocket>().map_err(anyhow::Error::msg)
}

/// Load the engine configuration and wire up the default collaborators
pub(crate) fn load_engine(config_path: &str, store_root: &str) -> Result<(EngineConfig, Services)> {
    let config = depot::config::load_config(Path::new(config_path))
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;
    let store = CasContentStore::new(store_root)
        .with_context(|| format!("Failed to open content store at {}", store_root))?;
    Ok((config, Services::new(Arc::new(store))))
}
