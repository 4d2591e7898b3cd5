// src/db/models/archive.rs

//! Archive model - repositories that own publications

use super::{DistroArchSeries, UploadPermission};
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// What an archive is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchivePurpose {
    /// The distribution's official archive
    Primary,
    /// Personal package archive
    Ppa,
    Partner,
    /// Rebuild/test copy of another archive
    Copy,
    /// Debug symbols paired with a primary archive
    Debug,
}

impl ArchivePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchivePurpose::Primary => "primary",
            ArchivePurpose::Ppa => "ppa",
            ArchivePurpose::Partner => "partner",
            ArchivePurpose::Copy => "copy",
            ArchivePurpose::Debug => "debug",
        }
    }

    /// Component forced onto new publications, if the purpose dictates one
    ///
    /// `None` keeps the component the source carried.
    pub fn default_component(&self) -> Option<&'static str> {
        match self {
            ArchivePurpose::Partner => Some("partner"),
            ArchivePurpose::Ppa => Some("main"),
            ArchivePurpose::Primary | ArchivePurpose::Copy | ArchivePurpose::Debug => None,
        }
    }

    /// Purpose of the archive responsible for a component in a distribution
    pub fn responsible_for_component(component: &str) -> Self {
        if component == "partner" {
            ArchivePurpose::Partner
        } else {
            ArchivePurpose::Primary
        }
    }
}

impl FromStr for ArchivePurpose {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "primary" => Ok(ArchivePurpose::Primary),
            "ppa" => Ok(ArchivePurpose::Ppa),
            "partner" => Ok(ArchivePurpose::Partner),
            "copy" => Ok(ArchivePurpose::Copy),
            "debug" => Ok(ArchivePurpose::Debug),
            _ => Err(format!("Invalid archive purpose: {s}")),
        }
    }
}

impl fmt::Display for ArchivePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const ARCHIVE_COLUMNS: &str = "id, distribution_id, name, owner_id, purpose, private, enabled, \
     require_virtualized, debug_archive_id, created_at";

/// A package repository instance
#[derive(Debug, Clone)]
pub struct Archive {
    pub id: Option<i64>,
    pub distribution_id: i64,
    pub name: String,
    pub owner_id: Option<i64>,
    pub purpose: ArchivePurpose,
    pub private: bool,
    pub enabled: bool,
    pub require_virtualized: bool,
    /// Where DDEBs built for this archive are published
    pub debug_archive_id: Option<i64>,
    pub created_at: Option<String>,
}

impl Archive {
    /// Create a new, public, enabled Archive
    pub fn new(distribution_id: i64, name: impl Into<String>, purpose: ArchivePurpose) -> Self {
        Self {
            id: None,
            distribution_id,
            name: name.into(),
            owner_id: None,
            purpose,
            private: false,
            enabled: true,
            require_virtualized: purpose == ArchivePurpose::Ppa,
            debug_archive_id: None,
            created_at: None,
        }
    }

    /// Insert this archive into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO archives (distribution_id, name, owner_id, purpose, private, enabled, require_virtualized, debug_archive_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.distribution_id,
                &self.name,
                self.owner_id,
                self.purpose.as_str(),
                self.private as i32,
                self.enabled as i32,
                self.require_virtualized as i32,
                self.debug_archive_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an archive by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM archives WHERE id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find an archive by ID, failing if it does not exist
    pub fn get(conn: &Connection, id: i64) -> Result<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| Error::NotFound(format!("archive {id}")))
    }

    /// Find an archive of a distribution by name
    pub fn find_by_name(conn: &Connection, distribution_id: i64, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM archives WHERE distribution_id = ?1 AND name = ?2"
        ))?;
        Ok(stmt
            .query_row(params![distribution_id, name], Self::from_row)
            .optional()?)
    }

    /// Find the archive of a distribution with the given purpose
    pub fn find_by_purpose(
        conn: &Connection,
        distribution_id: i64,
        purpose: ArchivePurpose,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM archives WHERE distribution_id = ?1 AND purpose = ?2 ORDER BY id LIMIT 1"
        ))?;
        Ok(stmt
            .query_row(params![distribution_id, purpose.as_str()], Self::from_row)
            .optional()?)
    }

    pub fn is_primary(&self) -> bool {
        self.purpose == ArchivePurpose::Primary
    }

    pub fn is_ppa(&self) -> bool {
        self.purpose == ArchivePurpose::Ppa
    }

    /// Archives maintained by the distribution itself
    pub fn is_main(&self) -> bool {
        matches!(
            self.purpose,
            ArchivePurpose::Primary | ArchivePurpose::Partner
        )
    }

    /// Enable or disable this archive
    pub fn set_enabled(&mut self, conn: &Connection, enabled: bool) -> Result<()> {
        conn.execute(
            "UPDATE archives SET enabled = ?1 WHERE id = ?2",
            params![enabled as i32, self.id],
        )?;
        self.enabled = enabled;
        Ok(())
    }

    /// The paired debug archive; primary archives must have one to receive DDEBs
    pub fn debug_archive(&self, conn: &Connection) -> Result<Self> {
        let id = self.debug_archive_id.ok_or_else(|| {
            Error::IllegalTarget(format!("archive {} has no debug archive", self.name))
        })?;
        Self::get(conn, id)
    }

    /// Allow builds and publications on a restricted processor family
    pub fn allow_restricted_family(&self, conn: &Connection, family: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO archive_restricted_families (archive_id, family) VALUES (?1, ?2)",
            params![self.id, family],
        )?;
        Ok(())
    }

    /// Opt this archive out of an architecture
    pub fn disable_architecture(&self, conn: &Connection, architecture_tag: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO archive_disabled_architectures (archive_id, architecture_tag) VALUES (?1, ?2)",
            params![self.id, architecture_tag],
        )?;
        Ok(())
    }

    fn string_set(&self, conn: &Connection, sql: &str) -> Result<HashSet<String>> {
        let mut stmt = conn.prepare_cached(sql)?;
        let values = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;
        Ok(values)
    }

    /// Architectures of a series this archive may publish to
    ///
    /// Enabled, not opted out by the archive, and either unrestricted or of a
    /// restricted family the archive allows.
    pub fn usable_architectures(
        &self,
        conn: &Connection,
        distroseries_id: i64,
    ) -> Result<Vec<DistroArchSeries>> {
        let families = self.string_set(
            conn,
            "SELECT family FROM archive_restricted_families WHERE archive_id = ?1",
        )?;
        let disabled = self.string_set(
            conn,
            "SELECT architecture_tag FROM archive_disabled_architectures WHERE archive_id = ?1",
        )?;

        Ok(DistroArchSeries::find_by_series(conn, distroseries_id)?
            .into_iter()
            .filter(|das| das.enabled)
            .filter(|das| !disabled.contains(&das.architecture_tag))
            .filter(|das| !das.restricted || families.contains(&das.processor_family))
            .collect())
    }

    /// Whether `person_id` may upload `package_name` into `component` here
    pub fn can_upload(
        &self,
        conn: &Connection,
        person_id: i64,
        component: &str,
        package_name: &str,
    ) -> Result<bool> {
        if self.owner_id == Some(person_id) {
            return Ok(true);
        }
        let permissions = UploadPermission::find_for(conn, self.id.unwrap_or_default(), person_id)?;
        Ok(permissions
            .iter()
            .any(|perm| perm.grants(component, package_name)))
    }

    /// Whether `person_id` holds any upload right on this archive
    pub fn has_any_upload_right(&self, conn: &Connection, person_id: i64) -> Result<bool> {
        if self.owner_id == Some(person_id) {
            return Ok(true);
        }
        Ok(!UploadPermission::find_for(conn, self.id.unwrap_or_default(), person_id)?.is_empty())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            distribution_id: row.get(1)?,
            name: row.get(2)?,
            owner_id: row.get(3)?,
            purpose: super::parse_column(row, 4)?,
            private: row.get::<_, i32>(5)? != 0,
            enabled: row.get::<_, i32>(6)? != 0,
            require_virtualized: row.get::<_, i32>(7)? != 0,
            debug_archive_id: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
