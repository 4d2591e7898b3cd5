// src/db/models/binary_release.rs

//! BinaryRelease model - a binary package produced by a build

use super::LibraryFile;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;

/// Binary package format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryFormat {
    Deb,
    Udeb,
    /// Debug symbols only; never published in a primary archive
    Ddeb,
}

impl BinaryFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryFormat::Deb => "deb",
            BinaryFormat::Udeb => "udeb",
            BinaryFormat::Ddeb => "ddeb",
        }
    }
}

impl FromStr for BinaryFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "deb" => Ok(BinaryFormat::Deb),
            "udeb" => Ok(BinaryFormat::Udeb),
            "ddeb" => Ok(BinaryFormat::Ddeb),
            _ => Err(format!("Invalid binary format: {s}")),
        }
    }
}

/// Debian package priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Required,
    Important,
    Standard,
    Optional,
    Extra,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Required => "required",
            Priority::Important => "important",
            Priority::Standard => "standard",
            Priority::Optional => "optional",
            Priority::Extra => "extra",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "required" => Ok(Priority::Required),
            "important" => Ok(Priority::Important),
            "standard" => Ok(Priority::Standard),
            "optional" => Ok(Priority::Optional),
            "extra" => Ok(Priority::Extra),
            _ => Err(format!("Invalid priority: {s}")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BINARY_COLUMNS: &str = "id, build_id, name, version, format, component, section, priority, \
     architecture_specific, debug_release_id, created_at";

/// A binary package release
#[derive(Debug, Clone)]
pub struct BinaryRelease {
    pub id: Option<i64>,
    pub build_id: i64,
    pub name: String,
    pub version: String,
    pub format: BinaryFormat,
    pub component: String,
    pub section: String,
    pub priority: Priority,
    /// `false` for `Architecture: all` packages
    pub architecture_specific: bool,
    /// The DDEB carrying this binary's debug symbols
    pub debug_release_id: Option<i64>,
    pub created_at: Option<String>,
}

impl BinaryRelease {
    /// Create a new architecture-specific DEB release
    pub fn new(
        build_id: i64,
        name: impl Into<String>,
        version: impl Into<String>,
        component: impl Into<String>,
        section: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: None,
            build_id,
            name: name.into(),
            version: version.into(),
            format: BinaryFormat::Deb,
            component: component.into(),
            section: section.into(),
            priority,
            architecture_specific: true,
            debug_release_id: None,
            created_at: None,
        }
    }

    /// Insert this release into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO binary_releases (build_id, name, version, format, component, section, priority,
                                          architecture_specific, debug_release_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.build_id,
                &self.name,
                &self.version,
                self.format.as_str(),
                &self.component,
                &self.section,
                self.priority.as_str(),
                self.architecture_specific as i32,
                self.debug_release_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a release by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BINARY_COLUMNS} FROM binary_releases WHERE id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a release by ID, failing if it does not exist
    pub fn get(conn: &Connection, id: i64) -> Result<Self> {
        Self::find_by_id(conn, id)?
            .ok_or_else(|| Error::NotFound(format!("binary release {id}")))
    }

    /// Releases produced by a build
    pub fn find_by_build(conn: &Connection, build_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BINARY_COLUMNS} FROM binary_releases WHERE build_id = ?1 ORDER BY name"
        ))?;
        let releases = stmt
            .query_map([build_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(releases)
    }

    /// The non-debug release whose symbols this DDEB carries
    pub fn find_debug_parent(conn: &Connection, ddeb_release_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BINARY_COLUMNS} FROM binary_releases WHERE debug_release_id = ?1"
        ))?;
        Ok(stmt.query_row([ddeb_release_id], Self::from_row).optional()?)
    }

    /// Attach a content-store file to this release
    pub fn add_file(&self, conn: &Connection, library_file_id: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO binary_release_files (binary_release_id, library_file_id) VALUES (?1, ?2)",
            params![self.id, library_file_id],
        )?;
        Ok(())
    }

    /// Files making up this release
    pub fn files(&self, conn: &Connection) -> Result<Vec<LibraryFile>> {
        Ok(LibraryFile::find_by_binary_releases(conn, &[self.id.unwrap_or_default()])?
            .into_iter()
            .map(|(_, file)| file)
            .collect())
    }

    pub fn is_ddeb(&self) -> bool {
        self.format == BinaryFormat::Ddeb
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            build_id: row.get(1)?,
            name: row.get(2)?,
            version: row.get(3)?,
            format: super::parse_column(row, 4)?,
            component: row.get(5)?,
            section: row.get(6)?,
            priority: super::parse_column(row, 7)?,
            architecture_specific: row.get::<_, i32>(8)? != 0,
            debug_release_id: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}
