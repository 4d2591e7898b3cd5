// src/db/models/package_upload.rs

//! PackageUpload model - delayed copies staged for later release

use super::{LibraryFile, Pocket};
use crate::db;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Status of a staged upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageUploadStatus {
    /// Accepted, waiting for its files to be made public
    Accepted,
    /// Released into the destination archive
    Done,
    Rejected,
}

impl PackageUploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageUploadStatus::Accepted => "accepted",
            PackageUploadStatus::Done => "done",
            PackageUploadStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for PackageUploadStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(PackageUploadStatus::Accepted),
            "done" => Ok(PackageUploadStatus::Done),
            "rejected" => Ok(PackageUploadStatus::Rejected),
            _ => Err(format!("Invalid package upload status: {s}")),
        }
    }
}

const UPLOAD_COLUMNS: &str = "id, archive_id, distroseries_id, pocket, status, source_publication_id, \
     include_binaries, creator_id, sponsor_id, created_at, date_done";

/// A copy staged into a destination context, not yet published
#[derive(Debug, Clone)]
pub struct PackageUpload {
    pub id: Option<i64>,
    pub archive_id: i64,
    pub distroseries_id: i64,
    pub pocket: Pocket,
    pub status: PackageUploadStatus,
    /// The publication being copied (in its original archive)
    pub source_publication_id: i64,
    pub include_binaries: bool,
    pub creator_id: Option<i64>,
    pub sponsor_id: Option<i64>,
    pub created_at: Option<String>,
    pub date_done: Option<String>,
}

impl PackageUpload {
    /// Create a new ACCEPTED upload
    pub fn new(
        archive_id: i64,
        distroseries_id: i64,
        pocket: Pocket,
        source_publication_id: i64,
        include_binaries: bool,
    ) -> Self {
        Self {
            id: None,
            archive_id,
            distroseries_id,
            pocket,
            status: PackageUploadStatus::Accepted,
            source_publication_id,
            include_binaries,
            creator_id: None,
            sponsor_id: None,
            created_at: None,
            date_done: None,
        }
    }

    /// Insert this upload into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO package_uploads (archive_id, distroseries_id, pocket, status,
                                          source_publication_id, include_binaries, creator_id, sponsor_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.archive_id,
                self.distroseries_id,
                self.pocket.as_str(),
                self.status.as_str(),
                self.source_publication_id,
                self.include_binaries as i32,
                self.creator_id,
                self.sponsor_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an upload by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM package_uploads WHERE id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Uploads in an archive with the given status, oldest first
    pub fn find_by_status(
        conn: &Connection,
        archive_id: i64,
        status: PackageUploadStatus,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM package_uploads
             WHERE archive_id = ?1 AND status = ?2 ORDER BY id"
        ))?;
        let uploads = stmt
            .query_map(params![archive_id, status.as_str()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(uploads)
    }

    /// Stage a build whose binaries travel with this upload
    pub fn add_build(&self, conn: &Connection, build_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO package_upload_builds (package_upload_id, build_id) VALUES (?1, ?2)",
            params![self.id, build_id],
        )?;
        Ok(())
    }

    /// IDs of the staged builds
    pub fn build_ids(&self, conn: &Connection) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare_cached(
            "SELECT build_id FROM package_upload_builds WHERE package_upload_id = ?1 ORDER BY build_id",
        )?;
        let ids = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Stage a custom artifact with this upload
    pub fn add_custom(&self, conn: &Connection, custom_upload_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO package_upload_customs (package_upload_id, custom_upload_id)
             VALUES (?1, ?2)",
            params![self.id, custom_upload_id],
        )?;
        Ok(())
    }

    /// Staged custom artifacts
    pub fn customs(&self, conn: &Connection) -> Result<Vec<CustomUpload>> {
        let mut stmt = conn.prepare_cached(
            "SELECT cu.id, cu.build_id, cu.custom_type, cu.library_file_id FROM custom_uploads cu
             JOIN package_upload_customs puc ON puc.custom_upload_id = cu.id
             WHERE puc.package_upload_id = ?1 ORDER BY cu.id",
        )?;
        let customs = stmt
            .query_map([self.id], CustomUpload::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(customs)
    }

    /// Mark the upload released
    pub fn mark_done(&mut self, conn: &Connection) -> Result<()> {
        self.set_final_status(conn, PackageUploadStatus::Done)
    }

    /// Mark the upload rejected
    pub fn mark_rejected(&mut self, conn: &Connection) -> Result<()> {
        self.set_final_status(conn, PackageUploadStatus::Rejected)
    }

    fn set_final_status(&mut self, conn: &Connection, status: PackageUploadStatus) -> Result<()> {
        if self.status != PackageUploadStatus::Accepted {
            return Err(Error::InvalidTransition {
                id: self.id.unwrap_or_default(),
                from: self.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }
        let now = db::now();
        conn.execute(
            "UPDATE package_uploads SET status = ?1, date_done = ?2 WHERE id = ?3",
            params![status.as_str(), &now, self.id],
        )?;
        self.status = status;
        self.date_done = Some(now);
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            archive_id: row.get(1)?,
            distroseries_id: row.get(2)?,
            pocket: super::parse_column(row, 3)?,
            status: super::parse_column(row, 4)?,
            source_publication_id: row.get(5)?,
            include_binaries: row.get::<_, i32>(6)? != 0,
            creator_id: row.get(7)?,
            sponsor_id: row.get(8)?,
            created_at: row.get(9)?,
            date_done: row.get(10)?,
        })
    }
}

/// A non-package artifact produced by a build (installer images, translations)
#[derive(Debug, Clone)]
pub struct CustomUpload {
    pub id: Option<i64>,
    pub build_id: i64,
    pub custom_type: String,
    pub library_file_id: i64,
}

impl CustomUpload {
    pub fn new(build_id: i64, custom_type: impl Into<String>, library_file_id: i64) -> Self {
        Self {
            id: None,
            build_id,
            custom_type: custom_type.into(),
            library_file_id,
        }
    }

    /// Insert this artifact into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO custom_uploads (build_id, custom_type, library_file_id) VALUES (?1, ?2, ?3)",
            params![self.build_id, &self.custom_type, self.library_file_id],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Artifacts produced by any of the given builds
    pub fn find_by_builds(conn: &Connection, build_ids: &[i64]) -> Result<Vec<Self>> {
        if build_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT id, build_id, custom_type, library_file_id FROM custom_uploads
             WHERE build_id IN ({}) ORDER BY id",
            super::placeholders(build_ids.len())
        ))?;
        let customs = stmt
            .query_map(rusqlite::params_from_iter(build_ids), Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(customs)
    }

    /// The stored artifact file
    pub fn file(&self, conn: &Connection) -> Result<LibraryFile> {
        LibraryFile::find_by_id(conn, self.library_file_id)?
            .ok_or_else(|| Error::NotFound(format!("library file {}", self.library_file_id)))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            build_id: row.get(1)?,
            custom_type: row.get(2)?,
            library_file_id: row.get(3)?,
        })
    }
}
