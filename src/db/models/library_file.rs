// src/db/models/library_file.rs

//! LibraryFile model - content-store metadata for package files

use super::placeholders;
use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const FILE_COLUMNS: &str = "lf.id, lf.filename, lf.sha256, lf.size, lf.restricted, lf.expired, lf.created_at";

/// Metadata of a file held by the content store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFile {
    pub id: Option<i64>,
    pub filename: String,
    pub sha256: String,
    pub size: i64,
    /// Only readable from private contexts until unembargoed
    pub restricted: bool,
    /// Content has been expired from the store and is no longer retrievable
    pub expired: bool,
    pub created_at: Option<String>,
}

impl LibraryFile {
    /// Create a new public, unexpired LibraryFile
    pub fn new(filename: impl Into<String>, sha256: impl Into<String>, size: i64) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            sha256: sha256.into(),
            size,
            restricted: false,
            expired: false,
            created_at: None,
        }
    }

    /// Insert this file into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO library_files (filename, sha256, size, restricted, expired)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.filename,
                &self.sha256,
                self.size,
                self.restricted as i32,
                self.expired as i32,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a file by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {FILE_COLUMNS} FROM library_files lf WHERE lf.id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Files of a source release
    pub fn find_by_source_release(conn: &Connection, source_release_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {FILE_COLUMNS} FROM library_files lf
             JOIN source_release_files srf ON srf.library_file_id = lf.id
             WHERE srf.source_release_id = ?1 ORDER BY lf.filename"
        ))?;
        let files = stmt
            .query_map([source_release_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Files of several binary releases, paired with the owning release ID
    pub fn find_by_binary_releases(
        conn: &Connection,
        binary_release_ids: &[i64],
    ) -> Result<Vec<(i64, Self)>> {
        if binary_release_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT brf.binary_release_id, {FILE_COLUMNS} FROM library_files lf
             JOIN binary_release_files brf ON brf.library_file_id = lf.id
             WHERE brf.binary_release_id IN ({}) ORDER BY lf.filename",
            placeholders(binary_release_ids.len())
        ))?;
        let files = stmt
            .query_map(params_from_iter(binary_release_ids), |row| {
                Ok((row.get(0)?, Self::from_row_offset(row, 1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Files already published in an archive under any of the given names
    ///
    /// Covers both source and binary publications, active or not yet removed
    /// from disk (superseded files still occupy their pool path).
    pub fn find_published_in_archive(
        conn: &Connection,
        archive_id: i64,
        filenames: &[String],
    ) -> Result<Vec<Self>> {
        if filenames.is_empty() {
            return Ok(Vec::new());
        }
        let names = placeholders(filenames.len());
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM library_files lf
             JOIN source_release_files srf ON srf.library_file_id = lf.id
             JOIN source_publications spp ON spp.source_release_id = srf.source_release_id
             WHERE spp.archive_id = ? AND spp.status IN ('pending', 'published', 'superseded')
               AND lf.filename IN ({names})
             UNION
             SELECT {FILE_COLUMNS} FROM library_files lf
             JOIN binary_release_files brf ON brf.library_file_id = lf.id
             JOIN binary_publications bpp ON bpp.binary_release_id = brf.binary_release_id
             WHERE bpp.archive_id = ? AND bpp.status IN ('pending', 'published', 'superseded')
               AND lf.filename IN ({names})"
        );
        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(filenames.len() * 2 + 2);
        values.push(archive_id.into());
        values.extend(filenames.iter().map(|f| f.clone().into()));
        values.push(archive_id.into());
        values.extend(filenames.iter().map(|f| f.clone().into()));

        let mut stmt = conn.prepare(&sql)?;
        let files = stmt
            .query_map(params_from_iter(values), Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }

    /// Mark content readable from public contexts
    pub fn mark_public(&mut self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE library_files SET restricted = 0 WHERE id = ?1",
            [self.id],
        )?;
        self.restricted = false;
        Ok(())
    }

    /// Record that the content store no longer holds this file
    pub fn expire(&mut self, conn: &Connection) -> Result<()> {
        conn.execute("UPDATE library_files SET expired = 1 WHERE id = ?1", [self.id])?;
        self.expired = true;
        Ok(())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Self::from_row_offset(row, 0)
    }

    fn from_row_offset(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(offset)?),
            filename: row.get(offset + 1)?,
            sha256: row.get(offset + 2)?,
            size: row.get(offset + 3)?,
            restricted: row.get::<_, i32>(offset + 4)? != 0,
            expired: row.get::<_, i32>(offset + 5)? != 0,
            created_at: row.get(offset + 6)?,
        })
    }
}
