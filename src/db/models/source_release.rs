// src/db/models/source_release.rs

//! SourceRelease model - an uploaded source package version

use super::{DistroArchSeries, LibraryFile};
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

const RELEASE_COLUMNS: &str = "id, name, version, format, component, section, architecture_hint, \
     changelog, creator_id, upload_archive_id, upload_distroseries_id, created_at";

/// A source package release, independent of where it is published
#[derive(Debug, Clone)]
pub struct SourceRelease {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    /// Source format version, e.g. `1.0` or `3.0 (quilt)`
    pub format: String,
    pub component: String,
    pub section: String,
    /// Architectures to build: `any`, `all`, `any all` or explicit tags
    pub architecture_hint: String,
    /// Change history text (debian/changelog entries, newest first)
    pub changelog: Option<String>,
    pub creator_id: Option<i64>,
    pub upload_archive_id: Option<i64>,
    pub upload_distroseries_id: Option<i64>,
    pub created_at: Option<String>,
}

impl SourceRelease {
    /// Create a new SourceRelease building on every architecture
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        component: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            version: version.into(),
            format: "1.0".to_string(),
            component: component.into(),
            section: section.into(),
            architecture_hint: "any".to_string(),
            changelog: None,
            creator_id: None,
            upload_archive_id: None,
            upload_distroseries_id: None,
            created_at: None,
        }
    }

    /// Insert this release into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO source_releases (name, version, format, component, section, architecture_hint,
                                          changelog, creator_id, upload_archive_id, upload_distroseries_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                &self.name,
                &self.version,
                &self.format,
                &self.component,
                &self.section,
                &self.architecture_hint,
                &self.changelog,
                self.creator_id,
                self.upload_archive_id,
                self.upload_distroseries_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a release by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {RELEASE_COLUMNS} FROM source_releases WHERE id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a release by ID, failing if it does not exist
    pub fn get(conn: &Connection, id: i64) -> Result<Self> {
        Self::find_by_id(conn, id)?
            .ok_or_else(|| Error::NotFound(format!("source release {id}")))
    }

    /// Releases of `name` ever published in a series of an archive, oldest first
    pub fn find_published_in(
        conn: &Connection,
        name: &str,
        archive_id: i64,
        distroseries_id: i64,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {RELEASE_COLUMNS} FROM source_releases
             WHERE name = ?1
               AND id IN (SELECT source_release_id FROM source_publications
                          WHERE archive_id = ?2 AND distroseries_id = ?3)
             ORDER BY id"
        ))?;
        let releases = stmt
            .query_map(params![name, archive_id, distroseries_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(releases)
    }

    /// Attach a content-store file to this release
    pub fn add_file(&self, conn: &Connection, library_file_id: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO source_release_files (source_release_id, library_file_id) VALUES (?1, ?2)",
            params![self.id, library_file_id],
        )?;
        Ok(())
    }

    /// Files making up this release
    pub fn files(&self, conn: &Connection) -> Result<Vec<LibraryFile>> {
        LibraryFile::find_by_source_release(conn, self.id.unwrap_or_default())
    }

    /// Whether this release only produces architecture-independent binaries
    pub fn is_arch_indep_only(&self) -> bool {
        self.architecture_hint.split_whitespace().all(|tag| tag == "all")
    }

    /// Architectures among `candidates` this release should build on
    ///
    /// `any` selects every candidate; `all` selects the nominated
    /// architecture-independent builder; other tokens select by tag.
    pub fn build_architectures<'a>(
        &self,
        candidates: &'a [DistroArchSeries],
        nominated_arch_indep_id: Option<i64>,
    ) -> Vec<&'a DistroArchSeries> {
        let tokens: Vec<&str> = self.architecture_hint.split_whitespace().collect();
        let any = tokens.iter().any(|t| *t == "any" || t.starts_with("any-"));
        let all = tokens.contains(&"all");

        let nominated = nominated_arch_indep_id
            .and_then(|id| candidates.iter().find(|das| das.id == Some(id)))
            .or_else(|| candidates.first());

        candidates
            .iter()
            .filter(|das| {
                any || tokens.contains(&das.architecture_tag.as_str())
                    || (all && nominated.is_some_and(|n| n.id == das.id))
            })
            .collect()
    }

    /// `name version`, as used in messages
    pub fn title(&self) -> String {
        format!("{} {}", self.name, self.version)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            format: row.get(3)?,
            component: row.get(4)?,
            section: row.get(5)?,
            architecture_hint: row.get(6)?,
            changelog: row.get(7)?,
            creator_id: row.get(8)?,
            upload_archive_id: row.get(9)?,
            upload_distroseries_id: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}
