// src/db/models/build.rs

//! Build model - a request to compile a source release on one architecture

use super::Pocket;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// Build lifecycle status as reported by the build farm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    NeedsBuild,
    Building,
    Uploading,
    FullyBuilt,
    FailedToBuild,
    DependencyWait,
    ChrootWait,
    Superseded,
    Cancelled,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::NeedsBuild => "needs_build",
            BuildStatus::Building => "building",
            BuildStatus::Uploading => "uploading",
            BuildStatus::FullyBuilt => "fully_built",
            BuildStatus::FailedToBuild => "failed_to_build",
            BuildStatus::DependencyWait => "dependency_wait",
            BuildStatus::ChrootWait => "chroot_wait",
            BuildStatus::Superseded => "superseded",
            BuildStatus::Cancelled => "cancelled",
        }
    }

    /// Build has not produced binaries yet but still may
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            BuildStatus::NeedsBuild | BuildStatus::Building | BuildStatus::Uploading
        )
    }

    /// Build stopped without producing binaries
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            BuildStatus::FailedToBuild
                | BuildStatus::DependencyWait
                | BuildStatus::ChrootWait
                | BuildStatus::Cancelled
        )
    }

    fn is_final(&self) -> bool {
        !self.is_in_progress()
    }
}

impl FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "needs_build" => Ok(BuildStatus::NeedsBuild),
            "building" => Ok(BuildStatus::Building),
            "uploading" => Ok(BuildStatus::Uploading),
            "fully_built" => Ok(BuildStatus::FullyBuilt),
            "failed_to_build" => Ok(BuildStatus::FailedToBuild),
            "dependency_wait" => Ok(BuildStatus::DependencyWait),
            "chroot_wait" => Ok(BuildStatus::ChrootWait),
            "superseded" => Ok(BuildStatus::Superseded),
            "cancelled" => Ok(BuildStatus::Cancelled),
            _ => Err(format!("Invalid build status: {s}")),
        }
    }
}

const BUILD_COLUMNS: &str = "b.id, b.source_release_id, b.distroarchseries_id, b.archive_id, b.pocket, \
     b.status, b.created_at, b.finished_at";

/// A build of a source release for one architecture in one archive
#[derive(Debug, Clone, serde::Serialize)]
pub struct Build {
    pub id: Option<i64>,
    pub source_release_id: i64,
    pub distroarchseries_id: i64,
    pub archive_id: i64,
    pub pocket: Pocket,
    pub status: BuildStatus,
    pub created_at: Option<String>,
    pub finished_at: Option<String>,
}

impl Build {
    /// Create a new build waiting for the build farm
    pub fn new(source_release_id: i64, distroarchseries_id: i64, archive_id: i64, pocket: Pocket) -> Self {
        Self {
            id: None,
            source_release_id,
            distroarchseries_id,
            archive_id,
            pocket,
            status: BuildStatus::NeedsBuild,
            created_at: None,
            finished_at: None,
        }
    }

    /// Insert this build into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO builds (source_release_id, distroarchseries_id, archive_id, pocket, status, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.source_release_id,
                self.distroarchseries_id,
                self.archive_id,
                self.pocket.as_str(),
                self.status.as_str(),
                &self.finished_at,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a build by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {BUILD_COLUMNS} FROM builds b WHERE b.id = ?1"))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a build by ID, failing if it does not exist
    pub fn get(conn: &Connection, id: i64) -> Result<Self> {
        Self::find_by_id(conn, id)?.ok_or_else(|| Error::NotFound(format!("build {id}")))
    }

    /// Builds of a source release in an archive
    pub fn find_by_source(conn: &Connection, source_release_id: i64, archive_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BUILD_COLUMNS} FROM builds b
             WHERE b.source_release_id = ?1 AND b.archive_id = ?2 ORDER BY b.id"
        ))?;
        let builds = stmt
            .query_map(params![source_release_id, archive_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(builds)
    }

    /// Architecture tags of a source release that already have a build
    /// relevant to an archive
    ///
    /// A build counts when it was created in the archive, or when binaries it
    /// produced are published there (copied builds). Superseded and
    /// cancelled builds do not count.
    pub fn covered_architectures(
        conn: &Connection,
        source_release_id: i64,
        archive_id: i64,
    ) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT das.architecture_tag FROM builds b
             JOIN distroarchseries das ON das.id = b.distroarchseries_id
             WHERE b.source_release_id = ?1
               AND b.status NOT IN ('superseded', 'cancelled')
               AND (b.archive_id = ?2 OR EXISTS (
                    SELECT 1 FROM binary_releases br
                    JOIN binary_publications bpp ON bpp.binary_release_id = br.id
                    WHERE br.build_id = b.id AND bpp.archive_id = ?2))",
        )?;
        let tags = stmt
            .query_map(params![source_release_id, archive_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    /// Record a new status from the build farm
    pub fn update_status(&mut self, conn: &Connection, status: BuildStatus) -> Result<()> {
        let finished_at = status.is_final().then(crate::db::now);
        conn.execute(
            "UPDATE builds SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.as_str(), &finished_at, self.id],
        )?;
        self.status = status;
        self.finished_at = finished_at;
        Ok(())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            source_release_id: row.get(1)?,
            distroarchseries_id: row.get(2)?,
            archive_id: row.get(3)?,
            pocket: super::parse_column(row, 4)?,
            status: super::parse_column(row, 5)?,
            created_at: row.get(6)?,
            finished_at: row.get(7)?,
        })
    }
}
