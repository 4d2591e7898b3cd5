// src/db/models/publishing.rs

//! Publication models - bindings of releases into archives
//!
//! A [`SourcePublication`] binds a source release into (archive, series,
//! pocket); a [`BinaryPublication`] binds a binary release into (archive,
//! architecture, pocket). Status only ever moves forward:
//! `Pending -> Published -> {Superseded, Deleted, Obsolete}`.

use super::{BinaryFormat, BinaryRelease, Build, Priority, SourceRelease};
use crate::db;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;

/// Sub-channel of a series with its own acceptance policy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Pocket {
    Release,
    Security,
    Updates,
    Proposed,
    Backports,
}

impl Pocket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pocket::Release => "release",
            Pocket::Security => "security",
            Pocket::Updates => "updates",
            Pocket::Proposed => "proposed",
            Pocket::Backports => "backports",
        }
    }

    /// Suite name for a series, e.g. `breezy` or `breezy-updates`
    pub fn suite(&self, series_name: &str) -> String {
        match self {
            Pocket::Release => series_name.to_string(),
            other => format!("{}-{}", series_name, other.as_str()),
        }
    }
}

impl FromStr for Pocket {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "release" => Ok(Pocket::Release),
            "security" => Ok(Pocket::Security),
            "updates" => Ok(Pocket::Updates),
            "proposed" => Ok(Pocket::Proposed),
            "backports" => Ok(Pocket::Backports),
            _ => Err(format!("Invalid pocket: {s}")),
        }
    }
}

impl fmt::Display for Pocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status shared by source and binary publications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishingStatus {
    Pending,
    Published,
    Superseded,
    Deleted,
    Obsolete,
}

/// Statuses counted by the uniqueness rules
pub const ACTIVE_STATUSES: [PublishingStatus; 2] =
    [PublishingStatus::Pending, PublishingStatus::Published];

impl PublishingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishingStatus::Pending => "pending",
            PublishingStatus::Published => "published",
            PublishingStatus::Superseded => "superseded",
            PublishingStatus::Deleted => "deleted",
            PublishingStatus::Obsolete => "obsolete",
        }
    }

    pub fn is_active(&self) -> bool {
        ACTIVE_STATUSES.contains(self)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: PublishingStatus) -> bool {
        use PublishingStatus::*;
        match (self, next) {
            (Pending, Published) => true,
            (Pending | Published, Superseded | Deleted | Obsolete) => true,
            _ => false,
        }
    }
}

impl FromStr for PublishingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PublishingStatus::Pending),
            "published" => Ok(PublishingStatus::Published),
            "superseded" => Ok(PublishingStatus::Superseded),
            "deleted" => Ok(PublishingStatus::Deleted),
            "obsolete" => Ok(PublishingStatus::Obsolete),
            _ => Err(format!("Invalid publishing status: {s}")),
        }
    }
}

impl fmt::Display for PublishingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn check_transition(id: Option<i64>, from: PublishingStatus, to: PublishingStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            id: id.unwrap_or_default(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

pub(crate) const SPP_COLUMNS: &str = "spp.id, spp.source_release_id, spp.archive_id, spp.distroseries_id, spp.pocket, \
     spp.source_name, spp.version, spp.component, spp.section, spp.status, spp.date_created, \
     spp.date_published, spp.date_superseded, spp.date_removed, spp.superseded_by_release_id, \
     spp.ancestor_id, spp.creator_id, spp.sponsor_id, spp.removed_by_id, spp.removal_comment";

/// A source release published into (archive, series, pocket)
#[derive(Debug, Clone, serde::Serialize)]
pub struct SourcePublication {
    pub id: Option<i64>,
    pub source_release_id: i64,
    pub archive_id: i64,
    pub distroseries_id: i64,
    pub pocket: Pocket,
    pub source_name: String,
    pub version: String,
    pub component: String,
    pub section: String,
    pub status: PublishingStatus,
    pub date_created: Option<String>,
    pub date_published: Option<String>,
    pub date_superseded: Option<String>,
    pub date_removed: Option<String>,
    /// Source release that made this publication redundant
    pub superseded_by_release_id: Option<i64>,
    /// Previous publication of the same name this one inherited overrides from
    pub ancestor_id: Option<i64>,
    pub creator_id: Option<i64>,
    pub sponsor_id: Option<i64>,
    pub removed_by_id: Option<i64>,
    pub removal_comment: Option<String>,
}

impl SourcePublication {
    /// Create a new PENDING publication carrying the release's own overrides
    pub fn new(release: &SourceRelease, archive_id: i64, distroseries_id: i64, pocket: Pocket) -> Self {
        Self {
            id: None,
            source_release_id: release.id.unwrap_or_default(),
            archive_id,
            distroseries_id,
            pocket,
            source_name: release.name.clone(),
            version: release.version.clone(),
            component: release.component.clone(),
            section: release.section.clone(),
            status: PublishingStatus::Pending,
            date_created: None,
            date_published: None,
            date_superseded: None,
            date_removed: None,
            superseded_by_release_id: None,
            ancestor_id: None,
            creator_id: release.creator_id,
            sponsor_id: None,
            removed_by_id: None,
            removal_comment: None,
        }
    }

    /// Insert this publication into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let date_created = self.date_created.clone().unwrap_or_else(db::now);
        conn.execute(
            "INSERT INTO source_publications (source_release_id, archive_id, distroseries_id, pocket,
                                              source_name, version, component, section, status,
                                              date_created, date_published, ancestor_id,
                                              creator_id, sponsor_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                self.source_release_id,
                self.archive_id,
                self.distroseries_id,
                self.pocket.as_str(),
                &self.source_name,
                &self.version,
                &self.component,
                &self.section,
                self.status.as_str(),
                &date_created,
                &self.date_published,
                self.ancestor_id,
                self.creator_id,
                self.sponsor_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.date_created = Some(date_created);
        Ok(id)
    }

    /// Find a publication by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SPP_COLUMNS} FROM source_publications spp WHERE spp.id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a publication by ID, failing if it does not exist
    pub fn get(conn: &Connection, id: i64) -> Result<Self> {
        Self::find_by_id(conn, id)?
            .ok_or_else(|| Error::NotFound(format!("source publication {id}")))
    }

    /// Every publication of `name` at `version` in an archive, any status or series
    pub fn find_by_name_version(
        conn: &Connection,
        archive_id: i64,
        name: &str,
        version: &str,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SPP_COLUMNS} FROM source_publications spp
             WHERE spp.archive_id = ?1 AND spp.source_name = ?2 AND spp.version = ?3
             ORDER BY spp.id"
        ))?;
        let pubs = stmt
            .query_map(params![archive_id, name, version], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// Active publications of `name` in (archive, series, pocket), newest first
    pub fn find_active_by_name(
        conn: &Connection,
        archive_id: i64,
        distroseries_id: i64,
        pocket: Pocket,
        name: &str,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SPP_COLUMNS} FROM source_publications spp
             WHERE spp.archive_id = ?1 AND spp.distroseries_id = ?2 AND spp.pocket = ?3
               AND spp.source_name = ?4 AND spp.status IN ('pending', 'published')
             ORDER BY spp.id DESC"
        ))?;
        let pubs = stmt
            .query_map(
                params![archive_id, distroseries_id, pocket.as_str(), name],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// Publications in (archive, series, pocket) with one of `statuses`
    pub fn find_in_context(
        conn: &Connection,
        archive_id: i64,
        distroseries_id: i64,
        pocket: Pocket,
        statuses: &[PublishingStatus],
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SPP_COLUMNS} FROM source_publications spp
             WHERE spp.archive_id = ?1 AND spp.distroseries_id = ?2 AND spp.pocket = ?3
             ORDER BY spp.source_name, spp.id"
        ))?;
        let pubs = stmt
            .query_map(
                params![archive_id, distroseries_id, pocket.as_str()],
                Self::from_row,
            )?
            .filter(|row| {
                row.as_ref()
                    .map_or(true, |spp: &Self| statuses.contains(&spp.status))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// Publications in an archive, optionally narrowed by name and status
    pub fn list(
        conn: &Connection,
        archive_id: i64,
        name: Option<&str>,
        status: Option<PublishingStatus>,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SPP_COLUMNS} FROM source_publications spp
             WHERE spp.archive_id = ?1
               AND (?2 IS NULL OR spp.source_name = ?2)
               AND (?3 IS NULL OR spp.status = ?3)
             ORDER BY spp.source_name, spp.id"
        ))?;
        let pubs = stmt
            .query_map(
                params![archive_id, name, status.map(|s| s.as_str())],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// The published source release
    pub fn release(&self, conn: &Connection) -> Result<SourceRelease> {
        SourceRelease::get(conn, self.source_release_id)
    }

    /// Builds relevant to this publication
    ///
    /// Builds created in this archive for this series, plus builds from
    /// elsewhere whose binaries were copied into this archive and series.
    pub fn builds(&self, conn: &Connection) -> Result<Vec<Build>> {
        let mut stmt = conn.prepare_cached(
            "SELECT b.id, b.source_release_id, b.distroarchseries_id, b.archive_id, b.pocket,
                    b.status, b.created_at, b.finished_at
             FROM builds b
             JOIN distroarchseries das ON das.id = b.distroarchseries_id
             WHERE b.source_release_id = ?1
               AND ((b.archive_id = ?2 AND das.distroseries_id = ?3)
                    OR EXISTS (
                        SELECT 1 FROM binary_releases br
                        JOIN binary_publications bpp ON bpp.binary_release_id = br.id
                        JOIN distroarchseries pdas ON pdas.id = bpp.distroarchseries_id
                        WHERE br.build_id = b.id AND bpp.archive_id = ?2
                          AND pdas.distroseries_id = ?3))
             ORDER BY das.architecture_tag, b.id",
        )?;
        let builds = stmt
            .query_map(
                params![self.source_release_id, self.archive_id, self.distroseries_id],
                Build::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(builds)
    }

    /// Binary publications built from this source in the same archive,
    /// series and pocket, any status
    pub fn binaries(&self, conn: &Connection) -> Result<Vec<BinaryPublication>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp
             JOIN binary_releases br ON br.id = bpp.binary_release_id
             JOIN builds b ON b.id = br.build_id
             JOIN distroarchseries das ON das.id = bpp.distroarchseries_id
             WHERE b.source_release_id = ?1 AND bpp.archive_id = ?2
               AND das.distroseries_id = ?3 AND bpp.pocket = ?4
             ORDER BY das.architecture_tag, bpp.binary_name, bpp.id"
        ))?;
        let pubs = stmt
            .query_map(
                params![
                    self.source_release_id,
                    self.archive_id,
                    self.distroseries_id,
                    self.pocket.as_str()
                ],
                BinaryPublication::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// Active binaries built from this source in the same context
    pub fn active_binaries(&self, conn: &Connection) -> Result<Vec<BinaryPublication>> {
        Ok(self
            .binaries(conn)?
            .into_iter()
            .filter(|bpp| bpp.status.is_active())
            .collect())
    }

    /// Move to PUBLISHED
    pub fn mark_published(&mut self, conn: &Connection) -> Result<()> {
        check_transition(self.id, self.status, PublishingStatus::Published)?;
        let now = db::now();
        conn.execute(
            "UPDATE source_publications SET status = 'published', date_published = ?1 WHERE id = ?2",
            params![&now, self.id],
        )?;
        self.status = PublishingStatus::Published;
        self.date_published = Some(now);
        Ok(())
    }

    /// Move to SUPERSEDED, optionally recording the dominant release
    pub fn mark_superseded(&mut self, conn: &Connection, dominant_release_id: Option<i64>) -> Result<()> {
        check_transition(self.id, self.status, PublishingStatus::Superseded)?;
        let now = db::now();
        conn.execute(
            "UPDATE source_publications
             SET status = 'superseded', date_superseded = ?1, superseded_by_release_id = ?2
             WHERE id = ?3",
            params![&now, dominant_release_id, self.id],
        )?;
        self.status = PublishingStatus::Superseded;
        self.date_superseded = Some(now);
        self.superseded_by_release_id = dominant_release_id;
        Ok(())
    }

    /// Move to a removal status (DELETED or OBSOLETE) with bookkeeping
    pub fn mark_removed(
        &mut self,
        conn: &Connection,
        status: PublishingStatus,
        removed_by_id: Option<i64>,
        comment: Option<&str>,
    ) -> Result<()> {
        check_removal(self.id, self.status, status)?;
        let now = db::now();
        conn.execute(
            "UPDATE source_publications
             SET status = ?1, date_removed = ?2, removed_by_id = ?3, removal_comment = ?4
             WHERE id = ?5",
            params![status.as_str(), &now, removed_by_id, comment, self.id],
        )?;
        self.status = status;
        self.date_removed = Some(now);
        self.removed_by_id = removed_by_id;
        self.removal_comment = comment.map(str::to_string);
        Ok(())
    }

    /// `name version`
    pub fn display_name(&self) -> String {
        format!("{} {}", self.source_name, self.version)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            source_release_id: row.get(1)?,
            archive_id: row.get(2)?,
            distroseries_id: row.get(3)?,
            pocket: super::parse_column(row, 4)?,
            source_name: row.get(5)?,
            version: row.get(6)?,
            component: row.get(7)?,
            section: row.get(8)?,
            status: super::parse_column(row, 9)?,
            date_created: row.get(10)?,
            date_published: row.get(11)?,
            date_superseded: row.get(12)?,
            date_removed: row.get(13)?,
            superseded_by_release_id: row.get(14)?,
            ancestor_id: row.get(15)?,
            creator_id: row.get(16)?,
            sponsor_id: row.get(17)?,
            removed_by_id: row.get(18)?,
            removal_comment: row.get(19)?,
        })
    }
}

fn check_removal(id: Option<i64>, from: PublishingStatus, to: PublishingStatus) -> Result<()> {
    if !matches!(to, PublishingStatus::Deleted | PublishingStatus::Obsolete) {
        return Err(Error::InvalidTransition {
            id: id.unwrap_or_default(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    check_transition(id, from, to)
}

pub(crate) const BPP_COLUMNS: &str = "bpp.id, bpp.binary_release_id, bpp.archive_id, bpp.distroarchseries_id, \
     bpp.pocket, bpp.binary_name, bpp.version, bpp.component, bpp.section, bpp.priority, \
     bpp.architecture_specific, bpp.binary_format, bpp.status, bpp.date_created, bpp.date_published, \
     bpp.date_superseded, bpp.date_removed, bpp.superseded_by_build_id, bpp.creator_id, \
     bpp.removed_by_id, bpp.removal_comment";

/// A binary release published into (archive, architecture, pocket)
#[derive(Debug, Clone, serde::Serialize)]
pub struct BinaryPublication {
    pub id: Option<i64>,
    pub binary_release_id: i64,
    pub archive_id: i64,
    pub distroarchseries_id: i64,
    pub pocket: Pocket,
    pub binary_name: String,
    pub version: String,
    pub component: String,
    pub section: String,
    pub priority: Priority,
    pub architecture_specific: bool,
    pub binary_format: BinaryFormat,
    pub status: PublishingStatus,
    pub date_created: Option<String>,
    pub date_published: Option<String>,
    pub date_superseded: Option<String>,
    pub date_removed: Option<String>,
    /// Build whose binaries made this publication redundant
    pub superseded_by_build_id: Option<i64>,
    pub creator_id: Option<i64>,
    pub removed_by_id: Option<i64>,
    pub removal_comment: Option<String>,
}

impl BinaryPublication {
    /// Create a new PENDING publication carrying the release's own overrides
    pub fn new(release: &BinaryRelease, archive_id: i64, distroarchseries_id: i64, pocket: Pocket) -> Self {
        Self {
            id: None,
            binary_release_id: release.id.unwrap_or_default(),
            archive_id,
            distroarchseries_id,
            pocket,
            binary_name: release.name.clone(),
            version: release.version.clone(),
            component: release.component.clone(),
            section: release.section.clone(),
            priority: release.priority,
            architecture_specific: release.architecture_specific,
            binary_format: release.format,
            status: PublishingStatus::Pending,
            date_created: None,
            date_published: None,
            date_superseded: None,
            date_removed: None,
            superseded_by_build_id: None,
            creator_id: None,
            removed_by_id: None,
            removal_comment: None,
        }
    }

    /// Insert this publication into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let date_created = self.date_created.clone().unwrap_or_else(db::now);
        conn.execute(
            "INSERT INTO binary_publications (binary_release_id, archive_id, distroarchseries_id, pocket,
                                              binary_name, version, component, section, priority,
                                              architecture_specific, binary_format, status,
                                              date_created, date_published, creator_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                self.binary_release_id,
                self.archive_id,
                self.distroarchseries_id,
                self.pocket.as_str(),
                &self.binary_name,
                &self.version,
                &self.component,
                &self.section,
                self.priority.as_str(),
                self.architecture_specific as i32,
                self.binary_format.as_str(),
                self.status.as_str(),
                &date_created,
                &self.date_published,
                self.creator_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.date_created = Some(date_created);
        Ok(id)
    }

    /// Find a publication by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp WHERE bpp.id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a publication by ID, failing if it does not exist
    pub fn get(conn: &Connection, id: i64) -> Result<Self> {
        Self::find_by_id(conn, id)?
            .ok_or_else(|| Error::NotFound(format!("binary publication {id}")))
    }

    /// Find several publications by ID, in ID order
    pub fn find_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Self>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp WHERE bpp.id IN ({}) ORDER BY bpp.id",
            super::placeholders(ids.len())
        ))?;
        let pubs = stmt
            .query_map(rusqlite::params_from_iter(ids), Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// Publications of one binary release in (archive, pocket) across
    /// every architecture
    pub fn find_by_release(
        conn: &Connection,
        binary_release_id: i64,
        archive_id: i64,
        pocket: Pocket,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp
             WHERE bpp.binary_release_id = ?1 AND bpp.archive_id = ?2 AND bpp.pocket = ?3
             ORDER BY bpp.id"
        ))?;
        let pubs = stmt
            .query_map(
                params![binary_release_id, archive_id, pocket.as_str()],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// Active publications in (archive, series, pocket), by name then architecture
    pub fn find_active_in_series(
        conn: &Connection,
        archive_id: i64,
        distroseries_id: i64,
        pocket: Pocket,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp
             JOIN distroarchseries das ON das.id = bpp.distroarchseries_id
             WHERE bpp.archive_id = ?1 AND das.distroseries_id = ?2 AND bpp.pocket = ?3
               AND bpp.status IN ('pending', 'published')
             ORDER BY bpp.binary_name, das.architecture_tag, bpp.id"
        ))?;
        let pubs = stmt
            .query_map(
                params![archive_id, distroseries_id, pocket.as_str()],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// Active publications of the same architecture-independent artifact:
    /// same release, archive, pocket and overrides, on every enabled
    /// architecture of this publication's series (this one included)
    pub fn find_siblings(&self, conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp
             JOIN distroarchseries das ON das.id = bpp.distroarchseries_id
             WHERE bpp.binary_release_id = ?1 AND bpp.archive_id = ?2 AND bpp.pocket = ?3
               AND bpp.component = ?4 AND bpp.section = ?5 AND bpp.priority = ?6
               AND bpp.status IN ('pending', 'published')
               AND das.enabled = 1
               AND das.distroseries_id = (SELECT distroseries_id FROM distroarchseries WHERE id = ?7)
             ORDER BY bpp.id"
        ))?;
        let pubs = stmt
            .query_map(
                params![
                    self.binary_release_id,
                    self.archive_id,
                    self.pocket.as_str(),
                    &self.component,
                    &self.section,
                    self.priority.as_str(),
                    self.distroarchseries_id,
                ],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// The active DDEB publication paired with this binary in `debug_archive_id`
    ///
    /// Matched on architecture, pocket and overrides.
    pub fn find_debug_sibling(&self, conn: &Connection, debug_archive_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp
             WHERE bpp.binary_release_id = (SELECT debug_release_id FROM binary_releases WHERE id = ?1)
               AND bpp.archive_id = ?2 AND bpp.distroarchseries_id = ?3 AND bpp.pocket = ?4
               AND bpp.component = ?5 AND bpp.section = ?6 AND bpp.priority = ?7
               AND bpp.status IN ('pending', 'published')
             ORDER BY bpp.id DESC LIMIT 1"
        ))?;
        Ok(stmt
            .query_row(
                params![
                    self.binary_release_id,
                    debug_archive_id,
                    self.distroarchseries_id,
                    self.pocket.as_str(),
                    &self.component,
                    &self.section,
                    self.priority.as_str(),
                ],
                Self::from_row,
            )
            .optional()?)
    }

    /// Publications in an archive, optionally narrowed by name and status
    pub fn list(
        conn: &Connection,
        archive_id: i64,
        name: Option<&str>,
        status: Option<PublishingStatus>,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {BPP_COLUMNS} FROM binary_publications bpp
             WHERE bpp.archive_id = ?1
               AND (?2 IS NULL OR bpp.binary_name = ?2)
               AND (?3 IS NULL OR bpp.status = ?3)
             ORDER BY bpp.binary_name, bpp.id"
        ))?;
        let pubs = stmt
            .query_map(
                params![archive_id, name, status.map(|s| s.as_str())],
                Self::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }

    /// The published binary release
    pub fn release(&self, conn: &Connection) -> Result<BinaryRelease> {
        BinaryRelease::get(conn, self.binary_release_id)
    }

    /// Architecture tag of the target architecture series
    pub fn architecture_tag(&self, conn: &Connection) -> Result<String> {
        let mut stmt =
            conn.prepare_cached("SELECT architecture_tag FROM distroarchseries WHERE id = ?1")?;
        Ok(stmt.query_row([self.distroarchseries_id], |row| row.get(0))?)
    }

    /// Move to PUBLISHED
    pub fn mark_published(&mut self, conn: &Connection) -> Result<()> {
        check_transition(self.id, self.status, PublishingStatus::Published)?;
        let now = db::now();
        conn.execute(
            "UPDATE binary_publications SET status = 'published', date_published = ?1 WHERE id = ?2",
            params![&now, self.id],
        )?;
        self.status = PublishingStatus::Published;
        self.date_published = Some(now);
        Ok(())
    }

    /// Move to SUPERSEDED, optionally recording the dominant build
    pub fn mark_superseded(&mut self, conn: &Connection, dominant_build_id: Option<i64>) -> Result<()> {
        check_transition(self.id, self.status, PublishingStatus::Superseded)?;
        let now = db::now();
        conn.execute(
            "UPDATE binary_publications
             SET status = 'superseded', date_superseded = ?1, superseded_by_build_id = ?2
             WHERE id = ?3",
            params![&now, dominant_build_id, self.id],
        )?;
        self.status = PublishingStatus::Superseded;
        self.date_superseded = Some(now);
        self.superseded_by_build_id = dominant_build_id;
        Ok(())
    }

    /// Move to a removal status (DELETED or OBSOLETE) with bookkeeping
    pub fn mark_removed(
        &mut self,
        conn: &Connection,
        status: PublishingStatus,
        removed_by_id: Option<i64>,
        comment: Option<&str>,
    ) -> Result<()> {
        check_removal(self.id, self.status, status)?;
        let now = db::now();
        conn.execute(
            "UPDATE binary_publications
             SET status = ?1, date_removed = ?2, removed_by_id = ?3, removal_comment = ?4
             WHERE id = ?5",
            params![status.as_str(), &now, removed_by_id, comment, self.id],
        )?;
        self.status = status;
        self.date_removed = Some(now);
        self.removed_by_id = removed_by_id;
        self.removal_comment = comment.map(str::to_string);
        Ok(())
    }

    pub fn is_ddeb(&self) -> bool {
        self.binary_format == BinaryFormat::Ddeb
    }

    /// `name version`
    pub fn display_name(&self) -> String {
        format!("{} {}", self.binary_name, self.version)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            binary_release_id: row.get(1)?,
            archive_id: row.get(2)?,
            distroarchseries_id: row.get(3)?,
            pocket: super::parse_column(row, 4)?,
            binary_name: row.get(5)?,
            version: row.get(6)?,
            component: row.get(7)?,
            section: row.get(8)?,
            priority: super::parse_column(row, 9)?,
            architecture_specific: row.get::<_, i32>(10)? != 0,
            binary_format: super::parse_column(row, 11)?,
            status: super::parse_column(row, 12)?,
            date_created: row.get(13)?,
            date_published: row.get(14)?,
            date_superseded: row.get(15)?,
            date_removed: row.get(16)?,
            superseded_by_build_id: row.get(17)?,
            creator_id: row.get(18)?,
            removed_by_id: row.get(19)?,
            removal_comment: row.get(20)?,
        })
    }
}

/// Either kind of publication
///
/// Lifecycle operations (publishing, domination, deletion, override
/// changes) accept this and match exhaustively on the kind.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Publication {
    Source(SourcePublication),
    Binary(BinaryPublication),
}

impl Publication {
    pub fn id(&self) -> Option<i64> {
        match self {
            Publication::Source(spp) => spp.id,
            Publication::Binary(bpp) => bpp.id,
        }
    }

    pub fn status(&self) -> PublishingStatus {
        match self {
            Publication::Source(spp) => spp.status,
            Publication::Binary(bpp) => bpp.status,
        }
    }

    pub fn archive_id(&self) -> i64 {
        match self {
            Publication::Source(spp) => spp.archive_id,
            Publication::Binary(bpp) => bpp.archive_id,
        }
    }

    pub fn pocket(&self) -> Pocket {
        match self {
            Publication::Source(spp) => spp.pocket,
            Publication::Binary(bpp) => bpp.pocket,
        }
    }

    pub fn component(&self) -> &str {
        match self {
            Publication::Source(spp) => &spp.component,
            Publication::Binary(bpp) => &bpp.component,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Publication::Source(spp) => spp.display_name(),
            Publication::Binary(bpp) => bpp.display_name(),
        }
    }

    /// Move to PUBLISHED, as the disk-pool writer does
    pub fn mark_published(&mut self, conn: &Connection) -> Result<()> {
        match self {
            Publication::Source(spp) => spp.mark_published(conn),
            Publication::Binary(bpp) => bpp.mark_published(conn),
        }
    }
}

impl From<SourcePublication> for Publication {
    fn from(spp: SourcePublication) -> Self {
        Publication::Source(spp)
    }
}

impl From<BinaryPublication> for Publication {
    fn from(bpp: BinaryPublication) -> Self {
        Publication::Binary(bpp)
    }
}
