// src/publishing/set.rs

//! Batch queries and inserts over publications
//!
//! Everything here costs a bounded number of statements regardless of how
//! many publications are involved, so batch copies stay cheap.

use crate::db;
use crate::db::models::{
    Archive, BinaryPublication, BuildStatus, Pocket, Priority, PublishingStatus, SourcePublication,
    placeholders,
};
use crate::error::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Default rows per bulk insert statement
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Aggregate build state of one source publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSetStatus {
    NeedsBuild,
    Building,
    FullyBuilt,
    /// Every build finished but some binaries are not yet published
    FullyBuiltPending,
    Failed,
}

impl BuildSetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildSetStatus::NeedsBuild => "needs_build",
            BuildSetStatus::Building => "building",
            BuildSetStatus::FullyBuilt => "fully_built",
            BuildSetStatus::FullyBuiltPending => "fully_built_pending",
            BuildSetStatus::Failed => "failed",
        }
    }
}

/// Build summary for one source publication
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BuildSummary {
    pub status: BuildSetStatus,
    pub build_ids: Vec<i64>,
}

/// One binary release to publish on one architecture series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTarget {
    pub binary_release_id: i64,
    pub distroarchseries_id: i64,
    pub component: String,
    pub section: String,
    pub priority: Priority,
    pub is_ddeb: bool,
}

/// Batch publication operations
#[derive(Debug, Clone, Copy)]
pub struct PublishingSet {
    batch_size: usize,
}

impl Default for PublishingSet {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

struct BuildRow {
    build_id: i64,
    status: BuildStatus,
    binaries: i64,
    published: i64,
}

impl PublishingSet {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Publish binaries into `archive`/`pocket`, skipping targets that
    /// already have an active publication of the same name and version on
    /// the same architecture
    ///
    /// DDEB targets aimed at a primary archive land in its debug archive.
    /// Each chunk of `batch_size` targets is a single conflict-aware
    /// `INSERT ... SELECT ... WHERE NOT EXISTS` statement.
    pub fn publish_binaries(
        &self,
        conn: &Connection,
        archive: &Archive,
        pocket: Pocket,
        creator_id: Option<i64>,
        targets: &[BinaryTarget],
    ) -> Result<Vec<BinaryPublication>> {
        let archive_id = archive.id.unwrap_or_default();
        let debug_archive_id = if archive.is_primary() && targets.iter().any(|t| t.is_ddeb) {
            archive.debug_archive(conn)?.id.unwrap_or_default()
        } else {
            archive_id
        };

        let mut by_archive: HashMap<i64, Vec<&BinaryTarget>> = HashMap::new();
        let mut seen = HashSet::new();
        for target in targets {
            let target_archive = if target.is_ddeb { debug_archive_id } else { archive_id };
            if seen.insert((target_archive, target.binary_release_id, target.distroarchseries_id)) {
                by_archive.entry(target_archive).or_default().push(target);
            }
        }

        let mut ids = Vec::new();
        let mut archive_ids: Vec<_> = by_archive.keys().copied().collect();
        archive_ids.sort_unstable();
        for target_archive in archive_ids {
            for chunk in by_archive[&target_archive].chunks(self.batch_size) {
                ids.extend(insert_chunk(conn, target_archive, pocket, creator_id, chunk)?);
            }
        }
        debug!(
            "Published {} of {} binary targets in archive {}",
            ids.len(),
            targets.len(),
            archive.name
        );
        BinaryPublication::find_by_ids(conn, &ids)
    }

    /// Build summaries for many source publications in one query
    pub fn build_status_summaries(
        &self,
        conn: &Connection,
        sources: &[SourcePublication],
    ) -> Result<HashMap<i64, BuildSummary>> {
        let ids: Vec<i64> = sources.iter().filter_map(|spp| spp.id).collect();
        let mut rows: HashMap<i64, Vec<BuildRow>> = ids.iter().map(|id| (*id, Vec::new())).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            "SELECT spp.id, b.id, b.status,
                    (SELECT COUNT(*) FROM binary_releases br WHERE br.build_id = b.id),
                    (SELECT COUNT(DISTINCT br.id) FROM binary_releases br
                     JOIN binary_publications bpp ON bpp.binary_release_id = br.id
                     WHERE br.build_id = b.id AND bpp.archive_id = spp.archive_id
                       AND bpp.status = 'published')
             FROM source_publications spp
             JOIN builds b ON b.source_release_id = spp.source_release_id
             JOIN distroarchseries das ON das.id = b.distroarchseries_id
             WHERE spp.id IN ({})
               AND ((b.archive_id = spp.archive_id AND das.distroseries_id = spp.distroseries_id)
                    OR EXISTS (
                        SELECT 1 FROM binary_releases br
                        JOIN binary_publications bpp ON bpp.binary_release_id = br.id
                        JOIN distroarchseries pdas ON pdas.id = bpp.distroarchseries_id
                        WHERE br.build_id = b.id AND bpp.archive_id = spp.archive_id
                          AND pdas.distroseries_id = spp.distroseries_id))
             ORDER BY spp.id, b.id",
            placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let fetched = stmt
            .query_map(params_from_iter(&ids), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    BuildRow {
                        build_id: row.get(1)?,
                        status: crate::db::models::parse_column(row, 2)?,
                        binaries: row.get(3)?,
                        published: row.get(4)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (spp_id, build) in fetched {
            rows.entry(spp_id).or_default().push(build);
        }

        Ok(rows
            .into_iter()
            .map(|(id, builds)| (id, summarize(&builds)))
            .collect())
    }

    /// Build summary for a single source publication
    pub fn build_status_summary(&self, conn: &Connection, source: &SourcePublication) -> Result<BuildSummary> {
        let mut summaries = self.build_status_summaries(conn, std::slice::from_ref(source))?;
        Ok(summaries
            .remove(&source.id.unwrap_or_default())
            .unwrap_or(BuildSummary {
                status: BuildSetStatus::NeedsBuild,
                build_ids: Vec::new(),
            }))
    }

    /// Nearest ancestor of a source package in an archive
    ///
    /// The most recent publication of `name` with one of `statuses`,
    /// optionally limited to a series and pocket.
    pub fn find_source_ancestor(
        &self,
        conn: &Connection,
        archive_id: i64,
        name: &str,
        distroseries_id: Option<i64>,
        pocket: Option<Pocket>,
        statuses: &[PublishingStatus],
    ) -> Result<Option<SourcePublication>> {
        if statuses.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {} FROM source_publications spp
             WHERE spp.archive_id = ? AND spp.source_name = ?
               AND (? IS NULL OR spp.distroseries_id = ?)
               AND (? IS NULL OR spp.pocket = ?)
               AND spp.status IN ({})
             ORDER BY spp.id DESC LIMIT 1",
            crate::db::models::SPP_COLUMNS,
            placeholders(statuses.len())
        );
        let pocket = pocket.map(|p| p.as_str());
        let mut values: Vec<Value> = vec![
            archive_id.into(),
            name.to_string().into(),
            distroseries_id.into(),
            distroseries_id.into(),
            pocket.map(str::to_string).into(),
            pocket.map(str::to_string).into(),
        ];
        values.extend(statuses.iter().map(|s| Value::from(s.as_str().to_string())));

        let mut stmt = conn.prepare(&sql)?;
        Ok(stmt
            .query_row(params_from_iter(values), SourcePublication::from_row)
            .optional()?)
    }

    /// Nearest ancestor of a binary package in an archive
    ///
    /// Limited to one architecture series when `distroarchseries_id` is
    /// given, otherwise the whole archive is searched.
    pub fn find_binary_ancestor(
        &self,
        conn: &Connection,
        archive_id: i64,
        name: &str,
        distroarchseries_id: Option<i64>,
        pocket: Option<Pocket>,
        statuses: &[PublishingStatus],
    ) -> Result<Option<BinaryPublication>> {
        if statuses.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {} FROM binary_publications bpp
             WHERE bpp.archive_id = ? AND bpp.binary_name = ?
               AND (? IS NULL OR bpp.distroarchseries_id = ?)
               AND (? IS NULL OR bpp.pocket = ?)
               AND bpp.status IN ({})
             ORDER BY bpp.id DESC LIMIT 1",
            crate::db::models::BPP_COLUMNS,
            placeholders(statuses.len())
        );
        let pocket = pocket.map(|p| p.as_str());
        let mut values: Vec<Value> = vec![
            archive_id.into(),
            name.to_string().into(),
            distroarchseries_id.into(),
            distroarchseries_id.into(),
            pocket.map(str::to_string).into(),
            pocket.map(str::to_string).into(),
        ];
        values.extend(statuses.iter().map(|s| Value::from(s.as_str().to_string())));

        let mut stmt = conn.prepare(&sql)?;
        Ok(stmt
            .query_row(params_from_iter(values), BinaryPublication::from_row)
            .optional()?)
    }

    /// Publications of the given binary releases in (archive, series, pocket)
    pub fn binaries_in_context(
        &self,
        conn: &Connection,
        archive_id: i64,
        distroseries_id: i64,
        pocket: Pocket,
        binary_release_ids: &[i64],
    ) -> Result<Vec<BinaryPublication>> {
        if binary_release_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM binary_publications bpp
             JOIN distroarchseries das ON das.id = bpp.distroarchseries_id
             WHERE bpp.archive_id = ? AND das.distroseries_id = ? AND bpp.pocket = ?
               AND bpp.binary_release_id IN ({})
             ORDER BY bpp.id",
            crate::db::models::BPP_COLUMNS,
            placeholders(binary_release_ids.len())
        );
        let mut values: Vec<Value> = vec![
            archive_id.into(),
            distroseries_id.into(),
            pocket.as_str().to_string().into(),
        ];
        values.extend(binary_release_ids.iter().map(|id| Value::from(*id)));

        let mut stmt = conn.prepare(&sql)?;
        let pubs = stmt
            .query_map(params_from_iter(values), BinaryPublication::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pubs)
    }
}

fn summarize(builds: &[BuildRow]) -> BuildSummary {
    let relevant: Vec<&BuildRow> = builds
        .iter()
        .filter(|b| b.status != BuildStatus::Superseded)
        .collect();
    let build_ids = relevant.iter().map(|b| b.build_id).collect();

    let status = if relevant.is_empty() {
        BuildSetStatus::NeedsBuild
    } else if relevant.iter().all(|b| b.status == BuildStatus::FullyBuilt) {
        if relevant.iter().any(|b| b.published < b.binaries) {
            BuildSetStatus::FullyBuiltPending
        } else {
            BuildSetStatus::FullyBuilt
        }
    } else if relevant.iter().any(|b| b.status.is_failed()) {
        BuildSetStatus::Failed
    } else if relevant
        .iter()
        .any(|b| matches!(b.status, BuildStatus::Building | BuildStatus::Uploading))
    {
        BuildSetStatus::Building
    } else {
        BuildSetStatus::NeedsBuild
    };

    BuildSummary { status, build_ids }
}

fn insert_chunk(
    conn: &Connection,
    archive_id: i64,
    pocket: Pocket,
    creator_id: Option<i64>,
    chunk: &[&BinaryTarget],
) -> Result<Vec<i64>> {
    let rows = vec!["(?, ?, ?, ?, ?)"; chunk.len()].join(", ");
    let sql = format!(
        "WITH candidates(binary_release_id, distroarchseries_id, component, section, priority)
             AS (VALUES {rows})
         INSERT INTO binary_publications (binary_release_id, archive_id, distroarchseries_id, pocket,
                                          binary_name, version, component, section, priority,
                                          architecture_specific, binary_format, status,
                                          date_created, creator_id)
         SELECT c.binary_release_id, ?, c.distroarchseries_id, ?,
                br.name, br.version, c.component, c.section, c.priority,
                br.architecture_specific, br.format, 'pending', ?, ?
         FROM candidates c
         JOIN binary_releases br ON br.id = c.binary_release_id
         WHERE NOT EXISTS (
             SELECT 1 FROM binary_publications bpp
             WHERE bpp.archive_id = ? AND bpp.pocket = ?
               AND bpp.distroarchseries_id = c.distroarchseries_id
               AND bpp.binary_name = br.name AND bpp.version = br.version
               AND bpp.status IN ('pending', 'published'))
         RETURNING id"
    );

    let pocket = pocket.as_str().to_string();
    let mut values: Vec<Value> = Vec::with_capacity(chunk.len() * 5 + 6);
    for target in chunk {
        values.push(target.binary_release_id.into());
        values.push(target.distroarchseries_id.into());
        values.push(target.component.clone().into());
        values.push(target.section.clone().into());
        values.push(target.priority.as_str().to_string().into());
    }
    values.push(archive_id.into());
    values.push(pocket.clone().into());
    values.push(db::now().into());
    values.push(creator_id.into());
    values.push(archive_id.into());
    values.push(pocket.into());

    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(values), |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: BuildStatus, binaries: i64, published: i64) -> BuildRow {
        BuildRow {
            build_id: 1,
            status,
            binaries,
            published,
        }
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(&[]).status, BuildSetStatus::NeedsBuild);
        assert_eq!(
            summarize(&[row(BuildStatus::FullyBuilt, 2, 2)]).status,
            BuildSetStatus::FullyBuilt
        );
        assert_eq!(
            summarize(&[row(BuildStatus::FullyBuilt, 2, 1)]).status,
            BuildSetStatus::FullyBuiltPending
        );
        assert_eq!(
            summarize(&[
                row(BuildStatus::FullyBuilt, 1, 1),
                row(BuildStatus::FailedToBuild, 0, 0)
            ])
            .status,
            BuildSetStatus::Failed
        );
        assert_eq!(
            summarize(&[
                row(BuildStatus::FullyBuilt, 1, 1),
                row(BuildStatus::Uploading, 0, 0)
            ])
            .status,
            BuildSetStatus::Building
        );
        assert_eq!(
            summarize(&[
                row(BuildStatus::NeedsBuild, 0, 0),
                row(BuildStatus::Superseded, 0, 0)
            ])
            .status,
            BuildSetStatus::NeedsBuild
        );
        // Superseded builds are ignored entirely
        assert_eq!(
            summarize(&[row(BuildStatus::Superseded, 0, 0)]).status,
            BuildSetStatus::NeedsBuild
        );
    }
}
