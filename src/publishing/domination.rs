// src/publishing/domination.rs

//! Supersession of redundant publications
//!
//! A binary that is architecture independent is one artifact published on
//! every architecture, so it is superseded everywhere at once. DDEBs follow
//! their parent binary and are never superseded on their own.

use crate::db;
use crate::db::models::{
    ACTIVE_STATUSES, Archive, BinaryPublication, DistroSeries, Pocket, Publication,
    PublishingStatus, SourcePublication,
};
use crate::error::{Error, Result};
use crate::version::compare_versions;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Supersede a source publication, recording the dominant release if known
///
/// Binaries are left alone; they are dominated on their own by newer builds.
pub fn supersede_source(
    conn: &Connection,
    spp: &mut SourcePublication,
    dominant_release_id: Option<i64>,
) -> Result<()> {
    spp.mark_superseded(conn, dominant_release_id)?;
    debug!("Superseded source {} in archive {}", spp.display_name(), spp.archive_id);
    Ok(())
}

/// Supersede a binary publication and everything that must go with it
///
/// Returns every publication superseded, `bpp` first.
pub fn supersede_binary(
    conn: &Connection,
    bpp: &mut BinaryPublication,
    dominant_build_id: Option<i64>,
) -> Result<Vec<BinaryPublication>> {
    if bpp.is_ddeb() {
        return Err(Error::IllegalTarget(format!(
            "{} is a DDEB; it is superseded with its parent binary",
            bpp.display_name()
        )));
    }
    if bpp.architecture_specific && bpp.date_published.is_none() {
        return Err(Error::InvalidTransition {
            id: bpp.id.unwrap_or_default(),
            from: "unpublished".to_string(),
            to: PublishingStatus::Superseded.to_string(),
        });
    }

    let siblings = if bpp.architecture_specific {
        Vec::new()
    } else {
        bpp.find_siblings(conn)?
    };

    bpp.mark_superseded(conn, dominant_build_id)?;
    let mut superseded = vec![bpp.clone()];
    for mut sibling in siblings {
        if sibling.id == bpp.id {
            continue;
        }
        sibling.mark_superseded(conn, dominant_build_id)?;
        superseded.push(sibling);
    }

    let archive = Archive::get(conn, bpp.archive_id)?;
    let debug_archive_id = archive.debug_archive_id.unwrap_or(bpp.archive_id);
    let mut with_debug = Vec::with_capacity(superseded.len());
    for parent in superseded {
        if let Some(mut ddeb) = parent.find_debug_sibling(conn, debug_archive_id)? {
            ddeb.mark_superseded(conn, dominant_build_id)?;
            with_debug.push(parent);
            with_debug.push(ddeb);
        } else {
            with_debug.push(parent);
        }
    }

    debug!(
        "Superseded binary {} ({} publications)",
        bpp.display_name(),
        with_debug.len()
    );
    Ok(with_debug)
}

/// Supersede either kind of publication
///
/// `dominant` is a source release ID for sources and a build ID for binaries.
/// Returns how many publications changed state.
pub fn supersede(conn: &Connection, publication: &mut Publication, dominant: Option<i64>) -> Result<usize> {
    match publication {
        Publication::Source(spp) => {
            supersede_source(conn, spp, dominant)?;
            Ok(1)
        }
        Publication::Binary(bpp) => Ok(supersede_binary(conn, bpp, dominant)?.len()),
    }
}

/// What a domination run changed
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DominationReport {
    pub sources_superseded: usize,
    pub binaries_superseded: usize,
    /// Older arch-specific binaries left alone because they never reached PUBLISHED
    pub binaries_skipped: usize,
}

/// Keeps only the newest version of each package active in a context
pub struct Dominator<'a> {
    archive: &'a Archive,
}

impl<'a> Dominator<'a> {
    pub fn new(archive: &'a Archive) -> Self {
        Self { archive }
    }

    /// Dominate one (series, pocket) of the archive in a single transaction
    pub fn dominate(
        &self,
        conn: &mut Connection,
        series: &DistroSeries,
        pocket: Pocket,
    ) -> Result<DominationReport> {
        let report = db::transaction(conn, |tx| {
            let mut report = DominationReport::default();
            self.dominate_sources(tx, series, pocket, &mut report)?;
            self.dominate_binaries(tx, series, pocket, &mut report)?;
            Ok(report)
        })?;
        info!(
            "Dominated {}/{}: {} sources and {} binaries superseded",
            self.archive.name,
            pocket.suite(&series.name),
            report.sources_superseded,
            report.binaries_superseded
        );
        Ok(report)
    }

    fn dominate_sources(
        &self,
        conn: &Connection,
        series: &DistroSeries,
        pocket: Pocket,
        report: &mut DominationReport,
    ) -> Result<()> {
        let active = SourcePublication::find_in_context(
            conn,
            self.archive.id.unwrap_or_default(),
            series.id.unwrap_or_default(),
            pocket,
            &ACTIVE_STATUSES,
        )?;
        let mut by_name: BTreeMap<String, Vec<SourcePublication>> = BTreeMap::new();
        for spp in active {
            by_name.entry(spp.source_name.clone()).or_default().push(spp);
        }

        for (name, mut pubs) in by_name {
            if pubs.len() < 2 {
                continue;
            }
            pubs.sort_by(|a, b| newest_first(&a.version, &b.version));
            let dominant_release = pubs[0].source_release_id;
            for spp in pubs.iter_mut().skip(1) {
                supersede_source(conn, spp, Some(dominant_release))?;
                report.sources_superseded += 1;
            }
            debug!("Kept {} {} in {}", name, pubs[0].version, series.name);
        }
        Ok(())
    }

    fn dominate_binaries(
        &self,
        conn: &Connection,
        series: &DistroSeries,
        pocket: Pocket,
        report: &mut DominationReport,
    ) -> Result<()> {
        let active = BinaryPublication::find_active_in_series(
            conn,
            self.archive.id.unwrap_or_default(),
            series.id.unwrap_or_default(),
            pocket,
        )?;
        let mut groups: BTreeMap<(String, i64), Vec<BinaryPublication>> = BTreeMap::new();
        for bpp in active.into_iter().filter(|bpp| !bpp.is_ddeb()) {
            groups
                .entry((bpp.binary_name.clone(), bpp.distroarchseries_id))
                .or_default()
                .push(bpp);
        }

        let mut done: HashSet<i64> = HashSet::new();
        for (_, mut pubs) in groups {
            if pubs.len() < 2 {
                continue;
            }
            pubs.sort_by(|a, b| newest_first(&a.version, &b.version));
            let dominant_build = pubs[0].release(conn)?.build_id;
            for bpp in pubs.iter_mut().skip(1) {
                if bpp.id.is_some_and(|id| done.contains(&id)) {
                    continue;
                }
                if bpp.architecture_specific && bpp.date_published.is_none() {
                    debug!("Not superseding unpublished {}", bpp.display_name());
                    report.binaries_skipped += 1;
                    continue;
                }
                for superseded in supersede_binary(conn, bpp, Some(dominant_build))? {
                    done.extend(superseded.id);
                    if !superseded.is_ddeb() {
                        report.binaries_superseded += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

fn newest_first(a: &str, b: &str) -> Ordering {
    compare_versions(b, a)
}
