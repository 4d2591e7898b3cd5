// src/publishing/deletion.rs

//! Operator-driven lifecycle changes: removal, override changes and the
//! PENDING -> PUBLISHED step taken by the disk-pool writer

use super::overrides::check_component;
use crate::db;
use crate::db::models::{
    Archive, BinaryPublication, DifferenceJob, DistroArchSeries, DistroSeries, Person, Priority,
    Publication, PublishingStatus, SourcePublication,
};
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Mark publications DELETED
///
/// Deleting a source also deletes its active binaries in the same context
/// and queues a difference job for every series derived from its series.
/// Returns the IDs of every publication deleted, cascades included.
pub fn request_deletion(
    conn: &mut Connection,
    publications: &mut [Publication],
    removed_by: Option<&Person>,
    comment: Option<&str>,
) -> Result<Vec<i64>> {
    remove(conn, publications, PublishingStatus::Deleted, removed_by, comment)
}

/// Mark publications OBSOLETE, e.g. when their series reaches end of life
pub fn request_obsolescence(
    conn: &mut Connection,
    publications: &mut [Publication],
    removed_by: Option<&Person>,
    comment: Option<&str>,
) -> Result<Vec<i64>> {
    remove(conn, publications, PublishingStatus::Obsolete, removed_by, comment)
}

fn remove(
    conn: &mut Connection,
    publications: &mut [Publication],
    status: PublishingStatus,
    removed_by: Option<&Person>,
    comment: Option<&str>,
) -> Result<Vec<i64>> {
    let removed_by_id = removed_by.and_then(|p| p.id);
    let removed = db::transaction(conn, |tx| {
        let mut removed = Vec::new();
        for publication in publications.iter_mut() {
            match publication {
                Publication::Source(spp) => {
                    spp.mark_removed(tx, status, removed_by_id, comment)?;
                    removed.extend(spp.id);
                    for mut bpp in spp.active_binaries(tx)? {
                        bpp.mark_removed(tx, status, removed_by_id, comment)?;
                        removed.extend(bpp.id);
                    }
                    if status == PublishingStatus::Deleted {
                        queue_difference_jobs(tx, spp)?;
                    }
                }
                Publication::Binary(bpp) => {
                    bpp.mark_removed(tx, status, removed_by_id, comment)?;
                    removed.extend(bpp.id);
                }
            }
        }
        Ok(removed)
    })?;
    info!("Marked {} publications {}", removed.len(), status);
    Ok(removed)
}

fn queue_difference_jobs(conn: &Connection, spp: &SourcePublication) -> Result<()> {
    let Some(series) = DistroSeries::find_by_id(conn, spp.distroseries_id)? else {
        return Ok(());
    };
    for derived in series.derived_series(conn)? {
        let mut job = DifferenceJob::new(
            derived.id.unwrap_or_default(),
            spp.distroseries_id,
            &spp.source_name,
        );
        if job.insert_if_absent(conn)? {
            debug!(
                "Queued difference job for {} in {}",
                spp.source_name, derived.name
            );
        }
    }
    Ok(())
}

/// Requested override values; `None` keeps the current one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideChange {
    pub component: Option<String>,
    pub section: Option<String>,
    pub priority: Option<Priority>,
}

impl OverrideChange {
    fn is_noop_for(&self, component: &str, section: &str, priority: Option<Priority>) -> bool {
        self.component.as_deref().is_none_or(|c| c == component)
            && self.section.as_deref().is_none_or(|s| s == section)
            && self.priority.is_none_or(|p| Some(p) == priority)
    }
}

/// Change a publication's overrides
///
/// The current publication is superseded and a new PENDING one carrying the
/// new values takes its place. For architecture-independent binaries every
/// sibling moves together. Returns the new publications; an empty list
/// means nothing needed to change.
pub fn change_override(
    conn: &mut Connection,
    publication: &Publication,
    change: &OverrideChange,
) -> Result<Vec<Publication>> {
    if !publication.status().is_active() {
        return Err(Error::IllegalTarget(format!(
            "cannot override {} publication {}",
            publication.status(),
            publication.display_name()
        )));
    }

    let created = db::transaction(conn, |tx| {
        let archive = Archive::get(tx, publication.archive_id())?;
        match publication {
            Publication::Source(spp) => {
                if change.is_noop_for(&spp.component, &spp.section, None) {
                    return Ok(Vec::new());
                }
                let series = DistroSeries::find_by_id(tx, spp.distroseries_id)?
                    .ok_or_else(|| Error::NotFound(format!("series {}", spp.distroseries_id)))?;
                if let Some(component) = &change.component {
                    check_component(tx, &archive, &series, component)?;
                }
                let created = override_source(tx, spp, change)?;
                Ok(vec![Publication::Source(created)])
            }
            Publication::Binary(bpp) => {
                if change.is_noop_for(&bpp.component, &bpp.section, Some(bpp.priority)) {
                    return Ok(Vec::new());
                }
                let das = DistroArchSeries::find_by_id(tx, bpp.distroarchseries_id)?
                    .ok_or_else(|| {
                        Error::NotFound(format!("architecture series {}", bpp.distroarchseries_id))
                    })?;
                let series = DistroSeries::find_by_id(tx, das.distroseries_id)?
                    .ok_or_else(|| Error::NotFound(format!("series {}", das.distroseries_id)))?;
                if let Some(component) = &change.component {
                    check_component(tx, &archive, &series, component)?;
                }
                let group = if bpp.architecture_specific {
                    vec![bpp.clone()]
                } else {
                    bpp.find_siblings(tx)?
                };
                let mut created = Vec::with_capacity(group.len());
                for mut member in group {
                    created.push(Publication::Binary(override_binary(tx, &mut member, change)?));
                }
                Ok(created)
            }
        }
    })?;

    if !created.is_empty() {
        info!(
            "Changed overrides of {} ({} new publications)",
            publication.display_name(),
            created.len()
        );
    }
    Ok(created)
}

fn override_source(
    conn: &Connection,
    current: &SourcePublication,
    change: &OverrideChange,
) -> Result<SourcePublication> {
    let mut old = current.clone();
    old.mark_superseded(conn, None)?;

    let mut new = SourcePublication {
        id: None,
        status: PublishingStatus::Pending,
        date_created: None,
        date_published: None,
        date_superseded: None,
        date_removed: None,
        superseded_by_release_id: None,
        ancestor_id: current.id,
        removed_by_id: None,
        removal_comment: None,
        ..current.clone()
    };
    if let Some(component) = &change.component {
        new.component = component.clone();
    }
    if let Some(section) = &change.section {
        new.section = section.clone();
    }
    new.insert(conn)?;
    Ok(new)
}

fn override_binary(
    conn: &Connection,
    current: &mut BinaryPublication,
    change: &OverrideChange,
) -> Result<BinaryPublication> {
    let mut new = BinaryPublication {
        id: None,
        status: PublishingStatus::Pending,
        date_created: None,
        date_published: None,
        date_superseded: None,
        date_removed: None,
        superseded_by_build_id: None,
        removed_by_id: None,
        removal_comment: None,
        ..current.clone()
    };
    current.mark_superseded(conn, None)?;

    if let Some(component) = &change.component {
        new.component = component.clone();
    }
    if let Some(section) = &change.section {
        new.section = section.clone();
    }
    if let Some(priority) = change.priority {
        new.priority = priority;
    }
    new.insert(conn)?;
    Ok(new)
}

/// Move a PENDING publication to PUBLISHED
pub fn set_published(conn: &Connection, publication: &mut Publication) -> Result<()> {
    publication.mark_published(conn)?;
    debug!("Published {}", publication.display_name());
    Ok(())
}
