// src/commands/publication.rs
//! Publication lifecycle commands

use super::{find_archive, find_person, find_series, parse_pocket};
use crate::cli::ArchiveArgs;
use anyhow::{Context, Result};
use depot::db::models::{
    BinaryPublication, Build, Priority, Publication, PublishingStatus, SourcePublication,
    SourceRelease,
};
use depot::librarian::pool_path;
use depot::publishing::{self, Dominator, OverrideChange, PublishingSet};
use rusqlite::Connection;
use tracing::info;

fn load_publications(conn: &Connection, ids: &[i64], binary: bool) -> Result<Vec<Publication>> {
    ids.iter()
        .map(|&id| -> Result<Publication> {
            let publication = if binary {
                Publication::from(BinaryPublication::get(conn, id)?)
            } else {
                Publication::from(SourcePublication::get(conn, id)?)
            };
            Ok(publication)
        })
        .collect()
}

/// Delete or obsolete publications
pub fn cmd_delete(
    db_path: &str,
    ids: &[i64],
    binary: bool,
    comment: Option<&str>,
    person: Option<&str>,
    obsolete: bool,
) -> Result<()> {
    let mut conn = depot::db::open(db_path)?;
    let person = find_person(&conn, person)?;
    let mut publications = load_publications(&conn, ids, binary)?;

    let removed = if obsolete {
        publishing::request_obsolescence(&mut conn, &mut publications, person.as_ref(), comment)?
    } else {
        publishing::request_deletion(&mut conn, &mut publications, person.as_ref(), comment)?
    };

    let action = if obsolete { "Obsoleted" } else { "Deleted" };
    println!("{} {} publication(s):", action, removed.len());
    for publication in &publications {
        println!("  {}", publication.display_name());
    }
    Ok(())
}

/// Change a publication's overrides
pub fn cmd_override(
    db_path: &str,
    id: i64,
    binary: bool,
    component: Option<String>,
    section: Option<String>,
    priority: Option<&str>,
) -> Result<()> {
    let mut conn = depot::db::open(db_path)?;
    let publication = load_publications(&conn, &[id], binary)?
        .pop()
        .context("Publication not found")?;
    let priority = priority
        .map(|p| p.parse::<Priority>().map_err(anyhow::Error::msg))
        .transpose()?;

    let change = OverrideChange {
        component,
        section,
        priority,
    };
    let created = publishing::change_override(&mut conn, &publication, &change)?;
    if created.is_empty() {
        println!("{} already has these overrides", publication.display_name());
        return Ok(());
    }
    println!("Overrode {} publication(s):", created.len());
    for new in &created {
        println!(
            "  {} -> {} (id {})",
            new.display_name(),
            new.component(),
            new.id().unwrap_or_default()
        );
    }
    Ok(())
}

/// Pool paths of the files behind a publication
fn publication_pool_paths(conn: &Connection, publication: &Publication) -> Result<Vec<String>> {
    let paths = match publication {
        Publication::Source(spp) => spp
            .release(conn)?
            .files(conn)?
            .iter()
            .map(|file| pool_path(&spp.component, &spp.source_name, &file.filename))
            .collect(),
        Publication::Binary(bpp) => {
            let release = bpp.release(conn)?;
            let build = Build::get(conn, release.build_id)?;
            let source = SourceRelease::get(conn, build.source_release_id)?;
            release
                .files(conn)?
                .iter()
                .map(|file| pool_path(&bpp.component, &source.name, &file.filename))
                .collect()
        }
    };
    Ok(paths)
}

/// Mark every pending publication of an archive published
pub fn cmd_publish(db_path: &str, archive: &ArchiveArgs, show_pool: bool) -> Result<()> {
    let mut conn = depot::db::open(db_path)?;
    let archive = find_archive(&conn, &archive.distribution, &archive.archive)?;
    let archive_id = archive.id.unwrap_or_default();

    let mut pending: Vec<Publication> =
        SourcePublication::list(&conn, archive_id, None, Some(PublishingStatus::Pending))?
            .into_iter()
            .map(Publication::from)
            .collect();
    pending.extend(
        BinaryPublication::list(&conn, archive_id, None, Some(PublishingStatus::Pending))?
            .into_iter()
            .map(Publication::from),
    );
    if pending.is_empty() {
        println!("Nothing pending in {}", archive.name);
        return Ok(());
    }

    info!("Publishing {} pending publications in {}", pending.len(), archive.name);
    depot::db::transaction(&mut conn, |tx| {
        for publication in pending.iter_mut() {
            publishing::set_published(tx, publication)?;
        }
        Ok(())
    })?;

    println!("Published {} publication(s) in {}", pending.len(), archive.name);
    for publication in &pending {
        println!("  {}", publication.display_name());
        if show_pool {
            for path in publication_pool_paths(&conn, publication)? {
                println!("      {}", path);
            }
        }
    }
    Ok(())
}

/// Supersede older versions in one suite of an archive
pub fn cmd_dominate(
    db_path: &str,
    archive: &ArchiveArgs,
    series: &str,
    pocket: &str,
    format: &str,
) -> Result<()> {
    let mut conn = depot::db::open(db_path)?;
    let archive = find_archive(&conn, &archive.distribution, &archive.archive)?;
    let series = find_series(&conn, &archive, series)?;
    let pocket = parse_pocket(pocket)?;

    let report = Dominator::new(&archive).dominate(&mut conn, &series, pocket)?;
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("Dominated {}/{}", archive.name, pocket.suite(&series.name));
    println!("  Sources superseded:  {}", report.sources_superseded);
    println!("  Binaries superseded: {}", report.binaries_superseded);
    if report.binaries_skipped > 0 {
        println!("  Binaries skipped (not yet published): {}", report.binaries_skipped);
    }
    Ok(())
}

/// Build summaries of the active sources of an archive
pub fn cmd_build_status(
    db_path: &str,
    archive: &ArchiveArgs,
    name: Option<&str>,
    format: &str,
) -> Result<()> {
    let conn = depot::db::open(db_path)?;
    let archive = find_archive(&conn, &archive.distribution, &archive.archive)?;

    let sources: Vec<SourcePublication> =
        SourcePublication::list(&conn, archive.id.unwrap_or_default(), name, None)?
            .into_iter()
            .filter(|spp| spp.status.is_active())
            .collect();
    let summaries = PublishingSet::default().build_status_summaries(&conn, &sources)?;

    if format == "json" {
        let rows: Vec<_> = sources
            .iter()
            .filter_map(|spp| {
                let summary = summaries.get(&spp.id?)?;
                Some(serde_json::json!({
                    "id": spp.id,
                    "source": spp.source_name,
                    "version": spp.version,
                    "status": summary.status,
                    "builds": summary.build_ids,
                }))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No active sources in {}", archive.name);
        return Ok(());
    }
    for spp in &sources {
        let status = spp
            .id
            .and_then(|id| summaries.get(&id))
            .map_or("needs_build", |summary| summary.status.as_str());
        println!("  {:<30} {:<20} {}", spp.source_name, spp.version, status);
    }
    Ok(())
}

/// List publications of an archive
pub fn cmd_list(
    db_path: &str,
    archive: &ArchiveArgs,
    name: Option<&str>,
    status: Option<&str>,
    binaries: bool,
) -> Result<()> {
    let conn = depot::db::open(db_path)?;
    let archive = find_archive(&conn, &archive.distribution, &archive.archive)?;
    let archive_id = archive.id.unwrap_or_default();
    let status = status
        .map(|s| s.parse::<PublishingStatus>().map_err(anyhow::Error::msg))
        .transpose()?;

    if binaries {
        let pubs = BinaryPublication::list(&conn, archive_id, name, status)?;
        if pubs.is_empty() {
            println!("No binary publications found");
        }
        for bpp in pubs {
            println!(
                "  [{}] {} {} ({}) {}/{} {}",
                bpp.id.unwrap_or_default(),
                bpp.binary_name,
                bpp.version,
                bpp.architecture_tag(&conn)?,
                bpp.component,
                bpp.section,
                bpp.status
            );
        }
    } else {
        let pubs = SourcePublication::list(&conn, archive_id, name, status)?;
        if pubs.is_empty() {
            println!("No source publications found");
        }
        for spp in pubs {
            println!(
                "  [{}] {} {} {} {}/{} {}",
                spp.id.unwrap_or_default(),
                spp.source_name,
                spp.version,
                spp.pocket,
                spp.component,
                spp.section,
                spp.status
            );
        }
    }
    Ok(())
}
