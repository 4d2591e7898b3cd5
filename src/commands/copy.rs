// src/commands/copy.rs
//! Package copy commands

use super::{find_archive, find_person, find_series, load_engine, parse_pocket};
use anyhow::{Context, Result};
use depot::copy::notification;
use depot::db::models::{Archive, DistroSeries, Pocket, SourcePublication};
use depot::publishing::Overrides;
use depot::{CopyChecker, CopyExecutor, CopyOptions, Error};
use rusqlite::Connection;
use tracing::{info, warn};

/// Arguments of `depot copy`
pub struct CopyArgs {
    pub sources: Vec<String>,
    pub db_path: String,
    pub config: String,
    pub store_root: String,
    pub distribution: String,
    pub from_archive: String,
    pub to_archive: Option<String>,
    pub from_series: String,
    pub to_series: Option<String>,
    pub from_pocket: String,
    pub to_pocket: Option<String>,
    pub include_binaries: bool,
    pub unembargo: bool,
    pub person: Option<String>,
    pub sponsored: Option<String>,
    pub component: Option<String>,
    pub section: Option<String>,
    pub dry_run: bool,
}

/// Find the active publication a `name[/version]` argument refers to
fn find_source(
    conn: &Connection,
    archive: &Archive,
    series: &DistroSeries,
    pocket: Pocket,
    spec: &str,
) -> Result<Option<SourcePublication>> {
    let archive_id = archive.id.unwrap_or_default();
    let series_id = series.id.unwrap_or_default();
    let found = match spec.split_once('/') {
        Some((name, version)) => SourcePublication::find_by_name_version(conn, archive_id, name, version)?
            .into_iter()
            .filter(|spp| {
                spp.distroseries_id == series_id && spp.pocket == pocket && spp.status.is_active()
            })
            .next_back(),
        None => SourcePublication::find_active_by_name(conn, archive_id, series_id, pocket, spec)?
            .into_iter()
            .next(),
    };
    Ok(found)
}

/// Check and perform a batch of copies
pub fn cmd_copy(args: CopyArgs) -> Result<()> {
    let mut conn = depot::db::open(&args.db_path)?;
    let (config, services) = load_engine(&args.config, &args.store_root)?;

    let from_archive = find_archive(&conn, &args.distribution, &args.from_archive)?;
    let to_archive = match &args.to_archive {
        Some(name) => find_archive(&conn, &args.distribution, name)?,
        None => from_archive.clone(),
    };
    let from_series = find_series(&conn, &from_archive, &args.from_series)?;
    let to_series = match &args.to_series {
        Some(name) => find_series(&conn, &to_archive, name)?,
        None => from_series.clone(),
    };
    let from_pocket = parse_pocket(&args.from_pocket)?;
    let to_pocket = match &args.to_pocket {
        Some(pocket) => parse_pocket(pocket)?,
        None => from_pocket,
    };
    let person = find_person(&conn, args.person.as_deref())?;
    let sponsored = find_person(&conn, args.sponsored.as_deref())?;

    let overrides = match (&args.component, &args.section) {
        (None, None) => None,
        (Some(component), Some(section)) => Some(Overrides::new(component, section)),
        _ => anyhow::bail!("--component and --section must be given together"),
    };

    info!(
        "Copying {} source(s) from {}/{} into {}/{}",
        args.sources.len(),
        from_archive.name,
        from_pocket.suite(&from_series.name),
        to_archive.name,
        to_pocket.suite(&to_series.name)
    );

    let mut refusals = Vec::new();
    let copies = {
        let mut checker = CopyChecker::new(
            &conn,
            &to_archive,
            args.include_binaries,
            services.content_store.as_ref(),
            &config.copy,
        )?
        .unembargo(args.unembargo);

        for spec in &args.sources {
            let Some(source) = find_source(&conn, &from_archive, &from_series, from_pocket, spec)? else {
                println!("  [!] {}: no active publication in {}", spec, from_archive.name);
                continue;
            };
            match checker.check_copy(&source, &to_series, to_pocket, person.as_ref(), person.is_some()) {
                Ok(copy) => {
                    let mode = if copy.delayed { " (delayed)" } else { "" };
                    println!(
                        "  [x] {} {}: {} binaries{}",
                        copy.source.source_name,
                        copy.source.version,
                        copy.binaries.len(),
                        mode
                    );
                }
                Err(Error::CannotCopy(refusal)) => {
                    warn!("{}", refusal);
                    println!("  [ ] {}", refusal);
                    refusals.push(refusal);
                }
                Err(e) => return Err(e.into()),
            }
        }
        checker.into_checked_copies()
    };

    if let Some(message) = notification::rejected(&refusals, person.as_ref(), &config.notify)
        && let Err(e) = services.notifier.send(&message)
    {
        warn!("Failed to send rejection notice: {}", e);
    }

    if args.dry_run {
        println!(
            "Dry run: {} copy request(s) accepted, {} refused",
            copies.len(),
            refusals.len()
        );
        return Ok(());
    }
    if copies.is_empty() {
        println!("Nothing to copy");
        return Ok(());
    }

    let executor = CopyExecutor::new(&services, &config);
    let options = CopyOptions {
        include_binaries: args.include_binaries,
        overrides,
        person: person.as_ref(),
        sponsored: sponsored.as_ref(),
    };
    let outcome = executor
        .perform_copy(&mut conn, &to_archive, &copies, &options)
        .context("Copy failed; nothing was changed")?;

    println!(
        "Copied {} request(s) into {}: {} new publication(s), {} staged for release",
        copies.len(),
        to_archive.name,
        outcome.publications.len(),
        outcome.uploads.len()
    );
    for publication in &outcome.publications {
        println!("  {}", publication.display_name());
    }
    for skipped in &outcome.skipped_binaries {
        println!("  already present: {}", skipped);
    }
    Ok(())
}

/// Release every accepted delayed copy of an archive
pub fn cmd_release_delayed(
    db_path: &str,
    config_path: &str,
    store_root: &str,
    distribution: &str,
    archive_name: &str,
) -> Result<()> {
    let mut conn = depot::db::open(db_path)?;
    let (config, services) = load_engine(config_path, store_root)?;
    let archive = find_archive(&conn, distribution, archive_name)?;

    info!("Releasing delayed copies into {}", archive.name);
    let outcome = CopyExecutor::new(&services, &config).release_delayed_copies(&mut conn, &archive)?;
    if outcome.publications.is_empty() {
        println!("No delayed copies to release");
    } else {
        println!("Released {} publication(s):", outcome.publications.len());
        for publication in &outcome.publications {
            println!("  {}", publication.display_name());
        }
    }
    Ok(())
}
