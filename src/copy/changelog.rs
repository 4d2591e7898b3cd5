// src/copy/changelog.rs

//! Change history aggregation for copy notifications

use crate::db::models::{PublishingStatus, SourcePublication, SourceRelease};
use crate::error::Result;
use crate::publishing::PublishingSet;
use crate::version::compare_versions;
use regex::Regex;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static BUG_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)lp:\s+#\d+(?:,\s*#\d+)*").expect("bug block pattern"));
static BUG_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("bug number pattern"));

/// Change history leading up to a copied source
///
/// Covers the releases of the source's name published in the source's own
/// archive and series, newer than the last one published in the destination
/// (archive, series) and up to the copied version. Entries are newest first,
/// separated by a blank line.
pub fn aggregate_changelog(
    conn: &Connection,
    archive_id: i64,
    distroseries_id: i64,
    source: &SourcePublication,
) -> Result<String> {
    let last_published = PublishingSet::default()
        .find_source_ancestor(
            conn,
            archive_id,
            &source.source_name,
            Some(distroseries_id),
            None,
            &[PublishingStatus::Published],
        )?
        .map(|spp| spp.version);

    let lineage = SourceRelease::find_published_in(
        conn,
        &source.source_name,
        source.archive_id,
        source.distroseries_id,
    )?;
    let mut releases: Vec<SourceRelease> = lineage
        .into_iter()
        .filter(|r| compare_versions(&r.version, &source.version) != Ordering::Greater)
        .filter(|r| {
            last_published
                .as_deref()
                .is_none_or(|last| compare_versions(&r.version, last) == Ordering::Greater)
        })
        .collect();
    if releases.is_empty() {
        releases.push(source.release(conn)?);
    }
    releases.sort_by(|a, b| compare_versions(&b.version, &a.version));
    releases.dedup_by(|a, b| a.version == b.version);

    let entries: Vec<&str> = releases
        .iter()
        .filter_map(|r| r.changelog.as_deref())
        .map(str::trim_end)
        .filter(|entry| !entry.is_empty())
        .collect();
    Ok(entries.join("\n\n"))
}

/// Bug numbers referenced as `LP: #123, #456`, sorted and deduplicated
pub fn bug_references(changes: &str) -> Vec<u32> {
    let bugs: BTreeSet<u32> = BUG_BLOCK
        .find_iter(changes)
        .flat_map(|block| BUG_NUMBER.captures_iter(block.as_str()))
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    bugs.into_iter().collect()
}
