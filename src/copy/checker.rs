// src/copy/checker.rs

//! Copy validation
//!
//! [`CopyChecker`] validates a batch of copy requests into one destination
//! archive without touching persisted state. Each request is checked against
//! the database and against the requests already approved in the same batch,
//! so a batch can never approve two copies that would conflict with each
//! other. Every check costs a fixed number of statements, whatever the size
//! of the batch.

use crate::config::CopyConfig;
use crate::db::models::{
    Archive, BinaryPublication, Distribution, DistroSeries, LibraryFile, Person, Pocket,
    PublishingStatus, SourcePublication,
};
use crate::error::{CannotCopy, CopyRefusal, Error, Result};
use crate::publishing::{BuildSetStatus, OverrideResolver, OverrideTarget, PublishingSet};
use crate::services::ContentStore;
use crate::version::compare_versions;
use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// An approved copy request
#[derive(Debug, Clone)]
pub struct CheckedCopy {
    pub source: SourcePublication,
    pub series: DistroSeries,
    pub pocket: Pocket,
    pub include_binaries: bool,
    /// Binaries to copy along with the source, one per binary release
    pub binaries: Vec<BinaryPublication>,
    /// Must be staged rather than published directly
    pub delayed: bool,
    /// Restricted files must be made public as part of the copy
    pub unembargo: bool,
}

impl CheckedCopy {
    /// Destination suite, e.g. `breezy-updates`
    pub fn suite(&self) -> String {
        self.pocket.suite(&self.series.name)
    }
}

/// Validates copy requests into one destination archive
pub struct CopyChecker<'a> {
    conn: &'a Connection,
    archive: &'a Archive,
    distribution: Distribution,
    include_binaries: bool,
    content_store: &'a dyn ContentStore,
    config: &'a CopyConfig,
    unembargo: bool,
    set: PublishingSet,
    source_archives: HashMap<i64, Archive>,
    /// filename -> sha256 of files in approved requests
    batch_files: HashMap<String, String>,
    checked: Vec<CheckedCopy>,
}

impl<'a> CopyChecker<'a> {
    /// Start a batch; a disabled destination refuses every copy outright
    pub fn new(
        conn: &'a Connection,
        archive: &'a Archive,
        include_binaries: bool,
        content_store: &'a dyn ContentStore,
        config: &'a CopyConfig,
    ) -> Result<Self> {
        if !archive.enabled {
            return Err(Error::ArchiveDisabled(archive.name.clone()));
        }
        let distribution = Distribution::find_by_id(conn, archive.distribution_id)?.ok_or_else(|| {
            Error::NotFound(format!("distribution {}", archive.distribution_id))
        })?;
        Ok(Self {
            conn,
            archive,
            distribution,
            include_binaries,
            content_store,
            config,
            unembargo: false,
            set: PublishingSet::new(config.batch_size),
            source_archives: HashMap::new(),
            batch_files: HashMap::new(),
            checked: Vec::new(),
        })
    }

    /// Copy private content directly into public archives instead of staging it
    pub fn unembargo(mut self, unembargo: bool) -> Self {
        self.unembargo = unembargo;
        self
    }

    pub fn checked_copies(&self) -> &[CheckedCopy] {
        &self.checked
    }

    pub fn into_checked_copies(self) -> Vec<CheckedCopy> {
        self.checked
    }

    /// Validate copying `source` into `series`/`pocket` of the destination
    ///
    /// On success the request joins the batch's approved copies.
    pub fn check_copy(
        &mut self,
        source: &SourcePublication,
        series: &DistroSeries,
        pocket: Pocket,
        person: Option<&Person>,
        check_permissions: bool,
    ) -> Result<&CheckedCopy> {
        let destination = format!("{}/{}", self.archive.name, pocket.suite(&series.name));
        let refuse = |reason: CannotCopy| {
            debug!("Refusing {} into {}: {}", source.display_name(), destination, reason);
            Error::CannotCopy(CopyRefusal::new(
                &source.source_name,
                &source.version,
                &destination,
                reason,
            ))
        };

        if check_permissions
            && let Some(reason) = self.check_permission(source, series, pocket, person)?
        {
            return Err(refuse(reason));
        }

        if series.distribution_id != self.archive.distribution_id {
            return Err(refuse(CannotCopy::NoSuchSeries {
                series: series.name.clone(),
                distribution: self.distribution.name.clone(),
            }));
        }

        let release = source.release(self.conn)?;
        if !series.is_format_permitted(self.conn, &release.format)? {
            return Err(refuse(CannotCopy::UnsupportedFormat {
                format: release.format.clone(),
                series: series.name.clone(),
            }));
        }

        let source_files = release.files(self.conn)?;
        if source_files
            .iter()
            .any(|f| !self.content_store.is_retrievable(f))
        {
            return Err(refuse(CannotCopy::ExpiredSourceFiles));
        }

        let mut binaries = Vec::new();
        let mut binary_files = Vec::new();
        if self.include_binaries {
            binaries = copyable_binaries(source.active_binaries(self.conn)?);
            if binaries.is_empty() && self.config.strict_binaries {
                return Err(refuse(CannotCopy::NoBinaries));
            }
            let release_ids: Vec<i64> = binaries.iter().map(|b| b.binary_release_id).collect();
            binary_files = LibraryFile::find_by_binary_releases(self.conn, &release_ids)?
                .into_iter()
                .map(|(_, file)| file)
                .collect();
            if binary_files
                .iter()
                .any(|f| !self.content_store.is_retrievable(f))
            {
                return Err(refuse(CannotCopy::ExpiredBinaries));
            }
            if self.archive.is_primary() && binaries.iter().any(BinaryPublication::is_ddeb) {
                return Err(refuse(CannotCopy::DdebToPrimary));
            }
        }

        if let Some(reason) = self.check_conflicts(source, series, pocket, &binaries)? {
            return Err(refuse(reason));
        }

        let files: Vec<&LibraryFile> = source_files.iter().chain(binary_files.iter()).collect();
        if let Some(reason) = self.check_file_clash(&files)? {
            return Err(refuse(reason));
        }

        if let Some(reason) = self.check_ancestry(source, series, pocket)? {
            return Err(refuse(reason));
        }

        let source_private = self.source_archive(source.archive_id)?.private;
        let exposes = source_private && !self.archive.private;
        if exposes && !self.unembargo && !self.config.allow_delayed_copies {
            return Err(refuse(CannotCopy::PrivateSourceToPublic));
        }
        let delayed = exposes && !self.unembargo;

        for file in &files {
            self.batch_files
                .insert(file.filename.clone(), file.sha256.clone());
        }
        debug!(
            "Approved {} into {} ({} binaries{})",
            source.display_name(),
            destination,
            binaries.len(),
            if delayed { ", delayed" } else { "" }
        );
        self.checked.push(CheckedCopy {
            source: source.clone(),
            series: series.clone(),
            pocket,
            include_binaries: self.include_binaries,
            binaries,
            delayed,
            unembargo: exposes && self.unembargo,
        });
        let approved = self.checked.len() - 1;
        Ok(&self.checked[approved])
    }

    fn source_archive(&mut self, archive_id: i64) -> Result<&Archive> {
        if !self.source_archives.contains_key(&archive_id) {
            let archive = Archive::get(self.conn, archive_id)?;
            self.source_archives.insert(archive_id, archive);
        }
        self.source_archives
            .get(&archive_id)
            .ok_or_else(|| Error::NotFound(format!("archive {archive_id}")))
    }

    fn check_permission(
        &self,
        source: &SourcePublication,
        series: &DistroSeries,
        pocket: Pocket,
        person: Option<&Person>,
    ) -> Result<Option<CannotCopy>> {
        let Some(person) = person else {
            return Ok(Some(CannotCopy::NoRequester));
        };
        let person_id = person.id.unwrap_or_default();
        if !self.archive.has_any_upload_right(self.conn, person_id)? {
            return Ok(Some(CannotCopy::NoUploadRights {
                person: person.display().to_string(),
                archive: self.archive.name.clone(),
            }));
        }

        let resolver = OverrideResolver::new(self.conn, self.archive, series, pocket)
            .with_statuses(&[PublishingStatus::Pending, PublishingStatus::Published]);
        let component = match resolver.find_ancestor(&OverrideTarget::Source {
            name: &source.source_name,
        })? {
            Some(ancestor) => ancestor.component,
            None => self
                .archive
                .purpose
                .default_component()
                .map(str::to_string)
                .unwrap_or_else(|| source.component.clone()),
        };
        if !self
            .archive
            .can_upload(self.conn, person_id, &component, &source.source_name)?
        {
            return Ok(Some(CannotCopy::ComponentNotPermitted {
                person: person.display().to_string(),
                component,
                archive: self.archive.name.clone(),
            }));
        }
        Ok(None)
    }

    /// Same-version conflicts against the destination and the batch
    fn check_conflicts(
        &self,
        source: &SourcePublication,
        series: &DistroSeries,
        pocket: Pocket,
        binaries: &[BinaryPublication],
    ) -> Result<Option<CannotCopy>> {
        let archive_id = self.archive.id.unwrap_or_default();
        let series_name = series.name.clone();
        let candidates = SourcePublication::find_by_name_version(
            self.conn,
            archive_id,
            &source.source_name,
            &source.version,
        )?;

        for candidate in &candidates {
            if candidate.source_release_id != source.source_release_id {
                if candidate.status.is_active()
                    && candidate.distroseries_id == series.id.unwrap_or_default()
                    && candidate.pocket == pocket
                {
                    return Ok(Some(CannotCopy::DifferentSourceSameVersion));
                }
                continue;
            }
            if candidate.distroseries_id != series.id.unwrap_or_default() {
                continue;
            }
            // Promoting a source with its binaries between pockets of one archive
            if self.include_binaries
                && source.archive_id == archive_id
                && candidate.pocket != pocket
            {
                continue;
            }

            if candidate.status.is_active() {
                let summary = self.set.build_status_summary(self.conn, candidate)?;
                match summary.status {
                    BuildSetStatus::NeedsBuild | BuildSetStatus::Building => {
                        return Ok(Some(CannotCopy::AlreadyBuilding {
                            series: series_name,
                        }));
                    }
                    BuildSetStatus::FullyBuiltPending => {
                        return Ok(Some(CannotCopy::UnpublishedBinaries {
                            series: series_name,
                        }));
                    }
                    BuildSetStatus::FullyBuilt | BuildSetStatus::Failed => {}
                }
            }

            // Binaries that were ever public block a source-only re-copy,
            // even when the source has since been deleted
            if !self.include_binaries
                && candidate
                    .binaries(self.conn)?
                    .iter()
                    .any(|bpp| bpp.date_published.is_some())
            {
                return Ok(Some(CannotCopy::AlreadyHasBinaries {
                    series: series_name,
                }));
            }
        }

        if self.include_binaries && !binaries.is_empty() {
            let release_ids: Vec<i64> = binaries.iter().map(|b| b.binary_release_id).collect();
            let present = self.set.binaries_in_context(
                self.conn,
                archive_id,
                series.id.unwrap_or_default(),
                pocket,
                &release_ids,
            )?;
            if present
                .iter()
                .any(|bpp| bpp.status == PublishingStatus::Pending)
            {
                return Ok(Some(CannotCopy::BinariesPendingPublication {
                    series: series_name,
                }));
            }
        }

        for approved in &self.checked {
            if approved.source.source_name != source.source_name
                || approved.source.version != source.version
                || approved.series.id != series.id
            {
                continue;
            }
            if approved.source.source_release_id != source.source_release_id {
                if approved.pocket == pocket {
                    return Ok(Some(CannotCopy::DifferentSourceSameVersion));
                }
                continue;
            }
            return Ok(Some(if self.include_binaries {
                CannotCopy::BinariesPendingPublication {
                    series: series_name,
                }
            } else {
                CannotCopy::AlreadyBuilding {
                    series: series_name,
                }
            }));
        }
        Ok(None)
    }

    /// Same filename with different content, in the destination or the batch
    fn check_file_clash(&self, files: &[&LibraryFile]) -> Result<Option<CannotCopy>> {
        let names: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
        let published = LibraryFile::find_published_in_archive(
            self.conn,
            self.archive.id.unwrap_or_default(),
            &names,
        )?;

        for file in files {
            let clashes_published = published
                .iter()
                .any(|p| p.filename == file.filename && p.sha256 != file.sha256);
            let clashes_batch = self
                .batch_files
                .get(&file.filename)
                .is_some_and(|sha256| *sha256 != file.sha256);
            if clashes_published || clashes_batch {
                return Ok(Some(CannotCopy::ConflictingFiles {
                    filename: file.filename.clone(),
                }));
            }
        }
        Ok(None)
    }

    /// A newer release of the same name already active in the destination
    fn check_ancestry(
        &self,
        source: &SourcePublication,
        series: &DistroSeries,
        pocket: Pocket,
    ) -> Result<Option<CannotCopy>> {
        let active = SourcePublication::find_active_by_name(
            self.conn,
            self.archive.id.unwrap_or_default(),
            series.id.unwrap_or_default(),
            pocket,
            &source.source_name,
        )?;
        Ok(active
            .iter()
            .filter(|spp| spp.source_release_id != source.source_release_id)
            .find(|spp| compare_versions(&spp.version, &source.version) == Ordering::Greater)
            .map(|ancestor| CannotCopy::VersionOlderThanAncestry {
                ancestor: ancestor.display_name(),
                series: series.name.clone(),
            }))
    }
}

/// One publication per binary release, preferring PUBLISHED over PENDING
pub(crate) fn copyable_binaries(active: Vec<BinaryPublication>) -> Vec<BinaryPublication> {
    let mut seen = HashSet::new();
    let mut ordered = active;
    ordered.sort_by_key(|bpp| (bpp.status != PublishingStatus::Published, bpp.id));
    let mut binaries: Vec<BinaryPublication> = ordered
        .into_iter()
        .filter(|bpp| seen.insert(bpp.binary_release_id))
        .collect();
    binaries.sort_by_key(|bpp| bpp.id);
    binaries
}
