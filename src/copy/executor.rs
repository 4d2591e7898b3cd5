// src/copy/executor.rs

//! Copy execution
//!
//! [`CopyExecutor::perform_copy`] applies checked copies in one transaction:
//! either every publication, build and staged upload of the batch lands, or
//! none does. Notifications, bug closing and moving unembargoed bytes into
//! the public store run only after the commit, and their failures are logged
//! rather than undoing the copy.

use super::changelog::{aggregate_changelog, bug_references};
use super::checker::{CheckedCopy, copyable_binaries};
use super::notification::{self, CopySummary};
use crate::config::EngineConfig;
use crate::db;
use crate::db::models::{
    Archive, BinaryPublication, BinaryRelease, Build, CustomUpload, DistroArchSeries,
    DistroSeries, LibraryFile, PackageUpload, PackageUploadStatus, Person, PublishingStatus,
    Publication, SourcePublication,
};
use crate::error::{Error, Result};
use crate::publishing::{
    BinaryTarget, OverrideResolver, OverrideTarget, Overrides, PublishingSet,
};
use crate::services::Services;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// How checked copies are applied
#[derive(Debug, Clone, Default)]
pub struct CopyOptions<'a> {
    /// Copy binaries of requests that were checked with binaries
    pub include_binaries: bool,
    /// Operator-supplied overrides, applied to every new publication
    pub overrides: Option<Overrides>,
    /// Who performs the copy
    pub person: Option<&'a Person>,
    /// On whose behalf the copy is performed
    pub sponsored: Option<&'a Person>,
}

impl<'a> CopyOptions<'a> {
    /// Recorded creator: the sponsored person when there is one
    fn creator(&self) -> Option<&'a Person> {
        self.sponsored.or(self.person)
    }

    /// Recorded sponsor: the acting person, only when sponsoring
    fn sponsor(&self) -> Option<&'a Person> {
        self.sponsored.and(self.person)
    }
}

/// What a copy run changed
#[derive(Debug, Clone, Default)]
pub struct CopyOutcome {
    /// New publications, sources before their binaries
    pub publications: Vec<Publication>,
    /// Delayed copies staged for later release
    pub uploads: Vec<PackageUpload>,
    /// `name version (arch)` of binaries already present in the destination
    pub skipped_binaries: Vec<String>,
    /// Restricted files made public by this run
    pub unembargoed: Vec<LibraryFile>,
}

impl CopyOutcome {
    fn absorb(&mut self, other: CopyOutcome) {
        self.publications.extend(other.publications);
        self.uploads.extend(other.uploads);
        self.skipped_binaries.extend(other.skipped_binaries);
        self.unembargoed.extend(other.unembargoed);
    }
}

/// An applied direct copy awaiting notification
struct Landed {
    summary: CopySummary,
    pocket_closes_bugs: bool,
    creator: Option<Person>,
    sponsor: Option<Person>,
}

/// Applies checked copies to a destination archive
pub struct CopyExecutor<'a> {
    services: &'a Services,
    config: &'a EngineConfig,
    set: PublishingSet,
}

impl<'a> CopyExecutor<'a> {
    pub fn new(services: &'a Services, config: &'a EngineConfig) -> Self {
        Self {
            services,
            config,
            set: PublishingSet::new(config.copy.batch_size),
        }
    }

    /// Apply `copies` into `archive`
    ///
    /// Direct copies create PENDING publications and any missing builds;
    /// delayed copies are staged as accepted uploads. Re-running the same
    /// copies creates nothing new.
    pub fn perform_copy(
        &self,
        conn: &mut Connection,
        archive: &Archive,
        copies: &[CheckedCopy],
        options: &CopyOptions<'_>,
    ) -> Result<CopyOutcome> {
        if !archive.enabled {
            return Err(Error::ArchiveDisabled(archive.name.clone()));
        }

        let (outcome, landed) = db::transaction(conn, |tx| {
            let mut outcome = CopyOutcome::default();
            let mut landed = Vec::new();
            for copy in copies {
                let include_binaries = options.include_binaries && copy.include_binaries;
                if copy.delayed {
                    let upload = self.stage_delayed(tx, archive, copy, include_binaries, options)?;
                    outcome.uploads.push(upload);
                    continue;
                }
                let (copied, summary) =
                    self.copy_direct(tx, archive, copy, include_binaries, options)?;
                landed.push(Landed {
                    summary,
                    pocket_closes_bugs: self.config.copy.bug_closing_pockets.contains(&copy.pocket),
                    creator: options.creator().cloned(),
                    sponsor: options.sponsor().cloned(),
                });
                outcome.absorb(copied);
            }
            Ok((outcome, landed))
        })?;

        info!(
            "Copied {} requests into {}: {} new publications, {} staged",
            copies.len(),
            archive.name,
            outcome.publications.len(),
            outcome.uploads.len()
        );
        self.release_content(&outcome.unembargoed);
        self.announce(archive, &landed);
        Ok(outcome)
    }

    /// Release every accepted delayed copy of `archive`
    ///
    /// Restricted files of the source, the staged builds' binaries and their
    /// custom uploads are made public, then the copy is performed directly
    /// and the upload marked done.
    pub fn release_delayed_copies(&self, conn: &mut Connection, archive: &Archive) -> Result<CopyOutcome> {
        let uploads = PackageUpload::find_by_status(
            conn,
            archive.id.unwrap_or_default(),
            PackageUploadStatus::Accepted,
        )?;
        if uploads.is_empty() {
            debug!("No delayed copies waiting in {}", archive.name);
            return Ok(CopyOutcome::default());
        }

        let (outcome, landed) = db::transaction(conn, |tx| {
            let mut outcome = CopyOutcome::default();
            let mut landed = Vec::new();
            for mut upload in uploads {
                let (copied, entry) = self.release_upload(tx, archive, &upload)?;
                upload.mark_done(tx)?;
                outcome.absorb(copied);
                landed.push(entry);
            }
            Ok((outcome, landed))
        })?;

        info!(
            "Released {} delayed copies into {}",
            landed.len(),
            archive.name
        );
        self.release_content(&outcome.unembargoed);
        self.announce(archive, &landed);
        Ok(outcome)
    }

    fn release_upload(
        &self,
        conn: &Connection,
        archive: &Archive,
        upload: &PackageUpload,
    ) -> Result<(CopyOutcome, Landed)> {
        let source = SourcePublication::get(conn, upload.source_publication_id)?;
        let series = DistroSeries::find_by_id(conn, upload.distroseries_id)?
            .ok_or_else(|| Error::NotFound(format!("series {}", upload.distroseries_id)))?;
        let build_ids: HashSet<i64> = upload.build_ids(conn)?.into_iter().collect();

        let mut binaries = Vec::new();
        if upload.include_binaries {
            for bpp in copyable_binaries(source.active_binaries(conn)?) {
                if build_ids.contains(&bpp.release(conn)?.build_id) {
                    binaries.push(bpp);
                }
            }
        }

        let mut files = source.release(conn)?.files(conn)?;
        let mut release_ids = Vec::new();
        for build_id in &build_ids {
            release_ids.extend(
                BinaryRelease::find_by_build(conn, *build_id)?
                    .into_iter()
                    .filter_map(|br| br.id),
            );
        }
        files.extend(
            LibraryFile::find_by_binary_releases(conn, &release_ids)?
                .into_iter()
                .map(|(_, file)| file),
        );
        for custom in upload.customs(conn)? {
            files.push(custom.file(conn)?);
        }
        let unembargoed = self.unembargo_files(conn, files)?;

        let creator = upload.creator_id.map(|id| Person::find_by_id(conn, id)).transpose()?.flatten();
        let sponsor = upload.sponsor_id.map(|id| Person::find_by_id(conn, id)).transpose()?.flatten();
        let options = match (&creator, &sponsor) {
            (Some(creator), Some(sponsor)) => CopyOptions {
                include_binaries: upload.include_binaries,
                person: Some(sponsor),
                sponsored: Some(creator),
                ..Default::default()
            },
            _ => CopyOptions {
                include_binaries: upload.include_binaries,
                person: creator.as_ref(),
                ..Default::default()
            },
        };

        let pocket = upload.pocket;
        let copy = CheckedCopy {
            source,
            series,
            pocket,
            include_binaries: upload.include_binaries,
            binaries,
            delayed: false,
            unembargo: false,
        };
        let (mut copied, summary) =
            self.copy_direct(conn, archive, &copy, upload.include_binaries, &options)?;
        copied.unembargoed.extend(unembargoed);
        info!("Released delayed copy of {} into {}", summary.source_name, summary.suite);
        let landed = Landed {
            summary,
            pocket_closes_bugs: self.config.copy.bug_closing_pockets.contains(&pocket),
            creator: options.creator().cloned(),
            sponsor: options.sponsor().cloned(),
        };
        Ok((copied, landed))
    }

    /// Flag restricted files public in their metadata
    ///
    /// The bytes move in [`Self::release_content`] after the commit.
    fn unembargo_files(&self, conn: &Connection, files: Vec<LibraryFile>) -> Result<Vec<LibraryFile>> {
        let mut unembargoed = Vec::new();
        for mut file in files.into_iter().filter(|f| f.restricted) {
            file.mark_public(conn)?;
            unembargoed.push(file);
        }
        Ok(unembargoed)
    }

    /// Copy committed unembargoed files into the public store; failures only warn
    fn release_content(&self, files: &[LibraryFile]) {
        for file in files {
            match self.services.content_store.unembargo(file) {
                Ok(()) => debug!("Unembargoed {}", file.filename),
                Err(e) => warn!("Failed to unembargo {}: {}", file.filename, e),
            }
        }
    }

    fn copy_direct(
        &self,
        conn: &Connection,
        archive: &Archive,
        copy: &CheckedCopy,
        include_binaries: bool,
        options: &CopyOptions<'_>,
    ) -> Result<(CopyOutcome, CopySummary)> {
        let archive_id = archive.id.unwrap_or_default();
        let series = &copy.series;
        let series_id = series.id.unwrap_or_default();
        let release = copy.source.release(conn)?;
        let creator_id = options.creator().and_then(|p| p.id);
        let sponsor_id = options.sponsor().and_then(|p| p.id);
        let mut outcome = CopyOutcome::default();

        if copy.unembargo {
            let mut files = release.files(conn)?;
            if include_binaries {
                let release_ids: Vec<i64> =
                    copy.binaries.iter().map(|b| b.binary_release_id).collect();
                files.extend(
                    LibraryFile::find_by_binary_releases(conn, &release_ids)?
                        .into_iter()
                        .map(|(_, file)| file),
                );
            }
            outcome.unembargoed = self.unembargo_files(conn, files)?;
        }

        let changes = aggregate_changelog(conn, archive_id, series_id, &copy.source)?;
        let resolver = OverrideResolver::new(conn, archive, series, copy.pocket)
            .with_statuses(&[PublishingStatus::Pending, PublishingStatus::Published])
            .require_ancestry(archive.is_primary() && self.config.copy.primary_requires_ancestry);

        let existing = SourcePublication::find_active_by_name(
            conn,
            archive_id,
            series_id,
            copy.pocket,
            &release.name,
        )?
        .into_iter()
        .find(|spp| spp.source_release_id == copy.source.source_release_id);
        if existing.is_none() {
            let resolved = resolver.resolve(
                &OverrideTarget::Source {
                    name: &copy.source.source_name,
                },
                &Overrides::new(&copy.source.component, &copy.source.section),
                options.overrides.as_ref(),
            )?;
            let mut spp = SourcePublication::new(&release, archive_id, series_id, copy.pocket);
            spp.component = resolved.component;
            spp.section = resolved.section;
            spp.ancestor_id = resolved.ancestor_id;
            spp.creator_id = creator_id;
            spp.sponsor_id = sponsor_id;
            spp.insert(conn)?;
            info!(
                "Copied {} into {}/{} ({})",
                spp.display_name(),
                archive.name,
                copy.suite(),
                spp.component
            );
            outcome.publications.push(Publication::Source(spp));
        } else {
            debug!(
                "{} already active in {}/{}",
                copy.source.display_name(),
                archive.name,
                copy.suite()
            );
        }

        let usable = archive.usable_architectures(conn, series_id)?;
        if include_binaries && !copy.binaries.is_empty() {
            let (published, skipped) =
                self.copy_binaries(conn, archive, &resolver, copy, &usable, creator_id, options)?;
            outcome
                .publications
                .extend(published.into_iter().map(Publication::Binary));
            outcome.skipped_binaries.extend(skipped);
        }

        let covered: HashSet<String> =
            Build::covered_architectures(conn, release.id.unwrap_or_default(), archive_id)?
                .into_iter()
                .collect();
        for das in release.build_architectures(&usable, series.nominated_arch_indep_id) {
            if !covered.contains(&das.architecture_tag) {
                self.services
                    .builds
                    .create_build(conn, &release, das, archive, copy.pocket)?;
            }
        }

        let summary = CopySummary {
            source_name: release.name.clone(),
            version: release.version.clone(),
            archive_name: archive.name.clone(),
            suite: copy.suite(),
            is_primary: archive.is_primary(),
            changes,
            new_publications: outcome.publications.len(),
            skipped_binaries: outcome.skipped_binaries.clone(),
        };
        Ok((outcome, summary))
    }

    /// Expand binaries over the destination architectures and publish the
    /// ones not already present
    ///
    /// Returns the new publications and the `name version (arch)` of
    /// binaries that were already there.
    fn copy_binaries(
        &self,
        conn: &Connection,
        archive: &Archive,
        resolver: &OverrideResolver<'_>,
        copy: &CheckedCopy,
        usable: &[DistroArchSeries],
        creator_id: Option<i64>,
        options: &CopyOptions<'_>,
    ) -> Result<(Vec<BinaryPublication>, Vec<String>)> {
        let mut targets = Vec::new();
        for bpp in &copy.binaries {
            let arches: Vec<&DistroArchSeries> = if bpp.architecture_specific {
                let tag = bpp.architecture_tag(conn)?;
                usable.iter().filter(|das| das.architecture_tag == tag).collect()
            } else {
                usable.iter().collect()
            };
            if arches.is_empty() {
                debug!(
                    "Dropping {}: architecture not usable in {}/{}",
                    bpp.display_name(),
                    archive.name,
                    copy.suite()
                );
                continue;
            }

            let candidate = Overrides::new(&bpp.component, &bpp.section).with_priority(bpp.priority);
            for das in arches {
                let das_id = das.id.unwrap_or_default();
                let resolved = resolver.resolve(
                    &OverrideTarget::Binary {
                        name: &bpp.binary_name,
                        distroarchseries_id: das_id,
                    },
                    &candidate,
                    options.overrides.as_ref(),
                )?;
                targets.push((
                    bpp,
                    BinaryTarget {
                        binary_release_id: bpp.binary_release_id,
                        distroarchseries_id: das_id,
                        component: resolved.component,
                        section: resolved.section,
                        priority: resolved.priority.unwrap_or(bpp.priority),
                        is_ddeb: bpp.is_ddeb(),
                    },
                ));
            }
        }

        let batch: Vec<BinaryTarget> = targets.iter().map(|(_, t)| t.clone()).collect();
        let published = self
            .set
            .publish_binaries(conn, archive, copy.pocket, creator_id, &batch)?;

        let landed: HashSet<(i64, i64)> = published
            .iter()
            .map(|bpp| (bpp.binary_release_id, bpp.distroarchseries_id))
            .collect();
        let tags: HashMap<i64, &str> = usable
            .iter()
            .filter_map(|das| das.id.map(|id| (id, das.architecture_tag.as_str())))
            .collect();
        let mut skipped = BTreeSet::new();
        for (bpp, target) in &targets {
            if !landed.contains(&(target.binary_release_id, target.distroarchseries_id)) {
                let tag = tags.get(&target.distroarchseries_id).copied().unwrap_or("?");
                skipped.insert(format!("{} ({})", bpp.display_name(), tag));
            }
        }
        if !skipped.is_empty() {
            debug!("Skipped {} binaries already present", skipped.len());
        }
        Ok((published, skipped.into_iter().collect()))
    }

    fn stage_delayed(
        &self,
        conn: &Connection,
        archive: &Archive,
        copy: &CheckedCopy,
        include_binaries: bool,
        options: &CopyOptions<'_>,
    ) -> Result<PackageUpload> {
        let mut upload = PackageUpload::new(
            archive.id.unwrap_or_default(),
            copy.series.id.unwrap_or_default(),
            copy.pocket,
            copy.source.id.unwrap_or_default(),
            include_binaries,
        );
        upload.creator_id = options.creator().and_then(|p| p.id);
        upload.sponsor_id = options.sponsor().and_then(|p| p.id);
        upload.insert(conn)?;

        if include_binaries {
            let mut build_ids = BTreeSet::new();
            for bpp in &copy.binaries {
                build_ids.insert(bpp.release(conn)?.build_id);
            }
            let build_ids: Vec<i64> = build_ids.into_iter().collect();
            for build_id in &build_ids {
                upload.add_build(conn, *build_id)?;
            }
            for custom in CustomUpload::find_by_builds(conn, &build_ids)? {
                if let Some(custom_id) = custom.id {
                    upload.add_custom(conn, custom_id)?;
                }
            }
        }

        info!(
            "Staged delayed copy of {} into {}/{}",
            copy.source.display_name(),
            archive.name,
            copy.suite()
        );
        Ok(upload)
    }

    /// Notify and close bugs for landed copies; failures only warn
    fn announce(&self, archive: &Archive, landed: &[Landed]) {
        for entry in landed {
            if entry.summary.new_publications == 0 {
                debug!(
                    "Nothing new for {} in {}/{}, not announcing",
                    entry.summary.source_name, archive.name, entry.summary.suite
                );
                continue;
            }
            let from = entry.creator.as_ref();
            let recipients: Vec<&Person> = entry.creator.iter().chain(entry.sponsor.iter()).collect();
            if let Some(message) =
                notification::accepted(&entry.summary, from, &recipients, &self.config.notify)
                && let Err(e) = self.services.notifier.send(&message)
            {
                warn!("Failed to send notification for {}: {}", entry.summary.source_name, e);
            }

            if !(self.config.copy.close_bugs && archive.is_primary() && entry.pocket_closes_bugs) {
                continue;
            }
            let bugs = bug_references(&entry.summary.changes);
            if bugs.is_empty() {
                continue;
            }
            if let Err(e) = self.services.bugs.close_bugs(
                &bugs,
                &entry.summary.source_name,
                &archive.name,
                &entry.summary.suite,
            ) {
                warn!("Failed to close bugs for {}: {}", entry.summary.source_name, e);
            }
        }
    }
}
