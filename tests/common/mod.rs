// tests/common/mod.rs

//! Shared fixture for integration tests.
//!
//! Builds the `ubuntutest` distribution with one series (`breezy`, on i386
//! and hppa), a primary archive paired with a debug archive, two public PPAs
//! owned by `cprov` and one private PPA. Collaborators record what they
//! were asked to do.

#![allow(dead_code)]

use depot::copy::{CheckedCopy, CopyChecker, CopyExecutor, CopyOptions, CopyOutcome};
use depot::db;
use depot::db::models::{
    Archive, ArchivePurpose, BinaryFormat, BinaryPublication, BinaryRelease, Build, BuildStatus,
    Distribution, DistroArchSeries, DistroSeries, LibraryFile, Person, Pocket, Priority,
    SourcePublication, SourceRelease,
};
use depot::librarian::CasContentStore;
use depot::services::{BugCloser, Notification, Notifier};
use depot::{EngineConfig, Services};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Notifier that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> depot::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// One `close_bugs` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedBugs {
    pub bugs: Vec<u32>,
    pub source: String,
    pub archive: String,
    pub suite: String,
}

/// Bug closer that keeps every request
#[derive(Default)]
pub struct RecordingBugCloser {
    pub closed: Mutex<Vec<ClosedBugs>>,
}

impl BugCloser for RecordingBugCloser {
    fn close_bugs(&self, bugs: &[u32], source: &str, archive: &str, suite: &str) -> depot::Result<()> {
        self.closed.lock().unwrap().push(ClosedBugs {
            bugs: bugs.to_vec(),
            source: source.to_string(),
            archive: archive.to_string(),
            suite: suite.to_string(),
        });
        Ok(())
    }
}

pub struct Fixture {
    pub conn: Connection,
    pub store: Arc<CasContentStore>,
    pub services: Services,
    pub config: EngineConfig,
    pub notifier: Arc<RecordingNotifier>,
    pub bugs: Arc<RecordingBugCloser>,
    pub distro: Distribution,
    pub breezy: DistroSeries,
    pub i386: DistroArchSeries,
    pub hppa: DistroArchSeries,
    pub primary: Archive,
    pub primary_debug: Archive,
    pub ppa1: Archive,
    pub ppa2: Archive,
    pub private_ppa: Archive,
    pub cprov: Person,
    _dir: TempDir,
}

/// Create the fixture on a fresh on-disk database.
pub fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("depot.db").to_str().unwrap().to_string();
    db::init(&db_path).unwrap();
    let conn = db::open(&db_path).unwrap();

    let store = Arc::new(CasContentStore::new(dir.path().join("librarian")).unwrap());
    let notifier = Arc::new(RecordingNotifier::default());
    let bugs = Arc::new(RecordingBugCloser::default());
    let services = Services::new(store.clone())
        .with_notifier(notifier.clone())
        .with_bug_closer(bugs.clone());

    let mut distro = Distribution::new("ubuntutest");
    let distro_id = distro.insert(&conn).unwrap();

    let mut breezy = DistroSeries::new(distro_id, "breezy", "5.10");
    breezy.insert(&conn).unwrap();
    for component in ["main", "restricted", "universe", "multiverse"] {
        breezy.add_component(&conn, component).unwrap();
    }
    breezy.add_source_format(&conn, "1.0").unwrap();

    let breezy_id = breezy.id.unwrap();
    let mut i386 = DistroArchSeries::new(breezy_id, "i386", "x86");
    let i386_id = i386.insert(&conn).unwrap();
    let mut hppa = DistroArchSeries::new(breezy_id, "hppa", "hppa");
    hppa.insert(&conn).unwrap();
    breezy.set_nominated_arch_indep(&conn, i386_id).unwrap();

    let mut cprov = Person::new("cprov");
    cprov.display_name = Some("Celso Providelo".to_string());
    cprov.email = Some("celso.providelo@example.com".to_string());
    let cprov_id = cprov.insert(&conn).unwrap();

    let mut primary_debug = Archive::new(distro_id, "primary-debug", ArchivePurpose::Debug);
    let debug_id = primary_debug.insert(&conn).unwrap();
    let mut primary = Archive::new(distro_id, "primary", ArchivePurpose::Primary);
    primary.debug_archive_id = Some(debug_id);
    primary.insert(&conn).unwrap();

    let mut ppa1 = Archive::new(distro_id, "ppa1", ArchivePurpose::Ppa);
    ppa1.owner_id = Some(cprov_id);
    ppa1.insert(&conn).unwrap();
    let mut ppa2 = Archive::new(distro_id, "ppa2", ArchivePurpose::Ppa);
    ppa2.owner_id = Some(cprov_id);
    ppa2.insert(&conn).unwrap();
    let mut private_ppa = Archive::new(distro_id, "private-ppa", ArchivePurpose::Ppa);
    private_ppa.owner_id = Some(cprov_id);
    private_ppa.private = true;
    private_ppa.insert(&conn).unwrap();

    Fixture {
        conn,
        store,
        services,
        config: EngineConfig::default(),
        notifier,
        bugs,
        distro,
        breezy,
        i386,
        hppa,
        primary,
        primary_debug,
        ppa1,
        ppa2,
        private_ppa,
        cprov,
        _dir: dir,
    }
}

impl Fixture {
    /// A person with an email address and no upload rights.
    pub fn person(&self, name: &str) -> Person {
        let mut person = Person::new(name);
        person.email = Some(format!("{name}@example.com"));
        person.insert(&self.conn).unwrap();
        person
    }

    /// Store `content` under `filename` and attach it to a source release.
    pub fn add_source_file(&self, release: &SourceRelease, filename: &str, content: &str, restricted: bool) -> LibraryFile {
        let file = self
            .store
            .add_file(&self.conn, filename, content.as_bytes(), restricted)
            .unwrap();
        release.add_file(&self.conn, file.id.unwrap()).unwrap();
        file
    }

    /// A source release with one `.dsc` file whose content is unique to
    /// `content_tag`.
    pub fn release_with(&self, name: &str, version: &str, content_tag: &str, restricted: bool) -> SourceRelease {
        let mut release = SourceRelease::new(name, version, "main", "devel");
        release.changelog = Some(format!(
            "{name} ({version}) breezy; urgency=low\n\n  * Release {version}.\n"
        ));
        release.insert(&self.conn).unwrap();
        self.add_source_file(
            &release,
            &format!("{name}_{version}.dsc"),
            &format!("{name} {version} {content_tag}"),
            restricted,
        );
        release
    }

    pub fn release(&self, name: &str, version: &str, restricted: bool) -> SourceRelease {
        self.release_with(name, version, "source", restricted)
    }

    /// A PENDING source publication of `release` in breezy.
    pub fn pending_source(&self, release: &SourceRelease, archive: &Archive, pocket: Pocket) -> SourcePublication {
        let mut spp = SourcePublication::new(release, archive.id.unwrap(), self.breezy.id.unwrap(), pocket);
        spp.insert(&self.conn).unwrap();
        spp
    }

    /// A PUBLISHED source publication of `release` in breezy.
    pub fn published_source(&self, release: &SourceRelease, archive: &Archive, pocket: Pocket) -> SourcePublication {
        let mut spp = self.pending_source(release, archive, pocket);
        spp.mark_published(&self.conn).unwrap();
        spp
    }

    /// Create and publish a new release of `name` in `archive`, RELEASE pocket.
    pub fn source(&self, archive: &Archive, name: &str, version: &str) -> SourcePublication {
        let release = self.release(name, version, archive.private);
        self.published_source(&release, archive, Pocket::Release)
    }

    /// A build of the source on `das` in the source's archive.
    pub fn build(&self, spp: &SourcePublication, das: &DistroArchSeries, status: BuildStatus) -> Build {
        let mut build = Build::new(spp.source_release_id, das.id.unwrap(), spp.archive_id, spp.pocket);
        build.insert(&self.conn).unwrap();
        if status != BuildStatus::NeedsBuild {
            build.update_status(&self.conn, status).unwrap();
        }
        build
    }

    /// A binary release produced by `build`, with one stored file.
    pub fn binary_release(
        &self,
        build: &Build,
        name: &str,
        version: &str,
        architecture_specific: bool,
        format: BinaryFormat,
        restricted: bool,
    ) -> BinaryRelease {
        let mut release = BinaryRelease::new(build.id.unwrap(), name, version, "main", "devel", Priority::Optional);
        release.architecture_specific = architecture_specific;
        release.format = format;
        release.insert(&self.conn).unwrap();

        let arch = if architecture_specific {
            DistroArchSeries::find_by_id(&self.conn, build.distroarchseries_id)
                .unwrap()
                .unwrap()
                .architecture_tag
        } else {
            "all".to_string()
        };
        let extension = if format == BinaryFormat::Ddeb { "ddeb" } else { "deb" };
        let filename = format!("{name}_{version}_{arch}.{extension}");
        let file = self
            .store
            .add_file(&self.conn, &filename, filename.as_bytes(), restricted)
            .unwrap();
        release.add_file(&self.conn, file.id.unwrap()).unwrap();
        release
    }

    /// Publish `release` on `das` and mark it PUBLISHED.
    pub fn publish_binary(
        &self,
        release: &BinaryRelease,
        archive: &Archive,
        das: &DistroArchSeries,
        pocket: Pocket,
    ) -> BinaryPublication {
        let mut bpp = BinaryPublication::new(release, archive.id.unwrap(), das.id.unwrap(), pocket);
        bpp.insert(&self.conn).unwrap();
        bpp.mark_published(&self.conn).unwrap();
        bpp
    }

    /// Build and publish an architecture-specific binary on each of `arches`.
    pub fn arch_binaries(&self, spp: &SourcePublication, name: &str, arches: &[&DistroArchSeries]) -> Vec<BinaryPublication> {
        let archive = Archive::get(&self.conn, spp.archive_id).unwrap();
        arches
            .iter()
            .map(|das| {
                let build = self.build(spp, das, BuildStatus::FullyBuilt);
                let release = self.binary_release(&build, name, &spp.version, true, BinaryFormat::Deb, archive.private);
                self.publish_binary(&release, &archive, das, spp.pocket)
            })
            .collect()
    }

    /// Build an architecture-independent binary on i386 and publish it on
    /// each of `arches`.
    pub fn indep_binary(&self, spp: &SourcePublication, name: &str, arches: &[&DistroArchSeries]) -> Vec<BinaryPublication> {
        let archive = Archive::get(&self.conn, spp.archive_id).unwrap();
        let build = self.build(spp, &self.i386, BuildStatus::FullyBuilt);
        let release = self.binary_release(&build, name, &spp.version, false, BinaryFormat::Deb, archive.private);
        arches
            .iter()
            .map(|das| self.publish_binary(&release, &archive, das, spp.pocket))
            .collect()
    }

    /// Build a binary with a paired DDEB on `das`.
    ///
    /// The DDEB lands in the archive's debug archive when it has one.
    /// Returns (binary, ddeb).
    pub fn binary_with_ddeb(
        &self,
        spp: &SourcePublication,
        name: &str,
        das: &DistroArchSeries,
    ) -> (BinaryPublication, BinaryPublication) {
        let archive = Archive::get(&self.conn, spp.archive_id).unwrap();
        let debug_archive = match archive.debug_archive_id {
            Some(id) => Archive::get(&self.conn, id).unwrap(),
            None => archive.clone(),
        };
        let build = self.build(spp, das, BuildStatus::FullyBuilt);
        let ddeb = self.binary_release(
            &build,
            &format!("{name}-dbgsym"),
            &spp.version,
            true,
            BinaryFormat::Ddeb,
            archive.private,
        );

        let mut parent = BinaryRelease::new(build.id.unwrap(), name, &spp.version, "main", "devel", Priority::Optional);
        parent.debug_release_id = ddeb.id;
        parent.insert(&self.conn).unwrap();
        let filename = format!("{name}_{}_{}.deb", spp.version, das.architecture_tag);
        let file = self
            .store
            .add_file(&self.conn, &filename, filename.as_bytes(), archive.private)
            .unwrap();
        parent.add_file(&self.conn, file.id.unwrap()).unwrap();

        let bpp = self.publish_binary(&parent, &archive, das, spp.pocket);
        let ddeb_bpp = self.publish_binary(&ddeb, &debug_archive, das, spp.pocket);
        (bpp, ddeb_bpp)
    }

    pub fn checker<'a>(&'a self, archive: &'a Archive, include_binaries: bool) -> CopyChecker<'a> {
        CopyChecker::new(&self.conn, archive, include_binaries, self.store.as_ref(), &self.config.copy)
            .unwrap()
    }

    /// Check copies of `sources` into breezy/`pocket` of `archive` without
    /// permission checks; panics on the first refusal.
    pub fn check(
        &self,
        archive: &Archive,
        sources: &[&SourcePublication],
        pocket: Pocket,
        include_binaries: bool,
    ) -> Vec<CheckedCopy> {
        let mut checker = self.checker(archive, include_binaries);
        for source in sources {
            checker
                .check_copy(source, &self.breezy, pocket, None, false)
                .unwrap();
        }
        checker.into_checked_copies()
    }

    /// The refusal reason for a single copy request.
    pub fn refusal(
        &self,
        archive: &Archive,
        source: &SourcePublication,
        pocket: Pocket,
        include_binaries: bool,
    ) -> depot::CopyRefusal {
        let mut checker = self.checker(archive, include_binaries);
        let err = checker
            .check_copy(source, &self.breezy, pocket, None, false)
            .unwrap_err();
        err.as_refusal().cloned().unwrap_or_else(|| panic!("expected a refusal, got {err:?}"))
    }

    pub fn perform(&mut self, archive: &Archive, copies: &[CheckedCopy], options: &CopyOptions<'_>) -> CopyOutcome {
        self.try_perform(archive, copies, options).unwrap()
    }

    pub fn try_perform(
        &mut self,
        archive: &Archive,
        copies: &[CheckedCopy],
        options: &CopyOptions<'_>,
    ) -> depot::Result<CopyOutcome> {
        CopyExecutor::new(&self.services, &self.config).perform_copy(&mut self.conn, archive, copies, options)
    }

    /// Whether the store's public tree holds the bytes of `file`.
    pub fn in_public_store(&self, file: &LibraryFile) -> bool {
        let (prefix, rest) = file.sha256.split_at(2);
        self.store.root().join("public").join(prefix).join(rest).exists()
    }

    /// Check then perform, the way a copy request is normally served.
    pub fn copy(
        &mut self,
        archive: &Archive,
        sources: &[&SourcePublication],
        pocket: Pocket,
        include_binaries: bool,
    ) -> CopyOutcome {
        let copies = self.check(archive, sources, pocket, include_binaries);
        let options = CopyOptions {
            include_binaries,
            ..Default::default()
        };
        self.perform(archive, &copies, &options)
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.notifier.sent.lock().unwrap().clone()
    }

    pub fn closed_bugs(&self) -> Vec<ClosedBugs> {
        self.bugs.closed.lock().unwrap().clone()
    }
}
