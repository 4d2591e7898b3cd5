// tests/copy_scenarios.rs

//! End-to-end copy checks and copies between archives.

mod common;

use common::setup;
use depot::copy::CopyOptions;
use depot::db::models::{
    Archive, BinaryPublication, BinaryRelease, Build, BuildStatus, DistroSeries, Distribution,
    LibraryFile, PackageUpload, PackageUploadStatus, Pocket, Priority, Publication,
    PublishingStatus, SourcePublication, SourceRelease, UploadPermission,
};
use depot::publishing::{self, Overrides};
use depot::{CannotCopy, Error};

fn published_all(f: &common::Fixture, publications: &mut [Publication]) {
    for publication in publications.iter_mut() {
        publishing::set_published(&f.conn, publication).unwrap();
    }
}

fn binary_ids(publications: &[Publication]) -> Vec<i64> {
    publications
        .iter()
        .filter_map(|p| match p {
            Publication::Binary(bpp) => bpp.id,
            Publication::Source(_) => None,
        })
        .collect()
}

#[test]
fn test_source_only_copy_creates_builds() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let outcome = f.copy(&ppa2, &[&spp], Pocket::Release, false);

    assert_eq!(outcome.publications.len(), 1);
    assert!(outcome.uploads.is_empty());
    let Publication::Source(copied) = &outcome.publications[0] else {
        panic!("expected a source publication");
    };
    assert_eq!(copied.archive_id, ppa2.id.unwrap());
    assert_eq!(copied.status, PublishingStatus::Pending);
    assert_eq!(copied.source_release_id, spp.source_release_id);
    assert_eq!(copied.component, "main");

    let builds = Build::find_by_source(&f.conn, spp.source_release_id, ppa2.id.unwrap()).unwrap();
    assert_eq!(builds.len(), 2);
    assert!(builds.iter().all(|b| b.status == BuildStatus::NeedsBuild));

    // Nobody to tell: no requester and not a primary archive
    assert!(f.sent().is_empty());
}

#[test]
fn test_copy_with_binaries_reuses_builds() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let outcome = f.copy(&ppa2, &[&spp], Pocket::Release, true);

    assert_eq!(outcome.publications.len(), 3);
    assert!(matches!(outcome.publications[0], Publication::Source(_)));
    let copied: Vec<BinaryPublication> = BinaryPublication::list(&f.conn, ppa2.id.unwrap(), None, None).unwrap();
    assert_eq!(copied.len(), 2);
    assert!(copied.iter().all(|b| b.status == PublishingStatus::Pending));

    // The source's own builds cover every architecture
    let builds = Build::find_by_source(&f.conn, spp.source_release_id, ppa2.id.unwrap()).unwrap();
    assert!(builds.is_empty());
}

#[test]
fn test_copy_is_idempotent() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let copies = f.check(&ppa2, &[&spp], Pocket::Release, true);
    let options = CopyOptions {
        include_binaries: true,
        ..Default::default()
    };
    let mut first = f.perform(&ppa2, &copies, &options);
    assert_eq!(first.publications.len(), 3);

    let again = f.perform(&ppa2, &copies, &options);
    assert!(again.publications.is_empty());
    assert_eq!(again.skipped_binaries.len(), 2);

    // Re-checking before the publisher ran
    let refusal = f.refusal(&ppa2, &spp, Pocket::Release, true);
    assert_eq!(
        refusal.reason,
        CannotCopy::UnpublishedBinaries {
            series: "breezy".to_string()
        }
    );

    published_all(&f, &mut first.publications);
    let copies = f.check(&ppa2, &[&spp], Pocket::Release, true);
    let after = f.perform(&ppa2, &copies, &options);
    assert!(after.publications.is_empty());
    assert_eq!(
        BinaryPublication::list(&f.conn, ppa2.id.unwrap(), None, None)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_incremental_copy_between_pockets() {
    let mut f = setup();
    let ppa1 = f.ppa1.clone();
    let spp = f.source(&ppa1, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386]);
    let mut hppa_build = f.build(&spp, &f.hppa, BuildStatus::Building);

    let mut first = f.copy(&ppa1, &[&spp], Pocket::Updates, true);
    assert_eq!(first.publications.len(), 2);
    let builds = Build::find_by_source(&f.conn, spp.source_release_id, ppa1.id.unwrap()).unwrap();
    assert_eq!(builds.len(), 2, "promotion must not create builds");

    hppa_build.update_status(&f.conn, BuildStatus::FullyBuilt).unwrap();
    let release = f.binary_release(
        &hppa_build,
        "foo-bin",
        "1.0-1",
        true,
        depot::db::models::BinaryFormat::Deb,
        false,
    );
    f.publish_binary(&release, &ppa1, &f.hppa, Pocket::Release);
    published_all(&f, &mut first.publications);

    let second = f.copy(&ppa1, &[&spp], Pocket::Updates, true);
    assert_eq!(second.publications.len(), 1);
    let Publication::Binary(bpp) = &second.publications[0] else {
        panic!("expected only the new binary");
    };
    assert_eq!(bpp.distroarchseries_id, f.hppa.id.unwrap());
    assert_eq!(bpp.pocket, Pocket::Updates);
    assert_eq!(second.skipped_binaries, vec!["foo-bin 1.0-1 (i386)".to_string()]);
}

#[test]
fn test_arch_indep_binary_expands_to_destination_architectures() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let indep = f.indep_binary(&spp, "foo-doc", &[&f.i386]);
    let release = BinaryRelease::get(&f.conn, indep[0].binary_release_id).unwrap();
    f.publish_binary(&release, &ppa2, &f.i386, Pocket::Release);

    let outcome = f.copy(&ppa2, &[&spp], Pocket::Release, true);

    let new_binaries = binary_ids(&outcome.publications);
    assert_eq!(new_binaries.len(), 1);
    let bpp = BinaryPublication::get(&f.conn, new_binaries[0]).unwrap();
    assert_eq!(bpp.distroarchseries_id, f.hppa.id.unwrap());
    assert!(!bpp.architecture_specific);
    assert_eq!(outcome.skipped_binaries, vec!["foo-doc 1.0-1 (i386)".to_string()]);
}

#[test]
fn test_respin_of_building_source_refused() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let refusal = f.refusal(&f.ppa1, &spp, Pocket::Release, false);
    assert_eq!(
        refusal.reason,
        CannotCopy::AlreadyBuilding {
            series: "breezy".to_string()
        }
    );
    assert_eq!(refusal.destination, "ppa1/breezy");
    assert_eq!(
        refusal.to_string(),
        "foo 1.0-1 in ppa1/breezy (same version already building in the destination archive for breezy)"
    );
}

#[test]
fn test_recopy_of_deleted_source_with_published_binaries_refused() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let mut outcome = f.copy(&ppa2, &[&spp], Pocket::Release, true);
    published_all(&f, &mut outcome.publications);
    let mut copied_source: Vec<Publication> = outcome
        .publications
        .into_iter()
        .filter(|p| matches!(p, Publication::Source(_)))
        .collect();
    let removed = publishing::request_deletion(&mut f.conn, &mut copied_source, None, Some("oops")).unwrap();
    assert_eq!(removed.len(), 3);

    let refusal = f.refusal(&ppa2, &spp, Pocket::Release, false);
    assert_eq!(
        refusal.reason,
        CannotCopy::AlreadyHasBinaries {
            series: "breezy".to_string()
        }
    );
}

#[test]
fn test_copy_into_primary_closes_bugs_and_announces() {
    let mut f = setup();
    f.config.notify.announce_list = Some("changes@lists.example.com".to_string());
    let primary = f.primary.clone();

    let mut release = SourceRelease::new("foo", "1.0-1", "main", "devel");
    release.changelog = Some(
        "foo (1.0-1) breezy; urgency=low\n\n  * Fix crash on start. (LP: #1234, #5678)\n".to_string(),
    );
    release.insert(&f.conn).unwrap();
    f.add_source_file(&release, "foo_1.0-1.dsc", "foo 1.0-1", false);
    let spp = f.published_source(&release, &f.ppa1, Pocket::Release);

    let outcome = f.copy(&primary, &[&spp], Pocket::Updates, false);
    assert_eq!(outcome.publications.len(), 1);

    let closed = f.closed_bugs();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].bugs, vec![1234, 5678]);
    assert_eq!(closed[0].source, "foo");
    assert_eq!(closed[0].archive, "primary");
    assert_eq!(closed[0].suite, "breezy-updates");

    let sent = f.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["changes@lists.example.com".to_string()]);
    assert_eq!(sent[0].subject, "[primary/breezy-updates] foo 1.0-1 (Accepted)");
    assert!(sent[0].body.contains("LP: #1234"));
}

#[test]
fn test_copy_into_ppa_does_not_close_bugs() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let mut release = SourceRelease::new("foo", "1.0-1", "main", "devel");
    release.changelog = Some("  * Fix. (LP: #42)\n".to_string());
    release.insert(&f.conn).unwrap();
    f.add_source_file(&release, "foo_1.0-1.dsc", "foo 1.0-1", false);
    let spp = f.published_source(&release, &f.ppa1, Pocket::Release);

    f.copy(&ppa2, &[&spp], Pocket::Updates, false);
    assert!(f.closed_bugs().is_empty());
}

#[test]
fn test_change_history_stays_within_source_lineage() {
    let mut f = setup();
    f.config.notify.announce_list = Some("changes@lists.example.com".to_string());
    let primary = f.primary.clone();
    let private_ppa = f.private_ppa.clone();

    let mut embargoed = SourceRelease::new("foo", "1.0-1.1", "main", "devel");
    embargoed.changelog = Some(
        "foo (1.0-1.1) breezy-security; urgency=high\n\n  * Embargoed CVE fix. (LP: #777)\n".to_string(),
    );
    embargoed.insert(&f.conn).unwrap();
    f.add_source_file(&embargoed, "foo_1.0-1.1.dsc", "foo 1.0-1.1", true);
    f.published_source(&embargoed, &private_ppa, Pocket::Release);

    let mut release = SourceRelease::new("foo", "1.0-2", "main", "devel");
    release.changelog = Some("foo (1.0-2) breezy; urgency=low\n\n  * Fix build. (LP: #1)\n".to_string());
    release.insert(&f.conn).unwrap();
    f.add_source_file(&release, "foo_1.0-2.dsc", "foo 1.0-2", false);
    let spp = f.published_source(&release, &f.ppa1, Pocket::Release);

    f.copy(&primary, &[&spp], Pocket::Updates, false);

    let closed = f.closed_bugs();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].bugs, vec![1]);
    let sent = f.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("LP: #1"));
    assert!(!sent[0].body.contains("Embargoed"));
    assert!(!sent[0].body.contains("777"));
}

#[test]
fn test_recopy_with_nothing_new_is_not_announced() {
    let mut f = setup();
    f.config.notify.announce_list = Some("changes@lists.example.com".to_string());
    let primary = f.primary.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let copies = f.check(&primary, &[&spp], Pocket::Release, false);
    let first = f.perform(&primary, &copies, &CopyOptions::default());
    assert_eq!(first.publications.len(), 1);
    assert_eq!(f.sent().len(), 1);

    let again = f.perform(&primary, &copies, &CopyOptions::default());
    assert!(again.publications.is_empty());
    assert_eq!(f.sent().len(), 1);
}

#[test]
fn test_ddeb_copy_to_primary_refused() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.binary_with_ddeb(&spp, "foo-bin", &f.i386);

    let refusal = f.refusal(&f.primary, &spp, Pocket::Release, true);
    assert_eq!(refusal.reason, CannotCopy::DdebToPrimary);
    assert!(refusal.to_string().ends_with("(Cannot copy DDEBs to a primary archive)"));
}

#[test]
fn test_overrides_inherited_from_ancestry() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();

    let mut ancestor_release = SourceRelease::new("foo", "0.9-1", "universe", "games");
    ancestor_release.insert(&f.conn).unwrap();
    f.add_source_file(&ancestor_release, "foo_0.9-1.dsc", "foo 0.9-1", false);
    let ancestor = f.published_source(&ancestor_release, &ppa2, Pocket::Release);
    let ancestor_build = f.build(&ancestor, &f.i386, BuildStatus::FullyBuilt);
    let mut ancestor_binary = BinaryRelease::new(
        ancestor_build.id.unwrap(),
        "foo-bin",
        "0.9-1",
        "universe",
        "games",
        Priority::Extra,
    );
    ancestor_binary.insert(&f.conn).unwrap();
    f.publish_binary(&ancestor_binary, &ppa2, &f.i386, Pocket::Release);

    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386]);
    let outcome = f.copy(&ppa2, &[&spp], Pocket::Release, true);

    let Publication::Source(source) = &outcome.publications[0] else {
        panic!("expected the source first");
    };
    assert_eq!(source.component, "universe");
    assert_eq!(source.section, "games");
    assert_eq!(source.ancestor_id, ancestor.id);

    let binary = BinaryPublication::get(&f.conn, binary_ids(&outcome.publications)[0]).unwrap();
    assert_eq!(binary.component, "universe");
    assert_eq!(binary.section, "games");
    assert_eq!(binary.priority, Priority::Extra);
}

#[test]
fn test_explicit_overrides_win() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386]);

    let copies = f.check(&ppa2, &[&spp], Pocket::Release, true);
    let options = CopyOptions {
        include_binaries: true,
        overrides: Some(Overrides::new("multiverse", "net")),
        ..Default::default()
    };
    let outcome = f.perform(&ppa2, &copies, &options);

    for publication in &outcome.publications {
        assert_eq!(publication.component(), "multiverse");
    }
    let binary = BinaryPublication::get(&f.conn, binary_ids(&outcome.publications)[0]).unwrap();
    assert_eq!(binary.section, "net");
    assert_eq!(binary.priority, Priority::Optional);
}

#[test]
fn test_primary_requiring_ancestry_needs_overrides_for_new_packages() {
    let mut f = setup();
    f.config.copy.primary_requires_ancestry = true;
    let primary = f.primary.clone();
    let first = f.source(&f.ppa1, "foo", "1.0-1");
    let second = f.source(&f.ppa1, "foo", "1.0-2");

    let copies = f.check(&primary, &[&first], Pocket::Release, false);
    let err = f
        .try_perform(&primary, &copies, &CopyOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::OverrideResolution(_)), "got {err:?}");
    assert!(SourcePublication::list(&f.conn, primary.id.unwrap(), None, None)
        .unwrap()
        .is_empty());

    let options = CopyOptions {
        overrides: Some(Overrides::new("universe", "games")),
        ..Default::default()
    };
    let outcome = f.perform(&primary, &copies, &options);
    assert_eq!(outcome.publications[0].component(), "universe");

    // Later versions inherit from the first one
    let copies = f.check(&primary, &[&second], Pocket::Release, false);
    let outcome = f.perform(&primary, &copies, &CopyOptions::default());
    let Publication::Source(copied) = &outcome.publications[0] else {
        panic!("expected a source publication");
    };
    assert_eq!(copied.component, "universe");
    assert_eq!(copied.section, "games");
}

#[test]
fn test_private_copy_to_primary_is_delayed_then_released() {
    let mut f = setup();
    let primary = f.primary.clone();
    let private_ppa = f.private_ppa.clone();
    let spp = f.source(&private_ppa, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386]);

    let copies = f.check(&primary, &[&spp], Pocket::Release, true);
    assert!(copies[0].delayed);
    assert!(!copies[0].unembargo);
    let options = CopyOptions {
        include_binaries: true,
        ..Default::default()
    };
    let staged = f.perform(&primary, &copies, &options);
    assert!(staged.publications.is_empty());
    assert_eq!(staged.uploads.len(), 1);
    assert!(SourcePublication::list(&f.conn, primary.id.unwrap(), None, None)
        .unwrap()
        .is_empty());

    let accepted =
        PackageUpload::find_by_status(&f.conn, primary.id.unwrap(), PackageUploadStatus::Accepted).unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].build_ids(&f.conn).unwrap().len(), 1);

    let executor = depot::CopyExecutor::new(&f.services, &f.config);
    let released = executor.release_delayed_copies(&mut f.conn, &primary).unwrap();
    assert_eq!(released.publications.len(), 2);

    let files = LibraryFile::find_by_source_release(&f.conn, spp.source_release_id).unwrap();
    assert!(files.iter().all(|file| !file.restricted));
    let binaries = BinaryPublication::list(&f.conn, primary.id.unwrap(), None, None).unwrap();
    assert_eq!(binaries.len(), 1);
    let binary_files = binaries[0].release(&f.conn).unwrap().files(&f.conn).unwrap();
    assert!(binary_files.iter().all(|file| !file.restricted));

    assert!(
        PackageUpload::find_by_status(&f.conn, primary.id.unwrap(), PackageUploadStatus::Accepted)
            .unwrap()
            .is_empty()
    );
    let done = PackageUpload::find_by_status(&f.conn, primary.id.unwrap(), PackageUploadStatus::Done).unwrap();
    assert_eq!(done.len(), 1);
    assert!(done[0].date_done.is_some());

    // Nothing left to release
    let again = executor.release_delayed_copies(&mut f.conn, &primary).unwrap();
    assert!(again.publications.is_empty());
}

#[test]
fn test_unembargo_copies_private_source_directly() {
    let mut f = setup();
    let primary = f.primary.clone();
    let spp = f.source(&f.private_ppa, "foo", "1.0-1");

    let copies = {
        let mut checker = f.checker(&primary, false).unembargo(true);
        checker
            .check_copy(&spp, &f.breezy, Pocket::Release, None, false)
            .unwrap();
        checker.into_checked_copies()
    };
    assert!(!copies[0].delayed);
    assert!(copies[0].unembargo);

    let outcome = f.perform(&primary, &copies, &CopyOptions::default());
    assert_eq!(outcome.publications.len(), 1);
    assert!(outcome.uploads.is_empty());

    let files = LibraryFile::find_by_source_release(&f.conn, spp.source_release_id).unwrap();
    assert!(files.iter().all(|file| !file.restricted));
    assert_eq!(f.store.retrieve(&files[0]).unwrap(), b"foo 1.0-1 source".to_vec());
}

#[test]
fn test_private_to_private_copy_is_direct() {
    let mut f = setup();
    let private_ppa = f.private_ppa.clone();
    let spp = f.source(&private_ppa, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let copies = f.check(&private_ppa, &[&spp], Pocket::Updates, true);
    assert!(!copies[0].delayed);
    assert!(!copies[0].unembargo);
    let options = CopyOptions {
        include_binaries: true,
        ..Default::default()
    };
    let outcome = f.perform(&private_ppa, &copies, &options);
    assert_eq!(outcome.publications.len(), 3);

    let files = LibraryFile::find_by_source_release(&f.conn, spp.source_release_id).unwrap();
    assert!(files.iter().all(|file| file.restricted));
}

#[test]
fn test_private_copy_to_public_refused_without_delayed_copies() {
    let mut f = setup();
    f.config.copy.allow_delayed_copies = false;
    let primary = f.primary.clone();
    let spp = f.source(&f.private_ppa, "foo", "1.0-1");

    let refusal = f.refusal(&primary, &spp, Pocket::Release, false);
    assert_eq!(refusal.reason, CannotCopy::PrivateSourceToPublic);
    assert_eq!(
        refusal.to_string(),
        "foo 1.0-1 in primary/breezy (Cannot copy private source into public archives.)"
    );

    // An explicit unembargo is still honoured
    let copies = {
        let mut checker = f.checker(&primary, false).unembargo(true);
        checker
            .check_copy(&spp, &f.breezy, Pocket::Release, None, false)
            .unwrap();
        checker.into_checked_copies()
    };
    assert!(!copies[0].delayed);
    assert!(copies[0].unembargo);

    let files = LibraryFile::find_by_source_release(&f.conn, spp.source_release_id).unwrap();
    assert!(files.iter().all(|file| file.restricted));
    assert!(!f.in_public_store(&files[0]));
}

#[test]
fn test_failed_batch_leaves_embargoed_files_restricted() {
    let mut f = setup();
    let primary = f.primary.clone();
    let private_ppa = f.private_ppa.clone();
    let embargoed = f.release_with("foo", "1.0-1", "embargoed", true);
    let private = f.published_source(&embargoed, &private_ppa, Pocket::Release);
    let public = f.source(&f.ppa1, "foo", "1.0-1");

    // Checked apart, so neither check sees the other
    let mut copies = {
        let mut checker = f.checker(&primary, false).unembargo(true);
        checker
            .check_copy(&private, &f.breezy, Pocket::Release, None, false)
            .unwrap();
        checker.into_checked_copies()
    };
    copies.extend(f.check(&primary, &[&public], Pocket::Release, false));

    let err = f
        .try_perform(&primary, &copies, &CopyOptions::default())
        .unwrap_err();
    assert!(err.is_retryable(), "got {err:?}");
    assert!(SourcePublication::list(&f.conn, primary.id.unwrap(), None, None)
        .unwrap()
        .is_empty());
    let files = LibraryFile::find_by_source_release(&f.conn, private.source_release_id).unwrap();
    assert!(files.iter().all(|file| file.restricted));
    assert!(!f.in_public_store(&files[0]));

    let outcome = f.perform(&primary, &copies[..1], &CopyOptions::default());
    assert_eq!(outcome.unembargoed.len(), 1);
    let files = LibraryFile::find_by_source_release(&f.conn, private.source_release_id).unwrap();
    assert!(!files[0].restricted);
    assert!(f.in_public_store(&files[0]));
}

#[test]
fn test_sponsored_copy_records_both_people() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let cprov = f.cprov.clone();
    let bob = f.person("bob");
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let copies = f.check(&ppa2, &[&spp], Pocket::Release, false);
    let options = CopyOptions {
        person: Some(&cprov),
        sponsored: Some(&bob),
        ..Default::default()
    };
    let outcome = f.perform(&ppa2, &copies, &options);

    let Publication::Source(copied) = &outcome.publications[0] else {
        panic!("expected a source publication");
    };
    assert_eq!(copied.creator_id, bob.id);
    assert_eq!(copied.sponsor_id, cprov.id);

    let sent = f.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, "bob <bob@example.com>");
    assert!(sent[0].to.contains(&"bob <bob@example.com>".to_string()));
    assert!(
        sent[0]
            .to
            .contains(&"Celso Providelo <celso.providelo@example.com>".to_string())
    );
}

#[test]
fn test_unsponsored_copy_records_creator_only() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let cprov = f.cprov.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let copies = f.check(&ppa2, &[&spp], Pocket::Release, false);
    let options = CopyOptions {
        person: Some(&cprov),
        ..Default::default()
    };
    let outcome = f.perform(&ppa2, &copies, &options);
    let Publication::Source(copied) = &outcome.publications[0] else {
        panic!("expected a source publication");
    };
    assert_eq!(copied.creator_id, cprov.id);
    assert_eq!(copied.sponsor_id, None);
}

#[test]
fn test_permission_checks() {
    let f = setup();
    let bob = f.person("bob");
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let mut checker = f.checker(&f.ppa2, false);
    let err = checker
        .check_copy(&spp, &f.breezy, Pocket::Release, None, true)
        .unwrap_err();
    assert_eq!(err.as_refusal().unwrap().reason, CannotCopy::NoRequester);

    let err = checker
        .check_copy(&spp, &f.breezy, Pocket::Release, Some(&bob), true)
        .unwrap_err();
    assert_eq!(
        err.as_refusal().unwrap().reason,
        CannotCopy::NoUploadRights {
            person: "bob".to_string(),
            archive: "ppa2".to_string(),
        }
    );
    assert!(err.to_string().contains("bob has no upload rights to ppa2."));

    // The owner may copy
    checker
        .check_copy(&spp, &f.breezy, Pocket::Release, Some(&f.cprov), true)
        .unwrap();
}

#[test]
fn test_component_permission_checked_in_primary() {
    let f = setup();
    let bob = f.person("bob");
    UploadPermission::for_component(f.primary.id.unwrap(), bob.id.unwrap(), "universe")
        .insert(&f.conn)
        .unwrap();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let mut checker = f.checker(&f.primary, false);
    let err = checker
        .check_copy(&spp, &f.breezy, Pocket::Release, Some(&bob), true)
        .unwrap_err();
    assert_eq!(
        err.as_refusal().unwrap().reason,
        CannotCopy::ComponentNotPermitted {
            person: "bob".to_string(),
            component: "main".to_string(),
            archive: "primary".to_string(),
        }
    );

    UploadPermission::for_package(f.primary.id.unwrap(), bob.id.unwrap(), "foo")
        .insert(&f.conn)
        .unwrap();
    checker
        .check_copy(&spp, &f.breezy, Pocket::Release, Some(&bob), true)
        .unwrap();
}

#[test]
fn test_batch_refuses_different_source_with_same_version() {
    let f = setup();
    let first = f.source(&f.ppa1, "foo", "1.0-1");
    let other = f.release_with("foo", "1.0-1", "rebuilt", false);
    let second = f.published_source(&other, &f.ppa2, Pocket::Release);

    let mut checker = f.checker(&f.primary, false);
    checker
        .check_copy(&first, &f.breezy, Pocket::Release, None, false)
        .unwrap();
    let err = checker
        .check_copy(&second, &f.breezy, Pocket::Release, None, false)
        .unwrap_err();
    assert_eq!(
        err.as_refusal().unwrap().reason,
        CannotCopy::DifferentSourceSameVersion
    );
    assert_eq!(checker.checked_copies().len(), 1);
}

#[test]
fn test_different_source_with_same_version_in_destination_refused() {
    let f = setup();
    let ours = f.source(&f.ppa1, "foo", "1.0-1");
    let theirs = f.release_with("foo", "1.0-1", "rebuilt", false);
    f.published_source(&theirs, &f.ppa2, Pocket::Release);

    let refusal = f.refusal(&f.ppa2, &ours, Pocket::Release, false);
    assert_eq!(refusal.reason, CannotCopy::DifferentSourceSameVersion);
}

#[test]
fn test_conflicting_files_refused() {
    let f = setup();
    let bar = f.release("bar", "1.0", false);
    f.add_source_file(&bar, "shared_1.0.orig.tar.gz", "bar upstream", false);
    f.published_source(&bar, &f.ppa2, Pocket::Release);

    let baz = f.release("baz", "1.0", false);
    f.add_source_file(&baz, "shared_1.0.orig.tar.gz", "baz upstream", false);
    let spp = f.published_source(&baz, &f.ppa1, Pocket::Release);

    let refusal = f.refusal(&f.ppa2, &spp, Pocket::Release, false);
    assert_eq!(
        refusal.reason,
        CannotCopy::ConflictingFiles {
            filename: "shared_1.0.orig.tar.gz".to_string()
        }
    );
}

#[test]
fn test_identical_shared_files_allowed() {
    let f = setup();
    let bar = f.release("bar", "1.0", false);
    f.add_source_file(&bar, "shared_1.0.orig.tar.gz", "upstream", false);
    f.published_source(&bar, &f.ppa2, Pocket::Release);

    let baz = f.release("baz", "1.0", false);
    f.add_source_file(&baz, "shared_1.0.orig.tar.gz", "upstream", false);
    let spp = f.published_source(&baz, &f.ppa1, Pocket::Release);

    assert_eq!(f.check(&f.ppa2, &[&spp], Pocket::Release, false).len(), 1);
}

#[test]
fn test_expired_source_files_refused() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let mut files = LibraryFile::find_by_source_release(&f.conn, spp.source_release_id).unwrap();
    f.store.expire(&f.conn, &mut files[0]).unwrap();

    let refusal = f.refusal(&f.ppa2, &spp, Pocket::Release, false);
    assert_eq!(refusal.reason, CannotCopy::ExpiredSourceFiles);
}

#[test]
fn test_expired_binaries_refused() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let binaries = f.arch_binaries(&spp, "foo-bin", &[&f.i386]);
    let mut files = binaries[0].release(&f.conn).unwrap().files(&f.conn).unwrap();
    f.store.expire(&f.conn, &mut files[0]).unwrap();

    let refusal = f.refusal(&f.ppa2, &spp, Pocket::Release, true);
    assert_eq!(refusal.reason, CannotCopy::ExpiredBinaries);

    // Binaries are irrelevant to a source-only copy
    assert_eq!(f.check(&f.ppa2, &[&spp], Pocket::Release, false).len(), 1);
}

#[test]
fn test_no_binaries_refused() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let refusal = f.refusal(&f.ppa2, &spp, Pocket::Release, true);
    assert_eq!(refusal.reason, CannotCopy::NoBinaries);
    assert_eq!(
        refusal.to_string(),
        "foo 1.0-1 in ppa2/breezy (source has no binaries to be copied)"
    );
}

#[test]
fn test_lenient_binary_copy_without_binaries_copies_source() {
    let mut f = setup();
    f.config.copy.strict_binaries = false;
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.build(&spp, &f.i386, BuildStatus::Building);

    let copies = f.check(&ppa2, &[&spp], Pocket::Release, true);
    assert!(copies[0].binaries.is_empty());
    let options = CopyOptions {
        include_binaries: true,
        ..Default::default()
    };
    let outcome = f.perform(&ppa2, &copies, &options);

    assert_eq!(outcome.publications.len(), 1);
    assert!(matches!(outcome.publications[0], Publication::Source(_)));
    assert!(outcome.skipped_binaries.is_empty());
    let builds = Build::find_by_source(&f.conn, spp.source_release_id, ppa2.id.unwrap()).unwrap();
    assert_eq!(builds.len(), 2);
    assert!(builds.iter().all(|b| b.status == BuildStatus::NeedsBuild));
}

#[test]
fn test_disabled_archive_refuses_every_copy() {
    let f = setup();
    let mut ppa2 = f.ppa2.clone();
    ppa2.set_enabled(&f.conn, false).unwrap();

    let result = depot::CopyChecker::new(&f.conn, &ppa2, false, f.store.as_ref(), &f.config.copy);
    assert!(matches!(result, Err(Error::ArchiveDisabled(name)) if name == "ppa2"));
}

#[test]
fn test_unsupported_format_refused() {
    let f = setup();
    let mut release = SourceRelease::new("foo", "1.0-1", "main", "devel");
    release.format = "3.0 (quilt)".to_string();
    release.insert(&f.conn).unwrap();
    f.add_source_file(&release, "foo_1.0-1.dsc", "foo 1.0-1", false);
    let spp = f.published_source(&release, &f.ppa1, Pocket::Release);

    let refusal = f.refusal(&f.ppa2, &spp, Pocket::Release, false);
    assert_eq!(
        refusal.reason,
        CannotCopy::UnsupportedFormat {
            format: "3.0 (quilt)".to_string(),
            series: "breezy".to_string(),
        }
    );
}

#[test]
fn test_series_of_another_distribution_refused() {
    let f = setup();
    let mut other = Distribution::new("otherdistro");
    let other_id = other.insert(&f.conn).unwrap();
    let mut hoary = DistroSeries::new(other_id, "hoary", "5.04");
    hoary.insert(&f.conn).unwrap();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let mut checker = f.checker(&f.ppa2, false);
    let err = checker
        .check_copy(&spp, &hoary, Pocket::Release, None, false)
        .unwrap_err();
    assert_eq!(
        err.as_refusal().unwrap().reason,
        CannotCopy::NoSuchSeries {
            series: "hoary".to_string(),
            distribution: "ubuntutest".to_string(),
        }
    );
}

#[test]
fn test_older_version_than_destination_refused() {
    let f = setup();
    f.source(&f.ppa2, "foo", "1.0-2");
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let refusal = f.refusal(&f.ppa2, &spp, Pocket::Release, false);
    assert_eq!(
        refusal.reason,
        CannotCopy::VersionOlderThanAncestry {
            ancestor: "foo 1.0-2".to_string(),
            series: "breezy".to_string(),
        }
    );
}

#[test]
fn test_refused_copy_leaves_batch_usable() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let good = f.source(&f.ppa1, "foo", "1.0-1");
    let bad = f.source(&f.ppa1, "bar", "1.0-1");

    let copies = {
        let mut checker = f.checker(&ppa2, true);
        assert!(
            checker
                .check_copy(&bad, &f.breezy, Pocket::Release, None, false)
                .is_err()
        );
        f.arch_binaries(&good, "foo-bin", &[&f.i386]);
        checker
            .check_copy(&good, &f.breezy, Pocket::Release, None, false)
            .unwrap();
        checker.into_checked_copies()
    };
    assert_eq!(copies.len(), 1);

    let options = CopyOptions {
        include_binaries: true,
        ..Default::default()
    };
    let outcome = f.perform(&ppa2, &copies, &options);
    assert_eq!(outcome.publications.len(), 2);
    assert!(
        SourcePublication::find_active_by_name(&f.conn, ppa2.id.unwrap(), f.breezy.id.unwrap(), Pocket::Release, "bar")
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_rejection_notice_lists_refusals() {
    let f = setup();
    let bob = f.person("bob");
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let refusal = f.refusal(&f.ppa2, &spp, Pocket::Release, true);

    let message = depot::copy::notification::rejected(&[refusal.clone()], Some(&bob), &f.config.notify).unwrap();
    assert_eq!(message.to, vec!["bob <bob@example.com>".to_string()]);
    assert_eq!(message.subject, "foo 1.0-1 (Rejected)");
    assert!(message.body.contains(&refusal.to_string()));
}

#[test]
fn test_perform_into_disabled_archive_fails_cleanly() {
    let mut f = setup();
    let ppa2 = f.ppa2.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let copies = f.check(&ppa2, &[&spp], Pocket::Release, false);

    let mut disabled: Archive = ppa2.clone();
    disabled.set_enabled(&f.conn, false).unwrap();
    let err = depot::CopyExecutor::new(&f.services, &f.config)
        .perform_copy(&mut f.conn, &disabled, &copies, &CopyOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::ArchiveDisabled(_)));
    assert!(SourcePublication::list(&f.conn, ppa2.id.unwrap(), None, None).unwrap().is_empty());
}
