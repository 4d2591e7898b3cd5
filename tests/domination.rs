// tests/domination.rs

//! Supersession of older publications.

mod common;

use common::setup;
use depot::db::models::{BinaryFormat, BinaryPublication, BuildStatus, Pocket, PublishingStatus, SourcePublication};
use depot::publishing::{DominationReport, Dominator, supersede_binary};
use depot::Error;

#[test]
fn test_newer_source_supersedes_older() {
    let mut f = setup();
    let old = f.source(&f.ppa1, "foo", "1.0-9");
    let new = f.source(&f.ppa1, "foo", "1.0-10");
    f.source(&f.ppa1, "bar", "2.0-1");

    let report = Dominator::new(&f.ppa1)
        .dominate(&mut f.conn, &f.breezy, Pocket::Release)
        .unwrap();
    assert_eq!(report.sources_superseded, 1);
    assert_eq!(report.binaries_superseded, 0);

    let old = SourcePublication::get(&f.conn, old.id.unwrap()).unwrap();
    assert_eq!(old.status, PublishingStatus::Superseded);
    assert!(old.date_superseded.is_some());
    assert_eq!(old.superseded_by_release_id, Some(new.source_release_id));

    let new = SourcePublication::get(&f.conn, new.id.unwrap()).unwrap();
    assert_eq!(new.status, PublishingStatus::Published);
}

#[test]
fn test_single_versions_left_alone() {
    let mut f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let report = Dominator::new(&f.ppa1)
        .dominate(&mut f.conn, &f.breezy, Pocket::Release)
        .unwrap();
    assert_eq!(report, DominationReport::default());
}

#[test]
fn test_other_pockets_untouched() {
    let mut f = setup();
    let old = f.source(&f.ppa1, "foo", "1.0-1");
    let release = f.release("foo", "1.0-2", false);
    f.published_source(&release, &f.ppa1, Pocket::Updates);

    let report = Dominator::new(&f.ppa1)
        .dominate(&mut f.conn, &f.breezy, Pocket::Release)
        .unwrap();
    assert_eq!(report.sources_superseded, 0);
    let old = SourcePublication::get(&f.conn, old.id.unwrap()).unwrap();
    assert_eq!(old.status, PublishingStatus::Published);
}

#[test]
fn test_arch_indep_binary_superseded_on_every_architecture() {
    let mut f = setup();
    let old = f.source(&f.ppa1, "foo", "1.0-1");
    let old_doc = f.indep_binary(&old, "foo-doc", &[&f.i386, &f.hppa]);
    let new = f.source(&f.ppa1, "foo", "1.0-2");
    let new_doc = f.indep_binary(&new, "foo-doc", &[&f.i386, &f.hppa]);

    let report = Dominator::new(&f.ppa1)
        .dominate(&mut f.conn, &f.breezy, Pocket::Release)
        .unwrap();
    assert_eq!(report.sources_superseded, 1);
    assert_eq!(report.binaries_superseded, 2);

    let dominant_build = new_doc[0].release(&f.conn).unwrap().build_id;
    for bpp in &old_doc {
        let bpp = BinaryPublication::get(&f.conn, bpp.id.unwrap()).unwrap();
        assert_eq!(bpp.status, PublishingStatus::Superseded);
        assert_eq!(bpp.superseded_by_build_id, Some(dominant_build));
    }
    for bpp in &new_doc {
        let bpp = BinaryPublication::get(&f.conn, bpp.id.unwrap()).unwrap();
        assert_eq!(bpp.status, PublishingStatus::Published);
    }
}

#[test]
fn test_supersede_arch_indep_takes_siblings() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let mut doc = f.indep_binary(&spp, "foo-doc", &[&f.i386, &f.hppa]);

    let superseded = supersede_binary(&f.conn, &mut doc[0], None).unwrap();
    let mut ids: Vec<i64> = superseded.iter().filter_map(|b| b.id).collect();
    ids.sort_unstable();
    let mut expected: Vec<i64> = doc.iter().filter_map(|b| b.id).collect();
    expected.sort_unstable();
    assert_eq!(ids, expected);
    assert_eq!(superseded[0].id, doc[0].id);
}

#[test]
fn test_arch_specific_binary_superseded_alone() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let mut bins = f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let superseded = supersede_binary(&f.conn, &mut bins[0], None).unwrap();
    assert_eq!(superseded.len(), 1);
    let other = BinaryPublication::get(&f.conn, bins[1].id.unwrap()).unwrap();
    assert_eq!(other.status, PublishingStatus::Published);
}

#[test]
fn test_ddeb_follows_parent_into_debug_archive() {
    let mut f = setup();
    let old = f.source(&f.primary, "foo", "1.0-1");
    let (old_bin, old_ddeb) = f.binary_with_ddeb(&old, "foo-bin", &f.i386);
    assert_eq!(old_ddeb.archive_id, f.primary_debug.id.unwrap());
    let new = f.source(&f.primary, "foo", "1.0-2");
    let (_, new_ddeb) = f.binary_with_ddeb(&new, "foo-bin", &f.i386);

    let report = Dominator::new(&f.primary)
        .dominate(&mut f.conn, &f.breezy, Pocket::Release)
        .unwrap();
    assert_eq!(report.binaries_superseded, 1);

    let old_bin = BinaryPublication::get(&f.conn, old_bin.id.unwrap()).unwrap();
    assert_eq!(old_bin.status, PublishingStatus::Superseded);
    let old_ddeb = BinaryPublication::get(&f.conn, old_ddeb.id.unwrap()).unwrap();
    assert_eq!(old_ddeb.status, PublishingStatus::Superseded);
    let new_ddeb = BinaryPublication::get(&f.conn, new_ddeb.id.unwrap()).unwrap();
    assert_eq!(new_ddeb.status, PublishingStatus::Published);
}

#[test]
fn test_ddeb_in_same_archive_follows_parent() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let (mut bin, ddeb) = f.binary_with_ddeb(&spp, "foo-bin", &f.i386);
    assert_eq!(ddeb.archive_id, f.ppa1.id.unwrap());

    let superseded = supersede_binary(&f.conn, &mut bin, None).unwrap();
    assert_eq!(superseded.len(), 2);
    assert!(superseded[1].is_ddeb());
    let ddeb = BinaryPublication::get(&f.conn, ddeb.id.unwrap()).unwrap();
    assert_eq!(ddeb.status, PublishingStatus::Superseded);
}

#[test]
fn test_ddeb_cannot_be_superseded_directly() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let (_, mut ddeb) = f.binary_with_ddeb(&spp, "foo-bin", &f.i386);

    let err = supersede_binary(&f.conn, &mut ddeb, None).unwrap_err();
    assert!(matches!(err, Error::IllegalTarget(_)), "got {err:?}");
    let ddeb = BinaryPublication::get(&f.conn, ddeb.id.unwrap()).unwrap();
    assert_eq!(ddeb.status, PublishingStatus::Published);
}

#[test]
fn test_unpublished_arch_specific_binary_cannot_be_superseded() {
    let f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let build = f.build(&spp, &f.i386, BuildStatus::FullyBuilt);
    let release = f.binary_release(&build, "foo-bin", "1.0-1", true, BinaryFormat::Deb, false);
    let mut pending = BinaryPublication::new(&release, f.ppa1.id.unwrap(), f.i386.id.unwrap(), Pocket::Release);
    pending.insert(&f.conn).unwrap();

    let err = supersede_binary(&f.conn, &mut pending, None).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }), "got {err:?}");
}

#[test]
fn test_unpublished_older_binary_skipped_by_domination() {
    let mut f = setup();
    let old = f.source(&f.ppa1, "foo", "1.0-1");
    let build = f.build(&old, &f.i386, BuildStatus::FullyBuilt);
    let release = f.binary_release(&build, "foo-bin", "1.0-1", true, BinaryFormat::Deb, false);
    let mut pending = BinaryPublication::new(&release, f.ppa1.id.unwrap(), f.i386.id.unwrap(), Pocket::Release);
    pending.insert(&f.conn).unwrap();

    let new = f.source(&f.ppa1, "foo", "1.0-2");
    f.arch_binaries(&new, "foo-bin", &[&f.i386]);

    let report = Dominator::new(&f.ppa1)
        .dominate(&mut f.conn, &f.breezy, Pocket::Release)
        .unwrap();
    assert_eq!(report.binaries_superseded, 0);
    assert_eq!(report.binaries_skipped, 1);
    let pending = BinaryPublication::get(&f.conn, pending.id.unwrap()).unwrap();
    assert_eq!(pending.status, PublishingStatus::Pending);
}
