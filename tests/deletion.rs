// tests/deletion.rs

//! Removal, override changes and publishing of publications.

mod common;

use common::setup;
use depot::db::models::{
    BinaryPublication, DifferenceJob, DistroSeries, Pocket, Priority, Publication,
    PublishingStatus, SourcePublication,
};
use depot::publishing::{self, OverrideChange};
use depot::Error;

#[test]
fn test_deleting_source_cascades_to_binaries() {
    let mut f = setup();
    let cprov = f.cprov.clone();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let bins = f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let mut pubs = vec![Publication::from(spp.clone())];
    let removed = publishing::request_deletion(&mut f.conn, &mut pubs, Some(&cprov), Some("No longer needed")).unwrap();
    assert_eq!(removed.len(), 3);

    let spp = SourcePublication::get(&f.conn, spp.id.unwrap()).unwrap();
    assert_eq!(spp.status, PublishingStatus::Deleted);
    assert_eq!(spp.removed_by_id, cprov.id);
    assert_eq!(spp.removal_comment.as_deref(), Some("No longer needed"));
    assert!(spp.date_removed.is_some());
    for bpp in &bins {
        let bpp = BinaryPublication::get(&f.conn, bpp.id.unwrap()).unwrap();
        assert_eq!(bpp.status, PublishingStatus::Deleted);
        assert_eq!(bpp.removed_by_id, cprov.id);
    }
}

#[test]
fn test_deleting_binary_leaves_source() {
    let mut f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let bins = f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let mut pubs = vec![Publication::from(bins[0].clone())];
    let removed = publishing::request_deletion(&mut f.conn, &mut pubs, None, None).unwrap();
    assert_eq!(removed, vec![bins[0].id.unwrap()]);

    let spp = SourcePublication::get(&f.conn, spp.id.unwrap()).unwrap();
    assert_eq!(spp.status, PublishingStatus::Published);
    let other = BinaryPublication::get(&f.conn, bins[1].id.unwrap()).unwrap();
    assert_eq!(other.status, PublishingStatus::Published);
}

#[test]
fn test_deletion_queues_difference_jobs_for_derived_series() {
    let mut f = setup();
    let mut derived = DistroSeries::new(f.distro.id.unwrap(), "breezy-derived", "5.10.1");
    derived.parent_series_id = f.breezy.id;
    derived.insert(&f.conn).unwrap();

    let first = f.source(&f.ppa1, "foo", "1.0-1");
    let second = f.source(&f.ppa1, "foo", "1.0-2");
    let mut pubs = vec![Publication::from(first), Publication::from(second)];
    publishing::request_deletion(&mut f.conn, &mut pubs, None, None).unwrap();

    let jobs = DifferenceJob::find_waiting(&f.conn, derived.id.unwrap()).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].source_name, "foo");
    assert_eq!(jobs[0].parent_series_id, f.breezy.id.unwrap());
}

#[test]
fn test_obsolescence_queues_no_jobs() {
    let mut f = setup();
    let mut derived = DistroSeries::new(f.distro.id.unwrap(), "breezy-derived", "5.10.1");
    derived.parent_series_id = f.breezy.id;
    derived.insert(&f.conn).unwrap();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let bins = f.arch_binaries(&spp, "foo-bin", &[&f.i386]);

    let mut pubs = vec![Publication::from(spp.clone())];
    let removed = publishing::request_obsolescence(&mut f.conn, &mut pubs, None, None).unwrap();
    assert_eq!(removed.len(), 2);

    let spp = SourcePublication::get(&f.conn, spp.id.unwrap()).unwrap();
    assert_eq!(spp.status, PublishingStatus::Obsolete);
    let bpp = BinaryPublication::get(&f.conn, bins[0].id.unwrap()).unwrap();
    assert_eq!(bpp.status, PublishingStatus::Obsolete);
    assert!(DifferenceJob::find_waiting(&f.conn, derived.id.unwrap()).unwrap().is_empty());
}

#[test]
fn test_failed_deletion_changes_nothing() {
    let mut f = setup();
    let live = f.source(&f.ppa1, "foo", "1.0-1");
    let gone = f.source(&f.ppa1, "bar", "1.0-1");
    publishing::request_deletion(&mut f.conn, &mut [Publication::from(gone.clone())], None, None).unwrap();
    let gone = SourcePublication::get(&f.conn, gone.id.unwrap()).unwrap();

    let mut pubs = vec![Publication::from(live.clone()), Publication::from(gone)];
    let err = publishing::request_deletion(&mut f.conn, &mut pubs, None, None).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }), "got {err:?}");

    let live = SourcePublication::get(&f.conn, live.id.unwrap()).unwrap();
    assert_eq!(live.status, PublishingStatus::Published);
}

#[test]
fn test_change_source_override() {
    let mut f = setup();
    let spp = f.source(&f.primary, "foo", "1.0-1");

    let change = OverrideChange {
        component: Some("universe".to_string()),
        section: Some("games".to_string()),
        ..Default::default()
    };
    let created = publishing::change_override(&mut f.conn, &Publication::from(spp.clone()), &change).unwrap();
    assert_eq!(created.len(), 1);
    let Publication::Source(new) = &created[0] else {
        panic!("expected a source publication");
    };
    assert_eq!(new.component, "universe");
    assert_eq!(new.section, "games");
    assert_eq!(new.status, PublishingStatus::Pending);
    assert_eq!(new.ancestor_id, spp.id);
    assert_eq!(new.source_release_id, spp.source_release_id);

    let old = SourcePublication::get(&f.conn, spp.id.unwrap()).unwrap();
    assert_eq!(old.status, PublishingStatus::Superseded);
}

#[test]
fn test_change_override_moves_arch_indep_siblings_together() {
    let mut f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let docs = f.indep_binary(&spp, "foo-doc", &[&f.i386, &f.hppa]);

    let change = OverrideChange {
        section: Some("doc".to_string()),
        priority: Some(Priority::Extra),
        ..Default::default()
    };
    let created = publishing::change_override(&mut f.conn, &Publication::from(docs[0].clone()), &change).unwrap();
    assert_eq!(created.len(), 2);
    for publication in &created {
        let Publication::Binary(bpp) = publication else {
            panic!("expected binary publications");
        };
        assert_eq!(bpp.section, "doc");
        assert_eq!(bpp.priority, Priority::Extra);
        assert_eq!(bpp.status, PublishingStatus::Pending);
    }
    for old in &docs {
        let old = BinaryPublication::get(&f.conn, old.id.unwrap()).unwrap();
        assert_eq!(old.status, PublishingStatus::Superseded);
    }
}

#[test]
fn test_change_override_of_arch_specific_binary() {
    let mut f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let bins = f.arch_binaries(&spp, "foo-bin", &[&f.i386, &f.hppa]);

    let change = OverrideChange {
        priority: Some(Priority::Important),
        ..Default::default()
    };
    let created = publishing::change_override(&mut f.conn, &Publication::from(bins[0].clone()), &change).unwrap();
    assert_eq!(created.len(), 1);
    let untouched = BinaryPublication::get(&f.conn, bins[1].id.unwrap()).unwrap();
    assert_eq!(untouched.status, PublishingStatus::Published);
}

#[test]
fn test_unchanged_override_is_a_noop() {
    let mut f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");

    let change = OverrideChange {
        component: Some(spp.component.clone()),
        ..Default::default()
    };
    let created = publishing::change_override(&mut f.conn, &Publication::from(spp.clone()), &change).unwrap();
    assert!(created.is_empty());
    let spp = SourcePublication::get(&f.conn, spp.id.unwrap()).unwrap();
    assert_eq!(spp.status, PublishingStatus::Published);
}

#[test]
fn test_partner_component_rejected_in_primary() {
    let mut f = setup();
    let spp = f.source(&f.primary, "foo", "1.0-1");

    let change = OverrideChange {
        component: Some("partner".to_string()),
        ..Default::default()
    };
    let err = publishing::change_override(&mut f.conn, &Publication::from(spp.clone()), &change).unwrap_err();
    assert!(matches!(err, Error::IllegalTarget(_)), "got {err:?}");
    assert!(err.to_string().contains("would require a new archive"));

    let spp = SourcePublication::get(&f.conn, spp.id.unwrap()).unwrap();
    assert_eq!(spp.status, PublishingStatus::Published);
}

#[test]
fn test_unknown_component_rejected_in_primary() {
    let mut f = setup();
    let spp = f.source(&f.primary, "foo", "1.0-1");

    let change = OverrideChange {
        component: Some("contrib".to_string()),
        ..Default::default()
    };
    let err = publishing::change_override(&mut f.conn, &Publication::from(spp), &change).unwrap_err();
    assert!(matches!(err, Error::IllegalTarget(_)), "got {err:?}");
}

#[test]
fn test_removed_publication_cannot_be_overridden() {
    let mut f = setup();
    let spp = f.source(&f.ppa1, "foo", "1.0-1");
    let mut pubs = vec![Publication::from(spp)];
    publishing::request_deletion(&mut f.conn, &mut pubs, None, None).unwrap();

    let change = OverrideChange {
        section: Some("games".to_string()),
        ..Default::default()
    };
    let err = publishing::change_override(&mut f.conn, &pubs[0], &change).unwrap_err();
    assert!(matches!(err, Error::IllegalTarget(_)), "got {err:?}");
}

#[test]
fn test_set_published_only_from_pending() {
    let f = setup();
    let release = f.release("foo", "1.0-1", false);
    let spp = f.pending_source(&release, &f.ppa1, Pocket::Release);

    let mut publication = Publication::from(spp);
    publishing::set_published(&f.conn, &mut publication).unwrap();
    assert_eq!(publication.status(), PublishingStatus::Published);
    let stored = SourcePublication::get(&f.conn, publication.id().unwrap()).unwrap();
    assert!(stored.date_published.is_some());

    let err = publishing::set_published(&f.conn, &mut publication).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }), "got {err:?}");
}
