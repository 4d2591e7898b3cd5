// src/db/migrations.rs
//! Database migration implementations
//!
//! Each function upgrades the schema by exactly one version.

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Initial schema - Version 1
///
/// Creates the archive topology and the publication tables:
/// - distributions, distroseries, distroarchseries: release targets
/// - archives: repositories owning publications
/// - persons, upload_permissions: who may copy where
/// - library_files: content-store metadata (restricted/expired flags)
/// - source_releases, binary_releases, builds: what gets published
/// - source_publications, binary_publications: bindings into archives
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE distributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT
        );

        CREATE TABLE distroseries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            distribution_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            display_name TEXT,
            version TEXT NOT NULL,
            parent_series_id INTEGER,
            nominated_arch_indep_id INTEGER,
            UNIQUE(distribution_id, name),
            FOREIGN KEY (distribution_id) REFERENCES distributions(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_series_id) REFERENCES distroseries(id) ON DELETE SET NULL
        );

        CREATE INDEX idx_distroseries_parent ON distroseries(parent_series_id);

        -- Components a series accepts, in preference order
        CREATE TABLE distroseries_components (
            distroseries_id INTEGER NOT NULL,
            component TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (distroseries_id, component),
            FOREIGN KEY (distroseries_id) REFERENCES distroseries(id) ON DELETE CASCADE
        );

        -- Source package formats a series accepts (e.g. '1.0', '3.0 (quilt)')
        CREATE TABLE distroseries_source_formats (
            distroseries_id INTEGER NOT NULL,
            format TEXT NOT NULL,
            PRIMARY KEY (distroseries_id, format),
            FOREIGN KEY (distroseries_id) REFERENCES distroseries(id) ON DELETE CASCADE
        );

        CREATE TABLE distroarchseries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            distroseries_id INTEGER NOT NULL,
            architecture_tag TEXT NOT NULL,
            processor_family TEXT NOT NULL,
            restricted INTEGER NOT NULL DEFAULT 0,
            enabled INTEGER NOT NULL DEFAULT 1,
            UNIQUE(distroseries_id, architecture_tag),
            FOREIGN KEY (distroseries_id) REFERENCES distroseries(id) ON DELETE CASCADE
        );

        CREATE TABLE persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT,
            email TEXT
        );

        CREATE TABLE archives (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            distribution_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            owner_id INTEGER,
            purpose TEXT NOT NULL CHECK(purpose IN ('primary', 'ppa', 'partner', 'copy', 'debug')),
            private INTEGER NOT NULL DEFAULT 0,
            enabled INTEGER NOT NULL DEFAULT 1,
            require_virtualized INTEGER NOT NULL DEFAULT 0,
            debug_archive_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(distribution_id, name),
            FOREIGN KEY (distribution_id) REFERENCES distributions(id) ON DELETE CASCADE,
            FOREIGN KEY (owner_id) REFERENCES persons(id),
            FOREIGN KEY (debug_archive_id) REFERENCES archives(id)
        );

        CREATE INDEX idx_archives_purpose ON archives(distribution_id, purpose);

        -- Restricted processor families an archive explicitly allows (e.g. 'arm')
        CREATE TABLE archive_restricted_families (
            archive_id INTEGER NOT NULL,
            family TEXT NOT NULL,
            PRIMARY KEY (archive_id, family),
            FOREIGN KEY (archive_id) REFERENCES archives(id) ON DELETE CASCADE
        );

        -- Architectures an archive opts out of building and publishing
        CREATE TABLE archive_disabled_architectures (
            archive_id INTEGER NOT NULL,
            architecture_tag TEXT NOT NULL,
            PRIMARY KEY (archive_id, architecture_tag),
            FOREIGN KEY (archive_id) REFERENCES archives(id) ON DELETE CASCADE
        );

        -- NULL component and package_name grant archive-wide rights
        CREATE TABLE upload_permissions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            archive_id INTEGER NOT NULL,
            person_id INTEGER NOT NULL,
            component TEXT,
            package_name TEXT,
            FOREIGN KEY (archive_id) REFERENCES archives(id) ON DELETE CASCADE,
            FOREIGN KEY (person_id) REFERENCES persons(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_upload_permissions_lookup ON upload_permissions(archive_id, person_id);

        CREATE TABLE library_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            sha256 TEXT NOT NULL,
            size INTEGER NOT NULL,
            restricted INTEGER NOT NULL DEFAULT 0,
            expired INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_library_files_filename ON library_files(filename);

        CREATE TABLE source_releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            format TEXT NOT NULL DEFAULT '1.0',
            component TEXT NOT NULL,
            section TEXT NOT NULL,
            architecture_hint TEXT NOT NULL DEFAULT 'any',
            changelog TEXT,
            creator_id INTEGER,
            upload_archive_id INTEGER,
            upload_distroseries_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (creator_id) REFERENCES persons(id),
            FOREIGN KEY (upload_archive_id) REFERENCES archives(id),
            FOREIGN KEY (upload_distroseries_id) REFERENCES distroseries(id)
        );

        CREATE INDEX idx_source_releases_name ON source_releases(name, version);

        CREATE TABLE source_release_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_release_id INTEGER NOT NULL,
            library_file_id INTEGER NOT NULL,
            UNIQUE(source_release_id, library_file_id),
            FOREIGN KEY (source_release_id) REFERENCES source_releases(id) ON DELETE CASCADE,
            FOREIGN KEY (library_file_id) REFERENCES library_files(id)
        );

        CREATE TABLE builds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_release_id INTEGER NOT NULL,
            distroarchseries_id INTEGER NOT NULL,
            archive_id INTEGER NOT NULL,
            pocket TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN (
                'needs_build', 'building', 'uploading', 'fully_built', 'failed_to_build',
                'dependency_wait', 'chroot_wait', 'superseded', 'cancelled')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            finished_at TEXT,
            FOREIGN KEY (source_release_id) REFERENCES source_releases(id),
            FOREIGN KEY (distroarchseries_id) REFERENCES distroarchseries(id),
            FOREIGN KEY (archive_id) REFERENCES archives(id)
        );

        CREATE INDEX idx_builds_source ON builds(source_release_id, archive_id);

        CREATE TABLE binary_releases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            build_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            format TEXT NOT NULL CHECK(format IN ('deb', 'udeb', 'ddeb')),
            component TEXT NOT NULL,
            section TEXT NOT NULL,
            priority TEXT NOT NULL,
            architecture_specific INTEGER NOT NULL DEFAULT 1,
            debug_release_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (build_id) REFERENCES builds(id),
            FOREIGN KEY (debug_release_id) REFERENCES binary_releases(id)
        );

        CREATE INDEX idx_binary_releases_build ON binary_releases(build_id);

        CREATE TABLE binary_release_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            binary_release_id INTEGER NOT NULL,
            library_file_id INTEGER NOT NULL,
            UNIQUE(binary_release_id, library_file_id),
            FOREIGN KEY (binary_release_id) REFERENCES binary_releases(id) ON DELETE CASCADE,
            FOREIGN KEY (library_file_id) REFERENCES library_files(id)
        );

        CREATE TABLE source_publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_release_id INTEGER NOT NULL,
            archive_id INTEGER NOT NULL,
            distroseries_id INTEGER NOT NULL,
            pocket TEXT NOT NULL,
            source_name TEXT NOT NULL,
            version TEXT NOT NULL,
            component TEXT NOT NULL,
            section TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'published', 'superseded', 'deleted', 'obsolete')),
            date_created TEXT NOT NULL,
            date_published TEXT,
            date_superseded TEXT,
            date_removed TEXT,
            superseded_by_release_id INTEGER,
            ancestor_id INTEGER,
            creator_id INTEGER,
            sponsor_id INTEGER,
            removed_by_id INTEGER,
            removal_comment TEXT,
            FOREIGN KEY (source_release_id) REFERENCES source_releases(id),
            FOREIGN KEY (archive_id) REFERENCES archives(id),
            FOREIGN KEY (distroseries_id) REFERENCES distroseries(id),
            FOREIGN KEY (superseded_by_release_id) REFERENCES source_releases(id),
            FOREIGN KEY (ancestor_id) REFERENCES source_publications(id),
            FOREIGN KEY (creator_id) REFERENCES persons(id),
            FOREIGN KEY (sponsor_id) REFERENCES persons(id),
            FOREIGN KEY (removed_by_id) REFERENCES persons(id)
        );

        CREATE INDEX idx_spp_archive_name ON source_publications(archive_id, source_name, version);
        CREATE INDEX idx_spp_release ON source_publications(source_release_id);
        CREATE INDEX idx_spp_context ON source_publications(archive_id, distroseries_id, pocket, status);

        -- At most one active publication per (archive, series, pocket, name, version)
        CREATE UNIQUE INDEX idx_spp_active_unique
            ON source_publications(archive_id, distroseries_id, pocket, source_name, version)
            WHERE status IN ('pending', 'published');

        CREATE TABLE binary_publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            binary_release_id INTEGER NOT NULL,
            archive_id INTEGER NOT NULL,
            distroarchseries_id INTEGER NOT NULL,
            pocket TEXT NOT NULL,
            binary_name TEXT NOT NULL,
            version TEXT NOT NULL,
            component TEXT NOT NULL,
            section TEXT NOT NULL,
            priority TEXT NOT NULL,
            architecture_specific INTEGER NOT NULL,
            binary_format TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'published', 'superseded', 'deleted', 'obsolete')),
            date_created TEXT NOT NULL,
            date_published TEXT,
            date_superseded TEXT,
            date_removed TEXT,
            superseded_by_build_id INTEGER,
            creator_id INTEGER,
            removed_by_id INTEGER,
            removal_comment TEXT,
            FOREIGN KEY (binary_release_id) REFERENCES binary_releases(id),
            FOREIGN KEY (archive_id) REFERENCES archives(id),
            FOREIGN KEY (distroarchseries_id) REFERENCES distroarchseries(id),
            FOREIGN KEY (superseded_by_build_id) REFERENCES builds(id),
            FOREIGN KEY (creator_id) REFERENCES persons(id),
            FOREIGN KEY (removed_by_id) REFERENCES persons(id)
        );

        CREATE INDEX idx_bpp_release ON binary_publications(binary_release_id, archive_id, pocket);
        CREATE INDEX idx_bpp_context ON binary_publications(archive_id, distroarchseries_id, pocket, status);

        -- At most one active publication per (archive, arch series, pocket, name, version)
        CREATE UNIQUE INDEX idx_bpp_active_unique
            ON binary_publications(archive_id, distroarchseries_id, pocket, binary_name, version)
            WHERE status IN ('pending', 'published');
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: Delayed copies and difference tracking
///
/// - package_uploads: accepted-but-unpublished copy units (delayed copies)
/// - package_upload_builds: builds whose binaries travel with a delayed copy
/// - custom_uploads: non-package artifacts produced by builds
/// - package_upload_customs: custom artifacts staged with a delayed copy
/// - distroseries_difference_jobs: pending recomputation for derived series
pub fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE package_uploads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            archive_id INTEGER NOT NULL,
            distroseries_id INTEGER NOT NULL,
            pocket TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('accepted', 'done', 'rejected')),
            source_publication_id INTEGER NOT NULL,
            include_binaries INTEGER NOT NULL DEFAULT 0,
            creator_id INTEGER,
            sponsor_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            date_done TEXT,
            FOREIGN KEY (archive_id) REFERENCES archives(id),
            FOREIGN KEY (distroseries_id) REFERENCES distroseries(id),
            FOREIGN KEY (source_publication_id) REFERENCES source_publications(id),
            FOREIGN KEY (creator_id) REFERENCES persons(id),
            FOREIGN KEY (sponsor_id) REFERENCES persons(id)
        );

        CREATE INDEX idx_package_uploads_status ON package_uploads(archive_id, status);

        CREATE TABLE package_upload_builds (
            package_upload_id INTEGER NOT NULL,
            build_id INTEGER NOT NULL,
            PRIMARY KEY (package_upload_id, build_id),
            FOREIGN KEY (package_upload_id) REFERENCES package_uploads(id) ON DELETE CASCADE,
            FOREIGN KEY (build_id) REFERENCES builds(id)
        );

        CREATE TABLE custom_uploads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            build_id INTEGER NOT NULL,
            custom_type TEXT NOT NULL,
            library_file_id INTEGER NOT NULL,
            FOREIGN KEY (build_id) REFERENCES builds(id) ON DELETE CASCADE,
            FOREIGN KEY (library_file_id) REFERENCES library_files(id)
        );

        CREATE TABLE package_upload_customs (
            package_upload_id INTEGER NOT NULL,
            custom_upload_id INTEGER NOT NULL,
            PRIMARY KEY (package_upload_id, custom_upload_id),
            FOREIGN KEY (package_upload_id) REFERENCES package_uploads(id) ON DELETE CASCADE,
            FOREIGN KEY (custom_upload_id) REFERENCES custom_uploads(id)
        );

        CREATE TABLE distroseries_difference_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            derived_series_id INTEGER NOT NULL,
            parent_series_id INTEGER NOT NULL,
            source_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'waiting' CHECK(status IN ('waiting', 'running', 'completed', 'failed')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (derived_series_id) REFERENCES distroseries(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_series_id) REFERENCES distroseries(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_dsd_jobs_pending ON distroseries_difference_jobs(derived_series_id, status);
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}
