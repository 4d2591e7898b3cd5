// src/cli/mod.rs
//! CLI definitions for the depot publishing engine
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `init` - Create the database
//! - `copy` - Check and perform package copies between archives
//! - `delete` - Delete (or obsolete) publications
//! - `override` - Change a publication's component, section or priority
//! - `publish` - Move pending publications to published
//! - `dominate` - Supersede older versions in a suite
//! - `build-status` - Build summaries of source publications
//! - `list` - List publications of an archive
//! - `release-delayed` - Release staged private-to-public copies

use clap::{Args, Parser, Subcommand};

/// Database location shared by every command
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// Path to the database file
    #[arg(short, long, env = "DEPOT_DB_PATH", default_value = depot::db::DEFAULT_DB_PATH)]
    pub db_path: String,
}

/// Settings for commands that run the copy engine
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Engine configuration file (missing file means defaults)
    #[arg(long, default_value = depot::config::DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Root of the content store
    #[arg(long, default_value = depot::librarian::DEFAULT_STORE_ROOT)]
    pub store_root: String,
}

/// Archive addressing shared by archive-scoped commands
#[derive(Args, Debug, Clone)]
pub struct ArchiveArgs {
    /// Distribution the archive belongs to
    #[arg(long, env = "DEPOT_DISTRIBUTION", default_value = "ubuntu")]
    pub distribution: String,

    /// Archive name
    #[arg(short, long)]
    pub archive: String,
}

#[derive(Parser)]
#[command(name = "depot")]
#[command(author = "Depot Contributors")]
#[command(version)]
#[command(about = "Archive publishing and package-copy engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new depot database
    Init {
        #[command(flatten)]
        db: DbArgs,
    },

    /// Copy source packages (and optionally their binaries) between archives
    ///
    /// Every request is checked first; refused requests are reported and
    /// the accepted ones are copied together in one transaction.
    Copy {
        /// Sources to copy, as `name` or `name/version`
        #[arg(required = true)]
        sources: Vec<String>,

        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Distribution of both archives
        #[arg(long, env = "DEPOT_DISTRIBUTION", default_value = "ubuntu")]
        distribution: String,

        /// Archive to copy from
        #[arg(long)]
        from_archive: String,

        /// Archive to copy into (default: the source archive)
        #[arg(long)]
        to_archive: Option<String>,

        /// Series to copy from
        #[arg(long)]
        from_series: String,

        /// Series to copy into (default: the source series)
        #[arg(long)]
        to_series: Option<String>,

        /// Pocket to copy from
        #[arg(long, default_value = "release")]
        from_pocket: String,

        /// Pocket to copy into (default: the source pocket)
        #[arg(long)]
        to_pocket: Option<String>,

        /// Copy the binaries built from each source as well
        #[arg(short, long)]
        include_binaries: bool,

        /// Copy private content straight into a public archive
        #[arg(long)]
        unembargo: bool,

        /// Person performing the copy (checked for upload rights)
        #[arg(long)]
        person: Option<String>,

        /// Person on whose behalf the copy is performed
        #[arg(long)]
        sponsored: Option<String>,

        /// Component override for the new publications
        #[arg(long)]
        component: Option<String>,

        /// Section override for the new publications
        #[arg(long)]
        section: Option<String>,

        /// Only run the checks and report what would be copied
        #[arg(long)]
        dry_run: bool,
    },

    /// Delete publications
    Delete {
        /// Publication IDs
        #[arg(required = true)]
        ids: Vec<i64>,

        #[command(flatten)]
        db: DbArgs,

        /// IDs are binary publications (default: source publications)
        #[arg(long)]
        binary: bool,

        /// Removal comment
        #[arg(short, long)]
        comment: Option<String>,

        /// Person requesting the removal
        #[arg(long)]
        person: Option<String>,

        /// Mark OBSOLETE instead of DELETED
        #[arg(long)]
        obsolete: bool,
    },

    /// Change the component, section or priority of a publication
    Override {
        /// Publication ID
        id: i64,

        #[command(flatten)]
        db: DbArgs,

        /// The ID is a binary publication (default: source publication)
        #[arg(long)]
        binary: bool,

        /// New component
        #[arg(long)]
        component: Option<String>,

        /// New section
        #[arg(long)]
        section: Option<String>,

        /// New priority (binaries only)
        #[arg(long)]
        priority: Option<String>,
    },

    /// Mark pending publications of an archive as published
    Publish {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        archive: ArchiveArgs,

        /// Print the pool path of every published file
        #[arg(long)]
        show_pool: bool,
    },

    /// Supersede everything but the newest version of each package in a suite
    Dominate {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        archive: ArchiveArgs,

        /// Series name
        #[arg(short, long)]
        series: String,

        /// Pocket
        #[arg(short, long, default_value = "release")]
        pocket: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show build summaries of active source publications
    BuildStatus {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        archive: ArchiveArgs,

        /// Only this source package
        #[arg(short, long)]
        name: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List publications of an archive
    List {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        archive: ArchiveArgs,

        /// Only this package name
        #[arg(short, long)]
        name: Option<String>,

        /// Only this status (pending, published, superseded, deleted, obsolete)
        #[arg(short, long)]
        status: Option<String>,

        /// List binary publications instead of sources
        #[arg(long)]
        binaries: bool,
    },

    /// Release accepted delayed copies into an archive
    ReleaseDelayed {
        #[command(flatten)]
        db: DbArgs,

        #[command(flatten)]
        engine: EngineArgs,

        #[command(flatten)]
        archive: ArchiveArgs,
    },
}
