// src/services.rs

//! External collaborators of the engine
//!
//! The engine never reaches for global singletons. Everything outside the
//! publication tables (file bytes, the build farm, the bug tracker, mail
//! delivery) is reached through the traits here and handed in as a
//! [`Services`] bundle.
//!
//! Implementations provided:
//! - `CasContentStore` (in `librarian`): content store on local disk
//! - `QueueBuildScheduler`: records builds for the build farm to pick up
//! - `LogBugCloser` / `LogNotifier`: report through tracing only

use crate::db::models::{Archive, Build, DistroArchSeries, LibraryFile, Pocket, SourceRelease};
use crate::error::Result;
use rusqlite::Connection;
use std::sync::Arc;
use tracing::info;

/// Byte storage for package files
pub trait ContentStore: Send + Sync {
    /// Whether the file's bytes can still be fetched
    fn is_retrievable(&self, file: &LibraryFile) -> bool;

    /// Make restricted content readable from public contexts
    fn unembargo(&self, file: &LibraryFile) -> Result<()>;
}

/// Build-farm queue
pub trait BuildScheduler: Send + Sync {
    /// Enqueue a build; must not wait for it to run
    fn create_build(
        &self,
        conn: &Connection,
        release: &SourceRelease,
        arch: &DistroArchSeries,
        archive: &Archive,
        pocket: Pocket,
    ) -> Result<Build>;
}

/// Bug tracker
pub trait BugCloser: Send + Sync {
    /// Close bugs fixed by a source landing in `suite` of `archive`
    fn close_bugs(&self, bugs: &[u32], source: &str, archive: &str, suite: &str) -> Result<()>;
}

/// Outbound mail
pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Creates NEEDSBUILD build records in the database
#[derive(Debug, Default, Clone, Copy)]
pub struct QueueBuildScheduler;

impl BuildScheduler for QueueBuildScheduler {
    fn create_build(
        &self,
        conn: &Connection,
        release: &SourceRelease,
        arch: &DistroArchSeries,
        archive: &Archive,
        pocket: Pocket,
    ) -> Result<Build> {
        let mut build = Build::new(
            release.id.unwrap_or_default(),
            arch.id.unwrap_or_default(),
            archive.id.unwrap_or_default(),
            pocket,
        );
        build.insert(conn)?;
        info!(
            "Queued build of {} for {} in {}",
            release.title(),
            arch.architecture_tag,
            archive.name
        );
        Ok(build)
    }
}

/// Reports bug closures through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBugCloser;

impl BugCloser for LogBugCloser {
    fn close_bugs(&self, bugs: &[u32], source: &str, archive: &str, suite: &str) -> Result<()> {
        for bug in bugs {
            info!("Closing bug #{} fixed by {} in {}/{}", bug, source, archive, suite);
        }
        Ok(())
    }
}

/// Reports notifications through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            "Notification to {}: {}",
            notification.to.join(", "),
            notification.subject
        );
        Ok(())
    }
}

/// The collaborators an engine run works with
#[derive(Clone)]
pub struct Services {
    pub content_store: Arc<dyn ContentStore>,
    pub builds: Arc<dyn BuildScheduler>,
    pub bugs: Arc<dyn BugCloser>,
    pub notifier: Arc<dyn Notifier>,
}

impl Services {
    /// Bundle a content store with the queue scheduler and logging reporters
    pub fn new(content_store: Arc<dyn ContentStore>) -> Self {
        Self {
            content_store,
            builds: Arc::new(QueueBuildScheduler),
            bugs: Arc::new(LogBugCloser),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_build_scheduler(mut self, builds: Arc<dyn BuildScheduler>) -> Self {
        self.builds = builds;
        self
    }

    pub fn with_bug_closer(mut self, bugs: Arc<dyn BugCloser>) -> Self {
        self.bugs = bugs;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
