// src/publishing/overrides.rs

//! Override resolution for new publications
//!
//! Decides the component, section and priority a new publication gets in
//! its destination. In order of precedence:
//!
//! 1. An explicit override supplied by the caller (operator decision)
//! 2. The nearest ancestor: the latest publication of the same name in the
//!    destination archive, searched in the exact series and pocket first,
//!    then the series, then the whole archive
//! 3. The archive purpose's default component (`partner`, or `main` for PPAs)
//! 4. For primary and copy archives, the component the source carried, if
//!    the series permits it
//!
//! Any resolved component must still be legal for the archive: a component
//! the distribution keeps in an archive of another purpose is rejected.

use super::PublishingSet;
use crate::db::models::{
    Archive, ArchivePurpose, DistroSeries, Pocket, Priority, PublishingStatus,
};
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::debug;

/// Component, section and (for binaries) priority of a publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub component: String,
    pub section: String,
    pub priority: Option<Priority>,
}

impl Overrides {
    pub fn new(component: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            section: section.into(),
            priority: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// What is being published
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideTarget<'a> {
    Source { name: &'a str },
    Binary { name: &'a str, distroarchseries_id: i64 },
}

impl OverrideTarget<'_> {
    fn name(&self) -> &str {
        match self {
            OverrideTarget::Source { name } | OverrideTarget::Binary { name, .. } => name,
        }
    }
}

/// Outcome of resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOverrides {
    pub component: String,
    pub section: String,
    pub priority: Option<Priority>,
    /// Publication the values were inherited from, if any
    pub ancestor_id: Option<i64>,
}

/// Resolves overrides for one destination (archive, series, pocket)
pub struct OverrideResolver<'a> {
    conn: &'a Connection,
    archive: &'a Archive,
    series: &'a DistroSeries,
    pocket: Pocket,
    statuses: Vec<PublishingStatus>,
    require_ancestry: bool,
    set: PublishingSet,
}

impl<'a> OverrideResolver<'a> {
    /// Ancestors are looked up among PUBLISHED publications unless
    /// [`with_statuses`](Self::with_statuses) says otherwise
    pub fn new(
        conn: &'a Connection,
        archive: &'a Archive,
        series: &'a DistroSeries,
        pocket: Pocket,
    ) -> Self {
        Self {
            conn,
            archive,
            series,
            pocket,
            statuses: vec![PublishingStatus::Published],
            require_ancestry: false,
            set: PublishingSet::default(),
        }
    }

    pub fn with_statuses(mut self, statuses: &[PublishingStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    /// Fail instead of falling back to defaults when no ancestor exists
    pub fn require_ancestry(mut self, required: bool) -> Self {
        self.require_ancestry = required;
        self
    }

    /// Resolve overrides for `target`, starting from the `candidate` values
    /// it carries in its source context
    pub fn resolve(
        &self,
        target: &OverrideTarget<'_>,
        candidate: &Overrides,
        explicit: Option<&Overrides>,
    ) -> Result<ResolvedOverrides> {
        if let Some(explicit) = explicit {
            check_component(self.conn, self.archive, self.series, &explicit.component)?;
            return Ok(ResolvedOverrides {
                component: explicit.component.clone(),
                section: explicit.section.clone(),
                priority: explicit.priority.or(candidate.priority),
                ancestor_id: None,
            });
        }

        if let Some(ancestor) = self.find_ancestor(target)? {
            debug!(
                "Inheriting overrides for {} from publication {}",
                target.name(),
                ancestor.ancestor_id.unwrap_or_default()
            );
            return Ok(ancestor);
        }

        if self.require_ancestry {
            return Err(Error::OverrideResolution(format!(
                "no ancestry for {} in {} and none was supplied",
                target.name(),
                self.archive.name
            )));
        }

        let component = match self.archive.purpose.default_component() {
            Some(component) => component.to_string(),
            None => {
                let permitted = self.series.components(self.conn)?;
                if !permitted.is_empty() && !permitted.contains(&candidate.component) {
                    return Err(Error::OverrideResolution(format!(
                        "component '{}' of {} is not permitted in {} and no ancestry exists",
                        candidate.component,
                        target.name(),
                        self.series.name
                    )));
                }
                candidate.component.clone()
            }
        };

        Ok(ResolvedOverrides {
            component,
            section: candidate.section.clone(),
            priority: candidate.priority,
            ancestor_id: None,
        })
    }

    /// The nearest ancestor's overrides, narrowest context first
    pub fn find_ancestor(&self, target: &OverrideTarget<'_>) -> Result<Option<ResolvedOverrides>> {
        let archive_id = self.archive.id.unwrap_or_default();
        match target {
            OverrideTarget::Source { name } => {
                let series_id = self.series.id;
                for (series, pocket) in [(series_id, Some(self.pocket)), (series_id, None), (None, None)] {
                    if let Some(spp) = self.set.find_source_ancestor(
                        self.conn,
                        archive_id,
                        name,
                        series,
                        pocket,
                        &self.statuses,
                    )? {
                        return Ok(Some(ResolvedOverrides {
                            component: spp.component,
                            section: spp.section,
                            priority: None,
                            ancestor_id: spp.id,
                        }));
                    }
                }
            }
            OverrideTarget::Binary {
                name,
                distroarchseries_id,
            } => {
                let das = Some(*distroarchseries_id);
                for (das, pocket) in [(das, Some(self.pocket)), (das, None), (None, None)] {
                    if let Some(bpp) = self.set.find_binary_ancestor(
                        self.conn,
                        archive_id,
                        name,
                        das,
                        pocket,
                        &self.statuses,
                    )? {
                        return Ok(Some(ResolvedOverrides {
                            component: bpp.component,
                            section: bpp.section,
                            priority: Some(bpp.priority),
                            ancestor_id: bpp.id,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Reject components the archive may not hold
///
/// Main archives cannot take a component the distribution keeps in an
/// archive of another purpose, and no archive may use a component the
/// series does not list (an empty list permits anything).
pub fn check_component(
    conn: &Connection,
    archive: &Archive,
    series: &DistroSeries,
    component: &str,
) -> Result<()> {
    if archive.is_main() && ArchivePurpose::responsible_for_component(component) != archive.purpose {
        return Err(Error::IllegalTarget(format!(
            "Overriding component to '{component}' failed because it would require a new archive."
        )));
    }
    if archive.purpose.default_component().is_none() {
        let permitted = series.components(conn)?;
        if !permitted.is_empty() && !permitted.iter().any(|c| c == component) {
            return Err(Error::IllegalTarget(format!(
                "Component '{component}' is not permitted in {}",
                series.name
            )));
        }
    }
    Ok(())
}
