// src/db/models/distro.rs

//! Distribution, DistroSeries and DistroArchSeries models - release targets

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A distribution (e.g. ubuntu)
#[derive(Debug, Clone)]
pub struct Distribution {
    pub id: Option<i64>,
    pub name: String,
    pub display_name: Option<String>,
}

impl Distribution {
    /// Create a new Distribution
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            display_name: None,
        }
    }

    /// Insert this distribution into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO distributions (name, display_name) VALUES (?1, ?2)",
            params![&self.name, &self.display_name],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a distribution by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare_cached("SELECT id, name, display_name FROM distributions WHERE id = ?1")?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a distribution by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare_cached("SELECT id, name, display_name FROM distributions WHERE name = ?1")?;
        Ok(stmt.query_row([name], Self::from_row).optional()?)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            display_name: row.get(2)?,
        })
    }
}

const SERIES_COLUMNS: &str =
    "id, distribution_id, name, display_name, version, parent_series_id, nominated_arch_indep_id";

/// A release of a distribution (e.g. breezy)
#[derive(Debug, Clone)]
pub struct DistroSeries {
    pub id: Option<i64>,
    pub distribution_id: i64,
    pub name: String,
    pub display_name: Option<String>,
    pub version: String,
    /// Series this one is derived from, if any
    pub parent_series_id: Option<i64>,
    /// Architecture that builds architecture-independent packages
    pub nominated_arch_indep_id: Option<i64>,
}

impl DistroSeries {
    /// Create a new DistroSeries
    pub fn new(distribution_id: i64, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: None,
            distribution_id,
            name: name.into(),
            display_name: None,
            version: version.into(),
            parent_series_id: None,
            nominated_arch_indep_id: None,
        }
    }

    /// Insert this series into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO distroseries (distribution_id, name, display_name, version, parent_series_id, nominated_arch_indep_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.distribution_id,
                &self.name,
                &self.display_name,
                &self.version,
                self.parent_series_id,
                self.nominated_arch_indep_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a series by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SERIES_COLUMNS} FROM distroseries WHERE id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a series of a distribution by name
    pub fn find_by_name(conn: &Connection, distribution_id: i64, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SERIES_COLUMNS} FROM distroseries WHERE distribution_id = ?1 AND name = ?2"
        ))?;
        Ok(stmt
            .query_row(params![distribution_id, name], Self::from_row)
            .optional()?)
    }

    /// Series derived from this one
    pub fn derived_series(&self, conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SERIES_COLUMNS} FROM distroseries WHERE parent_series_id = ?1 ORDER BY id"
        ))?;
        let series = stmt
            .query_map([self.id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(series)
    }

    /// Name used in user-facing messages
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Permit a component in this series
    pub fn add_component(&self, conn: &Connection, component: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO distroseries_components (distroseries_id, component, position)
             VALUES (?1, ?2, (SELECT COUNT(*) FROM distroseries_components WHERE distroseries_id = ?1))",
            params![self.id, component],
        )?;
        Ok(())
    }

    /// Components permitted in this series, in preference order
    pub fn components(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT component FROM distroseries_components
             WHERE distroseries_id = ?1 ORDER BY position, component",
        )?;
        let components = stmt
            .query_map([self.id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(components)
    }

    /// Permit a source package format in this series
    pub fn add_source_format(&self, conn: &Connection, format: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO distroseries_source_formats (distroseries_id, format) VALUES (?1, ?2)",
            params![self.id, format],
        )?;
        Ok(())
    }

    /// Whether sources of `format` may be published in this series
    pub fn is_format_permitted(&self, conn: &Connection, format: &str) -> Result<bool> {
        let mut stmt = conn.prepare_cached(
            "SELECT 1 FROM distroseries_source_formats WHERE distroseries_id = ?1 AND format = ?2",
        )?;
        Ok(stmt.exists(params![self.id, format])?)
    }

    /// All architectures of this series, enabled or not
    pub fn architectures(&self, conn: &Connection) -> Result<Vec<DistroArchSeries>> {
        DistroArchSeries::find_by_series(conn, self.id.unwrap_or_default())
    }

    /// Nominate the architecture that builds architecture-independent packages
    pub fn set_nominated_arch_indep(&mut self, conn: &Connection, das_id: i64) -> Result<()> {
        conn.execute(
            "UPDATE distroseries SET nominated_arch_indep_id = ?1 WHERE id = ?2",
            params![das_id, self.id],
        )?;
        self.nominated_arch_indep_id = Some(das_id);
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            distribution_id: row.get(1)?,
            name: row.get(2)?,
            display_name: row.get(3)?,
            version: row.get(4)?,
            parent_series_id: row.get(5)?,
            nominated_arch_indep_id: row.get(6)?,
        })
    }
}

const DAS_COLUMNS: &str =
    "id, distroseries_id, architecture_tag, processor_family, restricted, enabled";

/// One build/publication architecture of a series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistroArchSeries {
    pub id: Option<i64>,
    pub distroseries_id: i64,
    pub architecture_tag: String,
    pub processor_family: String,
    /// Restricted families (e.g. ARM) must be allowed per archive
    pub restricted: bool,
    pub enabled: bool,
}

impl DistroArchSeries {
    /// Create a new, enabled, unrestricted DistroArchSeries
    pub fn new(
        distroseries_id: i64,
        architecture_tag: impl Into<String>,
        processor_family: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            distroseries_id,
            architecture_tag: architecture_tag.into(),
            processor_family: processor_family.into(),
            restricted: false,
            enabled: true,
        }
    }

    /// Insert this architecture into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO distroarchseries (distroseries_id, architecture_tag, processor_family, restricted, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.distroseries_id,
                &self.architecture_tag,
                &self.processor_family,
                self.restricted as i32,
                self.enabled as i32,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an architecture by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {DAS_COLUMNS} FROM distroarchseries WHERE id = ?1"
        ))?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// All architectures of a series
    pub fn find_by_series(conn: &Connection, distroseries_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {DAS_COLUMNS} FROM distroarchseries WHERE distroseries_id = ?1 ORDER BY architecture_tag"
        ))?;
        let arches = stmt
            .query_map([distroseries_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(arches)
    }

    /// Find the architecture of a series by tag
    pub fn find_by_tag(conn: &Connection, distroseries_id: i64, tag: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {DAS_COLUMNS} FROM distroarchseries WHERE distroseries_id = ?1 AND architecture_tag = ?2"
        ))?;
        Ok(stmt
            .query_row(params![distroseries_id, tag], Self::from_row)
            .optional()?)
    }

    /// Enable or disable this architecture
    pub fn set_enabled(&mut self, conn: &Connection, enabled: bool) -> Result<()> {
        conn.execute(
            "UPDATE distroarchseries SET enabled = ?1 WHERE id = ?2",
            params![enabled as i32, self.id],
        )?;
        self.enabled = enabled;
        Ok(())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            distroseries_id: row.get(1)?,
            architecture_tag: row.get(2)?,
            processor_family: row.get(3)?,
            restricted: row.get::<_, i32>(4)? != 0,
            enabled: row.get::<_, i32>(5)? != 0,
        })
    }
}
