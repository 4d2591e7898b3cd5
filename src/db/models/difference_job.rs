// src/db/models/difference_job.rs

//! DifferenceJob model - pending comparisons between a derived series and its parent

use crate::error::Result;
use rusqlite::{Connection, Row, params};

/// A request to recompute how a derived series differs from its parent
/// for one source package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferenceJob {
    pub id: Option<i64>,
    pub derived_series_id: i64,
    pub parent_series_id: i64,
    pub source_name: String,
    pub status: String,
    pub created_at: Option<String>,
}

impl DifferenceJob {
    pub fn new(derived_series_id: i64, parent_series_id: i64, source_name: impl Into<String>) -> Self {
        Self {
            id: None,
            derived_series_id,
            parent_series_id,
            source_name: source_name.into(),
            status: "waiting".to_string(),
            created_at: None,
        }
    }

    /// Insert this job unless an identical one is already waiting
    ///
    /// Returns `false` when an equivalent waiting job exists.
    pub fn insert_if_absent(&mut self, conn: &Connection) -> Result<bool> {
        let inserted = conn.execute(
            "INSERT INTO distroseries_difference_jobs (derived_series_id, parent_series_id, source_name, status)
             SELECT ?1, ?2, ?3, ?4
             WHERE NOT EXISTS (
                 SELECT 1 FROM distroseries_difference_jobs
                 WHERE derived_series_id = ?1 AND parent_series_id = ?2
                   AND source_name = ?3 AND status = 'waiting')",
            params![
                self.derived_series_id,
                self.parent_series_id,
                &self.source_name,
                &self.status
            ],
        )?;
        if inserted > 0 {
            self.id = Some(conn.last_insert_rowid());
        }
        Ok(inserted > 0)
    }

    /// Waiting jobs for a derived series
    pub fn find_waiting(conn: &Connection, derived_series_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, derived_series_id, parent_series_id, source_name, status, created_at
             FROM distroseries_difference_jobs
             WHERE derived_series_id = ?1 AND status = 'waiting' ORDER BY id",
        )?;
        let jobs = stmt
            .query_map([derived_series_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            derived_series_id: row.get(1)?,
            parent_series_id: row.get(2)?,
            source_name: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
