// src/db/models/person.rs

//! Person and UploadPermission models - who acts, and where they may upload

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A person acting on archives (requester, creator, sponsor)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub id: Option<i64>,
    pub name: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl Person {
    /// Create a new Person
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            display_name: None,
            email: None,
        }
    }

    /// Insert this person into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO persons (name, display_name, email) VALUES (?1, ?2, ?3)",
            params![&self.name, &self.display_name, &self.email],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a person by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn
            .prepare_cached("SELECT id, name, display_name, email FROM persons WHERE id = ?1")?;
        Ok(stmt.query_row([id], Self::from_row).optional()?)
    }

    /// Find a person by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn
            .prepare_cached("SELECT id, name, display_name, email FROM persons WHERE name = ?1")?;
        Ok(stmt.query_row([name], Self::from_row).optional()?)
    }

    /// Name used in user-facing messages
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// RFC 5322 style address, when an email is known
    pub fn address(&self) -> Option<String> {
        self.email
            .as_ref()
            .map(|email| format!("{} <{}>", self.display(), email))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            display_name: row.get(2)?,
            email: row.get(3)?,
        })
    }
}

/// Upload right of a person on an archive
///
/// With neither `component` nor `package_name` set, the right covers the
/// whole archive.
#[derive(Debug, Clone)]
pub struct UploadPermission {
    pub id: Option<i64>,
    pub archive_id: i64,
    pub person_id: i64,
    pub component: Option<String>,
    pub package_name: Option<String>,
}

impl UploadPermission {
    /// Archive-wide upload right
    pub fn archive_wide(archive_id: i64, person_id: i64) -> Self {
        Self {
            id: None,
            archive_id,
            person_id,
            component: None,
            package_name: None,
        }
    }

    /// Upload right limited to one component
    pub fn for_component(archive_id: i64, person_id: i64, component: impl Into<String>) -> Self {
        Self {
            component: Some(component.into()),
            ..Self::archive_wide(archive_id, person_id)
        }
    }

    /// Upload right limited to one package
    pub fn for_package(archive_id: i64, person_id: i64, package_name: impl Into<String>) -> Self {
        Self {
            package_name: Some(package_name.into()),
            ..Self::archive_wide(archive_id, person_id)
        }
    }

    /// Insert this permission into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO upload_permissions (archive_id, person_id, component, package_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.archive_id,
                self.person_id,
                &self.component,
                &self.package_name
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// All permissions a person holds on an archive
    pub fn find_for(conn: &Connection, archive_id: i64, person_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, archive_id, person_id, component, package_name
             FROM upload_permissions WHERE archive_id = ?1 AND person_id = ?2",
        )?;
        let perms = stmt
            .query_map(params![archive_id, person_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(perms)
    }

    /// Whether this permission covers an upload of `package_name` into `component`
    pub fn grants(&self, component: &str, package_name: &str) -> bool {
        match (&self.component, &self.package_name) {
            (None, None) => true,
            (Some(c), None) => c == component,
            (None, Some(p)) => p == package_name,
            (Some(c), Some(p)) => c == component && p == package_name,
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            archive_id: row.get(1)?,
            person_id: row.get(2)?,
            component: row.get(3)?,
            package_name: row.get(4)?,
        })
    }
}
