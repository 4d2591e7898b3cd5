// src/db/models/mod.rs

//! Data models for publishing entities
//!
//! Plain structs that correspond to database tables, each with explicit
//! query methods. Nothing is loaded lazily: callers ask for what they need.

mod archive;
mod binary_release;
mod build;
mod difference_job;
mod distro;
mod library_file;
mod package_upload;
mod person;
mod publishing;
mod source_release;

pub use archive::{Archive, ArchivePurpose};
pub use binary_release::{BinaryFormat, BinaryRelease, Priority};
pub use build::{Build, BuildStatus};
pub use difference_job::DifferenceJob;
pub use distro::{DistroArchSeries, DistroSeries, Distribution};
pub use library_file::LibraryFile;
pub use package_upload::{CustomUpload, PackageUpload, PackageUploadStatus};
pub use person::{Person, UploadPermission};
pub use publishing::{
    ACTIVE_STATUSES, BinaryPublication, Pocket, Publication, PublishingStatus, SourcePublication,
};
pub use source_release::SourceRelease;

pub(crate) use publishing::{BPP_COLUMNS, SPP_COLUMNS};

use rusqlite::Row;
use std::str::FromStr;

/// Read a text column into an enum implementing `FromStr<Err = String>`
pub(crate) fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let value: String = row.get(idx)?;
    value.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

/// Build a `?, ?, ?` placeholder list for `IN (...)` clauses
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
