// src/lib.rs

//! Depot archive publishing engine
//!
//! Tracks which source and binary packages are published where, and moves
//! packages between archives, series and pockets.
//!
//! # Architecture
//!
//! - Database-first: every publication, build and staged upload lives in SQLite
//! - Publications move through a one-way lifecycle
//!   (PENDING -> PUBLISHED -> SUPERSEDED/DELETED/OBSOLETE)
//! - Copies are validated as a batch by [`copy::CopyChecker`], then applied
//!   atomically by [`copy::CopyExecutor`]
//! - File bytes, the build farm, bug tracking and mail sit behind the traits in
//!   [`services`]

pub mod config;
pub mod copy;
pub mod db;
mod error;
pub mod librarian;
pub mod publishing;
pub mod services;
pub mod version;

pub use config::EngineConfig;
pub use copy::{CheckedCopy, CopyChecker, CopyExecutor, CopyOptions, CopyOutcome};
pub use error::{CannotCopy, CopyRefusal, Error, Result};
pub use publishing::{Dominator, OverrideResolver, PublishingSet};
pub use services::Services;
