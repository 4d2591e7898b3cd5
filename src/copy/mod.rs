// src/copy/mod.rs

//! Package copies between archives
//!
//! A copy is checked first ([`CopyChecker`]), which never mutates state, and
//! then performed ([`CopyExecutor`]) in a single transaction. Private
//! content headed for a public archive is staged as a delayed copy until its
//! files are released.

pub mod changelog;
pub mod checker;
pub mod executor;
pub mod notification;

pub use changelog::{aggregate_changelog, bug_references};
pub use checker::{CheckedCopy, CopyChecker};
pub use executor::{CopyExecutor, CopyOptions, CopyOutcome};
pub use notification::CopySummary;
