// src/error.rs

//! Error types for the publishing and copy engine
//!
//! Validation failures carry structured reasons; their human-readable text is
//! produced only when the error is displayed.

use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    /// A uniqueness constraint fired, usually because a concurrent copy won
    /// the race. The whole unit of work was rolled back and may be retried.
    #[error("Conflicting publication: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    CannotCopy(CopyRefusal),

    #[error("Archive {0} is disabled")]
    ArchiveDisabled(String),

    /// No ancestry where ancestry is mandatory. Surfaced to an operator
    /// rather than guessed.
    #[error("Queue inconsistent state: {0}")]
    OverrideResolution(String),

    #[error("Illegal target: {0}")]
    IllegalTarget(String),

    #[error("Invalid status transition for publication {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: String,
        to: String,
    },
}

impl Error {
    /// Whether retrying the failed unit of work may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// The copy refusal, if this error is one
    pub fn as_refusal(&self) -> Option<&CopyRefusal> {
        match self {
            Error::CannotCopy(refusal) => Some(refusal),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, ref msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation
                    && code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Error::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            other => Error::Database(other),
        }
    }
}

/// A refused copy: which source, where to, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRefusal {
    pub source_name: String,
    pub version: String,
    /// Display name of the destination, e.g. `ppa2/breezy-updates`
    pub destination: String,
    pub reason: CannotCopy,
}

impl CopyRefusal {
    pub fn new(
        source_name: impl Into<String>,
        version: impl Into<String>,
        destination: impl Into<String>,
        reason: CannotCopy,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            version: version.into(),
            destination: destination.into(),
            reason,
        }
    }
}

impl std::fmt::Display for CopyRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} in {} ({})",
            self.source_name, self.version, self.destination, self.reason
        )
    }
}

/// Why the copy checker refused a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CannotCopy {
    #[error("source contains expired files")]
    ExpiredSourceFiles,

    #[error("source has expired binaries")]
    ExpiredBinaries,

    #[error("No such distro series {series} in distribution {distribution}.")]
    NoSuchSeries { series: String, distribution: String },

    #[error("Source format '{format}' not supported by target series {series}.")]
    UnsupportedFormat { format: String, series: String },

    #[error("a different source with the same version is published in the destination archive")]
    DifferentSourceSameVersion,

    #[error("same version already building in the destination archive for {series}")]
    AlreadyBuilding { series: String },

    #[error(
        "same version has unpublished binaries in the destination archive for {series}, \
         please wait for them to be published before copying"
    )]
    UnpublishedBinaries { series: String },

    #[error("same version already has published binaries in the destination archive for {series}")]
    AlreadyHasBinaries { series: String },

    #[error(
        "binaries of the same version are pending publication in the destination archive \
         for {series}, please wait for them to be published before copying"
    )]
    BinariesPendingPublication { series: String },

    #[error("Cannot copy DDEBs to a primary archive")]
    DdebToPrimary,

    #[error("{filename} already exists in destination archive with different contents.")]
    ConflictingFiles { filename: String },

    #[error("source has no binaries to be copied")]
    NoBinaries,

    #[error("Cannot copy private source into public archives.")]
    PrivateSourceToPublic,

    #[error("version older than the {ancestor} published in {series}")]
    VersionOlderThanAncestry { ancestor: String, series: String },

    #[error("Cannot check copy permissions (no requester specified).")]
    NoRequester,

    #[error("{person} has no upload rights to {archive}.")]
    NoUploadRights { person: String, archive: String },

    #[error("{person} is not permitted to upload to the component '{component}' of {archive}.")]
    ComponentNotPermitted {
        person: String,
        component: String,
        archive: String,
    },
}
