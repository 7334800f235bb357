//! Error types and handling for torman-core operations.
//!
//! The parser itself never fails: malformed manual sections degrade to empty
//! fields. Errors here cover everything around it — caller preconditions,
//! downloads, the rendering toolchain, cache storage, and queries. Nothing in
//! this crate retries automatically; every failure is surfaced synchronously
//! to the immediate caller.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for torman-core operations.
///
/// All fallible public functions return `Result<T, Error>`. Variants are
/// deliberately distinct per failure class so callers can tell a missing
/// cache apart from a corrupt one, and a bad query apart from a bad path.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller violated a precondition. Raised before any I/O is attempted.
    #[error("{0}")]
    Usage(String),

    /// The database file does not exist at the given path.
    #[error("{} doesn't exist", path.display())]
    DatabaseMissing {
        /// Path that was checked.
        path: PathBuf,
    },

    /// Fetching the manual's source text failed.
    ///
    /// Carries the remote locator and the local staging destination so the
    /// failure is diagnosable without re-running.
    #[error("Unable to download tor's manual from {url} to {dest}: {reason}")]
    Download {
        /// Remote locator we tried to fetch.
        url: String,
        /// Local path we were staging into.
        dest: String,
        /// Underlying failure.
        reason: String,
    },

    /// The external rendering toolchain is not installed.
    #[error("We require a2x from asciidoc to provide a man page")]
    RendererUnavailable,

    /// The external rendering step exited with a failure.
    ///
    /// Includes the literal command so the caller can reproduce it.
    #[error("Unable to run '{command}': {reason}")]
    Renderer {
        /// Command that was invoked.
        command: String,
        /// Exit diagnostic or spawn failure.
        reason: String,
    },

    /// A query statement failed; the backend's native diagnostic is
    /// surfaced unmodified.
    #[error(transparent)]
    Query(#[from] rusqlite::Error),

    /// A cache file does not match either persistence format's shape.
    ///
    /// Distinct from parse degradation, which is expected and silent.
    #[error("Corrupt manual cache: {0}")]
    Corrupt(String),

    /// Cache storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Error category as a static string, for logging and metrics grouping.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Usage(_) => "usage",
            Self::DatabaseMissing { .. } => "database_missing",
            Self::Download { .. } => "download",
            Self::RendererUnavailable | Self::Renderer { .. } => "renderer",
            Self::Query(_) => "query",
            Self::Corrupt(_) => "corrupt",
            Self::Storage(_) => "storage",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
