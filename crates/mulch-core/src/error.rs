//! Error taxonomy for the record store.
//!
//! The core never prints or exits; every failure surfaces as a [`MulchError`]
//! and the frontend decides how to present it.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MulchError>;

#[derive(Debug, Error)]
pub enum MulchError {
    /// Unknown domain or an id token that matched nothing.
    #[error("{what} not found")]
    NotFound { what: String },

    /// An id prefix matched more than one record.
    #[error("ambiguous id '{token}' matches {}: {}", candidates.len(), candidates.join(", "))]
    Ambiguous {
        token: String,
        candidates: Vec<String>,
    },

    /// The lock marker could not be created within the deadline.
    #[error("timed out after {waited:?} waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// A line in a domain file failed to parse.
    #[error("{}:{line}: malformed record: {message}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The project has no `.mulch` directory yet.
    #[error("no .mulch directory found under {} (run `mulch init` first)", root.display())]
    NotInitialized { root: PathBuf },

    /// Caller-supplied input was rejected before touching disk.
    #[error("{0}")]
    InvalidInput(String),

    /// The config file exists but could not be parsed.
    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// Any filesystem failure other than "file absent".
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MulchError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        MulchError::NotFound { what: what.into() }
    }

    /// Short machine-readable kind, used by structured output.
    pub fn kind(&self) -> &'static str {
        match self {
            MulchError::NotFound { .. } => "not_found",
            MulchError::Ambiguous { .. } => "ambiguous",
            MulchError::LockTimeout { .. } => "lock_timeout",
            MulchError::MalformedRecord { .. } => "malformed_record",
            MulchError::NotInitialized { .. } => "not_initialized",
            MulchError::InvalidInput(_) => "invalid_input",
            MulchError::Config { .. } => "config",
            MulchError::Io(_) => "io",
        }
    }
}
