//! Error types for the row-band simulation.
//!
//! Every variant is fatal for the run: a worker holding incomplete data can
//! not take part in the next halo exchange, so nothing here is retried.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing arguments, or a grid/worker combination that can not run.
    #[error("configuration error: {0}")]
    Config(String),

    /// File could not be opened, read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Grid file exists but its header or body does not match the format.
    #[error("malformed grid file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// Message mismatch between ring neighbors.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Another worker failed and tore the run down.
    #[error("run aborted by a peer worker")]
    Aborted,
}

impl Error {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn format(path: &Path, reason: impl Into<String>) -> Self {
        Error::Format {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
