//! Error types for the download module.
//!
//! Each variant names one stage of the download pipeline so callers can
//! decide on cleanup or retry without parsing messages.

use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while downloading a file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The request could not be built (malformed URL, invalid header option).
    #[error("error constructing HTTP request for {url}: {source}")]
    RequestConstruction {
        /// The requested URL.
        url: String,
        /// Why construction failed.
        #[source]
        source: BoxError,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("error performing HTTP request to {url}: {source}")]
    Transport {
        /// The requested URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The cancellation token fired before the download finished.
    #[error("download of {url} was cancelled")]
    Cancelled {
        /// The requested URL.
        url: String,
    },

    /// The server answered with something other than 200 or 206.
    #[error("unexpected status code downloading {url}: 200 or 206 expected while {status} received")]
    UnexpectedStatus {
        /// The requested URL.
        url: String,
        /// The status received.
        status: StatusCode,
    },

    /// The staging file could not be created.
    #[error("error creating temporary file: {source}")]
    TempFile {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the body or writing it to the staging file failed.
    #[error("error writing to temporary file {path}: {source}")]
    Copy {
        /// The staging file path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The destination's parent directories could not be created.
    #[error("error creating directory structure {path} for the final destination: {source}")]
    DirectoryCreation {
        /// The directory that could not be created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The staging file could not be moved to the destination.
    #[error("error moving temporary file {from} to the final destination {to}: {source}")]
    Relocation {
        /// The staging file path.
        from: PathBuf,
        /// The destination path.
        to: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a request construction error.
    pub fn request_construction(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::RequestConstruction {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates a copy error.
    pub fn copy(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Copy {
            path: path.into(),
            source,
        }
    }
}
