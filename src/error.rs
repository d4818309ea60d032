//! Error types
//!
//! Startup errors abort the process before any listener is bound.
//! Dispatch errors are runtime faults that surface as `500` while the
//! connection is still writable.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal error raised while loading configuration or bootstrapping the server
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("base download folder is not configured (set files.base_dir)")]
    MissingBaseDir,

    #[error("base download folder '{}' is not accessible: {source}", path.display())]
    BaseDirUnavailable { path: PathBuf, source: io::Error },

    #[error("base download folder '{}' is not a directory", .0.display())]
    BaseDirNotDirectory(PathBuf),

    #[error("unknown etag type '{0}' (expected 'weak' or 'strong')")]
    UnknownEtagKind(String),

    #[error("unsupported strong etag digest algorithm '{0}'")]
    UnknownDigestAlgorithm(String),

    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Unexpected fault while handling a request
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to compute etag for '{}': {source}", path.display())]
    Etag { path: PathBuf, source: io::Error },

    #[error("failed to prepare transfer of '{}': {source}", path.display())]
    Transfer { path: PathBuf, source: io::Error },
}
