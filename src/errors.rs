//! Error types for the git-smart-http crate.
//!
//! Two families live here:
//! - [`AdapterError`]: failures raised by a [`crate::adapter::RepositoryAdapter`] while it
//!   touches repository state or drives the pack exchange.
//! - [`ConfigError`]: failures while loading the server configuration.
//!
//! HTTP-facing rejections are not errors in this sense; they are fixed responses and live in
//! [`crate::protocol::types::HttpError`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
/// Failure reported by a repository adapter.
///
/// Once a streaming response has been committed these are never turned into an HTTP status;
/// the stream is terminated instead.
pub enum AdapterError {
    /// I/O error while reading the request, writing the response or talking to a child process.
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// The repository path has not been set on the adapter.
    #[error("Repository path is not set")]
    RepositoryPathUnset,

    /// A git command exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Generic custom error for adapters that are not backed by the git executable.
    #[error("{0}")]
    Custom(String),
}

impl AdapterError {
    pub fn command_failed(command: &str, status: std::process::ExitStatus, stderr: &[u8]) -> Self {
        AdapterError::CommandFailed {
            command: command.to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

#[derive(Error, Debug)]
/// Failure while loading [`crate::config::ServerConfig`].
pub enum ConfigError {
    #[error("Can't read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Repository root {0:?} is not a directory")]
    InvalidRoot(PathBuf),
}
