use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::protocol::auth::AccessPolicy;

/// Read-only server configuration, established once at startup.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory containing one or more git repositories.
    pub root: PathBuf,
    /// `None` defers to each repository's `http.receivepack` setting.
    pub allow_push: Option<bool>,
    /// `None` defers to each repository's `http.uploadpack` setting.
    pub allow_pull: Option<bool>,
    pub git_path: PathBuf,
    pub listen: SocketAddr,
    /// Chunks buffered between the pack exchange and the client before the adapter is paused.
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            allow_push: None,
            allow_pull: None,
            git_path: PathBuf::from("git"),
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            stream_buffer: 16,
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file. Missing keys fall back to [`ServerConfig::default`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy {
            allow_push: self.allow_push,
            allow_pull: self.allow_pull,
        }
    }

    /// Resolve `root` to an absolute directory.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let root = std::path::absolute(&self.root).unwrap_or_else(|_| self.root.clone());
        if !root.is_dir() {
            return Err(ConfigError::InvalidRoot(root));
        }
        self.root = root;
        self.stream_buffer = self.stream_buffer.max(1);
        Ok(self)
    }
}
