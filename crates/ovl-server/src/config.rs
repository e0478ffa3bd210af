use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Flat-file snapshot the store loads at startup and rewrites after
    /// mutations.
    pub snapshot_file: PathBuf,
    /// Directory chunked uploads land in; served at `/uploads`.
    pub uploads_dir: PathBuf,
    /// Per-session fanout buffer. A session that falls further behind than
    /// this is re-initialized with a fresh snapshot.
    pub broadcast_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4600".parse().unwrap(),
            snapshot_file: PathBuf::from("ovl-state.json"),
            uploads_dir: PathBuf::from("uploads"),
            broadcast_capacity: 256,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file. Missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&raw).map_err(|e| ServerError::Config(e.to_string()))
    }
}
