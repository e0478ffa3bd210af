use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use ovl_store::{JsonSnapshotFile, SharedStateStore, SnapshotPersistence};

use crate::broker::Broker;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, AppState};

/// OVL sync server.
pub struct OvlServer {
    config: ServerConfig,
}

impl OvlServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Assemble the shared state: load the persisted snapshot, start the
    /// write-behind persister, wire up the broker.
    pub fn build_state(&self) -> ServerResult<AppState> {
        let persistence = Arc::new(JsonSnapshotFile::new(&self.config.snapshot_file));
        let store = match persistence.load()? {
            Some(snapshot) => {
                info!(keys = snapshot.len(), "state loaded from {}", self.config.snapshot_file.display());
                SharedStateStore::from_snapshot(snapshot)
            }
            None => {
                info!("no existing state, starting fresh");
                SharedStateStore::new()
            }
        };
        let mut broker = Broker::with_capacity(store, self.config.broadcast_capacity);
        broker.start_persistence(persistence);
        Ok(AppState {
            broker: Arc::new(broker),
            uploads_dir: self.config.uploads_dir.clone(),
        })
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(self.build_state()?))
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router()?;
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("OVL server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &std::path::Path) -> ServerConfig {
        ServerConfig {
            snapshot_file: dir.join("state.json"),
            uploads_dir: dir.join("uploads"),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn server_construction() {
        let dir = tempfile::tempdir().unwrap();
        let server = OvlServer::new(test_config(dir.path()));
        assert_eq!(server.config().broadcast_capacity, 256);
    }

    #[tokio::test]
    async fn state_survives_rebuild_through_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        {
            let state = OvlServer::new(config.clone()).build_state().unwrap();
            state.broker.apply(None, "score".into(), serde_json::json!(15));
            // Wait for the write-behind save to land.
            let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
            while !config.snapshot_file.exists() {
                assert!(std::time::Instant::now() < deadline, "snapshot never saved");
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        }

        let state = OvlServer::new(config).build_state().unwrap();
        assert_eq!(
            state.broker.get(&"score".into()),
            Some(serde_json::json!(15))
        );
    }
}
