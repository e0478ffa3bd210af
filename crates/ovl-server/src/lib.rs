//! Sync server for Overlay Link.
//!
//! One process owns the authoritative key-value state and everything that
//! keeps clients consistent with it: the replication broker (set, persist,
//! fan out), per-connection sessions over WebSocket, chunked upload intake,
//! and static hosting of finished artifacts.
//!
//! Nothing in this crate is fatal to the process: a failed persistence save
//! costs durability, a refused chunk costs one upload, a dead connection
//! costs one session.

pub mod broker;
pub mod config;
pub mod error;
pub mod router;
pub mod server;
pub mod session;
pub mod upload;

pub use broker::{Broker, BrokerUpdate, ConnectionId, DEFAULT_BROADCAST_CAPACITY};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::{build_router, AppState};
pub use server::OvlServer;
pub use session::drive_session;
pub use upload::{public_url, SessionUploads};

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn test_state(dir: &std::path::Path) -> AppState {
        AppState {
            broker: Arc::new(Broker::new(ovl_store::SharedStateStore::new())),
            uploads_dir: dir.join("uploads"),
        }
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn info_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/info")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn uploads_are_served_statically() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        tokio::fs::create_dir_all(&state.uploads_dir).await.unwrap();
        tokio::fs::write(state.uploads_dir.join("logo.png"), b"png-bytes")
            .await
            .unwrap();

        let app = build_router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/uploads/logo.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }
}
