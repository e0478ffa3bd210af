use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::transport::{Connection, Connector};

/// In-process connector for tests and same-process embedding.
///
/// Each `connect` call creates a linked [`Connection`] pair and hands the
/// server half to the acceptor returned by [`MemoryConnector::new`], the
/// in-memory analogue of a listening socket. The session side (whatever
/// drains the acceptor) is typically `ovl-server`'s session loop, giving
/// full-stack sync tests with no network.
#[derive(Clone)]
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<Connection>,
}

impl MemoryConnector {
    /// Returns the connector and the acceptor stream of server-side halves.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Connection>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (Self { accept_tx }, accept_rx)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> SyncResult<Connection> {
        let (client, server) = Connection::pair();
        self.accept_tx
            .send(server)
            .map_err(|_| SyncError::Connect("acceptor dropped".into()))?;
        Ok(client)
    }
}
