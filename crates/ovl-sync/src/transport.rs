use async_trait::async_trait;
use tokio::sync::mpsc;

use ovl_protocol::WireMessage;

use crate::error::{SyncError, SyncResult};

/// Channel capacity for each direction of a connection.
///
/// Bounded so a stalled peer exerts backpressure instead of growing an
/// unbounded queue; 64 in-flight messages is far beyond what the
/// one-chunk-in-flight upload protocol or the debounced sync stream produce.
pub const CONNECTION_BUFFER: usize = 64;

/// A live, message-framed duplex connection.
///
/// Both halves carry decoded [`WireMessage`]s; the codec and the underlying
/// socket live inside whatever [`Connector`] produced the connection. When
/// the peer (or its pump task) goes away, `send` fails and `recv` drains to
/// `None`; that is the only disconnect signal the engines need.
pub struct Connection {
    tx: mpsc::Sender<WireMessage>,
    rx: mpsc::Receiver<WireMessage>,
}

impl Connection {
    pub fn new(tx: mpsc::Sender<WireMessage>, rx: mpsc::Receiver<WireMessage>) -> Self {
        Self { tx, rx }
    }

    /// A linked pair of in-process connections: what one side sends, the
    /// other receives.
    pub fn pair() -> (Connection, Connection) {
        let (a_tx, b_rx) = mpsc::channel(CONNECTION_BUFFER);
        let (b_tx, a_rx) = mpsc::channel(CONNECTION_BUFFER);
        (Connection::new(a_tx, a_rx), Connection::new(b_tx, b_rx))
    }

    pub async fn send(&self, msg: WireMessage) -> SyncResult<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| SyncError::TransportClosed)
    }

    /// Receive the next inbound message; `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.rx.recv().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &!self.tx.is_closed())
            .finish()
    }
}

/// Dials new connections to the sync server.
///
/// The replica reconnects through its connector after transport loss, and
/// each upload dials its own dedicated connection, so implementations must
/// be reusable.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> SyncResult<Connection>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn pair_is_cross_linked() {
        let (a, mut b) = Connection::pair();
        a.send(WireMessage::Mutate { key: "k".into(), value: json!(1) })
            .await
            .unwrap();
        let got = b.recv().await.unwrap();
        assert_eq!(got.type_name(), "mutate");
    }

    #[tokio::test]
    async fn dropped_peer_closes_both_directions() {
        let (a, b) = Connection::pair();
        drop(b);
        let err = a
            .send(WireMessage::Mutate { key: "k".into(), value: json!(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::TransportClosed));

        let (mut c, d) = Connection::pair();
        drop(d);
        assert!(c.recv().await.is_none());
    }
}
