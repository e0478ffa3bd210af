use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use ovl_protocol::{WireCodec, WireFrame};

use crate::error::{SyncError, SyncResult};
use crate::transport::{Connection, Connector, CONNECTION_BUFFER};

/// WebSocket connector for real servers.
///
/// `connect` performs the WebSocket handshake against the server's sync
/// endpoint (e.g. `ws://host:4600/ws`) and spawns a read pump and a write
/// pump translating between [`Connection`] messages and socket frames via
/// the wire codec. Dropping the connection tears both pumps down.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> SyncResult<Connection> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| SyncError::Connect(e.to_string()))?;
        debug!(url = %self.url, "websocket connected");

        let (mut sink, mut stream) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel(CONNECTION_BUFFER);
        let (in_tx, in_rx) = mpsc::channel::<ovl_protocol::WireMessage>(CONNECTION_BUFFER);

        // Write pump: application messages out to the socket.
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let frame = match WireCodec::encode(&msg) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(kind = msg.type_name(), error = %e, "dropping unencodable message");
                        continue;
                    }
                };
                let ws_msg = match frame {
                    WireFrame::Text(text) => Message::Text(text),
                    WireFrame::Binary(data) => Message::Binary(data),
                };
                if let Err(e) = sink.send(ws_msg).await {
                    debug!(error = %e, "websocket write failed, closing");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Read pump: socket frames in to the application.
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                let decoded = match item {
                    Ok(Message::Text(text)) => WireCodec::decode_text(&text),
                    Ok(Message::Binary(data)) => WireCodec::decode_binary(&data),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue, // ping/pong handled by the library
                    Err(e) => {
                        debug!(error = %e, "websocket read failed, closing");
                        break;
                    }
                };
                match decoded {
                    Ok(msg) => {
                        trace!(kind = msg.type_name(), "inbound message");
                        if in_tx.send(msg).await.is_err() {
                            break; // application side dropped the connection
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "ignoring undecodable frame");
                    }
                }
            }
        });

        Ok(Connection::new(out_tx, in_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_keeps_url() {
        let c = WsConnector::new("ws://127.0.0.1:4600/ws");
        assert_eq!(c.url(), "ws://127.0.0.1:4600/ws");
    }

    #[tokio::test]
    async fn connect_to_nothing_fails_cleanly() {
        // Port 9 (discard) is about as reliably closed as it gets.
        let c = WsConnector::new("ws://127.0.0.1:9/ws");
        let err = c.connect().await.unwrap_err();
        assert!(matches!(err, SyncError::Connect(_)));
    }
}
