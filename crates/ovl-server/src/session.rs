use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use ovl_protocol::{WireCodec, WireFrame, WireMessage};
use ovl_sync::transport::{Connection, CONNECTION_BUFFER};

use crate::broker::{Broker, ConnectionId};
use crate::router::AppState;
use crate::upload::SessionUploads;

/// Drive one client session over an established connection.
///
/// Transport-agnostic: the WebSocket handler adapts its socket into a
/// [`Connection`] and tests drive this directly over in-memory pairs. The
/// session serves both traffic classes:
///
/// - state sync: one `init` snapshot up front, then fanout of broker
///   updates, skipping those this connection originated;
/// - chunk intake: each `chunk` is answered with an ack or a `chunk_error`,
///   `upload_complete` finalizes and (unless the bind key is the sentinel)
///   applies the artifact-reference mutation.
///
/// Messages on one connection are handled strictly in arrival order; many
/// sessions run concurrently.
pub async fn drive_session(state: AppState, mut conn: Connection) {
    let id: ConnectionId = Uuid::now_v7();
    let broker = Arc::clone(&state.broker);
    let mut updates = broker.subscribe();
    let mut uploads = SessionUploads::new(state.uploads_dir.clone());
    debug!(%id, "session started");

    if conn
        .send(WireMessage::Init { state: broker.snapshot() })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let Some(msg) = inbound else { break };
                if handle_inbound(id, &broker, &mut uploads, &conn, msg).await.is_err() {
                    break;
                }
            }
            update = updates.recv() => match update {
                Ok(u) => {
                    if u.origin == Some(id) {
                        continue; // originator already holds the value
                    }
                    let msg = WireMessage::Update { key: u.key, value: u.value };
                    if conn.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    // Too slow for incremental fanout: start over from a
                    // fresh snapshot, which is the protocol's own recovery
                    // primitive.
                    warn!(%id, missed, "session lagged, re-initializing");
                    updates = updates.resubscribe();
                    let msg = WireMessage::Init { state: broker.snapshot() };
                    if conn.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!(%id, "session ended");
}

/// Handle one client message. `Err` means the connection is gone.
async fn handle_inbound(
    id: ConnectionId,
    broker: &Broker,
    uploads: &mut SessionUploads,
    conn: &Connection,
    msg: WireMessage,
) -> Result<(), ()> {
    match msg {
        WireMessage::Mutate { key, value } => {
            broker.apply(Some(id), key, value);
            Ok(())
        }
        WireMessage::Chunk(frame) => {
            let reply = match uploads.write_chunk(&frame).await {
                Ok(offset) => WireMessage::ChunkAck { name: frame.name, offset },
                Err(e) => {
                    warn!(%id, name = %frame.name, error = %e, "chunk refused");
                    WireMessage::ChunkError {
                        name: Some(frame.name),
                        message: e.to_string(),
                    }
                }
            };
            conn.send(reply).await.map_err(|_| ())
        }
        WireMessage::UploadComplete { name, key, checksum } => {
            let reply = match uploads.complete(&name, &checksum).await {
                Ok(url) => {
                    // The one coupling point between transfer and sync: bind
                    // the artifact reference, unless the caller opted out.
                    if let Some(key) = key {
                        broker.apply(Some(id), key, serde_json::Value::String(url.clone()));
                    }
                    WireMessage::UploadSuccess { name, url }
                }
                Err(e) => {
                    warn!(%id, %name, error = %e, "upload finalization failed");
                    WireMessage::ChunkError {
                        name: Some(name),
                        message: e.to_string(),
                    }
                }
            };
            conn.send(reply).await.map_err(|_| ())
        }
        other => {
            warn!(%id, kind = other.type_name(), "ignoring unexpected client message");
            Ok(())
        }
    }
}

/// Adapt an upgraded WebSocket into a [`Connection`] and run the session.
///
/// Two pump tasks translate between socket frames and decoded messages; an
/// undecodable frame is logged and skipped, never fatal to the session.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel(CONNECTION_BUFFER);
    let (in_tx, in_rx) = mpsc::channel(CONNECTION_BUFFER);

    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let frame = match WireCodec::encode(&msg) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "dropping unencodable message");
                    continue;
                }
            };
            let ws_msg = match frame {
                WireFrame::Text(text) => Message::Text(text),
                WireFrame::Binary(data) => Message::Binary(data),
            };
            if sink.send(ws_msg).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            let decoded = match item {
                Ok(Message::Text(text)) => WireCodec::decode_text(&text),
                Ok(Message::Binary(data)) => WireCodec::decode_binary(&data),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue, // ping/pong handled by the library
                Err(_) => break,
            };
            match decoded {
                Ok(msg) => {
                    if in_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "ignoring undecodable frame"),
            }
        }
    });

    drive_session(state, Connection::new(out_tx, in_rx)).await;
}
