use serde::{Deserialize, Serialize};

use ovl_types::{StateKey, StateSnapshot, StateValue, UploadName};

pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound on an encoded control frame (everything except `chunk`).
pub const MAX_CONTROL_FRAME_LEN: usize = 1024 * 1024;

/// Default chunk payload size used by uploaders.
pub const DEFAULT_CHUNK_LEN: usize = 1024 * 1024;

/// Upper bound on a single chunk payload. Anything larger is refused at
/// encode time client-side and answered with `chunk_error` server-side.
pub const MAX_CHUNK_LEN: usize = 4 * 1024 * 1024;

/// All messages exchanged over a sync connection.
///
/// Directionality follows the replication design: the server alone emits
/// `init`, `update`, `chunk_ack`, `chunk_error`, and `upload_success`; the
/// client alone emits `mutate`, `chunk`, and `upload_complete`. The enum is
/// shared so both sides speak through one codec.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Full store snapshot, sent once per (re)connect. Replaces the client
    /// mirror wholesale.
    Init { state: StateSnapshot },

    /// Incremental single-key update fanned out to every client except the
    /// mutation's originator.
    Update { key: StateKey, value: StateValue },

    /// Client mutation intent: full-value overwrite of one key.
    Mutate { key: StateKey, value: StateValue },

    /// One slice of an upload. Travels as a binary frame, never as JSON.
    Chunk(ChunkFrame),

    /// Acknowledges a chunk with the new cumulative offset for that name.
    /// The client slices its next chunk starting exactly there.
    ChunkAck { name: UploadName, offset: u64 },

    /// Aborts the named transfer (or reports a malformed chunk when no name
    /// could be recovered).
    ChunkError {
        name: Option<UploadName>,
        message: String,
    },

    /// Finalizes an upload. `key: None` is the sentinel for "no store
    /// binding, the caller will place the URL itself". `checksum` is the
    /// lowercase hex BLAKE3 hash of the complete blob.
    UploadComplete {
        name: UploadName,
        key: Option<StateKey>,
        checksum: String,
    },

    /// Successful finalization: the artifact's public path.
    UploadSuccess { name: UploadName, url: String },
}

/// Payload of a [`WireMessage::Chunk`], encoded with bincode into a binary
/// transport frame. `offset` is the byte position this slice starts at;
/// offset 0 (re)creates the destination file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkFrame {
    pub name: UploadName,
    pub offset: u64,
    pub data: Vec<u8>,
}

impl WireMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Update { .. } => "update",
            Self::Mutate { .. } => "mutate",
            Self::Chunk(_) => "chunk",
            Self::ChunkAck { .. } => "chunk_ack",
            Self::ChunkError { .. } => "chunk_error",
            Self::UploadComplete { .. } => "upload_complete",
            Self::UploadSuccess { .. } => "upload_success",
        }
    }
}

/// Health check response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_messages_tag_with_snake_case_type() {
        let msg = WireMessage::Update {
            key: "score.home".into(),
            value: json!(10),
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["type"], "update");
        assert_eq!(encoded["key"], "score.home");
        assert_eq!(encoded["value"], 10);
    }

    #[test]
    fn upload_complete_sentinel_is_null_key() {
        let msg = WireMessage::UploadComplete {
            name: UploadName::parse("clip.mp4").unwrap(),
            key: None,
            checksum: "00".repeat(32),
        };
        let encoded = serde_json::to_value(&msg).unwrap();
        assert!(encoded["key"].is_null());

        let decoded: WireMessage = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn type_names_match_wire_tags() {
        let samples: Vec<WireMessage> = vec![
            WireMessage::Init { state: StateSnapshot::new() },
            WireMessage::Update { key: "k".into(), value: json!(1) },
            WireMessage::Mutate { key: "k".into(), value: json!(1) },
            WireMessage::Chunk(ChunkFrame {
                name: UploadName::parse("a.png").unwrap(),
                offset: 0,
                data: vec![],
            }),
            WireMessage::ChunkAck {
                name: UploadName::parse("a.png").unwrap(),
                offset: 1,
            },
            WireMessage::ChunkError { name: None, message: "boom".into() },
            WireMessage::UploadComplete {
                name: UploadName::parse("a.png").unwrap(),
                key: Some("k".into()),
                checksum: String::new(),
            },
            WireMessage::UploadSuccess {
                name: UploadName::parse("a.png").unwrap(),
                url: "/uploads/a.png".into(),
            },
        ];
        for msg in &samples {
            if matches!(msg, WireMessage::Chunk(_)) {
                continue; // chunk never rides as JSON; tag is nominal only
            }
            let encoded = serde_json::to_value(msg).unwrap();
            assert_eq!(encoded["type"], msg.type_name());
        }
    }

    #[test]
    fn health_response_defaults() {
        let h = HealthResponse::default();
        assert_eq!(h.status, "ok");
        assert_eq!(h.protocol_version, PROTOCOL_VERSION);
    }
}
