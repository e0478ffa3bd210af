//! Wire protocol for Overlay Link.
//!
//! One message enum, [`WireMessage`], covers both traffic classes that share
//! a sync connection: key-value replication (`init` / `update` / `mutate`)
//! and chunked asset transfer (`chunk` / `chunk_ack` / `chunk_error` /
//! `upload_complete` / `upload_success`).
//!
//! Control messages travel as internally-tagged JSON text frames; chunk
//! payloads travel as bincode binary frames so the bytes are never re-encoded
//! through JSON. [`WireCodec`] hides the split and enforces frame size limits
//! on both paths: an oversize message fails at encode time, it is never
//! partially written.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{WireCodec, WireFrame};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    ChunkFrame, HealthResponse, WireMessage, DEFAULT_CHUNK_LEN, MAX_CHUNK_LEN,
    MAX_CONTROL_FRAME_LEN, PROTOCOL_VERSION,
};
