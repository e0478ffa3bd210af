use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport closed")]
    TransportClosed,

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("server aborted transfer: {0}")]
    Remote(String),

    #[error("unexpected ack offset: expected {expected}, got {got}")]
    UnexpectedAck { expected: u64, got: u64 },

    #[error("chunk length must be non-zero")]
    InvalidChunkLen,

    #[error("replica task stopped")]
    ReplicaStopped,

    #[error("protocol error: {0}")]
    Protocol(#[from] ovl_protocol::ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
