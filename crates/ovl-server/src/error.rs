use thiserror::Error;

use ovl_types::UploadName;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no active upload named {0}")]
    UploadNotActive(UploadName),

    #[error("offset mismatch for {name}: file has {expected} bytes, chunk starts at {got}")]
    OffsetMismatch {
        name: UploadName,
        expected: u64,
        got: u64,
    },

    #[error("checksum mismatch for {name}: upload is corrupt")]
    ChecksumMismatch { name: UploadName },

    #[error("protocol error: {0}")]
    Protocol(#[from] ovl_protocol::ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] ovl_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
