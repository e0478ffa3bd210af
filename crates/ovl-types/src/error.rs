use thiserror::Error;

/// Errors from foundation type construction.
#[derive(Debug, Error)]
pub enum TypeError {
    /// The upload name failed sanitization.
    #[error("invalid upload name {name:?}: {reason}")]
    InvalidUploadName { name: String, reason: &'static str },
}
