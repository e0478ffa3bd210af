use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum length of an upload file name, in bytes.
pub const MAX_UPLOAD_NAME_LEN: usize = 255;

/// Sanitized file name for a chunked upload.
///
/// The server joins this name onto its uploads directory and later serves the
/// finished file at `/uploads/<name>`, so the name must never be able to
/// escape that directory. Construction rejects path separators, parent
/// references, hidden/empty names, and control characters. The serde
/// representation is the plain string, validated again on deserialization,
/// so a name arriving over the wire goes through the same checks as one
/// built locally.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UploadName(String);

impl UploadName {
    pub fn parse(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("empty")
        } else if name.len() > MAX_UPLOAD_NAME_LEN {
            Some("longer than 255 bytes")
        } else if name.starts_with('.') {
            Some("starts with a dot")
        } else if name.contains('/') || name.contains('\\') {
            Some("contains a path separator")
        } else if name.contains("..") {
            Some("contains a parent reference")
        } else if name.chars().any(|c| c.is_control()) {
            Some("contains a control character")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(TypeError::InvalidUploadName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UploadName {
    type Error = TypeError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::parse(name)
    }
}

impl From<UploadName> for String {
    fn from(name: UploadName) -> Self {
        name.0
    }
}

impl AsRef<str> for UploadName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
