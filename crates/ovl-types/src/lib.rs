//! Foundation types for Overlay Link (OVL).
//!
//! This crate provides the core state and naming types used throughout the
//! OVL system. Every other OVL crate depends on `ovl-types`.
//!
//! # Key Types
//!
//! - [`StateKey`] — name of one entry in the shared state store
//! - [`StateValue`] — schema-less JSON value held under a key
//! - [`StateSnapshot`] — the full key→value mapping, as sent on connect
//! - [`UploadName`] — sanitized file name for chunked asset uploads

pub mod error;
pub mod state;
pub mod upload;

pub use error::TypeError;
pub use state::{StateKey, StateSnapshot, StateValue};
pub use upload::{UploadName, MAX_UPLOAD_NAME_LEN};
