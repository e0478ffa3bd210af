//! Authoritative shared-state storage for Overlay Link.
//!
//! The server process owns exactly one [`SharedStateStore`]: a string-keyed
//! map of JSON values that every connected client mirrors. Mutations are
//! atomic full-value replacements, so the store needs no read-modify-write
//! protection beyond its internal lock; the last writer wins.
//!
//! Durability is a flat-file snapshot behind the [`SnapshotPersistence`]
//! trait, loaded once at startup and rewritten (write-behind, best-effort)
//! after mutations. [`JsonSnapshotFile`] is the production backend; failure
//! to save is logged and never blocks or fails the in-memory update.
//!
//! # Design Rules
//!
//! 1. `set` always succeeds: no schema, no validation, no versions.
//! 2. The snapshot sent to a connecting client is the map, verbatim.
//! 3. Persistence failures cost durability only, never correctness.
//! 4. There is no write-ahead log; a crash loses mutations since the last
//!    successful save.

pub mod error;
pub mod file;
pub mod state;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::JsonSnapshotFile;
pub use state::SharedStateStore;
pub use traits::SnapshotPersistence;
