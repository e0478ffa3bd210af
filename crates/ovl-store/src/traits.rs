use ovl_types::StateSnapshot;

use crate::error::StoreResult;

/// Flat-file snapshot persistence for the authoritative store.
///
/// Implementations must satisfy these invariants:
/// - `load` returns `Ok(None)` when no snapshot has ever been saved: a
///   fresh start, not an error.
/// - `save` replaces the previous snapshot atomically: a reader (including
///   a crashed-and-restarted server) never observes a torn file.
/// - `save` is full-state: the entire mapping is rewritten every time.
///   There is no append log and no per-key delta.
pub trait SnapshotPersistence: Send + Sync {
    /// Load the last saved snapshot, or `None` when starting fresh.
    fn load(&self) -> StoreResult<Option<StateSnapshot>>;

    /// Persist the full snapshot, replacing any previous one.
    fn save(&self, snapshot: &StateSnapshot) -> StoreResult<()>;
}
