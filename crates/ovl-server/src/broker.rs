use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use ovl_store::{SharedStateStore, SnapshotPersistence};
use ovl_types::{StateKey, StateSnapshot, StateValue};

/// Identity of one client connection, used for echo suppression.
pub type ConnectionId = Uuid;

/// Default fanout buffer per session.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// One accepted mutation, fanned out to every session.
#[derive(Clone, Debug)]
pub struct BrokerUpdate {
    /// Connection the mutation came in on; `None` for server-originated
    /// mutations (artifact bindings). Sessions skip updates whose origin is
    /// their own connection, since the originator already holds the value.
    pub origin: Option<ConnectionId>,
    pub key: StateKey,
    pub value: StateValue,
}

/// Replication broker: the single writer in front of the authoritative
/// store.
///
/// `apply` performs store-set and fanout under one lock, so updates to the
/// same key are broadcast in exactly the order they were accepted. Cross-key
/// ordering is whatever the lock hands out; callers must not assume one.
///
/// Persistence is write-behind: `apply` marks the store dirty and a
/// background task re-serializes the full snapshot, coalescing bursts. A
/// failed save costs durability, never correctness, and is logged rather
/// than retried.
pub struct Broker {
    store: Arc<SharedStateStore>,
    update_tx: broadcast::Sender<BrokerUpdate>,
    apply_lock: Mutex<()>,
    persist_tx: Option<mpsc::Sender<()>>,
}

impl Broker {
    pub fn new(store: SharedStateStore) -> Self {
        Self::with_capacity(store, DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(store: SharedStateStore, capacity: usize) -> Self {
        let (update_tx, _) = broadcast::channel(capacity);
        Self {
            store: Arc::new(store),
            update_tx,
            apply_lock: Mutex::new(()),
            persist_tx: None,
        }
    }

    /// Start the write-behind persister. Call once during server assembly,
    /// before the broker is shared.
    pub fn start_persistence(&mut self, persistence: Arc<dyn SnapshotPersistence>) {
        // Capacity 1: a full channel already means "another save is queued",
        // so bursts of mutations collapse into one rewrite.
        let (tx, mut rx) = mpsc::channel::<()>(1);
        self.persist_tx = Some(tx);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let snapshot = store.snapshot();
                let persistence = Arc::clone(&persistence);
                match tokio::task::spawn_blocking(move || persistence.save(&snapshot)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(error = %e, "state snapshot save failed"),
                    Err(e) => warn!(error = %e, "snapshot persister panicked"),
                }
            }
        });
    }

    /// Accept one mutation: set, schedule persistence, fan out.
    pub fn apply(&self, origin: Option<ConnectionId>, key: StateKey, value: StateValue) {
        {
            let _order = self.apply_lock.lock().expect("lock poisoned");
            self.store.set(key.clone(), value.clone());
            // No receivers (no live sessions) is fine.
            let _ = self.update_tx.send(BrokerUpdate { origin, key: key.clone(), value });
        }
        debug!(%key, "mutation applied");
        if let Some(tx) = &self.persist_tx {
            let _ = tx.try_send(());
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BrokerUpdate> {
        self.update_tx.subscribe()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.store.snapshot()
    }

    pub fn get(&self, key: &StateKey) -> Option<StateValue> {
        self.store.get(key)
    }

    pub fn key_count(&self) -> usize {
        self.store.len()
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("key_count", &self.store.len())
            .field("sessions", &self.update_tx.receiver_count())
            .finish()
    }
}
