use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, trace, warn};

use ovl_protocol::WireMessage;
use ovl_types::{StateKey, StateSnapshot, StateValue};

use crate::error::{SyncError, SyncResult};
use crate::transport::{Connection, Connector};

/// Tuning knobs for the replica.
///
/// The defaults match the shipped control-panel behavior; all four are
/// deliberate tunables rather than hidden contracts.
#[derive(Clone, Debug)]
pub struct ReplicaOptions {
    /// Trailing debounce applied to local writes before one `mutate` is
    /// emitted with the latest value.
    pub debounce: Duration,
    /// How long after a local write inbound updates for that key are
    /// ignored. Trades strict convergence for a flicker-free local view.
    pub grace_window: Duration,
    /// Delay between reconnect attempts after transport loss.
    pub reconnect_interval: Duration,
    /// Cap on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for ReplicaOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(200),
            grace_window: Duration::from_secs(2),
            reconnect_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Connection-lifecycle and failure notifications, for status indicators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicaEvent {
    Connected,
    Disconnected,
    /// A debounced mutation could not be delivered even after one
    /// reconnect-and-retry. The value stays in the local mirror only.
    MutationFailed { key: StateKey },
}

enum Command {
    Set {
        key: StateKey,
        value: StateValue,
    },
    Get {
        key: StateKey,
        reply: oneshot::Sender<Option<StateValue>>,
    },
    Snapshot {
        reply: oneshot::Sender<StateSnapshot>,
    },
    Watch {
        key: StateKey,
        reply: oneshot::Sender<watch::Receiver<Option<StateValue>>>,
    },
}

/// Client-side mirror of the authoritative store.
///
/// One background task owns the mirror; this handle is a cheap clone. Local
/// writes apply optimistically (never waiting on the network), open the
/// key's grace window, and are debounced into a single `mutate`. Inbound
/// `init`/`update` messages apply unless the key is inside its grace window.
#[derive(Clone)]
pub struct Replica {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Replica {
    /// Spawn the replica task. It connects (and reconnects) through
    /// `connector` on its own; the returned stream carries lifecycle events.
    pub fn spawn(
        connector: Arc<dyn Connector>,
        options: ReplicaOptions,
    ) -> (Self, mpsc::UnboundedReceiver<ReplicaEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let task = ReplicaTask {
            connector,
            options,
            mirror: StateSnapshot::new(),
            grace: HashMap::new(),
            pending: HashMap::new(),
            watchers: HashMap::new(),
            events: event_tx,
            conn: None,
            reconnect_at: Some(Instant::now()),
        };
        tokio::spawn(task.run(cmd_rx));
        (Self { cmd_tx }, event_rx)
    }

    /// Optimistic local write: the mirror updates before this returns.
    pub fn set(&self, key: impl Into<StateKey>, value: StateValue) -> SyncResult<()> {
        self.cmd_tx
            .send(Command::Set { key: key.into(), value })
            .map_err(|_| SyncError::ReplicaStopped)
    }

    pub async fn get(&self, key: impl Into<StateKey>) -> SyncResult<Option<StateValue>> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Get { key: key.into(), reply })
            .map_err(|_| SyncError::ReplicaStopped)?;
        rx.await.map_err(|_| SyncError::ReplicaStopped)
    }

    pub async fn snapshot(&self) -> SyncResult<StateSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot { reply })
            .map_err(|_| SyncError::ReplicaStopped)?;
        rx.await.map_err(|_| SyncError::ReplicaStopped)
    }

    /// Observe one key. The receiver holds the current value and wakes on
    /// every applied change (local or remote).
    pub async fn watch(
        &self,
        key: impl Into<StateKey>,
    ) -> SyncResult<watch::Receiver<Option<StateValue>>> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Watch { key: key.into(), reply })
            .map_err(|_| SyncError::ReplicaStopped)?;
        rx.await.map_err(|_| SyncError::ReplicaStopped)
    }
}

struct PendingWrite {
    value: StateValue,
    flush_at: Instant,
}

enum Wake {
    Command(Option<Command>),
    Inbound(Option<WireMessage>),
    Flush,
    Reconnect,
}

struct ReplicaTask {
    connector: Arc<dyn Connector>,
    options: ReplicaOptions,
    mirror: StateSnapshot,
    grace: HashMap<StateKey, Instant>,
    pending: HashMap<StateKey, PendingWrite>,
    watchers: HashMap<StateKey, watch::Sender<Option<StateValue>>>,
    events: mpsc::UnboundedSender<ReplicaEvent>,
    conn: Option<Connection>,
    reconnect_at: Option<Instant>,
}

impl ReplicaTask {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            let flush_at = self.pending.values().map(|p| p.flush_at).min();
            let reconnect_at = if self.conn.is_none() { self.reconnect_at } else { None };
            let far = Instant::now() + Duration::from_secs(86_400);

            let wake = tokio::select! {
                cmd = cmd_rx.recv() => Wake::Command(cmd),
                msg = Self::next_inbound(&mut self.conn) => Wake::Inbound(msg),
                _ = sleep_until(flush_at.unwrap_or(far)), if flush_at.is_some() => Wake::Flush,
                _ = sleep_until(reconnect_at.unwrap_or(far)), if reconnect_at.is_some() => Wake::Reconnect,
            };

            match wake {
                // All handles dropped: nothing can observe the mirror anymore.
                Wake::Command(None) => break,
                Wake::Command(Some(cmd)) => self.handle_command(cmd),
                Wake::Inbound(Some(msg)) => self.handle_inbound(msg),
                Wake::Inbound(None) => self.handle_disconnect(),
                Wake::Flush => self.flush_due().await,
                Wake::Reconnect => self.try_reconnect().await,
            }
        }
    }

    async fn next_inbound(conn: &mut Option<Connection>) -> Option<WireMessage> {
        match conn {
            Some(c) => c.recv().await,
            None => std::future::pending().await,
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Set { key, value } => {
                let now = Instant::now();
                self.mirror.insert(key.clone(), value.clone());
                self.notify(&key);
                self.grace.insert(key.clone(), now + self.options.grace_window);
                // Trailing debounce: every write pushes the flush out again,
                // so a burst emits one mutate with the final value.
                self.pending.insert(
                    key,
                    PendingWrite { value, flush_at: now + self.options.debounce },
                );
            }
            Command::Get { key, reply } => {
                let _ = reply.send(self.mirror.get(&key).cloned());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.mirror.clone());
            }
            Command::Watch { key, reply } => {
                let current = self.mirror.get(&key).cloned();
                let sender = self
                    .watchers
                    .entry(key)
                    .or_insert_with(|| watch::channel(current).0);
                let _ = reply.send(sender.subscribe());
            }
        }
    }

    fn handle_inbound(&mut self, msg: WireMessage) {
        let now = Instant::now();
        match msg {
            WireMessage::Init { state } => {
                let mut next = state;
                // Keys inside their grace window keep the optimistic value.
                let graced: Vec<StateKey> = self.grace.keys().cloned().collect();
                for key in graced {
                    if self.grace_active(&key, now) {
                        match self.mirror.get(&key) {
                            Some(local) => {
                                next.insert(key, local.clone());
                            }
                            None => {
                                next.remove(&key);
                            }
                        }
                    }
                }
                let previous = std::mem::replace(&mut self.mirror, next);
                for (key, sender) in &self.watchers {
                    let new = self.mirror.get(key);
                    if previous.get(key) != new {
                        sender.send_replace(new.cloned());
                    }
                }
                debug!(keys = self.mirror.len(), "mirror initialized");
            }
            WireMessage::Update { key, value } => {
                if self.grace_active(&key, now) {
                    trace!(%key, "dropping update inside grace window");
                    return;
                }
                self.mirror.insert(key.clone(), value);
                self.notify(&key);
            }
            other => {
                warn!(kind = other.type_name(), "unexpected message on sync connection");
            }
        }
    }

    fn handle_disconnect(&mut self) {
        if self.conn.take().is_some() {
            debug!("sync connection lost");
            let _ = self.events.send(ReplicaEvent::Disconnected);
        }
        self.reconnect_at = Some(Instant::now() + self.options.reconnect_interval);
    }

    async fn try_reconnect(&mut self) {
        match self.connect_once().await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.reconnect_at = None;
                debug!("sync connection established");
                let _ = self.events.send(ReplicaEvent::Connected);
            }
            Err(e) => {
                debug!(error = %e, "reconnect attempt failed");
                self.reconnect_at = Some(Instant::now() + self.options.reconnect_interval);
            }
        }
    }

    async fn connect_once(&self) -> SyncResult<Connection> {
        timeout(self.options.connect_timeout, self.connector.connect())
            .await
            .map_err(|_| SyncError::Timeout("connect"))?
    }

    async fn flush_due(&mut self) {
        let now = Instant::now();
        let due: Vec<StateKey> = self
            .pending
            .iter()
            .filter(|(_, p)| p.flush_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in due {
            if let Some(write) = self.pending.remove(&key) {
                self.emit_mutation(key, write.value).await;
            }
        }
    }

    async fn emit_mutation(&mut self, key: StateKey, value: StateValue) {
        let msg = WireMessage::Mutate { key: key.clone(), value };
        if let Some(conn) = &self.conn {
            if conn.send(msg.clone()).await.is_ok() {
                return;
            }
            self.conn = None;
            let _ = self.events.send(ReplicaEvent::Disconnected);
        }
        // One reconnect-and-retry; beyond that the failure is surfaced, not
        // queued (there is no durable local outbox).
        match self.connect_once().await {
            Ok(conn) => {
                let sent = conn.send(msg).await;
                self.conn = Some(conn);
                self.reconnect_at = None;
                let _ = self.events.send(ReplicaEvent::Connected);
                if sent.is_ok() {
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "retry connect failed");
            }
        }
        warn!(%key, "mutation undeliverable, value kept locally only");
        let _ = self.events.send(ReplicaEvent::MutationFailed { key });
    }

    fn grace_active(&mut self, key: &StateKey, now: Instant) -> bool {
        match self.grace.get(key) {
            Some(&until) if until > now => true,
            Some(_) => {
                self.grace.remove(key);
                false
            }
            None => false,
        }
    }

    fn notify(&self, key: &StateKey) {
        if let Some(sender) = self.watchers.get(key) {
            sender.send_replace(self.mirror.get(key).cloned());
        }
    }
}
