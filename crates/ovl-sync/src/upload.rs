use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, trace};

use ovl_protocol::{ChunkFrame, WireMessage, DEFAULT_CHUNK_LEN};
use ovl_types::{StateKey, UploadName};

use crate::error::{SyncError, SyncResult};
use crate::transport::{Connection, Connector};

#[derive(Clone, Debug)]
pub struct UploadOptions {
    /// Bytes per chunk. Bounded by the protocol's `MAX_CHUNK_LEN`.
    pub chunk_len: usize,
    /// How long to wait for each acknowledgment before giving up.
    pub ack_timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_len: DEFAULT_CHUNK_LEN,
            ack_timeout: Duration::from_secs(30),
        }
    }
}

/// Client-side transfer states.
///
/// Strictly one chunk in flight: `Sending` slices the next chunk,
/// `AwaitingAck` waits for the server's cumulative offset, and an ack
/// covering the whole blob moves to `Completing` (the finalize exchange).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    Sending { offset: u64 },
    AwaitingAck { end: u64 },
    Completing,
    Done,
}

/// Outcome of feeding an acknowledgment to the machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    SendNext,
    Complete,
}

/// Pure chunk-sequencing state machine with no I/O of its own.
///
/// The next offset always comes from the server's ack, but the machine
/// refuses an ack that is not exactly the end of the chunk in flight:
/// the protocol has no sequence numbers, so strict sequencing here is the
/// only thing standing between a confused peer and a corrupt file.
#[derive(Debug)]
pub struct UploadMachine {
    total: u64,
    chunk_len: u64,
    state: UploadState,
}

impl UploadMachine {
    pub fn new(total: u64, chunk_len: u64) -> SyncResult<Self> {
        if chunk_len == 0 {
            return Err(SyncError::InvalidChunkLen);
        }
        Ok(Self {
            total,
            chunk_len,
            state: UploadState::Sending { offset: 0 },
        })
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Slice coordinates of the next chunk to send, or `None` once all
    /// bytes are acknowledged. An empty blob still yields one zero-length
    /// chunk: offset 0 is what creates the destination file.
    pub fn next_chunk(&mut self) -> Option<(u64, usize)> {
        match self.state {
            UploadState::Sending { offset } => {
                let len = (self.total - offset).min(self.chunk_len) as usize;
                self.state = UploadState::AwaitingAck { end: offset + len as u64 };
                Some((offset, len))
            }
            _ => None,
        }
    }

    pub fn on_ack(&mut self, offset: u64) -> SyncResult<AckOutcome> {
        let end = match self.state {
            UploadState::AwaitingAck { end } => end,
            _ => return Err(SyncError::UnexpectedAck { expected: 0, got: offset }),
        };
        if offset != end {
            return Err(SyncError::UnexpectedAck { expected: end, got: offset });
        }
        if offset >= self.total {
            self.state = UploadState::Completing;
            Ok(AckOutcome::Complete)
        } else {
            self.state = UploadState::Sending { offset };
            Ok(AckOutcome::SendNext)
        }
    }

    /// Mark the finalize exchange done.
    pub fn finish(&mut self) {
        self.state = UploadState::Done;
    }
}

/// Transfer progress, published through a `watch` channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_acked: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.bytes_acked as f64 / self.total as f64
        }
    }
}

/// A finished upload.
#[derive(Clone, Debug)]
pub struct UploadedArtifact {
    pub name: UploadName,
    /// Public path the server serves the file at.
    pub url: String,
    /// Lowercase hex BLAKE3 of the blob, as verified by the server.
    pub checksum: String,
}

/// Streams files to the server in acknowledged chunks.
///
/// Each upload dials its own connection, so transfers never contend with
/// the sync stream and two uploads never interleave chunks on one socket.
pub struct Uploader {
    connector: Arc<dyn Connector>,
    options: UploadOptions,
}

impl Uploader {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_options(connector, UploadOptions::default())
    }

    pub fn with_options(connector: Arc<dyn Connector>, options: UploadOptions) -> Self {
        Self { connector, options }
    }

    /// Upload `path` under `name`. With `bind_key: Some(k)` the server binds
    /// `k` to the artifact URL in the shared store as the final step;
    /// `None` means the caller will place the URL itself.
    pub async fn upload(
        &self,
        path: &Path,
        name: UploadName,
        bind_key: Option<StateKey>,
    ) -> SyncResult<UploadedArtifact> {
        self.upload_with_progress(path, name, bind_key, None).await
    }

    pub async fn upload_with_progress(
        &self,
        path: &Path,
        name: UploadName,
        bind_key: Option<StateKey>,
        progress: Option<watch::Sender<UploadProgress>>,
    ) -> SyncResult<UploadedArtifact> {
        let mut file = File::open(path).await?;
        let total = file.metadata().await?.len();
        let checksum = hash_file(&mut file).await?;

        let mut conn = self.connector.connect().await?;
        let mut machine = UploadMachine::new(total, self.options.chunk_len as u64)?;
        debug!(%name, total, "upload started");

        while let Some((offset, len)) = machine.next_chunk() {
            let data = read_slice(&mut file, offset, len).await?;
            conn.send(WireMessage::Chunk(ChunkFrame {
                name: name.clone(),
                offset,
                data,
            }))
            .await?;

            let acked = self.await_ack(&mut conn, &name).await?;
            machine.on_ack(acked)?;
            if let Some(p) = &progress {
                p.send_replace(UploadProgress { bytes_acked: acked, total });
            }
        }

        conn.send(WireMessage::UploadComplete {
            name: name.clone(),
            key: bind_key,
            checksum: checksum.clone(),
        })
        .await?;
        let url = self.await_success(&mut conn, &name).await?;
        machine.finish();
        debug!(%name, %url, "upload finished");

        Ok(UploadedArtifact { name, url, checksum })
    }

    async fn await_ack(&self, conn: &mut Connection, name: &UploadName) -> SyncResult<u64> {
        loop {
            let msg = timeout(self.options.ack_timeout, conn.recv())
                .await
                .map_err(|_| SyncError::Timeout("chunk ack"))?
                .ok_or(SyncError::TransportClosed)?;
            match msg {
                WireMessage::ChunkAck { name: acked, offset } if &acked == name => {
                    return Ok(offset);
                }
                WireMessage::ChunkError { message, .. } => return Err(SyncError::Remote(message)),
                // The server's init/update stream shares the connection
                // type; an upload connection just lets it pass by.
                other => trace!(kind = other.type_name(), "ignoring non-ack message"),
            }
        }
    }

    async fn await_success(&self, conn: &mut Connection, name: &UploadName) -> SyncResult<String> {
        loop {
            let msg = timeout(self.options.ack_timeout, conn.recv())
                .await
                .map_err(|_| SyncError::Timeout("upload success"))?
                .ok_or(SyncError::TransportClosed)?;
            match msg {
                WireMessage::UploadSuccess { name: done, url } if &done == name => return Ok(url),
                WireMessage::ChunkError { message, .. } => return Err(SyncError::Remote(message)),
                other => trace!(kind = other.type_name(), "ignoring message before success"),
            }
        }
    }
}

async fn hash_file(file: &mut File) -> SyncResult<String> {
    file.seek(SeekFrom::Start(0)).await?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

async fn read_slice(file: &mut File, offset: u64, len: usize) -> SyncResult<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut data = vec![0u8; len];
    file.read_exact(&mut data).await?;
    Ok(data)
}
