//! Client-side synchronization for Overlay Link.
//!
//! Two engines share one transport seam:
//!
//! - [`Replica`] mirrors the server's key-value state: local writes apply
//!   optimistically and are debounced into single `mutate` messages, inbound
//!   echoes inside a per-key grace window are dropped, and the mirror
//!   converges on whatever the server last accepted.
//! - [`Uploader`] streams a file to the server in bounded chunks, strictly
//!   one in flight, driven by the server's cumulative acknowledgments, and
//!   resolves to the finished artifact's public URL.
//!
//! Both dial through a [`Connector`]: [`WsConnector`] for real WebSocket
//! servers, [`MemoryConnector`] for in-process tests and embedding.

pub mod error;
pub mod memory;
pub mod replica;
pub mod transport;
pub mod upload;
pub mod ws;

pub use error::{SyncError, SyncResult};
pub use memory::MemoryConnector;
pub use replica::{Replica, ReplicaEvent, ReplicaOptions};
pub use transport::{Connection, Connector};
pub use upload::{
    AckOutcome, UploadMachine, UploadOptions, UploadProgress, UploadState, UploadedArtifact,
    Uploader,
};
pub use ws::WsConnector;
