use std::collections::HashMap;
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use ovl_protocol::ChunkFrame;
use ovl_types::UploadName;

use crate::error::{ServerError, ServerResult};

/// Public path an upload is served at once finished.
pub fn public_url(name: &UploadName) -> String {
    format!("/uploads/{name}")
}

struct ActiveUpload {
    file: File,
    written: u64,
    hasher: blake3::Hasher,
}

/// Per-session intake for chunked uploads.
///
/// Uploads to different names are independent; each tracks its own open
/// file, byte count, and running hash. The rules per chunk:
///
/// - offset 0 (re)creates the destination file; a restart legitimately
///   discards prior progress, including another session's (last truncator
///   wins, single-writer discipline is by convention);
/// - any other offset must equal the bytes written so far, otherwise the
///   chunk is refused instead of corrupting the file;
/// - completion verifies the client's checksum against the running hash
///   before the artifact is announced.
///
/// A session that vanishes mid-upload just drops this struct: the partial
/// file stays on disk and a fresh offset-0 chunk overwrites it later.
pub struct SessionUploads {
    dir: PathBuf,
    active: HashMap<UploadName, ActiveUpload>,
}

impl SessionUploads {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            active: HashMap::new(),
        }
    }

    /// Write one chunk; returns the new cumulative offset to acknowledge.
    pub async fn write_chunk(&mut self, frame: &ChunkFrame) -> ServerResult<u64> {
        if frame.offset == 0 {
            tokio::fs::create_dir_all(&self.dir).await?;
            let file = File::create(self.dir.join(frame.name.as_str())).await?;
            if self.active.remove(&frame.name).is_some() {
                debug!(name = %frame.name, "upload restarted from offset 0");
            }
            self.active.insert(
                frame.name.clone(),
                ActiveUpload {
                    file,
                    written: 0,
                    hasher: blake3::Hasher::new(),
                },
            );
        }

        let upload = self
            .active
            .get_mut(&frame.name)
            .ok_or_else(|| ServerError::UploadNotActive(frame.name.clone()))?;
        if upload.written != frame.offset {
            return Err(ServerError::OffsetMismatch {
                name: frame.name.clone(),
                expected: upload.written,
                got: frame.offset,
            });
        }

        upload.file.write_all(&frame.data).await?;
        upload.hasher.update(&frame.data);
        upload.written += frame.data.len() as u64;
        Ok(upload.written)
    }

    /// Finalize an upload: verify the checksum, sync to disk, return the
    /// artifact's public URL.
    pub async fn complete(&mut self, name: &UploadName, checksum: &str) -> ServerResult<String> {
        let mut upload = self
            .active
            .remove(name)
            .ok_or_else(|| ServerError::UploadNotActive(name.clone()))?;

        let digest = upload.hasher.finalize().to_hex().to_string();
        if digest != checksum {
            // Don't leave a corrupt artifact where the static server finds it.
            drop(upload.file);
            if let Err(e) = tokio::fs::remove_file(self.dir.join(name.as_str())).await {
                warn!(%name, error = %e, "could not remove corrupt upload");
            }
            return Err(ServerError::ChecksumMismatch { name: name.clone() });
        }

        upload.file.flush().await?;
        upload.file.sync_all().await?;
        debug!(%name, bytes = upload.written, "upload finalized");
        Ok(public_url(name))
    }

    /// Names with an intake in progress (diagnostics).
    pub fn active_names(&self) -> Vec<UploadName> {
        self.active.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> UploadName {
        UploadName::parse(s).unwrap()
    }

    fn chunk(n: &UploadName, offset: u64, data: &[u8]) -> ChunkFrame {
        ChunkFrame {
            name: n.clone(),
            offset,
            data: data.to_vec(),
        }
    }

    async fn finish(sink: &mut SessionUploads, n: &UploadName, content: &[u8]) -> String {
        let checksum = blake3::hash(content).to_hex().to_string();
        sink.complete(n, &checksum).await.unwrap()
    }

    #[tokio::test]
    async fn sequential_chunks_build_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let n = name("clip.bin");

        assert_eq!(sink.write_chunk(&chunk(&n, 0, b"hello ")).await.unwrap(), 6);
        assert_eq!(sink.write_chunk(&chunk(&n, 6, b"world")).await.unwrap(), 11);

        let url = finish(&mut sink, &n, b"hello world").await;
        assert_eq!(url, "/uploads/clip.bin");
        assert_eq!(
            tokio::fs::read(dir.path().join("clip.bin")).await.unwrap(),
            b"hello world"
        );
    }

    #[tokio::test]
    async fn offset_zero_truncates_and_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let n = name("clip.bin");

        sink.write_chunk(&chunk(&n, 0, b"first attempt")).await.unwrap();
        // Restart: prior progress is discarded.
        assert_eq!(sink.write_chunk(&chunk(&n, 0, b"redo")).await.unwrap(), 4);

        finish(&mut sink, &n, b"redo").await;
        assert_eq!(
            tokio::fs::read(dir.path().join("clip.bin")).await.unwrap(),
            b"redo"
        );
    }

    #[tokio::test]
    async fn mismatched_offset_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let n = name("clip.bin");

        sink.write_chunk(&chunk(&n, 0, b"0123")).await.unwrap();
        let err = sink.write_chunk(&chunk(&n, 9, b"gap")).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::OffsetMismatch { expected: 4, got: 9, .. }
        ));

        // The file was not corrupted; the correct offset still works.
        assert_eq!(sink.write_chunk(&chunk(&n, 4, b"45")).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn nonzero_first_offset_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let err = sink
            .write_chunk(&chunk(&name("clip.bin"), 512, b"late"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::UploadNotActive(_)));
    }

    #[tokio::test]
    async fn uploads_to_different_names_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let a = name("a.bin");
        let b = name("b.bin");

        sink.write_chunk(&chunk(&a, 0, b"aaa")).await.unwrap();
        sink.write_chunk(&chunk(&b, 0, b"b")).await.unwrap();
        sink.write_chunk(&chunk(&a, 3, b"AAA")).await.unwrap();
        sink.write_chunk(&chunk(&b, 1, b"B")).await.unwrap();
        assert_eq!(sink.active_names().len(), 2);

        finish(&mut sink, &a, b"aaaAAA").await;
        finish(&mut sink, &b, b"bB").await;
        assert_eq!(tokio::fs::read(dir.path().join("a.bin")).await.unwrap(), b"aaaAAA");
        assert_eq!(tokio::fs::read(dir.path().join("b.bin")).await.unwrap(), b"bB");
    }

    #[tokio::test]
    async fn checksum_mismatch_fails_and_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let n = name("clip.bin");

        sink.write_chunk(&chunk(&n, 0, b"content")).await.unwrap();
        let err = sink.complete(&n, &"00".repeat(32)).await.unwrap_err();
        assert!(matches!(err, ServerError::ChecksumMismatch { .. }));
        assert!(!dir.path().join("clip.bin").exists());
    }

    #[tokio::test]
    async fn complete_without_chunks_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let err = sink.complete(&name("ghost.bin"), "deadbeef").await.unwrap_err();
        assert!(matches!(err, ServerError::UploadNotActive(_)));
    }

    #[tokio::test]
    async fn empty_upload_creates_an_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = SessionUploads::new(dir.path().to_path_buf());
        let n = name("empty.bin");

        assert_eq!(sink.write_chunk(&chunk(&n, 0, b"")).await.unwrap(), 0);
        finish(&mut sink, &n, b"").await;
        assert_eq!(
            tokio::fs::read(dir.path().join("empty.bin")).await.unwrap(),
            b""
        );
    }
}
