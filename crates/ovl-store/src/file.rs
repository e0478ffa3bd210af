use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use ovl_types::StateSnapshot;

use crate::error::{StoreError, StoreResult};
use crate::traits::SnapshotPersistence;

/// Flat-file JSON snapshot persistence.
///
/// The snapshot is pretty-printed JSON (the file doubles as a manual
/// inspection and repair surface for operators) written to a sibling
/// temporary file and renamed into place, so a crash mid-save leaves the
/// previous snapshot intact rather than a torn one.
pub struct JsonSnapshotFile {
    path: PathBuf,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotPersistence for JsonSnapshotFile {
    fn load(&self) -> StoreResult<Option<StateSnapshot>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot file, starting fresh");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&data).map_err(|e| StoreError::CorruptSnapshot {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &StateSnapshot) -> StoreResult<()> {
        let data = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), keys = snapshot.len(), "snapshot saved");
        Ok(())
    }
}
