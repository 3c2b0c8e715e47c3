// ── Memory Engine: Persistence Adapter ─────────────────────────────────────
//
// The store treats persistence as a simple synchronous key-value interface:
// one opaque snapshot string per subject id. Writes are best-effort; the
// in-memory state is the source of truth for the session and a failed save
// is logged, never propagated as a fatal error.
//
// Two bundled implementations:
//   - FileSnapshotStore: one JSON file per subject under a data directory
//   - InMemorySnapshotStore: ephemeral map, used by tests and transient hosts

use crate::atoms::error::{MemoryError, MemoryResult};
use log::info;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

// ── Trait ──────────────────────────────────────────────────────────────────

/// Per-subject snapshot storage. Implementations must round-trip the
/// snapshot string losslessly; the engine does not care about the medium.
pub trait SnapshotStore: Send + Sync {
    /// Returns the stored snapshot for a subject, or `None` if the subject
    /// has never been persisted.
    fn load(&self, subject_id: &str) -> MemoryResult<Option<String>>;

    /// Overwrites the subject's snapshot (last write wins).
    fn save(&self, subject_id: &str, snapshot: &str) -> MemoryResult<()>;
}

// ── File-backed store ──────────────────────────────────────────────────────

/// One `<subject_id>.json` file per subject under `dir`.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Store snapshots under an explicit directory (created on first save).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default platform data directory: `<data_dir>/companion-memory/`.
    pub fn default_location() -> MemoryResult<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| MemoryError::Config("no platform data directory".to_string()))?;
        Ok(Self::new(base.join("companion-memory")))
    }

    fn path_for(&self, subject_id: &str) -> PathBuf {
        // Subject ids come from the host app; strip path-hostile characters
        // so an id can never escape the snapshot directory.
        let safe: String = subject_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, subject_id: &str) -> MemoryResult<Option<String>> {
        let path = self.path_for(subject_id);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| MemoryError::Persistence(format!("read {}: {}", path.display(), e)))
    }

    fn save(&self, subject_id: &str, snapshot: &str) -> MemoryResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| MemoryError::Persistence(format!("mkdir {}: {}", self.dir.display(), e)))?;
        let path = self.path_for(subject_id);
        fs::write(&path, snapshot)
            .map_err(|e| MemoryError::Persistence(format!("write {}: {}", path.display(), e)))?;
        info!("[memory:persistence] Saved snapshot for subject {}", subject_id);
        Ok(())
    }
}

// ── In-memory store ────────────────────────────────────────────────────────

/// Ephemeral snapshot map. Useful for tests and hosts that persist elsewhere.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<String, String>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self, subject_id: &str) -> MemoryResult<Option<String>> {
        Ok(self.snapshots.lock().get(subject_id).cloned())
    }

    fn save(&self, subject_id: &str, snapshot: &str) -> MemoryResult<()> {
        self.snapshots
            .lock()
            .insert(subject_id.to_string(), snapshot.to_string());
        Ok(())
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
