// ── Memory Engine: Subject Context ─────────────────────────────────────────
//
// One store per subject, created lazily, cached for the context's lifetime.
//
// This replaces the process-wide singleton registry of the old design with
// an explicit context object: a host constructs one `MemoryContext` per
// session and threads it through extraction and search calls. No hidden
// global state, same "one store per subject" behavior. There is no
// eviction; tens to low hundreds of subjects per user is the target scale.

use crate::engine::persistence::SnapshotStore;
use crate::engine::store::MemoryStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MemoryContext {
    persistence: Arc<dyn SnapshotStore>,
    stores: Mutex<HashMap<String, Arc<Mutex<MemoryStore>>>>,
}

impl MemoryContext {
    pub fn new(persistence: Arc<dyn SnapshotStore>) -> Self {
        Self { persistence, stores: Mutex::new(HashMap::new()) }
    }

    /// The store for one subject. First call per subject opens it (loading
    /// any persisted snapshot); later calls return the same instance.
    pub fn store(&self, subject_id: &str) -> Arc<Mutex<MemoryStore>> {
        let mut stores = self.stores.lock();
        stores
            .entry(subject_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(MemoryStore::open(
                    subject_id,
                    self.persistence.clone(),
                )))
            })
            .clone()
    }

    /// Run the decay-floor cleanup over every loaded store. Returns the
    /// total number of memories removed. Subjects never touched this
    /// session are not loaded just to sweep them.
    pub fn cleanup_all(&self) -> usize {
        let stores: Vec<Arc<Mutex<MemoryStore>>> =
            self.stores.lock().values().cloned().collect();
        stores.iter().map(|store| store.lock().cleanup()).sum()
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
