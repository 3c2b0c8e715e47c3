// ── Memory Engine: Subject Store ───────────────────────────────────────────
//
// Owns the in-memory memory collection for one subject and persists
// snapshots through the pluggable `SnapshotStore`.
//
// Persistence is best-effort and synchronous: a failed save is logged and
// swallowed, and the in-memory state stays the source of truth for the
// rest of the session. There are no locks and no transactions; last write
// wins per subject.
//
// One deliberate oddity, inherited from the product behavior: `search` is a
// side-effecting read. Every memory included in a result set gets its
// `last_accessed` / `access_count` bookkeeping updated — memories
// "strengthen" with recall. The mutation is its own named operation,
// `record_access`, so ranking purity and bookkeeping are testable apart.

use crate::atoms::error::{MemoryError, MemoryResult};
use crate::atoms::types::{Memory, MemoryQuery, MemoryStats, MemoryType, TypeCounts};
use crate::engine::decay::{clamp_importance, decay_rate, decayed_importance, IMPORTANCE_MIN};
use crate::engine::persistence::SnapshotStore;
use crate::engine::ranking;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

// ── Constants ──────────────────────────────────────────────────────────────

/// Memories whose unclamped decayed importance falls below this are removed
/// by `cleanup`. Decay alone never hard-deletes; the host decides cadence.
const CLEANUP_FLOOR: f64 = 1.0;

/// Effective-importance filter for the prompt summary.
const SUMMARY_MIN_IMPORTANCE: f64 = 3.0;

/// Default size of the prompt summary.
pub const SUMMARY_DEFAULT_LIMIT: usize = 20;

/// Per-group caps in the prompt summary (events / emotions / relationship).
const SUMMARY_EVENT_CAP: usize = 5;
const SUMMARY_EMOTION_CAP: usize = 3;
const SUMMARY_RELATIONSHIP_CAP: usize = 3;

/// Sentinel returned by `summary_for_prompt` on an empty store, so callers
/// can tell "nothing to say" from "system broken".
pub const NO_MEMORIES_SENTINEL: &str = "No memories recorded yet.";

/// Context keywords shorter than this are ignored.
const CONTEXT_KEYWORD_MIN_CHARS: usize = 2;

/// Per-keyword result cap when deriving relevant memories from context.
const CONTEXT_PER_KEYWORD_LIMIT: usize = 3;

// ── Snapshot format ────────────────────────────────────────────────────────

/// On-disk shape of one subject's state. Round-trips every `Memory` field
/// losslessly; `initialExtracted` guards the one-time seed extraction.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    memories: Vec<Memory>,
    #[serde(default)]
    initial_extracted: bool,
}

// ── Store ──────────────────────────────────────────────────────────────────

pub struct MemoryStore {
    subject_id: String,
    memories: Vec<Memory>,
    initial_extracted: bool,
    persistence: Arc<dyn SnapshotStore>,
}

impl MemoryStore {
    /// Open the store for one subject, loading any persisted snapshot.
    /// A missing or unreadable snapshot yields an empty store (logged).
    pub fn open(subject_id: impl Into<String>, persistence: Arc<dyn SnapshotStore>) -> Self {
        let subject_id = subject_id.into();
        let mut store = Self {
            subject_id,
            memories: Vec::new(),
            initial_extracted: false,
            persistence,
        };
        store.load();
        store
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Whether the one-time seed extraction has already run for this subject.
    pub fn initial_extracted(&self) -> bool {
        self.initial_extracted
    }

    /// Persist the "seed memories already extracted" flag.
    pub fn mark_initial_extracted(&mut self) {
        self.initial_extracted = true;
        self.persist();
    }

    // ── Add ────────────────────────────────────────────────────────────────

    /// Append one memory. Content must be non-empty; importance is clamped
    /// to `[1, 10]`; the decay rate is derived here, once, from the clamped
    /// original importance.
    pub fn add(
        &mut self,
        memory_type: MemoryType,
        content: impl Into<String>,
        importance: f64,
        tags: Vec<String>,
    ) -> MemoryResult<Memory> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::validation("memory content must not be empty"));
        }

        let importance = clamp_importance(importance);
        let now = now_ms();
        let memory = Memory {
            id: new_memory_id(now),
            memory_type,
            content,
            importance,
            timestamp: now,
            tags,
            decay_rate: decay_rate(memory_type, importance),
            last_accessed: now,
            access_count: 0,
            related_memories: None,
        };

        info!(
            "[memory:store] New memory for {}: [{}] {} (importance {})",
            self.subject_id,
            memory.memory_type.as_str(),
            memory.content,
            memory.importance
        );

        self.memories.push(memory.clone());
        self.persist();
        Ok(memory)
    }

    // ── Search ─────────────────────────────────────────────────────────────

    /// Filter, rank, and return memories for a query.
    ///
    /// Side effect by design: every returned memory has `last_accessed` set
    /// to now and `access_count` incremented, and the store is persisted —
    /// even for otherwise read-only queries. The returned copies carry the
    /// updated bookkeeping.
    pub fn search(&mut self, query: &MemoryQuery) -> Vec<Memory> {
        let now = now_ms();
        let ranked = ranking::rank(&self.memories, query, now);
        let ids: Vec<String> = ranked.iter().map(|m| m.id.clone()).collect();
        self.record_access(&ids, now);
        self.persist();

        // Hand back the post-bookkeeping state, in ranked order.
        ids.iter()
            .filter_map(|id| self.memories.iter().find(|m| &m.id == id))
            .cloned()
            .collect()
    }

    /// Apply access bookkeeping to the given memories. Split out of `search`
    /// so the side effect is explicit and unit-testable on its own.
    pub fn record_access(&mut self, ids: &[String], now_ms: i64) {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        for memory in &mut self.memories {
            if wanted.contains(memory.id.as_str()) {
                memory.last_accessed = now_ms;
                memory.access_count += 1;
            }
        }
    }

    /// Memories relevant to a free-text context (used to ground the next
    /// reply). Splits the context into keywords, searches each, dedups by
    /// id, and re-ranks. Performs access bookkeeping via the underlying
    /// searches.
    pub fn relevant_for_context(&mut self, context: &str, limit: usize) -> Vec<Memory> {
        let keywords = context_keywords(context);
        let mut seen: HashSet<String> = HashSet::new();
        let mut collected: Vec<Memory> = Vec::new();

        for keyword in keywords {
            for memory in self.search(&MemoryQuery::keyword(keyword, CONTEXT_PER_KEYWORD_LIMIT)) {
                if seen.insert(memory.id.clone()) {
                    collected.push(memory);
                }
            }
        }

        let now = now_ms();
        collected.sort_by(|a, b| {
            ranking::relevance_score(b, now)
                .partial_cmp(&ranking::relevance_score(a, now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        collected.truncate(limit);
        collected
    }

    // ── Delete / cleanup ───────────────────────────────────────────────────

    /// Remove a memory by id. Idempotent: unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) {
        let before = self.memories.len();
        self.memories.retain(|m| m.id != id);
        if self.memories.len() != before {
            self.persist();
        }
    }

    /// Remove memories whose unclamped decayed importance has fallen below
    /// the floor of 1. Returns how many were removed. Never runs
    /// automatically; the host decides when (if ever) to sweep.
    pub fn cleanup(&mut self) -> usize {
        let now = now_ms();
        let before = self.memories.len();
        self.memories.retain(|memory| {
            let keep = decayed_importance(memory, now) >= CLEANUP_FLOOR;
            if !keep {
                info!(
                    "[memory:store] Forgetting decayed memory for {}: {}",
                    self.subject_id, memory.content
                );
            }
            keep
        });
        let removed = before - self.memories.len();
        if removed > 0 {
            self.persist();
        }
        removed
    }

    // ── Export / import ────────────────────────────────────────────────────

    /// Full snapshot as pretty JSON, sorted by raw importance descending,
    /// independent of decay. This is the user-facing backup format: field
    /// names are stable (`decayRate`, `lastAccessed`, `accessCount`, …).
    pub fn export(&self) -> String {
        let mut memories = self.memories.clone();
        memories.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        // Serializing Vec<Memory> cannot fail; fall back to "[]" regardless.
        serde_json::to_string_pretty(&memories).unwrap_or_else(|_| "[]".to_string())
    }

    /// Replace this store's contents with a previously exported backup.
    ///
    /// Backups are plain JSON files users can (and do) hand-edit, so the
    /// write invariants are re-established on the way in: importance is
    /// clamped to `[1, 10]`, and a decay rate outside its valid range is
    /// re-derived from `(type, importance)`. Everything else — including
    /// bookkeeping (`accessCount`, `lastAccessed`) — round-trips
    /// losslessly. Returns the imported count.
    pub fn import_snapshot(&mut self, exported_json: &str) -> MemoryResult<usize> {
        let mut memories: Vec<Memory> = serde_json::from_str(exported_json)?;
        for memory in &mut memories {
            let clamped = if memory.importance.is_finite() {
                clamp_importance(memory.importance)
            } else {
                IMPORTANCE_MIN
            };
            if clamped != memory.importance {
                warn!(
                    "[memory:store] Clamping imported importance {} -> {} for {}",
                    memory.importance, clamped, memory.id
                );
                memory.importance = clamped;
            }
            // A negative rate would make decayed importance grow with age.
            if !memory.decay_rate.is_finite() || memory.decay_rate < 0.0 {
                let derived = decay_rate(memory.memory_type, memory.importance);
                warn!(
                    "[memory:store] Re-deriving imported decay rate {} -> {} for {}",
                    memory.decay_rate, derived, memory.id
                );
                memory.decay_rate = derived;
            }
        }
        let count = memories.len();
        self.memories = memories;
        self.persist();
        info!(
            "[memory:store] Imported {} memories for {}",
            count, self.subject_id
        );
        Ok(count)
    }

    // ── Statistics ─────────────────────────────────────────────────────────

    /// Read-only aggregate. Does not touch access bookkeeping.
    pub fn statistics(&self) -> MemoryStats {
        let mut by_type = TypeCounts::default();
        for memory in &self.memories {
            match memory.memory_type {
                MemoryType::Fact => by_type.fact += 1,
                MemoryType::Event => by_type.event += 1,
                MemoryType::Preference => by_type.preference += 1,
                MemoryType::Emotion => by_type.emotion += 1,
                MemoryType::Relationship => by_type.relationship += 1,
            }
        }
        let total = self.memories.len();
        MemoryStats {
            total,
            by_type,
            avg_importance: if total == 0 {
                0.0
            } else {
                self.memories.iter().map(|m| m.importance).sum::<f64>() / total as f64
            },
            oldest_timestamp: self.memories.iter().map(|m| m.timestamp).min().unwrap_or(0),
            newest_timestamp: self.memories.iter().map(|m| m.timestamp).max().unwrap_or(0),
        }
    }

    // ── Prompt summary ─────────────────────────────────────────────────────

    /// Grouped, human-readable block of the top memories by effective
    /// relevance, for injection into a completion prompt as grounding
    /// context. Read-only: no access bookkeeping. An empty store returns
    /// `NO_MEMORIES_SENTINEL` rather than an empty string.
    pub fn summary_for_prompt(&self, limit: usize) -> String {
        let query = MemoryQuery {
            min_importance: Some(SUMMARY_MIN_IMPORTANCE),
            limit: Some(limit),
            ..Default::default()
        };
        let top = ranking::rank(&self.memories, &query, now_ms());
        if top.is_empty() {
            return NO_MEMORIES_SENTINEL.to_string();
        }

        let mut summary = String::from("What you remember about them:\n\n");
        let sections: [(MemoryType, &str, usize); 5] = [
            (MemoryType::Fact, "Basic information:", usize::MAX),
            (MemoryType::Preference, "Likes and dislikes:", usize::MAX),
            (MemoryType::Event, "Recent events:", SUMMARY_EVENT_CAP),
            (MemoryType::Emotion, "Emotional state:", SUMMARY_EMOTION_CAP),
            (
                MemoryType::Relationship,
                "Relationship notes:",
                SUMMARY_RELATIONSHIP_CAP,
            ),
        ];

        for (memory_type, header, cap) in sections {
            let group: Vec<&Memory> = top
                .iter()
                .filter(|m| m.memory_type == memory_type)
                .take(cap)
                .collect();
            if group.is_empty() {
                continue;
            }
            summary.push_str(header);
            summary.push('\n');
            for memory in group {
                summary.push_str("- ");
                summary.push_str(&memory.content);
                summary.push('\n');
            }
            summary.push('\n');
        }

        summary.push_str(
            "Weave these memories into the conversation naturally, so they can feel you truly remember.",
        );
        summary
    }

    // ── Persistence ────────────────────────────────────────────────────────

    /// Best-effort snapshot save. Failures are logged and swallowed; the
    /// in-memory state remains authoritative for the session.
    pub fn persist(&self) {
        let snapshot = StoreSnapshot {
            memories: self.memories.clone(),
            initial_extracted: self.initial_extracted,
        };
        let serialized = match serde_json::to_string(&snapshot) {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    "[memory:store] Failed to serialize snapshot for {}: {}",
                    self.subject_id, e
                );
                return;
            }
        };
        if let Err(e) = self.persistence.save(&self.subject_id, &serialized) {
            warn!(
                "[memory:store] Failed to persist snapshot for {}: {}",
                self.subject_id, e
            );
        }
    }

    fn load(&mut self) {
        match self.persistence.load(&self.subject_id) {
            Ok(Some(serialized)) => match serde_json::from_str::<StoreSnapshot>(&serialized) {
                Ok(snapshot) => {
                    self.memories = snapshot.memories;
                    self.initial_extracted = snapshot.initial_extracted;
                    info!(
                        "[memory:store] Loaded {} memories for {}",
                        self.memories.len(),
                        self.subject_id
                    );
                }
                Err(e) => warn!(
                    "[memory:store] Corrupt snapshot for {} — starting empty: {}",
                    self.subject_id, e
                ),
            },
            Ok(None) => {}
            Err(e) => warn!(
                "[memory:store] Failed to load snapshot for {} — starting empty: {}",
                self.subject_id, e
            ),
        }
    }

    #[cfg(test)]
    pub(crate) fn memories_mut(&mut self) -> &mut Vec<Memory> {
        &mut self.memories
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `<unix millis>_<8 random hex chars>` — unique within a store, roughly
/// time-ordered, and stable across export/import.
fn new_memory_id(now_ms: i64) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", now_ms, &suffix[..8])
}

/// Split a free-text context into search keywords: whitespace- and
/// CJK-punctuation-separated terms of at least two characters.
fn context_keywords(context: &str) -> Vec<String> {
    context
        .split(|c: char| c.is_whitespace() || is_separator(c))
        .filter(|w| w.chars().count() >= CONTEXT_KEYWORD_MIN_CHARS)
        .map(|w| w.to_string())
        .collect()
}

fn is_separator(c: char) -> bool {
    matches!(
        c,
        ',' | '.' | '!' | '?' | ';' | ':' | '，' | '。' | '！' | '？' | '、' | '；' | '：'
    )
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
