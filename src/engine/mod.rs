// ── Memory Engine ──────────────────────────────────────────────────────────
//
// Behavior layer of the companion memory system.
//
// Sub-modules, leaf-first:
//   - decay:       pure age/access-adjusted importance model
//   - ranking:     relevance scoring and ordering (pure; no bookkeeping)
//   - response:    fenced-JSON extraction + strict schema parsing
//   - persistence: per-subject snapshot adapter (file / in-memory)
//   - completion:  completion-service trait + OpenAI-compatible HTTP client
//   - store:       per-subject memory store (add/search/cleanup/export/…)
//   - extraction:  chat turn → candidate memories pipeline
//   - timeline:    long history → compressed chronological event list
//   - context:     lazy one-store-per-subject session context

pub mod completion;
pub mod context;
pub mod decay;
pub mod extraction;
pub mod persistence;
pub mod ranking;
pub mod response;
pub mod store;
pub mod timeline;

// Re-exports for convenience
pub use completion::{CompletionClient, CompletionConfig, HttpCompletionClient};
pub use context::MemoryContext;
pub use decay::{decay_rate, decayed_importance, effective_importance};
pub use extraction::{ExtractionPipeline, TurnExtraction};
pub use persistence::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore};
pub use ranking::{rank, relevance_score};
pub use store::{MemoryStore, NO_MEMORIES_SENTINEL, SUMMARY_DEFAULT_LIMIT};
pub use timeline::TimelineSummarizer;
