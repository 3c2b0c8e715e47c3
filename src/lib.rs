// ── Companion Memory ───────────────────────────────────────────────────────
//
// Long-term memory engine for conversational companions: turns raw chat
// turns into durable, scored facts about a person, retrieves the most
// relevant subset to ground the next reply, and compresses long histories
// into a human-readable timeline.
//
// Layering:
//   atoms/  — pure data and error types, zero side effects
//   engine/ — decay model, relevance ranking, subject stores, the
//             extraction pipeline, the timeline summarizer, and the
//             session-scoped subject context
//
// The two external collaborators are traits: `CompletionClient` (any
// chat-completions style text service) and `SnapshotStore` (any per-subject
// key-value persistence). Bundled defaults cover the common case.
//
// Typical wiring:
//
// ```no_run
// use std::sync::Arc;
// use companion_memory::{
//     CompletionConfig, ExtractionPipeline, FileSnapshotStore, HttpCompletionClient,
//     MemoryContext, MemoryQuery,
// };
//
// # async fn demo() -> companion_memory::MemoryResult<()> {
// let client = Arc::new(HttpCompletionClient::new(CompletionConfig {
//     base_url: "https://api.openai.com/v1".into(),
//     api_key: "sk-...".into(),
//     model: "gpt-4o-mini".into(),
// })?);
// let context = MemoryContext::new(Arc::new(FileSnapshotStore::default_location()?));
// let pipeline = ExtractionPipeline::new(client);
//
// let store = context.store("mio");
// pipeline
//     .extract_from_turn(&store, "I moved to Hangzhou last week", "Oh nice!", "Ann", "Mio")
//     .await;
// let grounding = store.lock().summary_for_prompt(20);
// let hits = store.lock().search(&MemoryQuery::keyword("Hangzhou", 5));
// # let _ = (grounding, hits);
// # Ok(())
// # }
// ```

pub mod atoms;
pub mod engine;

pub use atoms::error::{MemoryError, MemoryResult};
pub use atoms::types::{
    CallLine, CallRecord, CallSpeaker, ChatMessage, CompletionMessage, CompletionOptions,
    CompletionResponse, Memory, MemoryQuery, MemoryStats, MemoryType, MessageDirection,
    TimelineEvent,
};
pub use engine::{
    CompletionClient, CompletionConfig, ExtractionPipeline, FileSnapshotStore,
    HttpCompletionClient, InMemorySnapshotStore, MemoryContext, MemoryStore, SnapshotStore,
    TimelineSummarizer, TurnExtraction, NO_MEMORIES_SENTINEL,
};
