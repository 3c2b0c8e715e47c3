// ── Memory Atoms Layer ─────────────────────────────────────────────────────
// Pure data types and error types — zero side effects, no I/O.
// Dependency rule: atoms may only depend on std and external pure crates.
// Nothing here may import from engine/ or lib.rs.

pub mod error;
pub mod types;

pub use error::{MemoryError, MemoryResult};
pub use types::{
    CallLine, CallRecord, CallSpeaker, ChatMessage, CompletionMessage, CompletionOptions,
    CompletionResponse, Memory, MemoryQuery, MemoryStats, MemoryType, MessageDirection,
    TimelineEvent, TypeCounts,
};
