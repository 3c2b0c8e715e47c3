// ── Memory Atoms: Core Types ───────────────────────────────────────────────
//
// Type definitions for the companion memory engine.
// These are pure data types (no logic beyond trivial constructors, no I/O).
//
// Serde field names are camelCase because the export format doubles as the
// user-facing backup format: `decayRate`, `lastAccessed`, `accessCount` and
// friends must round-trip byte-compatible with existing backups.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 1: Memory Record
// ═══════════════════════════════════════════════════════════════════════════

/// The closed set of memory kinds. Drives the per-type decay rate:
/// `relationship` is forgotten slowest, `emotion` fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Fact,
    Event,
    Preference,
    Emotion,
    Relationship,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Event => "event",
            MemoryType::Preference => "preference",
            MemoryType::Emotion => "emotion",
            MemoryType::Relationship => "relationship",
        }
    }
}

/// One durable fact about a subject.
///
/// `importance` is the *persisted* score in `[1, 10]`; the decay- and
/// access-adjusted value used for ranking is computed transiently by
/// `engine::decay` and never written back here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    /// Unique within one store. Format: `<unix millis>_<8 hex chars>`.
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    /// Persisted importance, clamped to `[1, 10]` on every write.
    pub importance: f64,
    /// Creation time, unix milliseconds.
    pub timestamp: i64,
    pub tags: Vec<String>,
    /// Forgetting speed, derived once at creation from `(type, importance)`.
    /// Never mutated afterwards, even as the effective importance decays.
    pub decay_rate: f64,
    /// Updated every time this memory is included in a search result.
    pub last_accessed: i64,
    /// Incremented every time this memory is included in a search result.
    pub access_count: u32,
    /// Ids of associated memories. Informational only, never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_memories: Option<Vec<String>>,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 2: Queries & Aggregates
// ═══════════════════════════════════════════════════════════════════════════

/// Search filter. All fields are optional and AND-combined.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    /// Case-insensitive substring match against content OR any tag.
    pub keyword: Option<String>,
    /// Exact type match.
    pub memory_type: Option<MemoryType>,
    /// Minimum *effective* (decayed) importance.
    pub min_importance: Option<f64>,
    /// Cap on result size, applied after ranking.
    pub limit: Option<usize>,
}

impl MemoryQuery {
    /// Keyword-only query with a result cap.
    pub fn keyword(keyword: impl Into<String>, limit: usize) -> Self {
        Self {
            keyword: Some(keyword.into()),
            limit: Some(limit),
            ..Default::default()
        }
    }
}

/// Read-only aggregate over one subject's store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total: usize,
    pub by_type: TypeCounts,
    /// Average of the raw (undecayed) importance values. 0.0 for an empty store.
    pub avg_importance: f64,
    /// Unix millis of the oldest memory, 0 for an empty store.
    pub oldest_timestamp: i64,
    /// Unix millis of the newest memory, 0 for an empty store.
    pub newest_timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TypeCounts {
    pub fact: usize,
    pub event: usize,
    pub preference: usize,
    pub emotion: usize,
    pub relationship: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 3: Chat Messages (timeline input)
// ═══════════════════════════════════════════════════════════════════════════

/// Who produced a chat message, from the subject-store owner's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    /// Sent by the user.
    Sent,
    /// Sent by the companion agent.
    Received,
}

/// Speaker inside an embedded call record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallSpeaker {
    User,
    Agent,
    Narrator,
}

/// One line of an embedded call sub-conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLine {
    pub speaker: CallSpeaker,
    pub content: String,
}

/// A voice/video call embedded in a chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub duration_secs: u64,
    pub lines: Vec<CallLine>,
}

/// A raw chat message as handed to the timeline summarizer.
///
/// Only two special shapes are translated before prompting: embedded call
/// records and offline/narrative-mode messages. Everything else is passed
/// through as `sender: content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub direction: MessageDirection,
    pub content: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_record: Option<CallRecord>,
    /// True for offline/narrative-mode scenes; they are prefix-tagged in the
    /// summarizer prompt.
    #[serde(default)]
    pub offline_scene: bool,
}

impl ChatMessage {
    /// Plain text message.
    pub fn text(direction: MessageDirection, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            direction,
            content: content.into(),
            timestamp,
            call_record: None,
            offline_scene: false,
        }
    }
}

/// One compressed timeline event, as returned by the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub start_time: String,
    pub end_time: String,
    pub description: String,
}

// ═══════════════════════════════════════════════════════════════════════════
// SECTION 4: Completion Service Boundary
// ═══════════════════════════════════════════════════════════════════════════

/// One message in a completion request. Roles follow the common
/// chat-completions convention ("system" / "user" / "assistant").
#[derive(Debug, Clone, Serialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

impl CompletionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Per-request knobs. The engine only ever varies temperature and max tokens.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Completion-service response. The engine only depends on this shape.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
}
