// ── Memory Engine: Extraction Pipeline ─────────────────────────────────────
//
// Turns a pair of chat turns into zero or more durable memories by
// prompting the completion service and validating the structured result.
//
// Policy, in order:
//   1. Prompt asks for real names, both participants, no invention, one of
//      five types, importance 1-10, and a fenced JSON answer.
//   2. The first fenced block is parsed strictly (engine::response); any
//      malformed output is one soft failure, not a crash.
//   3. Candidates with importance < 5 are noise and are dropped.
//   4. `fact` candidates that mention only the agent (not the subject) are
//      self-referential agent trivia and are dropped: the store is about
//      the subject.
//
// Nothing in here ever surfaces an error to the conversation flow. A failed
// extraction means the companion simply "doesn't remember" this turn.
//
// Locking discipline: the store mutex is taken only for the brief write
// phase after the completion call returns, never across an await. The
// returned futures are `Send`, so extractions for different subjects can
// be spawned concurrently.

use crate::atoms::types::{
    CompletionMessage, CompletionOptions, Memory, MemoryType,
};
use crate::engine::completion::CompletionClient;
use crate::engine::response::parse_fenced;
use crate::engine::store::MemoryStore;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

// ── Constants ──────────────────────────────────────────────────────────────

/// Low temperature: extraction wants fidelity, not creativity.
const EXTRACTION_TEMPERATURE: f64 = 0.3;

const EXTRACTION_MAX_TOKENS: u32 = 2000;

/// Candidates below this importance are casual/ephemeral content that
/// should not persist.
const NOISE_IMPORTANCE_FLOOR: f64 = 5.0;

/// Tag appended to memories seeded from a subject description.
const SEED_TAG: &str = "seed";

// ── Result & wire types ────────────────────────────────────────────────────

/// What one conversational turn yielded.
#[derive(Debug, Default)]
pub struct TurnExtraction {
    /// Memories accepted and written to the store.
    pub memories: Vec<Memory>,
    /// One-line digest of what the turn revealed; empty when nothing new.
    pub summary: String,
}

/// Strict schema for the turn-extraction answer.
#[derive(Debug, Deserialize)]
struct TurnPayload {
    #[serde(default)]
    memories: Vec<CandidatePayload>,
    #[serde(default)]
    summary: String,
}

/// One candidate memory as produced by the completion service.
#[derive(Debug, Deserialize)]
struct CandidatePayload {
    #[serde(rename = "type")]
    memory_type: MemoryType,
    content: String,
    importance: f64,
    #[serde(default)]
    tags: Vec<String>,
}

// ── Pipeline ───────────────────────────────────────────────────────────────

pub struct ExtractionPipeline {
    client: Arc<dyn CompletionClient>,
}

impl ExtractionPipeline {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// Extract memories from one turn and write the accepted ones into
    /// `store`. Infallible by contract: completion failures and malformed
    /// output are logged and yield an empty result.
    ///
    /// The store is locked only after the completion call returns, so the
    /// (potentially slow) network round trip never blocks other readers.
    pub async fn extract_from_turn(
        &self,
        store: &Mutex<MemoryStore>,
        user_message: &str,
        agent_message: &str,
        subject_name: &str,
        agent_name: &str,
    ) -> TurnExtraction {
        let prompt = turn_prompt(user_message, agent_message, subject_name, agent_name);
        let options = CompletionOptions {
            temperature: EXTRACTION_TEMPERATURE,
            max_tokens: EXTRACTION_MAX_TOKENS,
        };

        let response = match self
            .client
            .complete(&[CompletionMessage::user(prompt)], &options)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("[memory:extraction] Completion call failed: {}", e);
                return TurnExtraction::default();
            }
        };

        let payload: TurnPayload = match parse_fenced(&response.content) {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!("[memory:extraction] No fenced JSON in response — nothing extracted");
                return TurnExtraction::default();
            }
            Err(e) => {
                warn!("[memory:extraction] Malformed extraction payload: {}", e);
                return TurnExtraction::default();
            }
        };

        let mut extraction = TurnExtraction {
            memories: Vec::new(),
            summary: payload.summary,
        };

        // Write phase: lock held only while appending accepted candidates.
        let mut store = store.lock();
        for candidate in payload.memories {
            if !accept_candidate(&candidate, subject_name, agent_name) {
                continue;
            }
            match store.add(
                candidate.memory_type,
                candidate.content,
                candidate.importance,
                candidate.tags,
            ) {
                Ok(memory) => extraction.memories.push(memory),
                Err(e) => warn!("[memory:extraction] Dropping invalid candidate: {}", e),
            }
        }

        info!(
            "[memory:extraction] Extracted {} memories from turn for {}",
            extraction.memories.len(),
            subject_name
        );
        extraction
    }

    /// Seed memories from a static subject/character description. Runs at
    /// most once per subject, guarded by the store's persisted flag. An
    /// empty description still sets the flag (there is nothing to retry).
    ///
    /// The flag is re-checked under the write lock after the completion
    /// call, so two overlapping seed runs commit at most once.
    pub async fn extract_initial(
        &self,
        store: &Mutex<MemoryStore>,
        subject_description: &str,
    ) -> usize {
        if store.lock().initial_extracted() {
            return 0;
        }
        if subject_description.trim().is_empty() {
            debug!("[memory:extraction] Empty subject description — skipping seed extraction");
            store.lock().mark_initial_extracted();
            return 0;
        }

        let prompt = initial_prompt(subject_description);
        let options = CompletionOptions {
            temperature: EXTRACTION_TEMPERATURE,
            max_tokens: EXTRACTION_MAX_TOKENS,
        };

        let response = match self
            .client
            .complete(&[CompletionMessage::user(prompt)], &options)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                // Flag stays unset so a later session can retry.
                warn!("[memory:extraction] Seed extraction failed: {}", e);
                return 0;
            }
        };

        let candidates: Vec<CandidatePayload> = match parse_fenced(&response.content) {
            Ok(Some(c)) => c,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("[memory:extraction] Malformed seed payload: {}", e);
                return 0;
            }
        };

        let mut store = store.lock();
        if store.initial_extracted() {
            // Another task seeded this subject while we were prompting.
            return 0;
        }

        let mut added = 0usize;
        for candidate in candidates {
            let mut tags = candidate.tags;
            tags.push(SEED_TAG.to_string());
            match store.add(
                candidate.memory_type,
                candidate.content,
                candidate.importance,
                tags,
            ) {
                Ok(_) => added += 1,
                Err(e) => warn!("[memory:extraction] Dropping invalid seed candidate: {}", e),
            }
        }

        store.mark_initial_extracted();
        info!("[memory:extraction] Seeded {} memories from subject description", added);
        added
    }
}

// ── Candidate filtering ────────────────────────────────────────────────────

/// The write-side policy gate, separate from parsing so both are testable.
fn accept_candidate(candidate: &CandidatePayload, subject_name: &str, agent_name: &str) -> bool {
    if candidate.content.trim().is_empty() {
        return false;
    }

    // Noise threshold: casual one-off content does not persist.
    if candidate.importance < NOISE_IMPORTANCE_FLOOR {
        debug!(
            "[memory:extraction] Dropping low-importance candidate ({}): {}",
            candidate.importance, candidate.content
        );
        return false;
    }

    // A `fact` that names the agent but not the subject is the agent
    // describing itself. The store is about the subject.
    if candidate.memory_type == MemoryType::Fact {
        let mentions_agent = candidate.content.contains(agent_name);
        let mentions_subject = candidate.content.contains(subject_name);
        if mentions_agent && !mentions_subject {
            debug!(
                "[memory:extraction] Dropping agent self-fact: {}",
                candidate.content
            );
            return false;
        }
    }

    true
}

// ── Prompts ────────────────────────────────────────────────────────────────

fn turn_prompt(
    user_message: &str,
    agent_message: &str,
    subject_name: &str,
    agent_name: &str,
) -> String {
    format!(
        r#"You are a memory extraction assistant. Analyze the following exchange and extract concrete, useful information about BOTH participants.

# Input
{subject}: {user_message}
{agent}: {agent_message}

# Core rules
1. Record information about both {subject} and {agent}.
2. Use real names — never "the user" or "the AI". Write {subject} and {agent}.
3. Attribute correctly: whoever did the thing is the name you write.
4. Never invent. Only record what the exchange explicitly states.

# What is worth remembering
- Basics: occupation, where they live, schedule, health.
- Habits, interests, likes and dislikes.
- Significant experiences, plans, promises.
- Personality, speech habits, behavioral patterns (prefer observations about {subject} over {agent} describing itself).
- Relationship state and expectations between the two.

# What is NOT worth remembering
- Small talk, greetings, vague one-off moods.
- Pure conversational mechanics ("asked about...", "said that...").
- Anything the exchange did not actually say.

# Memory types
- "fact": basics, habits, appearance, personality impressions
- "preference": explicit likes and dislikes
- "event": significant experiences, plans, shared moments
- "emotion": notable emotional states with a concrete cause
- "relationship": how the two relate, expectations, how to treat each other

# Importance (1-10)
- 7-10: durable, defining information (job, home, schedule, core likes, major plans)
- 4-6: ordinary information (casual likes, day-to-day activity, requests)
- 1-3: minor detail (throwaway plans, trivia)

# Output (strict JSON, fenced)
```json
{{
  "memories": [
    {{"type": "fact | event | preference | emotion | relationship", "content": "specific, attributed description", "importance": 7, "tags": ["topic"]}}
  ],
  "summary": "one line on what this turn revealed (empty string if nothing new)"
}}
```

Example — useful information:
{subject}: "I'm free every evening after 8"
```json
{{"memories": [{{"type": "fact", "content": "{subject} is free every evening after 8pm", "importance": 7, "tags": ["schedule"]}}], "summary": "{subject} is free evenings after 8"}}
```

Example — nothing useful:
{subject}: "ok, sounds good"
```json
{{"memories": [], "summary": ""}}
```

Now analyze the exchange and output the JSON:"#,
        subject = subject_name,
        agent = agent_name,
        user_message = user_message,
        agent_message = agent_message,
    )
}

fn initial_prompt(subject_description: &str) -> String {
    format!(
        r#"You are a memory extraction assistant. Analyze this character/subject description and extract initial memories about the user.

Description:
{description}

Notes on format:
- {{{{user}}}} stands for the user; {{{{char}}}} stands for the companion character.
- Extract only information about {{{{user}}}}: basics, preferences, their relationship with the character, other significant details.
- Only what the description explicitly states. No guessing, no invention.
- If the description says nothing about the user, return an empty array.

Return a fenced JSON array:
```json
[
  {{"type": "fact | event | preference | emotion | relationship", "content": "description (write 'the user' instead of {{{{user}}}})", "importance": 7, "tags": ["topic"]}}
]
```"#,
        description = subject_description,
    )
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::error::{MemoryError, MemoryResult};
    use crate::atoms::types::CompletionResponse;
    use crate::engine::persistence::InMemorySnapshotStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Scripted completion stub: pops one canned reply per call.
    struct StubClient {
        replies: Mutex<VecDeque<MemoryResult<CompletionResponse>>>,
    }

    impl StubClient {
        fn new(replies: Vec<MemoryResult<CompletionResponse>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into_iter().collect()) })
        }

        fn replying(content: &str) -> Arc<Self> {
            Self::new(vec![Ok(CompletionResponse { content: content.to_string() })])
        }

        fn failing() -> Arc<Self> {
            Self::new(vec![Err(MemoryError::completion("stub", "provider down"))])
        }
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(
            &self,
            _messages: &[crate::atoms::types::CompletionMessage],
            _options: &CompletionOptions,
        ) -> MemoryResult<CompletionResponse> {
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(MemoryError::completion("stub", "script exhausted")))
        }
    }

    fn fresh_store() -> Mutex<MemoryStore> {
        Mutex::new(MemoryStore::open("subject", Arc::new(InMemorySnapshotStore::new())))
    }

    fn fenced(json: &str) -> String {
        format!("Here is the result:\n```json\n{}\n```", json)
    }

    #[tokio::test]
    async fn test_noise_threshold_drops_importance_four() {
        let reply = fenced(
            r#"{"memories": [{"type": "fact", "content": "Ann mentioned the weather", "importance": 4, "tags": []}], "summary": "small talk"}"#,
        );
        let pipeline = ExtractionPipeline::new(StubClient::replying(&reply));
        let store = fresh_store();
        let result = pipeline
            .extract_from_turn(&store, "hi", "hello", "Ann", "Mio")
            .await;
        assert!(result.memories.is_empty());
        assert!(store.lock().is_empty());
        // The summary still comes through even when no memory survives.
        assert_eq!(result.summary, "small talk");
    }

    #[tokio::test]
    async fn test_noise_threshold_keeps_importance_five() {
        let reply = fenced(
            r#"{"memories": [{"type": "fact", "content": "Ann works night shifts", "importance": 5, "tags": ["schedule"]}], "summary": ""}"#,
        );
        let pipeline = ExtractionPipeline::new(StubClient::replying(&reply));
        let store = fresh_store();
        let result = pipeline
            .extract_from_turn(&store, "...", "...", "Ann", "Mio")
            .await;
        assert_eq!(result.memories.len(), 1);
        assert_eq!(store.lock().len(), 1);
        assert_eq!(result.memories[0].content, "Ann works night shifts");
    }

    #[tokio::test]
    async fn test_agent_self_fact_dropped() {
        let reply = fenced(
            r#"{"memories": [
                {"type": "fact", "content": "Mio has a blunt speaking style", "importance": 6, "tags": []},
                {"type": "fact", "content": "Mio thinks Ann is kind", "importance": 6, "tags": []}
            ], "summary": ""}"#,
        );
        let pipeline = ExtractionPipeline::new(StubClient::replying(&reply));
        let store = fresh_store();
        let result = pipeline
            .extract_from_turn(&store, "...", "...", "Ann", "Mio")
            .await;
        // Only the fact that also mentions the subject survives.
        assert_eq!(result.memories.len(), 1);
        assert!(result.memories[0].content.contains("Ann"));
    }

    #[tokio::test]
    async fn test_non_fact_agent_memory_kept() {
        // The self-reference filter only applies to `fact` candidates.
        let reply = fenced(
            r#"{"memories": [{"type": "relationship", "content": "Mio cares about making Ann laugh", "importance": 6, "tags": []}], "summary": ""}"#,
        );
        let pipeline = ExtractionPipeline::new(StubClient::replying(&reply));
        let store = fresh_store();
        let result = pipeline
            .extract_from_turn(&store, "...", "...", "Ann", "Mio")
            .await;
        assert_eq!(result.memories.len(), 1);
    }

    #[tokio::test]
    async fn test_completion_failure_is_soft() {
        let pipeline = ExtractionPipeline::new(StubClient::failing());
        let store = fresh_store();
        let result = pipeline
            .extract_from_turn(&store, "hi", "hello", "Ann", "Mio")
            .await;
        assert!(result.memories.is_empty());
        assert!(result.summary.is_empty());
        assert!(store.lock().is_empty());
    }

    #[tokio::test]
    async fn test_missing_fence_is_soft() {
        let pipeline = ExtractionPipeline::new(StubClient::replying("I could not comply."));
        let store = fresh_store();
        let result = pipeline
            .extract_from_turn(&store, "hi", "hello", "Ann", "Mio")
            .await;
        assert!(result.memories.is_empty());
        assert!(store.lock().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_soft() {
        let pipeline =
            ExtractionPipeline::new(StubClient::replying("```json\n{\"memories\": [{]}\n```"));
        let store = fresh_store();
        let result = pipeline
            .extract_from_turn(&store, "hi", "hello", "Ann", "Mio")
            .await;
        assert!(result.memories.is_empty());
    }

    #[tokio::test]
    async fn test_initial_extraction_runs_once() {
        let reply = fenced(
            r#"[{"type": "fact", "content": "the user lives in Hangzhou", "importance": 7, "tags": ["home"]}]"#,
        );
        let client = StubClient::new(vec![
            Ok(CompletionResponse { content: reply.clone() }),
            Ok(CompletionResponse { content: reply }),
        ]);
        let pipeline = ExtractionPipeline::new(client);
        let store = fresh_store();

        let first = pipeline.extract_initial(&store, "long description").await;
        assert_eq!(first, 1);
        assert!(store.lock().initial_extracted());
        // Tagged as seed memories.
        let seeded = store.lock().search(&Default::default());
        assert!(seeded[0].tags.contains(&"seed".to_string()));

        let second = pipeline.extract_initial(&store, "long description").await;
        assert_eq!(second, 0, "seed extraction must be one-time");
        assert_eq!(store.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_initial_extraction_empty_description_sets_flag() {
        let pipeline = ExtractionPipeline::new(StubClient::new(vec![]));
        let store = fresh_store();
        let added = pipeline.extract_initial(&store, "   ").await;
        assert_eq!(added, 0);
        assert!(store.lock().initial_extracted());
    }

    #[tokio::test]
    async fn test_initial_extraction_failure_leaves_flag_unset() {
        let pipeline = ExtractionPipeline::new(StubClient::failing());
        let store = fresh_store();
        pipeline.extract_initial(&store, "description").await;
        assert!(!store.lock().initial_extracted(), "failed seed run must stay retryable");
    }
}
