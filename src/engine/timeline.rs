// ── Memory Engine: Timeline Summarizer ─────────────────────────────────────
//
// Compresses a long message history into a chronological, human-readable
// event list — one line per event: `[startTime-endTime] description`.
//
// Histories over 100 messages are split into sequential batches of ≤100,
// each summarized independently with a short pause between completion
// calls; the event lines are concatenated in input order. Adjacent events
// are NOT merged across batch boundaries, so a seam at multiples of 100
// messages is expected output, not a bug.
//
// This is typically awaited directly by a UI action, so it never returns an
// error: any failure yields a displayable "summary generation failed: …"
// string instead.

use crate::atoms::types::{
    CallSpeaker, ChatMessage, CompletionMessage, CompletionOptions, MessageDirection,
    TimelineEvent,
};
use crate::engine::completion::CompletionClient;
use crate::engine::response::parse_fenced;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

// ── Constants ──────────────────────────────────────────────────────────────

/// Histories longer than this are summarized in sequential batches.
const BATCH_SIZE: usize = 100;

/// Pause between batched completion calls, to avoid rate bursts.
const BATCH_PAUSE: Duration = Duration::from_secs(1);

const TIMELINE_TEMPERATURE: f64 = 0.3;
const TIMELINE_MAX_TOKENS: u32 = 4000;

// ── Summarizer ─────────────────────────────────────────────────────────────

pub struct TimelineSummarizer {
    client: Arc<dyn CompletionClient>,
    batch_pause: Duration,
}

impl TimelineSummarizer {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client, batch_pause: BATCH_PAUSE }
    }

    /// Override the inter-batch pause (tests use `Duration::ZERO`).
    pub fn with_batch_pause(client: Arc<dyn CompletionClient>, batch_pause: Duration) -> Self {
        Self { client, batch_pause }
    }

    /// Summarize a message history into timeline text.
    pub async fn summarize(
        &self,
        messages: &[ChatMessage],
        subject_name: &str,
        agent_name: &str,
    ) -> String {
        if messages.is_empty() {
            return String::new();
        }

        info!(
            "[memory:timeline] Summarizing {} messages for {}",
            messages.len(),
            subject_name
        );

        if messages.len() > BATCH_SIZE {
            return self.summarize_batched(messages, subject_name, agent_name).await;
        }

        let prompt = single_prompt(messages, subject_name, agent_name);
        match self.request_events(&prompt).await {
            Ok(events) => render_events(&events),
            Err(reason) => failure_text(&reason),
        }
    }

    async fn summarize_batched(
        &self,
        messages: &[ChatMessage],
        subject_name: &str,
        agent_name: &str,
    ) -> String {
        let batches: Vec<&[ChatMessage]> = messages.chunks(BATCH_SIZE).collect();
        let total = batches.len();
        let mut all_events: Vec<TimelineEvent> = Vec::new();

        for (i, batch) in batches.into_iter().enumerate() {
            info!(
                "[memory:timeline] Batch {}/{} ({} messages)",
                i + 1,
                total,
                batch.len()
            );
            let prompt = batch_prompt(batch, subject_name, agent_name);
            match self.request_events(&prompt).await {
                Ok(mut events) => all_events.append(&mut events),
                // A failed batch contributes no events; the rest of the
                // timeline still renders.
                Err(reason) => warn!(
                    "[memory:timeline] Batch {}/{} failed: {}",
                    i + 1,
                    total,
                    reason
                ),
            }
            if i + 1 < total && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        info!("[memory:timeline] {} events across {} batches", all_events.len(), total);
        render_events(&all_events)
    }

    /// One completion round trip, parsed strictly into timeline events.
    async fn request_events(&self, prompt: &str) -> Result<Vec<TimelineEvent>, String> {
        let options = CompletionOptions {
            temperature: TIMELINE_TEMPERATURE,
            max_tokens: TIMELINE_MAX_TOKENS,
        };
        let response = self
            .client
            .complete(&[CompletionMessage::user(prompt.to_string())], &options)
            .await
            .map_err(|e| e.to_string())?;

        match parse_fenced::<Vec<TimelineEvent>>(&response.content) {
            Ok(Some(events)) => Ok(events),
            Ok(None) => Err("no JSON block in completion response".to_string()),
            Err(e) => Err(format!("malformed timeline payload: {}", e)),
        }
    }
}

// ── Rendering ──────────────────────────────────────────────────────────────

fn render_events(events: &[TimelineEvent]) -> String {
    events
        .iter()
        .map(|e| format!("[{}-{}] {}", e.start_time, e.end_time, e.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn failure_text(reason: &str) -> String {
    format!("summary generation failed: {}", reason)
}

// ── Message formatting ─────────────────────────────────────────────────────

/// Render one message for the prompt: `N. [MM/DD HH:mm] sender: content`.
///
/// Two special shapes are translated: embedded call records are expanded
/// with duration and per-speaker lines, and offline/narrative-mode messages
/// get a prefix tag. Everything else passes through as-is.
fn format_message(
    index: usize,
    message: &ChatMessage,
    subject_name: &str,
    agent_name: &str,
) -> String {
    use chrono::TimeZone;
    let time = chrono::Local
        .timestamp_millis_opt(message.timestamp)
        .single()
        .map(|t| t.format("%m/%d %H:%M").to_string())
        .unwrap_or_else(|| "??/?? ??:??".to_string());

    let sender = match message.direction {
        MessageDirection::Sent => subject_name,
        MessageDirection::Received => agent_name,
    };

    let mut content = match &message.call_record {
        Some(call) => {
            let lines: Vec<String> = call
                .lines
                .iter()
                .map(|line| {
                    let speaker = match line.speaker {
                        CallSpeaker::User => subject_name,
                        CallSpeaker::Agent => agent_name,
                        CallSpeaker::Narrator => "narrator",
                    };
                    format!("  {}: {}", speaker, line.content)
                })
                .collect();
            format!("[voice call {}min]\n{}", call.duration_secs / 60, lines.join("\n"))
        }
        None => message.content.clone(),
    };

    if message.offline_scene {
        content = format!("[offline scene] {}", content);
    }

    format!("{}. [{}] {}: {}", index + 1, time, sender, content)
}

fn format_history(messages: &[ChatMessage], subject_name: &str, agent_name: &str) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| format_message(i, m, subject_name, agent_name))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Prompts ────────────────────────────────────────────────────────────────

fn single_prompt(messages: &[ChatMessage], subject_name: &str, agent_name: &str) -> String {
    format!(
        r#"You are a timeline assistant. Analyze this chat history between {subject} and {agent} and produce a human-readable "what happened between us" timeline.

Chat history:
{history}

Rules:
- Summarize the whole history in 3-10 events.
- Each event is 30-80 characters: rough time range, what was discussed, the mood, the outcome.
- Ordinary chit-chat may be merged into one summarizing event.

Output a fenced JSON array, each item shaped:
{{"startTime":"MM/DD HH:mm","endTime":"MM/DD HH:mm","description":"concrete event description"}}

If truly nothing noteworthy happened in the whole history, an empty array [] is a perfectly good answer."#,
        subject = subject_name,
        agent = agent_name,
        history = format_history(messages, subject_name, agent_name),
    )
}

fn batch_prompt(messages: &[ChatMessage], subject_name: &str, agent_name: &str) -> String {
    format!(
        r#"You are a timeline assistant. Analyze this chat history between {subject} and {agent} and extract only the genuinely significant events.

Chat history:
{history}

What counts as significant:
- Relationship shifts (confessions, fights, reconciliation)
- Important decisions and plans
- Emotional peaks (big arguments, deep confiding)
- Special activities (calls, meeting offline, doing something together)
- Turning points (changed attitudes, opening up, discoveries)

What does NOT count: greetings, chit-chat, routine back-and-forth.

Output rules:
- At most 1-3 events for this batch.
- Each event 50-80 characters with the concrete content, emotion, and outcome.
- Prefer recording too little over producing a play-by-play.
- If the whole batch is ordinary chatting, return an empty array.

Output a fenced JSON array:
```json
[{{"startTime":"MM/DD HH:mm","endTime":"MM/DD HH:mm","description":"detailed description"}}]
```"#,
        subject = subject_name,
        agent = agent_name,
        history = format_history(messages, subject_name, agent_name),
    )
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════
