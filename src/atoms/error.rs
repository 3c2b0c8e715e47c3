// ── Memory Atoms: Error Types ──────────────────────────────────────────────
// Single canonical error enum for the memory engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (Validation, Completion, …).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • Extraction and summarization failures are NOT variants here: those paths
//     are absorbed locally (logged, empty result returned) so a failed memory
//     write can never degrade the visible conversation.
//   • No variant carries secret material (API keys) in its message.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Caller supplied invalid input to a synchronous API (e.g. empty content).
    /// Surfaced immediately; the store is not mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Completion-service HTTP or API-level failure (non-secret detail only).
    #[error("Completion error: {provider}: {message}")]
    Completion { provider: String, message: String },

    /// Snapshot load/save failure in the persistence adapter.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Client or store configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl MemoryError {
    /// Create a completion-service error with provider name and message.
    pub fn completion(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Completion { provider: provider.into(), message: message.into() }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All fallible memory operations return this type.
pub type MemoryResult<T> = Result<T, MemoryError>;
