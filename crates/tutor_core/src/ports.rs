//! crates/tutor_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the orchestrator's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or LLM providers.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    ChapterContext, ChatMessage, ChatSession, QuestionRecord, ScoreAttempt,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// The variants mirror the turn-level failure taxonomy: data-integrity
/// failures (`NotFound`) are fatal and never retried, upstream-model failures
/// split into `Timeout` (the hard wall-clock budget fired) and `Upstream`
/// (transport or malformed-response errors that survived the retry loop), and
/// `Unexpected` is the catch-all for everything else.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Operation timed out: {0}")]
    Timeout(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Turn Persistence Payloads
//=========================================================================================

/// The awarded/maximum pair for the question scored this turn.
#[derive(Debug, Clone, Copy)]
pub struct ScoredQuestion {
    pub question_id: Uuid,
    pub awarded_marks: u32,
    pub max_marks: u32,
}

/// Everything the progress persister applies at the end of one turn.
///
/// Messages are appended unconditionally; the score update is idempotent per
/// question id (see `SessionMetadata::record_score`).
#[derive(Debug, Clone, Default)]
pub struct TurnUpdate {
    pub messages: Vec<ChatMessage>,
    pub scored: Option<ScoredQuestion>,
    pub last_question_asked: Option<Uuid>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches the session for `(user_id, chapter_id)`, creating it empty on
    /// first use. `chapter_id` is `None` for general chat.
    async fn get_or_create_session(
        &self,
        user_id: Uuid,
        chapter_id: Option<Uuid>,
    ) -> PortResult<ChatSession>;

    /// Applies one completed turn to the session and returns the updated
    /// session. Must be atomic with respect to other writers of the same row.
    async fn persist_turn(&self, session_id: Uuid, update: TurnUpdate)
        -> PortResult<ChatSession>;
}

#[async_trait]
pub trait ScoreLedger: Send + Sync {
    /// Returns the most recently created attempt for this user and chapter,
    /// or `None` when no attempt has been opened yet.
    async fn latest_attempt(
        &self,
        user_id: Uuid,
        chapter_id: Uuid,
    ) -> PortResult<Option<ScoreAttempt>>;

    /// Opens a fresh attempt covering the chapter's full question bank.
    async fn open_attempt(
        &self,
        user_id: Uuid,
        chapter_id: Uuid,
        total_questions: u32,
        total_question_marks: u32,
    ) -> PortResult<ScoreAttempt>;

    /// Applies one scored question to an attempt. Counters only move when
    /// `newly_answered` is set; the completion status is recomputed either way.
    async fn apply_score(
        &self,
        attempt_id: Uuid,
        awarded_marks: u32,
        max_marks: u32,
        newly_answered: bool,
    ) -> PortResult<ScoreAttempt>;
}

#[async_trait]
pub trait ChapterStore: Send + Sync {
    /// Returns the grade/subject/title framing for a chapter, joined from the
    /// owning book. Fails with `NotFound` when the chapter does not exist.
    async fn get_context(&self, chapter_id: Uuid) -> PortResult<ChapterContext>;

    /// Returns the chapter's question bank in ordinal order. An empty vec is
    /// a valid answer (the caller falls back to a generic prompt).
    async fn get_questions(&self, chapter_id: Uuid) -> PortResult<Vec<QuestionRecord>>;
}

//=========================================================================================
// Completion Gateway
//=========================================================================================

/// Selects the timeout budget and retry policy for a completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// Interactive chat turn: retried with backoff under the chat budget.
    Chat,
    /// Intent classification: a single best-effort attempt, never retried.
    Intent,
    /// Long-form text processing: retried under the larger bulk budget.
    BulkText,
}

/// One request to the LLM completion backend.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub history: Vec<ChatMessage>,
    pub user_message: String,
    pub temperature: f32,
    pub kind: CompletionKind,
}

#[async_trait]
pub trait CompletionGateway: Send + Sync {
    /// Runs a completion and returns the model's reply text. Implementations
    /// own the retry loop and the hard wall-clock timeout; exhausted retries
    /// surface as `PortError::Upstream` and an elapsed budget as
    /// `PortError::Timeout`.
    async fn complete(&self, request: CompletionRequest) -> PortResult<String>;

    /// Transcribes raw audio into text.
    async fn transcribe(&self, audio_data: &[u8]) -> PortResult<String>;
}
