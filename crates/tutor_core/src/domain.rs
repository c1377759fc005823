//! crates/tutor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the assessment orchestrator.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The role of a single message inside a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

/// One turn of conversation stored inside a `ChatSession`.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_audio: bool,
    pub audio_ref: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            is_audio: false,
            audio_ref: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            is_audio: false,
            audio_ref: None,
        }
    }
}

/// Per-session progress metadata.
///
/// `answered_questions` is the source of truth for "has this question been
/// asked of this user before". Invariants: no duplicate ids, and
/// `earned_marks <= total_marks`.
#[derive(Debug, Clone, Default)]
pub struct SessionMetadata {
    pub answered_questions: Vec<Uuid>,
    pub total_marks: u32,
    pub earned_marks: u32,
    pub last_question_asked: Option<Uuid>,
    pub last_active: Option<DateTime<Utc>>,
}

impl SessionMetadata {
    /// Counts a scored question into the running totals.
    ///
    /// Idempotent per question id: replaying the same question's score a
    /// second time leaves the totals unchanged. Awarded marks are clamped to
    /// `max_marks` so the `earned <= total` invariant holds even if the model
    /// over-awarded. Returns `true` when the id was newly counted.
    pub fn record_score(&mut self, question_id: Uuid, awarded_marks: u32, max_marks: u32) -> bool {
        if self.answered_questions.contains(&question_id) {
            return false;
        }
        self.answered_questions.push(question_id);
        self.total_marks += max_marks;
        self.earned_marks += awarded_marks.min(max_marks);
        true
    }

    pub fn has_answered(&self, question_id: Uuid) -> bool {
        self.answered_questions.contains(&question_id)
    }
}

/// A lazily-created conversation between one user and one chapter.
///
/// `chapter_id` is `None` for general (non-chapter) chat. Identified by the
/// `(user_id, chapter_id)` pair; mutated only by the progress persister.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub messages: Vec<ChatMessage>,
    pub metadata: SessionMetadata,
    pub created_at: DateTime<Utc>,
}

/// A gradable question owned by a chapter, read-only to the orchestrator.
#[derive(Debug, Clone)]
pub struct QuestionRecord {
    pub id: Uuid,
    pub text: String,
    pub max_marks: u32,
    pub ordinal: u32,
}

/// Completion state of a score attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Complete,
    Partial,
    Abandoned,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Complete => "complete",
            CompletionStatus::Partial => "partial",
            CompletionStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(CompletionStatus::Complete),
            "partial" => Some(CompletionStatus::Partial),
            "abandoned" => Some(CompletionStatus::Abandoned),
            _ => None,
        }
    }
}

/// Audit-friendly rollup of one scored pass through a chapter's question
/// bank. Derived from session metadata and must reconcile to the same totals.
#[derive(Debug, Clone)]
pub struct ScoreAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chapter_id: Uuid,
    pub attempt_type: String,
    pub total_marks_obtained: u32,
    pub total_question_marks: u32,
    pub questions_answered: u32,
    pub total_questions: u32,
    pub completion_status: CompletionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The default attempt type for conversational assessment.
pub const CHAT_ATTEMPT_TYPE: &str = "chat";

impl ScoreAttempt {
    /// Recomputes the completion status from the answered/total counters.
    /// An attempt is complete exactly when every question has been answered.
    pub fn recompute_status(&mut self) {
        self.completion_status = if self.questions_answered >= self.total_questions {
            CompletionStatus::Complete
        } else {
            CompletionStatus::Partial
        };
    }
}

/// Chapter and book framing passed to the prompt composer. Every field is
/// optional; missing values degrade to generic placeholders.
#[derive(Debug, Clone, Default)]
pub struct ChapterContext {
    pub grade: Option<String>,
    pub subject: Option<String>,
    pub chapter_title: Option<String>,
}

/// Classification of a user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// The user is answering a question or asking to be assessed.
    Assessment,
    /// The user is raising a doubt or asking for an explanation.
    Explain,
}

/// The awarded/maximum mark pair for a question scored this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreInfo {
    pub awarded_marks: u32,
    pub max_marks: u32,
}

/// What the orchestrator hands back to the caller after a turn.
#[derive(Debug, Clone)]
pub struct TurnReply {
    pub session_id: Uuid,
    pub reply_text: String,
    pub score: Option<ScoreInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_score_counts_a_new_question_once() {
        let mut meta = SessionMetadata::default();
        let q1 = Uuid::new_v4();

        assert!(meta.record_score(q1, 2, 3));
        assert_eq!(meta.answered_questions, vec![q1]);
        assert_eq!(meta.earned_marks, 2);
        assert_eq!(meta.total_marks, 3);
    }

    #[test]
    fn record_score_is_idempotent_per_question_id() {
        let mut meta = SessionMetadata::default();
        let q1 = Uuid::new_v4();

        assert!(meta.record_score(q1, 2, 3));
        assert!(!meta.record_score(q1, 3, 3));

        assert_eq!(meta.answered_questions.len(), 1);
        assert_eq!(meta.earned_marks, 2);
        assert_eq!(meta.total_marks, 3);
    }

    #[test]
    fn record_score_clamps_awarded_to_max() {
        let mut meta = SessionMetadata::default();
        meta.record_score(Uuid::new_v4(), 7, 3);
        assert_eq!(meta.earned_marks, 3);
        assert_eq!(meta.total_marks, 3);
        assert!(meta.earned_marks <= meta.total_marks);
    }

    #[test]
    fn earned_never_exceeds_total_across_many_questions() {
        let mut meta = SessionMetadata::default();
        for i in 0..20u32 {
            meta.record_score(Uuid::new_v4(), i, 5);
        }
        assert!(meta.earned_marks <= meta.total_marks);
        assert_eq!(meta.answered_questions.len(), 20);
    }

    #[test]
    fn attempt_is_complete_only_when_all_questions_answered() {
        let mut attempt = ScoreAttempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            chapter_id: Uuid::new_v4(),
            attempt_type: CHAT_ATTEMPT_TYPE.to_string(),
            total_marks_obtained: 2,
            total_question_marks: 5,
            questions_answered: 1,
            total_questions: 2,
            completion_status: CompletionStatus::Partial,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        attempt.recompute_status();
        assert_eq!(attempt.completion_status, CompletionStatus::Partial);

        attempt.questions_answered = 2;
        attempt.recompute_status();
        assert_eq!(attempt.completion_status, CompletionStatus::Complete);
    }
}
