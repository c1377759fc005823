//! services/api/src/web/protocol.rs
//!
//! Defines the request and response payloads exchanged between clients and
//! the chat endpoints.

use serde::{Deserialize, Serialize};
use tutor_core::domain::{ScoreAttempt, ScoreInfo, TurnReply};
use utoipa::ToSchema;
use uuid::Uuid;

/// One chat turn from the client. `chapter_id` is omitted for general chat.
#[derive(Deserialize, Debug, ToSchema)]
pub struct ChatTurnRequest {
    pub chapter_id: Option<Uuid>,
    pub message: String,
}

/// The awarded/maximum pair for a question scored this turn.
#[derive(Serialize, Debug, ToSchema)]
pub struct ScorePayload {
    pub awarded_marks: u32,
    pub max_marks: u32,
}

impl From<ScoreInfo> for ScorePayload {
    fn from(info: ScoreInfo) -> Self {
        Self {
            awarded_marks: info.awarded_marks,
            max_marks: info.max_marks,
        }
    }
}

/// The assistant's reply for one turn, plus score info when a question was
/// assessed.
#[derive(Serialize, Debug, ToSchema)]
pub struct ChatTurnResponse {
    pub session_id: Uuid,
    pub reply: String,
    pub score: Option<ScorePayload>,
}

impl From<TurnReply> for ChatTurnResponse {
    fn from(reply: TurnReply) -> Self {
        Self {
            session_id: reply.session_id,
            reply: reply.reply_text,
            score: reply.score.map(ScorePayload::from),
        }
    }
}

/// The caller's latest score-attempt rollup for a chapter.
#[derive(Serialize, Debug, ToSchema)]
pub struct ProgressResponse {
    pub attempt_id: Uuid,
    pub total_marks_obtained: u32,
    pub total_question_marks: u32,
    pub questions_answered: u32,
    pub total_questions: u32,
    pub completion_status: String,
}

impl From<ScoreAttempt> for ProgressResponse {
    fn from(attempt: ScoreAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            total_marks_obtained: attempt.total_marks_obtained,
            total_question_marks: attempt.total_question_marks,
            questions_answered: attempt.questions_answered,
            total_questions: attempt.total_questions,
            completion_status: attempt.completion_status.as_str().to_string(),
        }
    }
}
