//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `SessionStore`, `ScoreLedger`, and `ChapterStore`
//! ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tutor_core::domain::{
    ChapterContext, ChatMessage, ChatSession, CompletionStatus, MessageRole, QuestionRecord,
    ScoreAttempt, SessionMetadata, CHAT_ATTEMPT_TYPE,
};
use tutor_core::ports::{
    ChapterStore, PortError, PortResult, ScoreLedger, SessionStore, TurnUpdate,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn load_session(&self, session_id: Uuid) -> PortResult<ChatSession> {
        let row = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, chapter_id, answered_questions, total_marks, earned_marks, \
             last_question_asked, created_at, last_active FROM chat_sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        let messages = sqlx::query_as::<_, MessageRecord>(
            "SELECT role, content, is_audio, audio_ref, created_at \
             FROM chat_messages WHERE session_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        row.to_domain(messages)
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    chapter_id: Option<Uuid>,
    answered_questions: Vec<Uuid>,
    total_marks: i32,
    earned_marks: i32,
    last_question_asked: Option<Uuid>,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl SessionRecord {
    fn metadata(&self) -> SessionMetadata {
        SessionMetadata {
            answered_questions: self.answered_questions.clone(),
            total_marks: self.total_marks.max(0) as u32,
            earned_marks: self.earned_marks.max(0) as u32,
            last_question_asked: self.last_question_asked,
            last_active: Some(self.last_active),
        }
    }

    fn to_domain(self, messages: Vec<MessageRecord>) -> PortResult<ChatSession> {
        let metadata = self.metadata();
        let messages = messages
            .into_iter()
            .map(MessageRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        Ok(ChatSession {
            id: self.id,
            user_id: self.user_id,
            chapter_id: self.chapter_id,
            messages,
            metadata,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    role: String,
    content: String,
    is_audio: bool,
    audio_ref: Option<String>,
    created_at: DateTime<Utc>,
}

impl MessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        let role = MessageRole::parse(&self.role)
            .ok_or_else(|| PortError::Unexpected(format!("Unknown message role '{}'", self.role)))?;
        Ok(ChatMessage {
            role,
            content: self.content,
            timestamp: self.created_at,
            is_audio: self.is_audio,
            audio_ref: self.audio_ref,
        })
    }
}

#[derive(FromRow)]
struct AttemptRecord {
    id: Uuid,
    user_id: Uuid,
    chapter_id: Uuid,
    attempt_type: String,
    total_marks_obtained: i32,
    total_question_marks: i32,
    questions_answered: i32,
    total_questions: i32,
    completion_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AttemptRecord {
    fn to_domain(self) -> PortResult<ScoreAttempt> {
        let completion_status = CompletionStatus::parse(&self.completion_status).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Unknown completion status '{}'",
                self.completion_status
            ))
        })?;
        Ok(ScoreAttempt {
            id: self.id,
            user_id: self.user_id,
            chapter_id: self.chapter_id,
            attempt_type: self.attempt_type,
            total_marks_obtained: self.total_marks_obtained.max(0) as u32,
            total_question_marks: self.total_question_marks.max(0) as u32,
            questions_answered: self.questions_answered.max(0) as u32,
            total_questions: self.total_questions.max(0) as u32,
            completion_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    question_text: String,
    max_marks: i32,
    ordinal: i32,
}

impl QuestionRow {
    fn to_domain(self) -> QuestionRecord {
        QuestionRecord {
            id: self.id,
            text: self.question_text,
            max_marks: self.max_marks.max(0) as u32,
            ordinal: self.ordinal.max(0) as u32,
        }
    }
}

#[derive(FromRow)]
struct ContextRow {
    chapter_title: String,
    grade: Option<String>,
    subject: Option<String>,
}

const ATTEMPT_COLUMNS: &str = "id, user_id, chapter_id, attempt_type, total_marks_obtained, \
     total_question_marks, questions_answered, total_questions, completion_status, \
     created_at, updated_at";

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for DbAdapter {
    async fn get_or_create_session(
        &self,
        user_id: Uuid,
        chapter_id: Option<Uuid>,
    ) -> PortResult<ChatSession> {
        let existing = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, chapter_id, answered_questions, total_marks, earned_marks, \
             last_question_asked, created_at, last_active FROM chat_sessions \
             WHERE user_id = $1 AND chapter_id IS NOT DISTINCT FROM $2",
        )
        .bind(user_id)
        .bind(chapter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if let Some(row) = existing {
            return self.load_session(row.id).await;
        }

        let row = sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO chat_sessions (id, user_id, chapter_id) VALUES ($1, $2, $3) \
             RETURNING id, user_id, chapter_id, answered_questions, total_marks, earned_marks, \
             last_question_asked, created_at, last_active",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(chapter_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        row.to_domain(Vec::new())
    }

    async fn persist_turn(
        &self,
        session_id: Uuid,
        update: TurnUpdate,
    ) -> PortResult<ChatSession> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let row = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, chapter_id, answered_questions, total_marks, earned_marks, \
             last_question_asked, created_at, last_active FROM chat_sessions \
             WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        let mut metadata = row.metadata();
        if let Some(scored) = update.scored {
            metadata.record_score(scored.question_id, scored.awarded_marks, scored.max_marks);
        }
        if update.last_question_asked.is_some() {
            metadata.last_question_asked = update.last_question_asked;
        }

        let now = Utc::now();
        sqlx::query(
            "UPDATE chat_sessions SET answered_questions = $1, total_marks = $2, \
             earned_marks = $3, last_question_asked = $4, last_active = $5 WHERE id = $6",
        )
        .bind(&metadata.answered_questions)
        .bind(metadata.total_marks as i32)
        .bind(metadata.earned_marks as i32)
        .bind(metadata.last_question_asked)
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        for message in &update.messages {
            sqlx::query(
                "INSERT INTO chat_messages (id, session_id, role, content, is_audio, audio_ref, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(message.is_audio)
            .bind(&message.audio_ref)
            .bind(message.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.load_session(session_id).await
    }
}

//=========================================================================================
// `ScoreLedger` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScoreLedger for DbAdapter {
    async fn latest_attempt(
        &self,
        user_id: Uuid,
        chapter_id: Uuid,
    ) -> PortResult<Option<ScoreAttempt>> {
        let row = sqlx::query_as::<_, AttemptRecord>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM score_attempts \
             WHERE user_id = $1 AND chapter_id = $2 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(chapter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        row.map(AttemptRecord::to_domain).transpose()
    }

    async fn open_attempt(
        &self,
        user_id: Uuid,
        chapter_id: Uuid,
        total_questions: u32,
        total_question_marks: u32,
    ) -> PortResult<ScoreAttempt> {
        let row = sqlx::query_as::<_, AttemptRecord>(&format!(
            "INSERT INTO score_attempts (id, user_id, chapter_id, attempt_type, \
             total_questions, total_question_marks) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {ATTEMPT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(chapter_id)
        .bind(CHAT_ATTEMPT_TYPE)
        .bind(total_questions as i32)
        .bind(total_question_marks as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        row.to_domain()
    }

    async fn apply_score(
        &self,
        attempt_id: Uuid,
        awarded_marks: u32,
        max_marks: u32,
        newly_answered: bool,
    ) -> PortResult<ScoreAttempt> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let row = sqlx::query_as::<_, AttemptRecord>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM score_attempts WHERE id = $1 FOR UPDATE"
        ))
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("Attempt {} not found", attempt_id)))?;

        let mut attempt = row.to_domain()?;
        if newly_answered {
            attempt.total_marks_obtained += awarded_marks.min(max_marks);
            attempt.questions_answered += 1;
        }
        attempt.recompute_status();
        attempt.updated_at = Utc::now();

        sqlx::query(
            "UPDATE score_attempts SET total_marks_obtained = $1, questions_answered = $2, \
             completion_status = $3, updated_at = $4 WHERE id = $5",
        )
        .bind(attempt.total_marks_obtained as i32)
        .bind(attempt.questions_answered as i32)
        .bind(attempt.completion_status.as_str())
        .bind(attempt.updated_at)
        .bind(attempt_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(attempt)
    }
}

//=========================================================================================
// `ChapterStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChapterStore for DbAdapter {
    async fn get_context(&self, chapter_id: Uuid) -> PortResult<ChapterContext> {
        let row = sqlx::query_as::<_, ContextRow>(
            "SELECT c.title AS chapter_title, b.grade, b.subject \
             FROM chapters c LEFT JOIN books b ON b.id = c.book_id WHERE c.id = $1",
        )
        .bind(chapter_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("Chapter {} not found", chapter_id)))?;

        Ok(ChapterContext {
            grade: row.grade,
            subject: row.subject,
            chapter_title: Some(row.chapter_title),
        })
    }

    async fn get_questions(&self, chapter_id: Uuid) -> PortResult<Vec<QuestionRecord>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT id, question_text, max_marks, ordinal FROM chapter_questions \
             WHERE chapter_id = $1 ORDER BY ordinal ASC",
        )
        .bind(chapter_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(rows.into_iter().map(QuestionRow::to_domain).collect())
    }
}
