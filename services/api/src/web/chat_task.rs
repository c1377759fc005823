//! services/api/src/web/chat_task.rs
//!
//! This module contains the asynchronous "worker" function responsible for
//! handling a single conversational assessment turn: classify the intent,
//! pick a question, build the instruction, call the model, extract the score,
//! and persist progress.

use crate::web::state::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use tutor_core::{
    domain::{ChapterContext, ChatMessage, Intent, ScoreInfo, TurnReply},
    intent::classify_intent,
    ports::{CompletionKind, CompletionRequest, PortResult, ScoredQuestion, TurnUpdate},
    prompts::compose_instruction,
    score::extract_score,
    selector::select_question,
};
use uuid::Uuid;

/// Sampling temperature for the main tutoring reply.
const CHAT_TEMPERATURE: f32 = 0.7;

/// One incoming turn: either typed text or a buffer of recorded audio that
/// must be transcribed first.
#[derive(Debug, Clone)]
pub enum TurnInput {
    Text(String),
    Audio(Vec<u8>),
}

/// Runs one full assessment turn for `(user_id, chapter_id)`.
///
/// The session's keyed lock is held from load to persist, so concurrent turns
/// for the same session are serialized. No session or ledger row is touched
/// before the completion call has succeeded; a failed completion therefore
/// leaves all state exactly as it was. Persistence failures after a
/// successful completion are logged and swallowed: a tutoring reply without a
/// recorded score is still more useful than no reply.
pub async fn run_turn(
    app_state: Arc<AppState>,
    user_id: Uuid,
    chapter_id: Option<Uuid>,
    input: TurnInput,
) -> PortResult<TurnReply> {
    let lock = app_state.session_locks.lock_for(user_id, chapter_id);
    let _turn_guard = lock.lock().await;

    let session = app_state
        .sessions
        .get_or_create_session(user_id, chapter_id)
        .await?;

    let (message_text, is_audio) = match input {
        TurnInput::Text(text) => (text, false),
        TurnInput::Audio(audio) => {
            let transcribed = app_state.gateway.transcribe(&audio).await?;
            info!("Transcribed turn audio into {} chars", transcribed.len());
            (transcribed, true)
        }
    };

    // Fail-soft: any classifier trouble comes back as Explain.
    let intent = classify_intent(app_state.gateway.as_ref(), &session.messages, &message_text).await;
    info!(?intent, session_id = %session.id, "Classified turn intent");

    let (context, questions) = match chapter_id {
        Some(chapter) => (
            app_state.chapters.get_context(chapter).await?,
            app_state.chapters.get_questions(chapter).await?,
        ),
        None => (ChapterContext::default(), Vec::new()),
    };
    if questions.is_empty() {
        warn!(?chapter_id, "No questions available; using the generic explanatory prompt");
    }

    let question = select_question(&questions, &session.metadata.answered_questions, intent);

    let instruction = compose_instruction(intent, question, &context);
    let reply_text = app_state
        .gateway
        .complete(CompletionRequest {
            system_prompt: instruction,
            history: session.messages.clone(),
            user_message: message_text.clone(),
            temperature: CHAT_TEMPERATURE,
            kind: CompletionKind::Chat,
        })
        .await?;

    let scored = match (intent, question) {
        (Intent::Assessment, Some(q)) => Some(ScoredQuestion {
            question_id: q.id,
            awarded_marks: extract_score(&reply_text, q.max_marks),
            max_marks: q.max_marks,
        }),
        _ => None,
    };
    let newly_answered = scored
        .map(|s| !session.metadata.has_answered(s.question_id))
        .unwrap_or(false);

    let mut user_message = ChatMessage::user(message_text);
    user_message.is_audio = is_audio;
    let update = TurnUpdate {
        messages: vec![user_message, ChatMessage::assistant(reply_text.clone())],
        scored,
        // Only assessment turns record the question as asked; an explain turn
        // uses it purely as context.
        last_question_asked: match intent {
            Intent::Assessment => question.map(|q| q.id),
            Intent::Explain => None,
        },
    };

    // The ledger is a rollup of the session and must reconcile to the same
    // totals. If the session write failed, the question was never recorded as
    // answered, so applying it to the ledger now would double-count it on the
    // next turn. The ledger only moves when the session did.
    match app_state.sessions.persist_turn(session.id, update).await {
        Ok(_) => {
            if let (Some(s), Some(chapter)) = (scored, chapter_id) {
                if let Err(e) =
                    update_ledger(&app_state, user_id, chapter, &questions, s, newly_answered).await
                {
                    warn!(%chapter, "Failed to update score ledger: {}", e);
                }
            }
        }
        Err(e) => {
            warn!(session_id = %session.id, "Failed to persist turn; reply is still returned: {}", e);
        }
    }

    Ok(TurnReply {
        session_id: session.id,
        reply_text,
        score: scored.map(|s| ScoreInfo {
            awarded_marks: s.awarded_marks,
            max_marks: s.max_marks,
        }),
    })
}

/// Applies this turn's score to the latest attempt, opening one on first use.
async fn update_ledger(
    app_state: &AppState,
    user_id: Uuid,
    chapter_id: Uuid,
    questions: &[tutor_core::domain::QuestionRecord],
    scored: ScoredQuestion,
    newly_answered: bool,
) -> PortResult<()> {
    let attempt = match app_state.ledger.latest_attempt(user_id, chapter_id).await? {
        Some(attempt) => attempt,
        None => {
            let total_question_marks = questions.iter().map(|q| q.max_marks).sum();
            app_state
                .ledger
                .open_attempt(user_id, chapter_id, questions.len() as u32, total_question_marks)
                .await?
        }
    };

    app_state
        .ledger
        .apply_score(attempt.id, scored.awarded_marks, scored.max_marks, newly_answered)
        .await?;
    Ok(())
}
