pub mod domain;
pub mod intent;
pub mod ports;
pub mod prompts;
pub mod score;
pub mod selector;

pub use domain::{
    ChapterContext, ChatMessage, ChatSession, CompletionStatus, Intent, MessageRole,
    QuestionRecord, ScoreAttempt, ScoreInfo, SessionMetadata, TurnReply, CHAT_ATTEMPT_TYPE,
};
pub use ports::{
    ChapterStore, CompletionGateway, CompletionKind, CompletionRequest, PortError, PortResult,
    ScoreLedger, ScoredQuestion, SessionStore, TurnUpdate,
};
