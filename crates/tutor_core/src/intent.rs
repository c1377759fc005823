//! crates/tutor_core/src/intent.rs
//!
//! Classifies a user turn as either an assessment answer/request or a doubt
//! that needs an explanation.

use crate::domain::{ChatMessage, Intent};
use crate::ports::{CompletionGateway, CompletionKind, CompletionRequest};

const INTENT_INSTRUCTIONS: &str = r#"You are classifying one student message from a tutoring conversation into exactly one of two categories.

Categories:
- ASSESSMENT: the student is answering a knowledge-check question, asking to be tested, or asking for their answer to be marked.
- EXPLAIN: the student is asking a doubt, requesting an explanation, or chatting about the material without answering a question.

Reply with exactly one word: ASSESSMENT or EXPLAIN. No punctuation, no explanation."#;

/// How many recent turns are forwarded to the classifier for context.
const RECENT_TURN_WINDOW: usize = 6;

/// Classifies the new message, using up to the last six user/assistant turns
/// as context.
///
/// Delegates to the completion gateway at zero temperature with
/// `CompletionKind::Intent` (a single best-effort attempt, never retried).
/// Any gateway failure — and any reply that is not one of the two literal
/// labels — falls back to `Explain`. The bias is deliberate: a misclassified
/// turn is recoverable on the next message, and defaulting away from scoring
/// can never corrupt a student's marks.
pub async fn classify_intent(
    gateway: &dyn CompletionGateway,
    recent_messages: &[ChatMessage],
    new_message: &str,
) -> Intent {
    let window_start = recent_messages.len().saturating_sub(RECENT_TURN_WINDOW);
    let request = CompletionRequest {
        system_prompt: INTENT_INSTRUCTIONS.to_string(),
        history: recent_messages[window_start..].to_vec(),
        user_message: new_message.to_string(),
        temperature: 0.0,
        kind: CompletionKind::Intent,
    };

    match gateway.complete(request).await {
        Ok(reply) => parse_label(&reply),
        Err(_) => Intent::Explain,
    }
}

fn parse_label(reply: &str) -> Intent {
    let label = reply.trim();
    if label.eq_ignore_ascii_case("assessment") {
        Intent::Assessment
    } else if label.eq_ignore_ascii_case("explain") {
        Intent::Explain
    } else {
        // Malformed label: same fail-soft default as a gateway error.
        Intent::Explain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedGateway {
        reply: Mutex<Option<PortResult<String>>>,
        last_kind: Mutex<Option<CompletionKind>>,
    }

    impl ScriptedGateway {
        fn replying(reply: PortResult<String>) -> Self {
            Self {
                reply: Mutex::new(Some(reply)),
                last_kind: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CompletionGateway for ScriptedGateway {
        async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
            *self.last_kind.lock().unwrap() = Some(request.kind);
            self.reply.lock().unwrap().take().unwrap()
        }

        async fn transcribe(&self, _audio_data: &[u8]) -> PortResult<String> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn recognizes_both_labels() {
        let gw = ScriptedGateway::replying(Ok("ASSESSMENT".to_string()));
        assert_eq!(classify_intent(&gw, &[], "my answer is 42").await, Intent::Assessment);

        let gw = ScriptedGateway::replying(Ok("  explain \n".to_string()));
        assert_eq!(classify_intent(&gw, &[], "what does this mean?").await, Intent::Explain);
    }

    #[tokio::test]
    async fn gateway_error_defaults_to_explain() {
        for err in [
            PortError::Timeout("budget elapsed".to_string()),
            PortError::Upstream("503".to_string()),
            PortError::Unexpected("bad payload".to_string()),
        ] {
            let gw = ScriptedGateway::replying(Err(err));
            assert_eq!(classify_intent(&gw, &[], "anything").await, Intent::Explain);
        }
    }

    #[tokio::test]
    async fn unrecognized_label_defaults_to_explain() {
        let gw = ScriptedGateway::replying(Ok("maybe assessment?".to_string()));
        assert_eq!(classify_intent(&gw, &[], "hm").await, Intent::Explain);
    }

    #[tokio::test]
    async fn classification_uses_the_intent_kind() {
        let gw = ScriptedGateway::replying(Ok("EXPLAIN".to_string()));
        classify_intent(&gw, &[], "hello").await;
        assert_eq!(*gw.last_kind.lock().unwrap(), Some(CompletionKind::Intent));
    }

    #[tokio::test]
    async fn history_window_is_capped_at_six_turns() {
        struct CountingGateway(Mutex<usize>);

        #[async_trait]
        impl CompletionGateway for CountingGateway {
            async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
                *self.0.lock().unwrap() = request.history.len();
                Ok("EXPLAIN".to_string())
            }
            async fn transcribe(&self, _audio_data: &[u8]) -> PortResult<String> {
                Ok(String::new())
            }
        }

        let messages: Vec<ChatMessage> =
            (0..10).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        let gw = CountingGateway(Mutex::new(0));
        classify_intent(&gw, &messages, "latest").await;
        assert_eq!(*gw.0.lock().unwrap(), 6);
    }
}
