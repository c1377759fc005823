//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the OpenAI completion backend.
//! It implements the `CompletionGateway` port from the `core` crate, wrapping
//! every call in a bounded retry loop raced against a hard wall-clock timeout.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        audio::{AudioInput, CreateTranscriptionRequest},
        chat::{
            ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
            ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
            CreateChatCompletionRequestArgs,
        },
    },
    Client,
};
use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use tracing::warn;
use tutor_core::domain::{ChatMessage, MessageRole};
use tutor_core::ports::{
    CompletionGateway, CompletionKind, CompletionRequest, PortError, PortResult,
};

use crate::config::{RetrySettings, TimeoutBudgets};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CompletionGateway` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    chat_model: String,
    intent_model: String,
    sst_model: String,
    timeouts: TimeoutBudgets,
    retry: RetrySettings,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(
        client: Client<OpenAIConfig>,
        chat_model: String,
        intent_model: String,
        sst_model: String,
        timeouts: TimeoutBudgets,
        retry: RetrySettings,
    ) -> Self {
        Self {
            client,
            chat_model,
            intent_model,
            sst_model,
            timeouts,
            retry,
        }
    }

    /// The wall-clock budget for a given call shape.
    fn budget_for(&self, kind: CompletionKind) -> Duration {
        match kind {
            CompletionKind::Chat | CompletionKind::Intent => self.timeouts.chat,
            CompletionKind::BulkText => self.timeouts.bulk_text,
        }
    }

    /// How many retries a call shape is allowed after its first attempt.
    /// Intent classification is a single best-effort attempt: a misclassified
    /// turn is recoverable, so it is never worth waiting on.
    fn retries_for(&self, kind: CompletionKind) -> u32 {
        match kind {
            CompletionKind::Intent => 0,
            CompletionKind::Chat | CompletionKind::BulkText => self.retry.max_retries,
        }
    }

    fn model_for(&self, kind: CompletionKind) -> &str {
        match kind {
            CompletionKind::Intent => &self.intent_model,
            CompletionKind::Chat | CompletionKind::BulkText => &self.chat_model,
        }
    }

    /// Runs the iterative retry loop for one completion request. The hard
    /// timeout is applied by the caller around this whole loop, so an elapsed
    /// budget cancels any in-flight attempt.
    async fn send_with_retry(&self, request: &CompletionRequest) -> PortResult<String> {
        let max_retries = self.retries_for(request.kind);
        let mut delay = self.retry.base_delay;
        let mut last_error = PortError::Upstream("completion was never attempted".to_string());

        for attempt in 0..=max_retries {
            if attempt > 0 {
                warn!(
                    "Completion attempt {}/{} failed; retrying after {:?}",
                    attempt,
                    max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            match self.send_once(request).await {
                Ok(reply) => return Ok(reply),
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }

    /// One attempt against the chat completions API.
    async fn send_once(&self, request: &CompletionRequest) -> PortResult<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );
        for msg in &request.history {
            messages.push(to_openai_message(msg)?);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_message.clone())
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        );

        let api_request = CreateChatCompletionRequestArgs::default()
            .model(self.model_for(request.kind))
            .messages(messages)
            .temperature(request.temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        // Extract the text content from the first choice in the response.
        // A payload with no usable text counts as a retryable upstream error.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Upstream("Completion response contained no text content.".to_string())
            })
    }

    fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
        let mut cursor = std::io::Cursor::new(Vec::new());

        let spec = WavSpec {
            channels: 1, // Mono
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = WavWriter::new(&mut cursor, spec)?;

        // Convert byte array to i16 samples
        for chunk in pcm_data.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            writer.write_sample(sample)?;
        }

        writer.finalize()?;
        Ok(cursor.into_inner())
    }

    async fn transcribe_with_retry(&self, wav_data: &[u8]) -> PortResult<String> {
        let mut delay = self.retry.base_delay;
        let mut last_error = PortError::Upstream("transcription was never attempted".to_string());

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                warn!(
                    "Transcription attempt {}/{} failed; retrying after {:?}",
                    attempt,
                    self.retry.max_retries + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            let input = AudioInput::from_vec_u8("user_audio.wav".into(), wav_data.to_vec());
            let request = CreateTranscriptionRequest {
                file: input,
                model: self.sst_model.clone(),
                ..Default::default()
            };

            let result = self.client.audio().transcription().create(request).await;
            match result {
                Ok(response) => return Ok(response.text),
                Err(e) => last_error = PortError::Upstream(e.to_string()),
            }
        }

        Err(last_error)
    }
}

fn to_openai_message(msg: &ChatMessage) -> PortResult<ChatCompletionRequestMessage> {
    let converted = match msg.role {
        MessageRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(msg.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        MessageRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(msg.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        MessageRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(msg.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    };
    Ok(converted)
}

//=========================================================================================
// `CompletionGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionGateway for OpenAiChatAdapter {
    /// Runs one completion, racing the retry loop against the hard budget for
    /// the request's kind. If the budget elapses first the in-flight attempt
    /// is dropped and a distinct `Timeout` error surfaces; a late result from
    /// that attempt is discarded with it.
    async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
        let budget = self.budget_for(request.kind);
        match tokio::time::timeout(budget, self.send_with_retry(&request)).await {
            Ok(result) => result,
            Err(_) => Err(PortError::Timeout(format!(
                "Completion exceeded its {:?} budget",
                budget
            ))),
        }
    }

    /// Transcribes a buffer of raw PCM16 audio via the Whisper API, under the
    /// transcription budget.
    async fn transcribe(&self, audio_data: &[u8]) -> PortResult<String> {
        let wav_data = Self::pcm16_to_wav(audio_data, 48000)
            .map_err(|e| PortError::Unexpected(format!("Failed to encode WAV: {}", e)))?;

        let budget = self.timeouts.transcription;
        match tokio::time::timeout(budget, self.transcribe_with_retry(&wav_data)).await {
            Ok(result) => result,
            Err(_) => Err(PortError::Timeout(format!(
                "Transcription exceeded its {:?} budget",
                budget
            ))),
        }
    }
}
