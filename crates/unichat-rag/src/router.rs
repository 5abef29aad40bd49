//! Conversation router
//!
//! The per-message entry point of the core: dispatches each inbound message
//! to transcription, the KYC machine, or the chat pipeline, and records the
//! exchange. The transport layer owns rendering; this layer only produces
//! reply values.

use crate::pipeline::{ChatPipeline, ChatReply, ChatTurn, Persona};
use crate::storage::InteractionLogger;
use base64::Engine;
use std::sync::Arc;
use unichat_auth::{AuthGate, ConversationAuthState};
use unichat_core::Transcriber;
use unichat_kyc::{welcome_message, KycMachine, KycOutcome};

/// Frontend marker for inbound audio payloads
const TRANSCRIPTION_REQUEST_PREFIX: &str = "[AUDIO_TRANSCRIPTION_REQUEST]";
/// Marker the frontend strips off transcription replies
const TRANSCRIPTION_RESULT_PREFIX: &str = "[TRANSCRIPTION_RESULT]";

const TRANSCRIPTION_FAILED: &str = "❌ Sorry, I couldn't understand the audio. Please try \
    speaking more clearly or check your microphone.";

/// Routes each conversation message through the right handler
pub struct ConversationRouter {
    machine: KycMachine,
    gate: AuthGate,
    pipeline: ChatPipeline,
    logger: InteractionLogger,
    transcriber: Option<Arc<dyn Transcriber>>,
}

impl ConversationRouter {
    pub fn new(
        machine: KycMachine,
        gate: AuthGate,
        pipeline: ChatPipeline,
        logger: InteractionLogger,
    ) -> Self {
        Self {
            machine,
            gate,
            pipeline,
            logger,
            transcriber: None,
        }
    }

    /// Attach an audio transcription collaborator
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Greeting for a newly started conversation
    pub fn on_conversation_start(&self) -> String {
        welcome_message()
    }

    /// Handle one inbound message and produce the reply
    pub async fn on_message(
        &self,
        state: &mut ConversationAuthState,
        history: &[ChatTurn],
        message: &str,
    ) -> ChatReply {
        if let Some(payload) = message.strip_prefix(TRANSCRIPTION_REQUEST_PREFIX) {
            return self.transcribe(payload).await;
        }

        // The auth flow sees every message first while the conversation is
        // unauthenticated.
        if !state.is_authenticated {
            match self.machine.handle_message(state, message).await {
                KycOutcome::Consumed { reply, .. } => return ChatReply::text_only(reply),
                KycOutcome::NotConsumed => {
                    tracing::debug!(conversation = %state.conversation_id, "anonymous chat message");
                }
            }
        }

        let persona = Persona {
            name: state.profile.name.clone(),
            faculty: state.profile.faculty.clone(),
        };

        let reply = self.pipeline.respond(&persona, history, message).await;

        let context = self.gate.user_context(state).await;
        self.logger.record(&context, message, &reply.text).await;

        reply
    }

    /// Decode and transcribe an audio payload
    async fn transcribe(&self, payload_b64: &str) -> ChatReply {
        let Some(transcriber) = &self.transcriber else {
            tracing::warn!("transcription requested but no transcriber configured");
            return ChatReply::text_only(TRANSCRIPTION_FAILED);
        };

        let audio = match base64::engine::general_purpose::STANDARD.decode(payload_b64.trim()) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!("transcription payload was not valid base64: {e}");
                return ChatReply::text_only(TRANSCRIPTION_FAILED);
            }
        };

        // Browser recordings arrive as WebM
        match transcriber.transcribe(&audio, "audio/webm").await {
            Ok(text) if !text.trim().is_empty() => {
                ChatReply::text_only(format!("{TRANSCRIPTION_RESULT_PREFIX}{}", text.trim()))
            }
            Ok(_) => ChatReply::text_only(TRANSCRIPTION_FAILED),
            Err(e) => {
                tracing::error!("transcription failed: {e}");
                ChatReply::text_only(TRANSCRIPTION_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ChatMessageRecord, InteractionStore, QuestionRecord, StorageMode};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use unichat_auth::{AuthService, MemoryCredentialStore};
    use unichat_core::{
        AuthConfig, ChatConfig, CoreError, LlmClient, Result, RetrievedChunk, Retriever,
    };

    struct CannedLlm(String);

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct EmptyRetriever;

    #[async_trait]
    impl Retriever for EmptyRetriever {
        async fn retrieve(&self, _query: &str, _top_k: usize) -> Result<Vec<RetrievedChunk>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        questions: Mutex<Vec<QuestionRecord>>,
    }

    #[async_trait]
    impl InteractionStore for RecordingStore {
        async fn save_chat_message(&self, _record: ChatMessageRecord) -> Result<()> {
            Ok(())
        }

        async fn save_question(&self, record: QuestionRecord) -> Result<()> {
            self.questions.lock().unwrap().push(record);
            Ok(())
        }
    }

    struct EchoTranscriber;

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe(&self, audio: &[u8], _mime_type: &str) -> Result<String> {
            String::from_utf8(audio.to_vec())
                .map_err(|e| CoreError::Transcription(e.to_string()))
        }
    }

    fn router(store: Arc<RecordingStore>) -> ConversationRouter {
        let auth = Arc::new(AuthService::new(
            Arc::new(MemoryCredentialStore::new()),
            AuthConfig::default(),
        ));
        let llm: Arc<dyn LlmClient> = Arc::new(CannedLlm("INCLUDE_MEDIA=false".to_string()));

        ConversationRouter::new(
            KycMachine::new(auth.clone(), None),
            AuthGate::new(auth),
            ChatPipeline::new(llm, Arc::new(EmptyRetriever), ChatConfig::default()),
            InteractionLogger::new(store, Some(StorageMode::QuestionsOnly)),
        )
        .with_transcriber(Arc::new(EchoTranscriber))
    }

    #[tokio::test]
    async fn test_auth_messages_are_consumed_before_chat() {
        let store = Arc::new(RecordingStore::default());
        let r = router(store.clone());
        let mut state = ConversationAuthState::new("conv-1");

        let reply = r.on_message(&mut state, &[], "I want to register").await;
        assert!(reply.text.contains("full name"));
        assert_eq!(state.kyc_step, 1);

        // Auth-flow messages are not persisted as questions
        assert!(store.questions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ordinary_chat_is_answered_and_recorded() {
        let store = Arc::new(RecordingStore::default());
        let r = router(store.clone());
        let mut state = ConversationAuthState::new("conv-1");

        let reply = r.on_message(&mut state, &[], "what faculties do you have?").await;
        assert!(!reply.text.is_empty());

        let questions = store.questions.lock().unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "what faculties do you have?");
        assert_eq!(questions[0].user_info.role, "guest");
    }

    #[tokio::test]
    async fn test_transcription_round_trip() {
        let store = Arc::new(RecordingStore::default());
        let r = router(store);
        let mut state = ConversationAuthState::new("conv-1");

        let payload = base64::engine::general_purpose::STANDARD.encode("hello campus");
        let message = format!("{TRANSCRIPTION_REQUEST_PREFIX}{payload}");

        let reply = r.on_message(&mut state, &[], &message).await;
        assert_eq!(reply.text, "[TRANSCRIPTION_RESULT]hello campus");
    }

    #[tokio::test]
    async fn test_bad_transcription_payload_fails_softly() {
        let store = Arc::new(RecordingStore::default());
        let r = router(store);
        let mut state = ConversationAuthState::new("conv-1");

        let reply = r
            .on_message(&mut state, &[], "[AUDIO_TRANSCRIPTION_REQUEST]!!not-base64!!")
            .await;
        assert!(reply.text.contains("couldn't understand the audio"));
    }
}
