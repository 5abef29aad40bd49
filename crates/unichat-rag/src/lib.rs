//! Grounded chat for the admissions chatbot
//!
//! This crate holds everything downstream of the auth flow:
//! - LLM client implementations (OpenAI-compatible and Ollama)
//! - The retrieval-augmented chat pipeline with media enrichment
//! - Interaction persistence
//! - The conversation router tying KYC and chat together

pub mod llm;
pub mod pipeline;
pub mod router;
pub mod storage;

pub use llm::{client_from_config, OllamaClient, OpenAiClient};
pub use pipeline::{ChatPipeline, ChatReply, ChatRole, ChatTurn, Persona};
pub use router::ConversationRouter;
pub use storage::{
    ChatMessageRecord, InteractionLogger, InteractionStore, QuestionRecord, StorageMode,
};
