//! Interaction persistence
//!
//! User data lives once in the credential store; chat turns carry the
//! identity snapshot so they can be analyzed without a join. What gets
//! stored is a deployment decision: full chat history, questions only, or
//! nothing at all. Storage failures are logged and swallowed; a lost
//! record never breaks the conversation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use unichat_auth::UserContext;
use unichat_core::Result;

/// What to persist per turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Both sides of every exchange
    ChatHistory,
    /// The user's questions only
    QuestionsOnly,
}

/// One stored chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub role: String,
    pub content: String,
    pub user_info: UserContext,
}

/// One stored question
#[derive(Debug, Clone, Serialize)]
pub struct QuestionRecord {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub user_info: UserContext,
}

/// Persistence collaborator for conversation turns
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn save_chat_message(&self, record: ChatMessageRecord) -> Result<()>;
    async fn save_question(&self, record: QuestionRecord) -> Result<()>;
}

/// Mode-aware interaction logger
pub struct InteractionLogger {
    store: Arc<dyn InteractionStore>,
    mode: Option<StorageMode>,
}

impl InteractionLogger {
    /// `mode = None` disables persistence entirely
    pub fn new(store: Arc<dyn InteractionStore>, mode: Option<StorageMode>) -> Self {
        Self { store, mode }
    }

    /// Persist one exchange according to the configured mode
    pub async fn record(&self, context: &UserContext, user_input: &str, ai_response: &str) {
        let Some(mode) = self.mode else {
            tracing::debug!("interaction storage disabled, skipping save");
            return;
        };

        let timestamp = Utc::now();
        let session_id = context.session_id.clone();

        let result = match mode {
            StorageMode::ChatHistory => {
                let user_message = ChatMessageRecord {
                    session_id: session_id.clone(),
                    timestamp,
                    role: "user".to_string(),
                    content: user_input.to_string(),
                    user_info: context.clone(),
                };
                let ai_message = ChatMessageRecord {
                    session_id,
                    timestamp,
                    role: "assistant".to_string(),
                    content: ai_response.to_string(),
                    user_info: context.clone(),
                };

                match self.store.save_chat_message(user_message).await {
                    Ok(()) => self.store.save_chat_message(ai_message).await,
                    Err(e) => Err(e),
                }
            }
            StorageMode::QuestionsOnly => {
                self.store
                    .save_question(QuestionRecord {
                        session_id,
                        timestamp,
                        question: user_input.to_string(),
                        user_info: context.clone(),
                    })
                    .await
            }
        };

        if let Err(e) = result {
            tracing::error!("failed to save interaction data: {e}");
        }
    }
}
