//! Grounded chat response pipeline
//!
//! Produces the reply for a message the auth flow did not consume, in three
//! stages: decide whether media would help and with which keywords, search
//! and select media, then generate the grounded answer from retrieved
//! context. Every collaborator failure degrades to a safe reply; nothing
//! here aborts the conversation.

use std::sync::Arc;
use unichat_core::{ChatConfig, LlmClient, MediaSet, MediaStore, Retriever};

/// One prior turn of the conversation
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// A finished reply with any attached media URLs
#[derive(Debug, Clone, Default)]
pub struct ChatReply {
    pub text: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl ChatReply {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Identity details used to personalize the answer
#[derive(Debug, Clone, Default)]
pub struct Persona {
    pub name: Option<String>,
    pub faculty: Option<String>,
}

const FALLBACK_REPLY: &str = "I apologize, but I couldn't generate a proper response. \
    Could you please rephrase your question?";

/// Rough token estimate used for the input cap, ~4 characters per token
fn approx_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// The media/retrieval/answer pipeline
pub struct ChatPipeline {
    llm: Arc<dyn LlmClient>,
    retriever: Arc<dyn Retriever>,
    media: Option<Arc<dyn MediaStore>>,
    config: ChatConfig,
}

impl ChatPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: Arc<dyn Retriever>,
        config: ChatConfig,
    ) -> Self {
        Self {
            llm,
            retriever,
            media: None,
            config,
        }
    }

    /// Attach a media catalogue
    pub fn with_media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    /// Produce the reply for one user message
    pub async fn respond(
        &self,
        persona: &Persona,
        history: &[ChatTurn],
        message: &str,
    ) -> ChatReply {
        if approx_tokens(message) > self.config.max_input_tokens {
            return ChatReply::text_only(format!(
                "❌ Input too long! Please limit to {} tokens.",
                self.config.max_input_tokens
            ));
        }

        // Stage 1: should this answer carry media, and which keywords
        // would find it?
        let (include_media, keywords) = self.media_decision(message).await;
        tracing::debug!(include_media, ?keywords, "media decision");

        // Stage 2: search and select
        let (images, videos) = if include_media && !keywords.is_empty() {
            self.find_media(message, &keywords).await
        } else {
            (Vec::new(), Vec::new())
        };

        // Stage 3: grounded answer
        let text = self.answer(persona, history, message).await;

        ChatReply {
            text,
            images,
            videos,
        }
    }

    /// Ask the model whether media belongs in the answer
    ///
    /// Failures mean "no media": the text answer still goes out.
    async fn media_decision(&self, message: &str) -> (bool, Vec<String>) {
        let prompt = format!(
            "You are deciding whether a university admissions answer should \
             include campus images or videos.\n\n\
             User question: \"{message}\"\n\n\
             Reply with exactly two lines:\n\
             INCLUDE_MEDIA=true or INCLUDE_MEDIA=false\n\
             KEYWORDS=comma,separated,search,keywords (empty if no media)"
        );

        match self.llm.complete(&prompt).await {
            Ok(reply) => parse_media_controls(&reply),
            Err(e) => {
                tracing::warn!("media decision failed: {e}");
                (false, Vec::new())
            }
        }
    }

    /// Search the catalogue and pick the most relevant items
    async fn find_media(&self, message: &str, keywords: &[String]) -> (Vec<String>, Vec<String>) {
        let Some(media_store) = &self.media else {
            return (Vec::new(), Vec::new());
        };

        let found = match media_store.search(keywords).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("media search failed: {e}");
                return (Vec::new(), Vec::new());
            }
        };

        if found.is_empty() {
            return (Vec::new(), Vec::new());
        }

        self.select_media(message, &found).await
    }

    /// Let the model choose from the found media, falling back to the
    /// first few of each on an unparseable reply
    async fn select_media(&self, message: &str, found: &MediaSet) -> (Vec<String>, Vec<String>) {
        let describe = |items: &[unichat_core::MediaItem]| {
            items
                .iter()
                .map(|i| {
                    format!(
                        "{} ({})",
                        i.url,
                        i.description.as_deref().unwrap_or("No description")
                    )
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        let prompt = format!(
            "Select the media most relevant to this question.\n\n\
             Question: \"{message}\"\n\n\
             Images: {}\n\
             Videos: {}\n\n\
             Return only a JSON object:\n\
             {{\"selected_images\": [urls], \"selected_videos\": [urls]}}",
            describe(&found.images),
            describe(&found.videos),
        );

        let limit = self.config.media_limit;
        let first_few = |items: &[unichat_core::MediaItem]| {
            items.iter().take(limit).map(|i| i.url.clone()).collect()
        };

        match self.llm.complete(&prompt).await {
            Ok(reply) => match serde_json::from_str::<MediaSelection>(reply.trim()) {
                Ok(selection) => (
                    selection.selected_images.into_iter().take(limit).collect(),
                    selection.selected_videos.into_iter().take(limit).collect(),
                ),
                Err(e) => {
                    tracing::debug!("media selection reply was not JSON ({e}), using first results");
                    (first_few(&found.images), first_few(&found.videos))
                }
            },
            Err(e) => {
                tracing::warn!("media selection failed: {e}");
                (first_few(&found.images), first_few(&found.videos))
            }
        }
    }

    /// Retrieve context and generate the final answer
    async fn answer(&self, persona: &Persona, history: &[ChatTurn], message: &str) -> String {
        let chunks = match self
            .retriever
            .retrieve(message, self.config.retrieval_top_k)
            .await
        {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("retrieval failed: {e}");
                Vec::new()
            }
        };

        let mut prompt = String::new();
        prompt.push_str(
            "You are an admissions assistant for the university. Answer using \
             only the provided context; if the context does not contain the \
             answer, say you don't have that information.\n\n",
        );

        if let Some(name) = &persona.name {
            prompt.push_str(&format!("The user's name is {name}.\n"));
        }
        if let Some(faculty) = &persona.faculty {
            prompt.push_str(&format!("The user is interested in {faculty}.\n"));
        }

        if !chunks.is_empty() {
            prompt.push_str("\nContext:\n");
            for (i, chunk) in chunks.iter().enumerate() {
                prompt.push_str(&format!("[{}] {}\n", i + 1, chunk.content));
            }
        }

        if !history.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for turn in trimmed_history(history, self.config.max_input_tokens) {
                let role = match turn.role {
                    ChatRole::User => "User",
                    ChatRole::Assistant => "Assistant",
                };
                prompt.push_str(&format!("{role}: {}\n", turn.content));
            }
        }

        prompt.push_str(&format!("\nUser question: {message}\n"));

        match self.llm.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => FALLBACK_REPLY.to_string(),
            Err(e) => {
                tracing::error!("answer generation failed: {e}");
                "❌ I apologize, but I encountered an error while processing your \
                 request. Please try again."
                    .to_string()
            }
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct MediaSelection {
    #[serde(default)]
    selected_images: Vec<String>,
    #[serde(default)]
    selected_videos: Vec<String>,
}

/// Keep the most recent turns that fit the token budget
fn trimmed_history(history: &[ChatTurn], max_tokens: usize) -> Vec<&ChatTurn> {
    let mut kept = Vec::new();
    let mut total = 0;

    for turn in history.iter().rev() {
        total += approx_tokens(&turn.content);
        if total > max_tokens {
            break;
        }
        kept.push(turn);
    }

    kept.reverse();
    kept
}

/// Parse the `INCLUDE_MEDIA=`/`KEYWORDS=` control lines from a model reply
fn parse_media_controls(reply: &str) -> (bool, Vec<String>) {
    let mut include = false;
    let mut keywords = Vec::new();

    for line in reply.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("INCLUDE_MEDIA=") {
            include = value.trim().eq_ignore_ascii_case("true");
        } else if let Some(value) = line.strip_prefix("KEYWORDS=") {
            keywords = value
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        }
    }

    (include, keywords)
}
