//! Unichat Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the admissions
//! chatbot:
//! - User accounts, stored sessions, and the per-conversation auth snapshot
//! - Role hierarchy for authorization decisions
//! - Common error types
//! - Collaborator traits (credential store, language model, retrieval,
//!   media search, transcription)
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, AuthConfig, ChatConfig, ConfigError, LlmConfig, LlmProvider, LoggingConfig,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types shared across the workspace
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// Role Hierarchy
// ============================================================================

/// User role with a total order used for permission checks
///
/// The derived ordering follows declaration order:
/// `Guest < User < PremiumUser < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Guest,
    User,
    PremiumUser,
    Admin,
}

impl UserRole {
    /// String representation as stored in user records and token claims
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Guest => "guest",
            UserRole::User => "user",
            UserRole::PremiumUser => "premium_user",
            UserRole::Admin => "admin",
        }
    }

    /// Parse a role string, `None` on anything unrecognized
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "guest" => Some(UserRole::Guest),
            "user" => Some(UserRole::User),
            "premium_user" => Some(UserRole::PremiumUser),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    /// Parse a role string coming from storage.
    ///
    /// Records written by earlier deployments may carry role names this
    /// version does not know. Those degrade to [`UserRole::User`], never to
    /// a privileged role.
    pub fn parse_lossy(s: &str) -> Self {
        Self::parse(s).unwrap_or(UserRole::User)
    }

    /// Position in the hierarchy, higher means more privileged
    pub fn rank(&self) -> u8 {
        match self {
            UserRole::Guest => 0,
            UserRole::User => 1,
            UserRole::PremiumUser => 2,
            UserRole::Admin => 3,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// User and Session Models
// ============================================================================

/// Persisted user account
///
/// Created on successful registration. Accounts are never physically
/// deleted, only deactivated via `is_active`. The role is kept as a string
/// at the storage boundary; the authorization layer parses it with
/// [`UserRole::parse_lossy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique user identifier
    pub id: String,

    /// Login name, the lowercased email
    pub username: String,

    /// Email address (unique among active records)
    pub email: String,

    /// Argon2id password hash, never serialized in API responses
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Display name
    pub name: String,

    /// Mobile number
    pub mobile: String,

    /// Faculty of interest
    pub faculty: String,

    /// Role string (guest, user, premium_user, admin)
    pub role: String,

    /// Whether the account is active
    pub is_active: bool,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last successful login, `None` until the first login
    pub last_login: Option<DateTime<Utc>>,

    /// Conversation the account was created from
    pub session_id: String,
}

impl UserRecord {
    /// Sanitized projection for the conversation layer
    pub fn to_view(&self) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            mobile: self.mobile.clone(),
            faculty: self.faculty.clone(),
            role: self.role.clone(),
            session_id: self.session_id.clone(),
            token: None,
        }
    }
}

/// Sanitized authenticated-user view
///
/// The only user shape the conversation layer ever sees. Excludes the
/// password hash; carries the verifying token when produced by token
/// verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub mobile: String,
    pub faculty: String,
    pub role: String,
    /// Conversation the current credential was issued for
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl AuthenticatedUser {
    /// Typed role, unknown strings degrade to `User`
    pub fn user_role(&self) -> UserRole {
        UserRole::parse_lossy(&self.role)
    }
}

/// Persisted session binding one issued token to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session record identifier
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// The issued token string, matched exactly on verification
    pub token: String,

    /// Conversation the token was issued for
    pub session_id: String,

    /// Issue timestamp
    pub created_at: DateTime<Utc>,

    /// Expiry timestamp; the record is invalid at exactly this instant
    pub expires_at: DateTime<Utc>,

    /// Cleared on logout
    pub is_active: bool,

    /// Logout timestamp, if the user logged out explicitly
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Whether the record has passed its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Active and strictly before expiry
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Partial update for a user record
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub last_login: Option<DateTime<Utc>>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

/// Partial update for a session record
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub is_active: Option<bool>,
    pub logout_at: Option<DateTime<Utc>>,
}

// ============================================================================
// KYC Profile
// ============================================================================

/// Field data accumulated during the KYC dialogue
///
/// Every field is optional until its collection step has validated it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KycProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub faculty: Option<String>,
    /// Raw password, held only for the duration of the flow
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl KycProfile {
    /// All five registration fields collected
    pub fn is_complete(&self) -> bool {
        self.name.is_some()
            && self.email.is_some()
            && self.mobile.is_some()
            && self.faculty.is_some()
            && self.password.is_some()
    }

    /// Names of the fields still missing, in collection order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.email.is_none() {
            missing.push("email");
        }
        if self.mobile.is_none() {
            missing.push("mobile");
        }
        if self.faculty.is_none() {
            missing.push("faculty");
        }
        if self.password.is_none() {
            missing.push("password");
        }
        missing
    }

    /// Drop all collected fields
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Retrieval and Media Types
// ============================================================================

/// A chunk of knowledge-base content returned by the retriever
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Content snippet
    pub content: String,

    /// Relevance score (higher is better)
    pub score: f32,

    /// Human-readable source label, if the backend provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One image or video known to the media catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    /// Public URL; video URLs may carry a `facebook:`/`youtube:` prefix
    pub url: String,

    /// Catalogue description used for relevance selection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Media search results, images and videos separately
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaSet {
    pub images: Vec<MediaItem>,
    pub videos: Vec<MediaItem>,
}

impl MediaSet {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Persistence boundary for user accounts and stored sessions
///
/// All operations are request/response. Implementations are expected to be
/// document stores; ordering requirements are stated per method.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive lookup over both username and email
    async fn find_user_by_email_or_username(&self, needle: &str) -> Result<Option<UserRecord>>;

    /// Lookup by record id
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>>;

    /// Insert a new user, returning its id
    async fn insert_user(&self, user: UserRecord) -> Result<String>;

    /// Apply a partial update; returns whether a record changed
    async fn update_user(&self, id: &str, patch: UserPatch) -> Result<bool>;

    /// All session records for a user, newest first by creation time
    async fn find_sessions_by_user(&self, user_id: &str) -> Result<Vec<SessionRecord>>;

    /// Delete the given session records, returning the deleted count
    async fn delete_sessions(&self, ids: &[String]) -> Result<u64>;

    /// Insert a new session record
    async fn insert_session(&self, session: SessionRecord) -> Result<()>;

    /// Lookup a session by its exact token string
    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>>;

    /// Apply a partial update by token; returns whether a record changed
    async fn update_session(&self, token: &str, patch: SessionPatch) -> Result<bool>;

    /// Bulk-delete sessions whose expiry is before `before`
    async fn delete_expired_sessions(&self, before: DateTime<Utc>) -> Result<u64>;
}

/// Single-shot language model completion
///
/// Callers treat any error or empty reply as a soft failure and fall back;
/// implementations should not retry internally.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the prompt
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Vector-backed document retrieval for grounded answers
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// The `top_k` most relevant chunks for the query
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Media catalogue search by keywords
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    async fn search(&self, keywords: &[String]) -> Result<MediaSet>;
}

/// Audio transcription collaborator
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio bytes of the given MIME type to text
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================
