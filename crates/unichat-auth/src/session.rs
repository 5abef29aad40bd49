//! Per-conversation authentication state and authorization guards
//!
//! The conversation's auth snapshot is an explicit [`ConversationAuthState`]
//! owned by the host and passed by reference into the KYC machine and the
//! guards here; there is no ambient per-conversation global. Feature gates
//! are plain guard functions called at the top of a gated handler; when
//! unsatisfied they return a user-visible denial message and the handler
//! skips its action. They never terminate the conversation.

use crate::service::AuthService;
use serde::Serialize;
use std::sync::Arc;
use unichat_core::{AuthenticatedUser, KycProfile, UserRole};

/// Which authentication flow the conversation is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    None,
    Register,
    Login,
}

/// Transient per-conversation authentication state
///
/// Created with all-default values at conversation start and dropped when
/// the conversation ends. Mutated exclusively by the KYC state machine and
/// the [`AuthGate`]. Invariant: `kyc_step == 0` implies `auth_mode ==
/// AuthMode::None` implies `kyc_data` is empty.
#[derive(Debug, Default)]
pub struct ConversationAuthState {
    /// Host-assigned conversation identifier
    pub conversation_id: String,

    /// Current position in the KYC/login dialogue, 0 = idle
    pub kyc_step: u8,

    /// Active flow, if any
    pub auth_mode: AuthMode,

    /// Fields collected so far by the active flow
    pub kyc_data: KycProfile,

    /// Completed profile snapshot used for chat personalization
    pub profile: KycProfile,

    /// Whether the conversation holds a verified identity
    pub is_authenticated: bool,

    /// Sanitized snapshot of the authenticated user
    pub authenticated_user: Option<AuthenticatedUser>,

    /// The credential backing `authenticated_user`
    pub auth_token: Option<String>,
}

impl ConversationAuthState {
    /// Fresh state for a new conversation
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ..Default::default()
        }
    }

    /// Return the KYC dialogue to idle
    pub fn reset_kyc(&mut self) {
        self.kyc_step = 0;
        self.auth_mode = AuthMode::None;
        self.kyc_data.clear();
    }

    /// Drop the authenticated identity
    pub fn clear_auth(&mut self) {
        self.auth_token = None;
        self.authenticated_user = None;
        self.is_authenticated = false;
    }
}

/// Snapshot of the conversation's identity for persistence
#[derive(Debug, Clone, Serialize)]
pub struct UserContext {
    pub session_id: String,
    pub is_authenticated: bool,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: String,
}

/// Authorization gate over the conversation's auth state
///
/// Reads the in-memory snapshot and re-verifies the stored token against
/// the auth service; it never touches storage directly.
pub struct AuthGate {
    service: Arc<AuthService>,
}

impl AuthGate {
    pub fn new(service: Arc<AuthService>) -> Self {
        Self { service }
    }

    /// Current authenticated user, re-verifying the stored token
    ///
    /// A token that no longer verifies clears the conversation's auth
    /// state; a token that does refreshes the stored snapshot with the
    /// latest user data.
    pub async fn current_user(
        &self,
        state: &mut ConversationAuthState,
    ) -> Option<AuthenticatedUser> {
        if !state.is_authenticated {
            return None;
        }

        let Some(token) = state.auth_token.clone() else {
            return state.authenticated_user.clone();
        };

        match self.service.verify_token(&token).await {
            Ok(fresh) => {
                state.authenticated_user = Some(fresh.clone());
                Some(fresh)
            }
            Err(e) => {
                tracing::debug!(conversation = %state.conversation_id, "stored token no longer valid: {e}");
                state.clear_auth();
                None
            }
        }
    }

    /// Install an authenticated identity into the conversation
    ///
    /// Also mirrors the identity's profile fields into the personalization
    /// snapshot so downstream chat sees a consistent picture.
    pub fn set_authenticated_user(
        state: &mut ConversationAuthState,
        token: String,
        user: AuthenticatedUser,
    ) {
        state.profile = KycProfile {
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            mobile: Some(user.mobile.clone()),
            faculty: Some(user.faculty.clone()),
            password: None,
        };

        tracing::debug!(username = %user.username, "conversation authenticated");
        state.auth_token = Some(token);
        state.authenticated_user = Some(user);
        state.is_authenticated = true;
    }

    /// Whether the conversation currently holds a verified identity
    pub async fn is_authenticated(&self, state: &mut ConversationAuthState) -> bool {
        self.current_user(state).await.is_some()
    }

    /// Effective role for authorization decisions
    ///
    /// Unauthenticated conversations are guests. Unrecognized role strings
    /// from storage degrade to `user`, never to a privileged role.
    pub async fn user_role(&self, state: &mut ConversationAuthState) -> UserRole {
        match self.current_user(state).await {
            Some(user) => user.user_role(),
            None => UserRole::Guest,
        }
    }

    /// Whether the current role satisfies `required`
    pub async fn has_permission(
        &self,
        state: &mut ConversationAuthState,
        required: UserRole,
    ) -> bool {
        self.user_role(state).await >= required
    }

    /// Guard: any authenticated identity
    ///
    /// `Err` carries the user-visible denial message.
    pub async fn require_auth(&self, state: &mut ConversationAuthState) -> Result<(), String> {
        if self.is_authenticated(state).await {
            Ok(())
        } else {
            Err("🔒 Please log in to access this feature.\n\n\
                 To continue, please log in by typing: **I want to login**\n\n\
                 Or create an account by typing: **I want to register**"
                .to_string())
        }
    }

    /// Guard: at least the given role
    pub async fn require_role(
        &self,
        state: &mut ConversationAuthState,
        required: UserRole,
    ) -> Result<(), String> {
        let current = self.user_role(state).await;
        if current >= required {
            Ok(())
        } else {
            Err(format!(
                "🔒 This feature requires {required} access. You have {current} access."
            ))
        }
    }

    /// Identity snapshot attached to persisted interactions
    pub async fn user_context(&self, state: &mut ConversationAuthState) -> UserContext {
        match self.current_user(state).await {
            Some(user) => UserContext {
                session_id: state.conversation_id.clone(),
                is_authenticated: true,
                user_id: Some(user.user_id),
                username: Some(user.username),
                email: Some(user.email),
                role: user.role,
            },
            None => UserContext {
                session_id: state.conversation_id.clone(),
                is_authenticated: false,
                user_id: None,
                username: None,
                email: None,
                role: "guest".to_string(),
            },
        }
    }
}
