//! End-to-end KYC flow tests
//!
//! Drives the state machine the way the conversation router does: one raw
//! user message at a time against a single mutable conversation state,
//! backed by the in-memory credential store.

use async_trait::async_trait;
use std::sync::Arc;
use unichat_auth::{
    AuthGate, AuthMode, AuthService, ConversationAuthState, MemoryCredentialStore,
};
use unichat_core::{AuthConfig, CoreError, LlmClient, UserRole};
use unichat_kyc::{KycEvent, KycMachine, KycOutcome};

/// Language model double that always fails
struct BrokenLlm;

#[async_trait]
impl LlmClient for BrokenLlm {
    async fn complete(&self, _prompt: &str) -> unichat_core::Result<String> {
        Err(CoreError::Llm("model offline".to_string()))
    }
}

struct Harness {
    auth: Arc<AuthService>,
    machine: KycMachine,
}

impl Harness {
    fn new(llm: Option<Arc<dyn LlmClient>>) -> Self {
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = Arc::new(AuthService::new(store, AuthConfig::default()));
        let machine = KycMachine::new(auth.clone(), llm);
        Self { auth, machine }
    }

    async fn drive(
        &self,
        state: &mut ConversationAuthState,
        messages: &[&str],
    ) -> Vec<(KycEvent, String)> {
        let mut replies = Vec::new();
        for message in messages {
            match self.machine.handle_message(state, message).await {
                KycOutcome::Consumed { event, reply } => replies.push((event, reply)),
                KycOutcome::NotConsumed => {
                    panic!("message {message:?} was not consumed by the auth flow")
                }
            }
        }
        replies
    }
}

const REGISTRATION_SCRIPT: &[&str] = &[
    "I want to register",
    "Jane Doe",
    "jane@example.com",
    "+201234567890",
    "Engineering",
    "Passw0rd",
];

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_full_registration_drives_steps_and_authenticates() {
    let h = Harness::new(None);
    let mut state = ConversationAuthState::new("conv-1");

    let mut observed_steps = Vec::new();
    for message in REGISTRATION_SCRIPT {
        h.machine.handle_message(&mut state, message).await;
        observed_steps.push(state.kyc_step);
    }

    assert_eq!(observed_steps, vec![1, 2, 3, 4, 5, 0]);
    assert_eq!(state.auth_mode, AuthMode::None);
    assert!(state.is_authenticated);
    assert!(state.auth_token.is_some());

    // kyc_data is emptied by the same turn that completed the flow
    assert!(state.kyc_data.email.is_none());
    assert!(state.kyc_data.password.is_none());

    // The personalization snapshot carries the registered profile
    assert_eq!(state.profile.name.as_deref(), Some("Jane Doe"));
    assert_eq!(state.profile.faculty.as_deref(), Some("Engineering"));

    // The issued token verifies and maps back to the same identity
    let token = state.auth_token.clone().unwrap();
    let view = h.auth.verify_token(&token).await.unwrap();
    assert_eq!(view.email, "jane@example.com");
    assert_eq!(view.role, "user");
    assert_eq!(view.session_id, "conv-1");
}

#[tokio::test]
async fn test_duplicate_email_reprompts_at_step_two() {
    let h = Harness::new(None);

    let mut first = ConversationAuthState::new("conv-1");
    h.drive(&mut first, REGISTRATION_SCRIPT).await;

    let mut second = ConversationAuthState::new("conv-2");
    h.machine.handle_message(&mut second, "I want to register").await;
    h.machine.handle_message(&mut second, "John Doe").await;

    let outcome = h
        .machine
        .handle_message(&mut second, "jane@example.com")
        .await;
    let KycOutcome::Consumed { reply, .. } = outcome else {
        panic!("expected a consumed message");
    };

    assert!(reply.contains("already registered"));
    assert_eq!(second.kyc_step, 2);
    assert!(second.kyc_data.email.is_none());
}

#[tokio::test]
async fn test_registration_reprompts_leave_collected_data_intact() {
    let h = Harness::new(None);
    let mut state = ConversationAuthState::new("conv-1");

    h.drive(&mut state, &["I want to register", "Jane Doe", "jane@example.com"])
        .await;

    // Two bad mobile numbers in a row
    h.machine.handle_message(&mut state, "123").await;
    h.machine.handle_message(&mut state, "not a number").await;

    assert_eq!(state.kyc_step, 3);
    assert_eq!(state.kyc_data.name.as_deref(), Some("Jane Doe"));
    assert_eq!(state.kyc_data.email.as_deref(), Some("jane@example.com"));
    assert!(state.kyc_data.mobile.is_none());
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_after_registration() {
    let h = Harness::new(None);

    let mut register = ConversationAuthState::new("conv-1");
    h.drive(&mut register, REGISTRATION_SCRIPT).await;

    let mut login = ConversationAuthState::new("conv-2");
    let replies = h
        .drive(
            &mut login,
            &["I want to login", "jane@example.com", "Passw0rd"],
        )
        .await;

    let (event, reply) = replies.last().unwrap();
    assert_eq!(*event, KycEvent::LoginComplete);
    assert!(reply.contains("Welcome back Jane Doe"));

    assert!(login.is_authenticated);
    assert_eq!(login.kyc_step, 0);
    assert_eq!(login.auth_mode, AuthMode::None);

    let view = login.authenticated_user.as_ref().unwrap();
    assert_eq!(view.session_id, "conv-2");
}

#[tokio::test]
async fn test_failed_login_allows_retry_without_redeclaring() {
    let h = Harness::new(None);

    let mut register = ConversationAuthState::new("conv-1");
    h.drive(&mut register, REGISTRATION_SCRIPT).await;

    let mut login = ConversationAuthState::new("conv-2");
    let replies = h
        .drive(
            &mut login,
            &["I want to login", "jane@example.com", "wrong-password1"],
        )
        .await;
    assert_eq!(replies.last().unwrap().0, KycEvent::LoginFailed);
    assert_eq!(login.kyc_step, 1);
    assert_eq!(login.auth_mode, AuthMode::Login);

    // The very next message is treated as the email again, no new intent
    // declaration needed
    let replies = h.drive(&mut login, &["jane@example.com", "Passw0rd"]).await;
    assert_eq!(replies.last().unwrap().0, KycEvent::LoginComplete);
    assert!(login.is_authenticated);
}

// =============================================================================
// Session retention
// =============================================================================

#[tokio::test]
async fn test_repeated_logins_bound_session_records() {
    let h = Harness::new(None);

    let mut register = ConversationAuthState::new("conv-0");
    h.drive(&mut register, REGISTRATION_SCRIPT).await;

    for i in 1..=7 {
        let mut login = ConversationAuthState::new(format!("conv-{i}"));
        h.drive(
            &mut login,
            &["I want to login", "jane@example.com", "Passw0rd"],
        )
        .await;
    }

    let user = h
        .auth
        .store()
        .find_user_by_email_or_username("jane@example.com")
        .await
        .unwrap()
        .unwrap();
    let sessions = h.auth.store().find_sessions_by_user(&user.id).await.unwrap();

    assert_eq!(sessions.len(), AuthConfig::default().session_retention + 1);
}

// =============================================================================
// Classifier degradation
// =============================================================================

#[tokio::test]
async fn test_flow_starts_even_with_broken_model() {
    let h = Harness::new(Some(Arc::new(BrokenLlm)));
    let mut state = ConversationAuthState::new("conv-1");

    let outcome = h.machine.handle_message(&mut state, "I want to login").await;
    assert!(matches!(
        outcome,
        KycOutcome::Consumed {
            event: KycEvent::Login,
            ..
        }
    ));
    assert_eq!(state.kyc_step, 1);

    // And a message with no keyword still falls through to normal chat
    let mut idle = ConversationAuthState::new("conv-2");
    let outcome = h
        .machine
        .handle_message(&mut idle, "tell me about the campus")
        .await;
    assert!(matches!(outcome, KycOutcome::NotConsumed));
}

// =============================================================================
// Authorization over the completed flow
// =============================================================================

#[tokio::test]
async fn test_registered_user_permissions() {
    let h = Harness::new(None);
    let mut state = ConversationAuthState::new("conv-1");
    h.drive(&mut state, REGISTRATION_SCRIPT).await;

    let gate = AuthGate::new(h.auth.clone());
    assert!(gate.has_permission(&mut state, UserRole::Guest).await);
    assert!(gate.has_permission(&mut state, UserRole::User).await);
    assert!(!gate.has_permission(&mut state, UserRole::Admin).await);
    assert!(gate.require_auth(&mut state).await.is_ok());
}
