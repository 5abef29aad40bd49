//! The KYC/login conversation state machine
//!
//! Every inbound message passes through [`KycMachine::handle_message`]
//! first. While no flow is active, the intent classifier decides whether to
//! start one; once a flow is active it consumes every message until it
//! terminates. Field failures re-prompt without advancing; completion hands
//! off to the auth service and resets the dialogue in the same turn.
//!
//! The machine assumes strictly ordered, one-at-a-time message delivery per
//! conversation and performs no internal locking.

use crate::intent::{classify_intent, Intent};
use crate::validators::{
    validate_email, validate_faculty, validate_mobile, validate_name, validate_password,
};
use std::sync::Arc;
use unichat_auth::{AuthError, AuthGate, AuthMode, AuthService, ConversationAuthState};
use unichat_core::LlmClient;

const REGISTER_INTRO: &str = "Great! I'll help you register. Let's start with your information.\n\n\
    📋 **Required Information:**\n\
    • Full Name\n\
    • Email Address\n\
    • Mobile Number\n\
    • Faculty/Department\n\
    • Password\n\n\
    Please provide your **full name**:";

const LOGIN_INTRO: &str = "Welcome back! Please provide your login credentials.\n\n\
    Please enter your **email address**:";

const NAME_RETRY: &str =
    "Please enter a valid name (at least 2 characters, only letters and spaces):";
const EMAIL_RETRY: &str = "Please enter a valid email address:";
const EMAIL_TAKEN: &str = "This email is already registered. Please use a different email \
    address or try logging in instead:";
const MOBILE_PROMPT: &str =
    "Great! Now please provide your **mobile number** (include country code if international):";
const MOBILE_RETRY: &str =
    "Please enter a valid mobile number (10-15 digits, may include country code):";
const FACULTY_PROMPT: &str = "Perfect! Now please tell me your **faculty or department** \
    (e.g., Engineering, Business, etc.):";
const FACULTY_RETRY: &str =
    "Please enter a valid faculty/department name (at least 2 characters):";
const PASSWORD_PROMPT: &str = "Excellent! Finally, please create a **password** for your \
    account (minimum 8 characters, include letters and numbers):";
const PASSWORD_RETRY: &str = "Password must be at least 8 characters long and include both \
    letters and numbers. Please try again:";
const LOGIN_PASSWORD_PROMPT: &str = "Please enter your **password**:";

const REGISTER_FAILED_DUPLICATE: &str =
    "❌ Registration failed: Email already exists or invalid data provided.";
const REGISTER_FAILED_TECHNICAL: &str =
    "❌ Registration failed due to a technical error. Please try again.";
const LOGIN_FAILED_CREDENTIALS: &str =
    "❌ Login failed: Invalid email or password. Please try again.";
const LOGIN_FAILED_TECHNICAL: &str =
    "❌ Login failed due to a technical error. Please try again.";

/// What a consumed message meant to the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycEvent {
    /// Registration flow started or advanced (including re-prompts)
    Register,
    /// Login flow started or advanced (including re-prompts)
    Login,
    RegisterComplete,
    RegisterFailed,
    LoginComplete,
    LoginFailed,
}

/// Result of feeding one message through the machine
#[derive(Debug)]
pub enum KycOutcome {
    /// No flow active and no intent detected; normal chat handling proceeds
    NotConsumed,
    /// The message belonged to the auth flow; `reply` goes to the user
    Consumed { event: KycEvent, reply: String },
}

impl KycOutcome {
    fn consumed(event: KycEvent, reply: impl Into<String>) -> Self {
        Self::Consumed {
            event,
            reply: reply.into(),
        }
    }
}

/// The per-conversation KYC/login dialogue driver
pub struct KycMachine {
    auth: Arc<AuthService>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl KycMachine {
    /// Create a machine over the auth service, optionally with a language
    /// model for intent detection
    pub fn new(auth: Arc<AuthService>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { auth, llm }
    }

    /// Feed one user message through the dialogue
    pub async fn handle_message(
        &self,
        state: &mut ConversationAuthState,
        message: &str,
    ) -> KycOutcome {
        if state.kyc_step == 0 {
            return self.detect_and_start(state, message).await;
        }

        match state.auth_mode {
            AuthMode::Register => self.registration_step(state, message).await,
            AuthMode::Login => self.login_step(state, message).await,
            AuthMode::None => KycOutcome::NotConsumed,
        }
    }

    /// Idle state: run the classifier and start a flow on intent
    async fn detect_and_start(
        &self,
        state: &mut ConversationAuthState,
        message: &str,
    ) -> KycOutcome {
        match classify_intent(self.llm.as_deref(), message).await {
            Some(Intent::Register) => {
                state.auth_mode = AuthMode::Register;
                state.kyc_step = 1;
                tracing::info!(conversation = %state.conversation_id, "registration flow started");
                KycOutcome::consumed(KycEvent::Register, REGISTER_INTRO)
            }
            Some(Intent::Login) => {
                state.auth_mode = AuthMode::Login;
                state.kyc_step = 1;
                tracing::info!(conversation = %state.conversation_id, "login flow started");
                KycOutcome::consumed(KycEvent::Login, LOGIN_INTRO)
            }
            None => KycOutcome::NotConsumed,
        }
    }

    /// Registration steps 1-5: name, email, mobile, faculty, password
    async fn registration_step(
        &self,
        state: &mut ConversationAuthState,
        message: &str,
    ) -> KycOutcome {
        match state.kyc_step {
            1 => {
                if validate_name(message) {
                    let name = message.trim().to_string();
                    let reply = format!(
                        "Thank you, {name}! Now please provide your **email address**:"
                    );
                    state.kyc_data.name = Some(name);
                    state.kyc_step = 2;
                    KycOutcome::consumed(KycEvent::Register, reply)
                } else {
                    KycOutcome::consumed(KycEvent::Register, NAME_RETRY)
                }
            }
            2 => {
                if !validate_email(message) {
                    return KycOutcome::consumed(KycEvent::Register, EMAIL_RETRY);
                }

                let email = message.trim().to_lowercase();
                if self.email_taken(&email).await {
                    return KycOutcome::consumed(KycEvent::Register, EMAIL_TAKEN);
                }

                state.kyc_data.email = Some(email);
                state.kyc_step = 3;
                KycOutcome::consumed(KycEvent::Register, MOBILE_PROMPT)
            }
            3 => {
                if validate_mobile(message) {
                    state.kyc_data.mobile = Some(message.trim().to_string());
                    state.kyc_step = 4;
                    KycOutcome::consumed(KycEvent::Register, FACULTY_PROMPT)
                } else {
                    KycOutcome::consumed(KycEvent::Register, MOBILE_RETRY)
                }
            }
            4 => {
                if validate_faculty(message) {
                    state.kyc_data.faculty = Some(message.trim().to_string());
                    state.kyc_step = 5;
                    KycOutcome::consumed(KycEvent::Register, PASSWORD_PROMPT)
                } else {
                    KycOutcome::consumed(KycEvent::Register, FACULTY_RETRY)
                }
            }
            5 => {
                if !validate_password(message) {
                    return KycOutcome::consumed(KycEvent::Register, PASSWORD_RETRY);
                }

                state.kyc_data.password = Some(message.trim().to_string());
                let (event, reply) = self.complete_registration(state).await;

                // Reset happens in the same turn as the completing message,
                // whether registration succeeded or not. The flow does not
                // retry.
                state.reset_kyc();

                KycOutcome::consumed(event, reply)
            }
            other => {
                tracing::warn!(step = other, "registration flow in unexpected step, resetting");
                state.reset_kyc();
                KycOutcome::NotConsumed
            }
        }
    }

    /// Registration hand-off: persist the account, then authenticate the
    /// conversation with a fresh token
    async fn complete_registration(
        &self,
        state: &mut ConversationAuthState,
    ) -> (KycEvent, String) {
        let profile = state.kyc_data.clone();

        match self
            .auth
            .register_user(&profile, &state.conversation_id)
            .await
        {
            Ok(user_id) => {
                let password = profile.password.as_deref().unwrap_or_default();
                let email = profile.email.as_deref().unwrap_or_default();

                // Log the new user straight in
                match self
                    .auth
                    .authenticate(email, password, &state.conversation_id)
                    .await
                {
                    Ok((token, user)) => {
                        let name = user.name.clone();
                        AuthGate::set_authenticated_user(state, token, user);
                        (
                            KycEvent::RegisterComplete,
                            format!(
                                "✅ Registration successful! Welcome {name}!\n\n\
                                 Your account has been created and you are now logged in. \
                                 You can start using the chatbot with full features."
                            ),
                        )
                    }
                    Err(e) => {
                        tracing::error!(user_id = %user_id, "post-registration login failed: {e}");
                        (
                            KycEvent::RegisterFailed,
                            REGISTER_FAILED_TECHNICAL.to_string(),
                        )
                    }
                }
            }
            Err(AuthError::DuplicateUser) => (
                KycEvent::RegisterFailed,
                REGISTER_FAILED_DUPLICATE.to_string(),
            ),
            Err(e) => {
                tracing::error!("registration failed: {e}");
                (
                    KycEvent::RegisterFailed,
                    REGISTER_FAILED_TECHNICAL.to_string(),
                )
            }
        }
    }

    /// Login steps 1-2: email, then password
    async fn login_step(&self, state: &mut ConversationAuthState, message: &str) -> KycOutcome {
        match state.kyc_step {
            1 => {
                if validate_email(message) {
                    state.kyc_data.email = Some(message.trim().to_lowercase());
                    state.kyc_step = 2;
                    KycOutcome::consumed(KycEvent::Login, LOGIN_PASSWORD_PROMPT)
                } else {
                    KycOutcome::consumed(KycEvent::Login, EMAIL_RETRY)
                }
            }
            2 => {
                // The password gets no format check; whatever was typed is
                // attempted as-is.
                let password = message.trim().to_string();
                let email = state.kyc_data.email.clone().unwrap_or_default();

                match self
                    .auth
                    .authenticate(&email, &password, &state.conversation_id)
                    .await
                {
                    Ok((token, user)) => {
                        let name = user.name.clone();
                        AuthGate::set_authenticated_user(state, token, user);
                        state.reset_kyc();
                        KycOutcome::consumed(
                            KycEvent::LoginComplete,
                            format!(
                                "✅ Login successful! Welcome back {name}!\n\n\
                                 You are now logged in and can use all chatbot features."
                            ),
                        )
                    }
                    Err(e) => {
                        let failure = match e {
                            AuthError::InvalidCredentials => LOGIN_FAILED_CREDENTIALS,
                            other => {
                                tracing::error!("login failed: {other}");
                                LOGIN_FAILED_TECHNICAL
                            }
                        };

                        // Back to step 1 with cleared credentials, but the
                        // login flow stays active: the user retries without
                        // re-declaring intent.
                        state.kyc_step = 1;
                        state.kyc_data.clear();

                        KycOutcome::consumed(
                            KycEvent::LoginFailed,
                            format!(
                                "{failure}\n\nPlease try again. Enter your **email address**:"
                            ),
                        )
                    }
                }
            }
            other => {
                tracing::warn!(step = other, "login flow in unexpected step, resetting");
                state.reset_kyc();
                KycOutcome::NotConsumed
            }
        }
    }

    /// Whether an active account already holds this email
    ///
    /// A storage failure degrades to "available": the duplicate is caught
    /// again at registration time, where it fails safely.
    async fn email_taken(&self, email: &str) -> bool {
        match self.auth.store().find_user_by_email_or_username(email).await {
            Ok(Some(user)) => user.is_active,
            Ok(None) => false,
            Err(e) => {
                tracing::error!("email uniqueness check failed: {e}");
                false
            }
        }
    }
}

/// Greeting shown when a conversation starts
pub fn welcome_message() -> String {
    "🎓 Welcome to the university admissions assistant!\n\n\
     I'm here to help with all your admissions inquiries.\n\n\
     💬 What can I help you with today?\n\n\
     Learn about our faculties and programs\n\
     Get admission requirements and procedures\n\
     Explore campus life and facilities\n\
     Apply for admission (I'll guide you through the process!)\n\n\
     🎯 Available Faculties:\n\
     • Oral & Dental Medicine\n\
     • Pharmacy\n\
     • Commerce & Business Administration\n\
     • Engineering\n\
     • Computer Science\n\
     • Economics & Political Science\n\n\
     Feel free to ask any questions, or if you're ready to apply, just let me know! 🚀"
        .to_string()
}
