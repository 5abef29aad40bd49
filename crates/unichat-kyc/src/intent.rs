//! Authentication intent detection
//!
//! Classifies a free-text message as a registration request, a login
//! request, or neither. The primary path asks the language model with a
//! closed-vocabulary prompt; any model failure degrades to keyword
//! matching, and no failure ever propagates to the caller. A caller must
//! treat `None` identically whether it came from a confident
//! classification or from total failure.

use unichat_core::LlmClient;

/// Detected authentication intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Register,
    Login,
}

/// Login phrases, checked first: "login" is a likelier stand-alone action
/// signal than the overlapping substrings in the register list.
const LOGIN_KEYWORDS: &[&str] = &[
    "i want to login",
    "i want to log in",
    "login",
    "log in",
    "sign in",
    "access my account",
    "my account",
    "signin",
];

const REGISTER_KEYWORDS: &[&str] = &[
    "i want to register",
    "i want to apply",
    "register",
    "sign up",
    "signup",
    "create account",
    "i want to enroll",
    "apply now",
    "start application",
];

fn intent_prompt(message: &str) -> String {
    format!(
        r#"You are an intent detection system for a university chatbot.

Analyze this user message and determine the user's intent:

User message: "{message}"

Respond with ONLY one of these words:
- "REGISTER" if the user wants to register, create account, sign up, or apply for university
- "LOGIN" if the user wants to login, sign in, or access their existing account
- "NONE" if neither intent is detected

Examples:
- "I want to register" -> REGISTER
- "I want to login" -> LOGIN
- "Create my account" -> REGISTER
- "Sign in" -> LOGIN
- "I want to apply" -> REGISTER
- "Access my account" -> LOGIN
- "How do I apply?" -> NONE (just asking, not expressing intent)

Response (REGISTER/LOGIN/NONE):"#
    )
}

/// Classify a message, using the model when available
///
/// Model unavailability, errors, and empty replies all fall back to
/// [`keyword_intent`]; an answer outside the closed vocabulary means no
/// intent.
pub async fn classify_intent(llm: Option<&dyn LlmClient>, message: &str) -> Option<Intent> {
    let Some(llm) = llm else {
        return keyword_intent(message);
    };

    match llm.complete(&intent_prompt(message)).await {
        Ok(reply) => {
            let answer = reply.trim().to_uppercase();
            if answer.is_empty() {
                tracing::debug!("intent model returned empty reply, using keyword fallback");
                return keyword_intent(message);
            }
            match answer.as_str() {
                "REGISTER" => Some(Intent::Register),
                "LOGIN" => Some(Intent::Login),
                _ => None,
            }
        }
        Err(e) => {
            tracing::debug!("intent model failed ({e}), using keyword fallback");
            keyword_intent(message)
        }
    }
}

/// Keyword-containment fallback classification
pub fn keyword_intent(message: &str) -> Option<Intent> {
    let message = message.trim().to_lowercase();

    for keyword in LOGIN_KEYWORDS {
        if message.contains(keyword) {
            return Some(Intent::Login);
        }
    }

    for keyword in REGISTER_KEYWORDS {
        if message.contains(keyword) {
            return Some(Intent::Register);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use unichat_core::{CoreError, Result};

    /// Model double with a fixed reply or a forced failure
    struct FixedLlm(Option<String>);

    #[async_trait]
    impl unichat_core::LlmClient for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            match &self.0 {
                Some(reply) => Ok(reply.clone()),
                None => Err(CoreError::Llm("model offline".to_string())),
            }
        }
    }

    #[test]
    fn test_keyword_intent() {
        assert_eq!(keyword_intent("I want to login"), Some(Intent::Login));
        assert_eq!(keyword_intent("Sign In please"), Some(Intent::Login));
        assert_eq!(keyword_intent("i want to register"), Some(Intent::Register));
        assert_eq!(keyword_intent("APPLY NOW"), Some(Intent::Register));
        assert_eq!(keyword_intent("what are the tuition fees?"), None);
    }

    #[test]
    fn test_login_keywords_take_precedence() {
        // Contains substrings from both lists; login is checked first
        assert_eq!(
            keyword_intent("login to register my courses"),
            Some(Intent::Login)
        );
    }

    #[tokio::test]
    async fn test_model_answer_mapping() {
        let llm = FixedLlm(Some(" register \n".to_string()));
        assert_eq!(
            classify_intent(Some(&llm), "quiero registrarme").await,
            Some(Intent::Register)
        );

        let llm = FixedLlm(Some("NONE".to_string()));
        assert_eq!(classify_intent(Some(&llm), "how do I apply?").await, None);

        // Out-of-vocabulary answers mean no intent
        let llm = FixedLlm(Some("MAYBE".to_string()));
        assert_eq!(classify_intent(Some(&llm), "hello").await, None);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_keywords() {
        let llm = FixedLlm(None);
        assert_eq!(
            classify_intent(Some(&llm), "I want to login").await,
            Some(Intent::Login)
        );

        // Empty model reply also falls back
        let llm = FixedLlm(Some("".to_string()));
        assert_eq!(
            classify_intent(Some(&llm), "I want to login").await,
            Some(Intent::Login)
        );
    }

    #[tokio::test]
    async fn test_no_model_uses_keywords() {
        assert_eq!(
            classify_intent(None, "create account").await,
            Some(Intent::Register)
        );
        assert_eq!(classify_intent(None, "hello there").await, None);
    }
}
