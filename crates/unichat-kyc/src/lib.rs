//! KYC dialogue engine for the admissions chatbot
//!
//! This crate owns the conversational authentication flow:
//! - Field validators for the collected KYC data
//! - Free-text intent detection (LLM with keyword fallback)
//! - The step-indexed state machine driving registration and login

pub mod intent;
pub mod machine;
pub mod validators;

pub use intent::{classify_intent, keyword_intent, Intent};
pub use machine::{welcome_message, KycEvent, KycMachine, KycOutcome};
pub use validators::{
    validate_email, validate_faculty, validate_mobile, validate_name, validate_password,
    FACULTIES,
};
