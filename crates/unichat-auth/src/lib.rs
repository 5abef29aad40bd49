//! Authentication and authorization for the admissions chatbot
//!
//! This crate provides the credential side of the conversation flow:
//! - Password hashing with Argon2
//! - Token generation and validation
//! - The authentication service (registration, login, session lifecycle)
//! - An in-memory credential store for tests and single-instance setups
//! - Per-conversation auth state and role-based guards

pub mod jwt;
pub mod password;
pub mod service;
pub mod session;
pub mod store;

pub use jwt::{decode_token, encode_token, Claims, TokenError};
pub use password::{hash_password, verify_password, PasswordError};
pub use service::{AuthError, AuthService};
pub use session::{AuthGate, AuthMode, ConversationAuthState, UserContext};
pub use store::MemoryCredentialStore;
