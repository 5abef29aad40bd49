//! Field validators for the KYC dialogue
//!
//! Pure, stateless predicates. Each takes the raw user message for its
//! step; trimming for storage happens in the state machine after the
//! predicate passes.

use lazy_static::lazy_static;
use regex::Regex;

/// Faculties offered by the university
///
/// Free-text faculty input matching one of these (case-insensitively) is
/// always accepted; other names pass through the looser shape check below.
pub const FACULTIES: &[&str] = &[
    "oral and dental",
    "pharmacy",
    "commerce and business administration",
    "engineering",
    "computer science",
    "economics and political science",
];

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[a-zA-Z\s]+$").unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@]+@[^@]+\.[^@]+$").unwrap();
    static ref MOBILE_RE: Regex = Regex::new(r"^\+?\d{10,15}$").unwrap();
    static ref FACULTY_RE: Regex = Regex::new(r"^[a-zA-Z\s&]+$").unwrap();
}

/// At least 2 characters, only letters and spaces
pub fn validate_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.len() >= 2 && NAME_RE.is_match(trimmed)
}

/// Permissive `local@domain.tld` shape
pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Optional leading `+`, then 10-15 digits, nothing else
pub fn validate_mobile(mobile: &str) -> bool {
    MOBILE_RE.is_match(mobile)
}

/// Known faculty name, or a reasonable free-text one
pub fn validate_faculty(faculty: &str) -> bool {
    let trimmed = faculty.trim();
    if trimmed.len() < 2 {
        return false;
    }

    let lower = trimmed.to_lowercase();
    if FACULTIES.iter().any(|f| *f == lower) {
        return true;
    }

    FACULTY_RE.is_match(trimmed)
}

/// At least 8 characters including at least one letter and one digit
pub fn validate_password(password: &str) -> bool {
    let trimmed = password.trim();
    if trimmed.len() < 8 {
        return false;
    }

    let has_letter = trimmed.chars().any(|c| c.is_alphabetic());
    let has_digit = trimmed.chars().any(|c| c.is_ascii_digit());

    has_letter && has_digit
}
