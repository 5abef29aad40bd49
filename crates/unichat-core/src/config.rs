//! Configuration management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development. Secrets (the token signing key,
//! LLM API keys) are deployment configuration and always come from the
//! environment in production.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Authentication and session settings
    pub auth: AuthConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Chat pipeline configuration
    pub chat: ChatConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Auth
        if let Ok(secret) = std::env::var("UNICHAT_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(hours) = std::env::var("UNICHAT_TOKEN_TTL_HOURS") {
            config.auth.token_ttl_hours =
                hours.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "UNICHAT_TOKEN_TTL_HOURS".to_string(),
                    value: hours,
                })?;
        }
        if let Ok(keep) = std::env::var("UNICHAT_SESSION_RETENTION") {
            config.auth.session_retention =
                keep.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "UNICHAT_SESSION_RETENTION".to_string(),
                    value: keep,
                })?;
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }

        // Chat
        if let Ok(tokens) = std::env::var("UNICHAT_MAX_INPUT_TOKENS") {
            config.chat.max_input_tokens =
                tokens.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "UNICHAT_MAX_INPUT_TOKENS".to_string(),
                    value: tokens,
                })?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Authentication and session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for HMAC token signing
    pub jwt_secret: String,

    /// Token lifetime in hours
    pub token_ttl_hours: i64,

    /// Prior session records kept per user when a new token is issued.
    ///
    /// Pruning runs before the insert, so the total surviving count is
    /// `session_retention + 1` including the new record.
    pub session_retention: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "development-secret-key-change-in-production".to_string(),
            token_ttl_hours: 24,
            session_retention: 4,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// API key for hosted providers
    pub api_key: Option<String>,

    /// API base URL override (for Azure or compatible APIs)
    pub base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            api_key: None,
            base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Chat pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Approximate token cap on a single user message
    pub max_input_tokens: usize,

    /// Number of chunks requested from the retriever
    pub retrieval_top_k: usize,

    /// Maximum images and videos attached to one reply
    pub media_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_input_tokens: 2000,
            retrieval_top_k: 5,
            media_limit: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.auth.session_retention, 4);
        assert_eq!(config.chat.retrieval_top_k, 5);
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAI
        );
        assert_eq!(
            "Ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("gemini-x".parse::<LlmProvider>().is_err());
    }
}
