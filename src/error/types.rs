//! Core error types.

use thiserror::Error;

/// Errors produced by the chat engine.
#[derive(Error, Debug, Clone)]
pub enum ChatError {
    /// HTTP transport failure (connection refused, timeout, broken body)
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Non-success response from a provider API
    #[error("API error {code}: {message}")]
    ApiError {
        /// HTTP status code
        code: u16,
        /// Best-effort message extracted from the response body
        message: String,
    },

    /// Response payload could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failure while reading an in-flight stream
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Missing credential, unknown model or invalid header
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Rejected caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Conversation or message lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempt to remove a message owned by an active stream
    #[error("Message {0} is still streaming")]
    MessageBusy(String),

    /// Durable storage failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Coarse error category used for presentation and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Server,
    Client,
    Authentication,
    RateLimit,
    Parsing,
    Configuration,
    Storage,
    Validation,
}

impl ChatError {
    /// Create an API error from a status code and message.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
        }
    }

    /// HTTP status code when the error originated from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::StreamError(_) => ErrorCategory::Network,
            Self::ApiError { code, .. } => match *code {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Client,
            },
            Self::ParseError(_) | Self::SerializationError(_) => ErrorCategory::Parsing,
            Self::ConfigurationError(_) => ErrorCategory::Configuration,
            Self::InvalidInput(_) | Self::NotFound(_) | Self::MessageBusy(_) => {
                ErrorCategory::Validation
            }
            Self::StorageError(_) => ErrorCategory::Storage,
        }
    }

    /// Message suitable for showing inside a transcript.
    pub fn user_message(&self) -> String {
        match self {
            Self::ApiError { code, message } => format!("HTTP {code}: {message}"),
            Self::HttpError(msg)
            | Self::ParseError(msg)
            | Self::StreamError(msg)
            | Self::ConfigurationError(msg)
            | Self::InvalidInput(msg)
            | Self::NotFound(msg)
            | Self::StorageError(msg)
            | Self::SerializationError(msg) => msg.clone(),
            Self::MessageBusy(_) => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::HttpError(format!("Request timed out: {err}"))
        } else if err.is_connect() {
            Self::HttpError(format!("Connection failed: {err}"))
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}
