//! Error Handling Module
//!
//! This module provides error handling for the chat engine, including:
//! - Core error types (`ChatError`, `ErrorCategory`)
//! - Classification of HTTP error bodies into user-visible messages
//!
//! # Example
//!
//! ```rust
//! use pharos::error::{ChatError, ErrorCategory};
//!
//! let error = ChatError::api_error(429, "Too many requests");
//! assert_eq!(error.category(), ErrorCategory::RateLimit);
//! assert_eq!(error.status_code(), Some(429));
//! ```

mod classify;
mod types;

pub use classify::*;
pub use types::*;
