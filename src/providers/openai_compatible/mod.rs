//! OpenAI-Compatible Providers
//!
//! Providers that speak the chat-completions wire format but need extra
//! request fields or headers, or read reasoning from a different field.

pub mod openrouter;
pub mod qwen;

pub use openrouter::OpenRouterAdapter;
pub use qwen::QwenAdapter;
