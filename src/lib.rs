//! # Pharos
//!
//! Multi-provider LLM streaming with a loss-tolerant conversation core.
//!
//! ## Layers
//!
//! - **Stream ingestion** ([`streaming`], [`providers`]): turns a provider's
//!   HTTP response (SSE, newline-delimited JSON or a buffered body) into one
//!   uniform sequence of [`DeltaEvent`]s. OpenAI-compatible endpoints
//!   (OpenAI, DeepSeek, Huoshan), Anthropic, Gemini, Qwen and OpenRouter are
//!   supported. Failures never escape as errors; they become an error event.
//! - **Conversation reconciler** ([`reconciler`]): owns the transcripts,
//!   applies deltas to the right assistant message even after the user
//!   switched conversations, merges back replies a stale transcript dropped,
//!   and debounces saves to a [`ConversationStore`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pharos::{
//!     ChatSettings, JsonFileStore, ProviderConfig, Reconciler, ReconcilerConfig, SendOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _guard = pharos::telemetry::init_from_env()?;
//!
//!     let store = JsonFileStore::open("./conversations").await?;
//!     let reconciler = Reconciler::open(
//!         Arc::new(store),
//!         Arc::new(ProviderConfig::from_env()),
//!         ChatSettings::default(),
//!         ReconcilerConfig::default(),
//!     )
//!     .await?;
//!
//!     let mut events = reconciler.subscribe();
//!     let handle = reconciler
//!         .send_message("Hello!", SendOptions::default().with_model("gpt-4o"))
//!         .await?;
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let outcome = handle.wait().await?;
//!     println!("{:?}: {}", outcome.status, outcome.content);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod persistence;
pub mod providers;
pub mod reconciler;
pub mod streaming;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use config::{
    ChatSettings, HttpConfig, PromptOverride, PromptType, ProviderConfig, ProviderCredentials,
    ReconcilerConfig, SendOptions,
};
pub use error::ChatError;
pub use persistence::{ConversationStore, JsonFileStore, MemoryStore};
pub use providers::{ModelCatalog, ProviderAdapter, ProviderKind};
pub use reconciler::{
    Reconciler, ReconcilerBuilder, SendHandle, StreamOutcome, TranscriptEvent,
};
pub use streaming::{DeltaStream, HttpTransport, StreamSession, Transport, open_delta_stream};
pub use telemetry::{LangfuseExporter, Telemetry, TelemetryExporter};
pub use types::{
    Conversation, ConversationSummary, DeltaEvent, DeltaKind, Message, Role, StreamStatus, Usage,
};
pub use utils::CancelHandle;

/// Common imports.
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{ChatError, ErrorCategory};
    pub use crate::persistence::*;
    pub use crate::providers::{ModelCatalog, ProviderKind};
    pub use crate::reconciler::{Reconciler, SendHandle, StreamOutcome, TranscriptEvent};
    pub use crate::types::*;
}
