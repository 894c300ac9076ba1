//! Telemetry and Observability
//!
//! Generation and feedback records are handed to registered exporters on a
//! background task. Exporting is best-effort: failures are logged and never
//! reach the chat flow.
//!
//! ```rust,no_run
//! use pharos::telemetry::{LangfuseExporter, Telemetry};
//!
//! let mut telemetry = Telemetry::new();
//! if let Some(exporter) = LangfuseExporter::from_env() {
//!     telemetry.add_exporter(exporter);
//! }
//! ```

pub mod langfuse;
pub mod subscriber;

pub use langfuse::LangfuseExporter;
pub use subscriber::{OutputFormat, SubscriberConfig, init_from_env, init_subscriber};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::providers::ChatTurn;
use crate::types::{StreamStatus, Usage};

/// One finished (or failed) generation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    /// Conversation id; groups generations of one conversation
    pub trace_id: String,
    /// Assistant message id
    pub message_id: String,
    pub messages: Vec<ChatTurn>,
    pub prompt: Option<String>,
    pub model: String,
    pub provider: String,
    pub response: String,
    pub reasoning: Option<String>,
    pub usage: Option<Usage>,
    pub status: StreamStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// User rating of an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub trace_id: String,
    pub message_id: String,
    /// `1` for thumbs up, `-1` for thumbs down
    pub score: i32,
    pub comment: Option<String>,
}

/// Something telemetry can be sent to.
#[async_trait]
pub trait TelemetryExporter: Send + Sync {
    async fn export_generation(&self, record: &GenerationRecord) -> Result<(), ChatError>;

    async fn export_feedback(&self, _record: &FeedbackRecord) -> Result<(), ChatError> {
        Ok(())
    }
}

/// Fan-out dispatcher over the registered exporters.
#[derive(Clone, Default)]
pub struct Telemetry {
    exporters: Vec<Arc<dyn TelemetryExporter>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exporter(&mut self, exporter: impl TelemetryExporter + 'static) {
        self.exporters.push(Arc::new(exporter));
    }

    pub fn with_exporter(mut self, exporter: impl TelemetryExporter + 'static) -> Self {
        self.add_exporter(exporter);
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.exporters.is_empty()
    }

    /// Export on a spawned task; returns immediately.
    pub fn record_generation(&self, record: GenerationRecord) {
        if !self.is_enabled() {
            return;
        }
        let exporters = self.exporters.clone();
        tokio::spawn(async move {
            for exporter in exporters {
                if let Err(e) = exporter.export_generation(&record).await {
                    tracing::warn!(trace_id = %record.trace_id, error = %e, "Failed to export generation");
                }
            }
        });
    }

    pub fn record_feedback(&self, record: FeedbackRecord) {
        if !self.is_enabled() {
            return;
        }
        let exporters = self.exporters.clone();
        tokio::spawn(async move {
            for exporter in exporters {
                if let Err(e) = exporter.export_feedback(&record).await {
                    tracing::warn!(trace_id = %record.trace_id, error = %e, "Failed to export feedback");
                }
            }
        });
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("exporters", &self.exporters.len())
            .finish()
    }
}
