//! Langfuse Exporter
//!
//! Sends each generation as a trace plus generation observation, and user
//! feedback as a score, through the batch ingestion endpoint.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{FeedbackRecord, GenerationRecord, TelemetryExporter};
use crate::error::ChatError;
use crate::types::StreamStatus;

pub const DEFAULT_LANGFUSE_HOST: &str = "https://cloud.langfuse.com";

/// Langfuse exporter
pub struct LangfuseExporter {
    client: Client,
    host: String,
    public_key: String,
    secret_key: SecretString,
}

#[derive(Debug, Serialize)]
struct IngestionEvent {
    id: String,
    timestamp: String,
    #[serde(rename = "type")]
    event_type: &'static str,
    body: Value,
}

impl IngestionEvent {
    fn new(event_type: &'static str, body: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            event_type,
            body,
        }
    }
}

impl LangfuseExporter {
    pub fn new(
        host: impl Into<String>,
        public_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        let host: String = host.into();
        Self {
            client: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            public_key: public_key.into(),
            secret_key: SecretString::from(secret_key.into()),
        }
    }

    /// Reads `LANGFUSE_PUBLIC_KEY`, `LANGFUSE_SECRET_KEY` and `LANGFUSE_HOST`.
    /// Returns `None` unless both keys are set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let public_key = lookup("LANGFUSE_PUBLIC_KEY").filter(|k| !k.is_empty())?;
        let secret_key = lookup("LANGFUSE_SECRET_KEY").filter(|k| !k.is_empty())?;
        let host = lookup("LANGFUSE_HOST")
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGFUSE_HOST.to_string());
        Some(Self::new(host, public_key, secret_key))
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn generation_batch(record: &GenerationRecord) -> Vec<IngestionEvent> {
        let level = match record.status {
            StreamStatus::Failed => "ERROR",
            StreamStatus::Cancelled => "WARNING",
            _ => "DEFAULT",
        };
        let trace = json!({
            "id": record.trace_id,
            "name": "chat",
            "input": record.messages,
            "metadata": {"provider": record.provider},
        });
        let mut generation = json!({
            "id": record.message_id,
            "traceId": record.trace_id,
            "name": format!("{}/{}", record.provider, record.model),
            "model": record.model,
            "startTime": record.started_at.to_rfc3339(),
            "endTime": record.finished_at.to_rfc3339(),
            "input": {"system": record.prompt, "messages": record.messages},
            "output": record.response,
            "level": level,
            "metadata": {"status": record.status, "reasoning": record.reasoning},
        });
        if let Some(usage) = record.usage {
            generation["usage"] = json!({
                "input": usage.prompt_tokens,
                "output": usage.completion_tokens,
                "total": usage.total_tokens,
                "unit": "TOKENS",
            });
        }
        if let Some(error) = &record.error {
            generation["statusMessage"] = Value::String(error.clone());
        }
        vec![
            IngestionEvent::new("trace-create", trace),
            IngestionEvent::new("generation-create", generation),
        ]
    }

    fn feedback_batch(record: &FeedbackRecord) -> Vec<IngestionEvent> {
        let name = if record.score > 0 { "thumbs-up" } else { "thumbs-down" };
        vec![IngestionEvent::new(
            "score-create",
            json!({
                "id": Uuid::new_v4().to_string(),
                "traceId": record.trace_id,
                "observationId": record.message_id,
                "name": name,
                "value": record.score,
                "comment": record.comment,
            }),
        )]
    }

    async fn send_batch(&self, batch: Vec<IngestionEvent>) -> Result<(), ChatError> {
        let url = format!("{}/api/public/ingestion", self.host);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.public_key, Some(self.secret_key.expose_secret()))
            .json(&json!({"batch": batch}))
            .send()
            .await
            .map_err(|e| ChatError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::api_error(
                status,
                format!("Langfuse API error: {body}"),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LangfuseExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LangfuseExporter")
            .field("host", &self.host)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TelemetryExporter for LangfuseExporter {
    async fn export_generation(&self, record: &GenerationRecord) -> Result<(), ChatError> {
        self.send_batch(Self::generation_batch(record)).await
    }

    async fn export_feedback(&self, record: &FeedbackRecord) -> Result<(), ChatError> {
        self.send_batch(Self::feedback_batch(record)).await
    }
}
