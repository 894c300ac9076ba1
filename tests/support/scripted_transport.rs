//! Transport whose response bodies are written by the test, frame by frame
#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use pharos::providers::ProviderRequest;
use pharos::streaming::{Transport, TransportResponse};
use pharos::{
    ChatError, ChatSettings, ConversationStore, ProviderConfig, ProviderCredentials, ProviderKind,
    Reconciler, ReconcilerConfig,
};

type Body = UnboundedReceiver<Result<Bytes, ChatError>>;

#[derive(Default)]
pub struct ScriptedTransport {
    bodies: Mutex<VecDeque<Body>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response for the next request and return its writer
    pub fn script(&self) -> BodyWriter {
        let (tx, rx) = unbounded();
        self.bodies.lock().unwrap().push_back(rx);
        BodyWriter(tx)
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ProviderRequest) -> Result<TransportResponse, ChatError> {
        self.requests.lock().unwrap().push(request.clone());
        let body = self
            .bodies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChatError::HttpError("no scripted response".to_string()))?;
        Ok(TransportResponse {
            status: 200,
            content_type: Some("text/event-stream".to_string()),
            body: Box::pin(body),
        })
    }
}

pub struct BodyWriter(UnboundedSender<Result<Bytes, ChatError>>);

impl BodyWriter {
    /// Send one `data:` frame
    pub fn data(&self, payload: &str) {
        let _ = self
            .0
            .unbounded_send(Ok(Bytes::from(format!("data: {payload}\n\n"))));
    }

    /// OpenAI-style content chunk
    pub fn content(&self, text: &str) {
        let payload = serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]});
        self.data(&payload.to_string());
    }

    /// OpenAI-style reasoning chunk
    pub fn reasoning(&self, text: &str) {
        let payload =
            serde_json::json!({"choices": [{"index": 0, "delta": {"reasoning_content": text}}]});
        self.data(&payload.to_string());
    }

    /// Send the `[DONE]` sentinel and end the body
    pub fn finish(self) {
        self.data("[DONE]");
        self.close();
    }

    pub fn fail(&self, message: &str) {
        let _ = self
            .0
            .unbounded_send(Err(ChatError::StreamError(message.to_string())));
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// End the body
    pub fn close(self) {
        self.0.close_channel();
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Await `future` with a five second limit
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Settings whose default model is served by the scripted OpenAI endpoint
pub fn test_settings() -> ChatSettings {
    ChatSettings {
        default_model: "gpt-4o".to_string(),
        ..ChatSettings::default()
    }
}

pub fn test_providers(base_url: &str) -> Arc<ProviderConfig> {
    Arc::new(ProviderConfig::new().with_provider(
        ProviderKind::OpenAi,
        ProviderCredentials::new(base_url).with_api_key("sk-test"),
    ))
}

/// Reconciler wired to a scripted transport with a short save debounce
pub async fn scripted_reconciler(
    transport: Arc<ScriptedTransport>,
    store: Arc<dyn ConversationStore>,
) -> Reconciler {
    Reconciler::builder()
        .store(store)
        .providers(test_providers("http://scripted.invalid/v1"))
        .transport(transport)
        .settings(test_settings())
        .config(ReconcilerConfig {
            save_debounce: Duration::from_millis(20),
            ..ReconcilerConfig::default()
        })
        .build()
        .await
        .expect("build reconciler")
}
