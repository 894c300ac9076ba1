//! Mock API tests: full exchanges over the reqwest transport

use std::sync::Arc;

use pharos::{
    ChatSettings, MemoryStore, PromptOverride, PromptType, Reconciler, ReconcilerConfig,
    SendOptions, StreamStatus,
};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "../support/scripted_transport.rs"]
mod support;

use support::{test_providers, test_settings, within};

async fn http_reconciler(server: &MockServer, settings: ChatSettings) -> Reconciler {
    Reconciler::open(
        Arc::new(MemoryStore::new()),
        test_providers(&server.uri()),
        settings,
        ReconcilerConfig::default(),
    )
    .await
    .expect("build reconciler")
}

async fn request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].body).expect("json body")
}

#[tokio::test]
async fn streamed_reply_with_global_and_call_prompts() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"比较\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"9.9 更大\"}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":20,\"completion_tokens\":4}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let settings = ChatSettings {
        global_prompt: "Be brief.".to_string(),
        use_global_prompt: true,
        global_prompt_type: PromptType::System,
        ..test_settings()
    };
    let reconciler = http_reconciler(&mock_server, settings).await;

    let handle = reconciler
        .send_message(
            "9.9和9.11谁大",
            SendOptions::default().with_prompt(PromptOverride::system("You are a math tutor.")),
        )
        .await
        .unwrap();
    let outcome = within(handle.wait()).await.unwrap();

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.content, "9.9 更大");
    assert_eq!(outcome.reasoning, "比较");
    assert_eq!(outcome.usage.map(|u| u.total_tokens), Some(24));

    let sent = request_body(&mock_server).await;
    assert_eq!(sent["model"], "gpt-4o");
    assert_eq!(sent["stream"], true);
    assert_eq!(
        sent["messages"],
        json!([
            {"role": "system", "content": "Be brief.\n\nYou are a math tutor."},
            {"role": "user", "content": "9.9和9.11谁大"}
        ])
    );
}

#[tokio::test]
async fn buffered_reply_when_streaming_is_off() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-9",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "whole reply"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })))
        .mount(&mock_server)
        .await;

    let reconciler = http_reconciler(&mock_server, test_settings()).await;
    let handle = reconciler
        .send_message("hi", SendOptions::default().with_stream(false))
        .await
        .unwrap();
    let outcome = within(handle.wait()).await.unwrap();
    assert_eq!(outcome.content, "whole reply");

    let sent = request_body(&mock_server).await;
    assert_eq!(sent["stream"], false);
}

#[tokio::test]
async fn direct_prompt_prefixes_the_user_turn_only_on_the_wire() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Bonjour\"}}]}\n\ndata: [DONE]\n\n",
            "text/event-stream",
        ))
        .mount(&mock_server)
        .await;

    let reconciler = http_reconciler(&mock_server, test_settings()).await;
    let handle = reconciler
        .send_message(
            "hello",
            SendOptions::default().with_prompt(PromptOverride::direct("Translate to French:")),
        )
        .await
        .unwrap();
    within(handle.wait()).await.unwrap();

    let sent = request_body(&mock_server).await;
    assert_eq!(
        sent["messages"],
        json!([{"role": "user", "content": "Translate to French:\n\nhello"}])
    );
    // The transcript keeps what the user typed.
    assert_eq!(reconciler.messages()[0].content, "hello");
}

#[tokio::test]
async fn provider_error_status_is_written_into_the_reply() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "rate_limit_error"}
        })))
        .mount(&mock_server)
        .await;

    let reconciler = http_reconciler(&mock_server, test_settings()).await;
    let handle = reconciler
        .send_message("hi", SendOptions::default())
        .await
        .unwrap();
    let outcome = within(handle.wait()).await.unwrap();

    assert_eq!(outcome.status, StreamStatus::Failed);
    assert_eq!(outcome.content, "Error: HTTP 429: Rate limit reached");
}
