//! Mock API tests: the reqwest transport against provider-shaped responses
//!
//! Uses wiremock to simulate provider endpoints.

use std::sync::Arc;

use futures_util::StreamExt;
use pharos::providers::{ChatTurn, RequestContext};
use pharos::{DeltaEvent, DeltaKind, HttpConfig, HttpTransport, ProviderAdapter, ProviderKind, Role};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run(server: &MockServer, kind: ProviderKind, model: &str, stream: bool) -> Vec<DeltaEvent> {
    let adapter = ProviderAdapter::for_provider(kind);
    let history = vec![ChatTurn::new(Role::User, "9.9和9.11谁大")];
    let base_url = server.uri();
    let request = adapter.build_request(&RequestContext {
        model,
        system_prompt: None,
        messages: &history,
        stream,
        max_tokens: 1024,
        api_key: "test-api-key",
        base_url: &base_url,
    });
    let transport = Arc::new(HttpTransport::new(&HttpConfig::default()).expect("client"));
    pharos::open_delta_stream(transport, request, adapter)
        .collect()
        .await
}

#[tokio::test]
async fn openai_sse_stream_through_http() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"9.9 \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"比 9.11 \"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"大。\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(json!({"model": "gpt-4o", "stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let events = run(&mock_server, ProviderKind::OpenAi, "gpt-4o", true).await;
    let content: String = events
        .iter()
        .filter(|e| e.kind == DeltaKind::Content)
        .map(|e| e.text.as_str())
        .collect();
    assert_eq!(content, "9.9 比 9.11 大。");
    assert_eq!(events.last(), Some(&DeltaEvent::done(None)));
}

#[tokio::test]
async fn unauthorized_status_becomes_error_event() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {
                "message": "Incorrect API key provided",
                "type": "invalid_request_error"
            }
        })))
        .mount(&mock_server)
        .await;

    let events = run(&mock_server, ProviderKind::DeepSeek, "deepseek-chat", true).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, DeltaKind::Error);
    assert_eq!(events[0].status, Some(401));
    assert_eq!(events[0].text, "HTTP 401: Incorrect API key provided");
}

#[tokio::test]
async fn gateway_html_page_gets_a_readable_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_raw("<html><body>502 Bad Gateway</body></html>", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let events = run(&mock_server, ProviderKind::OpenAi, "gpt-4o", true).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, Some(502));
    assert!(!events[0].text.contains("<html>"));
}

#[tokio::test]
async fn anthropic_buffered_message_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-api-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_01XFDUDYJgAACzvnptvVoYEL",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Hello! How can I help you today?"}],
            "model": "claude-3-7-sonnet-20250219",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 15}
        })))
        .mount(&mock_server)
        .await;

    let events = run(
        &mock_server,
        ProviderKind::Claude,
        "claude-3-7-sonnet-20250219",
        false,
    )
    .await;
    assert_eq!(events[0], DeltaEvent::content("Hello! How can I help you today?"));
    let done = events.last().expect("terminal event");
    assert_eq!(done.kind, DeltaKind::Done);
    assert_eq!(done.usage.map(|u| u.total_tokens), Some(25));
}

#[tokio::test]
async fn gemini_stream_uses_sse_endpoint() {
    let mock_server = MockServer::start().await;
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}],\"role\":\"model\"}}]}\r\n\r\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" there\"}],\"role\":\"model\"},\"finishReason\":\"STOP\"}],",
        "\"usageMetadata\":{\"promptTokenCount\":3,\"candidatesTokenCount\":2,\"totalTokenCount\":5}}\r\n\r\n",
    );

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:streamGenerateContent"))
        .and(header("x-goog-api-key", "test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let events = run(&mock_server, ProviderKind::Gemini, "gemini-2.0-flash", true).await;
    assert_eq!(
        events,
        vec![
            DeltaEvent::content("Hi"),
            DeltaEvent::content(" there"),
            DeltaEvent::done(Some(pharos::Usage::new(3, 2))),
        ]
    );
}
