//! Provider fixtures decoded end to end

use pharos::{DeltaKind, ProviderAdapter, ProviderKind, StreamSession, StreamStatus, Usage};

#[path = "../support/stream_fixture.rs"]
mod support;

use support::{CannedTransport, collect_deltas, joined, load_sse_fixture_as_bytes};

async fn run_fixture(path: &str, kind: ProviderKind) -> Vec<pharos::DeltaEvent> {
    let bytes = load_sse_fixture_as_bytes(path).expect("load fixture");
    collect_deltas(CannedTransport::sse(bytes), ProviderAdapter::for_provider(kind)).await
}

#[tokio::test]
async fn openai_reasoning_then_content_fixture() {
    let events = run_fixture(
        "tests/fixtures/openai/reasoning_then_content.sse",
        ProviderKind::DeepSeek,
    )
    .await;

    assert_eq!(joined(&events, DeltaKind::Reasoning), "比较小数部分");
    assert_eq!(joined(&events, DeltaKind::Content), "9.9更大");

    let last = events.last().expect("terminal event");
    assert_eq!(last.kind, DeltaKind::Done);
    assert_eq!(last.usage, Some(Usage::new(12, 30)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn openai_body_without_usage_ends_with_done() {
    let events = run_fixture("tests/fixtures/openai/content_only.sse", ProviderKind::OpenAi).await;

    let kinds: Vec<DeltaKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![DeltaKind::Content, DeltaKind::Content, DeltaKind::Done]
    );
    assert_eq!(joined(&events, DeltaKind::Content), "Hello world");
    assert_eq!(events[2].usage, None);
}

#[tokio::test]
async fn openai_final_message_is_reconciled_not_appended() {
    let events = run_fixture(
        "tests/fixtures/openai/deltas_then_final_message.sse",
        ProviderKind::OpenAi,
    )
    .await;

    assert_eq!(joined(&events, DeltaKind::Content), "Hello");
    let done = events.last().expect("terminal event");
    assert_eq!(done.kind, DeltaKind::Done);
    assert_eq!(done.text, "Hello");

    let mut session = StreamSession::new("conv", "msg");
    for event in &events {
        session.apply(event);
    }
    assert_eq!(session.status(), StreamStatus::Completed);
    assert_eq!(session.content(), "Hello");
}

#[tokio::test]
async fn anthropic_thinking_and_text_fixture() {
    let events = run_fixture(
        "tests/fixtures/anthropic/thinking_and_text.sse",
        ProviderKind::Claude,
    )
    .await;

    assert_eq!(joined(&events, DeltaKind::Reasoning), "Compare decimals.");
    assert_eq!(joined(&events, DeltaKind::Content), "Hello world");
    let done = events.last().expect("terminal event");
    assert_eq!(done.kind, DeltaKind::Done);
    let usage = done.usage.expect("usage");
    assert_eq!(usage.prompt_tokens, 25);
    assert_eq!(usage.completion_tokens, 11);
}

#[tokio::test]
async fn anthropic_error_event_keeps_partial_content() {
    let events = run_fixture(
        "tests/fixtures/anthropic/overloaded_error.sse",
        ProviderKind::Claude,
    )
    .await;

    assert_eq!(joined(&events, DeltaKind::Content), "Partial");
    let last = events.last().expect("terminal event");
    assert_eq!(last.kind, DeltaKind::Error);
    assert_eq!(last.text, "Overloaded");
    assert_eq!(last.status, Some(529));
}

#[tokio::test]
async fn gemini_thought_parts_become_reasoning() {
    let events = run_fixture(
        "tests/fixtures/gemini/thought_and_text.sse",
        ProviderKind::Gemini,
    )
    .await;

    assert_eq!(joined(&events, DeltaKind::Reasoning), "Thinking about decimals");
    assert_eq!(joined(&events, DeltaKind::Content), "9.9 is larger");
    let done = events.last().expect("terminal event");
    assert_eq!(done.kind, DeltaKind::Done);
    assert_eq!(
        done.usage,
        Some(Usage {
            prompt_tokens: 8,
            completion_tokens: 11,
            total_tokens: 19,
        })
    );
}

#[tokio::test]
async fn qwen_reasoning_content_fixture() {
    let events = run_fixture("tests/fixtures/qwen/qwq_reasoning.sse", ProviderKind::Qwen).await;

    assert_eq!(joined(&events, DeltaKind::Reasoning), "嗯，先比较整数部分");
    assert_eq!(joined(&events, DeltaKind::Content), "9.9更大");
    assert_eq!(events.last().map(|e| e.kind), Some(DeltaKind::Done));
}

#[tokio::test]
async fn openrouter_reasoning_field_and_comments() {
    let events = run_fixture(
        "tests/fixtures/openrouter/reasoning_field.sse",
        ProviderKind::OpenRouter,
    )
    .await;

    assert_eq!(joined(&events, DeltaKind::Reasoning), "Let me think.");
    assert_eq!(joined(&events, DeltaKind::Content), "Answer");
    let done = events.last().expect("terminal event");
    assert_eq!(done.usage, Some(Usage::new(9, 14)));
}
