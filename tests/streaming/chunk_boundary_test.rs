//! Frames and characters split across transport chunks

use bytes::Bytes;
use pharos::{DeltaKind, ProviderAdapter, ProviderKind};

#[path = "../support/stream_fixture.rs"]
mod support;

use support::{CannedTransport, collect_deltas, joined, load_sse_fixture_as_bytes, rechunk};

#[tokio::test]
async fn any_chunk_size_yields_the_same_events() {
    let original = load_sse_fixture_as_bytes("tests/fixtures/openai/reasoning_then_content.sse")
        .expect("load fixture");
    let expected = collect_deltas(
        CannedTransport::sse(original.clone()),
        ProviderAdapter::for_provider(ProviderKind::DeepSeek),
    )
    .await;

    // Small sizes cut through multi-byte characters as well as lines.
    for size in [1, 2, 3, 7, 64] {
        let events = collect_deltas(
            CannedTransport::sse(rechunk(&original, size)),
            ProviderAdapter::for_provider(ProviderKind::DeepSeek),
        )
        .await;
        assert_eq!(events, expected, "chunk size {size}");
    }
}

#[tokio::test]
async fn content_deltas_concatenate_in_arrival_order() {
    let deltas = ["9.9 ", "比 9.11 ", "大。"];
    let mut chunks: Vec<Bytes> = deltas
        .iter()
        .map(|d| {
            let payload = serde_json::json!({"choices": [{"delta": {"content": d}}]});
            Bytes::from(format!("data: {payload}\n\n"))
        })
        .collect();
    chunks.push(Bytes::from_static(b"data: [DONE]\n\n"));

    let events = collect_deltas(
        CannedTransport::sse(chunks),
        ProviderAdapter::for_provider(ProviderKind::OpenAi),
    )
    .await;
    assert_eq!(joined(&events, DeltaKind::Content), deltas.concat());
}
