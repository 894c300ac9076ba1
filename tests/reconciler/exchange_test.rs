//! Streaming exchanges driven frame by frame

use std::sync::Arc;

use pharos::{
    ChatError, MemoryStore, Role, SendOptions, StreamStatus, TranscriptEvent,
};

#[path = "../support/scripted_transport.rs"]
mod support;

use support::{ScriptedTransport, scripted_reconciler, wait_until, within};

#[tokio::test]
async fn deltas_accumulate_into_the_placeholder() {
    let transport = ScriptedTransport::new();
    let store = Arc::new(MemoryStore::new());
    let reconciler = scripted_reconciler(transport.clone(), store.clone()).await;
    let body = transport.script();

    let handle = reconciler
        .send_message("9.9和9.11谁大", SendOptions::default())
        .await
        .unwrap();

    // Both messages are in the transcript before any delta arrives.
    let messages = reconciler.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].id, handle.assistant_message_id);
    assert_eq!(messages[1].content, "");
    assert!(reconciler.is_streaming());

    body.content("9.9 ");
    body.content("比 9.11 ");
    body.content("大。");
    body.finish();

    let conversation_id = handle.conversation_id.clone();
    let assistant_id = handle.assistant_message_id.clone();
    let outcome = within(handle.wait()).await.unwrap();
    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.content, "9.9 比 9.11 大。");

    let current = reconciler.current().unwrap();
    assert_eq!(current.name, "9.9和9.11谁大");
    assert_eq!(current.find(&assistant_id).unwrap().content, "9.9 比 9.11 大。");
    assert!(!reconciler.is_streaming());

    let saved = store.get(&conversation_id).expect("flushed on completion");
    assert_eq!(saved.find(&assistant_id).unwrap().content, "9.9 比 9.11 大。");
}

#[tokio::test]
async fn reasoning_is_kept_apart_from_content() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;
    let body = transport.script();

    let handle = reconciler
        .send_message("9.9和9.11谁大", SendOptions::default())
        .await
        .unwrap();
    body.reasoning("思考中...");
    body.reasoning("比较小数位");
    body.content("答案是 9.9");
    body.finish();

    let assistant_id = handle.assistant_message_id.clone();
    let outcome = within(handle.wait()).await.unwrap();
    assert_eq!(outcome.content, "答案是 9.9");
    assert_eq!(outcome.reasoning, "思考中...比较小数位");

    let message = reconciler.current().unwrap().find(&assistant_id).cloned().unwrap();
    assert_eq!(message.content, "答案是 9.9");
    assert_eq!(message.reasoning.as_deref(), Some("思考中...比较小数位"));
}

#[tokio::test]
async fn stop_generating_keeps_partial_content() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;
    let body = transport.script();

    let handle = reconciler
        .send_message("写一首诗", SendOptions::default())
        .await
        .unwrap();
    let assistant_id = handle.assistant_message_id.clone();

    body.content("部分回答");
    wait_until(|| {
        reconciler
            .messages()
            .iter()
            .any(|m| m.id == assistant_id && m.content == "部分回答")
    })
    .await;

    assert_eq!(reconciler.stop_generating().await, 1);
    // Frames that still arrive are not applied.
    body.content("不应出现");

    let outcome = within(handle.wait()).await.unwrap();
    assert_eq!(outcome.status, StreamStatus::Cancelled);
    assert_eq!(outcome.content, "部分回答");

    wait_until(|| body.is_closed()).await;
    let message = reconciler.current().unwrap().find(&assistant_id).cloned().unwrap();
    assert_eq!(message.content, "部分回答");
    assert!(!reconciler.is_streaming());
    assert_eq!(reconciler.stop_generating().await, 0);
}

#[tokio::test]
async fn stream_follows_its_conversation_after_a_switch() {
    let transport = ScriptedTransport::new();
    let store = Arc::new(MemoryStore::new());
    let reconciler = scripted_reconciler(transport.clone(), store.clone()).await;

    let original = reconciler.current_id();
    let other = reconciler.new_conversation().await;
    reconciler.switch_conversation(&original).await.unwrap();

    let body = transport.script();
    let handle = reconciler
        .send_message("讲个故事", SendOptions::default())
        .await
        .unwrap();
    assert_eq!(handle.conversation_id, original);

    body.content("从前");
    reconciler.switch_conversation(&other).await.unwrap();
    assert!(!reconciler.is_streaming());
    body.content("有座山");
    body.finish();

    let assistant_id = handle.assistant_message_id.clone();
    let outcome = within(handle.wait()).await.unwrap();
    assert_eq!(outcome.content, "从前有座山");

    assert_eq!(reconciler.current_id(), other);
    assert!(reconciler.messages().is_empty());

    let saved = store.get(&original).expect("original conversation saved");
    assert_eq!(saved.find(&assistant_id).unwrap().content, "从前有座山");
    let other_saved = reconciler.conversation(&other).unwrap();
    assert!(other_saved.find(&assistant_id).is_none());
}

#[tokio::test]
async fn transport_error_keeps_partial_output() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;
    let body = transport.script();

    let handle = reconciler
        .send_message("hello", SendOptions::default())
        .await
        .unwrap();
    body.content("Hel");
    body.fail("connection reset");

    let outcome = within(handle.wait()).await.unwrap();
    assert_eq!(outcome.status, StreamStatus::Failed);
    assert!(outcome.content.starts_with("Hel"));
    assert!(outcome.content.contains("[Error:"));
    assert!(outcome.content.contains("connection reset"));
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn burst_of_deltas_is_saved_a_bounded_number_of_times() {
    let transport = ScriptedTransport::new();
    let store = Arc::new(MemoryStore::new());
    let reconciler = scripted_reconciler(transport.clone(), store.clone()).await;
    let body = transport.script();

    let handle = reconciler
        .send_message("count", SendOptions::default())
        .await
        .unwrap();
    for i in 0..50 {
        body.content(&format!("{i},"));
    }
    body.finish();

    let outcome = within(handle.wait()).await.unwrap();
    let expected: String = (0..50).map(|i| format!("{i},")).collect();
    assert_eq!(outcome.content, expected);
    assert!(store.save_count() <= 5, "saved {} times", store.save_count());
}

#[tokio::test]
async fn unknown_model_fails_inside_the_placeholder() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;

    let handle = reconciler
        .send_message("hi", SendOptions::default().with_model("mystery-1"))
        .await
        .unwrap();
    let assistant_id = handle.assistant_message_id.clone();
    let outcome = within(handle.wait()).await.unwrap();

    assert_eq!(outcome.status, StreamStatus::Failed);
    assert!(outcome.content.starts_with("Error: "));
    assert!(outcome.content.contains("Unknown model"));
    assert!(transport.requests().is_empty());
    let message = reconciler.current().unwrap().find(&assistant_id).cloned().unwrap();
    assert_eq!(message.content, outcome.content);
}

#[tokio::test]
async fn missing_api_key_is_reported() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;

    let handle = reconciler
        .send_message("hi", SendOptions::default().with_model("claude-3-haiku"))
        .await
        .unwrap();
    let outcome = within(handle.wait()).await.unwrap();
    assert_eq!(outcome.status, StreamStatus::Failed);
    assert!(outcome.content.contains("CLAUDE_API_KEY"));
}

#[tokio::test]
async fn streaming_message_cannot_be_removed() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;
    let body = transport.script();

    let handle = reconciler
        .send_message("hi", SendOptions::default())
        .await
        .unwrap();
    let assistant_id = handle.assistant_message_id.clone();

    let err = reconciler.delete_message(&assistant_id).await.unwrap_err();
    assert!(matches!(err, ChatError::MessageBusy(_)));
    let err = reconciler.edit_message(&assistant_id, "x").await.unwrap_err();
    assert!(matches!(err, ChatError::MessageBusy(_)));

    body.content("done");
    body.finish();
    within(handle.wait()).await.unwrap();

    reconciler.edit_message(&assistant_id, "edited").await.unwrap();
    assert_eq!(
        reconciler.current().unwrap().find(&assistant_id).unwrap().content,
        "edited"
    );
    reconciler.delete_message(&assistant_id).await.unwrap();
    assert_eq!(reconciler.messages().len(), 1);
}

#[tokio::test]
async fn empty_text_is_rejected() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;
    let err = reconciler
        .send_message("   ", SendOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidInput(_)));
    assert!(reconciler.messages().is_empty());
}

#[tokio::test]
async fn transcript_events_describe_the_exchange() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;
    let mut events = reconciler.subscribe();
    let body = transport.script();

    let handle = reconciler
        .send_message("hi", SendOptions::default())
        .await
        .unwrap();
    body.content("hey");
    body.finish();
    let assistant_id = handle.assistant_message_id.clone();
    within(handle.wait()).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(
        &seen[0],
        TranscriptEvent::MessageAppended { message, .. } if message.role == Role::User
    ));
    assert!(seen.iter().any(|e| matches!(
        e,
        TranscriptEvent::MessageUpdated { message_id, content, .. }
            if *message_id == assistant_id && content == "hey"
    )));
    assert!(matches!(
        seen.last(),
        Some(TranscriptEvent::StreamFinished { status: StreamStatus::Completed, .. })
    ));
}

#[tokio::test]
async fn clear_messages_starts_a_fresh_conversation() {
    let transport = ScriptedTransport::new();
    let reconciler = scripted_reconciler(transport.clone(), Arc::new(MemoryStore::new())).await;
    let body = transport.script();

    reconciler.set_active_prompt(Some("poet".to_string())).await.unwrap();
    let handle = reconciler
        .send_message("hi", SendOptions::default())
        .await
        .unwrap();
    body.content("hello");
    body.finish();
    let old = handle.conversation_id.clone();
    within(handle.wait()).await.unwrap();

    let fresh = reconciler.clear_messages().await;
    assert_ne!(fresh, old);
    assert_eq!(reconciler.current_id(), fresh);
    assert!(reconciler.messages().is_empty());
    assert_eq!(
        reconciler.current().unwrap().active_prompt_id.as_deref(),
        Some("poet")
    );
    assert_eq!(reconciler.conversation(&old).unwrap().messages.len(), 2);
}
