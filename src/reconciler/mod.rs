//! Conversation Reconciler
//!
//! Owns the authoritative in-memory transcripts. Every write (new messages,
//! stream deltas, edits, deletes, proposed replacements) goes through here
//! so that:
//!
//! - each assistant reply keeps one stable id from placeholder to final text;
//! - deltas land in the conversation that started the stream, even after the
//!   user switched away;
//! - replies dropped by a stale proposal are merged back from the backup;
//! - saves are debounced per conversation and flushed on completion.
//!
//! State lives behind one mutex that is never held across an await.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pharos::{ChatSettings, MemoryStore, ProviderConfig, Reconciler, ReconcilerConfig, SendOptions};
//!
//! # async fn example() -> Result<(), pharos::ChatError> {
//! let reconciler = Reconciler::open(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ProviderConfig::from_env()),
//!     ChatSettings::default(),
//!     ReconcilerConfig::default(),
//! )
//! .await?;
//!
//! let handle = reconciler.send_message("9.9和9.11谁大", SendOptions::default()).await?;
//! let outcome = handle.wait().await?;
//! println!("{}", outcome.content);
//! # Ok(())
//! # }
//! ```

mod debounce;
mod prompt;
mod recovery;

pub use debounce::SaveDebouncer;
pub use prompt::{ResolvedPrompt, build_history, resolve_prompt};
pub use recovery::{RecoveryOutcome, dedupe_by_id, needs_recovery, recover_messages};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{broadcast, oneshot};

use crate::config::{ChatSettings, ProviderConfig, ReconcilerConfig, SendOptions};
use crate::error::ChatError;
use crate::persistence::{ConversationStore, MemoryStore};
use crate::providers::{
    ChatTurn, ModelCatalog, ProviderAdapter, ProviderKind, ProviderRequest, RequestContext,
};
use crate::streaming::{HttpTransport, StreamSession, Transport, open_delta_stream};
use crate::telemetry::{FeedbackRecord, GenerationRecord, Telemetry};
use crate::types::{
    Conversation, ConversationSummary, DeltaEvent, DeltaKind, Message, StreamStatus, Usage,
};
use crate::utils::{CancelHandle, make_cancellable_stream};

/// Change notifications for UI layers.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEvent {
    MessageAppended {
        conversation_id: String,
        message: Message,
    },
    MessageUpdated {
        conversation_id: String,
        message_id: String,
        content: String,
        reasoning: Option<String>,
    },
    MessageRemoved {
        conversation_id: String,
        message_id: String,
    },
    StreamStarted {
        conversation_id: String,
        message_id: String,
    },
    StreamFinished {
        conversation_id: String,
        message_id: String,
        status: StreamStatus,
    },
    /// A proposed transcript was accepted; `restored` lists merged-back replies
    TranscriptReplaced {
        conversation_id: String,
        restored: Vec<String>,
    },
    ConversationCreated {
        conversation_id: String,
    },
    ConversationSwitched {
        conversation_id: String,
    },
    ConversationRenamed {
        conversation_id: String,
        name: String,
    },
    ConversationDeleted {
        conversation_id: String,
    },
}

/// Final state of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub status: StreamStatus,
    /// Visible assistant content, including any error annotation
    pub content: String,
    pub reasoning: String,
    pub usage: Option<Usage>,
    pub error: Option<String>,
}

/// Returned by [`Reconciler::send_message`].
#[derive(Debug)]
pub struct SendHandle {
    pub conversation_id: String,
    pub user_message_id: String,
    pub assistant_message_id: String,
    outcome: oneshot::Receiver<StreamOutcome>,
}

impl SendHandle {
    /// Wait until the exchange is terminal and its content has been saved.
    pub async fn wait(self) -> Result<StreamOutcome, ChatError> {
        self.outcome.await.map_err(|_| {
            ChatError::StreamError("Stream session ended without an outcome".to_string())
        })
    }
}

struct ActiveSession {
    session: StreamSession,
    cancel: CancelHandle,
    model: String,
    provider: Option<ProviderKind>,
    system_prompt: Option<String>,
    request_messages: Vec<ChatTurn>,
    started_at: DateTime<Utc>,
    /// Timestamp of the assistant placeholder
    placeholder_at: DateTime<Utc>,
    outcome: Option<oneshot::Sender<StreamOutcome>>,
}

struct State {
    conversations: HashMap<String, Conversation>,
    current_id: String,
    /// Last known-good messages of the current conversation
    backup: Vec<Message>,
    /// Keyed by assistant message id
    sessions: HashMap<String, ActiveSession>,
    settings: ChatSettings,
    catalog: ModelCatalog,
}

impl State {
    fn current_mut(&mut self) -> Result<&mut Conversation, ChatError> {
        let id = self.current_id.clone();
        self.conversations
            .get_mut(&id)
            .ok_or_else(|| ChatError::NotFound(format!("conversation {id}")))
    }

    /// Snapshot the current transcript if it holds at least one reply.
    fn refresh_backup(&mut self) {
        if let Some(conversation) = self.conversations.get(&self.current_id)
            && conversation.assistant_count() > 0
        {
            self.backup = conversation.messages.clone();
        }
    }

    /// Replace the snapshot after a deliberate edit.
    fn reset_backup(&mut self) {
        self.backup = self
            .conversations
            .get(&self.current_id)
            .map(|c| c.messages.clone())
            .unwrap_or_default();
    }

    fn is_streaming(&self, message_id: &str) -> bool {
        self.sessions
            .get(message_id)
            .is_some_and(|s| !s.session.is_terminal())
    }

    fn most_recent_id(&self) -> Option<String> {
        self.conversations
            .values()
            .max_by_key(|c| c.updated_at)
            .map(|c| c.id.clone())
    }
}

struct Inner {
    state: Mutex<State>,
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn Transport>,
    providers: Arc<ProviderConfig>,
    config: ReconcilerConfig,
    debouncer: SaveDebouncer,
    telemetry: Telemetry,
    events: broadcast::Sender<TranscriptEvent>,
}

/// Copy the session's state into its assistant message, re-appending the
/// message if something removed it.
fn session_reasoning(session: &StreamSession) -> Option<String> {
    (!session.reasoning().is_empty()).then(|| session.reasoning().to_string())
}

/// The assistant message a session is streaming into, as it stands now.
fn session_message(active: &ActiveSession) -> Message {
    let session = &active.session;
    let mut message = Message::assistant(session.visible_content())
        .with_id(session.assistant_message_id())
        .with_timestamp(active.placeholder_at);
    message.reasoning = session_reasoning(session);
    message
}

fn write_session(conversation: &mut Conversation, session: &StreamSession) {
    let content = session.visible_content();
    let reasoning = session_reasoning(session);
    match conversation.find_mut(session.assistant_message_id()) {
        Some(message) => {
            message.content = content;
            message.reasoning = reasoning;
        }
        None => {
            tracing::warn!(
                conversation_id = %conversation.id,
                message_id = %session.assistant_message_id(),
                "Assistant message missing from transcript, re-appending"
            );
            let mut message = Message::assistant(content).with_id(session.assistant_message_id());
            message.reasoning = reasoning;
            conversation.messages.push(message);
            conversation.messages = dedupe_by_id(std::mem::take(&mut conversation.messages));
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: TranscriptEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn message_updated(&self, conversation: &Conversation, message_id: &str) {
        if let Some(message) = conversation.find(message_id) {
            self.emit(TranscriptEvent::MessageUpdated {
                conversation_id: conversation.id.clone(),
                message_id: message_id.to_string(),
                content: message.content.clone(),
                reasoning: message.reasoning.clone(),
            });
        }
    }

    /// Apply one event to its session and transcript. Returns `true` when
    /// the stream should stop being read.
    fn apply_delta(&self, assistant_id: &str, event: &DeltaEvent) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(active) = state.sessions.get_mut(assistant_id) else {
            return true;
        };
        if !active.session.apply(event) {
            return true;
        }

        let conversation_id = active.session.conversation_id().to_string();
        let Some(conversation) = state.conversations.get_mut(&conversation_id) else {
            active.session.cancel();
            active.cancel.cancel();
            return true;
        };

        if event.kind == DeltaKind::Error {
            tracing::warn!(
                conversation_id = %conversation_id,
                message_id = %assistant_id,
                status = ?event.status,
                error = %event.text,
                "Stream failed"
            );
        }

        write_session(conversation, &active.session);
        conversation.touch();
        self.debouncer.arm(conversation.clone());
        self.message_updated(conversation, assistant_id);
        if state.current_id == conversation_id {
            state.refresh_backup();
        }
        event.is_terminal()
    }

    /// Settle a session: write its final content, flush the save, report the
    /// outcome and emit telemetry.
    async fn finish_session(&self, assistant_id: &str) {
        let (active, conversation_id) = {
            let mut state = self.lock();
            let Some(mut active) = state.sessions.remove(assistant_id) else {
                return;
            };
            // A body that ended without a terminal event was cancelled.
            active.session.cancel();

            let conversation_id = active.session.conversation_id().to_string();
            if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
                write_session(conversation, &active.session);
                conversation.touch();
                self.debouncer.arm(conversation.clone());
            }
            if state.current_id == conversation_id {
                state.refresh_backup();
            }
            self.emit(TranscriptEvent::StreamFinished {
                conversation_id: conversation_id.clone(),
                message_id: assistant_id.to_string(),
                status: active.session.status(),
            });
            (active, conversation_id)
        };

        self.debouncer.flush(&conversation_id).await;

        let session = &active.session;
        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %assistant_id,
            status = ?session.status(),
            "Stream session finished"
        );
        let outcome = StreamOutcome {
            status: session.status(),
            content: session.visible_content(),
            reasoning: session.reasoning().to_string(),
            usage: session.usage(),
            error: session.error().map(String::from),
        };
        self.telemetry.record_generation(GenerationRecord {
            trace_id: conversation_id,
            message_id: assistant_id.to_string(),
            messages: active.request_messages.clone(),
            prompt: active.system_prompt.clone(),
            model: active.model.clone(),
            provider: active
                .provider
                .map(|p| p.id().to_string())
                .unwrap_or_default(),
            response: outcome.content.clone(),
            reasoning: (!outcome.reasoning.is_empty()).then(|| outcome.reasoning.clone()),
            usage: outcome.usage,
            status: outcome.status,
            error: outcome.error.clone(),
            started_at: active.started_at,
            finished_at: Utc::now(),
        });
        if let Some(tx) = active.outcome {
            let _ = tx.send(outcome);
        }
    }
}

/// Everything a spawned session needs to start streaming.
type Launch = (ProviderAdapter, ProviderRequest, CancelHandle);

async fn run_session(
    inner: Arc<Inner>,
    assistant_id: String,
    adapter: ProviderAdapter,
    request: ProviderRequest,
    cancel: CancelHandle,
) {
    let deltas = open_delta_stream(inner.transport.clone(), request, adapter);
    let mut deltas = Box::pin(make_cancellable_stream(deltas, cancel));
    while let Some(event) = deltas.next().await {
        if inner.apply_delta(&assistant_id, &event) {
            break;
        }
    }
    // Dropping the stream closes the connection.
    drop(deltas);
    inner.finish_session(&assistant_id).await;
}

/// Builder for [`Reconciler`].
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn ConversationStore>>,
    providers: Option<Arc<ProviderConfig>>,
    transport: Option<Arc<dyn Transport>>,
    settings: ChatSettings,
    config: ReconcilerConfig,
    telemetry: Telemetry,
    catalog: ModelCatalog,
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self {
            store: None,
            providers: None,
            transport: None,
            settings: ChatSettings::default(),
            config: ReconcilerConfig::default(),
            telemetry: Telemetry::new(),
            catalog: ModelCatalog::new(),
        }
    }
}

impl ReconcilerBuilder {
    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn providers(mut self, providers: Arc<ProviderConfig>) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Replace the reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Load the catalogue and make the most recent conversation current.
    pub async fn build(self) -> Result<Reconciler, ChatError> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn ConversationStore>);
        let providers = self
            .providers
            .unwrap_or_else(|| Arc::new(ProviderConfig::from_env()));
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&providers.http)?),
        };

        let loaded = store.list().await?;
        let mut conversations: HashMap<String, Conversation> =
            loaded.into_iter().map(|c| (c.id.clone(), c)).collect();
        let debouncer = SaveDebouncer::new(store.clone(), self.config.save_debounce);

        let current_id = match conversations.values().max_by_key(|c| c.updated_at) {
            Some(conversation) => conversation.id.clone(),
            None => {
                let conversation = Conversation::new();
                let id = conversation.id.clone();
                debouncer.arm(conversation.clone());
                conversations.insert(id.clone(), conversation);
                id
            }
        };
        tracing::info!(
            conversations = conversations.len(),
            current = %current_id,
            "Reconciler ready"
        );

        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        let mut state = State {
            conversations,
            current_id,
            backup: Vec::new(),
            sessions: HashMap::new(),
            settings: self.settings,
            catalog: self.catalog,
        };
        state.refresh_backup();

        Ok(Reconciler {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                store,
                transport,
                providers,
                config: self.config,
                debouncer,
                telemetry: self.telemetry,
                events,
            }),
        })
    }
}

/// The stateful core. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Reconciler")
            .field("current_id", &state.current_id)
            .field("conversations", &state.conversations.len())
            .field("sessions", &state.sessions.len())
            .finish()
    }
}

impl Reconciler {
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::default()
    }

    pub async fn open(
        store: Arc<dyn ConversationStore>,
        providers: Arc<ProviderConfig>,
        settings: ChatSettings,
        config: ReconcilerConfig,
    ) -> Result<Self, ChatError> {
        Self::builder()
            .store(store)
            .providers(providers)
            .settings(settings)
            .config(config)
            .build()
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.inner.events.subscribe()
    }

    pub fn current_id(&self) -> String {
        self.inner.lock().current_id.clone()
    }

    pub fn current(&self) -> Option<Conversation> {
        let state = self.inner.lock();
        state.conversations.get(&state.current_id).cloned()
    }

    pub fn conversation(&self, id: &str) -> Option<Conversation> {
        self.inner.lock().conversations.get(id).cloned()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.current().map(|c| c.messages).unwrap_or_default()
    }

    /// Catalogue, most recently updated first.
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        let state = self.inner.lock();
        let mut summaries: Vec<ConversationSummary> = state
            .conversations
            .values()
            .map(ConversationSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Whether a reply is streaming into the current conversation.
    pub fn is_streaming(&self) -> bool {
        let state = self.inner.lock();
        state.sessions.values().any(|s| {
            !s.session.is_terminal() && s.session.conversation_id() == state.current_id
        })
    }

    pub fn session_status(&self, assistant_message_id: &str) -> Option<StreamStatus> {
        self.inner
            .lock()
            .sessions
            .get(assistant_message_id)
            .map(|s| s.session.status())
    }

    pub fn settings(&self) -> ChatSettings {
        self.inner.lock().settings.clone()
    }

    pub fn update_settings(&self, settings: ChatSettings) {
        self.inner.lock().settings = settings;
    }

    /// Serve an additional model id through `kind`.
    pub fn register_model(&self, model: impl Into<String>, kind: ProviderKind) {
        self.inner.lock().catalog.register(model, kind);
    }

    fn prepare_request(
        &self,
        catalog: &ModelCatalog,
        resolved: &ResolvedPrompt,
        history: &[ChatTurn],
        stream: bool,
    ) -> Result<(ProviderKind, ProviderAdapter, ProviderRequest), ChatError> {
        let kind = catalog.resolve(&resolved.model)?;
        let providers = &self.inner.providers;
        let api_key = providers.api_key(kind)?;
        let base_url = providers.base_url(kind);
        let adapter = ProviderAdapter::for_provider(kind);
        let request = adapter.build_request(&RequestContext {
            model: &resolved.model,
            system_prompt: resolved.system_prompt.as_deref(),
            messages: history,
            stream,
            max_tokens: self.inner.config.max_tokens,
            api_key: &api_key,
            base_url: &base_url,
        });
        Ok((kind, adapter, request))
    }

    /// Append the user message and an empty assistant placeholder to the
    /// current conversation, then stream the reply into the placeholder.
    ///
    /// The transcript holds both messages when this returns. Configuration
    /// problems (unknown model, missing key) are written into the
    /// placeholder instead of being returned.
    pub async fn send_message(
        &self,
        text: &str,
        options: SendOptions,
    ) -> Result<SendHandle, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::InvalidInput("Message text is empty".to_string()));
        }

        let (handle, launch) = self.begin_exchange(text, &options)?;
        match launch {
            Some((adapter, request, cancel)) => {
                tokio::spawn(run_session(
                    self.inner.clone(),
                    handle.assistant_message_id.clone(),
                    adapter,
                    request,
                    cancel,
                ));
            }
            None => self.inner.finish_session(&handle.assistant_message_id).await,
        }
        Ok(handle)
    }

    /// Append the exchange under the lock and register its session. Returns
    /// what is needed to start the stream, or `None` when the request could
    /// not be prepared and the session already failed.
    fn begin_exchange(
        &self,
        text: &str,
        options: &SendOptions,
    ) -> Result<(SendHandle, Option<Launch>), ChatError> {
        let inner = &self.inner;
        let (tx, rx) = oneshot::channel();
        let user = Message::user(text);
        let placeholder = Message::assistant("");
        let placeholder_at = placeholder.timestamp;
        let user_id = user.id.clone();
        let assistant_id = placeholder.id.clone();

        let mut guard = inner.lock();
        let state = &mut *guard;
        let resolved = resolve_prompt(&state.settings, options);
        let stream = options.stream.unwrap_or(inner.config.stream);
        let conversation_id = state.current_id.clone();

        let conversation = state.current_mut()?;
        let previous_name = conversation.name.clone();
        if !conversation.messages.iter().any(Message::is_user) {
            conversation.auto_name(text);
        }
        if let Some(prompt_id) = options.prompt.as_ref().and_then(|p| p.id.clone()) {
            conversation.active_prompt_id = Some(prompt_id);
        }
        conversation.messages.push(user.clone());
        conversation.messages.push(placeholder.clone());
        conversation.touch();
        let history = build_history(
            &conversation.messages,
            &assistant_id,
            resolved.direct_prefix.as_deref(),
        );
        let renamed = (conversation.name != previous_name).then(|| conversation.name.clone());

        inner.emit(TranscriptEvent::MessageAppended {
            conversation_id: conversation_id.clone(),
            message: user,
        });
        inner.emit(TranscriptEvent::MessageAppended {
            conversation_id: conversation_id.clone(),
            message: placeholder,
        });
        if let Some(name) = renamed {
            inner.emit(TranscriptEvent::ConversationRenamed {
                conversation_id: conversation_id.clone(),
                name,
            });
        }

        let mut active = ActiveSession {
            session: StreamSession::new(&conversation_id, &assistant_id),
            cancel: CancelHandle::new(),
            model: resolved.model.clone(),
            provider: None,
            system_prompt: resolved.system_prompt.clone(),
            request_messages: history.clone(),
            started_at: Utc::now(),
            placeholder_at,
            outcome: Some(tx),
        };
        let handle = SendHandle {
            conversation_id: conversation_id.clone(),
            user_message_id: user_id,
            assistant_message_id: assistant_id.clone(),
            outcome: rx,
        };

        let launch = match self.prepare_request(&state.catalog, &resolved, &history, stream) {
            Ok((kind, adapter, request)) => {
                tracing::debug!(
                    conversation_id = %conversation_id,
                    message_id = %assistant_id,
                    provider = %kind,
                    model = %resolved.model,
                    stream = request.stream,
                    "Starting stream session"
                );
                active.provider = Some(kind);
                let cancel = active.cancel.clone();
                if let Some(conversation) = state.conversations.get(&conversation_id) {
                    inner.debouncer.arm(conversation.clone());
                }
                inner.emit(TranscriptEvent::StreamStarted {
                    conversation_id,
                    message_id: assistant_id.clone(),
                });
                Some((adapter, request, cancel))
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %conversation_id,
                    model = %resolved.model,
                    error = %e,
                    "Cannot start stream session"
                );
                active
                    .session
                    .apply(&DeltaEvent::error(e.user_message(), e.status_code()));
                if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
                    write_session(conversation, &active.session);
                    inner.debouncer.arm(conversation.clone());
                    inner.message_updated(conversation, &assistant_id);
                }
                None
            }
        };
        state.sessions.insert(assistant_id, active);
        state.refresh_backup();
        Ok((handle, launch))
    }

    /// Stop every reply streaming into the current conversation, keeping
    /// what has arrived so far. Returns the number of sessions stopped.
    pub async fn stop_generating(&self) -> usize {
        let (conversation_id, stopped) = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            let conversation_id = state.current_id.clone();
            let mut stopped = Vec::new();
            for (message_id, active) in state.sessions.iter_mut() {
                if active.session.conversation_id() != conversation_id || !active.session.cancel() {
                    continue;
                }
                active.cancel.cancel();
                if let Some(conversation) = state.conversations.get_mut(&conversation_id) {
                    write_session(conversation, &active.session);
                    conversation.touch();
                    self.inner.debouncer.arm(conversation.clone());
                }
                stopped.push(message_id.clone());
            }
            (conversation_id, stopped)
        };
        if !stopped.is_empty() {
            tracing::info!(conversation_id = %conversation_id, sessions = ?stopped, "Stopped generating");
            self.inner.debouncer.flush(&conversation_id).await;
        }
        stopped.len()
    }

    /// Start a fresh, empty conversation that keeps the current prompt and
    /// scene, and make it current. The old transcript stays in the catalogue.
    pub async fn clear_messages(&self) -> String {
        let mut state = self.inner.lock();
        let mut conversation = Conversation::new();
        if let Some(current) = state.conversations.get(&state.current_id) {
            conversation.active_prompt_id = current.active_prompt_id.clone();
            conversation.scene_id = current.scene_id.clone();
        }
        self.install_conversation(&mut state, conversation)
    }

    /// Create an empty conversation and make it current.
    pub async fn new_conversation(&self) -> String {
        let mut state = self.inner.lock();
        self.install_conversation(&mut state, Conversation::new())
    }

    fn install_conversation(&self, state: &mut State, conversation: Conversation) -> String {
        let id = conversation.id.clone();
        self.inner.debouncer.arm(conversation.clone());
        state.conversations.insert(id.clone(), conversation);
        state.current_id = id.clone();
        state.reset_backup();
        self.inner.emit(TranscriptEvent::ConversationCreated {
            conversation_id: id.clone(),
        });
        self.inner.emit(TranscriptEvent::ConversationSwitched {
            conversation_id: id.clone(),
        });
        id
    }

    /// Make `id` current. Streams in other conversations keep running.
    pub async fn switch_conversation(&self, id: &str) -> Result<(), ChatError> {
        let known = self.inner.lock().conversations.contains_key(id);
        let loaded = if known {
            None
        } else {
            let conversation = self
                .inner
                .store
                .load(id)
                .await?
                .ok_or_else(|| ChatError::NotFound(format!("conversation {id}")))?;
            Some(conversation)
        };

        let mut state = self.inner.lock();
        if let Some(conversation) = loaded {
            state
                .conversations
                .entry(id.to_string())
                .or_insert(conversation);
        }
        if state.current_id != id {
            state.current_id = id.to_string();
            state.reset_backup();
            self.inner.emit(TranscriptEvent::ConversationSwitched {
                conversation_id: id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn rename_conversation(&self, id: &str, name: &str) -> Result<(), ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidInput(
                "Conversation name is empty".to_string(),
            ));
        }
        let mut state = self.inner.lock();
        let conversation = state
            .conversations
            .get_mut(id)
            .ok_or_else(|| ChatError::NotFound(format!("conversation {id}")))?;
        conversation.name = name.to_string();
        conversation.touch();
        self.inner.debouncer.arm(conversation.clone());
        self.inner.emit(TranscriptEvent::ConversationRenamed {
            conversation_id: id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    /// Delete a conversation everywhere, stopping any reply streaming into
    /// it. When it was current, the most recent remaining conversation (or a
    /// new one) becomes current.
    pub async fn delete_conversation(&self, id: &str) -> Result<(), ChatError> {
        {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            for active in state.sessions.values_mut() {
                if active.session.conversation_id() == id && active.session.cancel() {
                    active.cancel.cancel();
                }
            }
            state.conversations.remove(id);
            self.inner.debouncer.cancel(id);

            if state.current_id == id {
                match state.most_recent_id() {
                    Some(next) => {
                        state.current_id = next.clone();
                        state.reset_backup();
                        self.inner.emit(TranscriptEvent::ConversationSwitched {
                            conversation_id: next,
                        });
                    }
                    None => {
                        self.install_conversation(state, Conversation::new());
                    }
                }
            }
            self.inner.emit(TranscriptEvent::ConversationDeleted {
                conversation_id: id.to_string(),
            });
        }

        // Wait out a save that may already be running before removing the file.
        self.inner.debouncer.flush(id).await;
        let deleted = self.inner.store.delete(id).await;
        self.inner.debouncer.forget(id);
        deleted?;
        tracing::info!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }

    /// Record the prompt chosen for the current conversation.
    pub async fn set_active_prompt(&self, prompt_id: Option<String>) -> Result<(), ChatError> {
        let mut state = self.inner.lock();
        let conversation = state.current_mut()?;
        conversation.active_prompt_id = prompt_id;
        conversation.touch();
        self.inner.debouncer.arm(conversation.clone());
        Ok(())
    }

    /// Record the scene of the current conversation.
    pub async fn set_scene(&self, scene_id: Option<String>) -> Result<(), ChatError> {
        let mut state = self.inner.lock();
        let conversation = state.current_mut()?;
        conversation.scene_id = scene_id;
        conversation.touch();
        self.inner.debouncer.arm(conversation.clone());
        Ok(())
    }

    /// Replace the content of a message in the current conversation.
    pub async fn edit_message(&self, message_id: &str, content: &str) -> Result<(), ChatError> {
        let mut state = self.inner.lock();
        if state.is_streaming(message_id) {
            return Err(ChatError::MessageBusy(message_id.to_string()));
        }
        let conversation = state.current_mut()?;
        let message = conversation
            .find_mut(message_id)
            .ok_or_else(|| ChatError::NotFound(format!("message {message_id}")))?;
        message.content = content.to_string();
        conversation.touch();
        self.inner.debouncer.arm(conversation.clone());
        self.inner.message_updated(conversation, message_id);
        state.reset_backup();
        Ok(())
    }

    /// Remove a message from the current conversation. A reply that is still
    /// streaming cannot be removed.
    pub async fn delete_message(&self, message_id: &str) -> Result<(), ChatError> {
        let mut state = self.inner.lock();
        if state.is_streaming(message_id) {
            return Err(ChatError::MessageBusy(message_id.to_string()));
        }
        let conversation = state.current_mut()?;
        let before = conversation.messages.len();
        conversation.messages.retain(|m| m.id != message_id);
        if conversation.messages.len() == before {
            return Err(ChatError::NotFound(format!("message {message_id}")));
        }
        conversation.touch();
        self.inner.debouncer.arm(conversation.clone());
        self.inner.emit(TranscriptEvent::MessageRemoved {
            conversation_id: conversation.id.clone(),
            message_id: message_id.to_string(),
        });
        state.reset_backup();
        Ok(())
    }

    /// Accept a transcript re-derived by a UI layer for the current
    /// conversation. Replies it dropped are merged back from the backup
    /// snapshot, and replies still streaming are always kept.
    pub async fn propose_transcript(&self, proposal: Vec<Message>) -> Result<Vec<Message>, ChatError> {
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        let conversation_id = state.current_id.clone();

        let RecoveryOutcome {
            mut messages,
            mut restored,
        } = recover_messages(&proposal, &state.backup);

        let mut live = Vec::new();
        for active in state.sessions.values() {
            let session = &active.session;
            if session.conversation_id() != conversation_id
                || session.is_terminal()
                || messages.iter().any(|m| m.id == session.assistant_message_id())
            {
                continue;
            }
            live.push(session_message(active));
        }
        if !live.is_empty() {
            restored.extend(live.iter().map(|m| m.id.clone()));
            messages.extend(live);
            messages.sort_by_key(|m| m.timestamp);
        }

        if !restored.is_empty() {
            tracing::info!(
                conversation_id = %conversation_id,
                restored = ?restored,
                "Restored assistant messages missing from proposed transcript"
            );
        }

        let conversation = state.current_mut()?;
        conversation.messages = messages;
        conversation.touch();
        let accepted = conversation.messages.clone();
        self.inner.debouncer.arm(conversation.clone());
        state.refresh_backup();
        self.inner.emit(TranscriptEvent::TranscriptReplaced {
            conversation_id,
            restored,
        });
        Ok(accepted)
    }

    /// Rate an assistant message of the current conversation.
    pub async fn record_feedback(
        &self,
        message_id: &str,
        score: i32,
        comment: Option<String>,
    ) -> Result<(), ChatError> {
        let trace_id = {
            let state = self.inner.lock();
            let conversation = state
                .conversations
                .get(&state.current_id)
                .filter(|c| c.find(message_id).is_some_and(Message::is_assistant))
                .ok_or_else(|| ChatError::NotFound(format!("assistant message {message_id}")))?;
            conversation.id.clone()
        };
        self.inner.telemetry.record_feedback(FeedbackRecord {
            trace_id,
            message_id: message_id.to_string(),
            score: score.signum(),
            comment,
        });
        Ok(())
    }

    /// Write every pending save now.
    pub async fn flush(&self) {
        self.inner.debouncer.flush_all().await;
    }
}
