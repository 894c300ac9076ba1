//! Per-conversation debounced persistence
//!
//! `arm` replaces the pending payload and restarts the quiet-period timer;
//! `flush` writes the pending payload now and waits for any write already
//! in progress. Writes for one conversation are serialised, and each carries
//! a generation number so an older payload never overwrites a newer one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::persistence::ConversationStore;
use crate::types::Conversation;

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<Conversation>,
    timer: Option<JoinHandle<()>>,
    /// Last generation written to the store
    written: Arc<tokio::sync::Mutex<u64>>,
}

struct DebouncerInner {
    store: Arc<dyn ConversationStore>,
    delay: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

/// Debounced save scheduler shared by every session of a reconciler.
#[derive(Clone)]
pub struct SaveDebouncer {
    inner: Arc<DebouncerInner>,
}

fn lock(slots: &Mutex<HashMap<String, Slot>>) -> MutexGuard<'_, HashMap<String, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SaveDebouncer {
    pub fn new(store: Arc<dyn ConversationStore>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(DebouncerInner {
                store,
                delay,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Schedule `conversation` to be saved after the quiet period.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&self, conversation: Conversation) {
        let id = conversation.id.clone();
        let mut slots = lock(&self.inner.slots);
        let slot = slots.entry(id.clone()).or_default();
        slot.generation += 1;
        slot.pending = Some(conversation);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }

        let debouncer = self.clone();
        let delay = self.inner.delay;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach the write so a later abort of this timer cannot cut it short.
            tokio::spawn(async move { debouncer.write_pending(&id).await });
        }));
    }

    /// Write any pending payload for `id` immediately.
    pub async fn flush(&self, id: &str) {
        if let Some(timer) = lock(&self.inner.slots).get_mut(id).and_then(|s| s.timer.take()) {
            timer.abort();
        }
        self.write_pending(id).await;
    }

    /// Flush every conversation with a pending payload.
    pub async fn flush_all(&self) {
        let ids: Vec<String> = lock(&self.inner.slots)
            .iter()
            .filter(|(_, slot)| slot.pending.is_some())
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            self.flush(&id).await;
        }
    }

    /// Drop the pending payload for `id` without writing it.
    pub fn cancel(&self, id: &str) {
        let mut slots = lock(&self.inner.slots);
        if let Some(slot) = slots.get_mut(id) {
            slot.generation += 1;
            slot.pending = None;
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
    }

    /// Forget `id` entirely, dropping any pending payload. A write already
    /// running for it is discarded when it resumes.
    pub fn forget(&self, id: &str) {
        if let Some(slot) = lock(&self.inner.slots).remove(id)
            && let Some(timer) = slot.timer
        {
            timer.abort();
        }
    }

    pub fn has_pending(&self, id: &str) -> bool {
        lock(&self.inner.slots)
            .get(id)
            .is_some_and(|slot| slot.pending.is_some())
    }

    async fn write_pending(&self, id: &str) {
        let (payload, generation, written) = {
            let mut slots = lock(&self.inner.slots);
            let Some(slot) = slots.get_mut(id) else {
                return;
            };
            (slot.pending.take(), slot.generation, slot.written.clone())
        };

        // Held across the save so writes for one id never interleave, and so
        // a flush waits for a timer-driven write that is already running.
        let mut last_written = written.lock().await;
        let Some(conversation) = payload else {
            return;
        };
        // A later arm carries a newer payload, and a cancel discards this one.
        let superseded = lock(&self.inner.slots)
            .get(id)
            .is_none_or(|slot| slot.generation != generation);
        if superseded || generation <= *last_written {
            return;
        }
        match self.inner.store.save(&conversation).await {
            Ok(()) => {
                *last_written = generation;
                tracing::debug!(conversation_id = %id, generation, "Saved conversation");
            }
            Err(e) => {
                tracing::error!(conversation_id = %id, error = %e, "Failed to save conversation");
            }
        }
    }
}

impl std::fmt::Debug for SaveDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveDebouncer")
            .field("delay", &self.inner.delay)
            .finish_non_exhaustive()
    }
}
