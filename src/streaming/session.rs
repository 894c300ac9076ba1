use crate::types::{DeltaEvent, DeltaKind, StreamStatus, Usage};

/// Visible content after a failed exchange.
///
/// Partial output is kept and annotated; an empty reply becomes a plain
/// error description.
pub fn annotate_error(content: &str, message: &str) -> String {
    if content.is_empty() {
        format!("Error: {message}")
    } else {
        format!("{content}\n\n[Error: {message}]")
    }
}

/// Accumulated state of one in-flight request.
///
/// Events are applied in arrival order; once the session is terminal every
/// further event is ignored.
#[derive(Debug, Clone)]
pub struct StreamSession {
    conversation_id: String,
    assistant_message_id: String,
    content: String,
    reasoning: String,
    usage: Option<Usage>,
    status: StreamStatus,
    error: Option<String>,
}

impl StreamSession {
    pub fn new(conversation_id: impl Into<String>, assistant_message_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            assistant_message_id: assistant_message_id.into(),
            content: String::new(),
            reasoning: String::new(),
            usage: None,
            status: StreamStatus::Pending,
            error: None,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn assistant_message_id(&self) -> &str {
        &self.assistant_message_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply one event. Returns `false` if the session was already terminal.
    pub fn apply(&mut self, event: &DeltaEvent) -> bool {
        if self.is_terminal() {
            return false;
        }
        if self.status == StreamStatus::Pending {
            self.status = StreamStatus::Active;
        }

        match event.kind {
            DeltaKind::Content => self.content.push_str(&event.text),
            DeltaKind::Reasoning => self.reasoning.push_str(&event.text),
            DeltaKind::Done => {
                // Some providers deliver the full text only on completion.
                if event.text.chars().count() > self.content.chars().count() {
                    self.content = event.text.clone();
                }
                if self.content.is_empty() && !self.reasoning.is_empty() {
                    self.content = self.reasoning.clone();
                }
                if let Some(usage) = event.usage {
                    self.merge_usage(usage);
                }
                self.status = StreamStatus::Completed;
            }
            DeltaKind::Error => {
                self.error = Some(event.text.clone());
                self.status = StreamStatus::Failed;
            }
        }
        true
    }

    /// User-initiated stop. Accumulated content is kept verbatim.
    pub fn cancel(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = StreamStatus::Cancelled;
        true
    }

    /// Content to show for the assistant message in the current state.
    pub fn visible_content(&self) -> String {
        match (self.status, self.error.as_deref()) {
            (StreamStatus::Failed, Some(message)) => annotate_error(&self.content, message),
            _ => self.content.clone(),
        }
    }

    fn merge_usage(&mut self, usage: Usage) {
        match self.usage.as_mut() {
            Some(existing) => existing.merge(usage),
            None => self.usage = Some(usage),
        }
    }
}
