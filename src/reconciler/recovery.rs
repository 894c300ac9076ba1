//! Loss recovery
//!
//! A caller re-deriving the transcript from a stale copy can propose one
//! that silently drops assistant replies. When a proposal has fewer
//! assistant messages than the backup snapshot, the missing replies are
//! merged back in instead of being lost.

use std::collections::HashSet;

use crate::types::{Message, Role};

/// Result of reconciling a proposal against the backup snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome {
    pub messages: Vec<Message>,
    /// Ids of assistant messages reinserted from the backup
    pub restored: Vec<String>,
}

impl RecoveryOutcome {
    pub fn recovered(&self) -> bool {
        !self.restored.is_empty()
    }
}

/// Collapse repeated ids, keeping the first occurrence in place.
pub fn dedupe_by_id(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::with_capacity(messages.len());
    messages
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

fn assistant_count(messages: &[Message]) -> usize {
    messages.iter().filter(|m| m.role == Role::Assistant).count()
}

/// Assistant messages of `backup` whose id is absent from `proposal`.
fn missing_assistants<'a>(proposal: &[Message], backup: &'a [Message]) -> Vec<(usize, &'a Message)> {
    let present: HashSet<&str> = proposal.iter().map(|m| m.id.as_str()).collect();
    backup
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::Assistant && !present.contains(m.id.as_str()))
        .collect()
}

/// Whether `proposal` shrank relative to `backup`.
pub fn needs_recovery(proposal: &[Message], backup: &[Message]) -> bool {
    assistant_count(proposal) < assistant_count(backup)
        && !missing_assistants(proposal, backup).is_empty()
}

/// Merge `proposal` with the assistant messages it lost from `backup`.
///
/// Each missing reply goes right after the user message that preceded it in
/// the backup (after any replies already restored there), or at the end
/// when that user message is gone. The result is then stable-sorted by
/// timestamp. Running the merge again on its own output is a no-op.
pub fn recover_messages(proposal: &[Message], backup: &[Message]) -> RecoveryOutcome {
    let mut merged = dedupe_by_id(proposal.to_vec());
    if !needs_recovery(&merged, backup) {
        return RecoveryOutcome {
            messages: merged,
            restored: Vec::new(),
        };
    }

    let missing = missing_assistants(&merged, backup);
    let mut restored: Vec<String> = Vec::with_capacity(missing.len());

    for (backup_index, message) in missing {
        let anchor = backup[..backup_index]
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|user| merged.iter().position(|m| m.id == user.id));

        let position = match anchor {
            Some(anchor) => {
                let mut position = anchor + 1;
                while position < merged.len() && restored.contains(&merged[position].id) {
                    position += 1;
                }
                position
            }
            None => merged.len(),
        };
        merged.insert(position, message.clone());
        restored.push(message.id.clone());
    }

    merged.sort_by_key(|m| m.timestamp);
    RecoveryOutcome {
        messages: merged,
        restored,
    }
}
