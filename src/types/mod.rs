//! Core data model: messages, conversations and canonical stream deltas.

mod conversation;
mod delta;
mod message;

pub use conversation::*;
pub use delta::*;
pub use message::*;
