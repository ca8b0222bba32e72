//! History windowing
//!
//! Keeps the last N messages for an intent and caps each one at a fixed
//! character count. Output is ready to send as provider contents.

use crate::provider::{Content, Role};
use crate::router::Intent;
use crate::types::{Message, MessageRole};

pub const TRUNCATION_MARKER: &str = "[...truncated for context efficiency]";

/// Number of most recent messages kept for an intent
pub fn window_size(intent: Intent) -> usize {
    match intent {
        Intent::Reasoning => 10,
        Intent::Coding | Intent::Research | Intent::Math => 8,
        Intent::General => 6,
        Intent::Live => 4,
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut
///
/// Counts chars, not bytes, so multi-byte text never splits mid-codepoint.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_index, _)) => {
            let mut truncated = String::with_capacity(byte_index + TRUNCATION_MARKER.len() + 1);
            truncated.push_str(&text[..byte_index]);
            truncated.push('\n');
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
    }
}

fn role_for(role: MessageRole) -> Role {
    match role {
        MessageRole::User => Role::User,
        MessageRole::Assistant => Role::Model,
    }
}

/// Bound `history` (oldest first) for an intent
pub fn window(history: &[Message], intent: Intent, max_message_chars: usize) -> Vec<Content> {
    let start = history.len().saturating_sub(window_size(intent));

    history[start..]
        .iter()
        .map(|message| Content {
            role: role_for(message.role),
            text: truncate_message(&message.content, max_message_chars),
        })
        .collect()
}
