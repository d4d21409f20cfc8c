//! Folding the flat message log into conversational turns.

use std::time::Instant;

use confab_types::{ChatTurn, Message, Role, remove_binary_placeholders};

use crate::render::{extract_audios, extract_images, parse_assistant_stored_text, render_message};

/// Fold a chronologically ordered log into display turns.
///
/// A user message opens a turn; an assistant message immediately after it is
/// consumed as the answer. Anything else (tool/system messages, assistant
/// messages with no preceding user message) is skipped. Turns with nothing to
/// render are dropped.
#[must_use]
pub fn build_turns(messages: &[Message]) -> Vec<ChatTurn> {
    let started = Instant::now();
    let mut turns = Vec::new();
    let mut iter = messages.iter().peekable();

    while let Some(msg) = iter.next() {
        if msg.role() != Role::User {
            continue;
        }

        let mut turn = ChatTurn {
            id: msg.id().to_string(),
            user_text: remove_binary_placeholders(&render_message(msg)),
            user_images: extract_images(msg),
            user_audios: extract_audios(msg),
            ..ChatTurn::default()
        };

        if let Some(answer) = iter.next_if(|next| next.role() == Role::Assistant) {
            let parsed = parse_assistant_stored_text(&render_message(answer));
            let meta = answer.provider_meta();
            turn.assistant_text = parsed.answer;
            turn.assistant_reasoning_standard = non_empty_or(
                parsed.reasoning_standard,
                meta.and_then(|m| m.reasoning_standard.as_deref()),
            );
            turn.assistant_reasoning_inline = non_empty_or(
                parsed.reasoning_inline,
                meta.and_then(|m| m.reasoning_inline.as_deref()),
            );
        }

        if !turn.is_empty() {
            turns.push(turn);
        }
    }

    tracing::debug!(
        messages = messages.len(),
        turns = turns.len(),
        elapsed_us = started.elapsed().as_micros(),
        "Rebuilt chat turns"
    );
    turns
}

fn non_empty_or(parsed: String, fallback: Option<&str>) -> String {
    if parsed.is_empty() {
        fallback.unwrap_or_default().to_string()
    } else {
        parsed
    }
}

/// Newest-first pagination over reconstructed turns.
///
/// Only the most recent `count` turns are visible; each `load_more` reveals
/// one older turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnWindow {
    count: usize,
}

impl Default for TurnWindow {
    fn default() -> Self {
        Self { count: 1 }
    }
}

impl TurnWindow {
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self { count }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// The newest `count` turns, oldest first.
    #[must_use]
    pub fn visible<'a>(&self, turns: &'a [ChatTurn]) -> &'a [ChatTurn] {
        &turns[turns.len().saturating_sub(self.count)..]
    }

    #[must_use]
    pub fn has_more(&self, total_turns: usize) -> bool {
        self.count < total_turns
    }

    pub fn load_more(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.count = 1;
    }
}
