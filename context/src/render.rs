//! Flattening stored messages into display text.

use std::sync::LazyLock;

use regex::Regex;

use confab_types::{AUDIO_PLACEHOLDER, IMAGE_PLACEHOLDER, MediaAttachment, Message, MessagePart};

/// Separates the visible answer from standard reasoning in stored assistant text.
pub const STANDARD_REASONING_MARKER: &str = "[标准思考]";

const DEFAULT_IMAGE_MIME: &str = "image/webp";
const DEFAULT_AUDIO_MIME: &str = "audio/webm";

static MEMORY_BOARD_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<memory_board>.*?</memory_board>").expect("memory board pattern is valid")
});

static MEMORY_BOARD_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[MEMORY BOARD\].*$").expect("memory board tail pattern is valid")
});

/// Remove provider-internal annotations (memory board blocks) and trim.
#[must_use]
pub fn strip_hidden_blocks(text: &str) -> String {
    let without_blocks = MEMORY_BOARD_BLOCK.replace_all(text, "");
    MEMORY_BOARD_TAIL
        .replace_all(&without_blocks, "")
        .trim()
        .to_string()
}

/// All parts joined by newlines, media rendered as placeholder lines.
#[must_use]
pub fn render_message(msg: &Message) -> String {
    let merged = msg
        .parts()
        .iter()
        .filter_map(|part| match part {
            MessagePart::Text { text } => Some(text.as_str()),
            MessagePart::Image { .. } => Some(IMAGE_PLACEHOLDER),
            MessagePart::Audio { .. } => Some(AUDIO_PLACEHOLDER),
            MessagePart::Unsupported => None,
        })
        .collect::<Vec<_>>()
        .join("\n");
    strip_hidden_blocks(&merged)
}

/// Text parts only, joined by newlines.
#[must_use]
pub fn message_text(msg: &Message) -> String {
    let visible = msg
        .parts()
        .iter()
        .filter_map(MessagePart::as_text)
        .collect::<Vec<_>>()
        .join("\n");
    strip_hidden_blocks(&visible)
}

/// Stored assistant text split into answer and reasoning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantText {
    pub answer: String,
    pub reasoning_standard: String,
    /// Never derivable from the stored text; only the provider meta carries it.
    pub reasoning_inline: String,
}

/// Split raw assistant text at the standard-reasoning marker.
///
/// Without a marker the whole (trimmed) text is the answer. With one, text
/// before it is the answer and text after it is standard reasoning.
#[must_use]
pub fn parse_assistant_stored_text(raw: &str) -> AssistantText {
    match raw.split_once(STANDARD_REASONING_MARKER) {
        None => AssistantText {
            answer: raw.trim().to_string(),
            ..AssistantText::default()
        },
        Some((answer, reasoning)) => AssistantText {
            answer: answer.trim().to_string(),
            reasoning_standard: reasoning.trim().to_string(),
            reasoning_inline: String::new(),
        },
    }
}

#[must_use]
pub fn extract_images(msg: &Message) -> Vec<MediaAttachment> {
    msg.parts()
        .iter()
        .filter_map(|part| match part {
            MessagePart::Image { mime, bytes_base64 } => {
                media_attachment(mime.as_deref(), bytes_base64.as_deref(), DEFAULT_IMAGE_MIME)
            }
            _ => None,
        })
        .collect()
}

#[must_use]
pub fn extract_audios(msg: &Message) -> Vec<MediaAttachment> {
    msg.parts()
        .iter()
        .filter_map(|part| match part {
            MessagePart::Audio { mime, bytes_base64 } => {
                media_attachment(mime.as_deref(), bytes_base64.as_deref(), DEFAULT_AUDIO_MIME)
            }
            _ => None,
        })
        .collect()
}

// Parts without byte data are malformed and dropped.
fn media_attachment(
    mime: Option<&str>,
    bytes_base64: Option<&str>,
    default_mime: &str,
) -> Option<MediaAttachment> {
    let bytes = bytes_base64.filter(|b| !b.is_empty())?;
    let mime = mime.filter(|m| !m.is_empty()).unwrap_or(default_mime);
    Some(MediaAttachment::new(mime, bytes))
}
