use serde::Serialize;

use crate::MediaAttachment;

/// One user prompt paired with its assistant answer.
///
/// Derived from the message log on every reconstruction; never stored.
/// `id` is the id of the user message that opened the turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: String,
    pub user_text: String,
    pub user_images: Vec<MediaAttachment>,
    pub user_audios: Vec<MediaAttachment>,
    pub assistant_text: String,
    pub assistant_reasoning_standard: String,
    pub assistant_reasoning_inline: String,
}

impl ChatTurn {
    /// True when nothing in the turn would render.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user_text.trim().is_empty()
            && self.user_images.is_empty()
            && self.user_audios.is_empty()
            && self.assistant_text.trim().is_empty()
            && self.assistant_reasoning_standard.trim().is_empty()
            && self.assistant_reasoning_inline.trim().is_empty()
    }
}
