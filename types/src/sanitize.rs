//! Placeholder removal for user-echoed text.
//!
//! When a message is flattened to text, binary parts are rendered as
//! standalone `[image]` / `[audio]` lines. Those lines are internal markers
//! and must not reach the user-facing echo of what they typed.

/// Line rendered in place of an image part.
pub const IMAGE_PLACEHOLDER: &str = "[image]";
/// Line rendered in place of an audio part.
pub const AUDIO_PLACEHOLDER: &str = "[audio]";

/// Drop placeholder lines and trim what remains.
///
/// Each line is trimmed; lines that are exactly a placeholder are removed.
/// A placeholder embedded inside other text is kept as written.
///
/// # Examples
///
/// ```
/// use confab_types::remove_binary_placeholders;
///
/// assert_eq!(remove_binary_placeholders("look\n[image]\n"), "look");
/// assert_eq!(remove_binary_placeholders("see [image] here"), "see [image] here");
/// ```
#[must_use]
pub fn remove_binary_placeholders(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|line| *line != IMAGE_PLACEHOLDER && *line != AUDIO_PLACEHOLDER)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
