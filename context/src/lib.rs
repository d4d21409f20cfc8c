//! Display projections of the stored message log.
//!
//! This crate provides:
//! - Message rendering (hidden block stripping, placeholder lines, reasoning split)
//! - Turn reconstruction with newest-first pagination
//! - Heuristic token estimation for the context usage meter
//!
//! # Architecture
//!
//! ```text
//! &[Message] (cached log, read-only)
//! ├── build_turns()      -> Vec<ChatTurn>  -> TurnWindow (visible slice)
//! └── TokenEstimator     -> ContextUsage   (ratio / percent)
//! ```
//!
//! Everything here is pure; callers recompute whenever the log or the
//! visible window changes.

mod render;
mod token_estimator;
mod turns;

pub use render::{
    AssistantText, STANDARD_REASONING_MARKER, extract_audios, extract_images, message_text,
    parse_assistant_stored_text, render_message, strip_hidden_blocks,
};
pub use token_estimator::{
    AUDIO_PART_COST, ContextUsage, DEFAULT_CONTEXT_WINDOW, IMAGE_PART_COST, MAX_CONTEXT_WINDOW,
    MESSAGE_OVERHEAD, MIN_CONTEXT_WINDOW, TokenEstimator,
};
pub use turns::{TurnWindow, build_turns};
