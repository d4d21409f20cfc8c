//! Core engine for Confab: the chat flow state machine and stream pacing.
//!
//! This crate has no terminal or transport dependencies. Hosts supply a
//! [`ChatBackend`] and drive [`ChatFlow::tick`] from their event loop.

mod backend;
mod config;
mod errors;
mod flow;
mod locale;
mod pacer;

pub use backend::{ArchiveOutcome, BackendError, ChatBackend, DeltaSink, SendOutcome, SendRequest};
pub use config::{
    ConfabConfig, ConfigError, ContextConfig, DEFAULT_EVENT_BUDGET, SessionConfig, StreamConfig,
    config_path,
};
pub use errors::{extract_error_message, format_request_failed, truncate_with_ellipsis};
pub use flow::{ChatFlow, FlowSettings, Sanitizer};
pub use locale::{EnglishLocalizer, Localizer, StatusKey};
pub use pacer::{DEFAULT_DRAIN_TARGET, DEFAULT_FLUSH_INTERVAL, PacingSettings, StreamPacer};

// Re-export from crates for public API
pub use confab_context::{ContextUsage, TurnWindow};
pub use confab_types::{
    AssistantEvent, ChatTurn, Generation, MediaAttachment, Message, MessagePart, ProviderMeta,
    Role, SessionKey, ToolState, ToolStatus, remove_binary_placeholders, strip_escape_sequences,
};
