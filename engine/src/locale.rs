//! User-facing status strings.
//!
//! Translation catalogs live outside the engine. The engine only names the
//! strings it needs through [`StatusKey`] and asks a [`Localizer`] for them.

use crate::backend::BackendError;
use crate::errors::format_request_failed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKey {
    /// Replaces the assistant text when the user stops a reply.
    Interrupted,
    ToolCallDone,
    ToolCallFailed,
    LoadMessagesFailed,
    ArchiveFailed,
    ArchiveDone { merged_memories: usize },
}

pub trait Localizer: Send + Sync {
    fn status(&self, key: StatusKey) -> String;

    /// Chat error line for a failed send.
    fn request_failed(&self, error: &BackendError) -> String {
        format_request_failed(error)
    }

    /// Status line for a failed background operation.
    fn failure(&self, key: StatusKey, error: &BackendError) -> String {
        format!("{}: {error}", self.status(key))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishLocalizer;

impl Localizer for EnglishLocalizer {
    fn status(&self, key: StatusKey) -> String {
        match key {
            StatusKey::Interrupted => "(interrupted)".to_string(),
            StatusKey::ToolCallDone => "Tool call finished".to_string(),
            StatusKey::ToolCallFailed => "Tool call failed".to_string(),
            StatusKey::LoadMessagesFailed => "Failed to load messages".to_string(),
            StatusKey::ArchiveFailed => "Failed to archive conversation".to_string(),
            StatusKey::ArchiveDone { merged_memories } => {
                format!("Conversation archived, {merged_memories} memories merged")
            }
        }
    }
}
