//! Core domain types for Confab.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod event;
mod message;
mod sanitize;
mod terminal;
mod turn;

pub use event::{AssistantEvent, EventKind, ToolState, ToolStatus};
pub use message::{MediaAttachment, Message, MessagePart, ProviderMeta, Role};
pub use sanitize::{AUDIO_PLACEHOLDER, IMAGE_PLACEHOLDER, remove_binary_placeholders};
pub use terminal::strip_escape_sequences;
pub use turn::ChatTurn;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Generation
// ============================================================================

/// Identifies one send/stream cycle.
///
/// Exactly one generation is live at a time. Anything tagged with an older
/// generation is stale and must not touch display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub const ZERO: Generation = Generation(0);

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

// ============================================================================
// Session Key
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSessionError {
    #[error("api config id must not be empty")]
    MissingApiConfig,
    #[error("agent id must not be empty")]
    MissingAgent,
}

/// The addressable destination of a chat: which api config talks to which agent.
///
/// Both ids are guaranteed non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    api_config_id: String,
    agent_id: String,
}

impl SessionKey {
    pub fn new(
        api_config_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Result<Self, InvalidSessionError> {
        let api_config_id = api_config_id.into().trim().to_string();
        let agent_id = agent_id.into().trim().to_string();
        if api_config_id.is_empty() {
            return Err(InvalidSessionError::MissingApiConfig);
        }
        if agent_id.is_empty() {
            return Err(InvalidSessionError::MissingAgent);
        }
        Ok(Self {
            api_config_id,
            agent_id,
        })
    }

    #[must_use]
    pub fn api_config_id(&self) -> &str {
        &self.api_config_id
    }

    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_config_id, self.agent_id)
    }
}
