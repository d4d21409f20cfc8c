//! Events delivered by the backend while an answer is being produced.

use serde::{Deserialize, Serialize};

const KIND_TOOL_STATUS: &str = "tool_status";
const KIND_REASONING_STANDARD: &str = "reasoning_standard";
const KIND_REASONING_INLINE: &str = "reasoning_inline";

/// Raw payload pushed through the delta channel.
///
/// Every field is optional on the wire. `kind` selects how the event is
/// routed; unrecognized kinds are plain text deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Routing class of an [`AssistantEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ToolStatus,
    ReasoningStandard,
    ReasoningInline,
    Text,
}

impl AssistantEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            ..Self::default()
        }
    }

    pub fn reasoning_standard(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            kind: Some(KIND_REASONING_STANDARD.to_string()),
            ..Self::default()
        }
    }

    pub fn reasoning_inline(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            kind: Some(KIND_REASONING_INLINE.to_string()),
            ..Self::default()
        }
    }

    pub fn tool_status(
        tool_name: impl Into<String>,
        state: ToolState,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: Some(KIND_TOOL_STATUS.to_string()),
            tool_name: Some(tool_name.into()),
            tool_status: Some(state.as_str().to_string()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self.kind.as_deref() {
            Some(KIND_TOOL_STATUS) => EventKind::ToolStatus,
            Some(KIND_REASONING_STANDARD) => EventKind::ReasoningStandard,
            Some(KIND_REASONING_INLINE) => EventKind::ReasoningInline,
            _ => EventKind::Text,
        }
    }

    /// The delta text, or empty when absent.
    #[must_use]
    pub fn delta_text(&self) -> &str {
        self.delta.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolState {
    Running,
    Done,
    Failed,
}

impl ToolState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ToolState::Running => "running",
            ToolState::Done => "done",
            ToolState::Failed => "failed",
        }
    }

    /// Parse a wire status. Anything unrecognized means "no state".
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(ToolState::Running),
            "done" => Some(ToolState::Done),
            "failed" => Some(ToolState::Failed),
            _ => None,
        }
    }
}

/// Tool activity line shown next to the streaming answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolStatus {
    pub text: String,
    pub state: Option<ToolState>,
}

impl ToolStatus {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.state.is_none()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.state = None;
    }
}
