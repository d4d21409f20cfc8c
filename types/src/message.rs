//! Stored message domain model.
//!
//! Messages are owned by the backend message log. The client only reads them,
//! apart from the optimistic user message inserted while a send is in flight.

use serde::{Deserialize, Serialize};

/// Who authored a message. Immutable once the message exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
    #[serde(other)]
    Unknown,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
            Role::Unknown => "unknown",
        }
    }
}

/// An inline binary payload (image or audio) ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    pub mime: String,
    #[serde(alias = "bytes_base64")]
    pub bytes_base64: String,
}

impl MediaAttachment {
    pub fn new(mime: impl Into<String>, bytes_base64: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            bytes_base64: bytes_base64.into(),
        }
    }
}

/// One typed payload of a message. Parts order is display order.
///
/// Media parts keep their fields optional: stored logs may carry parts with
/// missing mime or byte data, and those are filtered at extraction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text {
        #[serde(default)]
        text: String,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
        #[serde(
            rename = "bytesBase64",
            alias = "bytes_base64",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        bytes_base64: Option<String>,
    },
    Audio {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
        #[serde(
            rename = "bytesBase64",
            alias = "bytes_base64",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        bytes_base64: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }

    #[must_use]
    pub fn image(attachment: &MediaAttachment) -> Self {
        MessagePart::Image {
            mime: Some(attachment.mime.clone()),
            bytes_base64: Some(attachment.bytes_base64.clone()),
        }
    }

    #[must_use]
    pub fn audio(attachment: &MediaAttachment) -> Self {
        MessagePart::Audio {
            mime: Some(attachment.mime.clone()),
            bytes_base64: Some(attachment.bytes_base64.clone()),
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Structured reasoning captured by the provider alongside the answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_standard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_inline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: String,
    role: Role,
    #[serde(default)]
    parts: Vec<MessagePart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider_meta: Option<ProviderMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, role: Role, parts: Vec<MessagePart>) -> Self {
        Self {
            id: id.into(),
            role,
            parts,
            provider_meta: None,
            created_at: None,
        }
    }

    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, vec![MessagePart::text(text)])
    }

    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Role::Assistant, vec![MessagePart::text(text)])
    }

    #[must_use]
    pub fn with_provider_meta(mut self, meta: ProviderMeta) -> Self {
        self.provider_meta = Some(meta);
        self
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn parts(&self) -> &[MessagePart] {
        &self.parts
    }

    #[must_use]
    pub fn provider_meta(&self) -> Option<&ProviderMeta> {
        self.provider_meta.as_ref()
    }

    #[must_use]
    pub fn created_at(&self) -> Option<&str> {
        self.created_at.as_deref()
    }
}
