//! Collaborator contract for the backend chat service.
//!
//! The engine never builds provider requests itself. It hands the user's input
//! to a [`ChatBackend`], which streams [`AssistantEvent`]s through a
//! [`DeltaSink`] and resolves exactly once with the authoritative result.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use confab_types::{AssistantEvent, Generation, MediaAttachment, Message, SessionKey};

use crate::flow::FlowMessage;

#[derive(Debug, Clone)]
pub struct SendRequest {
    pub text: String,
    pub images: Vec<MediaAttachment>,
    pub session: SessionKey,
}

/// Authoritative result of one send, as persisted by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub assistant_text: String,
    /// The user text as the backend recorded it (may carry placeholder lines).
    pub latest_user_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_standard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_inline: Option<String>,
    #[serde(default)]
    pub archived_before_send: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutcome {
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    pub summary: String,
    #[serde(default)]
    pub merged_memories: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("{0}")]
    Rejected(String),
}

/// Where a backend pushes streamed events for one send.
///
/// Every event is tagged with the generation of the send that created the
/// sink, so events outliving their cycle are recognized as stale.
#[derive(Debug, Clone)]
pub struct DeltaSink {
    generation: Generation,
    tx: mpsc::Sender<FlowMessage>,
}

impl DeltaSink {
    pub(crate) fn new(generation: Generation, tx: mpsc::Sender<FlowMessage>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Deliver an event, waiting for channel capacity.
    ///
    /// Events are never dropped while the controller is alive; a full
    /// channel applies backpressure instead. Returns `false` once the
    /// controller is gone.
    pub async fn send(&self, event: AssistantEvent) -> bool {
        self.tx
            .send(FlowMessage::Event {
                generation: self.generation,
                event,
            })
            .await
            .is_ok()
    }
}

/// The backend chat service as seen by the engine.
///
/// Futures are `'static` so they can run on spawned tasks; implementations
/// clone whatever state they need into the future.
pub trait ChatBackend: Send + Sync {
    /// Send a message, streaming zero or more events into `sink` before
    /// resolving with the authoritative outcome. Must resolve exactly once.
    fn send_message(
        &self,
        request: SendRequest,
        sink: DeltaSink,
    ) -> BoxFuture<'static, Result<SendOutcome, BackendError>>;

    /// The authoritative message log for `session`.
    fn load_messages(
        &self,
        session: &SessionKey,
    ) -> BoxFuture<'static, Result<Vec<Message>, BackendError>>;

    /// Archive the active conversation of `session`.
    fn archive_conversation(
        &self,
        session: &SessionKey,
    ) -> BoxFuture<'static, Result<ArchiveOutcome, BackendError>> {
        let _ = session;
        Box::pin(async { Err(BackendError::Rejected("archiving is not supported".to_string())) })
    }
}
