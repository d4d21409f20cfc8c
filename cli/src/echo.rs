//! A local backend that answers by echoing.
//!
//! It behaves like a real chat service from the controller's side: reasoning
//! and text arrive as separate streamed chunks, image sends report tool
//! activity, and every exchange is persisted to an in-memory log with the
//! reasoning stored after the standard marker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::json;

use confab_context::{STANDARD_REASONING_MARKER, render_message};
use confab_engine::{
    ArchiveOutcome, AssistantEvent, BackendError, ChatBackend, DeltaSink, Message, MessagePart,
    Role, SendOutcome, SendRequest, SessionKey, ToolState,
};

/// Prefix that makes the echo backend fail the request.
const FAIL_PREFIX: &str = "/fail";

#[derive(Clone)]
pub(crate) struct EchoBackend {
    log: Arc<Mutex<Vec<Message>>>,
    next_id: Arc<AtomicU64>,
    chunk_delay: Duration,
}

impl EchoBackend {
    pub(crate) fn new(chunk_delay: Duration) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            chunk_delay,
        }
    }
}

impl ChatBackend for EchoBackend {
    fn send_message(
        &self,
        request: SendRequest,
        sink: DeltaSink,
    ) -> BoxFuture<'static, Result<SendOutcome, BackendError>> {
        let log = Arc::clone(&self.log);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let delay = self.chunk_delay;

        Box::pin(async move {
            let text = request.text.trim();
            if let Some(reason) = text.strip_prefix(FAIL_PREFIX) {
                let reason = reason.trim();
                let message = if reason.is_empty() { "requested failure" } else { reason };
                return Err(BackendError::Api {
                    status: 503,
                    body: json!({ "error": { "message": message } }).to_string(),
                });
            }

            let reasoning = format!(
                "The user sent {} characters and {} image(s).",
                text.chars().count(),
                request.images.len()
            );
            stream_chunks(&sink, &reasoning, delay, |chunk| {
                AssistantEvent::reasoning_standard(chunk)
            })
            .await;

            if !request.images.is_empty() {
                sink.send(AssistantEvent::tool_status(
                    "vision",
                    ToolState::Running,
                    format!("Looking at {} image(s)", request.images.len()),
                ))
                .await;
                pause(delay).await;
            }

            let answer = compose_answer(text, request.images.len());
            stream_chunks(&sink, &answer, delay, |chunk| AssistantEvent::text(chunk)).await;

            let mut parts = Vec::with_capacity(request.images.len() + 1);
            if !text.is_empty() {
                parts.push(MessagePart::text(text));
            }
            parts.extend(request.images.iter().map(MessagePart::image));
            let user = Message::new(format!("user-{id}"), Role::User, parts);
            let assistant = Message::assistant(
                format!("assistant-{id}"),
                format!("{answer}\n{STANDARD_REASONING_MARKER}\n{reasoning}"),
            );
            let latest_user_text = render_message(&user);

            let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
            log.push(user);
            log.push(assistant);

            Ok(SendOutcome {
                assistant_text: answer,
                latest_user_text,
                reasoning_standard: Some(reasoning),
                reasoning_inline: None,
                archived_before_send: false,
            })
        })
    }

    fn load_messages(
        &self,
        _session: &SessionKey,
    ) -> BoxFuture<'static, Result<Vec<Message>, BackendError>> {
        let messages = self
            .log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Box::pin(async move { Ok(messages) })
    }

    fn archive_conversation(
        &self,
        _session: &SessionKey,
    ) -> BoxFuture<'static, Result<ArchiveOutcome, BackendError>> {
        let archived = std::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Box::pin(async move {
            if archived.is_empty() {
                return Ok(ArchiveOutcome {
                    archived: false,
                    archive_id: None,
                    summary: "Nothing to archive".to_string(),
                    merged_memories: 0,
                });
            }
            Ok(ArchiveOutcome {
                archived: true,
                archive_id: Some(format!("archive-{id}")),
                summary: format!("{} messages archived", archived.len()),
                merged_memories: 0,
            })
        })
    }
}

fn compose_answer(text: &str, images: usize) -> String {
    match (text.is_empty(), images) {
        (true, n) => format!("You sent {n} image(s) without a caption."),
        (false, 0) => format!("You said: {text}"),
        (false, n) => format!("You said: {text} (with {n} image(s))"),
    }
}

/// Stream `text` word by word, pausing `delay` between chunks.
async fn stream_chunks(
    sink: &DeltaSink,
    text: &str,
    delay: Duration,
    event: fn(String) -> AssistantEvent,
) {
    for chunk in text.split_inclusive(' ') {
        if !sink.send(event(chunk.to_string())).await {
            return;
        }
        pause(delay).await;
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
