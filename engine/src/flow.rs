//! The chat flow controller.
//!
//! [`ChatFlow`] runs one send/receive cycle at a time:
//!
//! ```text
//! Idle -> Guard -> Armed -> Streaming -> Settle(success | error) -> Cleanup
//! ```
//!
//! Backend calls run on spawned tasks. They never touch controller state;
//! they post generation-tagged [`FlowMessage`]s into a channel that the host
//! drains by calling [`ChatFlow::tick`] from its event loop. Every handler
//! compares the message's generation against the live one before mutating
//! anything, so a superseded cycle can finish whenever it likes without
//! clobbering the display.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use confab_context::{ContextUsage, TurnWindow, build_turns};
use confab_types::{
    AssistantEvent, ChatTurn, EventKind, Generation, MediaAttachment, Message, MessagePart, Role,
    SessionKey, ToolState, ToolStatus, remove_binary_placeholders,
};

use crate::backend::{
    ArchiveOutcome, BackendError, ChatBackend, DeltaSink, SendOutcome, SendRequest,
};
use crate::config::DEFAULT_EVENT_BUDGET;
use crate::locale::{EnglishLocalizer, Localizer, StatusKey};
use crate::pacer::{PacingSettings, StreamPacer};

const CHANNEL_CAPACITY: usize = 1024;
const OPTIMISTIC_ID_PREFIX: &str = "optimistic-user-";

/// Rewrites the backend's echo of the user text before display.
pub type Sanitizer = fn(&str) -> String;

/// Everything a backend task can report back to the controller.
#[derive(Debug)]
pub(crate) enum FlowMessage {
    Event {
        generation: Generation,
        event: AssistantEvent,
    },
    Settled {
        generation: Generation,
        session: SessionKey,
        images: Vec<MediaAttachment>,
        result: Result<SendOutcome, BackendError>,
    },
    Loaded {
        session: SessionKey,
        seq: u64,
        requested_at: Instant,
        result: Result<Vec<Message>, BackendError>,
    },
    Archived {
        session: SessionKey,
        seq: u64,
        result: Result<ArchiveOutcome, BackendError>,
        reload: Option<Result<Vec<Message>, BackendError>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSettings {
    pub pacing: PacingSettings,
    /// Channel messages handled per [`ChatFlow::tick`].
    pub event_budget: usize,
    /// Context window of the active api config, in tokens.
    pub context_window: Option<u32>,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            pacing: PacingSettings::default(),
            event_budget: DEFAULT_EVENT_BUDGET,
            context_window: None,
        }
    }
}

pub struct ChatFlow {
    backend: Arc<dyn ChatBackend>,
    localizer: Arc<dyn Localizer>,
    sanitize: Sanitizer,

    tx: mpsc::Sender<FlowMessage>,
    rx: mpsc::Receiver<FlowMessage>,
    event_budget: usize,
    context_window: Option<u32>,

    session: Option<SessionKey>,
    generation: Generation,
    pacer: StreamPacer,
    chatting: bool,
    archiving: bool,

    input: String,
    attachments: Vec<MediaAttachment>,

    latest_user_text: String,
    latest_user_images: Vec<MediaAttachment>,
    assistant_text: String,
    reasoning_standard: String,
    reasoning_inline: String,
    reasoning_started_at: Option<Instant>,
    tool_status: ToolStatus,
    error_text: String,
    status_text: String,

    messages: Vec<Message>,
    turn_window: TurnWindow,
    /// Sequence number handed to the next log load.
    next_load: u64,
    /// Loads issued before this number are outdated and never applied.
    oldest_current_load: u64,
}

impl ChatFlow {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: FlowSettings) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            backend,
            localizer: Arc::new(EnglishLocalizer),
            sanitize: remove_binary_placeholders,
            tx,
            rx,
            event_budget: settings.event_budget.max(1),
            context_window: settings.context_window,
            session: None,
            generation: Generation::ZERO,
            pacer: StreamPacer::new(settings.pacing),
            chatting: false,
            archiving: false,
            input: String::new(),
            attachments: Vec::new(),
            latest_user_text: String::new(),
            latest_user_images: Vec::new(),
            assistant_text: String::new(),
            reasoning_standard: String::new(),
            reasoning_inline: String::new(),
            reasoning_started_at: None,
            tool_status: ToolStatus::default(),
            error_text: String::new(),
            status_text: String::new(),
            messages: Vec::new(),
            turn_window: TurnWindow::default(),
            next_load: 0,
            oldest_current_load: 0,
        }
    }

    #[must_use]
    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    #[must_use]
    pub fn with_sanitizer(mut self, sanitize: Sanitizer) -> Self {
        self.sanitize = sanitize;
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionKey) -> Self {
        self.session = Some(session);
        self
    }

    // ========================================================================
    // Input
    // ========================================================================

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn attach_image(&mut self, image: MediaAttachment) {
        self.attachments.push(image);
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// Switch the active conversation.
    ///
    /// The cached log belongs to the previous session, so it is dropped; call
    /// [`ChatFlow::refresh_messages`] to load the new one. An in-flight send
    /// keeps streaming but will not reload into the new session.
    pub fn set_session(&mut self, session: Option<SessionKey>) {
        if self.session == session {
            return;
        }
        tracing::info!(
            from = ?self.session.as_ref().map(ToString::to_string),
            to = ?session.as_ref().map(ToString::to_string),
            "Switching session"
        );
        self.session = session;
        self.messages.clear();
        self.turn_window.reset();
        self.oldest_current_load = self.next_load;
    }

    // ========================================================================
    // Send / stop
    // ========================================================================

    /// Start a send/receive cycle with the current input and attachments.
    ///
    /// Returns `false` without side effects when the guard rejects the send:
    /// a cycle or archive is already running, there is nothing to send, or no
    /// session is selected. Backend failures never surface here; they land in
    /// [`ChatFlow::error_text`] once the cycle settles.
    pub fn send_chat(&mut self) -> bool {
        if self.chatting {
            tracing::debug!("Send ignored: a reply is already streaming");
            return false;
        }
        if self.archiving {
            tracing::debug!("Send ignored: archive in progress");
            return false;
        }
        let text = self.input.trim().to_string();
        if text.is_empty() && self.attachments.is_empty() {
            tracing::debug!("Send ignored: nothing to send");
            return false;
        }
        let Some(session) = self.session.clone() else {
            tracing::debug!("Send ignored: no session selected");
            return false;
        };

        // Armed.
        let images = std::mem::take(&mut self.attachments);
        self.input.clear();

        self.latest_user_text.clone_from(&text);
        self.latest_user_images.clone_from(&images);
        self.reset_transient();
        self.error_text.clear();

        self.messages.push(optimistic_user_message(&text, &images));
        self.turn_window.reset();
        // Loads already in flight predate the optimistic message.
        self.oldest_current_load = self.next_load;

        self.generation = self.generation.next();
        let generation = self.generation;
        self.pacer.set_live_generation(generation);
        self.pacer.clear();
        self.chatting = true;

        tracing::info!(
            %generation,
            %session,
            chars = text.chars().count(),
            images = images.len(),
            "Sending chat message"
        );

        let request = SendRequest {
            text,
            images: images.clone(),
            session: session.clone(),
        };
        let sink = DeltaSink::new(generation, self.tx.clone());
        let call = self.backend.send_message(request, sink);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = call.await;
            let _ = tx
                .send(FlowMessage::Settled {
                    generation,
                    session,
                    images,
                    result,
                })
                .await;
        });

        true
    }

    /// Abandon the live cycle.
    ///
    /// The backend call is not aborted; its events and result are ignored
    /// when they arrive. The log is reloaded to show whatever the backend
    /// persisted.
    pub fn stop_chat(&mut self) {
        self.generation = self.generation.next();
        self.pacer.set_live_generation(self.generation);
        self.pacer.clear();
        self.chatting = false;
        self.assistant_text = self.localizer.status(StatusKey::Interrupted);
        self.reasoning_standard.clear();
        self.reasoning_inline.clear();
        self.reasoning_started_at = None;
        self.tool_status.clear();

        tracing::info!(generation = %self.generation, "Chat stopped");
        self.refresh_messages();
    }

    /// Reconcile a final assistant text delivered whole instead of as deltas.
    ///
    /// This is a host hook for transports with a non-streaming fallback
    /// (for example a reply recovered by polling after the stream dropped):
    /// the host calls it with the live generation while the cycle is still
    /// open, so the text is paced in rather than appearing at once. Settle
    /// still overwrites the display with the backend's authoritative result.
    ///
    /// Nothing shown yet: the whole text is paced in. Shown text is a strict
    /// prefix: only the missing suffix is paced in. Anything else is left
    /// alone. Returns whether text was enqueued.
    pub fn enqueue_final_text(
        &mut self,
        generation: Generation,
        final_text: &str,
        now: Instant,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        let text = final_text.trim();
        if text.is_empty() {
            return false;
        }
        if self.assistant_text.is_empty() && self.pacer.pending_text().is_empty() {
            return self.pacer.enqueue_delta(generation, final_text, now);
        }

        let missing = text
            .strip_prefix(self.assistant_text.as_str())
            .and_then(|rest| rest.strip_prefix(self.pacer.pending_text()))
            .map(str::to_string);
        match missing {
            Some(missing) => self.pacer.enqueue_delta(generation, &missing, now),
            None => {
                tracing::debug!(%generation, "Final text diverges from streamed text");
                false
            }
        }
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Drain pending backend messages (up to the event budget) and fire due
    /// pacer ticks. Call this from the host loop at roughly the flush rate.
    pub fn tick(&mut self, now: Instant) {
        for _ in 0..self.event_budget {
            match self.rx.try_recv() {
                Ok(message) => self.handle_message(message, now),
                Err(_) => break,
            }
        }
        self.pacer.advance(now, self.chatting, &mut self.assistant_text);
    }

    /// When the host should tick next to keep the reveal smooth.
    #[must_use]
    pub fn next_flush_at(&self) -> Option<Instant> {
        self.pacer.next_flush_at()
    }

    fn handle_message(&mut self, message: FlowMessage, now: Instant) {
        match message {
            FlowMessage::Event { generation, event } => self.handle_event(generation, event, now),
            FlowMessage::Settled {
                generation,
                session,
                images,
                result,
            } => self.settle(generation, &session, images, result),
            FlowMessage::Loaded {
                session,
                seq,
                requested_at,
                result,
            } => self.apply_loaded(&session, seq, requested_at, result),
            FlowMessage::Archived {
                session,
                seq,
                result,
                reload,
            } => self.apply_archived(&session, seq, result, reload),
        }
    }

    fn handle_event(&mut self, generation: Generation, event: AssistantEvent, now: Instant) {
        if generation != self.generation {
            tracing::trace!(%generation, live = %self.generation, "Dropping stale event");
            return;
        }

        match event.kind() {
            EventKind::ToolStatus => {
                self.tool_status.text = event.message.unwrap_or_default();
                self.tool_status.state = event.tool_status.as_deref().and_then(ToolState::parse);
            }
            EventKind::ReasoningStandard => {
                let delta = event.delta_text();
                self.mark_reasoning_started(delta, now);
                self.reasoning_standard.push_str(delta);
            }
            EventKind::ReasoningInline => {
                let delta = event.delta_text();
                self.mark_reasoning_started(delta, now);
                self.reasoning_inline.push_str(delta);
            }
            EventKind::Text => {
                self.pacer.enqueue_delta(generation, event.delta_text(), now);
            }
        }
    }

    fn mark_reasoning_started(&mut self, delta: &str, now: Instant) {
        if !delta.is_empty() && self.reasoning_started_at.is_none() {
            self.reasoning_started_at = Some(now);
        }
    }

    fn settle(
        &mut self,
        generation: Generation,
        session: &SessionKey,
        images: Vec<MediaAttachment>,
        result: Result<SendOutcome, BackendError>,
    ) {
        if generation != self.generation {
            tracing::debug!(%generation, live = %self.generation, "Ignoring superseded reply");
            return;
        }

        match result {
            Ok(outcome) => {
                self.latest_user_text = (self.sanitize)(&outcome.latest_user_text);
                self.latest_user_images = images;

                self.pacer.clear();
                self.assistant_text = outcome.assistant_text;
                if let Some(reasoning) = outcome.reasoning_standard {
                    self.reasoning_standard = reasoning;
                }
                if let Some(reasoning) = outcome.reasoning_inline {
                    self.reasoning_inline = reasoning;
                }
                self.error_text.clear();

                if self.tool_status.state == Some(ToolState::Running) {
                    self.tool_status.state = Some(ToolState::Done);
                    self.tool_status.text = self.localizer.status(StatusKey::ToolCallDone);
                }

                tracing::info!(
                    %generation,
                    chars = self.assistant_text.chars().count(),
                    archived_before_send = outcome.archived_before_send,
                    "Reply settled"
                );
            }
            Err(error) => {
                self.pacer.clear();
                self.assistant_text.clear();
                self.reasoning_standard.clear();
                self.reasoning_inline.clear();
                self.error_text = self.localizer.request_failed(&error);

                if self.tool_status.text.is_empty() {
                    self.tool_status.state = Some(ToolState::Failed);
                    self.tool_status.text = self.localizer.status(StatusKey::ToolCallFailed);
                }

                tracing::warn!(%generation, %error, "Reply failed");
            }
        }

        self.reload_if_same_session(session);

        // Cleanup. The generation is still live here.
        self.chatting = false;
        self.reasoning_started_at = None;
    }

    fn reset_transient(&mut self) {
        self.assistant_text.clear();
        self.reasoning_standard.clear();
        self.reasoning_inline.clear();
        self.reasoning_started_at = None;
        self.tool_status.clear();
    }

    // ========================================================================
    // Message log
    // ========================================================================

    /// Reload the authoritative log for the current session.
    pub fn refresh_messages(&mut self) {
        if let Some(session) = self.session.clone() {
            self.spawn_load(session);
        }
    }

    fn reload_if_same_session(&mut self, captured: &SessionKey) {
        if self.session.as_ref() == Some(captured) {
            self.spawn_load(captured.clone());
        } else {
            tracing::debug!(%captured, "Session changed during send; skipping reload");
        }
    }

    fn issue_load(&mut self) -> u64 {
        let seq = self.next_load;
        self.next_load += 1;
        seq
    }

    /// A load is outdated once a later load has been applied or an
    /// optimistic message was inserted after it was issued.
    fn load_is_outdated(&self, seq: u64) -> bool {
        if seq < self.oldest_current_load {
            tracing::debug!(
                seq,
                oldest_current = self.oldest_current_load,
                "Discarding outdated message load"
            );
            return true;
        }
        false
    }

    fn replace_messages(&mut self, seq: u64, messages: Vec<Message>) {
        self.oldest_current_load = seq + 1;
        self.messages = messages;
    }

    fn spawn_load(&mut self, session: SessionKey) {
        let seq = self.issue_load();
        let call = self.backend.load_messages(&session);
        let tx = self.tx.clone();
        let requested_at = Instant::now();
        tokio::spawn(async move {
            let result = call.await;
            let _ = tx
                .send(FlowMessage::Loaded {
                    session,
                    seq,
                    requested_at,
                    result,
                })
                .await;
        });
    }

    fn apply_loaded(
        &mut self,
        session: &SessionKey,
        seq: u64,
        requested_at: Instant,
        result: Result<Vec<Message>, BackendError>,
    ) {
        if self.session.as_ref() != Some(session) {
            tracing::debug!(%session, "Discarding messages for an inactive session");
            return;
        }
        if self.load_is_outdated(seq) {
            return;
        }
        match result {
            Ok(messages) => {
                tracing::debug!(
                    seq,
                    count = messages.len(),
                    elapsed_ms = requested_at.elapsed().as_millis(),
                    "Loaded messages"
                );
                self.replace_messages(seq, messages);
            }
            Err(error) => {
                tracing::warn!(%session, %error, "Failed to load messages");
                self.status_text = self.localizer.failure(StatusKey::LoadMessagesFailed, &error);
            }
        }
    }

    // ========================================================================
    // Archive
    // ========================================================================

    /// Archive the active conversation and reload the (now fresh) log.
    ///
    /// Returns `false` when no session is selected or a reply or archive is
    /// already running.
    pub fn force_archive(&mut self) -> bool {
        let Some(session) = self.session.clone() else {
            return false;
        };
        if self.chatting || self.archiving {
            tracing::debug!("Archive ignored: busy");
            return false;
        }
        self.archiving = true;
        let seq = self.issue_load();
        tracing::info!(%session, "Archiving conversation");

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.archive_conversation(&session).await;
            let reload = if result.is_ok() {
                Some(backend.load_messages(&session).await)
            } else {
                None
            };
            let _ = tx
                .send(FlowMessage::Archived {
                    session,
                    seq,
                    result,
                    reload,
                })
                .await;
        });
        true
    }

    fn apply_archived(
        &mut self,
        session: &SessionKey,
        seq: u64,
        result: Result<ArchiveOutcome, BackendError>,
        reload: Option<Result<Vec<Message>, BackendError>>,
    ) {
        self.archiving = false;
        if self.session.as_ref() != Some(session) {
            tracing::debug!(%session, "Archive finished for an inactive session");
            return;
        }

        match result {
            Ok(outcome) => {
                tracing::info!(
                    archived = outcome.archived,
                    archive_id = ?outcome.archive_id,
                    merged_memories = outcome.merged_memories,
                    "Archive finished"
                );
                self.status_text = if outcome.archived {
                    self.localizer.status(StatusKey::ArchiveDone {
                        merged_memories: outcome.merged_memories,
                    })
                } else {
                    outcome.summary
                };
                match reload {
                    Some(Ok(messages)) => {
                        if !self.load_is_outdated(seq) {
                            self.replace_messages(seq, messages);
                        }
                    }
                    Some(Err(error)) => {
                        tracing::warn!(%error, "Failed to reload after archive");
                        self.status_text =
                            self.localizer.failure(StatusKey::LoadMessagesFailed, &error);
                    }
                    None => {}
                }
                self.turn_window.reset();
            }
            Err(error) => {
                tracing::warn!(%session, %error, "Archive failed");
                self.status_text = self.localizer.failure(StatusKey::ArchiveFailed, &error);
            }
        }
    }

    // ========================================================================
    // Turns and usage
    // ========================================================================

    /// Every turn reconstructed from the cached log.
    #[must_use]
    pub fn turns(&self) -> Vec<ChatTurn> {
        build_turns(&self.messages)
    }

    /// The newest turns that fit the current pagination window.
    #[must_use]
    pub fn visible_turns(&self) -> Vec<ChatTurn> {
        let turns = self.turns();
        self.turn_window.visible(&turns).to_vec()
    }

    #[must_use]
    pub fn has_more_turns(&self) -> bool {
        self.turn_window.has_more(self.turns().len())
    }

    pub fn load_more_turns(&mut self) {
        self.turn_window.load_more();
    }

    #[must_use]
    pub fn visible_turn_count(&self) -> usize {
        self.turn_window.count()
    }

    /// Estimated context consumption of the cached log.
    #[must_use]
    pub fn context_usage(&self) -> ContextUsage {
        if self.session.is_none() {
            return ContextUsage::inactive();
        }
        ContextUsage::estimate(&self.messages, self.context_window)
    }

    /// How long the model has been reasoning in the live cycle.
    #[must_use]
    pub fn reasoning_elapsed(&self, now: Instant) -> Option<Duration> {
        self.reasoning_started_at
            .map(|started| now.saturating_duration_since(started))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionKey> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn is_chatting(&self) -> bool {
        self.chatting
    }

    #[must_use]
    pub fn is_archiving(&self) -> bool {
        self.archiving
    }

    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn attachments(&self) -> &[MediaAttachment] {
        &self.attachments
    }

    #[must_use]
    pub fn latest_user_text(&self) -> &str {
        &self.latest_user_text
    }

    #[must_use]
    pub fn latest_user_images(&self) -> &[MediaAttachment] {
        &self.latest_user_images
    }

    /// Assistant text revealed so far.
    #[must_use]
    pub fn assistant_text(&self) -> &str {
        &self.assistant_text
    }

    /// Assistant text received but not yet revealed.
    #[must_use]
    pub fn pending_text(&self) -> &str {
        self.pacer.pending_text()
    }

    #[must_use]
    pub fn reasoning_standard(&self) -> &str {
        &self.reasoning_standard
    }

    #[must_use]
    pub fn reasoning_inline(&self) -> &str {
        &self.reasoning_inline
    }

    #[must_use]
    pub fn tool_status(&self) -> &ToolStatus {
        &self.tool_status
    }

    #[must_use]
    pub fn error_text(&self) -> &str {
        &self.error_text
    }

    /// Result line of the last background operation (load, archive).
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

fn optimistic_user_message(text: &str, images: &[MediaAttachment]) -> Message {
    let now = Utc::now();
    let mut parts = Vec::with_capacity(images.len() + 1);
    if !text.is_empty() {
        parts.push(MessagePart::text(text));
    }
    parts.extend(images.iter().map(MessagePart::image));
    Message::new(
        format!("{OPTIMISTIC_ID_PREFIX}{}", now.timestamp_millis()),
        Role::User,
        parts,
    )
    .with_created_at(now.to_rfc3339())
}
