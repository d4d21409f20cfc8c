//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures_util::future::BoxFuture;
use tokio::sync::Notify;

use confab_engine::{
    AssistantEvent, BackendError, ChatBackend, ChatFlow, DeltaSink, FlowSettings, Message,
    SendOutcome, SendRequest, SessionKey,
};

/// What the backend does for one send.
pub struct Script {
    pub events: Vec<AssistantEvent>,
    pub result: Result<SendOutcome, BackendError>,
    /// Appended to the log when the send succeeds.
    pub persist: Vec<Message>,
    /// When set, the send resolves only after this is notified.
    pub release: Option<Arc<Notify>>,
}

impl Script {
    pub fn reply(events: Vec<AssistantEvent>, outcome: SendOutcome) -> Self {
        Self {
            events,
            result: Ok(outcome),
            persist: Vec::new(),
            release: None,
        }
    }

    pub fn failure(error: BackendError) -> Self {
        Self {
            events: Vec::new(),
            result: Err(error),
            persist: Vec::new(),
            release: None,
        }
    }

    pub fn persisting(mut self, messages: Vec<Message>) -> Self {
        self.persist = messages;
        self
    }

    /// Hold the result until the returned handle is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.release = Some(Arc::clone(&gate));
        (self, gate)
    }
}

/// Backend that plays back one [`Script`] per send, in order.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    log: Arc<Mutex<Vec<Message>>>,
    requests: Mutex<Vec<SendRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn seed_log(&self, messages: Vec<Message>) {
        *self.log.lock().unwrap() = messages;
    }

    pub fn requests(&self) -> Vec<SendRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatBackend for ScriptedBackend {
    fn send_message(
        &self,
        request: SendRequest,
        sink: DeltaSink,
    ) -> BoxFuture<'static, Result<SendOutcome, BackendError>> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted send");
        let log = Arc::clone(&self.log);

        Box::pin(async move {
            for event in script.events {
                sink.send(event).await;
            }
            if let Some(gate) = script.release {
                gate.notified().await;
            }
            if script.result.is_ok() {
                log.lock().unwrap().extend(script.persist);
            }
            script.result
        })
    }

    fn load_messages(
        &self,
        _session: &SessionKey,
    ) -> BoxFuture<'static, Result<Vec<Message>, BackendError>> {
        let messages = self.log.lock().unwrap().clone();
        Box::pin(async move { Ok(messages) })
    }
}

pub fn session() -> SessionKey {
    SessionKey::new("api-1", "agent-1").unwrap()
}

pub fn flow(backend: &Arc<ScriptedBackend>) -> ChatFlow {
    let backend: Arc<dyn ChatBackend> = backend.clone();
    ChatFlow::new(backend, FlowSettings::default()).with_session(session())
}

pub fn outcome(assistant_text: &str, latest_user_text: &str) -> SendOutcome {
    SendOutcome {
        assistant_text: assistant_text.to_string(),
        latest_user_text: latest_user_text.to_string(),
        ..SendOutcome::default()
    }
}

/// Tick at a fixed instant, yielding to spawned tasks, until `done` holds.
pub async fn pump_until(flow: &mut ChatFlow, now: Instant, done: impl Fn(&ChatFlow) -> bool) {
    for _ in 0..128 {
        flow.tick(now);
        if done(flow) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("flow did not reach the expected state");
}
