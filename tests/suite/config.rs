//! Config file to running flow

use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};

use confab_engine::{AssistantEvent, ChatBackend, ChatFlow, ConfabConfig};
use tempfile::tempdir;

use crate::common::{Script, ScriptedBackend, outcome, pump_until};

const CONFIG: &str = r#"
[stream]
flush_interval_ms = 10
drain_target_ms = 20
event_budget = 1

[context]
window_tokens = 32000

[session]
api_config_id = "work"
agent_id = "helper"
"#;

#[tokio::test]
async fn configured_flow_uses_file_settings() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();
    let config = ConfabConfig::load_from(&path).unwrap().unwrap();

    let settings = config.flow_settings();
    assert_eq!(settings.pacing.flush_interval(), Duration::from_millis(10));
    assert_eq!(settings.pacing.drain_target(), Duration::from_millis(20));
    assert_eq!(settings.event_budget, 1);

    let session = config.session().unwrap();
    assert_eq!(session.to_string(), "work/helper");

    let backend = ScriptedBackend::new();
    let (script, _release) = Script::reply(
        vec![AssistantEvent::text("ab"), AssistantEvent::text("cd")],
        outcome("abcd", "go"),
    )
    .gated();
    backend.push(script);

    let dyn_backend: Arc<dyn ChatBackend> = backend.clone();
    let mut flow = ChatFlow::new(dyn_backend, settings).with_session(session);
    flow.set_input("go");
    assert!(flow.send_chat());
    assert_eq!(flow.context_usage().window_tokens(), 32_000);

    // A budget of one drains a single event per tick.
    let t0 = Instant::now();
    pump_until(&mut flow, t0, |f| !f.pending_text().is_empty()).await;
    assert_eq!(flow.pending_text(), "ab");
    pump_until(&mut flow, t0, |f| f.pending_text() == "abcd").await;

    // Only one flush fits before the drain target, so it reveals everything.
    flow.tick(t0 + Duration::from_millis(5));
    assert_eq!(flow.assistant_text(), "");
    flow.tick(t0 + Duration::from_millis(10));
    assert_eq!(flow.assistant_text(), "abcd");
    assert_eq!(flow.pending_text(), "");
}
