//! Context usage estimates

use std::sync::Arc;
use std::time::Instant;

use confab_context::{
    ContextUsage, DEFAULT_CONTEXT_WINDOW, MAX_CONTEXT_WINDOW, MIN_CONTEXT_WINDOW, TokenEstimator,
};
use confab_engine::{ChatBackend, ChatFlow, FlowSettings, MediaAttachment, Message, MessagePart, Role};

use crate::common::{ScriptedBackend, pump_until, session};

#[test]
fn cjk_text_weighs_more_than_latin() {
    let estimator = TokenEstimator::new();
    // 4 CJK chars * 0.6 = 2.4 -> 3; 4 latin chars * 0.3 = 1.2 -> 2
    assert_eq!(estimator.estimate_str("你好世界"), 3);
    assert_eq!(estimator.estimate_str("abcd"), 2);
    assert_eq!(estimator.estimate_str(" \n\t "), 0);
}

#[test]
fn media_parts_have_flat_costs() {
    let image = MediaAttachment::new("image/png", "AAAA");
    let audio = MediaAttachment::new("audio/webm", "BBBB");
    let msg = Message::new(
        "u1",
        Role::User,
        vec![MessagePart::image(&image), MessagePart::audio(&audio)],
    );
    assert_eq!(TokenEstimator::new().estimate_message(&msg), 12 + 280 + 320);
}

#[test]
fn window_is_clamped_and_percent_saturates() {
    let log = vec![Message::user("u1", "x".repeat(100_000))];

    let small = ContextUsage::estimate(&log, Some(10));
    assert_eq!(small.window_tokens(), MIN_CONTEXT_WINDOW);
    assert!(small.ratio() > 1.0);
    assert_eq!(small.percent(), 100);

    assert_eq!(
        ContextUsage::estimate(&log, Some(u32::MAX)).window_tokens(),
        MAX_CONTEXT_WINDOW
    );
    assert_eq!(
        ContextUsage::estimate(&log, None).window_tokens(),
        DEFAULT_CONTEXT_WINDOW
    );
}

#[tokio::test]
async fn flow_usage_follows_the_loaded_log() {
    let backend = ScriptedBackend::new();
    backend.seed_log(vec![Message::user("u1", "hello")]);
    let settings = FlowSettings {
        context_window: Some(20_000),
        ..FlowSettings::default()
    };
    let dyn_backend: Arc<dyn ChatBackend> = backend.clone();
    let mut flow = ChatFlow::new(dyn_backend, settings);

    assert_eq!(flow.context_usage().used_tokens(), 0);

    flow.set_session(Some(session()));
    flow.refresh_messages();
    pump_until(&mut flow, Instant::now(), |f| !f.messages().is_empty()).await;

    let usage = flow.context_usage();
    assert_eq!(usage.used_tokens(), 14);
    assert_eq!(usage.window_tokens(), 20_000);
    assert_eq!(usage.percent(), 0);
}
