//! Full send/stream/settle cycles through the public flow API

use std::time::{Duration, Instant};

use confab_engine::{
    AssistantEvent, BackendError, DEFAULT_FLUSH_INTERVAL, MediaAttachment, Message, MessagePart,
    Role, ToolState,
};

use crate::common::{Script, ScriptedBackend, flow, outcome, pump_until};

#[tokio::test]
async fn streamed_reply_is_paced_then_aligned_to_the_result() {
    let backend = ScriptedBackend::new();
    let (script, release) = Script::reply(
        vec![AssistantEvent::text("Hello "), AssistantEvent::text("world")],
        outcome("Hello world!", "hi"),
    )
    .persisting(vec![
        Message::user("u1", "hi"),
        Message::assistant("a1", "Hello world!"),
    ])
    .gated();
    backend.push(script);

    let mut flow = flow(&backend);
    flow.set_input("hi");
    assert!(flow.send_chat());

    let t0 = Instant::now();
    pump_until(&mut flow, t0, |f| f.pending_text() == "Hello world").await;
    assert_eq!(flow.assistant_text(), "");

    // One flush reveals a slice, not the whole buffer.
    flow.tick(t0 + DEFAULT_FLUSH_INTERVAL);
    assert_eq!(flow.assistant_text(), "H");
    assert_eq!(flow.pending_text(), "ello world");

    release.notify_one();
    let t1 = t0 + DEFAULT_FLUSH_INTERVAL;
    pump_until(&mut flow, t1, |f| !f.is_chatting()).await;
    assert_eq!(flow.assistant_text(), "Hello world!");
    assert_eq!(flow.pending_text(), "");
    assert!(flow.next_flush_at().is_none());

    pump_until(&mut flow, t1, |f| f.messages().len() == 2).await;
    let turns = flow.turns();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_text, "hi");
    assert_eq!(turns[0].assistant_text, "Hello world!");
}

#[tokio::test]
async fn stopped_cycle_never_leaks_into_the_next_one() {
    let backend = ScriptedBackend::new();
    let (stale, release_stale) =
        Script::reply(vec![AssistantEvent::text("old ")], outcome("old answer", "first")).gated();
    backend.push(stale);
    let (fresh, release_fresh) =
        Script::reply(vec![AssistantEvent::text("new ")], outcome("new answer", "second")).gated();
    backend.push(fresh);

    let mut flow = flow(&backend);
    let now = Instant::now();

    flow.set_input("first");
    assert!(flow.send_chat());
    let first = flow.generation();
    pump_until(&mut flow, now, |f| f.pending_text() == "old ").await;

    flow.stop_chat();
    assert_eq!(flow.assistant_text(), "(interrupted)");
    assert!(!flow.is_chatting());

    flow.set_input("second");
    assert!(flow.send_chat());
    assert!(flow.generation() > first);
    pump_until(&mut flow, now, |f| f.pending_text() == "new ").await;

    // The abandoned send resolves late; nothing of it may surface.
    release_stale.notify_one();
    for _ in 0..16 {
        tokio::task::yield_now().await;
        flow.tick(now);
    }
    assert!(flow.is_chatting());
    assert_eq!(flow.pending_text(), "new ");
    assert_eq!(flow.assistant_text(), "");

    release_fresh.notify_one();
    pump_until(&mut flow, now, |f| !f.is_chatting()).await;
    assert_eq!(flow.assistant_text(), "new answer");
    assert_eq!(flow.latest_user_text(), "second");
    assert!(!flow.enqueue_final_text(first, "old answer", now));
}

#[tokio::test]
async fn image_send_reports_tool_progress_and_keeps_images() {
    let backend = ScriptedBackend::new();
    let image = MediaAttachment::new("image/png", "AAAA");
    let (script, release) = Script::reply(
        vec![
            AssistantEvent::reasoning_standard("looking"),
            AssistantEvent::tool_status("vision", ToolState::Running, "Inspecting image"),
        ],
        outcome("A square.", "what\n[image]"),
    )
    .persisting(vec![
        Message::new(
            "u1",
            Role::User,
            vec![MessagePart::text("what"), MessagePart::image(&image)],
        ),
        Message::assistant("a1", "A square."),
    ])
    .gated();
    backend.push(script);

    let mut flow = flow(&backend);
    flow.set_input("what");
    flow.attach_image(image.clone());
    assert!(flow.send_chat());
    assert!(flow.attachments().is_empty());
    assert_eq!(flow.latest_user_images(), std::slice::from_ref(&image));

    let now = Instant::now();
    pump_until(&mut flow, now, |f| {
        f.tool_status().state == Some(ToolState::Running)
    })
    .await;
    assert_eq!(flow.tool_status().text, "Inspecting image");
    assert_eq!(flow.reasoning_standard(), "looking");
    assert!(flow.reasoning_elapsed(now + Duration::from_secs(2)).is_some());

    release.notify_one();
    pump_until(&mut flow, now, |f| !f.is_chatting()).await;
    assert_eq!(flow.tool_status().state, Some(ToolState::Done));
    assert_eq!(flow.tool_status().text, "Tool call finished");
    assert_eq!(flow.latest_user_text(), "what");
    assert_eq!(flow.latest_user_images(), std::slice::from_ref(&image));
    assert_eq!(flow.reasoning_standard(), "looking");
    assert!(flow.reasoning_elapsed(now).is_none());

    let request = &backend.requests()[0];
    assert_eq!(request.text, "what");
    assert_eq!(request.images, vec![image]);
}

#[tokio::test]
async fn failed_send_rolls_back_the_reply() {
    let backend = ScriptedBackend::new();
    backend.push(Script::failure(BackendError::Api {
        status: 429,
        body: r#"{"error":{"message":"slow down"}}"#.to_string(),
    }));

    let mut flow = flow(&backend);
    flow.set_input("again");
    assert!(flow.send_chat());

    let now = Instant::now();
    pump_until(&mut flow, now, |f| !f.is_chatting()).await;
    assert_eq!(flow.error_text(), "Request failed (429): slow down");
    assert_eq!(flow.assistant_text(), "");
    assert_eq!(flow.tool_status().state, Some(ToolState::Failed));
    assert_eq!(flow.input(), "");

    // The next send clears the error.
    backend.push(Script::reply(Vec::new(), outcome("ok", "retry")));
    flow.set_input("retry");
    assert!(flow.send_chat());
    assert_eq!(flow.error_text(), "");
}

#[tokio::test]
async fn optimistic_message_shows_until_the_log_reloads() {
    let backend = ScriptedBackend::new();
    backend.seed_log(vec![
        Message::user("u0", "earlier"),
        Message::assistant("a0", "sure"),
    ]);
    let (script, release) = Script::reply(Vec::new(), outcome("done", "later"))
        .persisting(vec![
            Message::user("u1", "later"),
            Message::assistant("a1", "done"),
        ])
        .gated();
    backend.push(script);

    let mut flow = flow(&backend);
    flow.refresh_messages();
    let now = Instant::now();
    pump_until(&mut flow, now, |f| f.messages().len() == 2).await;

    flow.set_input("later");
    assert!(flow.send_chat());
    let optimistic = flow.messages().last().unwrap();
    assert!(optimistic.id().starts_with("optimistic-user-"));
    assert_eq!(optimistic.role(), Role::User);

    release.notify_one();
    pump_until(&mut flow, now, |f| {
        !f.is_chatting() && f.messages().len() == 4
    })
    .await;
    assert!(flow.messages().iter().all(|m| !m.id().starts_with("optimistic-")));
    assert_eq!(flow.visible_turns().len(), 1);
    assert!(flow.has_more_turns());
    flow.load_more_turns();
    assert_eq!(flow.visible_turns().len(), 2);
}
