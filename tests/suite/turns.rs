//! Turn reconstruction over stored message logs

use confab_context::{TurnWindow, build_turns};
use confab_types::{Message, Role};
use serde_json::json;

fn stored_log() -> Vec<Message> {
    serde_json::from_value(json!([
        { "id": "sys", "role": "system", "parts": [{ "type": "text", "text": "be brief" }] },
        { "id": "orphan", "role": "assistant", "parts": [{ "type": "text", "text": "hello?" }] },
        {
            "id": "u1",
            "role": "user",
            "parts": [
                { "type": "text", "text": "what is this" },
                { "type": "image", "mime": "image/png", "bytesBase64": "AAAA" },
                { "type": "image", "mime": "image/png" },
                { "type": "file", "name": "notes.pdf" }
            ],
            "createdAt": "2026-01-01T00:00:00Z"
        },
        {
            "id": "a1",
            "role": "assistant",
            "parts": [{ "type": "text", "text": "A cat.\n[标准思考]\nwhiskers visible" }]
        },
        {
            "id": "u2",
            "role": "user",
            "parts": [{ "type": "text", "text": "and now<memory_board>likes cats</memory_board>" }]
        },
        {
            "id": "a2",
            "role": "assistant",
            "parts": [{ "type": "text", "text": "Still a cat." }],
            "providerMeta": { "reasoningStandard": "same photo", "reasoningInline": "quick look" }
        },
        { "id": "u3", "role": "user", "parts": [{ "type": "audio", "bytes_base64": "BBBB" }] }
    ]))
    .expect("valid stored log")
}

#[test]
fn stored_log_folds_into_turns() {
    let turns = build_turns(&stored_log());
    let ids: Vec<_> = turns.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["u1", "u2", "u3"]);

    let first = &turns[0];
    assert_eq!(first.user_text, "what is this");
    assert_eq!(first.user_images.len(), 1);
    assert_eq!(first.user_images[0].mime, "image/png");
    assert_eq!(first.assistant_text, "A cat.");
    assert_eq!(first.assistant_reasoning_standard, "whiskers visible");
    assert_eq!(first.assistant_reasoning_inline, "");
}

#[test]
fn provider_meta_fills_reasoning_and_hidden_blocks_are_stripped() {
    let turns = build_turns(&stored_log());
    let second = &turns[1];
    assert_eq!(second.user_text, "and now");
    assert_eq!(second.assistant_text, "Still a cat.");
    assert_eq!(second.assistant_reasoning_standard, "same photo");
    assert_eq!(second.assistant_reasoning_inline, "quick look");
}

#[test]
fn media_only_turn_without_answer_is_kept() {
    let turns = build_turns(&stored_log());
    let last = turns.last().unwrap();
    assert_eq!(last.user_text, "");
    assert_eq!(last.user_audios.len(), 1);
    assert_eq!(last.user_audios[0].mime, "audio/webm");
    assert_eq!(last.assistant_text, "");
}

#[test]
fn window_pages_back_one_turn_at_a_time() {
    let turns = build_turns(&stored_log());
    let mut window = TurnWindow::default();

    assert_eq!(window.visible(&turns).len(), 1);
    assert_eq!(window.visible(&turns)[0].id, "u3");
    assert!(window.has_more(turns.len()));

    window.load_more();
    window.load_more();
    assert_eq!(window.visible(&turns).len(), 3);
    assert!(!window.has_more(turns.len()));

    window.load_more();
    assert_eq!(window.visible(&turns).len(), 3);

    window.reset();
    assert_eq!(window.count(), 1);
}

#[test]
fn roles_survive_serialization() {
    let log = stored_log();
    let roles: Vec<_> = log.iter().map(Message::role).collect();
    assert_eq!(roles[0], Role::System);
    assert_eq!(roles[2], Role::User);

    let value = serde_json::to_value(&log[3]).unwrap();
    assert_eq!(value["role"], "assistant");
}
