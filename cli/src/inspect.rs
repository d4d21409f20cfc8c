use std::fmt::Write as _;
use std::fs;

use anyhow::{Context, Result};

use confab_context::{ContextUsage, TurnWindow, build_turns};
use confab_engine::{ChatTurn, ConfabConfig, Message, strip_escape_sequences};

use crate::TurnsArgs;

pub(crate) fn run(args: &TurnsArgs, config: &ConfabConfig) -> Result<()> {
    let raw = fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let messages: Vec<Message> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON message array", args.path.display()))?;

    let window = args.context_window.or_else(|| config.context_window_tokens());
    print!("{}", report(&messages, window, args.all));
    Ok(())
}

fn report(messages: &[Message], window_tokens: Option<u32>, all: bool) -> String {
    let turns = build_turns(messages);
    let shown = if all {
        &turns[..]
    } else {
        TurnWindow::default().visible(&turns)
    };

    let mut out = String::new();
    for turn in shown {
        write_turn(&mut out, turn);
    }

    let usage = ContextUsage::estimate(messages, window_tokens);
    let _ = writeln!(
        out,
        "{} message(s), {} turn(s) shown of {}; ~{} / {} tokens ({}%)",
        messages.len(),
        shown.len(),
        turns.len(),
        usage.used_tokens(),
        usage.window_tokens(),
        usage.percent()
    );
    out
}

pub(crate) fn write_turn(out: &mut String, turn: &ChatTurn) {
    let _ = writeln!(out, "── {} ──", turn.id);
    if !turn.user_text.is_empty() {
        let _ = writeln!(out, "user: {}", strip_escape_sequences(&turn.user_text));
    }
    if !turn.user_images.is_empty() || !turn.user_audios.is_empty() {
        let _ = writeln!(
            out,
            "      [{} image(s), {} audio clip(s)]",
            turn.user_images.len(),
            turn.user_audios.len()
        );
    }
    if !turn.assistant_reasoning_standard.is_empty() {
        let _ = writeln!(
            out,
            "thinking: {}",
            strip_escape_sequences(&turn.assistant_reasoning_standard)
        );
    }
    if !turn.assistant_reasoning_inline.is_empty() {
        let _ = writeln!(
            out,
            "thinking (inline): {}",
            strip_escape_sequences(&turn.assistant_reasoning_inline)
        );
    }
    if !turn.assistant_text.is_empty() {
        let _ = writeln!(
            out,
            "assistant: {}",
            strip_escape_sequences(&turn.assistant_text)
        );
    }
}
