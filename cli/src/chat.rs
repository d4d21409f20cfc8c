use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use confab_engine::{
    ChatFlow, ConfabConfig, Generation, MediaAttachment, SessionKey, strip_escape_sequences,
};

use crate::ChatArgs;
use crate::echo::EchoBackend;
use crate::inspect::write_turn;

const DEFAULT_API_CONFIG: &str = "local";
const DEFAULT_AGENT: &str = "echo";

/// 1x1 PNG attached by `/image`.
const DEMO_IMAGE_PNG: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

const HELP: &str = "\
commands:
  /stop      interrupt the current reply
  /image     attach a sample image to the next message
  /history   show visible turns
  /more      show one more older turn
  /usage     show estimated context usage
  /archive   archive the conversation
  /quit      exit
  /fail msg  make the echo backend fail with `msg`";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Quit,
    Stop,
    Image,
    History,
    More,
    Usage,
    Archive,
    Help,
    Send(&'a str),
    Empty,
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            "/quit" | "/exit" => Input::Quit,
            "/stop" => Input::Stop,
            "/image" => Input::Image,
            "/history" => Input::History,
            "/more" => Input::More,
            "/usage" => Input::Usage,
            "/archive" => Input::Archive,
            "/help" => Input::Help,
            text => Input::Send(text),
        }
    }
}

pub(crate) async fn run(args: &ChatArgs, config: &ConfabConfig) -> Result<()> {
    let session = resolve_session(args, config)?;
    let settings = config.flow_settings();
    let backend = EchoBackend::new(Duration::from_millis(args.chunk_delay_ms));
    let mut flow = ChatFlow::new(Arc::new(backend), settings).with_session(session.clone());
    flow.refresh_messages();

    tracing::info!(%session, "Starting chat");
    println!("confab chat ({session}). Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut frames = tokio::time::interval(settings.pacing.flush_interval());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut screen = Screen::default();
    let mut out = io::stdout();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_input(&mut flow, &mut screen, &line, &mut out)? {
                    break;
                }
            }
            _ = frames.tick() => {
                let now = Instant::now();
                flow.tick(now);
                screen.render(&flow, now, &mut out)?;
            }
        }
    }

    if flow.is_chatting() {
        flow.stop_chat();
    }
    Ok(())
}

/// Returns `false` when the user asked to quit.
fn handle_input(
    flow: &mut ChatFlow,
    screen: &mut Screen,
    line: &str,
    out: &mut impl Write,
) -> io::Result<bool> {
    match Input::parse(line) {
        Input::Quit => return Ok(false),
        Input::Empty => {}
        Input::Help => writeln!(out, "{HELP}")?,
        Input::Stop => flow.stop_chat(),
        Input::Image => {
            flow.attach_image(MediaAttachment::new("image/png", DEMO_IMAGE_PNG));
            writeln!(out, "(image attached: {})", flow.attachments().len())?;
        }
        Input::History => {
            let mut text = String::new();
            for turn in flow.visible_turns() {
                write_turn(&mut text, &turn);
            }
            write!(out, "{text}")?;
            if flow.has_more_turns() {
                writeln!(out, "(older turns available: /more)")?;
            }
        }
        Input::More => {
            flow.load_more_turns();
            writeln!(out, "(showing {} turn(s))", flow.visible_turn_count())?;
        }
        Input::Usage => {
            let usage = flow.context_usage();
            writeln!(
                out,
                "~{} / {} tokens ({}%)",
                usage.used_tokens(),
                usage.window_tokens(),
                usage.percent()
            )?;
        }
        Input::Archive => {
            if !flow.force_archive() {
                writeln!(out, "(busy, try again when the reply finishes)")?;
            }
        }
        Input::Send(text) => {
            flow.set_input(text);
            if flow.send_chat() {
                screen.begin_cycle();
            } else {
                writeln!(out, "(busy, message kept for later)")?;
            }
        }
    }
    out.flush()?;
    Ok(true)
}

fn resolve_session(args: &ChatArgs, config: &ConfabConfig) -> Result<SessionKey> {
    let configured = config.session();
    let api_config = args
        .api_config
        .clone()
        .or_else(|| configured.as_ref().map(|s| s.api_config_id().to_string()))
        .unwrap_or_else(|| DEFAULT_API_CONFIG.to_string());
    let agent = args
        .agent
        .clone()
        .or_else(|| configured.as_ref().map(|s| s.agent_id().to_string()))
        .unwrap_or_else(|| DEFAULT_AGENT.to_string());
    SessionKey::new(api_config, agent).context("invalid session")
}

/// Incremental printer for the live reply.
///
/// Paced text is appended as it is revealed. When the displayed text stops
/// being an extension of what was printed (final alignment, interruption,
/// error rollback) the reply is printed again on a fresh line.
#[derive(Default)]
struct Screen {
    generation: Generation,
    shown: String,
    chatting: bool,
    thinking_announced: bool,
    status: String,
    line_open: bool,
}

impl Screen {
    fn begin_cycle(&mut self) {
        self.chatting = true;
    }

    fn render(&mut self, flow: &ChatFlow, now: Instant, out: &mut impl Write) -> io::Result<()> {
        if flow.generation() != self.generation {
            self.generation = flow.generation();
            self.shown.clear();
            self.thinking_announced = false;
            self.end_line(out)?;
        }

        if flow.is_chatting() && !self.thinking_announced && flow.reasoning_elapsed(now).is_some()
        {
            self.thinking_announced = true;
            writeln!(out, "(thinking…)")?;
        }

        let current = flow.assistant_text();
        match current.strip_prefix(self.shown.as_str()) {
            Some("") => {}
            Some(revealed) => {
                write!(out, "{}", strip_escape_sequences(revealed))?;
                self.line_open = true;
            }
            None => {
                self.end_line(out)?;
                write!(out, "{}", strip_escape_sequences(current))?;
                self.line_open = !current.is_empty();
            }
        }
        self.shown.clear();
        self.shown.push_str(current);

        if self.chatting && !flow.is_chatting() {
            self.end_line(out)?;
            if !flow.error_text().is_empty() {
                writeln!(out, "error: {}", strip_escape_sequences(flow.error_text()))?;
            }
            let tool = flow.tool_status();
            if let Some(state) = tool.state {
                writeln!(out, "[{}] {}", state.as_str(), strip_escape_sequences(&tool.text))?;
            }
        }
        self.chatting = flow.is_chatting();

        if flow.status_text() != self.status {
            self.status = flow.status_text().to_string();
            if !self.status.is_empty() {
                self.end_line(out)?;
                writeln!(out, "* {}", strip_escape_sequences(&self.status))?;
            }
        }

        out.flush()
    }

    fn end_line(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.line_open {
            writeln!(out)?;
            self.line_open = false;
        }
        Ok(())
    }
}
