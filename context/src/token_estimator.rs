//! Heuristic token estimation for the context usage meter.
//!
//! This is **not** tokenization. It is a cheap, language-aware approximation
//! good enough to drive a usage bar:
//!
//! - Whitespace is free
//! - CJK ideographs (U+3400–U+9FFF, U+F900–U+FAFF) weigh 0.6 tokens each
//! - Every other visible character weighs 0.3 tokens
//! - Each message carries a fixed framing overhead
//! - Image and audio parts cost a flat amount regardless of size
//!
//! Sums are kept in integer tenths of a token so that the final ceiling is
//! exact and does not depend on float accumulation order.

use confab_types::{Message, MessagePart};

/// Per-message framing overhead (role markers, delimiters).
pub const MESSAGE_OVERHEAD: u32 = 12;
/// Flat cost of one image part.
pub const IMAGE_PART_COST: u32 = 280;
/// Flat cost of one audio part.
pub const AUDIO_PART_COST: u32 = 320;

/// Context window assumed when the active api config does not state one.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;
pub const MIN_CONTEXT_WINDOW: u32 = 16_000;
pub const MAX_CONTEXT_WINDOW: u32 = 200_000;

const CJK_WEIGHT_TENTHS: u64 = 6;
const OTHER_WEIGHT_TENTHS: u64 = 3;

/// Stateless estimator over message parts.
///
/// # Example
///
/// ```
/// use confab_context::TokenEstimator;
/// use confab_types::Message;
///
/// let estimator = TokenEstimator::new();
/// let tokens = estimator.estimate_messages(&[Message::user("u1", "hello")]);
/// // 12 framing + 5 chars * 0.3 = 13.5, rounded up
/// assert_eq!(tokens, 14);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Estimated tokens for a bare string, rounded up.
    #[must_use]
    pub fn estimate_str(&self, text: &str) -> u32 {
        tenths_to_tokens(text_tenths(text))
    }

    /// Estimated tokens for a single message including framing overhead.
    #[must_use]
    pub fn estimate_message(&self, msg: &Message) -> u32 {
        tenths_to_tokens(message_tenths(msg))
    }

    /// Total for a conversation. Rounding happens once, on the total.
    #[must_use]
    pub fn estimate_messages(&self, messages: &[Message]) -> u32 {
        tenths_to_tokens(messages.iter().map(message_tenths).sum())
    }
}

fn is_cjk(ch: char) -> bool {
    matches!(ch, '\u{3400}'..='\u{9fff}' | '\u{f900}'..='\u{faff}')
}

fn text_tenths(text: &str) -> u64 {
    text.chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| {
            if is_cjk(ch) {
                CJK_WEIGHT_TENTHS
            } else {
                OTHER_WEIGHT_TENTHS
            }
        })
        .sum()
}

fn message_tenths(msg: &Message) -> u64 {
    let parts: u64 = msg
        .parts()
        .iter()
        .map(|part| match part {
            MessagePart::Text { text } => text_tenths(text),
            MessagePart::Image { .. } => u64::from(IMAGE_PART_COST) * 10,
            MessagePart::Audio { .. } => u64::from(AUDIO_PART_COST) * 10,
            MessagePart::Unsupported => 0,
        })
        .sum();
    u64::from(MESSAGE_OVERHEAD) * 10 + parts
}

fn tenths_to_tokens(tenths: u64) -> u32 {
    u32::try_from(tenths.div_ceil(10)).unwrap_or(u32::MAX)
}

/// Snapshot of how full the context window is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextUsage {
    used_tokens: u32,
    window_tokens: u32,
}

impl ContextUsage {
    /// Usage of `messages` against a configured window.
    ///
    /// `window_tokens` of `None` falls back to [`DEFAULT_CONTEXT_WINDOW`]; any
    /// value is clamped to `[MIN_CONTEXT_WINDOW, MAX_CONTEXT_WINDOW]`.
    #[must_use]
    pub fn estimate(messages: &[Message], window_tokens: Option<u32>) -> Self {
        let window = window_tokens
            .unwrap_or(DEFAULT_CONTEXT_WINDOW)
            .clamp(MIN_CONTEXT_WINDOW, MAX_CONTEXT_WINDOW);
        Self {
            used_tokens: TokenEstimator::new().estimate_messages(messages),
            window_tokens: window,
        }
    }

    /// Usage when no api config is active: always zero.
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            used_tokens: 0,
            window_tokens: DEFAULT_CONTEXT_WINDOW,
        }
    }

    #[must_use]
    pub fn used_tokens(&self) -> u32 {
        self.used_tokens
    }

    #[must_use]
    pub fn window_tokens(&self) -> u32 {
        self.window_tokens
    }

    /// Unclamped ratio; may exceed 1.0 when the conversation overflows.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        f64::from(self.used_tokens) / f64::from(self.window_tokens.max(1))
    }

    /// Ratio as a whole percentage clamped to `0..=100`.
    #[must_use]
    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).round().clamp(0.0, 100.0) as u8
    }
}
