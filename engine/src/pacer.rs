//! Stream pacing: turning bursty deltas into a steady on-screen reveal.
//!
//! Deltas arrive whenever the network delivers them. The pacer buffers them and
//! reveals a slice on every flush tick, sized so that whatever is pending lands
//! within a fixed drain window:
//!
//! ```text
//! ticks_left = ceil(max(1, deadline - now) / flush_interval)
//! step       = ceil(pending_len / ticks_left)
//! ```
//!
//! A burst therefore drains faster (more characters per tick) and a trickle
//! drains slowly. Every new delta pushes the deadline out by the drain target.
//!
//! The pacer does not own a timer thread. The host calls [`StreamPacer::advance`]
//! from its event loop; the pacer fires every flush tick that has come due since
//! the last call.

use std::time::{Duration, Instant};

use unicode_segmentation::UnicodeSegmentation;

use confab_types::Generation;

/// ~30 fps.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(33);
pub const DEFAULT_DRAIN_TARGET: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingSettings {
    flush_interval: Duration,
    drain_target: Duration,
}

impl PacingSettings {
    /// Zero durations fall back to the defaults.
    #[must_use]
    pub fn new(flush_interval: Duration, drain_target: Duration) -> Self {
        Self {
            flush_interval: if flush_interval.is_zero() {
                DEFAULT_FLUSH_INTERVAL
            } else {
                flush_interval
            },
            drain_target: if drain_target.is_zero() {
                DEFAULT_DRAIN_TARGET
            } else {
                drain_target
            },
        }
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    #[must_use]
    pub fn drain_target(&self) -> Duration {
        self.drain_target
    }
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self::new(DEFAULT_FLUSH_INTERVAL, DEFAULT_DRAIN_TARGET)
    }
}

/// Armed periodic flush, bound to the generation that armed it.
#[derive(Debug, Clone, Copy)]
struct FlushTimer {
    generation: Generation,
    next_fire: Instant,
}

enum FlushOutcome {
    Revealed,
    Waiting,
    Stopped,
}

#[derive(Debug)]
pub struct StreamPacer {
    settings: PacingSettings,
    live: Generation,
    pending: String,
    drain_deadline: Option<Instant>,
    timer: Option<FlushTimer>,
}

impl StreamPacer {
    #[must_use]
    pub fn new(settings: PacingSettings) -> Self {
        Self {
            settings,
            live: Generation::ZERO,
            pending: String::new(),
            drain_deadline: None,
            timer: None,
        }
    }

    #[must_use]
    pub fn settings(&self) -> PacingSettings {
        self.settings
    }

    #[must_use]
    pub fn live_generation(&self) -> Generation {
        self.live
    }

    /// Mark `generation` as live. Buffered work from other generations is
    /// discarded at the next enqueue or flush.
    pub fn set_live_generation(&mut self, generation: Generation) {
        self.live = generation;
    }

    /// Text received but not yet revealed.
    #[must_use]
    pub fn pending_text(&self) -> &str {
        &self.pending
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// When the next flush tick is due, if the timer is armed.
    #[must_use]
    pub fn next_flush_at(&self) -> Option<Instant> {
        self.timer.map(|t| t.next_fire)
    }

    /// Buffer a delta for `generation`.
    ///
    /// Stale generations and empty deltas are ignored. Returns whether the
    /// delta was accepted.
    pub fn enqueue_delta(&mut self, generation: Generation, delta: &str, now: Instant) -> bool {
        if generation != self.live || delta.is_empty() {
            return false;
        }

        self.pending.push_str(delta);
        self.drain_deadline = Some(now + self.settings.drain_target);
        if self.timer.is_none() {
            self.timer = Some(FlushTimer {
                generation,
                next_fire: now + self.settings.flush_interval,
            });
        }
        true
    }

    /// Drop everything buffered and disarm the timer.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.drain_deadline = None;
        self.timer = None;
    }

    /// Fire every flush tick due at or before `now`, appending revealed text
    /// to `visible`.
    ///
    /// `streaming` reports whether the controller still expects deltas; an
    /// empty buffer only disarms the timer once streaming has ended, so a
    /// final burst after a short lull is still paced.
    ///
    /// Returns whether any text was revealed.
    pub fn advance(&mut self, now: Instant, streaming: bool, visible: &mut String) -> bool {
        let mut revealed = false;

        while let Some(timer) = self.timer {
            if timer.next_fire > now {
                break;
            }
            match self.flush(timer, streaming, visible) {
                FlushOutcome::Revealed => {
                    revealed = true;
                    if let Some(t) = self.timer.as_mut() {
                        t.next_fire += self.settings.flush_interval;
                    }
                }
                FlushOutcome::Waiting => {
                    // Nothing to reveal; skip the ticks missed while idle.
                    if let Some(t) = self.timer.as_mut() {
                        t.next_fire = now + self.settings.flush_interval;
                    }
                    break;
                }
                FlushOutcome::Stopped => break,
            }
        }

        revealed
    }

    fn flush(&mut self, timer: FlushTimer, streaming: bool, visible: &mut String) -> FlushOutcome {
        if timer.generation != self.live {
            tracing::debug!(
                timer = %timer.generation,
                live = %self.live,
                "Discarding stale stream buffer"
            );
            self.clear();
            return FlushOutcome::Stopped;
        }

        if self.pending.is_empty() {
            if streaming {
                return FlushOutcome::Waiting;
            }
            self.clear();
            return FlushOutcome::Stopped;
        }

        let fired_at = timer.next_fire;
        let deadline = self.drain_deadline.unwrap_or(fired_at);
        let ms_left = deadline.saturating_duration_since(fired_at).as_millis().max(1);
        let interval_ms = self.settings.flush_interval.as_millis().max(1);
        let ticks_left = usize::try_from(ms_left.div_ceil(interval_ms))
            .unwrap_or(usize::MAX)
            .max(1);

        let remaining = self.pending.graphemes(true).count();
        let step = remaining.div_ceil(ticks_left).max(1);
        let split = self
            .pending
            .grapheme_indices(true)
            .nth(step)
            .map_or(self.pending.len(), |(idx, _)| idx);

        visible.push_str(&self.pending[..split]);
        self.pending.drain(..split);
        FlushOutcome::Revealed
    }
}

impl Default for StreamPacer {
    fn default() -> Self {
        Self::new(PacingSettings::default())
    }
}
