//! Timeline playback.
//!
//! The player sleeps for each event's recorded delta *before* performing it,
//! so the gaps between synthetic actions match the gaps between the original
//! ones. Failures affect only the event they happen on.

use crate::{
    platforms::InputController, EventPayload, InputEvent, KeyAction, MacroError,
    MacroRecorderConfig, Result, Timeline,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of the pauses between events
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Outcome of one playback pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Events whose synthetic action was performed
    pub executed: usize,
    /// Events that were logged and skipped
    pub skipped: usize,
}

/// Replays a timeline through an input controller
pub struct Player<'a> {
    controller: &'a dyn InputController,
    clock: &'a dyn Clock,
    countdown_steps: u32,
    countdown_step: Duration,
}

impl<'a> Player<'a> {
    pub fn new(
        controller: &'a dyn InputController,
        clock: &'a dyn Clock,
        config: &MacroRecorderConfig,
    ) -> Self {
        Self {
            controller,
            clock,
            countdown_steps: config.countdown_steps,
            countdown_step: config.countdown_step(),
        }
    }

    /// Play the timeline once, blocking until the last event has been performed
    pub fn play(&self, timeline: &Timeline) -> PlaybackReport {
        info!(
            "Playing {} events ({:.3}s)",
            timeline.len(),
            timeline.total_duration().as_secs_f64()
        );
        self.countdown();

        let mut report = PlaybackReport::default();
        for (index, event) in timeline.iter().enumerate() {
            self.clock.sleep(event.delay());

            match self.apply(event) {
                Ok(()) => {
                    debug!("Replayed event {}: {}", index, event);
                    report.executed += 1;
                }
                Err(e) => {
                    warn!("Skipping event {} ({}): {}", index, event, e);
                    report.skipped += 1;
                }
            }
        }

        info!(
            "Playback finished: {} executed, {} skipped",
            report.executed, report.skipped
        );
        report
    }

    fn countdown(&self) {
        if self.countdown_steps == 0 {
            return;
        }
        info!("Running commands in {}...", self.countdown_steps);
        for remaining in (1..=self.countdown_steps).rev() {
            info!("{}", remaining);
            self.clock.sleep(self.countdown_step);
        }
    }

    fn apply(&self, event: &InputEvent) -> Result<()> {
        match &event.payload {
            EventPayload::MouseClick(click) => {
                let button = click.mouse_button().ok_or_else(|| {
                    MacroError::UnrecognizedInput(format!("mouse button {:?}", click.button))
                })?;
                self.controller.move_pointer(click.x, click.y)?;
                if click.pressed {
                    self.controller.press_button(button)
                } else {
                    self.controller.release_button(button)
                }
            }
            EventPayload::Key(key) => match &key.action {
                KeyAction::Down => self.controller.press_key(key.key_code),
                KeyAction::Up => self.controller.release_key(key.key_code),
                KeyAction::Unknown(raw) => Err(MacroError::UnrecognizedInput(format!(
                    "key action {:?} for key 0x{:02X}",
                    raw, key.key_code
                ))),
            },
        }
    }
}
