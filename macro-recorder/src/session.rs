use crate::{
    platforms::{InputController, InputHook},
    player::{Clock, PlaybackReport, Player, SystemClock},
    prompt::{PathPrompt, PromptPurpose},
    recorder::{CaptureListener, StopReason},
    InputEvent, MacroError, MacroRecorderConfig, Result, Timeline,
};
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch;
use tokio_stream::Stream;
use tracing::{info, warn};

/// What the session is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Playing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Recording => f.write_str("recording"),
            SessionState::Playing => f.write_str("playing"),
        }
    }
}

/// Result of the record hotkey
#[derive(Debug)]
pub enum RecordingToggle {
    /// A recording started; the receiver reports when capture ends
    Started(watch::Receiver<Option<StopReason>>),
    /// The recording stopped and was saved to the path, unless saving was cancelled
    Stopped(Option<PathBuf>),
}

enum Active {
    Idle,
    Recording(CaptureListener),
    /// Capture is torn down and the timeline is being saved
    Finishing,
    Playing,
}

impl Active {
    fn state(&self) -> SessionState {
        match self {
            Active::Idle => SessionState::Idle,
            Active::Recording(_) | Active::Finishing => SessionState::Recording,
            Active::Playing => SessionState::Playing,
        }
    }
}

struct Inner {
    active: Active,
    last_used: Option<PathBuf>,
}

/// Returns the session to idle when dropped
struct IdleOnDrop<'a> {
    inner: &'a Mutex<Inner>,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active = Active::Idle;
    }
}

/// Owns the Idle / Recording / Playing state machine.
///
/// Recording and playback can only start from idle; any attempt to start one
/// while the other (or another of the same kind) is active fails with
/// [`MacroError::SessionBusy`]. Concurrent requests are rejected, not queued.
pub struct SessionController {
    config: MacroRecorderConfig,
    hook: Arc<dyn InputHook>,
    controller: Arc<dyn InputController>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl SessionController {
    pub fn new(
        config: MacroRecorderConfig,
        hook: Arc<dyn InputHook>,
        controller: Arc<dyn InputController>,
    ) -> Self {
        Self {
            config,
            hook,
            controller,
            clock: Arc::new(SystemClock),
            inner: Mutex::new(Inner {
                active: Active::Idle,
                last_used: None,
            }),
        }
    }

    /// Replace the clock used for playback pauses
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &MacroRecorderConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.inner().active.state()
    }

    /// Whether a recording may start now
    pub fn can_record(&self) -> bool {
        self.state() == SessionState::Idle
    }

    /// Whether a playback may start now
    pub fn can_play(&self) -> bool {
        self.state() == SessionState::Idle
    }

    /// The last timeline saved or played
    pub fn last_used(&self) -> Option<PathBuf> {
        self.inner().last_used.clone()
    }

    /// Remember a timeline for [`play_last`](Self::play_last)
    pub fn set_last_used(&self, path: impl Into<PathBuf>) {
        self.inner().last_used = Some(path.into());
    }

    /// Idle → Recording
    pub fn start_recording(&self) -> Result<watch::Receiver<Option<StopReason>>> {
        let mut inner = self.inner();
        if !matches!(inner.active, Active::Idle) {
            return Err(MacroError::SessionBusy {
                current: inner.active.state(),
                requested: "recording",
            });
        }

        let listener = CaptureListener::start(self.hook.as_ref(), &self.config)?;
        let stopped = listener.stopped();
        inner.active = Active::Recording(listener);
        info!("Session recording");
        Ok(stopped)
    }

    /// Live feed of the events being recorded
    pub fn event_stream(&self) -> Result<impl Stream<Item = InputEvent>> {
        match &self.inner().active {
            Active::Recording(listener) => Ok(listener.event_stream()),
            _ => Err(MacroError::NotRecording),
        }
    }

    /// Recording → Idle.
    ///
    /// Used both for an explicit stop and after the cancel key ended the
    /// capture. The timeline is saved to the path `prompt` selects; `Ok(None)`
    /// means the save was cancelled and the recording discarded.
    pub fn stop_recording(&self, prompt: &dyn PathPrompt) -> Result<Option<PathBuf>> {
        let listener = {
            let mut inner = self.inner();
            match std::mem::replace(&mut inner.active, Active::Finishing) {
                Active::Recording(listener) => listener,
                other => {
                    inner.active = other;
                    return Err(MacroError::NotRecording);
                }
            }
        };
        let _idle = IdleOnDrop { inner: &self.inner };

        let timeline = listener.finish();
        info!("Recording finished with {} events", timeline.len());

        self.save(&timeline, prompt)
    }

    fn save(&self, timeline: &Timeline, prompt: &dyn PathPrompt) -> Result<Option<PathBuf>> {
        let Some(path) = prompt.select(PromptPurpose::Save)? else {
            info!("Save cancelled, discarding {} events", timeline.len());
            return Ok(None);
        };

        timeline.save(&path)?;
        info!("Recording saved to {:?}", path);
        self.set_last_used(&path);
        Ok(Some(path))
    }

    /// Start recording when idle, stop and save when recording
    pub fn toggle_recording(&self, prompt: &dyn PathPrompt) -> Result<RecordingToggle> {
        match self.state() {
            SessionState::Recording => self.stop_recording(prompt).map(RecordingToggle::Stopped),
            _ => self.start_recording().map(RecordingToggle::Started),
        }
    }

    /// Idle → Playing → Idle for the timeline at `path`.
    ///
    /// Blocks until playback completes. A file that cannot be read or parsed
    /// returns the session to idle without performing any input.
    pub fn play_file(&self, path: &Path) -> Result<PlaybackReport> {
        let _idle = self.claim_playing()?;

        let timeline = Timeline::load(path)?;
        let report = Player::new(self.controller.as_ref(), self.clock.as_ref(), &self.config)
            .play(&timeline);

        self.set_last_used(path);
        Ok(report)
    }

    /// Play a timeline chosen through `prompt`; `Ok(None)` when selection is cancelled
    pub fn play_with_prompt(&self, prompt: &dyn PathPrompt) -> Result<Option<PlaybackReport>> {
        if !self.can_play() {
            return Err(MacroError::SessionBusy {
                current: self.state(),
                requested: "playback",
            });
        }

        match prompt.select(PromptPurpose::Open)? {
            Some(path) => self.play_file(&path).map(Some),
            None => {
                info!("Playback cancelled, no file selected");
                Ok(None)
            }
        }
    }

    /// Play the last used timeline; `Ok(None)` when there is none yet
    pub fn play_last(&self) -> Result<Option<PlaybackReport>> {
        match self.last_used() {
            Some(path) => self.play_file(&path).map(Some),
            None => {
                warn!("No timeline recorded or played yet, nothing to replay");
                Ok(None)
            }
        }
    }

    fn claim_playing(&self) -> Result<IdleOnDrop<'_>> {
        let mut inner = self.inner();
        if !matches!(inner.active, Active::Idle) {
            return Err(MacroError::SessionBusy {
                current: inner.active.state(),
                requested: "playback",
            });
        }
        inner.active = Active::Playing;
        info!("Session playing");
        Ok(IdleOnDrop { inner: &self.inner })
    }
}
