use crate::{
    platforms::{InputHook, KeyInput, PointerInput, Subscription},
    EventPayload, InputEvent, KeyAction, KeyEvent, MacroError, MacroRecorderConfig, MouseClick,
    Result, Timeline,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Instant,
};
use tokio::sync::{broadcast, watch};
use tokio_stream::Stream;
use tracing::{debug, info, warn};

/// Why a capture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured cancel key was pressed
    CancelKey,
    /// [`CaptureListener::stop`] was called or the listener was dropped
    Requested,
}

struct CaptureState {
    timeline: Timeline,
    last_timestamp: Instant,
}

struct CaptureShared {
    state: Mutex<CaptureState>,
    active: AtomicBool,
    subscriptions: Mutex<Vec<Subscription>>,
    cancel_key: u32,
    ignored_keys: Vec<u32>,
    event_tx: broadcast::Sender<InputEvent>,
    stop_tx: watch::Sender<Option<StopReason>>,
}

impl CaptureShared {
    fn state(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_pointer(&self, input: &PointerInput) {
        let Some(button) = input.button else {
            warn!(
                "{}",
                MacroError::UnrecognizedInput(format!(
                    "pointer button at ({}, {}); event ignored",
                    input.x, input.y
                ))
            );
            return;
        };

        self.record(
            input.at,
            EventPayload::MouseClick(MouseClick {
                button: button.name().to_string(),
                pressed: input.pressed,
                x: input.x,
                y: input.y,
            }),
        );
    }

    fn on_key(&self, input: &KeyInput) {
        let Some(key_code) = input.key.virtual_key() else {
            warn!(
                "{}",
                MacroError::UnrecognizedInput(format!("key {}; event ignored", input.key))
            );
            return;
        };

        if input.pressed && key_code == self.cancel_key {
            info!("Cancel key {} pressed, stopping capture", input.key);
            self.shutdown(StopReason::CancelKey);
            return;
        }

        if self.ignored_keys.contains(&key_code) {
            debug!("Skipping hotkey {} in recording", input.key);
            return;
        }

        let action = if input.pressed {
            KeyAction::Down
        } else {
            KeyAction::Up
        };
        self.record(input.at, EventPayload::Key(KeyEvent { key_code, action }));
    }

    fn record(&self, at: Instant, payload: EventPayload) {
        let event = {
            let mut state = self.state();
            if !self.active.load(Ordering::SeqCst) {
                debug!("Capture stopped, dropping late event");
                return;
            }

            let delta = at.saturating_duration_since(state.last_timestamp);
            state.last_timestamp = state.last_timestamp.max(at);

            let event = InputEvent {
                delta_seconds: delta.as_secs_f64(),
                payload,
            };
            state.timeline.push(event.clone());
            event
        };

        debug!("Recorded {}", event);
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    /// Single teardown path for every way a capture can end
    fn shutdown(&self, reason: StopReason) -> bool {
        {
            let _state = self.state();
            if !self.active.swap(false, Ordering::SeqCst) {
                debug!("Capture already stopped");
                return false;
            }
        }

        let subscriptions = std::mem::take(
            &mut *self
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for mut subscription in subscriptions {
            subscription.unsubscribe();
        }

        self.stop_tx.send_replace(Some(reason));
        info!("Capture stopped ({:?})", reason);
        true
    }
}

/// Converts global input callbacks into a [`Timeline`].
///
/// The listener holds one pointer and one key subscription while active. Both
/// are released exactly once, whether the capture ends through [`stop`],
/// through the cancel key or by dropping the listener.
///
/// [`stop`]: CaptureListener::stop
pub struct CaptureListener {
    shared: Arc<CaptureShared>,
}

impl CaptureListener {
    /// Start capturing now
    pub fn start(hook: &dyn InputHook, config: &MacroRecorderConfig) -> Result<Self> {
        Self::start_at(hook, config, Instant::now())
    }

    /// Start capturing with `started` as the reference point for the first delta
    pub fn start_at(
        hook: &dyn InputHook,
        config: &MacroRecorderConfig,
        started: Instant,
    ) -> Result<Self> {
        info!("Starting capture (cancel key 0x{:02X})", config.cancel_key);

        let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (stop_tx, _) = watch::channel(None);
        let shared = Arc::new(CaptureShared {
            state: Mutex::new(CaptureState {
                timeline: Timeline::new(),
                last_timestamp: started,
            }),
            active: AtomicBool::new(true),
            subscriptions: Mutex::new(Vec::with_capacity(2)),
            cancel_key: config.cancel_key,
            ignored_keys: config.hotkeys(),
            event_tx,
            stop_tx,
        });

        let weak: Weak<CaptureShared> = Arc::downgrade(&shared);
        let pointer = hook.subscribe_pointer(Arc::new(move |input: &PointerInput| {
            if let Some(shared) = weak.upgrade() {
                shared.on_pointer(input);
            }
        }))?;

        let weak: Weak<CaptureShared> = Arc::downgrade(&shared);
        let keys = hook.subscribe_keys(Arc::new(move |input: &KeyInput| {
            if let Some(shared) = weak.upgrade() {
                shared.on_key(input);
            }
        }))?;

        {
            let mut subscriptions = shared
                .subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscriptions.push(pointer);
            subscriptions.push(keys);

            // A cancel key delivered while subscribing already ran teardown
            if !shared.active.load(Ordering::SeqCst) {
                for mut subscription in subscriptions.drain(..) {
                    subscription.unsubscribe();
                }
            }
        }

        Ok(Self { shared })
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Stop capturing. Returns `false` if the capture had already stopped.
    pub fn stop(&self) -> bool {
        self.shared.shutdown(StopReason::Requested)
    }

    /// Why the capture ended, if it has
    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.shared.stop_tx.borrow()
    }

    /// Watch for the end of the capture
    pub fn stopped(&self) -> watch::Receiver<Option<StopReason>> {
        self.shared.stop_tx.subscribe()
    }

    pub fn event_count(&self) -> usize {
        self.shared.state().timeline.len()
    }

    /// Get a stream of events as they are recorded
    pub fn event_stream(&self) -> impl Stream<Item = InputEvent> {
        let mut rx = self.shared.event_tx.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event stream lagged, {} events not shown", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Stop capturing (if still active) and hand over the recorded timeline
    pub fn finish(self) -> Timeline {
        self.shared.shutdown(StopReason::Requested);
        std::mem::take(&mut self.shared.state().timeline)
    }
}

impl Drop for CaptureListener {
    fn drop(&mut self) {
        self.shared.shutdown(StopReason::Requested);
    }
}
