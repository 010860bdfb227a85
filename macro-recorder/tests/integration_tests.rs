use macro_recorder::platforms::{
    InputController, KeyInput, PointerInput, RawKey, SyntheticAction, VirtualController,
    VirtualHook,
};
use macro_recorder::*;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Sleep(Duration),
    Action(SyntheticAction),
}

/// Clock and controller writing to one trace
#[derive(Default, Clone)]
struct Trace {
    steps: Arc<Mutex<Vec<Step>>>,
}

impl Trace {
    fn steps(&self) -> Vec<Step> {
        self.steps.lock().unwrap().clone()
    }

    fn push(&self, action: SyntheticAction) -> Result<()> {
        self.steps.lock().unwrap().push(Step::Action(action));
        Ok(())
    }
}

impl Clock for Trace {
    fn sleep(&self, duration: Duration) {
        self.steps.lock().unwrap().push(Step::Sleep(duration));
    }
}

impl InputController for Trace {
    fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        self.push(SyntheticAction::MovePointer { x, y })
    }

    fn press_button(&self, button: MouseButton) -> Result<()> {
        self.push(SyntheticAction::PressButton(button))
    }

    fn release_button(&self, button: MouseButton) -> Result<()> {
        self.push(SyntheticAction::ReleaseButton(button))
    }

    fn press_key(&self, key_code: u32) -> Result<()> {
        self.push(SyntheticAction::PressKey(key_code))
    }

    fn release_key(&self, key_code: u32) -> Result<()> {
        self.push(SyntheticAction::ReleaseKey(key_code))
    }
}

fn quick_config() -> MacroRecorderConfig {
    MacroRecorderConfig {
        countdown_steps: 0,
        ..Default::default()
    }
}

#[test]
fn test_record_save_load_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("macro.json");
    let hook = VirtualHook::new();
    let t0 = Instant::now();

    let listener = CaptureListener::start_at(&hook, &quick_config(), t0).unwrap();
    hook.emit_pointer(PointerInput::new(
        Some(MouseButton::Left),
        true,
        100,
        200,
        t0 + Duration::from_millis(500),
    ));
    hook.emit_key(KeyInput::press(RawKey::Coded(65), t0 + Duration::from_millis(800)));
    hook.emit_key(KeyInput::press(RawKey::Coded(0x1B), t0 + Duration::from_millis(900)));
    assert_eq!(listener.stop_reason(), Some(StopReason::CancelKey));

    let recorded = listener.finish();
    recorded.save(&path).unwrap();
    let loaded = Timeline::load(&path).unwrap();
    assert_eq!(loaded, recorded);

    let trace = Trace::default();
    let report = Player::new(&trace, &trace, &quick_config()).play(&loaded);

    assert_eq!(report, PlaybackReport { executed: 2, skipped: 0 });
    assert_eq!(
        trace.steps(),
        vec![
            Step::Sleep(Duration::from_millis(500)),
            Step::Action(SyntheticAction::MovePointer { x: 100, y: 200 }),
            Step::Action(SyntheticAction::PressButton(MouseButton::Left)),
            Step::Sleep(Duration::from_millis(300)),
            Step::Action(SyntheticAction::PressKey(65)),
        ]
    );
}

#[test]
fn test_unknown_button_in_file_is_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("macro.json");
    std::fs::write(
        &path,
        r#"[
            {"device": "keyboard", "time": 0.0, "data": {"key": 65, "action": "down"}},
            {"device": "mouse", "time": 0.0, "data": {"button": "x2", "pressed": true, "x": 1, "y": 2}},
            {"device": "keyboard", "time": 0.0, "data": {"key": 65, "action": "up"}}
        ]"#,
    )
    .unwrap();

    let controller = Arc::new(VirtualController::new());
    let session = SessionController::new(
        quick_config(),
        Arc::new(VirtualHook::new()),
        controller.clone(),
    );

    let report = session.play_file(&path).unwrap();

    assert_eq!(report, PlaybackReport { executed: 2, skipped: 1 });
    assert_eq!(
        controller.actions(),
        vec![SyntheticAction::PressKey(65), SyntheticAction::ReleaseKey(65)]
    );
}

#[test]
fn test_non_array_file_never_starts_playback() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("macro.json");
    std::fs::write(
        &path,
        r#"{"device": "keyboard", "time": 0.0, "data": {"key": 65, "action": "down"}}"#,
    )
    .unwrap();

    let controller = Arc::new(VirtualController::new());
    let session = SessionController::new(
        quick_config(),
        Arc::new(VirtualHook::new()),
        controller.clone(),
    );

    assert!(matches!(session.play_file(&path), Err(MacroError::Format(_))));
    assert!(controller.actions().is_empty());
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_cancel_key_ends_session_recording() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("session.json");
    let hook = Arc::new(VirtualHook::new());
    let session = SessionController::new(
        quick_config(),
        hook.clone(),
        Arc::new(VirtualController::new()),
    );

    let mut stopped = session.start_recording().unwrap();
    let mut feed = session.event_stream().unwrap();

    hook.emit_pointer(PointerInput::new(
        Some(MouseButton::Right),
        false,
        3,
        4,
        Instant::now(),
    ));
    let shown = tokio::time::timeout(Duration::from_secs(1), feed.next())
        .await
        .expect("Timed out waiting for live event")
        .expect("Feed ended");
    assert_eq!(shown.device(), Device::Mouse);

    let feeder = {
        let hook = hook.clone();
        tokio::spawn(async move {
            hook.emit_key(KeyInput::press(RawKey::Coded(0x1B), Instant::now()));
        })
    };
    let reason = tokio::time::timeout(Duration::from_secs(1), stopped.wait_for(Option::is_some))
        .await
        .expect("Timed out waiting for stop")
        .map(|reason| *reason)
        .unwrap();
    feeder.await.unwrap();
    assert_eq!(reason, Some(StopReason::CancelKey));

    let saved = session.stop_recording(&FixedPath::new(&out)).unwrap();
    assert_eq!(saved, Some(out.clone()));
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(hook.key_subscribers(), 0);
    assert_eq!(hook.pointer_subscribers(), 0);

    let timeline = Timeline::load(&out).unwrap();
    assert_eq!(timeline.len(), 1);
    assert_eq!(
        timeline.events()[0].payload,
        EventPayload::MouseClick(MouseClick {
            button: "right".to_string(),
            pressed: false,
            x: 3,
            y: 4,
        })
    );

    // The saved file is what the playback hotkey replays
    assert_eq!(session.last_used(), Some(out));
    let report = session.play_last().unwrap().unwrap();
    assert_eq!(report.executed, 1);
}

#[test]
fn test_hotkeys_drive_session() {
    let dir = tempdir().unwrap();
    let hook = Arc::new(VirtualHook::new());
    let controller = Arc::new(VirtualController::new());
    let session = SessionController::new(quick_config(), hook.clone(), controller.clone());
    let prompt = TimestampedPath::new(dir.path());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let _watcher = HotkeyWatcher::start(hook.as_ref(), session.config(), tx).unwrap();

    let press = |code: u32| hook.emit_key(KeyInput::press(RawKey::Coded(code), Instant::now()));
    let handle = |action: HotkeyAction| match action {
        HotkeyAction::ToggleRecording => {
            session.toggle_recording(&prompt).unwrap();
        }
        HotkeyAction::PlayLast => {
            session.play_last().unwrap();
        }
    };

    press(0x78);
    handle(rx.try_recv().unwrap());
    assert_eq!(session.state(), SessionState::Recording);

    press(65);
    hook.emit_key(KeyInput::release(RawKey::Coded(65), Instant::now()));
    press(0x78);
    handle(rx.try_recv().unwrap());
    assert_eq!(session.state(), SessionState::Idle);

    let saved = session.last_used().unwrap();
    assert!(saved.starts_with(dir.path()));
    // The hotkey presses themselves are not part of the recording
    assert_eq!(Timeline::load(&saved).unwrap().len(), 2);

    press(0x79);
    handle(rx.try_recv().unwrap());
    assert_eq!(
        controller.actions(),
        vec![SyntheticAction::PressKey(65), SyntheticAction::ReleaseKey(65)]
    );
}
