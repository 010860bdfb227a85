use super::{
    Dispatcher, InputController, InputHook, KeyCallback, KeyInput, PointerCallback, PointerInput,
    RawKey, Subscription,
};
use crate::{MacroError, MouseButton, Result};
use rdev::{Button, EventType, Key};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Once, OnceLock, PoisonError,
    },
    time::Instant,
};
use tracing::{debug, error, info, trace, warn};

static GLOBAL_HOOK: OnceLock<Arc<RdevHook>> = OnceLock::new();

/// Global input hook backed by `rdev::listen`.
///
/// rdev allows one listener per process and offers no way to stop it, so a
/// single hook is shared process-wide. The listener thread starts with the
/// first subscription and keeps running; subscriptions control who receives
/// events.
pub struct RdevHook {
    pointer: Dispatcher<PointerInput>,
    keys: Dispatcher<KeyInput>,

    /// Last pointer position seen; button events carry no coordinates
    last_mouse_pos: Mutex<Option<(i32, i32)>>,

    /// Set once the missing-position warning has been logged
    position_warned: AtomicBool,

    listener: Once,
}

impl RdevHook {
    /// The process-wide hook
    pub fn global() -> Arc<RdevHook> {
        Arc::clone(GLOBAL_HOOK.get_or_init(|| Arc::new(RdevHook::new())))
    }

    fn new() -> Self {
        RdevHook {
            pointer: Dispatcher::new(),
            keys: Dispatcher::new(),
            last_mouse_pos: Mutex::new(None),
            position_warned: AtomicBool::new(false),
            listener: Once::new(),
        }
    }

    fn ensure_listening(&self) {
        self.listener.call_once(|| {
            let hook = Self::global();
            debug!("Spawning rdev listener thread");
            let spawned = std::thread::Builder::new()
                .name("rdev-listener".to_string())
                .spawn(move || {
                    if let Err(error) = rdev::listen(move |event| hook.handle(event.event_type)) {
                        error!("Failed to listen for events: {:?}", error);
                    }
                    info!("Rdev event listener thread has finished or encountered an error.");
                });
            if let Err(e) = spawned {
                error!("Failed to spawn rdev listener thread: {}", e);
            }
        });
    }

    fn handle(&self, event_type: EventType) {
        let at = Instant::now();
        match event_type {
            EventType::KeyPress(key) => self.keys.dispatch(&KeyInput::press(raw_key(key), at)),
            EventType::KeyRelease(key) => self.keys.dispatch(&KeyInput::release(raw_key(key), at)),
            EventType::ButtonPress(button) => self.pointer_transition(button, true, at),
            EventType::ButtonRelease(button) => self.pointer_transition(button, false, at),
            EventType::MouseMove { x, y } => {
                *self
                    .last_mouse_pos
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some((x as i32, y as i32));
            }
            EventType::Wheel { delta_x, delta_y } => {
                trace!("Ignoring wheel event ({}, {})", delta_x, delta_y);
            }
        }
    }

    fn pointer_transition(&self, button: Button, pressed: bool, at: Instant) {
        let position = *self
            .last_mouse_pos
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some((x, y)) = position else {
            if !self.position_warned.swap(true, Ordering::Relaxed) {
                warn!("Mouse buttons are ignored until the pointer first moves");
            }
            debug!(
                "Ignoring {:?} {} before the pointer position is known",
                button,
                if pressed { "press" } else { "release" }
            );
            return;
        };

        let button = match button {
            Button::Left => Some(MouseButton::Left),
            Button::Right => Some(MouseButton::Right),
            Button::Middle => Some(MouseButton::Middle),
            Button::Unknown(_) => None,
        };
        self.pointer
            .dispatch(&PointerInput::new(button, pressed, x, y, at));
    }
}

impl InputHook for RdevHook {
    fn subscribe_pointer(&self, callback: PointerCallback) -> Result<Subscription> {
        self.ensure_listening();
        Ok(self.pointer.subscribe("rdev pointer", callback))
    }

    fn subscribe_keys(&self, callback: KeyCallback) -> Result<Subscription> {
        self.ensure_listening();
        Ok(self.keys.subscribe("rdev keyboard", callback))
    }
}

/// Synthesizes input through `rdev::simulate`
#[derive(Debug, Default)]
pub struct RdevController;

impl RdevController {
    pub fn new() -> Self {
        Self
    }

    fn simulate(&self, event_type: EventType) -> Result<()> {
        trace!("Simulating {:?}", event_type);
        rdev::simulate(&event_type)
            .map_err(|e| MacroError::Platform(format!("failed to simulate {:?}: {:?}", event_type, e)))
    }
}

impl InputController for RdevController {
    fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        self.simulate(EventType::MouseMove {
            x: f64::from(x),
            y: f64::from(y),
        })
    }

    fn press_button(&self, button: MouseButton) -> Result<()> {
        self.simulate(EventType::ButtonPress(rdev_button(button)))
    }

    fn release_button(&self, button: MouseButton) -> Result<()> {
        self.simulate(EventType::ButtonRelease(rdev_button(button)))
    }

    fn press_key(&self, key_code: u32) -> Result<()> {
        self.simulate(EventType::KeyPress(key_from_code(key_code)))
    }

    fn release_key(&self, key_code: u32) -> Result<()> {
        self.simulate(EventType::KeyRelease(key_from_code(key_code)))
    }
}

fn rdev_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

/// Named rdev keys and their Windows virtual-key codes.
///
/// Lookups by code take the first match, so the main-row key wins over its
/// keypad twin. Recorded key codes are these Windows codes on every host; only
/// `Key::Unknown` carries a platform-native code.
const KEY_CODES: &[(Key, u32)] = &[
    (Key::KeyA, 0x41),
    (Key::KeyB, 0x42),
    (Key::KeyC, 0x43),
    (Key::KeyD, 0x44),
    (Key::KeyE, 0x45),
    (Key::KeyF, 0x46),
    (Key::KeyG, 0x47),
    (Key::KeyH, 0x48),
    (Key::KeyI, 0x49),
    (Key::KeyJ, 0x4A),
    (Key::KeyK, 0x4B),
    (Key::KeyL, 0x4C),
    (Key::KeyM, 0x4D),
    (Key::KeyN, 0x4E),
    (Key::KeyO, 0x4F),
    (Key::KeyP, 0x50),
    (Key::KeyQ, 0x51),
    (Key::KeyR, 0x52),
    (Key::KeyS, 0x53),
    (Key::KeyT, 0x54),
    (Key::KeyU, 0x55),
    (Key::KeyV, 0x56),
    (Key::KeyW, 0x57),
    (Key::KeyX, 0x58),
    (Key::KeyY, 0x59),
    (Key::KeyZ, 0x5A),
    (Key::Num0, 0x30),
    (Key::Num1, 0x31),
    (Key::Num2, 0x32),
    (Key::Num3, 0x33),
    (Key::Num4, 0x34),
    (Key::Num5, 0x35),
    (Key::Num6, 0x36),
    (Key::Num7, 0x37),
    (Key::Num8, 0x38),
    (Key::Num9, 0x39),
    (Key::Escape, 0x1B),
    (Key::Backspace, 0x08),
    (Key::Tab, 0x09),
    (Key::Return, 0x0D),
    (Key::Space, 0x20),
    (Key::CapsLock, 0x14),
    (Key::LeftArrow, 0x25),
    (Key::UpArrow, 0x26),
    (Key::RightArrow, 0x27),
    (Key::DownArrow, 0x28),
    (Key::Insert, 0x2D),
    (Key::Delete, 0x2E),
    (Key::Home, 0x24),
    (Key::End, 0x23),
    (Key::PageUp, 0x21),
    (Key::PageDown, 0x22),
    (Key::PrintScreen, 0x2C),
    (Key::ScrollLock, 0x91),
    (Key::Pause, 0x13),
    (Key::NumLock, 0x90),
    (Key::F1, 0x70),
    (Key::F2, 0x71),
    (Key::F3, 0x72),
    (Key::F4, 0x73),
    (Key::F5, 0x74),
    (Key::F6, 0x75),
    (Key::F7, 0x76),
    (Key::F8, 0x77),
    (Key::F9, 0x78),
    (Key::F10, 0x79),
    (Key::F11, 0x7A),
    (Key::F12, 0x7B),
    (Key::ShiftLeft, 0xA0),
    (Key::ShiftRight, 0xA1),
    (Key::ControlLeft, 0xA2),
    (Key::ControlRight, 0xA3),
    (Key::Alt, 0xA4),
    (Key::AltGr, 0xA5),
    (Key::MetaLeft, 0x5B),
    (Key::MetaRight, 0x5C),
    (Key::BackQuote, 0xC0),
    (Key::Minus, 0xBD),
    (Key::Equal, 0xBB),
    (Key::LeftBracket, 0xDB),
    (Key::RightBracket, 0xDD),
    (Key::SemiColon, 0xBA),
    (Key::Quote, 0xDE),
    (Key::BackSlash, 0xDC),
    (Key::IntlBackslash, 0xE2),
    (Key::Comma, 0xBC),
    (Key::Dot, 0xBE),
    (Key::Slash, 0xBF),
    (Key::Kp0, 0x60),
    (Key::Kp1, 0x61),
    (Key::Kp2, 0x62),
    (Key::Kp3, 0x63),
    (Key::Kp4, 0x64),
    (Key::Kp5, 0x65),
    (Key::Kp6, 0x66),
    (Key::Kp7, 0x67),
    (Key::Kp8, 0x68),
    (Key::Kp9, 0x69),
    (Key::KpMultiply, 0x6A),
    (Key::KpPlus, 0x6B),
    (Key::KpMinus, 0x6D),
    (Key::KpDelete, 0x6E),
    (Key::KpDivide, 0x6F),
    (Key::KpReturn, 0x0D),
];

fn raw_key(key: Key) -> RawKey {
    if let Key::Unknown(code) = key {
        return unknown_key(code, cfg!(target_os = "windows"));
    }
    match KEY_CODES.iter().find(|(named, _)| *named == key) {
        Some((_, code)) => RawKey::Symbolic {
            name: format!("{:?}", key),
            code: *code,
        },
        None => RawKey::Unrecognized(format!("{:?}", key)),
    }
}

/// rdev reports unnamed keys with the platform's own code. That is a virtual-key
/// code only on Windows; elsewhere a native code that matches a table entry
/// would replay as a different key, so it is not recorded.
fn unknown_key(code: u32, native_codes_are_virtual: bool) -> RawKey {
    if native_codes_are_virtual || !KEY_CODES.iter().any(|(_, known)| *known == code) {
        RawKey::Coded(code)
    } else {
        RawKey::Unrecognized(format!("native key code 0x{:02X}", code))
    }
}

fn key_from_code(code: u32) -> Key {
    KEY_CODES
        .iter()
        .find(|(_, known)| *known == code)
        .map(|(key, _)| *key)
        .unwrap_or(Key::Unknown(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_wait_for_first_pointer_move() {
        let hook = RdevHook::new();
        let clicks = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&clicks);
        let _subscription = hook.pointer.subscribe(
            "test pointer",
            Arc::new(move |input: &PointerInput| {
                seen.lock().unwrap().push((input.button, input.x, input.y))
            }),
        );

        hook.handle(EventType::ButtonPress(Button::Left));
        hook.handle(EventType::ButtonRelease(Button::Left));
        assert!(hook.position_warned.load(Ordering::Relaxed));
        assert!(clicks.lock().unwrap().is_empty());

        hook.handle(EventType::MouseMove { x: 12.0, y: 34.0 });
        hook.handle(EventType::ButtonPress(Button::Unknown(8)));
        hook.handle(EventType::ButtonPress(Button::Right));

        assert_eq!(
            *clicks.lock().unwrap(),
            vec![(None, 12, 34), (Some(MouseButton::Right), 12, 34)]
        );
    }

    #[test]
    fn test_named_keys_normalize_to_virtual_codes() {
        assert_eq!(raw_key(Key::KeyA).virtual_key(), Some(0x41));
        assert_eq!(raw_key(Key::Escape).virtual_key(), Some(0x1B));
        assert!(matches!(raw_key(Key::ControlLeft), RawKey::Symbolic { code: 0xA2, .. }));
    }

    #[test]
    fn test_unknown_keys_keep_their_code() {
        assert_eq!(raw_key(Key::Unknown(0xFF)), RawKey::Coded(0xFF));
        assert_eq!(key_from_code(0xFF), Key::Unknown(0xFF));
    }

    #[test]
    fn test_native_codes_never_alias_named_keys() {
        assert_eq!(unknown_key(0x41, true), RawKey::Coded(0x41));
        assert!(matches!(unknown_key(0x41, false), RawKey::Unrecognized(_)));
        assert_eq!(unknown_key(0x41, false).virtual_key(), None);
        assert_eq!(unknown_key(0xFF, false), RawKey::Coded(0xFF));
    }

    #[test]
    fn test_codes_map_back_to_named_keys() {
        for (key, code) in KEY_CODES {
            if *key == Key::KpReturn {
                continue;
            }
            assert_eq!(key_from_code(*code), *key, "code 0x{:02X}", code);
        }
        assert_eq!(key_from_code(0x0D), Key::Return);
    }
}
