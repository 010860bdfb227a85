use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// The device that produced an event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Mouse,
    Keyboard,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Mouse => f.write_str("mouse"),
            Device::Keyboard => f.write_str("keyboard"),
        }
    }
}

/// Mouse buttons the recorder can capture and replay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// The symbolic name stored in timeline files
    pub fn name(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }

    /// Resolve a stored symbolic name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(MouseButton::Left),
            "right" => Some(MouseButton::Right),
            "middle" => Some(MouseButton::Middle),
            _ => None,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Direction of a key transition.
///
/// Timeline files are loaded as written, so an action other than `down` or `up`
/// survives loading as [`KeyAction::Unknown`] and is skipped at playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KeyAction {
    Down,
    Up,
    Unknown(String),
}

impl From<String> for KeyAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "down" => KeyAction::Down,
            "up" => KeyAction::Up,
            _ => KeyAction::Unknown(value),
        }
    }
}

impl From<KeyAction> for String {
    fn from(action: KeyAction) -> Self {
        match action {
            KeyAction::Down => "down".to_string(),
            KeyAction::Up => "up".to_string(),
            KeyAction::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Down => f.write_str("down"),
            KeyAction::Up => f.write_str("up"),
            KeyAction::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// A mouse button press or release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MouseClick {
    /// Symbolic button name (`left`, `right`, `middle`)
    pub button: String,

    /// `true` for button-down, `false` for button-up
    pub pressed: bool,

    /// Absolute screen coordinates
    pub x: i32,
    pub y: i32,
}

impl MouseClick {
    /// The button this click refers to, if its name is one we know
    pub fn mouse_button(&self) -> Option<MouseButton> {
        MouseButton::from_name(&self.button)
    }
}

/// A key press or release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyEvent {
    /// Platform virtual-key code
    #[serde(rename = "key")]
    pub key_code: u32,

    pub action: KeyAction,
}

/// Device-specific part of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    MouseClick(MouseClick),
    Key(KeyEvent),
}

/// One captured input event with its delay relative to the previous event
#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    /// Seconds elapsed since the previous event (or since recording start)
    pub delta_seconds: f64,

    pub payload: EventPayload,
}

impl InputEvent {
    pub fn mouse(delta_seconds: f64, button: MouseButton, pressed: bool, x: i32, y: i32) -> Self {
        Self {
            delta_seconds,
            payload: EventPayload::MouseClick(MouseClick {
                button: button.name().to_string(),
                pressed,
                x,
                y,
            }),
        }
    }

    pub fn key(delta_seconds: f64, key_code: u32, action: KeyAction) -> Self {
        Self {
            delta_seconds,
            payload: EventPayload::Key(KeyEvent { key_code, action }),
        }
    }

    pub fn device(&self) -> Device {
        match self.payload {
            EventPayload::MouseClick(_) => Device::Mouse,
            EventPayload::Key(_) => Device::Keyboard,
        }
    }

    /// The delta as a duration; invalid deltas give zero, oversized ones saturate
    pub fn delay(&self) -> Duration {
        if !self.delta_seconds.is_finite() || self.delta_seconds <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.delta_seconds).unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            EventPayload::MouseClick(click) => write!(
                f,
                "+{:.3}s mouse {} {} at ({}, {})",
                self.delta_seconds,
                click.button,
                if click.pressed { "down" } else { "up" },
                click.x,
                click.y
            ),
            EventPayload::Key(key) => write!(
                f,
                "+{:.3}s key 0x{:02X} {}",
                self.delta_seconds, key.key_code, key.action
            ),
        }
    }
}
