//! In-process input backend.
//!
//! [`VirtualHook`] delivers whatever input is handed to it, and
//! [`VirtualController`] logs synthetic actions instead of performing them.
//! Used for dry runs and for exercising capture and playback without a desktop.

use super::{
    Dispatcher, InputController, InputHook, KeyCallback, KeyInput, PointerCallback, PointerInput,
    Subscription,
};
use crate::{MouseButton, Result};
use std::{
    fmt,
    sync::{Mutex, PoisonError},
};
use tracing::info;

/// A hook fed by the caller instead of the operating system
#[derive(Default)]
pub struct VirtualHook {
    pointer: Dispatcher<PointerInput>,
    keys: Dispatcher<KeyInput>,
}

impl VirtualHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a pointer transition to every pointer subscriber
    pub fn emit_pointer(&self, input: PointerInput) {
        self.pointer.dispatch(&input);
    }

    /// Deliver a key transition to every key subscriber
    pub fn emit_key(&self, input: KeyInput) {
        self.keys.dispatch(&input);
    }

    pub fn pointer_subscribers(&self) -> usize {
        self.pointer.len()
    }

    pub fn key_subscribers(&self) -> usize {
        self.keys.len()
    }
}

impl InputHook for VirtualHook {
    fn subscribe_pointer(&self, callback: PointerCallback) -> Result<Subscription> {
        Ok(self.pointer.subscribe("virtual pointer", callback))
    }

    fn subscribe_keys(&self, callback: KeyCallback) -> Result<Subscription> {
        Ok(self.keys.subscribe("virtual keyboard", callback))
    }
}

/// One synthetic input primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticAction {
    MovePointer { x: i32, y: i32 },
    PressButton(MouseButton),
    ReleaseButton(MouseButton),
    PressKey(u32),
    ReleaseKey(u32),
}

impl fmt::Display for SyntheticAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntheticAction::MovePointer { x, y } => write!(f, "move pointer to ({x}, {y})"),
            SyntheticAction::PressButton(button) => write!(f, "press {button} button"),
            SyntheticAction::ReleaseButton(button) => write!(f, "release {button} button"),
            SyntheticAction::PressKey(code) => write!(f, "press key 0x{code:02X}"),
            SyntheticAction::ReleaseKey(code) => write!(f, "release key 0x{code:02X}"),
        }
    }
}

/// A controller that records actions instead of synthesizing them
#[derive(Debug, Default)]
pub struct VirtualController {
    actions: Mutex<Vec<SyntheticAction>>,
}

impl VirtualController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions performed so far, in order
    pub fn actions(&self) -> Vec<SyntheticAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn perform(&self, action: SyntheticAction) -> Result<()> {
        info!("[dry-run] {}", action);
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action);
        Ok(())
    }
}

impl InputController for VirtualController {
    fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        self.perform(SyntheticAction::MovePointer { x, y })
    }

    fn press_button(&self, button: MouseButton) -> Result<()> {
        self.perform(SyntheticAction::PressButton(button))
    }

    fn release_button(&self, button: MouseButton) -> Result<()> {
        self.perform(SyntheticAction::ReleaseButton(button))
    }

    fn press_key(&self, key_code: u32) -> Result<()> {
        self.perform(SyntheticAction::PressKey(key_code))
    }

    fn release_key(&self, key_code: u32) -> Result<()> {
        self.perform(SyntheticAction::ReleaseKey(key_code))
    }
}
