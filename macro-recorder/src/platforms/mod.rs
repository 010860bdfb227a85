//! Boundary to the operating system's global input facilities.
//!
//! Capture goes through an [`InputHook`], which hands out independent pointer
//! and key subscriptions. Playback goes through an [`InputController`], which
//! synthesizes pointer and key input. The `rdev` backend talks to the real
//! desktop; the virtual backend keeps everything in-process.

use crate::{MouseButton, Result};
use std::{fmt, sync::Arc, time::Instant};
use tracing::debug;

mod dispatch;
#[cfg(feature = "rdev-backend")]
pub mod rdev_backend;
pub mod virtual_input;

pub use dispatch::Dispatcher;
#[cfg(feature = "rdev-backend")]
pub use rdev_backend::{RdevController, RdevHook};
pub use virtual_input::{SyntheticAction, VirtualController, VirtualHook};

/// A key as reported by the platform hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    /// A named key that maps onto a virtual-key code
    Symbolic { name: String, code: u32 },

    /// A key the platform only reports by its code
    Coded(u32),

    /// Neither named nor coded; carries a description for logging
    Unrecognized(String),
}

impl RawKey {
    /// Normalize to a virtual-key code
    pub fn virtual_key(&self) -> Option<u32> {
        match self {
            RawKey::Symbolic { code, .. } => Some(*code),
            RawKey::Coded(code) => Some(*code),
            RawKey::Unrecognized(_) => None,
        }
    }
}

impl fmt::Display for RawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawKey::Symbolic { name, code } => write!(f, "{name} (0x{code:02X})"),
            RawKey::Coded(code) => write!(f, "0x{code:02X}"),
            RawKey::Unrecognized(description) => f.write_str(description),
        }
    }
}

/// A pointer button transition with the pointer position at that moment
#[derive(Debug, Clone, PartialEq)]
pub struct PointerInput {
    /// `None` when the platform reported a button we do not know
    pub button: Option<MouseButton>,
    pub pressed: bool,
    pub x: i32,
    pub y: i32,
    pub at: Instant,
}

impl PointerInput {
    pub fn new(button: Option<MouseButton>, pressed: bool, x: i32, y: i32, at: Instant) -> Self {
        Self {
            button,
            pressed,
            x,
            y,
            at,
        }
    }
}

/// A key transition
#[derive(Debug, Clone, PartialEq)]
pub struct KeyInput {
    pub key: RawKey,
    pub pressed: bool,
    pub at: Instant,
}

impl KeyInput {
    pub fn press(key: RawKey, at: Instant) -> Self {
        Self {
            key,
            pressed: true,
            at,
        }
    }

    pub fn release(key: RawKey, at: Instant) -> Self {
        Self {
            key,
            pressed: false,
            at,
        }
    }
}

pub type PointerCallback = Arc<dyn Fn(&PointerInput) + Send + Sync>;
pub type KeyCallback = Arc<dyn Fn(&KeyInput) + Send + Sync>;

/// Global input subscription facility
pub trait InputHook: Send + Sync {
    /// Receive pointer button transitions until the subscription is released
    fn subscribe_pointer(&self, callback: PointerCallback) -> Result<Subscription>;

    /// Receive key transitions until the subscription is released
    fn subscribe_keys(&self, callback: KeyCallback) -> Result<Subscription>;
}

/// Synthetic input facility
pub trait InputController: Send + Sync {
    fn move_pointer(&self, x: i32, y: i32) -> Result<()>;

    fn press_button(&self, button: MouseButton) -> Result<()>;

    fn release_button(&self, button: MouseButton) -> Result<()>;

    fn press_key(&self, key_code: u32) -> Result<()>;

    fn release_key(&self, key_code: u32) -> Result<()>;
}

/// Handle to an active hook subscription.
///
/// The callback stays registered until [`Subscription::unsubscribe`] is called
/// or the handle is dropped. Unsubscribing more than once does nothing.
pub struct Subscription {
    label: &'static str,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(label: &'static str, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            label,
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            debug!("Releasing {} subscription", self.label);
            release();
        }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_raw_key_normalization() {
        let symbolic = RawKey::Symbolic {
            name: "ControlLeft".to_string(),
            code: 0xA2,
        };
        assert_eq!(symbolic.virtual_key(), Some(0xA2));
        assert_eq!(RawKey::Coded(65).virtual_key(), Some(65));
        assert_eq!(RawKey::Unrecognized("Function".into()).virtual_key(), None);
    }

    #[test]
    fn test_subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let mut subscription = Subscription::new("test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.is_active());
        subscription.unsubscribe();
        subscription.unsubscribe();
        drop(subscription);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        {
            let _subscription = Subscription::new("test", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
