//! Global hotkeys for the resident `watch` mode.
//!
//! The hook callback runs on the platform's listener thread, so the watcher
//! only forwards the matching action over a channel. Recording and playback
//! happen wherever the receiver lives.

use crate::{
    platforms::{InputHook, KeyInput, Subscription},
    MacroRecorderConfig, Result,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    /// Start a recording, or stop and save the current one
    ToggleRecording,
    /// Replay the last used timeline
    PlayLast,
}

/// Keeps a key subscription alive and maps hotkey presses to actions
pub struct HotkeyWatcher {
    subscription: Subscription,
}

impl HotkeyWatcher {
    pub fn start(
        hook: &dyn InputHook,
        config: &MacroRecorderConfig,
        actions: mpsc::UnboundedSender<HotkeyAction>,
    ) -> Result<Self> {
        let record = config.record_hotkey;
        let playback = config.playback_hotkey;
        info!(
            "Watching hotkeys (record {:?}, playback {:?})",
            record, playback
        );

        let subscription = hook.subscribe_keys(Arc::new(move |input: &KeyInput| {
            if !input.pressed {
                return;
            }
            let Some(code) = input.key.virtual_key() else {
                return;
            };

            let action = if Some(code) == record {
                HotkeyAction::ToggleRecording
            } else if Some(code) == playback {
                HotkeyAction::PlayLast
            } else {
                return;
            };

            debug!("Hotkey {} -> {:?}", input.key, action);
            if actions.send(action).is_err() {
                debug!("Hotkey receiver gone, dropping {:?}", action);
            }
        }))?;

        Ok(Self { subscription })
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop reacting to hotkeys
    pub fn stop(&mut self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{VK_ESCAPE, VK_F10, VK_F9};
    use crate::platforms::{RawKey, VirtualHook};
    use std::time::Instant;

    fn press(code: u32) -> KeyInput {
        KeyInput::press(RawKey::Coded(code), Instant::now())
    }

    #[test]
    fn test_hotkeys_map_to_actions() {
        let hook = VirtualHook::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = HotkeyWatcher::start(&hook, &MacroRecorderConfig::default(), tx).unwrap();

        hook.emit_key(press(VK_F9));
        hook.emit_key(KeyInput::release(RawKey::Coded(VK_F9), Instant::now()));
        hook.emit_key(press(65));
        hook.emit_key(press(VK_ESCAPE));
        hook.emit_key(press(VK_F10));

        assert_eq!(rx.try_recv().unwrap(), HotkeyAction::ToggleRecording);
        assert_eq!(rx.try_recv().unwrap(), HotkeyAction::PlayLast);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unbound_hotkey_is_ignored() {
        let hook = VirtualHook::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let config = MacroRecorderConfig {
            playback_hotkey: None,
            ..Default::default()
        };
        let _watcher = HotkeyWatcher::start(&hook, &config, tx).unwrap();

        hook.emit_key(press(VK_F10));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_releases_subscription() {
        let hook = VirtualHook::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher =
            HotkeyWatcher::start(&hook, &MacroRecorderConfig::default(), tx).unwrap();
        assert!(watcher.is_active());
        assert_eq!(hook.key_subscribers(), 1);

        watcher.stop();
        hook.emit_key(press(VK_F9));

        assert!(!watcher.is_active());
        assert_eq!(hook.key_subscribers(), 0);
        assert!(rx.try_recv().is_err());
    }
}
