use crate::{MacroError, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;

/// Virtual-key code of Escape
pub const VK_ESCAPE: u32 = 0x1B;
/// Virtual-key code of F9
pub const VK_F9: u32 = 0x78;
/// Virtual-key code of F10
pub const VK_F10: u32 = 0x79;

/// Configuration for recording and playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MacroRecorderConfig {
    /// Key that stops a recording when pressed; never recorded itself
    pub cancel_key: u32,

    /// Global key that starts or stops a recording
    pub record_hotkey: Option<u32>,

    /// Global key that replays the last used timeline
    pub playback_hotkey: Option<u32>,

    /// Number of countdown pauses before playback starts
    pub countdown_steps: u32,

    /// Length of one countdown pause (milliseconds)
    pub countdown_step_ms: u64,

    /// Capacity of the live event feed; slow readers skip ahead
    pub event_buffer: usize,

    /// Directory for recordings saved without an explicit destination
    pub output_dir: Option<PathBuf>,
}

impl Default for MacroRecorderConfig {
    fn default() -> Self {
        Self {
            cancel_key: VK_ESCAPE,
            record_hotkey: Some(VK_F9),
            playback_hotkey: Some(VK_F10),
            countdown_steps: 3,
            countdown_step_ms: 1000,
            event_buffer: 100,
            output_dir: None,
        }
    }
}

impl MacroRecorderConfig {
    /// Load a JSON configuration file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {:?}", path);

        let json = std::fs::read_to_string(path).map_err(|e| MacroError::io(path, e))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| MacroError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_buffer == 0 {
            return Err(MacroError::Config("event_buffer must be at least 1".to_string()));
        }
        if self.hotkeys().contains(&self.cancel_key) {
            return Err(MacroError::Config(format!(
                "cancel key 0x{:02X} is also bound as a hotkey",
                self.cancel_key
            )));
        }
        if self.record_hotkey.is_some() && self.record_hotkey == self.playback_hotkey {
            return Err(MacroError::Config(
                "record and playback hotkeys must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Keys bound to hotkeys; these are kept out of recordings
    pub fn hotkeys(&self) -> Vec<u32> {
        self.record_hotkey
            .into_iter()
            .chain(self.playback_hotkey)
            .collect()
    }

    pub fn countdown_step(&self) -> Duration {
        Duration::from_millis(self.countdown_step_ms)
    }
}
