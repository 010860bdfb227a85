//! Macro recorder
//!
//! This crate records global mouse button and keyboard input as a timeline of
//! timed events, saves it as JSON and replays it later through synthetic input,
//! keeping the original gaps between events.
//!
//! Recording stops on an explicit request or when the configured cancel key is
//! pressed. Only one recording or playback runs at a time; the
//! [`SessionController`] rejects overlapping requests.

pub mod config;
pub mod error;
pub mod events;
pub mod hotkeys;
pub mod platforms;
pub mod player;
pub mod prompt;
pub mod recorder;
pub mod session;
pub mod timeline;

pub use config::*;
pub use error::*;
pub use events::*;
pub use hotkeys::{HotkeyAction, HotkeyWatcher};
pub use player::{Clock, PlaybackReport, Player, SystemClock};
pub use prompt::{FixedPath, PathPrompt, PromptPurpose, StdinPrompt, TimestampedPath};
pub use recorder::*;
pub use session::{RecordingToggle, SessionController, SessionState};
pub use timeline::Timeline;
