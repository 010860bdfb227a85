use crate::session::SessionState;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for macro recording and playback
#[derive(Debug, Error)]
pub enum MacroError {
    /// A timeline file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A timeline file does not match the expected schema
    #[error("Invalid timeline format: {0}")]
    Format(String),

    /// An input callback or stored action could not be mapped
    #[error("Unrecognized input: {0}")]
    UnrecognizedInput(String),

    /// Another session is already active
    #[error("Cannot start {requested} while {current}")]
    SessionBusy {
        current: SessionState,
        requested: &'static str,
    },

    /// Stop was requested but nothing is being recorded
    #[error("No recording in progress")]
    NotRecording,

    /// The configuration file is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error from the OS input hook or input synthesis
    #[error("Input platform error: {0}")]
    Platform(String),
}

impl MacroError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for macro recorder operations
pub type Result<T> = std::result::Result<T, MacroError>;
