use std::{io, path::PathBuf};

use thiserror::Error;

/// Failures surfaced by the telemetry, control and preset paths.
///
/// Each variant is recovered at the boundary of the action that triggered it
/// (one frame, one operator command) and renders as a single line.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid hand data: {0}")]
    InvalidHandData(String),

    #[error("send to {endpoint} failed: {source}")]
    SendFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("preset store {} is corrupt: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("preset \"{0}\" not found")]
    PresetNotFound(String),

    #[error("preset name must not be empty")]
    InvalidPresetName,

    #[error("failed to write preset store {}", path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;
