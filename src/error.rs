//! Error types for the control path.
//!
//! Nothing in here is ever produced on the render thread: validation,
//! parse and load failures are returned synchronously to whoever issued the
//! command.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown property {0}")]
    UnknownProperty(String),

    #[error("set property {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("{message} at position {pos}")]
    Parse { pos: usize, message: String },

    #[error("unknown function: {0}")]
    UnknownCommand(String),

    #[error("not a valid sound id: {0}")]
    InvalidSound(String),

    #[error("{0}")]
    Arguments(String),

    #[error("{0}")]
    Pattern(String),

    #[error("unknown preset: {0}")]
    NoSuchPreset(String),

    #[error("load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn args(message: impl Into<String>) -> Self {
        Error::Arguments(message.into())
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
