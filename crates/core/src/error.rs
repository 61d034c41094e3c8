use std::{path::PathBuf, time::Duration};

/// Result alias that carries the custom [`JukeboxError`] type.
pub type Result<T> = std::result::Result<T, JukeboxError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum JukeboxError {
    /// Free-form error used where no dedicated variant fits.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be parsed or serialised.
    #[error("malformed configuration: {0}")]
    ConfigFormat(#[from] serde_json::Error),
    /// The configuration parsed but holds values the controller cannot use.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The folder tracks are discovered in is not there.
    #[error("music folder does not exist: {}", .0.display())]
    MusicFolderMissing(PathBuf),
    /// Failure reported by the GPIO layer.
    #[error("hardware error: {0}")]
    Hardware(String),
    /// Failure reported by the media backend.
    #[error("playback error: {0}")]
    Playback(String),
    /// The media backend did not answer in time.
    #[error("media backend did not answer `{operation}` within {timeout:?}")]
    AdapterTimeout {
        operation: &'static str,
        timeout: Duration,
    },
    /// A backend was requested that this binary was built without.
    #[error("{0} support was not compiled into this build")]
    Unsupported(&'static str),
}

impl JukeboxError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Rejects a configuration value with the given explanation.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// Wraps a GPIO driver failure.
    pub fn hardware<T: std::fmt::Display>(err: T) -> Self {
        Self::Hardware(err.to_string())
    }

    /// Wraps a media backend failure.
    pub fn playback<T: std::fmt::Display>(err: T) -> Self {
        Self::Playback(err.to_string())
    }
}

impl From<&str> for JukeboxError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for JukeboxError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(feature = "rpi")]
impl From<rppal::gpio::Error> for JukeboxError {
    fn from(value: rppal::gpio::Error) -> Self {
        Self::hardware(value)
    }
}
