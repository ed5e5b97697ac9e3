//! Central error types for the compositor.
//!
//! Per-frame problems never reach the rendering source: the handler logs and
//! drops them. These types carry failures between the internal layers and
//! surface the one fatal case, device creation, to the embedder.

use serde::Serialize;
use thiserror::Error;

/// Main error type for compositor operations.
#[derive(Error, Debug)]
pub enum CompositorError {
    /// No GPU context could be obtained at all
    #[error("GPU device creation failed: {0}")]
    DeviceCreation(String),

    /// The shared GPU context was invalidated (requires texture re-initialization)
    #[error("GPU device lost: {0}")]
    DeviceLost(String),

    /// Texture allocation, lock or copy failed
    #[error("Texture error: {0}")]
    Texture(String),

    /// Staging texture lock protocol violated (double lock, unlock without lock)
    #[error("Texture lock error: {0}")]
    Lock(String),

    /// Delivered frame cannot be composited (bad size, short buffer)
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Configuration value rejected
    #[error("Config error: {0}")]
    Config(String),

    /// Reading a config file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl CompositorError {
    /// Whether the handler can recover by re-creating its texture pair.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CompositorError::DeviceCreation(_))
    }
}

/// Errors serialize as their display message.
impl Serialize for CompositorError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<String> for CompositorError {
    fn from(msg: String) -> Self {
        CompositorError::Other(msg)
    }
}

impl From<&str> for CompositorError {
    fn from(msg: &str) -> Self {
        CompositorError::Other(msg.to_string())
    }
}

/// Wraps foreign errors (I/O, backend strings) with a note on what the
/// compositor was doing when they happened.
pub trait ResultExt<T> {
    fn context(self, msg: &str) -> CompositorResult<T>;

    /// Like [`ResultExt::context`], building the note only on failure.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> CompositorResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> CompositorResult<T> {
        self.map_err(|e| CompositorError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> CompositorResult<T> {
        self.map_err(|e| CompositorError::Other(format!("{}: {}", f(), e)))
    }
}

/// Turns a missing texture pair, pixel or surface into an error.
pub trait OptionExt<T> {
    fn context(self, msg: &str) -> CompositorResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> CompositorResult<T> {
        self.ok_or_else(|| CompositorError::Other(msg.to_string()))
    }
}

pub type CompositorResult<T> = Result<T, CompositorError>;
