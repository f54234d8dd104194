//! Error types for region watching

use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, WatchError>;

/// Everything that can go wrong while loading, capturing, comparing or acting
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    /// Reading the pointer position or the screen region failed
    #[error("Capture error: {0}")]
    Capture(String),

    /// Injecting a click or a pointer move failed
    #[error("Injection error: {0}")]
    Injection(String),

    /// Captured or persisted data is malformed or has the wrong shape
    #[error("Format error: {0}")]
    Format(String),

    /// A watch configuration failed validation
    #[error("Config error: {0}")]
    Config(String),

    /// Two colour grids of different dimensions were compared
    #[error("Shape mismatch: expected {}x{}, got {}x{}", .expected.0, .expected.1, .actual.0, .actual.1)]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Reading or writing a configuration file failed
    #[error("IO error: {0}")]
    Io(String),

    /// `Watcher::start` was called while a worker is still attached
    #[error("Watcher is already running")]
    AlreadyRunning,

    /// The requested backend or feature is not available in this build
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl WatchError {
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture(message.into())
    }

    pub fn injection(message: impl Into<String>) -> Self {
        Self::Injection(message.into())
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Whether this error rejects a configuration at load time.
    ///
    /// Load-time errors are never retried; everything else only aborts the
    /// current cycle.
    pub fn is_fatal_on_load(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Format(_) | Self::Io(_))
    }
}

impl From<std::io::Error> for WatchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for WatchError {
    fn from(e: toml::de::Error) -> Self {
        Self::Format(e.to_string())
    }
}

impl From<toml::ser::Error> for WatchError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Format(e.to_string())
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Format(e.to_string())
    }
}
