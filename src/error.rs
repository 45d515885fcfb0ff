use std::fmt;

/// Error type for the library.
///
/// A plain enum with a hand-written `Display` impl, no `thiserror` derive.
#[derive(Debug)]
pub enum AfpError {
    /// Empty waveform, non-finite samples, or a source rate too low for the
    /// requested target rate.
    InvalidInput(String),
    /// Fewer than one complete STFT frame after decimation.
    TooShort(String),
    /// Database file failed a magic/length sanity check.
    IndexCorrupt(String),
    /// Underlying read/write failure while loading or saving the store.
    IndexIoError(String),
    /// Audio decoding/capture failure (collaborator boundary).
    AudioError(String),
    /// Configuration value out of range.
    ConfigError(String),
}

impl fmt::Display for AfpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AfpError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AfpError::TooShort(msg) => write!(f, "Audio too short: {}", msg),
            AfpError::IndexCorrupt(msg) => write!(f, "Database corrupt: {}", msg),
            AfpError::IndexIoError(msg) => write!(f, "Database I/O error: {}", msg),
            AfpError::AudioError(msg) => write!(f, "Audio error: {}", msg),
            AfpError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AfpError {}

impl From<std::io::Error> for AfpError {
    fn from(err: std::io::Error) -> Self {
        AfpError::IndexIoError(err.to_string())
    }
}

/// Result type for the library.
pub type Result<T> = std::result::Result<T, AfpError>;
