//! Error types for format lookups and encode sessions.

use thiserror::Error;

/// Errors that can occur while configuring or driving an encode session.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A format name is not part of the lookup table for its kind.
    #[error("unknown {kind} format: {name:?} (expected one of: {})", .accepted.join(", "))]
    UnknownFormat {
        kind: &'static str,
        name: String,
        accepted: Vec<&'static str>,
    },

    /// No session implementation matches the requested properties.
    #[error("no encoder implementation available: {0}")]
    NoImplementation(String),

    /// The session does not support a requested parameter.
    #[error("unsupported parameter: {0}")]
    UnsupportedParam(String),

    /// Invalid frame dimensions.
    #[error("invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The session rejected the parameter block.
    #[error("encoder initialization failed: {0}")]
    InitFailed(String),

    /// The session failed while encoding.
    #[error("encode failed: {0}")]
    EncodeFailed(String),

    /// Encode requested before a successful init.
    #[error("encoder not initialized")]
    NotInitialized,

    /// Reading frames from the source failed.
    #[error("frame source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Create an UnknownFormat error for the given table and its names.
    pub fn unknown_format(
        kind: &'static str,
        name: impl Into<String>,
        accepted: Vec<&'static str>,
    ) -> Self {
        Self::UnknownFormat {
            kind,
            name: name.into(),
            accepted,
        }
    }

    /// Create a NoImplementation error with a message.
    pub fn no_implementation(msg: impl Into<String>) -> Self {
        Self::NoImplementation(msg.into())
    }

    /// Create an UnsupportedParam error with a message.
    pub fn unsupported_param(msg: impl Into<String>) -> Self {
        Self::UnsupportedParam(msg.into())
    }

    /// Create an InitFailed error with a message.
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitFailed(msg.into())
    }

    /// Create an EncodeFailed error with a message.
    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed(msg.into())
    }

    /// Returns true for errors raised by a format lookup or an invalid
    /// configuration value rather than by the session itself.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownFormat { .. } | Self::InvalidDimensions { .. }
        )
    }
}
