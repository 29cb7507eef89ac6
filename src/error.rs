//! Error type for an encode run and its mapping to process exit codes.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use vplenc_codec::CodecError;

use crate::statistics::StatsError;

/// Errors that end an encode run.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Invalid or incomplete configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A file could not be opened, read or written.
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The session could not be created or rejected its parameters.
    #[error("encoder initialization failed: {0}")]
    EncoderInit(#[source] CodecError),

    /// The session failed, or returned an unknown status, while encoding.
    #[error("encoding failed: {0}")]
    EncoderRuntime(String),

    /// Statistics were misused or could not be written.
    #[error("statistics: {0}")]
    Stats(#[from] StatsError),
}

impl EncodeError {
    /// Create a Config error with a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an Io error for a path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an EncoderRuntime error with a message.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::EncoderRuntime(msg.into())
    }

    /// Process exit code for this error.
    ///
    /// Files that cannot be found map to `ENOENT`; every other I/O, session
    /// or statistics failure maps to `EIO`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => libc::EINVAL,
            Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => libc::ENOENT,
            Self::Io { .. } | Self::EncoderInit(_) | Self::EncoderRuntime(_) | Self::Stats(_) => {
                libc::EIO
            }
        }
    }
}

impl From<CodecError> for EncodeError {
    fn from(err: CodecError) -> Self {
        if err.is_config_error() {
            Self::Config(err.to_string())
        } else {
            Self::EncoderInit(err)
        }
    }
}
