//! Error types for channel decoding

use thiserror::Error;

use crate::channel::ChannelKind;

/// Errors that can occur while building or running a channel decode
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Argument outside the domain accepted by the channel variant
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Decoder process could not be spawned or its output could not be read
    #[error("decoder I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line matched the frame grammar but its numeric fields are unusable
    #[error("malformed frame line {line:?}: {reason}")]
    MalformedFrame { line: String, reason: String },

    /// Channel variant has no decoder integration yet
    #[error("decoding is not implemented for {0} channels")]
    NotImplemented(ChannelKind),

    /// `start` was called on a channel that already holds frames
    #[error("channel has already been decoded")]
    AlreadyDecoded,

    /// Decode was cancelled before the decoder finished
    #[error("decode cancelled")]
    Cancelled,
}

impl ChannelError {
    /// Shorthand for [`ChannelError::InvalidArgument`]
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ChannelError::InvalidArgument(msg.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ChannelError>;
