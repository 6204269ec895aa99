//! Error types for the packaging pipeline.

use cuepack_crypto::CryptError;
use thiserror::Error;

/// Errors that can occur while aligning, chunking or encrypting streams.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A cue could not be promoted at a video key frame because no candidate
    /// exists at or before it. Unusable input; the whole job must stop.
    #[error("stream {stream} is not GOP-aligned at t={seconds}s: no cue candidate at or before this key frame")]
    NotGopAligned { stream: usize, seconds: f64 },

    /// A single stream buffered too many samples without reaching a cue,
    /// which means the input is improperly multiplexed.
    #[error("stream {stream} buffered more than {limit} samples while waiting for a cue; input is improperly multiplexed")]
    BufferOverflow { stream: usize, limit: usize },

    /// A sample arrived before the stream's `StreamInfo`, so the stream
    /// cannot even be identified yet.
    #[error("sample delivered before stream info")]
    MissingStreamInfo,

    /// Segment duration rounds to zero stream time units.
    #[error("stream {stream} has a non-positive segment duration")]
    InvalidSegmentDuration { stream: usize },

    /// Cooperative shutdown. Not a failure; never logged as one.
    #[error("pipeline cancelled")]
    Cancelled,

    /// No key material available for a key id.
    #[error("no key found for key id {0}")]
    KeyNotFound(String),

    /// Invalid hex in user-supplied key material.
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Hex key material has the wrong length.
    #[error("hex string has wrong length: expected {expected} bytes, got {actual} bytes")]
    HexWrongLength { expected: usize, actual: usize },

    /// A stream worker thread panicked.
    #[error("stream worker thread panicked")]
    WorkerPanicked,

    /// Cryptor failure; fatal, never retried.
    #[error(transparent)]
    Crypt(#[from] CryptError),
}

impl PipelineError {
    /// True for the cooperative-shutdown signal, which callers must not
    /// report as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

/// A `Result` alias where the `Err` case is [`PipelineError`].
pub type Result<T> = std::result::Result<T, PipelineError>;
