//! Error types for sample encryption and decryption.

use thiserror::Error;

/// Errors that can occur while configuring or running a cryptor.
#[derive(Debug, Error)]
pub enum CryptError {
    /// Invalid AES key length (must be 16, 24 or 32 bytes).
    #[error("invalid key length: expected 16, 24 or 32 bytes, got {0} bytes")]
    InvalidKeyLength(usize),

    /// Invalid IV length for the selected cipher mode.
    #[error("invalid IV length: expected at most {expected} bytes, got {actual} bytes")]
    InvalidIvLength { expected: usize, actual: usize },

    /// The caller-provided output buffer is too small.
    #[error("output buffer too small: need {needed} bytes, got {actual} bytes")]
    BufferTooSmall { needed: usize, actual: usize },

    /// Input length is not a whole number of AES blocks.
    #[error("input length {0} is not a multiple of the 16 byte AES block size")]
    MisalignedInput(usize),

    /// PKCS#5 padding did not validate on decryption.
    #[error("invalid PKCS#5 padding: {0}")]
    InvalidPadding(String),

    /// The subsample map covers more bytes than the payload holds.
    #[error("subsample map covers {needed} bytes but the payload holds {actual} bytes")]
    SubsampleOutOfBounds { needed: usize, actual: usize },
}

/// A `Result` alias where the `Err` case is [`CryptError`].
pub type Result<T> = std::result::Result<T, CryptError>;
