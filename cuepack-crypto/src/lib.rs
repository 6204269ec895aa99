//! AES sample cryptors for common-encryption (CENC) media packaging.
//!
//! This crate implements the cipher modes the CENC protection schemes are
//! built from, with the exact counter, chaining and ciphertext-stealing
//! semantics the schemes mandate:
//!
//! | Scheme | Cipher | Pattern | IV handling |
//! |--------|--------|---------|-------------|
//! | `cenc` | AES-CTR | full sample | per sample |
//! | `cens` | AES-CTR | crypt:skip | per sample |
//! | `cbc1` | AES-CBC | full sample | per sample |
//! | `cbcs` | AES-CBC | crypt:skip | constant |
//!
//! All cryptors are owned, stateful, sequential-call objects; their counter
//! and chaining state advances on every call. Build one instance per stream
//! from fresh key material instead of sharing a live instance.

mod block;
mod cbc;
mod ctr;
mod error;
mod pattern;
mod sample;

pub use block::{AES_BLOCK_SIZE, BlockCipherCore};
pub use cbc::{CbcCryptor, CbcPadding, CryptDirection};
pub use ctr::CtrCryptor;
pub use error::{CryptError, Result};
pub use pattern::{Cryptor, IvPolicy, PatternCryptor, PatternPolicy};
pub use sample::{SampleCrypter, SampleCryptor, SubsampleEntry};
