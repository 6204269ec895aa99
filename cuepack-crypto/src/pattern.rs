//! Partial pattern encryption ('cbcs'/'cens' style).
//!
//! A pattern cryptor divides the input into 16 byte blocks and groups them
//! into repeating units of `crypt_byte_block + skip_byte_block` blocks. The
//! first `crypt_byte_block` blocks of each unit go through the wrapped
//! cryptor as one contiguous run, the rest are copied through clear.

use crate::{
    block::AES_BLOCK_SIZE,
    cbc::CbcCryptor,
    ctr::CtrCryptor,
    error::{CryptError, Result},
};

/// A CTR or CBC cryptor a [`PatternCryptor`] can wrap.
pub enum Cryptor {
    Ctr(CtrCryptor),
    Cbc(CbcCryptor),
}

impl Cryptor {
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        match self {
            Cryptor::Ctr(c) => c.set_iv(iv),
            Cryptor::Cbc(c) => c.set_iv(iv),
        }
    }

    pub fn reset_iv(&mut self) {
        match self {
            Cryptor::Ctr(c) => c.reset_iv(),
            Cryptor::Cbc(c) => c.reset_iv(),
        }
    }

    pub fn crypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match self {
            Cryptor::Ctr(c) => c.crypt(input, output),
            Cryptor::Cbc(c) => c.crypt(input, output),
        }
    }
}

/// How a trailing unit smaller than a full crypt run is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternPolicy {
    /// Encrypt the remainder if it still holds at least one full block
    /// ('cbcs'/'cens' behavior).
    EncryptIfRemaining,
    /// Never encrypt a remainder smaller than the full crypt run.
    SkipIfRemaining,
}

/// Whether the wrapped cryptor restarts from its configured IV on every
/// `crypt` call or chains across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvPolicy {
    UseConstantIv,
    ChainAcrossCalls,
}

pub struct PatternCryptor {
    inner: Cryptor,
    crypt_byte_block: u8,
    skip_byte_block: u8,
    policy: PatternPolicy,
    iv_policy: IvPolicy,
}

impl PatternCryptor {
    pub fn new(
        inner: Cryptor,
        crypt_byte_block: u8,
        skip_byte_block: u8,
        policy: PatternPolicy,
        iv_policy: IvPolicy,
    ) -> Self {
        Self {
            inner,
            crypt_byte_block,
            skip_byte_block,
            policy,
            iv_policy,
        }
    }

    /// Replace the wrapped cryptor's IV.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        self.inner.set_iv(iv)
    }

    /// Apply the pattern over `input`. Output length equals input length.
    pub fn crypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if output.len() < input.len() {
            return Err(CryptError::BufferTooSmall {
                needed: input.len(),
                actual: output.len(),
            });
        }

        if let IvPolicy::UseConstantIv = self.iv_policy {
            self.inner.reset_iv();
        }

        let crypt_size = self.crypt_byte_block as usize * AES_BLOCK_SIZE;
        let skip_size = self.skip_byte_block as usize * AES_BLOCK_SIZE;

        // A 0:0 pattern means fully encrypted.
        if crypt_size == 0 && skip_size == 0 {
            return self.inner.crypt(input, output);
        }

        let mut pos = 0;
        while pos < input.len() {
            let remaining = input.len() - pos;

            if remaining < crypt_size {
                let encrypt_remainder = match self.policy {
                    PatternPolicy::EncryptIfRemaining => remaining >= AES_BLOCK_SIZE,
                    PatternPolicy::SkipIfRemaining => false,
                };

                if encrypt_remainder {
                    self.inner.crypt(&input[pos..], &mut output[pos..])?;
                } else {
                    output[pos..input.len()].copy_from_slice(&input[pos..]);
                }
                break;
            }

            self.inner
                .crypt(&input[pos..pos + crypt_size], &mut output[pos..pos + crypt_size])?;
            pos += crypt_size;

            let to_skip = skip_size.min(input.len() - pos);
            output[pos..pos + to_skip].copy_from_slice(&input[pos..pos + to_skip]);
            pos += to_skip;
        }

        Ok(input.len())
    }

    /// Convenience wrapper allocating the output buffer.
    pub fn crypt_to_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; input.len()];
        self.crypt(input, &mut output)?;
        Ok(output)
    }
}
