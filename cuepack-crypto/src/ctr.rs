//! AES-CTR stream cipher with common-encryption counter semantics.

use crate::{
    block::{AES_BLOCK_SIZE, BlockCipherCore},
    error::{CryptError, Result},
};

/// Counter-mode cryptor. Encryption and decryption are the same operation.
///
/// The 16 byte counter block starts as the IV right-padded with zeros; the
/// low 8 bytes are a big-endian counter incremented once per block of
/// consumed input, wrapping silently to zero on overflow as common
/// encryption requires. Counter and keystream state carry across `crypt`
/// calls, so a sample may be fed in arbitrary slices.
pub struct CtrCryptor {
    core: BlockCipherCore,
    initial_iv: [u8; AES_BLOCK_SIZE],
    counter: [u8; AES_BLOCK_SIZE],
    keystream: [u8; AES_BLOCK_SIZE],
    block_offset: usize,
}

impl CtrCryptor {
    /// Create a cryptor from a 16/24/32 byte key and an IV of at most
    /// 16 bytes.
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let core = BlockCipherCore::new(key)?;
        let initial_iv = pad_iv(iv)?;

        Ok(Self {
            core,
            initial_iv,
            counter: initial_iv,
            keystream: [0u8; AES_BLOCK_SIZE],
            block_offset: 0,
        })
    }

    /// Replace the IV and restart the counter, e.g. at a sample boundary.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        self.initial_iv = pad_iv(iv)?;
        self.reset_iv();
        Ok(())
    }

    /// Restart the counter from the configured IV.
    pub fn reset_iv(&mut self) {
        self.counter = self.initial_iv;
        self.block_offset = 0;
    }

    /// XOR `input` with the keystream into `output`. Output length equals
    /// input length.
    pub fn crypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        if output.len() < input.len() {
            return Err(CryptError::BufferTooSmall {
                needed: input.len(),
                actual: output.len(),
            });
        }

        for (i, byte) in input.iter().enumerate() {
            if self.block_offset == 0 {
                self.keystream = self.counter;
                self.core.encrypt_block(&mut self.keystream);
                self.increment_counter();
            }

            output[i] = byte ^ self.keystream[self.block_offset];
            self.block_offset = (self.block_offset + 1) % AES_BLOCK_SIZE;
        }

        Ok(input.len())
    }

    /// Convenience wrapper allocating the output buffer.
    pub fn crypt_to_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; input.len()];
        self.crypt(input, &mut output)?;
        Ok(output)
    }

    fn increment_counter(&mut self) {
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.counter[8..]);
        let next = u64::from_be_bytes(low).wrapping_add(1);
        self.counter[8..].copy_from_slice(&next.to_be_bytes());
    }
}

fn pad_iv(iv: &[u8]) -> Result<[u8; AES_BLOCK_SIZE]> {
    if iv.len() > AES_BLOCK_SIZE {
        return Err(CryptError::InvalidIvLength {
            expected: AES_BLOCK_SIZE,
            actual: iv.len(),
        });
    }

    let mut padded = [0u8; AES_BLOCK_SIZE];
    padded[..iv.len()].copy_from_slice(iv);
    Ok(padded)
}
