//! Raw AES block transform shared by every cipher mode.

use aes::{
    Aes128, Aes192, Aes256,
    cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};

use crate::error::{CryptError, Result};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

enum AesVariant {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

/// Keyed AES block transform. All cipher modes in this crate are built on
/// top of this single primitive, so the key schedule is computed exactly
/// once per cryptor instance.
pub struct BlockCipherCore {
    cipher: AesVariant,
}

impl BlockCipherCore {
    /// Create a block cipher from a 16, 24 or 32 byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = match key.len() {
            16 => AesVariant::Aes128(Aes128::new(GenericArray::from_slice(key))),
            24 => AesVariant::Aes192(Aes192::new(GenericArray::from_slice(key))),
            32 => AesVariant::Aes256(Aes256::new(GenericArray::from_slice(key))),
            n => return Err(CryptError::InvalidKeyLength(n)),
        };

        Ok(Self { cipher })
    }

    /// Encrypt one 16 byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);

        match &self.cipher {
            AesVariant::Aes128(c) => c.encrypt_block(block),
            AesVariant::Aes192(c) => c.encrypt_block(block),
            AesVariant::Aes256(c) => c.encrypt_block(block),
        }
    }

    /// Decrypt one 16 byte block in place.
    pub fn decrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);

        match &self.cipher {
            AesVariant::Aes128(c) => c.decrypt_block(block),
            AesVariant::Aes192(c) => c.decrypt_block(block),
            AesVariant::Aes256(c) => c.decrypt_block(block),
        }
    }

    /// Encrypt a whole buffer of blocks in place (ECB style, used by tests
    /// and key wrapping, never for sample payloads).
    pub fn encrypt_blocks(&self, data: &mut [u8]) -> Result<()> {
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptError::MisalignedInput(data.len()));
        }

        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.encrypt_block(&mut block);
            chunk.copy_from_slice(&block);
        }

        Ok(())
    }

    /// Decrypt a whole buffer of blocks in place.
    pub fn decrypt_blocks(&self, data: &mut [u8]) -> Result<()> {
        if data.len() % AES_BLOCK_SIZE != 0 {
            return Err(CryptError::MisalignedInput(data.len()));
        }

        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            self.decrypt_block(&mut block);
            chunk.copy_from_slice(&block);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_key_lengths() {
        for len in [0, 1, 15, 17, 23, 25, 31, 33] {
            assert!(matches!(
                BlockCipherCore::new(&vec![0u8; len]),
                Err(CryptError::InvalidKeyLength(n)) if n == len
            ));
        }
    }

    #[test]
    fn test_block_roundtrip() {
        let core = BlockCipherCore::new(&[7u8; 32]).unwrap();
        let plain = *b"sixteen byte blk";

        let mut block = plain;
        core.encrypt_block(&mut block);
        assert_ne!(block, plain);
        core.decrypt_block(&mut block);
        assert_eq!(block, plain);
    }

    #[test]
    fn test_misaligned_buffer_rejected() {
        let core = BlockCipherCore::new(&[7u8; 16]).unwrap();
        let mut data = [0u8; 20];
        assert!(matches!(
            core.encrypt_blocks(&mut data),
            Err(CryptError::MisalignedInput(20))
        ));
    }
}
