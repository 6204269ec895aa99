//! AES-CBC with selectable residual handling.
//!
//! Three residual-tail policies are supported, matching the common
//! encryption schemes that use CBC:
//!
//! - [`CbcPadding::None`] copies any sub-block tail through in the clear
//!   ('cbc1'/'cbcs' style, only whole blocks are ever encrypted).
//! - [`CbcPadding::Pkcs5`] always appends a padding block, so output grows
//!   to the next block boundary.
//! - [`CbcPadding::CiphertextStealing`] swaps the last two ciphertext
//!   blocks (CS2) so output length equals input length exactly.

use crate::{
    block::{AES_BLOCK_SIZE, BlockCipherCore},
    error::{CryptError, Result},
};

/// Residual-tail policy for the final partial block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CbcPadding {
    None,
    Pkcs5,
    CiphertextStealing,
}

/// Whether a cryptor transforms plaintext to ciphertext or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptDirection {
    Encrypt,
    Decrypt,
}

/// Cipher-block-chaining cryptor.
///
/// The chaining vector carries forward across `crypt` calls, which is what
/// un-padded streaming use needs; call [`CbcCryptor::set_iv`] or
/// [`CbcCryptor::reset_iv`] at sample boundaries for per-sample IV schemes.
pub struct CbcCryptor {
    core: BlockCipherCore,
    padding: CbcPadding,
    direction: CryptDirection,
    initial_iv: [u8; AES_BLOCK_SIZE],
    chain: [u8; AES_BLOCK_SIZE],
}

impl CbcCryptor {
    /// Create a cryptor from a 16/24/32 byte key and an exactly 16 byte IV.
    pub fn new(
        key: &[u8],
        iv: &[u8],
        padding: CbcPadding,
        direction: CryptDirection,
    ) -> Result<Self> {
        let core = BlockCipherCore::new(key)?;
        let initial_iv = check_iv(iv)?;

        Ok(Self {
            core,
            padding,
            direction,
            initial_iv,
            chain: initial_iv,
        })
    }

    /// Replace the IV and restart the chain.
    pub fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        self.initial_iv = check_iv(iv)?;
        self.reset_iv();
        Ok(())
    }

    /// Restart the chain from the configured IV.
    pub fn reset_iv(&mut self) {
        self.chain = self.initial_iv;
    }

    /// Output size needed for an input of `input_size` bytes.
    pub fn required_output_size(&self, input_size: usize) -> usize {
        match (self.direction, self.padding) {
            (CryptDirection::Encrypt, CbcPadding::Pkcs5) => {
                (input_size / AES_BLOCK_SIZE + 1) * AES_BLOCK_SIZE
            }
            _ => input_size,
        }
    }

    /// Transform `input` into `output`, returning the number of bytes
    /// written.
    pub fn crypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let needed = self.required_output_size(input.len());
        if output.len() < needed {
            return Err(CryptError::BufferTooSmall {
                needed,
                actual: output.len(),
            });
        }

        match self.direction {
            CryptDirection::Encrypt => self.encrypt(input, output),
            CryptDirection::Decrypt => self.decrypt(input, output),
        }
    }

    /// Convenience wrapper allocating the output buffer.
    pub fn crypt_to_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; self.required_output_size(input.len())];
        let written = self.crypt(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    fn encrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let residual = input.len() % AES_BLOCK_SIZE;
        let cbc_size = input.len() - residual;

        match self.padding {
            CbcPadding::None => {
                self.encrypt_chain(&input[..cbc_size], &mut output[..cbc_size]);
                output[cbc_size..input.len()].copy_from_slice(&input[cbc_size..]);
                Ok(input.len())
            }
            CbcPadding::Pkcs5 => {
                self.encrypt_chain(&input[..cbc_size], &mut output[..cbc_size]);

                // Always one extra block, even for aligned input.
                let pad = (AES_BLOCK_SIZE - residual) as u8;
                let mut last = [pad; AES_BLOCK_SIZE];
                last[..residual].copy_from_slice(&input[cbc_size..]);

                let mut out_block = [0u8; AES_BLOCK_SIZE];
                self.encrypt_chain(&last, &mut out_block);
                output[cbc_size..cbc_size + AES_BLOCK_SIZE].copy_from_slice(&out_block);
                Ok(cbc_size + AES_BLOCK_SIZE)
            }
            CbcPadding::CiphertextStealing => {
                if residual == 0 {
                    self.encrypt_chain(input, &mut output[..cbc_size]);
                } else if cbc_size == 0 {
                    // No full block to steal from; leave the tail clear for
                    // an upstream stage to combine with later data.
                    output[..residual].copy_from_slice(input);
                } else {
                    self.encrypt_chain(&input[..cbc_size], &mut output[..cbc_size]);

                    let mut last_full = [0u8; AES_BLOCK_SIZE];
                    last_full.copy_from_slice(&output[cbc_size - AES_BLOCK_SIZE..cbc_size]);

                    // CBC-encrypt the zero-padded residual, then swap: the
                    // stolen block takes the last full slot and the former
                    // ciphertext's prefix lands in the residual slot.
                    let mut tail = [0u8; AES_BLOCK_SIZE];
                    tail[..residual].copy_from_slice(&input[cbc_size..]);
                    let mut stolen = [0u8; AES_BLOCK_SIZE];
                    self.encrypt_chain(&tail, &mut stolen);

                    output[cbc_size - AES_BLOCK_SIZE..cbc_size].copy_from_slice(&stolen);
                    output[cbc_size..input.len()].copy_from_slice(&last_full[..residual]);
                }
                Ok(input.len())
            }
        }
    }

    fn decrypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let residual = input.len() % AES_BLOCK_SIZE;
        let cbc_size = input.len() - residual;

        match self.padding {
            CbcPadding::None => {
                self.decrypt_chain(&input[..cbc_size], &mut output[..cbc_size]);
                output[cbc_size..input.len()].copy_from_slice(&input[cbc_size..]);
                Ok(input.len())
            }
            CbcPadding::Pkcs5 => {
                if input.is_empty() || residual != 0 {
                    return Err(CryptError::InvalidPadding(format!(
                        "ciphertext length {} is not a positive multiple of 16",
                        input.len()
                    )));
                }

                self.decrypt_chain(input, &mut output[..input.len()]);

                let pad = output[input.len() - 1] as usize;
                if pad == 0 || pad > AES_BLOCK_SIZE {
                    return Err(CryptError::InvalidPadding(format!(
                        "padding byte {pad} is out of range"
                    )));
                }
                if output[input.len() - pad..input.len()]
                    .iter()
                    .any(|&b| b as usize != pad)
                {
                    return Err(CryptError::InvalidPadding(
                        "padding bytes are inconsistent".to_owned(),
                    ));
                }

                Ok(input.len() - pad)
            }
            CbcPadding::CiphertextStealing => {
                if residual == 0 {
                    self.decrypt_chain(input, &mut output[..cbc_size]);
                } else if cbc_size == 0 {
                    output[..residual].copy_from_slice(input);
                } else {
                    let head = cbc_size - AES_BLOCK_SIZE;
                    self.decrypt_chain(&input[..head], &mut output[..head]);

                    // Undo the CS2 swap. The stolen block decrypts to the
                    // zero-padded residual XOR the stolen-from ciphertext
                    // block, which lets us reconstruct both.
                    let mut d = [0u8; AES_BLOCK_SIZE];
                    d.copy_from_slice(&input[head..cbc_size]);
                    self.core.decrypt_block(&mut d);

                    let mut last_full = [0u8; AES_BLOCK_SIZE];
                    last_full[..residual].copy_from_slice(&input[cbc_size..]);
                    last_full[residual..].copy_from_slice(&d[residual..]);

                    for j in 0..residual {
                        output[cbc_size + j] = d[j] ^ input[cbc_size + j];
                    }

                    let mut p = last_full;
                    self.core.decrypt_block(&mut p);
                    for j in 0..AES_BLOCK_SIZE {
                        output[head + j] = p[j] ^ self.chain[j];
                    }
                    self.chain = last_full;
                }
                Ok(input.len())
            }
        }
    }

    fn encrypt_chain(&mut self, input: &[u8], output: &mut [u8]) {
        for (inb, outb) in input
            .chunks_exact(AES_BLOCK_SIZE)
            .zip(output.chunks_exact_mut(AES_BLOCK_SIZE))
        {
            let mut block = [0u8; AES_BLOCK_SIZE];
            for j in 0..AES_BLOCK_SIZE {
                block[j] = inb[j] ^ self.chain[j];
            }
            self.core.encrypt_block(&mut block);
            outb.copy_from_slice(&block);
            self.chain = block;
        }
    }

    fn decrypt_chain(&mut self, input: &[u8], output: &mut [u8]) {
        for (inb, outb) in input
            .chunks_exact(AES_BLOCK_SIZE)
            .zip(output.chunks_exact_mut(AES_BLOCK_SIZE))
        {
            let mut block = [0u8; AES_BLOCK_SIZE];
            block.copy_from_slice(inb);
            self.core.decrypt_block(&mut block);
            for j in 0..AES_BLOCK_SIZE {
                outb[j] = block[j] ^ self.chain[j];
            }
            self.chain.copy_from_slice(inb);
        }
    }
}

fn check_iv(iv: &[u8]) -> Result<[u8; AES_BLOCK_SIZE]> {
    if iv.len() != AES_BLOCK_SIZE {
        return Err(CryptError::InvalidIvLength {
            expected: AES_BLOCK_SIZE,
            actual: iv.len(),
        });
    }

    let mut out = [0u8; AES_BLOCK_SIZE];
    out.copy_from_slice(iv);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = [0x11; 16];
    const IV: [u8; 16] = [0x22; 16];

    fn encryptor(padding: CbcPadding) -> CbcCryptor {
        CbcCryptor::new(&KEY, &IV, padding, CryptDirection::Encrypt).unwrap()
    }

    fn decryptor(padding: CbcPadding) -> CbcCryptor {
        CbcCryptor::new(&KEY, &IV, padding, CryptDirection::Decrypt).unwrap()
    }

    #[test]
    fn test_none_roundtrip_keeps_tail_clear() {
        let plain: Vec<u8> = (0..40u8).collect();

        let cipher = encryptor(CbcPadding::None).crypt_to_vec(&plain).unwrap();
        assert_eq!(cipher.len(), plain.len());
        assert_eq!(&cipher[32..], &plain[32..]);

        let out = decryptor(CbcPadding::None).crypt_to_vec(&cipher).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn test_pkcs5_grows_and_roundtrips() {
        for len in [0usize, 1, 15, 16, 17, 35, 48] {
            let plain: Vec<u8> = (0..len).map(|i| i as u8).collect();

            let cipher = encryptor(CbcPadding::Pkcs5).crypt_to_vec(&plain).unwrap();
            assert_eq!(cipher.len(), (len / 16 + 1) * 16);

            let out = decryptor(CbcPadding::Pkcs5).crypt_to_vec(&cipher).unwrap();
            assert_eq!(out, plain);
        }
    }

    #[test]
    fn test_pkcs5_rejects_corrupt_padding() {
        let mut cipher = encryptor(CbcPadding::Pkcs5).crypt_to_vec(&[7u8; 20]).unwrap();
        let last = cipher.len() - 1;
        cipher[last] ^= 0xff;

        assert!(matches!(
            decryptor(CbcPadding::Pkcs5).crypt_to_vec(&cipher),
            Err(CryptError::InvalidPadding(_))
        ));
    }

    #[test]
    fn test_cts_preserves_length_and_roundtrips() {
        for len in [16usize, 17, 31, 32, 33, 47, 48, 100] {
            let plain: Vec<u8> = (0..len).map(|i| (i * 3) as u8).collect();

            let cipher = encryptor(CbcPadding::CiphertextStealing)
                .crypt_to_vec(&plain)
                .unwrap();
            assert_eq!(cipher.len(), len);

            let out = decryptor(CbcPadding::CiphertextStealing)
                .crypt_to_vec(&cipher)
                .unwrap();
            assert_eq!(out, plain);
        }
    }

    #[test]
    fn test_cts_aligned_matches_plain_cbc() {
        let plain: Vec<u8> = (0..64u8).collect();

        let cbc = encryptor(CbcPadding::None).crypt_to_vec(&plain).unwrap();
        let cts = encryptor(CbcPadding::CiphertextStealing)
            .crypt_to_vec(&plain)
            .unwrap();

        assert_eq!(cts, cbc);
    }

    #[test]
    fn test_cts_swaps_last_two_blocks() {
        // CS2 output is the naive CBC of the zero-padded input with the last
        // two ciphertext blocks swapped and the tail truncated.
        let plain: Vec<u8> = (0..24u8).collect();
        let mut padded = plain.clone();
        padded.resize(32, 0);

        let naive = encryptor(CbcPadding::None).crypt_to_vec(&padded).unwrap();
        let cts = encryptor(CbcPadding::CiphertextStealing)
            .crypt_to_vec(&plain)
            .unwrap();

        assert_eq!(&cts[..16], &naive[16..32]);
        assert_eq!(&cts[16..24], &naive[..8]);
    }

    #[test]
    fn test_cts_short_input_left_clear() {
        let plain = [9u8; 10];
        let cipher = encryptor(CbcPadding::CiphertextStealing)
            .crypt_to_vec(&plain)
            .unwrap();
        assert_eq!(cipher, plain);
    }

    #[test]
    fn test_chain_carries_across_calls() {
        let plain: Vec<u8> = (0..64u8).collect();

        let whole = encryptor(CbcPadding::None).crypt_to_vec(&plain).unwrap();

        let mut split = encryptor(CbcPadding::None);
        let mut head = split.crypt_to_vec(&plain[..32]).unwrap();
        let tail = split.crypt_to_vec(&plain[32..]).unwrap();
        head.extend_from_slice(&tail);

        assert_eq!(head, whole);
    }

    #[test]
    fn test_rejects_bad_iv() {
        assert!(matches!(
            CbcCryptor::new(&KEY, &[0u8; 8], CbcPadding::None, CryptDirection::Encrypt),
            Err(CryptError::InvalidIvLength { expected: 16, actual: 8 })
        ));
    }

    #[test]
    fn test_output_buffer_checked() {
        let mut enc = encryptor(CbcPadding::Pkcs5);
        let mut out = [0u8; 16];
        assert!(matches!(
            enc.crypt(&[0u8; 20], &mut out),
            Err(CryptError::BufferTooSmall { needed: 32, actual: 16 })
        ));
    }
}
