//! Per-sample encryption honoring subsample clear/encrypted ranges.

use crate::{
    block::AES_BLOCK_SIZE,
    cbc::CbcCryptor,
    ctr::CtrCryptor,
    error::{CryptError, Result},
    pattern::PatternCryptor,
};

/// One subsample: a clear prefix followed by an encrypted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsampleEntry {
    pub clear_bytes: u16,
    pub cipher_bytes: u32,
}

impl SubsampleEntry {
    pub fn new(clear_bytes: u16, cipher_bytes: u32) -> Self {
        Self {
            clear_bytes,
            cipher_bytes,
        }
    }
}

/// Scheme-shaped cryptor for one stream. Direction (encrypt vs decrypt) is
/// decided by how the wrapped cryptors were constructed; CTR is symmetric.
pub enum SampleCryptor {
    /// 'cenc': full-sample AES-CTR.
    Cenc(CtrCryptor),
    /// 'cens': pattern AES-CTR.
    Cens(PatternCryptor),
    /// 'cbc1': full-sample AES-CBC, sub-block tail clear.
    Cbc1(CbcCryptor),
    /// 'cbcs': pattern AES-CBC with a constant IV.
    Cbcs(PatternCryptor),
}

impl SampleCryptor {
    fn set_iv(&mut self, iv: &[u8]) -> Result<()> {
        match self {
            SampleCryptor::Cenc(c) => c.set_iv(iv),
            SampleCryptor::Cens(c) => c.set_iv(iv),
            SampleCryptor::Cbc1(c) => c.set_iv(iv),
            SampleCryptor::Cbcs(c) => c.set_iv(iv),
        }
    }

    fn crypt(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        match self {
            SampleCryptor::Cenc(c) => c.crypt(input, output),
            SampleCryptor::Cens(c) => c.crypt(input, output),
            SampleCryptor::Cbc1(c) => c.crypt(input, output),
            SampleCryptor::Cbcs(c) => c.crypt(input, output),
        }
    }

    fn is_cbc_mode(&self) -> bool {
        matches!(self, SampleCryptor::Cbc1(_) | SampleCryptor::Cbcs(_))
    }
}

/// Applies a [`SampleCryptor`] to whole sample payloads.
///
/// With subsamples, each clear run is copied and each encrypted run is fed
/// to the cryptor; CTR keystream state continues across the runs of one
/// sample while the 'cbcs' pattern restarts per run, both as common
/// encryption specifies. Without subsamples, CBC modes transform only the
/// block-aligned prefix and CTR transforms every byte.
pub struct SampleCrypter {
    cryptor: SampleCryptor,
}

impl SampleCrypter {
    pub fn new(cryptor: SampleCryptor) -> Self {
        Self { cryptor }
    }

    /// Transform one sample payload, returning a buffer of the same size.
    pub fn crypt_sample(
        &mut self,
        data_in: &[u8],
        iv: &[u8],
        subsamples: &[SubsampleEntry],
    ) -> Result<Vec<u8>> {
        let mut data_out = vec![0u8; data_in.len()];
        self.cryptor.set_iv(iv)?;

        if subsamples.is_empty() {
            if self.cryptor.is_cbc_mode() {
                self.crypt_full_blocks(data_in, &mut data_out)?;
            } else {
                self.cryptor.crypt(data_in, &mut data_out)?;
            }
            return Ok(data_out);
        }

        let mapped: usize = subsamples
            .iter()
            .map(|e| e.clear_bytes as usize + e.cipher_bytes as usize)
            .sum();
        if mapped > data_in.len() {
            return Err(CryptError::SubsampleOutOfBounds {
                needed: mapped,
                actual: data_in.len(),
            });
        }

        let mut offset = 0usize;
        for entry in subsamples {
            let clear = entry.clear_bytes as usize;
            let encrypted = entry.cipher_bytes as usize;

            if clear > 0 {
                data_out[offset..offset + clear]
                    .copy_from_slice(&data_in[offset..offset + clear]);
            }

            if encrypted > 0 {
                let start = offset + clear;
                self.cryptor
                    .crypt(&data_in[start..start + encrypted], &mut data_out[start..start + encrypted])?;
            }

            offset += clear + encrypted;
        }

        // Bytes not covered by the subsample map stay clear.
        if offset < data_in.len() {
            data_out[offset..].copy_from_slice(&data_in[offset..]);
        }

        Ok(data_out)
    }

    fn crypt_full_blocks(&mut self, data_in: &[u8], data_out: &mut [u8]) -> Result<()> {
        let aligned = (data_in.len() / AES_BLOCK_SIZE) * AES_BLOCK_SIZE;

        if aligned > 0 {
            self.cryptor
                .crypt(&data_in[..aligned], &mut data_out[..aligned])?;
        }
        if aligned < data_in.len() {
            data_out[aligned..].copy_from_slice(&data_in[aligned..]);
        }

        Ok(())
    }
}
