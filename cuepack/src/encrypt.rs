//! Sample encryption stage.
//!
//! Sits after the chunking handler and transforms each sample's payload
//! with the configured protection scheme, attaching the key id, IV and
//! subsample map the downstream writer needs to signal.

use std::sync::Arc;

use cuepack_crypto::{
    CbcCryptor, CbcPadding, CryptDirection, Cryptor, CtrCryptor, IvPolicy, PatternCryptor,
    PatternPolicy, SampleCrypter, SampleCryptor,
};
use log::info;

use crate::{
    error::Result,
    handler::MediaSink,
    key_source::EncryptionKeyMaterial,
    stream::{CryptInfo, CueEvent, MediaSample, SegmentInfo, StreamInfo},
};

/// Common-encryption protection scheme, named by its fourcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionScheme {
    /// Full-sample AES-CTR.
    Cenc,
    /// Pattern AES-CTR.
    Cens,
    /// Full-sample AES-CBC.
    Cbc1,
    /// Pattern AES-CBC with a constant IV.
    Cbcs,
}

impl ProtectionScheme {
    pub fn from_fourcc(fourcc: &str) -> Option<Self> {
        match fourcc {
            "cenc" => Some(Self::Cenc),
            "cens" => Some(Self::Cens),
            "cbc1" => Some(Self::Cbc1),
            "cbcs" => Some(Self::Cbcs),
            _ => None,
        }
    }

    pub fn fourcc(&self) -> &'static str {
        match self {
            Self::Cenc => "cenc",
            Self::Cens => "cens",
            Self::Cbc1 => "cbc1",
            Self::Cbcs => "cbcs",
        }
    }

    /// Pattern schemes reuse one constant IV for every sample; the others
    /// advance the IV per sample.
    fn uses_constant_iv(&self) -> bool {
        matches!(self, Self::Cbcs)
    }

    fn is_pattern(&self) -> bool {
        matches!(self, Self::Cens | Self::Cbcs)
    }
}

/// Default 'crypt:skip' pattern for the pattern schemes, chosen so roughly
/// a tenth of each sample is encrypted.
const DEFAULT_CRYPT_BYTE_BLOCK: u8 = 1;
const DEFAULT_SKIP_BYTE_BLOCK: u8 = 9;

/// Encrypts every sample payload before forwarding it downstream.
pub struct EncryptingSink<S: MediaSink> {
    downstream: S,
    scheme: ProtectionScheme,
    key_id: [u8; 16],
    crypter: SampleCrypter,
    current_iv: Vec<u8>,
}

impl<S: MediaSink> EncryptingSink<S> {
    pub fn new(
        scheme: ProtectionScheme,
        material: &EncryptionKeyMaterial,
        downstream: S,
    ) -> Result<Self> {
        let cryptor = build_cryptor(scheme, &material.key, &material.iv)?;

        Ok(Self {
            downstream,
            scheme,
            key_id: material.key_id,
            crypter: SampleCrypter::new(cryptor),
            current_iv: material.iv.clone(),
        })
    }

    /// Advance the per-sample IV: the IV bytes are one big-endian integer,
    /// incremented by one with wrap-around.
    fn increment_iv(&mut self) {
        for byte in self.current_iv.iter_mut().rev() {
            let (next, overflow) = byte.overflowing_add(1);
            *byte = next;
            if !overflow {
                break;
            }
        }
    }
}

impl<S: MediaSink> MediaSink for EncryptingSink<S> {
    fn on_stream_info(&mut self, info: &StreamInfo) -> Result<()> {
        info!(
            "stream {}: encrypting with scheme '{}'",
            info.index,
            self.scheme.fourcc()
        );
        self.downstream.on_stream_info(info)
    }

    fn on_sample(&mut self, sample: Arc<MediaSample>) -> Result<()> {
        let subsamples = sample
            .crypt_info
            .as_ref()
            .map(|c| c.subsamples.clone())
            .unwrap_or_default();

        let data = self
            .crypter
            .crypt_sample(&sample.data, &self.current_iv, &subsamples)?;

        let mut encrypted = MediaSample::new(
            data,
            sample.pts,
            sample.dts,
            sample.duration,
            sample.is_key_frame,
        );
        encrypted.crypt_info = Some(CryptInfo {
            key_id: self.key_id,
            iv: self.current_iv.clone(),
            subsamples,
        });

        if !self.scheme.uses_constant_iv() {
            self.increment_iv();
        }

        self.downstream.on_sample(Arc::new(encrypted))
    }

    fn on_cue(&mut self, cue: Arc<CueEvent>) -> Result<()> {
        self.downstream.on_cue(cue)
    }

    fn on_segment(&mut self, segment: SegmentInfo) -> Result<()> {
        self.downstream.on_segment(segment)
    }

    fn on_flush(&mut self) -> Result<()> {
        self.downstream.on_flush()
    }
}

fn build_cryptor(scheme: ProtectionScheme, key: &[u8], iv: &[u8]) -> Result<SampleCryptor> {
    let cryptor = match scheme {
        ProtectionScheme::Cenc => SampleCryptor::Cenc(CtrCryptor::new(key, iv)?),
        ProtectionScheme::Cens => SampleCryptor::Cens(pattern_cryptor(
            Cryptor::Ctr(CtrCryptor::new(key, iv)?),
            IvPolicy::ChainAcrossCalls,
        )),
        ProtectionScheme::Cbc1 => SampleCryptor::Cbc1(CbcCryptor::new(
            key,
            iv,
            CbcPadding::None,
            CryptDirection::Encrypt,
        )?),
        ProtectionScheme::Cbcs => SampleCryptor::Cbcs(pattern_cryptor(
            Cryptor::Cbc(CbcCryptor::new(
                key,
                iv,
                CbcPadding::None,
                CryptDirection::Encrypt,
            )?),
            IvPolicy::UseConstantIv,
        )),
    };
    Ok(cryptor)
}

fn pattern_cryptor(inner: Cryptor, iv_policy: IvPolicy) -> PatternCryptor {
    PatternCryptor::new(
        inner,
        DEFAULT_CRYPT_BYTE_BLOCK,
        DEFAULT_SKIP_BYTE_BLOCK,
        PatternPolicy::EncryptIfRemaining,
        iv_policy,
    )
}
