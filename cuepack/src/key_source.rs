//! Key material lookup.
//!
//! Cryptors never talk to a key source directly; the encryption stage
//! looks material up once per stream and hands it to the cryptor.

use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// Everything needed to start encrypting one stream.
#[derive(Debug, Clone)]
pub struct EncryptionKeyMaterial {
    pub key_id: [u8; 16],
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Provider of per-key-id encryption material, e.g. a DRM service proxy or
/// a fixed set of raw keys.
pub trait KeySource {
    fn get_key(&self, key_id: &[u8; 16]) -> Result<EncryptionKeyMaterial>;
}

/// Key source backed by caller-supplied raw keys, keyed by key id.
#[derive(Debug, Default)]
pub struct RawKeySource {
    keys: HashMap<[u8; 16], EncryptionKeyMaterial>,
}

impl RawKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, material: EncryptionKeyMaterial) {
        self.keys.insert(material.key_id, material);
    }

    /// Add a key from `kid:key:iv` hex strings, the format keys are usually
    /// exchanged in.
    pub fn add_hex_key(&mut self, kid: &str, key: &str, iv: &str) -> Result<()> {
        let material = EncryptionKeyMaterial {
            key_id: decode_kid(kid)?,
            key: hex::decode(key)?,
            iv: hex::decode(iv)?,
        };
        self.add_key(material);
        Ok(())
    }
}

impl KeySource for RawKeySource {
    fn get_key(&self, key_id: &[u8; 16]) -> Result<EncryptionKeyMaterial> {
        self.keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| PipelineError::KeyNotFound(hex::encode(key_id)))
    }
}

/// Decode a hex key id, tolerating the dashed UUID form.
pub fn decode_kid(kid: &str) -> Result<[u8; 16]> {
    let bytes = hex::decode(kid.replace('-', ""))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| PipelineError::HexWrongLength {
            expected: 16,
            actual: len,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_round_trip() {
        let mut source = RawKeySource::new();
        source
            .add_hex_key(
                "eb676abbcb345e96bbcf616630f1a3da",
                "100b6c20940f779a4589152b57d2dacb",
                "f0f1f2f3f4f5f6f7",
            )
            .unwrap();

        let kid = decode_kid("eb676abbcb345e96bbcf616630f1a3da").unwrap();
        let material = source.get_key(&kid).unwrap();
        assert_eq!(material.key.len(), 16);
        assert_eq!(material.iv.len(), 8);
    }

    #[test]
    fn test_dashed_kid_accepted() {
        let dashed = decode_kid("eb676abb-cb34-5e96-bbcf-616630f1a3da").unwrap();
        let plain = decode_kid("eb676abbcb345e96bbcf616630f1a3da").unwrap();
        assert_eq!(dashed, plain);
    }

    #[test]
    fn test_unknown_kid_fails() {
        let source = RawKeySource::new();
        let err = source.get_key(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, PipelineError::KeyNotFound(_)));
    }

    #[test]
    fn test_bad_hex_reported() {
        let mut source = RawKeySource::new();
        let err = source
            .add_hex_key("zz", "100b6c20940f779a4589152b57d2dacb", "f0f1f2f3")
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidHex(_)));

        let err = decode_kid("eb676abbcb34").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::HexWrongLength { expected: 16, actual: 6 }
        ));
    }
}
