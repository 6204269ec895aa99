//! Known-answer tests against the NIST SP 800-38A example vectors.

use cuepack_crypto::{
    BlockCipherCore, CbcCryptor, CbcPadding, CryptDirection, CtrCryptor,
};

const KEY_128: &str = "2b7e151628aed2a6abf7158809cf4f3c";
const KEY_192: &str = "8e73b0f7da0e6452c810f32b809079e562f8ead2522c6b7b";
const KEY_256: &str = "603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4";

// Four plaintext blocks shared by every SP 800-38A example.
const PLAINTEXT: &str = "6bc1bee22e409f96e93d7e117393172a\
                         ae2d8a571e03ac9c9eb76fac45af8e51\
                         30c81c46a35ce411e5fbc1191a0a52ef\
                         f69f2445df4f9b17ad2b417be66c3710";

const CBC_IV: &str = "000102030405060708090a0b0c0d0e0f";
const CTR_IV: &str = "f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff";

fn unhex(s: &str) -> Vec<u8> {
    hex::decode(s.replace(char::is_whitespace, "")).unwrap()
}

#[test]
fn ecb_single_block_vectors() {
    // (key, first ciphertext block of ECB mode)
    let cases = [
        (KEY_128, "3ad77bb40d7a3660a89ecaf32466ef97"),
        (KEY_192, "bd334f1d6e45f25ff712a214571fa5cc"),
        (KEY_256, "f3eed1bdb5d2a03c064b5a7e3db181f8"),
    ];

    for (key, expected) in cases {
        let core = BlockCipherCore::new(&unhex(key)).unwrap();

        let mut block = [0u8; 16];
        block.copy_from_slice(&unhex(PLAINTEXT)[..16]);
        core.encrypt_block(&mut block);
        assert_eq!(hex::encode(block), expected);

        core.decrypt_block(&mut block);
        assert_eq!(&block[..], &unhex(PLAINTEXT)[..16]);
    }
}

#[test]
fn ctr_aes128_vector() {
    // SP 800-38A F.5.1, four blocks.
    let expected = unhex(
        "874d6191b620e3261bef6864990db6ce\
         9806f66b7970fdff8617187bb9fffdff\
         5ae4df3edbd5d35e5b4f09020db03eab\
         1e031dda2fbe03d1792170a0f3009cee",
    );

    let mut cryptor = CtrCryptor::new(&unhex(KEY_128), &unhex(CTR_IV)).unwrap();
    let cipher = cryptor.crypt_to_vec(&unhex(PLAINTEXT)).unwrap();
    assert_eq!(cipher, expected);

    let mut cryptor = CtrCryptor::new(&unhex(KEY_128), &unhex(CTR_IV)).unwrap();
    assert_eq!(cryptor.crypt_to_vec(&cipher).unwrap(), unhex(PLAINTEXT));
}

#[test]
fn ctr_aes256_vector() {
    // SP 800-38A F.5.5, first block.
    let mut cryptor = CtrCryptor::new(&unhex(KEY_256), &unhex(CTR_IV)).unwrap();
    let cipher = cryptor.crypt_to_vec(&unhex(PLAINTEXT)[..16]).unwrap();
    assert_eq!(hex::encode(cipher), "601ec313775789a5b7a7f504bbf3d228");
}

#[test]
fn cbc_aes128_vector() {
    // SP 800-38A F.2.1, four blocks.
    let expected = unhex(
        "7649abac8119b246cee98e9b12e9197d\
         5086cb9b507219ee95db113a917678b2\
         73bed6b8e3c1743b7116e69e22229516\
         3ff1caa1681fac09120eca307586e1a7",
    );

    let mut enc = CbcCryptor::new(
        &unhex(KEY_128),
        &unhex(CBC_IV),
        CbcPadding::None,
        CryptDirection::Encrypt,
    )
    .unwrap();
    let cipher = enc.crypt_to_vec(&unhex(PLAINTEXT)).unwrap();
    assert_eq!(cipher, expected);

    let mut dec = CbcCryptor::new(
        &unhex(KEY_128),
        &unhex(CBC_IV),
        CbcPadding::None,
        CryptDirection::Decrypt,
    )
    .unwrap();
    assert_eq!(dec.crypt_to_vec(&cipher).unwrap(), unhex(PLAINTEXT));
}

#[test]
fn cts_aligned_input_matches_cbc_vector() {
    // With no residual, CS2 degenerates to plain CBC, so the NIST CBC
    // vector applies unchanged.
    let expected = unhex(
        "7649abac8119b246cee98e9b12e9197d\
         5086cb9b507219ee95db113a917678b2",
    );

    let mut enc = CbcCryptor::new(
        &unhex(KEY_128),
        &unhex(CBC_IV),
        CbcPadding::CiphertextStealing,
        CryptDirection::Encrypt,
    )
    .unwrap();
    assert_eq!(enc.crypt_to_vec(&unhex(PLAINTEXT)[..32]).unwrap(), expected);
}

#[test]
fn pkcs5_of_35_byte_payload() {
    // A 35 byte payload must produce exactly 48 bytes of ciphertext whose
    // aligned prefix matches the un-padded CBC vector, and decrypt back to
    // the original 35 bytes.
    let plain = &unhex(PLAINTEXT)[..35];

    let mut enc = CbcCryptor::new(
        &unhex(KEY_128),
        &unhex(CBC_IV),
        CbcPadding::Pkcs5,
        CryptDirection::Encrypt,
    )
    .unwrap();
    let cipher = enc.crypt_to_vec(plain).unwrap();

    assert_eq!(cipher.len(), 48);
    assert_eq!(
        hex::encode(&cipher[..32]),
        "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2"
    );

    let mut dec = CbcCryptor::new(
        &unhex(KEY_128),
        &unhex(CBC_IV),
        CbcPadding::Pkcs5,
        CryptDirection::Decrypt,
    )
    .unwrap();
    assert_eq!(dec.crypt_to_vec(&cipher).unwrap(), plain);
}

#[test]
fn ctr_counter_layout_is_big_endian_low_half() {
    // With an 8 byte IV the counter block is IV || 64-bit big-endian zero;
    // consuming one block must advance only the low half.
    let iv = unhex("0011223344556677");

    let mut with_short_iv = CtrCryptor::new(&unhex(KEY_128), &iv).unwrap();
    let out = with_short_iv.crypt_to_vec(&[0u8; 32]).unwrap();

    // Keystream block 2 equals encrypting IV || 1 directly.
    let core = BlockCipherCore::new(&unhex(KEY_128)).unwrap();
    let mut counter = [0u8; 16];
    counter[..8].copy_from_slice(&iv);
    counter[15] = 1;
    core.encrypt_block(&mut counter);

    assert_eq!(&out[16..], &counter[..]);
}
