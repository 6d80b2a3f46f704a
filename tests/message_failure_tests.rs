use std::sync::Arc;

use anyhow::Result;
use base64::engine::general_purpose;
use base64::Engine as _;
use encyphrix::cryptography::kdf::KdfParams;
use encyphrix::cryptography::rng::SystemRng;
use encyphrix::error::CoreError;
use encyphrix::message::crypto::{EncryptOptions, MessageCrypto};

fn crypto() -> MessageCrypto {
    let kdf = KdfParams::new(1, 8 * 1024 * 1024).expect("valid test params");
    MessageCrypto::new(kdf, 256, Arc::new(SystemRng))
}

#[test]
fn wrong_password_fails() -> Result<()> {
    let c = crypto();
    let blob = c.encrypt("top secret", "correct horse", &EncryptOptions::default())?;
    let res = c.decrypt(&blob, "battery staple");
    assert_eq!(res.unwrap_err(), CoreError::DecryptFailed);
    Ok(())
}

#[test]
fn empty_password_rejected_on_encrypt() {
    let c = crypto();
    let res = c.encrypt("data", "", &EncryptOptions::default());
    assert!(matches!(res, Err(CoreError::InvalidInput(_))));
}

#[test]
fn garbage_transport_fails_as_decrypt_failed() {
    let c = crypto();
    assert_eq!(
        c.decrypt("!!! not base64 !!!", "pw").unwrap_err(),
        CoreError::DecryptFailed
    );
    assert_eq!(c.decrypt("", "pw").unwrap_err(), CoreError::DecryptFailed);
    let valid_b64_garbage = general_purpose::STANDARD.encode(b"ECYPx not a real envelope");
    assert_eq!(
        c.decrypt(&valid_b64_garbage, "pw").unwrap_err(),
        CoreError::DecryptFailed
    );
}

#[test]
fn every_single_byte_flip_is_rejected() -> Result<()> {
    // Property: no bit flip anywhere in the blob may decrypt
    // successfully; header flips break parsing or the AAD binding,
    // body flips break the tag.
    let c = crypto();
    let blob = c.encrypt("hi", "pw", &EncryptOptions::default())?;
    let bytes = general_purpose::STANDARD.decode(&blob)?;
    for i in 0..bytes.len() {
        let mut tampered = bytes.clone();
        tampered[i] ^= 0x01;
        let reencoded = general_purpose::STANDARD.encode(&tampered);
        let res = c.decrypt(&reencoded, "pw");
        assert_eq!(
            res.unwrap_err(),
            CoreError::DecryptFailed,
            "flip at byte {i} must not decrypt"
        );
    }
    Ok(())
}

#[test]
fn truncated_blob_fails() -> Result<()> {
    let c = crypto();
    let blob = c.encrypt("truncate me", "pw", &EncryptOptions::default())?;
    let bytes = general_purpose::STANDARD.decode(&blob)?;
    for keep in [0, 5, 18, 19, bytes.len() - 1] {
        let reencoded = general_purpose::STANDARD.encode(&bytes[..keep]);
        assert_eq!(
            c.decrypt(&reencoded, "pw").unwrap_err(),
            CoreError::DecryptFailed,
            "prefix of {keep} bytes must not decrypt"
        );
    }
    Ok(())
}

#[test]
fn appended_byte_fails() -> Result<()> {
    let c = crypto();
    let blob = c.encrypt("strict", "pw", &EncryptOptions::default())?;
    let mut bytes = general_purpose::STANDARD.decode(&blob)?;
    bytes.push(0x00);
    let reencoded = general_purpose::STANDARD.encode(&bytes);
    assert_eq!(
        c.decrypt(&reencoded, "pw").unwrap_err(),
        CoreError::DecryptFailed
    );
    Ok(())
}

#[test]
fn reserved_flag_bits_parse_but_break_authentication() -> Result<()> {
    // The parser ignores unknown flag bits; the AAD still covers the
    // flags byte, so flipping one can never yield plaintext.
    let c = crypto();
    let blob = c.encrypt("flagged", "pw", &EncryptOptions::default())?;
    let mut bytes = general_purpose::STANDARD.decode(&blob)?;
    bytes[5] |= 0x10;
    let reencoded = general_purpose::STANDARD.encode(&bytes);
    assert!(!c.check_self_destruct(&reencoded)?);
    assert_eq!(
        c.decrypt(&reencoded, "pw").unwrap_err(),
        CoreError::DecryptFailed
    );
    Ok(())
}

#[test]
fn weaker_embedded_params_are_honored_on_decode() -> Result<()> {
    // Encode under the weak test preset, decode with a crypto whose
    // own preset is stronger; the embedded params win.
    let weak = crypto();
    let blob = weak.encrypt("old blob", "pw", &EncryptOptions::default())?;
    let strong = MessageCrypto::default();
    assert_eq!(strong.decrypt(&blob, "pw")?.plaintext, "old blob");
    Ok(())
}
