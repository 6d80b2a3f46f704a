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
fn flag_round_trips_when_set() -> Result<()> {
    let c = crypto();
    let options = EncryptOptions {
        self_destruct: true,
        ..EncryptOptions::default()
    };
    let blob = c.encrypt("burn", "pw", &options)?;
    assert!(c.check_self_destruct(&blob)?);
    let out = c.decrypt(&blob, "pw")?;
    assert_eq!(out.plaintext, "burn");
    assert!(out.self_destruct);
    Ok(())
}

#[test]
fn flag_round_trips_when_clear() -> Result<()> {
    let c = crypto();
    let blob = c.encrypt("keep", "pw", &EncryptOptions::default())?;
    assert!(!c.check_self_destruct(&blob)?);
    assert!(!c.decrypt(&blob, "pw")?.self_destruct);
    Ok(())
}

#[test]
fn check_needs_no_password_and_no_decryption() -> Result<()> {
    let c = crypto();
    let options = EncryptOptions {
        self_destruct: true,
        ..EncryptOptions::default()
    };
    let blob = c.encrypt("burn", "pw", &options)?;
    // The check inspects the header only; no password anywhere.
    assert!(c.check_self_destruct(&blob)?);
    Ok(())
}

#[test]
fn check_rejects_garbage() {
    let c = crypto();
    assert_eq!(
        c.check_self_destruct("%%%").unwrap_err(),
        CoreError::MalformedCiphertext
    );
    let b64_garbage = general_purpose::STANDARD.encode(b"not an envelope at all");
    assert_eq!(
        c.check_self_destruct(&b64_garbage).unwrap_err(),
        CoreError::MalformedCiphertext
    );
}

#[test]
fn check_reports_unknown_version() -> Result<()> {
    let c = crypto();
    let blob = c.encrypt("v?", "pw", &EncryptOptions::default())?;
    let mut bytes = general_purpose::STANDARD.decode(&blob)?;
    bytes[4] = 9;
    let reencoded = general_purpose::STANDARD.encode(&bytes);
    assert_eq!(
        c.check_self_destruct(&reencoded).unwrap_err(),
        CoreError::UnsupportedVersion(9)
    );
    Ok(())
}

#[test]
fn check_works_with_stealth_noise_present() -> Result<()> {
    use encyphrix::message::crypto::StealthMode;
    let c = crypto();
    let options = EncryptOptions {
        self_destruct: true,
        stealth: StealthMode::Noise,
        ..EncryptOptions::default()
    };
    let blob = c.encrypt("burn", "pw", &options)?;
    assert!(c.check_self_destruct(&blob)?);
    Ok(())
}
