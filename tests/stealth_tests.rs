use std::sync::Arc;

use anyhow::Result;
use encyphrix::cryptography::kdf::KdfParams;
use encyphrix::cryptography::rng::SystemRng;
use encyphrix::message::crypto::{EncryptOptions, MessageCrypto, StealthMode};
use encyphrix::message::envelope::{from_transport, parse_prefix, NOISE_MAX, NOISE_MIN};

fn crypto() -> MessageCrypto {
    let kdf = KdfParams::new(1, 8 * 1024 * 1024).expect("valid test params");
    MessageCrypto::new(kdf, 256, Arc::new(SystemRng))
}

fn stealth_options(stealth: StealthMode) -> EncryptOptions {
    EncryptOptions {
        stealth,
        ..EncryptOptions::default()
    }
}

#[test]
fn every_stealth_mode_round_trips() -> Result<()> {
    let c = crypto();
    for mode in [
        StealthMode::None,
        StealthMode::Noise,
        StealthMode::Padding,
        StealthMode::Combined,
    ] {
        let blob = c.encrypt("covert", "pw", &stealth_options(mode))?;
        assert_eq!(
            c.decrypt(&blob, "pw")?.plaintext,
            "covert",
            "mode {mode:?} must round-trip"
        );
    }
    Ok(())
}

#[test]
fn noise_length_is_within_the_declared_range() -> Result<()> {
    let c = crypto();
    for _ in 0..8 {
        let blob = c.encrypt("noisy", "pw", &stealth_options(StealthMode::Noise))?;
        let bytes = from_transport(&blob)?;
        let (header, off) = parse_prefix(&bytes)?;
        assert!(header.stealth_noise());
        // First record starts after the 19-byte header plus the 2-byte
        // noise length field plus the noise itself.
        let noise_len = off - 19 - 2;
        assert!(
            (usize::from(NOISE_MIN)..=usize::from(NOISE_MAX)).contains(&noise_len),
            "noise length {noise_len} out of range"
        );
    }
    Ok(())
}

#[test]
fn padded_blob_size_is_a_multiple_of_the_block() -> Result<()> {
    let c = crypto();
    for len in [0usize, 1, 2, 5, 17, 40, 100, 300] {
        let plaintext = "p".repeat(len);
        let blob = c.encrypt(&plaintext, "pw", &stealth_options(StealthMode::Padding))?;
        let bytes = from_transport(&blob)?;
        assert_eq!(
            bytes.len() % 256,
            0,
            "padded blob for {len}-byte plaintext must land on a block boundary"
        );
    }
    Ok(())
}

#[test]
fn combined_mode_sets_both_bits_and_rounds_up() -> Result<()> {
    let c = crypto();
    let blob = c.encrypt("both", "pw", &stealth_options(StealthMode::Combined))?;
    let bytes = from_transport(&blob)?;
    let (header, _off) = parse_prefix(&bytes)?;
    assert!(header.stealth_noise());
    assert!(header.stealth_padding());
    assert_eq!(bytes.len() % 256, 0);
    Ok(())
}

#[test]
fn plain_mode_sets_no_stealth_bits() -> Result<()> {
    let c = crypto();
    let blob = c.encrypt("plain", "pw", &stealth_options(StealthMode::None))?;
    let bytes = from_transport(&blob)?;
    let (header, off) = parse_prefix(&bytes)?;
    assert!(!header.stealth_noise());
    assert!(!header.stealth_padding());
    assert_eq!(off, 19);
    Ok(())
}

#[test]
fn custom_pad_block_is_honored() -> Result<()> {
    let kdf = KdfParams::new(1, 8 * 1024 * 1024)?;
    let c = MessageCrypto::new(kdf, 512, Arc::new(SystemRng));
    let blob = c.encrypt("wide blocks", "pw", &stealth_options(StealthMode::Padding))?;
    let bytes = from_transport(&blob)?;
    assert_eq!(bytes.len() % 512, 0);
    assert_eq!(c.decrypt(&blob, "pw")?.plaintext, "wide blocks");
    Ok(())
}

#[test]
fn max_length_padding_round_trips() -> Result<()> {
    // Sweep plaintext lengths so some encode lands exactly one byte
    // past a block boundary, forcing a near-block-length pad.
    let c = crypto();
    for len in 180..200usize {
        let plaintext = "q".repeat(len);
        let blob = c.encrypt(&plaintext, "pw", &stealth_options(StealthMode::Padding))?;
        assert_eq!(c.decrypt(&blob, "pw")?.plaintext, plaintext);
    }
    Ok(())
}
