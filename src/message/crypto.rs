use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::config::app_config::CoreConfig;
use crate::cryptography::kdf::KdfParams;
use crate::cryptography::rng::{Rng, SystemRng};
use crate::error::CoreError;
use crate::message::envelope::{
    self, EncodeRequest, Envelope, RecordInput, DEFAULT_PAD_BLOCK,
};

/// Which stealth bits an encrypt sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StealthMode {
    #[default]
    None,
    Noise,
    Padding,
    Combined,
}

impl StealthMode {
    fn bits(self) -> (bool, bool) {
        match self {
            StealthMode::None => (false, false),
            StealthMode::Noise => (true, false),
            StealthMode::Padding => (false, true),
            StealthMode::Combined => (true, true),
        }
    }
}

/// Closed option record for `encrypt`. An empty duress password is
/// treated as absent.
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    pub duress_password: Option<SecretString>,
    pub fake_plaintext: Option<String>,
    pub self_destruct: bool,
    pub stealth: StealthMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub plaintext: String,
    pub self_destruct: bool,
}

/// Message encryption over the envelope codec. Holds the KDF cost used
/// for new ciphertexts (decode always honors the embedded params) and
/// the stealth pad block size.
pub struct MessageCrypto {
    kdf: KdfParams,
    pad_block: u16,
    rng: Arc<dyn Rng>,
}

impl Default for MessageCrypto {
    fn default() -> Self {
        Self::new(KdfParams::default(), DEFAULT_PAD_BLOCK, Arc::new(SystemRng))
    }
}

impl MessageCrypto {
    pub fn new(kdf: KdfParams, pad_block: u16, rng: Arc<dyn Rng>) -> Self {
        Self {
            kdf,
            pad_block,
            rng,
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.kdf, config.pad_block, Arc::new(SystemRng))
    }

    /// Encrypt `plaintext` under `password`, returning the Base64 blob.
    pub fn encrypt(
        &self,
        plaintext: &str,
        password: &str,
        options: &EncryptOptions,
    ) -> Result<String, CoreError> {
        if password.is_empty() {
            return Err(CoreError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }
        let duress_password = options
            .duress_password
            .as_ref()
            .map(|p| p.expose_secret())
            .filter(|p| !p.is_empty());
        let duress = match (duress_password, options.fake_plaintext.as_deref()) {
            (None, None) => None,
            (Some(password), Some(fake)) => Some(RecordInput {
                password,
                plaintext: fake.as_bytes(),
            }),
            (Some(_), None) => {
                return Err(CoreError::InvalidInput(
                    "fake plaintext is required with a duress password".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(CoreError::InvalidInput(
                    "fake plaintext without a duress password".to_string(),
                ))
            }
        };

        let (noise, padding) = options.stealth.bits();
        let request = EncodeRequest {
            kdf: self.kdf,
            self_destruct: options.self_destruct,
            noise,
            padding,
            pad_block: self.pad_block,
            primary: RecordInput {
                password,
                plaintext: plaintext.as_bytes(),
            },
            duress,
        };
        let bytes = envelope::encode(self.rng.as_ref(), &request)?;
        Ok(envelope::to_transport(&bytes))
    }

    /// Decrypt a Base64 blob. Any failure — bad transport, malformed
    /// header, wrong password, tag mismatch — is reported as the one
    /// `DecryptFailed` kind.
    pub fn decrypt(&self, blob: &str, password: &str) -> Result<Decrypted, CoreError> {
        match decrypt_inner(blob, password) {
            Ok(decrypted) => Ok(decrypted),
            Err(e) => {
                debug!(reason = %e, "message decrypt failed");
                Err(CoreError::DecryptFailed)
            }
        }
    }

    /// Read the self-destruct flag without attempting decryption.
    pub fn check_self_destruct(&self, blob: &str) -> Result<bool, CoreError> {
        let bytes =
            envelope::from_transport(blob).map_err(|_| CoreError::MalformedCiphertext)?;
        let (header, _off) = envelope::parse_prefix(&bytes).map_err(|e| match e {
            envelope::EnvelopeError::UnsupportedVersion(v) => CoreError::UnsupportedVersion(v),
            _ => CoreError::MalformedCiphertext,
        })?;
        Ok(header.self_destruct())
    }
}

fn decrypt_inner(blob: &str, password: &str) -> Result<Decrypted, envelope::EnvelopeError> {
    let bytes = envelope::from_transport(blob)?;
    let parsed = Envelope::parse(&bytes)?;
    let opened = parsed.open_with_password(password)?;
    let plaintext =
        String::from_utf8(opened.plaintext).map_err(|_| envelope::EnvelopeError::DecryptFailed)?;
    Ok(Decrypted {
        plaintext,
        self_destruct: opened.self_destruct,
    })
}

// ===== Off-thread wrappers (Argon2id is the only blocking step) =====

pub async fn encrypt_async(
    crypto: Arc<MessageCrypto>,
    plaintext: String,
    password: SecretString,
    options: EncryptOptions,
) -> Result<String, CoreError> {
    spawn_blocking(move || crypto.encrypt(&plaintext, password.expose_secret(), &options))
        .await
        .map_err(|_| CoreError::Cancelled)?
}

pub async fn decrypt_async(
    crypto: Arc<MessageCrypto>,
    blob: String,
    password: SecretString,
) -> Result<Decrypted, CoreError> {
    spawn_blocking(move || crypto.decrypt(&blob, password.expose_secret()))
        .await
        .map_err(|_| CoreError::Cancelled)?
}

pub async fn check_self_destruct_async(
    crypto: Arc<MessageCrypto>,
    blob: String,
) -> Result<bool, CoreError> {
    spawn_blocking(move || crypto.check_self_destruct(&blob))
        .await
        .map_err(|_| CoreError::Cancelled)?
}
