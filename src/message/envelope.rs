use base64::engine::{general_purpose, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{alphabet, Engine as _};
use thiserror::Error;

use crate::cryptography::cipher;
use crate::cryptography::cipher::NONCE_LEN;
use crate::cryptography::kdf::{derive_key, KdfError, KdfParams, SALT_LEN};
use crate::cryptography::rng::{uniform_in, Rng};

// Envelope layout (little-endian):
// magic: 4 bytes = b"ECYP"
// version: u8 = 2
// flags: u8 (reserved bits zero on encode, ignored on decode)
// alg_id: u8 (2 = Argon2id v1.3; other values unsupported)
// opslimit: u32
// memlimit: u64 (bytes)
// [noise_len: u16 + noise bytes]        iff stealth_noise
// 1..2 records: salt[16] nonce[12] len u32 data[len]   (real, then duress)
// [pad_len: u16 + pad bytes]            iff stealth_padding
//
// The AAD for every record is the 6-byte prefix (magic + version + flags).
pub const MAGIC: &[u8; 4] = b"ECYP";
pub const VERSION: u8 = 2;

pub const FLAG_HAS_DURESS: u8 = 0x01;
pub const FLAG_SELF_DESTRUCT: u8 = 0x02;
pub const FLAG_STEALTH_NOISE: u8 = 0x04;
pub const FLAG_STEALTH_PADDING: u8 = 0x08;

pub const AAD_PREFIX_LEN: usize = 6;
const HEADER_LEN: usize = AAD_PREFIX_LEN + 1 + 4 + 8;
const RECORD_MIN_LEN: usize = SALT_LEN + NONCE_LEN + 4;

/// Encode-side noise length range.
pub const NOISE_MIN: u16 = 8;
pub const NOISE_MAX: u16 = 256;
/// Decode-side allocation bounds for the two stealth fields.
pub const NOISE_DECODE_LIMIT: u16 = 4096;
pub const PAD_DECODE_LIMIT: u16 = 4096;
/// Padding rounds the blob up to the next multiple of this block size.
pub const DEFAULT_PAD_BLOCK: u16 = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("malformed header")]
    MalformedHeader,
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("truncated body")]
    TruncatedBody,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("duress password must differ from the primary password")]
    DuressEqualsPrimary,
    #[error(transparent)]
    Kdf(#[from] KdfError),
    #[error("payload too large to seal")]
    Oversize,
    #[error("randomness unavailable")]
    Random,
}

#[derive(Debug, Clone)]
pub struct Header {
    pub flags: u8,
    pub kdf: KdfParams,
}

impl Header {
    pub fn has_duress(&self) -> bool {
        self.flags & FLAG_HAS_DURESS != 0
    }

    pub fn self_destruct(&self) -> bool {
        self.flags & FLAG_SELF_DESTRUCT != 0
    }

    pub fn stealth_noise(&self) -> bool {
        self.flags & FLAG_STEALTH_NOISE != 0
    }

    pub fn stealth_padding(&self) -> bool {
        self.flags & FLAG_STEALTH_PADDING != 0
    }

    fn aad(&self) -> [u8; AAD_PREFIX_LEN] {
        let mut aad = [0u8; AAD_PREFIX_LEN];
        aad[..4].copy_from_slice(MAGIC);
        aad[4] = VERSION;
        aad[5] = self.flags;
        aad
    }
}

/// One (salt, nonce, ciphertext+tag) tuple; either the real or the
/// duress copy.
#[derive(Debug, Clone)]
pub struct Record {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    pub header: Header,
    pub records: Vec<Record>,
}

#[derive(Debug)]
pub struct Opened {
    pub plaintext: Vec<u8>,
    pub self_destruct: bool,
    pub duress: bool,
}

pub struct RecordInput<'a> {
    pub password: &'a str,
    pub plaintext: &'a [u8],
}

pub struct EncodeRequest<'a> {
    pub kdf: KdfParams,
    pub self_destruct: bool,
    pub noise: bool,
    pub padding: bool,
    pub pad_block: u16,
    pub primary: RecordInput<'a>,
    pub duress: Option<RecordInput<'a>>,
}

/// Parse the fixed header and, when present, skip the noise region.
/// Returns the header and the offset of the first record. No crypto.
pub fn parse_prefix(bytes: &[u8]) -> Result<(Header, usize), EnvelopeError> {
    if bytes.len() < HEADER_LEN {
        return Err(EnvelopeError::MalformedHeader);
    }
    if &bytes[..4] != MAGIC {
        return Err(EnvelopeError::MalformedHeader);
    }
    let version = bytes[4];
    if version != VERSION {
        return Err(EnvelopeError::UnsupportedVersion(version));
    }
    let flags = bytes[5];
    let kdf = KdfParams {
        alg_id: bytes[6],
        opslimit: u32::from_le_bytes(bytes[7..11].try_into().unwrap()),
        memlimit: u64::from_le_bytes(bytes[11..19].try_into().unwrap()),
    };
    kdf.validate().map_err(|_| EnvelopeError::MalformedHeader)?;
    let header = Header { flags, kdf };

    let mut off = HEADER_LEN;
    if header.stealth_noise() {
        if bytes.len() < off + 2 {
            return Err(EnvelopeError::TruncatedBody);
        }
        let noise_len = u16::from_le_bytes([bytes[off], bytes[off + 1]]);
        off += 2;
        if noise_len > NOISE_DECODE_LIMIT {
            return Err(EnvelopeError::MalformedHeader);
        }
        let end = off + usize::from(noise_len);
        if bytes.len() < end {
            return Err(EnvelopeError::TruncatedBody);
        }
        off = end;
    }
    Ok((header, off))
}

impl Envelope {
    /// Structural parse of the full binary blob. Walks every region and
    /// enforces the decode limits; performs no key derivation and must
    /// never panic on arbitrary input.
    pub fn parse(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let (header, mut off) = parse_prefix(bytes)?;

        let n_records = if header.has_duress() { 2 } else { 1 };
        let mut records = Vec::with_capacity(n_records);
        for _ in 0..n_records {
            if bytes.len() < off + RECORD_MIN_LEN {
                return Err(EnvelopeError::TruncatedBody);
            }
            let mut salt = [0u8; SALT_LEN];
            salt.copy_from_slice(&bytes[off..off + SALT_LEN]);
            off += SALT_LEN;
            let mut nonce = [0u8; NONCE_LEN];
            nonce.copy_from_slice(&bytes[off..off + NONCE_LEN]);
            off += NONCE_LEN;
            let len = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()) as usize;
            off += 4;
            if bytes.len() - off < len {
                return Err(EnvelopeError::TruncatedBody);
            }
            let data = bytes[off..off + len].to_vec();
            off += len;
            records.push(Record { salt, nonce, data });
        }

        if header.stealth_padding() {
            if bytes.len() < off + 2 {
                return Err(EnvelopeError::TruncatedBody);
            }
            let pad_len = usize::from(u16::from_le_bytes([bytes[off], bytes[off + 1]]));
            off += 2;
            // A legitimate pad never exceeds one block; for large blobs
            // the half-length bound is the tighter guard.
            let limit = (bytes.len() / 2).max(usize::from(PAD_DECODE_LIMIT));
            if pad_len > limit {
                return Err(EnvelopeError::TruncatedBody);
            }
            if bytes.len() - off != pad_len {
                return Err(EnvelopeError::TruncatedBody);
            }
            off = bytes.len();
        }
        if off != bytes.len() {
            return Err(EnvelopeError::TruncatedBody);
        }

        Ok(Envelope { header, records })
    }

    /// Try the real record first; a successful open short-circuits. On
    /// failure the duress record, when present, is always attempted.
    /// Every failure collapses to `DecryptFailed`.
    pub fn open_with_password(&self, password: &str) -> Result<Opened, EnvelopeError> {
        let aad = self.header.aad();
        for (idx, rec) in self.records.iter().enumerate() {
            let key = match derive_key(password, &rec.salt, &self.header.kdf) {
                Ok(k) => k,
                Err(_) => return Err(EnvelopeError::DecryptFailed),
            };
            if let Ok(plaintext) = cipher::open(&key, &rec.nonce, &aad, &rec.data) {
                let duress = idx == 1;
                // The duress side never reports self-destruct.
                return Ok(Opened {
                    plaintext,
                    self_destruct: !duress && self.header.self_destruct(),
                    duress,
                });
            }
        }
        Err(EnvelopeError::DecryptFailed)
    }
}

pub fn encode(rng: &dyn Rng, req: &EncodeRequest<'_>) -> Result<Vec<u8>, EnvelopeError> {
    req.kdf.validate()?;
    if let Some(duress) = &req.duress {
        if duress.password == req.primary.password {
            return Err(EnvelopeError::DuressEqualsPrimary);
        }
    }

    let mut flags = 0u8;
    if req.duress.is_some() {
        flags |= FLAG_HAS_DURESS;
    }
    if req.self_destruct {
        flags |= FLAG_SELF_DESTRUCT;
    }
    if req.noise {
        flags |= FLAG_STEALTH_NOISE;
    }
    if req.padding {
        flags |= FLAG_STEALTH_PADDING;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + 2 * RECORD_MIN_LEN);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);
    out.push(flags);
    out.push(req.kdf.alg_id);
    out.extend_from_slice(&req.kdf.opslimit.to_le_bytes());
    out.extend_from_slice(&req.kdf.memlimit.to_le_bytes());
    let mut aad = [0u8; AAD_PREFIX_LEN];
    aad.copy_from_slice(&out[..AAD_PREFIX_LEN]);

    if req.noise {
        let noise_len = uniform_in(rng, NOISE_MIN, NOISE_MAX).map_err(|_| EnvelopeError::Random)?;
        out.extend_from_slice(&noise_len.to_le_bytes());
        fill_random(rng, &mut out, usize::from(noise_len))?;
    }

    append_record(rng, &mut out, &aad, &req.kdf, &req.primary)?;
    if let Some(duress) = &req.duress {
        append_record(rng, &mut out, &aad, &req.kdf, duress)?;
    }

    if req.padding {
        let block = usize::from(req.pad_block.max(1));
        // Round the total (including the length field itself) up to the
        // next block boundary.
        let pad_len = (block - (out.len() + 2) % block) % block;
        out.extend_from_slice(&(pad_len as u16).to_le_bytes());
        fill_random(rng, &mut out, pad_len)?;
    }

    Ok(out)
}

fn fill_random(rng: &dyn Rng, out: &mut Vec<u8>, n: usize) -> Result<(), EnvelopeError> {
    let start = out.len();
    out.resize(start + n, 0);
    rng.fill(&mut out[start..]).map_err(|_| EnvelopeError::Random)
}

fn append_record(
    rng: &dyn Rng,
    out: &mut Vec<u8>,
    aad: &[u8; AAD_PREFIX_LEN],
    kdf: &KdfParams,
    input: &RecordInput<'_>,
) -> Result<(), EnvelopeError> {
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| EnvelopeError::Random)?;
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce).map_err(|_| EnvelopeError::Random)?;
    let key = derive_key(input.password, &salt, kdf)?;
    let sealed =
        cipher::seal(&key, &nonce, aad, input.plaintext).map_err(|_| EnvelopeError::Oversize)?;
    let len = u32::try_from(sealed.len()).map_err(|_| EnvelopeError::Oversize)?;
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&sealed);
    Ok(())
}

// ===== Base64 transport =====

// Standard alphabet. Output is padded; input tolerates missing padding
// (legacy blobs) and embedded whitespace.
const TRANSPORT_DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn to_transport(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn from_transport(text: &str) -> Result<Vec<u8>, EnvelopeError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    TRANSPORT_DECODER
        .decode(compact.as_bytes())
        .map_err(|_| EnvelopeError::MalformedHeader)
}
