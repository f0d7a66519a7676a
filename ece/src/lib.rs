//! This crate implements the single-record `aes128gcm` content encoding from
//! rfc8188, which is the only shape Web Push (rfc8291) ever sends.
//!
//! An encoded message is laid out as
//!
//! ```text
//! salt (16) || rs (4, big-endian) || idlen (1) || keyid (idlen) || record
//! ```
//!
//! where `record` is the plaintext followed by the `0x02` delimiter,
//! sealed with AES-128-GCM under a key and nonce derived from the input
//! keying material and the salt.


use aes_gcm::{aead::consts::U12, AeadInPlace, Aes128Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use sha2::Sha256;

/// Record size advertised in every header.
pub const RECORD_SIZE: u32 = 4096;
/// Length of the fixed part of the header, without the key id.
pub const HEADER_PREFIX_LENGTH: usize = 16 + 4 + 1;
/// Length of the AES-GCM authentication tag.
pub const TAG_LENGTH: usize = 16;
/// Delimiter marking the last (and only) record.
pub const LAST_RECORD_DELIMITER: u8 = 0x02;

const KEY_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Error modes for rfc8188 encryption and decryption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Header of the encrypted payload was too short
    HeaderLengthInvalid,
    /// The `keyid` was longer than 255 bytes or longer than the payload
    KeyIdLengthInvalid,
    /// The record does not fit into the advertised record size
    RecordLengthInvalid,
    /// Padding of the decrypted record was malformed
    PaddingInvalid,
    /// The pseudo-random key passed to [`hkdf_expand`] was too short
    PrkLengthInvalid,
    /// More output was requested from [`hkdf_expand`] than HKDF can produce
    OutputLengthInvalid,
    /// Internal aes128gcm error
    Aes128Gcm,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Content-encryption key and nonce derived for one message.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKeys {
    pub key: [u8; 16],
    pub nonce: [u8; 12],
}

/// HKDF extract step, `HMAC-SHA256(salt, ikm)`.
pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> [u8; 32] {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    let mut out = [0u8; 32];
    out.copy_from_slice(&prk);
    out
}

/// HKDF expand step, producing `length` bytes of output keying material.
pub fn hkdf_expand(prk: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>, Error> {
    let hk = Hkdf::<Sha256>::from_prk(prk).map_err(|_| Error::PrkLengthInvalid)?;
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm).map_err(|_| Error::OutputLengthInvalid)?;

    Ok(okm)
}

/// Derives the content-encryption key and nonce for a single record.
pub fn derive_key_and_nonce(salt: &[u8; 16], ikm: &[u8]) -> ContentKeys {
    let prk = hkdf_extract(salt, ikm);
    let hk = Hkdf::<Sha256>::from_prk(&prk).expect("prk is always exactly one hash length");

    let mut key = [0u8; 16];
    hk.expand(KEY_INFO, &mut key)
        .expect("okm length is always 16, impossible for it to be too large");
    let mut nonce = [0u8; 12];
    hk.expand(NONCE_INFO, &mut nonce)
        .expect("okm length is always 12, impossible for it to be too large");

    ContentKeys { key, nonce }
}

/// Frames `plaintext` as the last record of a message.
pub fn build_record(plaintext: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(plaintext.len() + 1 + TAG_LENGTH);
    record.extend_from_slice(plaintext);
    record.push(LAST_RECORD_DELIMITER);
    record
}

/// Seals a framed record, appending the authentication tag.
pub fn encrypt_record(keys: &ContentKeys, mut record: Vec<u8>) -> Result<Vec<u8>, Error> {
    if record.len() + TAG_LENGTH > RECORD_SIZE as usize {
        return Err(Error::RecordLengthInvalid);
    }

    let key = aes_gcm::Key::<Aes128Gcm>::from(keys.key);
    let nonce = Nonce::<U12>::from(keys.nonce);
    Aes128Gcm::new(&key)
        .encrypt_in_place(&nonce, b"", &mut record)
        .map_err(|_| Error::Aes128Gcm)?;

    Ok(record)
}

fn generate_encryption_header(salt: &[u8; 16], keyid: &[u8]) -> Result<Vec<u8>, Error> {
    let idlen: u8 = keyid
        .len()
        .try_into()
        .map_err(|_| Error::KeyIdLengthInvalid)?;

    let mut header = Vec::with_capacity(HEADER_PREFIX_LENGTH + keyid.len());
    header.extend_from_slice(&salt[..]);
    header.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    header.push(idlen);
    header.extend_from_slice(keyid);

    Ok(header)
}

/// Prepends the rfc8188 header to an already sealed record.
pub fn assemble_body(salt: &[u8; 16], keyid: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let mut body = generate_encryption_header(salt, keyid)?;
    body.extend_from_slice(ciphertext);
    Ok(body)
}

/// Low-level single-record rfc8188 encryption routine
pub fn encrypt<IKM: AsRef<[u8]>, KI: AsRef<[u8]>>(
    ikm: IKM,
    salt: [u8; 16],
    keyid: KI,
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    let keys = derive_key_and_nonce(&salt, ikm.as_ref());
    let ciphertext = encrypt_record(&keys, build_record(plaintext))?;
    assemble_body(&salt, keyid.as_ref(), &ciphertext)
}

/// Header fields of an encoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub salt: [u8; 16],
    pub record_size: u32,
    pub keyid: &'a [u8],
}

/// Splits an encoded message into its header and the sealed record.
pub fn parse_header(encrypted_message: &[u8]) -> Result<(Header<'_>, &[u8]), Error> {
    if encrypted_message.len() < HEADER_PREFIX_LENGTH {
        return Err(Error::HeaderLengthInvalid);
    }

    let (prefix, rest) = encrypted_message.split_at(HEADER_PREFIX_LENGTH);
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&prefix[..16]);
    let mut rs = [0u8; 4];
    rs.copy_from_slice(&prefix[16..20]);
    let idlen = usize::from(prefix[20]);

    if rest.len() < idlen {
        return Err(Error::KeyIdLengthInvalid);
    }
    let (keyid, record) = rest.split_at(idlen);

    let header = Header {
        salt,
        record_size: u32::from_be_bytes(rs),
        keyid,
    };
    Ok((header, record))
}

/// Low-level single-record rfc8188 decryption routine
pub fn decrypt<IKM: AsRef<[u8]>>(ikm: IKM, encrypted_message: &[u8]) -> Result<Vec<u8>, Error> {
    let (header, record) = parse_header(encrypted_message)?;

    let record_size = usize::try_from(header.record_size).map_err(|_| Error::RecordLengthInvalid)?;
    if record.len() < TAG_LENGTH + 1 || record.len() > record_size {
        return Err(Error::RecordLengthInvalid);
    }

    let keys = derive_key_and_nonce(&header.salt, ikm.as_ref());
    let key = aes_gcm::Key::<Aes128Gcm>::from(keys.key);
    let nonce = Nonce::<U12>::from(keys.nonce);

    let mut msg = record.to_vec();
    Aes128Gcm::new(&key)
        .decrypt_in_place(&nonce, b"", &mut msg)
        .map_err(|_| Error::Aes128Gcm)?;

    let pad_index = msg
        .iter()
        .rposition(|it| *it != 0)
        .ok_or(Error::PaddingInvalid)?;
    if msg[pad_index] != LAST_RECORD_DELIMITER {
        return Err(Error::PaddingInvalid);
    }
    msg.truncate(pad_index);

    Ok(msg)
}
