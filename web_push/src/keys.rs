//! Ephemeral P-256 key agreement.

use crate::{Error, Result};
use aes_gcm::aead::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;

/// Length of an uncompressed SEC1 point on P-256.
pub const POINT_LENGTH: usize = 65;
const UNCOMPRESSED_TAG: u8 = 0x04;

/// Uncompressed P-256 public key, `0x04 || x || y`.
pub type PublicPoint = [u8; POINT_LENGTH];

/// Per-message sender key pair. Never reused across sends.
#[derive(Clone)]
pub struct EphemeralKeyPair {
    secret: p256::SecretKey,
    public: PublicPoint,
}

impl EphemeralKeyPair {
    /// Generates a fresh key pair from the operating system's RNG.
    pub fn generate() -> Self {
        Self::from_secret(p256::SecretKey::random(&mut OsRng))
    }

    /// Wraps an existing secret key.
    pub fn from_secret(secret: p256::SecretKey) -> Self {
        let mut public = [0u8; POINT_LENGTH];
        public.copy_from_slice(secret.public_key().to_encoded_point(false).as_bytes());
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicPoint {
        &self.public
    }
}

impl std::fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &crate::codec::encode(&self.public))
            .finish_non_exhaustive()
    }
}

/// Splits an uncompressed point into its affine coordinates.
pub fn extract_xy(point: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    if point.len() != POINT_LENGTH {
        return Err(Error::InvalidKey("point must be 65 bytes"));
    }
    if point[0] != UNCOMPRESSED_TAG {
        return Err(Error::InvalidKey("point must be uncompressed"));
    }

    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(&point[1..33]);
    y.copy_from_slice(&point[33..]);
    Ok((x, y))
}

/// Parses an uncompressed point, checking that it lies on the curve.
pub fn parse_public_key(point: &[u8]) -> Result<p256::PublicKey> {
    extract_xy(point)?;
    p256::PublicKey::from_sec1_bytes(point).map_err(|_| Error::InvalidKey("point is not on P-256"))
}

/// ECDH between the subscriber's public key and our ephemeral secret.
pub fn derive_shared_secret(
    subscriber_public: &[u8],
    ephemeral: &EphemeralKeyPair,
) -> Result<[u8; 32]> {
    diffie_hellman(&ephemeral.secret, subscriber_public)
}

pub(crate) fn diffie_hellman(secret: &p256::SecretKey, peer_public: &[u8]) -> Result<[u8; 32]> {
    let peer = parse_public_key(peer_public)?;
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());

    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes());
    Ok(out)
}
