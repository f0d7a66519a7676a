use crate::{keys::EphemeralKeyPair, Error, Result};
use aes_gcm::aead::{rand_core::RngCore, OsRng};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};

/// Source of randomness and signatures for the push pipeline.
///
/// ECDH, HKDF and AES-GCM are pure functions of their inputs and are not
/// routed through the provider.
pub trait CryptoProvider: Send + Sync {
    /// Generates the sender key pair for one message.
    fn generate_key_pair(&self) -> EphemeralKeyPair;

    /// Generates the salt for one message.
    fn random_salt(&self) -> [u8; 16];

    /// Signs `message` with ECDSA P-256/SHA-256.
    ///
    /// Implementations return the signature in whatever encoding their
    /// backend produces natively, either ASN.1 DER or raw `r || s`.
    fn sign(&self, key: &SigningKey, message: &[u8]) -> Result<Vec<u8>>;
}

/// [`CryptoProvider`] backed by the operating system RNG and RustCrypto.
#[derive(Clone, Copy, Debug, Default)]
pub struct RustCrypto;

impl CryptoProvider for RustCrypto {
    fn generate_key_pair(&self) -> EphemeralKeyPair {
        EphemeralKeyPair::generate()
    }

    fn random_salt(&self) -> [u8; 16] {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        salt
    }

    fn sign(&self, key: &SigningKey, message: &[u8]) -> Result<Vec<u8>> {
        let signature: Signature = key
            .try_sign(message)
            .map_err(|_| Error::InvalidSignature("signing failed"))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}
