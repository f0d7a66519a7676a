//! This crate implements a Web Push delivery engine: message encryption
//! according to [RFC8291](https://www.rfc-editor.org/rfc/rfc8291), VAPID
//! sender authentication according to
//! [RFC8292](https://www.rfc-editor.org/rfc/rfc8292), and dispatch of the
//! resulting request to the subscriber's push service.
//!
//! # Example
//!
//! This example shows how to use the [`PushDispatcher`] to deliver one
//! notification to one, hard-coded client.
//!
//! In most cases, subscriptions come from a database keyed by recipient; see
//! [`SubscriberStore`] and [`PushDispatcher::send_to_recipient`].
//!
//! ```no_run
//! use webpush_engine::{
//!     HyperClient, Notification, PushDispatcher, PushOutcome, Subscription, VapidIdentity,
//! };
//!
//! // Placeholders for values provided by individual clients. In most cases,
//! // these will be retrieved in-browser using `pushManager.subscribe` on a
//! // service worker registration object.
//! const ENDPOINT: &str = "https://push.example.net/push/abc";
//! const P256DH: &str = "";
//! const AUTH: &str = "";
//!
//! async fn push() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads VAPID_PUBLIC_KEY, VAPID_PRIVATE_KEY and VAPID_SUBJECT.
//!     let vapid = VapidIdentity::from_env()?;
//!     let dispatcher = PushDispatcher::new(HyperClient::new(), vapid);
//!
//!     let subscription = Subscription::new(ENDPOINT, P256DH, AUTH);
//!     let notification = Notification::new("Hello", "from the server");
//!
//!     match dispatcher.send(&subscription, &notification).await? {
//!         PushOutcome::Delivered { .. } => {}
//!         PushOutcome::Gone { .. } => { /* forget this subscription */ }
//!         other => return Err(other.into_result().unwrap_err().into()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod codec;
mod crypto;
mod dispatch;
mod error;
pub mod keys;
mod subscription;
mod transport;
pub mod vapid;

pub use audit::{AuditEvent, AuditLogger, AuditStatus, LogAuditLogger};
pub use crypto::{CryptoProvider, RustCrypto};
pub use dispatch::{Notification, PushDispatcher, PushOutcome};
pub use error::{BoxError, Error, Result};
pub use keys::EphemeralKeyPair;
pub use p256;
pub use subscription::{SubscriberKeys, Subscription, SubscriptionKeys};
#[cfg(feature = "hyper-client")]
pub use transport::HyperClient;
pub use transport::{HttpClient, SubscriberStore};
pub use vapid::VapidIdentity;
pub use webpush_ece as ece;

use keys::PublicPoint;
use webpush_ece::{hkdf_expand, hkdf_extract};

const WEB_PUSH_INFO: &[u8] = b"WebPush: info\0";

/// Result of encrypting one push message.
#[derive(Clone, Debug)]
pub struct EncryptedPayload {
    /// Complete `aes128gcm` request body.
    pub body: Vec<u8>,
    pub salt: [u8; 16],
    /// Ephemeral public key, also carried as the body's key id.
    pub sender_public: PublicPoint,
}

/// Combines the ECDH output with the subscriber's auth secret into the
/// input keying material for the content encoding.
pub fn web_push_secret(
    auth: &[u8],
    ua_public: &PublicPoint,
    as_public: &PublicPoint,
    shared: &[u8; 32],
) -> Result<[u8; 32]> {
    let info = codec::concat(&[WEB_PUSH_INFO, &ua_public[..], &as_public[..]]);
    let prk = hkdf_extract(auth, shared);
    let okm = hkdf_expand(&prk, &info, 32)?;

    let mut ikm = [0u8; 32];
    ikm.copy_from_slice(&okm);
    Ok(ikm)
}

/// Lower-level encryption used for HTTP push request content
pub fn encrypt<P: CryptoProvider + ?Sized>(
    crypto: &P,
    message: &[u8],
    ua_public: &PublicPoint,
    ua_auth: &[u8],
) -> Result<EncryptedPayload> {
    let salt = crypto.random_salt();
    let as_keys = crypto.generate_key_pair();
    encrypt_predictably(salt, message, &as_keys, ua_public, ua_auth)
}

fn encrypt_predictably(
    salt: [u8; 16],
    message: &[u8],
    as_keys: &EphemeralKeyPair,
    ua_public: &PublicPoint,
    ua_auth: &[u8],
) -> Result<EncryptedPayload> {
    let shared = keys::derive_shared_secret(ua_public, as_keys)?;
    let ikm = web_push_secret(ua_auth, ua_public, as_keys.public_key(), &shared)?;
    let body = webpush_ece::encrypt(ikm, salt, as_keys.public_key(), message)?;

    Ok(EncryptedPayload {
        body,
        salt,
        sender_public: *as_keys.public_key(),
    })
}

/// Lower-level decryption used for HTTP push request content, as performed
/// by the receiving user agent.
pub fn decrypt(
    encrypted_message: &[u8],
    ua_secret: &p256::SecretKey,
    ua_auth: &[u8],
) -> Result<Vec<u8>> {
    let (header, _) = webpush_ece::parse_header(encrypted_message)?;
    let as_public: PublicPoint = header
        .keyid
        .try_into()
        .map_err(|_| Error::InvalidKey("key id is not a 65 byte point"))?;

    let ua_keys = EphemeralKeyPair::from_secret(ua_secret.clone());
    let shared = keys::diffie_hellman(ua_secret, &as_public)?;
    let ikm = web_push_secret(ua_auth, ua_keys.public_key(), &as_public, &shared)?;

    Ok(webpush_ece::decrypt(ikm, encrypted_message)?)
}
