//! Voluntary Application Server Identification (VAPID) according to
//! [RFC8292](https://www.rfc-editor.org/rfc/rfc8292).

use crate::{
    codec,
    crypto::CryptoProvider,
    keys::extract_xy,
    Error, Result,
};
use http::Uri;
use p256::ecdsa::SigningKey;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Environment variable holding the base64url public key.
pub const PUBLIC_KEY_VAR: &str = "VAPID_PUBLIC_KEY";
/// Environment variable holding the base64url private scalar.
pub const PRIVATE_KEY_VAR: &str = "VAPID_PRIVATE_KEY";
/// Environment variable holding the contact URI.
pub const SUBJECT_VAR: &str = "VAPID_SUBJECT";
/// Subject used when [`SUBJECT_VAR`] is unset.
pub const DEFAULT_SUBJECT: &str = "mailto:admin@example.com";

/// Push services reject tokens that live longer than this.
pub const MAX_VALID_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

const SIGNATURE_LENGTH: usize = 64;

/// Application server identity, loaded once per process.
#[derive(Clone)]
pub struct VapidIdentity {
    subject: String,
    public_key: String,
    signing_key: SigningKey,
}

impl VapidIdentity {
    /// Loads the identity from `VAPID_PUBLIC_KEY`, `VAPID_PRIVATE_KEY` and
    /// the optional `VAPID_SUBJECT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`VapidIdentity::from_env`], with a caller-supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|it| it.trim().to_string())
                .filter(|it| !it.is_empty())
        };

        let public_key = read(PUBLIC_KEY_VAR)
            .ok_or_else(|| Error::Configuration(format!("{} is not set", PUBLIC_KEY_VAR)))?;
        let private_key = read(PRIVATE_KEY_VAR)
            .ok_or_else(|| Error::Configuration(format!("{} is not set", PRIVATE_KEY_VAR)))?;
        let subject = read(SUBJECT_VAR).unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

        Self::from_base64(subject, &public_key, &private_key)
    }

    /// Reconstructs the identity from its base64url encoded key pair.
    ///
    /// The public key must be the uncompressed point belonging to the
    /// private scalar.
    pub fn from_base64<S: Into<String>>(
        subject: S,
        public_key: &str,
        private_key: &str,
    ) -> Result<Self> {
        let subject = subject.into();
        if !(subject.starts_with("mailto:") || subject.starts_with("https:")) {
            return Err(Error::Configuration(format!(
                "subject must be a mailto: or https: URI, got {:?}",
                subject
            )));
        }

        let public = codec::decode(public_key)
            .map_err(|e| Error::Configuration(format!("public key is not base64url: {}", e)))?;
        let (x, y) = extract_xy(&public)
            .map_err(|e| Error::Configuration(format!("public key: {}", e)))?;

        let private = codec::decode_array::<32>(private_key)
            .map_err(|e| Error::Configuration(format!("private key is not base64url: {}", e)))?
            .ok_or_else(|| Error::Configuration("private key must be 32 bytes".into()))?;
        let signing_key = SigningKey::from_slice(&private)
            .map_err(|_| Error::Configuration("private key is not a P-256 scalar".into()))?;

        let derived = signing_key.verifying_key().to_encoded_point(false);
        if derived.x().map(|it| it.as_slice()) != Some(&x[..])
            || derived.y().map(|it| it.as_slice()) != Some(&y[..])
        {
            return Err(Error::Configuration(
                "public key does not belong to private key".into(),
            ));
        }

        Ok(Self {
            subject,
            public_key: codec::encode(&public),
            signing_key,
        })
    }

    /// Generates a fresh identity.
    pub fn generate<S: Into<String>>(subject: S) -> Result<Self> {
        let signing_key = SigningKey::random(&mut aes_gcm::aead::OsRng);
        let public = signing_key.verifying_key().to_encoded_point(false);
        let private = signing_key.to_bytes();
        Self::from_base64(subject, &codec::encode(public.as_bytes()), &codec::encode(&private))
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Public key as base64url, as handed to `pushManager.subscribe`.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Private scalar as base64url.
    pub fn private_key(&self) -> String {
        codec::encode(&self.signing_key.to_bytes())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for VapidIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidIdentity")
            .field("subject", &self.subject)
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Header {
    typ: &'static str,
    alg: &'static str,
}

const HEADER: Header = Header {
    typ: "JWT",
    alg: "ES256",
};

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: u64,
    sub: &'a str,
}

/// Origin of a push endpoint, used as the token audience.
///
/// The port is kept only when it differs from the scheme's default.
pub fn audience(endpoint: &Uri) -> Result<String> {
    let scheme = endpoint
        .scheme_str()
        .ok_or_else(|| Error::InvalidSubscription("missing scheme in endpoint".into()))?;
    let host = endpoint
        .host()
        .ok_or_else(|| Error::InvalidSubscription("missing host in endpoint".into()))?;

    let default_port = match scheme {
        "https" => Some(443),
        "http" => Some(80),
        _ => None,
    };

    Ok(match endpoint.port_u16().filter(|it| Some(*it) != default_port) {
        Some(port) => format!("{}://{}:{}", scheme, host, port),
        None => format!("{}://{}", scheme, host),
    })
}

/// Builds the value of the `Authorization` header for a request to `endpoint`.
///
/// The token expires `valid_duration` after `now`.
pub fn build_token<P: CryptoProvider + ?Sized>(
    identity: &VapidIdentity,
    endpoint: &Uri,
    valid_duration: Duration,
    now: SystemTime,
    crypto: &P,
) -> Result<String> {
    let audience = audience(endpoint)?;
    let expiration = now
        .checked_add(valid_duration)
        .and_then(|it| it.duration_since(UNIX_EPOCH).ok())
        .ok_or_else(|| Error::Configuration("token expiration out of range".into()))?
        .as_secs();

    let header = codec::encode(&serde_json::to_vec(&HEADER)?);
    let claims = codec::encode(&serde_json::to_vec(&Claims {
        aud: &audience,
        exp: expiration,
        sub: identity.subject(),
    })?);
    let signing_input = format!("{}.{}", header, claims);

    let signature = crypto.sign(identity.signing_key(), signing_input.as_bytes())?;
    let signature = der_to_jose(&signature)?;

    Ok(format!(
        "WebPush {}.{}",
        signing_input,
        codec::encode(&signature)
    ))
}

/// Converts an ECDSA signature into the fixed `r || s` form used by JWS.
///
/// Input that is already 64 bytes long is taken to be in that form.
pub fn der_to_jose(signature: &[u8]) -> Result<[u8; SIGNATURE_LENGTH]> {
    if signature.len() == SIGNATURE_LENGTH {
        let mut out = [0u8; SIGNATURE_LENGTH];
        out.copy_from_slice(signature);
        return Ok(out);
    }

    let (r, s) = parse_der_signature(signature)?;
    let mut out = [0u8; SIGNATURE_LENGTH];
    out[..32].copy_from_slice(&r);
    out[32..].copy_from_slice(&s);
    Ok(out)
}

const TAG_INTEGER: u8 = 0x02;
const TAG_SEQUENCE: u8 = 0x30;

/// Parses `SEQUENCE { INTEGER r, INTEGER s }`.
fn parse_der_signature(der: &[u8]) -> Result<([u8; 32], [u8; 32])> {
    let mut outer = DerReader::new(der);
    let mut sequence = DerReader::new(outer.read(TAG_SEQUENCE)?);
    outer.finish()?;

    let r = sequence.read_unsigned()?;
    let s = sequence.read_unsigned()?;
    sequence.finish()?;

    Ok((r, s))
}

struct DerReader<'a> {
    input: &'a [u8],
}

impl<'a> DerReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.input.len() < n {
            return Err(Error::InvalidSignature("truncated DER"));
        }
        let (head, tail) = self.input.split_at(n);
        self.input = tail;
        Ok(head)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn length(&mut self) -> Result<usize> {
        match self.byte()? {
            short @ 0x00..=0x7f => Ok(usize::from(short)),
            0x81 => match self.byte()? {
                long @ 0x80..=0xff => Ok(usize::from(long)),
                _ => Err(Error::InvalidSignature("non-minimal DER length")),
            },
            _ => Err(Error::InvalidSignature("unsupported DER length")),
        }
    }

    /// Reads one element with the expected tag, returning its contents.
    fn read(&mut self, tag: u8) -> Result<&'a [u8]> {
        if self.byte()? != tag {
            return Err(Error::InvalidSignature("unexpected DER tag"));
        }
        let length = self.length()?;
        self.take(length)
    }

    /// Reads a positive INTEGER no wider than 32 bytes, left-padded.
    fn read_unsigned(&mut self) -> Result<[u8; 32]> {
        let value = self.read(TAG_INTEGER)?;
        match value {
            [] => return Err(Error::InvalidSignature("empty DER integer")),
            [first, ..] if first & 0x80 != 0 => {
                return Err(Error::InvalidSignature("negative DER integer"))
            }
            [0, second, ..] if second & 0x80 == 0 => {
                return Err(Error::InvalidSignature("non-minimal DER integer"))
            }
            _ => {}
        }

        let start = value.iter().position(|it| *it != 0).unwrap_or(value.len());
        codec::left_pad::<32>(&value[start..])
            .ok_or(Error::InvalidSignature("DER integer wider than 32 bytes"))
    }

    fn finish(&self) -> Result<()> {
        if self.input.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidSignature("trailing bytes after DER element"))
        }
    }
}
