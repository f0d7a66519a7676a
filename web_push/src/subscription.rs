use crate::{
    codec,
    keys::{extract_xy, PublicPoint, POINT_LENGTH},
    Error, Result,
};
use http::Uri;
use serde::{Deserialize, Serialize};

/// Minimum length of the subscriber's authentication secret.
pub const MIN_AUTH_LENGTH: usize = 16;

/// Browser push subscription, as returned by `pushManager.subscribe`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub endpoint: String,
    #[serde(default)]
    pub keys: SubscriptionKeys,
}

/// base64url encoded subscriber keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p256dh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

/// Decoded and validated subscription key material.
#[derive(Clone, Debug)]
pub struct SubscriberKeys {
    pub endpoint: Uri,
    pub p256dh: PublicPoint,
    pub auth: Vec<u8>,
}

impl Subscription {
    pub fn new<E, P, A>(endpoint: E, p256dh: P, auth: A) -> Self
    where
        E: Into<String>,
        P: Into<String>,
        A: Into<String>,
    {
        Self {
            endpoint: endpoint.into(),
            keys: SubscriptionKeys {
                p256dh: Some(p256dh.into()),
                auth: Some(auth.into()),
            },
        }
    }

    /// Checks that both keys are present, decodable and correctly sized.
    pub fn validate(&self) -> Result<SubscriberKeys> {
        let endpoint: Uri = self
            .endpoint
            .parse()
            .map_err(|e| Error::InvalidSubscription(format!("endpoint: {}", e)))?;
        if endpoint.scheme_str().is_none() || endpoint.host().is_none() {
            return Err(Error::InvalidSubscription(
                "endpoint must be an absolute URL".into(),
            ));
        }

        let p256dh = self
            .keys
            .p256dh
            .as_deref()
            .filter(|it| !it.is_empty())
            .ok_or_else(|| Error::InvalidSubscription("missing p256dh key".into()))?;
        let auth = self
            .keys
            .auth
            .as_deref()
            .filter(|it| !it.is_empty())
            .ok_or_else(|| Error::InvalidSubscription("missing auth key".into()))?;

        let p256dh = codec::decode(p256dh)
            .map_err(|e| Error::InvalidSubscription(format!("p256dh is not base64url: {}", e)))?;
        if p256dh.len() != POINT_LENGTH {
            return Err(Error::InvalidSubscription(format!(
                "p256dh must be {} bytes, got {}",
                POINT_LENGTH,
                p256dh.len()
            )));
        }
        extract_xy(&p256dh)?;

        let auth = codec::decode(auth)
            .map_err(|e| Error::InvalidSubscription(format!("auth is not base64url: {}", e)))?;
        if auth.len() < MIN_AUTH_LENGTH {
            return Err(Error::InvalidSubscription(format!(
                "auth must be at least {} bytes, got {}",
                MIN_AUTH_LENGTH,
                auth.len()
            )));
        }

        let mut point = [0u8; POINT_LENGTH];
        point.copy_from_slice(&p256dh);
        Ok(SubscriberKeys {
            endpoint,
            p256dh: point,
            auth,
        })
    }
}
