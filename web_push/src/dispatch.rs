use crate::{
    audit::{step, AuditEvent, AuditLogger, AuditStatus, LogAuditLogger},
    codec,
    crypto::{CryptoProvider, RustCrypto},
    keys,
    transport::{HttpClient, SubscriberStore},
    vapid::{self, VapidIdentity},
    web_push_secret, Error, Result, Subscription,
};
use http::{header, Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::time::{Duration, SystemTime};

/// Default time the push service keeps an undeliverable message.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
/// Default lifetime of the VAPID token.
pub const DEFAULT_VALID_DURATION: Duration = Duration::from_secs(12 * 60 * 60);

/// Notification payload. Serialized to JSON and encrypted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Notification {
    pub fn new<T: Into<String>, B: Into<String>>(title: T, body: B) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: None,
        }
    }

    pub fn with_url<U: Into<String>>(self, url: U) -> Self {
        Self {
            url: Some(url.into()),
            ..self
        }
    }
}

/// What the push service did with a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Accepted for delivery (2xx).
    Delivered { status: StatusCode },
    /// The subscription no longer exists (404 or 410) and should be removed.
    Gone { status: StatusCode, body: String },
    /// Too many requests (429).
    RateLimited {
        retry_after: Option<Duration>,
        body: String,
    },
    /// Any other response.
    ServerError {
        status: StatusCode,
        status_text: String,
        body: String,
    },
}

impl PushOutcome {
    pub fn from_response(response: &Response<Vec<u8>>) -> Self {
        let status = response.status();
        if status.is_success() {
            return PushOutcome::Delivered { status };
        }

        let body = String::from_utf8_lossy(response.body()).into_owned();
        match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => PushOutcome::Gone { status, body },
            StatusCode::TOO_MANY_REQUESTS => PushOutcome::RateLimited {
                retry_after: response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|it| it.to_str().ok())
                    .and_then(|it| it.trim().parse().ok())
                    .map(Duration::from_secs),
                body,
            },
            _ => PushOutcome::ServerError {
                status,
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PushOutcome::Delivered { status }
            | PushOutcome::Gone { status, .. }
            | PushOutcome::ServerError { status, .. } => *status,
            PushOutcome::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, PushOutcome::Delivered { .. })
    }

    /// Turns every outcome but [`PushOutcome::Delivered`] into
    /// [`Error::PushDeliveryFailed`].
    pub fn into_result(self) -> Result<StatusCode> {
        let status = self.status();
        let body = match self {
            PushOutcome::Delivered { status } => return Ok(status),
            PushOutcome::Gone { body, .. }
            | PushOutcome::RateLimited { body, .. }
            | PushOutcome::ServerError { body, .. } => body,
        };
        Err(Error::PushDeliveryFailed {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Encrypts, signs and sends push messages.
///
/// Holds no per-message state; one dispatcher can serve any number of
/// concurrent sends.
pub struct PushDispatcher<C, P = RustCrypto> {
    client: C,
    crypto: P,
    vapid: VapidIdentity,
    ttl: Duration,
    valid_duration: Duration,
    audit: Box<dyn AuditLogger>,
}

impl<C: HttpClient> PushDispatcher<C> {
    /// Creates a dispatcher using the operating system RNG.
    ///
    /// Messages are kept by the push service for 60 seconds and signed with
    /// a token valid for 12 hours.
    pub fn new(client: C, vapid: VapidIdentity) -> Self {
        Self::with_crypto(client, RustCrypto, vapid)
    }
}

impl<C: HttpClient, P: CryptoProvider> PushDispatcher<C, P> {
    pub fn with_crypto(client: C, crypto: P, vapid: VapidIdentity) -> Self {
        Self {
            client,
            crypto,
            vapid,
            ttl: DEFAULT_TTL,
            valid_duration: DEFAULT_VALID_DURATION,
            audit: Box::new(LogAuditLogger),
        }
    }

    /// Sets the `TTL` header for generated push requests.
    pub fn with_ttl(self, ttl: Duration) -> Self {
        let mut this = self;
        this.ttl = ttl;
        this
    }

    /// Sets the VAPID token lifetime, at most 24 hours.
    pub fn with_valid_duration(self, valid_duration: Duration) -> Result<Self> {
        if valid_duration > vapid::MAX_VALID_DURATION {
            return Err(Error::Configuration(format!(
                "token lifetime of {}s exceeds 24 hours",
                valid_duration.as_secs()
            )));
        }
        let mut this = self;
        this.valid_duration = valid_duration;
        Ok(this)
    }

    pub fn with_audit_logger<A: AuditLogger + 'static>(self, audit: A) -> Self {
        let mut this = self;
        this.audit = Box::new(audit);
        this
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn vapid(&self) -> &VapidIdentity {
        &self.vapid
    }

    fn audit(&self, event: AuditEvent<'_>) {
        if let Err(err) = self.audit.log(&event) {
            log::warn!("audit logger failed at {}: {}", event.step, err);
        }
    }

    /// Encrypts `notification` for `subscription` and assembles the signed
    /// request without sending it.
    pub fn build_request(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<Request<Vec<u8>>> {
        let ua = subscription.validate()?;
        self.audit(
            AuditEvent::new(step::KEY_MATERIAL_READY, AuditStatus::Info)
                .with_payload(json!({ "endpoint": ua.endpoint.to_string() })),
        );

        let plaintext = serde_json::to_vec(notification)?;
        let as_keys = self.crypto.generate_key_pair();
        let salt = self.crypto.random_salt();

        let shared = keys::derive_shared_secret(&ua.p256dh, &as_keys)?;
        let ikm = web_push_secret(&ua.auth, &ua.p256dh, as_keys.public_key(), &shared)?;
        self.audit(AuditEvent::new(step::SECRET_DERIVED, AuditStatus::Info));

        let body = webpush_ece::encrypt(ikm, salt, as_keys.public_key(), &plaintext)?;
        self.audit(
            AuditEvent::new(step::PAYLOAD_ENCRYPTED, AuditStatus::Info)
                .with_payload(json!({ "plaintext": plaintext.len(), "body": body.len() })),
        );

        let authorization = vapid::build_token(
            &self.vapid,
            &ua.endpoint,
            self.valid_duration,
            SystemTime::now(),
            &self.crypto,
        )?;

        let request = Request::builder()
            .uri(ua.endpoint)
            .method(Method::POST)
            .header("TTL", self.ttl.as_secs())
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_ENCODING, "aes128gcm")
            .header("Encryption", format!("salt={}", codec::encode(&salt)))
            .header(
                "Crypto-Key",
                format!(
                    "dh={}; p256ecdsa={}",
                    codec::encode(as_keys.public_key()),
                    self.vapid.public_key()
                ),
            )
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_LENGTH, body.len())
            .body(body)?;

        Ok(request)
    }

    /// Sends `notification` to `subscription` and classifies the response.
    ///
    /// Validation, encryption and signing all happen before any network I/O;
    /// if one of them fails nothing is sent.
    pub async fn send(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<PushOutcome> {
        let result = self.try_send(subscription, notification).await;
        if let Err(err) = &result {
            self.audit(AuditEvent::new(step::SEND_FAILED, AuditStatus::Error).with_error(err));
        }
        result
    }

    async fn try_send(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<PushOutcome> {
        let request = self.build_request(subscription, notification)?;
        let endpoint = request.uri().to_string();

        log::debug!("dispatching push message to {}", endpoint);
        self.audit(
            AuditEvent::new(step::REQUEST_DISPATCHED, AuditStatus::Info)
                .with_payload(json!({ "endpoint": endpoint })),
        );

        let response = self
            .client
            .send(request)
            .await
            .map_err(|err| Error::Transport(err.into()))?;
        let outcome = PushOutcome::from_response(&response);

        log::debug!("push service at {} answered {}", endpoint, response.status());
        let status = if outcome.is_delivered() {
            AuditStatus::Success
        } else {
            AuditStatus::Error
        };
        self.audit(
            AuditEvent::new(step::RESPONSE_RECEIVED, status)
                .with_message(response.status().canonical_reason().unwrap_or_default())
                .with_payload(json!({ "endpoint": endpoint, "status": response.status().as_u16() })),
        );

        Ok(outcome)
    }

    /// Like [`PushDispatcher::send`], failing with
    /// [`Error::PushDeliveryFailed`] unless the message was delivered.
    pub async fn deliver(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<StatusCode> {
        self.send(subscription, notification).await?.into_result()
    }

    /// Looks up the recipient's subscription in `store` and sends to it.
    pub async fn send_to_recipient<S: SubscriberStore>(
        &self,
        store: &S,
        recipient_id: &str,
        notification: &Notification,
    ) -> Result<PushOutcome> {
        let subscription = store
            .find_subscription_by_recipient_id(recipient_id)
            .await
            .map_err(|err| Error::Store(err.into()))?
            .ok_or_else(|| Error::UnknownRecipient(recipient_id.to_string()))?;

        self.send(&subscription, notification).await
    }
}
