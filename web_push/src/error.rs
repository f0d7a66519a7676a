use http::StatusCode;
use thiserror::Error;

/// Result with this crate's error.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error coming from a caller-supplied collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid VAPID configuration: {0}")]
    Configuration(String),

    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("invalid public key: {0}")]
    InvalidKey(&'static str),

    #[error("invalid signature: {0}")]
    InvalidSignature(&'static str),

    #[error("no subscription stored for recipient {0}")]
    UnknownRecipient(String),

    #[error("push service answered {status} {status_text}: {body}")]
    PushDeliveryFailed {
        status: StatusCode,
        status_text: String,
        body: String,
    },

    #[error("could not encrypt using ECE: {0}")]
    Encryption(#[from] webpush_ece::Error),

    #[error("could not serialize payload")]
    Json(#[from] serde_json::Error),

    #[error("could not build request")]
    Http(#[from] http::Error),

    #[error("transport failed: {0}")]
    Transport(#[source] BoxError),

    #[error("subscriber store failed: {0}")]
    Store(#[source] BoxError),
}
