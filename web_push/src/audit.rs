use crate::BoxError;
use serde_json::Value;

/// Outcome attached to an [`AuditEvent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditStatus {
    Info,
    Success,
    Error,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Info => "info",
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
        }
    }
}

/// Pipeline checkpoints reported to the [`AuditLogger`].
pub mod step {
    pub const KEY_MATERIAL_READY: &str = "key_material_ready";
    pub const SECRET_DERIVED: &str = "secret_derived";
    pub const PAYLOAD_ENCRYPTED: &str = "payload_encrypted";
    pub const REQUEST_DISPATCHED: &str = "request_dispatched";
    pub const RESPONSE_RECEIVED: &str = "response_received";
    pub const SEND_FAILED: &str = "send_failed";
}

/// One journal entry for a delivery attempt.
#[derive(Debug)]
pub struct AuditEvent<'a> {
    pub step: &'a str,
    pub status: AuditStatus,
    pub message: Option<&'a str>,
    pub payload: Option<Value>,
    pub error: Option<&'a (dyn std::error::Error + 'static)>,
}

impl<'a> AuditEvent<'a> {
    pub fn new(step: &'a str, status: AuditStatus) -> Self {
        Self {
            step,
            status,
            message: None,
            payload: None,
            error: None,
        }
    }

    pub fn with_message(self, message: &'a str) -> Self {
        Self {
            message: Some(message),
            ..self
        }
    }

    pub fn with_payload(self, payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..self
        }
    }

    pub fn with_error(self, error: &'a (dyn std::error::Error + 'static)) -> Self {
        Self {
            error: Some(error),
            ..self
        }
    }
}

/// Journal of delivery attempts.
///
/// Failures are reported by the dispatcher and otherwise ignored.
pub trait AuditLogger: Send + Sync {
    fn log(&self, event: &AuditEvent<'_>) -> Result<(), BoxError>;
}

/// [`AuditLogger`] writing to the `log` facade under `webpush::audit`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAuditLogger;

impl AuditLogger for LogAuditLogger {
    fn log(&self, event: &AuditEvent<'_>) -> Result<(), BoxError> {
        let level = match event.status {
            AuditStatus::Info => log::Level::Debug,
            AuditStatus::Success => log::Level::Info,
            AuditStatus::Error => log::Level::Warn,
        };
        log::log!(
            target: "webpush::audit",
            level,
            "{} [{}] {} {} {}",
            event.step,
            event.status.as_str(),
            event.message.unwrap_or(""),
            event.payload.as_ref().map(Value::to_string).unwrap_or_default(),
            event.error.map(|it| it.to_string()).unwrap_or_default(),
        );
        Ok(())
    }
}
