use serde_json::Value;
use thiserror::Error;

use crate::types::{ChainMethod, DriverId, Platform, Verb};

// ---------------------------------------------------------------------------
// RecordsError
// ---------------------------------------------------------------------------

/// All failure modes of the request orchestration engine.
///
/// Configuration and unsupported-operation variants are returned synchronously
/// from the terminal verb call (programmer error, fail fast). Transport errors
/// travel through the response stream and always pair with stream completion.
#[derive(Debug, Error)]
pub enum RecordsError {
    /// A required base option is missing for the requested verb.
    #[error("{option} needed for [{verb}]")]
    Config { option: &'static str, verb: Verb },

    /// The verb is not available for the selected driver.
    #[error("[{verb}] verb unavailable for driver [{driver}]")]
    UnsupportedVerb { driver: DriverId, verb: Verb },

    /// The chaining method is not available for the selected driver
    /// in the current execution context.
    #[error("[{method}] chaining method unavailable for driver [{driver}] on {platform}")]
    UnsupportedChain {
        driver: DriverId,
        method: ChainMethod,
        platform: Platform,
    },

    /// The resolved driver has no instance in the registry.
    #[error("driver [{0}] is not registered")]
    DriverNotRegistered(DriverId),

    /// Network/backend failure, surfaced through the stream's error items.
    ///
    /// `body` carries the backend's error payload when the transport exposed
    /// one (preferred over the bare message when forwarding to consumers).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        body: Option<Value>,
    },

    /// Storage collaborator failure. Inside the decision policy these are
    /// caught and downgraded to a cache miss; the variant surfaces from the
    /// explicit cache operations (`clear_cache`, `feed`).
    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RecordsError {
    /// A transport error with no structured body.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            body: None,
        }
    }

    /// A transport error carrying the backend's error payload.
    pub fn transport_with_body(message: impl Into<String>, body: Value) -> Self {
        Self::Transport {
            message: message.into(),
            body: Some(body),
        }
    }

    /// The payload to forward to the consumer: the nested transport body when
    /// present, otherwise the rendered message.
    pub fn error_payload(&self) -> Value {
        match self {
            Self::Transport {
                body: Some(body), ..
            } => body.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

/// Convenience alias — the default error type is `RecordsError`.
pub type Result<T, E = RecordsError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
