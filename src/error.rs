//! Error types for paywire
//!
//! All modules use `PaywireResult<T>` as their return type. Errors are
//! `Clone` so one resolved outcome can be handed to every coalesced caller.

use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for paywire operations
pub type PaywireResult<T> = Result<T, PaywireError>;

/// Shared underlying cause of a wrapped error
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// All errors that can occur in paywire
#[derive(Error, Debug, Clone)]
pub enum PaywireError {
    // Network errors
    #[error("Network error: {source}")]
    Network {
        #[source]
        source: Cause,
    },

    #[error("The {0} request lane is no longer running")]
    LaneClosed(&'static str),

    // Backend response errors
    #[error("Could not parse backend response (status {status}): {source}")]
    Parse {
        status: u16,
        #[source]
        source: Cause,
    },

    #[error("Unexpected backend response")]
    UnexpectedBackendResponse,

    #[error(
        "Backend error (status {status}, code {code}): {}",
        .message.as_deref().unwrap_or("no message")
    )]
    Backend {
        status: u16,
        code: BackendErrorCode,
        message: Option<String>,
        finishable: bool,
        attribute_errors: Option<Value>,
    },

    // Local validation errors
    #[error("Invalid app user id: the app user id must not be empty")]
    InvalidAppUserId,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("No API key configured")]
    MissingApiKey,

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    #[error("TOML parse error: {0}")]
    TomlParse(#[source] Arc<toml::de::Error>),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[source] Arc<toml::ser::Error>),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaywireError {
    /// Create a network error wrapping the underlying cause
    pub fn network(cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Network {
            source: Arc::from(cause.into()),
        }
    }

    /// Create a parse error, keeping the status code of the response
    pub fn parse(status: u16, cause: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Parse {
            status,
            source: Arc::from(cause.into()),
        }
    }

    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Build a backend-reported error from a `{code, message}` body.
    ///
    /// 4xx errors are finishable: the purchase should still be finished
    /// locally. 5xx errors are transient and must not be finished.
    pub fn backend(status: u16, body: Option<&serde_json::Map<String, Value>>) -> Self {
        let code = body
            .and_then(|b| b.get("code"))
            .map(BackendErrorCode::from_value)
            .unwrap_or(BackendErrorCode::Unknown);
        let message = body
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .map(String::from);

        Self::Backend {
            status,
            code,
            message,
            finishable: status < 500,
            attribute_errors: None,
        }
    }

    /// Attach subscriber attribute errors to a backend error
    pub fn with_attribute_errors(self, errors: Option<Value>) -> Self {
        match self {
            Self::Backend {
                status,
                code,
                message,
                finishable,
                ..
            } => Self::Backend {
                status,
                code,
                message,
                finishable,
                attribute_errors: errors,
            },
            other => other,
        }
    }

    /// Whether the purchase that produced this error may still be finished locally
    pub fn is_finishable(&self) -> bool {
        matches!(
            self,
            Self::Backend {
                finishable: true,
                ..
            }
        )
    }

    /// Check if error is transient and the operation may be retried later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::LaneClosed(_) => true,
            Self::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this error belongs to the network class
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::LaneClosed(_))
    }

    /// Backend error code, if the backend reported one
    pub fn backend_code(&self) -> Option<BackendErrorCode> {
        match self {
            Self::Backend { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingApiKey => {
                Some("Set backend.api_key in the config file or export PAYWIRE_API_KEY")
            }
            Self::InvalidAppUserId => Some("Pass a non-empty app user id"),
            Self::Backend {
                code: BackendErrorCode::InvalidApiKey,
                ..
            } => Some("Check that the API key belongs to this app"),
            Self::Network { .. } => Some("Check connectivity to the backend"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PaywireError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}

impl From<toml::de::Error> for PaywireError {
    fn from(e: toml::de::Error) -> Self {
        Self::TomlParse(Arc::new(e))
    }
}

impl From<toml::ser::Error> for PaywireError {
    fn from(e: toml::ser::Error) -> Self {
        Self::TomlSerialize(Arc::new(e))
    }
}

/// Error codes reported by the backend in the `code` field of an error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorCode {
    StoreProblem,
    CannotTransferPurchase,
    InvalidReceiptToken,
    InvalidAppStoreSharedSecret,
    InvalidPaymentModeOrIntroPrice,
    InternalServer,
    EmptyAppUserId,
    InvalidAuthToken,
    InvalidApiKey,
    BadRequest,
    UserIneligibleForPromoOffer,
    InvalidSubscriberAttributes,
    InvalidSubscriberAttributesBody,
    Unknown,
}

impl BackendErrorCode {
    /// Map a numeric backend code
    pub fn from_code(code: i64) -> Self {
        match code {
            7101 => Self::StoreProblem,
            7102 => Self::CannotTransferPurchase,
            7103 => Self::InvalidReceiptToken,
            7104 => Self::InvalidAppStoreSharedSecret,
            7105 => Self::InvalidPaymentModeOrIntroPrice,
            7110 => Self::InternalServer,
            7220 => Self::EmptyAppUserId,
            7224 => Self::InvalidAuthToken,
            7225 => Self::InvalidApiKey,
            7226 => Self::BadRequest,
            7232 => Self::UserIneligibleForPromoOffer,
            7263 => Self::InvalidSubscriberAttributes,
            7264 => Self::InvalidSubscriberAttributesBody,
            _ => Self::Unknown,
        }
    }

    /// Map a `code` JSON value, which the backend sends as a number or a numeric string
    pub fn from_value(value: &Value) -> Self {
        let code = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        code.map(Self::from_code).unwrap_or(Self::Unknown)
    }

    /// The numeric code, if known
    pub fn code(&self) -> Option<i64> {
        let code = match self {
            Self::StoreProblem => 7101,
            Self::CannotTransferPurchase => 7102,
            Self::InvalidReceiptToken => 7103,
            Self::InvalidAppStoreSharedSecret => 7104,
            Self::InvalidPaymentModeOrIntroPrice => 7105,
            Self::InternalServer => 7110,
            Self::EmptyAppUserId => 7220,
            Self::InvalidAuthToken => 7224,
            Self::InvalidApiKey => 7225,
            Self::BadRequest => 7226,
            Self::UserIneligibleForPromoOffer => 7232,
            Self::InvalidSubscriberAttributes => 7263,
            Self::InvalidSubscriberAttributesBody => 7264,
            Self::Unknown => return None,
        };
        Some(code)
    }
}

impl fmt::Display for BackendErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{:?}/{}", self, code),
            None => write!(f, "Unknown"),
        }
    }
}
