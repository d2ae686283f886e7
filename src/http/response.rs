//! Normalized backend responses

use crate::error::PaywireError;
use crate::http::body::JsonObject;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::error;

/// Status code of a conditional response with no body
pub const NOT_MODIFIED: u16 = 304;

/// Outcome of one HTTP exchange.
///
/// `status` is `None` when the request never reached the backend. A
/// response either carries a body or an error; a successful exchange
/// with no content carries an empty object.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<JsonObject>,
    pub error: Option<PaywireError>,
}

impl HttpResponse {
    /// A response with a parsed body
    pub fn new(status: u16, body: JsonObject) -> Self {
        Self {
            status: Some(status),
            headers: BTreeMap::new(),
            body: Some(body),
            error: None,
        }
    }

    /// A request that failed before any status was received
    pub fn failed(error: PaywireError) -> Self {
        Self {
            status: None,
            headers: BTreeMap::new(),
            body: None,
            error: Some(error),
        }
    }

    /// Build a response from what came off the wire.
    ///
    /// Empty bodies and 304s become an empty object. A body that is not a
    /// JSON object is a parse error, except on 5xx where the server is
    /// considered unreachable and the failure is reported as a network error.
    pub fn from_raw(status: u16, headers: BTreeMap<String, String>, bytes: &[u8]) -> Self {
        let server_error = status >= 500;
        let blank = bytes.iter().all(u8::is_ascii_whitespace);

        let (body, error) = if status == NOT_MODIFIED || (blank && !server_error) {
            (Some(JsonObject::new()), None)
        } else if blank {
            (
                None,
                Some(PaywireError::network(format!(
                    "server error {} with an empty body",
                    status
                ))),
            )
        } else {
            match serde_json::from_slice::<Value>(bytes) {
                Ok(Value::Object(map)) => (Some(map), None),
                Ok(other) => {
                    let reason = format!("expected a JSON object, got {}", kind(&other));
                    (None, Some(Self::unparseable(status, reason)))
                }
                Err(e) => (None, Some(Self::unparseable(status, e))),
            }
        };

        if let Some(ref e) = error {
            error!("Backend response (status {}) unusable: {}", status, e);
        }

        Self {
            status: Some(status),
            headers,
            body,
            error,
        }
    }

    fn unparseable(
        status: u16,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> PaywireError {
        if status >= 500 {
            PaywireError::network(cause)
        } else {
            PaywireError::parse(status, cause)
        }
    }

    /// Add a response header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Response header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx with no transport or parse error
    pub fn is_success(&self) -> bool {
        self.error.is_none() && matches!(self.status, Some(200..=299))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
