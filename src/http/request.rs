//! Request descriptors
//!
//! A request is an immutable value: method (with its body), path, extra
//! headers, and the execution lane it must run on. A GET cannot carry a
//! body and a POST cannot lack one; the type does not allow either.

use crate::error::{PaywireError, PaywireResult};
use crate::http::body::RequestBody;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Versioned path prefix of every backend endpoint
pub const API_VERSION: &str = "v1";

/// Execution lane of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// One request at a time, in submission order
    Ordered,
    /// No ordering guarantee, requests may overlap
    Concurrent,
}

impl Lane {
    /// Lane name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Lane::Ordered => "ordered",
            Lane::Concurrent => "concurrent",
        }
    }
}

/// HTTP method, carrying the body for POST
#[derive(Debug, Clone)]
pub enum HttpMethod {
    Get,
    Post(RequestBody),
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post(_) => "POST",
        }
    }

    /// Request body, present only for POST
    pub fn body(&self) -> Option<&RequestBody> {
        match self {
            HttpMethod::Get => None,
            HttpMethod::Post(body) => Some(body),
        }
    }
}

/// Backend endpoints, relative to the versioned root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestPath {
    Receipts,
    Subscriber(String),
    Offerings(String),
    IntroEligibility(String),
    Attribution(String),
    SubscriberAttributes(String),
    Alias(String),
    Identify,
    Offers,
}

impl RequestPath {
    fn segments(&self) -> Vec<&str> {
        match self {
            Self::Receipts => vec!["receipts"],
            Self::Subscriber(id) => vec!["subscribers", id.as_str()],
            Self::Offerings(id) => vec!["subscribers", id.as_str(), "offerings"],
            Self::IntroEligibility(id) => vec!["subscribers", id.as_str(), "intro_eligibility"],
            Self::Attribution(id) => vec!["subscribers", id.as_str(), "attribution"],
            Self::SubscriberAttributes(id) => vec!["subscribers", id.as_str(), "attributes"],
            Self::Alias(id) => vec!["subscribers", id.as_str(), "alias"],
            Self::Identify => vec!["subscribers", "identify"],
            Self::Offers => vec!["offers"],
        }
    }

    /// Absolute URL of this endpoint under `base`.
    ///
    /// Each segment is percent-encoded on its own, so an app user id
    /// containing `/` or spaces stays a single path segment.
    pub fn url(&self, base: &Url) -> PaywireResult<Url> {
        let mut url = base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                PaywireError::Internal(format!("backend URL {} cannot be a base", base))
            })?;
            segments.pop_if_empty().push(API_VERSION);
            for segment in self.segments() {
                segments.push(segment);
            }
        }
        Ok(url)
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in self.segments() {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

/// Immutable description of one backend request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: RequestPath,
    pub headers: BTreeMap<String, String>,
    pub lane: Lane,
}

impl HttpRequest {
    /// A GET request; reads run on the concurrent lane by default
    pub fn get(path: RequestPath) -> Self {
        Self {
            method: HttpMethod::Get,
            path,
            headers: BTreeMap::new(),
            lane: Lane::Concurrent,
        }
    }

    /// A POST request; writes run on the ordered lane by default
    pub fn post(path: RequestPath, body: RequestBody) -> Self {
        Self {
            method: HttpMethod::Post(body),
            path,
            headers: BTreeMap::new(),
            lane: Lane::Ordered,
        }
    }

    /// Move the request to another lane
    pub fn on_lane(mut self, lane: Lane) -> Self {
        self.lane = lane;
        self
    }

    /// Add or replace a caller-supplied header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Caller-supplied header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)
    }
}
