//! ETag protocol on top of raw exchanges
//!
//! Before dispatch the stored ETag for the request URL is attached as
//! `If-None-Match`. After the exchange, fresh 2xx responses are stored and
//! 304s are answered from the store. A 304 for a URL the store has lost is
//! retried once with an empty `If-None-Match`; a second 304 is handed back
//! as is.

use crate::error::PaywireResult;
use crate::etag::store::{EtagEntry, EtagStore};
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, NOT_MODIFIED};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Conditional request header
pub const IF_NONE_MATCH: &str = "If-None-Match";

/// Response header carrying the ETag
pub const ETAG_RESPONSE_HEADER: &str = "X-RevenueCat-ETag";

/// Owns the ETag store and applies the protocol to requests and responses
pub struct ConditionalCache {
    store: Arc<dyn EtagStore>,
    base_url: Url,
}

impl ConditionalCache {
    pub fn new(store: Arc<dyn EtagStore>, base_url: Url) -> Self {
        Self { store, base_url }
    }

    fn url_for(&self, request: &HttpRequest) -> Option<String> {
        request
            .path
            .url(&self.base_url)
            .ok()
            .map(|url| url.to_string())
    }

    async fn stored(&self, url: &str) -> Option<EtagEntry> {
        match self.store.get(url).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Could not read ETag entry for {}: {}", url, e);
                None
            }
        }
    }

    /// Value for `If-None-Match`: the stored ETag, or empty when nothing is
    /// stored or a refresh is forced
    pub async fn header_for_request(&self, request: &HttpRequest, force_refresh: bool) -> String {
        if force_refresh {
            return String::new();
        }

        let Some(url) = self.url_for(request) else {
            return String::new();
        };

        match self.stored(&url).await {
            Some(entry) => {
                debug!("Using ETag {} for {}", entry.etag, url);
                entry.etag
            }
            None => String::new(),
        }
    }

    /// Copy of `request` with the conditional header attached
    pub async fn prepare(&self, request: &HttpRequest, force_refresh: bool) -> HttpRequest {
        let etag = self.header_for_request(request, force_refresh).await;
        request.clone().with_header(IF_NONE_MATCH, etag)
    }

    /// Apply the protocol to a raw response.
    ///
    /// Returns `None` only for a 304 with nothing stored on a first attempt;
    /// the caller must then repeat the request with `force_refresh` set.
    pub async fn resolve(
        &self,
        response: HttpResponse,
        request: &HttpRequest,
        was_retried: bool,
    ) -> Option<HttpResponse> {
        if response.error.is_some() {
            return Some(response);
        }

        let Some(status) = response.status else {
            return Some(response);
        };

        let Some(url) = self.url_for(request) else {
            return Some(response);
        };

        if status == NOT_MODIFIED {
            if let Some(entry) = self.stored(&url).await {
                debug!("{} not modified, answering from ETag cache", url);
                let mut cached = HttpResponse::new(entry.status_code, entry.body);
                cached.headers = response.headers;
                return Some(cached);
            }

            if !was_retried {
                debug!("304 for {} without a stored entry, retrying", url);
                return None;
            }

            warn!(
                "304 for {} without a stored entry after a forced refresh",
                url
            );
            return Some(response);
        }

        if (200..300).contains(&status) {
            self.remember(&url, status, &response).await;
        }

        Some(response)
    }

    async fn remember(&self, url: &str, status: u16, response: &HttpResponse) {
        let Some(etag) = response.header(ETAG_RESPONSE_HEADER) else {
            return;
        };
        let Some(ref body) = response.body else {
            return;
        };

        let entry = EtagEntry::new(url, etag, status, body.clone());
        if let Err(e) = self.store.set(entry).await {
            warn!("Could not store ETag entry for {}: {}", url, e);
        }
    }

    /// Erase every stored entry
    pub async fn clear(&self) -> PaywireResult<()> {
        self.store.clear().await
    }

    /// Every stored entry
    pub async fn entries(&self) -> PaywireResult<Vec<EtagEntry>> {
        self.store.entries().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaywireError;
    use crate::etag::store::MemoryEtagStore;
    use crate::http::body::JsonObject;
    use crate::http::request::RequestPath;
    use serde_json::json;

    const URL: &str = "https://api.example.com/v1/subscribers/user";

    fn cache() -> ConditionalCache {
        ConditionalCache::new(
            Arc::new(MemoryEtagStore::new()),
            Url::parse("https://api.example.com").unwrap(),
        )
    }

    fn request() -> HttpRequest {
        HttpRequest::get(RequestPath::Subscriber("user".to_string()))
    }

    fn body(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn no_entry_sends_empty_header() {
        let cache = cache();
        let prepared = cache.prepare(&request(), false).await;
        assert_eq!(prepared.header(IF_NONE_MATCH), Some(""));
    }

    #[tokio::test]
    async fn success_is_stored_and_reused() {
        let cache = cache();
        let response =
            HttpResponse::new(200, body(json!({"a": 1}))).with_header(ETAG_RESPONSE_HEADER, "tag1");

        let resolved = cache.resolve(response, &request(), false).await.unwrap();
        assert_eq!(resolved.status, Some(200));

        let stored = cache.entries().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, URL);

        assert_eq!(cache.header_for_request(&request(), false).await, "tag1");
        assert_eq!(cache.header_for_request(&request(), true).await, "");
    }

    #[tokio::test]
    async fn success_without_etag_is_not_stored() {
        let cache = cache();
        let response = HttpResponse::new(200, body(json!({"a": 1})));

        assert!(cache.resolve(response, &request(), false).await.is_some());
        assert!(cache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn not_modified_with_entry_uses_stored_response() {
        let cache = cache();
        let fresh =
            HttpResponse::new(201, body(json!({"a": 1}))).with_header(ETAG_RESPONSE_HEADER, "tag1");
        cache.resolve(fresh, &request(), false).await;

        let resolved = cache
            .resolve(HttpResponse::new(304, JsonObject::new()), &request(), false)
            .await
            .unwrap();

        assert_eq!(resolved.status, Some(201));
        assert_eq!(resolved.body.unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn not_modified_without_entry_asks_for_retry() {
        let cache = cache();
        let resolved = cache
            .resolve(HttpResponse::new(304, JsonObject::new()), &request(), false)
            .await;
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn not_modified_without_entry_after_retry_is_returned() {
        let cache = cache();
        let resolved = cache
            .resolve(HttpResponse::new(304, JsonObject::new()), &request(), true)
            .await
            .unwrap();
        assert_eq!(resolved.status, Some(304));
    }

    #[tokio::test]
    async fn errors_are_not_stored() {
        let cache = cache();
        let response = HttpResponse::new(500, body(json!({"code": 7110})))
            .with_header(ETAG_RESPONSE_HEADER, "tag1");

        let resolved = cache.resolve(response, &request(), false).await.unwrap();
        assert_eq!(resolved.status, Some(500));
        assert!(cache.entries().await.unwrap().is_empty());

        let failed = HttpResponse::failed(PaywireError::network("offline"));
        let resolved = cache.resolve(failed, &request(), false).await.unwrap();
        assert!(resolved.error.is_some());
    }

    #[tokio::test]
    async fn clear_forgets_entries() {
        let cache = cache();
        let response =
            HttpResponse::new(200, body(json!({}))).with_header(ETAG_RESPONSE_HEADER, "tag1");
        cache.resolve(response, &request(), false).await;

        cache.clear().await.unwrap();
        assert_eq!(cache.header_for_request(&request(), false).await, "");
    }
}
