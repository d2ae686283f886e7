//! Scripted `HttpClient` for tests

use crate::http::body::JsonObject;
use crate::http::client::HttpClient;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Records every request and answers from a queue of scripted responses,
/// falling back to a default. A gated mock holds each call until released.
pub struct MockHttpClient {
    calls: Mutex<Vec<HttpRequest>>,
    responses: Mutex<VecDeque<HttpResponse>>,
    default: HttpResponse,
    gate: Option<Arc<Semaphore>>,
}

impl MockHttpClient {
    /// Answers `200 {}` unless told otherwise
    pub fn new() -> Self {
        Self::with_default(HttpResponse::new(200, JsonObject::new()))
    }

    pub fn with_default(default: HttpResponse) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            default,
            gate: None,
        }
    }

    /// Calls block until `release` lets them through
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    pub fn release(&self, calls: usize) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(calls);
        }
    }

    /// Queue a response for the next unanswered call
    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Yield until at least `count` calls have been received
    pub async fn wait_for_calls(&self, count: usize) {
        while self.call_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn perform(&self, request: &HttpRequest) -> HttpResponse {
        self.calls.lock().unwrap().push(request.clone());

        if let Some(ref gate) = self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}
