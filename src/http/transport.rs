//! Execution lanes
//!
//! The ordered lane is a single worker draining a queue: job N+1 does not
//! start until job N has finished, whatever the job does in between. The
//! concurrent lane spawns each job as its own task. The two lanes share
//! nothing, so neither can hold up the other.

use crate::error::{PaywireError, PaywireResult};
use crate::http::client::HttpClient;
use crate::http::request::{HttpRequest, Lane};
use crate::http::response::HttpResponse;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = BoxFuture<'static, ()>;

/// Runs work on the ordered and concurrent lanes
pub struct Transport {
    client: Arc<dyn HttpClient>,
    ordered: mpsc::UnboundedSender<Job>,
}

impl Transport {
    /// Start the ordered lane worker. Must be called inside a Tokio runtime.
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        let (ordered, mut queue) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = queue.recv().await {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    error!("A job on the ordered lane panicked");
                }
            }
            debug!("Ordered lane stopped");
        });

        Self { client, ordered }
    }

    /// Client used for every exchange
    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    /// Queue `work` on `lane`.
    ///
    /// The job is enqueued before this returns, so ordering on the ordered
    /// lane follows call order, not the order in which results are awaited.
    pub fn dispatch<F, T>(&self, lane: Lane, work: F) -> PaywireResult<Pending<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = async move {
            // Receiver may be gone if the caller stopped caring
            let _ = tx.send(work.await);
        };

        match lane {
            Lane::Ordered => self
                .ordered
                .send(Box::pin(job))
                .map_err(|_| PaywireError::LaneClosed(lane.name()))?,
            Lane::Concurrent => {
                tokio::spawn(job);
            }
        }

        Ok(Pending { lane, rx })
    }

    /// Perform one plain exchange on the request's lane
    pub async fn execute(&self, request: HttpRequest) -> HttpResponse {
        let client = Arc::clone(&self.client);
        let lane = request.lane;

        match self.dispatch(lane, async move { client.perform(&request).await }) {
            Ok(pending) => pending.await.unwrap_or_else(HttpResponse::failed),
            Err(e) => HttpResponse::failed(e),
        }
    }
}

/// Result of a dispatched job
pub struct Pending<T> {
    lane: Lane,
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Pending<T> {
    type Output = PaywireResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let lane = self.lane;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| PaywireError::LaneClosed(lane.name())))
    }
}
