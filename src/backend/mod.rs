//! Backend operations
//!
//! `RequestCoordinator` is what the rest of an application talks to. Each
//! operation builds its request, runs it through the ETag protocol on the
//! lane it belongs to, and decodes the result. Receipt submissions,
//! subscriber and offerings fetches, aliases and logins are coalesced: while
//! one is in flight, identical calls wait for its outcome instead of going
//! out again.

pub mod fingerprint;
pub mod in_flight;
pub mod types;

pub use fingerprint::{CacheKey, OperationKey};
pub use in_flight::{InFlightRegistry, Registration};
pub use types::{
    IntroEligibility, LoginOutcome, OfferSigningRequest, OfferingsPayload, ReceiptSubmission,
    SignedOffer, SubscriberState,
};

use crate::config::Config;
use crate::error::{PaywireError, PaywireResult};
use crate::etag::{ConditionalCache, EtagStore, FileEtagStore, MemoryEtagStore};
use crate::http::body::{
    fetch_token, AliasBody, AttributionBody, AttributionNetwork, IdentifyBody,
    IntroEligibilityBody, JsonObject, OfferSigningBody, OfferToSign, PostReceiptBody, RequestBody,
    SubscriberAttribute, SubscriberAttributesBody,
};
use crate::http::client::{HttpClient, UreqClient};
use crate::http::request::{HttpRequest, Lane, RequestPath};
use crate::http::response::HttpResponse;
use crate::http::transport::Transport;
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Entry point for every backend operation
pub struct RequestCoordinator {
    transport: Transport,
    cache: Arc<ConditionalCache>,
    subscribers: Arc<InFlightRegistry<SubscriberState>>,
    offerings: Arc<InFlightRegistry<OfferingsPayload>>,
    aliases: Arc<InFlightRegistry<()>>,
    logins: Arc<InFlightRegistry<LoginOutcome>>,
}

impl RequestCoordinator {
    /// Must be called inside a Tokio runtime
    pub fn new(client: Arc<dyn HttpClient>, cache: ConditionalCache) -> Self {
        Self {
            transport: Transport::new(client),
            cache: Arc::new(cache),
            subscribers: Arc::new(InFlightRegistry::new()),
            offerings: Arc::new(InFlightRegistry::new()),
            aliases: Arc::new(InFlightRegistry::new()),
            logins: Arc::new(InFlightRegistry::new()),
        }
    }

    /// Build the production stack: `ureq` client plus the configured ETag store
    pub fn from_config(config: &Config) -> PaywireResult<Self> {
        let client = UreqClient::new(config)?;
        let base_url = client.base_url().clone();

        let store: Arc<dyn EtagStore> = if config.cache.persist {
            Arc::new(FileEtagStore::new(config.etag_dir()))
        } else {
            Arc::new(MemoryEtagStore::new())
        };

        Ok(Self::new(
            Arc::new(client),
            ConditionalCache::new(store, base_url),
        ))
    }

    /// The ETag cache this coordinator writes through
    pub fn cache(&self) -> &ConditionalCache {
        &self.cache
    }

    /// Post a receipt and get the resulting subscriber state. Runs on the
    /// ordered lane; identical concurrent submissions share one call.
    pub async fn submit_receipt(
        &self,
        submission: ReceiptSubmission,
    ) -> PaywireResult<SubscriberState> {
        let key = OperationKey::SubmitReceipt(&submission).fingerprint();
        let body = PostReceiptBody {
            fetch_token: fetch_token(&submission.receipt),
            app_user_id: submission.app_user_id,
            is_restore: submission.is_restore,
            observer_mode: submission.observer_mode,
            product: submission.product,
            presented_offering_identifier: submission.presented_offering_identifier,
            attributes: submission.attributes,
        };
        let request = HttpRequest::post(RequestPath::Receipts, RequestBody::PostReceipt(body));

        self.coalesce(&self.subscribers, key, request, decode_subscriber)
            .await
    }

    /// Current subscriber state. Concurrent calls for the same user share one call.
    pub async fn fetch_subscriber_state(
        &self,
        app_user_id: &str,
    ) -> PaywireResult<SubscriberState> {
        let key = OperationKey::SubscriberState { app_user_id }.fingerprint();
        let request = HttpRequest::get(RequestPath::Subscriber(app_user_id.to_string()));

        self.coalesce(&self.subscribers, key, request, decode_subscriber)
            .await
    }

    /// Offerings for a user. An empty id fails without touching the network.
    pub async fn fetch_offerings(&self, app_user_id: &str) -> PaywireResult<OfferingsPayload> {
        let app_user_id = app_user_id.trim();
        if app_user_id.is_empty() {
            warn!("Refusing to fetch offerings for an empty app user id");
            return Err(PaywireError::InvalidAppUserId);
        }

        let key = OperationKey::Offerings { app_user_id }.fingerprint();
        let request = HttpRequest::get(RequestPath::Offerings(app_user_id.to_string()));

        self.coalesce(&self.offerings, key, request, decode_offerings)
            .await
    }

    /// Introductory offer eligibility per product. Never fails: anything the
    /// backend cannot answer is `Unknown`.
    pub async fn fetch_intro_eligibility(
        &self,
        app_user_id: &str,
        receipt: &[u8],
        product_identifiers: &[String],
    ) -> HashMap<String, IntroEligibility> {
        let unknown = || {
            product_identifiers
                .iter()
                .map(|id| (id.clone(), IntroEligibility::Unknown))
                .collect::<HashMap<_, _>>()
        };

        if product_identifiers.is_empty() {
            return HashMap::new();
        }
        if receipt.is_empty() {
            debug!("No receipt, intro eligibility unknown");
            return unknown();
        }

        let body = IntroEligibilityBody {
            fetch_token: fetch_token(receipt),
            product_identifiers: product_identifiers.to_vec(),
        };
        let request = HttpRequest::post(
            RequestPath::IntroEligibility(app_user_id.to_string()),
            RequestBody::IntroEligibility(body),
        )
        .on_lane(Lane::Concurrent);

        match checked(self.exchange(request).await) {
            Ok((_, body)) => product_identifiers
                .iter()
                .map(|id| (id.clone(), IntroEligibility::from_value(body.get(id))))
                .collect(),
            Err(e) => {
                debug!("Intro eligibility unavailable: {}", e);
                unknown()
            }
        }
    }

    /// Forward attribution data from an ad network
    pub async fn post_attribution_data(
        &self,
        app_user_id: &str,
        network: AttributionNetwork,
        data: JsonObject,
    ) -> PaywireResult<()> {
        let request = HttpRequest::post(
            RequestPath::Attribution(app_user_id.to_string()),
            RequestBody::Attribution(AttributionBody { network, data }),
        );

        checked(self.exchange(request).await).map(|_| ())
    }

    /// Set subscriber attributes. An empty map is a no-op.
    pub async fn post_subscriber_attributes(
        &self,
        app_user_id: &str,
        attributes: BTreeMap<String, SubscriberAttribute>,
    ) -> PaywireResult<()> {
        if attributes.is_empty() {
            warn!("No subscriber attributes to post for {}", app_user_id);
            return Ok(());
        }

        let request = HttpRequest::post(
            RequestPath::SubscriberAttributes(app_user_id.to_string()),
            RequestBody::SubscriberAttributes(SubscriberAttributesBody { attributes }),
        );

        checked(self.exchange(request).await).map(|_| ())
    }

    /// Alias `app_user_id` to `new_app_user_id`. Runs on the ordered lane;
    /// identical concurrent aliases share one call.
    pub async fn create_alias(&self, app_user_id: &str, new_app_user_id: &str) -> PaywireResult<()> {
        let key = OperationKey::Alias {
            app_user_id,
            new_app_user_id,
        }
        .fingerprint();
        let request = HttpRequest::post(
            RequestPath::Alias(app_user_id.to_string()),
            RequestBody::Alias(AliasBody {
                new_app_user_id: new_app_user_id.to_string(),
            }),
        );

        self.coalesce(&self.aliases, key, request, decode_empty)
            .await
    }

    /// Switch from `current_app_user_id` to `new_app_user_id`
    pub async fn login(
        &self,
        current_app_user_id: &str,
        new_app_user_id: &str,
    ) -> PaywireResult<LoginOutcome> {
        let key = OperationKey::Login {
            current_app_user_id,
            new_app_user_id,
        }
        .fingerprint();
        let request = HttpRequest::post(
            RequestPath::Identify,
            RequestBody::Identify(IdentifyBody {
                app_user_id: current_app_user_id.to_string(),
                new_app_user_id: new_app_user_id.to_string(),
            }),
        );

        self.coalesce(&self.logins, key, request, decode_login)
            .await
    }

    /// Ask the backend to sign a promotional offer
    pub async fn post_offer_for_signing(
        &self,
        offer: OfferSigningRequest,
    ) -> PaywireResult<SignedOffer> {
        let body = OfferSigningBody {
            app_user_id: offer.app_user_id,
            fetch_token: fetch_token(&offer.receipt),
            generate_offers: vec![OfferToSign {
                offer_id: offer.offer_identifier,
                product_id: offer.product_identifier,
                subscription_group: offer.subscription_group,
            }],
        };
        let request = HttpRequest::post(RequestPath::Offers, RequestBody::OfferSigning(body));

        let (status, body) = checked(self.exchange(request).await)?;
        decode_signed_offer(status, &body)
    }

    /// Forget every stored ETag
    pub async fn clear_caches(&self) -> PaywireResult<()> {
        self.cache.clear().await
    }

    /// Run `request` through the ETag protocol on its lane
    async fn exchange(&self, request: HttpRequest) -> HttpResponse {
        let lane = request.lane;
        let job = conditional_exchange(
            Arc::clone(self.transport.client()),
            Arc::clone(&self.cache),
            request,
        );

        match self.transport.dispatch(lane, job) {
            Ok(pending) => pending.await.unwrap_or_else(HttpResponse::failed),
            Err(e) => HttpResponse::failed(e),
        }
    }

    /// Join the operation in flight under `key`, or start it
    async fn coalesce<T>(
        &self,
        registry: &Arc<InFlightRegistry<T>>,
        key: CacheKey,
        request: HttpRequest,
        decode: fn(HttpResponse) -> PaywireResult<T>,
    ) -> PaywireResult<T>
    where
        T: Clone + Send + 'static,
    {
        let lane = request.lane;
        let (tx, rx) = oneshot::channel();
        let registration = registry.register(
            key.clone(),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );

        match registration {
            Registration::Joined => debug!("Joining in-flight {} ({})", request, key),
            Registration::Leader => {
                debug!("Starting {} ({})", request, key);
                let exchange = conditional_exchange(
                    Arc::clone(self.transport.client()),
                    Arc::clone(&self.cache),
                    request,
                );
                let done = Arc::clone(registry);
                let done_key = key.clone();

                let dispatched = self.transport.dispatch(lane, async move {
                    // Waiters only hear back through `complete`, so a panic
                    // must still settle the key
                    let outcome = AssertUnwindSafe(async move { decode(exchange.await) })
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            error!("Request for {} panicked", done_key);
                            Err(PaywireError::Internal(
                                "request panicked before completing".to_string(),
                            ))
                        });
                    done.complete(&done_key, outcome);
                });

                if let Err(e) = dispatched {
                    registry.complete(&key, Err(e));
                }
            }
        }

        rx.await
            .map_err(|_| PaywireError::LaneClosed(lane.name()))?
    }
}

/// One request, retried once without `If-None-Match` when a 304 arrives
/// for a URL the store has lost. Runs entirely inside one lane job, so an
/// ordered request keeps its slot across the retry.
async fn conditional_exchange(
    client: Arc<dyn HttpClient>,
    cache: Arc<ConditionalCache>,
    request: HttpRequest,
) -> HttpResponse {
    let mut retried = false;
    loop {
        let prepared = cache.prepare(&request, retried).await;
        let response = client.perform(&prepared).await;

        match cache.resolve(response, &prepared, retried).await {
            Some(resolved) => return resolved,
            None => {
                debug!("Repeating {} with a forced refresh", request);
                retried = true;
            }
        }
    }
}

/// Status and body of a successful exchange; the error otherwise
fn checked(response: HttpResponse) -> PaywireResult<(u16, JsonObject)> {
    if let Some(e) = response.error {
        return Err(e);
    }

    let status = response
        .status
        .ok_or_else(|| PaywireError::Internal("response without status or error".to_string()))?;
    let body = response.body.unwrap_or_default();

    if status >= 300 {
        return Err(PaywireError::backend(status, Some(&body))
            .with_attribute_errors(attribute_errors(&body)));
    }

    Ok((status, body))
}

fn attribute_errors(body: &JsonObject) -> Option<Value> {
    body.get("attribute_errors")
        .or_else(|| {
            body.get("attributes_error_response")
                .and_then(|nested| nested.get("attribute_errors"))
        })
        .cloned()
}

fn decode_subscriber(response: HttpResponse) -> PaywireResult<SubscriberState> {
    let (_, body) = checked(response)?;
    SubscriberState::from_body(&body).ok_or(PaywireError::UnexpectedBackendResponse)
}

fn decode_login(response: HttpResponse) -> PaywireResult<LoginOutcome> {
    let (status, body) = checked(response)?;
    let subscriber =
        SubscriberState::from_body(&body).ok_or(PaywireError::UnexpectedBackendResponse)?;

    Ok(LoginOutcome {
        subscriber,
        created: status == 201,
    })
}

fn decode_empty(response: HttpResponse) -> PaywireResult<()> {
    checked(response).map(|_| ())
}

fn decode_offerings(response: HttpResponse) -> PaywireResult<OfferingsPayload> {
    let (_, body) = checked(response)?;
    OfferingsPayload::from_body(&body).ok_or(PaywireError::UnexpectedBackendResponse)
}

fn decode_signed_offer(status: u16, body: &JsonObject) -> PaywireResult<SignedOffer> {
    let offer = body
        .get("offers")
        .and_then(Value::as_array)
        .and_then(|offers| offers.first())
        .and_then(Value::as_object)
        .ok_or(PaywireError::UnexpectedBackendResponse)?;

    if let Some(error) = offer.get("signature_error").and_then(Value::as_object) {
        return Err(PaywireError::backend(status, Some(error)));
    }

    let data = offer
        .get("signature_data")
        .and_then(Value::as_object)
        .ok_or(PaywireError::UnexpectedBackendResponse)?;

    let text = |map: &JsonObject, field: &str| {
        map.get(field)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or(PaywireError::UnexpectedBackendResponse)
    };

    let nonce = text(data, "nonce")?
        .parse()
        .map_err(|_| PaywireError::UnexpectedBackendResponse)?;
    let timestamp = data
        .get("timestamp")
        .and_then(Value::as_i64)
        .ok_or(PaywireError::UnexpectedBackendResponse)?;

    Ok(SignedOffer {
        signature: text(data, "signature")?,
        key_identifier: text(offer, "key_id")?,
        nonce,
        timestamp,
    })
}
