//! Typed backend payloads and operation inputs

use crate::http::body::{JsonObject, ProductInfo, SubscriberAttribute};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// `GET /subscribers/{id}` and `POST /receipts` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_date: Option<String>,
    pub subscriber: Subscriber,
}

impl SubscriberState {
    /// Decode a response body; `None` when the subscriber is missing
    pub fn from_body(body: &JsonObject) -> Option<Self> {
        serde_json::from_value(Value::Object(body.clone())).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub original_app_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_application_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_url: Option<String>,
    #[serde(default)]
    pub entitlements: JsonObject,
    #[serde(default)]
    pub subscriptions: JsonObject,
    #[serde(default)]
    pub non_subscriptions: JsonObject,
}

/// `GET /subscribers/{id}/offerings` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingsPayload {
    #[serde(default)]
    pub current_offering_id: Option<String>,
    pub offerings: Vec<OfferingPayload>,
}

impl OfferingsPayload {
    pub fn from_body(body: &JsonObject) -> Option<Self> {
        serde_json::from_value(Value::Object(body.clone())).ok()
    }

    /// The offering marked as current, if it is listed
    pub fn current(&self) -> Option<&OfferingPayload> {
        let id = self.current_offering_id.as_deref()?;
        self.offerings.iter().find(|o| o.identifier == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingPayload {
    pub identifier: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub packages: Vec<PackagePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagePayload {
    pub identifier: String,
    pub platform_product_identifier: String,
}

/// Whether a subscriber may still use a product's introductory offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntroEligibility {
    Eligible,
    Ineligible,
    Unknown,
}

impl IntroEligibility {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_bool) {
            Some(true) => Self::Eligible,
            Some(false) => Self::Ineligible,
            None => Self::Unknown,
        }
    }
}

/// Backend signature for a promotional offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOffer {
    pub signature: String,
    pub key_identifier: String,
    pub nonce: Uuid,
    pub timestamp: i64,
}

/// Inputs of a receipt submission
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptSubmission {
    pub receipt: Vec<u8>,
    pub app_user_id: String,
    pub is_restore: bool,
    pub observer_mode: bool,
    pub product: Option<ProductInfo>,
    pub presented_offering_identifier: Option<String>,
    pub attributes: Option<BTreeMap<String, SubscriberAttribute>>,
}

impl ReceiptSubmission {
    /// Bare submission: receipt and user only
    pub fn new(receipt: impl Into<Vec<u8>>, app_user_id: impl Into<String>) -> Self {
        Self {
            receipt: receipt.into(),
            app_user_id: app_user_id.into(),
            is_restore: false,
            observer_mode: false,
            product: None,
            presented_offering_identifier: None,
            attributes: None,
        }
    }
}

/// Inputs of an offer signing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferSigningRequest {
    pub offer_identifier: String,
    pub product_identifier: String,
    pub subscription_group: String,
    pub receipt: Vec<u8>,
    pub app_user_id: String,
}

/// Result of `login`
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub subscriber: SubscriberState,
    /// The backend created a new subscriber (201)
    pub created: bool,
}
