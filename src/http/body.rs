//! Typed request bodies
//!
//! One variant per backend operation. Bodies are serialized once, right
//! before dispatch; a body that cannot become JSON (a non-finite price,
//! for instance) fails there and never reaches the network.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// JSON object as sent and received on the wire
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Request body of a backend operation
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RequestBody {
    PostReceipt(PostReceiptBody),
    IntroEligibility(IntroEligibilityBody),
    Attribution(AttributionBody),
    SubscriberAttributes(SubscriberAttributesBody),
    Alias(AliasBody),
    Identify(IdentifyBody),
    OfferSigning(OfferSigningBody),
}

impl RequestBody {
    /// Serialize to JSON bytes
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// `POST /receipts`
#[derive(Debug, Clone, Serialize)]
pub struct PostReceiptBody {
    pub fetch_token: String,
    pub app_user_id: String,
    pub is_restore: bool,
    pub observer_mode: bool,
    #[serde(flatten)]
    pub product: Option<ProductInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presented_offering_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, SubscriberAttribute>>,
}

/// `POST /subscribers/{id}/intro_eligibility`
#[derive(Debug, Clone, Serialize)]
pub struct IntroEligibilityBody {
    pub fetch_token: String,
    pub product_identifiers: Vec<String>,
}

/// `POST /subscribers/{id}/attribution`
#[derive(Debug, Clone, Serialize)]
pub struct AttributionBody {
    pub network: AttributionNetwork,
    pub data: JsonObject,
}

/// `POST /subscribers/{id}/attributes`
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberAttributesBody {
    pub attributes: BTreeMap<String, SubscriberAttribute>,
}

/// `POST /subscribers/{id}/alias`
#[derive(Debug, Clone, Serialize)]
pub struct AliasBody {
    pub new_app_user_id: String,
}

/// `POST /subscribers/identify`
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyBody {
    pub app_user_id: String,
    pub new_app_user_id: String,
}

/// `POST /offers`
#[derive(Debug, Clone, Serialize)]
pub struct OfferSigningBody {
    pub app_user_id: String,
    pub fetch_token: String,
    pub generate_offers: Vec<OfferToSign>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OfferToSign {
    pub offer_id: String,
    pub product_id: String,
    pub subscription_group: String,
}

/// Product being purchased, as reported with a receipt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductInfo {
    #[serde(rename = "product_id")]
    pub product_identifier: String,
    #[serde(serialize_with = "finite")]
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(
        rename = "subscription_group_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub subscription_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_mode: Option<PaymentMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_duration: Option<String>,
    #[serde(flatten)]
    pub intro_duration: Option<IntroDuration>,
    #[serde(
        rename = "introductory_price",
        serialize_with = "finite_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub intro_price: Option<f64>,
    #[serde(rename = "offers", skip_serializing_if = "Vec::is_empty")]
    pub discounts: Vec<PromotionalOffer>,
}

impl ProductInfo {
    /// Product with a price and nothing else
    pub fn new(product_identifier: impl Into<String>, price: f64) -> Self {
        Self {
            product_identifier: product_identifier.into(),
            price,
            currency: None,
            subscription_group: None,
            payment_mode: None,
            normal_duration: None,
            intro_duration: None,
            intro_price: None,
            discounts: Vec::new(),
        }
    }
}

/// Introductory period, keyed by the kind of introductory offer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IntroDuration {
    #[serde(rename = "trial_duration")]
    FreeTrial(String),
    #[serde(rename = "intro_duration")]
    IntroPrice(String),
}

/// Discount attached to a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionalOffer {
    #[serde(rename = "offer_identifier")]
    pub identifier: String,
    #[serde(serialize_with = "finite")]
    pub price: f64,
    pub payment_mode: PaymentMode,
}

/// How an introductory or promotional price is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMode {
    PayAsYouGo,
    PayUpFront,
    FreeTrial,
}

impl PaymentMode {
    pub fn code(&self) -> u8 {
        match self {
            PaymentMode::PayAsYouGo => 0,
            PaymentMode::PayUpFront => 1,
            PaymentMode::FreeTrial => 2,
        }
    }
}

impl Serialize for PaymentMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Subscriber attribute value and the time it was set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberAttribute {
    pub value: Option<String>,
    pub updated_at_ms: i64,
}

impl SubscriberAttribute {
    pub fn new(value: impl Into<String>, updated_at_ms: i64) -> Self {
        Self {
            value: Some(value.into()),
            updated_at_ms,
        }
    }
}

/// Attribution provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributionNetwork {
    AppleSearchAds,
    Adjust,
    AppsFlyer,
    Branch,
    Tenjin,
    Facebook,
    MParticle,
}

impl AttributionNetwork {
    pub fn code(&self) -> u8 {
        match self {
            AttributionNetwork::AppleSearchAds => 0,
            AttributionNetwork::Adjust => 1,
            AttributionNetwork::AppsFlyer => 2,
            AttributionNetwork::Branch => 3,
            AttributionNetwork::Tenjin => 4,
            AttributionNetwork::Facebook => 5,
            AttributionNetwork::MParticle => 6,
        }
    }
}

impl Serialize for AttributionNetwork {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Receipt bytes as the backend expects them: base64 in 64-character lines
pub fn fetch_token(receipt: &[u8]) -> String {
    let encoded = STANDARD.encode(receipt);
    encoded
        .as_bytes()
        .chunks(64)
        .map(|line| std::str::from_utf8(line).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn finite<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        Err(S::Error::custom(format!(
            "{} cannot be represented as a JSON number",
            value
        )))
    }
}

fn finite_opt<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => finite(v, serializer),
        None => serializer.serialize_none(),
    }
}
