//! Operation fingerprints
//!
//! A cache key names a logical operation, not a URL. It is the SHA-256 of
//! the inputs that change what the backend would answer; any other input
//! is left out. Every part is length-prefixed, so no two different input
//! sets can produce the same byte stream.

use crate::backend::types::ReceiptSubmission;
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of a logical operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A prefix is plenty for logs
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// Operations whose concurrent duplicates are coalesced
#[derive(Debug, Clone, Copy)]
pub enum OperationKey<'a> {
    SubmitReceipt(&'a ReceiptSubmission),
    SubscriberState { app_user_id: &'a str },
    Offerings { app_user_id: &'a str },
    Alias {
        app_user_id: &'a str,
        new_app_user_id: &'a str,
    },
    Login {
        current_app_user_id: &'a str,
        new_app_user_id: &'a str,
    },
}

impl OperationKey<'_> {
    pub fn fingerprint(&self) -> CacheKey {
        let mut hasher = KeyHasher::default();

        match self {
            OperationKey::SubmitReceipt(submission) => {
                hasher.tag("receipt");
                hasher.bytes(&submission.receipt);
                hasher.str(&submission.app_user_id);
                hasher.flag(submission.is_restore);
                hasher.flag(submission.observer_mode);

                match submission.product {
                    Some(ref product) => {
                        hasher.tag("product");
                        hasher.str(&product.product_identifier);
                        hasher.bytes(&product.price.to_bits().to_be_bytes());
                        hasher.opt(product.currency.as_deref());
                        hasher.opt(product.subscription_group.as_deref());
                        hasher.len(product.discounts.len());
                        for discount in &product.discounts {
                            hasher.str(&discount.identifier);
                        }
                    }
                    None => hasher.tag("no product"),
                }

                hasher.opt(submission.presented_offering_identifier.as_deref());

                match submission.attributes {
                    Some(ref attributes) => {
                        hasher.len(attributes.len());
                        for (name, attribute) in attributes {
                            hasher.str(name);
                            hasher.opt(attribute.value.as_deref());
                            hasher.bytes(&attribute.updated_at_ms.to_be_bytes());
                        }
                    }
                    None => hasher.tag("no attributes"),
                }
            }
            OperationKey::SubscriberState { app_user_id } => {
                hasher.tag("subscriber");
                hasher.str(app_user_id);
            }
            OperationKey::Offerings { app_user_id } => {
                hasher.tag("offerings");
                hasher.str(app_user_id);
            }
            OperationKey::Alias {
                app_user_id,
                new_app_user_id,
            } => {
                hasher.tag("alias");
                hasher.str(app_user_id);
                hasher.str(new_app_user_id);
            }
            OperationKey::Login {
                current_app_user_id,
                new_app_user_id,
            } => {
                hasher.tag("login");
                hasher.str(current_app_user_id);
                hasher.str(new_app_user_id);
            }
        }

        CacheKey(hasher.finish())
    }
}

#[derive(Default)]
struct KeyHasher {
    inner: Sha256,
}

impl KeyHasher {
    fn len(&mut self, len: usize) {
        self.inner.update((len as u64).to_be_bytes());
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.len(bytes.len());
        self.inner.update(bytes);
    }

    fn str(&mut self, value: &str) {
        self.bytes(value.as_bytes());
    }

    fn tag(&mut self, tag: &str) {
        self.str(tag);
    }

    fn flag(&mut self, flag: bool) {
        self.inner.update([flag as u8]);
    }

    fn opt(&mut self, value: Option<&str>) {
        match value {
            Some(v) => {
                self.inner.update([1]);
                self.str(v);
            }
            None => self.inner.update([0]),
        }
    }

    fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}
