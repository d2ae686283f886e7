//! Registry of operations currently on the wire
//!
//! Registering under a key that is already in flight only queues the
//! callback. Completing a key removes it and calls every queued callback,
//! in arrival order, with the same outcome. Check-and-insert happens under
//! one lock, so two callers can never both become the leader for a key.

use crate::backend::fingerprint::CacheKey;
use crate::error::PaywireResult;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Receives the outcome of a coalesced operation
pub type Callback<T> = Box<dyn FnOnce(PaywireResult<T>) + Send>;

/// What `register` did with the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First caller for the key; must start the operation
    Leader,
    /// Joined an operation that is already running
    Joined,
}

pub struct InFlightRegistry<T> {
    pending: Mutex<HashMap<CacheKey, Vec<Callback<T>>>>,
}

impl<T: Clone> InFlightRegistry<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Vec<Callback<T>>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, key: CacheKey, callback: Callback<T>) -> Registration {
        let mut pending = self.lock();
        match pending.get_mut(&key) {
            Some(waiters) => {
                waiters.push(callback);
                Registration::Joined
            }
            None => {
                pending.insert(key, vec![callback]);
                Registration::Leader
            }
        }
    }

    /// Deliver `outcome` to everyone waiting on `key`. Returns how many
    /// callbacks ran.
    pub fn complete(&self, key: &CacheKey, outcome: PaywireResult<T>) -> usize {
        // Callbacks run outside the lock so they may register again
        let waiters = self.lock().remove(key).unwrap_or_default();
        let count = waiters.len();

        for callback in waiters {
            callback(outcome.clone());
        }

        count
    }

    /// Number of keys in flight
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }
}

impl<T: Clone> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fingerprint::OperationKey;
    use crate::error::PaywireError;
    use std::sync::Arc;

    fn key(user: &str) -> CacheKey {
        OperationKey::SubscriberState { app_user_id: user }.fingerprint()
    }

    fn recorder(
        log: &Arc<Mutex<Vec<(usize, PaywireResult<u32>)>>>,
        id: usize,
    ) -> Callback<u32> {
        let log = Arc::clone(log);
        Box::new(move |outcome| log.lock().unwrap().push((id, outcome)))
    }

    #[test]
    fn first_registration_leads() {
        let registry = InFlightRegistry::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        assert_eq!(registry.register(key("a"), recorder(&log, 0)), Registration::Leader);
        assert_eq!(registry.register(key("a"), recorder(&log, 1)), Registration::Joined);
        assert_eq!(registry.register(key("b"), recorder(&log, 2)), Registration::Leader);
        assert_eq!(registry.pending(), 2);
    }

    #[test]
    fn complete_fans_out_in_arrival_order() {
        let registry = InFlightRegistry::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            registry.register(key("a"), recorder(&log, id));
        }

        assert_eq!(registry.complete(&key("a"), Ok(42)), 3);
        assert!(!registry.is_in_flight(&key("a")));

        let log = log.lock().unwrap();
        let ids: Vec<usize> = log.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(log.iter().all(|(_, outcome)| matches!(outcome, Ok(42))));
    }

    #[test]
    fn errors_fan_out_identically() {
        let registry = InFlightRegistry::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.register(key("a"), recorder(&log, 0));
        registry.register(key("a"), recorder(&log, 1));

        registry.complete(&key("a"), Err(PaywireError::InvalidAppUserId));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert!(log
            .iter()
            .all(|(_, outcome)| matches!(outcome, Err(PaywireError::InvalidAppUserId))));
    }

    #[test]
    fn key_is_reusable_after_completion() {
        let registry = InFlightRegistry::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register(key("a"), recorder(&log, 0));
        registry.complete(&key("a"), Ok(1));

        assert_eq!(registry.register(key("a"), recorder(&log, 1)), Registration::Leader);
        assert_eq!(registry.complete(&key("unknown"), Ok(0)), 0);
    }
}
