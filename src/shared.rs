//! Process-wide default coordinator
//!
//! This is the only global state in paywire. Everything else takes its
//! `RequestCoordinator` as an argument.

use crate::backend::RequestCoordinator;
use crate::config::Config;
use crate::error::PaywireResult;
use std::sync::{Arc, OnceLock};
use tracing::debug;

static SHARED: OnceLock<Arc<RequestCoordinator>> = OnceLock::new();

/// Install the default coordinator. Later calls return the instance that
/// was installed first and ignore their configuration.
///
/// Must be called inside a Tokio runtime.
pub fn configure(config: &Config) -> PaywireResult<Arc<RequestCoordinator>> {
    if let Some(existing) = SHARED.get() {
        debug!("Shared coordinator already configured");
        return Ok(Arc::clone(existing));
    }

    let coordinator = Arc::new(RequestCoordinator::from_config(config)?);
    // Another thread may have won the race; theirs is kept
    let _ = SHARED.set(Arc::clone(&coordinator));
    Ok(Arc::clone(SHARED.get().unwrap_or(&coordinator)))
}

/// The default coordinator, if `configure` has run
pub fn get() -> Option<Arc<RequestCoordinator>> {
    SHARED.get().cloned()
}
