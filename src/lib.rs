//! Paywire - purchases backend client
//!
//! Coalesces identical in-flight backend operations into a single request
//! and caches responses with the backend's ETag protocol.
//!
//! ```rust,ignore
//! use paywire::{Config, RequestCoordinator};
//!
//! let coordinator = RequestCoordinator::from_config(&Config::default())?;
//! let state = coordinator.fetch_subscriber_state("user").await?;
//! ```

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod etag;
pub mod http;
pub mod shared;

pub use backend::RequestCoordinator;
pub use config::Config;
pub use error::{PaywireError, PaywireResult};
