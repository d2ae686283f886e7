//! Transport layer: request descriptors, typed bodies, the HTTP client
//! seam and the two execution lanes

pub mod body;
pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod request;
pub mod response;
pub mod transport;

pub use body::{JsonObject, RequestBody};
pub use client::{HttpClient, UreqClient};
pub use request::{HttpMethod, HttpRequest, Lane, RequestPath};
pub use response::HttpResponse;
pub use transport::{Pending, Transport};
