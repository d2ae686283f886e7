//! HTTP client seam and its blocking `ureq` implementation

use crate::config::schema::ClientConfig;
use crate::config::Config;
use crate::error::{PaywireError, PaywireResult};
use crate::http::body::RequestBody;
use crate::http::request::{HttpMethod, HttpRequest};
use crate::http::response::HttpResponse;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Header carrying the API key
pub const AUTHORIZATION: &str = "Authorization";

/// Performs a single HTTP exchange and normalizes its outcome.
///
/// Implementations never fail: every problem is reported inside the
/// returned `HttpResponse`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn perform(&self, request: &HttpRequest) -> HttpResponse;
}

/// Headers attached to every request
pub fn default_headers(api_key: &str, client: &ClientConfig) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(AUTHORIZATION.to_string(), format!("Bearer {}", api_key));
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert(
        "X-Version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    headers.insert("X-Platform".to_string(), client.platform.clone());
    headers.insert(
        "X-Platform-Version".to_string(),
        client.platform_version.clone(),
    );
    headers.insert(
        "X-Platform-Flavor".to_string(),
        client.platform_flavor.clone(),
    );
    if let Some(ref version) = client.platform_flavor_version {
        headers.insert("X-Platform-Flavor-Version".to_string(), version.clone());
    }
    headers.insert("X-Client-Version".to_string(), client.app_version.clone());
    headers.insert(
        "X-Client-Build-Version".to_string(),
        client.build_version.clone(),
    );
    if let Some(ref id) = client.device_identifier {
        headers.insert("X-Apple-Device-Identifier".to_string(), id.clone());
    }
    headers.insert("X-Is-Sandbox".to_string(), client.sandbox.to_string());
    headers.insert(
        "X-Observer-Mode-Enabled".to_string(),
        client.observer_mode.to_string(),
    );
    headers
}

/// Merge caller headers over the defaults. Names compare case-insensitively
/// and the caller can never replace `Authorization`.
pub fn merge_headers(
    defaults: &BTreeMap<String, String>,
    caller: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults.clone();
    for (name, value) in caller {
        if name.eq_ignore_ascii_case(AUTHORIZATION) {
            debug!("Ignoring caller-supplied {} header", AUTHORIZATION);
            continue;
        }
        merged.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        merged.insert(name.clone(), value.clone());
    }
    merged
}

/// Blocking `ureq` client, driven from `spawn_blocking`
pub struct UreqClient {
    agent: ureq::Agent,
    base_url: Url,
    default_headers: BTreeMap<String, String>,
}

impl UreqClient {
    /// Build a client from configuration. Fails if no API key is available
    /// or the base URL does not parse.
    pub fn new(config: &Config) -> PaywireResult<Self> {
        let api_key = config.api_key()?;
        let base_url =
            Url::parse(&config.backend.base_url).map_err(|e| PaywireError::ConfigInvalid {
                path: PathBuf::from("backend.base_url"),
                reason: format!("{} is not a valid URL: {}", config.backend.base_url, e),
            })?;

        let agent_config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(config.backend.timeout_secs)))
            .build();

        Ok(Self {
            agent: ureq::Agent::new_with_config(agent_config),
            base_url,
            default_headers: default_headers(&api_key, &config.client),
        })
    }

    /// Backend root requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl HttpClient for UreqClient {
    async fn perform(&self, request: &HttpRequest) -> HttpResponse {
        let url = match request.path.url(&self.base_url) {
            Ok(url) => url,
            Err(e) => return HttpResponse::failed(e),
        };

        // Serialize before touching the network so a bad body costs no call
        let body = match request.method.body().map(RequestBody::to_json).transpose() {
            Ok(body) => body,
            Err(e) => {
                error!("Could not serialize body for {}: {}", request, e);
                return HttpResponse::failed(PaywireError::network(e));
            }
        };

        let headers = merge_headers(&self.default_headers, &request.headers);
        let agent = self.agent.clone();
        let is_post = matches!(request.method, HttpMethod::Post(_));

        debug!("Sending {}", request);
        let result = tokio::task::spawn_blocking(move || {
            send_blocking(&agent, url.as_str(), &headers, is_post, body.as_deref())
        })
        .await;

        match result {
            Ok(Ok((status, headers, bytes))) => {
                debug!("{} finished with status {}", request, status);
                HttpResponse::from_raw(status, headers, &bytes)
            }
            Ok(Err(e)) => {
                debug!("{} failed: {}", request, e);
                HttpResponse::failed(PaywireError::network(e))
            }
            Err(e) => HttpResponse::failed(PaywireError::network(e)),
        }
    }
}

type RawExchange = (u16, BTreeMap<String, String>, Vec<u8>);

fn send_blocking(
    agent: &ureq::Agent,
    url: &str,
    headers: &BTreeMap<String, String>,
    is_post: bool,
    body: Option<&[u8]>,
) -> Result<RawExchange, ureq::Error> {
    let mut response = if is_post {
        let mut builder = agent.post(url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.send(body.unwrap_or_default())?
    } else {
        let mut builder = agent.get(url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.call()?
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let bytes = response.body_mut().read_to_vec()?;

    Ok((status, headers, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_config() -> ClientConfig {
        ClientConfig {
            platform: "iOS".to_string(),
            platform_version: "17.0".to_string(),
            platform_flavor: "react-native".to_string(),
            platform_flavor_version: Some("1.2.3".to_string()),
            app_version: "4.0".to_string(),
            build_version: "400".to_string(),
            device_identifier: None,
            sandbox: true,
            observer_mode: false,
        }
    }

    #[test]
    fn default_headers_identify_client() {
        let headers = default_headers("appl_key", &client_config());
        assert_eq!(headers["Authorization"], "Bearer appl_key");
        assert_eq!(headers["Content-Type"], "application/json");
        assert_eq!(headers["X-Platform"], "iOS");
        assert_eq!(headers["X-Platform-Flavor"], "react-native");
        assert_eq!(headers["X-Platform-Flavor-Version"], "1.2.3");
        assert_eq!(headers["X-Is-Sandbox"], "true");
        assert_eq!(headers["X-Observer-Mode-Enabled"], "false");
        assert!(!headers.contains_key("X-Apple-Device-Identifier"));
    }

    #[test]
    fn caller_cannot_override_authorization() {
        let defaults = default_headers("real", &client_config());
        let mut caller = BTreeMap::new();
        caller.insert("authorization".to_string(), "Bearer fake".to_string());
        caller.insert("x-is-sandbox".to_string(), "false".to_string());
        caller.insert("If-None-Match".to_string(), "etag".to_string());

        let merged = merge_headers(&defaults, &caller);
        assert_eq!(merged["Authorization"], "Bearer real");
        assert!(!merged.contains_key("authorization"));
        assert_eq!(merged["x-is-sandbox"], "false");
        assert!(!merged.contains_key("X-Is-Sandbox"));
        assert_eq!(merged["If-None-Match"], "etag");
    }

    #[test]
    fn new_parses_base_url() {
        let mut config = Config::default();
        config.backend.api_key = Some("appl_key".to_string());
        config.backend.base_url = "http://127.0.0.1:1".to_string();
        let client = UreqClient::new(&config).unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:1/");
    }

    #[test]
    fn unparseable_base_url_is_config_error() {
        let mut config = Config::default();
        config.backend.api_key = Some("appl_key".to_string());
        config.backend.base_url = "not a url".to_string();

        match UreqClient::new(&config) {
            Err(PaywireError::ConfigInvalid { path, reason }) => {
                assert_eq!(path, PathBuf::from("backend.base_url"));
                assert!(reason.contains("not a url"));
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("bad base URL was accepted"),
        }
    }
}
