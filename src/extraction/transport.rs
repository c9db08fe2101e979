//! Shared HTTP plumbing for provider clients.
//!
//! One `reqwest::Client` per route: the direct client is built up front,
//! proxied clients are built on first use and cached by proxy URL.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::StatusCode;

use super::domain::{ResolutionError, Route};

/// User agent sent to relay instances and provider APIs.
pub const USER_AGENT: &str = concat!(
    "Quezic/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/quezic)"
);

/// HTTP transport with per-route clients.
pub struct HttpTransport {
    direct: reqwest::Client,
    proxied: Mutex<HashMap<String, reqwest::Client>>,
    request_timeout: Duration,
    user_agent: String,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `request_timeout`.
    pub fn new(request_timeout: Duration, user_agent: Option<&str>) -> Result<Self, ResolutionError> {
        let user_agent = user_agent.unwrap_or(USER_AGENT).to_string();
        let direct = build_client(None, request_timeout, &user_agent)?;
        Ok(Self {
            direct,
            proxied: Mutex::new(HashMap::new()),
            request_timeout,
            user_agent,
        })
    }

    /// Client for a route. Building a proxied client fails when the proxy
    /// URL is malformed; that counts as the route being unavailable.
    pub fn client(&self, route: &Route) -> Result<reqwest::Client, ResolutionError> {
        match route {
            Route::Direct => Ok(self.direct.clone()),
            Route::Proxy(cfg) => {
                let mut cache = self.proxied.lock();
                if let Some(client) = cache.get(&cfg.url) {
                    return Ok(client.clone());
                }
                let client = build_client(Some(&cfg.url), self.request_timeout, &self.user_agent)?;
                cache.insert(cfg.url.clone(), client.clone());
                Ok(client)
            }
        }
    }

    /// GET `url` over `route` and decode a JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        route: &Route,
        url: &str,
        provider: &str,
    ) -> Result<T, ResolutionError> {
        let response = self
            .client(route)?
            .get(url)
            .send()
            .await
            .map_err(|e| ResolutionError::ProviderUnavailable(format!("{provider}: {e}")))?;

        check_status(response.status(), provider)?;

        response
            .json::<T>()
            .await
            .map_err(|e| ResolutionError::ProviderUnavailable(format!("{provider}: bad response: {e}")))
    }
}

fn build_client(
    proxy: Option<&str>,
    timeout: Duration,
    user_agent: &str,
) -> Result<reqwest::Client, ResolutionError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout)
        .timeout(timeout);

    if let Some(url) = proxy {
        let proxy = reqwest::Proxy::all(url)
            .map_err(|e| ResolutionError::ProviderUnavailable(format!("invalid proxy {url}: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ResolutionError::ProviderUnavailable(format!("HTTP client: {e}")))
}

/// Map an HTTP status to the resolution taxonomy.
pub fn check_status(status: StatusCode, provider: &str) -> Result<(), ResolutionError> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => {
            ResolutionError::ContentNotFound(format!("{provider}: HTTP {status}"))
        }
        StatusCode::TOO_MANY_REQUESTS => ResolutionError::RateLimited(provider.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ResolutionError::Unauthorized(format!("{provider}: HTTP {status}"))
        }
        _ => ResolutionError::ProviderUnavailable(format!(
            "{provider}: HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )),
    })
}
