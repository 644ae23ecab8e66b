//! CoinGecko REST client: single-attempt requests with a fixed timeout.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::MarketError;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Per-request timeout. Bounds each network attempt independently of any
/// refresh cadence the caller runs on.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Thin wrapper around a shared `reqwest::Client`. One network call per
/// `request` invocation, with no retry and no backoff. Callers that poll (the live
/// refresh loop) simply try again on their next interval.
#[derive(Clone)]
pub struct GeckoClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeckoClient {
    pub fn new() -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert(USER_AGENT, HeaderValue::from_static("coinscope/0.1"));

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }

    /// GET `{base_url}/{endpoint}` with the given query parameters and decode
    /// the JSON payload into `T`.
    ///
    /// Every failure mode (transport error, non-2xx status, decode error)
    /// collapses into [`MarketError::RemoteUnavailable`], logged with the
    /// endpoint and error detail.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, MarketError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, "issuing provider request");

        let response = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| remote_unavailable(endpoint, "request failed", &e))?;

        let response = response
            .error_for_status()
            .map_err(|e| remote_unavailable(endpoint, "error status", &e))?;

        response
            .json::<T>()
            .await
            .map_err(|e| remote_unavailable(endpoint, "decode failed", &e))
    }
}

impl Default for GeckoClient {
    fn default() -> Self {
        Self::new()
    }
}

fn remote_unavailable(endpoint: &str, stage: &str, err: &reqwest::Error) -> MarketError {
    error!(endpoint, stage, error = %err, "provider request failed");
    MarketError::RemoteUnavailable {
        endpoint: endpoint.to_string(),
        detail: format!("{stage}: {err}"),
    }
}
