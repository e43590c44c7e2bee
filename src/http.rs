//! HTTP client utilities
//!
//! One shared reqwest::Client per process. reqwest already honors the
//! HTTP(S)_PROXY / NO_PROXY environment variables.

use crate::config::Config;
use crate::error::AppError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Build the upstream client from configuration
pub fn build_client(config: &Config) -> Result<Client, AppError> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("aturi/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Retry behaviour for upstream GETs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    Never,
    /// A single second attempt after a transport failure
    OnceOnTransient,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        if config.retry_transient {
            RetryPolicy::OnceOnTransient
        } else {
            RetryPolicy::Never
        }
    }
}

/// GET `url` with `query` and decode a JSON body.
///
/// Non-2xx statuses become `NotFound` (4xx) or `UpstreamStatus` (5xx) and are never retried.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    retry: RetryPolicy,
) -> Result<T, AppError> {
    match get_json_once(client, url, query).await {
        Err(e) if e.is_transient() && retry == RetryPolicy::OnceOnTransient => {
            warn!("Transient failure from {}: {}. Retrying once", url, e);
            tokio::time::sleep(RETRY_BACKOFF).await;
            get_json_once(client, url, query).await
        }
        other => other,
    }
}

async fn get_json_once<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, AppError> {
    debug!("GET {} {:?}", url, query);

    let response = client.get(url).query(query).send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, url, &body));
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn status_error(status: StatusCode, url: &str, body: &str) -> AppError {
    let detail = format!("HTTP {} from {}: {}", status, url, truncate_body(body));
    if status.is_client_error() {
        AppError::NotFound(detail)
    } else {
        AppError::UpstreamStatus(detail)
    }
}

fn truncate_body(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Join an endpoint base and an XRPC method name
pub fn xrpc_url(base: &str, method: &str) -> String {
    format!("{}/xrpc/{}", base.trim_end_matches('/'), method)
}
