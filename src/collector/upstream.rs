use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::Semaphore;

/// Per-poll-attempt retry policy (§4.3 HTTP contract): up to `max_retries` retries
/// with linear backoff (1s, 2s, 3s, ...) between attempts. Retries only transient
/// transport errors and 5xx; 4xx fails fast. `host_permits` bounds the number of
/// requests in flight against one kit's host at a time (the reqwest pool alone
/// doesn't cap concurrent in-flight requests per host).
pub async fn fetch_json_array(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    max_retries: u32,
    host_permits: &Arc<Semaphore>,
) -> Result<Vec<Value>, UpstreamError> {
    let v = fetch_json(client, url, timeout, max_retries, host_permits).await?;
    match v {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![other]),
    }
}

pub async fn fetch_json_object(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    max_retries: u32,
    host_permits: &Arc<Semaphore>,
) -> Result<Value, UpstreamError> {
    fetch_json(client, url, timeout, max_retries, host_permits).await
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http {0}")]
    HttpStatus(StatusCode),
    #[error("invalid json: {0}")]
    InvalidJson(String),
}

impl UpstreamError {
    /// Upstream-fatal (§7 kind 3) — logged, kit-error health event, not retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, UpstreamError::HttpStatus(s) if s.is_client_error())
    }
}

async fn fetch_json(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    max_retries: u32,
    host_permits: &Arc<Semaphore>,
) -> Result<Value, UpstreamError> {
    let _permit = host_permits.acquire().await.expect("semaphore never closed");
    let mut attempt = 0;
    loop {
        let result = fetch_once(client, url, timeout).await;
        match result {
            Ok(v) => return Ok(v),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                if attempt >= max_retries {
                    return Err(e);
                }
                attempt += 1;
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }
    }
}

async fn fetch_once(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<Value, UpstreamError> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| UpstreamError::Transport(e.to_string()))?;

    let status = resp.status();
    if status.is_client_error() {
        return Err(UpstreamError::HttpStatus(status));
    }
    if status.is_server_error() {
        return Err(UpstreamError::Transport(format!("http {status}")));
    }

    resp.json::<Value>()
        .await
        .map_err(|e| UpstreamError::InvalidJson(e.to_string()))
}
