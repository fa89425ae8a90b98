use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};

use crate::error::FetchError;

const CONNECT_TIMEOUT_SECS: u64 = 10;

const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_JSON: &str = "application/json, text/plain, */*";

/// Header profile sent with every outbound request so sources see an
/// ordinary desktop browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    Html,
    Json,
}

pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .gzip(true)
        .build()
        .context("failed to build http client")
}

fn pick_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// GETs `url` and returns the body, tagging failures as retryable or terminal.
pub async fn fetch_text(
    client: &Client,
    source: &str,
    url: &str,
    profile: HeaderProfile,
    timeout: Duration,
    referer: Option<&str>,
) -> Result<String, FetchError> {
    let accept = match profile {
        HeaderProfile::Html => ACCEPT_HTML,
        HeaderProfile::Json => ACCEPT_JSON,
    };
    let mut req = client
        .get(url)
        .timeout(timeout)
        .header(USER_AGENT, pick_user_agent())
        .header(ACCEPT, accept)
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
    if let Some(referer) = referer {
        req = req.header(REFERER, referer);
    }

    let resp = req
        .send()
        .await
        .map_err(|err| transport_error(source, &err))?;
    let status = resp.status();
    if !status.is_success() {
        let message = format!("http {status} from {url}");
        return Err(if is_retryable_status(status) {
            FetchError::retryable(source, message)
        } else {
            FetchError::terminal(source, message)
        });
    }

    resp.text()
        .await
        .map_err(|err| FetchError::retryable(source, format!("failed reading body: {err}")))
}

pub async fn fetch_json(
    client: &Client,
    source: &str,
    url: &str,
    timeout: Duration,
) -> Result<serde_json::Value, FetchError> {
    let body = fetch_text(client, source, url, HeaderProfile::Json, timeout, None).await?;
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(FetchError::terminal(source, "empty json body"));
    }
    serde_json::from_str(trimmed)
        .map_err(|err| FetchError::terminal(source, format!("invalid json: {err}")))
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

fn transport_error(source: &str, err: &reqwest::Error) -> FetchError {
    if err.is_builder() {
        return FetchError::terminal(source, format!("bad request: {err}"));
    }
    if err.is_timeout() {
        return FetchError::retryable(source, format!("timed out: {err}"));
    }
    FetchError::retryable(source, format!("request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::is_retryable_status;

    #[test]
    fn status_classification() {
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::FORBIDDEN));
    }
}
