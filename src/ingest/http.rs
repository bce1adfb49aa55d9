use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;

use crate::dataset::decode_text;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("heating-roadmap/0.1")
        .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
});

/// Response body plus the `Content-Type` it was served with. Bodies that are
/// not valid UTF-8 are read as Latin-1, as regional open-data portals serve them.
#[derive(Debug, Clone)]
pub struct HttpBody {
    pub content_type: String,
    pub text: String,
}

impl HttpBody {
    pub fn is_json(&self) -> bool {
        is_json_content_type(&self.content_type)
    }
}

pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("application/json")
}

pub async fn fetch_body(url: &str, timeout_secs: u64) -> Result<HttpBody> {
    let response = HTTP_CLIENT
        .get(url)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    let text = decode_text(&bytes);
    if !status.is_success() {
        let preview: String = text.chars().take(180).collect();
        return Err(anyhow!("GET {url} returned {status}: {preview}"));
    }
    Ok(HttpBody { content_type, text })
}

pub async fn fetch_json(url: &str, timeout_secs: u64) -> Result<Value> {
    let body = fetch_body(url, timeout_secs).await?;
    serde_json::from_str(&body.text).with_context(|| format!("invalid JSON response: {url}"))
}
