use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::ingest::http::{fetch_body, is_json_content_type, HttpBody};

pub fn extension_for(content_type: &str) -> &'static str {
    if is_json_content_type(content_type) {
        "json"
    } else {
        "csv"
    }
}

pub fn raw_file_name(name: &str, extension: &str, at: DateTime<Utc>) -> String {
    format!("{name}-{}.{extension}", at.format("%Y%m%dT%H%M%SZ"))
}

/// Writes a downloaded body into `raw_dir`. JSON bodies are re-indented,
/// anything else is stored verbatim.
pub fn save_body(
    name: &str,
    body: &HttpBody,
    raw_dir: &Path,
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(raw_dir)
        .with_context(|| format!("failed creating raw dir: {}", raw_dir.display()))?;
    let extension = extension_for(&body.content_type);
    let path = raw_dir.join(raw_file_name(name, extension, at));

    let contents = if extension == "json" {
        let value: Value = serde_json::from_str(&body.text)
            .with_context(|| format!("invalid JSON body for {name}"))?;
        serde_json::to_string_pretty(&value)?
    } else {
        body.text.clone()
    };
    std::fs::write(&path, contents)
        .with_context(|| format!("failed writing raw file: {}", path.display()))?;
    Ok(path)
}

pub async fn fetch_and_save(
    name: &str,
    url: &str,
    raw_dir: &Path,
    timeout_secs: u64,
) -> Result<PathBuf> {
    let body = fetch_body(url, timeout_secs).await?;
    let path = save_body(name, &body, raw_dir, Utc::now())?;
    info!("[{name}] saved to {}", path.display());
    Ok(path)
}

/// Fetches every endpoint in turn. One failing endpoint does not stop the rest.
pub async fn fetch_all(
    endpoints: &BTreeMap<String, String>,
    raw_dir: &Path,
    timeout_secs: u64,
) -> Vec<(String, Result<PathBuf>)> {
    let mut results = Vec::with_capacity(endpoints.len());
    for (name, url) in endpoints {
        let outcome = fetch_and_save(name, url, raw_dir, timeout_secs).await;
        if let Err(err) = &outcome {
            warn!("[{name}] fetch failed: {err:#}");
        }
        results.push((name.clone(), outcome));
    }
    results
}
