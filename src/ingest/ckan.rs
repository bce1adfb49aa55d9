//! Resolution of downloadable resources through a CKAN `package_show` endpoint.

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde_json::Value;

use crate::ingest::http::fetch_json;

pub fn package_show_url(base_url: &str, package_id: &str) -> Result<String> {
    let url = Url::parse_with_params(base_url, &[("id", package_id)])
        .with_context(|| format!("invalid CKAN base url: {base_url}"))?;
    Ok(url.to_string())
}

/// First resource of the package whose format is CSV, falling back to any
/// resource URL ending in `.csv`.
pub fn resolve_csv_url(payload: &Value) -> Option<String> {
    let resources = payload
        .get("result")
        .and_then(|result| result.get("resources"))
        .and_then(Value::as_array)?;

    let by_format = resources.iter().find(|resource| {
        resource
            .get("format")
            .and_then(Value::as_str)
            .is_some_and(|format| format.trim().eq_ignore_ascii_case("csv"))
    });
    let by_extension = || {
        resources.iter().find(|resource| {
            resource
                .get("url")
                .and_then(Value::as_str)
                .is_some_and(|url| url.to_ascii_lowercase().ends_with(".csv"))
        })
    };

    by_format
        .or_else(by_extension)
        .and_then(|resource| resource.get("url"))
        .and_then(Value::as_str)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
}

pub async fn resolve_package_csv(
    base_url: &str,
    package_id: &str,
    timeout_secs: u64,
) -> Result<String> {
    let url = package_show_url(base_url, package_id)?;
    let payload = fetch_json(&url, timeout_secs).await?;
    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(anyhow!("CKAN package_show failed for {package_id}"));
    }
    resolve_csv_url(&payload).ok_or_else(|| anyhow!("package {package_id} has no CSV resource"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prefers_declared_csv_format() {
        let payload = json!({
            "success": true,
            "result": {
                "resources": [
                    { "format": "JSON", "url": "https://example.org/a.json" },
                    { "format": "csv ", "url": "https://example.org/download?id=7" },
                    { "format": "CSV", "url": "https://example.org/b.csv" }
                ]
            }
        });
        assert_eq!(
            resolve_csv_url(&payload).as_deref(),
            Some("https://example.org/download?id=7")
        );
    }

    #[test]
    fn falls_back_to_csv_extension() {
        let payload = json!({
            "result": {
                "resources": [
                    { "format": "", "url": "https://example.org/TABLE.CSV" }
                ]
            }
        });
        assert_eq!(
            resolve_csv_url(&payload).as_deref(),
            Some("https://example.org/TABLE.CSV")
        );
        assert!(resolve_csv_url(&json!({ "result": { "resources": [] } })).is_none());
        assert!(resolve_csv_url(&json!({})).is_none());
    }

    #[test]
    fn package_url_encodes_id() {
        let url = package_show_url("https://example.org/api/3/action/package_show", "a b").unwrap();
        assert_eq!(url, "https://example.org/api/3/action/package_show?id=a+b");
    }
}
