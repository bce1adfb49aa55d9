pub mod audit;
pub mod ckan;
pub mod fetch;
pub mod http;

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::IngestConfig;
use crate::dataset::{decode_text, RawTable};
use crate::ingest::ckan::resolve_package_csv;
use crate::ingest::http::fetch_body;

/// Anything that yields a tabular dataset for the cleaning step.
#[async_trait]
pub trait DatasetSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> Result<RawTable>;
}

#[derive(Debug, Clone)]
pub struct LocalCsvSource {
    pub name: String,
    pub path: PathBuf,
}

impl LocalCsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

#[async_trait]
impl DatasetSource for LocalCsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<RawTable> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed reading dataset: {}", self.path.display()))?;
        RawTable::from_csv_str(&decode_text(&bytes))
            .with_context(|| format!("failed parsing CSV dataset: {}", self.path.display()))
    }
}

/// Remote CSV or JSON records, chosen by the response `Content-Type`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    pub name: String,
    pub url: String,
    pub timeout_secs: u64,
}

#[async_trait]
impl DatasetSource for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<RawTable> {
        let body = fetch_body(&self.url, self.timeout_secs).await?;
        if body.is_json() {
            let value: serde_json::Value = serde_json::from_str(&body.text)
                .with_context(|| format!("invalid JSON response: {}", self.url))?;
            RawTable::from_json_records(&value)
        } else {
            RawTable::from_csv_str(&body.text)
        }
    }
}

/// CKAN package whose first CSV resource is downloaded.
#[derive(Debug, Clone)]
pub struct CkanSource {
    pub name: String,
    pub base_url: String,
    pub package_id: String,
    pub timeout_secs: u64,
}

impl CkanSource {
    pub fn new(config: &IngestConfig, package_id: &str) -> Self {
        Self {
            name: package_id.to_string(),
            base_url: config.ckan_base_url.clone(),
            package_id: package_id.to_string(),
            timeout_secs: config.timeout_secs,
        }
    }

    pub async fn resolve_url(&self) -> Result<String> {
        resolve_package_csv(&self.base_url, &self.package_id, self.timeout_secs).await
    }
}

#[async_trait]
impl DatasetSource for CkanSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<RawTable> {
        let url = self.resolve_url().await?;
        HttpSource {
            name: self.name.clone(),
            url,
            timeout_secs: self.timeout_secs,
        }
        .fetch()
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn local_source_reads_latin1_semicolon_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Distrito;Tecnolog\xeda\n10;aerotermia\n").unwrap();
        let source = LocalCsvSource::new(file.path());
        let table = tokio_test::block_on(source.fetch()).unwrap();
        assert_eq!(table.headers, vec!["distrito", "tecnología"]);
        assert_eq!(table.rows, vec![vec!["10", "aerotermia"]]);
    }

    #[test]
    fn local_source_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalCsvSource::new(dir.path().join("absent.csv"));
        assert_eq!(source.name(), "absent");
        assert!(tokio_test::block_on(source.fetch()).is_err());
    }
}
