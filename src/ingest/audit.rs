use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Record of one ingestion or cleaning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub source: String,
    pub pull_date: DateTime<Utc>,
    pub rows_in: usize,
    pub rows_out: usize,
    pub transforms: BTreeMap<String, Value>,
}

impl AuditLog {
    pub fn new(source: impl Into<String>, rows_in: usize, rows_out: usize) -> Self {
        Self {
            source: source.into(),
            pull_date: Utc::now(),
            rows_in,
            rows_out,
            transforms: BTreeMap::new(),
        }
    }

    pub fn with_transform(mut self, name: &str, detail: impl Into<Value>) -> Self {
        self.transforms.insert(name.to_string(), detail.into());
        self
    }

    pub fn file_name(&self) -> String {
        let stem = Path::new(&self.source)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());
        format!("audit_{stem}_{}.json", self.pull_date.format("%Y%m%d_%H%M%S"))
    }
}

pub fn write_audit_log(log: &AuditLog, audit_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(audit_dir)
        .with_context(|| format!("failed creating audit dir: {}", audit_dir.display()))?;
    let path = audit_dir.join(log.file_name());
    let json = serde_json::to_string_pretty(log)?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed writing audit log: {}", path.display()))?;
    info!(
        "audit log for {} written to {} ({} -> {} rows)",
        log.source,
        path.display(),
        log.rows_in,
        log.rows_out
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn file_name_uses_source_stem() {
        let mut log = AuditLog::new("data/raw/candidates.csv", 10, 9);
        log.pull_date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(log.file_name(), "audit_candidates_20240102_030405.json");
    }

    #[test]
    fn written_log_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new("candidates.csv", 4, 3)
            .with_transform("drop_exact_duplicates", 1)
            .with_transform("impute_adoption_rate", json!({ "default": 0.3, "rows": 2 }));
        let path = write_audit_log(&log, &dir.path().join("audit")).unwrap();

        let parsed: AuditLog =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed, log);
        assert_eq!(parsed.transforms["impute_adoption_rate"]["rows"], 2);
    }
}
