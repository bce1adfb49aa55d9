use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::RawTable;

/// Pre-computed cost/CO₂ trade-off curve, loaded for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoFrontier {
    pub source: String,
    pub total_points: usize,
    pub table: RawTable,
}

/// Returns `None` when the artifact has not been produced yet. `preview_rows`
/// limits the points kept.
pub fn load_pareto(path: &Path, preview_rows: usize) -> Result<Option<ParetoFrontier>> {
    if !path.exists() {
        info!("pareto frontier artifact not found at {}", path.display());
        return Ok(None);
    }
    let table = RawTable::from_path(path)?;
    Ok(Some(ParetoFrontier {
        source: path.display().to_string(),
        total_points: table.len(),
        table: table.head(preview_rows),
    }))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_artifact_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_pareto(&dir.path().join("pareto_frontier.csv"), 50).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn preview_keeps_total_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Cost EUR,CO2 Tons").unwrap();
        for i in 0..5 {
            writeln!(file, "{},{}", i * 1_000, i * 10).unwrap();
        }
        let frontier = load_pareto(file.path(), 2).unwrap().unwrap();
        assert_eq!(frontier.total_points, 5);
        assert_eq!(frontier.table.len(), 2);
        assert_eq!(frontier.table.headers, vec!["cost_eur", "co2_tons"]);
    }
}
