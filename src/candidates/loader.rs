use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::candidates::quality::clip_negatives;
use crate::candidates::schema::{
    CandidateRecord, DistrictId, SchemaError, ADOPTION_RATE, DISTRICT_ID, EXPECTED_CAPEX_EUR,
    EXPECTED_SAVING_KG, OPEX, REQUIRED_COLUMNS, TECH,
};
use crate::dataset::{is_null, RawTable};

/// Immutable candidate table for one or more evaluations. The fingerprint
/// identifies the exact content so concurrent readers can tell snapshots apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub records: Vec<CandidateRecord>,
    pub fingerprint: String,
}

impl CandidateSnapshot {
    pub fn with_fingerprint(source: impl Into<String>, records: Vec<CandidateRecord>) -> Self {
        let canonical = serde_json::to_string(&records).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self {
            source: source.into(),
            loaded_at: Utc::now(),
            fingerprint: format!("{:x}", hasher.finalize()),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy with negative amounts clamped to zero and a fresh fingerprint.
    pub fn with_negatives_clipped(&self) -> (Self, usize) {
        let (records, clipped) = clip_negatives(&self.records);
        (Self::with_fingerprint(self.source.clone(), records), clipped)
    }
}

pub fn load_candidates(path: &Path) -> Result<CandidateSnapshot> {
    let table = RawTable::from_path(path)?;
    let snapshot = candidates_from_table(&table, path.display().to_string())
        .with_context(|| format!("invalid candidate table: {}", path.display()))?;
    info!(
        "loaded {} candidates from {} ({})",
        snapshot.len(),
        snapshot.source,
        &snapshot.fingerprint[..12]
    );
    Ok(snapshot)
}

pub fn candidates_from_table(
    table: &RawTable,
    source: impl Into<String>,
) -> Result<CandidateSnapshot, SchemaError> {
    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|column| table.column_index(column).is_none())
        .map(|column| column.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing));
    }

    let district_idx = table.column_index(DISTRICT_ID);
    let tech_idx = table.column_index(TECH);
    let capex_idx = table.column_index(EXPECTED_CAPEX_EUR);
    let opex_idx = table.column_index(OPEX);
    let saving_idx = table.column_index(EXPECTED_SAVING_KG);
    let adoption_idx = table.column_index(ADOPTION_RATE);

    let mut records = Vec::with_capacity(table.len());
    for (idx, row) in table.rows.iter().enumerate() {
        let line = idx + 1;
        let cell = |col: Option<usize>| col.and_then(|c| row.get(c)).map(String::as_str);
        records.push(CandidateRecord {
            district_id: parse_district(line, cell(district_idx))?,
            tech: cell(tech_idx)
                .filter(|v| !is_null(v))
                .unwrap_or_default()
                .to_string(),
            expected_capex_eur: parse_number(line, EXPECTED_CAPEX_EUR, cell(capex_idx))?,
            opex_eur: parse_number(line, OPEX, cell(opex_idx))?,
            expected_saving_kg: parse_number(line, EXPECTED_SAVING_KG, cell(saving_idx))?,
            adoption_rate: parse_number(line, ADOPTION_RATE, cell(adoption_idx))?,
        });
    }

    blank_required_column(&records)?;
    Ok(CandidateSnapshot::with_fingerprint(source, records))
}

/// A required column present in the header but blank on every row is a
/// missing value at the first row, not a missing column.
fn blank_required_column(records: &[CandidateRecord]) -> Result<(), SchemaError> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let checks: [(&'static str, fn(&CandidateRecord) -> bool); 3] = [
        (DISTRICT_ID, |r| r.district_id.is_none()),
        (EXPECTED_CAPEX_EUR, |r| r.expected_capex_eur.is_none()),
        (EXPECTED_SAVING_KG, |r| r.expected_saving_kg.is_none()),
    ];
    for (column, is_blank) in checks {
        if is_blank(first) && records.iter().all(is_blank) {
            return Err(SchemaError::MissingValue { row: 1, column });
        }
    }
    Ok(())
}

fn parse_number(
    row: usize,
    column: &'static str,
    raw: Option<&str>,
) -> Result<Option<f64>, SchemaError> {
    let Some(raw) = raw.filter(|v| !is_null(v)) else {
        return Ok(None);
    };
    let sanitized = raw.trim().replace(['_', ' '], "");
    sanitized
        .parse::<f64>()
        .map(Some)
        .map_err(|_| SchemaError::InvalidValue {
            row,
            column,
            value: raw.to_string(),
        })
}

/// Accepts `10` as well as the `10.0` that float-typed exports produce.
pub(crate) fn parse_district(
    row: usize,
    raw: Option<&str>,
) -> Result<Option<DistrictId>, SchemaError> {
    let Some(value) = parse_number(row, DISTRICT_ID, raw)? else {
        return Ok(None);
    };
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Ok(Some(value as DistrictId))
    } else {
        Err(SchemaError::InvalidValue {
            row,
            column: DISTRICT_ID,
            value: raw.unwrap_or_default().to_string(),
        })
    }
}
