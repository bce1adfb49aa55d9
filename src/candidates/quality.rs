use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::candidates::loader::parse_district;
use crate::candidates::schema::{CandidateRecord, DistrictId, DISTRICT_ID};
use crate::dataset::{is_null, standardize_column_name, RawTable};

pub const TARGET_UNIT: &str = "kwh";
pub const POSTAL_CODE: &str = "postal_code";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnQuality {
    pub null_count: usize,
    pub null_pct: f64,
    pub unique_nonnull: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub rows_in: usize,
    pub duplicate_rows: usize,
    pub columns: BTreeMap<String, ColumnQuality>,
}

pub fn quality_report(table: &RawTable) -> QualityReport {
    let rows_in = table.len();
    let distinct_rows = table.rows.iter().collect::<BTreeSet<_>>().len();

    let mut columns = BTreeMap::new();
    for (idx, name) in table.headers.iter().enumerate() {
        let mut null_count = 0;
        let mut distinct = BTreeSet::new();
        for row in &table.rows {
            let value = row.get(idx).map(String::as_str).unwrap_or_default();
            if is_null(value) {
                null_count += 1;
            } else {
                distinct.insert(value);
            }
        }
        let null_pct = if rows_in == 0 {
            0.0
        } else {
            round2(null_count as f64 / rows_in as f64 * 100.0)
        };
        columns.insert(
            name.clone(),
            ColumnQuality {
                null_count,
                null_pct,
                unique_nonnull: distinct.len(),
            },
        );
    }

    QualityReport {
        rows_in,
        duplicate_rows: rows_in - distinct_rows,
        columns,
    }
}

/// Clamps negative amounts to zero. Returns the cleaned records and how many
/// values were changed.
pub fn clip_negatives(records: &[CandidateRecord]) -> (Vec<CandidateRecord>, usize) {
    let mut clipped = 0;
    let cleaned = records
        .iter()
        .map(|record| {
            let mut out = record.clone();
            for value in [
                &mut out.expected_capex_eur,
                &mut out.opex_eur,
                &mut out.expected_saving_kg,
            ] {
                if let Some(v) = value {
                    if *v < 0.0 {
                        *v = 0.0;
                        clipped += 1;
                    }
                }
            }
            out
        })
        .collect();
    (cleaned, clipped)
}

pub fn impute_adoption_rate(
    records: &[CandidateRecord],
    default_rate: f64,
) -> (Vec<CandidateRecord>, usize) {
    let mut imputed = 0;
    let cleaned = records
        .iter()
        .map(|record| {
            let mut out = record.clone();
            if out.adoption_rate.is_none() {
                out.adoption_rate = Some(default_rate);
                imputed += 1;
            }
            out
        })
        .collect();
    (cleaned, imputed)
}

/// Keeps the first occurrence of each exact duplicate, preserving order.
pub fn drop_exact_duplicates(records: &[CandidateRecord]) -> Vec<CandidateRecord> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record_key(record)))
        .cloned()
        .collect()
}

/// Rescales `column` from MWh to kWh on rows whose `unit_column` says `MWh`,
/// then marks every row as `kwh`. Returns the table and how many values were
/// rescaled. Tables lacking either column come back unchanged.
pub fn convert_units(table: &RawTable, column: &str, unit_column: &str) -> (RawTable, usize) {
    let (Some(value_idx), Some(unit_idx)) =
        (table.column_index(column), table.column_index(unit_column))
    else {
        return (table.clone(), 0);
    };

    let mut out = table.clone();
    let mut converted = 0;
    for row in &mut out.rows {
        let is_mwh = row[unit_idx].trim().eq_ignore_ascii_case("mwh");
        if is_mwh {
            if let Ok(value) = row[value_idx].trim().parse::<f64>() {
                row[value_idx] = (value * 1000.0).to_string();
                converted += 1;
            }
        }
        row[unit_idx] = TARGET_UNIT.to_string();
    }
    (out, converted)
}

/// Fills blank `district_id` cells from the postal code column. Adds the
/// district column when the table has none. Existing ids are never replaced.
pub fn assign_district_from_postal(
    table: &RawTable,
    postal_column: &str,
    district_map: &BTreeMap<String, DistrictId>,
) -> (RawTable, usize) {
    let Some(postal_idx) = table.column_index(postal_column) else {
        return (table.clone(), 0);
    };

    let mut out = table.clone();
    let district_idx = match out.column_index(DISTRICT_ID) {
        Some(idx) => idx,
        None => {
            out.headers.push(standardize_column_name(DISTRICT_ID));
            for row in &mut out.rows {
                row.push(String::new());
            }
            out.headers.len() - 1
        }
    };

    let mut filled = 0;
    for row in &mut out.rows {
        if !is_null(&row[district_idx]) {
            continue;
        }
        if let Some(district) = district_map.get(row[postal_idx].trim()) {
            row[district_idx] = district.to_string();
            filled += 1;
        }
    }
    (out, filled)
}

/// Reads a `postal_code,district_id` lookup table.
pub fn load_postal_district_map(path: &Path) -> Result<BTreeMap<String, DistrictId>> {
    let table = RawTable::from_path(path)?;
    let postal_idx = table
        .column_index(POSTAL_CODE)
        .ok_or_else(|| anyhow!("{} has no {POSTAL_CODE} column", path.display()))?;
    let district_idx = table
        .column_index(DISTRICT_ID)
        .ok_or_else(|| anyhow!("{} has no {DISTRICT_ID} column", path.display()))?;

    let mut map = BTreeMap::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let postal = row[postal_idx].trim();
        let district = parse_district(idx + 1, Some(&row[district_idx]))
            .with_context(|| format!("invalid postal map: {}", path.display()))?;
        if let Some(district) = district.filter(|_| !is_null(postal)) {
            map.entry(postal.to_string()).or_insert(district);
        }
    }
    Ok(map)
}

type RecordKey = (Option<i64>, String, [Option<u64>; 4]);

fn record_key(record: &CandidateRecord) -> RecordKey {
    (
        record.district_id,
        record.tech.clone(),
        [
            record.expected_capex_eur.map(f64::to_bits),
            record.opex_eur.map(f64::to_bits),
            record.expected_saving_kg.map(f64::to_bits),
            record.adoption_rate.map(f64::to_bits),
        ],
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
