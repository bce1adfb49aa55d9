use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub type DistrictId = i64;

pub const DISTRICT_ID: &str = "district_id";
pub const TECH: &str = "tech";
pub const EXPECTED_CAPEX_EUR: &str = "expected_capex_eur";
pub const OPEX: &str = "OPEX";
pub const EXPECTED_SAVING_KG: &str = "expected_saving_kg";
pub const ADOPTION_RATE: &str = "adoption_rate";

pub const REQUIRED_COLUMNS: [&str; 3] = [DISTRICT_ID, EXPECTED_CAPEX_EUR, EXPECTED_SAVING_KG];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("row {row}: missing value for required column {column}")]
    MissingValue { row: usize, column: &'static str },
    #[error("row {row}: invalid value {value:?} in column {column}")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// One (district, technology) row as it arrives from the cleaned dataset.
/// Required fields are optional here so that absence can be reported instead
/// of silently defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default, deserialize_with = "deserialize_district_id")]
    pub district_id: Option<DistrictId>,
    #[serde(default)]
    pub tech: String,
    #[serde(default)]
    pub expected_capex_eur: Option<f64>,
    #[serde(default, rename = "OPEX", alias = "opex", alias = "opex_eur")]
    pub opex_eur: Option<f64>,
    #[serde(default)]
    pub expected_saving_kg: Option<f64>,
    #[serde(default)]
    pub adoption_rate: Option<f64>,
}

impl CandidateRecord {
    pub fn new(district_id: DistrictId, tech: &str, capex_eur: f64, saving_kg: f64) -> Self {
        Self {
            district_id: Some(district_id),
            tech: tech.to_string(),
            expected_capex_eur: Some(capex_eur),
            opex_eur: None,
            expected_saving_kg: Some(saving_kg),
            adoption_rate: None,
        }
    }

    pub fn with_opex(mut self, opex_eur: f64) -> Self {
        self.opex_eur = Some(opex_eur);
        self
    }

    pub fn with_adoption_rate(mut self, adoption_rate: f64) -> Self {
        self.adoption_rate = Some(adoption_rate);
        self
    }
}

/// Accepts `10` as well as the `10.0` that float-typed exports produce.
fn deserialize_district_id<'de, D>(deserializer: D) -> Result<Option<DistrictId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Ok(Some(value as DistrictId))
        }
        Some(value) => Err(serde::de::Error::custom(format!(
            "district_id must be a whole number, got {value}"
        ))),
    }
}

/// A record whose required fields are present and whose values satisfy the
/// domain invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub district_id: DistrictId,
    pub tech: String,
    pub expected_capex_eur: f64,
    pub opex_eur: f64,
    pub expected_saving_kg: f64,
    pub adoption_rate: Option<f64>,
}

impl Candidate {
    /// `row` is the 1-based data row used in error messages.
    pub fn from_record(row: usize, record: &CandidateRecord) -> Result<Self, SchemaError> {
        let district_id = record.district_id.ok_or(SchemaError::MissingValue {
            row,
            column: DISTRICT_ID,
        })?;
        let expected_capex_eur =
            required_amount(row, EXPECTED_CAPEX_EUR, record.expected_capex_eur)?;
        let expected_saving_kg =
            required_amount(row, EXPECTED_SAVING_KG, record.expected_saving_kg)?;
        let opex_eur = match record.opex_eur {
            Some(value) => non_negative(row, OPEX, value)?,
            None => 0.0,
        };
        let adoption_rate = match record.adoption_rate {
            Some(value) if value.is_finite() && (0.0..=1.0).contains(&value) => Some(value),
            Some(value) => {
                return Err(SchemaError::InvalidValue {
                    row,
                    column: ADOPTION_RATE,
                    value: value.to_string(),
                })
            }
            None => None,
        };

        Ok(Self {
            district_id,
            tech: record.tech.clone(),
            expected_capex_eur,
            opex_eur,
            expected_saving_kg,
            adoption_rate,
        })
    }
}

impl Display for Candidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "district {} / {}", self.district_id, self.tech)
    }
}

/// Validates every record once. A required field absent from every row is a
/// missing column; absent from some rows it is a missing value.
pub fn validate_records(records: &[CandidateRecord]) -> Result<Vec<Candidate>, SchemaError> {
    if !records.is_empty() {
        let mut missing = Vec::new();
        if records.iter().all(|r| r.district_id.is_none()) {
            missing.push(DISTRICT_ID.to_string());
        }
        if records.iter().all(|r| r.expected_capex_eur.is_none()) {
            missing.push(EXPECTED_CAPEX_EUR.to_string());
        }
        if records.iter().all(|r| r.expected_saving_kg.is_none()) {
            missing.push(EXPECTED_SAVING_KG.to_string());
        }
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }
    }

    records
        .iter()
        .enumerate()
        .map(|(idx, record)| Candidate::from_record(idx + 1, record))
        .collect()
}

fn required_amount(
    row: usize,
    column: &'static str,
    value: Option<f64>,
) -> Result<f64, SchemaError> {
    let value = value.ok_or(SchemaError::MissingValue { row, column })?;
    non_negative(row, column, value)
}

fn non_negative(row: usize, column: &'static str, value: f64) -> Result<f64, SchemaError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SchemaError::InvalidValue {
            row,
            column,
            value: value.to_string(),
        })
    }
}
