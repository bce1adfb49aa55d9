use anyhow::Result;

use crate::candidates::CandidateRecord;
use crate::portfolio::{Portfolio, TransformedCandidate};

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Selected rows with full precision; formatting is left to the reader.
pub fn portfolio_to_csv(portfolio: &Portfolio) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "district_id",
        "tech",
        "adoption_rate",
        "total_cost_eur",
        "weighted_saving_kg",
        "budget_remaining_eur",
    ])?;
    for row in &portfolio.selected {
        writer.write_record([
            row.district_id.to_string(),
            row.tech.clone(),
            row.adoption_rate.to_string(),
            row.total_cost_eur.to_string(),
            row.weighted_saving_kg.to_string(),
            portfolio.budget_remaining_eur.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn transformed_to_csv(rows: &[TransformedCandidate]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "district_id",
        "tech",
        "adoption_rate",
        "adoption_rate_imputed",
        "subsidized_capex_eur",
        "scaled_opex_eur",
        "total_cost_eur",
        "weighted_saving_kg",
    ])?;
    for row in rows {
        writer.write_record([
            row.district_id.to_string(),
            row.tech.clone(),
            row.adoption_rate.to_string(),
            row.adoption_rate_imputed.to_string(),
            row.subsidized_capex_eur.to_string(),
            row.scaled_opex_eur.to_string(),
            row.total_cost_eur.to_string(),
            row.weighted_saving_kg.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

/// Writes records back in the candidate table layout, readable by the loader.
pub fn candidates_to_csv(records: &[CandidateRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "district_id",
        "tech",
        "expected_capex_eur",
        "OPEX",
        "expected_saving_kg",
        "adoption_rate",
    ])?;
    for record in records {
        writer.write_record([
            record.district_id.map(|d| d.to_string()).unwrap_or_default(),
            record.tech.clone(),
            opt(record.expected_capex_eur),
            opt(record.opex_eur),
            opt(record.expected_saving_kg),
            opt(record.adoption_rate),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
