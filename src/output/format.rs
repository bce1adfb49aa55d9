use serde::{Deserialize, Serialize};

use crate::portfolio::Portfolio;

pub fn kg_to_tons(kg: f64) -> f64 {
    kg / 1_000.0
}

/// `€75.000.000` style, rounded to the nearest euro.
pub fn fmt_money_eur_eu(amount: f64) -> String {
    match whole_units(amount) {
        Some(value) => format!("€{}", group_thousands(value)),
        None => amount.to_string(),
    }
}

/// `13.068 tons/yr` style, rounded to the nearest ton.
pub fn fmt_co2_tons_yr(tons: f64) -> String {
    match whole_units(tons) {
        Some(value) => format!("{} tons/yr", group_thousands(value)),
        None => tons.to_string(),
    }
}

/// Rounded value, or `None` when it is not finite or does not fit an `i64`.
fn whole_units(value: f64) -> Option<i64> {
    let rounded = value.round();
    (rounded.is_finite() && rounded.abs() < i64::MAX as f64).then_some(rounded as i64)
}

pub fn fmt_pct(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Formatted totals line for stakeholder tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalRow {
    pub district: String,
    pub tech: String,
    pub adoption_rate: String,
    pub co2_emissions_reduce: String,
    pub cost: String,
}

pub fn build_total_row(portfolio: &Portfolio) -> TotalRow {
    TotalRow {
        district: "TOTAL".to_string(),
        tech: "—".to_string(),
        adoption_rate: "—".to_string(),
        co2_emissions_reduce: fmt_co2_tons_yr(kg_to_tons(portfolio.total_weighted_saving_kg())),
        cost: fmt_money_eur_eu(portfolio.total_cost_eur()),
    }
}
