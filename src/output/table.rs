use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::candidates::QualityReport;
use crate::dataset::RawTable;
use crate::output::format::{
    build_total_row, fmt_co2_tons_yr, fmt_money_eur_eu, fmt_pct, kg_to_tons,
};
use crate::portfolio::compare::ScenarioComparison;
use crate::portfolio::summary::{CostPerTon, Recommendation};
use crate::portfolio::{Portfolio, TransformedCandidate};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn render_portfolio_table(portfolio: &Portfolio) -> String {
    let mut table = new_table();
    table.set_header(vec!["District", "Tech", "Adoption", "CO₂ reduced", "Cost"]);

    for row in &portfolio.selected {
        table.add_row(vec![
            row.district_id.to_string(),
            row.tech.clone(),
            fmt_pct(row.adoption_rate),
            fmt_co2_tons_yr(kg_to_tons(row.weighted_saving_kg)),
            fmt_money_eur_eu(row.total_cost_eur),
        ]);
    }
    let total = build_total_row(portfolio);
    table.add_row(Row::from(vec![
        Cell::new(total.district),
        Cell::new(total.tech),
        Cell::new(total.adoption_rate),
        Cell::new(total.co2_emissions_reduce),
        Cell::new(total.cost),
    ]));

    format!(
        "{table}\nBudget: {}  Remaining: {}",
        fmt_money_eur_eu(portfolio.budget_eur),
        fmt_money_eur_eu(portfolio.budget_remaining_eur)
    )
}

/// Every district in evaluation order with its admission outcome.
pub fn render_evaluations_table(portfolio: &Portfolio) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Order",
        "District",
        "Priority",
        "Cheapest option",
        "Cost",
        "Budget before",
        "Decision",
    ]);
    for (idx, evaluation) in portfolio.evaluations.iter().enumerate() {
        let decision = if evaluation.admitted {
            Cell::new("SELECTED").fg(Color::Green)
        } else {
            Cell::new("SKIPPED").fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(idx + 1),
            Cell::new(evaluation.district_id),
            Cell::new(if evaluation.priority { "yes" } else { "-" }),
            Cell::new(&evaluation.tech),
            Cell::new(fmt_money_eur_eu(evaluation.total_cost_eur)),
            Cell::new(fmt_money_eur_eu(evaluation.budget_before_eur)),
            decision,
        ]));
    }
    table.to_string()
}

pub fn render_transformed_table(rows: &[TransformedCandidate]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "District",
        "Tech",
        "Adoption",
        "Subsidized CAPEX",
        "Scaled OPEX",
        "Total cost",
        "Weighted saving",
    ]);
    for row in rows {
        let adoption = if row.adoption_rate_imputed {
            format!("{} (default)", fmt_pct(row.adoption_rate))
        } else {
            fmt_pct(row.adoption_rate)
        };
        table.add_row(vec![
            row.district_id.to_string(),
            row.tech.clone(),
            adoption,
            fmt_money_eur_eu(row.subsidized_capex_eur),
            fmt_money_eur_eu(row.scaled_opex_eur),
            fmt_money_eur_eu(row.total_cost_eur),
            fmt_co2_tons_yr(kg_to_tons(row.weighted_saving_kg)),
        ]);
    }
    table.to_string()
}

pub fn render_leaderboard_table(entries: &[CostPerTon]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Rank", "District", "Tech", "Cost per ton CO₂"]);
    for (idx, entry) in entries.iter().enumerate() {
        table.add_row(vec![
            (idx + 1).to_string(),
            entry.district_id.to_string(),
            entry.tech.clone(),
            entry
                .cost_per_ton_eur
                .map(fmt_money_eur_eu)
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table.to_string()
}

pub fn render_recommendations_table(items: &[Recommendation]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Priority", "Title", "Rationale"]);
    for item in items {
        table.add_row(vec![
            item.priority.to_string(),
            item.title.clone(),
            item.rationale.clone(),
        ]);
    }
    table.to_string()
}

pub fn render_comparison_table(result: &ScenarioComparison) -> String {
    let before = &result.baseline.portfolio;
    let after = &result.alternative.portfolio;
    let mut table = new_table();
    table.set_header(vec!["", "Baseline", "Alternative", "Change"]);
    table.add_row(vec![
        "Districts funded".to_string(),
        before.len().to_string(),
        after.len().to_string(),
        format!("{:+}", after.len() as i64 - before.len() as i64),
    ]);
    table.add_row(vec![
        "Cost".to_string(),
        fmt_money_eur_eu(before.total_cost_eur()),
        fmt_money_eur_eu(after.total_cost_eur()),
        signed(fmt_money_eur_eu(result.cost_delta_eur), result.cost_delta_eur),
    ]);
    table.add_row(vec![
        "CO₂ reduced".to_string(),
        fmt_co2_tons_yr(kg_to_tons(before.total_weighted_saving_kg())),
        fmt_co2_tons_yr(kg_to_tons(after.total_weighted_saving_kg())),
        signed(
            fmt_co2_tons_yr(kg_to_tons(result.saving_delta_kg)),
            result.saving_delta_kg,
        ),
    ]);
    table.add_row(vec![
        "Remaining budget".to_string(),
        fmt_money_eur_eu(before.budget_remaining_eur),
        fmt_money_eur_eu(after.budget_remaining_eur),
        signed(
            fmt_money_eur_eu(result.budget_remaining_delta_eur),
            result.budget_remaining_delta_eur,
        ),
    ]);

    format!(
        "{table}\nDistricts gained: {:?}\nDistricts lost: {:?}",
        result.districts_gained, result.districts_lost
    )
}

pub fn render_quality_table(report: &QualityReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Column", "Nulls", "Null %", "Unique (non-null)"]);
    for (name, column) in &report.columns {
        let null_cell = if column.null_count > 0 {
            Cell::new(column.null_count).fg(Color::Yellow)
        } else {
            Cell::new(column.null_count)
        };
        table.add_row(Row::from(vec![
            Cell::new(name),
            null_cell,
            Cell::new(format!("{:.2}", column.null_pct)),
            Cell::new(column.unique_nonnull),
        ]));
    }
    format!(
        "{table}\nRows: {}  Duplicate rows: {}",
        report.rows_in, report.duplicate_rows
    )
}

pub fn render_raw_table(data: &RawTable) -> String {
    let mut table = new_table();
    table.set_header(data.headers.clone());
    for row in &data.rows {
        table.add_row(row.clone());
    }
    table.to_string()
}

fn signed(formatted: String, value: f64) -> String {
    if value > 0.0 {
        format!("+{formatted}")
    } else {
        formatted
    }
}
