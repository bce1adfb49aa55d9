use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candidates::DistrictId;
use crate::output::format::{fmt_co2_tons_yr, fmt_money_eur_eu, kg_to_tons};
use crate::portfolio::Portfolio;
use crate::scenario::Scenario;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioTotals {
    pub districts_selected: usize,
    pub budget_eur: f64,
    pub budget_spent_eur: f64,
    pub budget_remaining_eur: f64,
    pub total_weighted_saving_kg: f64,
    pub total_weighted_saving_tons: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictAggregate {
    pub district_id: DistrictId,
    pub cost_eur: f64,
    pub co2_tons: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPerTon {
    pub district_id: DistrictId,
    pub tech: String,
    /// `None` when the selected option saves nothing.
    pub cost_per_ton_eur: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: usize,
    pub title: String,
    pub rationale: String,
}

pub fn totals(portfolio: &Portfolio) -> PortfolioTotals {
    let saving_kg = portfolio.total_weighted_saving_kg();
    PortfolioTotals {
        districts_selected: portfolio.len(),
        budget_eur: portfolio.budget_eur,
        budget_spent_eur: portfolio.total_cost_eur(),
        budget_remaining_eur: portfolio.budget_remaining_eur,
        total_weighted_saving_kg: saving_kg,
        total_weighted_saving_tons: kg_to_tons(saving_kg),
    }
}

/// Cost and CO₂ per selected district, ascending by id.
pub fn by_district(portfolio: &Portfolio) -> Vec<DistrictAggregate> {
    let mut grouped: BTreeMap<DistrictId, (f64, f64)> = BTreeMap::new();
    for candidate in &portfolio.selected {
        let entry = grouped.entry(candidate.district_id).or_default();
        entry.0 += candidate.total_cost_eur;
        entry.1 += candidate.weighted_saving_kg;
    }
    grouped
        .into_iter()
        .map(|(district_id, (cost_eur, saving_kg))| DistrictAggregate {
            district_id,
            cost_eur,
            co2_tons: kg_to_tons(saving_kg),
        })
        .collect()
}

/// Lower is better. Options without savings sort last, in selection order.
pub fn cost_per_ton_leaderboard(portfolio: &Portfolio) -> Vec<CostPerTon> {
    let mut board = portfolio
        .selected
        .iter()
        .map(|candidate| {
            let tons = kg_to_tons(candidate.weighted_saving_kg);
            CostPerTon {
                district_id: candidate.district_id,
                tech: candidate.tech.clone(),
                cost_per_ton_eur: (tons > 0.0).then(|| candidate.total_cost_eur / tons),
            }
        })
        .collect::<Vec<_>>();
    board.sort_by(|a, b| match (a.cost_per_ton_eur, b.cost_per_ton_eur) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    board
}

pub fn build_recommendations(portfolio: &Portfolio, scenario: &Scenario) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    let mut rank = 1usize;
    let mut push = |title: String, rationale: String| {
        recommendations.push(Recommendation {
            priority: rank,
            title,
            rationale,
        });
        rank += 1;
    };

    if portfolio.is_empty() {
        push(
            "No rollout fits the budget".to_string(),
            format!(
                "No district's cheapest option fits within {}. Raise the budget or the CAPEX subsidy.",
                fmt_money_eur_eu(portfolio.budget_eur)
            ),
        );
        return recommendations;
    }

    let funded_priority = portfolio
        .evaluations
        .iter()
        .filter(|e| e.priority && e.admitted)
        .map(|e| e.district_id.to_string())
        .collect::<Vec<_>>();
    let unfunded_priority = portfolio
        .evaluations
        .iter()
        .filter(|e| e.priority && !e.admitted)
        .map(|e| e.district_id.to_string())
        .collect::<Vec<_>>();
    if !scenario.priority_districts.is_empty() {
        let mut rationale = format!(
            "Priority districts {:?} are served first; funded: [{}].",
            scenario.priority_districts,
            funded_priority.join(", ")
        );
        if !unfunded_priority.is_empty() {
            rationale.push_str(&format!(
                " Not affordable at their turn: [{}].",
                unfunded_priority.join(", ")
            ));
        }
        push("Serve priority districts first".to_string(), rationale);
    }

    push(
        format!(
            "Roll out in {} district(s) for {}",
            portfolio.len(),
            fmt_money_eur_eu(portfolio.total_cost_eur())
        ),
        format!(
            "Expected reduction {}; remaining budget {}.",
            fmt_co2_tons_yr(kg_to_tons(portfolio.total_weighted_saving_kg())),
            fmt_money_eur_eu(portfolio.budget_remaining_eur)
        ),
    );

    if let Some(best) = cost_per_ton_leaderboard(portfolio)
        .into_iter()
        .find(|entry| entry.cost_per_ton_eur.is_some())
    {
        push(
            format!("Best value: district {} ({})", best.district_id, best.tech),
            format!(
                "Lowest cost per ton of CO₂ in the portfolio at {} per ton/yr.",
                fmt_money_eur_eu(best.cost_per_ton_eur.unwrap_or_default())
            ),
        );
    }

    let skipped = portfolio
        .skipped()
        .filter(|e| !e.priority)
        .map(|e| e.district_id.to_string())
        .collect::<Vec<_>>();
    if !skipped.is_empty() {
        push(
            format!("{} district(s) left unfunded", skipped.len()),
            format!(
                "Districts [{}] did not fit the remaining budget at their turn.",
                skipped.join(", ")
            ),
        );
    }

    recommendations
}
