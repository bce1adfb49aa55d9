use serde::{Deserialize, Serialize};

use crate::candidates::{CandidateRecord, DistrictId};
use crate::portfolio::greedy::run_scenario;
use crate::portfolio::{Portfolio, PortfolioError, ScenarioRun};
use crate::scenario::Scenario;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub baseline: ScenarioRun,
    pub alternative: ScenarioRun,
    pub districts_gained: Vec<DistrictId>,
    pub districts_lost: Vec<DistrictId>,
    pub cost_delta_eur: f64,
    pub saving_delta_kg: f64,
    pub budget_remaining_delta_eur: f64,
}

/// Runs both scenarios over the same records and reports what changes when
/// moving from `baseline` to `alternative`.
pub fn compare_scenarios(
    records: &[CandidateRecord],
    baseline: &Scenario,
    alternative: &Scenario,
) -> Result<ScenarioComparison, PortfolioError> {
    let before = run_scenario(records, baseline)?;
    let after = run_scenario(records, alternative)?;

    Ok(ScenarioComparison {
        districts_gained: gained_districts(&before, &after),
        districts_lost: gained_districts(&after, &before),
        cost_delta_eur: after.total_cost_eur() - before.total_cost_eur(),
        saving_delta_kg: after.total_weighted_saving_kg() - before.total_weighted_saving_kg(),
        budget_remaining_delta_eur: after.budget_remaining_eur - before.budget_remaining_eur,
        baseline: ScenarioRun {
            scenario: baseline.clone(),
            portfolio: before,
        },
        alternative: ScenarioRun {
            scenario: alternative.clone(),
            portfolio: after,
        },
    })
}

/// Districts funded in `after` but not in `before`, in `after`'s selection order.
fn gained_districts(before: &Portfolio, after: &Portfolio) -> Vec<DistrictId> {
    let funded = before.district_ids();
    after
        .district_ids()
        .into_iter()
        .filter(|id| !funded.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(budget_eur: f64, priority: Vec<DistrictId>) -> Scenario {
        Scenario {
            budget_eur,
            capex_subsidy_pct: 0.0,
            opex_factor: 1.0,
            co2_factor: 1.0,
            priority_districts: priority,
            adoption_rate_default: 0.30,
        }
    }

    fn records() -> Vec<CandidateRecord> {
        vec![
            CandidateRecord::new(10, "heat_pump", 1_000_000.0, 500_000.0).with_adoption_rate(1.0),
            CandidateRecord::new(10, "district_heating", 1_500_000.0, 900_000.0),
            CandidateRecord::new(1, "biomass", 800_000.0, 300_000.0).with_adoption_rate(1.0),
        ]
    }

    #[test]
    fn raising_budget_gains_remainder_district() {
        let cmp = compare_scenarios(
            &records(),
            &scenario(1_200_000.0, vec![10]),
            &scenario(2_000_000.0, vec![10]),
        )
        .unwrap();
        assert_eq!(cmp.districts_gained, vec![1]);
        assert!(cmp.districts_lost.is_empty());
        assert_eq!(cmp.cost_delta_eur, 800_000.0);
        assert_eq!(cmp.saving_delta_kg, 300_000.0);
        assert_eq!(cmp.budget_remaining_delta_eur, 0.0);
    }

    #[test]
    fn changing_priority_swaps_districts() {
        let cmp = compare_scenarios(
            &records(),
            &scenario(1_200_000.0, vec![10]),
            &scenario(1_200_000.0, vec![1]),
        )
        .unwrap();
        assert_eq!(cmp.districts_gained, vec![1]);
        assert_eq!(cmp.districts_lost, vec![10]);
        assert_eq!(cmp.alternative.portfolio.budget_remaining_eur, 400_000.0);
    }

    #[test]
    fn invalid_alternative_is_reported() {
        let bad = Scenario {
            co2_factor: -1.0,
            ..scenario(1.0, vec![])
        };
        assert!(compare_scenarios(&records(), &scenario(1.0, vec![]), &bad).is_err());
    }
}
