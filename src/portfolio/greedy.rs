use std::collections::{BTreeMap, BTreeSet};

use crate::candidates::{CandidateRecord, DistrictId};
use crate::portfolio::transform::transform;
use crate::portfolio::{DistrictEvaluation, Portfolio, PortfolioError, TransformedCandidate};
use crate::scenario::{validate_budget, InvalidScenarioError, Scenario};

/// Priority-first greedy selection.
///
/// Districts are visited once each: the caller's priority districts in the
/// given order (those without candidates are skipped), then every other
/// district in ascending id order. Each district offers only its cheapest
/// candidate (first one on ties) and is admitted when that cost fits in the
/// remaining budget. A district that does not fit contributes nothing and is
/// never revisited.
pub fn select(
    transformed: &[TransformedCandidate],
    budget_eur: f64,
    priority_districts: &[DistrictId],
) -> Result<Portfolio, InvalidScenarioError> {
    validate_budget(budget_eur)?;

    let cheapest = cheapest_per_district(transformed);
    let priority = priority_set(priority_districts, &cheapest);
    let mut budget_left = budget_eur;
    let mut selected = Vec::new();
    let mut evaluations = Vec::with_capacity(cheapest.len());

    for district_id in district_order(transformed, priority_districts) {
        let Some(&idx) = cheapest.get(&district_id) else {
            continue;
        };
        let candidate = &transformed[idx];
        let admitted = candidate.total_cost_eur <= budget_left;
        evaluations.push(DistrictEvaluation {
            district_id,
            priority: priority.contains(&district_id),
            tech: candidate.tech.clone(),
            total_cost_eur: candidate.total_cost_eur,
            budget_before_eur: budget_left,
            admitted,
        });
        if admitted {
            budget_left -= candidate.total_cost_eur;
            selected.push(candidate.clone());
        }
    }

    Ok(Portfolio {
        selected,
        budget_eur,
        budget_remaining_eur: budget_left,
        evaluations,
    })
}

/// Validates the scenario, applies its levers and selects.
pub fn run_scenario(
    records: &[CandidateRecord],
    scenario: &Scenario,
) -> Result<Portfolio, PortfolioError> {
    let transformed = transform(records, scenario)?;
    Ok(select(
        &transformed,
        scenario.budget_eur,
        &scenario.priority_districts,
    )?)
}

/// The order in which districts are evaluated: present priority districts in
/// caller order (first occurrence wins), then the rest ascending.
pub fn district_order(
    transformed: &[TransformedCandidate],
    priority_districts: &[DistrictId],
) -> Vec<DistrictId> {
    let present = transformed
        .iter()
        .map(|c| c.district_id)
        .collect::<BTreeSet<_>>();

    let mut order = Vec::with_capacity(present.len());
    let mut seen = BTreeSet::new();
    for district_id in priority_districts {
        if present.contains(district_id) && seen.insert(*district_id) {
            order.push(*district_id);
        }
    }
    order.extend(present.iter().filter(|id| !seen.contains(id)).copied());
    order
}

/// Index of the minimum-cost candidate per district. Only a strictly cheaper
/// candidate replaces the current one, so the earliest minimum wins. Rows whose
/// cost is negative or not finite are never offered.
fn cheapest_per_district(transformed: &[TransformedCandidate]) -> BTreeMap<DistrictId, usize> {
    let mut cheapest: BTreeMap<DistrictId, usize> = BTreeMap::new();
    for (idx, candidate) in transformed.iter().enumerate() {
        let cost = candidate.total_cost_eur;
        if !cost.is_finite() || cost < 0.0 {
            continue;
        }
        cheapest
            .entry(candidate.district_id)
            .and_modify(|best| {
                if candidate.total_cost_eur < transformed[*best].total_cost_eur {
                    *best = idx;
                }
            })
            .or_insert(idx);
    }
    cheapest
}

fn priority_set(
    priority_districts: &[DistrictId],
    cheapest: &BTreeMap<DistrictId, usize>,
) -> BTreeSet<DistrictId> {
    priority_districts
        .iter()
        .filter(|id| cheapest.contains_key(id))
        .copied()
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

    fn example_records() -> Vec<CandidateRecord> {
        vec![
            CandidateRecord::new(10, "heat_pump", 1_000_000.0, 500_000.0),
            CandidateRecord::new(10, "district_heating", 1_500_000.0, 900_000.0),
            CandidateRecord::new(1, "biomass", 800_000.0, 300_000.0),
        ]
    }

    fn costed(district_id: DistrictId, tech: &str, cost: f64) -> TransformedCandidate {
        TransformedCandidate {
            district_id,
            tech: tech.to_string(),
            expected_capex_eur: cost,
            opex_eur: 0.0,
            expected_saving_kg: 1.0,
            adoption_rate: 1.0,
            adoption_rate_imputed: false,
            subsidized_capex_eur: cost,
            scaled_opex_eur: 0.0,
            total_cost_eur: cost,
            weighted_saving_kg: 1.0,
        }
    }

    #[test]
    fn priority_district_consumes_budget_first() {
        let portfolio = run_scenario(&example_records(), &scenario(1_200_000.0, vec![10])).unwrap();
        assert_eq!(portfolio.district_ids(), vec![10]);
        assert_eq!(portfolio.selected[0].tech, "heat_pump");
        assert_eq!(portfolio.budget_remaining_eur, 200_000.0);

        let skipped = portfolio.skipped().collect::<Vec<_>>();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].district_id, 1);
        assert!(!skipped[0].priority);
    }

    #[test]
    fn larger_budget_admits_remainder() {
        let portfolio = run_scenario(&example_records(), &scenario(2_000_000.0, vec![10])).unwrap();
        assert_eq!(portfolio.district_ids(), vec![10, 1]);
        assert_eq!(portfolio.budget_remaining_eur, 200_000.0);
    }

    #[test]
    fn no_candidates_keeps_full_budget() {
        let portfolio = select(&[], 750.0, &[10, 11]).unwrap();
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.budget_remaining_eur, 750.0);
        assert!(portfolio.evaluations.is_empty());
    }

    #[test]
    fn zero_budget_selects_nothing_but_free_options() {
        let transformed = vec![costed(1, "a", 10.0), costed(2, "b", 5.0)];
        let portfolio = select(&transformed, 0.0, &[]).unwrap();
        assert!(portfolio.is_empty());
        assert_eq!(portfolio.budget_remaining_eur, 0.0);

        let with_free = vec![costed(1, "a", 10.0), costed(2, "free", 0.0)];
        let portfolio = select(&with_free, 0.0, &[]).unwrap();
        assert_eq!(portfolio.district_ids(), vec![2]);
    }

    #[test]
    fn negative_budget_is_an_error() {
        let err = select(&[costed(1, "a", 1.0)], -1.0, &[]).unwrap_err();
        assert_eq!(err, InvalidScenarioError::NegativeBudget(-1.0));

        let err = run_scenario(&example_records(), &scenario(-5.0, vec![])).unwrap_err();
        assert!(matches!(err, PortfolioError::InvalidScenario(_)));
    }

    #[test]
    fn order_is_priority_then_ascending() {
        let transformed = vec![
            costed(7, "a", 1.0),
            costed(3, "a", 1.0),
            costed(12, "a", 1.0),
            costed(1, "a", 1.0),
        ];
        assert_eq!(
            district_order(&transformed, &[12, 99, 3, 12]),
            vec![12, 3, 1, 7]
        );
    }

    #[test]
    fn cheapest_tie_keeps_first_candidate() {
        let transformed = vec![
            costed(4, "first", 100.0),
            costed(4, "second", 100.0),
            costed(4, "pricier", 150.0),
        ];
        let portfolio = select(&transformed, 1_000.0, &[]).unwrap();
        assert_eq!(portfolio.len(), 1);
        assert_eq!(portfolio.selected[0].tech, "first");
    }

    #[test]
    fn skipped_district_gets_no_cheaper_substitute() {
        // District 2 no longer fits after district 1 and is not revisited
        // once district 3 has been admitted.
        let transformed = vec![
            costed(1, "a", 60.0),
            costed(2, "cheap", 50.0),
            costed(2, "expensive", 80.0),
            costed(3, "c", 30.0),
        ];
        let portfolio = select(&transformed, 100.0, &[1]).unwrap();
        assert_eq!(portfolio.district_ids(), vec![1, 3]);
        assert_eq!(portfolio.budget_remaining_eur, 10.0);
    }

    #[test]
    fn negative_or_nan_costs_are_never_admitted() {
        let rows = vec![
            costed(1, "refund", -50.0),
            costed(2, "broken", f64::NAN),
            costed(2, "heat_pump", 30.0),
            costed(3, "infinite", f64::INFINITY),
        ];
        let portfolio = select(&rows, 100.0, &[]).unwrap();
        assert_eq!(portfolio.district_ids(), vec![2]);
        assert_eq!(portfolio.selected[0].tech, "heat_pump");
        assert_eq!(portfolio.budget_remaining_eur, 70.0);
        assert!(portfolio.budget_remaining_eur <= portfolio.budget_eur);
        assert_eq!(portfolio.evaluations.len(), 1);
    }

    #[test]
    fn priority_precedes_cheaper_remainder() {
        let transformed = vec![costed(1, "cheap", 10.0), costed(20, "costly", 95.0)];
        let portfolio = select(&transformed, 100.0, &[20]).unwrap();
        assert_eq!(portfolio.district_ids(), vec![20]);
        assert_eq!(portfolio.budget_remaining_eur, 5.0);
        assert!(portfolio.evaluations[0].priority);
        assert_eq!(portfolio.evaluations[0].district_id, 20);
    }

    #[test]
    fn invariants_hold_over_generated_tables() {
        // Deterministic pseudo-random tables covering many shapes.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        for _ in 0..200 {
            let rows = (next() % 25) as usize;
            let transformed = (0..rows)
                .map(|_| {
                    let district = (next() % 8) as DistrictId;
                    let cost = (next() % 1_000) as f64 * 1.5;
                    costed(district, "t", cost)
                })
                .collect::<Vec<_>>();
            let priority = (0..(next() % 4))
                .map(|_| (next() % 10) as DistrictId)
                .collect::<Vec<_>>();
            let budget = (next() % 3_000) as f64;

            let portfolio = select(&transformed, budget, &priority).unwrap();
            let again = select(&transformed, budget, &priority).unwrap();
            assert_eq!(portfolio, again);

            let ids = portfolio.district_ids();
            let unique = ids.iter().collect::<BTreeSet<_>>();
            assert_eq!(unique.len(), ids.len());

            assert!(portfolio.budget_remaining_eur >= 0.0);
            assert!(
                (portfolio.budget_remaining_eur - (budget - portfolio.total_cost_eur())).abs()
                    < 1e-6
            );

            for chosen in &portfolio.selected {
                let min = transformed
                    .iter()
                    .filter(|c| c.district_id == chosen.district_id)
                    .map(|c| c.total_cost_eur)
                    .fold(f64::INFINITY, f64::min);
                assert_eq!(chosen.total_cost_eur, min);
            }

            let mut last_budget = budget;
            for evaluation in &portfolio.evaluations {
                assert!(evaluation.budget_before_eur <= last_budget);
                last_budget = evaluation.budget_before_eur;
            }

            let first_remainder = portfolio.evaluations.iter().position(|e| !e.priority);
            if let Some(pos) = first_remainder {
                assert!(portfolio.evaluations[pos..].iter().all(|e| !e.priority));
            }
        }
    }

    #[test]
    fn concurrent_evaluations_agree() {
        let records = example_records();
        let scenarios = [
            scenario(1_200_000.0, vec![10]),
            scenario(2_000_000.0, vec![10]),
            scenario(0.0, vec![1]),
        ];
        let expected = scenarios
            .iter()
            .map(|s| run_scenario(&records, s).unwrap())
            .collect::<Vec<_>>();

        let records = &records;
        std::thread::scope(|scope| {
            let handles = scenarios
                .iter()
                .map(|s| scope.spawn(move || run_scenario(records, s).unwrap()))
                .collect::<Vec<_>>();
            for (handle, want) in handles.into_iter().zip(&expected) {
                assert_eq!(&handle.join().unwrap(), want);
            }
        });
    }
}
