use crate::candidates::{validate_records, Candidate, CandidateRecord};
use crate::portfolio::{PortfolioError, TransformedCandidate};
use crate::scenario::Scenario;

/// Applies the scenario levers to every record. Same cardinality and order as
/// the input; nothing is filtered, sorted or deduplicated.
pub fn transform(
    records: &[CandidateRecord],
    scenario: &Scenario,
) -> Result<Vec<TransformedCandidate>, PortfolioError> {
    scenario.validate()?;
    let candidates = validate_records(records)?;
    Ok(candidates
        .iter()
        .map(|candidate| apply_levers(candidate, scenario))
        .collect())
}

fn apply_levers(candidate: &Candidate, scenario: &Scenario) -> TransformedCandidate {
    let (adoption_rate, adoption_rate_imputed) = match candidate.adoption_rate {
        Some(rate) => (rate, false),
        None => (scenario.adoption_rate_default, true),
    };
    let subsidized_capex_eur =
        candidate.expected_capex_eur * (1.0 - scenario.capex_subsidy_pct / 100.0);
    let scaled_opex_eur = candidate.opex_eur * scenario.opex_factor;

    TransformedCandidate {
        district_id: candidate.district_id,
        tech: candidate.tech.clone(),
        expected_capex_eur: candidate.expected_capex_eur,
        opex_eur: candidate.opex_eur,
        expected_saving_kg: candidate.expected_saving_kg,
        adoption_rate,
        adoption_rate_imputed,
        subsidized_capex_eur,
        scaled_opex_eur,
        total_cost_eur: subsidized_capex_eur + scaled_opex_eur,
        weighted_saving_kg: candidate.expected_saving_kg * adoption_rate * scenario.co2_factor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::SchemaError;
    use crate::scenario::InvalidScenarioError;

    fn scenario() -> Scenario {
        Scenario {
            budget_eur: 1_000_000.0,
            capex_subsidy_pct: 0.0,
            opex_factor: 1.0,
            co2_factor: 1.0,
            priority_districts: Vec::new(),
            adoption_rate_default: 0.30,
        }
    }

    #[test]
    fn subsidy_reduces_capex() {
        let records = vec![CandidateRecord::new(1, "heat_pump", 1_000_000.0, 10.0)];
        let s = Scenario {
            capex_subsidy_pct: 20.0,
            ..scenario()
        };
        let out = transform(&records, &s).unwrap();
        assert_eq!(out[0].subsidized_capex_eur, 800_000.0);
        assert_eq!(out[0].total_cost_eur, 800_000.0);
    }

    #[test]
    fn missing_adoption_uses_default() {
        let records = vec![CandidateRecord::new(1, "heat_pump", 1.0, 1_000.0)];
        let s = Scenario {
            co2_factor: 2.0,
            ..scenario()
        };
        let out = transform(&records, &s).unwrap();
        assert_eq!(out[0].adoption_rate, 0.30);
        assert!(out[0].adoption_rate_imputed);
        assert_eq!(out[0].weighted_saving_kg, 1_000.0 * 0.30 * 2.0);
    }

    #[test]
    fn present_adoption_is_kept() {
        let records =
            vec![CandidateRecord::new(1, "heat_pump", 1.0, 1_000.0).with_adoption_rate(0.5)];
        let out = transform(&records, &scenario()).unwrap();
        assert_eq!(out[0].adoption_rate, 0.5);
        assert!(!out[0].adoption_rate_imputed);
        assert_eq!(out[0].weighted_saving_kg, 500.0);
    }

    #[test]
    fn opex_is_scaled_and_added() {
        let records = vec![
            CandidateRecord::new(1, "a", 100.0, 1.0).with_opex(40.0),
            CandidateRecord::new(2, "b", 100.0, 1.0),
        ];
        let s = Scenario {
            opex_factor: 1.5,
            ..scenario()
        };
        let out = transform(&records, &s).unwrap();
        assert_eq!(out[0].scaled_opex_eur, 60.0);
        assert_eq!(out[0].total_cost_eur, 160.0);
        assert_eq!(out[1].scaled_opex_eur, 0.0);
        assert_eq!(out[1].total_cost_eur, 100.0);
    }

    #[test]
    fn preserves_order_and_input() {
        let records = vec![
            CandidateRecord::new(5, "a", 3.0, 1.0),
            CandidateRecord::new(1, "b", 2.0, 1.0),
            CandidateRecord::new(5, "a", 3.0, 1.0),
        ];
        let before = records.clone();
        let out = transform(&records, &scenario()).unwrap();
        assert_eq!(records, before);
        assert_eq!(
            out.iter().map(|c| c.district_id).collect::<Vec<_>>(),
            vec![5, 1, 5]
        );
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(transform(&[], &scenario()).unwrap().is_empty());
    }

    #[test]
    fn schema_error_is_not_patched() {
        let mut record = CandidateRecord::new(1, "a", 1.0, 1.0);
        record.expected_capex_eur = None;
        let err = transform(&[record], &scenario()).unwrap_err();
        assert!(matches!(
            err,
            PortfolioError::Schema(SchemaError::MissingColumns(_))
        ));
    }

    #[test]
    fn invalid_scenario_fails_before_computation() {
        let s = Scenario {
            capex_subsidy_pct: 150.0,
            ..scenario()
        };
        let err = transform(&[CandidateRecord::new(1, "a", 1.0, 1.0)], &s).unwrap_err();
        assert_eq!(
            err,
            PortfolioError::InvalidScenario(InvalidScenarioError::SubsidyOutOfRange(150.0))
        );
    }
}
