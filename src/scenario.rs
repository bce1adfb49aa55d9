use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::candidates::DistrictId;

/// The policy levers for one evaluation. Built from configuration defaults and
/// passed explicitly into the transformer and selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub budget_eur: f64,
    pub capex_subsidy_pct: f64,
    pub opex_factor: f64,
    pub co2_factor: f64,
    /// Precedence order; duplicates have no extra effect.
    pub priority_districts: Vec<DistrictId>,
    pub adoption_rate_default: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidScenarioError {
    #[error("budget must be a finite, non-negative amount of euros (got {0})")]
    NegativeBudget(f64),
    #[error("CAPEX subsidy must be between 0 and 100 percent (got {0})")]
    SubsidyOutOfRange(f64),
    #[error("OPEX factor must be finite and non-negative (got {0})")]
    NegativeOpexFactor(f64),
    #[error("CO2 factor must be finite and non-negative (got {0})")]
    NegativeCo2Factor(f64),
    #[error("default adoption rate must be between 0 and 1 (got {0})")]
    AdoptionDefaultOutOfRange(f64),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOverrides {
    #[serde(default)]
    pub budget_eur: Option<f64>,
    #[serde(default)]
    pub capex_subsidy_pct: Option<f64>,
    #[serde(default)]
    pub opex_factor: Option<f64>,
    #[serde(default)]
    pub co2_factor: Option<f64>,
    #[serde(default)]
    pub priority_districts: Option<Vec<DistrictId>>,
    #[serde(default)]
    pub adoption_rate_default: Option<f64>,
}

impl ScenarioOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Scenario {
    pub fn validate(&self) -> Result<(), InvalidScenarioError> {
        validate_budget(self.budget_eur)?;
        if !(self.capex_subsidy_pct.is_finite() && (0.0..=100.0).contains(&self.capex_subsidy_pct))
        {
            return Err(InvalidScenarioError::SubsidyOutOfRange(
                self.capex_subsidy_pct,
            ));
        }
        if !is_non_negative(self.opex_factor) {
            return Err(InvalidScenarioError::NegativeOpexFactor(self.opex_factor));
        }
        if !is_non_negative(self.co2_factor) {
            return Err(InvalidScenarioError::NegativeCo2Factor(self.co2_factor));
        }
        if !(self.adoption_rate_default.is_finite()
            && (0.0..=1.0).contains(&self.adoption_rate_default))
        {
            return Err(InvalidScenarioError::AdoptionDefaultOutOfRange(
                self.adoption_rate_default,
            ));
        }
        Ok(())
    }

    pub fn with_overrides(mut self, overrides: ScenarioOverrides) -> Self {
        if let Some(budget) = overrides.budget_eur {
            self.budget_eur = budget;
        }
        if let Some(subsidy) = overrides.capex_subsidy_pct {
            self.capex_subsidy_pct = subsidy;
        }
        if let Some(factor) = overrides.opex_factor {
            self.opex_factor = factor;
        }
        if let Some(factor) = overrides.co2_factor {
            self.co2_factor = factor;
        }
        if let Some(districts) = overrides.priority_districts {
            self.priority_districts = districts;
        }
        if let Some(rate) = overrides.adoption_rate_default {
            self.adoption_rate_default = rate;
        }
        self
    }
}

pub fn validate_budget(budget_eur: f64) -> Result<(), InvalidScenarioError> {
    if is_non_negative(budget_eur) {
        Ok(())
    } else {
        Err(InvalidScenarioError::NegativeBudget(budget_eur))
    }
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Scenario {
        Scenario {
            budget_eur: 1_000_000.0,
            capex_subsidy_pct: 20.0,
            opex_factor: 1.0,
            co2_factor: 1.0,
            priority_districts: vec![10, 11],
            adoption_rate_default: 0.3,
        }
    }

    #[test]
    fn accepts_boundary_levers() {
        let scenario = Scenario {
            budget_eur: 0.0,
            capex_subsidy_pct: 100.0,
            opex_factor: 0.0,
            co2_factor: 0.0,
            adoption_rate_default: 1.0,
            ..base()
        };
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn rejects_each_out_of_domain_lever() {
        let cases = [
            (
                Scenario {
                    budget_eur: -1.0,
                    ..base()
                },
                InvalidScenarioError::NegativeBudget(-1.0),
            ),
            (
                Scenario {
                    capex_subsidy_pct: 100.5,
                    ..base()
                },
                InvalidScenarioError::SubsidyOutOfRange(100.5),
            ),
            (
                Scenario {
                    opex_factor: -0.1,
                    ..base()
                },
                InvalidScenarioError::NegativeOpexFactor(-0.1),
            ),
            (
                Scenario {
                    co2_factor: -2.0,
                    ..base()
                },
                InvalidScenarioError::NegativeCo2Factor(-2.0),
            ),
            (
                Scenario {
                    adoption_rate_default: 1.5,
                    ..base()
                },
                InvalidScenarioError::AdoptionDefaultOutOfRange(1.5),
            ),
        ];
        for (scenario, expected) in cases {
            assert_eq!(scenario.validate(), Err(expected));
        }
    }

    #[test]
    fn nan_budget_is_rejected() {
        assert!(matches!(
            validate_budget(f64::NAN),
            Err(InvalidScenarioError::NegativeBudget(_))
        ));
        assert!(validate_budget(f64::INFINITY).is_err());
    }

    #[test]
    fn overrides_replace_only_given_levers() {
        let overrides = ScenarioOverrides {
            budget_eur: Some(5.0),
            priority_districts: Some(vec![3]),
            ..Default::default()
        };
        let scenario = base().with_overrides(overrides);
        assert_eq!(scenario.budget_eur, 5.0);
        assert_eq!(scenario.priority_districts, vec![3]);
        assert_eq!(scenario.capex_subsidy_pct, 20.0);
        assert!(ScenarioOverrides::default().is_empty());
    }
}
