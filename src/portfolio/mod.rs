pub mod compare;
pub mod greedy;
pub mod summary;
pub mod transform;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::candidates::{DistrictId, SchemaError};
use crate::scenario::{InvalidScenarioError, Scenario};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    InvalidScenario(#[from] InvalidScenarioError),
}

/// A candidate with the scenario levers applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedCandidate {
    pub district_id: DistrictId,
    pub tech: String,
    pub expected_capex_eur: f64,
    pub opex_eur: f64,
    pub expected_saving_kg: f64,
    pub adoption_rate: f64,
    pub adoption_rate_imputed: bool,
    pub subsidized_capex_eur: f64,
    pub scaled_opex_eur: f64,
    pub total_cost_eur: f64,
    pub weighted_saving_kg: f64,
}

/// How one district fared during selection, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictEvaluation {
    pub district_id: DistrictId,
    pub priority: bool,
    pub tech: String,
    pub total_cost_eur: f64,
    pub budget_before_eur: f64,
    pub admitted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub selected: Vec<TransformedCandidate>,
    pub budget_eur: f64,
    pub budget_remaining_eur: f64,
    pub evaluations: Vec<DistrictEvaluation>,
}

impl Portfolio {
    pub fn empty(budget_eur: f64) -> Self {
        Self {
            selected: Vec::new(),
            budget_eur,
            budget_remaining_eur: budget_eur,
            evaluations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn total_cost_eur(&self) -> f64 {
        self.selected.iter().map(|c| c.total_cost_eur).sum()
    }

    pub fn total_weighted_saving_kg(&self) -> f64 {
        self.selected.iter().map(|c| c.weighted_saving_kg).sum()
    }

    pub fn district_ids(&self) -> Vec<DistrictId> {
        self.selected.iter().map(|c| c.district_id).collect()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &DistrictEvaluation> {
        self.evaluations.iter().filter(|e| !e.admitted)
    }
}

/// Portfolio together with the scenario that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRun {
    pub scenario: Scenario,
    pub portfolio: Portfolio,
}
