use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::candidates::DistrictId;
use crate::scenario::Scenario;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub optimization: OptimizationConfig,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: String,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: String,
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,
    #[serde(default = "default_candidates_file")]
    pub candidates_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_adoption_rate")]
    pub adoption_rate_default: f64,
    #[serde(default = "default_priority_districts")]
    pub priority_districts: Vec<DistrictId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    #[serde(default = "default_budget_eur")]
    pub budget_eur_default: f64,
    #[serde(default)]
    pub capex_subsidy_pct_default: f64,
    #[serde(default = "default_factor")]
    pub opex_factor_default: f64,
    #[serde(default = "default_factor")]
    pub co2_factor_default: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningConfig {
    #[serde(default)]
    pub clip_negatives: bool,
    /// CSV with `postal_code,district_id` used to fill blank district ids.
    #[serde(default)]
    pub postal_district_map: Option<String>,
    #[serde(default = "default_postal_column")]
    pub postal_column: String,
    /// Value column -> unit column; values tagged `MWh` are rescaled to kWh.
    #[serde(default)]
    pub unit_columns: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_pareto_frontier")]
    pub pareto_frontier: String,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_ckan_base_url")]
    pub ckan_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/heating-roadmap/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    /// The default scenario: configured levers with no overrides applied.
    pub fn scenario(&self) -> Scenario {
        Scenario {
            budget_eur: self.optimization.budget_eur_default,
            capex_subsidy_pct: self.optimization.capex_subsidy_pct_default,
            opex_factor: self.optimization.opex_factor_default,
            co2_factor: self.optimization.co2_factor_default,
            priority_districts: self.defaults.priority_districts.clone(),
            adoption_rate_default: self.defaults.adoption_rate_default,
        }
    }

    pub fn resolved_candidates_path(&self) -> PathBuf {
        expand_tilde(&self.data.candidates_file)
    }

    pub fn resolved_raw_dir(&self) -> PathBuf {
        expand_tilde(&self.data.raw_dir)
    }

    pub fn resolved_audit_dir(&self) -> PathBuf {
        expand_tilde(&self.data.audit_dir)
    }

    pub fn resolved_processed_dir(&self) -> PathBuf {
        expand_tilde(&self.data.processed_dir)
    }

    pub fn resolved_postal_district_map(&self) -> Option<PathBuf> {
        self.cleaning
            .postal_district_map
            .as_deref()
            .map(expand_tilde)
    }

    pub fn resolved_pareto_path(&self) -> PathBuf {
        expand_tilde(&self.artifacts.pareto_frontier)
    }

    pub fn default_template() -> String {
        let template = r#"[data]
raw_dir = "data/raw"
processed_dir = "data/processed"
audit_dir = "data/ingest_audit"
candidates_file = "data/processed/candidates.csv"

[defaults]
adoption_rate_default = 0.30
priority_districts = [10, 11, 12, 13, 15]

[optimization]
budget_eur_default = 90000000.0
capex_subsidy_pct_default = 0.0
opex_factor_default = 1.0
co2_factor_default = 1.0

[cleaning]
clip_negatives = false
postal_column = "postal_code"
# postal_district_map = "data/reference/postal_districts.csv"

[cleaning.unit_columns]
# heat_demand = "heat_demand_unit"

[artifacts]
pareto_frontier = "artifacts/pareto_frontier.csv"
preview_rows = 50

[ingest]
ckan_base_url = "https://datos.comunidad.madrid/api/3/action/package_show"
timeout_secs = 20

[ingest.endpoints]
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
            audit_dir: default_audit_dir(),
            candidates_file: default_candidates_file(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            adoption_rate_default: default_adoption_rate(),
            priority_districts: default_priority_districts(),
        }
    }
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            budget_eur_default: default_budget_eur(),
            capex_subsidy_pct_default: 0.0,
            opex_factor_default: default_factor(),
            co2_factor_default: default_factor(),
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            clip_negatives: false,
            postal_district_map: None,
            postal_column: default_postal_column(),
            unit_columns: BTreeMap::new(),
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            pareto_frontier: default_pareto_frontier(),
            preview_rows: default_preview_rows(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ckan_base_url: default_ckan_base_url(),
            timeout_secs: default_timeout_secs(),
            endpoints: BTreeMap::new(),
        }
    }
}

fn default_postal_column() -> String {
    "postal_code".to_string()
}

fn default_raw_dir() -> String {
    "data/raw".to_string()
}

fn default_processed_dir() -> String {
    "data/processed".to_string()
}

fn default_audit_dir() -> String {
    "data/ingest_audit".to_string()
}

fn default_candidates_file() -> String {
    "data/processed/candidates.csv".to_string()
}

fn default_adoption_rate() -> f64 {
    0.30
}

fn default_priority_districts() -> Vec<DistrictId> {
    vec![10, 11, 12, 13, 15]
}

fn default_budget_eur() -> f64 {
    90_000_000.0
}

fn default_factor() -> f64 {
    1.0
}

fn default_pareto_frontier() -> String {
    "artifacts/pareto_frontier.csv".to_string()
}

fn default_preview_rows() -> usize {
    50
}

fn default_ckan_base_url() -> String {
    "https://datos.comunidad.madrid/api/3/action/package_show".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(parsed.scenario(), Config::default().scenario());
        assert!(parsed.ingest.endpoints.is_empty());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[optimization]
budget_eur_default = 1000.0

[ingest.endpoints]
districts = "https://example.org/districts.csv"
"#,
        )
        .unwrap();
        let scenario = parsed.scenario();
        assert_eq!(scenario.budget_eur, 1_000.0);
        assert_eq!(scenario.opex_factor, 1.0);
        assert_eq!(scenario.priority_districts, vec![10, 11, 12, 13, 15]);
        assert_eq!(scenario.adoption_rate_default, 0.30);
        assert_eq!(parsed.ingest.endpoints.len(), 1);
        assert_eq!(parsed.cleaning.postal_column, "postal_code");
        assert!(parsed.resolved_postal_district_map().is_none());
    }

    #[test]
    fn cleaning_section_reads_unit_columns_and_postal_map() {
        let parsed: Config = toml::from_str(
            r#"
[cleaning]
postal_district_map = "ref/postal.csv"

[cleaning.unit_columns]
heat_demand = "heat_demand_unit"
"#,
        )
        .unwrap();
        assert_eq!(
            parsed.resolved_postal_district_map(),
            Some(PathBuf::from("ref/postal.csv"))
        );
        assert_eq!(parsed.cleaning.unit_columns["heat_demand"], "heat_demand_unit");
        assert!(!parsed.cleaning.clip_negatives);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.optimization.budget_eur_default, 90_000_000.0);
    }

    #[test]
    fn written_template_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        Config::write_template(&path).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.artifacts.preview_rows, 50);
        assert!(config.scenario().validate().is_ok());
    }
}
