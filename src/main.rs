use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use heating_roadmap::candidates::quality::{
    assign_district_from_postal, clip_negatives, convert_units, drop_exact_duplicates,
    impute_adoption_rate, load_postal_district_map,
};
use heating_roadmap::candidates::{
    candidates_from_table, load_candidates, quality_report, CandidateSnapshot, DistrictId,
    QualityReport,
};
use heating_roadmap::config::Config;
use heating_roadmap::dataset::RawTable;
use heating_roadmap::ingest::audit::{write_audit_log, AuditLog};
use heating_roadmap::ingest::fetch::{fetch_all, fetch_and_save};
use heating_roadmap::ingest::{CkanSource, DatasetSource, HttpSource, LocalCsvSource};
use heating_roadmap::output::csv::{candidates_to_csv, portfolio_to_csv, transformed_to_csv};
use heating_roadmap::output::json::{render_json, write_json_file};
use heating_roadmap::output::table::{
    render_comparison_table, render_evaluations_table, render_leaderboard_table,
    render_portfolio_table, render_quality_table, render_raw_table, render_recommendations_table,
    render_transformed_table,
};
use heating_roadmap::pareto::load_pareto;
use heating_roadmap::portfolio::compare::{compare_scenarios, ScenarioComparison};
use heating_roadmap::portfolio::greedy::run_scenario;
use heating_roadmap::portfolio::summary::{build_recommendations, cost_per_ton_leaderboard};
use heating_roadmap::portfolio::transform::transform;
use heating_roadmap::portfolio::{ScenarioRun, TransformedCandidate};
use heating_roadmap::scenario::ScenarioOverrides;
use heating_roadmap::server::run_server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "heating-roadmap",
    about = "Budget-constrained district portfolios for low-carbon heating"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Candidate table; defaults to `data.candidates_file` from the config.
    #[arg(long)]
    candidates: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(flatten)]
    levers: LeverArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone, Default)]
struct LeverArgs {
    #[arg(long = "budget", global = true)]
    budget_eur: Option<f64>,
    #[arg(long = "subsidy-pct", global = true)]
    capex_subsidy_pct: Option<f64>,
    #[arg(long = "opex-factor", global = true)]
    opex_factor: Option<f64>,
    #[arg(long = "co2-factor", global = true)]
    co2_factor: Option<f64>,
    #[arg(long = "priority", value_delimiter = ',', global = true)]
    priority_districts: Option<Vec<DistrictId>>,
    #[arg(long = "adoption-default", global = true)]
    adoption_rate_default: Option<f64>,
}

impl From<LeverArgs> for ScenarioOverrides {
    fn from(value: LeverArgs) -> Self {
        Self {
            budget_eur: value.budget_eur,
            capex_subsidy_pct: value.capex_subsidy_pct,
            opex_factor: value.opex_factor,
            co2_factor: value.co2_factor,
            priority_districts: value.priority_districts,
            adoption_rate_default: value.adoption_rate_default,
        }
    }
}

/// Levers of the alternative scenario in `compare`.
#[derive(Debug, clap::Args, Clone, Default)]
struct AlternativeArgs {
    #[arg(long = "alt-budget")]
    budget_eur: Option<f64>,
    #[arg(long = "alt-subsidy-pct")]
    capex_subsidy_pct: Option<f64>,
    #[arg(long = "alt-opex-factor")]
    opex_factor: Option<f64>,
    #[arg(long = "alt-co2-factor")]
    co2_factor: Option<f64>,
    #[arg(long = "alt-priority", value_delimiter = ',')]
    priority_districts: Option<Vec<DistrictId>>,
    #[arg(long = "alt-adoption-default")]
    adoption_rate_default: Option<f64>,
}

impl From<AlternativeArgs> for ScenarioOverrides {
    fn from(value: AlternativeArgs) -> Self {
        Self {
            budget_eur: value.budget_eur,
            capex_subsidy_pct: value.capex_subsidy_pct,
            opex_factor: value.opex_factor,
            co2_factor: value.co2_factor,
            priority_districts: value.priority_districts,
            adoption_rate_default: value.adoption_rate_default,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the priority-first selection for the configured scenario.
    Select {
        /// Also list every district evaluated and whether it was funded.
        #[arg(long)]
        explain: bool,
        #[arg(long)]
        recommend: bool,
        /// Write the scenario and portfolio as JSON to this path.
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Show candidates with the scenario levers applied.
    Transform,
    Compare {
        #[command(flatten)]
        alternative: AlternativeArgs,
    },
    /// Data-quality report, optionally followed by cleaning.
    Quality {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, conflicts_with = "input")]
        url: Option<String>,
        /// CKAN package id; its first CSV resource is read.
        #[arg(long, conflicts_with_all = ["input", "url"])]
        ckan: Option<String>,
        #[arg(long)]
        clean: bool,
        #[arg(long, requires = "clean")]
        write: Option<PathBuf>,
    },
    Pareto,
    /// Download configured endpoints into the raw data directory.
    Fetch {
        names: Vec<String>,
        #[arg(long, conflicts_with = "names")]
        ckan: Option<String>,
    },
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(Some(&config_path))?;

    if matches!(cli.command, Commands::Config { .. }) {
        return handle_config_command(&cli.command, &config, &config_path);
    }
    let scenario = config
        .scenario()
        .with_overrides(cli.levers.clone().into());

    match &cli.command {
        Commands::Select {
            explain,
            recommend,
            save,
        } => {
            let snapshot = load_snapshot(&cli, &config)?;
            info!("running selection over {} candidates", snapshot.len());
            let portfolio = run_scenario(&snapshot.records, &scenario)?;
            let run = ScenarioRun {
                scenario: scenario.clone(),
                portfolio,
            };
            print_selection(&run, *explain, *recommend, cli.output)?;
            if let Some(path) = save {
                write_json_file(path, &run)?;
                info!("saved scenario run to {}", path.display());
            }
        }
        Commands::Transform => {
            let snapshot = load_snapshot(&cli, &config)?;
            let rows = transform(&snapshot.records, &scenario)?;
            print_transformed(&rows, cli.output)?;
        }
        Commands::Compare { alternative } => {
            let overrides: ScenarioOverrides = alternative.clone().into();
            if overrides.is_empty() {
                return Err(anyhow!(
                    "at least one --alt-<lever> change is required for compare"
                ));
            }
            let snapshot = load_snapshot(&cli, &config)?;
            let alternative = scenario.clone().with_overrides(overrides);
            let result = compare_scenarios(&snapshot.records, &scenario, &alternative)?;
            print_comparison(&result, cli.output)?;
        }
        Commands::Quality {
            input,
            url,
            ckan,
            clean,
            write,
        } => {
            let source: Box<dyn DatasetSource> = match (url, ckan) {
                (Some(url), _) => Box::new(HttpSource {
                    name: "remote".to_string(),
                    url: url.clone(),
                    timeout_secs: config.ingest.timeout_secs,
                }),
                (None, Some(package_id)) => Box::new(CkanSource::new(&config.ingest, package_id)),
                (None, None) => Box::new(LocalCsvSource::new(
                    input
                        .clone()
                        .or_else(|| cli.candidates.clone())
                        .unwrap_or_else(|| config.resolved_candidates_path()),
                )),
            };
            let table = source.fetch().await?;
            let report = quality_report(&table);
            print_quality(&report, cli.output)?;
            if *clean {
                let target = write.clone().unwrap_or_else(|| {
                    config
                        .resolved_processed_dir()
                        .join(format!("{}_clean.csv", source.name()))
                });
                clean_table(&table, source.name(), &target, &config)?;
            }
        }
        Commands::Pareto => {
            let path = config.resolved_pareto_path();
            match load_pareto(&path, config.artifacts.preview_rows)? {
                None => println!("No Pareto frontier found at {}", path.display()),
                Some(frontier) => match cli.output {
                    OutputFormat::Table => {
                        println!("{}", render_raw_table(&frontier.table));
                        println!(
                            "Showing {} of {} points",
                            frontier.table.len(),
                            frontier.total_points
                        );
                    }
                    OutputFormat::Json => println!("{}", render_json(&frontier)?),
                    OutputFormat::Csv => {
                        warn!("CSV output for pareto not implemented, using JSON");
                        println!("{}", render_json(&frontier)?);
                    }
                },
            }
        }
        Commands::Fetch { names, ckan } => {
            run_fetch(names, ckan.as_deref(), &config).await?;
        }
        Commands::Serve { host, port } => {
            let bind = format!("{host}:{port}");
            let addr: SocketAddr = bind
                .parse()
                .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
            let path = candidates_path(&cli, &config);
            let snapshot = if path.exists() {
                Some(load_snapshot(&cli, &config)?)
            } else {
                warn!(
                    "no candidate table at {}; requests must send candidates inline",
                    path.display()
                );
                None
            };
            return run_server(config, snapshot, addr).await;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &Path) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn candidates_path(cli: &Cli, config: &Config) -> PathBuf {
    cli.candidates
        .clone()
        .unwrap_or_else(|| config.resolved_candidates_path())
}

fn load_snapshot(cli: &Cli, config: &Config) -> Result<CandidateSnapshot> {
    let snapshot = load_candidates(&candidates_path(cli, config))?;
    if !config.cleaning.clip_negatives {
        return Ok(snapshot);
    }
    let (clipped, count) = snapshot.with_negatives_clipped();
    if count > 0 {
        info!("clipped {count} negative values to zero");
    }
    Ok(clipped)
}

/// Normalize units, fill districts from postal codes, clip (when configured),
/// impute adoption, drop duplicates, then write the cleaned table and its
/// audit log.
fn clean_table(table: &RawTable, name: &str, target: &Path, config: &Config) -> Result<()> {
    let rows_in = table.len();
    let mut audit = AuditLog::new(name, rows_in, rows_in);

    let mut table = table.clone();
    for (column, unit_column) in &config.cleaning.unit_columns {
        let (converted, count) = convert_units(&table, column, unit_column);
        table = converted;
        audit = audit.with_transform(
            &format!("convert_units:{column}"),
            serde_json::json!({ "unit_column": unit_column, "rows": count }),
        );
    }
    if let Some(map_path) = config.resolved_postal_district_map() {
        let district_map = load_postal_district_map(&map_path)?;
        let postal_column = &config.cleaning.postal_column;
        let (filled, count) = assign_district_from_postal(&table, postal_column, &district_map);
        table = filled;
        audit = audit.with_transform(
            "assign_district_from_postal",
            serde_json::json!({ "map": map_path.display().to_string(), "rows": count }),
        );
    }

    let snapshot = candidates_from_table(&table, name)
        .with_context(|| format!("cannot clean {name}: not a candidate table"))?;

    let mut records = snapshot.records;
    if config.cleaning.clip_negatives {
        let (clipped, count) = clip_negatives(&records);
        records = clipped;
        audit = audit.with_transform("clip_negatives", count);
    }
    let default_rate = config.defaults.adoption_rate_default;
    let (imputed, count) = impute_adoption_rate(&records, default_rate);
    audit = audit.with_transform(
        "impute_adoption_rate",
        serde_json::json!({ "default": default_rate, "rows": count }),
    );
    let deduped = drop_exact_duplicates(&imputed);
    audit = audit.with_transform("drop_exact_duplicates", imputed.len() - deduped.len());
    audit.rows_out = deduped.len();

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed creating output dir: {}", parent.display()))?;
    }
    std::fs::write(target, candidates_to_csv(&deduped)?)
        .with_context(|| format!("failed writing cleaned table: {}", target.display()))?;
    println!(
        "Cleaned {} -> {} rows, saved to {}",
        rows_in,
        audit.rows_out,
        target.display()
    );
    let audit_path = write_audit_log(&audit, &config.resolved_audit_dir())?;
    println!("Audit log: {}", audit_path.display());
    Ok(())
}

async fn run_fetch(names: &[String], ckan: Option<&str>, config: &Config) -> Result<()> {
    let raw_dir = config.resolved_raw_dir();
    let timeout = config.ingest.timeout_secs;

    if let Some(package_id) = ckan {
        let source = CkanSource::new(&config.ingest, package_id);
        let url = source.resolve_url().await?;
        info!("resolved CKAN package {package_id} to {url}");
        let path = fetch_and_save(source.name(), &url, &raw_dir, timeout).await?;
        println!("[{package_id}] saved to {}", path.display());
        return Ok(());
    }

    let endpoints = if names.is_empty() {
        config.ingest.endpoints.clone()
    } else {
        let mut selected = std::collections::BTreeMap::new();
        for name in names {
            let url = config.ingest.endpoints.get(name).ok_or_else(|| {
                anyhow!("unknown endpoint {name}; add it under [ingest.endpoints]")
            })?;
            selected.insert(name.clone(), url.clone());
        }
        selected
    };
    if endpoints.is_empty() {
        return Err(anyhow!("no endpoints configured under [ingest.endpoints]"));
    }

    let results = fetch_all(&endpoints, &raw_dir, timeout).await;
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    for (name, outcome) in &results {
        match outcome {
            Ok(path) => println!("[{name}] saved to {}", path.display()),
            Err(err) => println!("[{name}] failed: {err:#}"),
        }
    }
    if failed == results.len() {
        return Err(anyhow!("all {failed} endpoint fetches failed"));
    }
    Ok(())
}

fn print_selection(
    run: &ScenarioRun,
    explain: bool,
    recommend: bool,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", render_portfolio_table(&run.portfolio));
            if run.portfolio.is_empty() {
                println!("No district fits the budget under this scenario.");
            }
            if explain {
                println!("{}", render_evaluations_table(&run.portfolio));
            }
            if recommend {
                println!(
                    "{}",
                    render_leaderboard_table(&cost_per_ton_leaderboard(&run.portfolio))
                );
                println!(
                    "{}",
                    render_recommendations_table(&build_recommendations(
                        &run.portfolio,
                        &run.scenario
                    ))
                );
            }
        }
        OutputFormat::Json => println!("{}", render_json(run)?),
        OutputFormat::Csv => print!("{}", portfolio_to_csv(&run.portfolio)?),
    }
    Ok(())
}

fn print_transformed(rows: &[TransformedCandidate], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_transformed_table(rows)),
        OutputFormat::Json => println!("{}", render_json(rows)?),
        OutputFormat::Csv => print!("{}", transformed_to_csv(rows)?),
    }
    Ok(())
}

fn print_comparison(result: &ScenarioComparison, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_comparison_table(result)),
        OutputFormat::Json => println!("{}", render_json(result)?),
        OutputFormat::Csv => {
            warn!("CSV output for compare not implemented, using JSON");
            println!("{}", render_json(result)?);
        }
    }
    Ok(())
}

fn print_quality(report: &QualityReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_quality_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => {
            warn!("CSV output for quality not implemented, using JSON");
            println!("{}", render_json(report)?);
        }
    }
    Ok(())
}
