use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

use trial_pipeline::app::enrich_use_case::EnrichUseCase;
use trial_pipeline::app::ingest_use_case::IngestUseCase;
use trial_pipeline::app::pipeline_use_case::PipelineRun;
use trial_pipeline::app::quality_gate_use_case::QualityGateUseCase;
use trial_pipeline::app::report_use_case::ReportUseCase;
use trial_pipeline::app::validate_use_case::ValidateUseCase;
use trial_pipeline::config::{PipelineConfig, PipelinePaths};
use trial_pipeline::infra::{file_backed_pipeline, CsvTableAdapter, JsonReportAdapter, JsonStudyFileAdapter};
use trial_pipeline::observability::{self, metrics};

/// Exit code for a halted run or failed validation
const EXIT_HALT: u8 = 2;

#[derive(Parser)]
#[command(name = "trial_pipeline")]
#[command(about = "Quality, enrichment and bias reports for ClinicalTrials.gov extracts")]
#[command(version)]
struct Cli {
    /// Disease pipeline preset
    #[arg(long, value_enum, default_value_t = Profile::Diabetes, global = true)]
    profile: Profile,
    /// TOML pipeline config instead of a preset; absent fields use the diabetes defaults
    #[arg(long, global = true, conflicts_with = "profile")]
    config: Option<PathBuf>,
    /// Data directory [default: $TRIALS_DATA_DIR or ./data]
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Write the Prometheus metrics text here when the command finishes
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Profile {
    Diabetes,
    BreastCancer,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten fetched study documents into the raw table
    Ingest {
        /// JSON file, NDJSON file or directory of study pages
        #[arg(long)]
        studies: PathBuf,
    },
    /// Classify trials and tag their source
    Enrich,
    /// Run the structural checks on the enriched table
    Validate,
    /// Clean and dedupe the enriched table, then decide continue or halt
    Quality,
    /// Write the stats, anomaly and bias reports
    Report,
    /// Run every stage and write the pipeline summary
    Run {
        /// Ingest these study documents first; otherwise start from the raw table
        #[arg(long)]
        studies: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => match cli.profile {
            Profile::Diabetes => PipelineConfig::diabetes(),
            Profile::BreastCancer => PipelineConfig::breast_cancer(),
        },
    };
    config.check()?;
    Ok(config)
}

fn data_dir(cli: &Cli) -> PathBuf {
    cli.data_dir
        .clone()
        .or_else(|| env::var("TRIALS_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Print the decision signal and map it to an exit code
fn decision(proceed: bool) -> ExitCode {
    if proceed {
        println!("continue");
        ExitCode::SUCCESS
    } else {
        println!("halt");
        ExitCode::from(EXIT_HALT)
    }
}

async fn execute(cli: &Cli, config: PipelineConfig, paths: PipelinePaths) -> Result<ExitCode> {
    match &cli.command {
        Commands::Ingest { studies } => {
            println!("📥 Ingesting {} studies from {}", config.name, studies.display());
            let use_case = IngestUseCase::new(
                config.name.clone(),
                Box::new(JsonStudyFileAdapter::new(studies)),
                Box::new(CsvTableAdapter::new()),
            );
            let result = use_case.run(&paths.raw_file).await?;
            println!(
                "✅ {} trials saved to {} ({} duplicates, {} without id skipped)",
                result.table.len(),
                paths.raw_file.display(),
                result.duplicates_skipped,
                result.missing_id_skipped
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Enrich => {
            println!("🏷️  Enriching {} trials", config.name);
            let use_case = EnrichUseCase::with_configured_classifier(
                config,
                Box::new(CsvTableAdapter::new()),
                Box::new(CsvTableAdapter::new()),
            );
            let table = use_case.run(&paths.raw_file, &paths.enriched_file).await?;
            println!("✅ {} trials saved to {}", table.len(), paths.enriched_file.display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let use_case = ValidateUseCase::new(config, Box::new(CsvTableAdapter::new()));
            let report = use_case.run(&paths.enriched_file).await?;
            for err in &report.errors {
                println!("❌ {}", err.message);
            }
            for notice in &report.notices {
                println!("⚠️  {}", notice);
            }
            Ok(decision(report.passed()))
        }
        Commands::Quality => {
            let table = CsvTableAdapter::read(&paths.enriched_file)
                .with_context(|| format!("reading {}", paths.enriched_file.display()))?;
            let use_case = QualityGateUseCase::with_default_quality_gate(
                &config,
                Box::new(CsvTableAdapter::new()),
                Box::new(JsonReportAdapter::new(&paths.reports_dir)),
            );
            let result = use_case.run(table, &paths.enriched_file).await?;
            let stats = &result.outcome.stats;
            println!(
                "🧹 {} rows -> {} rows, {} duplicates removed, {} null values",
                stats.total_rows,
                stats.rows_after_cleaning,
                stats.duplicates_removed,
                stats.issues.null_values
            );
            Ok(decision(result.outcome.verdict.should_continue()))
        }
        Commands::Report => {
            let table = CsvTableAdapter::read(&paths.enriched_file)
                .with_context(|| format!("reading {}", paths.enriched_file.display()))?;
            let use_case = ReportUseCase::new(config, Box::new(JsonReportAdapter::new(&paths.reports_dir)));
            let set = use_case.run(Arc::new(table)).await?;
            println!(
                "📊 Quality score {}, bias level {}",
                set.anomalies.data_quality_score,
                set.bias.bias_level.as_str()
            );
            for (name, path) in &set.paths {
                println!("   {}: {}", name, path);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { studies } => {
            println!("🚀 Running full {} pipeline", config.name);
            let use_case = file_backed_pipeline(&config, &paths, studies.as_deref());

            let run = use_case.run().await?;
            match &run {
                PipelineRun::ValidationFailed(report) => {
                    println!("❌ Validation failed with {} errors", report.errors.len());
                }
                PipelineRun::Halted(stats) => {
                    println!(
                        "🛑 Quality gate halted: {} null values over {} rows",
                        stats.issues.null_values, stats.total_rows
                    );
                }
                PipelineRun::Completed(summary) => {
                    println!(
                        "✅ {} trials, quality score {}, bias level {}",
                        summary.total_trials,
                        summary.data_quality_score,
                        summary.bias_level.as_str()
                    );
                }
            }
            Ok(decision(run.should_continue()))
        }
    }
}

fn write_metrics(path: &Path) -> Result<()> {
    match metrics::render() {
        Some(text) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(path, text)?;
            info!("Metrics written to {}", path.display());
        }
        None => warn!("Metrics recorder not installed, nothing written"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    observability::init_logging(Path::new("logs"), &config.name);

    if cli.metrics_out.is_some() {
        if let Err(e) = metrics::init() {
            warn!("Failed to initialize metrics: {}", e);
        }
    }

    let paths = PipelinePaths::new(&data_dir(&cli), &config.name);
    let code = match execute(&cli, config, paths).await {
        Ok(code) => code,
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    };

    if let Some(path) = &cli.metrics_out {
        if let Err(e) = write_metrics(path) {
            error!("Failed to write metrics: {:#}", e);
        }
    }
    code
}
