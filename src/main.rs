use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, warn};

use trending_scraper::apis::{HtmlFileSource, HttpTrendingSource, JsonFileSource};
use trending_scraper::app::ports::SourcePort;
use trending_scraper::app::quality_gate_use_case::QualityGateUseCase;
use trending_scraper::common::constants::DEFAULT_CONFIG_FILE;
use trending_scraper::config::PipelineSettings;
use trending_scraper::infra::{ReqwestHttp, SqliteStore, SummaryReporter};
use trending_scraper::observability::{self, metrics};
use trending_scraper::pipeline::{Orchestrator, RunReport};

#[derive(Parser)]
#[command(name = "trending_scraper")]
#[command(about = "Scrape trending repositories, clean them, and store them with an audit trail")]
#[command(version)]
struct Cli {
    /// Settings file (TOML); missing file means defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory for rolling JSON log files
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, validate, clean, persist and report once
    Run {
        #[command(flatten)]
        source: SourceArgs,
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Directory for report files
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print Prometheus metrics after the run
        #[arg(long)]
        print_metrics: bool,
    },
    /// Evaluate the quality rules only and print the findings as JSON
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print the persisted quality check trail
    History {
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
        /// Only show the most recent entries
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Trending page URL (overrides config)
    #[arg(long, conflicts_with_all = ["html", "json"])]
    source_url: Option<String>,
    /// Read a saved trending page instead of fetching
    #[arg(long, conflicts_with = "json")]
    html: Option<PathBuf>,
    /// Read raw records from a JSON array instead of fetching
    #[arg(long)]
    json: Option<PathBuf>,
}

fn build_source(args: SourceArgs, settings: &PipelineSettings) -> anyhow::Result<Box<dyn SourcePort>> {
    if let Some(path) = args.html {
        return Ok(Box::new(HtmlFileSource::new(path)));
    }
    if let Some(path) = args.json {
        return Ok(Box::new(JsonFileSource::new(path)));
    }
    let url = args.source_url.unwrap_or_else(|| settings.source_url.clone());
    let http = ReqwestHttp::new(settings.fetch_timeout())?;
    Ok(Box::new(HttpTrendingSource::new(url, Box::new(http))))
}

fn print_run_summary(report: &RunReport) {
    println!("\n📊 Run {} finished: {:?}", report.run_id, report.state());
    println!("   Raw records: {}", report.raw_records);
    println!("   Cleaned records: {}", report.records.len());
    println!("   Inserted: {}", report.persisted.inserted);
    println!("   Skipped (already stored): {}", report.persisted.skipped_duplicates);

    println!("\n🔍 Quality checks:");
    for finding in &report.findings {
        let mark = if finding.passed { "✅" } else { "⚠️ " };
        println!("   {} {}: {}", mark, finding.check, finding.summary());
    }

    let repairs: Vec<_> = report
        .audit
        .iter()
        .skip(report.findings.len())
        .collect();
    if !repairs.is_empty() {
        println!("\n🔧 Repairs:");
        for entry in repairs {
            println!("   - [{}] {}", entry.check_type, entry.check_result);
        }
    }

    println!("\n📝 Report files:");
    for path in &report.report.artifacts {
        println!("   {}", path.display());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init_logging(&cli.log_dir);

    let mut settings = PipelineSettings::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            source,
            db,
            output,
            print_metrics,
        } => {
            if let Err(e) = metrics::init() {
                warn!("Metrics disabled: {}", e);
            }
            if let Some(db) = db {
                settings.db_path = db;
            }
            if let Some(output) = output {
                settings.output_dir = output;
            }

            println!("🚀 Running trending pipeline...");
            let orchestrator = Orchestrator::new(
                build_source(source, &settings)?,
                Box::new(SqliteStore::new(&settings.db_path, settings.store_busy_timeout())),
                Box::new(SummaryReporter::new(&settings.output_dir, settings.report_top_n)),
            );

            let result = orchestrator.run().await;
            if print_metrics {
                if let Some(rendered) = metrics::render() {
                    println!("\n{}", rendered);
                }
            }
            match result {
                Ok(report) => print_run_summary(&report),
                Err(failure) => {
                    error!("Pipeline failed: {}", failure);
                    println!("❌ Run failed during {}: {}", failure.stage, failure.source);
                    return Err(failure.into());
                }
            }
        }
        Commands::Check { source } => {
            let raw = build_source(source, &settings)?.fetch().await?;
            let findings = QualityGateUseCase::default().assess(&raw);
            println!("{}", serde_json::to_string_pretty(&findings)?);
        }
        Commands::History { db, limit } => {
            let busy_timeout = settings.store_busy_timeout();
            let store = SqliteStore::new(db.unwrap_or(settings.db_path), busy_timeout);
            for entry in store.load_quality_checks(limit)? {
                println!(
                    "{}  {:<20} {}",
                    entry.checked_at.to_rfc3339(),
                    entry.check_type,
                    entry.check_result
                );
            }
        }
    }
    Ok(())
}
