use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use seshat_lib::classifier::AnomalyClassifier;
use seshat_lib::explain::{self, ChatExplainer};
use seshat_lib::pipeline::{self, Pipeline};
use seshat_lib::types::config::Config;
use seshat_lib::{config, db, ingest, loader, report, runs, Result};

#[derive(Parser)]
#[command(name = "seshat", version, about = "Sales anomaly detection with model explanations")]
struct Cli {
    /// JSON config file layered over the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the sales CSV into SQLite, replacing existing rows.
    SetupDb {
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Detect anomalies and print them without explanations.
    Detect,
    /// Run the full pipeline and write the report.
    Run,
    /// Show the first stored sales rows.
    Preview {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Print the saved report.
    Report,
    /// List recent pipeline runs.
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    seshat_lib::init_tracing();

    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "seshat failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::SetupDb { csv } => setup_db(&config, csv),
        Command::Detect => detect(&config),
        Command::Run => run(&config),
        Command::Preview { limit } => preview(&config, limit),
        Command::Report => show_report(&config),
        Command::History { limit } => history(&config, limit),
    }
}

fn setup_db(config: &Config, csv: Option<PathBuf>) -> Result<()> {
    let csv_path = csv.unwrap_or_else(|| config.csv_path.clone());
    let pool = db::open(&config.db_path)?;
    let rows = ingest::ingest_csv(&pool, &csv_path)?;
    println!(
        "Loaded {} rows from {} into {}",
        rows,
        csv_path.display(),
        config.db_path.display()
    );
    Ok(())
}

fn detect(config: &Config) -> Result<()> {
    let pool = db::open(&config.db_path)?;
    let classifier = AnomalyClassifier::from_config(&config.detection);
    match pipeline::detect(&pool, &classifier)? {
        None => println!("No data found. Run `seshat setup-db` first."),
        Some(detection) if detection.anomalies.is_empty() => println!(
            "No anomalies detected in {} transactions.",
            detection.transactions
        ),
        Some(detection) => {
            println!(
                "{} anomalies in {} transactions:",
                detection.anomalies.len(),
                detection.transactions
            );
            for a in &detection.anomalies {
                println!(
                    "  {} | {} | {} | {} | {}",
                    a.date, a.context, a.anomaly_type, a.details, a.metric_value
                );
            }
        }
    }
    Ok(())
}

fn run(config: &Config) -> Result<()> {
    let pool = db::open(&config.db_path)?;
    let prompt = explain::load_system_prompt(&config.prompt_path);
    let explainer = ChatExplainer::from_config(&config.llm, prompt)?;
    let pipeline = Pipeline::new(pool, config, explainer);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(pipeline.run())?;
    println!("{}", outcome);
    Ok(())
}

fn preview(config: &Config, limit: u32) -> Result<()> {
    let pool = db::open(&config.db_path)?;
    let rows = loader::preview(&pool, limit)?;
    if rows.is_empty() {
        println!("No sales rows stored.");
        return Ok(());
    }
    for row in rows {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

fn show_report(config: &Config) -> Result<()> {
    if !config.output_path.exists() {
        println!("No report at {}. Run `seshat run` first.", config.output_path.display());
        return Ok(());
    }
    let anomalies = report::read_report(&config.output_path)?;
    println!("{}", serde_json::to_string_pretty(&anomalies)?);
    Ok(())
}

fn history(config: &Config, limit: u32) -> Result<()> {
    let pool = db::open(&config.db_path)?;
    let records = runs::list_runs(&pool, limit)?;
    if records.is_empty() {
        println!("No pipeline runs recorded.");
        return Ok(());
    }
    for r in records {
        let detail = r
            .error
            .as_deref()
            .or(r.report_path.as_deref())
            .unwrap_or("-");
        println!(
            "#{} {} transactions={} anomalies={} {}ms {}",
            r.id,
            r.outcome,
            r.transactions,
            r.anomalies,
            r.finished_at - r.started_at,
            detail
        );
    }
    Ok(())
}
