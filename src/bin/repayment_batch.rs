//! Process pending repayment periods from CSV exports
//!
//! Writes one JSON document per notice into the output directory and logs
//! every mail instead of sending it. Batch state lives in CSV files: the
//! periods file is rewritten with its `processed` flags, and the log and
//! reminder files are read at start when present and rewritten at the end.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use plant_finance::collaborators::{JsonDocumentWriter, LoggingNotifier};
use plant_finance::plant::{load_plants, load_project_users};
use plant_finance::repayment::{
    load_reminders, load_repayment_logs, load_repayment_periods, write_reminders, write_repayment_logs,
    write_repayment_periods, BatchReport, RepaymentLogEntry, RepaymentPeriodData,
};
use plant_finance::tariff::load_rate_tables;
use plant_finance::{EngineConfig, MemoryStore, RecordId, RepaymentProcessor, Store};

#[derive(Parser)]
#[command(name = "repayment-batch")]
#[command(about = "Run the repayment batch and reminder sweep over CSV exports", long_about = None)]
struct Cli {
    /// Rate tables CSV
    #[arg(long)]
    tariffs: PathBuf,

    /// Plants CSV
    #[arg(long)]
    plants: PathBuf,

    /// Plant to customer links CSV
    #[arg(long)]
    project_users: PathBuf,

    /// Repayment periods CSV, rewritten with updated processed flags
    #[arg(long)]
    periods: PathBuf,

    /// Engine config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for generated documents
    #[arg(short, long, default_value = "repayment_documents")]
    documents: PathBuf,

    /// Run the reminder sweep after processing
    #[arg(long)]
    remind: bool,

    /// Repayment log CSV, read when present and rewritten
    #[arg(short, long, default_value = "repayment_logs.csv")]
    output: PathBuf,

    /// Reminder CSV, read when present and rewritten
    #[arg(long, default_value = "repayment_reminders.csv")]
    reminders: PathBuf,
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

fn print_report(label: &str, report: &BatchReport) {
    println!(
        "{}: {} ok, {} skipped, {} failed",
        label,
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (id, err) in &report.failed {
        let retry = if err.is_retryable() { " (retry next run)" } else { "" };
        println!("  record {}: {}{}", id, err, retry);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let start = Instant::now();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let mut store = MemoryStore::new();
    store.load(load_rate_tables(&cli.tariffs).context("loading rate tables")?)?;
    store.load(load_plants(&cli.plants).context("loading plants")?)?;
    store.load(load_project_users(&cli.project_users).context("loading project users")?)?;
    let periods = store.load(load_repayment_periods(&cli.periods).context("loading repayment periods")?)?;
    if cli.output.exists() {
        let logs = store.load(load_repayment_logs(&cli.output).context("loading repayment logs")?)?;
        info!("Loaded {} repayment logs from an earlier run", logs);
    }
    if cli.reminders.exists() {
        let reminders = store.load(load_reminders(&cli.reminders).context("loading reminders")?)?;
        info!("Loaded {} reminders from an earlier run", reminders);
    }
    info!("Loaded {} repayment periods in {:?}", periods, start.elapsed());

    let processor = RepaymentProcessor::new(config.repayment);
    let mut renderer = JsonDocumentWriter::new(&cli.documents)?;
    let mut notifier = LoggingNotifier::default();

    let report = processor.process_pending(&mut store, &mut renderer, &mut notifier)?;
    print_report("Repayment batch", &report);

    if cli.remind {
        // Notices mailed in this run are not due for a reminder yet
        let fresh: Vec<RecordId> = store
            .select::<RepaymentLogEntry>(|log| report.succeeded.contains(&log.repayment_data_id))?
            .iter()
            .map(|log| log.id)
            .collect();
        let report = processor.escalate_reminders_except(&mut store, &mut renderer, &mut notifier, &fresh)?;
        print_report("Reminder sweep", &report);
    }

    let periods = store.select::<RepaymentPeriodData>(|_| true)?;
    write_repayment_periods(create(&cli.periods)?, &periods)?;
    write_repayment_logs(create(&cli.output)?, store.repayment_logs.iter())?;
    write_reminders(create(&cli.reminders)?, store.reminders.iter())?;

    println!(
        "{} mails logged, {} repayment logs written to {}, {} reminders to {}",
        notifier.sent,
        store.repayment_logs.active_len(),
        cli.output.display(),
        store.reminders.active_len(),
        cli.reminders.display()
    );
    println!("Done in {:?}", start.elapsed());
    Ok(())
}
