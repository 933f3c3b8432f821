//! Plant Finance CLI
//!
//! Run forecasts, price estimates and amortization schedules from CSV exports

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::path::{Path, PathBuf};

use plant_finance::amortization::{build_schedule, Investment, RepaymentInterval, ScheduleSummary};
use plant_finance::forecast::{ForecastCalculator, ForecastService};
use plant_finance::plant::{load_extras, load_plants, load_power_bills};
use plant_finance::tariff::load_rate_tables;
use plant_finance::{EngineConfig, MemoryStore};

#[derive(Parser)]
#[command(name = "plant-finance")]
#[command(about = "Forecasts, price estimates and amortization schedules for solar plants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute forecasts for one plant or every plant
    Forecast {
        #[command(flatten)]
        inputs: PlantInputs,

        /// Power bills CSV
        #[arg(long)]
        bills: PathBuf,

        /// Extras CSV
        #[arg(long)]
        extras: Option<PathBuf>,

        /// Only this plant
        #[arg(long)]
        plant: Option<u64>,

        /// Print the short preview instead of the full breakdown
        #[arg(long)]
        preview: bool,

        /// Engine config JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Suggest a unit price for a plant from its tariff
    Estimate {
        #[command(flatten)]
        inputs: PlantInputs,

        #[arg(long)]
        plant: u64,
    },

    /// Print an amortization schedule
    Schedule {
        #[arg(long)]
        amount: f64,

        /// Years
        #[arg(long)]
        duration: u32,

        /// Percent per year
        #[arg(long)]
        interest_rate: f64,

        #[arg(long, value_enum, default_value = "yearly")]
        interval: IntervalArg,

        /// First due date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Write the schedule as CSV instead of printing a table
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct PlantInputs {
    /// Rate tables CSV
    #[arg(long)]
    tariffs: PathBuf,

    /// Plants CSV
    #[arg(long)]
    plants: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum IntervalArg {
    Yearly,
    HalfYearly,
    Quarterly,
    Monthly,
}

impl From<IntervalArg> for RepaymentInterval {
    fn from(arg: IntervalArg) -> Self {
        match arg {
            IntervalArg::Yearly => RepaymentInterval::Yearly,
            IntervalArg::HalfYearly => RepaymentInterval::HalfYearly,
            IntervalArg::Quarterly => RepaymentInterval::Quarterly,
            IntervalArg::Monthly => RepaymentInterval::Monthly,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Forecast { inputs, bills, extras, plant, preview, config } => {
            run_forecast(&inputs, &bills, extras.as_deref(), plant, preview, config.as_deref())
        }
        Command::Estimate { inputs, plant } => run_estimate(&inputs, plant),
        Command::Schedule { amount, duration, interest_rate, interval, start, output } => {
            let investment = Investment {
                amount,
                duration,
                interest_rate,
                repayment_interval: interval.into(),
                repayment_start: start,
                ..Default::default()
            };
            run_schedule(&investment, output.as_deref())
        }
    }
}

fn load_store(inputs: &PlantInputs) -> Result<MemoryStore> {
    let mut store = MemoryStore::new();

    let tariffs = load_rate_tables(&inputs.tariffs)
        .with_context(|| format!("loading rate tables from {}", inputs.tariffs.display()))?;
    let plants = load_plants(&inputs.plants)
        .with_context(|| format!("loading plants from {}", inputs.plants.display()))?;

    let tariff_count = store.load(tariffs)?;
    let plant_count = store.load(plants)?;
    info!("Loaded {} rate tables and {} plants", tariff_count, plant_count);
    Ok(store)
}

fn run_forecast(
    inputs: &PlantInputs,
    bills: &Path,
    extras: Option<&Path>,
    plant: Option<u64>,
    preview: bool,
    config: Option<&Path>,
) -> Result<()> {
    let config = match config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let mut store = load_store(inputs)?;
    store.load(load_power_bills(bills).with_context(|| format!("loading power bills from {}", bills.display()))?)?;
    if let Some(path) = extras {
        store.load(load_extras(path).with_context(|| format!("loading extras from {}", path.display()))?)?;
    }

    let service = ForecastService::new(ForecastCalculator::new(config.forecast));

    let output = match plant {
        Some(id) => {
            let result = service.forecast_for_plant(&store, id)?;
            if preview {
                serde_json::to_value(result.preview())?
            } else {
                result.data_bag()?
            }
        }
        None => {
            let outcomes = service.recompute_all(&store)?;
            let rows = outcomes
                .into_iter()
                .map(|(plant_id, outcome)| match outcome {
                    Ok(result) if preview => Ok(serde_json::json!({ "plant_id": plant_id, "preview": result.preview() })),
                    Ok(result) => result.data_bag(),
                    Err(e) => Ok(serde_json::json!({ "plant_id": plant_id, "error": e.to_string() })),
                })
                .collect::<plant_finance::Result<Vec<_>>>()?;
            serde_json::Value::Array(rows)
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_estimate(inputs: &PlantInputs, plant: u64) -> Result<()> {
    let store = load_store(inputs)?;
    let estimate = ForecastService::default().estimate_price(&store, plant)?;
    println!("{}", serde_json::to_string_pretty(&estimate)?);
    Ok(())
}

fn run_schedule(investment: &Investment, output: Option<&Path>) -> Result<()> {
    if investment.duration == 0 {
        bail!("duration must be at least one year");
    }
    let entries = build_schedule(investment)?;

    if let Some(path) = output {
        let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
        for entry in &entries {
            writer.serialize(entry)?;
        }
        writer.flush()?;
        println!("Schedule written to: {}", path.display());
        return Ok(());
    }

    let periods = investment.repayment_interval.periods_per_year();
    println!(
        "{:>4} {:>12} {:>14} {:>12} {:>14} {:>14} {:>12}",
        "Year", "Due", "Remaining", "Principal", "Interest", "Yearly", "Per period"
    );
    println!("{}", "-".repeat(90));
    for entry in &entries {
        println!(
            "{:>4} {:>12} {:>14.2} {:>12.2} {:>14.2} {:>14.2} {:>12.2}",
            entry.year,
            entry.due_date.map(|d| d.to_string()).unwrap_or_default(),
            entry.remaining_payment,
            entry.repayment_per_year,
            entry.interest,
            entry.yearly_repayment,
            entry.period_installment(investment.repayment_interval),
        );
    }

    let summary = ScheduleSummary::from_entries(&entries);
    println!("\nSummary:");
    println!("  Years: {}", summary.years);
    println!("  Installments per year: {}", periods);
    println!("  Total principal: {:.2}", summary.total_principal);
    println!("  Total interest: {:.2}", summary.total_interest);
    println!("  Total repayment: {:.2}", summary.total_repayment);
    Ok(())
}
