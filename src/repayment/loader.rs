//! Repayment state as CSV: periods, logs and reminders
//!
//! The batch tool keeps its state between runs in these files, so every
//! writer here produces exactly what the matching loader reads back.

use chrono::{DateTime, NaiveDate, Utc};
use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{PeriodStatus, ReminderEntry, RepaymentLogEntry, RepaymentPeriodData};
use crate::error::{EngineError, Result};
use crate::store::{Lifecycle, RecordId};
use crate::tariff::loader::parse_flag;

#[derive(Debug, Serialize, Deserialize)]
struct PeriodRow {
    #[serde(rename = "id")]
    id: RecordId,
    #[serde(rename = "plantId")]
    plant_id: RecordId,
    #[serde(rename = "repaymentPeriod")]
    repayment_period: String,
    #[serde(rename = "powerProduction")]
    power_production: f64,
    #[serde(rename = "powerConsumption")]
    power_consumption: f64,
    #[serde(rename = "productionTariff", default)]
    production_tariff: Option<f64>,
    #[serde(rename = "productionExtraTariff", default)]
    production_extra_tariff: Option<f64>,
    #[serde(rename = "consumptionTariff", default)]
    consumption_tariff: Option<f64>,
    #[serde(rename = "repaymentFromDate", default)]
    repayment_from_date: Option<NaiveDate>,
    #[serde(rename = "repaymentToDate", default)]
    repayment_to_date: Option<NaiveDate>,
    #[serde(rename = "processed", default)]
    processed: Option<String>,
}

impl PeriodRow {
    fn from_period(data: &RepaymentPeriodData) -> Self {
        let processed = data.status == PeriodStatus::Processed;
        Self {
            id: data.id,
            plant_id: data.plant_id,
            repayment_period: data.repayment_period.clone(),
            power_production: data.power_production,
            power_consumption: data.power_consumption,
            production_tariff: data.production_tariff,
            production_extra_tariff: data.production_extra_tariff,
            consumption_tariff: data.consumption_tariff,
            repayment_from_date: data.repayment_from_date,
            repayment_to_date: data.repayment_to_date,
            processed: processed.then(|| "1".to_string()),
        }
    }

    fn to_period(self) -> Result<RepaymentPeriodData> {
        if let (Some(from), Some(to)) = (self.repayment_from_date, self.repayment_to_date) {
            if to < from {
                return Err(EngineError::invalid(
                    "repaymentToDate",
                    format!("period {} ends {} before it starts {}", self.repayment_period, to, from),
                ));
            }
        }
        let processed = match self.processed {
            Some(flag) => parse_flag("processed", &flag)?,
            None => false,
        };

        Ok(RepaymentPeriodData {
            id: self.id,
            plant_id: self.plant_id,
            repayment_period: self.repayment_period,
            power_production: self.power_production,
            power_consumption: self.power_consumption,
            production_tariff: self.production_tariff,
            production_extra_tariff: self.production_extra_tariff,
            consumption_tariff: self.consumption_tariff,
            repayment_from_date: self.repayment_from_date,
            repayment_to_date: self.repayment_to_date,
            status: if processed { PeriodStatus::Processed } else { PeriodStatus::Pending },
        })
    }
}

/// Load repayment periods from a CSV file
pub fn load_repayment_periods<P: AsRef<Path>>(path: P) -> Result<Vec<RepaymentPeriodData>> {
    let reader = Reader::from_path(path)?;
    collect_periods(reader)
}

pub fn load_repayment_periods_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<RepaymentPeriodData>> {
    collect_periods(Reader::from_reader(reader))
}

fn collect_periods<R: std::io::Read>(mut reader: Reader<R>) -> Result<Vec<RepaymentPeriodData>> {
    let mut periods = Vec::new();
    for result in reader.deserialize() {
        let row: PeriodRow = result?;
        periods.push(row.to_period()?);
    }
    Ok(periods)
}

/// Write repayment periods as CSV in the layout [`load_repayment_periods`] reads
///
/// Processed periods carry `1` in the `processed` column so a reload keeps
/// them out of the next batch.
pub fn write_repayment_periods<'a, W, I>(writer: W, periods: I) -> Result<()>
where
    W: std::io::Write,
    I: IntoIterator<Item = &'a RepaymentPeriodData>,
{
    let mut csv_writer = Writer::from_writer(writer);
    for data in periods {
        csv_writer.serialize(PeriodRow::from_period(data))?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogRow {
    id: RecordId,
    repayment_data_id: RecordId,
    plant_id: RecordId,
    repayment_period: String,
    amount: f64,
    amount_to_pay: f64,
    amount_production: f64,
    document_name: String,
    customer_mail_sent: bool,
    payment_verified: bool,
    has_reminders: bool,
    datum_generated: DateTime<Utc>,
    #[serde(default)]
    datum_paid: Option<DateTime<Utc>>,
    #[serde(default)]
    transaction_reference: Option<String>,
    #[serde(default)]
    status: Lifecycle,
}

impl From<&RepaymentLogEntry> for LogRow {
    fn from(log: &RepaymentLogEntry) -> Self {
        Self {
            id: log.id,
            repayment_data_id: log.repayment_data_id,
            plant_id: log.plant_id,
            repayment_period: log.repayment_period.clone(),
            amount: log.amount,
            amount_to_pay: log.amount_to_pay,
            amount_production: log.amount_production,
            document_name: log.document_name.clone(),
            customer_mail_sent: log.customer_mail_sent,
            payment_verified: log.payment_verified,
            has_reminders: log.has_reminders,
            datum_generated: log.datum_generated,
            datum_paid: log.datum_paid,
            transaction_reference: log.transaction_reference.clone(),
            status: log.status,
        }
    }
}

impl From<LogRow> for RepaymentLogEntry {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            repayment_data_id: row.repayment_data_id,
            plant_id: row.plant_id,
            amount: row.amount,
            amount_to_pay: row.amount_to_pay,
            amount_production: row.amount_production,
            repayment_period: row.repayment_period,
            document_name: row.document_name,
            customer_mail_sent: row.customer_mail_sent,
            payment_verified: row.payment_verified,
            has_reminders: row.has_reminders,
            datum_generated: row.datum_generated,
            datum_paid: row.datum_paid,
            transaction_reference: row.transaction_reference,
            status: row.status,
        }
    }
}

/// Write repayment logs as CSV, one row per log, deactivated ones included
pub fn write_repayment_logs<'a, W, I>(writer: W, logs: I) -> Result<()>
where
    W: std::io::Write,
    I: IntoIterator<Item = &'a RepaymentLogEntry>,
{
    let mut csv_writer = Writer::from_writer(writer);
    for log in logs {
        csv_writer.serialize(LogRow::from(log))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Load repayment logs written by [`write_repayment_logs`]
pub fn load_repayment_logs<P: AsRef<Path>>(path: P) -> Result<Vec<RepaymentLogEntry>> {
    load_repayment_logs_from_reader(std::fs::File::open(path)?)
}

pub fn load_repayment_logs_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<RepaymentLogEntry>> {
    let mut logs = Vec::new();
    for result in Reader::from_reader(reader).deserialize() {
        let row: LogRow = result?;
        logs.push(row.into());
    }
    Ok(logs)
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReminderRow {
    id: RecordId,
    repayment_log_id: RecordId,
    reminder_nr: u32,
    amount: f64,
    document_name: String,
    customer_mail_sent: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    status: Lifecycle,
}

/// Write reminders as CSV, deactivated ones included
pub fn write_reminders<'a, W, I>(writer: W, reminders: I) -> Result<()>
where
    W: std::io::Write,
    I: IntoIterator<Item = &'a ReminderEntry>,
{
    let mut csv_writer = Writer::from_writer(writer);
    for reminder in reminders {
        csv_writer.serialize(ReminderRow {
            id: reminder.id,
            repayment_log_id: reminder.repayment_log_id,
            reminder_nr: reminder.reminder_nr,
            amount: reminder.amount,
            document_name: reminder.document_name.clone(),
            customer_mail_sent: reminder.customer_mail_sent,
            created_at: reminder.created_at,
            status: reminder.status,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Load reminders written by [`write_reminders`]
pub fn load_reminders<P: AsRef<Path>>(path: P) -> Result<Vec<ReminderEntry>> {
    load_reminders_from_reader(std::fs::File::open(path)?)
}

pub fn load_reminders_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<ReminderEntry>> {
    let mut reminders = Vec::new();
    for result in Reader::from_reader(reader).deserialize() {
        let row: ReminderRow = result?;
        reminders.push(ReminderEntry {
            id: row.id,
            repayment_log_id: row.repayment_log_id,
            reminder_nr: row.reminder_nr,
            amount: row.amount,
            document_name: row.document_name,
            customer_mail_sent: row.customer_mail_sent,
            created_at: row.created_at,
            status: row.status,
        });
    }
    Ok(reminders)
}
