//! Turn measured repayment periods into repayment logs

use chrono::{TimeDelta, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use super::{PeriodStatus, ReminderEntry, RepaymentLogEntry, RepaymentPeriodData};
use crate::collaborators::{notify, produce_document, DocumentRenderer, DocumentTemplate, MailKind, Notifier};
use crate::error::{EngineError, Result};
use crate::plant::{recipient_for, Plant};
use crate::store::{Lifecycle, Record, RecordId, Store};
use crate::tariff::RateTable;

/// Constants of repayment processing and reminder escalation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepaymentConfig {
    /// Unit price divided by this gives the base installment
    pub installment_divisor: f64,

    /// Added to the amount once per reminder already sent
    pub reminder_surcharge: f64,

    /// Minimum days since the last notice before another reminder goes out
    pub reminder_interval_days: i64,
}

impl Default for RepaymentConfig {
    fn default() -> Self {
        Self {
            installment_divisor: 12.5,
            reminder_surcharge: 5.0,
            reminder_interval_days: 0,
        }
    }
}

impl RepaymentConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.installment_divisor.is_finite() || self.installment_divisor <= 0.0 {
            return Err(EngineError::invalid(
                "installment_divisor",
                format!("must be positive, got {}", self.installment_divisor),
            ));
        }
        if !self.reminder_surcharge.is_finite() || self.reminder_surcharge < 0.0 {
            return Err(EngineError::invalid(
                "reminder_surcharge",
                format!("must be non-negative, got {}", self.reminder_surcharge),
            ));
        }
        if self.reminder_interval_days < 0 {
            return Err(EngineError::invalid(
                "reminder_interval_days",
                format!("must be non-negative, got {}", self.reminder_interval_days),
            ));
        }
        self.reminder_interval()?;
        Ok(())
    }

    /// The reminder interval as a duration
    pub fn reminder_interval(&self) -> Result<TimeDelta> {
        TimeDelta::try_days(self.reminder_interval_days).ok_or_else(|| {
            EngineError::invalid(
                "reminder_interval_days",
                format!("{} days is out of range", self.reminder_interval_days),
            )
        })
    }
}

/// Money figures of one repayment period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepaymentAmounts {
    /// Production credit minus consumption charge
    pub amount_production: f64,
    pub base_installment: f64,
    pub amount: f64,
    pub amount_to_pay: f64,
}

/// Per-record outcome of a batch pass
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<RecordId>,
    pub skipped: Vec<RecordId>,
    pub failed: Vec<(RecordId, EngineError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Ids whose failure leaves them eligible for the next run
    pub fn retryable(&self) -> Vec<RecordId> {
        self.failed
            .iter()
            .filter(|(_, e)| e.is_retryable())
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn record_failure(&mut self, id: RecordId, err: EngineError) {
        if err.is_retryable() {
            warn!("Record {} left for the next run: {}", id, err);
        } else {
            error!("Record {} failed: {}", id, err);
        }
        self.failed.push((id, err));
    }
}

/// Document name of a repayment notice, e.g. `repayment_3_2024-1`
pub fn repayment_document_name(plant_id: RecordId, period: &str) -> String {
    format!("repayment_{}_{}", plant_id, period.replace('/', "-"))
}

/// Processes repayment periods and escalates unpaid logs
#[derive(Debug, Clone, Default)]
pub struct RepaymentProcessor {
    pub(super) config: RepaymentConfig,
}

impl RepaymentProcessor {
    pub fn new(config: RepaymentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RepaymentConfig {
        &self.config
    }

    /// Amounts for a period; missing period tariffs fall back to the plant's tariff
    pub fn compute_amounts(
        &self,
        data: &RepaymentPeriodData,
        plant: &Plant,
        rate_table: Option<&RateTable>,
    ) -> Result<RepaymentAmounts> {
        self.config.validate()?;

        let production_tariff = data
            .production_tariff
            .or(rate_table.map(|t| t.excess_production_rate))
            .ok_or_else(|| EngineError::missing(RateTable::KIND, format!("production tariff for plant {}", plant.id)))?;
        let consumption_tariff = data
            .consumption_tariff
            .or(rate_table.map(|t| t.consumption_rate))
            .ok_or_else(|| EngineError::missing(RateTable::KIND, format!("consumption tariff for plant {}", plant.id)))?;
        let extra_tariff = data.production_extra_tariff.unwrap_or(0.0);
        let unit_price = plant.unit_price.unwrap_or(0.0);

        let fields = [
            ("power_production", data.power_production),
            ("power_consumption", data.power_consumption),
            ("production_tariff", production_tariff),
            ("production_extra_tariff", extra_tariff),
            ("consumption_tariff", consumption_tariff),
            ("unit_price", unit_price),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::invalid(
                    field,
                    format!("expected a non-negative number, got {}", value),
                ));
            }
        }

        let amount_production = production_tariff * data.power_production + extra_tariff * data.power_production
            - consumption_tariff * data.power_consumption;
        let base_installment = unit_price / self.config.installment_divisor;

        Ok(RepaymentAmounts {
            amount_production,
            base_installment,
            amount: (amount_production - base_installment).abs(),
            amount_to_pay: base_installment,
        })
    }

    /// Process one pending period: compute, render, notify, then mark processed
    ///
    /// The period only becomes `Processed` after the customer mail was accepted;
    /// any earlier failure leaves it `Pending`.
    pub fn process_record<S, R, N>(
        &self,
        store: &mut S,
        renderer: &mut R,
        notifier: &mut N,
        data_id: RecordId,
    ) -> Result<RepaymentLogEntry>
    where
        S: Store,
        R: DocumentRenderer + ?Sized,
        N: Notifier + ?Sized,
    {
        let mut data = store.require::<RepaymentPeriodData>(data_id)?;
        if data.status == PeriodStatus::Processed {
            return Err(EngineError::invalid(
                "status",
                format!("repayment period {} is already processed", data_id),
            ));
        }

        let plant = store.require::<Plant>(data.plant_id)?;
        let rate_table = match plant.rate_table_id {
            Some(id) => store.find::<RateTable>(id)?,
            None => None,
        };
        let recipient = recipient_for(store, plant.id)?;
        let amounts = self.compute_amounts(&data, &plant, rate_table.as_ref())?;

        let document_name = repayment_document_name(plant.id, &data.repayment_period);
        let data_bag = serde_json::json!({
            "plant_id": plant.id,
            "plant_name": plant.name,
            "repayment_period": data.repayment_period,
            "repayment_from_date": data.repayment_from_date,
            "repayment_to_date": data.repayment_to_date,
            "power_production": data.power_production,
            "power_consumption": data.power_consumption,
            "amounts": amounts,
        });
        let document = produce_document(renderer, DocumentTemplate::Repayment, &data_bag, &document_name)?;

        let payload = serde_json::json!({
            "plant_id": plant.id,
            "repayment_period": data.repayment_period,
            "amount": amounts.amount,
            "amount_to_pay": amounts.amount_to_pay,
            "document": document.display().to_string(),
        });
        notify(notifier, recipient, MailKind::RepaymentNotice, &payload)?;

        let log = RepaymentLogEntry {
            id: 0,
            repayment_data_id: data.id,
            plant_id: plant.id,
            amount: amounts.amount,
            amount_to_pay: amounts.amount_to_pay,
            amount_production: amounts.amount_production,
            repayment_period: data.repayment_period.clone(),
            document_name,
            customer_mail_sent: true,
            payment_verified: false,
            has_reminders: false,
            datum_generated: Utc::now(),
            datum_paid: None,
            transaction_reference: None,
            status: Lifecycle::Active,
        };

        let log = store.persist(log)?;
        data.status = PeriodStatus::Processed;
        store.persist(data)?;

        info!(
            "Plant {} period {}: amount {:.2}, to pay {:.2}",
            log.plant_id, log.repayment_period, log.amount, log.amount_to_pay
        );
        Ok(log)
    }

    /// Process every pending period in store order; one failure never stops the batch
    pub fn process_pending<S, R, N>(&self, store: &mut S, renderer: &mut R, notifier: &mut N) -> Result<BatchReport>
    where
        S: Store,
        R: DocumentRenderer + ?Sized,
        N: Notifier + ?Sized,
    {
        let pending = store.select::<RepaymentPeriodData>(|data| data.status == PeriodStatus::Pending)?;
        info!("Processing {} pending repayment periods", pending.len());

        let mut report = BatchReport::default();
        for data in pending {
            match self.process_record(store, renderer, notifier, data.id) {
                Ok(_) => report.succeeded.push(data.id),
                Err(e) => report.record_failure(data.id, e),
            }
        }

        info!(
            "Repayment batch done: {} processed, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Undo a log: its period returns to `Pending`, log and reminders are deactivated
    pub fn delete_log<S: Store>(&self, store: &mut S, log_id: RecordId) -> Result<RepaymentPeriodData> {
        let log = store.require::<RepaymentLogEntry>(log_id)?;
        if log.payment_verified {
            return Err(EngineError::invalid(
                "payment_verified",
                format!("repayment log {} is already paid", log_id),
            ));
        }
        let mut data = store.require::<RepaymentPeriodData>(log.repayment_data_id)?;

        let reminders = store.select::<ReminderEntry>(|reminder| reminder.repayment_log_id == log_id)?;
        for reminder in &reminders {
            store.deactivate::<ReminderEntry>(reminder.id)?;
        }
        store.deactivate::<RepaymentLogEntry>(log_id)?;

        data.status = PeriodStatus::Pending;
        let data = store.persist(data)?;

        info!(
            "Deleted repayment log {} with {} reminders, period {} is pending again",
            log_id,
            reminders.len(),
            data.id
        );
        Ok(data)
    }
}
