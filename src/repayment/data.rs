//! Repayment period, log and reminder records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Lifecycle, Record, RecordId, DEACTIVATED_CODE};

/// Processing state of a repayment period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PeriodStatus {
    #[default]
    Pending,
    Processed,
    Deactivated,
}

impl PeriodStatus {
    pub fn code(&self) -> u8 {
        match self {
            PeriodStatus::Pending => 0,
            PeriodStatus::Processed => 1,
            PeriodStatus::Deactivated => DEACTIVATED_CODE,
        }
    }
}

/// Measured production and consumption of a plant over one billing interval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepaymentPeriodData {
    pub id: RecordId,

    pub plant_id: RecordId,

    /// Label such as "2024/1"
    pub repayment_period: String,

    /// kWh produced in the period
    pub power_production: f64,

    /// kWh consumed from the plant in the period
    pub power_consumption: f64,

    /// Falls back to the tariff's excess production rate
    #[serde(default)]
    pub production_tariff: Option<f64>,

    /// Falls back to zero
    #[serde(default)]
    pub production_extra_tariff: Option<f64>,

    /// Falls back to the tariff's consumption rate
    #[serde(default)]
    pub consumption_tariff: Option<f64>,

    #[serde(default)]
    pub repayment_from_date: Option<NaiveDate>,

    #[serde(default)]
    pub repayment_to_date: Option<NaiveDate>,

    #[serde(default)]
    pub status: PeriodStatus,
}

impl Record for RepaymentPeriodData {
    const KIND: &'static str = "repayment period";

    fn id(&self) -> RecordId {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_active(&self) -> bool {
        self.status != PeriodStatus::Deactivated
    }

    fn deactivate(&mut self) {
        self.status = PeriodStatus::Deactivated;
    }
}

/// Outcome of processing one repayment period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepaymentLogEntry {
    pub id: RecordId,

    pub repayment_data_id: RecordId,

    pub plant_id: RecordId,

    /// Absolute difference between production credit and base installment
    pub amount: f64,

    /// Base installment at generation time
    pub amount_to_pay: f64,

    pub amount_production: f64,

    pub repayment_period: String,

    pub document_name: String,

    pub customer_mail_sent: bool,

    pub payment_verified: bool,

    pub has_reminders: bool,

    pub datum_generated: DateTime<Utc>,

    #[serde(default)]
    pub datum_paid: Option<DateTime<Utc>>,

    #[serde(default)]
    pub transaction_reference: Option<String>,

    #[serde(default)]
    pub status: Lifecycle,
}

impl Record for RepaymentLogEntry {
    const KIND: &'static str = "repayment log";

    fn id(&self) -> RecordId {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_active(&self) -> bool {
        self.status == Lifecycle::Active
    }

    fn deactivate(&mut self) {
        self.status = Lifecycle::Deactivated;
    }
}

/// One escalation step for an unpaid log; never changed once stored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderEntry {
    pub id: RecordId,

    pub repayment_log_id: RecordId,

    /// 1-based per log
    pub reminder_nr: u32,

    pub amount: f64,

    pub document_name: String,

    pub customer_mail_sent: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub status: Lifecycle,
}

impl Record for ReminderEntry {
    const KIND: &'static str = "reminder";

    fn id(&self) -> RecordId {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_active(&self) -> bool {
        self.status == Lifecycle::Active
    }

    fn deactivate(&mut self) {
        self.status = Lifecycle::Deactivated;
    }
}
