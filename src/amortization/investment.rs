//! Investment and schedule entry records

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::store::{Lifecycle, Record, RecordId, DEACTIVATED_CODE};

/// How often the yearly installment is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentInterval {
    #[default]
    Yearly,
    HalfYearly,
    Quarterly,
    Monthly,
}

impl RepaymentInterval {
    pub fn periods_per_year(&self) -> u32 {
        match self {
            RepaymentInterval::Yearly => 1,
            RepaymentInterval::HalfYearly => 2,
            RepaymentInterval::Quarterly => 4,
            RepaymentInterval::Monthly => 12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InvestmentStatus {
    #[default]
    Pending,
    Active,
    Deactivated,
}

impl InvestmentStatus {
    pub fn code(&self) -> u8 {
        match self {
            InvestmentStatus::Pending => 0,
            InvestmentStatus::Active => 1,
            InvestmentStatus::Deactivated => DEACTIVATED_CODE,
        }
    }
}

/// Money lent to a plant, paid back in equal principal parts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: RecordId,

    pub plant_id: RecordId,

    pub amount: f64,

    /// Years; zero for direct buys
    pub duration: u32,

    /// Percent per year
    pub interest_rate: f64,

    #[serde(default)]
    pub repayment_interval: RepaymentInterval,

    #[serde(default)]
    pub repayment_start: Option<NaiveDate>,

    #[serde(default)]
    pub status: InvestmentStatus,
}

impl Investment {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("amount", self.amount), ("interest_rate", self.interest_rate)] {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::invalid(
                    field,
                    format!("expected a non-negative number, got {}", value),
                ));
            }
        }
        Ok(())
    }

    /// Due date of the installment for `year` (1-based)
    pub fn due_date(&self, year: u32) -> Option<NaiveDate> {
        let start = self.repayment_start?;
        start.checked_add_months(Months::new(12 * year.saturating_sub(1)))
    }
}

impl Record for Investment {
    const KIND: &'static str = "investment";

    fn id(&self) -> RecordId {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_active(&self) -> bool {
        self.status != InvestmentStatus::Deactivated
    }

    fn deactivate(&mut self) {
        self.status = InvestmentStatus::Deactivated;
    }
}

/// One year of an amortization schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvestmentRepaymentEntry {
    pub id: RecordId,

    pub investment_id: RecordId,

    pub year: u32,

    /// Balance before this year's installment
    pub remaining_payment: f64,

    /// Principal part, constant over the schedule
    pub repayment_per_year: f64,

    pub interest: f64,

    /// Principal plus interest
    pub yearly_repayment: f64,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub repaid: bool,

    #[serde(default)]
    pub status: Lifecycle,
}

impl InvestmentRepaymentEntry {
    /// Amount collected per installment for the given interval
    pub fn period_installment(&self, interval: RepaymentInterval) -> f64 {
        self.yearly_repayment / f64::from(interval.periods_per_year())
    }
}

impl Record for InvestmentRepaymentEntry {
    const KIND: &'static str = "schedule entry";

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
