//! Periodic repayments: logs, reminders and payment confirmation
//!
//! A [`RepaymentPeriodData`] moves from `Pending` to `Processed` exactly once,
//! when its notice has been rendered and mailed. Unpaid logs collect an
//! append-only chain of [`ReminderEntry`] rows, each one surcharge dearer.

mod data;
pub mod loader;
mod processor;
mod reminders;

pub use data::{PeriodStatus, ReminderEntry, RepaymentLogEntry, RepaymentPeriodData};
pub use loader::{
    load_reminders, load_reminders_from_reader, load_repayment_logs, load_repayment_logs_from_reader,
    load_repayment_periods, load_repayment_periods_from_reader, write_reminders, write_repayment_logs,
    write_repayment_periods,
};
pub use processor::{repayment_document_name, BatchReport, RepaymentAmounts, RepaymentConfig, RepaymentProcessor};
pub use reminders::reminder_document_name;
