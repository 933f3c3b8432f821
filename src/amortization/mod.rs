//! Investment amortization schedules

mod investment;
mod scheduler;

pub use investment::{Investment, InvestmentRepaymentEntry, InvestmentStatus, RepaymentInterval};
pub use scheduler::{build_schedule, AmortizationScheduler, ScheduleSummary};
