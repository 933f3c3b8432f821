//! Plant Finance - forecast, amortization and repayment engine for crowd-financed solar plants
//!
//! This library provides:
//! - Cost, subsidy and amortization-duration forecasts per plant and tariff
//! - Equal-principal amortization schedules for investments
//! - Periodic repayment processing with escalating payment reminders
//! - A record store abstraction with soft-delete semantics
//!
//! Document rendering and mail delivery are external; the engine talks to
//! them through [`DocumentRenderer`] and [`Notifier`].

pub mod error;
pub mod store;
pub mod tariff;
pub mod plant;
pub mod forecast;
pub mod amortization;
pub mod repayment;
pub mod collaborators;
pub mod config;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use store::{MemoryStore, Record, RecordId, Repository, Store};
pub use tariff::RateTable;
pub use plant::{Extra, Plant, PowerBill, ProjectUser};
pub use forecast::{CalculationVariant, ForecastCalculator, ForecastResult, ForecastService};
pub use amortization::{AmortizationScheduler, Investment, InvestmentRepaymentEntry};
pub use repayment::{BatchReport, RepaymentLogEntry, RepaymentPeriodData, RepaymentProcessor};
pub use collaborators::{DocumentRenderer, Notifier};
pub use config::EngineConfig;
