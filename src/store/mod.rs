//! Record store abstraction
//!
//! The engine never owns persistence. It reads and writes records through the
//! [`Repository`] trait, one implementation per record type, and soft-deletes
//! by flipping a record's status instead of removing it. Deactivated records
//! stay stored but are invisible to `find_by_id` and `find_where`.
//!
//! [`Store`] bundles every repository the engine needs and adds typed helpers
//! so call sites read `store.require::<Plant>(id)?`.

mod memory;

pub use memory::{MemoryStore, Table};

use serde::{Deserialize, Serialize};

use crate::amortization::{Investment, InvestmentRepaymentEntry};
use crate::error::{EngineError, Result};
use crate::plant::{Extra, Plant, PowerBill, ProjectUser};
use crate::repayment::{ReminderEntry, RepaymentLogEntry, RepaymentPeriodData};
use crate::tariff::RateTable;

/// Primary key of a stored record (0 = not yet stored)
pub type RecordId = u64;

/// Legacy integer code for soft-deleted records
pub const DEACTIVATED_CODE: u8 = 99;

/// Status of records that are either live or soft-deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Active,
    Deactivated,
}

impl Lifecycle {
    pub fn code(&self) -> u8 {
        match self {
            Lifecycle::Active => 1,
            Lifecycle::Deactivated => DEACTIVATED_CODE,
        }
    }
}

/// A record type that can live in a [`Repository`]
pub trait Record: Clone {
    /// Human readable record kind, used in error messages
    const KIND: &'static str;

    fn id(&self) -> RecordId;

    fn assign_id(&mut self, id: RecordId);

    fn is_active(&self) -> bool;

    fn deactivate(&mut self);
}

/// Conventional record store access for one record type
pub trait Repository<T: Record> {
    fn find_by_id(&self, id: RecordId) -> Result<Option<T>>;

    /// Active records matching `predicate`, in insertion order
    fn find_where(&self, predicate: &dyn Fn(&T) -> bool) -> Result<Vec<T>>;

    /// Insert (id 0) or replace a record, returning it with its id assigned
    fn save(&mut self, record: T) -> Result<T>;

    fn soft_deactivate(&mut self, id: RecordId) -> Result<()>;
}

/// Every repository the engine talks to
pub trait Store:
    Repository<Plant>
    + Repository<RateTable>
    + Repository<PowerBill>
    + Repository<Extra>
    + Repository<ProjectUser>
    + Repository<Investment>
    + Repository<InvestmentRepaymentEntry>
    + Repository<RepaymentPeriodData>
    + Repository<RepaymentLogEntry>
    + Repository<ReminderEntry>
{
    fn find<T: Record>(&self, id: RecordId) -> Result<Option<T>>
    where
        Self: Repository<T>,
    {
        Repository::<T>::find_by_id(self, id)
    }

    /// Like [`Store::find`] but a missing record is a `MissingDependency`
    fn require<T: Record>(&self, id: RecordId) -> Result<T>
    where
        Self: Repository<T>,
    {
        self.find::<T>(id)?
            .ok_or_else(|| EngineError::missing(T::KIND, format!("id {}", id)))
    }

    fn select<T: Record>(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>>
    where
        Self: Repository<T>,
    {
        Repository::<T>::find_where(self, &predicate)
    }

    fn persist<T: Record>(&mut self, record: T) -> Result<T>
    where
        Self: Repository<T>,
    {
        Repository::<T>::save(self, record)
    }

    fn deactivate<T: Record>(&mut self, id: RecordId) -> Result<()>
    where
        Self: Repository<T>,
    {
        Repository::<T>::soft_deactivate(self, id)
    }
}

impl<S> Store for S where
    S: Repository<Plant>
        + Repository<RateTable>
        + Repository<PowerBill>
        + Repository<Extra>
        + Repository<ProjectUser>
        + Repository<Investment>
        + Repository<InvestmentRepaymentEntry>
        + Repository<RepaymentPeriodData>
        + Repository<RepaymentLogEntry>
        + Repository<ReminderEntry>
{
}
