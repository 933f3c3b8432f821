//! In-memory record store used by the CLI tools and the tests

use std::collections::BTreeMap;

use super::{Record, RecordId, Repository};
use crate::amortization::{Investment, InvestmentRepaymentEntry};
use crate::error::{EngineError, Result};
use crate::plant::{Extra, Plant, PowerBill, ProjectUser};
use crate::repayment::{ReminderEntry, RepaymentLogEntry, RepaymentPeriodData};
use crate::tariff::RateTable;

/// Rows of one record type, keyed by id
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: BTreeMap<RecordId, T>,
    next_id: RecordId,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Record> Table<T> {
    /// Number of stored rows, deactivated ones included
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn active_len(&self) -> usize {
        self.rows.values().filter(|r| r.is_active()).count()
    }

    /// All stored rows, deactivated ones included
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    fn find_by_id(&self, id: RecordId) -> Option<T> {
        self.rows.get(&id).filter(|r| r.is_active()).cloned()
    }

    fn find_where(&self, predicate: &dyn Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .values()
            .filter(|r| r.is_active() && predicate(r))
            .cloned()
            .collect()
    }

    fn save(&mut self, mut record: T) -> T {
        if record.id() == 0 {
            record.assign_id(self.next_id);
        }
        // Records loaded with explicit ids must not collide with generated ones
        self.next_id = self.next_id.max(record.id() + 1);
        self.rows.insert(record.id(), record.clone());
        record
    }

    fn soft_deactivate(&mut self, id: RecordId) -> Result<()> {
        let row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| EngineError::missing(T::KIND, format!("id {}", id)))?;
        row.deactivate();
        Ok(())
    }
}

/// Store holding every record type in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub plants: Table<Plant>,
    pub rate_tables: Table<RateTable>,
    pub power_bills: Table<PowerBill>,
    pub extras: Table<Extra>,
    pub project_users: Table<ProjectUser>,
    pub investments: Table<Investment>,
    pub schedule_entries: Table<InvestmentRepaymentEntry>,
    pub period_data: Table<RepaymentPeriodData>,
    pub repayment_logs: Table<RepaymentLogEntry>,
    pub reminders: Table<ReminderEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-insert records, e.g. the output of a CSV loader
    pub fn load<T: Record>(&mut self, records: impl IntoIterator<Item = T>) -> Result<usize>
    where
        Self: Repository<T>,
    {
        let mut count = 0;
        for record in records {
            Repository::<T>::save(self, record)?;
            count += 1;
        }
        Ok(count)
    }
}

macro_rules! memory_repository {
    ($($record:ty => $table:ident),* $(,)?) => {
        $(
            impl Repository<$record> for MemoryStore {
                fn find_by_id(&self, id: RecordId) -> Result<Option<$record>> {
                    Ok(self.$table.find_by_id(id))
                }

                fn find_where(&self, predicate: &dyn Fn(&$record) -> bool) -> Result<Vec<$record>> {
                    Ok(self.$table.find_where(predicate))
                }

                fn save(&mut self, record: $record) -> Result<$record> {
                    Ok(self.$table.save(record))
                }

                fn soft_deactivate(&mut self, id: RecordId) -> Result<()> {
                    self.$table.soft_deactivate(id)
                }
            }
        )*
    };
}

memory_repository! {
    Plant => plants,
    RateTable => rate_tables,
    PowerBill => power_bills,
    Extra => extras,
    ProjectUser => project_users,
    Investment => investments,
    InvestmentRepaymentEntry => schedule_entries,
    RepaymentPeriodData => period_data,
    RepaymentLogEntry => repayment_logs,
    ReminderEntry => reminders,
}
