//! Equal-principal amortization schedules

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{Investment, InvestmentRepaymentEntry};
use crate::error::{EngineError, Result};
use crate::plant::Plant;
use crate::store::{Lifecycle, RecordId, Store};
use crate::tariff::RateTable;

/// Compute the yearly entries of an investment without storing them
///
/// Principal is split evenly over `duration` years; interest is charged on the
/// balance before each year's installment.
pub fn build_schedule(investment: &Investment) -> Result<Vec<InvestmentRepaymentEntry>> {
    investment.validate()?;
    if investment.duration == 0 {
        return Ok(Vec::new());
    }

    let repayment_per_year = investment.amount / f64::from(investment.duration);
    let rate = investment.interest_rate / 100.0;
    let mut remaining = investment.amount;

    let entries = (1..=investment.duration)
        .map(|year| {
            let interest = remaining * rate;
            let entry = InvestmentRepaymentEntry {
                id: 0,
                investment_id: investment.id,
                year,
                remaining_payment: remaining,
                repayment_per_year,
                interest,
                yearly_repayment: repayment_per_year + interest,
                due_date: investment.due_date(year),
                repaid: false,
                status: Lifecycle::Active,
            };
            remaining -= repayment_per_year;
            entry
        })
        .collect();

    Ok(entries)
}

/// Persists schedules and tracks their repayment
#[derive(Debug, Clone, Copy, Default)]
pub struct AmortizationScheduler;

impl AmortizationScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Replace the investment's schedule with a freshly computed one
    ///
    /// Prior entries are soft-deactivated, never deleted. Calling this twice
    /// leaves exactly `duration` active entries.
    pub fn generate_schedule<S: Store>(
        &self,
        store: &mut S,
        investment_id: RecordId,
    ) -> Result<Vec<InvestmentRepaymentEntry>> {
        let investment = store.require::<Investment>(investment_id)?;
        let direct_buy = self.is_direct_buy(store, &investment)?;
        let entries = if direct_buy {
            investment.validate()?;
            Vec::new()
        } else {
            build_schedule(&investment)?
        };

        let prior = store.select::<InvestmentRepaymentEntry>(|e| e.investment_id == investment_id)?;
        for entry in &prior {
            store.deactivate::<InvestmentRepaymentEntry>(entry.id)?;
        }
        if !prior.is_empty() {
            debug!("Deactivated {} prior entries of investment {}", prior.len(), investment_id);
        }

        let saved = entries
            .into_iter()
            .map(|entry| store.persist(entry))
            .collect::<Result<Vec<_>>>()?;

        if direct_buy {
            info!("Investment {}: plant {} is a direct buy, no schedule", investment_id, investment.plant_id);
        } else {
            info!(
                "Investment {}: {} year schedule for {:.2} at {:.2}%",
                investment_id,
                saved.len(),
                investment.amount,
                investment.interest_rate
            );
        }
        Ok(saved)
    }

    /// Direct-buy tariffs are paid up front and never amortized
    fn is_direct_buy<S: Store>(&self, store: &S, investment: &Investment) -> Result<bool> {
        let plant = store.require::<Plant>(investment.plant_id)?;
        let rate_table = match plant.rate_table_id {
            Some(id) => store.find::<RateTable>(id)?,
            None => None,
        };
        Ok(rate_table.is_some_and(|table| table.direct_buy))
    }

    /// Active entries of an investment ordered by year
    pub fn active_schedule<S: Store>(
        &self,
        store: &S,
        investment_id: RecordId,
    ) -> Result<Vec<InvestmentRepaymentEntry>> {
        let mut entries = store.select::<InvestmentRepaymentEntry>(|e| e.investment_id == investment_id)?;
        entries.sort_by_key(|e| e.year);
        Ok(entries)
    }

    pub fn mark_repaid<S: Store>(&self, store: &mut S, entry_id: RecordId) -> Result<InvestmentRepaymentEntry> {
        let mut entry = store.require::<InvestmentRepaymentEntry>(entry_id)?;
        if entry.repaid {
            return Err(EngineError::invalid("repaid", format!("entry {} is already repaid", entry_id)));
        }
        entry.repaid = true;
        store.persist(entry)
    }
}

/// Totals over a schedule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub years: usize,
    pub total_principal: f64,
    pub total_interest: f64,
    pub total_repayment: f64,
    /// Principal of entries not yet repaid
    pub outstanding: f64,
}

impl ScheduleSummary {
    pub fn from_entries(entries: &[InvestmentRepaymentEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut summary, entry| {
            summary.years += 1;
            summary.total_principal += entry.repayment_per_year;
            summary.total_interest += entry.interest;
            summary.total_repayment += entry.yearly_repayment;
            if !entry.repaid {
                summary.outstanding += entry.repayment_per_year;
            }
            summary
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn investment() -> Investment {
        Investment {
            plant_id: 1,
            amount: 1200.0,
            duration: 12,
            interest_rate: 2.0,
            ..Default::default()
        }
    }

    fn stored() -> (MemoryStore, RecordId) {
        stored_with_tariff(false)
    }

    fn stored_with_tariff(direct_buy: bool) -> (MemoryStore, RecordId) {
        let mut store = MemoryStore::new();
        let table = store
            .persist(RateTable {
                name: "Standard".to_string(),
                direct_buy,
                ..Default::default()
            })
            .unwrap();
        store
            .persist(Plant {
                id: 1,
                name: "Barn".to_string(),
                rate_table_id: Some(table.id),
                ..Default::default()
            })
            .unwrap();
        let saved = store.persist(investment()).unwrap();
        (store, saved.id)
    }

    #[test]
    fn test_first_years() {
        let entries = build_schedule(&investment()).unwrap();

        assert_eq!(entries.len(), 12);
        assert_eq!(entries[0].year, 1);
        assert_abs_diff_eq!(entries[0].remaining_payment, 1200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(entries[0].repayment_per_year, 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(entries[0].interest, 24.0, epsilon = 1e-9);
        assert_abs_diff_eq!(entries[0].yearly_repayment, 124.0, epsilon = 1e-9);

        assert_abs_diff_eq!(entries[1].remaining_payment, 1100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(entries[1].interest, 22.0, epsilon = 1e-9);
        assert_abs_diff_eq!(entries[1].yearly_repayment, 122.0, epsilon = 1e-9);
    }

    #[test]
    fn test_balance_runs_down_to_zero() {
        let investment = Investment {
            amount: 10_000.0,
            duration: 7,
            interest_rate: 3.1,
            ..Default::default()
        };
        let entries = build_schedule(&investment).unwrap();

        for pair in entries.windows(2) {
            assert!(pair[1].remaining_payment < pair[0].remaining_payment);
        }
        let last = entries.last().unwrap();
        assert_abs_diff_eq!(last.remaining_payment - last.repayment_per_year, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_duration_is_empty() {
        let investment = Investment { duration: 0, ..investment() };
        assert!(build_schedule(&investment).unwrap().is_empty());
    }

    #[test]
    fn test_due_dates_follow_start() {
        let investment = Investment {
            repayment_start: NaiveDate::from_ymd_opt(2025, 6, 30),
            duration: 3,
            ..investment()
        };
        let entries = build_schedule(&investment).unwrap();
        assert_eq!(entries[2].due_date, NaiveDate::from_ymd_opt(2027, 6, 30));
    }

    #[test]
    fn test_regenerate_keeps_one_active_set() {
        let (mut store, id) = stored();
        let scheduler = AmortizationScheduler::new();

        scheduler.generate_schedule(&mut store, id).unwrap();
        let second = scheduler.generate_schedule(&mut store, id).unwrap();

        assert_eq!(second.len(), 12);
        assert_eq!(scheduler.active_schedule(&store, id).unwrap().len(), 12);
        assert_eq!(store.schedule_entries.len(), 24);
        assert_eq!(store.schedule_entries.active_len(), 12);
    }

    #[test]
    fn test_invalid_investment_keeps_prior_schedule() {
        let (mut store, id) = stored();
        let scheduler = AmortizationScheduler::new();
        scheduler.generate_schedule(&mut store, id).unwrap();

        let broken = Investment { id, amount: f64::NAN, ..investment() };
        store.persist(broken).unwrap();

        assert!(scheduler.generate_schedule(&mut store, id).is_err());
        assert_eq!(store.schedule_entries.active_len(), 12);
    }

    #[test]
    fn test_missing_investment() {
        let mut store = MemoryStore::new();
        let err = AmortizationScheduler::new().generate_schedule(&mut store, 5).unwrap_err();
        assert!(matches!(err, EngineError::MissingDependency { kind: "investment", .. }));
    }

    #[test]
    fn test_direct_buy_has_no_schedule() {
        let (mut store, id) = stored_with_tariff(true);
        let scheduler = AmortizationScheduler::new();

        assert!(scheduler.generate_schedule(&mut store, id).unwrap().is_empty());
        assert!(store.schedule_entries.is_empty());
    }

    #[test]
    fn test_switch_to_direct_buy_clears_schedule() {
        let (mut store, id) = stored();
        let scheduler = AmortizationScheduler::new();
        scheduler.generate_schedule(&mut store, id).unwrap();

        let mut table = store.require::<RateTable>(1).unwrap();
        table.direct_buy = true;
        store.persist(table).unwrap();

        assert!(scheduler.generate_schedule(&mut store, id).unwrap().is_empty());
        assert!(scheduler.active_schedule(&store, id).unwrap().is_empty());
        assert_eq!(store.schedule_entries.len(), 12);
    }

    #[test]
    fn test_investment_without_plant() {
        let mut store = MemoryStore::new();
        let saved = store.persist(investment()).unwrap();
        let err = AmortizationScheduler::new().generate_schedule(&mut store, saved.id).unwrap_err();
        assert!(matches!(err, EngineError::MissingDependency { kind: "plant", .. }));
    }

    #[test]
    fn test_mark_repaid_and_summary() {
        let (mut store, id) = stored();
        let scheduler = AmortizationScheduler::new();
        let entries = scheduler.generate_schedule(&mut store, id).unwrap();

        scheduler.mark_repaid(&mut store, entries[0].id).unwrap();
        assert!(scheduler.mark_repaid(&mut store, entries[0].id).is_err());

        let summary = ScheduleSummary::from_entries(&scheduler.active_schedule(&store, id).unwrap());
        assert_eq!(summary.years, 12);
        assert_abs_diff_eq!(summary.total_principal, 1200.0, epsilon = 1e-9);
        // 2% of 1200 + 1100 + ... + 100
        assert_abs_diff_eq!(summary.total_interest, 156.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.outstanding, 1100.0, epsilon = 1e-9);
    }
}
