//! Reminder escalation and payment confirmation for repayment logs

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::{BatchReport, ReminderEntry, RepaymentLogEntry, RepaymentProcessor};
use crate::collaborators::{notify, produce_document, DocumentRenderer, DocumentTemplate, MailKind, Notifier};
use crate::error::{EngineError, Result};
use crate::plant::recipient_for;
use crate::store::{Lifecycle, RecordId, Store};

/// Document name of a reminder, e.g. `reminder_8_2`
pub fn reminder_document_name(log_id: RecordId, reminder_nr: u32) -> String {
    format!("reminder_{}_{}", log_id, reminder_nr)
}

impl RepaymentProcessor {
    /// Amount of the next reminder after `reminders_sent` earlier ones
    pub fn reminder_amount(&self, base_amount: f64, reminders_sent: usize) -> f64 {
        base_amount + self.config.reminder_surcharge * reminders_sent as f64
    }

    /// Send the next reminder for one unpaid log
    pub fn send_reminder<S, R, N>(
        &self,
        store: &mut S,
        renderer: &mut R,
        notifier: &mut N,
        log_id: RecordId,
    ) -> Result<ReminderEntry>
    where
        S: Store,
        R: DocumentRenderer + ?Sized,
        N: Notifier + ?Sized,
    {
        self.config.validate()?;

        let mut log = store.require::<RepaymentLogEntry>(log_id)?;
        if log.payment_verified {
            return Err(EngineError::invalid(
                "payment_verified",
                format!("repayment log {} is already paid", log_id),
            ));
        }
        let recipient = recipient_for(store, log.plant_id)?;

        let sent = store.select::<ReminderEntry>(|reminder| reminder.repayment_log_id == log_id)?;
        let reminder_nr = sent.len() as u32 + 1;
        let amount = self.reminder_amount(log.amount, sent.len());
        let document_name = reminder_document_name(log_id, reminder_nr);

        let data_bag = serde_json::json!({
            "plant_id": log.plant_id,
            "repayment_period": log.repayment_period,
            "reminder_nr": reminder_nr,
            "base_amount": log.amount,
            "amount": amount,
            "repayment_document": log.document_name,
        });
        let document = produce_document(renderer, DocumentTemplate::Reminder, &data_bag, &document_name)?;

        let payload = serde_json::json!({
            "repayment_log_id": log_id,
            "reminder_nr": reminder_nr,
            "amount": amount,
            "document": document.display().to_string(),
        });
        notify(notifier, recipient, MailKind::PaymentReminder, &payload)?;

        let reminder = store.persist(ReminderEntry {
            id: 0,
            repayment_log_id: log_id,
            reminder_nr,
            amount,
            document_name,
            customer_mail_sent: true,
            created_at: Utc::now(),
            status: Lifecycle::Active,
        })?;
        log.has_reminders = true;
        store.persist(log)?;

        debug!("Reminder {} for log {} over {:.2}", reminder_nr, log_id, amount);
        Ok(reminder)
    }

    /// Remind every unpaid log whose last notice is old enough
    pub fn escalate_reminders<S, R, N>(&self, store: &mut S, renderer: &mut R, notifier: &mut N) -> Result<BatchReport>
    where
        S: Store,
        R: DocumentRenderer + ?Sized,
        N: Notifier + ?Sized,
    {
        self.escalate_reminders_except(store, renderer, notifier, &[])
    }

    /// Reminder sweep that leaves the given logs alone, e.g. those created in the same run
    pub fn escalate_reminders_except<S, R, N>(
        &self,
        store: &mut S,
        renderer: &mut R,
        notifier: &mut N,
        exclude: &[RecordId],
    ) -> Result<BatchReport>
    where
        S: Store,
        R: DocumentRenderer + ?Sized,
        N: Notifier + ?Sized,
    {
        self.config.validate()?;

        let now = Utc::now();
        let unpaid = store.select::<RepaymentLogEntry>(|log| !log.payment_verified && !exclude.contains(&log.id))?;
        info!("Reminder sweep over {} unpaid repayment logs", unpaid.len());

        let mut report = BatchReport::default();
        for log in unpaid {
            if !self.reminder_due(store, &log, now)? {
                report.skipped.push(log.id);
                continue;
            }
            match self.send_reminder(store, renderer, notifier, log.id) {
                Ok(_) => report.succeeded.push(log.id),
                Err(e) => report.record_failure(log.id, e),
            }
        }

        info!(
            "Reminder sweep done: {} sent, {} not due, {} failed",
            report.succeeded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn reminder_due<S: Store>(&self, store: &S, log: &RepaymentLogEntry, now: DateTime<Utc>) -> Result<bool> {
        if self.config.reminder_interval_days == 0 {
            return Ok(true);
        }
        let last_notice = store
            .select::<ReminderEntry>(|reminder| reminder.repayment_log_id == log.id)?
            .iter()
            .map(|reminder| reminder.created_at)
            .fold(log.datum_generated, |latest, created| latest.max(created));

        Ok(now - last_notice >= self.config.reminder_interval()?)
    }

    /// Mark a log as paid with the bank's transaction reference
    pub fn confirm_payment<S: Store>(
        &self,
        store: &mut S,
        log_id: RecordId,
        transaction_reference: Option<String>,
    ) -> Result<RepaymentLogEntry> {
        let mut log = store.require::<RepaymentLogEntry>(log_id)?;
        if log.payment_verified {
            return Err(EngineError::invalid(
                "payment_verified",
                format!("repayment log {} is already paid", log_id),
            ));
        }

        log.payment_verified = true;
        log.datum_paid = Some(Utc::now());
        log.transaction_reference = transaction_reference;
        let log = store.persist(log)?;

        info!("Payment for repayment log {} confirmed", log_id);
        Ok(log)
    }

    /// Confirm every unpaid log of a plant for one period
    pub fn confirm_payments_for<S: Store>(
        &self,
        store: &mut S,
        plant_id: RecordId,
        repayment_period: &str,
        transaction_reference: Option<&str>,
    ) -> Result<Vec<RepaymentLogEntry>> {
        let unpaid = store.select::<RepaymentLogEntry>(|log| {
            log.plant_id == plant_id && log.repayment_period == repayment_period && !log.payment_verified
        })?;

        unpaid
            .into_iter()
            .map(|log| self.confirm_payment(store, log.id, transaction_reference.map(str::to_string)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::testing::{MemoryRenderer, RecordingNotifier};
    use crate::repayment::fixtures::{period, seeded_store};
    use crate::repayment::RepaymentConfig;
    use crate::store::MemoryStore;
    use approx::assert_abs_diff_eq;
    use chrono::Duration;

    fn processed(processor: &RepaymentProcessor) -> MemoryStore {
        let mut store = seeded_store();
        processor
            .process_pending(&mut store, &mut MemoryRenderer::default(), &mut RecordingNotifier::default())
            .unwrap();
        store
    }

    fn sweep(processor: &RepaymentProcessor, store: &mut MemoryStore) -> BatchReport {
        processor
            .escalate_reminders(store, &mut MemoryRenderer::default(), &mut RecordingNotifier::default())
            .unwrap()
    }

    #[test]
    fn test_reminder_amounts_escalate() {
        let processor = RepaymentProcessor::default();
        let mut store = processed(&processor);

        for _ in 0..3 {
            assert_eq!(sweep(&processor, &mut store).succeeded, vec![1]);
        }

        let mut reminders = store.select::<ReminderEntry>(|r| r.repayment_log_id == 1).unwrap();
        reminders.sort_by_key(|r| r.reminder_nr);

        assert_eq!(reminders.iter().map(|r| r.reminder_nr).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_abs_diff_eq!(reminders[0].amount, 430.0, epsilon = 1e-9);
        assert_abs_diff_eq!(reminders[1].amount, 435.0, epsilon = 1e-9);
        assert_abs_diff_eq!(reminders[2].amount, 440.0, epsilon = 1e-9);
        for pair in reminders.windows(2) {
            assert!(pair[1].amount >= pair[0].amount);
        }
        assert_eq!(reminders[2].document_name, "reminder_1_3");
        assert!(store.require::<RepaymentLogEntry>(1).unwrap().has_reminders);
    }

    #[test]
    fn test_paid_logs_are_not_reminded() {
        let processor = RepaymentProcessor::default();
        let mut store = processed(&processor);
        processor.confirm_payment(&mut store, 1, None).unwrap();

        let report = sweep(&processor, &mut store);
        assert_eq!(report.total(), 0);
        assert!(store.reminders.is_empty());
    }

    #[test]
    fn test_rejected_reminder_is_not_stored() {
        let processor = RepaymentProcessor::default();
        let mut store = processed(&processor);
        let mut notifier = RecordingNotifier { reject: true, ..Default::default() };

        let report = processor
            .escalate_reminders(&mut store, &mut MemoryRenderer::default(), &mut notifier)
            .unwrap();

        assert_eq!(report.retryable(), vec![1]);
        assert!(store.reminders.is_empty());
        assert!(!store.require::<RepaymentLogEntry>(1).unwrap().has_reminders);
    }

    #[test]
    fn test_interval_skips_recent_notices() {
        let processor = RepaymentProcessor::new(RepaymentConfig {
            reminder_interval_days: 7,
            ..Default::default()
        });
        let mut store = processed(&processor);

        // Repayment notice went out just now
        assert_eq!(sweep(&processor, &mut store).skipped, vec![1]);

        let mut log = store.require::<RepaymentLogEntry>(1).unwrap();
        log.datum_generated = Utc::now() - Duration::days(10);
        store.persist(log).unwrap();
        assert_eq!(sweep(&processor, &mut store).succeeded, vec![1]);

        // The fresh reminder resets the clock
        assert_eq!(sweep(&processor, &mut store).skipped, vec![1]);
    }

    #[test]
    fn test_excluded_logs_are_not_reminded() {
        let processor = RepaymentProcessor::default();
        let mut store = processed(&processor);

        let report = processor
            .escalate_reminders_except(&mut store, &mut MemoryRenderer::default(), &mut RecordingNotifier::default(), &[1])
            .unwrap();
        assert_eq!(report.total(), 0);
        assert!(store.reminders.is_empty());
    }

    #[test]
    fn test_out_of_range_interval_is_an_error() {
        let processor = RepaymentProcessor::new(RepaymentConfig {
            reminder_interval_days: i64::MAX,
            ..Default::default()
        });
        let mut store = seeded_store();
        RepaymentProcessor::default()
            .process_pending(&mut store, &mut MemoryRenderer::default(), &mut RecordingNotifier::default())
            .unwrap();

        let err = processor
            .escalate_reminders(&mut store, &mut MemoryRenderer::default(), &mut RecordingNotifier::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailure { field, .. } if field == "reminder_interval_days"));
        assert!(store.reminders.is_empty());
    }

    #[test]
    fn test_confirm_payment() {
        let processor = RepaymentProcessor::default();
        let mut store = processed(&processor);

        let log = processor.confirm_payment(&mut store, 1, Some("TX-77".to_string())).unwrap();
        assert!(log.payment_verified);
        assert!(log.datum_paid.is_some());
        assert_eq!(log.transaction_reference.as_deref(), Some("TX-77"));

        let err = processor.confirm_payment(&mut store, 1, None).unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailure { .. }));
    }

    #[test]
    fn test_confirm_payments_for_plant_and_period() {
        let mut store = seeded_store();
        store.persist(period(1, "2024/2")).unwrap();
        let processor = RepaymentProcessor::default();
        processor
            .process_pending(&mut store, &mut MemoryRenderer::default(), &mut RecordingNotifier::default())
            .unwrap();

        let confirmed = processor
            .confirm_payments_for(&mut store, 1, "2024/2", Some("BATCH-9"))
            .unwrap();

        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].repayment_period, "2024/2");
        let open = store.select::<RepaymentLogEntry>(|log| !log.payment_verified).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].repayment_period, "2024/1");
    }
}
