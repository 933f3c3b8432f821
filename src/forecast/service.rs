//! Store-backed forecast operations: single plant, batch recompute, delivery

use log::{info, warn};
use std::path::PathBuf;

use super::{ForecastCalculator, ForecastResult, PriceEstimate};
use crate::collaborators::{notify, produce_document, DocumentRenderer, DocumentTemplate, MailKind, Notifier};
use crate::error::{EngineError, Result};
use crate::plant::{recipient_for, Extra, Plant, PowerBill};
use crate::store::{RecordId, Store};
use crate::tariff::RateTable;

/// Outcome of one plant in a batch recompute
pub type PlantForecast = (RecordId, Result<ForecastResult>);

/// Runs forecasts against a record store
///
/// # Example
/// ```ignore
/// let service = ForecastService::new(ForecastCalculator::default());
/// let result = service.forecast_for_plant(&store, plant_id)?;
/// println!("duration {:.2} years", result.duration);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ForecastService {
    calculator: ForecastCalculator,
}

impl ForecastService {
    pub fn new(calculator: ForecastCalculator) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &ForecastCalculator {
        &self.calculator
    }

    /// Load a plant's tariff, latest bill and active extras, then compute
    pub fn forecast_for_plant<S: Store>(&self, store: &S, plant_id: RecordId) -> Result<ForecastResult> {
        let plant = store.require::<Plant>(plant_id)?;
        let rate_table = self.rate_table_for(store, &plant)?;
        let bill = store.select::<PowerBill>(|bill| bill.plant_id == plant_id)?.pop();
        let extras = store.select::<Extra>(|extra| extra.plant_id == plant_id && extra.active)?;

        self.calculator
            .compute_forecast(Some(&plant), rate_table.as_ref(), bill.as_ref(), &extras)
    }

    /// Recompute every plant in store order; failures are logged and kept
    pub fn recompute_all<S: Store>(&self, store: &S) -> Result<Vec<PlantForecast>> {
        let plants = store.select::<Plant>(|_| true)?;
        info!("Recomputing forecasts for {} plants", plants.len());

        let outcomes: Vec<PlantForecast> = plants
            .iter()
            .map(|plant| {
                let outcome = self.forecast_for_plant(store, plant.id);
                if let Err(e) = &outcome {
                    warn!("Forecast for plant {} failed: {}", plant.id, e);
                }
                (plant.id, outcome)
            })
            .collect();

        let failed = outcomes.iter().filter(|(_, outcome)| outcome.is_err()).count();
        info!("Forecast recompute done: {} ok, {} failed", outcomes.len() - failed, failed);
        Ok(outcomes)
    }

    /// Render the forecast document and mail it to the plant's customer
    pub fn deliver_forecast<S, R, N>(
        &self,
        store: &S,
        renderer: &mut R,
        notifier: &mut N,
        plant_id: RecordId,
    ) -> Result<PathBuf>
    where
        S: Store,
        R: DocumentRenderer + ?Sized,
        N: Notifier + ?Sized,
    {
        let result = self.forecast_for_plant(store, plant_id)?;
        let recipient = recipient_for(store, plant_id)?;

        let document_name = format!("forecast_{}", plant_id);
        let document = produce_document(renderer, DocumentTemplate::Forecast, &result.data_bag()?, &document_name)?;

        let payload = serde_json::json!({
            "plant_id": plant_id,
            "document": document.display().to_string(),
            "preview": result.preview(),
        });
        notify(notifier, recipient, MailKind::ForecastDelivery, &payload)?;

        info!("Forecast for plant {} delivered to user {}", plant_id, recipient);
        Ok(document)
    }

    /// Suggested unit price for a stored plant
    pub fn estimate_price<S: Store>(&self, store: &S, plant_id: RecordId) -> Result<PriceEstimate> {
        let plant = store.require::<Plant>(plant_id)?;
        let rate_table = self
            .rate_table_for(store, &plant)?
            .ok_or_else(|| EngineError::missing("rate table", format!("for plant {}", plant_id)))?;
        PriceEstimate::estimate(&plant, &rate_table)
    }

    fn rate_table_for<S: Store>(&self, store: &S, plant: &Plant) -> Result<Option<RateTable>> {
        match plant.rate_table_id {
            Some(id) => store.find::<RateTable>(id),
            None => Ok(None),
        }
    }
}
