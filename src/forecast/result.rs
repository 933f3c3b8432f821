//! Forecast output structures

use serde::{Deserialize, Serialize};

use super::CalculationVariant;
use crate::error::Result;
use crate::store::RecordId;

/// Consumption split of one meter between plant and grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterSplit {
    /// Meter number (1 or 2)
    pub meter: u8,

    /// Measured annual consumption from the bill in kWh
    pub measured: f64,

    /// Part of the forecast served by the plant in kWh
    pub forecast: f64,

    /// Consumption left for the grid (measured - forecast) in kWh
    pub excess: f64,

    /// Price per kWh derived from the bill
    pub coefficient: f64,

    /// Monetary value of the excess after flooring
    pub value: f64,
}

/// Full cost, subsidy and duration breakdown for a plant
///
/// Every intermediate is kept so the forecast document can show each line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub plant_id: RecordId,
    pub variant: CalculationVariant,

    // Energy
    pub nominal_power: f64,
    pub production_forecast: f64,
    pub consumption_forecast_total: f64,
    pub surplus_power: f64,
    pub meter1: MeterSplit,
    pub meter2: MeterSplit,

    // Internal (plant) side
    pub pv_cost_to_solar: f64,
    pub pv_surplus_solar: f64,
    pub internal_total: f64,

    // External (grid) side
    pub credit_prediction: f64,
    pub external_consumption_value: f64,
    pub external_total: f64,

    // Expenditure
    pub total_expenditure: f64,
    pub expenditure_with_plant: f64,
    pub annual_saving: f64,

    // Subsidy
    pub subvention: f64,
    pub max_pre_payment: f64,

    // Financing
    pub unit_price: f64,
    pub pre_payment: f64,
    pub pre_payment_min: f64,
    pub pre_payment_max: f64,
    pub unit_price_min_prepayment: f64,
    pub unit_price_max_prepayment: f64,
    pub financed_amount: f64,
    pub duration: f64,
    pub open_balance: f64,
    pub direct_buy: bool,

    /// Active extras including VAT, outside the financing
    pub extras_total: f64,
}

/// Compact projection shown before a customer commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPreview {
    pub unit_price: f64,
    pub subvention: f64,
    pub pre_payment_min: f64,
    pub pre_payment_max: f64,
    pub duration: f64,
    pub open_balance: f64,
    pub direct_buy: bool,
}

impl ForecastResult {
    pub fn preview(&self) -> ForecastPreview {
        ForecastPreview {
            unit_price: self.unit_price,
            subvention: self.subvention,
            pre_payment_min: self.pre_payment_min,
            pre_payment_max: self.pre_payment_max,
            duration: self.duration,
            open_balance: self.open_balance,
            direct_buy: self.direct_buy,
        }
    }

    /// Data bag handed to the document renderer
    pub fn data_bag(&self) -> Result<serde_json::Value> {
        let mut bag = serde_json::to_value(self)?;
        if let Some(map) = bag.as_object_mut() {
            map.insert("variant_label".to_string(), self.variant.label().into());
            map.insert("preview".to_string(), serde_json::to_value(self.preview())?);
        }
        Ok(bag)
    }
}
