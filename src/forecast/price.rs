//! Suggested unit price from the tariff's price components

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::plant::Plant;
use crate::tariff::RateTable;

/// Price components of a plant before any prepayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub nominal_power: f64,
    /// kWp price including the direct buy surcharge where it applies
    pub kwp_price: f64,
    pub plant_price: f64,
    pub planning_fee: f64,
    pub service_fee: f64,
    pub building_permit_costs: f64,
    pub additional_cost: f64,
    pub total: f64,
}

impl PriceEstimate {
    pub fn estimate(plant: &Plant, rate_table: &RateTable) -> Result<Self> {
        rate_table.validate()?;

        let nominal_power = plant.nominal_power.unwrap_or(0.0);
        let additional_cost = plant.additional_cost.unwrap_or(0.0);
        if !nominal_power.is_finite() || nominal_power < 0.0 {
            return Err(EngineError::invalid("nominal_power", format!("got {}", nominal_power)));
        }

        let kwp_price = rate_table.effective_kwp_price();
        let plant_price = nominal_power * kwp_price;
        let planning_fee = clamp_fee(
            rate_table.planning_flat_rate * nominal_power,
            rate_table.planning_flat_rate_min,
            rate_table.planning_flat_rate_max,
        );
        let service_fee = clamp_fee(
            rate_table.service_fee * nominal_power,
            rate_table.service_fee_min,
            rate_table.service_fee_max,
        );

        Ok(Self {
            nominal_power,
            kwp_price,
            plant_price,
            planning_fee,
            service_fee,
            building_permit_costs: rate_table.building_permit_costs,
            additional_cost,
            total: plant_price + planning_fee + service_fee + rate_table.building_permit_costs + additional_cost,
        })
    }
}

/// Clamp a fee into [min, max]; a zero max means no upper bound
fn clamp_fee(raw: f64, min: f64, max: f64) -> f64 {
    let floored = raw.max(min);
    if max > 0.0 {
        floored.min(max)
    } else {
        floored
    }
}
