//! Tariff parameters applied to a plant

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::store::{Lifecycle, Record, RecordId};

/// Pricing plan: energy rates, subvention brackets and price surcharges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub id: RecordId,

    pub name: String,

    /// Price per kWh of plant power consumed by the customer
    pub consumption_rate: f64,

    /// Internal credit per kWh of surplus production
    pub excess_production_rate: f64,

    /// Grid operator credit per kWh of surplus production
    pub excess_production_rate_external: f64,

    /// Subvention per kW for the first 10 kW of nominal power
    pub subvention_to_10kw: f64,

    /// Subvention per kW above 10 kW
    pub subvention_from_10kw: f64,

    /// Plant price per kWp
    pub kwp_price: f64,

    /// Extra price per kWp when the customer buys the plant outright
    pub kwp_price_surcharge_direct_buy: f64,

    /// Planning flat rate per kWp, clamped to [min, max]
    pub planning_flat_rate: f64,
    pub planning_flat_rate_min: f64,
    pub planning_flat_rate_max: f64,

    /// Service fee per kWp, clamped to [min, max]
    pub service_fee: f64,
    pub service_fee_min: f64,
    pub service_fee_max: f64,

    /// Direct buy disables amortization entirely
    pub direct_buy: bool,

    pub building_permit_costs: f64,

    #[serde(default)]
    pub status: Lifecycle,
}

impl RateTable {
    /// Check that every rate is a finite, non-negative number
    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("consumption_rate", self.consumption_rate),
            ("excess_production_rate", self.excess_production_rate),
            ("excess_production_rate_external", self.excess_production_rate_external),
            ("subvention_to_10kw", self.subvention_to_10kw),
            ("subvention_from_10kw", self.subvention_from_10kw),
            ("kwp_price", self.kwp_price),
            ("kwp_price_surcharge_direct_buy", self.kwp_price_surcharge_direct_buy),
            ("planning_flat_rate", self.planning_flat_rate),
            ("planning_flat_rate_min", self.planning_flat_rate_min),
            ("planning_flat_rate_max", self.planning_flat_rate_max),
            ("service_fee", self.service_fee),
            ("service_fee_min", self.service_fee_min),
            ("service_fee_max", self.service_fee_max),
            ("building_permit_costs", self.building_permit_costs),
        ];

        for (field, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::invalid(
                    format!("rate table {} {}", self.id, field),
                    format!("expected a non-negative number, got {}", value),
                ));
            }
        }
        Ok(())
    }

    /// Subvention rate above 10 kW, preferring a plant-level override
    pub fn subvention_from_10kw_for(&self, plant_override: Option<f64>) -> f64 {
        plant_override.unwrap_or(self.subvention_from_10kw)
    }

    /// Price per kWp including the direct buy surcharge where it applies
    pub fn effective_kwp_price(&self) -> f64 {
        if self.direct_buy {
            self.kwp_price + self.kwp_price_surcharge_direct_buy
        } else {
            self.kwp_price
        }
    }
}

impl Record for RateTable {
    const KIND: &'static str = "rate table";

    fn id(&self) -> RecordId {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_active(&self) -> bool {
        self.status == Lifecycle::Active
    }

    fn deactivate(&mut self) {
        self.status = Lifecycle::Deactivated;
    }
}
