//! Plant, meter reading and customer link records

use serde::{Deserialize, Serialize};

use crate::store::{Lifecycle, Record, RecordId, DEACTIVATED_CODE};

/// Project stage of a plant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlantStatus {
    /// Being planned, forecasts only
    #[default]
    Pending,
    /// Built and financed
    Active,
    Deactivated,
}

impl PlantStatus {
    pub fn code(&self) -> u8 {
        match self {
            PlantStatus::Pending => 0,
            PlantStatus::Active => 1,
            PlantStatus::Deactivated => DEACTIVATED_CODE,
        }
    }
}

/// A solar plant project
///
/// Optional fields mirror what operators fill in as the project progresses;
/// the forecast normalizes them in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    pub id: RecordId,

    pub name: String,

    #[serde(default)]
    pub rate_table_id: Option<RecordId>,

    /// Rated capacity in kW
    #[serde(default)]
    pub nominal_power: Option<f64>,

    /// Forecasted production in kWh/year
    #[serde(default)]
    pub power_production_forecast: Option<f64>,

    /// Forecasted consumption on meter 1 in kWh/year
    #[serde(default)]
    pub power_consumption_forecast: Option<f64>,

    /// Forecasted consumption on meter 2 in kWh/year
    #[serde(default)]
    pub power_consumption_forecast_meter2: Option<f64>,

    #[serde(default)]
    pub join_power_meters: Option<bool>,

    #[serde(default)]
    pub community_plant: Option<bool>,

    #[serde(default)]
    pub unit_price: Option<f64>,

    #[serde(default)]
    pub pre_payment: Option<f64>,

    #[serde(default)]
    pub pre_payment_min: Option<f64>,

    #[serde(default)]
    pub pre_payment_max: Option<f64>,

    /// Unit price offered when the customer pays the minimum prepayment
    #[serde(default)]
    pub unit_price_min_prepayment: Option<f64>,

    /// Unit price offered when the customer pays the maximum prepayment
    #[serde(default)]
    pub unit_price_max_prepayment: Option<f64>,

    #[serde(default)]
    pub additional_cost: Option<f64>,

    /// Overrides the tariff's subvention rate above 10 kW
    #[serde(default)]
    pub subvention_from_10kw: Option<f64>,

    #[serde(default)]
    pub status: PlantStatus,
}

impl Record for Plant {
    const KIND: &'static str = "plant";

    fn id(&self) -> RecordId {
        self.id
    }

    fn assign_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn is_active(&self) -> bool {
        self.status != PlantStatus::Deactivated
    }

    fn deactivate(&mut self) {
        self.status = PlantStatus::Deactivated;
    }
}

/// Annual electricity bill of the customer, up to two meters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerBill {
    pub id: RecordId,

    pub plant_id: RecordId,

    /// Measured consumption on meter 1 in kWh
    #[serde(default)]
    pub consumption: Option<f64>,

    /// Billed amount for meter 1
    #[serde(default)]
    pub consumption_value: Option<f64>,

    #[serde(default)]
    pub consumption2: Option<f64>,

    #[serde(default)]
    pub consumption_value2: Option<f64>,

    #[serde(default)]
    pub status: Lifecycle,
}

impl Record for PowerBill {
    const KIND: &'static str = "power bill";

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

/// Optional add-on booked for a plant (battery, wallbox, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extra {
    pub id: RecordId,

    pub plant_id: RecordId,

    pub name: String,

    /// Net price, VAT is added by the forecast
    pub price: f64,

    /// Whether the customer selected this extra
    pub active: bool,

    #[serde(default)]
    pub status: Lifecycle,
}

impl Record for Extra {
    const KIND: &'static str = "extra";

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

/// Customer account attached to a plant; receives documents and mails
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUser {
    pub id: RecordId,

    pub plant_id: RecordId,

    pub user_id: RecordId,

    #[serde(default)]
    pub status: Lifecycle,
}

impl Record for ProjectUser {
    const KIND: &'static str = "project user";

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PlantStatus::Pending.code(), 0);
        assert_eq!(PlantStatus::Active.code(), 1);
        assert_eq!(PlantStatus::Deactivated.code(), 99);
        assert_eq!(Lifecycle::Deactivated.code(), 99);
    }

    #[test]
    fn test_pending_plant_is_visible() {
        let mut plant = Plant::default();
        assert!(plant.is_active());

        plant.deactivate();
        assert!(!plant.is_active());
    }

    #[test]
    fn test_plant_from_sparse_json() {
        let plant: Plant = serde_json::from_str(r#"{"id": 3, "name": "Roof"}"#).unwrap();
        assert_eq!(plant.id, 3);
        assert_eq!(plant.unit_price, None);
        assert_eq!(plant.status, PlantStatus::Pending);
    }
}
