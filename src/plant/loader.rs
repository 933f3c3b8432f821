//! Load plants, power bills, extras and project users from CSV

use csv::Reader;
use serde::de::DeserializeOwned;
use std::path::Path;

use super::{Extra, Plant, PlantStatus, PowerBill, ProjectUser};
use crate::error::{EngineError, Result};
use crate::store::{Lifecycle, RecordId};
use crate::tariff::loader::parse_flag;

/// Raw CSV row matching the plant export columns
#[derive(Debug, serde::Deserialize)]
struct PlantRow {
    #[serde(rename = "id")]
    id: RecordId,
    #[serde(rename = "name")]
    name: String,
    #[serde(rename = "tariffId", default)]
    rate_table_id: Option<RecordId>,
    #[serde(rename = "nominalPower", default)]
    nominal_power: Option<f64>,
    #[serde(rename = "powerProductionForecast", default)]
    power_production_forecast: Option<f64>,
    #[serde(rename = "powerConsumptionForecast", default)]
    power_consumption_forecast: Option<f64>,
    #[serde(rename = "powerConsumptionForecastMeter2", default)]
    power_consumption_forecast_meter2: Option<f64>,
    #[serde(rename = "joinPowerMeters", default)]
    join_power_meters: Option<String>,
    #[serde(rename = "communityPlant", default)]
    community_plant: Option<String>,
    #[serde(rename = "unitPrice", default)]
    unit_price: Option<f64>,
    #[serde(rename = "prePayment", default)]
    pre_payment: Option<f64>,
    #[serde(rename = "prePaymentMin", default)]
    pre_payment_min: Option<f64>,
    #[serde(rename = "prePaymentMax", default)]
    pre_payment_max: Option<f64>,
    #[serde(rename = "unitPriceMinPrepayment", default)]
    unit_price_min_prepayment: Option<f64>,
    #[serde(rename = "unitPriceMaxPrepayment", default)]
    unit_price_max_prepayment: Option<f64>,
    #[serde(rename = "additionalCost", default)]
    additional_cost: Option<f64>,
    #[serde(rename = "subventionFrom10kW", default)]
    subvention_from_10kw: Option<f64>,
    #[serde(rename = "status", default)]
    status: Option<u8>,
}

impl PlantRow {
    fn to_plant(self) -> Result<Plant> {
        let status = match self.status {
            None | Some(0) => PlantStatus::Pending,
            Some(1) => PlantStatus::Active,
            Some(99) => PlantStatus::Deactivated,
            Some(other) => {
                return Err(EngineError::invalid("status", format!("unknown plant status code: {}", other)))
            }
        };

        Ok(Plant {
            id: self.id,
            name: self.name,
            rate_table_id: self.rate_table_id,
            nominal_power: self.nominal_power,
            power_production_forecast: self.power_production_forecast,
            power_consumption_forecast: self.power_consumption_forecast,
            power_consumption_forecast_meter2: self.power_consumption_forecast_meter2,
            join_power_meters: optional_flag("joinPowerMeters", self.join_power_meters)?,
            community_plant: optional_flag("communityPlant", self.community_plant)?,
            unit_price: self.unit_price,
            pre_payment: self.pre_payment,
            pre_payment_min: self.pre_payment_min,
            pre_payment_max: self.pre_payment_max,
            unit_price_min_prepayment: self.unit_price_min_prepayment,
            unit_price_max_prepayment: self.unit_price_max_prepayment,
            additional_cost: self.additional_cost,
            subvention_from_10kw: self.subvention_from_10kw,
            status,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct PowerBillRow {
    #[serde(rename = "id")]
    id: RecordId,
    #[serde(rename = "plantId")]
    plant_id: RecordId,
    #[serde(rename = "consumption", default)]
    consumption: Option<f64>,
    #[serde(rename = "consumptionValue", default)]
    consumption_value: Option<f64>,
    #[serde(rename = "consumption2", default)]
    consumption2: Option<f64>,
    #[serde(rename = "consumptionValue2", default)]
    consumption_value2: Option<f64>,
}

#[derive(Debug, serde::Deserialize)]
struct ExtraRow {
    #[serde(rename = "id")]
    id: RecordId,
    #[serde(rename = "plantId")]
    plant_id: RecordId,
    #[serde(rename = "name")]
    name: String,
    #[serde(rename = "price")]
    price: f64,
    #[serde(rename = "active", default)]
    active: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ProjectUserRow {
    #[serde(rename = "id")]
    id: RecordId,
    #[serde(rename = "plantId")]
    plant_id: RecordId,
    #[serde(rename = "userId")]
    user_id: RecordId,
}

fn optional_flag(column: &str, raw: Option<String>) -> Result<Option<bool>> {
    raw.map(|value| parse_flag(column, &value)).transpose()
}

fn read_rows<T: DeserializeOwned, R: std::io::Read>(reader: R) -> Result<Vec<T>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut rows = Vec::new();
    for result in csv_reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Load plants from any reader
pub fn load_plants_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<Plant>> {
    read_rows::<PlantRow, _>(reader)?
        .into_iter()
        .map(PlantRow::to_plant)
        .collect()
}

/// Load all plants from a CSV file
pub fn load_plants<P: AsRef<Path>>(path: P) -> Result<Vec<Plant>> {
    load_plants_from_reader(std::fs::File::open(path)?)
}

pub fn load_power_bills_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<PowerBill>> {
    Ok(read_rows::<PowerBillRow, _>(reader)?
        .into_iter()
        .map(|row| PowerBill {
            id: row.id,
            plant_id: row.plant_id,
            consumption: row.consumption,
            consumption_value: row.consumption_value,
            consumption2: row.consumption2,
            consumption_value2: row.consumption_value2,
            status: Lifecycle::Active,
        })
        .collect())
}

pub fn load_power_bills<P: AsRef<Path>>(path: P) -> Result<Vec<PowerBill>> {
    load_power_bills_from_reader(std::fs::File::open(path)?)
}

pub fn load_extras_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<Extra>> {
    read_rows::<ExtraRow, _>(reader)?
        .into_iter()
        .map(|row| {
            Ok(Extra {
                id: row.id,
                plant_id: row.plant_id,
                name: row.name,
                price: row.price,
                active: optional_flag("active", row.active)?.unwrap_or(true),
                status: Lifecycle::Active,
            })
        })
        .collect()
}

pub fn load_extras<P: AsRef<Path>>(path: P) -> Result<Vec<Extra>> {
    load_extras_from_reader(std::fs::File::open(path)?)
}

pub fn load_project_users_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<ProjectUser>> {
    Ok(read_rows::<ProjectUserRow, _>(reader)?
        .into_iter()
        .map(|row| ProjectUser {
            id: row.id,
            plant_id: row.plant_id,
            user_id: row.user_id,
            status: Lifecycle::Active,
        })
        .collect())
}

pub fn load_project_users<P: AsRef<Path>>(path: P) -> Result<Vec<ProjectUser>> {
    load_project_users_from_reader(std::fs::File::open(path)?)
}
