//! Load rate tables from CSV

use csv::Reader;
use std::path::Path;

use super::RateTable;
use crate::error::{EngineError, Result};
use crate::store::{Lifecycle, RecordId};

/// Raw CSV row matching the tariff export columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "id")]
    id: RecordId,
    #[serde(rename = "name")]
    name: String,
    #[serde(rename = "consumptionRate")]
    consumption_rate: f64,
    #[serde(rename = "excessProductionRate")]
    excess_production_rate: f64,
    #[serde(rename = "excessProductionRateExternal")]
    excess_production_rate_external: f64,
    #[serde(rename = "subventionTo10kW")]
    subvention_to_10kw: f64,
    #[serde(rename = "subventionFrom10kW")]
    subvention_from_10kw: f64,
    #[serde(rename = "kWpPrice", default)]
    kwp_price: Option<f64>,
    #[serde(rename = "kWpPriceSurchargeDirectBuy", default)]
    kwp_price_surcharge_direct_buy: Option<f64>,
    #[serde(rename = "planningFlatRate", default)]
    planning_flat_rate: Option<f64>,
    #[serde(rename = "planningFlatRateMin", default)]
    planning_flat_rate_min: Option<f64>,
    #[serde(rename = "planningFlatRateMax", default)]
    planning_flat_rate_max: Option<f64>,
    #[serde(rename = "serviceFee", default)]
    service_fee: Option<f64>,
    #[serde(rename = "serviceFeeMin", default)]
    service_fee_min: Option<f64>,
    #[serde(rename = "serviceFeeMax", default)]
    service_fee_max: Option<f64>,
    #[serde(rename = "directBuy", default)]
    direct_buy: Option<String>,
    #[serde(rename = "buildingPermitCosts", default)]
    building_permit_costs: Option<f64>,
}

impl CsvRow {
    fn to_rate_table(self) -> Result<RateTable> {
        let direct_buy = match self.direct_buy.as_deref() {
            Some(flag) => parse_flag("directBuy", flag)?,
            None => false,
        };

        let table = RateTable {
            id: self.id,
            name: self.name,
            consumption_rate: self.consumption_rate,
            excess_production_rate: self.excess_production_rate,
            excess_production_rate_external: self.excess_production_rate_external,
            subvention_to_10kw: self.subvention_to_10kw,
            subvention_from_10kw: self.subvention_from_10kw,
            kwp_price: self.kwp_price.unwrap_or(0.0),
            kwp_price_surcharge_direct_buy: self.kwp_price_surcharge_direct_buy.unwrap_or(0.0),
            planning_flat_rate: self.planning_flat_rate.unwrap_or(0.0),
            planning_flat_rate_min: self.planning_flat_rate_min.unwrap_or(0.0),
            planning_flat_rate_max: self.planning_flat_rate_max.unwrap_or(0.0),
            service_fee: self.service_fee.unwrap_or(0.0),
            service_fee_min: self.service_fee_min.unwrap_or(0.0),
            service_fee_max: self.service_fee_max.unwrap_or(0.0),
            direct_buy,
            building_permit_costs: self.building_permit_costs.unwrap_or(0.0),
            status: Lifecycle::Active,
        };
        table.validate()?;
        Ok(table)
    }
}

/// Parse the boolean spellings found in exported spreadsheets
pub(crate) fn parse_flag(column: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "n" => Ok(false),
        "1" | "true" | "yes" | "y" => Ok(true),
        other => Err(EngineError::invalid(column, format!("unknown flag value: {}", other))),
    }
}

/// Load all rate tables from a CSV file
pub fn load_rate_tables<P: AsRef<Path>>(path: P) -> Result<Vec<RateTable>> {
    let reader = Reader::from_path(path)?;
    collect_rows(reader)
}

/// Load rate tables from any reader (e.g., string buffer, upload stream)
pub fn load_rate_tables_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<RateTable>> {
    collect_rows(Reader::from_reader(reader))
}

fn collect_rows<R: std::io::Read>(mut reader: Reader<R>) -> Result<Vec<RateTable>> {
    let mut tables = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        tables.push(row.to_rate_table()?);
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARIFFS: &str = "\
id,name,consumptionRate,excessProductionRate,excessProductionRateExternal,subventionTo10kW,subventionFrom10kW,kWpPrice,directBuy
1,Standard,0.12,0.06,0.04,250,200,1450,0
2,Direct,0.12,0.06,0.04,250,200,1450,yes
";

    #[test]
    fn test_load_rate_tables() {
        let tables = load_rate_tables_from_reader(TARIFFS.as_bytes()).expect("Failed to load tariffs");
        assert_eq!(tables.len(), 2);

        let standard = &tables[0];
        assert_eq!(standard.id, 1);
        assert_eq!(standard.consumption_rate, 0.12);
        assert_eq!(standard.kwp_price, 1450.0);
        assert_eq!(standard.service_fee, 0.0);
        assert!(!standard.direct_buy);

        assert!(tables[1].direct_buy);
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        let csv = "\
id,name,consumptionRate,excessProductionRate,excessProductionRateExternal,subventionTo10kW,subventionFrom10kW,directBuy
1,Odd,0.1,0.05,0.03,200,150,maybe
";
        assert!(load_rate_tables_from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_negative_rate_is_rejected() {
        let csv = "\
id,name,consumptionRate,excessProductionRate,excessProductionRateExternal,subventionTo10kW,subventionFrom10kW
1,Broken,-0.1,0.05,0.03,200,150
";
        let err = load_rate_tables_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailure { .. }));
    }
}
