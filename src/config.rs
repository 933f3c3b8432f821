//! Engine configuration loaded from JSON

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::forecast::ForecastConfig;
use crate::repayment::RepaymentConfig;

/// All tunable constants of the engine
///
/// Every field has a default, so a config file only needs the values it
/// changes:
///
/// ```json
/// { "forecast": { "zero_consumption": "reject" }, "repayment": { "reminder_surcharge": 7.5 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub forecast: ForecastConfig,
    pub repayment: RepaymentConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.forecast.validate()?;
        config.repayment.validate()?;
        Ok(config)
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
