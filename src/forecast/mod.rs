//! Cost, subsidy and duration forecast for a plant

mod variant;
mod calculator;
mod result;
mod price;
mod service;

pub use variant::{CalculationVariant, VariantRules};
pub use calculator::{ForecastCalculator, ForecastConfig, NormalizedInputs, ZeroConsumptionPolicy};
pub use result::{ForecastPreview, ForecastResult, MeterSplit};
pub use price::PriceEstimate;
pub use service::{ForecastService, PlantForecast};
