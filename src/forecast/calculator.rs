//! Forecast calculation for a single plant
//!
//! One computation covers all four calculation variants; the variant only
//! switches which meter-2 terms apply (see [`VariantRules`]).

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::result::{ForecastResult, MeterSplit};
use super::{CalculationVariant, VariantRules};
use crate::error::{EngineError, Result};
use crate::plant::{Extra, Plant, PowerBill};
use crate::store::{Record, RecordId};
use crate::tariff::RateTable;

/// What to do with a meter whose bill has a value but zero consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroConsumptionPolicy {
    /// Treat the meter's price coefficient as zero and log a warning
    #[default]
    Guard,
    /// Fail the forecast with `ArithmeticAmbiguity`
    Reject,
}

/// Constants of the forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Maximum amortization duration in years
    pub duration_cap_years: f64,

    /// Gross-up applied to extras
    pub vat_factor: f64,

    /// Share of the price the subvention may cover (drives max prepayment)
    pub subvention_share: f64,

    /// Prepayment amounts are rounded to this step
    pub pre_payment_step: f64,

    /// Nominal power covered by the lower subvention bracket, in kW
    pub subvention_threshold_kw: f64,

    pub zero_consumption: ZeroConsumptionPolicy,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            duration_cap_years: 12.5,
            vat_factor: 1.2,
            subvention_share: 0.35,
            pre_payment_step: 50.0,
            subvention_threshold_kw: 10.0,
            zero_consumption: ZeroConsumptionPolicy::Guard,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("duration_cap_years", self.duration_cap_years),
            ("subvention_share", self.subvention_share),
            ("pre_payment_step", self.pre_payment_step),
            ("subvention_threshold_kw", self.subvention_threshold_kw),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::invalid(field, format!("must be positive, got {}", value)));
            }
        }
        if !self.vat_factor.is_finite() || self.vat_factor < 1.0 {
            return Err(EngineError::invalid(
                "vat_factor",
                format!("must be at least 1, got {}", self.vat_factor),
            ));
        }
        Ok(())
    }
}

/// Plant and bill fields with every missing value defaulted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedInputs {
    pub nominal_power: f64,
    pub production_forecast: f64,
    pub consumption_forecast: f64,
    pub consumption_forecast_meter2: f64,
    pub join_power_meters: bool,
    pub community_plant: bool,
    pub unit_price: f64,
    pub pre_payment: f64,
    pub pre_payment_min: f64,
    pub pre_payment_max: f64,
    pub unit_price_min_prepayment: f64,
    pub unit_price_max_prepayment: f64,
    pub additional_cost: f64,
    /// Kept optional: absence means "use the tariff's rate"
    pub subvention_from_10kw_override: Option<f64>,
    pub consumption: f64,
    pub consumption_value: f64,
    pub consumption2: f64,
    pub consumption_value2: f64,
}

impl NormalizedInputs {
    pub fn new(plant: &Plant, bill: &PowerBill) -> Self {
        let unit_price = plant.unit_price.unwrap_or(0.0);
        Self {
            nominal_power: plant.nominal_power.unwrap_or(0.0),
            production_forecast: plant.power_production_forecast.unwrap_or(0.0),
            consumption_forecast: plant.power_consumption_forecast.unwrap_or(0.0),
            consumption_forecast_meter2: plant.power_consumption_forecast_meter2.unwrap_or(0.0),
            join_power_meters: plant.join_power_meters.unwrap_or(false),
            community_plant: plant.community_plant.unwrap_or(false),
            unit_price,
            pre_payment: plant.pre_payment.unwrap_or(0.0),
            pre_payment_min: plant.pre_payment_min.unwrap_or(0.0),
            pre_payment_max: plant.pre_payment_max.unwrap_or(0.0),
            unit_price_min_prepayment: plant.unit_price_min_prepayment.unwrap_or(unit_price),
            unit_price_max_prepayment: plant.unit_price_max_prepayment.unwrap_or(unit_price),
            additional_cost: plant.additional_cost.unwrap_or(0.0),
            subvention_from_10kw_override: plant.subvention_from_10kw,
            consumption: bill.consumption.unwrap_or(0.0),
            consumption_value: bill.consumption_value.unwrap_or(0.0),
            consumption2: bill.consumption2.unwrap_or(0.0),
            consumption_value2: bill.consumption_value2.unwrap_or(0.0),
        }
    }

    /// Reject NaN, infinite and negative quantities
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("nominal_power", self.nominal_power),
            ("power_production_forecast", self.production_forecast),
            ("power_consumption_forecast", self.consumption_forecast),
            ("power_consumption_forecast_meter2", self.consumption_forecast_meter2),
            ("unit_price", self.unit_price),
            ("pre_payment", self.pre_payment),
            ("pre_payment_min", self.pre_payment_min),
            ("pre_payment_max", self.pre_payment_max),
            ("additional_cost", self.additional_cost),
            ("subvention_from_10kw", self.subvention_from_10kw_override.unwrap_or(0.0)),
            ("consumption", self.consumption),
            ("consumption_value", self.consumption_value),
            ("consumption2", self.consumption2),
            ("consumption_value2", self.consumption_value2),
        ];

        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::invalid(
                    field,
                    format!("expected a non-negative number, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// Forecast calculator
#[derive(Debug, Clone, Default)]
pub struct ForecastCalculator {
    config: ForecastConfig,
}

impl ForecastCalculator {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Compute the full forecast for a plant
    ///
    /// Plant, tariff and bill are passed as options so that callers holding
    /// lookup results get a `MissingDependency` instead of a panic.
    pub fn compute_forecast(
        &self,
        plant: Option<&Plant>,
        rate_table: Option<&RateTable>,
        power_bill: Option<&PowerBill>,
        active_extras: &[Extra],
    ) -> Result<ForecastResult> {
        self.config.validate()?;
        let plant = plant.ok_or_else(|| EngineError::missing(Plant::KIND, "forecast input"))?;
        let rate_table =
            rate_table.ok_or_else(|| EngineError::missing(RateTable::KIND, format!("for plant {}", plant.id)))?;
        let power_bill =
            power_bill.ok_or_else(|| EngineError::missing(PowerBill::KIND, format!("for plant {}", plant.id)))?;

        rate_table.validate()?;
        let input = NormalizedInputs::new(plant, power_bill);
        input.validate()?;

        if !rate_table.direct_buy && input.pre_payment > input.unit_price {
            return Err(EngineError::invalid(
                "pre_payment",
                format!("{:.2} exceeds unit price {:.2}", input.pre_payment, input.unit_price),
            ));
        }

        let variant = CalculationVariant::select(input.community_plant, input.join_power_meters, input.consumption2);
        let result = self.compute_variant(plant.id, variant, &input, rate_table, active_extras)?;

        debug!(
            "Plant {}: {:?}, surplus {:.1} kWh, duration {:.2} y, open balance {:.2}",
            plant.id, variant, result.surplus_power, result.duration, result.open_balance
        );
        Ok(result)
    }

    fn compute_variant(
        &self,
        plant_id: RecordId,
        variant: CalculationVariant,
        input: &NormalizedInputs,
        rate_table: &RateTable,
        extras: &[Extra],
    ) -> Result<ForecastResult> {
        let VariantRules { meter2_on_plant, keep_negative_primary } = variant.rules();

        let meter2_forecast = if meter2_on_plant { input.consumption_forecast_meter2 } else { 0.0 };
        let surplus_power = input.production_forecast - input.consumption_forecast - meter2_forecast;
        let consumption_forecast_total = input.consumption_forecast + meter2_forecast;

        let meter1 = self.meter_split(
            1,
            input.consumption,
            input.consumption_value,
            input.consumption_forecast,
            keep_negative_primary,
        )?;
        let meter2 = self.meter_split(2, input.consumption2, input.consumption_value2, meter2_forecast, false)?;

        // Internal side: what the customer pays the plant and earns for surplus
        let pv_cost_to_solar = consumption_forecast_total * rate_table.consumption_rate;
        let pv_surplus_solar = surplus_power * rate_table.excess_production_rate;
        let internal_total = pv_cost_to_solar + pv_surplus_solar;

        // External side: remaining grid consumption minus the feed-in credit
        let credit_prediction = surplus_power * rate_table.excess_production_rate_external;
        let external_consumption_value = meter1.value + meter2.value;
        let external_total = external_consumption_value - credit_prediction;

        let total_expenditure = input.consumption_value + input.consumption_value2;
        let expenditure_with_plant = pv_cost_to_solar + external_total;

        let subvention = self.subvention(input.nominal_power, rate_table, input.subvention_from_10kw_override);
        let max_pre_payment = self.max_pre_payment(subvention);

        let (pre_payment, duration, open_balance) = if rate_table.direct_buy {
            (input.unit_price, 0.0, 0.0)
        } else {
            let financed = input.unit_price - input.pre_payment;
            let duration = self.amortization_duration(financed, internal_total);
            (input.pre_payment, duration, financed - duration * internal_total)
        };

        Ok(ForecastResult {
            plant_id,
            variant,
            nominal_power: input.nominal_power,
            production_forecast: input.production_forecast,
            consumption_forecast_total,
            surplus_power,
            meter1,
            meter2,
            pv_cost_to_solar,
            pv_surplus_solar,
            internal_total,
            credit_prediction,
            external_consumption_value,
            external_total,
            total_expenditure,
            expenditure_with_plant,
            annual_saving: total_expenditure - expenditure_with_plant,
            subvention,
            max_pre_payment,
            unit_price: input.unit_price,
            pre_payment,
            pre_payment_min: self.round_to_step(input.pre_payment_min),
            pre_payment_max: self.pre_payment_max(input.pre_payment_max, max_pre_payment),
            unit_price_min_prepayment: input.unit_price_min_prepayment,
            unit_price_max_prepayment: input.unit_price_max_prepayment,
            financed_amount: input.unit_price - pre_payment,
            duration,
            open_balance,
            direct_buy: rate_table.direct_buy,
            extras_total: self.extras_total(extras),
        })
    }

    fn meter_split(
        &self,
        meter: u8,
        measured: f64,
        value: f64,
        forecast: f64,
        keep_negative: bool,
    ) -> Result<MeterSplit> {
        let coefficient = self.price_coefficient(meter, measured, value)?;
        let excess = measured - forecast;
        let raw = excess * coefficient;

        Ok(MeterSplit {
            meter,
            measured,
            forecast,
            excess,
            coefficient,
            value: if keep_negative { raw } else { raw.max(0.0) },
        })
    }

    /// Price per kWh from the bill: value / consumption
    pub fn price_coefficient(&self, meter: u8, consumption: f64, value: f64) -> Result<f64> {
        if consumption > 0.0 {
            return Ok(value / consumption);
        }
        if value == 0.0 {
            // Meter not present on the bill
            return Ok(0.0);
        }
        match self.config.zero_consumption {
            ZeroConsumptionPolicy::Guard => {
                warn!("Meter {} billed {:.2} for zero consumption, coefficient set to 0", meter, value);
                Ok(0.0)
            }
            ZeroConsumptionPolicy::Reject => Err(EngineError::ArithmeticAmbiguity { meter, value }),
        }
    }

    /// Tiered subvention: lower bracket up to the threshold, upper bracket above
    pub fn subvention(&self, nominal_power: f64, rate_table: &RateTable, plant_override: Option<f64>) -> f64 {
        let threshold = self.config.subvention_threshold_kw;
        let lower = nominal_power.min(threshold);
        let upper = (nominal_power - threshold).max(0.0);
        lower * rate_table.subvention_to_10kw + upper * rate_table.subvention_from_10kw_for(plant_override)
    }

    /// Largest prepayment the subvention allows, rounded up to the step
    pub fn max_pre_payment(&self, subvention: f64) -> f64 {
        let step = self.config.pre_payment_step;
        ((subvention / self.config.subvention_share) / step).ceil() * step
    }

    /// Years needed to pay off `financed` with the annual internal total, capped
    pub fn amortization_duration(&self, financed: f64, internal_total: f64) -> f64 {
        let cap = self.config.duration_cap_years;
        if financed <= 0.0 {
            0.0
        } else if internal_total <= 0.0 {
            cap
        } else {
            (financed / internal_total).min(cap)
        }
    }

    fn pre_payment_max(&self, plant_max: f64, max_pre_payment: f64) -> f64 {
        match (plant_max > 0.0, max_pre_payment > 0.0) {
            (true, true) => self.round_to_step(plant_max).min(max_pre_payment),
            (true, false) => self.round_to_step(plant_max),
            (false, _) => max_pre_payment,
        }
    }

    fn round_to_step(&self, amount: f64) -> f64 {
        let step = self.config.pre_payment_step;
        (amount / step).round() * step
    }

    fn extras_total(&self, extras: &[Extra]) -> f64 {
        extras
            .iter()
            .filter(|extra| extra.active && extra.is_active())
            .map(|extra| extra.price * self.config.vat_factor)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tariff() -> RateTable {
        RateTable {
            id: 1,
            name: "Standard".to_string(),
            consumption_rate: 0.12,
            excess_production_rate: 0.06,
            excess_production_rate_external: 0.04,
            subvention_to_10kw: 250.0,
            subvention_from_10kw: 200.0,
            ..Default::default()
        }
    }

    fn plant() -> Plant {
        Plant {
            id: 7,
            name: "Barn".to_string(),
            rate_table_id: Some(1),
            nominal_power: Some(9.0),
            power_production_forecast: Some(5000.0),
            power_consumption_forecast: Some(3000.0),
            unit_price: Some(6000.0),
            pre_payment: Some(1200.0),
            ..Default::default()
        }
    }

    fn bill() -> PowerBill {
        PowerBill {
            plant_id: 7,
            consumption: Some(4000.0),
            consumption_value: Some(1000.0),
            ..Default::default()
        }
    }

    fn compute(plant: &Plant, tariff: &RateTable, bill: &PowerBill) -> ForecastResult {
        ForecastCalculator::default()
            .compute_forecast(Some(plant), Some(tariff), Some(bill), &[])
            .expect("forecast should compute")
    }

    #[test]
    fn test_internal_totals() {
        let result = compute(&plant(), &tariff(), &bill());

        assert_eq!(result.variant, CalculationVariant::SingleMeter);
        assert_abs_diff_eq!(result.surplus_power, 2000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.pv_cost_to_solar, 360.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.pv_surplus_solar, 120.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.internal_total, 480.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.credit_prediction, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn test_meter_excess_value() {
        let result = compute(&plant(), &tariff(), &bill());

        // 1000 kWh left on the grid at 0.25 per kWh
        assert_abs_diff_eq!(result.meter1.coefficient, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(result.meter1.excess, 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.meter1.value, 250.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.external_total, 250.0 - 80.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.total_expenditure, 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.expenditure_with_plant, 360.0 + 170.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.annual_saving, 1000.0 - 530.0, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_excess_is_floored() {
        let bill = PowerBill {
            consumption: Some(2500.0),
            consumption_value: Some(625.0),
            ..bill()
        };
        let result = compute(&plant(), &tariff(), &bill);

        assert!(result.meter1.excess < 0.0);
        assert_eq!(result.meter1.value, 0.0);
    }

    #[test]
    fn test_community_keeps_negative_primary() {
        let plant = Plant {
            community_plant: Some(true),
            power_consumption_forecast_meter2: Some(800.0),
            ..plant()
        };
        let bill = PowerBill {
            consumption: Some(2500.0),
            consumption_value: Some(625.0),
            consumption2: Some(1500.0),
            consumption_value2: Some(450.0),
            ..bill()
        };
        let result = compute(&plant, &tariff(), &bill);

        assert_eq!(result.variant, CalculationVariant::CommunityPlant);
        // Primary: (2500 - 3000) * 0.25 kept negative
        assert_abs_diff_eq!(result.meter1.value, -125.0, epsilon = 1e-9);
        // Meter 2: (1500 - 800) * 0.3
        assert_abs_diff_eq!(result.meter2.value, 210.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.external_consumption_value, 85.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.surplus_power, 1200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_two_meters_bill_meter2_fully() {
        let plant = Plant {
            power_consumption_forecast_meter2: Some(800.0),
            ..plant()
        };
        let bill = PowerBill {
            consumption2: Some(1500.0),
            consumption_value2: Some(450.0),
            ..bill()
        };
        let result = compute(&plant, &tariff(), &bill);

        assert_eq!(result.variant, CalculationVariant::TwoMeters);
        assert_abs_diff_eq!(result.surplus_power, 2000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.consumption_forecast_total, 3000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.meter2.value, 450.0, epsilon = 1e-9);
    }

    #[test]
    fn test_joined_meters_serve_meter2_from_plant() {
        let plant = Plant {
            join_power_meters: Some(true),
            power_consumption_forecast_meter2: Some(800.0),
            ..plant()
        };
        let bill = PowerBill {
            consumption2: Some(1500.0),
            consumption_value2: Some(450.0),
            ..bill()
        };
        let result = compute(&plant, &tariff(), &bill);

        assert_eq!(result.variant, CalculationVariant::JoinedMeters);
        assert_abs_diff_eq!(result.surplus_power, 1200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.pv_cost_to_solar, 3800.0 * 0.12, epsilon = 1e-9);
        assert_abs_diff_eq!(result.meter2.value, 210.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duration_and_open_balance() {
        // 4800 financed / 480 per year = 10 years, fully covered
        let result = compute(&plant(), &tariff(), &bill());
        assert_abs_diff_eq!(result.duration, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.open_balance, 0.0, epsilon = 1e-9);

        // 9600 financed would need 20 years: capped, remainder stays open
        let plant = Plant {
            unit_price: Some(12500.0),
            pre_payment: Some(2900.0),
            ..plant()
        };
        let result = compute(&plant, &tariff(), &bill());
        assert_abs_diff_eq!(result.duration, 12.5, epsilon = 1e-12);
        assert_abs_diff_eq!(result.open_balance, 9600.0 - 12.5 * 480.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duration_never_exceeds_cap() {
        for unit_price in [0.0, 1000.0, 6000.0, 20_000.0, 250_000.0] {
            for production in [0.0, 3000.0, 5000.0, 12_000.0] {
                let plant = Plant {
                    unit_price: Some(unit_price),
                    pre_payment: Some(0.0),
                    power_production_forecast: Some(production),
                    ..plant()
                };
                let result = compute(&plant, &tariff(), &bill());
                assert!(result.duration <= 12.5, "duration {} for price {}", result.duration, unit_price);
                assert!(result.duration >= 0.0);
            }
        }
    }

    #[test]
    fn test_direct_buy_overrides_financing() {
        let tariff = RateTable {
            direct_buy: true,
            ..tariff()
        };
        let result = compute(&plant(), &tariff, &bill());

        assert!(result.direct_buy);
        assert_eq!(result.pre_payment, result.unit_price);
        assert_eq!(result.duration, 0.0);
        assert_eq!(result.open_balance, 0.0);
        assert_eq!(result.financed_amount, 0.0);
    }

    #[test]
    fn test_subvention_brackets() {
        let calculator = ForecastCalculator::default();
        let tariff = tariff();

        assert_abs_diff_eq!(calculator.subvention(15.0, &tariff, None), 3500.0, epsilon = 1e-9);
        assert_abs_diff_eq!(calculator.subvention(15.0, &tariff, Some(100.0)), 3000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(calculator.subvention(8.0, &tariff, None), 2000.0, epsilon = 1e-9);

        assert_abs_diff_eq!(calculator.max_pre_payment(3500.0), 10_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(calculator.max_pre_payment(3600.0), 10_300.0, epsilon = 1e-9);
        assert_abs_diff_eq!(calculator.max_pre_payment(3000.0), 8_600.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extras_are_separate() {
        let extras = vec![
            Extra { plant_id: 7, name: "Wallbox".to_string(), price: 800.0, active: true, ..Default::default() },
            Extra { plant_id: 7, name: "Meter".to_string(), price: 200.0, active: true, ..Default::default() },
            Extra { plant_id: 7, name: "Battery".to_string(), price: 5000.0, active: false, ..Default::default() },
        ];
        let calculator = ForecastCalculator::default();
        let with_extras = calculator
            .compute_forecast(Some(&plant()), Some(&tariff()), Some(&bill()), &extras)
            .unwrap();
        let without = compute(&plant(), &tariff(), &bill());

        assert_abs_diff_eq!(with_extras.extras_total, 1200.0, epsilon = 1e-9);
        assert_eq!(with_extras.duration, without.duration);
        assert_eq!(with_extras.open_balance, without.open_balance);
    }

    #[test]
    fn test_zero_consumption_guarded() {
        let bill = PowerBill {
            consumption: Some(0.0),
            consumption_value: Some(300.0),
            ..bill()
        };
        let result = compute(&plant(), &tariff(), &bill);

        assert_eq!(result.meter1.coefficient, 0.0);
        assert_eq!(result.meter1.value, 0.0);
        assert!(result.external_total.is_finite());
    }

    #[test]
    fn test_zero_consumption_rejected() {
        let calculator = ForecastCalculator::new(ForecastConfig {
            zero_consumption: ZeroConsumptionPolicy::Reject,
            ..Default::default()
        });
        let bill = PowerBill {
            consumption2: Some(0.0),
            consumption_value2: Some(90.0),
            ..bill()
        };

        let err = calculator
            .compute_forecast(Some(&plant()), Some(&tariff()), Some(&bill), &[])
            .unwrap_err();
        assert!(matches!(err, EngineError::ArithmeticAmbiguity { meter: 2, .. }));
    }

    #[test]
    fn test_absent_meter_is_not_ambiguous() {
        let calculator = ForecastCalculator::new(ForecastConfig {
            zero_consumption: ZeroConsumptionPolicy::Reject,
            ..Default::default()
        });
        assert_eq!(calculator.price_coefficient(2, 0.0, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_missing_inputs() {
        let calculator = ForecastCalculator::default();

        let err = calculator.compute_forecast(None, Some(&tariff()), Some(&bill()), &[]).unwrap_err();
        assert!(matches!(err, EngineError::MissingDependency { kind: "plant", .. }));

        let err = calculator.compute_forecast(Some(&plant()), None, Some(&bill()), &[]).unwrap_err();
        assert!(matches!(err, EngineError::MissingDependency { kind: "rate table", .. }));

        let err = calculator.compute_forecast(Some(&plant()), Some(&tariff()), None, &[]).unwrap_err();
        assert!(matches!(err, EngineError::MissingDependency { kind: "power bill", .. }));
    }

    #[test]
    fn test_null_fields_default_to_zero() {
        let plant = Plant { id: 3, ..Default::default() };
        let result = compute(&plant, &tariff(), &PowerBill::default());

        assert_eq!(result.variant, CalculationVariant::SingleMeter);
        assert_eq!(result.surplus_power, 0.0);
        assert_eq!(result.duration, 0.0);
        assert_eq!(result.open_balance, 0.0);
    }

    #[test]
    fn test_prepayment_above_price_rejected() {
        let plant = Plant {
            pre_payment: Some(7000.0),
            ..plant()
        };
        let err = ForecastCalculator::default()
            .compute_forecast(Some(&plant), Some(&tariff()), Some(&bill()), &[])
            .unwrap_err();
        assert!(matches!(err, EngineError::ValidationFailure { .. }));
    }

    #[test]
    fn test_negative_input_rejected() {
        let plant = Plant {
            nominal_power: Some(-1.0),
            ..plant()
        };
        let err = ForecastCalculator::default()
            .compute_forecast(Some(&plant), Some(&tariff()), Some(&bill()), &[])
            .unwrap_err();
        assert!(err.to_string().contains("nominal_power"));
    }

    #[test]
    fn test_broken_config_rejected() {
        let broken = [
            ("pre_payment_step", ForecastConfig { pre_payment_step: 0.0, ..Default::default() }),
            ("subvention_share", ForecastConfig { subvention_share: 0.0, ..Default::default() }),
            ("subvention_threshold_kw", ForecastConfig { subvention_threshold_kw: -10.0, ..Default::default() }),
            ("duration_cap_years", ForecastConfig { duration_cap_years: -1.0, ..Default::default() }),
            ("duration_cap_years", ForecastConfig { duration_cap_years: f64::INFINITY, ..Default::default() }),
            ("vat_factor", ForecastConfig { vat_factor: 0.8, ..Default::default() }),
            ("vat_factor", ForecastConfig { vat_factor: f64::NAN, ..Default::default() }),
        ];

        for (field, config) in broken {
            let err = ForecastCalculator::new(config)
                .compute_forecast(Some(&plant()), Some(&tariff()), Some(&bill()), &[])
                .unwrap_err();
            assert!(
                matches!(&err, EngineError::ValidationFailure { field: f, .. } if f == field),
                "expected {} to be rejected, got {}",
                field,
                err
            );
        }
    }

    #[test]
    fn test_vat_factor_of_one_is_allowed() {
        let config = ForecastConfig { vat_factor: 1.0, ..Default::default() };
        assert!(config.validate().is_ok());
        assert!(ForecastConfig::default().validate().is_ok());
    }

    #[test]
    fn test_preview_bounds() {
        let plant = Plant {
            nominal_power: Some(15.0),
            pre_payment_min: Some(1234.0),
            pre_payment_max: Some(12_000.0),
            ..plant()
        };
        let result = compute(&plant, &tariff(), &bill());
        let preview = result.preview();

        assert_eq!(preview.pre_payment_min, 1250.0);
        // Plant max exceeds what the subvention allows
        assert_eq!(preview.pre_payment_max, 10_000.0);
        assert_eq!(preview.unit_price, 6000.0);
        assert_abs_diff_eq!(preview.subvention, 3500.0, epsilon = 1e-9);
        assert_eq!(preview.duration, result.duration);
    }

    #[test]
    fn test_data_bag_has_line_items() {
        let result = compute(&plant(), &tariff(), &bill());
        let bag = result.data_bag().unwrap();

        assert_eq!(bag["variant_label"], "single meter");
        assert!(bag["pv_cost_to_solar"].is_number());
        assert!(bag["preview"]["duration"].is_number());
        assert_eq!(bag["meter1"]["meter"], 1);
    }
}
