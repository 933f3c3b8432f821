//! Consumption-accounting modes and the rules that distinguish them

use serde::{Deserialize, Serialize};

/// How meter consumption is settled against the plant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationVariant {
    /// One meter fed by the plant
    SingleMeter,
    /// Meter 1 fed by the plant, meter 2 billed separately from the grid
    TwoMeters,
    /// Both meters joined behind the plant
    JoinedMeters,
    /// Community plant: both meters pooled, primary shortfall offsets meter 2
    CommunityPlant,
}

/// Variant-specific switches for the single forecast computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantRules {
    /// Meter 2's forecast is served by the plant: it reduces the surplus,
    /// counts as solar consumption and is subtracted from meter 2's reading
    pub meter2_on_plant: bool,

    /// A negative primary-meter subtotal survives the floor at zero
    pub keep_negative_primary: bool,
}

impl CalculationVariant {
    /// Pick the variant; community beats joined beats two meters beats single
    pub fn select(community_plant: bool, join_power_meters: bool, consumption2: f64) -> Self {
        if community_plant {
            CalculationVariant::CommunityPlant
        } else if join_power_meters {
            CalculationVariant::JoinedMeters
        } else if consumption2 > 0.0 {
            CalculationVariant::TwoMeters
        } else {
            CalculationVariant::SingleMeter
        }
    }

    pub fn rules(&self) -> VariantRules {
        match self {
            CalculationVariant::SingleMeter | CalculationVariant::TwoMeters => VariantRules {
                meter2_on_plant: false,
                keep_negative_primary: false,
            },
            CalculationVariant::JoinedMeters => VariantRules {
                meter2_on_plant: true,
                keep_negative_primary: false,
            },
            CalculationVariant::CommunityPlant => VariantRules {
                meter2_on_plant: true,
                keep_negative_primary: true,
            },
        }
    }

    /// Label used in rendered documents
    pub fn label(&self) -> &'static str {
        match self {
            CalculationVariant::SingleMeter => "single meter",
            CalculationVariant::TwoMeters => "two meters",
            CalculationVariant::JoinedMeters => "joined meters",
            CalculationVariant::CommunityPlant => "community plant",
        }
    }
}
