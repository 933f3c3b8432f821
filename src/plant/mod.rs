//! Plant records, meter readings and CSV loading

mod data;
pub mod loader;

pub use data::{Extra, Plant, PlantStatus, PowerBill, ProjectUser};
pub use loader::{load_extras, load_plants, load_power_bills, load_project_users};

use crate::error::{EngineError, Result};
use crate::store::{RecordId, Store};

/// User id of the customer attached to a plant
pub fn recipient_for<S: Store>(store: &S, plant_id: RecordId) -> Result<RecordId> {
    store
        .select::<ProjectUser>(|link| link.plant_id == plant_id)?
        .first()
        .map(|link| link.user_id)
        .ok_or_else(|| EngineError::missing("project user", format!("for plant {}", plant_id)))
}
