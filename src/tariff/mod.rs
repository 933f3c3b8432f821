//! Tariff parameters and their CSV loader

mod rates;
pub mod loader;

pub use rates::RateTable;
pub use loader::{load_rate_tables, load_rate_tables_from_reader};
