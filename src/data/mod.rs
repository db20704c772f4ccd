//! Data input/output: CSV files and a synthetic wind generator.

mod loader;
mod synthetic;

pub use loader::{load_csv, parse_timestamp, read_interval_csv, write_forecast_csv, CsvOptions};
pub use synthetic::synthetic_wind;
