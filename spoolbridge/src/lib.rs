pub mod cli;
pub mod config;
pub mod gcode;
pub mod notify;
pub mod report;

pub use spoolbridge_api::{FilamentId, FilamentRecord};
