//! Process bootstrap: telemetry and input/output adapters.

pub mod error;
pub mod input;
pub mod telemetry;
