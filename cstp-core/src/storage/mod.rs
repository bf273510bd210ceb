//! Persistence of measurement and command records.
//!
//! The ingestion flow only depends on the [`Storage`] trait. Three backends
//! ship with the crate: [`LogStorage`] only logs, [`MemoryStorage`] keeps the
//! latest records per plant, and [`CsvStorage`] appends time-series rows to
//! disk.

use crate::error::CstpError;
use async_trait::async_trait;
use cstp_schemas::{
    command::ControlCommands, measurement::MeasurementPayload, snapshot::PlantSnapshot,
};
use serde::Deserialize;
use std::{fmt, str::FromStr};

mod log;
mod memory;
mod timeseries;

pub use self::log::LogStorage;
pub use self::memory::MemoryStorage;
pub use self::timeseries::CsvStorage;

#[async_trait]
pub trait Storage: Send + Sync + 'static {
    async fn store_measurement(&self, payload: &MeasurementPayload) -> Result<(), CstpError>;

    async fn store_commands(&self, commands: &ControlCommands) -> Result<(), CstpError>;

    /// Returns the most recent records held for `plant_id`. Backends that keep
    /// nothing return an empty snapshot.
    async fn latest(&self, plant_id: &str) -> Result<PlantSnapshot, CstpError>;
}

/// What the ingestion flow does when a storage call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageFailurePolicy {
    /// Fail the request with a storage error.
    #[default]
    Abort,
    /// Log the failure and carry on with the flow.
    LogAndContinue,
}

impl FromStr for StorageFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "log_and_continue" | "log-and-continue" | "continue" => Ok(Self::LogAndContinue),
            other => Err(format!(
                "unknown storage failure policy '{other}' (expected abort or log_and_continue)"
            )),
        }
    }
}

impl fmt::Display for StorageFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("abort"),
            Self::LogAndContinue => f.write_str("log_and_continue"),
        }
    }
}
