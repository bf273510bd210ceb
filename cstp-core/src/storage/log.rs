use super::Storage;
use crate::error::CstpError;
use async_trait::async_trait;
use cstp_schemas::{
    command::ControlCommands, measurement::MeasurementPayload, snapshot::PlantSnapshot,
};

/// Storage that records nothing and only logs each write.
#[derive(Debug, Default, Clone)]
pub struct LogStorage;

impl LogStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for LogStorage {
    async fn store_measurement(&self, payload: &MeasurementPayload) -> Result<(), CstpError> {
        tracing::info!(
            plant_id = %payload.plant_id,
            timestamp = %payload.timestamp,
            sensors = payload.measurements.len(),
            "store_measurement"
        );
        Ok(())
    }

    async fn store_commands(&self, commands: &ControlCommands) -> Result<(), CstpError> {
        tracing::info!(
            plant_id = %commands.plant_id,
            timestamp = %commands.timestamp,
            actuators = commands.commands.len(),
            "store_commands"
        );
        Ok(())
    }

    async fn latest(&self, plant_id: &str) -> Result<PlantSnapshot, CstpError> {
        Ok(PlantSnapshot::empty(plant_id))
    }
}
