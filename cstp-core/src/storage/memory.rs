use super::Storage;
use crate::error::CstpError;
use async_trait::async_trait;
use cstp_schemas::{
    command::ControlCommands, measurement::MeasurementPayload, snapshot::PlantSnapshot,
};
use std::{collections::HashMap, sync::RwLock};

/// Keeps the latest measurement and commands for every plant in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    plants: RwLock<HashMap<String, PlantSnapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, plant_id: &str, apply: F) -> Result<(), CstpError>
    where
        F: FnOnce(&mut PlantSnapshot),
    {
        let mut plants = self
            .plants
            .write()
            .map_err(|_| CstpError::Storage("memory storage lock poisoned".to_string()))?;
        let snapshot = plants
            .entry(plant_id.to_string())
            .or_insert_with(|| PlantSnapshot::empty(plant_id));
        apply(snapshot);
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store_measurement(&self, payload: &MeasurementPayload) -> Result<(), CstpError> {
        self.update(&payload.plant_id, |snapshot| {
            snapshot.measurement = Some(payload.clone());
        })
    }

    async fn store_commands(&self, commands: &ControlCommands) -> Result<(), CstpError> {
        self.update(&commands.plant_id, |snapshot| {
            snapshot.control = Some(commands.clone());
        })
    }

    async fn latest(&self, plant_id: &str) -> Result<PlantSnapshot, CstpError> {
        let plants = self
            .plants
            .read()
            .map_err(|_| CstpError::Storage("memory storage lock poisoned".to_string()))?;
        Ok(plants
            .get(plant_id)
            .cloned()
            .unwrap_or_else(|| PlantSnapshot::empty(plant_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn payload(plant_id: &str, hour: u32, dissolved_oxygen: f64) -> MeasurementPayload {
        MeasurementPayload {
            plant_id: plant_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 11, 15, hour, 0, 0).unwrap(),
            measurements: BTreeMap::from([("DO".to_string(), dissolved_oxygen)]),
            setpoints: BTreeMap::from([("DO".to_string(), 2.0)]),
        }
    }

    #[tokio::test]
    async fn latest_is_empty_for_unknown_plant() {
        let storage = MemoryStorage::new();
        let snapshot = storage.latest("CSTP-09").await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.plant_id, "CSTP-09");
    }

    #[tokio::test]
    async fn keeps_last_write_per_plant() {
        let storage = MemoryStorage::new();
        storage.store_measurement(&payload("CSTP-01", 12, 1.8)).await.unwrap();
        storage.store_measurement(&payload("CSTP-01", 13, 1.9)).await.unwrap();
        storage.store_measurement(&payload("CSTP-02", 12, 0.4)).await.unwrap();

        let first = storage.latest("CSTP-01").await.unwrap();
        assert_eq!(first.measurement.unwrap().measurements["DO"], 1.9);
        assert!(first.control.is_none());

        let second = storage.latest("CSTP-02").await.unwrap();
        assert_eq!(second.measurement.unwrap().measurements["DO"], 0.4);
    }

    #[tokio::test]
    async fn commands_land_next_to_measurement() {
        let storage = MemoryStorage::new();
        let measurement = payload("CSTP-01", 12, 1.8);
        storage.store_measurement(&measurement).await.unwrap();
        storage
            .store_commands(&ControlCommands {
                plant_id: "CSTP-01".to_string(),
                timestamp: measurement.timestamp,
                commands: BTreeMap::from([("blower_u".to_string(), 0.65)]),
                meta: None,
            })
            .await
            .unwrap();

        let snapshot = storage.latest("CSTP-01").await.unwrap();
        assert_eq!(snapshot.measurement, Some(measurement));
        assert_eq!(snapshot.control.unwrap().commands["blower_u"], 0.65);
    }
}
