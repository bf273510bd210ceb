use crate::{command::ControlCommands, measurement::MeasurementPayload};
use serde::{Deserialize, Serialize};

/// The most recent records held for one plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantSnapshot {
    pub plant_id: String,
    pub measurement: Option<MeasurementPayload>,
    pub control: Option<ControlCommands>,
}

impl PlantSnapshot {
    pub fn empty(plant_id: &str) -> Self {
        Self {
            plant_id: plant_id.to_string(),
            measurement: None,
            control: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.measurement.is_none() && self.control.is_none()
    }
}
