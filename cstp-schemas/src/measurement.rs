use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One batch of sensor readings submitted by a plant gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPayload {
    pub plant_id: String,
    pub timestamp: DateTime<Utc>,
    /// Sensor tag (e.g. `DO`, `S`) to measured value.
    pub measurements: BTreeMap<String, f64>,
    /// Controlled variable to target value.
    pub setpoints: BTreeMap<String, f64>,
}
