use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Actuator commands computed by the control service for one measurement batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommands {
    pub plant_id: String,
    pub timestamp: DateTime<Utc>,
    /// Actuator name (e.g. `blower_u`) to commanded value.
    pub commands: BTreeMap<String, f64>,
    #[serde(default)]
    pub meta: Option<BTreeMap<String, String>>,
}
