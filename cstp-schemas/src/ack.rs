use crate::command::ControlCommands;
use serde::{Deserialize, Serialize};

/// Reply envelope for an ingestion request.
///
/// `control` stays optional so that replies which do not reach command
/// generation can still be expressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckResponse {
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_message")]
    pub message: String,
    #[serde(default)]
    pub control: Option<ControlCommands>,
}

impl AckResponse {
    pub fn processed(control: ControlCommands) -> Self {
        Self {
            status: default_status(),
            message: "Measurement processed and control actions generated".to_string(),
            control: Some(control),
        }
    }
}

impl Default for AckResponse {
    fn default() -> Self {
        Self {
            status: default_status(),
            message: default_message(),
            control: None,
        }
    }
}

fn default_status() -> String {
    "OK".to_string()
}

fn default_message() -> String {
    "Measurement processed".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_ack_serializes_null_control() {
        let value = serde_json::to_value(AckResponse::default()).unwrap();
        assert_eq!(
            value,
            json!({"status": "OK", "message": "Measurement processed", "control": null})
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let ack: AckResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(ack, AckResponse::default());
    }
}
