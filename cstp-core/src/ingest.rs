use crate::{
    control::ControlService,
    error::CstpError,
    storage::{Storage, StorageFailurePolicy},
};
use cstp_schemas::{ack::AckResponse, measurement::MeasurementPayload};
use std::sync::Arc;
use tracing::Instrument;

/// A payload whose plant identifier has been checked against the route.
#[derive(Debug, Clone)]
pub struct ValidatedMeasurement(MeasurementPayload);

impl ValidatedMeasurement {
    pub fn validate(plant_id: &str, payload: MeasurementPayload) -> Result<Self, CstpError> {
        if payload.plant_id != plant_id {
            return Err(CstpError::Validation(
                "plant_id in URL and body must match".to_string(),
            ));
        }
        if payload.plant_id.trim().is_empty() {
            return Err(CstpError::Validation("plant_id must not be empty".to_string()));
        }
        Ok(Self(payload))
    }

    pub fn into_inner(self) -> MeasurementPayload {
        self.0
    }
}

/// Runs one ingestion cycle: validate, store the measurement, ask the control
/// service for commands, store the commands, acknowledge.
///
/// Each step completes before the next one starts. The handler holds no
/// mutable state and is shared between concurrent requests.
#[derive(Clone)]
pub struct IngestionHandler {
    storage: Arc<dyn Storage>,
    control: Arc<dyn ControlService>,
    policy: StorageFailurePolicy,
}

impl IngestionHandler {
    pub fn new(storage: Arc<dyn Storage>, control: Arc<dyn ControlService>) -> Self {
        Self {
            storage,
            control,
            policy: StorageFailurePolicy::default(),
        }
    }

    pub fn with_storage_failure_policy(mut self, policy: StorageFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn storage_failure_policy(&self) -> StorageFailurePolicy {
        self.policy
    }

    pub async fn handle_ingest(
        &self,
        plant_id: &str,
        payload: MeasurementPayload,
    ) -> Result<AckResponse, CstpError> {
        let span = tracing::info_span!("ingest", plant_id = %plant_id, timestamp = %payload.timestamp);
        self.run(plant_id, payload).instrument(span).await
    }

    async fn run(&self, plant_id: &str, payload: MeasurementPayload) -> Result<AckResponse, CstpError> {
        let measurement = ValidatedMeasurement::validate(plant_id, payload).map_err(|e| {
            tracing::warn!(error = %e, "rejected measurement");
            e
        })?;
        let payload = measurement.into_inner();

        let stored = self.storage.store_measurement(&payload).await;
        self.apply_policy("store_measurement", stored)?;

        let control = self.control.compute_control(&payload).await.map_err(|e| {
            tracing::error!(error = %e, "control service call failed");
            e
        })?;

        let stored = self.storage.store_commands(&control).await;
        self.apply_policy("store_commands", stored)?;

        tracing::info!(actuators = control.commands.len(), "control actions generated");
        Ok(AckResponse::processed(control))
    }

    fn apply_policy(&self, operation: &str, result: Result<(), CstpError>) -> Result<(), CstpError> {
        let Err(err) = result else {
            return Ok(());
        };
        match self.policy {
            StorageFailurePolicy::Abort => {
                tracing::error!(operation, error = %err, "storage failed, aborting request");
                if err.is_storage() {
                    Err(err)
                } else {
                    Err(CstpError::Storage(err.to_string()))
                }
            }
            StorageFailurePolicy::LogAndContinue => {
                tracing::warn!(operation, error = %err, "storage failed, continuing");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use cstp_schemas::{command::ControlCommands, snapshot::PlantSnapshot};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        StoreMeasurement(String),
        Compute(String),
        StoreCommands(String),
    }

    type Journal = Arc<Mutex<Vec<Call>>>;

    struct RecordingStorage {
        journal: Journal,
        fail: bool,
    }

    #[async_trait]
    impl Storage for RecordingStorage {
        async fn store_measurement(&self, payload: &MeasurementPayload) -> Result<(), CstpError> {
            self.journal
                .lock()
                .unwrap()
                .push(Call::StoreMeasurement(payload.plant_id.clone()));
            if self.fail {
                return Err(CstpError::Storage("disk full".to_string()));
            }
            Ok(())
        }

        async fn store_commands(&self, commands: &ControlCommands) -> Result<(), CstpError> {
            self.journal
                .lock()
                .unwrap()
                .push(Call::StoreCommands(commands.plant_id.clone()));
            if self.fail {
                return Err(CstpError::Storage("disk full".to_string()));
            }
            Ok(())
        }

        async fn latest(&self, plant_id: &str) -> Result<PlantSnapshot, CstpError> {
            Ok(PlantSnapshot::empty(plant_id))
        }
    }

    struct ScriptedControl {
        journal: Journal,
        reply: Result<ControlCommands, String>,
    }

    #[async_trait]
    impl ControlService for ScriptedControl {
        async fn compute_control(
            &self,
            payload: &MeasurementPayload,
        ) -> Result<ControlCommands, CstpError> {
            self.journal
                .lock()
                .unwrap()
                .push(Call::Compute(payload.plant_id.clone()));
            self.reply.clone().map_err(CstpError::Upstream)
        }
    }

    fn payload(plant_id: &str) -> MeasurementPayload {
        MeasurementPayload {
            plant_id: plant_id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 11, 15, 12, 0, 0).unwrap(),
            measurements: BTreeMap::from([("DO".to_string(), 1.8), ("S".to_string(), 120.0)]),
            setpoints: BTreeMap::from([("DO".to_string(), 2.0)]),
        }
    }

    fn commands() -> ControlCommands {
        ControlCommands {
            plant_id: "CSTP-01".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 11, 15, 12, 0, 0).unwrap(),
            commands: BTreeMap::from([("blower_u".to_string(), 0.65)]),
            meta: Some(BTreeMap::from([
                ("controller".to_string(), "PI_DO_v1".to_string()),
                ("status".to_string(), "OK".to_string()),
            ])),
        }
    }

    fn handler(
        reply: Result<ControlCommands, String>,
        storage_fails: bool,
    ) -> (IngestionHandler, Journal) {
        let journal: Journal = Arc::default();
        let storage = RecordingStorage {
            journal: journal.clone(),
            fail: storage_fails,
        };
        let control = ScriptedControl {
            journal: journal.clone(),
            reply,
        };
        (
            IngestionHandler::new(Arc::new(storage), Arc::new(control)),
            journal,
        )
    }

    fn calls(journal: &Journal) -> Vec<Call> {
        journal.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn stores_computes_and_stores_in_order() {
        let (handler, journal) = handler(Ok(commands()), false);

        let ack = handler.handle_ingest("CSTP-01", payload("CSTP-01")).await.unwrap();

        assert_eq!(ack.status, "OK");
        assert_eq!(ack.control, Some(commands()));
        assert_eq!(
            calls(&journal),
            vec![
                Call::StoreMeasurement("CSTP-01".to_string()),
                Call::Compute("CSTP-01".to_string()),
                Call::StoreCommands("CSTP-01".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn mismatched_plant_has_no_side_effects() {
        let (handler, journal) = handler(Ok(commands()), false);

        let err = handler.handle_ingest("CSTP-02", payload("CSTP-01")).await.unwrap_err();

        assert!(matches!(err, CstpError::Validation(_)));
        assert!(calls(&journal).is_empty());
    }

    #[tokio::test]
    async fn empty_plant_id_is_rejected() {
        let (handler, journal) = handler(Ok(commands()), false);

        let err = handler.handle_ingest("", payload("")).await.unwrap_err();

        assert!(matches!(err, CstpError::Validation(_)));
        assert!(calls(&journal).is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_skips_command_storage() {
        let (handler, journal) = handler(Err("connection refused".to_string()), false);

        let err = handler.handle_ingest("CSTP-01", payload("CSTP-01")).await.unwrap_err();

        assert!(matches!(err, CstpError::Upstream(ref d) if d == "connection refused"));
        assert_eq!(
            calls(&journal),
            vec![
                Call::StoreMeasurement("CSTP-01".to_string()),
                Call::Compute("CSTP-01".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn resubmission_runs_a_second_cycle() {
        let (handler, journal) = handler(Ok(commands()), false);

        handler.handle_ingest("CSTP-01", payload("CSTP-01")).await.unwrap();
        handler.handle_ingest("CSTP-01", payload("CSTP-01")).await.unwrap();

        assert_eq!(calls(&journal).len(), 6);
    }

    #[tokio::test]
    async fn abort_policy_stops_before_upstream() {
        let (handler, journal) = handler(Ok(commands()), true);
        assert_eq!(handler.storage_failure_policy(), StorageFailurePolicy::Abort);

        let err = handler.handle_ingest("CSTP-01", payload("CSTP-01")).await.unwrap_err();

        assert!(err.is_storage());
        assert_eq!(
            calls(&journal),
            vec![Call::StoreMeasurement("CSTP-01".to_string())]
        );
    }

    #[tokio::test]
    async fn log_and_continue_policy_completes_the_cycle() {
        let (handler, journal) = handler(Ok(commands()), true);
        let handler = handler.with_storage_failure_policy(StorageFailurePolicy::LogAndContinue);
        assert_eq!(
            handler.storage_failure_policy(),
            StorageFailurePolicy::LogAndContinue
        );

        let ack = handler.handle_ingest("CSTP-01", payload("CSTP-01")).await.unwrap();

        assert_eq!(ack.control, Some(commands()));
        assert_eq!(calls(&journal).len(), 3);
    }
}
