use super::{MemoryStorage, Storage};
use crate::error::CstpError;
use async_trait::async_trait;
use csv::{Writer, WriterBuilder};
use cstp_schemas::{
    command::ControlCommands, measurement::MeasurementPayload, snapshot::PlantSnapshot,
};
use serde::Serialize;
use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

pub const MEASUREMENTS_FILE: &str = "measurements.csv";
pub const COMMANDS_FILE: &str = "commands.csv";

#[derive(Debug, Serialize)]
struct MeasurementRow {
    plant_id: String,
    timestamp: String,
    measurements_json: String,
    setpoints_json: String,
}

#[derive(Debug, Serialize)]
struct CommandRow {
    plant_id: String,
    timestamp: String,
    commands_json: String,
    meta_json: String,
}

/// Appends every record to a CSV time series keyed by `(plant_id, timestamp)`.
///
/// Rows are flushed on each write, on the blocking thread pool. The latest
/// records per plant are also kept in memory so snapshot queries do not read
/// the files back.
pub struct CsvStorage {
    dir: PathBuf,
    measurements: Arc<Mutex<Writer<File>>>,
    commands: Arc<Mutex<Writer<File>>>,
    latest: MemoryStorage,
}

impl CsvStorage {
    /// Opens (or creates) the two CSV files inside `dir`. Existing files are
    /// appended to.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CstpError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| CstpError::FileIO(dir.display().to_string(), e))?;

        let measurements = open_append(&dir.join(MEASUREMENTS_FILE))?;
        let commands = open_append(&dir.join(COMMANDS_FILE))?;

        Ok(Self {
            dir,
            measurements: Arc::new(Mutex::new(measurements)),
            commands: Arc::new(Mutex::new(commands)),
            latest: MemoryStorage::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn open_append(path: &Path) -> Result<Writer<File>, CstpError> {
    let needs_header = fs::metadata(path).map_or(true, |m| m.len() == 0);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CstpError::FileIO(path.display().to_string(), e))?;
    Ok(WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file))
}

async fn write_row<T>(writer: &Arc<Mutex<Writer<File>>>, row: T) -> Result<(), CstpError>
where
    T: Serialize + Send + 'static,
{
    let writer = Arc::clone(writer);
    tokio::task::spawn_blocking(move || {
        let mut writer = writer
            .lock()
            .map_err(|_| CstpError::Storage("csv writer lock poisoned".to_string()))?;
        writer.serialize(row)?;
        writer
            .flush()
            .map_err(|e| CstpError::FileIO("csv flush".to_string(), e))
    })
    .await
    .map_err(|e| CstpError::Storage(format!("csv write task failed: {e}")))?
}

#[async_trait]
impl Storage for CsvStorage {
    async fn store_measurement(&self, payload: &MeasurementPayload) -> Result<(), CstpError> {
        let row = MeasurementRow {
            plant_id: payload.plant_id.clone(),
            timestamp: payload.timestamp.to_rfc3339(),
            measurements_json: serde_json::to_string(&payload.measurements)?,
            setpoints_json: serde_json::to_string(&payload.setpoints)?,
        };
        write_row(&self.measurements, row).await?;
        tracing::debug!(plant_id = %payload.plant_id, timestamp = %payload.timestamp, "measurement row appended");
        self.latest.store_measurement(payload).await
    }

    async fn store_commands(&self, commands: &ControlCommands) -> Result<(), CstpError> {
        let row = CommandRow {
            plant_id: commands.plant_id.clone(),
            timestamp: commands.timestamp.to_rfc3339(),
            commands_json: serde_json::to_string(&commands.commands)?,
            meta_json: serde_json::to_string(&commands.meta)?,
        };
        write_row(&self.commands, row).await?;
        tracing::debug!(plant_id = %commands.plant_id, timestamp = %commands.timestamp, "command row appended");
        self.latest.store_commands(commands).await
    }

    async fn latest(&self, plant_id: &str) -> Result<PlantSnapshot, CstpError> {
        self.latest.latest(plant_id).await
    }
}
