pub mod control;
pub mod error;
pub mod ingest;
pub mod storage;

pub use control::{ControlService, HttpControlClient};
pub use error::CstpError;
pub use ingest::IngestionHandler;
pub use storage::{CsvStorage, LogStorage, MemoryStorage, Storage, StorageFailurePolicy};
