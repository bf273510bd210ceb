//! CSTP monitoring and control relay.
//!
//! Accepts measurement batches from plant gateways, forwards them to the
//! control computation service and relays the resulting commands, storing
//! both along the way.

pub mod config;
pub mod error;
pub mod logging;
pub mod server;

use anyhow::{Context, Result};
use axum::Router;
use config::{Settings, StorageKind};
use cstp_core::{CsvStorage, HttpControlClient, IngestionHandler, LogStorage, MemoryStorage, Storage};
use std::sync::Arc;

/// Opens the storage backend selected in `settings`.
pub fn build_storage(settings: &Settings) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match settings.storage {
        StorageKind::Log => Arc::new(LogStorage::new()),
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
        StorageKind::Csv => Arc::new(
            CsvStorage::open(&settings.storage_dir).with_context(|| {
                format!("Failed to open csv storage in {:?}", settings.storage_dir)
            })?,
        ),
    };
    tracing::info!(backend = %settings.storage, "storage backend ready");
    Ok(storage)
}

/// Wires collaborators from `settings` into an ingestion handler.
pub fn build_handler(settings: &Settings) -> Result<IngestionHandler> {
    let storage = build_storage(settings)?;
    let control = HttpControlClient::new(&settings.control_url, settings.control_timeout())
        .context("Failed to create control service client")?;
    tracing::info!(
        url = %control.url(),
        timeout_secs = settings.control_timeout_secs,
        "control service client ready"
    );
    let handler = IngestionHandler::new(storage, Arc::new(control))
        .with_storage_failure_policy(settings.storage_failure_policy);
    tracing::info!(
        policy = %handler.storage_failure_policy(),
        "storage failure policy set"
    );
    Ok(handler)
}

/// Builds the complete HTTP application described by `settings`.
pub fn build_app(settings: &Settings) -> Result<Router> {
    let handler = build_handler(settings)?;
    let state = server::AppState::new(handler);
    Ok(server::router(state, &settings.cors_allowed_origins))
}
