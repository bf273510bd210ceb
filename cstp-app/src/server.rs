//! HTTP surface: routes, handlers and server startup.

use crate::error::{ApiError, ApiResult};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use cstp_core::IngestionHandler;
use cstp_schemas::{ack::AckResponse, measurement::MeasurementPayload, snapshot::PlantSnapshot};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<IngestionHandler>,
}

impl AppState {
    pub fn new(handler: IngestionHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Builds the router. CORS is only enabled when `cors_allowed_origins` is
/// non-empty.
pub fn router(state: AppState, cors_allowed_origins: &[String]) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/plants/:plant_id/measurements",
            post(receive_measurement),
        )
        .route("/api/v1/plants/:plant_id/latest", get(latest_records))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    match cors_layer(cors_allowed_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(allowed_origins: &[String]) -> Option<CorsLayer> {
    if allowed_origins.is_empty() {
        return None;
    }
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|o| o == "*") {
        tracing::info!("CORS allows any origin");
        return Some(cors.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    tracing::info!(origins = ?allowed_origins, "CORS configured");
    Some(cors.allow_origin(AllowOrigin::list(origins)))
}

/// `GET /health`. Does not check the control service or storage.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// `POST /api/v1/plants/{plant_id}/measurements`: ingestion endpoint for
/// plant gateways.
async fn receive_measurement(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
    payload: Result<Json<MeasurementPayload>, JsonRejection>,
) -> ApiResult<Json<AckResponse>> {
    let Json(payload) = payload?;
    let ack = state.handler.handle_ingest(&plant_id, payload).await?;
    Ok(Json(ack))
}

/// `GET /api/v1/plants/{plant_id}/latest`: most recent stored records.
async fn latest_records(
    State(state): State<AppState>,
    Path(plant_id): Path<String>,
) -> ApiResult<Json<PlantSnapshot>> {
    let snapshot = state.handler.storage().latest(&plant_id).await?;
    if snapshot.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no records stored for plant {plant_id}"
        )));
    }
    Ok(Json(snapshot))
}

async fn not_found(uri: OriginalUri) -> ApiError {
    ApiError::NotFound(format!("not found: {}", uri.0.path()))
}

/// Serves `router` on `addr` until Ctrl-C.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "CSTP relay listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("CSTP relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
    }

    #[test]
    fn cors_accepts_wildcard_and_lists() {
        assert!(cors_layer(&["*".to_string()]).is_some());
        assert!(cors_layer(&["http://localhost:5500".to_string()]).is_some());
    }
}
