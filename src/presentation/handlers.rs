// HTTP request handlers
use crate::domain::equipment::EntityId;
use crate::domain::error::MeterError;
use crate::domain::report::RunReport;
use crate::domain::time_grid::{interval_from_minutes, AnalysisWindow};
use crate::infrastructure::config::AnalysisSettings;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Optional overrides of the configured analysis window.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub interval_minutes: Option<i64>,
}

impl WindowQuery {
    fn resolve(&self, defaults: &AnalysisSettings) -> Result<AnalysisWindow, MeterError> {
        AnalysisWindow::new(
            self.begin.unwrap_or(defaults.begin),
            self.end.unwrap_or(defaults.end),
            interval_from_minutes(self.interval_minutes.unwrap_or(defaults.interval_minutes))?,
        )
    }
}

pub struct ApiError(MeterError);

impl From<MeterError> for ApiError {
    fn from(e: MeterError) -> Self {
        Self(e)
    }
}

fn status_for(e: &MeterError) -> StatusCode {
    match e {
        MeterError::UnknownEquipment { .. } => StatusCode::NOT_FOUND,
        MeterError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
        MeterError::Topology(_) | MeterError::Retrieval { .. } => StatusCode::BAD_GATEWAY,
        MeterError::ShapeMismatch { .. }
        | MeterError::InsufficientSamples { .. }
        | MeterError::SingularDesign { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("Request failed with {}: {}", status, self.0);
        }
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List all AHUs in the topology
pub async fn list_ahus(State(state): State<Arc<AppState>>) -> Result<Json<Vec<EntityId>>, ApiError> {
    let ahus = state.meter_service.list_ahus().await?;
    Ok(Json(ahus))
}

/// Run the pipeline for one AHU and return the full report
pub async fn calibrate_ahu(
    Path(id): Path<String>,
    Query(query): Query<WindowQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunReport>, ApiError> {
    let window = query.resolve(&state.analysis)?;
    let report = state.meter_service.run(&EntityId::new(id), &window).await?;
    Ok(Json(report))
}
