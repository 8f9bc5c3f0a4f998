//! `POST /validate_csv`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use csvcheck_core::{ReportStatus, ValidationReport};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::ApiError;
use crate::service::ValidationOrchestrator;

/// Request body: `{"file_path": "<path>"}`.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Validates a server-local CSV file.
///
/// Precondition failures (bad body, missing path, nonexistent file) are 400,
/// an oversized body is 413.
/// Everything else, including processing failures, is a 200 whose `message`
/// tells the outcome.
///
/// # Errors
///
/// Returns [`ApiError`] for the precondition failures above.
pub async fn validate_csv_handler(
    State(state): State<AppState>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let path = ValidationOrchestrator::check_path(request.file_path.as_deref())?;

    let _guard = state.shutdown.in_flight_guard();
    let report = state.orchestrator.run(&path).await;
    Ok(Json(report_body(&report)))
}

fn report_body(report: &ValidationReport) -> Value {
    let time_taken = report.elapsed().as_secs_f64();
    match report.status() {
        ReportStatus::Success => json!({
            "message": "Validation successful",
            "time_taken": time_taken,
        }),
        ReportStatus::Errors => json!({
            "message": "Validation errors",
            "errors": report.violations(),
            "time_taken": time_taken,
        }),
        ReportStatus::Failure => json!({
            "message": "Error processing file",
            "error": report.error().unwrap_or_default(),
            "time_taken": time_taken,
        }),
    }
}
