use axum::{body::Bytes, extract::State, http::StatusCode};

use super::super::AppState;
use super::super::error::ApiError;
use super::JsonFields;
use crate::core::requests::CallbackReport;

/// Worker callback. Authentication has already happened in middleware.
pub async fn agent_result(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let mut fields = JsonFields::decode(&body).map_err(ApiError::invalid_result)?;
    let request_id = fields.text("request_id");
    let status = fields.text("status");
    let result = fields.text("result");
    let report = fields
        .finish(CallbackReport::parse(request_id, status, result))
        .map_err(ApiError::invalid_result)?;

    state
        .service
        .complete_from_callback(&report.request_id, &report.status, report.result.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
