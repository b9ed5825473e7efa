use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use super::super::AppState;
use super::super::error::ApiError;
use super::JsonFields;
use crate::core::requests::{AgentRequest, NewAgentRequest};

pub async fn create_agent_request(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut fields = JsonFields::decode(&body).map_err(ApiError::invalid_request)?;
    let prompt = fields.text("prompt");
    let context = fields.text("context");
    let request = fields
        .finish(NewAgentRequest::parse(prompt, context))
        .map_err(ApiError::invalid_request)?;

    let record = state.service.create(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "request_id": record.request_id, "status": record.status })),
    ))
}

pub async fn get_agent_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<AgentRequest>, ApiError> {
    Ok(Json(state.service.query(&request_id).await?))
}
