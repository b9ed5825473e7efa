use axum::Json;
use serde_json::{Value, json};

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn index() -> Json<Value> {
    Json(json!({ "message": "LLM Agent service is running" }))
}
