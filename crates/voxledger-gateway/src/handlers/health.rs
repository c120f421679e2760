//! Liveness probe.

use axum::Json;
use serde_json::{Value, json};

/// `GET /health`
pub async fn handler() -> Json<Value> { Json(json!({ "status": "ok" })) }
