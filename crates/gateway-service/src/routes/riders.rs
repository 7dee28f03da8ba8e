//! Rider profile endpoints.

use super::AppState;
use crate::errors::GatewayError;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// `POST /api/v1/riders`
pub async fn create_rider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, GatewayError> {
    let reply = state.riders.send("create-rider", payload).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `GET /api/v1/riders/:id`
pub async fn get_rider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let reply = state.riders.send("get-rider", json!({ "id": id })).await?;
    Ok(Json(reply))
}
