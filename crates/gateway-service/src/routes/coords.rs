//! Rider coordinate endpoints.

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

/// `POST /api/v1/coordinates`
pub async fn save_coordinates(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, GatewayError> {
    let reply = state.coords.send("save-rider-coordinates", payload).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `GET /api/v1/coordinates/:rider`
pub async fn get_coordinates(
    State(state): State<Arc<AppState>>,
    Path(rider): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let reply = state
        .coords
        .send("get-rider-coordinates", json!({ "rider": rider }))
        .await?;
    Ok(Json(reply))
}
