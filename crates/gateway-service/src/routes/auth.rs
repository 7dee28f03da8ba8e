//! Registration and login endpoints.

use super::AppState;
use crate::errors::GatewayError;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;
use std::sync::Arc;

/// `POST /api/v1/auth/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, GatewayError> {
    let reply = state.auth.send("register", payload).await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// `POST /api/v1/auth/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, GatewayError> {
    let reply = state.auth.send("login", payload).await?;
    Ok(Json(reply))
}
